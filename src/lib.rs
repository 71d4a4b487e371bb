// ============================================================================
// src/lib.rs - kvfs: Virtual Filesystem Switch
// ============================================================================
//!
//! # kvfs
//!
//! 小規模カーネル向けの仮想ファイルシステムスイッチ。
//!
//! 単一の階層パス名前空間を複数のバックエンド（端末・独自ディスクFS・FAT）に
//! 振り分ける。パスは最長プレフィックス一致でマウントに解決され、
//! オープンしたディスクリプタは所有マウントと紐付けられる。
//!
//! ## モジュール
//! - [`fs`]: マウントテーブル、パス解決、ディスパッチャ、参照バックエンド
//! - [`syscall`]: システムコール境界のアダプタ
//! - [`klog`]: リングバッファロガーと診断シンク
//! - [`error`]: エラー型と致命的障害
//! - [`config`]: 静的構成

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod fs;
pub mod klog;
pub mod syscall;

pub use error::{Errno, Fault, VfsError, VfsResult};
pub use fs::{FdTable, Vfs};
