// ============================================================================
// src/fs/mod.rs - Filesystem Switch Layer
// ============================================================================
//!
//! # ファイルシステムスイッチ
//!
//! ## 構成
//! - `mount` / `path`: 静的マウントテーブルと最長プレフィックス解決
//! - `ops`: ファミリーごとの操作テーブル（ケイパビリティ付き）
//! - `fd`: ディスクリプタと所有マウントの紐付け
//! - `superblock`: スーパーブロック表と操作セット
//! - `vfs`: ディスパッチャ本体
//! - `tty` / `flatfs` / `fat`: 参照バックエンド
//!
//! グローバルなスイッチは [`init`] で構築し、[`with_vfs`] / [`with_vfs_mut`]
//! 経由で参照する。

use alloc::sync::Arc;

use lazy_static::lazy_static;
use spin::RwLock;

pub mod fat;
pub mod fd;
pub mod flatfs;
pub mod mount;
pub mod ops;
pub mod path;
pub mod superblock;
pub mod tty;
pub mod vfs;

pub use fat::FatFs;
pub use fd::{DescriptorTable, FdTable, FileHandle};
pub use flatfs::FlatFs;
pub use mount::{Mount, MountIndex, MountTable};
pub use ops::{Capabilities, Fd, FileOps, FsFamily, Op, OpenFlags, Whence};
pub use path::Resolved;
pub use superblock::{DeviceNumber, FsType, SbOpsId, Superblock, SuperblockOps};
pub use tty::TtyFs;
pub use vfs::Vfs;

use crate::config::TTY_NAMES;

// ============================================================================
// 既定のバックエンド
// ============================================================================

/// 起動時マウントを支える参照バックエンドへのハンドル
#[derive(Clone)]
pub struct DefaultBackends {
    pub tty: Arc<TtyFs>,
    pub orange: Arc<FlatFs>,
    pub fat: Arc<FatFs>,
}

impl DefaultBackends {
    pub fn new() -> Self {
        let terminals = TTY_NAMES.iter().map(|name| name.trim_start_matches('/'));
        Self {
            tty: Arc::new(TtyFs::new(terminals)),
            orange: Arc::new(FlatFs::new()),
            fat: Arc::new(FatFs::new()),
        }
    }

    /// ファミリーテーブルに登録する形
    pub fn families(&self) -> [(FsFamily, Arc<dyn FileOps>); FsFamily::COUNT] {
        [
            (FsFamily::Tty, self.tty.clone() as Arc<dyn FileOps>),
            (FsFamily::Orange, self.orange.clone() as Arc<dyn FileOps>),
            (FsFamily::Fat, self.fat.clone() as Arc<dyn FileOps>),
        ]
    }
}

impl Default for DefaultBackends {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// グローバルインスタンス
// ============================================================================

lazy_static! {
    /// カーネル全体で共有するスイッチ
    static ref VFS: RwLock<Vfs> = RwLock::new(Vfs::new());
}

/// グローバルスイッチを既定マウントで初期化（再呼び出しでリセット）
pub fn init() -> DefaultBackends {
    let backends = VFS.write().init();
    log::info!("[fs] filesystem switch initialized");
    backends
}

/// 共有ロックでスイッチを参照
pub fn with_vfs<R>(f: impl FnOnce(&Vfs) -> R) -> R {
    f(&VFS.read())
}

/// 排他ロックでスイッチを参照
pub fn with_vfs_mut<R>(f: impl FnOnce(&mut Vfs) -> R) -> R {
    f(&mut VFS.write())
}
