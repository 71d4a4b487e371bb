// ============================================================================
// src/klog.rs - Kernel Logging System using the `log` crate
// ============================================================================
//!
//! カーネル用ロギングシステムと診断シンク。
//!
//! ## 機能
//! - `log`クレートを使用した標準的なログインターフェース
//! - 出力はメモリ上のリングバッファ（dmesg相当）に蓄積
//! - コンパイル時のログレベルフィルタリング
//! - Spinlock保護
//!
//! ## 使用方法
//! ```rust
//! use log::info;
//!
//! kvfs::klog::init().ok();
//! info!("vfs ready");
//! let lines = kvfs::klog::drain();
//! ```

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

use crate::config::LOG_BUFFER_CAPACITY;
use crate::error::Errno;

// ============================================================================
// ログレベル定義
// ============================================================================

/// コンパイル時のログレベル（featureで変更可能）
#[cfg(feature = "verbose_logging")]
const MAX_LOG_LEVEL: LevelFilter = LevelFilter::Trace;

#[cfg(not(feature = "verbose_logging"))]
const MAX_LOG_LEVEL: LevelFilter = LevelFilter::Info;

// ============================================================================
// ロガー状態管理
// ============================================================================

/// ロガーの初期化状態
static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// 現在のログレベル（実行時変更可能）
static CURRENT_LOG_LEVEL: AtomicU8 = AtomicU8::new(LevelFilter::Info as u8);

/// ログ行のリングバッファ
static LOG_RING: Mutex<LogRing> = Mutex::new(LogRing::new());

/// 容量を超えると古い行から捨てるリングバッファ
struct LogRing {
    lines: VecDeque<String>,
    dropped: usize,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            dropped: 0,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() >= LOG_BUFFER_CAPACITY {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line);
    }

    /// 全行を取り出す。捨てた行があれば先頭にその件数を記録する
    fn take(&mut self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 1);
        if self.dropped > 0 {
            out.push(format!("[WARN] klog: {} lines dropped", self.dropped));
            self.dropped = 0;
        }
        out.extend(self.lines.drain(..));
        out
    }
}

// ============================================================================
// ロガー実装
// ============================================================================

/// カーネル用ロガー
struct KernelLogger;

impl KernelLogger {
    /// ログレベルのプレフィックスを取得
    fn level_prefix(level: Level) -> &'static str {
        match level {
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        }
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= current_log_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = match record.module_path() {
            Some(module) => format!(
                "{} [{}] {}",
                Self::level_prefix(record.level()),
                module,
                record.args()
            ),
            None => format!("{} {}", Self::level_prefix(record.level()), record.args()),
        };

        LOG_RING.lock().push(line);
    }

    fn flush(&self) {
        // メモリバッファなので何もしない
    }
}

/// グローバルロガーインスタンス
static LOGGER: KernelLogger = KernelLogger;

// ============================================================================
// 公開API
// ============================================================================

/// ロギングシステムを初期化
///
/// 二回目以降の呼び出しは `SetLoggerError` を返す。
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(MAX_LOG_LEVEL);
    CURRENT_LOG_LEVEL.store(MAX_LOG_LEVEL as u8, Ordering::SeqCst);
    LOGGER_INITIALIZED.store(true, Ordering::SeqCst);
    Ok(())
}

/// 実行時にログレベルを変更
pub fn set_log_level(level: LevelFilter) {
    CURRENT_LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    log::set_max_level(level);
}

/// 現在のログレベルを取得
pub fn current_log_level() -> LevelFilter {
    LevelFilter::iter()
        .nth(CURRENT_LOG_LEVEL.load(Ordering::Relaxed) as usize)
        .unwrap_or(LevelFilter::Info)
}

/// ロガーが初期化済みかどうか
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.load(Ordering::Relaxed)
}

/// 蓄積されたログ行を取り出してバッファを空にする
pub fn drain() -> Vec<String> {
    LOG_RING.lock().take()
}

// ============================================================================
// 診断シンク
// ============================================================================

/// ステータスコードを受け取る診断出力先
pub trait DiagnosticSink: Send + Sync {
    /// 失敗ステータスを報告する（戻り値には影響しない）
    fn report(&self, code: Errno, context: &str);
}

/// `log::error!` に流す既定のシンク
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, code: Errno, context: &str) {
        log::error!("filesystem error: {}: {}", context, code);
    }
}
