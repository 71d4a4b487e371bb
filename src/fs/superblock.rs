// ============================================================================
// src/fs/superblock.rs - Superblock Registry
// ============================================================================
//!
//! スーパーブロックテーブルとスーパーブロック操作セット
//!
//! 各マウントは初期化時に専用のスロットを一つ受け取る。
//! 操作セット（`read`/`get`）は永続メタデータを持つバックエンドのための拡張点で、
//! 現在のディスパッチ経路からは呼び出されない。

use alloc::vec::Vec;

use crate::config::NR_SUPER_BLOCK;

/// デバイス番号 (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct DeviceNumber {
    major: u16,
    minor: u16,
}

impl DeviceNumber {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub const fn major(&self) -> u16 {
        self.major
    }

    pub const fn minor(&self) -> u16 {
        self.minor
    }

    pub const fn to_dev_t(&self) -> u32 {
        ((self.major as u32) << 16) | (self.minor as u32)
    }

    // 標準デバイス番号
    pub const NO_DEV: Self = Self::new(0, 0);
    pub const HD: Self = Self::new(3, 0);
    pub const CHAR_TTY: Self = Self::new(4, 0);
}

/// ファイルシステム種別タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    /// 未割り当て
    None,
    /// 端末デバイス
    Tty,
    /// 独自ディスクファイルシステム
    Orange,
    /// FAT32
    Fat32,
}

/// スーパーブロック
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    /// 所有デバイス
    pub dev: DeviceNumber,
    /// ファイルシステム種別
    pub fs_type: FsType,
}

impl Superblock {
    /// 初期化前の番兵値
    pub const EMPTY: Self = Self {
        dev: DeviceNumber::NO_DEV,
        fs_type: FsType::None,
    };

    pub const fn new(dev: DeviceNumber, fs_type: FsType) -> Self {
        Self { dev, fs_type }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// スーパーブロックテーブル
#[derive(Debug, Clone)]
pub struct SuperblockTable {
    slots: Vec<Superblock>,
}

impl SuperblockTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NR_SUPER_BLOCK);
        slots.resize(NR_SUPER_BLOCK, Superblock::EMPTY);
        Self { slots }
    }

    /// 全スロットを番兵値に戻す
    pub fn reset(&mut self) {
        self.slots.fill(Superblock::EMPTY);
    }

    pub fn get(&self, slot: usize) -> Option<&Superblock> {
        self.slots.get(slot)
    }

    /// スロットに書き込む（範囲外なら false）
    pub fn set(&mut self, slot: usize, sb: Superblock) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = sb;
                true
            }
            None => false,
        }
    }

    /// デバイスに属する使用中スロットを列挙
    pub fn find_by_dev(&self, dev: DeviceNumber) -> impl Iterator<Item = (usize, &Superblock)> {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, sb)| !sb.is_empty() && sb.dev == dev)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for SuperblockTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// スーパーブロック操作セット
// ============================================================================

/// 操作セットテーブルのインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbOpsId {
    /// 永続メタデータを持たないファミリー
    Null = 0,
    /// 登録済みスーパーブロックを参照するファミリー
    Table = 1,
}

impl SbOpsId {
    pub const COUNT: usize = 2;

    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// スーパーブロック操作トレイト
pub trait SuperblockOps: Send + Sync {
    /// デバイスのスーパーブロックを読み込む/検証する
    fn read(&self, table: &mut SuperblockTable, dev: DeviceNumber);

    /// デバイスに対応する唯一のスーパーブロックを返す
    fn get<'a>(&self, table: &'a SuperblockTable, dev: DeviceNumber) -> Option<&'a Superblock>;
}

/// 何もしない操作セット
pub struct NullSuperblockOps;

impl SuperblockOps for NullSuperblockOps {
    fn read(&self, _table: &mut SuperblockTable, _dev: DeviceNumber) {}

    fn get<'a>(&self, _table: &'a SuperblockTable, _dev: DeviceNumber) -> Option<&'a Superblock> {
        None
    }
}

/// テーブル参照型の操作セット
pub struct TableSuperblockOps;

impl SuperblockOps for TableSuperblockOps {
    fn read(&self, table: &mut SuperblockTable, dev: DeviceNumber) {
        match table.find_by_dev(dev).count() {
            0 => log::warn!("[superblock] no superblock for dev {:#x}", dev.to_dev_t()),
            1 => log::trace!("[superblock] dev {:#x} ok", dev.to_dev_t()),
            n => log::warn!(
                "[superblock] dev {:#x} shared by {} superblocks",
                dev.to_dev_t(),
                n
            ),
        }
    }

    fn get<'a>(&self, table: &'a SuperblockTable, dev: DeviceNumber) -> Option<&'a Superblock> {
        let mut matches = table.find_by_dev(dev);
        let (_, sb) = matches.next()?;
        // 複数ある場合は一意ではない
        if matches.next().is_some() {
            return None;
        }
        Some(sb)
    }
}
