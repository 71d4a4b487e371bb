//! 統一エラーハンドリングモジュール
//!
//! VFSスイッチで使用されるエラー型を定義します。
//!
//! - [`VfsError`]: 呼び出し側が回復可能なエラー（システムコール境界で負のステータスになる）
//! - [`Errno`]: バックエンドが返す負のステータスコード（スイッチは解釈せずにそのまま返す）
//! - [`Fault`]: 静的構成が正しければ決して起きない不変条件違反。`Result` では運ばず、
//!   [`fault`] でログ出力後にパニックする

use core::fmt;

use crate::fs::ops::{Fd, Op};

/// バックエンドが返す負のステータスコード (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(i32);

impl Errno {
    /// ファイルまたはディレクトリが存在しない
    pub const ENOENT: Self = Self(-2);
    /// I/Oエラー
    pub const EIO: Self = Self(-5);
    /// 不正なファイルディスクリプタ
    pub const EBADF: Self = Self(-9);
    /// 権限なし
    pub const EACCES: Self = Self(-13);
    /// 不正なアドレス
    pub const EFAULT: Self = Self(-14);
    /// リソースがビジー
    pub const EBUSY: Self = Self(-16);
    /// 既に存在する
    pub const EEXIST: Self = Self(-17);
    /// ディレクトリではない
    pub const ENOTDIR: Self = Self(-20);
    /// ディレクトリである
    pub const EISDIR: Self = Self(-21);
    /// 不正な引数
    pub const EINVAL: Self = Self(-22);
    /// オープンしているファイルが多すぎる
    pub const EMFILE: Self = Self(-24);
    /// ファイルが大きすぎる
    pub const EFBIG: Self = Self(-27);
    /// デバイスに空きがない
    pub const ENOSPC: Self = Self(-28);
    /// シーク不可
    pub const ESPIPE: Self = Self(-29);
    /// 未実装のシステムコール
    pub const ENOSYS: Self = Self(-38);
    /// ディレクトリが空でない
    pub const ENOTEMPTY: Self = Self(-39);
    /// サポートされていない操作
    pub const EOPNOTSUPP: Self = Self(-95);

    pub const fn code(&self) -> i32 {
        self.0
    }
}

/// VFSスイッチの回復可能なエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    /// どのマウントにもマッチしないパス
    PathNotFound,
    /// ファミリーが宣言していない操作
    Unsupported(Op),
    /// バックエンドが返したエラー（そのまま伝播）
    Backend(Errno),
    /// ユーザー空間のアドレスが不正
    BadAddress,
    /// 不正なシステムコール番号または引数
    InvalidSyscall,
}

impl VfsError {
    /// 解決失敗時に返されてきた歴史的なステータス値
    pub const PATH_NOT_FOUND_CODE: i32 = -1;

    /// システムコール境界で返す負のステータスコード
    pub const fn code(&self) -> i32 {
        match self {
            VfsError::PathNotFound => Self::PATH_NOT_FOUND_CODE,
            VfsError::Unsupported(_) => Errno::EOPNOTSUPP.code(),
            VfsError::Backend(errno) => errno.code(),
            VfsError::BadAddress => Errno::EFAULT.code(),
            VfsError::InvalidSyscall => Errno::ENOSYS.code(),
        }
    }

    /// 診断シンクに渡すためのステータスコード
    pub const fn errno(&self) -> Errno {
        Errno(self.code())
    }
}

impl From<Errno> for VfsError {
    fn from(errno: Errno) -> Self {
        VfsError::Backend(errno)
    }
}

/// VFS操作の結果型
pub type VfsResult<T> = Result<T, VfsError>;

/// マウント登録時のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    /// 同じ名前のマウントが既に存在
    DuplicateName(&'static str),
    /// マウントテーブルがいっぱい
    TableFull(&'static str),
    /// 名前が空、`/` で始まらない、または `/` で終わる
    InvalidName(&'static str),
}

/// 回復不能な不変条件違反
///
/// どれも正しい静的構成と正しい呼び出し側では発生しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 二つのマウントが同じ長さで最長一致した（同名マウント）
    DuplicateMount { name: &'static str },
    /// オープン済みディスクリプタに所有マウントが記録されていない
    InvalidDescriptorLinkage { fd: Fd },
    /// バックエンドがチャンクの一部だけを書き込んだ
    ShortWrite { fd: Fd, requested: usize, written: usize },
    /// 初期化中にマウントテーブルが溢れた
    MountTableFull { name: &'static str },
    /// 初期化中に不正なマウント名が見つかった
    InvalidMountName { name: &'static str },
    /// マウントが参照するファミリーの操作テーブルが未登録
    MissingFamily { name: &'static str },
    /// デバイス番号カウンタが範囲外
    DeviceNumberOverflow,
}

/// 不変条件違反を報告して停止する
#[cold]
#[track_caller]
pub fn fault(fault: Fault) -> ! {
    log::error!("vfs fault: {}", fault);
    panic!("vfs fault: {}", fault)
}

// ===== Display implementations =====

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Errno::ENOENT => "ENOENT",
            Errno::EIO => "EIO",
            Errno::EBADF => "EBADF",
            Errno::EACCES => "EACCES",
            Errno::EFAULT => "EFAULT",
            Errno::EBUSY => "EBUSY",
            Errno::EEXIST => "EEXIST",
            Errno::ENOTDIR => "ENOTDIR",
            Errno::EISDIR => "EISDIR",
            Errno::EINVAL => "EINVAL",
            Errno::EMFILE => "EMFILE",
            Errno::EFBIG => "EFBIG",
            Errno::ENOSPC => "ENOSPC",
            Errno::ESPIPE => "ESPIPE",
            Errno::ENOSYS => "ENOSYS",
            Errno::ENOTEMPTY => "ENOTEMPTY",
            Errno::EOPNOTSUPP => "EOPNOTSUPP",
            _ => return write!(f, "status {}", self.0),
        };
        write!(f, "{} ({})", name, self.0)
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::PathNotFound => write!(f, "no such mount or path"),
            VfsError::Unsupported(op) => write!(f, "operation {} not supported", op),
            VfsError::Backend(errno) => write!(f, "backend error: {}", errno),
            VfsError::BadAddress => write!(f, "bad user address"),
            VfsError::InvalidSyscall => write!(f, "invalid system call"),
        }
    }
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountError::DuplicateName(name) => write!(f, "duplicate mount name {}", name),
            MountError::TableFull(name) => write!(f, "mount table full while adding {}", name),
            MountError::InvalidName(name) => write!(f, "invalid mount name {:?}", name),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::DuplicateMount { name } => write!(f, "duplicate vfs entry {}", name),
            Fault::InvalidDescriptorLinkage { fd } => {
                write!(f, "invalid vfs index for fd {}", fd)
            }
            Fault::ShortWrite { fd, requested, written } => write!(
                f,
                "short write on fd {}: {} of {} bytes",
                fd, written, requested
            ),
            Fault::MountTableFull { name } => write!(f, "mount table full at {}", name),
            Fault::InvalidMountName { name } => write!(f, "invalid mount name {:?}", name),
            Fault::MissingFamily { name } => {
                write!(f, "no operation table for mount {}", name)
            }
            Fault::DeviceNumberOverflow => write!(f, "dev nr out of range"),
        }
    }
}

impl From<MountError> for Fault {
    fn from(err: MountError) -> Self {
        match err {
            MountError::DuplicateName(name) => Fault::DuplicateMount { name },
            MountError::TableFull(name) => Fault::MountTableFull { name },
            MountError::InvalidName(name) => Fault::InvalidMountName { name },
        }
    }
}
