// ============================================================================
// src/fs/ops.rs - Backend Capability Table
// ============================================================================
//!
//! The operation set every backend family exposes to the switch.
//!
//! One [`FileOps`] implementation exists per family and is shared by all of
//! that family's mounts. Slots a family does not implement keep the default
//! body, which reports [`VfsError::Unsupported`] instead of being callable.

use core::fmt;

use bitflags::bitflags;

use super::fd::DescriptorTable;
use crate::error::{VfsError, VfsResult};

// ============================================================================
// Descriptors and Flags
// ============================================================================

/// File descriptor number (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Fd(usize);

impl Fd {
    pub const fn new(fd: usize) -> Self {
        Self(fd)
    }

    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Open flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpenFlags: u32 {
        /// Create the file if it does not exist
        const CREATE = 1 << 0;
        /// Open for reading and writing
        const RDWR = 1 << 1;
        /// Truncate an existing file to zero length
        const TRUNC = 1 << 2;
    }
}

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file
    Set = 0,
    /// From the current position
    Cur = 1,
    /// From the end of the file
    End = 2,
}

impl TryFrom<i32> for Whence {
    type Error = VfsError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(VfsError::InvalidSyscall),
        }
    }
}

// ============================================================================
// Operations and Capabilities
// ============================================================================

/// A single slot of the capability table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    Close,
    Read,
    Write,
    Seek,
    Unlink,
    Create,
    Delete,
    OpenDir,
    CreateDir,
    DeleteDir,
}

impl Op {
    pub const fn name(&self) -> &'static str {
        match self {
            Op::Open => "open",
            Op::Close => "close",
            Op::Read => "read",
            Op::Write => "write",
            Op::Seek => "seek",
            Op::Unlink => "unlink",
            Op::Create => "create",
            Op::Delete => "delete",
            Op::OpenDir => "opendir",
            Op::CreateDir => "createdir",
            Op::DeleteDir => "deletedir",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Slots a family implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u16 {
        const OPEN = 1 << 0;
        const CLOSE = 1 << 1;
        const READ = 1 << 2;
        const WRITE = 1 << 3;
        const SEEK = 1 << 4;
        const UNLINK = 1 << 5;
        const CREATE = 1 << 6;
        const DELETE = 1 << 7;
        const OPEN_DIR = 1 << 8;
        const CREATE_DIR = 1 << 9;
        const DELETE_DIR = 1 << 10;

        /// Descriptor I/O shared by every family
        const FILE_IO = Self::OPEN.bits()
            | Self::CLOSE.bits()
            | Self::READ.bits()
            | Self::WRITE.bits()
            | Self::SEEK.bits();
        /// Creation and directory slots
        const DIRECTORIES = Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::OPEN_DIR.bits()
            | Self::CREATE_DIR.bits()
            | Self::DELETE_DIR.bits();
    }
}

impl Capabilities {
    /// The flag naming a single slot
    pub const fn of(op: Op) -> Self {
        match op {
            Op::Open => Self::OPEN,
            Op::Close => Self::CLOSE,
            Op::Read => Self::READ,
            Op::Write => Self::WRITE,
            Op::Seek => Self::SEEK,
            Op::Unlink => Self::UNLINK,
            Op::Create => Self::CREATE,
            Op::Delete => Self::DELETE,
            Op::OpenDir => Self::OPEN_DIR,
            Op::CreateDir => Self::CREATE_DIR,
            Op::DeleteDir => Self::DELETE_DIR,
        }
    }

    pub fn supports(&self, op: Op) -> bool {
        self.contains(Self::of(op))
    }
}

// ============================================================================
// Families
// ============================================================================

/// Backend family; indexes the family table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsFamily {
    /// Character terminal devices
    Tty = 0,
    /// Custom flat disk filesystem
    Orange = 1,
    /// FAT-family filesystem
    Fat = 2,
}

impl FsFamily {
    /// Number of family table slots
    pub const COUNT: usize = 3;

    pub const ALL: [FsFamily; Self::COUNT] = [FsFamily::Tty, FsFamily::Orange, FsFamily::Fat];

    pub const fn index(&self) -> usize {
        *self as usize
    }

    pub const fn name(&self) -> &'static str {
        match self {
            FsFamily::Tty => "tty",
            FsFamily::Orange => "orange",
            FsFamily::Fat => "fat32",
        }
    }
}

// ============================================================================
// FileOps Trait
// ============================================================================

/// Capability table of one backend family
///
/// Path arguments are relative to the mount point: empty or starting with
/// `/`, except for `open` on the mount point itself, which receives the bare
/// mount name. Every error a backend returns is handed back to the caller
/// unchanged.
pub trait FileOps: Send + Sync {
    /// Family name used in diagnostics
    fn name(&self) -> &str;

    /// Slots this family implements
    fn capabilities(&self) -> Capabilities;

    /// Open a file, allocating its descriptor in `fds`
    fn open(&self, fds: &mut dyn DescriptorTable, path: &str, flags: OpenFlags) -> VfsResult<Fd> {
        let _ = (fds, path, flags);
        Err(VfsError::Unsupported(Op::Open))
    }

    /// Close a descriptor, releasing its slot in `fds`
    fn close(&self, fds: &mut dyn DescriptorTable, fd: Fd) -> VfsResult<()> {
        let _ = (fds, fd);
        Err(VfsError::Unsupported(Op::Close))
    }

    /// Read at the descriptor's position; `fds` is the caller's table
    fn read(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &mut [u8]) -> VfsResult<usize> {
        let _ = (fds, fd, buf);
        Err(VfsError::Unsupported(Op::Read))
    }

    /// Write a whole chunk; anything short of `buf.len()` must be an error
    fn write(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &[u8]) -> VfsResult<usize> {
        let _ = (fds, fd, buf);
        Err(VfsError::Unsupported(Op::Write))
    }

    fn seek(
        &self,
        fds: &dyn DescriptorTable,
        fd: Fd,
        offset: i64,
        whence: Whence,
    ) -> VfsResult<u64> {
        let _ = (fds, fd, offset, whence);
        Err(VfsError::Unsupported(Op::Seek))
    }

    fn unlink(&self, path: &str) -> VfsResult<()> {
        let _ = path;
        Err(VfsError::Unsupported(Op::Unlink))
    }

    fn create(&self, path: &str) -> VfsResult<()> {
        let _ = path;
        Err(VfsError::Unsupported(Op::Create))
    }

    fn delete(&self, path: &str) -> VfsResult<()> {
        let _ = path;
        Err(VfsError::Unsupported(Op::Delete))
    }

    /// Open a directory; returns the number of entries it holds
    fn open_dir(&self, path: &str) -> VfsResult<usize> {
        let _ = path;
        Err(VfsError::Unsupported(Op::OpenDir))
    }

    fn create_dir(&self, path: &str) -> VfsResult<()> {
        let _ = path;
        Err(VfsError::Unsupported(Op::CreateDir))
    }

    fn delete_dir(&self, path: &str) -> VfsResult<()> {
        let _ = path;
        Err(VfsError::Unsupported(Op::DeleteDir))
    }
}

// ============================================================================
// Tests
// ============================================================================
