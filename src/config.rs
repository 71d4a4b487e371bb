// ============================================================================
// src/config.rs - Static Configuration
// ============================================================================
//!
//! Compile-time sizes and the compiled-in mount list.
//!
//! Initial mount assignment: `{tty0, tty1, tty2, orange, fat0}`.

use crate::fs::ops::FsFamily;
use crate::fs::superblock::{DeviceNumber, FsType, SbOpsId};

/// Mount table slots
pub const NR_FS: usize = 8;

/// Terminal consoles mounted at boot
pub const NR_CONSOLES: usize = 3;

/// Superblock table slots
pub const NR_SUPER_BLOCK: usize = 8;

/// Descriptor slots per process
pub const NR_FILES: usize = 64;

/// Size of the staging buffer writes are copied through
pub const WRITE_CHUNK_SIZE: usize = 512;

/// Largest file the in-memory backends will grow to
pub const MAX_FILE_SIZE: usize = 1 << 20;

/// Longest path accepted from user space, including the terminating NUL
pub const MAX_PATH: usize = 128;

/// Lines kept by the in-memory kernel log
pub const LOG_BUFFER_CAPACITY: usize = 256;

/// One entry of a static mount list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountSpec {
    /// Name prefix, e.g. `/fat0`
    pub name: &'static str,
    pub family: FsFamily,
    /// Device recorded in the mount's superblock
    pub device: DeviceNumber,
    pub fs_type: FsType,
    pub sb_ops: SbOpsId,
}

impl MountSpec {
    pub const fn new(
        name: &'static str,
        family: FsFamily,
        device: DeviceNumber,
        fs_type: FsType,
    ) -> Self {
        Self {
            name,
            family,
            device,
            fs_type,
            sb_ops: SbOpsId::Null,
        }
    }

    pub const fn tty(name: &'static str) -> Self {
        Self::new(name, FsFamily::Tty, DeviceNumber::CHAR_TTY, FsType::Tty)
    }
}

/// Terminal mount names; the tty backend sees them without the leading `/`
pub const TTY_NAMES: [&str; NR_CONSOLES] = ["/dev_tty0", "/dev_tty1", "/dev_tty2"];

/// Boot-time mount list; every entry uses the null superblock op set
pub const DEFAULT_MOUNTS: [MountSpec; NR_CONSOLES + 2] = [
    MountSpec::tty(TTY_NAMES[0]),
    MountSpec::tty(TTY_NAMES[1]),
    MountSpec::tty(TTY_NAMES[2]),
    MountSpec::new("/orange", FsFamily::Orange, DeviceNumber::HD, FsType::Orange),
    MountSpec::new("/fat0", FsFamily::Fat, DeviceNumber::HD, FsType::Fat32),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mounts_fit_tables() {
        assert!(DEFAULT_MOUNTS.len() <= NR_FS);
        assert!(DEFAULT_MOUNTS.len() <= NR_SUPER_BLOCK);
    }

    #[test]
    fn test_default_mounts_use_null_superblock_ops() {
        assert!(DEFAULT_MOUNTS.iter().all(|m| m.sb_ops == SbOpsId::Null));
    }
}
