// ============================================================================
// src/fs/path.rs - Path Resolution
// ============================================================================
//!
//! Longest-prefix resolution of an absolute path to its owning mount.
//!
//! A mount qualifies when its whole name is a leading byte run of the path and
//! the path continues with `/` or ends right there, so `/dev` never claims
//! `/devx`. Among qualifying mounts the longest name wins; two of equal length
//! can only be identically named and are a fatal configuration defect.

use super::mount::{MountIndex, MountTable};
use crate::error::{Fault, fault};

/// Path separator
pub const SEPARATOR: u8 = b'/';

/// Length of the common leading byte run of `name` and `path`
pub fn prefix_match(name: &str, path: &str) -> usize {
    name.bytes()
        .zip(path.bytes())
        .take_while(|(a, b)| a == b)
        .count()
}

/// A path split into its owning mount and the remainder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    /// Owning mount
    pub index: MountIndex,
    path: &'a str,
    offset: usize,
}

impl<'a> Resolved<'a> {
    /// Path with the mount name sliced off; empty or starting with `/`
    pub fn relative(&self) -> &'a str {
        &self.path[self.offset..]
    }

    /// Whether the path names the mount point itself
    pub fn is_mount_point(&self) -> bool {
        self.offset == self.path.len()
    }

    /// Identifier handed to a backend's `open`
    ///
    /// On the mount point itself this is the bare name (leading `/` stripped),
    /// since such backends expect a device name rather than an empty string.
    pub fn backend_path(&self) -> &'a str {
        if self.is_mount_point() {
            self.path.strip_prefix('/').unwrap_or(self.path)
        } else {
            self.relative()
        }
    }
}

/// Resolve `path` against the registered mounts
pub fn resolve<'a>(mounts: &MountTable, path: &'a str) -> Option<Resolved<'a>> {
    let mut best: Option<(MountIndex, usize)> = None;

    for (index, mount) in mounts.iter() {
        let name = mount.name();
        let matched = prefix_match(name, path);
        if matched == 0 || matched != name.len() {
            continue;
        }
        match path.as_bytes().get(matched) {
            None | Some(&SEPARATOR) => {}
            Some(_) => continue,
        }

        match best {
            Some((_, len)) if len == matched => fault(Fault::DuplicateMount { name }),
            Some((_, len)) if len > matched => {}
            _ => best = Some((index, matched)),
        }
    }

    best.map(|(index, offset)| Resolved { index, path, offset })
}
