// ============================================================================
// src/fs/fd.rs - Descriptor-to-Mount Linkage
// ============================================================================
//!
//! The process subsystem owns the descriptor array; the switch only adds the
//! owning-mount field to each slot. [`DescriptorTable`] is the contract the
//! switch and the backends rely on, [`FdTable`] a fixed-size per-process table
//! implementing it.
//!
//! Descriptor numbers are per process, so a backend never keys its open files
//! by [`Fd`]. It hands out a [`FileHandle`] at open and parks it in the slot;
//! later calls look the handle up through the caller's table.

use alloc::vec::Vec;
use core::fmt;

use super::mount::MountIndex;
use super::ops::Fd;
use crate::config::NR_FILES;

/// Open-file identity issued by a backend, unique within that backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct FileHandle(u64);

impl FileHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-process descriptor array as seen by the switch and the backends
pub trait DescriptorTable {
    /// Claim a free slot; `None` when the table is full
    fn allocate(&mut self) -> Option<Fd>;

    /// Free a slot, dropping its owning-mount field with it
    fn release(&mut self, fd: Fd);

    fn is_open(&self, fd: Fd) -> bool;

    /// Owning mount recorded at open
    fn owner(&self, fd: Fd) -> Option<MountIndex>;

    /// Record the owning mount; written by the switch only
    fn set_owner(&mut self, fd: Fd, mount: MountIndex);

    /// Backend open-file handle parked in the slot
    fn handle(&self, fd: Fd) -> Option<FileHandle>;

    /// Park the backend's handle; written by the backend at open
    fn set_handle(&mut self, fd: Fd, handle: FileHandle);
}

/// One open descriptor slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileDesc {
    owner: Option<MountIndex>,
    handle: Option<FileHandle>,
}

impl FileDesc {
    pub fn owner(&self) -> Option<MountIndex> {
        self.owner
    }

    pub fn handle(&self) -> Option<FileHandle> {
        self.handle
    }
}

/// Fixed-size descriptor table of one process
#[derive(Debug, Clone)]
pub struct FdTable {
    slots: Vec<Option<FileDesc>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self::with_capacity(NR_FILES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of open descriptors
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn slot(&self, fd: Fd) -> Option<&FileDesc> {
        self.slots.get(fd.as_usize()).and_then(Option::as_ref)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorTable for FdTable {
    fn allocate(&mut self) -> Option<Fd> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(FileDesc::default());
        Some(Fd::new(index))
    }

    fn release(&mut self, fd: Fd) {
        if let Some(slot) = self.slots.get_mut(fd.as_usize()) {
            *slot = None;
        }
    }

    fn is_open(&self, fd: Fd) -> bool {
        self.slot(fd).is_some()
    }

    fn owner(&self, fd: Fd) -> Option<MountIndex> {
        self.slot(fd).and_then(FileDesc::owner)
    }

    fn set_owner(&mut self, fd: Fd, mount: MountIndex) {
        match self.slots.get_mut(fd.as_usize()) {
            Some(Some(desc)) => desc.owner = Some(mount),
            _ => log::warn!("[fd] set_owner on closed descriptor {}", fd),
        }
    }

    fn handle(&self, fd: Fd) -> Option<FileHandle> {
        self.slot(fd).and_then(FileDesc::handle)
    }

    fn set_handle(&mut self, fd: Fd, handle: FileHandle) {
        match self.slots.get_mut(fd.as_usize()) {
            Some(Some(desc)) => desc.handle = Some(handle),
            _ => log::warn!("[fd] set_handle on closed descriptor {}", fd),
        }
    }
}
