// ============================================================================
// src/fs/mount.rs - Mount Table
// ============================================================================
//!
//! Static registry of backend mounts.
//!
//! Mounts are registered once during initialization from a compiled-in list.
//! Each carries a unique name prefix, a device number drawn from a counter
//! that restarts at 1 on every [`MountTable::reset`], the family whose
//! capability table serves it, its superblock slot and its superblock op set.

use alloc::vec::Vec;
use core::fmt;

use super::ops::FsFamily;
use super::superblock::SbOpsId;
use crate::config::NR_FS;
use crate::error::{Fault, MountError, fault};

/// Index of a mount slot (Newtype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct MountIndex(usize);

impl MountIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MountIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mount device number; always positive once assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct DevNr(u32);

impl DevNr {
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// A registered mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mount {
    name: &'static str,
    dev_nr: DevNr,
    family: FsFamily,
    superblock: usize,
    sb_ops: SbOpsId,
}

impl Mount {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dev_nr(&self) -> DevNr {
        self.dev_nr
    }

    pub fn family(&self) -> FsFamily {
        self.family
    }

    /// Slot in the superblock table owned by this mount
    pub fn superblock_slot(&self) -> usize {
        self.superblock
    }

    pub fn sb_ops(&self) -> SbOpsId {
        self.sb_ops
    }
}

/// Fixed-size mount table
#[derive(Debug, Clone)]
pub struct MountTable {
    slots: Vec<Option<Mount>>,
    dev_nr_counter: u32,
}

impl MountTable {
    pub fn new() -> Self {
        Self::with_capacity(NR_FS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, None);
        Self {
            slots,
            dev_nr_counter: 0,
        }
    }

    /// Empty every slot and restart device numbering
    pub fn reset(&mut self) {
        self.slots.fill(None);
        self.dev_nr_counter = 0;
    }

    fn next_dev_nr(&mut self) -> DevNr {
        match self.dev_nr_counter.checked_add(1) {
            Some(nr) => {
                self.dev_nr_counter = nr;
                DevNr(nr)
            }
            None => fault(Fault::DeviceNumberOverflow),
        }
    }

    /// Register a mount in the first free slot; returns the slot and its entry
    ///
    /// Names must start with `/`, must not end with `/`, and must be unique.
    /// The mount's superblock slot is its own table index.
    pub fn register(
        &mut self,
        name: &'static str,
        family: FsFamily,
        sb_ops: SbOpsId,
    ) -> Result<(MountIndex, Mount), MountError> {
        if !name.starts_with('/') || name.ends_with('/') {
            return Err(MountError::InvalidName(name));
        }
        if self.find(name).is_some() {
            return Err(MountError::DuplicateName(name));
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(MountError::TableFull(name))?;

        let mount = Mount {
            name,
            dev_nr: self.next_dev_nr(),
            family,
            superblock: index,
            sb_ops,
        };
        self.slots[index] = Some(mount);
        Ok((MountIndex(index), mount))
    }

    pub fn get(&self, index: MountIndex) -> Option<&Mount> {
        self.slots.get(index.0).and_then(Option::as_ref)
    }

    /// Mount registered under exactly `name`
    pub fn find(&self, name: &str) -> Option<MountIndex> {
        self.iter().find(|(_, m)| m.name == name).map(|(i, _)| i)
    }

    /// Registered mounts in slot order, skipping empty slots
    pub fn iter(&self) -> impl Iterator<Item = (MountIndex, &Mount)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|m| (MountIndex(i), m)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}
