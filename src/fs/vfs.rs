// ============================================================================
// src/fs/vfs.rs - Virtual Filesystem Switch
// ============================================================================
//!
//! VFS (Virtual Filesystem) switch
//!
//! ## Design
//! - Static mount table, populated once by [`Vfs::init_with`]
//! - Longest-prefix path resolution ([`super::path`])
//! - One shared capability table per backend family
//! - Every descriptor is stamped with its owning mount at open and routed by
//!   that stamp afterwards
//! - Writes are copied through a bounded staging buffer chunk by chunk

use alloc::sync::Arc;

use super::DefaultBackends;
use super::fd::DescriptorTable;
use super::mount::{Mount, MountIndex, MountTable};
use super::ops::{FileOps, Fd, FsFamily, Op, OpenFlags, Whence};
use super::path::{self, Resolved};
use super::superblock::{
    NullSuperblockOps, SbOpsId, Superblock, SuperblockOps, SuperblockTable, TableSuperblockOps,
};
use crate::config::{DEFAULT_MOUNTS, MountSpec, WRITE_CHUNK_SIZE};
use crate::error::{Fault, VfsError, VfsResult, fault};
use crate::klog::{DiagnosticSink, LogSink};

// ============================================================================
// Vfs
// ============================================================================

/// The filesystem switch
pub struct Vfs {
    mounts: MountTable,
    superblocks: SuperblockTable,
    /// Capability tables, one per family
    families: [Option<Arc<dyn FileOps>>; FsFamily::COUNT],
    /// Superblock op sets
    sb_ops: [Option<Arc<dyn SuperblockOps>>; SbOpsId::COUNT],
    sink: Arc<dyn DiagnosticSink>,
    initialized: bool,
}

impl Vfs {
    /// Create an empty switch reporting through the log
    pub fn new() -> Self {
        Self::with_sink(Arc::new(LogSink))
    }

    /// Create an empty switch with a custom diagnostic sink
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            mounts: MountTable::new(),
            superblocks: SuperblockTable::new(),
            families: [const { None }; FsFamily::COUNT],
            sb_ops: [const { None }; SbOpsId::COUNT],
            sink,
            initialized: false,
        }
    }

    /// Initialize with the boot-time mount list and fresh reference backends
    pub fn init(&mut self) -> DefaultBackends {
        let backends = DefaultBackends::new();
        self.init_with(&DEFAULT_MOUNTS, &backends.families());
        backends
    }

    /// Reset every table and register `specs` in order
    ///
    /// Device numbering restarts at 1. A duplicate, malformed or unplaceable
    /// mount, or a mount whose family has no capability table, is a fault.
    pub fn init_with(&mut self, specs: &[MountSpec], families: &[(FsFamily, Arc<dyn FileOps>)]) {
        self.initialized = false;

        self.superblocks.reset();
        self.mounts.reset();

        self.families = [const { None }; FsFamily::COUNT];
        for (family, ops) in families {
            self.families[family.index()] = Some(ops.clone());
        }

        self.sb_ops = [
            Some(Arc::new(NullSuperblockOps) as Arc<dyn SuperblockOps>),
            Some(Arc::new(TableSuperblockOps)),
        ];

        for spec in specs {
            if self.families[spec.family.index()].is_none() {
                fault(Fault::MissingFamily { name: spec.name });
            }

            let (_, mount) = self
                .mounts
                .register(spec.name, spec.family, spec.sb_ops)
                .unwrap_or_else(|err| fault(err.into()));

            let superblock = Superblock::new(spec.device, spec.fs_type);
            if !self.superblocks.set(mount.superblock_slot(), superblock) {
                fault(Fault::MountTableFull { name: spec.name });
            }

            log::debug!(
                "[vfs] mounted {} as dev {} ({})",
                spec.name,
                mount.dev_nr().as_u32(),
                spec.family.name()
            );
        }

        self.initialized = true;
        log::info!("[vfs] {} mounts ready", self.mounts.len());
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn mount(&self, index: MountIndex) -> Option<&Mount> {
        self.mounts.get(index)
    }

    /// Capability table installed for a family
    pub fn family(&self, family: FsFamily) -> Option<&Arc<dyn FileOps>> {
        self.families[family.index()].as_ref()
    }

    /// Resolve a path without dispatching
    pub fn resolve<'a>(&self, path: &'a str) -> Option<Resolved<'a>> {
        path::resolve(&self.mounts, path)
    }

    // ------------------------------------------------------------------------
    // Superblock registry
    // ------------------------------------------------------------------------
    // Populated at init and exposed here; no dispatch path reads them.

    pub fn superblocks(&self) -> &SuperblockTable {
        &self.superblocks
    }

    /// Superblock owned by a mount
    pub fn superblock(&self, index: MountIndex) -> Option<&Superblock> {
        let mount = self.mounts.get(index)?;
        self.superblocks.get(mount.superblock_slot())
    }

    /// Superblock op set wired to a mount
    pub fn superblock_ops(&self, index: MountIndex) -> Option<&Arc<dyn SuperblockOps>> {
        let mount = self.mounts.get(index)?;
        self.sb_ops[mount.sb_ops().index()].as_ref()
    }

    // ------------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------------

    fn resolve_or_report<'a>(&self, path: &'a str) -> VfsResult<Resolved<'a>> {
        match self.resolve(path) {
            Some(resolved) => Ok(resolved),
            None => {
                self.sink.report(VfsError::PathNotFound.errno(), path);
                Err(VfsError::PathNotFound)
            }
        }
    }

    /// Capability table of a mount, if its family declares `op`
    fn ops_for(&self, index: MountIndex, op: Op) -> VfsResult<&Arc<dyn FileOps>> {
        let Some(mount) = self.mounts.get(index) else {
            return Err(VfsError::PathNotFound);
        };
        let ops = match self.families[mount.family().index()].as_ref() {
            Some(ops) => ops,
            None => fault(Fault::MissingFamily { name: mount.name() }),
        };
        if !ops.capabilities().supports(op) {
            log::warn!("[vfs] {} does not support {} on {}", ops.name(), op, mount.name());
            return Err(VfsError::Unsupported(op));
        }
        log::trace!("[vfs] {} -> {} ({})", op, mount.name(), ops.name());
        Ok(ops)
    }

    /// Owning mount of an open descriptor
    fn owner_of(&self, fds: &dyn DescriptorTable, fd: Fd) -> MountIndex {
        match fds.owner(fd) {
            Some(index) if self.mounts.get(index).is_some() => index,
            _ => fault(Fault::InvalidDescriptorLinkage { fd }),
        }
    }

    fn path_op<T>(
        &self,
        op: Op,
        path: &str,
        report: bool,
        call: impl FnOnce(&dyn FileOps, &str) -> VfsResult<T>,
    ) -> VfsResult<T> {
        let resolved = self.resolve_or_report(path)?;
        let result = self
            .ops_for(resolved.index, op)
            .and_then(|ops| call(ops.as_ref(), resolved.relative()));
        if report {
            if let Err(err) = &result {
                self.sink.report(err.errno(), path);
            }
        }
        result
    }

    // ------------------------------------------------------------------------
    // Descriptor operations
    // ------------------------------------------------------------------------

    /// Open `path` and stamp the new descriptor with its owning mount
    pub fn open(
        &self,
        fds: &mut dyn DescriptorTable,
        path: &str,
        flags: OpenFlags,
    ) -> VfsResult<Fd> {
        let resolved = self.resolve_or_report(path)?;
        let ops = self.ops_for(resolved.index, Op::Open)?;

        match ops.open(fds, resolved.backend_path(), flags) {
            Ok(fd) => {
                fds.set_owner(fd, resolved.index);
                log::debug!("[vfs] open {} -> fd {} (mount {})", path, fd, resolved.index);
                Ok(fd)
            }
            Err(err) => {
                self.sink.report(err.errno(), path);
                Err(err)
            }
        }
    }

    pub fn close(&self, fds: &mut dyn DescriptorTable, fd: Fd) -> VfsResult<()> {
        let index = self.owner_of(fds, fd);
        self.ops_for(index, Op::Close)?.close(fds, fd)
    }

    pub fn read(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &mut [u8]) -> VfsResult<usize> {
        let index = self.owner_of(fds, fd);
        self.ops_for(index, Op::Read)?.read(fds, fd, buf)
    }

    /// Write `buf` through the staging buffer, one chunk at a time
    ///
    /// Returns `buf.len()` once every chunk is accepted in full. The first
    /// backend error aborts the loop and is returned as is; a short count is
    /// a fault.
    pub fn write(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &[u8]) -> VfsResult<usize> {
        let index = self.owner_of(fds, fd);
        let ops = self.ops_for(index, Op::Write)?;

        let mut staging = [0u8; WRITE_CHUNK_SIZE];
        let mut left = buf;
        while !left.is_empty() {
            let nbytes = left.len().min(WRITE_CHUNK_SIZE);
            staging[..nbytes].copy_from_slice(&left[..nbytes]);

            let written = ops.write(fds, fd, &staging[..nbytes])?;
            if written != nbytes {
                fault(Fault::ShortWrite {
                    fd,
                    requested: nbytes,
                    written,
                });
            }
            left = &left[nbytes..];
        }

        Ok(buf.len())
    }

    pub fn seek(
        &self,
        fds: &dyn DescriptorTable,
        fd: Fd,
        offset: i64,
        whence: Whence,
    ) -> VfsResult<u64> {
        let index = self.owner_of(fds, fd);
        self.ops_for(index, Op::Seek)?.seek(fds, fd, offset, whence)
    }

    // ------------------------------------------------------------------------
    // Path operations
    // ------------------------------------------------------------------------

    pub fn unlink(&self, path: &str) -> VfsResult<()> {
        self.path_op(Op::Unlink, path, false, |ops, rel| ops.unlink(rel))
    }

    pub fn create(&self, path: &str) -> VfsResult<()> {
        self.path_op(Op::Create, path, true, |ops, rel| ops.create(rel))
    }

    pub fn delete(&self, path: &str) -> VfsResult<()> {
        self.path_op(Op::Delete, path, true, |ops, rel| ops.delete(rel))
    }

    /// Open a directory; returns its entry count
    pub fn open_dir(&self, path: &str) -> VfsResult<usize> {
        self.path_op(Op::OpenDir, path, true, |ops, rel| ops.open_dir(rel))
    }

    pub fn create_dir(&self, path: &str) -> VfsResult<()> {
        self.path_op(Op::CreateDir, path, true, |ops, rel| ops.create_dir(rel))
    }

    pub fn delete_dir(&self, path: &str) -> VfsResult<()> {
        self.path_op(Op::DeleteDir, path, true, |ops, rel| ops.delete_dir(rel))
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
