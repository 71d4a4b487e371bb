// ============================================================================
// src/fs/fat.rs - FAT Family Backend
// ============================================================================
//!
//! In-memory stand-in for the FAT family driver.
//!
//! Hierarchical namespace rooted at the mount point. Files are removed with
//! `delete` only; the family has no unlink slot.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use super::fd::{DescriptorTable, FileHandle};
use super::ops::{Capabilities, Fd, FileOps, OpenFlags, Whence};
use crate::config::MAX_FILE_SIZE;
use crate::error::{Errno, VfsResult};

#[derive(Debug)]
enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

#[derive(Debug, Clone)]
struct Handle {
    /// Absolute components from the root
    path: Vec<String>,
    pos: u64,
}

struct FatState {
    root: Node,
    handles: HashMap<FileHandle, Handle>,
    next_handle: u64,
}

/// Split a mount-relative path into components
///
/// The bare mount name handed to `open` on the mount point has no leading
/// `/` and names the root.
fn components(path: &str) -> Vec<&str> {
    match path.strip_prefix('/') {
        Some(rest) => rest.split('/').filter(|c| !c.is_empty()).collect(),
        None => Vec::new(),
    }
}

impl FatState {
    fn lookup(&self, parts: &[&str]) -> VfsResult<&Node> {
        let mut node = &self.root;
        for part in parts {
            node = match node {
                Node::Dir(children) => children.get(*part).ok_or(Errno::ENOENT)?,
                Node::File(_) => return Err(Errno::ENOTDIR.into()),
            };
        }
        Ok(node)
    }

    fn lookup_mut(&mut self, parts: &[&str]) -> VfsResult<&mut Node> {
        let mut node = &mut self.root;
        for part in parts {
            node = match node {
                Node::Dir(children) => children.get_mut(*part).ok_or(Errno::ENOENT)?,
                Node::File(_) => return Err(Errno::ENOTDIR.into()),
            };
        }
        Ok(node)
    }

    /// Children of the parent directory plus the final name
    fn parent_mut<'p>(
        &mut self,
        parts: &[&'p str],
    ) -> VfsResult<(&mut BTreeMap<String, Node>, &'p str)> {
        let (name, dirs) = parts.split_last().ok_or(Errno::EINVAL)?;
        match self.lookup_mut(dirs)? {
            Node::Dir(children) => Ok((children, *name)),
            Node::File(_) => Err(Errno::ENOTDIR.into()),
        }
    }

    /// Whether any descriptor is open on `parts` or below it
    fn is_busy(&self, parts: &[&str]) -> bool {
        self.handles.values().any(|h| {
            h.path.len() >= parts.len() && h.path.iter().zip(parts).all(|(a, b)| a == b)
        })
    }

    fn insert(&mut self, parts: &[&str], node: Node) -> VfsResult<()> {
        let (children, name) = self.parent_mut(parts)?;
        if children.contains_key(name) {
            return Err(Errno::EEXIST.into());
        }
        children.insert(name.to_string(), node);
        Ok(())
    }

    fn file_of(
        &mut self,
        fds: &dyn DescriptorTable,
        fd: Fd,
    ) -> VfsResult<(&mut Handle, &mut Vec<u8>)> {
        let id = fds.handle(fd).ok_or(Errno::EBADF)?;
        let FatState { root, handles, .. } = self;
        let handle = handles.get_mut(&id).ok_or(Errno::EBADF)?;
        let mut node = root;
        for part in &handle.path {
            node = match node {
                Node::Dir(children) => children.get_mut(part).ok_or(Errno::EIO)?,
                Node::File(_) => return Err(Errno::EIO.into()),
            };
        }
        match node {
            Node::File(data) => Ok((handle, data)),
            Node::Dir(_) => Err(Errno::EISDIR.into()),
        }
    }
}

/// FAT family capability table
pub struct FatFs {
    state: Mutex<FatState>,
}

impl FatFs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FatState {
                root: Node::Dir(BTreeMap::new()),
                handles: HashMap::new(),
                next_handle: 0,
            }),
        }
    }

    /// Entry names of a directory, sorted
    pub fn list(&self, path: &str) -> VfsResult<Vec<String>> {
        let state = self.state.lock();
        match state.lookup(&components(path))? {
            Node::Dir(children) => Ok(children.keys().cloned().collect()),
            Node::File(_) => Err(Errno::ENOTDIR.into()),
        }
    }

    /// Copy of a file's contents
    pub fn contents(&self, path: &str) -> VfsResult<Vec<u8>> {
        let state = self.state.lock();
        match state.lookup(&components(path))? {
            Node::File(data) => Ok(data.clone()),
            Node::Dir(_) => Err(Errno::EISDIR.into()),
        }
    }
}

impl Default for FatFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOps for FatFs {
    fn name(&self) -> &str {
        "fat32"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FILE_IO | Capabilities::DIRECTORIES
    }

    fn open(&self, fds: &mut dyn DescriptorTable, path: &str, flags: OpenFlags) -> VfsResult<Fd> {
        let parts = components(path);
        let mut state = self.state.lock();

        match state.lookup_mut(&parts) {
            Ok(Node::File(data)) => {
                if flags.contains(OpenFlags::TRUNC) {
                    data.clear();
                }
            }
            Ok(Node::Dir(_)) => return Err(Errno::EISDIR.into()),
            Err(_) if flags.contains(OpenFlags::CREATE) && !parts.is_empty() => {
                state.insert(&parts, Node::File(Vec::new()))?;
            }
            Err(err) => return Err(err),
        }

        let fd = fds.allocate().ok_or(Errno::EMFILE)?;
        let id = FileHandle::new(state.next_handle);
        state.next_handle += 1;
        let path = parts.iter().map(|p| p.to_string()).collect();
        state.handles.insert(id, Handle { path, pos: 0 });
        fds.set_handle(fd, id);
        Ok(fd)
    }

    fn close(&self, fds: &mut dyn DescriptorTable, fd: Fd) -> VfsResult<()> {
        let id = fds.handle(fd).ok_or(Errno::EBADF)?;
        self.state.lock().handles.remove(&id).ok_or(Errno::EBADF)?;
        fds.release(fd);
        Ok(())
    }

    fn read(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &mut [u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        let (handle, data) = state.file_of(fds, fd)?;

        let start = usize::try_from(handle.pos).map_or(data.len(), |pos| pos.min(data.len()));
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        handle.pos += len as u64;
        Ok(len)
    }

    /// Positional write; growing past `MAX_FILE_SIZE` is `EFBIG`
    fn write(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &[u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        let (handle, data) = state.file_of(fds, fd)?;

        let start = usize::try_from(handle.pos).map_err(|_| Errno::EFBIG)?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or(Errno::EFBIG)?;
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        handle.pos = end as u64;
        Ok(buf.len())
    }

    fn seek(
        &self,
        fds: &dyn DescriptorTable,
        fd: Fd,
        offset: i64,
        whence: Whence,
    ) -> VfsResult<u64> {
        let mut state = self.state.lock();
        let (handle, data) = state.file_of(fds, fd)?;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => i64::try_from(handle.pos).map_err(|_| Errno::EINVAL)?,
            Whence::End => i64::try_from(data.len()).map_err(|_| Errno::EINVAL)?,
        };
        let pos = base.checked_add(offset).filter(|p| *p >= 0).ok_or(Errno::EINVAL)?;
        handle.pos = pos as u64;
        Ok(handle.pos)
    }

    fn create(&self, path: &str) -> VfsResult<()> {
        self.state.lock().insert(&components(path), Node::File(Vec::new()))
    }

    fn delete(&self, path: &str) -> VfsResult<()> {
        let parts = components(path);
        let mut state = self.state.lock();
        if let Node::Dir(_) = state.lookup(&parts)? {
            return Err(Errno::EISDIR.into());
        }
        if state.is_busy(&parts) {
            return Err(Errno::EBUSY.into());
        }
        let (children, name) = state.parent_mut(&parts)?;
        children.remove(name);
        Ok(())
    }

    fn open_dir(&self, path: &str) -> VfsResult<usize> {
        let state = self.state.lock();
        match state.lookup(&components(path))? {
            Node::Dir(children) => Ok(children.len()),
            Node::File(_) => Err(Errno::ENOTDIR.into()),
        }
    }

    fn create_dir(&self, path: &str) -> VfsResult<()> {
        self.state.lock().insert(&components(path), Node::Dir(BTreeMap::new()))
    }

    fn delete_dir(&self, path: &str) -> VfsResult<()> {
        let parts = components(path);
        if parts.is_empty() {
            return Err(Errno::EINVAL.into());
        }
        let mut state = self.state.lock();
        match state.lookup(&parts)? {
            Node::File(_) => return Err(Errno::ENOTDIR.into()),
            Node::Dir(children) if !children.is_empty() => return Err(Errno::ENOTEMPTY.into()),
            Node::Dir(_) => {}
        }
        let (children, name) = state.parent_mut(&parts)?;
        children.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use crate::fs::fd::FdTable;
    use crate::fs::ops::Op;

    fn err(e: Errno) -> VfsError {
        VfsError::Backend(e)
    }

    #[test]
    fn test_create_and_list() {
        let fat = FatFs::new();
        fat.create_dir("/docs").unwrap();
        fat.create("/docs/a.txt").unwrap();
        fat.create("/readme").unwrap();

        assert_eq!(fat.list("").unwrap(), ["docs", "readme"]);
        assert_eq!(fat.list("/docs").unwrap(), ["a.txt"]);
        assert_eq!(fat.open_dir(""), Ok(2));
        assert_eq!(fat.open_dir("/docs"), Ok(1));
        assert_eq!(fat.create("/readme"), Err(err(Errno::EEXIST)));
        assert_eq!(fat.create("/nodir/x"), Err(err(Errno::ENOENT)));
        assert_eq!(fat.create("/readme/x"), Err(err(Errno::ENOTDIR)));
    }

    #[test]
    fn test_open_and_io() {
        let fat = FatFs::new();
        let mut fds = FdTable::new();
        assert_eq!(fat.open(&mut fds, "/log", OpenFlags::RDWR), Err(err(Errno::ENOENT)));

        let fd = fat.open(&mut fds, "/log", OpenFlags::CREATE).unwrap();
        assert_eq!(fat.write(&fds, fd, b"hello"), Ok(5));
        assert_eq!(fat.seek(&fds, fd, 0, Whence::Set), Ok(0));
        let mut buf = [0u8; 16];
        assert_eq!(fat.read(&fds, fd, &mut buf), Ok(5));
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(fat.seek(&fds, fd, 2, Whence::End), Ok(7));
        assert_eq!(fat.read(&fds, fd, &mut buf), Ok(0));
        fat.close(&mut fds, fd).unwrap();
        assert_eq!(fat.contents("/log").unwrap(), b"hello");
    }

    #[test]
    fn test_write_past_size_limit() {
        let fat = FatFs::new();
        let mut fds = FdTable::new();
        let fd = fat.open(&mut fds, "/big", OpenFlags::CREATE).unwrap();

        fat.seek(&fds, fd, i64::MAX, Whence::Set).unwrap();
        assert_eq!(fat.write(&fds, fd, b"x"), Err(err(Errno::EFBIG)));
        assert_eq!(fat.seek(&fds, fd, 1, Whence::Cur), Err(err(Errno::EINVAL)));

        fat.seek(&fds, fd, MAX_FILE_SIZE as i64, Whence::Set).unwrap();
        assert_eq!(fat.write(&fds, fd, b"x"), Err(err(Errno::EFBIG)));
        assert_eq!(fat.write(&fds, fd, b""), Ok(0));
        assert_eq!(fat.contents("/big").unwrap().len(), MAX_FILE_SIZE);
    }

    #[test]
    fn test_same_fd_in_two_tables() {
        let fat = FatFs::new();
        let mut p1 = FdTable::new();
        let mut p2 = FdTable::new();
        let fd1 = fat.open(&mut p1, "/a", OpenFlags::CREATE).unwrap();
        let fd2 = fat.open(&mut p2, "/b", OpenFlags::CREATE).unwrap();
        assert_eq!(fd1, fd2);

        fat.write(&p1, fd1, b"from p1").unwrap();
        assert_eq!(fat.contents("/a").unwrap(), b"from p1");
        assert_eq!(fat.contents("/b").unwrap(), b"");

        fat.close(&mut p2, fd2).unwrap();
        assert_eq!(fat.delete("/b"), Ok(()));
        assert_eq!(fat.delete("/a"), Err(err(Errno::EBUSY)));
    }

    #[test]
    fn test_open_directory_rejected() {
        let fat = FatFs::new();
        let mut fds = FdTable::new();
        fat.create_dir("/d").unwrap();
        assert_eq!(fat.open(&mut fds, "/d", OpenFlags::RDWR), Err(err(Errno::EISDIR)));
        assert_eq!(fat.open(&mut fds, "fat0", OpenFlags::CREATE), Err(err(Errno::EISDIR)));
        assert_eq!(fds.open_count(), 0);
    }

    #[test]
    fn test_delete_rules() {
        let fat = FatFs::new();
        let mut fds = FdTable::new();
        fat.create_dir("/d").unwrap();
        let fd = fat.open(&mut fds, "/d/f", OpenFlags::CREATE).unwrap();

        assert_eq!(fat.delete("/d"), Err(err(Errno::EISDIR)));
        assert_eq!(fat.delete("/d/f"), Err(err(Errno::EBUSY)));
        fat.close(&mut fds, fd).unwrap();
        assert_eq!(fat.delete("/d/f"), Ok(()));
        assert_eq!(fat.delete("/d/f"), Err(err(Errno::ENOENT)));
    }

    #[test]
    fn test_delete_dir_rules() {
        let fat = FatFs::new();
        fat.create_dir("/d").unwrap();
        fat.create("/d/f").unwrap();

        assert_eq!(fat.delete_dir("/d"), Err(err(Errno::ENOTEMPTY)));
        assert_eq!(fat.delete_dir("/d/f"), Err(err(Errno::ENOTDIR)));
        assert_eq!(fat.delete_dir(""), Err(err(Errno::EINVAL)));
        fat.delete("/d/f").unwrap();
        assert_eq!(fat.delete_dir("/d"), Ok(()));
        assert_eq!(fat.open_dir("/d"), Err(err(Errno::ENOENT)));
    }

    #[test]
    fn test_no_unlink_slot() {
        let fat = FatFs::new();
        assert!(!fat.capabilities().supports(Op::Unlink));
        assert_eq!(fat.unlink("/x"), Err(VfsError::Unsupported(Op::Unlink)));
    }
}
