//! flatfs - Flat Disk Filesystem
//!
//! 独自ディスクFSファミリーのインメモリ参照実装。
//! 名前空間はフラット（ディレクトリなし）で、`/name` の形のパスのみ扱う。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use super::fd::{DescriptorTable, FileHandle};
use super::ops::{Capabilities, Fd, FileOps, OpenFlags, Whence};
use crate::config::MAX_FILE_SIZE;
use crate::error::{Errno, VfsResult};

/// オープン中のファイル
#[derive(Debug, Clone)]
struct Handle {
    name: String,
    pos: u64,
}

#[derive(Default)]
struct FlatState {
    files: BTreeMap<String, Vec<u8>>,
    handles: HashMap<FileHandle, Handle>,
    next_handle: u64,
}

impl FlatState {
    fn is_open(&self, name: &str) -> bool {
        self.handles.values().any(|h| h.name == name)
    }

    /// ディスクリプタに対応するハンドルとファイル内容
    fn file_of(
        &mut self,
        fds: &dyn DescriptorTable,
        fd: Fd,
    ) -> VfsResult<(&mut Handle, &mut Vec<u8>)> {
        let id = fds.handle(fd).ok_or(Errno::EBADF)?;
        let FlatState { files, handles, .. } = self;
        let handle = handles.get_mut(&id).ok_or(Errno::EBADF)?;
        let content = files.get_mut(&handle.name).ok_or(Errno::EIO)?;
        Ok((handle, content))
    }
}

/// フラットなファイル名前空間
pub struct FlatFs {
    state: Mutex<FlatState>,
}

/// マウント相対パスをファイル名に変換
///
/// マウントポイント自体（先頭 `/` なし）はディレクトリ扱い。
fn file_name(path: &str) -> VfsResult<&str> {
    let name = path.strip_prefix('/').ok_or(Errno::EISDIR)?;
    if name.is_empty() || name.contains('/') {
        return Err(Errno::EINVAL.into());
    }
    Ok(name)
}

impl FlatFs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlatState::default()),
        }
    }

    /// ファイル内容のコピー
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(name).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }
}

impl Default for FlatFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOps for FlatFs {
    fn name(&self) -> &str {
        "orange"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FILE_IO | Capabilities::UNLINK
    }

    fn open(&self, fds: &mut dyn DescriptorTable, path: &str, flags: OpenFlags) -> VfsResult<Fd> {
        let name = file_name(path)?;
        let mut state = self.state.lock();

        if let Some(data) = state.files.get_mut(name) {
            if flags.contains(OpenFlags::TRUNC) {
                data.clear();
            }
        } else if flags.contains(OpenFlags::CREATE) {
            state.files.insert(name.to_string(), Vec::new());
            log::debug!("[orange] created {}", name);
        } else {
            return Err(Errno::ENOENT.into());
        }

        let fd = fds.allocate().ok_or(Errno::EMFILE)?;
        let id = FileHandle::new(state.next_handle);
        state.next_handle += 1;
        state.handles.insert(
            id,
            Handle {
                name: name.to_string(),
                pos: 0,
            },
        );
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
        let (handle, content) = state.file_of(fds, fd)?;

        let start = match usize::try_from(handle.pos) {
            Ok(start) if start < content.len() => start,
            _ => return Ok(0),
        };
        let end = core::cmp::min(start + buf.len(), content.len());
        let len = end - start;

        buf[..len].copy_from_slice(&content[start..end]);
        handle.pos += len as u64;
        Ok(len)
    }

    fn write(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &[u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        let (handle, content) = state.file_of(fds, fd)?;

        let start = usize::try_from(handle.pos).map_err(|_| Errno::EFBIG)?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or(Errno::EFBIG)?;
        // 必要に応じて拡張（穴はゼロ埋め）
        if end > content.len() {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(buf);
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
        let (handle, content) = state.file_of(fds, fd)?;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => i64::try_from(handle.pos).map_err(|_| Errno::EINVAL)?,
            Whence::End => i64::try_from(content.len()).map_err(|_| Errno::EINVAL)?,
        };
        let pos = base.checked_add(offset).filter(|p| *p >= 0).ok_or(Errno::EINVAL)?;
        handle.pos = pos as u64;
        Ok(handle.pos)
    }

    /// 開かれていないファイルを削除
    fn unlink(&self, path: &str) -> VfsResult<()> {
        let name = file_name(path)?;
        let mut state = self.state.lock();
        if !state.files.contains_key(name) {
            return Err(Errno::ENOENT.into());
        }
        if state.is_open(name) {
            return Err(Errno::EBUSY.into());
        }
        state.files.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use crate::fs::fd::FdTable;

    fn backend(e: Errno) -> VfsResult<Fd> {
        Err(VfsError::Backend(e))
    }

    #[test]
    fn test_open_requires_create() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        assert_eq!(fs.open(&mut fds, "/log", OpenFlags::RDWR), backend(Errno::ENOENT));

        let fd = fs.open(&mut fds, "/log", OpenFlags::CREATE).unwrap();
        assert!(fds.is_open(fd));
        assert_eq!(fs.file_names(), ["log"]);
    }

    #[test]
    fn test_path_shapes() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        assert_eq!(fs.open(&mut fds, "orange", OpenFlags::CREATE), backend(Errno::EISDIR));
        assert_eq!(fs.open(&mut fds, "/a/b", OpenFlags::CREATE), backend(Errno::EINVAL));
        assert_eq!(fs.open(&mut fds, "/", OpenFlags::CREATE), backend(Errno::EINVAL));
        assert_eq!(fds.open_count(), 0);
    }

    #[test]
    fn test_positional_io() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        let fd = fs.open(&mut fds, "/f", OpenFlags::CREATE).unwrap();

        assert_eq!(fs.write(&fds, fd, b"abcdef"), Ok(6));
        assert_eq!(fs.seek(&fds, fd, 2, Whence::Set), Ok(2));
        assert_eq!(fs.write(&fds, fd, b"XY"), Ok(2));
        assert_eq!(fs.contents("f").unwrap(), b"abXYef");

        assert_eq!(fs.seek(&fds, fd, -1, Whence::End), Ok(5));
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(&fds, fd, &mut buf), Ok(1));
        assert_eq!(buf[0], b'f');
        assert_eq!(fs.read(&fds, fd, &mut buf), Ok(0));

        assert_eq!(fs.seek(&fds, fd, -2, Whence::Cur), Ok(4));
        assert_eq!(fs.seek(&fds, fd, -10, Whence::Cur), Err(VfsError::Backend(Errno::EINVAL)));
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        let fd = fs.open(&mut fds, "/sparse", OpenFlags::CREATE).unwrap();
        fs.seek(&fds, fd, 3, Whence::Set).unwrap();
        fs.write(&fds, fd, b"z").unwrap();
        assert_eq!(fs.contents("sparse").unwrap(), [0, 0, 0, b'z']);
    }

    #[test]
    fn test_write_beyond_size_limit() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        let fd = fs.open(&mut fds, "/huge", OpenFlags::CREATE).unwrap();

        assert_eq!(fs.seek(&fds, fd, i64::MAX, Whence::Set), Ok(i64::MAX as u64));
        assert_eq!(fs.write(&fds, fd, b"x"), Err(VfsError::Backend(Errno::EFBIG)));
        let mut buf = [0u8; 4];
        assert_eq!(fs.read(&fds, fd, &mut buf), Ok(0));

        fs.seek(&fds, fd, MAX_FILE_SIZE as i64 - 1, Whence::Set).unwrap();
        assert_eq!(fs.write(&fds, fd, b"ab"), Err(VfsError::Backend(Errno::EFBIG)));
        assert_eq!(fs.write(&fds, fd, b"a"), Ok(1));
        assert_eq!(fs.contents("huge").unwrap().len(), MAX_FILE_SIZE);
    }

    #[test]
    fn test_same_fd_in_two_tables() {
        let fs = FlatFs::new();
        let mut p1 = FdTable::new();
        let mut p2 = FdTable::new();
        let fd1 = fs.open(&mut p1, "/a", OpenFlags::CREATE).unwrap();
        let fd2 = fs.open(&mut p2, "/b", OpenFlags::CREATE).unwrap();
        assert_eq!(fd1, fd2);

        fs.write(&p1, fd1, b"from p1").unwrap();
        fs.write(&p2, fd2, b"from p2").unwrap();
        assert_eq!(fs.contents("a").unwrap(), b"from p1");
        assert_eq!(fs.contents("b").unwrap(), b"from p2");

        fs.close(&mut p1, fd1).unwrap();
        assert_eq!(fs.unlink("/a"), Ok(()));
        assert_eq!(fs.unlink("/b"), Err(VfsError::Backend(Errno::EBUSY)));
    }

    #[test]
    fn test_truncate_on_open() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        let fd = fs.open(&mut fds, "/t", OpenFlags::CREATE).unwrap();
        fs.write(&fds, fd, b"old data").unwrap();
        fs.close(&mut fds, fd).unwrap();

        fs.open(&mut fds, "/t", OpenFlags::TRUNC).unwrap();
        assert_eq!(fs.contents("t").unwrap(), b"");
    }

    #[test]
    fn test_unlink_busy_and_missing() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        let fd = fs.open(&mut fds, "/f", OpenFlags::CREATE).unwrap();

        assert_eq!(fs.unlink("/f"), Err(VfsError::Backend(Errno::EBUSY)));
        fs.close(&mut fds, fd).unwrap();
        assert_eq!(fs.unlink("/f"), Ok(()));
        assert_eq!(fs.unlink("/f"), Err(VfsError::Backend(Errno::ENOENT)));
        assert!(fs.contents("f").is_none());
    }

    #[test]
    fn test_closed_descriptor() {
        let fs = FlatFs::new();
        let mut fds = FdTable::new();
        let fd = fs.open(&mut fds, "/f", OpenFlags::CREATE).unwrap();
        fs.close(&mut fds, fd).unwrap();
        assert!(!fds.is_open(fd));
        assert_eq!(fs.write(&fds, fd, b"x"), Err(VfsError::Backend(Errno::EBADF)));
        assert_eq!(fs.close(&mut fds, fd), Err(VfsError::Backend(Errno::EBADF)));
    }
}
