//! tty - Terminal Backend
//!
//! 端末デバイスファミリーの参照実装。
//! マウントポイント自体をデバイス名（先頭の `/` なし）で開く。
//! 出力はメモリに蓄積し、入力はテスト/ドライバ側から注入する。

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use super::fd::{DescriptorTable, FileHandle};
use super::ops::{Capabilities, Fd, FileOps, OpenFlags, Whence};
use crate::error::{Errno, VfsResult};

/// 端末一台分のバッファ
#[derive(Debug, Default)]
struct Terminal {
    /// 書き込まれた出力
    output: Vec<u8>,
    /// 読み出し待ちの入力
    input: VecDeque<u8>,
    /// オープン中のハンドル数
    opened: usize,
}

struct TtyState {
    terminals: BTreeMap<String, Terminal>,
    /// オープンハンドル → 端末名
    handles: HashMap<FileHandle, String>,
    next_handle: u64,
}

/// 端末ファミリーの操作テーブル
pub struct TtyFs {
    state: Mutex<TtyState>,
}

impl TtyFs {
    /// 端末名（`dev_tty0` など）の一覧から作成
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let terminals = names
            .into_iter()
            .map(|name| (name.to_string(), Terminal::default()))
            .collect();
        Self {
            state: Mutex::new(TtyState {
                terminals,
                handles: HashMap::new(),
                next_handle: 0,
            }),
        }
    }

    /// キーボード入力を注入
    pub fn push_input(&self, name: &str, data: &[u8]) -> bool {
        match self.state.lock().terminals.get_mut(name) {
            Some(term) => {
                term.input.extend(data.iter().copied());
                true
            }
            None => false,
        }
    }

    /// 蓄積された出力を取り出す
    pub fn take_output(&self, name: &str) -> Vec<u8> {
        self.state
            .lock()
            .terminals
            .get_mut(name)
            .map(|term| core::mem::take(&mut term.output))
            .unwrap_or_default()
    }

    /// 端末のオープン中ハンドル数
    pub fn open_count(&self, name: &str) -> usize {
        self.state.lock().terminals.get(name).map_or(0, |t| t.opened)
    }
}

impl TtyState {
    fn terminal_of(&mut self, fds: &dyn DescriptorTable, fd: Fd) -> VfsResult<&mut Terminal> {
        let handle = fds.handle(fd).ok_or(Errno::EBADF)?;
        let name = self.handles.get(&handle).ok_or(Errno::EBADF)?;
        Ok(self.terminals.get_mut(name).ok_or(Errno::EBADF)?)
    }
}

impl FileOps for TtyFs {
    fn name(&self) -> &str {
        "tty"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FILE_IO | Capabilities::UNLINK
    }

    fn open(&self, fds: &mut dyn DescriptorTable, path: &str, _flags: OpenFlags) -> VfsResult<Fd> {
        let mut state = self.state.lock();
        let term = state.terminals.get_mut(path).ok_or(Errno::ENOENT)?;
        let fd = fds.allocate().ok_or(Errno::EMFILE)?;
        term.opened += 1;

        let handle = FileHandle::new(state.next_handle);
        state.next_handle += 1;
        state.handles.insert(handle, path.to_string());
        fds.set_handle(fd, handle);
        log::trace!("[tty] open {} -> fd {} ({})", path, fd, handle);
        Ok(fd)
    }

    fn close(&self, fds: &mut dyn DescriptorTable, fd: Fd) -> VfsResult<()> {
        let handle = fds.handle(fd).ok_or(Errno::EBADF)?;
        let mut state = self.state.lock();
        let name = state.handles.remove(&handle).ok_or(Errno::EBADF)?;
        if let Some(term) = state.terminals.get_mut(&name) {
            term.opened = term.opened.saturating_sub(1);
        }
        fds.release(fd);
        Ok(())
    }

    /// 入力キューから読めるだけ読む（空なら0）
    fn read(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &mut [u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        let term = state.terminal_of(fds, fd)?;
        let n = buf.len().min(term.input.len());
        for (dst, src) in buf.iter_mut().zip(term.input.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&self, fds: &dyn DescriptorTable, fd: Fd, buf: &[u8]) -> VfsResult<usize> {
        let mut state = self.state.lock();
        state.terminal_of(fds, fd)?.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn seek(
        &self,
        fds: &dyn DescriptorTable,
        fd: Fd,
        _offset: i64,
        _whence: Whence,
    ) -> VfsResult<u64> {
        self.state.lock().terminal_of(fds, fd)?;
        Err(Errno::ESPIPE.into())
    }

    /// 端末は削除できない
    fn unlink(&self, _path: &str) -> VfsResult<()> {
        Err(Errno::EACCES.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use crate::fs::fd::FdTable;

    fn ttys() -> TtyFs {
        TtyFs::new(["dev_tty0", "dev_tty1"])
    }

    #[test]
    fn test_open_by_bare_name() {
        let tty = ttys();
        let mut fds = FdTable::new();
        let fd = tty.open(&mut fds, "dev_tty1", OpenFlags::RDWR).unwrap();
        assert!(fds.is_open(fd));
        assert_eq!(tty.open_count("dev_tty1"), 1);

        assert_eq!(
            tty.open(&mut fds, "/dev_tty1", OpenFlags::RDWR),
            Err(VfsError::Backend(Errno::ENOENT))
        );
        assert_eq!(
            tty.open(&mut fds, "dev_tty9", OpenFlags::RDWR),
            Err(VfsError::Backend(Errno::ENOENT))
        );
    }

    #[test]
    fn test_descriptor_exhaustion() {
        let tty = ttys();
        let mut fds = FdTable::with_capacity(1);
        tty.open(&mut fds, "dev_tty0", OpenFlags::RDWR).unwrap();
        assert_eq!(
            tty.open(&mut fds, "dev_tty0", OpenFlags::RDWR),
            Err(VfsError::Backend(Errno::EMFILE))
        );
        assert_eq!(tty.open_count("dev_tty0"), 1);
    }

    #[test]
    fn test_write_then_take_output() {
        let tty = ttys();
        let mut fds = FdTable::new();
        let fd = tty.open(&mut fds, "dev_tty0", OpenFlags::RDWR).unwrap();
        assert_eq!(tty.write(&fds, fd, b"hello "), Ok(6));
        assert_eq!(tty.write(&fds, fd, b"world"), Ok(5));
        assert_eq!(tty.take_output("dev_tty0"), b"hello world");
        assert!(tty.take_output("dev_tty0").is_empty());
        assert!(tty.take_output("dev_tty1").is_empty());
    }

    #[test]
    fn test_read_drains_input() {
        let tty = ttys();
        let mut fds = FdTable::new();
        let fd = tty.open(&mut fds, "dev_tty0", OpenFlags::RDWR).unwrap();
        assert!(tty.push_input("dev_tty0", b"ls\n"));
        assert!(!tty.push_input("nope", b"x"));

        let mut buf = [0u8; 2];
        assert_eq!(tty.read(&fds, fd, &mut buf), Ok(2));
        assert_eq!(&buf, b"ls");
        assert_eq!(tty.read(&fds, fd, &mut buf), Ok(1));
        assert_eq!(buf[0], b'\n');
        assert_eq!(tty.read(&fds, fd, &mut buf), Ok(0));
    }

    #[test]
    fn test_seek_and_unlink_rejected() {
        let tty = ttys();
        let mut fds = FdTable::new();
        let fd = tty.open(&mut fds, "dev_tty0", OpenFlags::RDWR).unwrap();
        assert_eq!(tty.seek(&fds, fd, 0, Whence::Set), Err(VfsError::Backend(Errno::ESPIPE)));
        assert_eq!(
            tty.seek(&fds, Fd::new(40), 0, Whence::Set),
            Err(VfsError::Backend(Errno::EBADF))
        );
        assert_eq!(tty.unlink("dev_tty0"), Err(VfsError::Backend(Errno::EACCES)));
    }

    #[test]
    fn test_same_fd_in_two_tables() {
        let tty = ttys();
        let mut p1 = FdTable::new();
        let mut p2 = FdTable::new();
        let fd1 = tty.open(&mut p1, "dev_tty0", OpenFlags::RDWR).unwrap();
        let fd2 = tty.open(&mut p2, "dev_tty1", OpenFlags::RDWR).unwrap();
        assert_eq!(fd1, fd2);

        tty.write(&p1, fd1, b"one").unwrap();
        tty.write(&p2, fd2, b"two").unwrap();
        assert_eq!(tty.take_output("dev_tty0"), b"one");
        assert_eq!(tty.take_output("dev_tty1"), b"two");

        tty.close(&mut p1, fd1).unwrap();
        assert_eq!(tty.write(&p2, fd2, b"!"), Ok(1));
        assert_eq!(tty.open_count("dev_tty1"), 1);
    }

    #[test]
    fn test_close_releases_slot() {
        let tty = ttys();
        let mut fds = FdTable::new();
        let fd = tty.open(&mut fds, "dev_tty0", OpenFlags::RDWR).unwrap();
        tty.close(&mut fds, fd).unwrap();
        assert!(!fds.is_open(fd));
        assert_eq!(tty.open_count("dev_tty0"), 0);
        assert_eq!(tty.close(&mut fds, fd), Err(VfsError::Backend(Errno::EBADF)));
        assert_eq!(tty.write(&fds, fd, b"x"), Err(VfsError::Backend(Errno::EBADF)));
    }
}
