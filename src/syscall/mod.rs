// ============================================================================
// src/syscall/mod.rs - Filesystem System Call Interface
// ============================================================================
//!
//! # ファイルシステム系システムコール
//!
//! ユーザー空間の引数（ポインタ・整数）をデコードしてスイッチを呼び出し、
//! 結果を非負の値または負のステータスコードとして返す。
//!
//! ## 設計原則
//! - ユーザーメモリへのアクセスは [`UserMemory`] 経由のみ
//! - 開かれていないディスクリプタは境界で `EBADF` として弾く
//!   （スイッチ内部では所有マウント欠落は致命的障害）

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{MAX_PATH, WRITE_CHUNK_SIZE};
use crate::error::{Errno, VfsError, VfsResult};
use crate::fs::{DescriptorTable, Fd, OpenFlags, Vfs, Whence};

// ============================================================================
// システムコール番号
// ============================================================================

/// システムコール番号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    Open = 20,
    Close = 21,
    Read = 22,
    Write = 23,
    Seek = 24,
    CreateDir = 27,
    DeleteDir = 28,
    Unlink = 29,
    OpenDir = 30,
    Create = 31,
    Delete = 32,
}

impl TryFrom<u64> for SyscallNumber {
    type Error = VfsError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(SyscallNumber::Open),
            21 => Ok(SyscallNumber::Close),
            22 => Ok(SyscallNumber::Read),
            23 => Ok(SyscallNumber::Write),
            24 => Ok(SyscallNumber::Seek),
            27 => Ok(SyscallNumber::CreateDir),
            28 => Ok(SyscallNumber::DeleteDir),
            29 => Ok(SyscallNumber::Unlink),
            30 => Ok(SyscallNumber::OpenDir),
            31 => Ok(SyscallNumber::Create),
            32 => Ok(SyscallNumber::Delete),
            _ => Err(VfsError::InvalidSyscall),
        }
    }
}

// ============================================================================
// システムコールコンテキスト
// ============================================================================

/// システムコールの引数
#[derive(Debug, Clone, Default)]
pub struct SyscallArgs {
    pub arg0: u64,
    pub arg1: u64,
    pub arg2: u64,
    pub arg3: u64,
    pub arg4: u64,
    pub arg5: u64,
}

impl SyscallArgs {
    /// 新しい引数セットを作成
    pub const fn new() -> Self {
        Self {
            arg0: 0,
            arg1: 0,
            arg2: 0,
            arg3: 0,
            arg4: 0,
            arg5: 0,
        }
    }

    /// 先頭三つの引数を設定
    pub const fn with_args(a0: u64, a1: u64, a2: u64) -> Self {
        Self {
            arg0: a0,
            arg1: a1,
            arg2: a2,
            arg3: 0,
            arg4: 0,
            arg5: 0,
        }
    }
}

/// ユーザー空間メモリへのアクセス
pub trait UserMemory {
    /// NUL終端文字列を読む（`max_len` バイト以内に終端がなければ `None`）
    fn read_c_str(&self, addr: u64, max_len: usize) -> Option<String>;

    /// `len` バイトをカーネルへコピー（範囲外なら確保せずに `None`）
    fn copy_in(&self, addr: u64, len: usize) -> Option<Vec<u8>>;

    /// カーネルからユーザー空間へコピー
    fn copy_out(&mut self, addr: u64, data: &[u8]) -> bool;
}

/// 結果をレジスタ値に変換
fn into_ret(result: VfsResult<i64>) -> i64 {
    match result {
        Ok(value) => value,
        Err(err) => err.code() as i64,
    }
}

// ============================================================================
// システムコールハンドラ
// ============================================================================

/// システムコールディスパッチャ
pub fn dispatch(
    vfs: &Vfs,
    fds: &mut dyn DescriptorTable,
    mem: &mut dyn UserMemory,
    number: u64,
    args: &SyscallArgs,
) -> i64 {
    let syscall = match SyscallNumber::try_from(number) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("[syscall] unknown syscall {}", number);
            return e.code() as i64;
        }
    };

    let result = match syscall {
        SyscallNumber::Open => sys_open(vfs, fds, &*mem, args.arg0, args.arg1),
        SyscallNumber::Close => sys_close(vfs, fds, args.arg0),
        SyscallNumber::Read => sys_read(vfs, fds, mem, args.arg0, args.arg1, args.arg2),
        SyscallNumber::Write => sys_write(vfs, fds, &*mem, args.arg0, args.arg1, args.arg2),
        SyscallNumber::Seek => sys_seek(vfs, fds, args.arg0, args.arg1, args.arg2),
        SyscallNumber::Unlink => sys_unlink(vfs, &*mem, args.arg0),
        SyscallNumber::Create => sys_create(vfs, &*mem, args.arg0),
        SyscallNumber::Delete => sys_delete(vfs, &*mem, args.arg0),
        SyscallNumber::OpenDir => sys_opendir(vfs, &*mem, args.arg0),
        SyscallNumber::CreateDir => sys_createdir(vfs, &*mem, args.arg0),
        SyscallNumber::DeleteDir => sys_deletedir(vfs, &*mem, args.arg0),
    };

    log::trace!("[syscall] {:?} -> {:?}", syscall, result);
    into_ret(result)
}

// ============================================================================
// 引数デコード
// ============================================================================

fn user_path(mem: &dyn UserMemory, addr: u64) -> VfsResult<String> {
    mem.read_c_str(addr, MAX_PATH).ok_or(VfsError::BadAddress)
}

/// 開いているディスクリプタのみ受け付ける
fn open_fd(fds: &dyn DescriptorTable, raw: u64) -> VfsResult<Fd> {
    let fd = usize::try_from(raw).map(Fd::new).map_err(|_| Errno::EBADF)?;
    if !fds.is_open(fd) {
        return Err(Errno::EBADF.into());
    }
    Ok(fd)
}

fn byte_len(raw: u64) -> VfsResult<usize> {
    usize::try_from(raw).map_err(|_| VfsError::Backend(Errno::EINVAL))
}

// ============================================================================
// 個別システムコール実装
// ============================================================================

/// ファイルを開く
pub fn sys_open(
    vfs: &Vfs,
    fds: &mut dyn DescriptorTable,
    mem: &dyn UserMemory,
    path: u64,
    flags: u64,
) -> VfsResult<i64> {
    let path = user_path(mem, path)?;
    let flags = u32::try_from(flags)
        .ok()
        .and_then(OpenFlags::from_bits)
        .ok_or(Errno::EINVAL)?;
    let fd = vfs.open(fds, &path, flags)?;
    Ok(fd.as_usize() as i64)
}

/// ディスクリプタを閉じる
pub fn sys_close(vfs: &Vfs, fds: &mut dyn DescriptorTable, fd: u64) -> VfsResult<i64> {
    let fd = open_fd(fds, fd)?;
    vfs.close(fds, fd)?;
    Ok(0)
}

/// 読み取り
///
/// 固定長のカーネルバッファ経由でチャンクごとにコピーする。
/// バックエンドが要求より少なく返した時点で終了。
pub fn sys_read(
    vfs: &Vfs,
    fds: &dyn DescriptorTable,
    mem: &mut dyn UserMemory,
    fd: u64,
    buf: u64,
    len: u64,
) -> VfsResult<i64> {
    let fd = open_fd(fds, fd)?;
    let len = byte_len(len)?;

    let mut staging = [0u8; WRITE_CHUNK_SIZE];
    let mut total = 0usize;
    while total < len {
        let want = (len - total).min(WRITE_CHUNK_SIZE);
        let n = match vfs.read(fds, fd, &mut staging[..want]) {
            Ok(n) => n,
            // 既に読めた分は返す
            Err(_) if total > 0 => break,
            Err(err) => return Err(err),
        };
        let addr = buf.checked_add(total as u64).ok_or(VfsError::BadAddress)?;
        if !mem.copy_out(addr, &staging[..n]) {
            return Err(VfsError::BadAddress);
        }
        total += n;
        if n < want {
            break;
        }
    }
    Ok(total as i64)
}

/// 書き込み
pub fn sys_write(
    vfs: &Vfs,
    fds: &dyn DescriptorTable,
    mem: &dyn UserMemory,
    fd: u64,
    buf: u64,
    len: u64,
) -> VfsResult<i64> {
    let fd = open_fd(fds, fd)?;
    let data = mem.copy_in(buf, byte_len(len)?).ok_or(VfsError::BadAddress)?;
    let n = vfs.write(fds, fd, &data)?;
    Ok(n as i64)
}

/// 位置変更（オフセットは符号付きで解釈）
pub fn sys_seek(
    vfs: &Vfs,
    fds: &dyn DescriptorTable,
    fd: u64,
    offset: u64,
    whence: u64,
) -> VfsResult<i64> {
    let fd = open_fd(fds, fd)?;
    let whence = i32::try_from(whence)
        .map_err(|_| VfsError::InvalidSyscall)
        .and_then(Whence::try_from)?;
    let pos = vfs.seek(fds, fd, offset as i64, whence)?;
    i64::try_from(pos).map_err(|_| VfsError::Backend(Errno::EINVAL))
}

/// ファイルを削除（unlink）
pub fn sys_unlink(vfs: &Vfs, mem: &dyn UserMemory, path: u64) -> VfsResult<i64> {
    vfs.unlink(&user_path(mem, path)?)?;
    Ok(0)
}

/// ファイルを作成
pub fn sys_create(vfs: &Vfs, mem: &dyn UserMemory, path: u64) -> VfsResult<i64> {
    vfs.create(&user_path(mem, path)?)?;
    Ok(0)
}

/// ファイルを削除（delete）
pub fn sys_delete(vfs: &Vfs, mem: &dyn UserMemory, path: u64) -> VfsResult<i64> {
    vfs.delete(&user_path(mem, path)?)?;
    Ok(0)
}

/// ディレクトリを開く（エントリ数を返す）
pub fn sys_opendir(vfs: &Vfs, mem: &dyn UserMemory, path: u64) -> VfsResult<i64> {
    let entries = vfs.open_dir(&user_path(mem, path)?)?;
    Ok(entries as i64)
}

/// ディレクトリを作成
pub fn sys_createdir(vfs: &Vfs, mem: &dyn UserMemory, path: u64) -> VfsResult<i64> {
    vfs.create_dir(&user_path(mem, path)?)?;
    Ok(0)
}

/// ディレクトリを削除
pub fn sys_deletedir(vfs: &Vfs, mem: &dyn UserMemory, path: u64) -> VfsResult<i64> {
    vfs.delete_dir(&user_path(mem, path)?)?;
    Ok(0)
}

// ============================================================================
// テスト
// ============================================================================
