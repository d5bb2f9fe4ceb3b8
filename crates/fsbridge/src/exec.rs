//! Blocking syscall execution.
//!
//! This runs on a worker thread — it MAY block. That's the point: the
//! dispatch path never blocks, the pool absorbs the latency, and the
//! result travels back through the completion sink.
//!
//! Result convention: the syscall return value (count or descriptor) on
//! success, negative errno on failure. Stat-family ops additionally decode
//! the OS stat structure into a [`StatRecord`]; the decode happens here,
//! on the worker, so the host thread only copies 16 words.

use std::mem::MaybeUninit;

use fsbridge_core::entry::FsOp;
use fsbridge_core::stat::{time_to_ms, StatRecord};

/// Current thread's errno.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Current thread's errno.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) fn errno() -> i32 {
    unsafe { *libc::__error() }
}

/// Current thread's errno.
#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
pub(crate) fn errno() -> i32 {
    unsafe { *libc::__errno() }
}

/// Map a raw syscall return to the bridge result convention.
#[inline]
fn map_ret(ret: i64) -> i64 {
    if ret < 0 {
        -(errno() as i64)
    } else {
        ret
    }
}

/// Execute one operation to completion.
///
/// # Safety contract
/// Buffer pointers inside `op` reference caller-owned memory the caller
/// keeps alive until this operation's completion is drained; the
/// dispatcher validated the ranges at marshaling time.
pub(crate) fn execute(op: &FsOp) -> (i64, Option<StatRecord>) {
    match op {
        FsOp::Open { path, flags, mode } => {
            let r = unsafe { libc::open(path.as_ptr(), *flags, *mode as libc::c_uint) };
            (map_ret(r as i64), None)
        }
        FsOp::Read { fd, buf, len, pos } => {
            let r = unsafe {
                if *pos < 0 {
                    libc::read(*fd as i32, *buf as *mut libc::c_void, *len as usize)
                } else {
                    libc::pread(
                        *fd as i32,
                        *buf as *mut libc::c_void,
                        *len as usize,
                        *pos as libc::off_t,
                    )
                }
            };
            (map_ret(r as i64), None)
        }
        FsOp::Write { fd, buf, len, pos } => {
            let r = unsafe {
                if *pos < 0 {
                    libc::write(*fd as i32, *buf as *const libc::c_void, *len as usize)
                } else {
                    libc::pwrite(
                        *fd as i32,
                        *buf as *const libc::c_void,
                        *len as usize,
                        *pos as libc::off_t,
                    )
                }
            };
            (map_ret(r as i64), None)
        }
        FsOp::Readv { fd, iovs, pos } => {
            let vec = to_iovecs(iovs);
            let r = unsafe {
                if *pos < 0 {
                    libc::readv(*fd as i32, vec.as_ptr(), vec.len() as libc::c_int)
                } else {
                    libc::preadv(
                        *fd as i32,
                        vec.as_ptr(),
                        vec.len() as libc::c_int,
                        *pos as libc::off_t,
                    )
                }
            };
            (map_ret(r as i64), None)
        }
        FsOp::Writev { fd, iovs, pos } => {
            let vec = to_iovecs(iovs);
            let r = unsafe {
                if *pos < 0 {
                    libc::writev(*fd as i32, vec.as_ptr(), vec.len() as libc::c_int)
                } else {
                    libc::pwritev(
                        *fd as i32,
                        vec.as_ptr(),
                        vec.len() as libc::c_int,
                        *pos as libc::off_t,
                    )
                }
            };
            (map_ret(r as i64), None)
        }
        FsOp::Ftruncate { fd, len } => {
            let r = unsafe { libc::ftruncate(*fd as i32, *len as libc::off_t) };
            (map_ret(r as i64), None)
        }
        FsOp::Close { fd } => {
            let r = unsafe { libc::close(*fd as i32) };
            (map_ret(r as i64), None)
        }
        FsOp::Mkdir { path, mode } => {
            let r = unsafe { libc::mkdir(path.as_ptr(), *mode as libc::mode_t) };
            (map_ret(r as i64), None)
        }
        FsOp::Rmdir { path } => {
            let r = unsafe { libc::rmdir(path.as_ptr()) };
            (map_ret(r as i64), None)
        }
        FsOp::Unlink { path } => {
            let r = unsafe { libc::unlink(path.as_ptr()) };
            (map_ret(r as i64), None)
        }
        FsOp::Rename { from, to } => {
            let r = unsafe { libc::rename(from.as_ptr(), to.as_ptr()) };
            (map_ret(r as i64), None)
        }
        FsOp::Chmod { path, mode } => {
            let r = unsafe { libc::chmod(path.as_ptr(), *mode as libc::mode_t) };
            (map_ret(r as i64), None)
        }
        FsOp::Stat { path } => stat_with(|st| unsafe { libc::stat(path.as_ptr(), st) }),
        FsOp::Lstat { path } => stat_with(|st| unsafe { libc::lstat(path.as_ptr(), st) }),
        FsOp::Fstat { fd } => stat_with(|st| unsafe { libc::fstat(*fd as i32, st) }),
    }
}

fn to_iovecs(iovs: &[(u64, u64)]) -> Vec<libc::iovec> {
    iovs.iter()
        .map(|&(base, len)| libc::iovec {
            iov_base: base as *mut libc::c_void,
            iov_len: len as usize,
        })
        .collect()
}

fn stat_with<F>(f: F) -> (i64, Option<StatRecord>)
where
    F: FnOnce(*mut libc::stat) -> libc::c_int,
{
    let mut st = MaybeUninit::<libc::stat>::uninit();
    let r = f(st.as_mut_ptr());
    if r == 0 {
        let st = unsafe { st.assume_init() };
        (0, Some(decode_stat(&st)))
    } else {
        (map_ret(r as i64), None)
    }
}

/// Decode the OS stat structure into the fixed 16-field record.
///
/// Times convert seconds+nanoseconds to milliseconds. Linux has no
/// `st_flags`/`st_gen`/`st_birthtime`; those report 0 with birthtime
/// falling back to ctime, the same substitution libuv makes there.
fn decode_stat(st: &libc::stat) -> StatRecord {
    let (flags, gen, birthtime_ms) = stat_extras(st);

    StatRecord {
        dev: st.st_dev as u64,
        mode: st.st_mode as u64,
        nlink: st.st_nlink as u64,
        uid: st.st_uid as u64,
        gid: st.st_gid as u64,
        rdev: st.st_rdev as u64,
        ino: st.st_ino as u64,
        size: st.st_size as u64,
        blksize: st.st_blksize as u64,
        blocks: st.st_blocks as u64,
        flags,
        gen,
        atime_ms: time_to_ms(st.st_atime as i64, st.st_atime_nsec as i64),
        mtime_ms: time_to_ms(st.st_mtime as i64, st.st_mtime_nsec as i64),
        ctime_ms: time_to_ms(st.st_ctime as i64, st.st_ctime_nsec as i64),
        birthtime_ms,
    }
}

/// (st_flags, st_gen, birthtime) where the platform has them.
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn stat_extras(st: &libc::stat) -> (u64, u64, u64) {
    (
        st.st_flags as u64,
        st.st_gen as u64,
        time_to_ms(st.st_birthtime as i64, st.st_birthtime_nsec as i64),
    )
}

/// Linux has no flags/gen/birthtime in struct stat; birthtime falls back
/// to ctime, the same substitution libuv makes there.
#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn stat_extras(st: &libc::stat) -> (u64, u64, u64) {
    (
        0,
        0,
        time_to_ms(st.st_ctime as i64, st.st_ctime_nsec as i64),
    )
}
