//! `UringReactor` — io_uring execution backend (Linux, `uring` feature).
//!
//! A dedicated reactor thread translates submit entries into SQEs, polls
//! the CQ, and pushes completions into the same sink the pool uses. Ops
//! io_uring cannot express (ftruncate, chmod, readv/writev) and opcodes
//! the kernel's probe reports unsupported stay on the worker pool; the
//! bridge routes per entry via [`UringReactor::supports`].
//!
//! Correlation: the reactor stamps each SQE's `user_data` with a local
//! sequence number and keeps the owning entry (paths, statx buffer) in an
//! in-flight table until its CQE arrives, so every pointer handed to the
//! kernel stays alive for exactly as long as the kernel may use it.

#![cfg(all(feature = "uring", target_os = "linux"))]

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use fsbridge_core::completion::CompletionSink;
use fsbridge_core::entry::{CompletionEntry, FsOp, SubmitEntry};
use fsbridge_core::error::{BridgeError, Result};
use fsbridge_core::stat::{time_to_ms, StatRecord};
use fsbridge_core::{bdebug, berror, binfo};

use io_uring::{opcode, types, IoUring, Probe};

/// SQ ring size. Bounds the reactor's in-flight count.
pub(crate) const SQ_ENTRIES: u32 = 256;

const STATX_MASK: u32 = libc::STATX_BASIC_STATS | libc::STATX_BTIME;

/// Opcodes this kernel actually supports, from IORING_REGISTER_PROBE.
#[derive(Debug, Clone, Copy)]
struct Supported {
    openat: bool,
    read: bool,
    write: bool,
    close: bool,
    unlinkat: bool,
    mkdirat: bool,
    renameat: bool,
    statx: bool,
}

impl Supported {
    fn from_probe(probe: &Probe) -> Self {
        Self {
            openat: probe.is_supported(opcode::OpenAt::CODE),
            read: probe.is_supported(opcode::Read::CODE),
            write: probe.is_supported(opcode::Write::CODE),
            close: probe.is_supported(opcode::Close::CODE),
            unlinkat: probe.is_supported(opcode::UnlinkAt::CODE),
            mkdirat: probe.is_supported(opcode::MkDirAt::CODE),
            renameat: probe.is_supported(opcode::RenameAt::CODE),
            statx: probe.is_supported(opcode::Statx::CODE),
        }
    }
}

/// Shared state between the bridge and the reactor thread.
struct ReactorShared {
    queue: ArrayQueue<SubmitEntry>,
    shutdown: AtomicBool,
}

/// An operation the kernel currently owns.
///
/// Holds everything the SQE points into: the entry (paths, buffers by
/// contract) plus the statx landing area for stat-family ops.
struct Inflight {
    entry: SubmitEntry,
    statx: Option<Box<libc::statx>>,
    /// Backing storage for the AT_EMPTY_PATH fstat variant.
    empty_path: Option<CString>,
}

pub(crate) struct UringReactor {
    shared: Arc<ReactorShared>,
    supported: Supported,
    handle: Option<thread::JoinHandle<()>>,
}

impl UringReactor {
    /// Set up the ring, probe opcode support, and start the reactor
    /// thread.
    pub(crate) fn start(queue_depth: usize, sink: Arc<dyn CompletionSink>) -> Result<Self> {
        let ring = IoUring::builder()
            .build(SQ_ENTRIES)
            .map_err(|e| BridgeError::UringSetup(e.raw_os_error().unwrap_or(-1)))?;

        let mut probe = Probe::new();
        ring.submitter()
            .register_probe(&mut probe)
            .map_err(|e| BridgeError::UringSetup(e.raw_os_error().unwrap_or(-1)))?;
        let supported = Supported::from_probe(&probe);

        let shared = Arc::new(ReactorShared {
            queue: ArrayQueue::new(queue_depth),
            shutdown: AtomicBool::new(false),
        });

        let shared_clone = shared.clone();
        let handle = thread::Builder::new()
            .name("fsbridge-uring".into())
            .spawn(move || reactor_loop(shared_clone, ring, sink))
            .expect("failed to spawn uring reactor thread");

        binfo!("uring reactor started: {:?}", supported);
        Ok(Self {
            shared,
            supported,
            handle: Some(handle),
        })
    }

    /// Whether this op can run on the ring (kernel support included).
    pub(crate) fn supports(&self, op: &FsOp) -> bool {
        let s = &self.supported;
        match op {
            FsOp::Open { .. } => s.openat,
            FsOp::Read { .. } => s.read,
            FsOp::Write { .. } => s.write,
            FsOp::Close { .. } => s.close,
            FsOp::Unlink { .. } | FsOp::Rmdir { .. } => s.unlinkat,
            FsOp::Mkdir { .. } => s.mkdirat,
            FsOp::Rename { .. } => s.renameat,
            FsOp::Stat { .. } | FsOp::Lstat { .. } | FsOp::Fstat { .. } => s.statx,
            FsOp::Readv { .. } | FsOp::Writev { .. } | FsOp::Ftruncate { .. } | FsOp::Chmod { .. } => {
                false
            }
        }
    }

    /// Hand an entry to the reactor. Returns immediately.
    pub(crate) fn submit(&self, entry: SubmitEntry) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Relaxed) {
            return Err(BridgeError::WorkerUnavailable);
        }
        self.shared
            .queue
            .push(entry)
            .map_err(|_| BridgeError::QueueFull)
    }
}

impl Drop for UringReactor {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        // The reactor finishes in-flight operations before exiting.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The reactor loop — runs on a dedicated OS thread.
fn reactor_loop(shared: Arc<ReactorShared>, mut ring: IoUring, sink: Arc<dyn CompletionSink>) {
    let mut inflight: HashMap<u64, Inflight> = HashMap::new();
    let mut seq: u64 = 0;
    let mut unsubmitted = false;

    loop {
        let shutting_down = shared.shutdown.load(Ordering::Relaxed);
        if shutting_down && inflight.is_empty() && shared.queue.is_empty() {
            break;
        }

        let mut did_work = false;

        // ── Step 1: drain incoming entries → SQEs ──
        while inflight.len() < SQ_ENTRIES as usize {
            let Some(entry) = shared.queue.pop() else {
                break;
            };
            seq = seq.wrapping_add(1);
            let key = seq;

            let mut pending = Inflight {
                entry,
                statx: None,
                empty_path: None,
            };
            let sqe = build_sqe(&mut pending, key);

            let mut pushed = unsafe { ring.submission().push(&sqe) }.is_ok();
            if !pushed {
                // SQ full — kick the kernel and retry once.
                let _ = ring.submit();
                pushed = unsafe { ring.submission().push(&sqe) }.is_ok();
            }

            if pushed {
                inflight.insert(key, pending);
                unsubmitted = true;
            } else {
                // Kernel backlogged: surface EAGAIN, same shape a pool
                // overload would take.
                complete(&sink, pending, -(libc::EAGAIN as i64));
            }
            did_work = true;
        }

        // ── Step 2: kick queued submissions ──
        if unsubmitted {
            match ring.submit() {
                Ok(_) => unsubmitted = false,
                Err(e) => berror!("uring submit failed: {}", e),
            }
        }

        // ── Step 3: drain CQEs → completion sink ──
        let mut completed = 0;
        for cqe in ring.completion() {
            let key = cqe.user_data();
            let Some(pending) = inflight.remove(&key) else {
                bdebug!("uring: unknown completion key {}", key);
                continue;
            };
            complete(&sink, pending, cqe.result() as i64);
            completed += 1;
        }
        if completed > 0 {
            did_work = true;
        }

        if !did_work {
            // Nothing moving — brief sleep to avoid busy-spin.
            thread::sleep(Duration::from_micros(50));
        }
    }
    bdebug!("uring reactor down");
}

/// Decode the result, free the kernel-visible storage, push to the sink.
fn complete(sink: &Arc<dyn CompletionSink>, pending: Inflight, result: i64) {
    let Inflight { entry, statx, .. } = pending;

    let stat = if entry.op.is_stat() && result == 0 {
        statx.as_deref().map(decode_statx)
    } else {
        None
    };

    let completion = CompletionEntry {
        record: entry.record,
        result,
        stat,
        stat_out: entry.stat_out,
    };
    // `entry.op` (paths) and the statx box drop here, before the host can
    // observe the completion.
    if let Err(e) = sink.push(completion) {
        berror!("uring: completion push failed: {}", e);
    }
    if let Err(e) = sink.flush_and_notify() {
        berror!("uring: notify failed: {}", e);
    }
}

/// Translate one op into an SQE, stamping `key` as user_data.
///
/// Stat-family arms allocate the statx landing buffer on `pending` so the
/// pointer survives until the CQE.
fn build_sqe(pending: &mut Inflight, key: u64) -> io_uring::squeue::Entry {
    let cwd = types::Fd(libc::AT_FDCWD);
    let off = |pos: i64| if pos < 0 { u64::MAX } else { pos as u64 };

    let sqe = match &pending.entry.op {
        FsOp::Open { path, flags, mode } => opcode::OpenAt::new(cwd, path.as_ptr())
            .flags(*flags)
            .mode(*mode as u32)
            .build(),
        FsOp::Read { fd, buf, len, pos } => opcode::Read::new(types::Fd(*fd as i32), *buf, *len)
            .offset(off(*pos))
            .build(),
        FsOp::Write { fd, buf, len, pos } => opcode::Write::new(types::Fd(*fd as i32), *buf, *len)
            .offset(off(*pos))
            .build(),
        FsOp::Close { fd } => opcode::Close::new(types::Fd(*fd as i32)).build(),
        FsOp::Unlink { path } => opcode::UnlinkAt::new(cwd, path.as_ptr()).build(),
        FsOp::Rmdir { path } => opcode::UnlinkAt::new(cwd, path.as_ptr())
            .flags(libc::AT_REMOVEDIR)
            .build(),
        FsOp::Mkdir { path, mode } => opcode::MkDirAt::new(cwd, path.as_ptr())
            .mode(*mode as u32)
            .build(),
        FsOp::Rename { from, to } => {
            opcode::RenameAt::new(cwd, from.as_ptr(), cwd, to.as_ptr()).build()
        }
        FsOp::Stat { path } => {
            let bx = pending
                .statx
                .get_or_insert_with(|| Box::new(unsafe { std::mem::zeroed() }));
            opcode::Statx::new(cwd, path.as_ptr(), &mut **bx as *mut libc::statx as *mut _)
                .mask(STATX_MASK)
                .build()
        }
        FsOp::Lstat { path } => {
            let bx = pending
                .statx
                .get_or_insert_with(|| Box::new(unsafe { std::mem::zeroed() }));
            opcode::Statx::new(cwd, path.as_ptr(), &mut **bx as *mut libc::statx as *mut _)
                .flags(libc::AT_SYMLINK_NOFOLLOW)
                .mask(STATX_MASK)
                .build()
        }
        FsOp::Fstat { fd } => {
            let fd = *fd;
            let bx = pending
                .statx
                .get_or_insert_with(|| Box::new(unsafe { std::mem::zeroed() }));
            let buf = &mut **bx as *mut libc::statx as *mut _;
            let path = pending.empty_path.get_or_insert_with(CString::default);
            opcode::Statx::new(types::Fd(fd as i32), path.as_ptr(), buf)
                .flags(libc::AT_EMPTY_PATH)
                .mask(STATX_MASK)
                .build()
        }
        // Routed to the pool by `supports`.
        FsOp::Readv { .. } | FsOp::Writev { .. } | FsOp::Ftruncate { .. } | FsOp::Chmod { .. } => {
            unreachable!("op {} is never routed to the ring", pending.entry.op.name())
        }
    };
    sqe.user_data(key)
}

/// statx → the fixed 16-field record.
///
/// statx has no BSD `st_flags`/`st_gen`; they report 0, and birthtime
/// falls back to ctime when the filesystem doesn't provide btime.
fn decode_statx(sx: &libc::statx) -> StatRecord {
    let birthtime_ms = if sx.stx_mask & libc::STATX_BTIME != 0 {
        time_to_ms(sx.stx_btime.tv_sec, sx.stx_btime.tv_nsec as i64)
    } else {
        time_to_ms(sx.stx_ctime.tv_sec, sx.stx_ctime.tv_nsec as i64)
    };

    StatRecord {
        dev: libc::makedev(sx.stx_dev_major, sx.stx_dev_minor) as u64,
        mode: sx.stx_mode as u64,
        nlink: sx.stx_nlink as u64,
        uid: sx.stx_uid as u64,
        gid: sx.stx_gid as u64,
        rdev: libc::makedev(sx.stx_rdev_major, sx.stx_rdev_minor) as u64,
        ino: sx.stx_ino,
        size: sx.stx_size,
        blksize: sx.stx_blksize as u64,
        blocks: sx.stx_blocks,
        flags: 0,
        gen: 0,
        atime_ms: time_to_ms(sx.stx_atime.tv_sec, sx.stx_atime.tv_nsec as i64),
        mtime_ms: time_to_ms(sx.stx_mtime.tv_sec, sx.stx_mtime.tv_nsec as i64),
        ctime_ms: time_to_ms(sx.stx_ctime.tv_sec, sx.stx_ctime.tv_nsec as i64),
        birthtime_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::QueueSink;
    use fsbridge_core::id::RequestId;
    use fsbridge_core::record::FsRequest;

    fn reactor_or_skip(sink: Arc<QueueSink>) -> Option<UringReactor> {
        match UringReactor::start(16, sink as Arc<dyn CompletionSink>) {
            Ok(r) => Some(r),
            Err(e) => {
                // Kernel/seccomp may deny io_uring; the pool path covers
                // these semantics everywhere else.
                eprintln!("io_uring unavailable, skipping: {}", e);
                None
            }
        }
    }

    fn wait_pop(sink: &QueueSink) -> CompletionEntry {
        for _ in 0..2000 {
            if let Some(entry) = sink.pop() {
                return entry;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("no completion within 2s");
    }

    #[test]
    fn test_statx_roundtrip_and_enoent() {
        let sink = Arc::new(QueueSink::new(8, None));
        let Some(reactor) = reactor_or_skip(sink.clone()) else {
            return;
        };
        if !reactor.supported.statx {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present");
        std::fs::write(&path, b"12345").unwrap();

        let record = Arc::new(FsRequest::new(RequestId::new(1)));
        record.begin_submit();
        reactor
            .submit(SubmitEntry {
                record,
                op: FsOp::Stat {
                    path: CString::new(path.to_str().unwrap()).unwrap(),
                },
                stat_out: std::ptr::null_mut(),
            })
            .unwrap();

        let comp = wait_pop(&sink);
        assert_eq!(comp.result, 0);
        let stat = comp.stat.unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.mode as u32 & crate::consts::S_IFMT, crate::consts::S_IFREG);

        let record = Arc::new(FsRequest::new(RequestId::new(2)));
        record.begin_submit();
        reactor
            .submit(SubmitEntry {
                record,
                op: FsOp::Stat {
                    path: CString::new(format!("{}/gone", dir.path().display())).unwrap(),
                },
                stat_out: std::ptr::null_mut(),
            })
            .unwrap();

        let comp = wait_pop(&sink);
        assert_eq!(comp.result, -(libc::ENOENT as i64));
        assert!(comp.stat.is_none());
    }

    #[test]
    fn test_open_close_on_ring() {
        let sink = Arc::new(QueueSink::new(8, None));
        let Some(reactor) = reactor_or_skip(sink.clone()) else {
            return;
        };
        if !(reactor.supported.openat && reactor.supported.close) {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ringfile");

        let record = Arc::new(FsRequest::new(RequestId::new(3)));
        record.begin_submit();
        reactor
            .submit(SubmitEntry {
                record,
                op: FsOp::Open {
                    path: CString::new(path.to_str().unwrap()).unwrap(),
                    flags: crate::consts::O_RDWR | crate::consts::O_CREAT,
                    mode: 0o644,
                },
                stat_out: std::ptr::null_mut(),
            })
            .unwrap();

        let comp = wait_pop(&sink);
        assert!(comp.result >= 0, "openat failed: {}", comp.result);
        assert!(path.exists());

        let record = Arc::new(FsRequest::new(RequestId::new(4)));
        record.begin_submit();
        reactor
            .submit(SubmitEntry {
                record,
                op: FsOp::Close {
                    fd: comp.result as u32,
                },
                stat_out: std::ptr::null_mut(),
            })
            .unwrap();
        assert_eq!(wait_pop(&sink).result, 0);
    }
}
