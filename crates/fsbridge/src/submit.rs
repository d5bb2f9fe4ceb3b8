//! The dispatch surface — one method per filesystem primitive.
//!
//! Every method marshals its arguments, flips the record `Idle →
//! Submitted`, hands a [`SubmitEntry`] to a backend, and returns without
//! blocking. Argument validation stops at the marshaling boundary (path
//! length, NUL bytes, buffer ranges); everything else — missing files,
//! permissions, bad descriptors — is the OS's verdict, delivered
//! asynchronously as a negative result code through the callback.
//!
//! 64-bit positions and lengths arrive as two u32 halves (`low`, `high`)
//! for hosts whose numeric types stop at 32 bits; an all-ones pair decodes
//! to -1, "current file offset".

use std::ffi::CString;
use std::sync::Arc;

use fsbridge_core::entry::{FsOp, SubmitEntry};
use fsbridge_core::error::{BridgeError, Result};
use fsbridge_core::record::FsRequest;
use fsbridge_core::stat::StatRecord;

use crate::bridge::FsBridge;
use crate::consts::MAX_PATH;

/// Combine two u32 halves into a signed 64-bit value:
/// `high * 2^32 + low`.
#[inline]
pub fn join_halves(low: u32, high: u32) -> i64 {
    (((high as u64) << 32) | low as u64) as i64
}

fn marshal_path(path: &str) -> Result<CString> {
    if path.len() > MAX_PATH {
        return Err(BridgeError::PathTooLong);
    }
    CString::new(path).map_err(|_| BridgeError::InvalidPath)
}

impl FsBridge {
    /// Claim the record, hand the op to a backend, roll back on failure.
    fn submit(&self, req: &Arc<FsRequest>, op: FsOp, stat_out: *mut u64) -> Result<()> {
        if !req.begin_submit() {
            return Err(BridgeError::RequestBusy);
        }
        let entry = SubmitEntry {
            record: Arc::clone(req),
            op,
            stat_out,
        };
        let res = self.submit_entry(entry);
        if res.is_err() {
            // Nothing was enqueued; the record is the caller's again.
            req.finish();
        }
        res
    }

    /// Open a file. Completion result: descriptor or negative errno.
    pub fn open(&self, req: &Arc<FsRequest>, path: &str, flags: i32, mode: i32) -> Result<()> {
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Open { path, flags, mode }, std::ptr::null_mut())
    }

    /// Positioned read into `buf[offset..offset + len]`.
    ///
    /// Completion result: bytes read or negative errno.
    ///
    /// # Safety
    /// `buf` must stay alive and otherwise untouched until this request's
    /// completion is drained; the backend writes into it from another
    /// thread.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn read(
        &self,
        req: &Arc<FsRequest>,
        fd: u32,
        buf: &mut [u8],
        offset: u32,
        len: u32,
        pos_low: u32,
        pos_high: u32,
    ) -> Result<()> {
        let end = offset as usize + len as usize;
        if end > buf.len() {
            return Err(BridgeError::InvalidBuffer);
        }
        let ptr = buf.as_mut_ptr().add(offset as usize);
        self.submit(
            req,
            FsOp::Read {
                fd,
                buf: ptr,
                len,
                pos: join_halves(pos_low, pos_high),
            },
            std::ptr::null_mut(),
        )
    }

    /// Positioned write from `buf[offset..offset + len]`.
    ///
    /// Completion result: bytes written or negative errno.
    ///
    /// # Safety
    /// `buf` must stay alive until this request's completion is drained.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn write(
        &self,
        req: &Arc<FsRequest>,
        fd: u32,
        buf: &[u8],
        offset: u32,
        len: u32,
        pos_low: u32,
        pos_high: u32,
    ) -> Result<()> {
        let end = offset as usize + len as usize;
        if end > buf.len() {
            return Err(BridgeError::InvalidBuffer);
        }
        let ptr = buf.as_ptr().add(offset as usize);
        self.submit(
            req,
            FsOp::Write {
                fd,
                buf: ptr,
                len,
                pos: join_halves(pos_low, pos_high),
            },
            std::ptr::null_mut(),
        )
    }

    /// Scatter read into each buffer in order.
    ///
    /// # Safety
    /// Every buffer must stay alive until the completion is drained.
    pub unsafe fn readv(
        &self,
        req: &Arc<FsRequest>,
        fd: u32,
        bufs: &mut [&mut [u8]],
        pos_low: u32,
        pos_high: u32,
    ) -> Result<()> {
        let iovs = bufs
            .iter_mut()
            .map(|b| (b.as_mut_ptr() as u64, b.len() as u64))
            .collect();
        self.submit(
            req,
            FsOp::Readv {
                fd,
                iovs,
                pos: join_halves(pos_low, pos_high),
            },
            std::ptr::null_mut(),
        )
    }

    /// Gather write from each buffer in order.
    ///
    /// # Safety
    /// Every buffer must stay alive until the completion is drained.
    pub unsafe fn writev(
        &self,
        req: &Arc<FsRequest>,
        fd: u32,
        bufs: &[&[u8]],
        pos_low: u32,
        pos_high: u32,
    ) -> Result<()> {
        let iovs = bufs
            .iter()
            .map(|b| (b.as_ptr() as u64, b.len() as u64))
            .collect();
        self.submit(
            req,
            FsOp::Writev {
                fd,
                iovs,
                pos: join_halves(pos_low, pos_high),
            },
            std::ptr::null_mut(),
        )
    }

    /// Truncate to a 64-bit length given as two halves.
    pub fn ftruncate(
        &self,
        req: &Arc<FsRequest>,
        fd: u32,
        len_low: u32,
        len_high: u32,
    ) -> Result<()> {
        self.submit(
            req,
            FsOp::Ftruncate {
                fd,
                len: join_halves(len_low, len_high),
            },
            std::ptr::null_mut(),
        )
    }

    pub fn close(&self, req: &Arc<FsRequest>, fd: u32) -> Result<()> {
        self.submit(req, FsOp::Close { fd }, std::ptr::null_mut())
    }

    pub fn mkdir(&self, req: &Arc<FsRequest>, path: &str, mode: i32) -> Result<()> {
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Mkdir { path, mode }, std::ptr::null_mut())
    }

    pub fn rmdir(&self, req: &Arc<FsRequest>, path: &str) -> Result<()> {
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Rmdir { path }, std::ptr::null_mut())
    }

    pub fn unlink(&self, req: &Arc<FsRequest>, path: &str) -> Result<()> {
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Unlink { path }, std::ptr::null_mut())
    }

    pub fn rename(&self, req: &Arc<FsRequest>, from: &str, to: &str) -> Result<()> {
        let from = marshal_path(from)?;
        let to = marshal_path(to)?;
        self.submit(req, FsOp::Rename { from, to }, std::ptr::null_mut())
    }

    pub fn chmod(&self, req: &Arc<FsRequest>, path: &str, mode: i32) -> Result<()> {
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Chmod { path, mode }, std::ptr::null_mut())
    }

    /// Stat by path. On success the 16-slot `out` buffer is populated
    /// right before the callback fires; on failure it is left untouched.
    ///
    /// # Safety
    /// `out` must stay alive until the completion is drained.
    pub unsafe fn stat(&self, req: &Arc<FsRequest>, path: &str, out: &mut [u64]) -> Result<()> {
        if out.len() < StatRecord::FIELD_COUNT {
            return Err(BridgeError::InvalidBuffer);
        }
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Stat { path }, out.as_mut_ptr())
    }

    /// Stat without following a trailing symlink.
    ///
    /// # Safety
    /// Same contract as [`FsBridge::stat`].
    pub unsafe fn lstat(&self, req: &Arc<FsRequest>, path: &str, out: &mut [u64]) -> Result<()> {
        if out.len() < StatRecord::FIELD_COUNT {
            return Err(BridgeError::InvalidBuffer);
        }
        let path = marshal_path(path)?;
        self.submit(req, FsOp::Lstat { path }, out.as_mut_ptr())
    }

    /// Stat an open descriptor.
    ///
    /// # Safety
    /// Same contract as [`FsBridge::stat`].
    pub unsafe fn fstat(&self, req: &Arc<FsRequest>, fd: u32, out: &mut [u64]) -> Result<()> {
        if out.len() < StatRecord::FIELD_COUNT {
            return Err(BridgeError::InvalidBuffer);
        }
        self.submit(req, FsOp::Fstat { fd }, out.as_mut_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeBuilder;
    use crate::consts;
    use fsbridge_core::id::RequestId;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Bridge plus a shared event log the callback appends to.
    struct Harness {
        bridge: FsBridge,
        events: Arc<Mutex<Vec<(u32, i32)>>>,
        seen: usize,
    }

    impl Harness {
        fn new() -> Self {
            let events: Arc<Mutex<Vec<(u32, i32)>>> = Arc::new(Mutex::new(Vec::new()));
            let sink = events.clone();
            let bridge = BridgeBuilder::new()
                .worker_count(2)
                .queue_depth(64)
                .build(move |id, result| {
                    sink.lock().unwrap().push((id.as_u32(), result));
                })
                .unwrap();
            Self {
                bridge,
                events,
                seen: 0,
            }
        }

        /// Drain until `n` further callbacks have fired; returns them.
        fn wait(&mut self, n: usize) -> Vec<(u32, i32)> {
            let target = self.seen + n;
            for _ in 0..2000 {
                self.bridge.drain(64);
                if self.events.lock().unwrap().len() >= target {
                    let all = self.events.lock().unwrap();
                    let out = all[self.seen..target].to_vec();
                    self.seen = target;
                    return out;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            panic!("timed out waiting for {} completions", n);
        }

        /// Run one op to completion and return its result code.
        fn one<F>(&mut self, f: F) -> i32
        where
            F: FnOnce(&FsBridge, &Arc<FsRequest>) -> crate::Result<()>,
        {
            let req = Arc::new(FsRequest::new(RequestId::new(1)));
            f(&self.bridge, &req).unwrap();
            let events = self.wait(1);
            assert_eq!(events[0].0, 1);
            events[0].1
        }
    }

    fn open_rw(h: &mut Harness, path: &str) -> u32 {
        let fd = h.one(|b, r| b.open(r, path, consts::O_RDWR | consts::O_CREAT, 0o644));
        assert!(fd >= 0, "open failed: {}", fd);
        fd as u32
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        let mut h = Harness::new();

        let fd = open_rw(&mut h, path.to_str().unwrap());

        let data = b"hello";
        let wrote = h.one(|b, r| unsafe { b.write(r, fd, data, 0, 5, 0, 0) });
        assert_eq!(wrote, 5);

        let mut back = [0u8; 5];
        let read = h.one(|b, r| unsafe { b.read(r, fd, &mut back, 0, 5, 0, 0) });
        assert_eq!(read, 5);
        assert_eq!(&back, data);

        assert_eq!(h.one(|b, r| b.close(r, fd)), 0);
    }

    #[test]
    fn test_concurrent_ids_each_complete_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists");
        std::fs::write(&path, b"x").unwrap();
        let mut h = Harness::new();

        // Mix hits and misses so completions race each other.
        let n = 32u32;
        let mut records = Vec::new();
        let mut outs = vec![[0u64; 16]; n as usize];
        for (i, out) in outs.iter_mut().enumerate() {
            let req = Arc::new(FsRequest::new(RequestId::new(i as u32)));
            let target = if i % 2 == 0 {
                path.to_str().unwrap().to_string()
            } else {
                format!("{}/missing-{}", dir.path().display(), i)
            };
            unsafe { h.bridge.stat(&req, &target, out).unwrap() };
            records.push(req);
        }

        let mut events = h.wait(n as usize);
        events.sort_by_key(|(id, _)| *id);
        let ids: Vec<u32> = events.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (0..n).collect::<Vec<_>>());
        for (id, result) in events {
            if id % 2 == 0 {
                assert_eq!(result, 0);
            } else {
                assert_eq!(result, -consts::ENOENT);
            }
        }
        for rec in &records {
            assert!(!rec.in_flight());
        }
    }

    #[test]
    fn test_stat_fresh_file_and_failure_leaves_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh");
        std::fs::File::create(&path).unwrap();
        let mut h = Harness::new();

        let mut out = [0u64; 16];
        let r = {
            let req = Arc::new(FsRequest::new(RequestId::new(1)));
            unsafe { h.bridge.stat(&req, path.to_str().unwrap(), &mut out) }.unwrap();
            h.wait(1)[0].1
        };
        assert_eq!(r, 0);
        // size slot is index 7, mode is index 1.
        assert_eq!(out[7], 0);
        assert_eq!(out[1] as u32 & consts::S_IFMT, consts::S_IFREG);

        // Failed stat must not touch the sentinel-filled buffer.
        let mut sentinel = [0xAAAA_AAAA_AAAA_AAAAu64; 16];
        let r = {
            let req = Arc::new(FsRequest::new(RequestId::new(2)));
            let missing = format!("{}/nope", dir.path().display());
            unsafe { h.bridge.stat(&req, &missing, &mut sentinel) }.unwrap();
            h.wait(1)[0].1
        };
        assert_eq!(r, -consts::ENOENT);
        assert!(sentinel.iter().all(|&v| v == 0xAAAA_AAAA_AAAA_AAAA));
    }

    #[test]
    fn test_truncate_to_current_length_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc");
        let mut h = Harness::new();

        let fd = open_rw(&mut h, path.to_str().unwrap());
        let data = b"12345678";
        assert_eq!(
            h.one(|b, r| unsafe { b.write(r, fd, data, 0, 8, 0, 0) }),
            8
        );

        assert_eq!(h.one(|b, r| b.ftruncate(r, fd, 8, 0)), 0);

        let mut out = [0u64; 16];
        let r = {
            let req = Arc::new(FsRequest::new(RequestId::new(1)));
            unsafe { h.bridge.fstat(&req, fd, &mut out) }.unwrap();
            h.wait(1)[0].1
        };
        assert_eq!(r, 0);
        assert_eq!(out[7], 8);

        // And truncation actually truncates when the length differs.
        assert_eq!(h.one(|b, r| b.ftruncate(r, fd, 3, 0)), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 3);

        h.one(|b, r| b.close(r, fd));
    }

    #[test]
    fn test_record_reuse_and_busy_detection() {
        let dir = tempfile::tempdir().unwrap();
        let missing = format!("{}/gone", dir.path().display());
        let mut h = Harness::new();

        let req = Arc::new(FsRequest::new(RequestId::new(5)));

        // Same record, sequentially, many times.
        for _ in 0..4 {
            h.bridge.unlink(&req, &missing).unwrap();
            let events = h.wait(1);
            assert_eq!(events[0], (5, -consts::ENOENT));
            assert!(!req.in_flight());
        }

        // Resubmitting while in flight is rejected synchronously.
        h.bridge.unlink(&req, &missing).unwrap();
        let err = h.bridge.unlink(&req, &missing).unwrap_err();
        assert_eq!(err, BridgeError::RequestBusy);
        h.wait(1);
        // And the record is usable again afterwards.
        h.bridge.unlink(&req, &missing).unwrap();
        h.wait(1);
    }

    #[test]
    fn test_mkdir_rmdir_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let sub_str = sub.to_str().unwrap().to_string();
        let mut h = Harness::new();

        assert_eq!(h.one(|b, r| b.mkdir(r, &sub_str, 0o755)), 0);
        assert!(sub.is_dir());

        // mkdir over an existing directory reports the OS error.
        assert!(h.one(|b, r| b.mkdir(r, &sub_str, 0o755)) < 0);

        assert_eq!(h.one(|b, r| b.rmdir(r, &sub_str)), 0);
        assert!(!sub.exists());

        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let file_str = file.to_str().unwrap().to_string();
        assert_eq!(h.one(|b, r| b.unlink(r, &file_str)), 0);
        assert!(!file.exists());
    }

    #[test]
    fn test_rename_and_chmod() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("before");
        let to = dir.path().join("after");
        std::fs::write(&from, b"move me").unwrap();
        let mut h = Harness::new();

        let from_str = from.to_str().unwrap().to_string();
        let to_str = to.to_str().unwrap().to_string();
        assert_eq!(h.one(|b, r| b.rename(r, &from_str, &to_str)), 0);
        assert!(!from.exists());
        assert!(to.exists());

        assert_eq!(h.one(|b, r| b.chmod(r, &to_str, 0o600)), 0);
        let mut out = [0u64; 16];
        let r = {
            let req = Arc::new(FsRequest::new(RequestId::new(1)));
            unsafe { h.bridge.stat(&req, &to_str, &mut out) }.unwrap();
            h.wait(1)[0].1
        };
        assert_eq!(r, 0);
        assert_eq!(out[1] as u32 & 0o777, 0o600);
    }

    #[test]
    fn test_vectored_dispatch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec");
        let mut h = Harness::new();

        let fd = open_rw(&mut h, path.to_str().unwrap());

        let a = b"part one ".as_slice();
        let b_part = b"part two".as_slice();
        let wrote = h.one(|b, r| unsafe { b.writev(r, fd, &[a, b_part], 0, 0) });
        assert_eq!(wrote, 17);

        let mut first = [0u8; 9];
        let mut second = [0u8; 8];
        let read = h.one(|b, r| unsafe {
            b.readv(r, fd, &mut [&mut first[..], &mut second[..]], 0, 0)
        });
        assert_eq!(read, 17);
        assert_eq!(&first, a);
        assert_eq!(&second, b_part);

        h.one(|b, r| b.close(r, fd));
    }

    #[test]
    fn test_marshaling_boundary_rejections() {
        let mut h = Harness::new();
        let req = Arc::new(FsRequest::new(RequestId::new(1)));

        let long = "x".repeat(consts::MAX_PATH + 1);
        assert_eq!(
            h.bridge.unlink(&req, &long).unwrap_err(),
            BridgeError::PathTooLong
        );

        assert_eq!(
            h.bridge.unlink(&req, "bad\0path").unwrap_err(),
            BridgeError::InvalidPath
        );

        let mut buf = [0u8; 4];
        let err = unsafe { h.bridge.read(&req, 0, &mut buf, 2, 4, 0, 0) }.unwrap_err();
        assert_eq!(err, BridgeError::InvalidBuffer);

        let mut short = [0u64; 8];
        let err = unsafe { h.bridge.stat(&req, "/tmp", &mut short) }.unwrap_err();
        assert_eq!(err, BridgeError::InvalidBuffer);

        // None of the rejects consumed the record.
        assert!(!req.in_flight());
    }

    #[test]
    fn test_join_halves() {
        assert_eq!(join_halves(0, 0), 0);
        assert_eq!(join_halves(5, 0), 5);
        assert_eq!(join_halves(0, 1), 1 << 32);
        assert_eq!(join_halves(u32::MAX, u32::MAX), -1);
        assert_eq!(
            join_halves(0xFFFF_FFFF, 0x7FFF_FFFF),
            i64::MAX
        );
    }
}
