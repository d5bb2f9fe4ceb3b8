//! Submission and completion entry types.
//!
//! These are the *lingua franca* between the dispatch surface, the
//! execution backends, and the completion bridge: a [`SubmitEntry`] travels
//! from the dispatcher to a backend thread, and a [`CompletionEntry`]
//! travels back through the completion sink to the host thread.

use std::ffi::CString;
use std::sync::Arc;

use crate::id::RequestId;
use crate::record::FsRequest;
use crate::stat::StatRecord;

/// One filesystem operation, fully marshaled.
///
/// Paths are NUL-terminated and length-checked at the dispatch boundary;
/// buffer fields are raw (pointer, length) pairs captured from
/// caller-owned memory. Positions are signed: a negative position means
/// "current file offset" for read/write, matching the OS convention.
#[derive(Debug)]
pub enum FsOp {
    Open { path: CString, flags: i32, mode: i32 },
    Read { fd: u32, buf: *mut u8, len: u32, pos: i64 },
    Write { fd: u32, buf: *const u8, len: u32, pos: i64 },
    /// Scatter read: (address, length) pairs into caller-owned buffers.
    Readv { fd: u32, iovs: Vec<(u64, u64)>, pos: i64 },
    /// Gather write: (address, length) pairs from caller-owned buffers.
    Writev { fd: u32, iovs: Vec<(u64, u64)>, pos: i64 },
    Ftruncate { fd: u32, len: i64 },
    Close { fd: u32 },
    Mkdir { path: CString, mode: i32 },
    Rmdir { path: CString },
    Unlink { path: CString },
    Rename { from: CString, to: CString },
    Chmod { path: CString, mode: i32 },
    Stat { path: CString },
    Lstat { path: CString },
    Fstat { fd: u32 },
}

impl FsOp {
    /// Stat-family operations route through the stat-decoding completion
    /// path and carry a result-buffer pointer on the entry.
    #[inline]
    pub fn is_stat(&self) -> bool {
        matches!(self, FsOp::Stat { .. } | FsOp::Lstat { .. } | FsOp::Fstat { .. })
    }

    /// Operation name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FsOp::Open { .. } => "open",
            FsOp::Read { .. } => "read",
            FsOp::Write { .. } => "write",
            FsOp::Readv { .. } => "readv",
            FsOp::Writev { .. } => "writev",
            FsOp::Ftruncate { .. } => "ftruncate",
            FsOp::Close { .. } => "close",
            FsOp::Mkdir { .. } => "mkdir",
            FsOp::Rmdir { .. } => "rmdir",
            FsOp::Unlink { .. } => "unlink",
            FsOp::Rename { .. } => "rename",
            FsOp::Chmod { .. } => "chmod",
            FsOp::Stat { .. } => "stat",
            FsOp::Lstat { .. } => "lstat",
            FsOp::Fstat { .. } => "fstat",
        }
    }
}

/// A submitted operation, owned by a backend while in flight.
///
/// Holds the record `Arc` so the record outlives the operation regardless
/// of what the caller does, plus the caller's stat result-buffer pointer
/// for stat-family ops (null otherwise).
#[derive(Debug)]
pub struct SubmitEntry {
    /// The request record; its state tag is `Submitted` for the lifetime
    /// of this entry.
    pub record: Arc<FsRequest>,
    pub op: FsOp,
    /// Caller-owned 16-slot u64 buffer for stat results, or null.
    /// Written on the host thread when the completion is drained.
    pub stat_out: *mut u64,
}

impl SubmitEntry {
    #[inline]
    pub fn id(&self) -> RequestId {
        self.record.id()
    }
}

// Safety: the raw pointers reference caller-owned memory which the caller
// contractually keeps alive and untouched until the completion for this
// entry is drained. The backend is the sole accessor while in flight.
unsafe impl Send for SubmitEntry {}

/// A completed operation, traveling from a backend to the host thread.
#[derive(Debug)]
pub struct CompletionEntry {
    pub record: Arc<FsRequest>,
    /// OS convention: zero or positive = success (count or descriptor),
    /// negative = negated platform error code.
    pub result: i64,
    /// Decoded stat fields. `Some` only when a stat-family op succeeded.
    pub stat: Option<StatRecord>,
    /// Forwarded from the submit entry; written right before the callback.
    pub stat_out: *mut u64,
}

// Safety: same contract as SubmitEntry — stat_out stays valid until the
// drain on the host thread writes through it exactly once.
unsafe impl Send for CompletionEntry {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_stat() {
        let op = FsOp::Stat { path: CString::new("/tmp/x").unwrap() };
        assert!(op.is_stat());
        assert!(FsOp::Fstat { fd: 3 }.is_stat());
        assert!(!FsOp::Close { fd: 3 }.is_stat());
    }

    #[test]
    fn test_entry_id_passthrough() {
        let record = Arc::new(FsRequest::new(RequestId::new(7)));
        let entry = SubmitEntry {
            record,
            op: FsOp::Close { fd: 1 },
            stat_out: std::ptr::null_mut(),
        };
        assert_eq!(entry.id().as_u32(), 7);
        assert_eq!(entry.op.name(), "close");
    }
}
