//! The reusable request record.
//!
//! An `FsRequest` is a fixed-size block allocated once by the caller and
//! reused across many sequential operations. It carries the correlation id
//! and an explicit lifecycle state tag:
//!
//! ```text
//! Idle → Submitted → (completion drained) → Idle
//! ```
//!
//! Embedders that address the record as raw memory (a host runtime reading
//! the id out of a shared buffer) use [`FsRequest::SIZE`] and
//! [`FsRequest::ID_OFFSET`] instead of depending on internal layout.

use core::fmt;
use core::mem;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::id::RequestId;

/// Lifecycle state of a request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    /// No operation in flight. The record may be submitted.
    Idle = 0,

    /// Owned by the I/O subsystem. Resubmitting now would corrupt the
    /// in-flight operation; `begin_submit` rejects it.
    Submitted = 1,
}

impl From<u8> for RequestState {
    fn from(v: u8) -> Self {
        match v {
            1 => RequestState::Submitted,
            _ => RequestState::Idle,
        }
    }
}

/// One reusable filesystem request record.
///
/// The record is the only memory shared between the caller and the I/O
/// subsystem: ownership transfers to the subsystem at submit and reverts to
/// the caller when its completion is drained. The state tag makes the
/// single-outstanding-operation contract checkable at runtime rather than
/// an undocumented convention.
#[repr(C)]
pub struct FsRequest {
    id: u32,
    state: AtomicU8,
}

impl FsRequest {
    /// Total byte size of the record structure.
    pub const SIZE: usize = mem::size_of::<FsRequest>();

    /// Byte offset of the correlation id field within the record.
    pub const ID_OFFSET: usize = mem::offset_of!(FsRequest, id);

    /// Create a record in the `Idle` state with the given correlation id.
    pub fn new(id: RequestId) -> Self {
        Self {
            id: id.as_u32(),
            state: AtomicU8::new(RequestState::Idle as u8),
        }
    }

    /// The caller-assigned correlation id.
    #[inline]
    pub fn id(&self) -> RequestId {
        RequestId::new(self.id)
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> RequestState {
        RequestState::from(self.state.load(Ordering::Acquire))
    }

    /// True while an operation is in flight on this record.
    #[inline]
    pub fn in_flight(&self) -> bool {
        self.state() == RequestState::Submitted
    }

    /// Transition `Idle → Submitted`. Called by the dispatcher at the top
    /// of every submit path; callers never invoke this directly.
    ///
    /// Returns false if an operation is already in flight.
    #[inline]
    pub fn begin_submit(&self) -> bool {
        self.state
            .compare_exchange(
                RequestState::Idle as u8,
                RequestState::Submitted as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Transition back to `Idle`. Called when a completion is drained, or
    /// by the dispatcher to roll back a submit that failed to enqueue.
    #[inline]
    pub fn finish(&self) {
        self.state
            .store(RequestState::Idle as u8, Ordering::Release);
    }
}

impl fmt::Debug for FsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsRequest")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        // The id must be addressable from outside without layout knowledge.
        assert!(FsRequest::ID_OFFSET + 4 <= FsRequest::SIZE);

        let req = FsRequest::new(RequestId::new(0xdead_beef));
        let base = &req as *const FsRequest as *const u8;
        let raw = unsafe { *(base.add(FsRequest::ID_OFFSET) as *const u32) };
        assert_eq!(raw, 0xdead_beef);
    }

    #[test]
    fn test_state_transitions() {
        let req = FsRequest::new(RequestId::new(1));
        assert_eq!(req.state(), RequestState::Idle);
        assert!(!req.in_flight());

        assert!(req.begin_submit());
        assert_eq!(req.state(), RequestState::Submitted);
        assert!(req.in_flight());

        // Double submit is rejected while in flight.
        assert!(!req.begin_submit());

        req.finish();
        assert_eq!(req.state(), RequestState::Idle);

        // Reusable immediately after completion.
        assert!(req.begin_submit());
        req.finish();
    }
}
