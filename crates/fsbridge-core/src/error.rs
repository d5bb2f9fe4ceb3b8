//! fsbridge error types.
//!
//! Synchronous errors cover marshaling-boundary violations and backend
//! capacity only. OS-level failures (missing paths, permissions) are never
//! surfaced here — they arrive asynchronously as negative result codes
//! through the completion callback.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Path longer than the 4096-byte marshaling limit.
    PathTooLong,
    /// Path contains an interior NUL byte.
    InvalidPath,
    /// Buffer offset/length outside the caller buffer, or a stat result
    /// buffer with fewer than 16 slots.
    InvalidBuffer,
    /// The request record already has an operation in flight.
    RequestBusy,
    /// Backend submission queue is full; resubmit after draining.
    QueueFull,
    /// Worker pool is shut down.
    WorkerUnavailable,
    /// io_uring setup failed.
    UringSetup(i32),
    /// io_uring submission failed.
    UringSubmit(i32),
    /// OS error with errno.
    Os(i32),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathTooLong => write!(f, "path exceeds 4096 bytes"),
            Self::InvalidPath => write!(f, "path contains NUL byte"),
            Self::InvalidBuffer => write!(f, "buffer range out of bounds"),
            Self::RequestBusy => write!(f, "request record already in flight"),
            Self::QueueFull => write!(f, "submission queue full"),
            Self::WorkerUnavailable => write!(f, "worker pool unavailable"),
            Self::UringSetup(e) => write!(f, "io_uring setup: errno {}", e),
            Self::UringSubmit(e) => write!(f, "io_uring submit: errno {}", e),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for BridgeError {}

pub type Result<T> = std::result::Result<T, BridgeError>;
