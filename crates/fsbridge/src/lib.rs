//! # fsbridge — Async filesystem bridge
//!
//! Filesystem primitives (open, read, write, truncate, close, mkdir,
//! rmdir, stat/lstat/fstat, unlink, rename, chmod, readv/writev) exposed
//! as non-blocking submissions against caller-owned, reusable request
//! records, with completions delivered back onto a single logical host
//! thread through one injected callback.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fsbridge::{consts, FsBridge, FsRequest, RequestId};
//! use std::sync::Arc;
//!
//! let mut bridge = FsBridge::builder()
//!     .worker_count(4)
//!     .build(|id, result| println!("request {} -> {}", id, result))?;
//!
//! let req = Arc::new(FsRequest::new(RequestId::new(1)));
//! bridge.open(&req, "/tmp/data.bin", consts::O_RDWR | consts::O_CREAT, 0o644)?;
//!
//! // Inside the host event loop:
//! bridge.drain(64); // invokes the callback with (1, fd)
//! ```
//!
//! ## Architecture
//!
//! ```text
//! host thread                  backend threads
//! ───────────                  ───────────────
//! submit surface ──entries──▶  FixedPool workers (blocking syscalls)
//!   (submit.rs)            └▶  UringReactor (Linux, `uring` feature)
//!                                      │
//! drain() ◀──── completion sink ◀──────┘
//!   └─ stat write + callback    (crossbeam queue + eventfd wakeup)
//! ```
//!
//! Ownership of a request record transfers to the backend at submit and
//! reverts to the caller when its completion is drained; the record's
//! state tag enforces one outstanding operation per record. Completions
//! across distinct records arrive in no particular order.

pub mod bridge;
pub mod consts;
pub mod pool;
pub mod sink;

mod exec;
mod submit;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod notify;

#[cfg(all(feature = "uring", target_os = "linux"))]
mod uring;

pub use bridge::{BridgeBuilder, CompletionCallback, FsBridge};
pub use submit::join_halves;

// Re-export the core vocabulary so embedders depend on one crate.
pub use fsbridge_core::{
    time_to_ms, BridgeError, CompletionEntry, CompletionSink, FsOp, FsRequest, Notifier,
    RequestId, RequestState, Result, StatRecord, SubmitEntry,
};
