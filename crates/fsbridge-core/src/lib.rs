//! # fsbridge-core — Types and trait boundaries for fsbridge
//!
//! This crate defines the shared vocabulary of the bridge: the reusable
//! request record, the submit/completion entry types that travel between
//! threads, and the trait seams for completion delivery and host wakeup.
//! Default (safe) implementations live in the `fsbridge` crate.
//!
//! ## Design principle
//!
//! > "Program to the interface. Start safe. Optimize with a new impl,
//! >  not by modifying the existing one."
//!
//! Backends depend on [`completion::CompletionSink`] and
//! [`notifier::Notifier`], never on concrete queue types, so swapping the
//! delivery mechanism is a construction-time decision.

pub mod bprint;
pub mod completion;
pub mod entry;
pub mod error;
pub mod id;
pub mod notifier;
pub mod record;
pub mod stat;

pub use completion::CompletionSink;
pub use entry::{CompletionEntry, FsOp, SubmitEntry};
pub use error::{BridgeError, Result};
pub use id::RequestId;
pub use notifier::Notifier;
pub use record::{FsRequest, RequestState};
pub use stat::{time_to_ms, StatRecord};
