//! Completion delivery abstraction.
//!
//! A `CompletionSink` receives finished operations from backend threads
//! and hands them to the single consuming host thread. Default impl:
//! bounded lock-free queue + optional notifier (`QueueSink` in the
//! `fsbridge` crate).

use crate::entry::CompletionEntry;
use crate::error::Result;

/// Accepts completions from backend threads and notifies the consumer.
///
/// **Contract:**
/// - `push()` must never block. A full sink is a capacity-planning bug;
///   implementations report it rather than stalling a backend thread.
/// - Entries pushed by one backend thread are observed by the consumer in
///   push order; no order is defined across backend threads.
/// - `flush_and_notify()` is called after one or more pushes; consumers
///   may coalesce multiple notifications into one wakeup.
pub trait CompletionSink: Send + Sync {
    /// Hand a finished operation to the consumer side. May be buffered
    /// until `flush_and_notify`.
    fn push(&self, entry: CompletionEntry) -> Result<()>;

    /// Make pushed completions visible and wake the consumer.
    fn flush_and_notify(&self) -> Result<()>;
}
