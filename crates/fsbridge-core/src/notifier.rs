//! Host wakeup abstraction.
//!
//! A `Notifier` wakes the host event loop when new completions are
//! available in the sink, so the host can poll a descriptor instead of
//! spinning on `drain()`.
//!
//! # Implementors
//!
//! - `EventFdNotifier` (Linux, default when enabled): writes 1 to an
//!   eventfd the host polls. Multiple signals before the host reads
//!   coalesce into one wakeup (eventfd counter semantics).

use crate::error::Result;

/// Wakes the consumer when completions are ready.
///
/// **Contract:**
/// - `notify()` must never block.
/// - Calls are level-like: redundant notifications are harmless and may
///   be coalesced.
pub trait Notifier: Send + Sync {
    /// Signal that new completions are available.
    fn notify(&self) -> Result<()>;
}
