//! `FsBridge` — the compositor that wires everything together.
//!
//! This is the dependency-injection point: the completion callback, the
//! worker pool, the completion sink, and (optionally) the io_uring reactor
//! are all bound at construction. There is no process-wide mutable state;
//! "exactly one callback for the instance lifetime" falls out of the
//! struct owning it.
//!
//! Threading model: one logical host thread calls the submit surface (in
//! `submit.rs`) and `drain()`. Backends complete operations on their own
//! threads and hand results through the sink; only `drain()` — which
//! borrows the bridge mutably — ever invokes the callback, so the callback
//! can never run on a foreign thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fsbridge_core::bwarn;
use fsbridge_core::completion::CompletionSink;
use fsbridge_core::entry::{CompletionEntry, SubmitEntry};
use fsbridge_core::error::Result;
use fsbridge_core::id::RequestId;
use fsbridge_core::stat::StatRecord;

use crate::pool::FixedPool;
use crate::sink::QueueSink;

#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::notify::EventFdNotifier;
#[cfg(any(target_os = "linux", target_os = "android"))]
use fsbridge_core::notifier::Notifier;
#[cfg(any(target_os = "linux", target_os = "android"))]
use std::os::unix::io::RawFd;

#[cfg(all(feature = "uring", target_os = "linux"))]
use crate::uring::UringReactor;

/// The per-completion callback: `(correlation id, result code)`.
///
/// Result code follows the OS convention — zero or positive is success
/// (often a count or descriptor), negative is a negated platform errno.
pub type CompletionCallback = Box<dyn FnMut(RequestId, i32)>;

/// Builder for a wired bridge (the construction-time configuration
/// surface; every knob has a safe default).
pub struct BridgeBuilder {
    worker_count: usize,
    queue_depth: usize,
    #[cfg(any(target_os = "linux", target_os = "android"))]
    notifier: bool,
    #[cfg(all(feature = "uring", target_os = "linux"))]
    uring: bool,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            worker_count: 0, // 0 = auto
            queue_depth: 256,
            #[cfg(any(target_os = "linux", target_os = "android"))]
            notifier: false,
            #[cfg(all(feature = "uring", target_os = "linux"))]
            uring: false,
        }
    }
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pool workers. 0 selects `min(8, max(2, nproc/2))`.
    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    /// Capacity of the submission queue(s).
    pub fn queue_depth(mut self, n: usize) -> Self {
        self.queue_depth = n;
        self
    }

    /// Create an eventfd the host can poll for completion readiness
    /// (see [`FsBridge::completion_fd`]).
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn with_notifier(mut self, enabled: bool) -> Self {
        self.notifier = enabled;
        self
    }

    /// Route supported operations through an io_uring reactor instead of
    /// the worker pool. Unsupported operations still use the pool.
    #[cfg(all(feature = "uring", target_os = "linux"))]
    pub fn with_uring(mut self, enabled: bool) -> Self {
        self.uring = enabled;
        self
    }

    /// Extra sink headroom for reactor-owned operations.
    #[cfg(all(feature = "uring", target_os = "linux"))]
    fn uring_capacity(&self, depth: usize) -> usize {
        if self.uring {
            depth + crate::uring::SQ_ENTRIES as usize
        } else {
            0
        }
    }

    #[cfg(not(all(feature = "uring", target_os = "linux")))]
    fn uring_capacity(&self, _depth: usize) -> usize {
        0
    }

    /// Wire the bridge. `on_complete` is the single callback invoked once
    /// per dispatched operation, always from `drain()` on the host thread.
    pub fn build<F>(self, on_complete: F) -> Result<FsBridge>
    where
        F: FnMut(RequestId, i32) + 'static,
    {
        let workers = if self.worker_count == 0 {
            FixedPool::auto_size()
        } else {
            self.worker_count.clamp(1, 32)
        };
        let depth = self.queue_depth.max(1);

        // The sink must hold every operation that can be outstanding at
        // once: queued + executing, per backend.
        let sink_capacity = depth + workers + self.uring_capacity(depth);

        #[cfg(any(target_os = "linux", target_os = "android"))]
        let mut event_fd = None;
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let notifier: Option<Box<dyn Notifier>> = if self.notifier {
            let n = EventFdNotifier::create()?;
            event_fd = Some(n.fd());
            Some(Box::new(n))
        } else {
            None
        };
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let notifier = None;

        let sink = Arc::new(QueueSink::new(sink_capacity, notifier));
        let pool_sink: Arc<dyn CompletionSink> = sink.clone();
        let pool = FixedPool::new(workers, depth, pool_sink);

        #[cfg(all(feature = "uring", target_os = "linux"))]
        let uring = if self.uring {
            let reactor_sink: Arc<dyn CompletionSink> = sink.clone();
            Some(UringReactor::start(depth, reactor_sink)?)
        } else {
            None
        };

        Ok(FsBridge {
            sink,
            pool,
            #[cfg(all(feature = "uring", target_os = "linux"))]
            uring,
            #[cfg(any(target_os = "linux", target_os = "android"))]
            event_fd,
            on_complete: Box::new(on_complete),
            in_flight: AtomicUsize::new(0),
        })
    }
}

/// The wired bridge. Lives on the host thread; see the module docs for
/// the threading model.
pub struct FsBridge {
    sink: Arc<QueueSink>,
    pool: FixedPool,
    #[cfg(all(feature = "uring", target_os = "linux"))]
    uring: Option<UringReactor>,
    #[cfg(any(target_os = "linux", target_os = "android"))]
    event_fd: Option<RawFd>,
    on_complete: CompletionCallback,
    in_flight: AtomicUsize,
}

impl FsBridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Route a marshaled entry to a backend. Never blocks.
    pub(crate) fn submit_entry(&self, entry: SubmitEntry) -> Result<()> {
        #[cfg(all(feature = "uring", target_os = "linux"))]
        if let Some(reactor) = &self.uring {
            if reactor.supports(&entry.op) {
                reactor.submit(entry)?;
                self.in_flight.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }
        self.pool.submit(entry)?;
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drain up to `max` completions on the host thread.
    ///
    /// Per completion: write the decoded stat payload into the caller's
    /// result buffer (success only), return the record to `Idle`, then
    /// invoke the callback with `(id, result)`. Returns the number of
    /// callbacks invoked.
    pub fn drain(&mut self, max: usize) -> usize {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        self.rearm_notifier();

        let mut drained = 0;
        while drained < max {
            let Some(entry) = self.sink.pop() else {
                break;
            };
            let CompletionEntry {
                record,
                result,
                stat,
                stat_out,
            } = entry;

            if let Some(stat) = stat {
                if !stat_out.is_null() {
                    // Safety: the dispatcher validated a FIELD_COUNT-slot
                    // buffer at marshaling time, and the caller keeps it
                    // alive until this completion is drained.
                    let out = unsafe {
                        std::slice::from_raw_parts_mut(stat_out, StatRecord::FIELD_COUNT)
                    };
                    if let Err(e) = stat.write_to(out) {
                        bwarn!("stat result write skipped: {}", e);
                    }
                }
            }

            let id = record.id();
            // Back to Idle before the callback so the record can be
            // resubmitted from inside it.
            record.finish();
            drop(record);
            self.in_flight.fetch_sub(1, Ordering::Relaxed);

            (self.on_complete)(id, result as i32);
            drained += 1;
        }
        drained
    }

    /// Operations submitted but not yet drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Completions waiting in the sink right now.
    pub fn ready(&self) -> usize {
        self.sink.len()
    }

    /// The eventfd to poll for completion readiness, when the bridge was
    /// built `with_notifier(true)`. When it reads ready, call
    /// [`FsBridge::drain`].
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn completion_fd(&self) -> Option<RawFd> {
        self.event_fd
    }

    /// Pool worker count (diagnostics).
    pub fn workers(&self) -> usize {
        self.pool.total()
    }

    /// Clear the eventfd counter so the next notification re-arms a
    /// level-triggered poll.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn rearm_notifier(&self) {
        if let Some(fd) = self.event_fd {
            let mut count: u64 = 0;
            unsafe {
                libc::read(
                    fd,
                    &mut count as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                );
            }
        }
    }
}

impl Drop for FsBridge {
    fn drop(&mut self) {
        let pending = self.in_flight.load(Ordering::Relaxed);
        if pending != 0 {
            bwarn!("bridge dropped with {} operations undrained", pending);
        }
    }
}
