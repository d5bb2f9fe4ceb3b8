//! `FixedPool` — the default execution backend.
//!
//! Spawns N OS threads at creation. Workers dequeue submit entries from a
//! lock-free queue, execute the blocking syscall, and push the completion
//! into the injected sink. No dynamic scaling. Simple, predictable, safe.
//!
//! **Contract:** `submit()` never blocks the caller. Workers may block —
//! that's the point.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use fsbridge_core::completion::CompletionSink;
use fsbridge_core::entry::{CompletionEntry, SubmitEntry};
use fsbridge_core::error::{BridgeError, Result};
use fsbridge_core::{bdebug, berror};

use crate::exec;

/// Shared state between the dispatcher and workers.
struct PoolInner {
    /// Work queue: dispatcher → workers.
    work: ArrayQueue<SubmitEntry>,
    /// Where completed operations go.
    sink: Arc<dyn CompletionSink>,
    /// Number of workers currently executing a syscall.
    active: AtomicUsize,
    shutdown: AtomicBool,
    total: usize,
}

pub struct FixedPool {
    inner: Arc<PoolInner>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl FixedPool {
    /// Create a pool with `n` workers and room for `queue_depth` pending
    /// entries.
    pub fn new(n: usize, queue_depth: usize, sink: Arc<dyn CompletionSink>) -> Self {
        let n = n.clamp(1, 32);
        let inner = Arc::new(PoolInner {
            work: ArrayQueue::new(queue_depth),
            sink,
            active: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            total: n,
        });

        let mut handles = Vec::with_capacity(n);
        for worker_id in 0..n {
            let inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("fsbridge-worker-{}", worker_id))
                .spawn(move || worker_loop(inner, worker_id))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        FixedPool { inner, handles }
    }

    /// Default sizing: min(8, nproc/2), at least 2.
    pub fn auto_size() -> usize {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cpus / 2).clamp(2, 8)
    }

    /// Enqueue an entry for execution. Returns immediately.
    pub fn submit(&self, entry: SubmitEntry) -> Result<()> {
        if self.inner.shutdown.load(Ordering::Relaxed) {
            return Err(BridgeError::WorkerUnavailable);
        }
        self.inner
            .work
            .push(entry)
            .map_err(|_| BridgeError::QueueFull)
    }

    /// Workers currently inside a syscall.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.inner.total
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        // Workers notice the flag within one park interval.
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Worker thread main loop.
fn worker_loop(inner: Arc<PoolInner>, worker_id: usize) {
    bdebug!("worker {} up", worker_id);
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match inner.work.pop() {
            Some(entry) => {
                inner.active.fetch_add(1, Ordering::Relaxed);
                let (result, stat) = exec::execute(&entry.op);
                inner.active.fetch_sub(1, Ordering::Relaxed);

                let completion = CompletionEntry {
                    record: entry.record,
                    result,
                    stat,
                    stat_out: entry.stat_out,
                };

                // The sink is sized for the worst-case outstanding count;
                // a failed push is a wiring bug, not load.
                if let Err(e) = inner.sink.push(completion) {
                    berror!("worker {}: completion push failed: {}", worker_id, e);
                }

                if let Err(e) = inner.sink.flush_and_notify() {
                    berror!("worker {}: notify failed: {}", worker_id, e);
                }
            }
            None => {
                // No work — brief park to avoid busy-wait.
                thread::park_timeout(Duration::from_millis(1));
            }
        }
    }
    bdebug!("worker {} down", worker_id);
}
