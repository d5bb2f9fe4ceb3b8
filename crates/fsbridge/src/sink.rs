//! `QueueSink` — default `CompletionSink` implementation.
//!
//! A bounded lock-free MPSC hand-off: backend threads push, the host
//! thread pops during `drain()`. Capacity is sized by the builder to cover
//! every operation that can be outstanding at once, so a full queue
//! indicates a wiring bug rather than load.

use crossbeam_queue::ArrayQueue;
use fsbridge_core::completion::CompletionSink;
use fsbridge_core::entry::CompletionEntry;
use fsbridge_core::error::{BridgeError, Result};
use fsbridge_core::notifier::Notifier;

pub struct QueueSink {
    queue: ArrayQueue<CompletionEntry>,
    notifier: Option<Box<dyn Notifier>>,
}

impl QueueSink {
    pub fn new(capacity: usize, notifier: Option<Box<dyn Notifier>>) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            notifier,
        }
    }

    /// Pop one completion. Host thread only.
    #[inline]
    pub fn pop(&self) -> Option<CompletionEntry> {
        self.queue.pop()
    }

    /// Completions currently waiting to be drained.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl CompletionSink for QueueSink {
    fn push(&self, entry: CompletionEntry) -> Result<()> {
        self.queue.push(entry).map_err(|_| BridgeError::QueueFull)
    }

    fn flush_and_notify(&self) -> Result<()> {
        match &self.notifier {
            Some(n) => n.notify(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsbridge_core::id::RequestId;
    use fsbridge_core::record::FsRequest;
    use std::sync::Arc;

    fn entry(id: u32, result: i64) -> CompletionEntry {
        CompletionEntry {
            record: Arc::new(FsRequest::new(RequestId::new(id))),
            result,
            stat: None,
            stat_out: std::ptr::null_mut(),
        }
    }

    #[test]
    fn test_push_pop_fifo() {
        let sink = QueueSink::new(4, None);
        sink.push(entry(1, 0)).unwrap();
        sink.push(entry(2, 5)).unwrap();
        assert_eq!(sink.len(), 2);

        let first = sink.pop().unwrap();
        assert_eq!(first.record.id().as_u32(), 1);
        let second = sink.pop().unwrap();
        assert_eq!(second.result, 5);
        assert!(sink.pop().is_none());
    }

    #[test]
    fn test_full_queue_reports() {
        let sink = QueueSink::new(1, None);
        sink.push(entry(1, 0)).unwrap();
        assert_eq!(sink.push(entry(2, 0)), Err(BridgeError::QueueFull));
    }
}
