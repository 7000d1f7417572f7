// In-memory sink
//
// Keeps the most recent persisted messages in a bounded ring. Used by tests
// and by applications that want recent history in-process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contextlog_error::SinkResult;
use contextlog_types::LogMessage;
use parking_lot::Mutex;

use super::Sink;

#[derive(Debug, Default)]
struct Shared {
    messages: Mutex<VecDeque<Arc<LogMessage>>>,
    flushes: AtomicU64,
    closed: AtomicU64,
}

pub struct MemorySink {
    name: String,
    capacity: usize,
    shared: Arc<Shared>,
}

/// Read side of a `MemorySink`, usable after the sink is handed to a runtime.
#[derive(Clone)]
pub struct MemorySinkHandle {
    shared: Arc<Shared>,
}

impl MemorySink {
    pub fn new(name: &str, capacity: usize) -> (Self, MemorySinkHandle) {
        let shared = Arc::new(Shared::default());
        let sink = MemorySink {
            name: name.to_string(),
            capacity: capacity.max(1),
            shared: Arc::clone(&shared),
        };
        (sink, MemorySinkHandle { shared })
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_one(&mut self, message: &Arc<LogMessage>) -> SinkResult<()> {
        let mut messages = self.shared.messages.lock();
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(Arc::clone(message));
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.shared.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.closed.fetch_add(1, Ordering::Relaxed);
    }
}

impl MemorySinkHandle {
    pub fn messages(&self) -> Vec<Arc<LogMessage>> {
        self.shared.messages.lock().iter().cloned().collect()
    }

    /// Message bodies in arrival order.
    pub fn texts(&self) -> Vec<String> {
        self.shared
            .messages
            .lock()
            .iter()
            .map(|m| m.message().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush_count(&self) -> u64 {
        self.shared.flushes.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Relaxed) > 0
    }

    pub fn clear(&self) {
        self.shared.messages.lock().clear();
    }
}
