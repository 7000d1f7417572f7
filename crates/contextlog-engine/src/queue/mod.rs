// Smart priority queue
//
// Bounded buffer between producers and sink workers. One FIFO per importance
// level; dequeue drains the highest non-empty level first.

mod smart_queue;

pub use smart_queue::{EnqueueOutcome, QueueEntry, QueueStats, SmartQueue};
