// Sink workers
//
// Plain threads that pull batches off the smart queue, group them by
// persistence method and hand them to the sinks serving that method. The queue
// lock is never held across sink I/O. Workers exit once the queue is shut down
// and drained.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contextlog_error::{Retryable, SinkError};
use contextlog_types::{LogMessage, PersistMethod};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{RetryPolicy, SinkSet, SinkSlot};
use crate::policy::PolicyManager;
use crate::queue::{QueueEntry, SmartQueue};
use crate::stats::StatsRecorder;

/// Everything a worker thread needs, shared between workers.
pub(crate) struct WorkerContext {
    pub queue: Arc<SmartQueue>,
    pub sinks: SinkSet,
    pub manager: Arc<PolicyManager>,
    pub stats: Arc<StatsRecorder>,
    pub retry: RetryPolicy,
    pub idle_timeout: Duration,
    /// Emits an internal critical notice through the pipeline
    pub notice: Arc<dyn Fn(String) + Send + Sync>,
}

pub(crate) fn spawn_workers(
    ctx: Arc<WorkerContext>,
    count: usize,
    application: &str,
) -> std::io::Result<Vec<JoinHandle<()>>> {
    (0..count.max(1))
        .map(|index| {
            let ctx = Arc::clone(&ctx);
            thread::Builder::new()
                .name(format!("contextlog-{application}-sink-{index}"))
                .spawn(move || run(&ctx, index))
        })
        .collect()
}

fn run(ctx: &WorkerContext, index: usize) {
    debug!(worker = index, "sink worker started");
    loop {
        let batch_size = ctx.manager.recommended_batch_size(ctx.queue.size());
        let batch = ctx.queue.dequeue_batch(batch_size, ctx.idle_timeout);
        if batch.is_empty() {
            if ctx.queue.is_shut_down() {
                break;
            }
            continue;
        }

        ctx.stats
            .record_dequeued(batch.len() as u64, batch.iter().map(QueueEntry::waited));
        dispatch(ctx, &batch);
        ctx.queue.complete(batch.len());
    }
    debug!(worker = index, "sink worker stopped");
}

fn dispatch(ctx: &WorkerContext, batch: &[QueueEntry]) {
    let encrypt = ctx.manager.policy().request_encryption;

    let mut groups: BTreeMap<PersistMethod, Vec<&QueueEntry>> = BTreeMap::new();
    for entry in batch {
        groups.entry(entry.method).or_default().push(entry);
    }

    for (method, entries) in groups {
        // queue-only traffic and methods no sink is routed for are consumed here
        if method == PersistMethod::QueueOnly || !ctx.sinks.routes(method) {
            ctx.stats.record_written(entries.iter().map(|e| e.waited()));
            continue;
        }
        let targets = ctx.sinks.targets(method);
        if targets.is_empty() {
            // every routed sink has been disabled
            ctx.stats.record_write_failure(entries.len() as u64);
            continue;
        }

        let messages: Vec<Arc<LogMessage>> =
            entries.iter().map(|e| Arc::clone(&e.message)).collect();
        let mut delivered = vec![false; messages.len()];
        for slot in &targets {
            slot.lock().request_encryption(encrypt);
            let ok = deliver(ctx, slot, &messages);
            for (flag, ok) in delivered.iter_mut().zip(ok) {
                *flag |= ok;
            }
        }

        let failures = delivered.iter().filter(|d| !**d).count() as u64;
        if failures > 0 {
            ctx.stats.record_write_failure(failures);
        }
        ctx.stats.record_written(
            entries
                .iter()
                .zip(&delivered)
                .filter(|(_, ok)| **ok)
                .map(|(e, _)| e.waited()),
        );
    }
}

/// Write to one sink with retries. Returns per-message success.
fn deliver(ctx: &WorkerContext, slot: &Arc<Mutex<SinkSlot>>, messages: &[Arc<LogMessage>]) -> Vec<bool> {
    let mut delivered = vec![false; messages.len()];
    let mut pending: Vec<usize> = (0..messages.len()).collect();
    let mut attempt = 0;

    while !pending.is_empty() {
        attempt += 1;
        let batch: Vec<Arc<LogMessage>> = pending.iter().map(|&i| Arc::clone(&messages[i])).collect();
        let results = slot.lock().write_batch(&batch);

        let mut retry = Vec::new();
        let mut hint = None;
        for (&index, result) in pending.iter().zip(results) {
            match result {
                Ok(()) => delivered[index] = true,
                Err(err) if err.is_retryable() => {
                    hint = hint.max(err.retry_after());
                    retry.push(index);
                }
                Err(SinkError::Disabled(_)) => {}
                Err(err) => {
                    disable(ctx, slot, err.to_string());
                    return delivered;
                }
            }
        }

        if retry.is_empty() {
            break;
        }
        if !ctx.retry.allows_retry(attempt) {
            let name = slot.lock().name().to_string();
            warn!(sink = %name, attempts = attempt, undelivered = retry.len(), "retries exhausted");
            break;
        }
        let delay = ctx.retry.delay(attempt, hint);
        ctx.stats.record_retry();
        debug!(attempt, delay_ms = delay.as_millis() as u64, pending = retry.len(), "retrying sink write");
        thread::sleep(delay);
        pending = retry;
    }
    delivered
}

fn disable(ctx: &WorkerContext, slot: &Arc<Mutex<SinkSlot>>, reason: String) {
    let name = {
        let mut slot = slot.lock();
        if !slot.disable(reason.clone()) {
            return;
        }
        slot.name().to_string()
    };
    ctx.stats.record_sink_disabled();
    (ctx.notice)(format!("sink `{name}` disabled: {reason}"));
}
