// Sink interface
//
// Sinks are external: console, rotating files, databases, shared memory.
// The runtime only needs this shape, the routing table, and the retry rules.

mod memory;
mod retry;
mod worker;

use std::collections::BTreeSet;
use std::sync::Arc;

use contextlog_error::{SinkError, SinkResult};
use contextlog_types::{LogMessage, PersistMethod};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::error;

pub use memory::{MemorySink, MemorySinkHandle};
pub use retry::RetryPolicy;
pub(crate) use worker::{spawn_workers, WorkerContext};

/// Consumer of persisted messages.
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn write_one(&mut self, message: &Arc<LogMessage>) -> SinkResult<()>;

    /// One result per message, in order.
    fn write_batch(&mut self, messages: &[Arc<LogMessage>]) -> Vec<SinkResult<()>> {
        messages.iter().map(|m| self.write_one(m)).collect()
    }

    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn close(&mut self) {}

    /// Forwarded from the policy's `request_encryption`; sinks may ignore it.
    fn set_encryption_requested(&mut self, _requested: bool) {}
}

/// Persistence methods a sink serves.
///
/// `Multi` reaches every sink and `QueueOnly` reaches none, whatever the route says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkRoute {
    methods: BTreeSet<PersistMethod>,
}

impl SinkRoute {
    /// Database and file traffic.
    pub fn all() -> Self {
        Self::only(&[PersistMethod::Database, PersistMethod::File])
    }

    pub fn only(methods: &[PersistMethod]) -> Self {
        SinkRoute {
            methods: methods.iter().copied().collect(),
        }
    }

    pub fn serves(&self, method: PersistMethod) -> bool {
        match method {
            PersistMethod::Multi => true,
            PersistMethod::QueueOnly => false,
            other => self.methods.contains(&other),
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = PersistMethod> + '_ {
        self.methods.iter().copied()
    }
}

impl Default for SinkRoute {
    fn default() -> Self {
        Self::all()
    }
}

/// A sink plus its route and disabled flag.
pub(crate) struct SinkSlot {
    sink: Box<dyn Sink>,
    route: SinkRoute,
    disabled: Option<String>,
    encryption_requested: bool,
}

impl SinkSlot {
    pub(crate) fn new(sink: Box<dyn Sink>, route: SinkRoute) -> Self {
        SinkSlot {
            sink,
            route,
            disabled: None,
            encryption_requested: false,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.sink.name()
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    pub(crate) fn write_batch(&mut self, messages: &[Arc<LogMessage>]) -> Vec<SinkResult<()>> {
        if let Some(reason) = &self.disabled {
            let err = SinkError::Disabled(reason.clone());
            return messages.iter().map(|_| Err(err.clone())).collect();
        }
        self.sink.write_batch(messages)
    }

    pub(crate) fn request_encryption(&mut self, requested: bool) {
        if self.encryption_requested != requested {
            self.encryption_requested = requested;
            self.sink.set_encryption_requested(requested);
        }
    }

    /// Mark disabled for the rest of the run. Returns false if it already was.
    pub(crate) fn disable(&mut self, reason: String) -> bool {
        if self.disabled.is_some() {
            return false;
        }
        error!(sink = self.sink.name(), %reason, "sink disabled");
        self.disabled = Some(reason);
        true
    }

    pub(crate) fn flush(&mut self) -> SinkResult<()> {
        if self.disabled.is_some() {
            return Ok(());
        }
        self.sink.flush()
    }

    pub(crate) fn close(&mut self) {
        self.sink.close();
    }
}

/// Shared set of sink slots. Workers lock one slot at a time.
#[derive(Clone, Default)]
pub(crate) struct SinkSet {
    slots: Vec<Arc<Mutex<SinkSlot>>>,
}

impl SinkSet {
    pub(crate) fn new(sinks: Vec<(Box<dyn Sink>, SinkRoute)>) -> Self {
        SinkSet {
            slots: sinks
                .into_iter()
                .map(|(sink, route)| Arc::new(Mutex::new(SinkSlot::new(sink, route))))
                .collect(),
        }
    }

    pub(crate) fn slots(&self) -> &[Arc<Mutex<SinkSlot>>] {
        &self.slots
    }

    /// Enabled slots serving `method`.
    pub(crate) fn targets(&self, method: PersistMethod) -> Vec<Arc<Mutex<SinkSlot>>> {
        self.slots
            .iter()
            .filter(|slot| {
                let slot = slot.lock();
                !slot.is_disabled() && slot.route.serves(method)
            })
            .cloned()
            .collect()
    }

    /// Whether any sink, enabled or not, is routed for `method`.
    pub(crate) fn routes(&self, method: PersistMethod) -> bool {
        self.slots.iter().any(|slot| slot.lock().route.serves(method))
    }

    /// Distinct concrete methods served by any sink.
    pub(crate) fn distinct_methods(&self) -> usize {
        let methods: BTreeSet<PersistMethod> = self
            .slots
            .iter()
            .flat_map(|slot| slot.lock().route.methods().collect::<Vec<_>>())
            .collect();
        methods.len()
    }

    pub(crate) fn statuses(&self) -> Vec<SinkStatus> {
        self.slots
            .iter()
            .map(|slot| {
                let slot = slot.lock();
                SinkStatus {
                    name: slot.name().to_string(),
                    route: slot.route.clone(),
                    disabled: slot.disabled.clone(),
                }
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Name, route and disabled reason of one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkStatus {
    pub name: String,
    pub route: SinkRoute,
    pub disabled: Option<String>,
}
