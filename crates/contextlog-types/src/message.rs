// Log message records
//
// A `RawMessage` is what producers build. It becomes a `LogMessage` only by
// going through an importance resolver, so every `LogMessage` carries exactly
// one resolved importance that no later stage can rewrite.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::importance::Importance;
use crate::instance::InstanceId;
use crate::severity::Severity;
use crate::text::{bounded, COMPONENT_BUDGET, FILE_BUDGET, FUNCTION_BUDGET, MESSAGE_BUDGET};
use crate::timestamp::Timestamp;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Small stable id for the calling thread, assigned on first use.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// Process-unique, monotonically increasing message id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    pub fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that can map `(severity, component, function)` to an importance.
///
/// The decider depends on this capability rather than on a concrete resolver.
pub trait ResolveImportance: Send + Sync {
    fn resolve(&self, severity: Severity, component: &str, function: &str) -> Importance;
}

/// Severity defaults only, no overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImportance;

impl ResolveImportance for DefaultImportance {
    fn resolve(&self, severity: Severity, _component: &str, _function: &str) -> Importance {
        Importance::default_for(severity)
    }
}

impl<R: ResolveImportance + ?Sized> ResolveImportance for Arc<R> {
    fn resolve(&self, severity: Severity, component: &str, function: &str) -> Importance {
        (**self).resolve(severity, component, function)
    }
}

impl<R: ResolveImportance + ?Sized> ResolveImportance for &R {
    fn resolve(&self, severity: Severity, component: &str, function: &str) -> Importance {
        (**self).resolve(severity, component, function)
    }
}

/// Unresolved message as built by a producer.
#[derive(Debug, Clone)]
pub struct RawMessage {
    id: MessageId,
    instance: Arc<InstanceId>,
    severity: Severity,
    timestamp: Timestamp,
    thread_id: u64,
    line_number: u32,
    message: String,
    component: String,
    function: String,
    file: String,
}

impl RawMessage {
    /// Build a message, stamping id, time and thread. Text is bounded here.
    pub fn new(
        instance: Arc<InstanceId>,
        severity: Severity,
        component: &str,
        function: &str,
        message: &str,
    ) -> Self {
        RawMessage {
            id: MessageId::next(),
            instance,
            severity,
            timestamp: Timestamp::now(),
            thread_id: current_thread_id(),
            line_number: 0,
            message: bounded(message, MESSAGE_BUDGET),
            component: bounded(component, COMPONENT_BUDGET),
            function: bounded(function, FUNCTION_BUDGET),
            file: String::new(),
        }
    }

    /// Attach a source location.
    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.file = bounded(file, FILE_BUDGET);
        self.line_number = line;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Run the resolver and seal the importance.
    pub fn resolve_with<R: ResolveImportance + ?Sized>(self, resolver: &R) -> LogMessage {
        let importance = resolver.resolve(self.severity, &self.component, &self.function);
        self.into_resolved(importance)
    }

    /// Seal with an importance chosen by the caller; used for internal notices.
    pub fn into_resolved(self, importance: Importance) -> LogMessage {
        LogMessage {
            id: self.id,
            instance: self.instance,
            severity: self.severity,
            importance,
            timestamp: self.timestamp,
            thread_id: self.thread_id,
            line_number: self.line_number,
            message: self.message,
            component: self.component,
            function: self.function,
            file: self.file,
        }
    }
}

/// A resolved, immutable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    id: MessageId,
    instance: Arc<InstanceId>,
    severity: Severity,
    importance: Importance,
    timestamp: Timestamp,
    thread_id: u64,
    line_number: u32,
    message: String,
    component: String,
    function: String,
    file: String,
}

impl LogMessage {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn importance(&self) -> Importance {
        self.importance
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn process_id(&self) -> u32 {
        self.instance.process_id()
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn file(&self) -> Option<&str> {
        if self.file.is_empty() {
            None
        } else {
            Some(&self.file)
        }
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}] {} {}::{} - {}",
            self.timestamp,
            self.severity,
            self.importance,
            self.instance,
            self.component,
            self.function,
            self.message
        )
    }
}
