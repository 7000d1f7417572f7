// Logger runtime
//
// A constructed value, never a global: it owns the resolver, the policy
// manager, the queue, the sink workers and the evaluator thread for one
// application instance. Producer-facing calls never fail; they return a
// `LogOutcome` and everything else shows up in the statistics.

mod evaluator;
mod instance;
mod pipeline;
mod registry;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use contextlog_error::{
    result_to_option, IntoBoxError, PolicyResult, QueueError, QueueResult, Result, Retryable,
};
use contextlog_types::{
    AdaptiveTrigger, Importance, InstanceId, PersistencePolicy, PolicyPreset, Severity,
};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::LoggerConfig;
use crate::context::{ContextSampler, StaticProbe, SysinfoProbe, SystemProbe};
use crate::importance::{ImportanceResolver, ResolutionCounts};
use crate::persistence::PersistenceDecider;
use crate::policy::{EvaluationReport, PolicyManager, TriggerStatus};
use crate::queue::{QueueStats, SmartQueue};
use crate::sink::{spawn_workers, Sink, SinkRoute, SinkSet, SinkStatus, WorkerContext};
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::telemetry;

use evaluator::Evaluator;
use instance::ActivityCounters;
use pipeline::Pipeline;

pub use instance::InstanceInfo;
pub use pipeline::{LogOutcome, INTERNAL_COMPONENT};
pub use registry::Registry;

//-----------------------------------------------------------------------------
// Builder
//-----------------------------------------------------------------------------

/// Collects the pieces a runtime is started with.
pub struct RuntimeBuilder {
    config: LoggerConfig,
    sinks: Vec<(Box<dyn Sink>, SinkRoute)>,
    probe: Option<Box<dyn SystemProbe>>,
    resolver: Option<Arc<ImportanceResolver>>,
    install_tracing: bool,
}

impl RuntimeBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        RuntimeBuilder {
            config,
            sinks: Vec::new(),
            probe: None,
            resolver: None,
            install_tracing: false,
        }
    }

    pub fn application(&self) -> &str {
        &self.config.application_name
    }

    pub fn with_sink(mut self, sink: impl Sink + 'static, route: SinkRoute) -> Self {
        self.sinks.push((Box::new(sink), route));
        self
    }

    /// Replace the host probe chosen by `LoggerConfig::system_probe`.
    pub fn with_probe(mut self, probe: impl SystemProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Share an override table with other runtimes or with the caller.
    pub fn with_resolver(mut self, resolver: Arc<ImportanceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Install the global `tracing` subscriber described by
    /// `LoggerConfig::telemetry` when the runtime is built. If another
    /// subscriber is already installed it is left in place.
    pub fn with_tracing(mut self) -> Self {
        self.install_tracing = true;
        self
    }

    /// Validate the configuration and start the threads.
    pub fn build(self) -> Result<LoggerRuntime> {
        let RuntimeBuilder {
            config,
            sinks,
            probe,
            resolver,
            install_tracing,
        } = self;
        config.validate().map_err(IntoBoxError::into_box_error)?;

        let tracing_installed = install_tracing
            && match telemetry::init_from_settings(&config.telemetry) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "tracing subscriber not installed");
                    false
                }
            };

        let application = config.application_name.trim().to_string();
        let stats = Arc::new(StatsRecorder::new());
        let probe: Box<dyn SystemProbe> = match probe {
            Some(probe) => probe,
            None if config.system_probe => Box::new(SysinfoProbe::new()),
            None => Box::new(StaticProbe::idle()),
        };
        let sampler = ContextSampler::new(probe, config.sampler);
        let manager = PolicyManager::new(
            &application,
            config.initial_policy(),
            sampler,
            config.history_capacity,
            Arc::clone(&stats),
        )
        .map_err(IntoBoxError::into_box_error)?;
        let manager = Arc::new(manager);
        manager.sample_context(0.0);

        let queue = Arc::new(SmartQueue::new(config.queue_capacity()));
        let pipeline = Arc::new(Pipeline {
            instance: Arc::new(InstanceId::current(
                &application,
                config.process_tag.as_deref(),
            )),
            decider: PersistenceDecider::new(resolver.unwrap_or_default()),
            manager: Arc::clone(&manager),
            queue: Arc::clone(&queue),
            stats: Arc::clone(&stats),
            activity: ActivityCounters::new(),
        });

        let sinks = SinkSet::new(sinks);
        let worker_count = config
            .worker_threads
            .unwrap_or_else(|| sinks.distinct_methods().max(1));
        let notice_pipeline = Arc::clone(&pipeline);
        let worker_ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            sinks: sinks.clone(),
            manager: Arc::clone(&manager),
            stats: Arc::clone(&stats),
            retry: config.retry,
            idle_timeout: config.worker_idle_timeout,
            notice: Arc::new(move |text: String| {
                notice_pipeline.notice(Importance::Critical, &text);
            }),
        });
        let workers = match spawn_workers(worker_ctx, worker_count, &application) {
            Ok(workers) => workers,
            Err(err) => {
                queue.shutdown();
                return Err(err.into_box_error());
            }
        };

        let evaluator = if config.adaptive_evaluation {
            match Evaluator::start(
                Arc::clone(&pipeline),
                config.evaluation_interval,
                config.sampler.min_interval,
            ) {
                Ok(evaluator) => Some(evaluator),
                Err(err) => {
                    queue.shutdown();
                    return Err(err.into_box_error());
                }
            }
        } else {
            None
        };

        info!(
            application = %application,
            policy = %manager.policy().name,
            workers = workers.len(),
            sinks = sinks.len(),
            capacity = queue.capacity(),
            "logger runtime started"
        );

        Ok(LoggerRuntime {
            pipeline,
            sinks,
            config,
            workers: Mutex::new(workers),
            evaluator: Mutex::new(evaluator),
            closed: AtomicBool::new(false),
            tracing_installed,
        })
    }
}

//-----------------------------------------------------------------------------
// Runtime
//-----------------------------------------------------------------------------

pub struct LoggerRuntime {
    pipeline: Arc<Pipeline>,
    sinks: SinkSet,
    config: LoggerConfig,
    workers: Mutex<Vec<JoinHandle<()>>>,
    evaluator: Mutex<Option<Evaluator>>,
    closed: AtomicBool,
    tracing_installed: bool,
}

impl fmt::Debug for LoggerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRuntime")
            .field("instance", &self.pipeline.instance)
            .field("queue", &self.pipeline.queue)
            .field("sinks", &self.sinks.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LoggerRuntime {
    pub fn builder(config: LoggerConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// Start with no sinks; persisted messages are consumed by the workers.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        RuntimeBuilder::new(config).build()
    }

    pub fn application(&self) -> &str {
        self.pipeline.instance.application()
    }

    pub fn instance(&self) -> &InstanceId {
        &self.pipeline.instance
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Whether building this runtime installed the global subscriber.
    pub fn tracing_installed(&self) -> bool {
        self.tracing_installed
    }

    //-------------------------------------------------------------------------
    // Producer API
    //-------------------------------------------------------------------------

    /// Resolve, decide and enqueue one message. Never blocks on sink I/O.
    pub fn log(
        &self,
        severity: Severity,
        component: &str,
        function: &str,
        text: &str,
        file: Option<&str>,
        line: Option<u32>,
    ) -> LogOutcome {
        let location = match (file, line) {
            (None, None) => None,
            (file, line) => Some((file.unwrap_or(""), line.unwrap_or(0))),
        };
        self.pipeline
            .log(severity, component, function, text, location)
    }

    pub fn trace(&self, component: &str, function: &str, text: &str) -> LogOutcome {
        self.log(Severity::Trace, component, function, text, None, None)
    }

    pub fn debug(&self, component: &str, function: &str, text: &str) -> LogOutcome {
        self.log(Severity::Debug, component, function, text, None, None)
    }

    pub fn info(&self, component: &str, function: &str, text: &str) -> LogOutcome {
        self.log(Severity::Info, component, function, text, None, None)
    }

    pub fn warn(&self, component: &str, function: &str, text: &str) -> LogOutcome {
        self.log(Severity::Warn, component, function, text, None, None)
    }

    pub fn error(&self, component: &str, function: &str, text: &str) -> LogOutcome {
        self.log(Severity::Error, component, function, text, None, None)
    }

    pub fn critical(&self, component: &str, function: &str, text: &str) -> LogOutcome {
        self.log(Severity::Critical, component, function, text, None, None)
    }

    /// Wait until everything enqueued so far has been handed to the sinks,
    /// then flush them. Bounded by `flush_timeout`.
    pub fn flush(&self) -> QueueResult<()> {
        if self.is_closed() {
            return Err(QueueError::ShuttingDown);
        }
        self.pipeline.queue.wait_drained(self.config.flush_timeout)?;
        self.flush_sinks();
        Ok(())
    }

    fn flush_sinks(&self) {
        for slot in self.sinks.slots() {
            let mut slot = slot.lock();
            let err = match slot.flush() {
                Ok(()) => continue,
                Err(err) => err,
            };
            if err.is_retryable() {
                warn!(sink = slot.name(), error = %err, "sink flush failed");
                continue;
            }
            let name = slot.name().to_string();
            if slot.disable(err.to_string()) {
                drop(slot);
                self.pipeline.stats.record_sink_disabled();
                self.pipeline
                    .notice(Importance::Critical, &format!("sink `{name}` disabled: {err}"));
            }
        }
    }

    //-------------------------------------------------------------------------
    // Statistics
    //-------------------------------------------------------------------------

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.pipeline.stats.snapshot()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.pipeline.queue.stats()
    }

    pub fn queue_len(&self) -> usize {
        self.pipeline.queue.size()
    }

    pub fn sink_statuses(&self) -> Vec<SinkStatus> {
        self.sinks.statuses()
    }

    pub fn instance_info(&self) -> InstanceInfo {
        self.pipeline.activity.info(&self.pipeline.instance)
    }

    pub fn resolution_counts(&self) -> ResolutionCounts {
        self.resolver().resolution_counts()
    }

    //-------------------------------------------------------------------------
    // Resolver and policy
    //-------------------------------------------------------------------------

    /// Override table used by this runtime; edits apply to the next message.
    pub fn resolver(&self) -> &Arc<ImportanceResolver> {
        self.pipeline.decider.resolver()
    }

    pub fn policy_manager(&self) -> &Arc<PolicyManager> {
        &self.pipeline.manager
    }

    pub fn set_policy(&self, policy: PersistencePolicy) -> PolicyResult<()> {
        self.pipeline.manager.set_policy(policy)
    }

    pub fn get_policy(&self) -> Arc<PersistencePolicy> {
        self.pipeline.manager.policy()
    }

    pub fn rollback_policy(&self, steps: usize) -> PolicyResult<Arc<PersistencePolicy>> {
        self.pipeline.manager.rollback_policy(steps)
    }

    pub fn apply_preset(&self, preset: PolicyPreset) -> PolicyResult<()> {
        self.pipeline.manager.apply_preset(preset)
    }

    pub fn add_critical_component(&self, pattern: &str) -> PolicyResult<()> {
        self.pipeline.manager.add_critical_component(pattern)
    }

    pub fn remove_critical_component(&self, pattern: &str) -> PolicyResult<()> {
        self.pipeline.manager.remove_critical_component(pattern)
    }

    pub fn add_ignored_component(&self, pattern: &str) -> PolicyResult<()> {
        self.pipeline.manager.add_ignored_component(pattern)
    }

    pub fn remove_ignored_component(&self, pattern: &str) -> PolicyResult<()> {
        self.pipeline.manager.remove_ignored_component(pattern)
    }

    //-------------------------------------------------------------------------
    // Emergency mode and triggers
    //-------------------------------------------------------------------------

    pub fn enter_emergency(&self, duration: Duration) {
        self.pipeline.manager.enter_emergency(duration);
    }

    pub fn exit_emergency(&self) {
        self.pipeline.manager.exit_emergency();
    }

    pub fn is_emergency(&self) -> bool {
        self.pipeline.manager.is_emergency()
    }

    pub fn emergency_remaining(&self) -> Option<Duration> {
        self.pipeline.manager.emergency_remaining()
    }

    pub fn extend_emergency(&self, extra: Duration) -> bool {
        self.pipeline.manager.extend_emergency(extra)
    }

    pub fn add_trigger(&self, trigger: AdaptiveTrigger) -> PolicyResult<()> {
        self.pipeline.manager.add_trigger(trigger)
    }

    pub fn remove_trigger(&self, id: u32) -> PolicyResult<()> {
        self.pipeline.manager.remove_trigger(id)
    }

    pub fn set_trigger_enabled(&self, id: u32, enabled: bool) -> PolicyResult<()> {
        self.pipeline.manager.set_trigger_enabled(id, enabled)
    }

    pub fn triggers(&self) -> Vec<TriggerStatus> {
        self.pipeline.manager.triggers()
    }

    /// Run one adaptive evaluation now instead of waiting for the evaluator.
    pub fn evaluate_now(&self) -> EvaluationReport {
        evaluator::evaluate(&self.pipeline)
    }

    //-------------------------------------------------------------------------
    // Shutdown
    //-------------------------------------------------------------------------

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting messages, drain the queue into the sinks and stop every
    /// thread. Idempotent; also runs on drop.
    ///
    /// Returns `DrainTimeout` if entries were still queued after
    /// `flush_timeout`; those entries are discarded and counted as evicted.
    pub fn close(&self) -> QueueResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(mut evaluator) = self.evaluator.lock().take() {
            evaluator.stop();
        }

        let queue = &self.pipeline.queue;
        queue.shutdown();
        let drained = queue.wait_drained(self.config.flush_timeout);
        if drained.is_err() {
            let discarded = queue.clear();
            self.pipeline.stats.record_evicted(discarded as u64);
        }

        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                warn!(application = %self.application(), "sink worker panicked");
            }
        }

        for slot in self.sinks.slots() {
            let mut slot = slot.lock();
            result_to_option!(slot.flush(), "final sink flush failed");
            slot.close();
        }

        let stats = self.pipeline.stats.snapshot();
        info!(
            application = %self.application(),
            decisions = stats.total_decisions,
            persisted = stats.total_persisted,
            dropped = stats.total_dropped.total(),
            "logger runtime closed"
        );
        drained
    }
}

impl Drop for LoggerRuntime {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
