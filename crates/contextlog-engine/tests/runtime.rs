// Runtime integration tests: producers, sink workers, flush, shutdown and the
// statistics they leave behind.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contextlog_engine::{
    Environment, LogOutcome, LoggerConfig, LoggerRuntime, MemorySink, Registry,
    RetryPolicy, Sink, SinkRoute, StaticProbe,
};
use contextlog_error::{ConfigError, PolicyError, QueueError, SinkError, SinkResult};
use contextlog_types::{
    AdaptiveTrigger, DropReason, Importance, LogMessage, PersistMethod, PersistencePolicy,
    PolicyPatch, PolicyPreset, Severity, SystemSample, TriggerCondition,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn quiet_config(application: &str) -> LoggerConfig {
    let mut config = LoggerConfig::new(application)
        .with_environment(Environment::Test)
        .with_adaptive_evaluation(false)
        .with_system_probe(false)
        .with_worker_threads(1)
        .with_flush_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(5),
            max_attempts: 3,
        });
    config.sampler.min_interval = Duration::ZERO;
    config
}

fn assert_conserved(runtime: &LoggerRuntime) {
    let stats = runtime.stats_snapshot();
    assert_eq!(
        stats.total_decisions,
        stats.total_persisted + stats.total_dropped.total(),
        "{stats:?}"
    );
}

/// Fails every write with a fatal error.
struct BrokenSink;

impl Sink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn write_one(&mut self, _message: &Arc<LogMessage>) -> SinkResult<()> {
        Err(SinkError::fatal("disk gone"))
    }
}

/// Reports a retryable error for the first `failures` writes.
struct FlakySink {
    failures: Arc<AtomicU32>,
    written: Arc<Mutex<Vec<String>>>,
}

impl Sink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    fn write_one(&mut self, message: &Arc<LogMessage>) -> SinkResult<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(SinkError::retryable("busy"));
        }
        self.written.lock().push(message.message().to_string());
        Ok(())
    }
}

#[test]
fn persisted_messages_reach_the_sink() {
    let (sink, recent) = MemorySink::new("memory", 64);
    let runtime = LoggerRuntime::builder(quiet_config("delivery"))
        .with_sink(sink, SinkRoute::all())
        .build()
        .unwrap();

    assert!(runtime.info("Api", "get", "hello").is_queued());
    assert_eq!(
        runtime.debug("Api", "get", "noise"),
        LogOutcome::Dropped(DropReason::BelowMin)
    );
    assert!(runtime
        .log(Severity::Warn, "Api", "put", "slow", Some("src/api.rs"), Some(42))
        .is_queued());

    runtime.flush().unwrap();
    let mut texts = recent.texts();
    texts.sort();
    assert_eq!(texts, vec!["hello".to_string(), "slow".to_string()]);
    let slow = recent
        .messages()
        .into_iter()
        .find(|m| m.message() == "slow")
        .unwrap();
    assert_eq!(slow.file(), Some("src/api.rs"));
    assert_eq!(slow.line_number(), 42);
    assert_eq!(slow.importance(), Importance::High);
    assert!(recent.flush_count() >= 1);

    let stats = runtime.stats_snapshot();
    assert_eq!(stats.total_decisions, 3);
    assert_eq!(stats.total_persisted, 2);
    assert_eq!(stats.total_dropped.below_min, 1);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.persistence_latency.samples, 2);
    assert_conserved(&runtime);
}

#[test]
fn statistics_are_conserved_under_concurrency() {
    let config = quiet_config("conservation")
        .with_queue_capacity(4)
        .with_worker_threads(2);
    let runtime = Arc::new(LoggerRuntime::new(config).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                for i in 0..100 {
                    let severity = Severity::ALL[(t + i) % Severity::ALL.len()];
                    runtime.log(severity, "Load", "spin", &format!("{t}/{i}"), None, None);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    runtime.flush().unwrap();
    let stats = runtime.stats_snapshot();
    assert_eq!(stats.total_decisions, 400);
    assert_eq!(runtime.instance_info().messages_logged, 400);
    assert_conserved(&runtime);
    assert!(runtime.queue_stats().peak_size <= 4);
}

#[test]
fn fatal_sink_is_disabled_and_announced() {
    let (sink, recent) = MemorySink::new("memory", 64);
    let runtime = LoggerRuntime::builder(quiet_config("fatal"))
        .with_sink(BrokenSink, SinkRoute::all())
        .with_sink(sink, SinkRoute::all())
        .build()
        .unwrap();

    assert!(runtime.error("Payments", "charge", "boom").is_queued());
    runtime.flush().unwrap();

    let statuses = runtime.sink_statuses();
    assert_eq!(statuses[0].name, "broken");
    assert!(statuses[0]
        .disabled
        .as_deref()
        .is_some_and(|reason| reason.contains("disk gone")));
    assert_eq!(statuses[1].disabled, None);

    let texts = recent.texts();
    assert_eq!(texts[0], "boom");
    assert!(texts[1].contains("sink `broken` disabled"));
    let notice = &recent.messages()[1];
    assert_eq!(notice.importance(), Importance::Critical);
    assert_eq!(notice.component(), "contextlog");

    let stats = runtime.stats_snapshot();
    assert_eq!(stats.disabled_sinks, 1);
    assert_eq!(stats.internal_notices, 1);
    assert_conserved(&runtime);
}

#[test]
fn disabled_sinks_do_not_count_as_delivered() {
    let runtime = LoggerRuntime::builder(quiet_config("all-disabled"))
        .with_sink(BrokenSink, SinkRoute::all())
        .build()
        .unwrap();

    runtime.error("Payments", "charge", "first");
    runtime.flush().unwrap();
    let before = runtime.stats_snapshot();
    assert_eq!(before.disabled_sinks, 1);
    assert_eq!(before.written, 0);

    for i in 0..5 {
        assert!(runtime.warn("Payments", "charge", &format!("after {i}")).is_queued());
    }
    runtime.flush().unwrap();

    let after = runtime.stats_snapshot();
    assert_eq!(after.written, 0);
    assert_eq!(after.write_failures, before.write_failures + 5);
    assert_eq!(after.disabled_sinks, 1);
    assert_conserved(&runtime);
}

#[test]
fn unbounded_durations_are_accepted() {
    let mut config = quiet_config("unbounded")
        .with_adaptive_evaluation(true)
        .with_evaluation_interval(Duration::MAX)
        .with_flush_timeout(Duration::MAX);
    config.worker_idle_timeout = Duration::MAX;
    let (sink, recent) = MemorySink::new("memory", 8);
    let runtime = LoggerRuntime::builder(config)
        .with_sink(sink, SinkRoute::all())
        .build()
        .unwrap();

    assert!(runtime.warn("Api", "put", "waits forever").is_queued());
    runtime.flush().unwrap();
    assert_eq!(recent.texts(), vec!["waits forever".to_string()]);
    runtime.close().unwrap();
}

#[test]
fn retryable_errors_are_retried() {
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = FlakySink {
        failures: Arc::new(AtomicU32::new(2)),
        written: Arc::clone(&written),
    };
    let runtime = LoggerRuntime::builder(quiet_config("retry"))
        .with_sink(sink, SinkRoute::only(&[PersistMethod::File]))
        .build()
        .unwrap();

    runtime.warn("Api", "put", "eventually");
    runtime.flush().unwrap();

    assert_eq!(*written.lock(), vec!["eventually".to_string()]);
    let stats = runtime.stats_snapshot();
    assert_eq!(stats.sink_retries, 2);
    assert_eq!(stats.written, 1);
    assert_eq!(stats.write_failures, 0);
}

#[test]
fn exhausted_retries_count_as_failures() {
    let sink = FlakySink {
        failures: Arc::new(AtomicU32::new(u32::MAX)),
        written: Arc::new(Mutex::new(Vec::new())),
    };
    let runtime = LoggerRuntime::builder(quiet_config("exhausted"))
        .with_sink(sink, SinkRoute::all())
        .build()
        .unwrap();

    runtime.warn("Api", "put", "never");
    runtime.flush().unwrap();

    let stats = runtime.stats_snapshot();
    assert_eq!(stats.write_failures, 1);
    assert_eq!(stats.written, 0);
    assert_eq!(stats.sink_retries, 2);
    assert_eq!(runtime.sink_statuses()[0].disabled, None);
}

#[test]
fn close_is_idempotent_and_rejects_producers() {
    let (sink, recent) = MemorySink::new("memory", 8);
    let runtime = LoggerRuntime::builder(quiet_config("shutdown"))
        .with_sink(sink, SinkRoute::all())
        .build()
        .unwrap();

    runtime.critical("Core", "main", "last words");
    runtime.close().unwrap();
    assert!(runtime.is_closed());
    assert!(recent.is_closed());
    assert_eq!(recent.texts(), vec!["last words".to_string()]);

    assert_eq!(
        runtime.critical("Core", "main", "too late"),
        LogOutcome::Dropped(DropReason::ShuttingDown)
    );
    assert!(matches!(runtime.flush(), Err(QueueError::ShuttingDown)));
    assert!(runtime.close().is_ok());
    assert_eq!(runtime.stats_snapshot().total_dropped.shutting_down, 1);
    assert_conserved(&runtime);
}

#[test]
fn policy_round_trips_through_the_runtime() {
    let runtime = LoggerRuntime::new(quiet_config("policy")).unwrap();
    let original = runtime.get_policy();
    assert_eq!(original.name, "default");

    let strict = PersistencePolicy::new("strict").with_min_importance(Importance::High);
    runtime.set_policy(strict.clone()).unwrap();
    assert_eq!(*runtime.get_policy(), strict);
    assert_eq!(
        runtime.info("Api", "get", "dropped now"),
        LogOutcome::Dropped(DropReason::BelowMin)
    );

    let invalid = PersistencePolicy::new("bad").with_critical_component("");
    assert!(matches!(
        runtime.set_policy(invalid),
        Err(PolicyError::Invalid(_))
    ));
    assert_eq!(*runtime.get_policy(), strict);

    runtime.rollback_policy(1).unwrap();
    assert_eq!(runtime.get_policy(), original);

    runtime.apply_preset(PolicyPreset::HighPerformance).unwrap();
    assert_eq!(runtime.get_policy().name, "high_performance");
    assert!(matches!(
        runtime.rollback_policy(99),
        Err(PolicyError::RollbackOutOfRange { .. })
    ));
}

#[test]
fn resolver_overrides_apply_to_the_next_message() {
    let runtime = LoggerRuntime::new(quiet_config("overrides")).unwrap();
    assert_eq!(
        runtime.debug("Audit", "record", "before"),
        LogOutcome::Dropped(DropReason::BelowMin)
    );

    runtime
        .resolver()
        .add_component_override("Audit", Importance::Critical);
    assert!(runtime.debug("Audit", "record", "after").is_queued());

    runtime.add_ignored_component("Chatty*").unwrap();
    assert_eq!(
        runtime.critical("ChattyCache", "get", "ignored"),
        LogOutcome::Dropped(DropReason::Ignored)
    );

    let stats = runtime.stats_snapshot();
    assert_eq!(stats.forced_critical, 1);
    assert_eq!(runtime.resolution_counts().total(), 3);
    assert_conserved(&runtime);
}

#[test]
fn stress_enters_emergency_and_keeps_medium_messages() {
    let probe = StaticProbe::idle();
    let runtime = LoggerRuntime::builder(quiet_config("emergency"))
        .with_probe(probe.clone())
        .build()
        .unwrap();

    runtime.enter_emergency(Duration::ZERO);
    assert!(!runtime.is_emergency());
    assert_eq!(runtime.emergency_remaining(), None);

    probe.set_cpu(92.0);
    let report = runtime.evaluate_now();
    assert!(!report.entered_emergency);
    assert_eq!(
        runtime.info("Api", "get", "shed"),
        LogOutcome::Dropped(DropReason::Shed)
    );

    probe.set(SystemSample::new(97.0, 10.0, 10.0, 0.0));
    let report = runtime.evaluate_now();
    assert!(report.entered_emergency);
    assert!(runtime.is_emergency());
    assert!(runtime.emergency_remaining().is_some());
    assert!(runtime.info("Api", "get", "kept").is_queued());
    assert_eq!(
        runtime.debug("Api", "get", "below floor"),
        LogOutcome::Dropped(DropReason::EmergencyFloor)
    );

    runtime.exit_emergency();
    assert!(!runtime.is_emergency());
    assert_conserved(&runtime);
}

#[test]
fn adaptive_trigger_tightens_policy() {
    let probe = StaticProbe::idle();
    let runtime = LoggerRuntime::builder(quiet_config("triggers"))
        .with_probe(probe.clone())
        .build()
        .unwrap();

    let trigger = AdaptiveTrigger::new(
        1,
        "tighten under load",
        TriggerCondition::default().stress_at_least(50.0),
        PolicyPatch::default().min_importance(Importance::High),
    );
    runtime.add_trigger(trigger).unwrap();

    assert_eq!(runtime.evaluate_now().fired_trigger, None);

    probe.set_cpu(60.0);
    let report = runtime.evaluate_now();
    assert_eq!(report.fired_trigger, Some(1));
    assert!(report.policy_changed);
    assert_eq!(runtime.get_policy().min_persist_importance, Importance::High);
    assert_eq!(runtime.triggers()[0].activations, 1);

    runtime.remove_trigger(1).unwrap();
    assert!(runtime.triggers().is_empty());
}

#[test]
fn broken_trigger_is_disabled_with_a_notice() {
    let (sink, recent) = MemorySink::new("memory", 8);
    let runtime = LoggerRuntime::builder(quiet_config("bad-trigger"))
        .with_sink(sink, SinkRoute::all())
        .build()
        .unwrap();

    let trigger = AdaptiveTrigger::new(
        7,
        "empty pattern",
        TriggerCondition::default().stress_at_least(0.0),
        PolicyPatch::default().critical_component(""),
    );
    runtime.add_trigger(trigger).unwrap();

    let report = runtime.evaluate_now();
    assert_eq!(report.disabled_triggers.len(), 1);
    assert_eq!(report.disabled_triggers[0].0, 7);
    assert!(runtime.triggers()[0].fault.is_some());

    // A faulted trigger is skipped from then on.
    assert!(runtime.evaluate_now().disabled_triggers.is_empty());

    runtime.flush().unwrap();
    let notices: Vec<_> = recent
        .messages()
        .into_iter()
        .filter(|m| m.component() == "contextlog")
        .collect();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].importance(), Importance::High);
    assert_eq!(runtime.stats_snapshot().internal_notices, 1);
}

#[test]
fn invalid_configuration_refuses_to_start() {
    let config = LoggerConfig::new("").with_queue_capacity(0);
    let err = LoggerRuntime::new(config).unwrap_err();
    let config_err = err.downcast_ref::<ConfigError>().unwrap();
    assert_eq!(config_err.issues().len(), 2);
}

#[test]
fn instance_info_counts_activity() {
    let runtime = LoggerRuntime::new(quiet_config("activity").with_process_tag("blue")).unwrap();
    runtime.info("Api", "get", "a");
    runtime.error("Api", "get", "b");
    runtime.trace("Api", "get", "c");

    let info = runtime.instance_info();
    assert_eq!(info.messages_logged, 3);
    assert_eq!(info.errors_logged, 1);
    assert_eq!(info.instance.application(), "activity");
    assert_eq!(info.instance.tag(), Some("blue"));
}

#[test]
fn registry_keeps_one_runtime_per_application() {
    let registry = Registry::new();
    let orders = registry.open(quiet_config("orders")).unwrap();
    registry.open(quiet_config("billing")).unwrap();
    assert!(registry.open(quiet_config("orders")).is_err());

    assert_eq!(registry.applications(), vec!["billing", "orders"]);
    assert!(Arc::ptr_eq(&registry.get("orders").unwrap(), &orders));

    assert!(registry.remove("billing").is_some());
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.shutdown_all(), 1);
    assert!(orders.is_closed());
    assert!(registry.is_empty());
}
