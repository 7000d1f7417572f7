// End-to-end decision scenarios: resolver, queue, decider and emergency mode
// exercised through the public engine API.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contextlog_engine::context::{ContextSampler, SamplerConfig, StaticProbe};
use contextlog_engine::persistence::{decide_importance, should_persist_quick};
use contextlog_engine::{
    EnqueueOutcome, ImportanceResolver, MatchedRule, PolicyManager, SmartQueue, StatsRecorder,
};
use contextlog_types::{
    DecisionContext, DecisionReason, DropReason, Importance, InstanceId, LoadShedding, LogMessage,
    PersistMethod, PersistencePolicy, RawMessage, Severity, ShedStep, Verdict,
};
use pretty_assertions::assert_eq;

fn message(importance: Importance, text: &str) -> Arc<LogMessage> {
    let instance = Arc::new(InstanceId::with_process_id("scenarios", None, 1));
    Arc::new(
        RawMessage::new(instance, Severity::Info, "Worker", "run", text).into_resolved(importance),
    )
}

fn dequeue_all(queue: &SmartQueue) -> Vec<(Importance, u64)> {
    let mut seen = Vec::new();
    while let Some(entry) = queue.dequeue(Duration::ZERO) {
        seen.push((entry.importance, entry.sequence));
    }
    seen
}

#[test]
fn component_override_beats_severity_default() {
    let resolver = ImportanceResolver::new();
    assert!(resolver.add_component_override("Database", Importance::High));

    let hit = resolver.resolve_detailed(Severity::Info, "Database", "Connect");
    assert_eq!(hit.importance, Importance::High);
    assert_eq!(hit.rule, MatchedRule::ComponentExact);

    let control = resolver.resolve_detailed(Severity::Info, "Cache", "Get");
    assert_eq!(control.importance, Importance::default_for(Severity::Info));
    assert_eq!(control.rule, MatchedRule::TypeDefault);
}

#[test]
fn component_function_beats_component() {
    let resolver = ImportanceResolver::new();
    resolver.add_component_override("DB", Importance::Medium);
    resolver.add_component_function_override("DB", "Save", Importance::Critical);

    assert_eq!(
        resolver.resolve_detailed(Severity::Info, "DB", "Save").importance,
        Importance::Critical
    );
    assert_eq!(
        resolver.resolve_detailed(Severity::Info, "DB", "Load").importance,
        Importance::Medium
    );
}

#[test]
fn eviction_preserves_critical() {
    let queue = SmartQueue::new(3);
    for i in 0..3 {
        assert!(queue
            .enqueue(message(Importance::Critical, &format!("crit {i}")), PersistMethod::File)
            .is_enqueued());
    }

    let outcome = queue.enqueue(message(Importance::Medium, "info"), PersistMethod::File);
    assert!(matches!(
        outcome,
        EnqueueOutcome::Rejected(DropReason::QueueFull)
    ));
    assert_eq!(queue.size(), 3);
    assert_eq!(
        dequeue_all(&queue),
        vec![
            (Importance::Critical, 1),
            (Importance::Critical, 2),
            (Importance::Critical, 3),
        ]
    );
}

#[test]
fn priority_overtaking() {
    let queue = SmartQueue::new(10);
    for i in 0..5 {
        queue.enqueue(message(Importance::Medium, &format!("info {i}")), PersistMethod::File);
    }
    queue.enqueue(message(Importance::Critical, "crit"), PersistMethod::File);

    assert_eq!(
        dequeue_all(&queue),
        vec![
            (Importance::Critical, 6),
            (Importance::Medium, 1),
            (Importance::Medium, 2),
            (Importance::Medium, 3),
            (Importance::Medium, 4),
            (Importance::Medium, 5),
        ]
    );
}

#[test]
fn load_shedding_under_stress() {
    let policy = PersistencePolicy::new("shed")
        .with_min_importance(Importance::Low)
        .with_load_shedding(LoadShedding::new(vec![ShedStep::new(80.0, Importance::High)]));

    let stressed = DecisionContext::new(85.0, 0.0, false);
    assert_eq!(
        decide_importance("Api", Importance::Medium, &stressed, &policy),
        Verdict::drop(DropReason::Shed)
    );
    assert!(!should_persist_quick(Importance::Medium, 85.0, &policy));

    let calm = DecisionContext::new(50.0, 0.0, false);
    assert_eq!(
        decide_importance("Api", Importance::Medium, &calm, &policy),
        Verdict::persist(policy.default_method, DecisionReason::Normal)
    );
}

#[test]
fn emergency_persists_medium() {
    let policy = PersistencePolicy::new("strict")
        .with_min_importance(Importance::High)
        .with_emergency_floor(Importance::Medium);
    let sampler = ContextSampler::new(
        Box::new(StaticProbe::idle()),
        SamplerConfig {
            min_interval: Duration::ZERO,
            ..Default::default()
        },
    );
    let manager =
        PolicyManager::new("scenarios", policy, sampler, 8, Arc::new(StatsRecorder::new()))
            .unwrap();

    let verdict = |manager: &PolicyManager| {
        decide_importance(
            "Api",
            Importance::Medium,
            &manager.decision_context(),
            &manager.policy(),
        )
    };

    assert_eq!(verdict(&manager), Verdict::drop(DropReason::BelowMin));

    manager.enter_emergency(Duration::from_millis(60));
    assert!(manager.is_emergency());
    assert!(verdict(&manager).should_persist());
    assert_eq!(
        verdict(&manager),
        Verdict::persist(PersistMethod::Multi, DecisionReason::Normal)
    );

    thread::sleep(Duration::from_millis(120));
    assert!(!manager.is_emergency());
    assert_eq!(verdict(&manager), Verdict::drop(DropReason::BelowMin));
}
