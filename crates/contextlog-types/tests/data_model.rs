// Integration tests for the data model: building, resolving and serializing
// messages and policies the way the engine uses them.

use std::sync::Arc;

use contextlog_types::{
    AdaptiveTrigger, DecisionContext, Importance, InstanceId, LogMessage, PersistencePolicy,
    PolicyPatch, PolicyPreset, RawMessage, ResolveImportance, Severity, TriggerCondition,
};
use pretty_assertions::assert_eq;

struct ByComponent;

impl ResolveImportance for ByComponent {
    fn resolve(&self, severity: Severity, component: &str, _function: &str) -> Importance {
        if component == "Database" {
            Importance::High
        } else {
            Importance::default_for(severity)
        }
    }
}

#[test]
fn message_survives_json_round_trip() {
    let instance = Arc::new(InstanceId::with_process_id("orders", Some("eu"), 4242));
    let msg = RawMessage::new(instance, Severity::Info, "Database", "Connect", "pool ready")
        .with_location("src/db.rs", 88)
        .resolve_with(&ByComponent);

    let json = serde_json::to_string(&msg).unwrap();
    let back: LogMessage = serde_json::from_str(&json).unwrap();

    assert_eq!(back, msg);
    assert_eq!(back.importance(), Importance::High);
    assert_eq!(back.instance().to_string(), "orders:eu@4242");
    assert_eq!(back.file(), Some("src/db.rs"));
}

#[test]
fn policy_with_triggers_survives_export() {
    let policy = PolicyPreset::Balanced
        .policy()
        .with_critical_component("Payments*")
        .with_trigger(
            AdaptiveTrigger::new(
                7,
                "error storm",
                TriggerCondition::default().error_rate_at_least(10.0),
                PolicyPatch::default().min_importance(Importance::High).emergency_for(60),
            )
            .with_cooldown_ms(5_000),
        );

    let exported = policy.to_json().unwrap();
    let imported = PersistencePolicy::from_json(&exported).unwrap();
    assert_eq!(imported, policy);
    assert_eq!(imported.trigger(7).map(|t| t.cooldown_ms), Some(5_000));
}

#[test]
fn partial_policy_json_fills_defaults() {
    let policy = PersistencePolicy::from_json(r#"{"name":"lean","min_persist_importance":"high"}"#)
        .unwrap();
    assert_eq!(policy.min_persist_importance, Importance::High);
    assert_eq!(policy.batching, PersistencePolicy::default().batching);
    assert!(policy.adaptive_triggers.is_empty());
}

#[test]
fn trigger_condition_reads_context_by_value() {
    let cond = TriggerCondition::default().stress_at_least(80.0);
    let ctx = DecisionContext::new(80.0, 0.0, false);
    assert!(cond.matches(&ctx));
    assert!(!cond.matches(&DecisionContext::calm()));
}
