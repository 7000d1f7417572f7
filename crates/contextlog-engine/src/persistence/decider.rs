// Persistence decider
//
// Rules run in a fixed order and the first one that fires wins:
// ignored, forced critical, emergency floor, load shedding, policy minimum, normal.

use std::collections::BTreeMap;

use contextlog_types::{
    DecisionContext, DecisionReason, DropReason, Importance, LogMessage, PersistMethod,
    PersistencePolicy, RawMessage, ResolveImportance, Verdict,
};

/// Decide from the parts of a message the rules look at.
pub fn decide_importance(
    component: &str,
    importance: Importance,
    ctx: &DecisionContext,
    policy: &PersistencePolicy,
) -> Verdict {
    if policy.is_ignored_component(component) {
        return Verdict::drop(DropReason::Ignored);
    }

    if importance.is_critical() || policy.is_critical_component(component) {
        return Verdict::persist(policy.critical_method, DecisionReason::ForcedCritical);
    }

    // Emergency replaces shedding and the policy minimum with its own floor.
    if ctx.in_emergency {
        return if importance >= policy.emergency.floor {
            Verdict::persist(policy.default_method, DecisionReason::Normal)
        } else {
            Verdict::drop(DropReason::EmergencyFloor)
        };
    }

    if let Some(floor) = policy.load_shedding.floor_for(ctx.stress) {
        if importance < floor {
            return Verdict::drop(DropReason::Shed);
        }
    }

    if importance < policy.min_persist_importance {
        return Verdict::drop(DropReason::BelowMin);
    }

    Verdict::persist(policy.default_method, DecisionReason::Normal)
}

pub fn decide(message: &LogMessage, ctx: &DecisionContext, policy: &PersistencePolicy) -> Verdict {
    decide_importance(message.component(), message.importance(), ctx, policy)
}

/// One context for the whole batch; never re-sampled per message.
pub fn decide_batch<'a, I>(messages: I, ctx: &DecisionContext, policy: &PersistencePolicy) -> Vec<Verdict>
where
    I: IntoIterator<Item = &'a LogMessage>,
{
    messages
        .into_iter()
        .map(|message| decide(message, ctx, policy))
        .collect()
}

/// Indices of persisted verdicts grouped by method. Drops are left out.
pub fn group_by_method(verdicts: &[Verdict]) -> BTreeMap<PersistMethod, Vec<usize>> {
    let mut groups: BTreeMap<PersistMethod, Vec<usize>> = BTreeMap::new();
    for (index, verdict) in verdicts.iter().enumerate() {
        if let Some(method) = verdict.method() {
            groups.entry(method).or_default().push(index);
        }
    }
    groups
}

/// Only the messages that would persist, with their verdicts.
pub fn filter_persistable<'a>(
    messages: &'a [LogMessage],
    ctx: &DecisionContext,
    policy: &PersistencePolicy,
) -> Vec<(&'a LogMessage, Verdict)> {
    messages
        .iter()
        .map(|message| (message, decide(message, ctx, policy)))
        .filter(|(_, verdict)| verdict.should_persist())
        .collect()
}

/// Importance-only check for callers that want to skip building a message.
///
/// Component rules are not consulted, so a critical or ignored component can
/// still flip the real verdict.
pub fn should_persist_quick(importance: Importance, stress: f64, policy: &PersistencePolicy) -> bool {
    if importance.is_critical() {
        return true;
    }
    if let Some(floor) = policy.load_shedding.floor_for(stress) {
        if importance < floor {
            return false;
        }
    }
    importance >= policy.min_persist_importance
}

/// Decider bound to a resolver, for callers holding unresolved messages.
#[derive(Debug, Clone)]
pub struct PersistenceDecider<R: ResolveImportance> {
    resolver: R,
}

impl<R: ResolveImportance> PersistenceDecider<R> {
    pub fn new(resolver: R) -> Self {
        PersistenceDecider { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolve, then decide.
    pub fn evaluate(
        &self,
        raw: RawMessage,
        ctx: &DecisionContext,
        policy: &PersistencePolicy,
    ) -> (LogMessage, Verdict) {
        let message = raw.resolve_with(&self.resolver);
        let verdict = decide(&message, ctx, policy);
        (message, verdict)
    }

    pub fn evaluate_batch(
        &self,
        raws: Vec<RawMessage>,
        ctx: &DecisionContext,
        policy: &PersistencePolicy,
    ) -> Vec<(LogMessage, Verdict)> {
        raws.into_iter()
            .map(|raw| self.evaluate(raw, ctx, policy))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use contextlog_types::{DefaultImportance, InstanceId, LoadShedding, Severity, ShedStep};

    fn msg(component: &str, importance: Importance) -> LogMessage {
        let instance = Arc::new(InstanceId::with_process_id("decider-test", None, 1));
        RawMessage::new(instance, Severity::Info, component, "f", "text").into_resolved(importance)
    }

    fn shed_at_80() -> PersistencePolicy {
        PersistencePolicy::default()
            .with_load_shedding(LoadShedding::new(vec![ShedStep::new(80.0, Importance::High)]))
    }

    #[test]
    fn test_load_shedding_under_stress() {
        let policy = shed_at_80();
        let m = msg("Api", Importance::Medium);
        assert_eq!(
            decide(&m, &DecisionContext::new(85.0, 0.0, false), &policy),
            Verdict::drop(DropReason::Shed)
        );
        assert_eq!(
            decide(&m, &DecisionContext::new(50.0, 0.0, false), &policy),
            Verdict::persist(PersistMethod::Multi, DecisionReason::Normal)
        );
    }

    #[test]
    fn test_ignored_wins_over_everything() {
        let policy = PersistencePolicy::default().with_ignored_component("Noise*");
        let ctx = DecisionContext::new(0.0, 0.0, true);
        assert_eq!(
            decide(&msg("NoiseMaker", Importance::Critical), &ctx, &policy),
            Verdict::drop(DropReason::Ignored)
        );
    }

    #[test]
    fn test_critical_survives_overload() {
        let policy = shed_at_80().with_critical_method(PersistMethod::Database);
        let ctx = DecisionContext::new(100.0, 500.0, true);
        assert_eq!(
            decide(&msg("Api", Importance::Critical), &ctx, &policy),
            Verdict::persist(PersistMethod::Database, DecisionReason::ForcedCritical)
        );

        let policy = policy.with_critical_component("Payments");
        assert_eq!(
            decide(&msg("Payments", Importance::Low), &ctx, &policy),
            Verdict::persist(PersistMethod::Database, DecisionReason::ForcedCritical)
        );
    }

    #[test]
    fn test_emergency_suppresses_shedding() {
        let policy = shed_at_80().with_emergency_floor(Importance::Medium);
        let ctx = DecisionContext::new(95.0, 0.0, true);
        assert!(decide(&msg("Api", Importance::Medium), &ctx, &policy).should_persist());
        assert_eq!(
            decide(&msg("Api", Importance::Low), &ctx, &policy),
            Verdict::drop(DropReason::EmergencyFloor)
        );
    }

    #[test]
    fn test_below_min() {
        let policy = PersistencePolicy::default().with_min_importance(Importance::High);
        assert_eq!(
            decide(&msg("Api", Importance::Medium), &DecisionContext::calm(), &policy),
            Verdict::drop(DropReason::BelowMin)
        );
    }

    #[test]
    fn test_batch_matches_single_decisions() {
        let policy = shed_at_80();
        let ctx = DecisionContext::new(85.0, 0.0, false);
        let messages: Vec<_> = Importance::ALL.iter().map(|i| msg("Api", *i)).collect();
        let batch = decide_batch(&messages, &ctx, &policy);
        let single: Vec<_> = messages.iter().map(|m| decide(m, &ctx, &policy)).collect();
        assert_eq!(batch, single);
    }

    #[test]
    fn test_grouping_and_filtering() {
        let policy = PersistencePolicy::default().with_default_method(PersistMethod::File);
        let messages = vec![
            msg("Api", Importance::Low),
            msg("Api", Importance::High),
            msg("Api", Importance::Critical),
            msg("Api", Importance::Medium),
        ];
        let verdicts = decide_batch(&messages, &DecisionContext::calm(), &policy);
        let groups = group_by_method(&verdicts);
        assert_eq!(groups.get(&PersistMethod::File), Some(&vec![1, 3]));
        assert_eq!(groups.get(&PersistMethod::Multi), Some(&vec![2]));
        assert_eq!(groups.len(), 2);

        let kept = filter_persistable(&messages, &DecisionContext::calm(), &policy);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_quick_check() {
        let policy = shed_at_80();
        assert!(should_persist_quick(Importance::Critical, 100.0, &policy));
        assert!(!should_persist_quick(Importance::Medium, 85.0, &policy));
        assert!(should_persist_quick(Importance::Medium, 10.0, &policy));
        assert!(!should_persist_quick(Importance::Low, 10.0, &policy));
    }

    #[test]
    fn test_decider_resolves_raw_messages() {
        let decider = PersistenceDecider::new(DefaultImportance);
        let instance = Arc::new(InstanceId::with_process_id("d", None, 1));
        let raw = RawMessage::new(instance, Severity::Error, "Api", "f", "boom");
        let (message, verdict) =
            decider.evaluate(raw, &DecisionContext::calm(), &PersistencePolicy::default());
        assert_eq!(message.importance(), Importance::Critical);
        assert!(verdict.should_persist());
    }
}
