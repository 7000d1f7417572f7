// Policy manager
//
// The active policy is published through an `ArcSwap`, so a decision always
// sees one whole policy. Edits go through validation and copy-on-write under
// the manager's state lock; the replaced policy is pushed to the history.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use contextlog_error::{PolicyError, PolicyResult};
use contextlog_types::{AdaptiveTrigger, DecisionContext, PersistencePolicy, PolicyPreset};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::emergency::EmergencyState;
use super::history::PolicyHistory;
use super::triggers::{TriggerBook, TriggerStatus};
use crate::context::ContextSampler;
use crate::stats::StatsRecorder;

/// What one adaptive evaluation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub context: DecisionContext,
    pub fired_trigger: Option<u32>,
    pub policy_changed: bool,
    pub entered_emergency: bool,
    pub exited_emergency: bool,
    /// Triggers disabled during this evaluation, with the reason
    pub disabled_triggers: Vec<(u32, String)>,
}

impl EvaluationReport {
    fn new(context: DecisionContext) -> Self {
        EvaluationReport {
            context,
            fired_trigger: None,
            policy_changed: false,
            entered_emergency: false,
            exited_emergency: false,
            disabled_triggers: Vec::new(),
        }
    }
}

struct ManagerState {
    history: PolicyHistory,
    triggers: TriggerBook,
}

pub struct PolicyManager {
    application: String,
    active: ArcSwap<PersistencePolicy>,
    state: Mutex<ManagerState>,
    sampler: Mutex<ContextSampler>,
    last_context: ArcSwap<DecisionContext>,
    error_counter: Arc<AtomicU64>,
    emergency: EmergencyState,
    stats: Arc<StatsRecorder>,
}

impl std::fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyManager")
            .field("application", &self.application)
            .field("policy", &self.active.load().name)
            .field("emergency", &self.emergency.is_active())
            .finish()
    }
}

impl PolicyManager {
    pub fn new(
        application: &str,
        policy: PersistencePolicy,
        sampler: ContextSampler,
        history_capacity: usize,
        stats: Arc<StatsRecorder>,
    ) -> PolicyResult<Self> {
        policy.validate()?;
        let error_counter = sampler.error_counter();
        Ok(PolicyManager {
            application: application.to_string(),
            active: ArcSwap::from_pointee(policy),
            state: Mutex::new(ManagerState {
                history: PolicyHistory::new(history_capacity),
                triggers: TriggerBook::default(),
            }),
            sampler: Mutex::new(sampler),
            last_context: ArcSwap::from_pointee(DecisionContext::calm()),
            error_counter,
            emergency: EmergencyState::new(),
            stats,
        })
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    //-------------------------------------------------------------------------
    // Policy
    //-------------------------------------------------------------------------

    /// Current policy snapshot.
    pub fn policy(&self) -> Arc<PersistencePolicy> {
        self.active.load_full()
    }

    /// Validate and install. On error the active policy is unchanged.
    pub fn set_policy(&self, policy: PersistencePolicy) -> PolicyResult<()> {
        policy.validate()?;
        let mut state = self.state.lock();
        self.publish(&mut state, policy);
        state.triggers.reset();
        Ok(())
    }

    pub fn apply_preset(&self, preset: PolicyPreset) -> PolicyResult<()> {
        self.set_policy(preset.policy())
    }

    /// Restore the policy `steps` versions back.
    pub fn rollback_policy(&self, steps: usize) -> PolicyResult<Arc<PersistencePolicy>> {
        let mut state = self.state.lock();
        let available = state.history.len();
        let target = state
            .history
            .rollback(steps)
            .ok_or(PolicyError::RollbackOutOfRange {
                requested: steps,
                available,
            })?;
        self.active.store(Arc::clone(&target));
        state.triggers.reset();
        info!(application = %self.application, steps, policy = %target.name, "policy rolled back");
        Ok(target)
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    fn publish(&self, state: &mut ManagerState, policy: PersistencePolicy) {
        let previous = self.active.swap(Arc::new(policy));
        debug!(application = %self.application, from = %previous.name, to = %self.active.load().name, "policy published");
        state.history.push(previous);
    }

    /// Copy-on-write edit of the active policy.
    pub fn modify<F>(&self, edit: F) -> PolicyResult<()>
    where
        F: FnOnce(&mut PersistencePolicy),
    {
        let mut state = self.state.lock();
        let mut next = PersistencePolicy::clone(&self.active.load());
        edit(&mut next);
        next.validate()?;
        self.publish(&mut state, next);
        Ok(())
    }

    pub fn add_critical_component(&self, pattern: &str) -> PolicyResult<()> {
        self.modify(|p| {
            if !p.critical_components.iter().any(|c| c == pattern) {
                p.critical_components.push(pattern.to_string());
            }
        })
    }

    pub fn remove_critical_component(&self, pattern: &str) -> PolicyResult<()> {
        self.modify(|p| p.critical_components.retain(|c| c != pattern))
    }

    pub fn add_ignored_component(&self, pattern: &str) -> PolicyResult<()> {
        self.modify(|p| {
            if !p.ignored_components.iter().any(|c| c == pattern) {
                p.ignored_components.push(pattern.to_string());
            }
        })
    }

    pub fn remove_ignored_component(&self, pattern: &str) -> PolicyResult<()> {
        self.modify(|p| p.ignored_components.retain(|c| c != pattern))
    }

    pub fn recommended_batch_size(&self, queue_len: usize) -> usize {
        self.active.load().batching.batch_size_for(queue_len)
    }

    //-------------------------------------------------------------------------
    // Emergency mode
    //-------------------------------------------------------------------------

    /// Enter or extend emergency mode.
    pub fn enter_emergency(&self, duration: Duration) {
        if duration.is_zero() {
            debug!(application = %self.application, "zero-length emergency ignored");
        } else if self.emergency.enter(duration) {
            warn!(application = %self.application, duration_s = duration.as_secs(), "emergency mode entered");
        } else {
            debug!(application = %self.application, "emergency mode re-entered");
        }
    }

    pub fn exit_emergency(&self) {
        if self.emergency.exit() {
            info!(application = %self.application, "emergency mode exited");
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.is_active()
    }

    pub fn emergency_remaining(&self) -> Option<Duration> {
        self.emergency.remaining()
    }

    pub fn extend_emergency(&self, extra: Duration) -> bool {
        self.emergency.extend(extra)
    }

    pub fn emergency_activations(&self) -> u64 {
        self.emergency.activations()
    }

    //-------------------------------------------------------------------------
    // Triggers
    //-------------------------------------------------------------------------

    /// Register a trigger. Its condition must be well formed and its id unused.
    pub fn add_trigger(&self, trigger: AdaptiveTrigger) -> PolicyResult<()> {
        trigger.condition.check().map_err(|reason| PolicyError::TriggerInvalid {
            id: trigger.id,
            reason,
        })?;
        if self.active.load().trigger(trigger.id).is_some() {
            return Err(PolicyError::TriggerInvalid {
                id: trigger.id,
                reason: "id already registered".to_string(),
            });
        }
        self.modify(|p| p.adaptive_triggers.push(trigger))
    }

    pub fn remove_trigger(&self, id: u32) -> PolicyResult<()> {
        if self.active.load().trigger(id).is_none() {
            return Err(PolicyError::TriggerNotFound(id));
        }
        self.modify(|p| p.adaptive_triggers.retain(|t| t.id != id))?;
        self.state.lock().triggers.forget(id);
        Ok(())
    }

    /// Enabling also clears a fault recorded by evaluation.
    pub fn set_trigger_enabled(&self, id: u32, enabled: bool) -> PolicyResult<()> {
        if self.active.load().trigger(id).is_none() {
            return Err(PolicyError::TriggerNotFound(id));
        }
        self.modify(|p| {
            if let Some(t) = p.adaptive_triggers.iter_mut().find(|t| t.id == id) {
                t.enabled = enabled;
            }
        })?;
        if enabled {
            self.state.lock().triggers.clear_fault(id);
        }
        Ok(())
    }

    pub fn triggers(&self) -> Vec<TriggerStatus> {
        let policy = self.active.load();
        let state = self.state.lock();
        policy
            .adaptive_triggers
            .iter()
            .map(|t| state.triggers.status(t))
            .collect()
    }

    //-------------------------------------------------------------------------
    // Context and evaluation
    //-------------------------------------------------------------------------

    /// Count an error-severity message toward the error rate. Lock-free.
    pub fn record_error(&self) {
        self.error_counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Last published context with the live emergency flag and a fresh `now`.
    pub fn decision_context(&self) -> DecisionContext {
        let cached = **self.last_context.load();
        DecisionContext::new(cached.stress, cached.error_rate, self.emergency.is_active())
            .with_queue_fill(cached.queue_fill)
    }

    /// Rate-limited probe read; publishes the context for producers.
    pub fn sample_context(&self, queue_fill: f64) -> DecisionContext {
        let ctx = self
            .sampler
            .lock()
            .sample(self.emergency.is_active(), queue_fill);
        self.last_context.store(Arc::new(ctx));
        self.stats.record_stress(ctx.stress);
        ctx
    }

    /// Run triggers, then arm or disarm emergency mode.
    pub fn evaluate(&self, queue_fill: f64) -> EvaluationReport {
        let ctx = self.sample_context(queue_fill);
        let mut report = EvaluationReport::new(ctx);
        let now = Instant::now();

        {
            let mut state = self.state.lock();
            let policy = self.active.load_full();
            for trigger in policy.adaptive_triggers.iter().filter(|t| t.enabled) {
                if state.triggers.is_faulted(trigger.id) {
                    continue;
                }
                if let Err(reason) = trigger.condition.check() {
                    self.disable_trigger(&mut state, trigger, reason, &mut report);
                    continue;
                }
                if state.triggers.cooling_down(trigger, now) || !trigger.condition.matches(&ctx) {
                    continue;
                }

                let next = trigger.patch.apply(&policy);
                if let Err(err) = next.validate() {
                    self.disable_trigger(&mut state, trigger, err.to_string(), &mut report);
                    continue;
                }

                state.triggers.fired(trigger.id, now);
                report.fired_trigger = Some(trigger.id);
                if next != *policy {
                    self.publish(&mut state, next);
                    report.policy_changed = true;
                }
                if let Some(seconds) = trigger.patch.enter_emergency_s {
                    report.entered_emergency |= self.emergency.enter(Duration::from_secs(seconds));
                }
                info!(application = %self.application, trigger = trigger.id, name = %trigger.name, stress = ctx.stress, "adaptive trigger fired");
                break;
            }
        }

        let emergency = self.active.load().emergency;
        let conditions = emergency.should_trigger(ctx.stress, ctx.error_rate);
        if conditions && !self.emergency.is_active() {
            if self.emergency.enter(Duration::from_secs(emergency.default_duration_s)) {
                report.entered_emergency = true;
                warn!(application = %self.application, stress = ctx.stress, error_rate = ctx.error_rate, "emergency mode entered");
            }
        } else if !conditions && self.emergency.is_expired() {
            self.emergency.exit();
            report.exited_emergency = true;
            info!(application = %self.application, "emergency mode expired");
        }

        report
    }

    fn disable_trigger(
        &self,
        state: &mut ManagerState,
        trigger: &AdaptiveTrigger,
        reason: String,
        report: &mut EvaluationReport,
    ) {
        warn!(application = %self.application, trigger = trigger.id, name = %trigger.name, %reason, "adaptive trigger disabled");
        state.triggers.fault(trigger.id, reason.clone());
        report.disabled_triggers.push((trigger.id, reason));
    }

    pub fn probe_failures(&self) -> u64 {
        self.sampler.lock().probe_failures()
    }

    pub fn stats(&self) -> &Arc<StatsRecorder> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SamplerConfig, StaticProbe};
    use contextlog_types::{Importance, LoadShedding, PolicyPatch, ShedStep, SystemSample, TriggerCondition};
    use pretty_assertions::assert_eq;

    fn manager_with(policy: PersistencePolicy) -> (PolicyManager, StaticProbe) {
        let probe = StaticProbe::idle();
        let sampler = ContextSampler::new(
            Box::new(probe.clone()),
            SamplerConfig {
                min_interval: Duration::ZERO,
                ..Default::default()
            },
        );
        let manager =
            PolicyManager::new("app", policy, sampler, 32, Arc::new(StatsRecorder::new())).unwrap();
        (manager, probe)
    }

    #[test]
    fn test_set_then_get_and_rollback() {
        let (manager, _) = manager_with(PersistencePolicy::default());
        let original = manager.policy();
        let next = PersistencePolicy::new("strict").with_min_importance(Importance::High);
        manager.set_policy(next.clone()).unwrap();
        assert_eq!(*manager.policy(), next);

        let restored = manager.rollback_policy(1).unwrap();
        assert_eq!(*restored, *original);
        assert_eq!(*manager.policy(), *original);
        assert!(matches!(
            manager.rollback_policy(1),
            Err(PolicyError::RollbackOutOfRange { requested: 1, available: 0 })
        ));
    }

    #[test]
    fn test_invalid_policy_leaves_active_unchanged() {
        let (manager, _) = manager_with(PersistencePolicy::default());
        let bad = PersistencePolicy::default().with_critical_component("");
        assert!(manager.set_policy(bad).is_err());
        assert_eq!(manager.policy().name, "default");
        assert_eq!(manager.history_len(), 0);
    }

    #[test]
    fn test_component_helpers_validate() {
        let (manager, _) = manager_with(PersistencePolicy::default());
        manager.add_critical_component("Auth").unwrap();
        assert!(manager.add_ignored_component("Auth").is_err());
        assert!(manager.policy().is_critical_component("Auth"));
        manager.remove_critical_component("Auth").unwrap();
        manager.add_ignored_component("Auth").unwrap();
        assert!(manager.policy().is_ignored_component("Auth"));
    }

    #[test]
    fn test_stress_at_threshold_enters_emergency() {
        let mut policy = PersistencePolicy::default();
        policy.emergency.trigger_stress = 90.0;
        let (manager, probe) = manager_with(policy);

        probe.set_cpu(89.9);
        assert!(!manager.evaluate(0.0).entered_emergency);
        probe.set_cpu(90.0);
        let report = manager.evaluate(0.0);
        assert!(report.entered_emergency);
        assert!(manager.is_emergency());
        assert!(manager.decision_context().in_emergency);
    }

    #[test]
    fn test_expired_emergency_exits_when_calm() {
        let (manager, _) = manager_with(PersistencePolicy::default());
        manager.enter_emergency(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(15));
        assert!(!manager.is_emergency());
        let report = manager.evaluate(0.0);
        assert!(report.exited_emergency);
        assert!(manager.emergency_remaining().is_none());
    }

    #[test]
    fn test_trigger_fires_once_per_cooldown() {
        let policy = PersistencePolicy::default().with_trigger(
            AdaptiveTrigger::new(
                1,
                "tighten under load",
                TriggerCondition::default().stress_at_least(70.0),
                PolicyPatch::default().min_importance(Importance::High),
            )
            .with_cooldown_ms(60_000),
        );
        let (manager, probe) = manager_with(policy);

        assert_eq!(manager.evaluate(0.0).fired_trigger, None);
        probe.set(SystemSample::new(75.0, 0.0, 0.0, 0.0));
        let report = manager.evaluate(0.0);
        assert_eq!(report.fired_trigger, Some(1));
        assert!(report.policy_changed);
        assert_eq!(manager.policy().min_persist_importance, Importance::High);
        assert_eq!(manager.history_len(), 1);

        assert_eq!(manager.evaluate(0.0).fired_trigger, None);
        assert_eq!(manager.triggers()[0].activations, 1);
    }

    #[test]
    fn test_malformed_trigger_is_disabled_not_fatal() {
        let broken = AdaptiveTrigger::new(
            9,
            "contradiction",
            TriggerCondition::default().stress_at_least(10.0),
            // a shedding curve that falls as stress rises never validates
            PolicyPatch::default().shedding(LoadShedding::new(vec![
                ShedStep::new(20.0, Importance::High),
                ShedStep::new(40.0, Importance::Low),
            ])),
        );
        let (manager, probe) = manager_with(PersistencePolicy::default().with_trigger(broken));
        probe.set_cpu(50.0);

        let report = manager.evaluate(0.0);
        assert_eq!(report.disabled_triggers.len(), 1);
        assert_eq!(report.disabled_triggers[0].0, 9);
        assert!(!report.policy_changed);
        assert!(manager.triggers()[0].fault.is_some());
        // stays disabled on later rounds
        assert!(manager.evaluate(0.0).disabled_triggers.is_empty());

        manager.set_trigger_enabled(9, true).unwrap();
        assert!(manager.triggers()[0].fault.is_none());
    }

    #[test]
    fn test_trigger_registration_errors() {
        let (manager, _) = manager_with(PersistencePolicy::default());
        let empty = AdaptiveTrigger::new(1, "x", TriggerCondition::default(), PolicyPatch::default());
        assert!(matches!(
            manager.add_trigger(empty),
            Err(PolicyError::TriggerInvalid { id: 1, .. })
        ));
        assert!(matches!(manager.remove_trigger(5), Err(PolicyError::TriggerNotFound(5))));

        let ok = AdaptiveTrigger::new(
            2,
            "queue pressure",
            TriggerCondition::default().queue_fill_at_least(0.9),
            PolicyPatch::default().emergency_for(30),
        );
        manager.add_trigger(ok.clone()).unwrap();
        assert!(manager.add_trigger(ok).is_err());

        let report = manager.evaluate(0.95);
        assert_eq!(report.fired_trigger, Some(2));
        assert!(report.entered_emergency);
        assert!(manager.is_emergency());

        manager.remove_trigger(2).unwrap();
        assert!(manager.triggers().is_empty());
    }

    #[test]
    fn test_recommended_batch_size() {
        let (manager, _) = manager_with(PersistencePolicy::default());
        assert_eq!(manager.recommended_batch_size(0), 100);
        assert_eq!(manager.recommended_batch_size(5_000), 1000);
    }
}
