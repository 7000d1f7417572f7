// Persistence policy record
//
// One policy governs an application at a time. Policies are plain values:
// the manager publishes them as immutable snapshots and edits by copy-on-write.

use std::fmt;
use std::str::FromStr;

use contextlog_error::{ParseError, PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};

use crate::importance::Importance;
use crate::pattern::pattern_matches;
use crate::trigger::AdaptiveTrigger;
use crate::verdict::PersistMethod;

//-----------------------------------------------------------------------------
// Load shedding
//-----------------------------------------------------------------------------

/// From `stress_at_least` upward, messages below `floor` are shed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShedStep {
    pub stress_at_least: f64,
    pub floor: Importance,
}

impl ShedStep {
    pub fn new(stress_at_least: f64, floor: Importance) -> Self {
        ShedStep {
            stress_at_least,
            floor,
        }
    }
}

/// Monotonic step function stress -> minimum importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ShedStep>", into = "Vec<ShedStep>")]
pub struct LoadShedding {
    steps: Vec<ShedStep>,
}

impl LoadShedding {
    /// Steps are sorted by stress; monotonicity is checked by `validate`.
    pub fn new(mut steps: Vec<ShedStep>) -> Self {
        steps.sort_by(|a, b| a.stress_at_least.total_cmp(&b.stress_at_least));
        LoadShedding { steps }
    }

    /// Never sheds.
    pub fn disabled() -> Self {
        LoadShedding { steps: Vec::new() }
    }

    pub fn steps(&self) -> &[ShedStep] {
        &self.steps
    }

    /// Floor in effect at `stress`, if any step applies.
    pub fn floor_for(&self, stress: f64) -> Option<Importance> {
        self.steps
            .iter()
            .rev()
            .find(|step| stress >= step.stress_at_least)
            .map(|step| step.floor)
    }

    fn validate_into(&self, issues: &mut Vec<String>) {
        let mut previous: Option<&ShedStep> = None;
        for step in &self.steps {
            if !step.stress_at_least.is_finite() || !(0.0..=100.0).contains(&step.stress_at_least) {
                issues.push(format!(
                    "load_shedding: stress {} outside 0..=100",
                    step.stress_at_least
                ));
            }
            if let Some(prev) = previous {
                if step.stress_at_least == prev.stress_at_least {
                    issues.push(format!(
                        "load_shedding: duplicate step at stress {}",
                        step.stress_at_least
                    ));
                }
                if step.floor < prev.floor {
                    issues.push(format!(
                        "load_shedding: floor drops from {} to {} as stress rises to {}",
                        prev.floor, step.floor, step.stress_at_least
                    ));
                }
            }
            previous = Some(step);
        }
    }
}

impl From<Vec<ShedStep>> for LoadShedding {
    fn from(steps: Vec<ShedStep>) -> Self {
        LoadShedding::new(steps)
    }
}

impl From<LoadShedding> for Vec<ShedStep> {
    fn from(shedding: LoadShedding) -> Self {
        shedding.steps
    }
}

impl Default for LoadShedding {
    fn default() -> Self {
        LoadShedding::new(vec![
            ShedStep::new(75.0, Importance::Medium),
            ShedStep::new(90.0, Importance::High),
        ])
    }
}

//-----------------------------------------------------------------------------
// Batching and emergency
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub enabled: bool,
    pub base_batch_size: usize,
    pub max_batch_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        BatchingConfig {
            enabled: true,
            base_batch_size: 100,
            max_batch_size: 1000,
        }
    }
}

impl BatchingConfig {
    /// Batch size to request from the queue given its current length.
    ///
    /// Grows with the backlog between the base and max sizes; 1 when batching is off.
    pub fn batch_size_for(&self, queue_len: usize) -> usize {
        if !self.enabled {
            return 1;
        }
        queue_len.clamp(self.base_batch_size.max(1), self.max_batch_size.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    /// Whether evaluation may enter emergency mode on its own
    pub enabled: bool,
    pub trigger_stress: f64,
    /// Errors per second
    pub trigger_error_rate: f64,
    pub default_duration_s: u64,
    /// Minimum importance persisted while emergency mode is active
    pub floor: Importance,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        EmergencyConfig {
            enabled: true,
            trigger_stress: 95.0,
            trigger_error_rate: 20.0,
            default_duration_s: 300,
            floor: Importance::Medium,
        }
    }
}

impl EmergencyConfig {
    /// Inclusive on both thresholds.
    pub fn should_trigger(&self, stress: f64, error_rate: f64) -> bool {
        self.enabled && (stress >= self.trigger_stress || error_rate >= self.trigger_error_rate)
    }
}

//-----------------------------------------------------------------------------
// Policy
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistencePolicy {
    pub name: String,
    pub min_persist_importance: Importance,
    /// Patterns whose messages always persist
    pub critical_components: Vec<String>,
    /// Patterns whose messages never persist, even in emergency mode
    pub ignored_components: Vec<String>,
    pub load_shedding: LoadShedding,
    pub batching: BatchingConfig,
    pub emergency: EmergencyConfig,
    pub default_method: PersistMethod,
    pub critical_method: PersistMethod,
    /// Asks sinks to encrypt; the runtime only forwards the flag
    pub request_encryption: bool,
    /// Queued messages older than this are evicted (seconds)
    pub max_age_s: Option<u64>,
    /// Queue capacity used when the configuration does not set one
    pub max_queue_size: usize,
    pub adaptive_triggers: Vec<AdaptiveTrigger>,
}

impl Default for PersistencePolicy {
    fn default() -> Self {
        PersistencePolicy {
            name: "default".to_string(),
            min_persist_importance: Importance::Medium,
            critical_components: Vec::new(),
            ignored_components: Vec::new(),
            load_shedding: LoadShedding::default(),
            batching: BatchingConfig::default(),
            emergency: EmergencyConfig::default(),
            default_method: PersistMethod::Multi,
            critical_method: PersistMethod::Multi,
            request_encryption: false,
            max_age_s: Some(3600),
            max_queue_size: 10_000,
            adaptive_triggers: Vec::new(),
        }
    }
}

impl PersistencePolicy {
    pub fn new(name: &str) -> Self {
        PersistencePolicy {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_min_importance(mut self, importance: Importance) -> Self {
        self.min_persist_importance = importance;
        self
    }

    pub fn with_critical_component(mut self, pattern: &str) -> Self {
        self.critical_components.push(pattern.to_string());
        self
    }

    pub fn with_ignored_component(mut self, pattern: &str) -> Self {
        self.ignored_components.push(pattern.to_string());
        self
    }

    pub fn with_load_shedding(mut self, shedding: LoadShedding) -> Self {
        self.load_shedding = shedding;
        self
    }

    pub fn with_batching(mut self, batching: BatchingConfig) -> Self {
        self.batching = batching;
        self
    }

    pub fn with_emergency(mut self, emergency: EmergencyConfig) -> Self {
        self.emergency = emergency;
        self
    }

    pub fn with_emergency_floor(mut self, floor: Importance) -> Self {
        self.emergency.floor = floor;
        self
    }

    pub fn with_default_method(mut self, method: PersistMethod) -> Self {
        self.default_method = method;
        self
    }

    pub fn with_critical_method(mut self, method: PersistMethod) -> Self {
        self.critical_method = method;
        self
    }

    pub fn with_max_age(mut self, max_age_s: Option<u64>) -> Self {
        self.max_age_s = max_age_s;
        self
    }

    pub fn with_trigger(mut self, trigger: AdaptiveTrigger) -> Self {
        self.adaptive_triggers.push(trigger);
        self
    }

    pub fn is_critical_component(&self, component: &str) -> bool {
        self.critical_components
            .iter()
            .any(|p| pattern_matches(p, component))
    }

    pub fn is_ignored_component(&self, component: &str) -> bool {
        self.ignored_components
            .iter()
            .any(|p| pattern_matches(p, component))
    }

    pub fn trigger(&self, id: u32) -> Option<&AdaptiveTrigger> {
        self.adaptive_triggers.iter().find(|t| t.id == id)
    }

    /// Reject contradictory or out-of-range fields, reporting every problem found.
    pub fn validate(&self) -> PolicyResult<()> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push("name: must not be empty".to_string());
        }
        for (field, patterns) in [
            ("critical_components", &self.critical_components),
            ("ignored_components", &self.ignored_components),
        ] {
            for pattern in patterns {
                if pattern.trim().is_empty() {
                    issues.push(format!("{field}: empty component pattern"));
                }
            }
        }
        for pattern in &self.critical_components {
            if !pattern.is_empty() && self.ignored_components.contains(pattern) {
                issues.push(format!(
                    "component `{pattern}` is both critical and ignored"
                ));
            }
        }

        self.load_shedding.validate_into(&mut issues);

        let b = &self.batching;
        if b.enabled {
            if b.base_batch_size == 0 {
                issues.push("batching.base_batch_size: must be positive".to_string());
            }
            if b.base_batch_size > b.max_batch_size {
                issues.push(format!(
                    "batching: base_batch_size {} exceeds max_batch_size {}",
                    b.base_batch_size, b.max_batch_size
                ));
            }
        }

        let e = &self.emergency;
        if !e.trigger_stress.is_finite() || !(0.0..=100.0).contains(&e.trigger_stress) {
            issues.push(format!(
                "emergency.trigger_stress: {} outside 0..=100",
                e.trigger_stress
            ));
        }
        if !e.trigger_error_rate.is_finite() || e.trigger_error_rate < 0.0 {
            issues.push(format!(
                "emergency.trigger_error_rate: {} must be a non-negative number",
                e.trigger_error_rate
            ));
        }
        if e.default_duration_s == 0 {
            issues.push("emergency.default_duration_s: must be positive".to_string());
        }

        if self.max_queue_size == 0 {
            issues.push("max_queue_size: must be positive".to_string());
        }
        if self.max_age_s == Some(0) {
            issues.push("max_age_s: must be positive when set".to_string());
        }

        let mut ids: Vec<u32> = self.adaptive_triggers.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        for pair in ids.windows(2) {
            if pair[0] == pair[1] {
                issues.push(format!("adaptive_triggers: duplicate id {}", pair[0]));
            }
        }
        for trigger in &self.adaptive_triggers {
            if trigger.name.trim().is_empty() {
                issues.push(format!("adaptive_triggers[{}]: empty name", trigger.id));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Invalid(issues))
        }
    }

    pub fn to_json(&self) -> PolicyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate an exported policy.
    pub fn from_json(json: &str) -> PolicyResult<Self> {
        let policy: PersistencePolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn high_performance() -> Self {
        PolicyPreset::HighPerformance.policy()
    }

    pub fn comprehensive() -> Self {
        PolicyPreset::Comprehensive.policy()
    }

    pub fn balanced() -> Self {
        PolicyPreset::Balanced.policy()
    }
}

//-----------------------------------------------------------------------------
// Presets
//-----------------------------------------------------------------------------

/// Named starting points for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    #[default]
    Default,
    /// Fewer, larger writes; sheds early
    HighPerformance,
    /// Keeps as much as possible
    Comprehensive,
    Balanced,
}

impl PolicyPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyPreset::Default => "default",
            PolicyPreset::HighPerformance => "high_performance",
            PolicyPreset::Comprehensive => "comprehensive",
            PolicyPreset::Balanced => "balanced",
        }
    }

    pub fn policy(&self) -> PersistencePolicy {
        match self {
            PolicyPreset::Default => PersistencePolicy::default(),
            PolicyPreset::HighPerformance => PersistencePolicy {
                name: self.as_str().to_string(),
                min_persist_importance: Importance::High,
                load_shedding: LoadShedding::new(vec![
                    ShedStep::new(60.0, Importance::High),
                    ShedStep::new(85.0, Importance::Critical),
                ]),
                batching: BatchingConfig {
                    enabled: true,
                    base_batch_size: 200,
                    max_batch_size: 2000,
                },
                default_method: PersistMethod::File,
                max_age_s: Some(1800),
                max_queue_size: 5_000,
                ..Default::default()
            },
            PolicyPreset::Comprehensive => PersistencePolicy {
                name: self.as_str().to_string(),
                min_persist_importance: Importance::Low,
                load_shedding: LoadShedding::new(vec![
                    ShedStep::new(85.0, Importance::Medium),
                    ShedStep::new(95.0, Importance::High),
                ]),
                batching: BatchingConfig {
                    enabled: true,
                    base_batch_size: 50,
                    max_batch_size: 500,
                },
                emergency: EmergencyConfig {
                    default_duration_s: 600,
                    ..Default::default()
                },
                max_age_s: Some(7200),
                max_queue_size: 50_000,
                ..Default::default()
            },
            PolicyPreset::Balanced => PersistencePolicy {
                name: self.as_str().to_string(),
                load_shedding: LoadShedding::new(vec![
                    ShedStep::new(70.0, Importance::Medium),
                    ShedStep::new(85.0, Importance::High),
                ]),
                max_queue_size: 20_000,
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyPreset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Ok(PolicyPreset::Default),
            "high_performance" => Ok(PolicyPreset::HighPerformance),
            "comprehensive" => Ok(PolicyPreset::Comprehensive),
            "balanced" => Ok(PolicyPreset::Balanced),
            _ => Err(ParseError::UnknownVariant {
                kind: "policy preset",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{PolicyPatch, TriggerCondition};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_presets_are_valid() {
        for preset in [
            PolicyPreset::Default,
            PolicyPreset::HighPerformance,
            PolicyPreset::Comprehensive,
            PolicyPreset::Balanced,
        ] {
            let policy = preset.policy();
            assert!(policy.validate().is_ok(), "{preset} should validate");
            assert_eq!(policy.name, preset.as_str());
        }
        assert_eq!(PolicyPreset::HighPerformance.policy().min_persist_importance, Importance::High);
        assert_eq!(PolicyPreset::Comprehensive.policy().max_queue_size, 50_000);
    }

    #[test]
    fn test_floor_lookup() {
        let shedding = LoadShedding::new(vec![
            ShedStep::new(90.0, Importance::High),
            ShedStep::new(75.0, Importance::Medium),
        ]);
        assert_eq!(shedding.floor_for(10.0), None);
        assert_eq!(shedding.floor_for(75.0), Some(Importance::Medium));
        assert_eq!(shedding.floor_for(89.9), Some(Importance::Medium));
        assert_eq!(shedding.floor_for(100.0), Some(Importance::High));
        assert_eq!(LoadShedding::disabled().floor_for(100.0), None);
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut policy = PersistencePolicy::new("")
            .with_critical_component("")
            .with_critical_component("Auth")
            .with_ignored_component("Auth")
            .with_load_shedding(LoadShedding::new(vec![
                ShedStep::new(50.0, Importance::High),
                ShedStep::new(80.0, Importance::Low),
            ]));
        policy.emergency.trigger_stress = 120.0;
        policy.batching.base_batch_size = 0;

        let err = policy.validate().unwrap_err();
        match err {
            PolicyError::Invalid(issues) => {
                assert_eq!(issues.len(), 6, "{issues:?}");
                assert!(issues.iter().any(|i| i.contains("both critical and ignored")));
                assert!(issues.iter().any(|i| i.contains("floor drops")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_trigger_ids_rejected() {
        let trigger = AdaptiveTrigger::new(
            1,
            "hot",
            TriggerCondition::default().stress_at_least(80.0),
            PolicyPatch::default().min_importance(Importance::High),
        );
        let policy = PersistencePolicy::default()
            .with_trigger(trigger.clone())
            .with_trigger(trigger);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let policy = PersistencePolicy::new("ops")
            .with_min_importance(Importance::High)
            .with_critical_component("Payments*");
        let json = policy.to_json().unwrap();
        let back = PersistencePolicy::from_json(&json).unwrap();
        assert_eq!(back, policy);

        let bad = json.replace("\"ops\"", "\"\"");
        assert!(PersistencePolicy::from_json(&bad).is_err());
        assert!(PersistencePolicy::from_json("{not json").is_err());
    }

    #[test]
    fn test_shedding_steps_are_sorted_on_load() {
        let json = r#"[{"stress_at_least":90.0,"floor":"high"},{"stress_at_least":75.0,"floor":"medium"}]"#;
        let loaded: LoadShedding = serde_json::from_str(json).unwrap();
        let built = LoadShedding::new(vec![
            ShedStep::new(90.0, Importance::High),
            ShedStep::new(75.0, Importance::Medium),
        ]);
        assert_eq!(loaded, built);

        let policy = PersistencePolicy::new("ordered").with_load_shedding(loaded);
        assert!(policy.validate().is_ok());
        let back = PersistencePolicy::from_json(&policy.to_json().unwrap()).unwrap();
        assert_eq!(back.load_shedding, built);
    }

    #[test]
    fn test_component_matching() {
        let policy = PersistencePolicy::default()
            .with_critical_component("Payments*")
            .with_ignored_component("Heartbeat");
        assert!(policy.is_critical_component("PaymentsGateway"));
        assert!(!policy.is_critical_component(""));
        assert!(policy.is_ignored_component("Heartbeat"));
        assert!(!policy.is_ignored_component("HeartbeatMonitor"));
    }

    #[test]
    fn test_batch_size_tracks_backlog() {
        let batching = BatchingConfig::default();
        assert_eq!(batching.batch_size_for(3), 100);
        assert_eq!(batching.batch_size_for(450), 450);
        assert_eq!(batching.batch_size_for(50_000), 1000);
        let off = BatchingConfig {
            enabled: false,
            ..batching
        };
        assert_eq!(off.batch_size_for(450), 1);
    }

    #[test]
    fn test_emergency_threshold_is_inclusive() {
        let e = EmergencyConfig::default();
        assert!(e.should_trigger(95.0, 0.0));
        assert!(!e.should_trigger(94.9, 19.9));
        assert!(e.should_trigger(0.0, 20.0));
        let off = EmergencyConfig {
            enabled: false,
            ..e
        };
        assert!(!off.should_trigger(100.0, 100.0));
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("high-performance".parse::<PolicyPreset>().unwrap(), PolicyPreset::HighPerformance);
        assert!("paranoid".parse::<PolicyPreset>().is_err());
    }
}
