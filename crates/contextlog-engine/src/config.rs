// Runtime configuration
//
// The record external parsers produce. TOML loading is a thin adapter;
// `validate` reports every problem at once so the runtime can refuse to start
// with a complete list.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use contextlog_error::{bail, ensure, ConfigError, ConfigResult, ParseError, ValidationIssue};
use contextlog_types::text::COMPONENT_BUDGET;
use contextlog_types::{PersistencePolicy, PolicyPreset};
use serde::{Deserialize, Serialize};

use crate::context::SamplerConfig;
use crate::policy::DEFAULT_HISTORY_CAPACITY;
use crate::sink::RetryPolicy;
use crate::telemetry::TelemetrySettings;

/// Serialize a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Deployment environment; picks the default preset and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Test,
    Prod,
}

impl Environment {
    pub fn default_preset(&self) -> PolicyPreset {
        match self {
            Environment::Dev => PolicyPreset::Comprehensive,
            Environment::Test => PolicyPreset::Default,
            Environment::Prod => PolicyPreset::HighPerformance,
        }
    }

    /// Emergency stress threshold applied to presets.
    pub fn emergency_stress(&self) -> f64 {
        match self {
            Environment::Prod => 90.0,
            _ => 95.0,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Prod => "prod",
        };
        f.write_str(s)
    }
}

impl FromStr for Environment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "test" | "testing" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Prod),
            _ => {
                bail!(ParseError::UnknownVariant {
                    kind: "environment",
                    value: s.to_string(),
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub enabled: bool,
    pub color: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        ConsoleSettings {
            enabled: true,
            color: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub enabled: bool,
    pub path: PathBuf,
    pub max_size_bytes: u64,
    pub max_files: u32,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            enabled: false,
            path: PathBuf::from("logs/contextlog.log"),
            max_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub enabled: bool,
    pub connection_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemorySettings {
    pub enabled: bool,
    pub segment_name: String,
}

/// Parameters for the external sink drivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub console: ConsoleSettings,
    pub file: FileSettings,
    pub database: DatabaseSettings,
    pub shared_memory: SharedMemorySettings,
}

/// A named preset or an inline policy record, not both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySelection {
    pub preset: Option<PolicyPreset>,
    pub inline: Option<PersistencePolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub application_name: String,
    pub process_tag: Option<String>,
    pub environment: Environment,
    pub policy: PolicySelection,
    pub sinks: SinkSettings,
    /// Falls back to the policy's `max_queue_size`
    pub queue_capacity: Option<usize>,
    /// Falls back to one worker per routed method
    pub worker_threads: Option<usize>,
    pub history_capacity: usize,
    /// Run the background evaluator thread
    pub adaptive_evaluation: bool,
    #[serde(with = "duration_ms")]
    pub evaluation_interval: Duration,
    #[serde(with = "duration_ms")]
    pub flush_timeout: Duration,
    /// How long an idle worker waits on the queue before rechecking
    #[serde(with = "duration_ms")]
    pub worker_idle_timeout: Duration,
    /// Read host metrics with `sysinfo`; otherwise report an idle host
    pub system_probe: bool,
    pub sampler: SamplerConfig,
    pub retry: RetryPolicy,
    pub telemetry: TelemetrySettings,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            application_name: "app".to_string(),
            process_tag: None,
            environment: Environment::default(),
            policy: PolicySelection::default(),
            sinks: SinkSettings::default(),
            queue_capacity: None,
            worker_threads: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            adaptive_evaluation: true,
            evaluation_interval: Duration::from_secs(1),
            flush_timeout: Duration::from_secs(5),
            worker_idle_timeout: Duration::from_millis(50),
            system_probe: true,
            sampler: SamplerConfig::default(),
            retry: RetryPolicy::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl LoggerConfig {
    pub fn new(application_name: &str) -> Self {
        LoggerConfig {
            application_name: application_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_process_tag(mut self, tag: &str) -> Self {
        self.process_tag = Some(tag.to_string());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_preset(mut self, preset: PolicyPreset) -> Self {
        self.policy.preset = Some(preset);
        self
    }

    pub fn with_policy(mut self, policy: PersistencePolicy) -> Self {
        self.policy.inline = Some(policy);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_adaptive_evaluation(mut self, enabled: bool) -> Self {
        self.adaptive_evaluation = enabled;
        self
    }

    pub fn with_evaluation_interval(mut self, interval: Duration) -> Self {
        self.evaluation_interval = interval;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_system_probe(mut self, enabled: bool) -> Self {
        self.system_probe = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sinks(mut self, sinks: SinkSettings) -> Self {
        self.sinks = sinks;
        self
    }

    /// Diagnostics installed by `RuntimeBuilder::with_tracing`.
    pub fn with_telemetry(mut self, telemetry: TelemetrySettings) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: LoggerConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Policy the runtime starts with: inline, preset, or the environment default.
    pub fn initial_policy(&self) -> PersistencePolicy {
        if let Some(policy) = &self.policy.inline {
            return policy.clone();
        }
        let preset = self
            .policy
            .preset
            .unwrap_or_else(|| self.environment.default_preset());
        let mut policy = preset.policy();
        policy.emergency.trigger_stress = self.environment.emergency_stress();
        policy
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.initial_policy().max_queue_size)
    }

    /// Every problem, or `Ok`.
    pub fn validate(&self) -> ConfigResult<()> {
        validate(self)
    }
}

/// Check a configuration record before any runtime state is built.
pub fn validate(config: &LoggerConfig) -> ConfigResult<()> {
    let mut issues = Vec::new();
    let mut issue = |field: &str, message: String| issues.push(ValidationIssue::new(field, message));

    let name = config.application_name.trim();
    if name.is_empty() {
        issue("application_name", "must not be empty".to_string());
    } else if name.len() > COMPONENT_BUDGET {
        issue(
            "application_name",
            format!("longer than {COMPONENT_BUDGET} bytes"),
        );
    }
    if let Some(tag) = &config.process_tag {
        if tag.len() > COMPONENT_BUDGET {
            issue("process_tag", format!("longer than {COMPONENT_BUDGET} bytes"));
        }
    }

    match (&config.policy.preset, &config.policy.inline) {
        (Some(_), Some(_)) => issue(
            "policy",
            "set either a preset or an inline policy, not both".to_string(),
        ),
        (_, Some(inline)) => {
            if let Err(err) = inline.validate() {
                issue("policy.inline", err.to_string());
            }
        }
        _ => {}
    }

    let file = &config.sinks.file;
    if file.enabled {
        if file.path.as_os_str().is_empty() {
            issue("sinks.file.path", "required when the file sink is enabled".to_string());
        }
        if file.max_size_bytes == 0 {
            issue("sinks.file.max_size_bytes", "must be positive".to_string());
        }
        if file.max_files == 0 {
            issue("sinks.file.max_files", "must be positive".to_string());
        }
    }
    if config.sinks.database.enabled && config.sinks.database.connection_string.trim().is_empty() {
        issue(
            "sinks.database.connection_string",
            "required when the database sink is enabled".to_string(),
        );
    }
    if config.sinks.shared_memory.enabled && config.sinks.shared_memory.segment_name.trim().is_empty() {
        issue(
            "sinks.shared_memory.segment_name",
            "required when the shared-memory sink is enabled".to_string(),
        );
    }

    if config.queue_capacity == Some(0) {
        issue("queue_capacity", "must be positive".to_string());
    }
    if config.worker_threads == Some(0) {
        issue("worker_threads", "must be positive".to_string());
    }
    if config.history_capacity == 0 {
        issue("history_capacity", "must be positive".to_string());
    }
    for (field, value) in [
        ("evaluation_interval", config.evaluation_interval),
        ("flush_timeout", config.flush_timeout),
        ("worker_idle_timeout", config.worker_idle_timeout),
    ] {
        if value.is_zero() {
            issue(field, "must be positive".to_string());
        }
    }

    let weights = &config.sampler.weights;
    for (field, value) in [
        ("sampler.weights.cpu", weights.cpu),
        ("sampler.weights.memory", weights.memory),
        ("sampler.weights.disk", weights.disk),
        ("sampler.weights.error_rate", weights.error_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            issue(field, format!("{value} is not a non-negative weight"));
        }
    }
    if weights.error_rate_full_scale.is_nan() || weights.error_rate_full_scale <= 0.0 {
        issue(
            "sampler.weights.error_rate_full_scale",
            "must be positive".to_string(),
        );
    }

    if config.telemetry.level.trim().is_empty() {
        issue("telemetry.level", "must not be empty".to_string());
    }
    if config.retry.max_attempts == 0 {
        issue("retry.max_attempts", "must be at least 1".to_string());
    }
    if config.retry.base > config.retry.cap {
        issue("retry.base", "must not exceed retry.cap".to_string());
    }

    ensure!(issues.is_empty(), ConfigError::Invalid(issues));
    Ok(())
}
