//! Contextual logging runtime.
//!
//! Every message is scored by the importance resolver, judged by the
//! persistence decider against the active policy and the sampled system
//! context, and then either dropped or placed in the smart priority queue for
//! the sink workers. The policy manager adapts the policy to stress, runs
//! emergency mode and keeps a rollback history.
//!
//! ```no_run
//! use contextlog_engine::{LoggerConfig, LoggerRuntime, MemorySink, SinkRoute};
//!
//! let (sink, recent) = MemorySink::new("recent", 1024);
//! let runtime = LoggerRuntime::builder(LoggerConfig::new("billing"))
//!     .with_sink(sink, SinkRoute::all())
//!     .build()
//!     .map_err(|e| e.to_string())?;
//!
//! runtime.warn("Database", "Connect", "pool exhausted, retrying");
//! runtime.flush().map_err(|e| e.to_string())?;
//! assert_eq!(recent.len(), 1);
//! # Ok::<(), String>(())
//! ```

pub mod config;
pub mod context;
pub mod importance;
pub mod persistence;
pub mod policy;
pub mod queue;
pub mod runtime;
pub mod sink;
pub mod stats;
pub mod telemetry;

pub use config::{validate, Environment, LoggerConfig};
pub use context::{ContextSampler, SamplerConfig, StaticProbe, SysinfoProbe, SystemProbe};
pub use importance::{ImportanceResolver, MatchedRule, OverrideTable, Resolution};
pub use persistence::{decide, decide_batch, PersistenceDecider};
pub use policy::{EvaluationReport, PolicyManager, TriggerStatus};
pub use queue::{EnqueueOutcome, QueueEntry, QueueStats, SmartQueue};
pub use runtime::{InstanceInfo, LogOutcome, LoggerRuntime, Registry, RuntimeBuilder};
pub use sink::{MemorySink, MemorySinkHandle, RetryPolicy, Sink, SinkRoute, SinkStatus};
pub use stats::{StatsRecorder, StatsSnapshot};
pub use telemetry::{init_from_settings, init_tracing, TelemetrySettings};

pub use contextlog_types as types;
