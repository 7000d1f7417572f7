// Internal diagnostics
// Subscriber setup for the runtime's own `tracing` output (not the logged messages)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    EnvFilter, Registry,
};

/// Where the runtime's diagnostics go and how verbose they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// `EnvFilter` directives, e.g. "info" or "contextlog_engine=debug,warn"
    pub level: String,
    pub json: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        TelemetrySettings {
            level: "info".to_string(),
            json: false,
        }
    }
}

//-----------------------------------------------------------------------------
// Initialization
//-----------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Fails if a global subscriber
/// is already installed.
pub fn init_tracing(log_level: Option<&str>, json_output: Option<bool>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))?;

    let subscriber = Registry::default().with(env_filter);

    if json_output.unwrap_or(false) {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_thread_names(true);
        tracing::subscriber::set_global_default(subscriber.with(json_layer))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_names(true);
        tracing::subscriber::set_global_default(subscriber.with(fmt_layer))?;
    }

    Ok(())
}

pub fn init_from_settings(settings: &TelemetrySettings) -> Result<()> {
    init_tracing(Some(&settings.level), Some(settings.json))
}
