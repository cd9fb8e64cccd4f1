//! Global tracing setup.
//!
//! Library code logs through both `log` and `tracing`; `init` installs one
//! subscriber and routes `log` records into it.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::error::LoggingError;

const DEFAULT_DIRECTIVES: &str = "voiceforge=info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into())
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// # Errors
/// Fails if a global subscriber or `log` logger is already installed.
pub fn init(format: LogFormat) -> Result<(), LoggingError> {
    tracing_log::LogTracer::init()?;

    match format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().json());
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().pretty());
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}
