//! Tracing setup and log targets.
//!
//! Article text never goes into logs; use [`crate::ingest::fingerprint`] instead.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const TARGET_ENRICH: &str = "enrich";
pub const TARGET_JUDGMENT: &str = "judgment";
pub const TARGET_RULES: &str = "rules";
pub const TARGET_RECOMMEND: &str = "recommend";
pub const TARGET_CLUSTER: &str = "cluster";

/// Used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str =
    "warn,news_enricher=info,enrich=info,rules=info,recommend=info,cluster=info,judgment=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}` (compact|json)")),
        }
    }
}

/// Installs the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let res = match format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
