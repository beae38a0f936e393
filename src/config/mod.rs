// src/config/mod.rs
//! Runtime settings: TOML file plus environment overrides.
//!
//! Lookup order for the file:
//! 1) `$NEWS_ENRICHER_CONFIG` (must exist)
//! 2) `config/enricher.toml` (optional; defaults when absent)
//!
//! Env overrides applied on top: `NEWS_EMBEDDING_MODEL`,
//! `NEWS_CLUSTER_MIN_SAMPLES`, `NEWS_RELEVANCE_THRESHOLD`,
//! `ENABLE_LLM_FEATURES`, `LLM_PROVIDER`.

pub mod ai;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyze::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::cluster::DEFAULT_MIN_SAMPLES;
use crate::error::ConfigError;
use crate::preferences::DEFAULT_RELEVANCE_THRESHOLD;

pub use ai::{AiConfig, AiSection, Provider};

pub const ENV_CONFIG_PATH: &str = "NEWS_ENRICHER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/enricher.toml";

/// File layout. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub embedding_model: String,
    pub clustering_min_samples: usize,
    pub default_relevance_threshold: f32,
    pub ai: AiSection,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            clustering_min_samples: DEFAULT_MIN_SAMPLES,
            default_relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            ai: AiSection::default(),
        }
    }
}

/// Validated, immutable settings handed to constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub embedding_model: String,
    pub clustering_min_samples: usize,
    pub default_relevance_threshold: f32,
    pub ai: AiConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            clustering_min_samples: DEFAULT_MIN_SAMPLES,
            default_relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            ai: AiConfig::disabled(),
        }
    }
}

impl Settings {
    /// Loads from the default locations and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) if !p.trim().is_empty() => read_file(Path::new(p.trim()))?,
            _ => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    read_file(&p)?
                } else {
                    FileSettings::default()
                }
            }
        };
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    /// Loads one explicit file, then applies the process environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::resolve(read_file(path)?, |k| std::env::var(k).ok())
    }

    /// Applies env overrides via `lookup`, resolves the `[ai]` table and validates.
    pub fn resolve(
        mut file: FileSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("NEWS_EMBEDDING_MODEL").filter(|v| !v.trim().is_empty()) {
            file.embedding_model = v.trim().to_string();
        }
        if let Some(v) = lookup("NEWS_CLUSTER_MIN_SAMPLES") {
            file.clustering_min_samples = parse_env("NEWS_CLUSTER_MIN_SAMPLES", &v)?;
        }
        if let Some(v) = lookup("NEWS_RELEVANCE_THRESHOLD") {
            file.default_relevance_threshold = parse_env("NEWS_RELEVANCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("ENABLE_LLM_FEATURES") {
            file.ai.enabled = is_truthy(&v);
        }
        if let Some(v) = lookup("LLM_PROVIDER").filter(|v| !v.trim().is_empty()) {
            file.ai.provider = v;
        }

        let settings = Self {
            embedding_model: file.embedding_model,
            clustering_min_samples: file.clustering_min_samples,
            default_relevance_threshold: file.default_relevance_threshold,
            ai: AiConfig::resolve(&file.ai, &lookup)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clustering_min_samples < 1 {
            return Err(ConfigError::MinSamples(self.clustering_min_samples));
        }
        if !(0.0..=1.0).contains(&self.default_relevance_threshold) {
            return Err(ConfigError::Threshold(self.default_relevance_threshold));
        }
        // model identifiers are checked when the embedder is loaded
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<FileSettings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
        path: format!("env {name}"),
        reason: e.to_string(),
    })
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
