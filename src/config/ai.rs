// src/config/ai.rs
//! Judgment-capability (LLM) settings.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Env vars consulted when the key is configured as `"ENV"`, in order.
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => DEFAULT_OPENAI_MODEL,
            Provider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    /// Case-insensitive; `claude` is accepted as an alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// `[ai]` table as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub enabled: bool,
    pub provider: String,
    /// Literal key, or `"ENV"` to read it from the provider's env var.
    pub api_key: String,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: Provider::Anthropic.as_str().to_string(),
            api_key: "ENV".to_string(),
            model: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Resolved settings. The capability counts as enabled only with a key.
#[derive(Clone, PartialEq)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl AiConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            provider: Provider::Anthropic,
            api_key: String::new(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Normalizes the provider and resolves `"ENV"` keys through `lookup`.
    /// A missing env key leaves the capability disabled rather than failing.
    pub fn resolve(
        section: &AiSection,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let provider: Provider = section.provider.parse()?;

        let api_key = if section.api_key.trim().is_empty()
            || section.api_key.trim().eq_ignore_ascii_case("env")
        {
            provider
                .key_env_vars()
                .iter()
                .find_map(|k| lookup(k).filter(|v| !v.trim().is_empty()))
                .unwrap_or_default()
        } else {
            section.api_key.trim().to_string()
        };

        if section.timeout_secs == 0 {
            return Err(ConfigError::Parse {
                path: "[ai]".into(),
                reason: "timeout_secs must be > 0".into(),
            });
        }

        Ok(Self {
            enabled: section.enabled,
            provider,
            api_key,
            model: section
                .model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(provider.default_model())
                .to_string(),
            timeout_secs: section.timeout_secs,
        })
    }

    /// Flag on AND a key available.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn provider_parsing_is_case_insensitive() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" Claude ".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!(matches!(
            "gemini".parse::<Provider>(),
            Err(ConfigError::UnsupportedProvider(p)) if p == "gemini"
        ));
    }

    #[test]
    fn env_key_is_resolved_per_provider() {
        let section = AiSection {
            enabled: true,
            provider: "openai".into(),
            ..Default::default()
        };
        let cfg = AiConfig::resolve(&section, |k| (k == "OPENAI_API_KEY").then(|| "sk-1".into())).unwrap();
        assert_eq!(cfg.api_key, "sk-1");
        assert_eq!(cfg.model, DEFAULT_OPENAI_MODEL);
        assert!(cfg.is_enabled());
    }

    #[test]
    fn missing_key_means_disabled() {
        let section = AiSection {
            enabled: true,
            ..Default::default()
        };
        let cfg = AiConfig::resolve(&section, no_env).unwrap();
        assert!(!cfg.is_enabled());
    }

    #[test]
    fn flag_off_wins_over_key() {
        let section = AiSection {
            enabled: false,
            api_key: "literal".into(),
            ..Default::default()
        };
        let cfg = AiConfig::resolve(&section, no_env).unwrap();
        assert_eq!(cfg.api_key, "literal");
        assert!(!cfg.is_enabled());
    }

    #[test]
    fn debug_redacts_key() {
        let mut cfg = AiConfig::disabled();
        cfg.api_key = "sk-secret".into();
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }
}
