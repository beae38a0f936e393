//! Judgment capability: provider abstraction over LLM chat APIs.
//!
//! Callers check [`JudgmentClient::is_enabled`] before building prompts;
//! every failure comes back as a [`JudgmentError`] so the caller can fall back
//! to its heuristic path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{AiConfig, Provider};
use crate::error::{ConfigError, JudgmentError};
use crate::logging::TARGET_JUDGMENT;

const USER_AGENT: &str = concat!("news-enricher/", env!("CARGO_PKG_VERSION"));
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait JudgmentClient: Send + Sync {
    /// Sends one user prompt, returns the raw text reply.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, JudgmentError>;

    /// Provider name for logs and metrics.
    fn provider_name(&self) -> &'static str;

    /// `false` when the capability is not configured; callers must not call `complete`.
    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynJudgmentClient = Arc<dyn JudgmentClient>;

/// Builds the configured client, or [`DisabledClient`] when the capability is off.
pub fn build_judgment_client(cfg: &AiConfig) -> Result<DynJudgmentClient, ConfigError> {
    if !cfg.is_enabled() {
        debug!(target: TARGET_JUDGMENT, enabled = cfg.enabled, "judgment capability disabled");
        return Ok(Arc::new(DisabledClient));
    }
    let http = http_client(cfg.timeout_secs)?;
    let timeout = Duration::from_secs(cfg.timeout_secs);
    Ok(match cfg.provider {
        Provider::OpenAi => Arc::new(OpenAiClient {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            timeout,
        }),
        Provider::Anthropic => Arc::new(AnthropicClient {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            timeout,
        }),
    })
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

fn transport(e: reqwest::Error) -> JudgmentError {
    if e.is_timeout() {
        JudgmentError::Timeout
    } else {
        JudgmentError::Transport(e.to_string())
    }
}

/// Sends `req` under an outer deadline and decodes the JSON body.
async fn send_json<T: for<'de> Deserialize<'de>>(
    req: reqwest::RequestBuilder,
    timeout: Duration,
    provider: &'static str,
) -> Result<T, JudgmentError> {
    let resp = tokio::time::timeout(timeout, req.send())
        .await
        .map_err(|_| JudgmentError::Timeout)?
        .map_err(transport)?;
    let status = resp.status();
    if !status.is_success() {
        warn!(target: TARGET_JUDGMENT, provider, status = status.as_u16(), "judgment request rejected");
        return Err(JudgmentError::Status(status.as_u16()));
    }
    resp.json::<T>()
        .await
        .map_err(|e| JudgmentError::Malformed(e.to_string()))
}

/// OpenAI Chat Completions.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[async_trait]
impl JudgmentClient for OpenAiClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, JudgmentError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
            max_tokens,
        };
        let body: Resp = send_json(
            self.http.post(OPENAI_URL).bearer_auth(&self.api_key).json(&req),
            self.timeout,
            self.provider_name(),
        )
        .await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(JudgmentError::EmptyResponse)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[async_trait]
impl JudgmentClient for AnthropicClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, JudgmentError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(default)]
            text: Option<String>,
        }

        let req = Req {
            model: &self.model,
            max_tokens,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };
        let body: Resp = send_json(
            self.http
                .post(ANTHROPIC_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&req),
            self.timeout,
            self.provider_name(),
        )
        .await?;
        body.content
            .into_iter()
            .find_map(|b| b.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(JudgmentError::EmptyResponse)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

/// Used when the capability is not configured.
pub struct DisabledClient;

#[async_trait]
impl JudgmentClient for DisabledClient {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, JudgmentError> {
        Err(JudgmentError::Disabled)
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Scripted client for tests and offline runs: replays queued replies,
/// then repeats the last one. Records the prompts it saw.
pub struct StaticClient {
    replies: Mutex<VecDeque<Result<String, JudgmentError>>>,
    last: Mutex<Result<String, JudgmentError>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StaticClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::scripted(vec![Ok(reply.into())])
    }

    pub fn failing(err: JudgmentError) -> Self {
        Self::scripted(vec![Err(err)])
    }

    pub fn scripted(replies: Vec<Result<String, JudgmentError>>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or(Err(JudgmentError::EmptyResponse));
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(last),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JudgmentClient for StaticClient {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, JudgmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(r) => r,
            None => self
                .last
                .lock()
                .map(|l| l.clone())
                .unwrap_or(Err(JudgmentError::EmptyResponse)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

/// Returns the JSON object inside a reply: code fences and chatter around
/// the outermost `{ ... }` are dropped.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Single line, collapsed whitespace, at most `max_chars` characters.
pub fn sanitize_reason(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars * 4));
    let mut prev_space = false;
    let mut count = 0;
    for ch in input.chars() {
        if ch.is_control() && !ch.is_whitespace() {
            continue;
        }
        if ch.is_whitespace() {
            if !prev_space && !out.is_empty() {
                out.push(' ');
                count += 1;
            }
            prev_space = true;
        } else {
            out.push(ch);
            count += 1;
            prev_space = false;
        }
        if count >= max_chars {
            break;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let raw = "Sure!\n```json\n{\"score\": 0.8, \"reason\": \"fits {ai}\"}\n```";
        assert_eq!(
            extract_json(raw),
            Some("{\"score\": 0.8, \"reason\": \"fits {ai}\"}")
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn sanitize_collapses_and_caps() {
        assert_eq!(sanitize_reason("  a\n\n b\tc  ", 100), "a b c");
        assert_eq!(sanitize_reason("abcdef", 3), "abc");
        assert_eq!(sanitize_reason("žluťoučký kůň", 100), "žluťoučký kůň");
    }

    #[tokio::test]
    async fn disabled_client_reports_disabled() {
        let c = DisabledClient;
        assert!(!c.is_enabled());
        assert_eq!(c.complete("x", 10).await, Err(JudgmentError::Disabled));
    }

    #[tokio::test]
    async fn static_client_replays_then_repeats() {
        let c = StaticClient::scripted(vec![
            Err(JudgmentError::Timeout),
            Ok("{\"score\": 1}".into()),
        ]);
        assert_eq!(c.complete("p1", 10).await, Err(JudgmentError::Timeout));
        assert_eq!(c.complete("p2", 10).await.unwrap(), "{\"score\": 1}");
        assert_eq!(c.complete("p3", 10).await.unwrap(), "{\"score\": 1}");
        assert_eq!(c.calls(), 3);
        assert_eq!(c.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn disabled_config_builds_disabled_client() {
        let client = build_judgment_client(&AiConfig::disabled()).unwrap();
        assert!(!client.is_enabled());
        assert_eq!(client.provider_name(), "disabled");
    }

    #[test]
    fn enabled_config_builds_provider_client() {
        let mut cfg = AiConfig::disabled();
        cfg.enabled = true;
        cfg.api_key = "sk-test".into();
        cfg.provider = Provider::OpenAi;
        let client = build_judgment_client(&cfg).unwrap();
        assert!(client.is_enabled());
        assert_eq!(client.provider_name(), "openai");
    }
}
