//! Error types shared across the enrichment pipeline.
//!
//! Expected degradations (judgment capability disabled or failing) are not
//! errors for the caller: they are converted to heuristic fallbacks inside the
//! scoring and insight components. What remains here is configuration,
//! validation, storage and the explicit `FeatureDisabled` signal.

use crate::article::{ArticleId, UserId};

/// Startup/configuration failures. These are fatal and should halt startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("unsupported embedding model `{0}` (expected `hash-bow-<dims>` or a sentence model such as `all-MiniLM-L6-v2`)")]
    UnsupportedEmbeddingModel(String),

    #[error("embedding model `{0}` needs the `sentence-embeddings` feature")]
    EmbeddingFeatureDisabled(String),

    #[error("loading embedding model `{model}`: {reason}")]
    EmbeddingModelLoad { model: String, reason: String },

    #[error("clustering_min_samples must be >= 1, got {0}")]
    MinSamples(usize),

    #[error("default_relevance_threshold must be within [0, 1], got {0}")]
    Threshold(f32),

    #[error("unsupported judgment provider `{0}`")]
    UnsupportedProvider(String),

    #[error("building http client: {0}")]
    HttpClient(String),
}

/// Input rejected at the boundary with a specific reason. Never coerced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("rating must be between 0.0 and 5.0, got {0}")]
    RatingOutOfRange(f32),

    #[error("relevance threshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f32),

    #[error("rule {rule}: invalid regex `{pattern}`: {reason}")]
    InvalidRegex {
        rule: String,
        pattern: String,
        reason: String,
    },

    #[error("rule {rule}: operator `{operator}` needs {expected}")]
    ConditionValue {
        rule: String,
        operator: &'static str,
        expected: &'static str,
    },

    #[error("rule {rule}: action `{action}` needs a non-empty value")]
    EmptyActionValue { rule: String, action: &'static str },

    #[error("article title must not be empty")]
    EmptyTitle,

    #[error("article link must not be empty")]
    EmptyLink,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("article {0} not found")]
    ArticleNotFound(ArticleId),

    #[error("article {article} does not belong to user {user}")]
    WrongOwner { article: ArticleId, user: UserId },

    #[error("rule {rule} does not belong to user {user}")]
    RuleOwner { rule: i64, user: UserId },

    #[error("an article with link {0} already exists")]
    DuplicateLink(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Failure of a single call to the external judgment capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JudgmentError {
    #[error("judgment capability is disabled")]
    Disabled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("empty response")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl JudgmentError {
    /// `true` for the expected "capability not configured" signal.
    pub fn is_disabled(&self) -> bool {
        matches!(self, JudgmentError::Disabled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Judgment(#[from] JudgmentError),
}

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    /// The judgment capability is not configured. Callers must surface this
    /// separately from content failures.
    #[error("LLM features are disabled")]
    FeatureDisabled,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Insight(#[from] InsightError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// The statistical topic extractor could not build a vocabulary; callers
/// switch to the frequency fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopicError {
    #[error("empty vocabulary after stop-word removal")]
    EmptyVocabulary,
}
