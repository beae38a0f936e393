// src/analyze/mod.rs
//! Feature extraction entry: one pass from text to sentiment, topics,
//! readability, writing style and embedding.

pub mod ai_adapter;
pub mod embedding;
pub mod readability;
pub mod rules;
pub mod scoring;
pub mod style;
pub mod topics;

use crate::article::ArticleFeatures;
use crate::config::Settings;
use crate::error::{ConfigError, EmbeddingError};
use crate::ingest::fingerprint;
use crate::sentiment::SentimentAnalyzer;

// Re-export convenient types.
pub use crate::analyze::embedding::{load_embedder, Embedder, HashingEmbedder};
pub use crate::analyze::rules::{Rule, RuleEngine, RuleOutcome};
pub use crate::analyze::scoring::{HeuristicScorer, ScoreWeights};

/// Pure text → features. Holds the loaded embedding model.
pub struct FeatureExtractor {
    embedder: Box<dyn Embedder>,
    sentiment: SentimentAnalyzer,
}

impl FeatureExtractor {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            sentiment: SentimentAnalyzer::new(),
        }
    }

    /// Loads the configured embedding model. Unknown models are fatal.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(load_embedder(&settings.embedding_model)?))
    }

    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn extract(&self, text: &str) -> Result<ArticleFeatures, EmbeddingError> {
        Ok(ArticleFeatures {
            embedding: self.embedder.embed(text)?,
            topics: topics::extract_topics(text),
            sentiment: self.sentiment.compound(text),
            readability: readability::readability(text),
            writing_style: style::writing_style(text),
            fingerprint: self.fingerprint(text),
        })
    }

    /// Staleness key: changes with the text and with the embedding model.
    pub fn fingerprint(&self, text: &str) -> String {
        fingerprint(&format!("{}\u{1f}{}", self.embedder.model_id(), text))
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Box::new(HashingEmbedder::new(384)))
    }
}
