// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod article;
pub mod config;
pub mod error;
pub mod ingest;
pub mod preferences;
pub mod sentiment;

// Text analysis, rules, scoring and the judgment adapter
pub mod analyze;

pub mod analytics;
pub mod cluster;
pub mod insights;
pub mod listing;
pub mod prompts;
pub mod recommend;
pub mod similarity;

pub mod pipeline;
pub mod store;

pub mod logging;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use analyze::{FeatureExtractor, Rule, RuleEngine};
pub use article::{Article, ArticleFeatures, ArticleId, ClusterLabel, UserId};
pub use cluster::ClusterEngine;
pub use config::Settings;
pub use error::{ConfigError, PipelineError, StoreError, ValidationError};
pub use ingest::RawArticle;
pub use insights::{Insight, InsightGenerator};
pub use pipeline::{BatchReport, Pipeline};
pub use preferences::{PreferenceUpdate, UserPreference};
pub use recommend::{Recommendation, Recommender};
pub use store::{ArticleStore, MemoryStore};
