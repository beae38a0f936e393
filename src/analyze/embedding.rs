// src/analyze/embedding.rs
//! Dense text embeddings.
//!
//! Two model families:
//! - sentence-transformer models (`all-MiniLM-L6-v2` and friends) run through
//!   fastembed's ONNX runtime. Needs the `sentence-embeddings` feature and
//!   downloads the model on first load.
//! - `hash-bow-<dims>`: a signed feature-hashing bag of words. Unigrams and
//!   bigrams are hashed with FNV-1a into a fixed number of buckets, weighted by
//!   term frequency and L2-normalized. No model files, fully deterministic;
//!   the offline fallback.

use std::collections::BTreeMap;

use crate::error::{ConfigError, EmbeddingError};

#[cfg(feature = "sentence-embeddings")]
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
#[cfg(not(feature = "sentence-embeddings"))]
pub const DEFAULT_EMBEDDING_MODEL: &str = "hash-bow-384";

const MODEL_PREFIX: &str = "hash-bow-";
const MIN_DIMS: usize = 16;
const MAX_DIMS: usize = 4096;
const BIGRAM_WEIGHT: f32 = 0.5;

/// (canonical id, accepted aliases, output dimensions)
const SENTENCE_MODELS: &[(&str, &[&str], usize)] = &[
    (
        "all-MiniLM-L6-v2",
        &["sentence-transformers/all-MiniLM-L6-v2", "Qdrant/all-MiniLM-L6-v2-onnx"],
        384,
    ),
    ("all-MiniLM-L12-v2", &["sentence-transformers/all-MiniLM-L12-v2"], 384),
    ("bge-small-en-v1.5", &["BAAI/bge-small-en-v1.5"], 384),
];

/// Text → fixed-length vector. Same input, same output.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Resolves a configured model identifier. Unknown identifiers are fatal, as
/// is a sentence model that cannot be loaded.
pub fn load_embedder(model_id: &str) -> Result<Box<dyn Embedder>, ConfigError> {
    let id = model_id.trim();
    if let Some(dims) = hash_dims(id) {
        return Ok(Box::new(HashingEmbedder::new(dims)));
    }
    match sentence_model(id) {
        Some((canonical, dims)) => load_sentence_model(canonical, dims),
        None => Err(ConfigError::UnsupportedEmbeddingModel(model_id.to_string())),
    }
}

fn hash_dims(model_id: &str) -> Option<usize> {
    model_id
        .strip_prefix(MODEL_PREFIX)
        .and_then(|d| d.parse::<usize>().ok())
        .filter(|d| (MIN_DIMS..=MAX_DIMS).contains(d))
}

/// Canonical id and dimensions of a known sentence model. Case-insensitive.
pub fn sentence_model(model_id: &str) -> Option<(&'static str, usize)> {
    SENTENCE_MODELS
        .iter()
        .find(|(id, aliases, _)| {
            id.eq_ignore_ascii_case(model_id)
                || aliases.iter().any(|a| a.eq_ignore_ascii_case(model_id))
        })
        .map(|(id, _, dims)| (*id, *dims))
}

#[cfg(feature = "sentence-embeddings")]
fn load_sentence_model(
    model_id: &'static str,
    dimensions: usize,
) -> Result<Box<dyn Embedder>, ConfigError> {
    Ok(Box::new(SentenceEmbedder::load(model_id, dimensions)?))
}

#[cfg(not(feature = "sentence-embeddings"))]
fn load_sentence_model(
    model_id: &'static str,
    _dimensions: usize,
) -> Result<Box<dyn Embedder>, ConfigError> {
    Err(ConfigError::EmbeddingFeatureDisabled(model_id.to_string()))
}

fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Sentence-transformer model behind fastembed. Calls are serialized on the
/// session mutex.
#[cfg(feature = "sentence-embeddings")]
pub struct SentenceEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    model_id: &'static str,
    dimensions: usize,
}

#[cfg(feature = "sentence-embeddings")]
impl SentenceEmbedder {
    /// Loads the ONNX model, downloading it into fastembed's cache on first
    /// use.
    pub fn load(model_id: &'static str, dimensions: usize) -> Result<Self, ConfigError> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = match model_id {
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "all-MiniLM-L12-v2" => EmbeddingModel::AllMiniLML12V2,
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            other => return Err(ConfigError::UnsupportedEmbeddingModel(other.to_string())),
        };
        let session = TextEmbedding::try_new(
            InitOptions::new(model).with_show_download_progress(false),
        )
        .map_err(|e| ConfigError::EmbeddingModelLoad {
            model: model_id.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            target: crate::logging::TARGET_ENRICH,
            model = model_id,
            dimensions,
            "sentence embedding model loaded"
        );
        Ok(Self {
            model: std::sync::Mutex::new(session),
            model_id,
            dimensions,
        })
    }
}

#[cfg(feature = "sentence-embeddings")]
impl Embedder for SentenceEmbedder {
    fn model_id(&self) -> &str {
        self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimensions]);
        }
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::Inference("model lock poisoned".into()))?;
        let mut batch = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let mut vec = batch
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("model returned no vector".into()))?;
        if vec.len() != self.dimensions {
            return Err(EmbeddingError::Dimension {
                expected: self.dimensions,
                actual: vec.len(),
            });
        }
        l2_normalize(&mut vec);
        Ok(vec)
    }
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_id: format!("{MODEL_PREFIX}{dimensions}"),
        }
    }

    fn fnv1a(term: &str) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// Bucket plus sign; the top bit of the hash picks the sign so that
    /// colliding terms tend to cancel instead of piling up.
    fn slot(&self, term: &str) -> (usize, f32) {
        let h = Self::fnv1a(term);
        let bucket = (h % self.dimensions as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vec = vec![0.0f32; self.dimensions];
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return Ok(vec);
        }

        let mut tf: BTreeMap<String, f32> = BTreeMap::new();
        for t in &tokens {
            *tf.entry(t.clone()).or_default() += 1.0;
        }
        for pair in tokens.windows(2) {
            *tf.entry(format!("{} {}", pair[0], pair[1])).or_default() += BIGRAM_WEIGHT;
        }

        let total = tokens.len() as f32;
        for (term, count) in &tf {
            // longer terms carry more signal than short function words
            let idf = 1.0 + (term.chars().count() as f32).ln();
            let (bucket, sign) = self.slot(term);
            vec[bucket] += sign * (count / total) * idf;
        }

        l2_normalize(&mut vec);
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn hash_models_load_with_requested_dims() {
        let e = load_embedder(" hash-bow-384 ").unwrap();
        assert_eq!(e.dimensions(), 384);
        assert_eq!(e.model_id(), "hash-bow-384");
        assert_eq!(load_embedder("hash-bow-16").unwrap().dimensions(), 16);
    }

    #[test]
    fn sentence_model_ids_and_aliases_resolve() {
        assert_eq!(sentence_model("all-MiniLM-L6-v2"), Some(("all-MiniLM-L6-v2", 384)));
        assert_eq!(
            sentence_model("sentence-transformers/all-minilm-l6-v2"),
            Some(("all-MiniLM-L6-v2", 384))
        );
        assert_eq!(sentence_model("BAAI/bge-small-en-v1.5"), Some(("bge-small-en-v1.5", 384)));
        assert_eq!(sentence_model("hash-bow-384"), None);
    }

    #[cfg(not(feature = "sentence-embeddings"))]
    #[test]
    fn sentence_models_need_the_feature() {
        match load_embedder("sentence-transformers/all-MiniLM-L6-v2") {
            Err(ConfigError::EmbeddingFeatureDisabled(id)) => assert_eq!(id, "all-MiniLM-L6-v2"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(e) => panic!("loaded {} without the feature", e.model_id()),
        }
    }

    #[test]
    fn unknown_models_are_rejected() {
        for id in ["bert-large", "hash-bow-", "hash-bow-8", "hash-bow-99999"] {
            assert!(
                matches!(load_embedder(id), Err(ConfigError::UnsupportedEmbeddingModel(_))),
                "{id}"
            );
        }
    }

    #[test]
    fn deterministic_and_normalized() {
        let e = HashingEmbedder::new(256);
        let a = e.embed("Central bank raises interest rates").unwrap();
        let b = e.embed("Central bank raises interest rates").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(64);
        assert!(e.embed("").unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn related_texts_are_closer_than_unrelated() {
        let e = HashingEmbedder::new(384);
        let a = e.embed("Central bank raises interest rates to fight inflation").unwrap();
        let b = e.embed("Central bank raises interest rates again").unwrap();
        let c = e.embed("Local team wins the football championship").unwrap();
        let ab = cosine_similarity(&a, &b).unwrap();
        let ac = cosine_similarity(&a, &c).unwrap_or(0.0);
        assert!(ab > ac, "ab={ab} ac={ac}");
        assert!(ab > 0.5);
    }

    #[cfg(feature = "sentence-embeddings")]
    #[test]
    #[ignore] // downloads the model: cargo test --features sentence-embeddings -- --ignored
    fn minilm_embeds_related_news_closer() {
        let e = load_embedder("all-MiniLM-L6-v2").unwrap();
        assert_eq!(e.model_id(), "all-MiniLM-L6-v2");
        let a = e.embed("Central bank raises interest rates to fight inflation").unwrap();
        let b = e.embed("The Fed hikes rates again as prices keep climbing").unwrap();
        let c = e.embed("Local team wins the football championship").unwrap();
        assert_eq!(a.len(), 384);
        assert_eq!(a, e.embed("Central bank raises interest rates to fight inflation").unwrap());
        let ab = cosine_similarity(&a, &b).unwrap();
        let ac = cosine_similarity(&a, &c).unwrap();
        assert!(ab > ac, "ab={ab} ac={ac}");
        assert!(e.embed("  ").unwrap().iter().all(|&x| x == 0.0));
    }
}
