// src/ingest/mod.rs
//! Boundary for raw article records produced by feed fetchers/scrapers.
//!
//! The fetchers themselves live outside this crate; they hand over
//! `RawArticle` values which are normalized here before storage.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// A record as delivered by RSS/scrape ingestion. `link` is the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

impl RawArticle {
    /// Normalizes every text field; blank optionals become `None`.
    /// Title and link are required.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let title = normalize_text(&self.title);
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let link = self.link.trim().to_string();
        if link.is_empty() {
            return Err(ValidationError::EmptyLink);
        }
        Ok(Self {
            title,
            link,
            description: normalize_opt(self.description),
            content: normalize_opt(self.content),
            author: normalize_opt(self.author),
            published: self.published,
        })
    }
}

fn normalize_opt(s: Option<String>) -> Option<String> {
    s.map(|v| normalize_text(&v)).filter(|v| !v.is_empty())
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Decode entities, strip markup, fold typographic quotes and whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    // Tags become spaces so adjacent paragraphs don't glue words together.
    out = RE_TAGS.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out = RE_WS.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Short SHA-256 hex digest. Used as a staleness key for computed features
/// and as a log-safe stand-in for article text.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
