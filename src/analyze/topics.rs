// src/analyze/topics.rs
//! Topic labels for one document: salient TF-IDF terms plus coarse categories.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::article::MAX_TOPICS;
use crate::error::TopicError;

const MAX_FEATURES: usize = 20;
const TOP_SCORED: usize = 15;
const MAX_TERMS: usize = 10;

/// Keyword table; a category applies when any keyword occurs as a substring.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "technology",
        &[
            "tech", "software", "hardware", "computer", "digital", "internet", "online", "cyber",
            "data", "cloud", "app", "smartphone", "device",
        ],
    ),
    (
        "ai",
        &[
            "artificial intelligence", "machine learning", "neural", "deep learning", "chatgpt",
            "openai", "anthropic", "claude", "gpt", "model", "llm", "transformer",
        ],
    ),
    (
        "business",
        &[
            "business", "company", "corporate", "market", "stock", "investment", "finance",
            "economy", "trade", "industry", "startup", "enterprise",
        ],
    ),
    (
        "politics",
        &[
            "politics", "government", "election", "president", "congress", "senate", "policy",
            "legislation", "political", "democrat", "republican", "vote",
        ],
    ),
    (
        "science",
        &[
            "science", "research", "study", "scientist", "discovery", "experiment", "university",
            "journal", "academic", "laboratory",
        ],
    ),
    (
        "health",
        &[
            "health", "medical", "disease", "patient", "doctor", "hospital", "medicine",
            "treatment", "vaccine", "virus", "healthcare", "wellness",
        ],
    ),
    (
        "sports",
        &[
            "sports", "game", "player", "team", "coach", "league", "championship", "football",
            "basketball", "baseball", "soccer", "tennis",
        ],
    ),
    (
        "entertainment",
        &[
            "movie", "film", "music", "actor", "celebrity", "entertainment", "hollywood",
            "concert", "album", "show", "series", "netflix",
        ],
    ),
    (
        "security",
        &[
            "security", "cybersecurity", "breach", "hack", "vulnerability", "attack", "malware",
            "ransomware", "encryption", "privacy", "password",
        ],
    ),
];

/// Markup/protocol noise, UI chrome, news-source names, file extensions.
static BLACKLIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "http", "https", "www", "com", "org", "net", "html", "xml", "json", "api", "url", "link",
        "href", "src", "img", "div", "span", "class", "read", "more", "click", "here", "article",
        "post", "page", "site", "website", "blog", "news", "today", "said", "says", "according",
        "report", "reports", "reported", "story", "stories", "comment", "comments", "share",
        "tweet", "follow", "subscribe", "newsletter", "theguardian", "nytimes", "bbc", "cnn",
        "reuters", "bloomberg", "jpeg", "jpg", "png", "gif", "pdf", "svg",
    ]
    .into_iter()
    .collect()
});

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "almost", "also", "although",
        "always", "am", "among", "an", "and", "another", "any", "are", "around", "as", "at",
        "back", "be", "became", "because", "become", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing",
        "done", "down", "during", "each", "either", "else", "enough", "even", "ever", "every",
        "few", "for", "from", "further", "get", "gets", "got", "had", "has", "have", "having",
        "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "if",
        "in", "into", "is", "it", "its", "itself", "just", "last", "least", "less", "let", "like",
        "made", "make", "many", "may", "me", "might", "more", "most", "much", "must", "my",
        "myself", "neither", "never", "new", "no", "nor", "not", "now", "of", "off", "often",
        "on", "once", "one", "only", "or", "other", "others", "our", "ours", "ourselves", "out",
        "over", "own", "per", "perhaps", "quite", "rather", "same", "say", "says", "see",
        "seem", "seemed", "several", "she", "should", "since", "so", "some", "still", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "though", "through", "thus", "to", "together", "too",
        "toward", "two", "under", "until", "up", "upon", "us", "very", "via", "was", "we",
        "well", "were", "what", "whatever", "when", "where", "whether", "which", "while", "who",
        "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you",
        "your", "yours", "yourself",
    ]
    .into_iter()
    .collect()
});

/// Extra stop words only the frequency fallback applies.
const FALLBACK_STOP_WORDS: &[&str] = &[
    "people", "year", "good", "time", "know", "take", "think", "look", "come", "work", "first",
    "want", "give", "day", "use", "way", "said", "news", "today", "report", "story", "read",
];

static RE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z][a-zA-Z]+\b").expect("word regex"));
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));

/// Up to [`MAX_TOPICS`] labels: matched categories first, then salient terms.
pub fn extract_topics(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let terms = match salient_terms(text) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(target: "enrich", error = %e, "tf-idf failed, using frequency fallback");
            frequency_terms(text)
        }
    };

    // The noise filter covers category labels too; "ai" is too short to survive it.
    let mut seen = HashSet::new();
    categorize(text)
        .into_iter()
        .map(str::to_string)
        .chain(terms)
        .filter(|t| keep_topic(t))
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_TOPICS)
        .collect()
}

/// Single-document TF-IDF over unigrams and bigrams.
///
/// With one document every IDF equals 1, so the ranking reduces to
/// l2-normalized term frequency over the `MAX_FEATURES` most frequent terms.
pub fn salient_terms(text: &str) -> Result<Vec<String>, TopicError> {
    let tokens: Vec<String> = RE_WORD
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .collect();
    if tokens.is_empty() {
        return Err(TopicError::EmptyVocabulary);
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for t in &tokens {
        *counts.entry(t.clone()).or_default() += 1;
    }
    for pair in tokens.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
    }

    // BTreeMap iteration is alphabetical, and the sort is stable: ties stay alphabetical.
    let mut features: Vec<(String, usize)> = counts.into_iter().collect();
    features.sort_by(|a, b| b.1.cmp(&a.1));
    features.truncate(MAX_FEATURES);

    let norm = features
        .iter()
        .map(|(_, c)| (*c as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    let mut scored: Vec<(String, f64)> = features
        .into_iter()
        .map(|(t, c)| (t, c as f64 / norm))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(scored
        .into_iter()
        .take(TOP_SCORED)
        .filter(|(t, s)| *s > 0.0 && !BLACKLIST.contains(t.as_str()))
        .map(|(t, _)| t)
        .take(MAX_TERMS)
        .collect())
}

/// Most frequent longer words; used when the TF-IDF pass has nothing to work with.
pub fn frequency_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = RE_PUNCT.replace_all(&lowered, " ");

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for w in cleaned.split_whitespace() {
        if w.chars().count() <= 3
            || w.chars().all(|c| c.is_ascii_digit())
            || STOP_WORDS.contains(w)
            || BLACKLIST.contains(w)
            || FALLBACK_STOP_WORDS.contains(&w)
        {
            continue;
        }
        let c = counts.entry(w).or_default();
        if *c == 0 {
            order.push(w);
        }
        *c += 1;
    }

    // First occurrence breaks ties.
    let mut ranked: Vec<(usize, &str)> = order.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| counts[b.1].cmp(&counts[a.1]).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(MAX_TERMS)
        .map(|(_, w)| w.to_string())
        .collect()
}

/// Category labels whose keywords occur in the text, in table order.
pub fn categorize(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    CATEGORIES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(name, _)| *name)
        .collect()
}

fn keep_topic(topic: &str) -> bool {
    let lower = topic.to_lowercase();
    !BLACKLIST.contains(lower.as_str())
        && !topic.contains(['/', '.', '@', '#'])
        && !["http", "www", "url", "link"].iter().any(|w| lower.contains(w))
        && topic.chars().count() > 2
        && !topic.replace(' ', "").chars().all(|c| c.is_ascii_digit())
}
