// src/analyze/style.rs
//! Writing-style label from sentence length and lexical diversity.

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

pub fn writing_style(text: &str) -> Option<String> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return None;
    }

    let sentences: Vec<&str> = cleaned
        .unicode_sentences()
        .filter(|s| !s.trim().is_empty())
        .collect();
    let tokens: Vec<String> = cleaned
        .unicode_words()
        .filter(|w| w.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
        .collect();
    if sentences.is_empty() || tokens.is_empty() {
        return None;
    }

    let words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    let avg_sentence_len = words as f64 / sentences.len() as f64;
    let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let diversity = unique.len() as f64 / tokens.len() as f64;

    let base = if avg_sentence_len <= 14.0 {
        "Brief & Accessible"
    } else if avg_sentence_len <= 22.0 {
        "Balanced Narrative"
    } else {
        "In-depth Analysis"
    };

    let style = if diversity >= 0.65 {
        format!("{base} • Rich Vocabulary")
    } else if diversity <= 0.4 {
        format!("{base} • Straightforward Language")
    } else {
        base.to_string()
    };
    Some(style)
}
