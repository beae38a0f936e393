// src/analyze/readability.rs
//! Flesch reading ease with a heuristic syllable counter.

use unicode_segmentation::UnicodeSegmentation;

use crate::article::{Readability, ReadabilityLabel};

/// Score rounded to two decimals plus its band. `None` for text without words.
pub fn readability(text: &str) -> Option<Readability> {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return None;
    }

    let words: Vec<&str> = cleaned
        .unicode_words()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .collect();
    if words.is_empty() {
        return None;
    }
    let sentences = cleaned
        .unicode_sentences()
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let wc = words.len() as f64;
    let score = 206.835 - 1.015 * (wc / sentences as f64) - 84.6 * (syllables as f64 / wc);
    if !score.is_finite() {
        return None;
    }
    let score = (score * 100.0).round() / 100.0;
    Some(Readability {
        score,
        label: ReadabilityLabel::from_score(score),
    })
}

/// Vowel-group count with the usual silent-e correction; never below one.
pub fn count_syllables(word: &str) -> usize {
    let w: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect();
    if w.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut groups = 0;
    let mut prev_vowel = false;
    for &c in &w {
        let v = is_vowel(c);
        if v && !prev_vowel {
            groups += 1;
        }
        prev_vowel = v;
    }

    let n = w.len();
    if groups > 1 && w[n - 1] == 'e' {
        // "-le" after a consonant keeps its syllable ("table").
        let le = n >= 3 && w[n - 2] == 'l' && !is_vowel(w[n - 3]);
        if !le {
            groups -= 1;
        }
    } else if groups > 1 && n > 3 && w[n - 2] == 'e' && matches!(w[n - 1], 'd' | 's') {
        // silent "-ed"/"-es" unless preceded by t/d or s/x/z/ch-ish endings
        let before = w[n - 3];
        let voiced = if w[n - 1] == 'd' {
            matches!(before, 't' | 'd')
        } else {
            matches!(before, 's' | 'x' | 'z' | 'c' | 'g')
        };
        if !voiced && !is_vowel(before) {
            groups -= 1;
        }
    }
    groups.max(1)
}
