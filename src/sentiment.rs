use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Word valences in [-4, 4], embedded at build time.
static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid sentiment lexicon")
});

const NEGATION_SCALAR: f64 = -0.74;
const BOOST_INCR: f64 = 0.293;
const CAPS_INCR: f64 = 0.733;
const EXCLAIM_INCR: f64 = 0.292;
const MAX_EXCLAIMS: usize = 4;
/// Normalization constant of the compound score.
const ALPHA: f64 = 15.0;

/// Lexicon/rule polarity scorer.
///
/// Each lexicon hit is adjusted for nearby boosters, negators (three-token
/// window) and shouting; a contrastive "but" down-weights the clause before it
/// and up-weights the one after. The summed valence is squashed to [-1, 1].
#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> f64 {
        LEXICON.get(w).copied().unwrap_or(0.0)
    }

    /// Returns (summed valence, token count).
    pub fn score_text(&self, text: &str) -> (f64, usize) {
        let raw: Vec<&str> = tokenize(text).collect();
        let lower: Vec<String> = raw.iter().map(|t| t.to_lowercase()).collect();
        let shouting_matters = is_mixed_case(&raw);
        let but_at = lower.iter().position(|t| t == "but");

        let mut sum = 0.0;
        for (i, w) in lower.iter().enumerate() {
            let base = self.word_score(w);
            if base == 0.0 {
                continue;
            }
            let mut v = base;

            if shouting_matters && is_shouted(raw[i]) {
                v += CAPS_INCR * base.signum();
            }

            for k in 1..=3 {
                if i < k {
                    break;
                }
                let prev = lower[i - k].as_str();
                if let Some(b) = booster(prev) {
                    let damp = 1.0 - 0.05 * (k as f64 - 1.0);
                    v += b * damp * base.signum();
                }
            }

            if (1..=3).any(|k| i >= k && is_negator(lower[i - k].as_str())) {
                v *= NEGATION_SCALAR;
            }

            if let Some(b) = but_at {
                if i < b {
                    v *= 0.5;
                } else if i > b {
                    v *= 1.5;
                }
            }

            sum += v;
        }

        if sum != 0.0 {
            let bangs = text.matches('!').count().min(MAX_EXCLAIMS) as f64;
            sum += bangs * EXCLAIM_INCR * sum.signum();
        }

        (sum, raw.len())
    }

    /// Compound polarity in [-1, 1]. Empty or neutral text scores 0.0.
    pub fn compound(&self, text: &str) -> f64 {
        let (sum, _) = self.score_text(text);
        if sum == 0.0 {
            return 0.0;
        }
        (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}

/// Word tokens; apostrophes stay inside words so "isn't" survives.
fn tokenize(s: &str) -> impl Iterator<Item = &str> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
}

fn is_shouted(tok: &str) -> bool {
    tok.chars().count() > 1
        && tok.chars().any(char::is_alphabetic)
        && !tok.chars().any(char::is_lowercase)
}

/// Shouting only carries signal when the rest of the text is not all caps.
fn is_mixed_case(tokens: &[&str]) -> bool {
    let shouted = tokens.iter().filter(|t| is_shouted(t)).count();
    shouted > 0 && shouted < tokens.len()
}

fn booster(tok: &str) -> Option<f64> {
    match tok {
        "very" | "extremely" | "really" | "highly" | "incredibly" | "hugely" | "most"
        | "so" | "totally" | "deeply" | "especially" | "remarkably" => Some(BOOST_INCR),
        "slightly" | "barely" | "hardly" | "somewhat" | "marginally" | "partly" | "little" => {
            Some(-BOOST_INCR)
        }
        _ => None,
    }
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "weren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
            | "nor"
            | "neither"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral() {
        let a = SentimentAnalyzer::new();
        assert_eq!(a.compound(""), 0.0);
        assert_eq!(a.compound("   ...  "), 0.0);
    }

    #[test]
    fn rally_headline_is_positive() {
        let a = SentimentAnalyzer::new();
        let s = a.compound("Stocks rally as tech giants report record profits. ");
        assert!(s > 0.05, "got {s}");
    }

    #[test]
    fn crash_headline_is_negative() {
        let a = SentimentAnalyzer::new();
        assert!(a.compound("Markets crash amid war fears") < -0.05);
    }

    #[test]
    fn negation_flips_polarity() {
        let a = SentimentAnalyzer::new();
        assert!(a.compound("The launch was good") > 0.0);
        assert!(a.compound("The launch was not good") < 0.0);
    }

    #[test]
    fn boosters_and_shouting_amplify() {
        let a = SentimentAnalyzer::new();
        let plain = a.compound("the results were good");
        assert!(a.compound("the results were very good") > plain);
        assert!(a.compound("the results were GOOD") > plain);
        assert!(a.compound("the results were good!!") > plain);
    }

    #[test]
    fn but_shifts_weight_to_second_clause() {
        let a = SentimentAnalyzer::new();
        assert!(a.compound("The food was great but the service was terrible") < 0.0);
    }

    #[test]
    fn compound_stays_in_range() {
        let a = SentimentAnalyzer::new();
        let s = a.compound(&"excellent amazing wonderful triumph ".repeat(50));
        assert!(s <= 1.0 && s > 0.9);
        let s = a.compound(&"murder terror catastrophe ".repeat(50));
        assert!(s >= -1.0 && s < -0.9);
    }
}
