//! Prompt builders for the judgment capability.

use crate::article::Article;
use crate::preferences::UserPreference;

/// Longest body excerpt sent with an insight request.
pub const INSIGHT_BODY_CHARS: usize = 1500;

const HISTORY_TITLES: usize = 5;
const PROMPT_TOPICS: usize = 5;

/// Describes what the user likes, avoids and recently rated highly.
pub fn user_context(prefs: &UserPreference, history: &[Article]) -> String {
    let mut parts = Vec::new();
    if !prefs.preferred_topics.is_empty() {
        parts.push(format!("Preferred topics: {}", prefs.preferred_topics.join(", ")));
    }
    if !prefs.excluded_topics.is_empty() {
        parts.push(format!("Topics to avoid: {}", prefs.excluded_topics.join(", ")));
    }
    if !history.is_empty() {
        let titles: Vec<&str> = history
            .iter()
            .take(HISTORY_TITLES)
            .map(|a| a.title.as_str())
            .collect();
        parts.push(format!("Recently liked articles: {}", titles.join(", ")));
    }
    if parts.is_empty() {
        "No specific preferences set".to_string()
    } else {
        parts.join("\n")
    }
}

pub fn sentiment_label(score: f64) -> &'static str {
    if score > 0.05 {
        "positive"
    } else if score < -0.05 {
        "negative"
    } else {
        "neutral"
    }
}

/// Title, description, sentiment and leading topics of a candidate.
pub fn article_summary(article: &Article) -> String {
    let mut parts = vec![format!("Title: {}", article.title)];
    if let Some(d) = article.description.as_deref() {
        parts.push(format!("Description: {d}"));
    }
    if let Some(s) = article.sentiment() {
        parts.push(format!("Sentiment: {} ({s:.2})", sentiment_label(s)));
    }
    let topics = article.topics();
    if !topics.is_empty() {
        let shown: Vec<&str> = topics.iter().take(PROMPT_TOPICS).map(String::as_str).collect();
        parts.push(format!("Topics: {}", shown.join(", ")));
    }
    parts.join("\n")
}

pub fn relevance_prompt(prefs: &UserPreference, history: &[Article], article: &Article) -> String {
    format!(
        "Analyze this news article and determine how relevant it is to the user's interests.

User Context:
{}

Article to Analyze:
{}

Provide:
1. A relevance score between 0.0 and 1.0 (where 1.0 is highly relevant)
2. A brief reason (one sentence) explaining the score

Consider the article's sentiment and topics in your analysis.

Respond in JSON format:
{{\"score\": 0.0, \"reason\": \"explanation\"}}",
        user_context(prefs, history),
        article_summary(article)
    )
}

pub fn insight_prompt(article: &Article) -> String {
    let mut chunks = vec![format!("Title: {}", article.title)];
    if let Some(d) = article.description.as_deref() {
        chunks.push(format!("Description: {d}"));
    }
    if let Some(c) = article.content.as_deref() {
        let body = c.replace('\n', " ");
        let body = body.trim();
        if body.chars().count() > INSIGHT_BODY_CHARS {
            let cut: String = body.chars().take(INSIGHT_BODY_CHARS).collect();
            chunks.push(format!("Body: {cut}..."));
        } else {
            chunks.push(format!("Body: {body}"));
        }
    }
    format!(
        "You are assisting a news analyst. Read the article below and respond in JSON.

Article:
{}

Return JSON with the following fields:
- summary: A concise 3-4 sentence summary tailored for busy professionals.
- key_points: Array of 3-5 bullet points highlighting facts or implications.
- reliability_score: Float 0.0-1.0 indicating likely reliability.
- reliability_label: One of [\"Highly Reliable\", \"Reliable\", \"Mixed Signals\", \"Unverified\", \"Questionable\"].
- reliability_reason: Short justification referencing sourcing, tone, or factual grounding.
- tone: Qualitative assessment of tone (e.g., \"neutral analysis\", \"strong opinion\").
- suggested_actions: Array of up to 3 actionable follow-ups (can be empty).

Ensure the response is valid JSON.",
        chunks.join("\n")
    )
}
