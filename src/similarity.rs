//! Cosine similarity and nearest-article ranking.

use crate::article::{Article, ArticleId};

/// Default cut-off for "similar articles".
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
pub const DEFAULT_SIMILAR_LIMIT: usize = 10;

/// `dot / (|a| |b|)`. `None` when dimensions differ or either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a <= f32::EPSILON || mag_b <= f32::EPSILON {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Some((dot / (mag_a * mag_b)).clamp(-1.0, 1.0))
}

/// Candidates at or above `threshold`, best first, at most `limit`.
/// Ties keep the lower id first. A missing target yields nothing.
pub fn rank_similar<'a, I>(
    target: Option<&[f32]>,
    candidates: I,
    threshold: f32,
    limit: usize,
) -> Vec<(ArticleId, f32)>
where
    I: IntoIterator<Item = (ArticleId, &'a [f32])>,
{
    let Some(target) = target else {
        return Vec::new();
    };
    let mut hits: Vec<(ArticleId, f32)> = candidates
        .into_iter()
        .filter_map(|(id, emb)| cosine_similarity(target, emb).map(|s| (id, s)))
        .filter(|(_, s)| *s >= threshold)
        .collect();
    hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    hits.truncate(limit);
    hits
}

/// Nearest embedded articles of the same user, excluding `target` itself.
pub fn find_similar<'a>(
    target: &Article,
    pool: &'a [Article],
    threshold: f32,
    limit: usize,
) -> Vec<(&'a Article, f32)> {
    let candidates = pool
        .iter()
        .filter(|a| a.id != target.id && a.user_id == target.user_id)
        .filter_map(|a| a.embedding().map(|e| (a.id, e)));
    rank_similar(target.embedding(), candidates, threshold, limit)
        .into_iter()
        .filter_map(|(id, s)| pool.iter().find(|a| a.id == id).map(|a| (a, s)))
        .collect()
}
