//! Density-based clustering (DBSCAN) of a user's articles over cosine distance.
//!
//! Every run recomputes all assignments. Cluster ids are only meaningful
//! within one run.

use metrics::counter;
use tracing::info;

use crate::article::{Article, ArticleId, ClusterLabel};
use crate::error::EmbeddingError;
use crate::logging::TARGET_CLUSTER;
use crate::metrics::{describe, CLUSTER_RUNS_TOTAL};
use crate::similarity::cosine_similarity;

/// Maximum cosine distance between neighbours.
pub const CLUSTER_EPS: f32 = 0.5;
pub const DEFAULT_MIN_SAMPLES: usize = 3;

/// Result of one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRun {
    /// One entry per input article, in input order.
    pub assignments: Vec<(ArticleId, ClusterLabel)>,
    /// Number of non-noise clusters.
    pub clusters: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterEngine {
    eps: f32,
    min_samples: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Noise,
    Member(u32),
}

impl ClusterEngine {
    /// `min_samples` counts the point itself, and values below 1 are raised to 1.
    pub fn new(min_samples: usize) -> Self {
        Self {
            eps: CLUSTER_EPS,
            min_samples: min_samples.max(1),
        }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Clusters one user's articles. Articles without an embedding come back
    /// `Unclustered`; embedded ones come back `Noise` or `Cluster(id)`.
    pub fn cluster_articles(&self, articles: &[Article]) -> Result<ClusterRun, EmbeddingError> {
        describe();
        counter!(CLUSTER_RUNS_TOTAL).increment(1);

        let embedded: Vec<(usize, &[f32])> = articles
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.embedding().map(|e| (i, e)))
            .collect();

        let mut assignments: Vec<(ArticleId, ClusterLabel)> = articles
            .iter()
            .map(|a| (a.id, ClusterLabel::Unclustered))
            .collect();

        if embedded.len() < self.min_samples {
            for (i, _) in &embedded {
                assignments[*i].1 = ClusterLabel::Noise;
            }
            info!(
                target: TARGET_CLUSTER,
                candidates = embedded.len(),
                min_samples = self.min_samples,
                "too few embedded articles to cluster"
            );
            return Ok(ClusterRun {
                assignments,
                clusters: 0,
            });
        }

        let vectors: Vec<&[f32]> = embedded.iter().map(|(_, e)| *e).collect();
        let labels = self.fit(&vectors)?;
        let clusters = labels.iter().filter_map(|l| *l).max().map_or(0, |m| m as usize + 1);

        for ((i, _), label) in embedded.iter().zip(labels) {
            assignments[*i].1 = match label {
                Some(id) => ClusterLabel::Cluster(id),
                None => ClusterLabel::Noise,
            };
        }

        info!(
            target: TARGET_CLUSTER,
            candidates = embedded.len(),
            clusters,
            "clustering run finished"
        );
        Ok(ClusterRun {
            assignments,
            clusters,
        })
    }

    /// Raw DBSCAN over equal-length vectors. `None` marks noise.
    pub fn fit(&self, vectors: &[&[f32]]) -> Result<Vec<Option<u32>>, EmbeddingError> {
        if let Some(first) = vectors.first() {
            let expected = first.len();
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(EmbeddingError::Dimension {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        let neighbours: Vec<Vec<usize>> = (0..vectors.len())
            .map(|i| self.region_query(vectors, i))
            .collect();

        let mut marks = vec![Mark::Unvisited; vectors.len()];
        let mut next_id: u32 = 0;

        for i in 0..vectors.len() {
            if marks[i] != Mark::Unvisited {
                continue;
            }
            if neighbours[i].len() < self.min_samples {
                marks[i] = Mark::Noise;
                continue;
            }
            self.expand_cluster(&neighbours, &mut marks, i, next_id);
            next_id += 1;
        }

        Ok(marks
            .into_iter()
            .map(|m| match m {
                Mark::Member(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    /// Indices within `eps`, including `i` itself.
    fn region_query(&self, vectors: &[&[f32]], i: usize) -> Vec<usize> {
        (0..vectors.len())
            .filter(|&j| i == j || cosine_distance(vectors[i], vectors[j]) <= self.eps)
            .collect()
    }

    fn expand_cluster(&self, neighbours: &[Vec<usize>], marks: &mut [Mark], seed: usize, id: u32) {
        marks[seed] = Mark::Member(id);
        let mut queue: Vec<usize> = neighbours[seed].clone();
        let mut k = 0;
        while k < queue.len() {
            let p = queue[k];
            k += 1;
            match marks[p] {
                Mark::Unvisited => {
                    marks[p] = Mark::Member(id);
                    if neighbours[p].len() >= self.min_samples {
                        for &q in &neighbours[p] {
                            if !queue.contains(&q) {
                                queue.push(q);
                            }
                        }
                    }
                }
                // border point previously seen as noise
                Mark::Noise => marks[p] = Mark::Member(id),
                Mark::Member(_) => {}
            }
        }
    }
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SAMPLES)
    }
}

/// `1 - cos`; vectors without magnitude are maximally unrelated to everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).map_or(1.0, |s| 1.0 - s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::fixtures;

    fn arts(vecs: &[[f32; 2]]) -> Vec<Article> {
        vecs.iter()
            .enumerate()
            .map(|(i, v)| fixtures::enriched(i as i64 + 1, "t", v.to_vec(), &[]))
            .collect()
    }

    #[test]
    fn too_few_candidates_means_no_clusters() {
        let e = ClusterEngine::new(3);
        let run = e.cluster_articles(&arts(&[[1.0, 0.0], [1.0, 0.0]])).unwrap();
        assert_eq!(run.clusters, 0);
        assert!(run.assignments.iter().all(|(_, l)| *l == ClusterLabel::Noise));
    }

    #[test]
    fn two_tight_groups_and_an_outlier() {
        let e = ClusterEngine::new(2);
        let articles = arts(&[
            [1.0, 0.0],
            [0.99, 0.05],
            [0.0, 1.0],
            [0.05, 0.99],
            [-1.0, 0.0],
        ]);
        let run = e.cluster_articles(&articles).unwrap();
        assert_eq!(run.clusters, 2);
        let labels: Vec<_> = run.assignments.iter().map(|(_, l)| *l).collect();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        assert_eq!(labels[4], ClusterLabel::Noise);
    }

    #[test]
    fn unembedded_articles_stay_unclustered() {
        let e = ClusterEngine::new(1);
        let mut articles = arts(&[[1.0, 0.0]]);
        articles.push(fixtures::article(9, "plain"));
        let run = e.cluster_articles(&articles).unwrap();
        assert_eq!(run.assignments[0].1, ClusterLabel::Cluster(0));
        assert_eq!(run.assignments[1], (9, ClusterLabel::Unclustered));
        assert_eq!(run.clusters, 1);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let e = ClusterEngine::new(1);
        let a: &[f32] = &[1.0, 0.0];
        let b: &[f32] = &[1.0, 0.0, 0.0];
        assert_eq!(
            e.fit(&[a, b]),
            Err(EmbeddingError::Dimension {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn min_samples_zero_is_raised() {
        assert_eq!(ClusterEngine::new(0).min_samples(), 1);
    }
}
