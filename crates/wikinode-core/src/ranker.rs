//! Candidate scoring over the link neighborhood of an expansion batch
//!
//! Ranking purely by popularity pulls every expansion towards the same
//! densely interlinked core. Instead each candidate is scored by how many
//! other candidates it links with (degree), minus how clustered its own
//! neighborhood is (local clustering coefficient): connected, but not
//! redundant.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::convert::Infallible;

use serde::Serialize;
use tracing::debug;

use crate::pool::BoundedTaskPool;
use crate::source::{ArticleSource, or_zero};
use crate::types::{PageId, normalize_title};

pub const DEFAULT_MAX_RESULTS: usize = 10;

/// An article discovered during expansion, not yet on the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub title: String,
    pub snippet: String,
    pub popularity: u64,
    pub link_count: u64,
    pub page_id: Option<PageId>,
    pub normalized_title: String,
    /// Lowercased titles this candidate links to
    #[serde(skip)]
    pub all_link_titles: HashSet<String>,
    pub candidate_degree: usize,
    pub lcc: f64,
    pub norm_degree: f64,
    pub norm_lcc: f64,
    pub score: f64,
}

impl Candidate {
    pub fn new(title: impl Into<String>, popularity: u64, link_count: u64) -> Self {
        let title = title.into();
        Self {
            normalized_title: normalize_title(&title),
            title,
            snippet: String::new(),
            popularity,
            link_count,
            page_id: None,
            all_link_titles: HashSet::new(),
            candidate_degree: 0,
            lcc: 0.0,
            norm_degree: 0.0,
            norm_lcc: 0.0,
            score: 0.0,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Replace the outbound link set, lowercasing every title
    pub fn with_links<I, T>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.all_link_titles = links
            .into_iter()
            .map(|title| normalize_title(title.as_ref()))
            .collect();
        self
    }

    fn links_to(&self, other: &Candidate) -> bool {
        self.all_link_titles.contains(&other.normalized_title)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateRanker {
    pool: BoundedTaskPool,
    max_results: usize,
}

impl CandidateRanker {
    pub fn new(link_concurrency: usize, max_results: usize) -> Self {
        Self {
            pool: BoundedTaskPool::new(link_concurrency),
            max_results,
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Resolve every candidate's outbound links, score the batch and keep
    /// the best `max_results`.
    pub async fn prune<S>(&self, source: &S, candidates: Vec<Candidate>) -> Vec<Candidate>
    where
        S: ArticleSource + ?Sized,
    {
        let resolved = self.resolve_link_sets(source, candidates).await;
        rank(resolved, self.max_results)
    }

    /// Fill in `page_id` and `all_link_titles` for each candidate.
    ///
    /// A candidate whose page or links cannot be fetched keeps an empty link
    /// set; it can still be linked *to* by the others.
    pub async fn resolve_link_sets<S>(&self, source: &S, candidates: Vec<Candidate>) -> Vec<Candidate>
    where
        S: ArticleSource + ?Sized,
    {
        let outcome = self
            .pool
            .run(candidates, |candidate| async move {
                let page_id = match candidate.page_id {
                    Some(id) => Some(id),
                    None => or_zero(
                        source.resolve_page_id(&candidate.title).await,
                        "page_id",
                        &candidate.title,
                    ),
                };
                let links = match page_id {
                    Some(id) => or_zero(
                        source.fetch_all_outbound_links(id).await,
                        "outbound_links",
                        &candidate.title,
                    ),
                    None => Vec::new(),
                };
                let mut candidate = candidate.with_links(links);
                candidate.page_id = page_id;
                Ok::<_, Infallible>(candidate)
            })
            .await;

        let Ok(resolved) = outcome;
        resolved
    }
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(8, DEFAULT_MAX_RESULTS)
    }
}

/// Score the batch and keep the best `max_results`, highest score first.
///
/// The sort is stable: equal scores keep their input order.
pub fn rank(mut candidates: Vec<Candidate>, max_results: usize) -> Vec<Candidate> {
    score_candidates(&mut candidates);
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates.truncate(max_results);
    for candidate in &candidates {
        debug!(
            title = %candidate.title,
            degree = candidate.candidate_degree,
            lcc = candidate.lcc,
            score = candidate.score,
            "kept candidate"
        );
    }
    candidates
}

/// Compute degree, clustering coefficient, their normalized forms and the
/// final score for every candidate in the batch.
pub fn score_candidates(candidates: &mut [Candidate]) {
    let n = candidates.len();
    let mut linked = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let joined = candidates[i].links_to(&candidates[j]) || candidates[j].links_to(&candidates[i]);
            linked[i][j] = joined;
            linked[j][i] = joined;
        }
    }

    for (i, candidate) in candidates.iter_mut().enumerate() {
        let neighbors: Vec<usize> = (0..n).filter(|&j| linked[i][j]).collect();
        candidate.candidate_degree = neighbors.len();
        candidate.lcc = local_clustering(&neighbors, &linked);
    }

    let degrees: Vec<f64> = candidates
        .iter()
        .map(|candidate| candidate.candidate_degree as f64)
        .collect();
    let lccs: Vec<f64> = candidates.iter().map(|candidate| candidate.lcc).collect();
    let norm_degrees = min_max_normalize(&degrees);
    let norm_lccs = min_max_normalize(&lccs);

    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.norm_degree = norm_degrees[i];
        candidate.norm_lcc = norm_lccs[i];
        candidate.score = candidate.norm_degree - candidate.norm_lcc;
    }
}

/// Fraction of neighbor pairs that are themselves linked; 0 below two neighbors
fn local_clustering(neighbors: &[usize], linked: &[Vec<bool>]) -> f64 {
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }
    let mut linked_pairs = 0usize;
    for (a, &x) in neighbors.iter().enumerate() {
        for &y in &neighbors[a + 1..] {
            if linked[x][y] {
                linked_pairs += 1;
            }
        }
    }
    linked_pairs as f64 / (k * (k - 1) / 2) as f64
}

/// Min-max normalization to `[0, 1]`. A flat distribution maps to all zeros
/// so that it contributes nothing to the ranking.
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|value| (value - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, links: &[&str]) -> Candidate {
        Candidate::new(title, 100, 10).with_links(links.iter().copied())
    }

    fn titles(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.title.as_str()).collect()
    }

    #[test]
    fn degree_counts_links_in_either_direction() {
        let mut batch = vec![
            candidate("A", &["b"]),
            candidate("B", &[]),
            candidate("C", &["A", "Unrelated"]),
        ];
        score_candidates(&mut batch);

        assert_eq!(batch[0].candidate_degree, 2);
        assert_eq!(batch[1].candidate_degree, 1);
        assert_eq!(batch[2].candidate_degree, 1);
    }

    #[test]
    fn clustering_coefficient_is_zero_below_two_neighbors() {
        let mut batch = vec![candidate("A", &["B"]), candidate("B", &[]), candidate("C", &[])];
        score_candidates(&mut batch);
        assert!(batch.iter().all(|c| c.lcc == 0.0));
    }

    #[test]
    fn star_center_outranks_triangle_members() {
        // Triangle A-B-C, plus D linked to A only and E linked to A only.
        let mut batch = vec![
            candidate("A", &["B", "C", "D", "E"]),
            candidate("B", &["C"]),
            candidate("C", &[]),
            candidate("D", &[]),
            candidate("E", &[]),
        ];
        score_candidates(&mut batch);

        // A: 4 neighbors, one linked pair (B-C) of six.
        assert_eq!(batch[0].candidate_degree, 4);
        assert!((batch[0].lcc - 1.0 / 6.0).abs() < 1e-9);
        // B and C: two neighbors that are linked to each other.
        assert_eq!(batch[1].lcc, 1.0);

        let ranked = rank(batch, 10);
        assert_eq!(ranked[0].title, "A");
        assert_eq!(titles(&ranked[3..]), vec!["B", "C"]);
    }

    #[test]
    fn normalized_values_span_zero_to_one() {
        let mut batch = vec![
            candidate("A", &["B", "C"]),
            candidate("B", &[]),
            candidate("C", &[]),
            candidate("D", &[]),
        ];
        score_candidates(&mut batch);

        assert_eq!(batch[0].norm_degree, 1.0);
        assert_eq!(batch[3].norm_degree, 0.0);
        assert_eq!(batch[1].norm_degree, 0.5);
        // Nobody has a clustered neighborhood, so that dimension is flat.
        assert!(batch.iter().all(|c| c.norm_lcc == 0.0));
        assert_eq!(batch[0].score, 1.0);
    }

    #[test]
    fn degenerate_batch_scores_zero_and_keeps_input_order() {
        let batch = vec![
            candidate("Gamma", &[]),
            candidate("Alpha", &[]),
            candidate("Beta", &[]),
        ];
        let ranked = rank(batch, 10);

        assert!(ranked.iter().all(|c| c.score == 0.0));
        assert_eq!(titles(&ranked), vec!["Gamma", "Alpha", "Beta"]);
    }

    #[test]
    fn keeps_at_most_max_results() {
        let batch: Vec<Candidate> = (0..25).map(|i| candidate(&format!("T{i}"), &[])).collect();
        assert_eq!(rank(batch.clone(), DEFAULT_MAX_RESULTS).len(), 10);
        assert_eq!(rank(batch, 3).len(), 3);
    }

    #[test]
    fn empty_batch_is_fine() {
        assert!(rank(Vec::new(), 10).is_empty());
    }

    #[test]
    fn link_titles_are_lowercased() {
        let c = Candidate::new("Rust", 1, 1).with_links(["Cargo (Software)", "LLVM"]);
        assert!(c.all_link_titles.contains("cargo (software)"));
        assert!(c.all_link_titles.contains("llvm"));
        assert_eq!(c.normalized_title, "rust");
    }
}
