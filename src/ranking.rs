//! Reviewer ranking.
//!
//! Each candidate gets three normalized sub-scores (collaboration, expertise
//! and availability); their weighted sum is the confidence of the suggestion.

use std::collections::BTreeSet;

use crate::config::RankingWeights;
use crate::graph::CoReviewGraph;
use crate::model::{MergeRequestDescriptor, ReviewerSuggestion};

const RATIONALE_COLLABORATION: &str = "frequent collaborator";
const RATIONALE_EXPERTISE: &str = "touches related files";
const RATIONALE_AVAILABILITY: &str = "low current workload";

/// Jaccard similarity of two sets, 0 when both are empty.
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Picks the rationale of the largest weighted sub-score.
///
/// Ties resolve in the order collaboration, expertise, availability.
fn rationale(collaboration: f64, expertise: f64, availability: f64) -> &'static str {
    if collaboration >= expertise && collaboration >= availability {
        RATIONALE_COLLABORATION
    } else if expertise >= availability {
        RATIONALE_EXPERTISE
    } else {
        RATIONALE_AVAILABILITY
    }
}

/// Ranks the candidate reviewers of `mr` and returns at most `top_k`.
///
/// The author is never suggested. Results are sorted by descending
/// composite score with ties broken by ascending reviewer id; `confidence`
/// is that composite clamped to [0, 1].
#[must_use]
pub fn rank(
    mr: &MergeRequestDescriptor,
    graph: &CoReviewGraph,
    top_k: usize,
    weights: &RankingWeights,
) -> Vec<ReviewerSuggestion> {
    if top_k == 0 {
        return Vec::new();
    }

    let mr_dirs = mr.directories();
    let max_out = graph.max_outgoing(&mr.author_id);
    let empty = BTreeSet::new();

    // Ordered on the unclamped composite; only `confidence` is clamped.
    let mut ranked: Vec<(f64, ReviewerSuggestion)> = mr
        .candidate_reviewers
        .iter()
        .filter(|c| **c != mr.author_id)
        .map(|candidate| {
            let collaboration = if max_out > 0.0 {
                graph.weight(&mr.author_id, candidate) / max_out
            } else {
                0.0
            };
            let expertise = jaccard(&mr_dirs, graph.expertise(candidate).unwrap_or(&empty));
            let workload = mr.reviewer_workload.get(candidate).copied().unwrap_or(0);
            let availability = 1.0 / (1.0 + f64::from(workload));

            let weighted_c = weights.collaboration * collaboration;
            let weighted_e = weights.expertise * expertise;
            let weighted_a = weights.availability * availability;
            let composite = weighted_c + weighted_e + weighted_a;

            let suggestion = ReviewerSuggestion {
                reviewer_id: candidate.clone(),
                rationale: rationale(weighted_c, weighted_e, weighted_a).to_string(),
                confidence: composite.clamp(0.0, 1.0),
                collaboration,
                expertise,
                availability,
            };
            (composite, suggestion)
        })
        .collect();

    ranked.sort_by(|(ca, a), (cb, b)| {
        cb.total_cmp(ca).then_with(|| a.reviewer_id.cmp(&b.reviewer_id))
    });
    ranked
        .into_iter()
        .take(top_k)
        .map(|(_, suggestion)| suggestion)
        .collect()
}
