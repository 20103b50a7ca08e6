//! Co-review graph construction.
//!
//! Folds historical review events into a weighted author→reviewer graph with
//! exponential recency decay, and records which directories each person has
//! worked in recently.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::GraphConfig;
use crate::model::{directory_of, ReviewEvent, UserId};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Immutable weighted graph of who reviews whose merge requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoReviewGraph {
    edges: BTreeMap<UserId, BTreeMap<UserId, f64>>,
    expertise: BTreeMap<UserId, BTreeSet<String>>,
    built_at: DateTime<Utc>,
}

/// Age of `timestamp` relative to `now` in fractional days.
///
/// Timestamps in the future count as age zero.
#[must_use]
pub fn age_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - timestamp).num_milliseconds();
    (millis.max(0) as f64) / MILLIS_PER_DAY
}

impl CoReviewGraph {
    /// Builds a graph from review events as seen at `now`.
    ///
    /// The result does not depend on the order of `events`: per-pair
    /// contributions are summed in sorted order, so permutations of the input
    /// produce bit-identical weights.
    #[must_use]
    pub fn build(events: &[ReviewEvent], now: DateTime<Utc>, config: &GraphConfig) -> Self {
        let mut contributions: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
        let mut expertise: BTreeMap<UserId, BTreeSet<String>> = BTreeMap::new();
        let lookback = f64::from(config.lookback_days);

        for event in events {
            let age = age_days(event.timestamp, now);

            if age <= lookback {
                for user in [&event.author_id, &event.reviewer_id] {
                    let dirs = expertise.entry(user.clone()).or_default();
                    dirs.extend(event.files_touched.iter().map(|p| directory_of(p)));
                }
            }

            if event.author_id == event.reviewer_id {
                continue;
            }

            let base = if event.merged {
                1.0
            } else {
                config.unmerged_penalty
            };
            let weight = base * (-config.decay_lambda * age).exp();

            contributions
                .entry((event.author_id.as_str(), event.reviewer_id.as_str()))
                .or_default()
                .push(weight);
        }

        let mut edges: BTreeMap<UserId, BTreeMap<UserId, f64>> = BTreeMap::new();
        for ((author, reviewer), mut weights) in contributions {
            weights.sort_by(f64::total_cmp);
            let total: f64 = weights.iter().sum();
            edges
                .entry(author.to_string())
                .or_default()
                .insert(reviewer.to_string(), total);
        }

        Self {
            edges,
            expertise,
            built_at: now,
        }
    }

    /// Accumulated weight from `author` to `reviewer`, 0 when absent.
    #[must_use]
    pub fn weight(&self, author: &str, reviewer: &str) -> f64 {
        self.edges
            .get(author)
            .and_then(|out| out.get(reviewer))
            .copied()
            .unwrap_or(0.0)
    }

    /// Largest outgoing weight of `author`, 0 when the author has no edges.
    #[must_use]
    pub fn max_outgoing(&self, author: &str) -> f64 {
        self.edges
            .get(author)
            .map(|out| out.values().copied().fold(0.0, f64::max))
            .unwrap_or(0.0)
    }

    /// Directories `user` touched inside the lookback window.
    #[must_use]
    pub fn expertise(&self, user: &str) -> Option<&BTreeSet<String>> {
        self.expertise.get(user)
    }

    /// Instant the graph was built for.
    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Number of author→reviewer edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    /// True when no edge exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
