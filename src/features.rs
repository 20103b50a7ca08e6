//! Risk feature extraction.
//!
//! Turns a merge request and the project's review history into five
//! normalized features. Missing data maps to [`NEUTRAL_PRIOR`], never to zero:
//! zero would claim the change is provably safe.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::config::{EngineConfig, RiskConfig};
use crate::error::Result;
use crate::graph::age_days;
use crate::model::{
    MergeRequestDescriptor, MergeRequestId, ReviewEvent, RiskFeature, RiskFeatureVector,
};

/// Value used for a feature whose inputs are absent.
pub const NEUTRAL_PRIOR: f64 = 0.5;

/// `min(1, ln(1 + value) / ln(1 + cap))`.
#[must_use]
pub fn saturating_log(value: u64, cap: u64) -> f64 {
    if cap == 0 {
        return 1.0;
    }
    ((value as f64).ln_1p() / (cap as f64).ln_1p()).min(1.0)
}

/// Extracts [`RiskFeatureVector`]s from merge requests.
#[derive(Debug, Clone)]
pub struct RiskFeatureAggregator {
    config: RiskConfig,
    lookback_days: f64,
}

impl RiskFeatureAggregator {
    /// Creates an aggregator from the engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.risk.clone(),
            lookback_days: f64::from(config.graph.lookback_days),
        }
    }

    /// Computes the feature vector of `mr` as seen at `as_of`.
    ///
    /// `history` is `None` when the review log could not be fetched. Only the
    /// descriptor is validated; this never fails because of missing history.
    pub fn extract(
        &self,
        mr: &MergeRequestDescriptor,
        history: Option<&[ReviewEvent]>,
        as_of: DateTime<Utc>,
    ) -> Result<RiskFeatureVector> {
        mr.validate()?;

        let mut neutral = Vec::new();
        let mut neutral_if = |feature: RiskFeature, value: Option<f64>| match value {
            Some(v) => v.clamp(0.0, 1.0),
            None => {
                neutral.push(feature);
                NEUTRAL_PRIOR
            }
        };

        let project_history: Option<Vec<&ReviewEvent>> = history.map(|events| {
            events
                .iter()
                .filter(|e| e.project_id == mr.project_id && e.merge_request_id != mr.id)
                .collect()
        });
        let project_history = project_history.filter(|events| !events.is_empty());
        let recent: Option<Vec<&ReviewEvent>> = project_history.as_ref().map(|events| {
            events
                .iter()
                .copied()
                .filter(|e| age_days(e.timestamp, as_of) <= self.lookback_days)
                .collect()
        });

        let size_score = saturating_log(mr.total_lines(), self.config.size_cap);
        let churn_score = neutral_if(RiskFeature::Churn, self.churn(mr, recent.as_deref()));
        let file_criticality_score =
            neutral_if(RiskFeature::FileCriticality, self.criticality(mr));
        let author_experience_score = neutral_if(
            RiskFeature::AuthorExperience,
            self.inexperience(mr, project_history.as_deref()),
        );
        let historical_defect_rate = neutral_if(
            RiskFeature::HistoricalDefectRate,
            defect_rate(mr, recent.as_deref()),
        );

        Ok(RiskFeatureVector {
            size_score,
            churn_score,
            file_criticality_score,
            author_experience_score,
            historical_defect_rate,
            neutral_defaults: neutral,
        })
    }

    /// Share of the MR's files that other recent MRs also touched.
    fn churn(&self, mr: &MergeRequestDescriptor, recent: Option<&[&ReviewEvent]>) -> Option<f64> {
        let recent = recent?;
        let files: BTreeSet<&str> = mr.file_paths.iter().map(String::as_str).collect();
        if files.is_empty() {
            return None;
        }

        let touched: BTreeSet<&str> = recent
            .iter()
            .flat_map(|e| e.files_touched.iter().map(String::as_str))
            .collect();

        let hot = files.intersection(&touched).count();
        Some(hot as f64 / files.len() as f64)
    }

    fn criticality(&self, mr: &MergeRequestDescriptor) -> Option<f64> {
        if self.config.critical_paths.is_empty() {
            return Some(0.0);
        }
        if mr.file_paths.is_empty() {
            return None;
        }
        let critical = mr
            .file_paths
            .iter()
            .filter(|p| {
                self.config
                    .critical_paths
                    .iter()
                    .any(|prefix| p.starts_with(prefix.as_str()))
            })
            .count();
        Some(critical as f64 / mr.file_paths.len() as f64)
    }

    /// Higher for authors with fewer merged MRs in the project.
    fn inexperience(
        &self,
        mr: &MergeRequestDescriptor,
        project_history: Option<&[&ReviewEvent]>,
    ) -> Option<f64> {
        let history = project_history?;
        let merged = merged_by_author(mr, history).len() as u64;
        Some(1.0 - saturating_log(merged, self.config.experience_cap))
    }
}

/// Distinct merged MRs of the author, each flagged when it was reverted.
fn merged_by_author(
    mr: &MergeRequestDescriptor,
    history: &[&ReviewEvent],
) -> BTreeMap<MergeRequestId, bool> {
    let mut merged: BTreeMap<MergeRequestId, bool> = BTreeMap::new();
    for e in history
        .iter()
        .filter(|e| e.author_id == mr.author_id && e.merged)
    {
        *merged.entry(e.merge_request_id).or_default() |= e.reverted;
    }
    merged
}

/// Share of the author's recent merged MRs that were later reverted.
fn defect_rate(mr: &MergeRequestDescriptor, recent: Option<&[&ReviewEvent]>) -> Option<f64> {
    let merged = merged_by_author(mr, recent?);
    if merged.is_empty() {
        return None;
    }
    let reverted = merged.values().filter(|r| **r).count();
    Some(reverted as f64 / merged.len() as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::test_utils::{event, merge_request, now};

    fn aggregator_with_critical(prefixes: &[&str]) -> RiskFeatureAggregator {
        let mut config = EngineConfig::default();
        config.risk.critical_paths = prefixes.iter().map(|p| (*p).to_string()).collect();
        RiskFeatureAggregator::new(&config)
    }

    #[test]
    fn empty_history_auth_change_scenario() {
        let aggregator = aggregator_with_critical(&["auth/"]);
        let mr = merge_request(1, "alice", &["auth/login.py"], 500, 0);
        let features = aggregator.extract(&mr, Some(&[]), now()).unwrap();

        let expected_size = 501f64.ln() / 2001f64.ln();
        assert!((features.size_score - expected_size).abs() < 1e-12);
        assert!((features.size_score - 0.8178).abs() < 1e-4);
        assert_eq!(features.file_criticality_score, 1.0);
        assert_eq!(features.historical_defect_rate, NEUTRAL_PRIOR);
        assert_eq!(features.churn_score, NEUTRAL_PRIOR);
        assert_eq!(features.author_experience_score, NEUTRAL_PRIOR);
        assert_eq!(
            features.neutral_defaults,
            vec![
                RiskFeature::Churn,
                RiskFeature::AuthorExperience,
                RiskFeature::HistoricalDefectRate
            ]
        );
    }

    #[test]
    fn size_saturates_at_cap() {
        let aggregator = aggregator_with_critical(&[]);
        let mr = merge_request(1, "alice", &["a.rs"], 5000, 3000);
        let features = aggregator.extract(&mr, Some(&[]), now()).unwrap();
        assert_eq!(features.size_score, 1.0);

        let empty = merge_request(2, "alice", &["a.rs"], 0, 0);
        assert_eq!(aggregator.extract(&empty, Some(&[]), now()).unwrap().size_score, 0.0);
    }

    #[test]
    fn no_critical_paths_configured_scores_zero() {
        let aggregator = aggregator_with_critical(&[]);
        let mr = merge_request(1, "alice", &["auth/login.py"], 1, 0);
        let features = aggregator.extract(&mr, Some(&[]), now()).unwrap();
        assert_eq!(features.file_criticality_score, 0.0);
        assert!(!features.neutral_defaults.contains(&RiskFeature::FileCriticality));
    }

    #[test]
    fn criticality_is_fraction_of_paths() {
        let aggregator = aggregator_with_critical(&["auth/", "payments/"]);
        let mr = merge_request(
            1,
            "alice",
            &["auth/a.py", "payments/b.py", "docs/c.md", "web/d.ts"],
            1,
            0,
        );
        let features = aggregator.extract(&mr, Some(&[]), now()).unwrap();
        assert_eq!(features.file_criticality_score, 0.5);
    }

    #[test]
    fn churn_counts_files_touched_by_other_recent_mrs() {
        let aggregator = aggregator_with_critical(&[]);
        let history = vec![
            event(10, "bob", "carol", true, 3, &["src/hot.rs"]),
            event(10, "bob", "dave", true, 3, &["src/hot.rs"]),
            event(11, "bob", "carol", true, 400, &["src/stale.rs"]),
            // Events of the MR under assessment are ignored.
            event(1, "alice", "carol", false, 0, &["src/new.rs"]),
        ];
        let mr = merge_request(
            1,
            "alice",
            &["src/hot.rs", "src/stale.rs", "src/new.rs", "src/x.rs"],
            4,
            4,
        );
        let features = aggregator.extract(&mr, Some(&history), now()).unwrap();
        assert_eq!(features.churn_score, 0.25);
    }

    #[test]
    fn experienced_authors_score_lower() {
        let aggregator = aggregator_with_critical(&[]);
        let mut history: Vec<_> = (0..50)
            .map(|i| event(100 + i, "veteran", "bob", true, 30, &["a.rs"]))
            .collect();
        history.push(event(999, "other", "bob", true, 1, &["b.rs"]));

        let veteran = merge_request(1, "veteran", &["a.rs"], 1, 0);
        let newcomer = merge_request(2, "newcomer", &["a.rs"], 1, 0);
        let v = aggregator.extract(&veteran, Some(&history), now()).unwrap();
        let n = aggregator.extract(&newcomer, Some(&history), now()).unwrap();
        assert!(v.author_experience_score.abs() < 1e-12);
        assert_eq!(n.author_experience_score, 1.0);
    }

    #[test]
    fn defect_rate_counts_distinct_reverted_mrs() {
        let aggregator = aggregator_with_critical(&[]);
        let mut reverted = event(20, "alice", "bob", true, 10, &["a.rs"]);
        reverted.reverted = true;
        let history = vec![
            reverted,
            event(20, "alice", "carol", true, 10, &["a.rs"]),
            event(21, "alice", "bob", true, 12, &["a.rs"]),
            event(22, "alice", "bob", true, 15, &["a.rs"]),
            event(23, "alice", "bob", false, 15, &["a.rs"]),
        ];
        let mr = merge_request(1, "alice", &["a.rs"], 1, 0);
        let features = aggregator.extract(&mr, Some(&history), now()).unwrap();
        assert!((features.historical_defect_rate - 1.0 / 3.0).abs() < 1e-12);
        assert!(features.neutral_defaults.is_empty());
    }

    #[test]
    fn unavailable_history_uses_neutral_defaults() {
        let aggregator = aggregator_with_critical(&["auth/"]);
        let mr = merge_request(1, "alice", &["auth/login.py"], 10, 0);
        let features = aggregator.extract(&mr, None, now()).unwrap();
        assert_eq!(features.neutral_defaults.len(), 3);
        assert_eq!(features.churn_score, NEUTRAL_PRIOR);
    }

    #[test]
    fn other_projects_do_not_count() {
        let aggregator = aggregator_with_critical(&[]);
        let mut foreign = event(5, "alice", "bob", true, 1, &["a.rs"]);
        foreign.project_id = "mobile".to_string();
        let mr = merge_request(1, "alice", &["a.rs"], 1, 0);
        let features = aggregator.extract(&mr, Some(&[foreign]), now()).unwrap();
        assert_eq!(features.author_experience_score, NEUTRAL_PRIOR);
    }

    #[test]
    fn invalid_descriptor_is_rejected_before_extraction() {
        let aggregator = aggregator_with_critical(&[]);
        let mr = merge_request(1, "alice", &["a.rs"], -5, 0);
        let err = aggregator.extract(&mr, Some(&[]), now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn features_stay_in_unit_interval(
                additions in 0i64..100_000,
                deletions in 0i64..100_000,
                history in prop::collection::vec((0u64..10, any::<bool>(), any::<bool>(), 0i64..400), 0..20),
            ) {
                let aggregator = aggregator_with_critical(&["auth/"]);
                let events: Vec<_> = history
                    .iter()
                    .map(|(mr, merged, reverted, days)| {
                        let mut e = event(*mr, "alice", "bob", *merged, *days, &["auth/a.rs"]);
                        e.reverted = *reverted;
                        e
                    })
                    .collect();
                let mr = merge_request(999, "alice", &["auth/a.rs", "b.rs"], additions, deletions);
                let f = aggregator.extract(&mr, Some(&events), now()).unwrap();
                for feature in RiskFeature::ALL {
                    prop_assert!((0.0..=1.0).contains(&f.get(feature)), "{feature} = {}", f.get(feature));
                }
            }
        }
    }
}
