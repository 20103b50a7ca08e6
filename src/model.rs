//! Data model shared by the graph, ranking, feature and scoring modules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Identifier of a person (author or reviewer).
pub type UserId = String;

/// Identifier of a merge request.
pub type MergeRequestId = u64;

/// A single historical review of a merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// The merge request this review belongs to.
    pub merge_request_id: MergeRequestId,
    /// Author of the reviewed merge request.
    pub author_id: UserId,
    /// Person who reviewed it.
    pub reviewer_id: UserId,
    /// Project the merge request lives in.
    pub project_id: String,
    /// Whether the merge request was eventually merged.
    pub merged: bool,
    /// Whether the merged change was later reverted or hotfixed.
    #[serde(default)]
    pub reverted: bool,
    /// When the review happened.
    pub timestamp: DateTime<Utc>,
    /// Paths touched by the reviewed merge request.
    #[serde(default)]
    pub files_touched: BTreeSet<String>,
}

/// Read-only description of a merge request under analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequestDescriptor {
    /// Merge request id.
    pub id: MergeRequestId,
    /// Author of the merge request.
    pub author_id: UserId,
    /// Project the merge request lives in.
    pub project_id: String,
    /// Labels attached to the merge request.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Touched paths in diff order.
    #[serde(default)]
    pub file_paths: Vec<String>,
    /// Added lines. Signed so that malformed upstream data can be rejected.
    pub additions: i64,
    /// Deleted lines. Signed so that malformed upstream data can be rejected.
    pub deletions: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time; falls back to `created_at` when absent.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// People who may be suggested as reviewers.
    #[serde(default)]
    pub candidate_reviewers: BTreeSet<UserId>,
    /// Open review count per candidate.
    #[serde(default)]
    pub reviewer_workload: BTreeMap<UserId, u32>,
}

impl MergeRequestDescriptor {
    /// Rejects descriptors the engines cannot reason about.
    ///
    /// Values are never clamped here; a negative line count is an upstream
    /// bug and must be reported as such.
    pub fn validate(&self) -> Result<()> {
        if self.author_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "merge request {} has no author",
                self.id
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "merge request {} has no project",
                self.id
            )));
        }
        if self.additions < 0 || self.deletions < 0 {
            return Err(EngineError::InvalidInput(format!(
                "merge request {} has negative line counts (+{} -{})",
                self.id, self.additions, self.deletions
            )));
        }
        if self.file_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(EngineError::InvalidInput(format!(
                "merge request {} lists an empty file path",
                self.id
            )));
        }
        Ok(())
    }

    /// Total changed lines. Only meaningful after [`validate`](Self::validate).
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.additions.max(0) as u64 + self.deletions.max(0) as u64
    }

    /// Last modification time used for cache fingerprints.
    #[must_use]
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Directories touched by this merge request.
    #[must_use]
    pub fn directories(&self) -> BTreeSet<String> {
        self.file_paths.iter().map(|p| directory_of(p)).collect()
    }
}

/// Returns the directory part of a repository path.
///
/// Files at the repository root map to the empty string.
#[must_use]
pub fn directory_of(path: &str) -> String {
    let trimmed = path.trim_start_matches("./");
    match trimmed.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// A ranked reviewer recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerSuggestion {
    /// Suggested reviewer.
    pub reviewer_id: UserId,
    /// Short deterministic explanation of the dominant signal.
    pub rationale: String,
    /// Composite score clipped to [0, 1].
    pub confidence: f64,
    /// Normalized collaboration sub-score.
    pub collaboration: f64,
    /// Normalized expertise sub-score.
    pub expertise: f64,
    /// Normalized availability sub-score.
    pub availability: f64,
}

/// Names of the risk features, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFeature {
    /// Diff size.
    Size,
    /// Hot-spot editing.
    Churn,
    /// Critical path involvement.
    FileCriticality,
    /// Inverse author experience.
    AuthorExperience,
    /// Past revert/hotfix rate.
    HistoricalDefectRate,
}

impl RiskFeature {
    /// All features in declaration order.
    pub const ALL: [RiskFeature; 5] = [
        RiskFeature::Size,
        RiskFeature::Churn,
        RiskFeature::FileCriticality,
        RiskFeature::AuthorExperience,
        RiskFeature::HistoricalDefectRate,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFeature::Size => "size_score",
            RiskFeature::Churn => "churn_score",
            RiskFeature::FileCriticality => "file_criticality_score",
            RiskFeature::AuthorExperience => "author_experience_score",
            RiskFeature::HistoricalDefectRate => "historical_defect_rate",
        }
    }
}

impl fmt::Display for RiskFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized risk features, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatureVector {
    /// Saturating diff size.
    pub size_score: f64,
    /// Share of touched files that are hot spots.
    pub churn_score: f64,
    /// Share of touched files under a critical prefix.
    pub file_criticality_score: f64,
    /// Higher for less experienced authors.
    pub author_experience_score: f64,
    /// Share of the author's merged work later reverted.
    pub historical_defect_rate: f64,
    /// Features that fell back to the neutral prior.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neutral_defaults: Vec<RiskFeature>,
}

impl RiskFeatureVector {
    /// Value of a single feature.
    #[must_use]
    pub fn get(&self, feature: RiskFeature) -> f64 {
        match feature {
            RiskFeature::Size => self.size_score,
            RiskFeature::Churn => self.churn_score,
            RiskFeature::FileCriticality => self.file_criticality_score,
            RiskFeature::AuthorExperience => self.author_experience_score,
            RiskFeature::HistoricalDefectRate => self.historical_defect_rate,
        }
    }
}

/// Coarse risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    /// Below the low threshold.
    Low,
    /// Between the two thresholds.
    Medium,
    /// At or above the high threshold.
    High,
}

/// Weighted contribution of one feature to the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Feature name.
    pub feature: RiskFeature,
    /// `weight * value`.
    pub weight: f64,
}

/// Final risk estimate for a merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Score in [0, 1].
    pub score: f64,
    /// Bucket derived from the configured thresholds.
    pub category: RiskCategory,
    /// Contributions sorted from largest to smallest.
    pub contributing_features: Vec<FeatureContribution>,
    /// Features computed from the neutral prior because data was missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neutral_defaults: Vec<RiskFeature>,
}

impl RiskAssessment {
    /// True when at least one feature used a neutral default.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.neutral_defaults.is_empty()
    }
}

/// Outcome of an analysis that depends on historical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Analysis<T> {
    /// The analysis ran on real data.
    Ready {
        /// The computed value.
        value: T,
    },
    /// Historical data could not be fetched; nothing was fabricated.
    InsufficientData {
        /// Why data was missing.
        reason: String,
    },
}

impl<T> Analysis<T> {
    /// Returns the value when ready.
    pub fn ready(self) -> Option<T> {
        match self {
            Analysis::Ready { value } => Some(value),
            Analysis::InsufficientData { .. } => None,
        }
    }
}
