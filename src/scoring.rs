//! Risk scoring.
//!
//! A weighted linear combination of the feature vector, clamped to [0, 1]
//! and bucketed by two thresholds.

use crate::config::{RiskConfig, RiskThresholds, RiskWeights};
use crate::model::{
    FeatureContribution, RiskAssessment, RiskCategory, RiskFeature, RiskFeatureVector,
};

/// Combines feature vectors into risk assessments.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: RiskWeights,
    thresholds: RiskThresholds,
}

impl RiskScorer {
    /// Creates a scorer from validated risk configuration.
    #[must_use]
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    fn weight(&self, feature: RiskFeature) -> f64 {
        match feature {
            RiskFeature::Size => self.weights.size,
            RiskFeature::Churn => self.weights.churn,
            RiskFeature::FileCriticality => self.weights.criticality,
            RiskFeature::AuthorExperience => self.weights.experience,
            RiskFeature::HistoricalDefectRate => self.weights.defect_rate,
        }
    }

    /// Maps a score to its category.
    #[must_use]
    pub fn categorize(&self, score: f64) -> RiskCategory {
        if score < self.thresholds.low_upper {
            RiskCategory::Low
        } else if score < self.thresholds.medium_upper {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }

    /// Scores a feature vector.
    ///
    /// Pure: the same vector always yields a bit-identical assessment.
    #[must_use]
    pub fn score(&self, features: &RiskFeatureVector) -> RiskAssessment {
        let mut contributions: Vec<FeatureContribution> = RiskFeature::ALL
            .iter()
            .map(|&feature| FeatureContribution {
                feature,
                weight: self.weight(feature) * features.get(feature),
            })
            .collect();

        // Sum in declaration order; the sort below is presentation only.
        let score = contributions
            .iter()
            .map(|c| c.weight)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        contributions.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        RiskAssessment {
            score,
            category: self.categorize(score),
            contributing_features: contributions,
            neutral_defaults: features.neutral_defaults.clone(),
        }
    }
}
