//! Engine configuration.
//!
//! Every tunable of the reviewer and risk engines lives here. Configuration is
//! read from `$HOME/.review-radar/config.yaml` (or any YAML/JSON file passed
//! explicitly); a missing file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Days after which a review keeps 10% of its weight.
const DEFAULT_DECAY_HALF_LIFE_DAYS: f64 = 180.0;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Co-review graph construction.
    pub graph: GraphConfig,
    /// Reviewer ranking weights.
    pub ranking: RankingWeights,
    /// Risk feature extraction and scoring.
    pub risk: RiskConfig,
    /// Result cache bounds.
    pub cache: CacheConfig,
}

/// Co-review graph construction settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Exponential decay constant per day of review age.
    pub decay_lambda: f64,
    /// Multiplier applied to reviews of merge requests that never merged.
    pub unmerged_penalty: f64,
    /// Lookback window for expertise, churn and defect features, in days.
    pub lookback_days: u32,
    /// How long a project snapshot is reused before the history is re-fetched.
    pub refresh_interval_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            decay_lambda: std::f64::consts::LN_10 / DEFAULT_DECAY_HALF_LIFE_DAYS,
            unmerged_penalty: 0.3,
            lookback_days: 180,
            refresh_interval_secs: 600,
        }
    }
}

impl GraphConfig {
    /// Snapshot reuse interval.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Weights of the three reviewer sub-scores.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Weight of the co-review graph signal.
    pub collaboration: f64,
    /// Weight of the directory overlap signal.
    pub expertise: f64,
    /// Weight of the open-review workload signal.
    pub availability: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            collaboration: 0.5,
            expertise: 0.3,
            availability: 0.2,
        }
    }
}

/// Weights of the five risk features.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Diff size weight.
    pub size: f64,
    /// Hot-spot churn weight.
    pub churn: f64,
    /// Critical path weight.
    pub criticality: f64,
    /// Author inexperience weight.
    pub experience: f64,
    /// Historical defect rate weight.
    pub defect_rate: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            size: 0.25,
            churn: 0.2,
            criticality: 0.25,
            experience: 0.15,
            defect_rate: 0.15,
        }
    }
}

impl RiskWeights {
    fn values(&self) -> [f64; 5] {
        [
            self.size,
            self.churn,
            self.criticality,
            self.experience,
            self.defect_rate,
        ]
    }
}

/// Category boundaries on the [0, 1] risk score.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Scores below this are low risk.
    pub low_upper: f64,
    /// Scores below this (and at or above `low_upper`) are medium risk.
    pub medium_upper: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_upper: 0.33,
            medium_upper: 0.66,
        }
    }
}

/// Risk feature extraction and scoring settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Feature weights.
    pub weights: RiskWeights,
    /// Category thresholds.
    pub thresholds: RiskThresholds,
    /// Changed-line count at which the size feature saturates.
    pub size_cap: u64,
    /// Merged-MR count at which an author counts as fully experienced.
    pub experience_cap: u64,
    /// Path prefixes considered critical, e.g. `auth/`.
    pub critical_paths: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            size_cap: 2000,
            experience_cap: 50,
            critical_paths: Vec::new(),
        }
    }
}

/// Result cache and fetch budget settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
    /// Maximum number of cached results.
    pub capacity: usize,
    /// Budget for each external fetch, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 1024,
            fetch_timeout_secs: 10,
        }
    }
}

impl CacheConfig {
    /// Entry time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Budget for each external fetch.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl EngineConfig {
    /// Loads configuration from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from_path(path)
    }

    /// Loads configuration from a YAML or JSON file.
    ///
    /// A missing file yields [`EngineConfig::default`]. The loaded
    /// configuration is validated before it is returned.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Returns the default config path.
    pub fn default_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".review-radar").join("config.yaml"))
    }

    /// Checks that every tunable is usable.
    ///
    /// Negative weights are rejected because they would break the
    /// monotonicity of the risk score.
    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidInput(msg));

        let g = &self.graph;
        if !(g.decay_lambda.is_finite() && g.decay_lambda >= 0.0) {
            return invalid(format!("graph.decay_lambda must be >= 0, got {}", g.decay_lambda));
        }
        if !(0.0..=1.0).contains(&g.unmerged_penalty) {
            return invalid(format!(
                "graph.unmerged_penalty must be within [0, 1], got {}",
                g.unmerged_penalty
            ));
        }
        if g.lookback_days == 0 {
            return invalid("graph.lookback_days must be positive".to_string());
        }

        let r = &self.ranking;
        let ranking = [r.collaboration, r.expertise, r.availability];
        if ranking.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return invalid(format!("ranking weights must be >= 0, got {ranking:?}"));
        }
        if ranking.iter().sum::<f64>() <= 0.0 {
            return invalid("ranking weights must not all be zero".to_string());
        }

        let risk = &self.risk;
        let weights = risk.weights.values();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return invalid(format!("risk weights must be >= 0, got {weights:?}"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return invalid("risk weights must not all be zero".to_string());
        }
        let t = &risk.thresholds;
        if !(0.0 < t.low_upper && t.low_upper <= t.medium_upper && t.medium_upper <= 1.0) {
            return invalid(format!(
                "risk thresholds must satisfy 0 < low_upper <= medium_upper <= 1, got {} / {}",
                t.low_upper, t.medium_upper
            ));
        }
        if risk.size_cap == 0 || risk.experience_cap == 0 {
            return invalid("risk.size_cap and risk.experience_cap must be positive".to_string());
        }

        if self.cache.capacity == 0 {
            return invalid("cache.capacity must be positive".to_string());
        }
        if self.cache.fetch_timeout_secs == 0 {
            return invalid("cache.fetch_timeout_secs must be positive".to_string());
        }

        Ok(())
    }
}
