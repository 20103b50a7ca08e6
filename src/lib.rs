//! # review-radar
//!
//! Reviewer suggestions and merge risk scores for merge requests.
//!
//! ## Features
//!
//! - Ranks candidate reviewers from a time-decayed co-review graph
//! - Scores merge risk from size, churn, criticality and author history
//! - Caches results with single-flight computation per fingerprint
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use review_radar::{EngineConfig, FixtureSource, ReviewEngine};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let source = Arc::new(FixtureSource::load("fixture.yaml")?);
//! let engine = ReviewEngine::new(EngineConfig::default(), source.clone(), source)?;
//! let risk = engine.assess_risk(42).await?;
//! println!("{:.2} {:?}", risk.score, risk.category);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod fixture;
pub mod graph;
pub mod model;
pub mod ranking;
pub mod scoring;
pub mod source;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::cli::Cli;
pub use crate::config::EngineConfig;
pub use crate::engine::{ProjectSnapshot, ReviewEngine};
pub use crate::error::EngineError;
pub use crate::fixture::FixtureSource;
pub use crate::model::{
    Analysis, MergeRequestDescriptor, ReviewEvent, ReviewerSuggestion, RiskAssessment,
    RiskCategory,
};
pub use crate::source::{MergeRequestSource, ReviewHistorySource};

/// The current version of review-radar.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
