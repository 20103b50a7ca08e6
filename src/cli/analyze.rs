//! Analysis commands.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use super::EngineArgs;
use crate::engine::EngineStats;
use crate::model::{Analysis, MergeRequestId, ReviewerSuggestion, RiskAssessment};

/// Suggests reviewers for a merge request.
#[derive(Parser)]
pub struct SuggestCommand {
    /// Merge request id.
    #[arg(long)]
    pub mr: MergeRequestId,

    /// Maximum number of suggestions.
    #[arg(long, default_value_t = 3)]
    pub top_k: usize,

    #[command(flatten)]
    pub engine: EngineArgs,
}

impl SuggestCommand {
    /// Executes the suggest command.
    pub async fn execute(self) -> Result<()> {
        print!("{}", self.render().await?);
        Ok(())
    }

    /// Runs the analysis and renders it in the requested format.
    pub async fn render(&self) -> Result<String> {
        let engine = self.engine.engine()?;
        let suggestions = engine
            .suggest_reviewers(self.mr, self.top_k)
            .await
            .with_context(|| format!("Failed to suggest reviewers for merge request {}", self.mr))?;

        self.engine.format.render(&suggestions)
    }
}

/// Assesses the merge risk of a merge request.
#[derive(Parser)]
pub struct RiskCommand {
    /// Merge request id.
    #[arg(long)]
    pub mr: MergeRequestId,

    #[command(flatten)]
    pub engine: EngineArgs,
}

impl RiskCommand {
    /// Executes the risk command.
    pub async fn execute(self) -> Result<()> {
        print!("{}", self.render().await?);
        Ok(())
    }

    /// Runs the analysis and renders it in the requested format.
    pub async fn render(&self) -> Result<String> {
        let engine = self.engine.engine()?;
        let assessment = engine
            .assess_risk(self.mr)
            .await
            .with_context(|| format!("Failed to assess risk of merge request {}", self.mr))?;

        if assessment.is_degraded() {
            eprintln!(
                "warning: review history unavailable, neutral values used for: {}",
                assessment
                    .neutral_defaults
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        self.engine.format.render(&assessment)
    }
}

/// Combined report printed by the analyze command.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    /// Merge request id.
    pub merge_request_id: MergeRequestId,
    /// Suggested reviewers.
    pub reviewers: Analysis<Vec<ReviewerSuggestion>>,
    /// Merge risk.
    pub risk: RiskAssessment,
    /// Cache counters, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<EngineStats>,
}

/// Runs both analyses for a merge request.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Merge request id.
    #[arg(long)]
    pub mr: MergeRequestId,

    /// Maximum number of suggestions.
    #[arg(long, default_value_t = 3)]
    pub top_k: usize,

    /// Includes cache counters in the report.
    #[arg(long)]
    pub stats: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    pub async fn execute(self) -> Result<()> {
        print!("{}", self.render().await?);
        Ok(())
    }

    /// Runs both analyses and renders the combined report.
    pub async fn render(&self) -> Result<String> {
        let engine = self.engine.engine()?;

        // Both analyses share one snapshot of the project history.
        let (reviewers, risk) = tokio::join!(
            engine.suggest_reviewers(self.mr, self.top_k),
            engine.assess_risk(self.mr)
        );
        let report = AnalysisReport {
            merge_request_id: self.mr,
            reviewers: reviewers.with_context(|| {
                format!("Failed to suggest reviewers for merge request {}", self.mr)
            })?,
            risk: risk
                .with_context(|| format!("Failed to assess risk of merge request {}", self.mr))?,
            stats: self.stats.then(|| engine.cache_stats()),
        };

        self.engine.format.render(&report)
    }
}
