//! Reviewer suggestion and risk assessment engine.
//!
//! The engine owns the two collaborators, the per-project snapshot cache and
//! the result caches. Ranking and scoring are pure; every suspension point is
//! a fetch from a collaborator, and every fetch runs under the configured
//! budget.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ResultCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::features::RiskFeatureAggregator;
use crate::graph::CoReviewGraph;
use crate::model::{
    Analysis, MergeRequestDescriptor, MergeRequestId, ReviewEvent, ReviewerSuggestion,
    RiskAssessment,
};
use crate::ranking;
use crate::scoring::RiskScorer;
use crate::source::{MergeRequestSource, ReviewHistorySource};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Immutable view of one project's history and co-review graph.
///
/// A rebuild produces a new snapshot with a larger version; readers that
/// already hold an `Arc` keep using the one they started with.
#[derive(Debug)]
pub struct ProjectSnapshot {
    /// Project the history belongs to.
    pub project_id: String,
    /// Monotonically increasing build number.
    pub version: u64,
    /// Instant the snapshot was built for.
    pub built_at: DateTime<Utc>,
    /// Review events the graph was built from.
    pub events: Vec<ReviewEvent>,
    /// Co-review graph over `events`.
    pub graph: CoReviewGraph,
}

/// Counters of the engine's caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Project snapshot cache.
    pub snapshots: CacheStats,
    /// Reviewer suggestion cache.
    pub suggestions: CacheStats,
    /// Risk assessment cache.
    pub assessments: CacheStats,
}

/// Stable identifier of every input that affects a cached result.
#[must_use]
pub fn fingerprint(
    kind: &str,
    mr: &MergeRequestDescriptor,
    snapshot: &ProjectSnapshot,
    extra: &str,
) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [
        kind,
        &mr.id.to_string(),
        &mr.last_modified().to_rfc3339(),
        &snapshot.built_at.to_rfc3339(),
        &snapshot.version.to_string(),
        extra,
    ] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Runs a collaborator fetch under `budget`.
async fn fetch_with_budget<T, F>(operation: &str, budget: Duration, fetch: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(budget, fetch).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(EngineError::unavailable(operation, &err)),
        Err(_) => Err(EngineError::ComputationTimeout {
            operation: operation.to_string(),
            after: budget,
        }),
    }
}

/// Suggests reviewers and assesses risk for merge requests.
pub struct ReviewEngine {
    history: Arc<dyn ReviewHistorySource>,
    merge_requests: Arc<dyn MergeRequestSource>,
    config: EngineConfig,
    aggregator: RiskFeatureAggregator,
    scorer: RiskScorer,
    clock: Clock,
    versions: Arc<AtomicU64>,
    snapshots: ResultCache<Arc<ProjectSnapshot>>,
    suggestions: ResultCache<Vec<ReviewerSuggestion>>,
    assessments: ResultCache<RiskAssessment>,
}

impl ReviewEngine {
    /// Creates an engine over the given collaborators.
    ///
    /// Fails with [`EngineError::InvalidInput`] when the configuration does
    /// not validate.
    pub fn new(
        config: EngineConfig,
        history: Arc<dyn ReviewHistorySource>,
        merge_requests: Arc<dyn MergeRequestSource>,
    ) -> Result<Self> {
        config.validate()?;

        let ttl = config.cache.ttl();
        let capacity = config.cache.capacity;
        Ok(Self {
            aggregator: RiskFeatureAggregator::new(&config),
            scorer: RiskScorer::new(&config.risk),
            clock: Arc::new(Utc::now),
            versions: Arc::new(AtomicU64::new(0)),
            snapshots: ResultCache::new(config.graph.refresh_interval(), capacity),
            suggestions: ResultCache::new(ttl, capacity),
            assessments: ResultCache::new(ttl, capacity),
            history,
            merge_requests,
            config,
        })
    }

    /// Replaces the wall clock, mainly for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Suggests up to `top_k` reviewers for merge request `mr_id`.
    ///
    /// Returns [`Analysis::InsufficientData`] when the review history cannot
    /// be fetched. A history fetch that times out is surfaced as
    /// [`EngineError::ComputationTimeout`], and a panic anywhere in the
    /// pipeline as [`EngineError::Internal`].
    pub async fn suggest_reviewers(
        &self,
        mr_id: MergeRequestId,
        top_k: usize,
    ) -> Result<Analysis<Vec<ReviewerSuggestion>>> {
        let mr = self.fetch_merge_request(mr_id).await?;

        let snapshot = match self.snapshot(&mr.project_id).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_data_unavailable() => {
                warn!(
                    mr = mr_id,
                    project = %mr.project_id,
                    error = %err,
                    "No review history, cannot suggest reviewers"
                );
                return Ok(Analysis::InsufficientData {
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        let key = fingerprint("reviewers", &mr, &snapshot, &top_k.to_string());
        let weights = self.config.ranking.clone();
        let value = self
            .suggestions
            .get_or_compute(&key, move || async move {
                Ok(ranking::rank(&mr, &snapshot.graph, top_k, &weights))
            })
            .await?;

        Ok(Analysis::Ready { value })
    }

    /// Assesses the merge risk of merge request `mr_id`.
    ///
    /// When the review history cannot be fetched, history-derived features
    /// use the neutral prior, the assessment lists them in
    /// `neutral_defaults`, and the result is not cached. Timeouts and
    /// [`EngineError::Internal`] failures are returned, never degraded.
    pub async fn assess_risk(&self, mr_id: MergeRequestId) -> Result<RiskAssessment> {
        let mr = self.fetch_merge_request(mr_id).await?;

        let snapshot = match self.snapshot(&mr.project_id).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_data_unavailable() => {
                warn!(
                    mr = mr_id,
                    project = %mr.project_id,
                    error = %err,
                    "Assessing risk without review history"
                );
                let features = self.aggregator.extract(&mr, None, (self.clock)())?;
                return Ok(self.scorer.score(&features));
            }
            Err(err) => return Err(err),
        };

        let key = fingerprint("risk", &mr, &snapshot, "");
        let aggregator = self.aggregator.clone();
        let scorer = self.scorer.clone();
        self.assessments
            .get_or_compute(&key, move || async move {
                let history = Some(snapshot.events.as_slice());
                let features = aggregator.extract(&mr, history, snapshot.built_at)?;
                debug!(mr = mr.id, ?features, "Extracted risk features");
                Ok(scorer.score(&features))
            })
            .await
    }

    /// Discards the cached snapshot of `project_id` and builds a new one.
    ///
    /// Computations already holding the previous snapshot finish on it.
    pub async fn refresh_project(&self, project_id: &str) -> Result<Arc<ProjectSnapshot>> {
        self.snapshots.invalidate(project_id);
        self.snapshot(project_id).await
    }

    /// Counters of every cache the engine owns.
    #[must_use]
    pub fn cache_stats(&self) -> EngineStats {
        EngineStats {
            snapshots: self.snapshots.stats(),
            suggestions: self.suggestions.stats(),
            assessments: self.assessments.stats(),
        }
    }

    async fn fetch_merge_request(&self, mr_id: MergeRequestId) -> Result<MergeRequestDescriptor> {
        let mr = fetch_with_budget(
            &format!("merge request {mr_id} fetch"),
            self.config.cache.fetch_timeout(),
            self.merge_requests.merge_request(mr_id),
        )
        .await?;
        mr.validate()?;
        Ok(mr)
    }

    /// Current snapshot of `project_id`, building it at most once per
    /// refresh interval no matter how many callers ask concurrently.
    async fn snapshot(&self, project_id: &str) -> Result<Arc<ProjectSnapshot>> {
        let history = Arc::clone(&self.history);
        let versions = Arc::clone(&self.versions);
        let clock = Arc::clone(&self.clock);
        let graph_config = self.config.graph.clone();
        let budget = self.config.cache.fetch_timeout();
        let project = project_id.to_string();

        self.snapshots
            .get_or_compute(project_id, move || async move {
                let operation = format!("review history fetch for project {project}");
                let events =
                    fetch_with_budget(&operation, budget, history.review_history(&project)).await?;

                let graph = CoReviewGraph::build(&events, clock(), &graph_config);
                let version = versions.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    project = %project,
                    version,
                    events = events.len(),
                    edges = graph.edge_count(),
                    "Built co-review snapshot"
                );

                Ok(Arc::new(ProjectSnapshot {
                    project_id: project,
                    version,
                    built_at: graph.built_at(),
                    events,
                    graph,
                }))
            })
            .await
    }
}
