//! File-backed collaborators.
//!
//! A fixture file holds merge request descriptors and review events in YAML
//! or JSON. [`FixtureSource`] serves both collaborator traits from it, which
//! is what the command line runs against.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{MergeRequestDescriptor, MergeRequestId, ReviewEvent};
use crate::source::{MergeRequestSource, ReviewHistorySource, SourceFuture};

/// On-disk layout of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// Merge requests that can be analyzed.
    #[serde(default)]
    pub merge_requests: Vec<MergeRequestDescriptor>,
    /// Review history across all projects.
    #[serde(default)]
    pub events: Vec<ReviewEvent>,
}

impl Fixture {
    /// Parses a fixture, choosing the format by file extension.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse fixture file: {}", path.display()))
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse fixture file: {}", path.display()))
        }
    }
}

/// Serves review history and merge requests from a [`Fixture`].
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    merge_requests: BTreeMap<MergeRequestId, MergeRequestDescriptor>,
    events: Vec<ReviewEvent>,
}

impl FixtureSource {
    /// Creates a source over an in-memory fixture.
    ///
    /// Later descriptors with a duplicate id replace earlier ones.
    #[must_use]
    pub fn new(fixture: Fixture) -> Self {
        Self {
            merge_requests: fixture
                .merge_requests
                .into_iter()
                .map(|mr| (mr.id, mr))
                .collect(),
            events: fixture.events,
        }
    }

    /// Loads a fixture file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Fixture::load_from_path(path)?))
    }

    /// Number of merge requests served.
    #[must_use]
    pub fn merge_request_count(&self) -> usize {
        self.merge_requests.len()
    }
}

impl ReviewHistorySource for FixtureSource {
    fn review_history<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<ReviewEvent>> {
        Box::pin(async move {
            Ok(self
                .events
                .iter()
                .filter(|e| e.project_id == project_id)
                .cloned()
                .collect())
        })
    }
}

impl MergeRequestSource for FixtureSource {
    fn merge_request(&self, id: MergeRequestId) -> SourceFuture<'_, MergeRequestDescriptor> {
        Box::pin(async move {
            self.merge_requests
                .get(&id)
                .cloned()
                .with_context(|| format!("Merge request {id} not found in fixture"))
        })
    }
}
