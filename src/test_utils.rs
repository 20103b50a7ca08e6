//! Shared test fixtures and collaborator doubles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::model::{MergeRequestDescriptor, MergeRequestId, ReviewEvent};
use crate::source::{MergeRequestSource, ReviewHistorySource, SourceFuture};

/// Fixed reference instant used by every fixture.
pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
}

/// Builds a review event in project `web`, `days_ago` days before [`now`].
pub(crate) fn event(
    mr: MergeRequestId,
    author: &str,
    reviewer: &str,
    merged: bool,
    days_ago: i64,
    files: &[&str],
) -> ReviewEvent {
    ReviewEvent {
        merge_request_id: mr,
        author_id: author.to_string(),
        reviewer_id: reviewer.to_string(),
        project_id: "web".to_string(),
        merged,
        reverted: false,
        timestamp: now() - chrono::Duration::days(days_ago),
        files_touched: files.iter().map(|f| (*f).to_string()).collect(),
    }
}

/// Builds a merge request in project `web` created at [`now`].
pub(crate) fn merge_request(
    id: MergeRequestId,
    author: &str,
    files: &[&str],
    additions: i64,
    deletions: i64,
) -> MergeRequestDescriptor {
    MergeRequestDescriptor {
        id,
        author_id: author.to_string(),
        project_id: "web".to_string(),
        labels: BTreeSet::new(),
        file_paths: files.iter().map(|f| (*f).to_string()).collect(),
        additions,
        deletions,
        created_at: now(),
        updated_at: None,
        candidate_reviewers: BTreeSet::new(),
        reviewer_workload: BTreeMap::new(),
    }
}

/// How the mock history source answers.
#[derive(Clone)]
pub(crate) enum HistoryBehaviour {
    /// Returns the stored events after an optional delay.
    Respond(Duration),
    /// Fails with the given message.
    Fail(String),
    /// Never completes.
    Hang,
    /// Panics while the fetch is being awaited.
    Panic(String),
}

/// Mock review history source with a shared call counter.
pub(crate) struct MockHistorySource {
    events: Arc<Mutex<Vec<ReviewEvent>>>,
    behaviour: Arc<Mutex<HistoryBehaviour>>,
    calls: Arc<AtomicUsize>,
}

impl MockHistorySource {
    /// Creates a source that answers immediately with `events`.
    pub(crate) fn new(events: Vec<ReviewEvent>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
            behaviour: Arc::new(Mutex::new(HistoryBehaviour::Respond(Duration::ZERO))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets how subsequent calls answer.
    pub(crate) fn with_behaviour(self, behaviour: HistoryBehaviour) -> Self {
        *self.behaviour.lock().unwrap() = behaviour;
        self
    }

    /// Returns a handle for inspecting and steering the source after it has
    /// been moved into an engine.
    pub(crate) fn handle(&self) -> HistoryHandle {
        HistoryHandle {
            events: self.events.clone(),
            behaviour: self.behaviour.clone(),
            calls: self.calls.clone(),
        }
    }
}

/// Shared handle to a [`MockHistorySource`].
pub(crate) struct HistoryHandle {
    events: Arc<Mutex<Vec<ReviewEvent>>>,
    behaviour: Arc<Mutex<HistoryBehaviour>>,
    calls: Arc<AtomicUsize>,
}

impl HistoryHandle {
    /// Number of history fetches made so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Replaces the history returned by later fetches.
    pub(crate) fn set_events(&self, events: Vec<ReviewEvent>) {
        *self.events.lock().unwrap() = events;
    }

    /// Changes how later fetches answer.
    pub(crate) fn set_behaviour(&self, behaviour: HistoryBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }
}

impl ReviewHistorySource for MockHistorySource {
    fn review_history<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<ReviewEvent>> {
        let events = self.events.clone();
        let behaviour = self.behaviour.lock().unwrap().clone();
        let calls = self.calls.clone();
        let project = project_id.to_string();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            match behaviour {
                HistoryBehaviour::Respond(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let events = events.lock().unwrap();
                    Ok(events
                        .iter()
                        .filter(|e| e.project_id == project)
                        .cloned()
                        .collect())
                }
                HistoryBehaviour::Fail(msg) => Err(anyhow::anyhow!(msg)),
                HistoryBehaviour::Panic(msg) => panic!("{msg}"),
                HistoryBehaviour::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!("pending future never resolves")
                }
            }
        })
    }
}

/// Mock merge request source backed by a map.
pub(crate) struct MockMergeRequestSource {
    requests: Arc<Mutex<HashMap<MergeRequestId, MergeRequestDescriptor>>>,
    calls: Arc<AtomicUsize>,
}

impl MockMergeRequestSource {
    /// Creates a source serving `requests`.
    pub(crate) fn new(requests: Vec<MergeRequestDescriptor>) -> Self {
        Self {
            requests: Arc::new(Mutex::new(
                requests.into_iter().map(|mr| (mr.id, mr)).collect(),
            )),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a handle for replacing descriptors after the source has been
    /// moved into an engine.
    pub(crate) fn handle(&self) -> MergeRequestHandle {
        MergeRequestHandle {
            requests: self.requests.clone(),
            calls: self.calls.clone(),
        }
    }
}

/// Shared handle to a [`MockMergeRequestSource`].
pub(crate) struct MergeRequestHandle {
    requests: Arc<Mutex<HashMap<MergeRequestId, MergeRequestDescriptor>>>,
    calls: Arc<AtomicUsize>,
}

impl MergeRequestHandle {
    /// Inserts or replaces a descriptor.
    pub(crate) fn upsert(&self, mr: MergeRequestDescriptor) {
        self.requests.lock().unwrap().insert(mr.id, mr);
    }

    /// Number of descriptor fetches made so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MergeRequestSource for MockMergeRequestSource {
    fn merge_request(&self, id: MergeRequestId) -> SourceFuture<'_, MergeRequestDescriptor> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("merge request {id} not found"))
        })
    }
}
