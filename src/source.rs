//! External data collaborators.
//!
//! The engine never talks to GitLab, BigQuery or any other service directly.
//! It is handed implementations of these traits at construction time.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::model::{MergeRequestDescriptor, MergeRequestId, ReviewEvent};

/// Boxed future returned by collaborator calls.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Supplies the historical review log of a project.
pub trait ReviewHistorySource: Send + Sync {
    /// Returns every known review event of `project_id`.
    ///
    /// Transient network failures are reported as errors; the engine treats
    /// them as missing data.
    fn review_history<'a>(&'a self, project_id: &'a str) -> SourceFuture<'a, Vec<ReviewEvent>>;
}

/// Supplies merge request descriptors.
pub trait MergeRequestSource: Send + Sync {
    /// Returns the descriptor of merge request `id`.
    fn merge_request(&self, id: MergeRequestId) -> SourceFuture<'_, MergeRequestDescriptor>;
}
