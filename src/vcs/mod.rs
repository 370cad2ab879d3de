pub mod types;
pub mod window;

pub use types::{
    ChangeStats, Commit, Page, ProviderKind, PullRequest, PullRequestState, Repository,
    StateFilter,
};
pub use window::{RepoRef, TimeWindow};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::paging::PageRequest;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("unsupported VCS provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid repository reference: {0:?}")]
    InvalidRepoRef(String),

    #[error("invalid time window: since {since} must be before until {until}")]
    InvalidTimeWindow {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("look-back of {0} days is out of range")]
    WindowOutOfRange(i64),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("unauthorized ({status}): {url}")]
    Unauthorized { status: u16, url: String },

    #[error("rate limited ({status}): {url}")]
    RateLimited { status: u16, url: String },

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("fetching page {page} failed: {source}")]
    Page {
        page: u32,
        #[source]
        source: Box<VcsError>,
    },

    #[error("fetching details for {item} failed: {source}")]
    Detail {
        item: String,
        #[source]
        source: Box<VcsError>,
    },

    #[error("operation exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("background task failed: {0}")]
    Task(String),
}

impl VcsError {
    pub fn page(page: u32, source: VcsError) -> Self {
        VcsError::Page {
            page,
            source: Box::new(source),
        }
    }

    pub fn detail(item: impl Into<String>, source: VcsError) -> Self {
        VcsError::Detail {
            item: item.into(),
            source: Box::new(source),
        }
    }

    /// True when the innermost cause is a 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            VcsError::NotFound { .. } => true,
            VcsError::Page { source, .. } | VcsError::Detail { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }
}

/// Capability set every hosting backend implements.
///
/// Bounded operations fetch exactly one native page; the `all_*` variants walk every page.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn repository(&self, repo: &RepoRef) -> Result<Repository, VcsError>;

    /// Returns `Ok(false)` when the upstream answers 404.
    async fn exists(&self, repo: &RepoRef) -> Result<bool, VcsError> {
        match self.repository(repo).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn commits(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        request: PageRequest,
    ) -> Result<Page<Commit>, VcsError>;

    async fn pull_requests(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        state: StateFilter,
        request: PageRequest,
    ) -> Result<Page<PullRequest>, VcsError>;

    async fn all_commits(&self, repo: &RepoRef, window: &TimeWindow)
        -> Result<Vec<Commit>, VcsError>;

    async fn all_pull_requests(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        state: StateFilter,
    ) -> Result<Vec<PullRequest>, VcsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_seen_through_wrappers() {
        let err = VcsError::page(
            3,
            VcsError::NotFound {
                url: "https://example.com".to_string(),
            },
        );
        assert!(err.is_not_found());
        assert!(!VcsError::Task("boom".to_string()).is_not_found());
    }

    #[test]
    fn test_page_error_names_the_page() {
        let err = VcsError::page(7, VcsError::Task("boom".to_string()));
        assert_eq!(err.to_string(), "fetching page 7 failed: background task failed: boom");
    }
}
