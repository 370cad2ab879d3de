use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::paging::PageRequest;
use crate::providers::Registry;
use crate::vcs::{
    Commit, Page, Provider, ProviderKind, PullRequest, RepoRef, Repository, StateFilter,
    TimeWindow, VcsError,
};

/// Dispatches requests by provider identifier and bounds each call by a deadline.
///
/// The provider is resolved before the repository reference is parsed, so an
/// unknown identifier never reaches the network.
pub struct MetricsService {
    registry: Registry,
    deadline: Duration,
}

impl MetricsService {
    pub fn new(registry: Registry, deadline: Duration) -> Self {
        Self { registry, deadline }
    }

    fn resolve(&self, provider: &str, repo: &str) -> Result<(Arc<dyn Provider>, RepoRef), VcsError> {
        let kind: ProviderKind = provider.parse()?;
        let client = Arc::clone(self.registry.get(kind)?);
        let repo = RepoRef::parse(repo)?;
        debug!(provider = %kind, repo = %repo, "resolved request");
        Ok((client, repo))
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, VcsError>>,
    ) -> Result<T, VcsError> {
        match tokio::time::timeout(self.deadline, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64, "operation exceeded deadline");
                Err(VcsError::DeadlineExceeded(self.deadline))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn repository(&self, provider: &str, repo: &str) -> Result<Repository, VcsError> {
        let (client, repo) = self.resolve(provider, repo)?;
        self.bounded(client.repository(&repo)).await
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, provider: &str, repo: &str) -> Result<bool, VcsError> {
        let (client, repo) = self.resolve(provider, repo)?;
        self.bounded(client.exists(&repo)).await
    }

    #[instrument(skip(self, window))]
    pub async fn commits(
        &self,
        provider: &str,
        repo: &str,
        window: &TimeWindow,
        request: PageRequest,
    ) -> Result<Page<Commit>, VcsError> {
        let (client, repo) = self.resolve(provider, repo)?;
        self.bounded(client.commits(&repo, window, request)).await
    }

    #[instrument(skip(self, window))]
    pub async fn pull_requests(
        &self,
        provider: &str,
        repo: &str,
        window: &TimeWindow,
        state: StateFilter,
        request: PageRequest,
    ) -> Result<Page<PullRequest>, VcsError> {
        let (client, repo) = self.resolve(provider, repo)?;
        self.bounded(client.pull_requests(&repo, window, state, request))
            .await
    }

    #[instrument(skip(self, window))]
    pub async fn all_commits(
        &self,
        provider: &str,
        repo: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Commit>, VcsError> {
        let (client, repo) = self.resolve(provider, repo)?;
        self.bounded(client.all_commits(&repo, window)).await
    }

    #[instrument(skip(self, window))]
    pub async fn all_pull_requests(
        &self,
        provider: &str,
        repo: &str,
        window: &TimeWindow,
        state: StateFilter,
    ) -> Result<Vec<PullRequest>, VcsError> {
        let (client, repo) = self.resolve(provider, repo)?;
        self.bounded(client.all_pull_requests(&repo, window, state))
            .await
    }
}
