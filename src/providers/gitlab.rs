use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::http::{Auth, HttpTransport};
use super::RegistryError;
use crate::config::ProviderConfig;
use crate::paging::total::{self, Strategy};
use crate::paging::{
    collect_all, fetch_details, fetch_one, translate, Chunk, DetailFuture, NativePage,
    PageRequest, PageSource, DETAIL_CONCURRENCY,
};
use crate::vcs::{
    ChangeStats, Commit, Page, Provider, ProviderKind, PullRequest, PullRequestState, RepoRef,
    Repository, StateFilter, TimeWindow, VcsError,
};

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_with_namespace: String,
    default_branch: Option<String>,
    created_at: Option<DateTime<Utc>>,
    last_activity_at: Option<DateTime<Utc>>,
    description: Option<String>,
    visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitSummary {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct CommitStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    id: String,
    #[serde(default)]
    message: String,
    author_name: Option<String>,
    author_email: Option<String>,
    committed_date: Option<DateTime<Utc>>,
    stats: Option<CommitStats>,
}

#[derive(Debug, Deserialize)]
struct MergeRequestSummary {
    iid: u64,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequestDetail {
    iid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    author: Option<Author>,
    #[serde(default)]
    user_notes_count: u64,
    diverged_commits_count: Option<u64>,
    /// A string such as `"12"` or `"1000+"`.
    changes_count: Option<String>,
}

/// GitLab REST v4 client.
///
/// Totals come from `X-Total` when GitLab sends it and from the short-page rule
/// otherwise. For large listings GitLab omits `X-Total`; commits then fall back to
/// bisection over page existence and merge requests to counting every page.
pub struct GitLabClient {
    transport: Arc<HttpTransport>,
    max_page_size: u32,
    max_pages: u32,
}

impl GitLabClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, RegistryError> {
        let token = config
            .token()
            .ok_or(RegistryError::MissingCredential(ProviderKind::GitLab))?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let transport = HttpTransport::new(
            base_url,
            Auth::PrivateToken(token),
            "application/json",
            config.timeout(),
        )?;
        debug!(base_url = transport.base_url(), "gitlab client ready");
        Ok(Self {
            transport: Arc::new(transport),
            max_page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            max_pages: config.max_pages.max(1),
        })
    }

    fn project_path(repo: &RepoRef) -> String {
        format!("/projects/{}", repo.encoded())
    }

    async fn settle_total<P: PageSource>(
        &self,
        listing: &P,
        native: NativePage,
        chunk: &Chunk<P::Item>,
        fallback: Strategy,
    ) -> Result<u64, VcsError> {
        if let Some(estimate) = total::from_page(native, chunk.raw_len, &chunk.signals) {
            debug!(total = estimate.total, strategy = ?estimate.strategy, "estimated total");
            return Ok(estimate.total);
        }

        warn!(strategy = ?fallback, "no total reported, counting with extra requests");
        match fallback {
            Strategy::Bisection => total::count_by_bisection(listing, self.max_page_size).await,
            _ => total::count_by_walking(listing, self.max_page_size).await,
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct CommitListing {
    transport: Arc<HttpTransport>,
    project_path: String,
    window: TimeWindow,
}

#[async_trait]
impl PageSource for CommitListing {
    type Item = CommitSummary;

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Chunk<CommitSummary>, VcsError> {
        let query = [
            ("since", timestamp(self.window.since())),
            ("until", timestamp(self.window.until())),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let fetched = self
            .transport
            .get_json::<Vec<CommitSummary>>(
                &format!("{}/repository/commits", self.project_path),
                &query,
            )
            .await?;
        Ok(Chunk::new(fetched.body, fetched.signals))
    }
}

struct MergeRequestListing {
    transport: Arc<HttpTransport>,
    project_path: String,
    window: TimeWindow,
    state: StateFilter,
}

#[async_trait]
impl PageSource for MergeRequestListing {
    type Item = MergeRequestSummary;

    async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Chunk<MergeRequestSummary>, VcsError> {
        let state = match self.state {
            StateFilter::Open => "opened",
            StateFilter::Closed => "closed",
            StateFilter::Merged => "merged",
            StateFilter::All => "all",
        };
        let query = [
            ("created_after", timestamp(self.window.since())),
            ("created_before", timestamp(self.window.until())),
            ("state", state.to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let fetched = self
            .transport
            .get_json::<Vec<MergeRequestSummary>>(
                &format!("{}/merge_requests", self.project_path),
                &query,
            )
            .await?;
        Ok(Chunk::new(fetched.body, fetched.signals))
    }
}

fn commit_fetcher(
    transport: Arc<HttpTransport>,
    project_path: String,
    repository_id: String,
) -> impl Fn(CommitSummary) -> DetailFuture<Commit> + Clone + Send + Sync + 'static {
    move |summary: CommitSummary| -> DetailFuture<Commit> {
        let transport = Arc::clone(&transport);
        let path = format!("{}/repository/commits/{}", project_path, summary.id);
        let repository_id = repository_id.clone();
        Box::pin(async move {
            let detail = transport
                .get_json::<CommitDetail>(&path, &[])
                .await
                .map_err(|err| VcsError::detail(format!("commit {}", summary.id), err))?;
            Ok::<_, VcsError>(map_commit(detail.body, repository_id))
        })
    }
}

fn merge_request_fetcher(
    transport: Arc<HttpTransport>,
    project_path: String,
    repository_id: String,
) -> impl Fn(MergeRequestSummary) -> DetailFuture<PullRequest> + Clone + Send + Sync + 'static {
    move |summary: MergeRequestSummary| -> DetailFuture<PullRequest> {
        let transport = Arc::clone(&transport);
        let path = format!("{}/merge_requests/{}", project_path, summary.iid);
        let repository_id = repository_id.clone();
        Box::pin(async move {
            let query = [("include_diverged_commits_count", "true".to_string())];
            let detail = transport
                .get_json::<MergeRequestDetail>(&path, &query)
                .await
                .map_err(|err| VcsError::detail(format!("merge request !{}", summary.iid), err))?;
            Ok::<_, VcsError>(map_merge_request(detail.body, repository_id))
        })
    }
}

fn map_repository(payload: ProjectPayload) -> Repository {
    Repository {
        id: payload.id.to_string(),
        name: payload.name,
        full_name: payload.name_with_namespace,
        default_branch: payload.default_branch.unwrap_or_default(),
        created_at: payload.created_at.unwrap_or_default(),
        updated_at: payload.last_activity_at.unwrap_or_default(),
        description: payload.description.unwrap_or_default(),
        language: String::new(),
        private: payload.visibility.as_deref() != Some("public"),
    }
}

fn map_commit(detail: CommitDetail, repository_id: String) -> Commit {
    let stats = detail.stats.unwrap_or_default();
    Commit {
        sha: detail.id,
        message: detail.message,
        author_name: detail.author_name.unwrap_or_default(),
        author_email: detail.author_email.unwrap_or_default(),
        committed_at: detail.committed_date.unwrap_or_default(),
        // The commit endpoint reports line counts only.
        stats: ChangeStats {
            files_changed: 0,
            additions: stats.additions,
            deletions: stats.deletions,
        },
        repository_id,
    }
}

fn map_state(state: &str) -> PullRequestState {
    match state {
        "merged" => PullRequestState::Merged,
        "closed" | "locked" => PullRequestState::Closed,
        _ => PullRequestState::Open,
    }
}

fn parse_changes_count(raw: Option<&str>) -> u64 {
    raw.map(|count| count.trim().trim_end_matches('+'))
        .and_then(|count| count.parse().ok())
        .unwrap_or(0)
}

fn map_merge_request(detail: MergeRequestDetail, repository_id: String) -> PullRequest {
    PullRequest {
        number: detail.iid,
        title: detail.title,
        state: map_state(&detail.state),
        created_at: detail.created_at.unwrap_or_default(),
        updated_at: detail.updated_at.unwrap_or_default(),
        closed_at: detail.closed_at,
        merged_at: detail.merged_at,
        author_name: detail.author.map(|author| author.username).unwrap_or_default(),
        review_count: detail.user_notes_count,
        commit_count: detail.diverged_commits_count.unwrap_or_default(),
        stats: ChangeStats {
            files_changed: parse_changes_count(detail.changes_count.as_deref()),
            additions: 0,
            deletions: 0,
        },
        repository_id,
    }
}

#[async_trait]
impl Provider for GitLabClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    #[instrument(skip_all, fields(provider = "gitlab", repo = %repo))]
    async fn repository(&self, repo: &RepoRef) -> Result<Repository, VcsError> {
        let fetched = self
            .transport
            .get_json::<ProjectPayload>(&Self::project_path(repo), &[])
            .await?;
        debug!("fetched project");
        Ok(map_repository(fetched.body))
    }

    #[instrument(skip_all, fields(provider = "gitlab", repo = %repo, offset = request.offset, limit = request.limit))]
    async fn commits(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        request: PageRequest,
    ) -> Result<Page<Commit>, VcsError> {
        let project_path = Self::project_path(repo);
        let native = translate(request.offset, request.limit, self.max_page_size);
        let listing = CommitListing {
            transport: Arc::clone(&self.transport),
            project_path: project_path.clone(),
            window: *window,
        };

        let chunk = fetch_one(&listing, native).await?;
        let total = self
            .settle_total(&listing, native, &chunk, Strategy::Bisection)
            .await?;

        let fetch = commit_fetcher(Arc::clone(&self.transport), project_path, repo.to_string());
        let items = fetch_details(chunk.items, DETAIL_CONCURRENCY, fetch).await?;
        info!(items = items.len(), total, "fetched commits");

        Ok(Page {
            items,
            total,
            page: native.page,
            per_page: native.per_page,
        })
    }

    #[instrument(skip_all, fields(provider = "gitlab", repo = %repo, offset = request.offset, limit = request.limit))]
    async fn pull_requests(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        state: StateFilter,
        request: PageRequest,
    ) -> Result<Page<PullRequest>, VcsError> {
        let project_path = Self::project_path(repo);
        let native = translate(request.offset, request.limit, self.max_page_size);
        let listing = MergeRequestListing {
            transport: Arc::clone(&self.transport),
            project_path: project_path.clone(),
            window: *window,
            state,
        };

        let chunk = fetch_one(&listing, native).await?;
        let total = self
            .settle_total(&listing, native, &chunk, Strategy::Counting)
            .await?;

        let fetch =
            merge_request_fetcher(Arc::clone(&self.transport), project_path, repo.to_string());
        let items = fetch_details(chunk.items, DETAIL_CONCURRENCY, fetch).await?;
        info!(items = items.len(), total, "fetched merge requests");

        Ok(Page {
            items,
            total,
            page: native.page,
            per_page: native.per_page,
        })
    }

    #[instrument(skip_all, fields(provider = "gitlab", repo = %repo))]
    async fn all_commits(&self, repo: &RepoRef, window: &TimeWindow) -> Result<Vec<Commit>, VcsError> {
        let project_path = Self::project_path(repo);
        let listing = CommitListing {
            transport: Arc::clone(&self.transport),
            project_path: project_path.clone(),
            window: *window,
        };
        let fetch = commit_fetcher(Arc::clone(&self.transport), project_path, repo.to_string());
        collect_all(&listing, self.max_page_size, self.max_pages, fetch).await
    }

    #[instrument(skip_all, fields(provider = "gitlab", repo = %repo))]
    async fn all_pull_requests(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        state: StateFilter,
    ) -> Result<Vec<PullRequest>, VcsError> {
        let project_path = Self::project_path(repo);
        let listing = MergeRequestListing {
            transport: Arc::clone(&self.transport),
            project_path: project_path.clone(),
            window: *window,
            state,
        };
        let fetch =
            merge_request_fetcher(Arc::clone(&self.transport), project_path, repo.to_string());
        collect_all(&listing, self.max_page_size, self.max_pages, fetch).await
    }
}
