use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::http::{Auth, HttpTransport};
use super::RegistryError;
use crate::config::ProviderConfig;
use crate::paging::{
    collect_all, fetch_details, fetch_one, total, translate, Chunk, DetailFuture, NativePage,
    PageRequest, PageSource, DETAIL_CONCURRENCY,
};
use crate::vcs::{
    ChangeStats, Commit, Page, Provider, ProviderKind, PullRequest, PullRequestState, RepoRef,
    Repository, StateFilter, TimeWindow, VcsError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
/// GitHub rejects `per_page` above this.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    full_name: String,
    default_branch: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    description: Option<String>,
    language: Option<String>,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct CommitSummary {
    sha: String,
}

#[derive(Debug, Default, Deserialize)]
struct Signature {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct CommitBody {
    #[serde(default)]
    message: String,
    author: Option<Signature>,
}

#[derive(Debug, Default, Deserialize)]
struct Stats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    sha: String,
    #[serde(default)]
    commit: CommitBody,
    stats: Option<Stats>,
    files: Option<Vec<IgnoredAny>>,
}

#[derive(Debug, Deserialize)]
struct PullSummary {
    number: u64,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullDetail {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    user: Option<User>,
    #[serde(default)]
    review_comments: u64,
    #[serde(default)]
    commits: u64,
    #[serde(default)]
    changed_files: u64,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

/// GitHub REST v3 client.
///
/// Totals come from the short-page rule, then the `Link` header's `rel="last"`.
pub struct GitHubClient {
    transport: Arc<HttpTransport>,
    max_page_size: u32,
    max_pages: u32,
}

impl GitHubClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, RegistryError> {
        let token = config
            .token()
            .ok_or(RegistryError::MissingCredential(ProviderKind::GitHub))?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let transport = HttpTransport::new(
            base_url,
            Auth::Bearer(token),
            "application/vnd.github+json",
            config.timeout(),
        )?;
        debug!(base_url = transport.base_url(), "github client ready");
        Ok(Self {
            transport: Arc::new(transport),
            max_page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            max_pages: config.max_pages.max(1),
        })
    }

    fn repo_path(repo: &RepoRef) -> Result<String, VcsError> {
        let (owner, name) = repo.owner_and_name()?;
        Ok(format!("/repos/{owner}/{name}"))
    }

    /// An empty page past the end carries no usable `Link`, so locate the end by bisection.
    async fn settle_total<P: PageSource>(
        &self,
        listing: &P,
        native: NativePage,
        chunk: &Chunk<P::Item>,
    ) -> Result<u64, VcsError> {
        if let Some(estimate) = total::from_page(native, chunk.raw_len, &chunk.signals) {
            debug!(total = estimate.total, strategy = ?estimate.strategy, "estimated total");
            return Ok(estimate.total);
        }

        warn!(page = native.page, "no total derivable from page, counting with extra requests");
        total::count_by_bisection(listing, self.max_page_size).await
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct CommitListing {
    transport: Arc<HttpTransport>,
    repo_path: String,
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
            .get_json::<Vec<CommitSummary>>(&format!("{}/commits", self.repo_path), &query)
            .await?;
        Ok(Chunk::new(fetched.body, fetched.signals))
    }
}

/// The pulls listing has no time filter, so entries outside the window are dropped
/// here; `raw_len` still reports the unfiltered count for total estimation.
struct PullListing {
    transport: Arc<HttpTransport>,
    repo_path: String,
    window: TimeWindow,
    state: StateFilter,
}

#[async_trait]
impl PageSource for PullListing {
    type Item = PullSummary;

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Chunk<PullSummary>, VcsError> {
        let state = match self.state {
            StateFilter::Open => "open",
            StateFilter::Closed | StateFilter::Merged => "closed",
            StateFilter::All => "all",
        };
        let query = [
            ("state", state.to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let fetched = self
            .transport
            .get_json::<Vec<PullSummary>>(&format!("{}/pulls", self.repo_path), &query)
            .await?;
        let raw_len = fetched.body.len();
        let kept: Vec<PullSummary> = fetched
            .body
            .into_iter()
            .filter(|pr| self.window.contains(pr.created_at))
            .collect();
        Ok(Chunk::new(kept, fetched.signals).with_raw_len(raw_len))
    }
}

fn commit_fetcher(
    transport: Arc<HttpTransport>,
    repo_path: String,
    repository_id: String,
) -> impl Fn(CommitSummary) -> DetailFuture<Commit> + Clone + Send + Sync + 'static {
    move |summary: CommitSummary| -> DetailFuture<Commit> {
        let transport = Arc::clone(&transport);
        let path = format!("{}/commits/{}", repo_path, summary.sha);
        let repository_id = repository_id.clone();
        Box::pin(async move {
            let detail = transport
                .get_json::<CommitDetail>(&path, &[])
                .await
                .map_err(|err| VcsError::detail(format!("commit {}", summary.sha), err))?;
            Ok::<_, VcsError>(map_commit(detail.body, repository_id))
        })
    }
}

fn pull_fetcher(
    transport: Arc<HttpTransport>,
    repo_path: String,
    repository_id: String,
) -> impl Fn(PullSummary) -> DetailFuture<PullRequest> + Clone + Send + Sync + 'static {
    move |summary: PullSummary| -> DetailFuture<PullRequest> {
        let transport = Arc::clone(&transport);
        let path = format!("{}/pulls/{}", repo_path, summary.number);
        let repository_id = repository_id.clone();
        Box::pin(async move {
            let detail = transport
                .get_json::<PullDetail>(&path, &[])
                .await
                .map_err(|err| VcsError::detail(format!("pull request #{}", summary.number), err))?;
            Ok::<_, VcsError>(map_pull_request(detail.body, repository_id))
        })
    }
}

fn map_repository(payload: RepositoryPayload) -> Repository {
    Repository {
        id: payload.id.to_string(),
        name: payload.name,
        full_name: payload.full_name,
        default_branch: payload.default_branch.unwrap_or_default(),
        created_at: payload.created_at.unwrap_or_default(),
        updated_at: payload.updated_at.unwrap_or_default(),
        description: payload.description.unwrap_or_default(),
        language: payload.language.unwrap_or_default(),
        private: payload.private,
    }
}

fn map_commit(detail: CommitDetail, repository_id: String) -> Commit {
    let author = detail.commit.author.unwrap_or_default();
    let stats = detail.stats.unwrap_or_default();
    Commit {
        sha: detail.sha,
        message: detail.commit.message,
        author_name: author.name.unwrap_or_default(),
        author_email: author.email.unwrap_or_default(),
        committed_at: author.date.unwrap_or_default(),
        stats: ChangeStats {
            files_changed: detail.files.map_or(0, |files| files.len() as u64),
            additions: stats.additions,
            deletions: stats.deletions,
        },
        repository_id,
    }
}

fn map_state(state: &str, merged_at: Option<DateTime<Utc>>) -> PullRequestState {
    if merged_at.is_some() {
        return PullRequestState::Merged;
    }
    match state {
        "closed" => PullRequestState::Closed,
        _ => PullRequestState::Open,
    }
}

fn map_pull_request(detail: PullDetail, repository_id: String) -> PullRequest {
    PullRequest {
        number: detail.number,
        title: detail.title,
        state: map_state(&detail.state, detail.merged_at),
        created_at: detail.created_at.unwrap_or_default(),
        updated_at: detail.updated_at.unwrap_or_default(),
        closed_at: detail.closed_at,
        merged_at: detail.merged_at,
        author_name: detail.user.map(|user| user.login).unwrap_or_default(),
        review_count: detail.review_comments,
        commit_count: detail.commits,
        stats: ChangeStats {
            files_changed: detail.changed_files,
            additions: detail.additions,
            deletions: detail.deletions,
        },
        repository_id,
    }
}

#[async_trait]
impl Provider for GitHubClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    #[instrument(skip_all, fields(provider = "github", repo = %repo))]
    async fn repository(&self, repo: &RepoRef) -> Result<Repository, VcsError> {
        let path = Self::repo_path(repo)?;
        let fetched = self.transport.get_json::<RepositoryPayload>(&path, &[]).await?;
        debug!("fetched repository");
        Ok(map_repository(fetched.body))
    }

    #[instrument(skip_all, fields(provider = "github", repo = %repo, offset = request.offset, limit = request.limit))]
    async fn commits(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        request: PageRequest,
    ) -> Result<Page<Commit>, VcsError> {
        let repo_path = Self::repo_path(repo)?;
        let native = translate(request.offset, request.limit, self.max_page_size);
        let listing = CommitListing {
            transport: Arc::clone(&self.transport),
            repo_path: repo_path.clone(),
            window: *window,
        };

        let chunk = fetch_one(&listing, native).await?;
        let total = self.settle_total(&listing, native, &chunk).await?;

        let fetch = commit_fetcher(Arc::clone(&self.transport), repo_path, repo.to_string());
        let items = fetch_details(chunk.items, DETAIL_CONCURRENCY, fetch).await?;
        info!(items = items.len(), total, "fetched commits");

        Ok(Page {
            items,
            total,
            page: native.page,
            per_page: native.per_page,
        })
    }

    #[instrument(skip_all, fields(provider = "github", repo = %repo, offset = request.offset, limit = request.limit))]
    async fn pull_requests(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        state: StateFilter,
        request: PageRequest,
    ) -> Result<Page<PullRequest>, VcsError> {
        let repo_path = Self::repo_path(repo)?;
        let native = translate(request.offset, request.limit, self.max_page_size);
        let listing = PullListing {
            transport: Arc::clone(&self.transport),
            repo_path: repo_path.clone(),
            window: *window,
            state,
        };

        let chunk = fetch_one(&listing, native).await?;
        let total = self.settle_total(&listing, native, &chunk).await?;

        let fetch = pull_fetcher(Arc::clone(&self.transport), repo_path, repo.to_string());
        let items: Vec<PullRequest> = fetch_details(chunk.items, DETAIL_CONCURRENCY, fetch)
            .await?
            .into_iter()
            .filter(|pr| state.matches(pr.state))
            .collect();
        info!(items = items.len(), total, "fetched pull requests");

        Ok(Page {
            items,
            total,
            page: native.page,
            per_page: native.per_page,
        })
    }

    #[instrument(skip_all, fields(provider = "github", repo = %repo))]
    async fn all_commits(&self, repo: &RepoRef, window: &TimeWindow) -> Result<Vec<Commit>, VcsError> {
        let repo_path = Self::repo_path(repo)?;
        let listing = CommitListing {
            transport: Arc::clone(&self.transport),
            repo_path: repo_path.clone(),
            window: *window,
        };
        let fetch = commit_fetcher(Arc::clone(&self.transport), repo_path, repo.to_string());
        collect_all(&listing, self.max_page_size, self.max_pages, fetch).await
    }

    #[instrument(skip_all, fields(provider = "github", repo = %repo))]
    async fn all_pull_requests(
        &self,
        repo: &RepoRef,
        window: &TimeWindow,
        state: StateFilter,
    ) -> Result<Vec<PullRequest>, VcsError> {
        let repo_path = Self::repo_path(repo)?;
        let listing = PullListing {
            transport: Arc::clone(&self.transport),
            repo_path: repo_path.clone(),
            window: *window,
            state,
        };
        let fetch = pull_fetcher(Arc::clone(&self.transport), repo_path, repo.to_string());
        let all = collect_all(&listing, self.max_page_size, self.max_pages, fetch).await?;
        Ok(all.into_iter().filter(|pr| state.matches(pr.state)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(&ProviderConfig {
            enabled: true,
            token: Some("test-token".to_string()),
            base_url: Some(server.uri()),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn repo() -> RepoRef {
        RepoRef::parse("octo/widgets").unwrap()
    }

    fn commit_detail(sha: &str) -> serde_json::Value {
        serde_json::json!({
            "sha": sha,
            "commit": {
                "message": format!("change {sha}"),
                "author": {"name": "Mona", "email": "mona@example.com", "date": "2024-01-10T12:00:00Z"}
            },
            "stats": {"total": 12, "additions": 10, "deletions": 2},
            "files": [{"filename": "a.rs"}, {"filename": "b.rs"}]
        })
    }

    async fn mount_commit_details(server: &MockServer, shas: &[&str]) {
        for sha in shas {
            Mock::given(method("GET"))
                .and(path(format!("/repos/octo/widgets/commits/{sha}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(commit_detail(sha)))
                .mount(server)
                .await;
        }
    }

    #[test]
    fn test_new_requires_token() {
        let err = GitHubClient::new(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, RegistryError::MissingCredential(ProviderKind::GitHub)));
    }

    #[test]
    fn test_page_size_capped_at_github_limit() {
        let client = GitHubClient::new(&ProviderConfig {
            token: Some("t".to_string()),
            page_size: 500,
            ..ProviderConfig::default()
        })
        .unwrap();
        assert_eq!(client.max_page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_map_state() {
        let merged = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(map_state("closed", merged), PullRequestState::Merged);
        assert_eq!(map_state("closed", None), PullRequestState::Closed);
        assert_eq!(map_state("open", None), PullRequestState::Open);
    }

    #[test]
    fn test_map_commit_tolerates_missing_fields() {
        let detail: CommitDetail = serde_json::from_value(serde_json::json!({"sha": "abc"})).unwrap();
        let commit = map_commit(detail, "octo/widgets".to_string());
        assert_eq!(commit.sha, "abc");
        assert_eq!(commit.author_name, "");
        assert_eq!(commit.stats, ChangeStats::default());
    }

    #[tokio::test]
    async fn test_repository_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 42,
                "name": "widgets",
                "full_name": "octo/widgets",
                "default_branch": "main",
                "created_at": "2020-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
                "description": null,
                "language": "Rust",
                "private": true
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let first = client.repository(&repo()).await.unwrap();
        let second = client.repository(&repo()).await.unwrap();
        assert_eq!(first.id, "42");
        assert_eq!(first.description, "");
        assert!(first.private);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_repository_requires_owner_and_name() {
        let server = MockServer::start().await;
        let err = client(&server)
            .repository(&RepoRef::parse("just-a-name").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::InvalidRepoRef(_)));
    }

    #[tokio::test]
    async fn test_exists_maps_404_to_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert!(!client(&server).exists(&repo()).await.unwrap());
    }

    #[tokio::test]
    async fn test_commits_total_from_link_header() {
        let server = MockServer::start().await;
        let link = format!(
            "<{0}/repositories/1/commits?per_page=2&page=2>; rel=\"next\", \
             <{0}/repositories/1/commits?per_page=2&page=5>; rel=\"last\"",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"sha": "a1"}, {"sha": "b2"}]))
                    .insert_header("link", link.as_str()),
            )
            .mount(&server)
            .await;
        mount_commit_details(&server, &["a1", "b2"]).await;

        let page = client(&server)
            .commits(&repo(), &window(), PageRequest::new(0, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].sha, "a1");
        assert_eq!(page.items[0].stats.files_changed, 2);
        assert_eq!(page.items[0].stats.additions, 10);
        assert_eq!(page.items[0].repository_id, "octo/widgets");
    }

    #[tokio::test]
    async fn test_commits_short_page_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .and(query_param("page", "3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"sha": "c3"}])),
            )
            .mount(&server)
            .await;
        mount_commit_details(&server, &["c3"]).await;

        let page = client(&server)
            .commits(&repo(), &window(), PageRequest::new(20, 10))
            .await
            .unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.total, 21);
    }

    #[tokio::test]
    async fn test_commits_empty_page_past_the_end_counts_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .and(query_param("page", "11"))
            .and(query_param("per_page", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"sha": "a1"}, {"sha": "b2"}, {"sha": "c3"}
            ])))
            .mount(&server)
            .await;

        let page = client(&server)
            .commits(&repo(), &window(), PageRequest::new(100, 10))
            .await
            .unwrap();
        assert_eq!(page.page, 11);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_commits_detail_failure_fails_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"sha": "ok1"}, {"sha": "bad"}])),
            )
            .mount(&server)
            .await;
        mount_commit_details(&server, &["ok1"]).await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits/bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .commits(&repo(), &window(), PageRequest::default())
            .await
            .unwrap_err();
        match err {
            VcsError::Detail { item, .. } => assert_eq!(item, "commit bad"),
            other => panic!("expected detail error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pull_requests_filters_window_and_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls"))
            .and(query_param("state", "closed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"number": 1, "created_at": "2024-01-05T00:00:00Z"},
                {"number": 2, "created_at": "2024-01-06T00:00:00Z"},
                {"number": 3, "created_at": "2023-06-01T00:00:00Z"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "number": 1, "title": "merged one", "state": "closed",
                "created_at": "2024-01-05T00:00:00Z", "merged_at": "2024-01-07T00:00:00Z",
                "closed_at": "2024-01-07T00:00:00Z",
                "user": {"login": "mona"}, "review_comments": 3, "commits": 2,
                "changed_files": 4, "additions": 40, "deletions": 5
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/pulls/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "number": 2, "title": "closed one", "state": "closed",
                "created_at": "2024-01-06T00:00:00Z", "closed_at": "2024-01-08T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .pull_requests(&repo(), &window(), StateFilter::Merged, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        let pr = &page.items[0];
        assert_eq!(pr.number, 1);
        assert_eq!(pr.state, PullRequestState::Merged);
        assert_eq!(pr.author_name, "mona");
        assert_eq!(pr.review_count, 3);
        assert_eq!(pr.stats.additions, 40);
    }

    #[tokio::test]
    async fn test_all_commits_follows_next_links() {
        let server = MockServer::start().await;
        let next = format!(
            "<{}/repositories/1/commits?per_page=100&page=2>; rel=\"next\"",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"sha": "p1"}]))
                    .insert_header("link", next.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/commits"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"sha": "p2"}])),
            )
            .mount(&server)
            .await;
        mount_commit_details(&server, &["p1", "p2"]).await;

        let commits = client(&server).all_commits(&repo(), &window()).await.unwrap();
        let shas: Vec<&str> = commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["p1", "p2"]);
    }
}
