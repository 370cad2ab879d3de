use serde::Serialize;

use crate::vcs::{Commit, Page, PullRequest, Repository};

/// Pagination metadata returned alongside a bounded listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl PaginationMeta {
    pub fn new(current_page: u32, per_page: u32, total_items: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(per_page))
        };
        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_more: u64::from(current_page) < total_pages,
        }
    }

    pub fn of<T>(page: &Page<T>) -> Self {
        Self::new(page.page, page.per_page, page.total)
    }
}

/// Everything one CLI invocation prints.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Repository {
        provider: String,
        repository: Repository,
    },
    Exists {
        provider: String,
        repo: String,
        exists: bool,
    },
    Commits {
        provider: String,
        repo: String,
        items: Vec<Commit>,
        /// Absent for exhaustive traversals.
        #[serde(skip_serializing_if = "Option::is_none")]
        pagination: Option<PaginationMeta>,
    },
    PullRequests {
        provider: String,
        repo: String,
        items: Vec<PullRequest>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pagination: Option<PaginationMeta>,
    },
}

impl Report {
    pub fn commits_page(provider: &str, repo: &str, page: Page<Commit>) -> Self {
        let pagination = PaginationMeta::of(&page);
        Report::Commits {
            provider: provider.to_string(),
            repo: repo.to_string(),
            items: page.items,
            pagination: Some(pagination),
        }
    }

    pub fn pull_requests_page(provider: &str, repo: &str, page: Page<PullRequest>) -> Self {
        let pagination = PaginationMeta::of(&page);
        Report::PullRequests {
            provider: provider.to_string(),
            repo: repo.to_string(),
            items: page.items,
            pagination: Some(pagination),
        }
    }

    /// Number of records carried, for logging.
    pub fn item_count(&self) -> usize {
        match self {
            Report::Repository { .. } | Report::Exists { .. } => 1,
            Report::Commits { items, .. } => items.len(),
            Report::PullRequests { items, .. } => items.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_meta_rounds_up() {
        let meta = PaginationMeta::new(2, 30, 137);
        assert_eq!(meta.total_pages, 5);
        assert!(meta.has_more);
    }

    #[test]
    fn test_pagination_meta_last_page() {
        let meta = PaginationMeta::new(5, 30, 137);
        assert!(!meta.has_more);
        assert_eq!(PaginationMeta::new(1, 30, 30).total_pages, 1);
    }

    #[test]
    fn test_pagination_meta_empty() {
        let meta = PaginationMeta::new(1, 30, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_more);
        assert_eq!(PaginationMeta::new(1, 0, 10).total_pages, 0);
    }

    #[test]
    fn test_report_serializes_with_kind_tag() {
        let page = Page {
            items: vec![Commit::default()],
            total: 1,
            page: 1,
            per_page: 30,
        };
        let report = Report::commits_page("github", "octo/repo", page);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["kind"], "commits");
        assert_eq!(value["pagination"]["total_pages"], 1);
        assert_eq!(value["items"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_exhaustive_report_omits_pagination() {
        let report = Report::PullRequests {
            provider: "gitlab".to_string(),
            repo: "group/project".to_string(),
            items: Vec::new(),
            pagination: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("pagination").is_none());
        assert_eq!(report.item_count(), 0);
    }
}
