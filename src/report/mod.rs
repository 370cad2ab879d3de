pub mod types;

pub use types::{PaginationMeta, Report};

use crate::vcs::{Commit, PullRequest, PullRequestState, Repository};
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to encode report as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output the report as colored terminal text (default) or JSON, to stdout or a file.
///
/// Text written to a file is markdown rather than colored output.
#[instrument(skip(report), fields(items = report.item_count()))]
pub fn output(report: &Report, json: bool, output_path: Option<&Path>) -> Result<(), ReportError> {
    match (output_path, json) {
        (None, false) => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        (None, true) => {
            debug!("writing JSON report to stdout");
            println!("{}", serde_json::to_string_pretty(report)?);
            Ok(())
        }
        (Some(path), true) => {
            debug!(path = %path.display(), "writing JSON report to file");
            std::fs::write(path, serde_json::to_string_pretty(report)?)?;
            Ok(())
        }
        (Some(path), false) => {
            debug!(path = %path.display(), "writing markdown report to file");
            write_markdown_report(report, path)
        }
    }
}

fn print_terminal_report(report: &Report) {
    println!();
    match report {
        Report::Repository {
            provider,
            repository,
        } => print_repository(provider, repository),
        Report::Exists {
            provider,
            repo,
            exists,
        } => {
            let verdict = if *exists {
                "exists".green().bold()
            } else {
                "not found".red().bold()
            };
            println!("{} ({}): {}", repo.bold(), provider, verdict);
        }
        Report::Commits {
            provider,
            repo,
            items,
            pagination,
        } => {
            println!("═══ Commits: {} ({}) ═══", repo.bold(), provider);
            if items.is_empty() {
                println!("  No commits in this window.");
            }
            for commit in items {
                println!("  • {}", commit_line(commit));
            }
            println!();
            print_pagination(pagination.as_ref(), items.len());
        }
        Report::PullRequests {
            provider,
            repo,
            items,
            pagination,
        } => {
            println!("═══ Pull Requests: {} ({}) ═══", repo.bold(), provider);
            if items.is_empty() {
                println!("  No pull requests in this window.");
            }
            for pull in items {
                println!(
                    "  • #{} [{}] {}",
                    pull.number,
                    colorize_state(pull.state),
                    pull_line(pull)
                );
            }
            println!();
            print_pagination(pagination.as_ref(), items.len());
        }
    }
    println!();
}

fn print_repository(provider: &str, repository: &Repository) {
    let visibility = if repository.private {
        "private".yellow()
    } else {
        "public".green()
    };
    println!("═══ {} ({}) ═══", repository.full_name.bold(), provider);
    println!(
        "ID: {} | Default branch: {} | {}",
        repository.id, repository.default_branch, visibility
    );
    if !repository.language.is_empty() {
        println!("Language: {}", repository.language);
    }
    if !repository.description.is_empty() {
        println!("{}", repository.description);
    }
    println!(
        "Created: {} | Updated: {}",
        repository.created_at.format("%Y-%m-%d"),
        repository.updated_at.format("%Y-%m-%d")
    );
}

fn print_pagination(pagination: Option<&PaginationMeta>, shown: usize) {
    match pagination {
        Some(meta) => {
            let more = if meta.has_more {
                "more available".cyan()
            } else {
                "end of listing".dimmed()
            };
            println!(
                "Page {} of {} | {} per page | {} total | {}",
                meta.current_page, meta.total_pages, meta.per_page, meta.total_items, more
            );
        }
        None => println!("{} items (all pages)", shown),
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn commit_line(commit: &Commit) -> String {
    format!(
        "{} {} ({}) +{} -{} in {} files",
        short_sha(&commit.sha),
        first_line(&commit.message),
        commit.author_name,
        commit.stats.additions,
        commit.stats.deletions,
        commit.stats.files_changed
    )
}

fn pull_line(pull: &PullRequest) -> String {
    format!(
        "{} ({}) | {} reviews | {} commits | {} files",
        pull.title, pull.author_name, pull.review_count, pull.commit_count, pull.stats.files_changed
    )
}

fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    match report {
        Report::Repository {
            provider,
            repository,
        } => {
            md.push_str(&format!("# {} ({})\n\n", repository.full_name, provider));
            md.push_str(&format!(
                "**ID:** {} | **Default branch:** {} | **Private:** {}\n\n",
                repository.id, repository.default_branch, repository.private
            ));
            if !repository.description.is_empty() {
                md.push_str(&format!("{}\n", repository.description));
            }
        }
        Report::Exists {
            provider,
            repo,
            exists,
        } => {
            md.push_str(&format!("# {} ({})\n\n**Exists:** {}\n", repo, provider, exists));
        }
        Report::Commits {
            provider,
            repo,
            items,
            pagination,
        } => {
            md.push_str(&format!("# Commits: {} ({})\n\n", repo, provider));
            for commit in items {
                md.push_str(&format!("- `{}`\n", commit_line(commit)));
            }
            push_markdown_pagination(&mut md, pagination.as_ref(), items.len());
        }
        Report::PullRequests {
            provider,
            repo,
            items,
            pagination,
        } => {
            md.push_str(&format!("# Pull Requests: {} ({})\n\n", repo, provider));
            for pull in items {
                md.push_str(&format!(
                    "- **#{}** [{}] {}\n",
                    pull.number,
                    pull.state,
                    pull_line(pull)
                ));
            }
            push_markdown_pagination(&mut md, pagination.as_ref(), items.len());
        }
    }

    std::fs::write(path, md)?;
    Ok(())
}

fn push_markdown_pagination(md: &mut String, pagination: Option<&PaginationMeta>, shown: usize) {
    md.push('\n');
    match pagination {
        Some(meta) => md.push_str(&format!(
            "**Page {} of {}** | {} per page | {} total\n",
            meta.current_page, meta.total_pages, meta.per_page, meta.total_items
        )),
        None => md.push_str(&format!("**{} items** (all pages)\n", shown)),
    }
}

fn colorize_state(state: PullRequestState) -> colored::ColoredString {
    match state {
        PullRequestState::Open => "open".green().bold(),
        PullRequestState::Merged => "merged".magenta().bold(),
        PullRequestState::Closed => "closed".red().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::{ChangeStats, Page};

    fn sample_commits() -> Report {
        let commit = Commit {
            sha: "0123456789abcdef".to_string(),
            message: "Fix pagination\n\nLonger body".to_string(),
            author_name: "alice".to_string(),
            stats: ChangeStats {
                files_changed: 2,
                additions: 10,
                deletions: 3,
            },
            ..Commit::default()
        };
        Report::commits_page(
            "github",
            "octo/repo",
            Page {
                items: vec![commit],
                total: 137,
                page: 2,
                per_page: 30,
            },
        )
    }

    fn sample_pulls() -> Report {
        Report::PullRequests {
            provider: "gitlab".to_string(),
            repo: "group/project".to_string(),
            items: vec![PullRequest {
                number: 42,
                title: "Add OAuth2 login flow".to_string(),
                state: PullRequestState::Merged,
                author_name: "tanuki".to_string(),
                review_count: 4,
                ..PullRequest::default()
            }],
            pagination: None,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("devmetrics-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_commit_line_uses_subject_and_short_sha() {
        let Report::Commits { items, .. } = sample_commits() else {
            panic!("expected commits report");
        };
        let line = commit_line(&items[0]);
        assert!(line.starts_with("0123456 Fix pagination (alice)"));
        assert!(line.contains("+10 -3 in 2 files"));
    }

    #[test]
    fn test_short_sha_handles_short_input() {
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_write_markdown_commits() {
        let path = temp_path("commits.md");
        write_markdown_report(&sample_commits(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Commits: octo/repo (github)"));
        assert!(content.contains("Fix pagination"));
        assert!(content.contains("**Page 2 of 5**"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_markdown_pulls_without_pagination() {
        let path = temp_path("pulls.md");
        write_markdown_report(&sample_pulls(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("**#42** [merged] Add OAuth2 login flow"));
        assert!(content.contains("**1 items** (all pages)"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_output_json_to_file() {
        let path = temp_path("commits.json");
        output(&sample_commits(), true, Some(&path)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["kind"], "commits");
        assert_eq!(value["pagination"]["has_more"], true);
        assert_eq!(value["items"][0]["stats"]["additions"], 10);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_output_to_terminal() {
        output(&sample_commits(), false, None).unwrap();
        output(&sample_pulls(), false, None).unwrap();
        let repository = Report::Repository {
            provider: "github".to_string(),
            repository: Repository {
                full_name: "octo/repo".to_string(),
                ..Repository::default()
            },
        };
        output(&repository, false, None).unwrap();
    }
}
