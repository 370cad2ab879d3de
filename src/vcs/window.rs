use chrono::{DateTime, Duration, Utc};

use super::VcsError;

/// Open time range used to filter commits and pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, VcsError> {
        if since >= until {
            return Err(VcsError::InvalidTimeWindow { since, until });
        }
        Ok(Self { since, until })
    }

    /// Fill in missing bounds: `until` defaults to `now`, `since` to `days` before `until`.
    pub fn resolve(
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        days: i64,
    ) -> Result<Self, VcsError> {
        let until = until.unwrap_or(now);
        let since = match since {
            Some(since) => since,
            None => Duration::try_days(days.max(1))
                .and_then(|back| until.checked_sub_signed(back))
                .ok_or(VcsError::WindowOutOfRange(days))?,
        };
        Self::new(since, until)
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    /// Strict containment on both ends.
    pub fn contains(&self, at: Option<DateTime<Utc>>) -> bool {
        match at {
            Some(t) => t > self.since && t < self.until,
            None => false,
        }
    }
}

/// A repository reference: `owner/name`, a nested GitLab namespace path, or a numeric project id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef(String);

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self, VcsError> {
        let mut path = raw.trim().trim_matches('/').to_string();
        while path.contains("//") {
            path = path.replace("//", "/");
        }
        if path.is_empty() {
            return Err(VcsError::InvalidRepoRef(raw.to_string()));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(owner, name)`; only valid for exactly two segments.
    pub fn owner_and_name(&self) -> Result<(&str, &str), VcsError> {
        match self.0.split_once('/') {
            Some((owner, name)) if !name.contains('/') => Ok((owner, name)),
            _ => Err(VcsError::InvalidRepoRef(self.0.clone())),
        }
    }

    /// Path-segment encoding, as GitLab expects for `:id`.
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
