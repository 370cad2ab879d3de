use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

const DEFAULT_CONFIG_FILE: &str = ".devmetrics.toml";

/// Top-level configuration loaded from .devmetrics.toml and the environment.
///
/// Every field has a default, so the tool runs with no file at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: ProviderConfig,

    #[serde(default)]
    pub gitlab: ProviderConfig,

    #[serde(default)]
    pub bitbucket: BitbucketConfig,

    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings shared by the GitHub and GitLab clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// API token. Required when the provider is enabled.
    pub token: Option<String>,
    /// API root; each provider has its own public default.
    pub base_url: Option<String>,
    /// Largest page size to request, capped again by the provider's own limit.
    pub page_size: u32,
    /// Page cap for exhaustive traversals.
    pub max_pages: u32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            base_url: None,
            page_size: 100,
            max_pages: 100,
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Token, ignoring blank values.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BitbucketConfig {
    pub enabled: bool,
    pub username: Option<String>,
    pub app_password: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline for one whole logical operation.
    pub timeout_secs: u64,
    /// Default look-back when `since` is not given.
    pub window_days: i64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            window_days: 30,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load `path`, or .devmetrics.toml in the current directory when `path` is None,
    /// then apply environment overrides. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load_from(default)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply `VCS_*`, `REQUEST_*` and `LOGGER_*` overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        apply_provider_env(&mut self.github, "VCS_GITHUB", &get)?;
        if self.github.token().is_none() {
            self.github.token = get("GITHUB_TOKEN");
        }
        apply_provider_env(&mut self.gitlab, "VCS_GITLAB", &get)?;
        if self.gitlab.token().is_none() {
            self.gitlab.token = get("GITLAB_TOKEN");
        }

        if let Some(value) = get("VCS_BITBUCKET_ENABLED") {
            self.bitbucket.enabled = parse_bool("VCS_BITBUCKET_ENABLED", &value)?;
        }
        if let Some(value) = get("VCS_BITBUCKET_USERNAME") {
            self.bitbucket.username = Some(value);
        }
        if let Some(value) = get("VCS_BITBUCKET_APP_PASSWORD") {
            self.bitbucket.app_password = Some(value);
        }
        if let Some(value) = get("VCS_BITBUCKET_BASE_URL") {
            self.bitbucket.base_url = Some(value);
        }

        if let Some(value) = get("REQUEST_TIMEOUT_SEC") {
            self.request.timeout_secs = parse_number("REQUEST_TIMEOUT_SEC", &value)?;
        }
        if let Some(value) = get("REQUEST_WINDOW_DAYS") {
            self.request.window_days = parse_number("REQUEST_WINDOW_DAYS", &value)?;
        }

        if let Some(value) = get("LOGGER_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = get("LOGGER_FORMAT") {
            self.logging.format = match value.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => return Err(invalid("LOGGER_FORMAT", &value)),
            };
        }

        Ok(())
    }
}

fn apply_provider_env<F>(config: &mut ProviderConfig, prefix: &str, get: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = |suffix: &str| format!("{prefix}_{suffix}");

    if let Some(value) = get(&key("ENABLED")) {
        config.enabled = parse_bool(&key("ENABLED"), &value)?;
    }
    if let Some(value) = get(&key("TOKEN")) {
        config.token = Some(value);
    }
    if let Some(value) = get(&key("BASE_URL")) {
        config.base_url = Some(value);
    }
    if let Some(value) = get(&key("PAGE_SIZE")) {
        config.page_size = parse_number(&key("PAGE_SIZE"), &value)?;
    }
    if let Some(value) = get(&key("MAX_PAGES")) {
        config.max_pages = parse_number(&key("MAX_PAGES"), &value)?;
    }
    if let Some(value) = get(&key("TIMEOUT_SEC")) {
        config.timeout_secs = parse_number(&key("TIMEOUT_SEC"), &value)?;
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Ok(true),
        "0" | "false" | "f" | "no" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
