pub mod github;
pub mod gitlab;
pub mod http;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::vcs::{Provider, ProviderKind, VcsError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0} is enabled but no credential is configured")]
    MissingCredential(ProviderKind),

    #[error("configured credential is not a valid header value")]
    InvalidCredential,

    #[error("{0} provider is not implemented")]
    NotImplemented(ProviderKind),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Immutable mapping from provider identifier to client, built once at startup.
pub struct Registry {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    unavailable: Vec<(ProviderKind, RegistryError)>,
}

impl Registry {
    /// Build every enabled provider. A provider that cannot be built is logged and left
    /// out; it never prevents the others from registering.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
        let mut unavailable = Vec::new();

        if config.github.enabled {
            match github::GitHubClient::new(&config.github) {
                Ok(client) => providers.push(Arc::new(client)),
                Err(err) => unavailable.push((ProviderKind::GitHub, err)),
            }
        }
        if config.gitlab.enabled {
            match gitlab::GitLabClient::new(&config.gitlab) {
                Ok(client) => providers.push(Arc::new(client)),
                Err(err) => unavailable.push((ProviderKind::GitLab, err)),
            }
        }
        if config.bitbucket.enabled {
            let bitbucket = &config.bitbucket;
            let err = if bitbucket.username.is_none() || bitbucket.app_password.is_none() {
                RegistryError::MissingCredential(ProviderKind::Bitbucket)
            } else {
                RegistryError::NotImplemented(ProviderKind::Bitbucket)
            };
            unavailable.push((ProviderKind::Bitbucket, err));
        }

        for (kind, err) in &unavailable {
            warn!(provider = %kind, error = %err, "provider unavailable");
        }

        let mut registry = Self::from_providers(providers);
        registry.unavailable = unavailable;
        registry
    }

    pub fn from_providers(providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        let providers: HashMap<_, _> = providers
            .into_iter()
            .map(|provider| (provider.kind(), provider))
            .collect();
        for kind in providers.keys() {
            info!(provider = %kind, "provider registered");
        }
        Self {
            providers,
            unavailable: Vec::new(),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> Result<&Arc<dyn Provider>, VcsError> {
        self.providers
            .get(&kind)
            .ok_or_else(|| VcsError::UnsupportedProvider(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    /// Providers that were enabled but could not be built, with the reason.
    pub fn unavailable(&self) -> &[(ProviderKind, RegistryError)] {
        &self.unavailable
    }
}
