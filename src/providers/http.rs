use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::RegistryError;
use crate::paging::PageSignals;
use crate::vcs::VcsError;

const USER_AGENT: &str = concat!("devmetrics/", env!("CARGO_PKG_VERSION"));

/// How a provider expects its credential.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    Bearer(&'a str),
    PrivateToken(&'a str),
}

/// Issues authenticated GETs against one provider's REST API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

/// Decoded body plus the pagination hints from the response headers.
#[derive(Debug)]
pub struct Fetched<T> {
    pub body: T,
    pub signals: PageSignals,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        auth: Auth<'_>,
        accept: &'static str,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let (name, value) = match auth {
            Auth::Bearer(token) => (AUTHORIZATION, format!("Bearer {token}")),
            Auth::PrivateToken(token) => (HeaderName::from_static("private-token"), token.to_string()),
        };
        let mut value = HeaderValue::from_str(&value).map_err(|_| RegistryError::InvalidCredential)?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(name, value);
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(accept));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Fetched<T>, VcsError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| VcsError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify(status, url));
        }

        let signals = PageSignals::from_headers(response.headers());
        let body = response
            .json::<T>()
            .await
            .map_err(|source| VcsError::Transport { url, source })?;
        Ok(Fetched { body, signals })
    }
}

fn classify(status: StatusCode, url: String) -> VcsError {
    let code = status.as_u16();
    match code {
        404 => VcsError::NotFound { url },
        401 => VcsError::Unauthorized { status: code, url },
        403 | 429 => VcsError::RateLimited { status: code, url },
        _ => VcsError::Status { status: code, url },
    }
}
