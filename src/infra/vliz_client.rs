//! Client for the remote annotated list API.
//!
//! A bearer token is obtained once when the client is built and reused for the
//! whole run. There is no refresh: a run outliving the token's expiry fails on
//! the next call with [`SyncError::Authentication`] and must be restarted.

use crate::app::ports::AnnotatedListPort;
use crate::config::Config;
use crate::constants::{ALREADY_EXISTS_STATUS, ANNOTATED_LISTS_PATH};
use crate::error::{Result, SyncError};
use crate::infra::http_client::error_body;
use crate::infra::rate_limiter::RateLimiter;
use crate::types::{AnnotatedEntry, CreatedEntry, NewAnnotatedEntry};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

pub struct AnnotatedListClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    page_size: u32,
    limiter: RateLimiter,
}

impl std::fmt::Debug for AnnotatedListClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotatedListClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl AnnotatedListClient {
    /// Authenticate against the identity endpoint and build a client
    #[instrument(skip(client, username, password))]
    pub async fn connect(
        client: reqwest::Client,
        endpoint: &str,
        identity_endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let token = Self::request_token(&client, identity_endpoint, username, password).await?;
        info!("Authenticated against the annotated list identity endpoint");
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            page_size: crate::constants::DEFAULT_PAGE_SIZE,
            limiter: RateLimiter::unlimited(),
        })
    }

    pub async fn from_config(client: reqwest::Client, config: &Config) -> Result<Self> {
        config.validate_for_list()?;
        let missing = |name: &str| SyncError::Config(format!("{name} is not set"));
        let endpoint = config
            .list
            .endpoint
            .as_deref()
            .ok_or_else(|| missing("list.endpoint"))?;
        let identity_endpoint = config
            .list
            .identity_endpoint
            .as_deref()
            .ok_or_else(|| missing("list.identity_endpoint"))?;
        let username = config
            .credentials
            .username
            .as_deref()
            .ok_or_else(|| missing("credentials.username"))?;
        let password = config
            .credentials
            .password
            .as_deref()
            .ok_or_else(|| missing("credentials.password"))?;

        Ok(
            Self::connect(client, endpoint, identity_endpoint, username, password)
                .await?
                .with_page_size(config.list.page_size)
                .with_rate_limit(config.list.requests_per_minute),
        )
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_rate_limit(mut self, requests_per_min: Option<u64>) -> Self {
        self.limiter = RateLimiter::per_minute(requests_per_min);
        self
    }

    async fn request_token(
        client: &reqwest::Client,
        identity_endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<String> {
        let response = client
            .post(identity_endpoint)
            .form(&[("_username", username), ("_password", password)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Authentication {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.token)
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.endpoint, ANNOTATED_LISTS_PATH)
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<Vec<AnnotatedEntry>> {
        self.limiter.acquire().await;
        let page_size = self.page_size.to_string();
        let page_number = page.to_string();
        let response = self
            .client
            .get(self.collection_url())
            .query(&[("itemsPerPage", page_size.as_str()), ("page", page_number.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if is_auth_status(status) {
            return Err(SyncError::Authentication {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }
        if !status.is_success() {
            return Err(SyncError::ListFetch {
                page,
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        let entries: Vec<AnnotatedEntry> = response.json().await?;
        Ok(entries)
    }
}

/// Remote identity echoed by a creation response, if any
fn remote_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let id = value.get("id").or_else(|| value.get("@id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl AnnotatedListPort for AnnotatedListClient {
    /// Pages are requested from 1 upward until an empty page comes back
    async fn fetch_all(&self) -> Result<Vec<AnnotatedEntry>> {
        info!("Fetching annotated list from {}", self.endpoint);
        let mut results = Vec::new();
        let mut page = 1;

        loop {
            let entries = self.fetch_page(page).await?;
            if entries.is_empty() {
                break;
            }
            debug!("Fetched {} entries from page {}", entries.len(), page);
            results.extend(entries);
            page += 1;
        }

        info!("Fetched {} annotated list entries in {} pages", results.len(), page - 1);
        Ok(results)
    }

    #[instrument(skip(self, entry), fields(key = %entry.identity_key()))]
    async fn create(&self, entry: &NewAnnotatedEntry) -> Result<CreatedEntry> {
        self.limiter.acquire().await;
        let response = self
            .client
            .post(self.collection_url())
            .bearer_auth(&self.token)
            .json(entry)
            .send()
            .await
            .map_err(|e| SyncError::CreateFailed {
                status: e.status().map_or(0, |s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == ALREADY_EXISTS_STATUS {
            return Err(SyncError::AlreadyExists {
                key: entry.identity_key(),
            });
        }
        if is_auth_status(status) {
            return Err(SyncError::Authentication {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }
        if !status.is_success() {
            return Err(SyncError::CreateFailed {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Ok(CreatedEntry {
            remote_id: remote_id(&body),
        })
    }
}
