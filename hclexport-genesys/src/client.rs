//! Genesys Cloud REST client
//!
//! Every request holds a permit from a shared semaphore for its whole
//! lifetime, retries included, so `max_clients` bounds the number of
//! requests in flight. Transient failures (timeouts, connection errors,
//! 429 and 5xx) are retried with exponential backoff until
//! `max_retry_time` would be exceeded. A 401 triggers at most one new
//! token per request.

use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value as Json;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};

use hclexport_core::provider::ProviderError;

use crate::config::ClientConfig;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);
/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    #[error("Missing credentials: set an access token or an OAuth client ID and secret")]
    MissingCredentials,

    #[error("Client configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed ({status}): {body}")]
    Authentication { status: StatusCode, body: String },

    #[error("GET {path} failed ({status}): {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("GET {path} gave up after {attempts} attempts: {reason}")]
    RetriesExhausted {
        path: String,
        attempts: u32,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client is shut down")]
    Closed,
}

impl ClientError {
    /// The organization or credentials do not give access to the endpoint
    pub fn is_permission_error(&self) -> bool {
        matches!(
            self,
            ClientError::Status { status, .. }
                if *status == StatusCode::FORBIDDEN || *status == StatusCode::NOT_IMPLEMENTED
        )
    }
}

impl From<ClientError> for ProviderError {
    fn from(e: ClientError) -> Self {
        let err = ProviderError::new(e.to_string());
        let err = if e.is_permission_error() {
            err.permission_denied()
        } else {
            err
        };
        err.with_cause(e)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_none_or(|at| Instant::now() + TOKEN_EXPIRY_MARGIN < at)
    }
}

/// Pooled, authenticated API client
pub struct GenesysClient {
    http: reqwest::Client,
    config: ClientConfig,
    api_url: String,
    token: Mutex<Option<CachedToken>>,
    permits: Semaphore,
}

enum Attempt {
    Done(Option<Json>),
    Retry(String, Option<Duration>),
    Unauthorized(StatusCode, String),
}

impl GenesysClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let token = config.access_token.clone().map(|value| CachedToken {
            value,
            expires_at: None,
        });
        Ok(Self {
            http,
            api_url: config.api_url()?,
            permits: Semaphore::new(config.max_clients),
            token: Mutex::new(token),
            config,
        })
    }

    async fn access_token(&self) -> Result<String, ClientError> {
        let mut token = self.token.lock().await;
        if let Some(cached) = token.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.value.clone());
        }

        let (Some(client_id), Some(secret)) = (&self.config.client_id, &self.config.client_secret)
        else {
            return Err(ClientError::MissingCredentials);
        };
        let url = format!("{}/oauth/token", self.config.login_url()?);
        debug!("Requesting access token from {}", url);
        let response = self
            .http
            .post(&url)
            .basic_auth(client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Authentication { status, body });
        }

        let granted: TokenResponse = response.json().await?;
        let cached = CachedToken {
            value: granted.access_token,
            expires_at: granted
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        };
        let value = cached.value.clone();
        *token = Some(cached);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        if self.config.client_id.is_some() {
            *self.token.lock().await = None;
        }
    }

    /// GET a JSON document. Returns `None` for 404.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Json>, ClientError> {
        let _permit = self.permits.acquire().await.map_err(|_| ClientError::Closed)?;

        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        let mut attempts = 0;
        let mut reauthenticated = false;
        loop {
            attempts += 1;
            let (reason, retry_after) = match self.attempt(path, query).await? {
                Attempt::Done(body) => return Ok(body),
                Attempt::Retry(reason, retry_after) => (reason, retry_after),
                Attempt::Unauthorized(status, body) => {
                    if reauthenticated {
                        return Err(ClientError::Authentication { status, body });
                    }
                    warn!("GET {} rejected the access token, requesting a new one", path);
                    self.invalidate_token().await;
                    reauthenticated = true;
                    continue;
                }
            };

            let delay = retry_after.unwrap_or(backoff);
            if started.elapsed() + delay > self.config.max_retry_time {
                return Err(ClientError::RetriesExhausted {
                    path: path.to_string(),
                    attempts,
                    reason,
                });
            }
            warn!("GET {} failed ({}), retrying in {:?}", path, reason, delay);
            tokio::time::sleep(delay).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn attempt(&self, path: &str, query: &[(&str, String)]) -> Result<Attempt, ClientError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {} {:?}", url, query);

        let response = match self.http.get(&url).bearer_auth(token).query(query).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Ok(Attempt::Retry(e.to_string(), None));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if status.is_success() {
            let body: Json = response.json().await?;
            return Ok(Attempt::Done(Some(body)));
        }
        match status {
            StatusCode::NOT_FOUND => Ok(Attempt::Done(None)),
            StatusCode::UNAUTHORIZED if self.config.client_id.is_some() => {
                let body = response.text().await.unwrap_or_default();
                Ok(Attempt::Unauthorized(status, body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Ok(Attempt::Retry(status.to_string(), retry_after))
            }
            s if s.is_server_error() => Ok(Attempt::Retry(status.to_string(), None)),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Status {
                    path: path.to_string(),
                    status,
                    body,
                })
            }
        }
    }
}
