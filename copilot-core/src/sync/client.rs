//! HTTP client for the cloud sync service
//!
//! Every call carries the user's bearer token. Batch uploads retry transient
//! failures (5xx, timeouts, connection errors) with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::api::{CloudApi, CloudUser, LoginPoll, LoginStart, SanitizedSession, ServerSyncState, UploadResult};
use crate::config::SyncConfig;
use crate::error::{Error, Result};

pub struct HttpCloudClient {
    http_client: reqwest::Client,
    base_url: String,
    max_retries: usize,
}

impl HttpCloudClient {
    /// Returns an error if `server_url` is missing or the config is invalid.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("sync.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("copilot-host/", env!("CARGO_PKG_VERSION"))),
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn upload_once(&self, token: &str, sessions: &[SanitizedSession]) -> Result<UploadResult> {
        let response = self
            .http_client
            .post(self.url("/api/sync/sessions"))
            .bearer_auth(token)
            .json(&UploadRequest { sessions })
            .send()
            .await
            .map_err(request_failed)?;
        parse_json(response).await
    }
}

#[async_trait]
impl CloudApi for HttpCloudClient {
    async fn sync_state(&self, token: &str) -> Result<ServerSyncState> {
        let response = self
            .http_client
            .get(self.url("/api/sync/status"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(request_failed)?;
        parse_json(response).await
    }

    async fn upload_batch(&self, token: &str, sessions: &[SanitizedSession]) -> Result<UploadResult> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying upload_batch (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.upload_once(token, sessions).await {
                Ok(result) => return Ok(result),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!("Transient error uploading sessions: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Cloud("max retries exceeded".to_string())))
    }

    async fn validate_token(&self, token: &str) -> Result<Option<CloudUser>> {
        let response = self
            .http_client
            .get(self.url("/api/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(request_failed)?;
        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        parse_json(response).await.map(Some)
    }

    async fn start_login(&self) -> Result<LoginStart> {
        let response = self
            .http_client
            .post(self.url("/api/auth/device"))
            .json(&serde_json::json!({ "provider": "github" }))
            .send()
            .await
            .map_err(request_failed)?;
        parse_json(response).await
    }

    async fn poll_login(&self, device_code: &str) -> Result<LoginPoll> {
        let response = self
            .http_client
            .post(self.url("/api/auth/device/poll"))
            .json(&PollRequest { device_code })
            .send()
            .await
            .map_err(request_failed)?;
        match response.status() {
            StatusCode::ACCEPTED => Ok(LoginPoll::Pending),
            StatusCode::GONE => Ok(LoginPoll::Expired),
            _ => {
                let body: PollResponse = parse_json(response).await?;
                Ok(LoginPoll::Complete { token: body.token })
            }
        }
    }
}

fn request_failed(e: reqwest::Error) -> Error {
    Error::Cloud(format!("HTTP request failed: {}", e))
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::Cloud(format!("failed to parse response: {}", e)))
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Cloud(format!("API error ({}): {}", status, error_text)))
    }
}

/// Request body for POST /api/sync/sessions
#[derive(Serialize)]
struct UploadRequest<'a> {
    sessions: &'a [SanitizedSession],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollRequest<'a> {
    device_code: &'a str,
}

#[derive(Deserialize)]
struct PollResponse {
    token: String,
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Cloud(msg) => {
            msg.contains("API error (5")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}
