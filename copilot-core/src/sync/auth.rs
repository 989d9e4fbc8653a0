//! Cloud login state
//!
//! The bearer token lives in the secret store under [`CLOUD_TOKEN_KEY`].
//! Login is a device-style flow: open the verification URL, then poll until
//! the server hands out a token or the poll window closes.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::api::{CloudApi, CloudUser, LoginPoll};
use super::cache::SyncStatusCache;
use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::host::{SecretStore, UrlOpener};

pub const CLOUD_TOKEN_KEY: &str = "copilot.cloud.token";

/// Payload of `cloudStatus`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudStatus {
    pub authenticated: bool,
    /// A token is stored but the server rejected it
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CloudUser>,
}

pub struct CloudAuthService {
    api: Arc<dyn CloudApi>,
    secrets: Arc<dyn SecretStore>,
    urls: Arc<dyn UrlOpener>,
    cache: Arc<SyncStatusCache>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl CloudAuthService {
    pub fn new(
        api: Arc<dyn CloudApi>,
        secrets: Arc<dyn SecretStore>,
        urls: Arc<dyn UrlOpener>,
        cache: Arc<SyncStatusCache>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            api,
            secrets,
            urls,
            cache,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }

    pub fn with_poll_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn api(&self) -> &Arc<dyn CloudApi> {
        &self.api
    }

    pub async fn token(&self) -> Result<Option<String>> {
        Ok(self
            .secrets
            .get(CLOUD_TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty()))
    }

    /// Validates the stored token against the server.
    pub async fn status(&self) -> Result<CloudStatus> {
        let Some(token) = self.token().await? else {
            return Ok(CloudStatus::default());
        };
        Ok(match self.api.validate_token(&token).await? {
            Some(user) => CloudStatus {
                authenticated: true,
                expired: false,
                user: Some(user),
            },
            None => CloudStatus {
                authenticated: false,
                expired: true,
                user: None,
            },
        })
    }

    pub async fn login(&self) -> Result<CloudStatus> {
        let start = self.api.start_login().await?;
        tracing::info!(url = %start.verification_url, "Starting cloud login");
        if !self.urls.open(&start.verification_url).await? {
            return Err(Error::Cloud("the login page could not be opened".to_string()));
        }

        let token = tokio::time::timeout(self.poll_timeout, self.poll(&start.device_code))
            .await
            .map_err(|_| Error::Cloud("Login timed out. Please try again.".to_string()))??;

        self.secrets.store(CLOUD_TOKEN_KEY, &token).await?;
        self.cache.invalidate();
        let status = self.status().await?;
        tracing::info!(user = ?status.user.as_ref().map(|u| &u.login), "Cloud login complete");
        Ok(status)
    }

    async fn poll(&self, device_code: &str) -> Result<String> {
        loop {
            match self.api.poll_login(device_code).await? {
                LoginPoll::Complete { token } => return Ok(token),
                LoginPoll::Expired => {
                    return Err(Error::Cloud("Login request expired. Please try again.".to_string()))
                }
                LoginPoll::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    pub async fn logout(&self) -> Result<()> {
        self.secrets.delete(CLOUD_TOKEN_KEY).await?;
        self.cache.invalidate();
        tracing::info!("Cloud logout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::host::memory::{MemorySecretStore, RecordingUrlOpener};
    use crate::sync::api::{LoginStart, SanitizedSession, ServerSyncState, UploadResult};
    use crate::sync::cache::SyncStatus;

    /// Server that completes login after `pending_polls` pending replies.
    #[derive(Default)]
    struct LoginServer {
        pending_polls: usize,
        never_completes: bool,
        polls: AtomicUsize,
    }

    #[async_trait]
    impl CloudApi for LoginServer {
        async fn sync_state(&self, _token: &str) -> Result<ServerSyncState> {
            Ok(ServerSyncState::default())
        }

        async fn upload_batch(&self, _token: &str, sessions: &[SanitizedSession]) -> Result<UploadResult> {
            Ok(UploadResult {
                accepted: sessions.len(),
                rejected: 0,
            })
        }

        async fn validate_token(&self, token: &str) -> Result<Option<CloudUser>> {
            Ok((token == "good").then(|| CloudUser {
                login: "octocat".to_string(),
                name: None,
            }))
        }

        async fn start_login(&self) -> Result<LoginStart> {
            Ok(LoginStart {
                verification_url: "https://sync.example.com/device".to_string(),
                device_code: "dev-1".to_string(),
                user_code: Some("ABCD".to_string()),
            })
        }

        async fn poll_login(&self, _device_code: &str) -> Result<LoginPoll> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.never_completes || n < self.pending_polls {
                Ok(LoginPoll::Pending)
            } else {
                Ok(LoginPoll::Complete {
                    token: "good".to_string(),
                })
            }
        }
    }

    fn service(server: LoginServer) -> (CloudAuthService, Arc<RecordingUrlOpener>, Arc<SyncStatusCache>) {
        let urls = Arc::new(RecordingUrlOpener::default());
        let cache = Arc::new(SyncStatusCache::new(Duration::from_secs(60)));
        let auth = CloudAuthService::new(
            Arc::new(server),
            Arc::new(MemorySecretStore::default()),
            urls.clone(),
            cache.clone(),
            &AuthConfig::default(),
        )
        .with_poll_timing(Duration::from_millis(5), Duration::from_millis(200));
        (auth, urls, cache)
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let (auth, urls, cache) = service(LoginServer {
            pending_polls: 2,
            ..Default::default()
        });
        cache.put(SyncStatus::default());

        let status = auth.login().await.unwrap();
        assert!(status.authenticated);
        assert_eq!(status.user.unwrap().login, "octocat");
        assert_eq!(auth.token().await.unwrap().as_deref(), Some("good"));
        assert_eq!(urls.opened(), vec!["https://sync.example.com/device"]);
        assert_eq!(cache.get(), None);

        auth.logout().await.unwrap();
        assert_eq!(auth.status().await.unwrap(), CloudStatus::default());
    }

    #[tokio::test]
    async fn test_login_times_out() {
        let (auth, _, _) = service(LoginServer {
            never_completes: true,
            ..Default::default()
        });
        let err = auth.login().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(auth.token().await.unwrap(), None);
    }
}
