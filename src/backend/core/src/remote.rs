//! Remote account sync collaborator.
//!
//! Wraps the remote watch-history service's activities endpoint and reduces
//! every possible condition to a [`SyncStatus`]. The monitor loop never sees
//! errors from here: a missing account is `NotConfigured`, transport and
//! remote failures are `Failed`, and an unchanged activity cursor is
//! `NoChanges`.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::SyncConfig;
use crate::tasks::sync::{SyncService, SyncStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Activity summary returned by the remote endpoint.
#[derive(Debug, Deserialize)]
struct Activities {
    /// Most recent activity timestamp across all categories.
    latest: String,
}

/// HTTP-backed [`SyncService`].
pub struct HttpSyncService {
    client: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
    /// Last activity timestamp seen; `None` until the first successful fetch.
    cursor: Mutex<Option<String>>,
}

impl HttpSyncService {
    pub fn new(config: SyncConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: config.endpoint,
            token: config.token,
            cursor: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SyncService for HttpSyncService {
    async fn sync(&self) -> SyncStatus {
        let (Some(endpoint), Some(token)) = (&self.endpoint, &self.token) else {
            return SyncStatus::NotConfigured;
        };

        let response = match self
            .client
            .get(endpoint)
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(error = %error, "Activities request failed");
                return SyncStatus::Failed;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Activities request rejected");
            return SyncStatus::Failed;
        }

        let activities: Activities = match response.json().await {
            Ok(activities) => activities,
            Err(error) => {
                tracing::warn!(error = %error, "Activities payload malformed");
                return SyncStatus::Failed;
            }
        };

        let mut cursor = self.cursor.lock();
        if cursor.as_deref() == Some(activities.latest.as_str()) {
            return SyncStatus::NoChanges;
        }
        *cursor = Some(activities.latest);
        SyncStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> HttpSyncService {
        HttpSyncService::new(SyncConfig {
            endpoint: Some(format!("{}/activities", server.uri())),
            token: Some("secret".into()),
        })
    }

    #[tokio::test]
    async fn test_missing_token_is_not_configured() {
        let service = HttpSyncService::new(SyncConfig {
            endpoint: Some("http://localhost:9/activities".into()),
            token: None,
        });
        assert_eq!(service.sync().await, SyncStatus::NotConfigured);
    }

    #[tokio::test]
    async fn test_changed_cursor_is_success_then_no_changes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"latest": "2026-08-01T10:00:00Z"})),
            )
            .mount(&server)
            .await;

        let service = service_for(&server);
        assert_eq!(service.sync().await, SyncStatus::Success);
        assert_eq!(service.sync().await, SyncStatus::NoChanges);
    }

    #[tokio::test]
    async fn test_new_activity_resets_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"latest": "2026-08-01T10:00:00Z"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"latest": "2026-08-02T09:00:00Z"})),
            )
            .mount(&server)
            .await;

        let service = service_for(&server);
        assert_eq!(service.sync().await, SyncStatus::Success);
        assert_eq!(service.sync().await, SyncStatus::Success);
        assert_eq!(service.sync().await, SyncStatus::NoChanges);
    }

    #[tokio::test]
    async fn test_server_error_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let service = service_for(&server);
        assert_eq!(service.sync().await, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let service = service_for(&server);
        assert_eq!(service.sync().await, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failed() {
        let service = HttpSyncService::new(SyncConfig {
            endpoint: Some("http://127.0.0.1:1/activities".into()),
            token: Some("secret".into()),
        });
        assert_eq!(service.sync().await, SyncStatus::Failed);
    }
}
