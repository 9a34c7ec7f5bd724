//! ============================================================================
//! MemOS Cloud API Client - POST with timeout, retry and linear backoff
//! ============================================================================
//! - `Authorization: Token <key>` on every request; no key, no request
//! - Hard per-attempt timeout
//! - `retries + 1` attempts, sleeping 100ms, 200ms, 300ms, ... in between
//! - Non-2xx, transport errors and timeouts all count as a failed attempt
//! ============================================================================

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::payload::{AddMessageRequest, SearchRequest};
use crate::types::{MemosError, Result};

pub const SEARCH_MEMORY_PATH: &str = "/search/memory";
pub const ADD_MESSAGE_PATH: &str = "/add/message";

/// Base delay of the linear backoff schedule
const BACKOFF_STEP_MS: u64 = 100;

/// One HTTP round trip; the client adds timeout and retry on top
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, api_key: &str, body: &Value) -> Result<Value>;
}

/// [`HttpTransport`] backed by reqwest
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, api_key: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| MemosError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MemosError::Status {
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| MemosError::InvalidBody(e.to_string()))?;

        // add/message bodies are not interpreted; a 2xx without JSON still counts
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

/// Delay before retry number `attempt + 1`
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_STEP_MS * (u64::from(attempt) + 1))
}

/// Client for the MemOS Cloud OpenMem API
#[derive(Clone)]
pub struct MemosClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
    timeout: Duration,
    retries: u32,
}

impl MemosClient {
    /// Create a client using reqwest
    pub fn new(settings: &Settings) -> Self {
        Self::with_transport(settings, Arc::new(ReqwestTransport::new()))
    }

    /// Create a client over a custom transport
    pub fn with_transport(settings: &Settings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            retries: settings.retries,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path`, retrying per policy; returns the parsed response
    pub async fn execute<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        if self.api_key.is_empty() {
            return Err(MemosError::AuthenticationMissing);
        }

        let body = serde_json::to_value(body).map_err(|e| MemosError::InvalidBody(e.to_string()))?;
        let url = format!("{}{}", self.base_url, path);
        let timeout_ms = self.timeout.as_millis() as u64;

        let attempts = u64::from(self.retries) + 1;

        let mut last_error = MemosError::Network("no attempt made".to_string());
        for attempt in 0..=self.retries {
            let number = u64::from(attempt) + 1;
            debug!("POST {} (attempt {}/{})", url, number, attempts);

            let outcome = match timeout(self.timeout, self.transport.post_json(&url, &self.api_key, &body)).await {
                Ok(result) => result,
                Err(_) => Err(MemosError::Timeout(timeout_ms)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("POST {} attempt {} failed: {}", path, number, e);
                    last_error = e;
                }
            }

            if attempt < self.retries {
                sleep(backoff_delay(attempt)).await;
            }
        }

        Err(last_error)
    }

    /// `POST /search/memory`
    pub async fn search_memory(&self, request: &SearchRequest) -> Result<Value> {
        self.execute(SEARCH_MEMORY_PATH, request).await
    }

    /// `POST /add/message`
    pub async fn add_message(&self, request: &AddMessageRequest) -> Result<Value> {
        self.execute(ADD_MESSAGE_PATH, request).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use crate::config::{PluginConfig, StaticEnv};
    use serde_json::json;

    fn settings(cfg: Value) -> Settings {
        let cfg: PluginConfig = serde_json::from_value(cfg).unwrap();
        Settings::resolve_with(Some(&cfg), &StaticEnv::new())
    }

    #[test]
    fn test_backoff_schedule_is_linear() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(4), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_attempt() {
        let transport = ScriptedTransport::new(vec![], Ok(json!({})));
        let client = MemosClient::with_transport(&settings(json!({})), transport.clone());

        let err = client.execute("/search/memory", &json!({})).await.unwrap_err();

        assert_eq!(err, MemosError::AuthenticationMissing);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let transport = ScriptedTransport::new(
            vec![
                Err(MemosError::Status { status: 500 }),
                Err(MemosError::Network("connection reset".to_string())),
            ],
            Ok(json!({ "code": 0 })),
        );
        let client = MemosClient::with_transport(
            &settings(json!({ "apiKey": "k", "retries": 2 })),
            transport.clone(),
        );

        let value = client.execute("/add/message", &json!({ "a": 1 })).await.unwrap();

        assert_eq!(value, json!({ "code": 0 }));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let transport = ScriptedTransport::new(
            vec![
                Err(MemosError::Network("refused".to_string())),
                Err(MemosError::Status { status: 502 }),
            ],
            Err(MemosError::Status { status: 503 }),
        );
        let client = MemosClient::with_transport(
            &settings(json!({ "apiKey": "k", "retries": 2 })),
            transport.clone(),
        );

        let err = client.execute("/search/memory", &json!({})).await.unwrap_err();

        assert_eq!(err, MemosError::Status { status: 503 });
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_max_retries_setting_does_not_overflow() {
        let max = settings(json!({ "apiKey": "k", "retries": u32::MAX }));
        assert_eq!(max.retries, u32::MAX);

        let transport = ScriptedTransport::new(vec![], Ok(json!({ "code": 0 })));
        let client = MemosClient::with_transport(&max, transport.clone());

        assert_eq!(client.execute("/search/memory", &json!({})).await.unwrap(), json!({ "code": 0 }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let transport = ScriptedTransport::new(vec![], Err(MemosError::Status { status: 500 }));
        let client = MemosClient::with_transport(
            &settings(json!({ "apiKey": "k", "retries": 0 })),
            transport.clone(),
        );

        assert!(client.execute("/search/memory", &json!({})).await.is_err());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_attempt_times_out() {
        let transport = ScriptedTransport::with_delay(
            vec![],
            Ok(json!({})),
            Duration::from_millis(500),
        );
        let client = MemosClient::with_transport(
            &settings(json!({ "apiKey": "k", "retries": 0, "timeoutMs": 20 })),
            transport.clone(),
        );

        let err = client.execute("/search/memory", &json!({})).await.unwrap_err();

        assert_eq!(err, MemosError::Timeout(20));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_url_joins_base_and_path() {
        let transport = ScriptedTransport::new(vec![], Ok(json!({})));
        let client = MemosClient::with_transport(
            &settings(json!({ "apiKey": "k", "baseUrl": "https://memos.test/v1/" })),
            transport.clone(),
        );

        client.execute(SEARCH_MEMORY_PATH, &json!({})).await.unwrap();

        assert_eq!(transport.requests()[0].0, "https://memos.test/v1/search/memory");
    }

    #[tokio::test]
    async fn test_reqwest_transport_sends_token_and_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search/memory")
            .match_header("authorization", "Token secret-key")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJson(json!({ "user_id": "u1", "query": "hi" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"memory_detail_list":[]}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = MemosClient::new(&settings(json!({
            "apiKey": "secret-key",
            "baseUrl": server.url(),
        })));
        let value = client
            .execute("/search/memory", &json!({ "user_id": "u1", "query": "hi" }))
            .await
            .unwrap();

        assert_eq!(value, json!({ "data": { "memory_detail_list": [] } }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_transport_retries_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/add/message")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = MemosClient::new(&settings(json!({
            "apiKey": "k",
            "baseUrl": server.url(),
            "retries": 1,
        })));
        let err = client.execute("/add/message", &json!({})).await.unwrap_err();

        assert_eq!(err, MemosError::Status { status: 503 });
        mock.assert_async().await;
    }
}
