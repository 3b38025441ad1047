//! HTTP seam for the Graph API. Production code goes through reqwest; tests
//! substitute a scripted transport.

use async_trait::async_trait;
use insights_core::error::{InsightsError, InsightsResult};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::error;
use url::Url;

#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// GET `url` and return the JSON body. Non-success statuses become
    /// [`InsightsError::Upstream`] carrying the error body.
    async fn get(&self, url: &Url, token: &str) -> InsightsResult<Value>;

    /// POST a form to `url` and return the JSON body.
    async fn post(&self, url: &Url, token: &str, form: &[(String, String)]) -> InsightsResult<Value>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> InsightsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| InsightsError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response, path: &str) -> InsightsResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InsightsError::Transport(format!("{path}: failed to read body: {e}")))?;

        if !status.is_success() {
            // Graph errors are JSON; keep anything else as a string payload.
            let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));
            error!(path, status = status.as_u16(), "Graph API request failed");
            return Err(InsightsError::Upstream {
                status: status.as_u16(),
                payload,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl GraphTransport for ReqwestTransport {
    async fn get(&self, url: &Url, token: &str) -> InsightsResult<Value> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| InsightsError::Transport(format!("GET {} failed: {e}", url.path())))?;
        Self::read(response, url.path()).await
    }

    async fn post(&self, url: &Url, token: &str, form: &[(String, String)]) -> InsightsResult<Value> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .map_err(|e| InsightsError::Transport(format!("POST {} failed: {e}", url.path())))?;
        Self::read(response, url.path()).await
    }
}
