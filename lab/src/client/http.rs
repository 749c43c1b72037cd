//! reqwest-backed [`Transport`].

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{HttpReply, Transport};
use crate::config::LabConfig;
use crate::error::{ClientError, ClientResult};

/// HTTP transport to a lab backend.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for the backend at `api_url`, without timeout or credentials.
    pub fn new(api_url: &str) -> ClientResult<Self> {
        Self::build(api_url, None, None)
    }

    /// Create a transport from the lab configuration.
    pub fn from_config(config: &LabConfig) -> ClientResult<Self> {
        Self::build(&config.api_url, config.token.clone(), config.request_timeout)
    }

    fn build(
        api_url: &str,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        // Url::join drops the last segment unless the base ends with a slash
        let normalized = if api_url.ends_with('/') {
            api_url.to_string()
        } else {
            format!("{}/", api_url)
        };
        let base =
            Url::parse(&normalized).map_err(|_| ClientError::InvalidUrl(api_url.to_string()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, base, token })
    }

    /// Set the bearer token attached to backend calls.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Resolve `path` against the API URL. Returns whether the target is the backend.
    fn resolve(&self, path: &str) -> ClientResult<(Url, bool)> {
        match Url::parse(path) {
            Ok(url) => Ok((url, false)),
            Err(_) => {
                let url = self
                    .base
                    .join(path.trim_start_matches('/'))
                    .map_err(|_| ClientError::InvalidUrl(path.to_string()))?;
                Ok((url, true))
            }
        }
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        backend: bool,
    ) -> reqwest::RequestBuilder {
        match (&self.token, backend) {
            (Some(token), true) => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ClientResult<HttpReply> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "response received");
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> ClientResult<HttpReply> {
        let (url, backend) = self.resolve(path)?;
        debug!(%url, "GET");
        self.send(self.authorize(self.client.get(url), backend)).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> ClientResult<HttpReply> {
        let (url, backend) = self.resolve(path)?;
        debug!(%url, "POST");
        self.send(self.authorize(self.client.post(url).json(body), backend)).await
    }
}
