// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! HTTP implementation of [`SessionSource`].

use crate::source::SessionSource;
use crate::types::{ChunkPage, SessionFull};
use async_trait::async_trait;
use replaysync_core::{Chunk, SyncConfig, SyncError};
use replaysync_trace::TracesResponse;
use reqwest::{Client as HttpClient, Url};
use std::time::Duration;
use thiserror::Error;

/// HTTP client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

impl From<ClientError> for SyncError {
    fn from(e: ClientError) -> Self {
        SyncError::DataFetch(e.to_string())
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the session data API
    pub url: String,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&SyncConfig> for ClientConfig {
    fn from(config: &SyncConfig) -> Self {
        ClientConfig::new(config.api_base_url.clone()).with_timeout(config.request_timeout())
    }
}

/// Session data over HTTP.
pub struct HttpSource {
    base: Url,
    http_client: HttpClient,
}

impl HttpSource {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.url));
        }
        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self { base, http_client })
    }

    fn endpoint(&self, session_id: &str, resource: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["v1", "sessions", session_id, resource]);
        Ok(url)
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "GET");
        let response = self.http_client.get(url).query(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SessionSource for HttpSource {
    async fn load_session(&self, session_id: &str) -> replaysync_core::Result<SessionFull> {
        let url = self.endpoint(session_id, "full")?;
        let full: SessionFull = self
            .request(url, &[("includeRrweb", "1".to_string())])
            .await?;
        Ok(full)
    }

    async fn fetch_chunks(
        &self,
        session_id: &str,
        after_seq: i64,
        limit: usize,
    ) -> replaysync_core::Result<Vec<Chunk>> {
        let url = self.endpoint(session_id, "rrweb")?;
        let page: ChunkPage = self
            .request(
                url,
                &[("afterSeq", after_seq.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(page.into_chunks())
    }

    async fn fetch_traces(&self, session_id: &str) -> replaysync_core::Result<TracesResponse> {
        let url = self.endpoint(session_id, "traces")?;
        let traces: TracesResponse = self.request(url, &[]).await?;
        Ok(traces)
    }
}
