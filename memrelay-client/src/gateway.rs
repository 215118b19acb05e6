// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Memory service transport.
//!
//! [`MemoryGateway`] is the seam between the relay and the network.
//! [`HttpGateway`] speaks the service's JSON-over-HTTPS API: bearer auth,
//! `agent_id` scoping on every call, a hard per-request timeout.

use crate::error::{RelayError, Result};
use crate::types::*;
use async_trait::async_trait;
use memrelay_core::RelayConfig;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// One call per method, no retries, no breaker. Errors come back unclassified.
#[async_trait]
pub trait MemoryGateway: Send + Sync {
    async fn store(&self, content: &str, metadata: Option<&Metadata>) -> Result<MemoryRecord>;

    async fn search(&self, query: &str, limit: usize, threshold: f64) -> Result<Vec<SearchHit>>;

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MemoryRecord>>;

    /// Fails with [`RelayError::NotFound`] when the id is unknown.
    async fn get(&self, id: &str) -> Result<MemoryRecord>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn health(&self) -> Result<HealthStatus>;

    /// Zero stats when the service has no stats endpoint.
    async fn stats(&self) -> Result<MemoryStats>;
}

pub struct HttpGateway {
    base_url: String,
    api_key: String,
    agent_id: String,
    http_client: HttpClient,
}

impl HttpGateway {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            agent_id: config.agent_id.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and fail on any non-2xx status.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "memory service request");

        let mut request = self
            .http_client
            .request(method, &url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json");

        if !params.is_empty() {
            request = request.query(params);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            return Err(RelayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(method, path, body, params).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn agent_param(&self) -> (&'static str, String) {
        ("agent_id", self.agent_id.clone())
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("agent_id", &self.agent_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MemoryGateway for HttpGateway {
    async fn store(&self, content: &str, metadata: Option<&Metadata>) -> Result<MemoryRecord> {
        let body = StoreRequest {
            content,
            metadata,
            agent_id: &self.agent_id,
        };
        self.request(Method::POST, "/v1/memories", Some(&body), &[])
            .await
    }

    async fn search(&self, query: &str, limit: usize, threshold: f64) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            query,
            limit,
            threshold,
            agent_id: &self.agent_id,
        };
        let envelope: DataEnvelope<Vec<SearchHit>> = self
            .request(Method::POST, "/v1/memories/search", Some(&body), &[])
            .await?;
        Ok(envelope.data)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MemoryRecord>> {
        let params = [
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            self.agent_param(),
        ];
        let envelope: DataEnvelope<Vec<MemoryRecord>> = self
            .request(Method::GET, "/v1/memories/memories", None::<&()>, &params)
            .await?;
        Ok(envelope.data)
    }

    async fn get(&self, id: &str) -> Result<MemoryRecord> {
        let path = format!("/v1/memories/{id}");
        match self
            .request::<MemoryRecord, ()>(Method::GET, &path, None, &[self.agent_param()])
            .await
        {
            Err(RelayError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(RelayError::NotFound(id.to_string()))
            }
            other => other,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = format!("/v1/memories/{id}");
        // success bodies vary (empty, 204, or an ack object); none carry data
        self.send(Method::DELETE, &path, None::<&()>, &[self.agent_param()])
            .await
            .map(|_| ())
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.request(Method::GET, "/v1/health", None::<&()>, &[])
            .await
    }

    async fn stats(&self) -> Result<MemoryStats> {
        match self
            .request::<DataEnvelope<MemoryStats>, ()>(
                Method::GET,
                "/v1/stats",
                None,
                &[self.agent_param()],
            )
            .await
        {
            Ok(envelope) => Ok(envelope.data),
            Err(RelayError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                debug!("stats endpoint unavailable, reporting zero");
                Ok(MemoryStats::default())
            }
            Err(err) => Err(err),
        }
    }
}
