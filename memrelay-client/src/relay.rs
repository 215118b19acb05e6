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

//! Resilient memory relay.
//!
//! [`MemoryRelay`] wraps a [`MemoryGateway`] with one circuit breaker and one
//! retry executor per agent. Every remote call is checked against the breaker
//! first, then driven through the retry loop, which records each finished
//! attempt back into the breaker.
//!
//! The two hooks, [`MemoryRelay::recall_context`] and
//! [`MemoryRelay::capture_turn`], never fail: they log and degrade to
//! "nothing injected" / "nothing captured".

use crate::error::{RelayError, Result};
use crate::gateway::{HttpGateway, MemoryGateway};
use crate::recall::{format_recall_block, MIN_RECALL_PROMPT_CHARS};
use crate::types::*;
use memrelay_core::{
    CancellationToken, CaptureCandidate, CaptureEngine, CircuitBreaker, ConversationMessage,
    QueryPreprocessor, RelayConfig, RetryError, RetryExecutor,
};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Longest content accepted by `store`, in chars.
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Largest metadata accepted by `store`, as serialized JSON bytes.
pub const MAX_METADATA_BYTES: usize = 10 * 1024;

/// Candidate hits examined by `forget_matching`.
const FORGET_SEARCH_LIMIT: usize = 10;

pub const CAPTURE_SOURCE: &str = "auto_capture";

pub struct MemoryRelay<G = HttpGateway> {
    config: RelayConfig,
    gateway: G,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    capture: CaptureEngine,
    preprocessor: QueryPreprocessor,
    shutdown: CancellationToken,
}

impl MemoryRelay<HttpGateway> {
    /// Build a relay over HTTPS without contacting the service.
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let gateway = HttpGateway::new(&config)?;
        Ok(Self::with_gateway(config, gateway))
    }

    /// Build a relay and require a healthy service before returning it.
    pub async fn start(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let gateway = HttpGateway::new(&config)?;
        Self::start_with_gateway(config, gateway).await
    }

    /// Like [`start`](Self::start), but a failure disables memory for the
    /// session instead of failing the host.
    pub async fn try_start(config: RelayConfig) -> Option<Self> {
        let agent_id = config.agent_id.clone();
        match Self::start(config).await {
            Ok(relay) => Some(relay),
            Err(err) => {
                error!(%agent_id, error = %err, "memory relay disabled: {}", err.user_message());
                None
            }
        }
    }
}

impl<G: MemoryGateway> MemoryRelay<G> {
    /// Assemble a relay around any gateway. The config is assumed valid.
    pub fn with_gateway(config: RelayConfig, gateway: G) -> Self {
        let breaker = CircuitBreaker::new(config.circuit_breaker.to_circuit_config());
        let retry = RetryExecutor::new(config.retry.to_policy());
        let capture = CaptureEngine::new(config.capture_settings());
        let preprocessor = QueryPreprocessor::new(config.query_preprocessing.enabled);

        Self {
            config,
            gateway,
            breaker,
            retry,
            capture,
            preprocessor,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn start_with_gateway(config: RelayConfig, gateway: G) -> Result<Self> {
        config.validate()?;
        let relay = Self::with_gateway(config, gateway);
        match relay.health().await {
            Ok(status) => {
                info!(
                    agent_id = %relay.config.agent_id,
                    status = %status.status,
                    "memory relay connected"
                );
                Ok(relay)
            }
            Err(err) => Err(RelayError::Disabled(Box::new(err))),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Cancel every in-flight and future operation on this relay.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(agent_id = %self.config.agent_id, "memory relay shutting down");
        }
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Breaker check, then the retry loop. Either token cancels.
    async fn guarded<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.shutdown.is_cancelled() || cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        if self.breaker.is_open() {
            let retry_after = self.breaker.retry_after().unwrap_or_default();
            debug!(
                operation,
                retry_after_ms = retry_after.as_millis() as u64,
                "circuit open, failing fast"
            );
            return Err(RelayError::CircuitOpen { retry_after });
        }

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(RetryError::Cancelled),
            outcome = self.retry.execute(&self.breaker, cancel, call) => outcome,
        };

        outcome.map_err(|err| match err {
            RetryError::Cancelled => {
                debug!(operation, "memory operation cancelled");
                RelayError::Cancelled
            }
            RetryError::Failed {
                kind,
                attempts,
                source,
            } => {
                warn!(operation, kind = %kind, attempts, error = %source, "memory operation failed");
                source
            }
        })
    }

    pub async fn store(&self, content: &str, metadata: Option<Metadata>) -> Result<MemoryRecord> {
        self.store_with(content, metadata.as_ref(), &self.shutdown).await
    }

    async fn store_with(
        &self,
        content: &str,
        metadata: Option<&Metadata>,
        cancel: &CancellationToken,
    ) -> Result<MemoryRecord> {
        validate_content(content)?;
        if let Some(metadata) = metadata {
            validate_metadata(metadata)?;
        }

        let gateway = &self.gateway;
        let record = self
            .guarded("store", cancel, move || gateway.store(content, metadata))
            .await?;
        debug!(id = %record.id, "memory stored");
        Ok(record)
    }

    /// Hits come back in the order the service ranked them.
    pub async fn search(&self, query: &str, limit: usize, threshold: f64) -> Result<Vec<SearchHit>> {
        self.search_with(query, limit, threshold, &self.shutdown).await
    }

    async fn search_with(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(RelayError::InvalidInput("search query is empty".to_string()));
        }
        if limit == 0 {
            return Err(RelayError::InvalidInput("search limit must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RelayError::InvalidInput(format!(
                "search threshold {threshold} is outside [0, 1]"
            )));
        }

        let gateway = &self.gateway;
        self.guarded("search", cancel, move || gateway.search(query, limit, threshold))
            .await
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MemoryRecord>> {
        if limit == 0 {
            return Err(RelayError::InvalidInput("list limit must be at least 1".to_string()));
        }
        let gateway = &self.gateway;
        self.guarded("list", &self.shutdown, move || gateway.list(limit, offset)).await
    }

    /// An unknown id is a definitive answer, not a service failure: it
    /// resets the breaker like any success and is never retried.
    pub async fn get(&self, id: &str) -> Result<MemoryRecord> {
        validate_id(id)?;
        let gateway = &self.gateway;
        let found = self
            .guarded("get", &self.shutdown, move || async move {
                match gateway.get(id).await {
                    Ok(record) => Ok(Some(record)),
                    Err(RelayError::NotFound(_)) => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await?;
        found.ok_or_else(|| RelayError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delete_with(id, &self.shutdown).await
    }

    async fn delete_with(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        validate_id(id)?;
        let gateway = &self.gateway;
        self.guarded("delete", cancel, move || gateway.delete(id)).await?;
        debug!(%id, "memory deleted");
        Ok(())
    }

    /// Succeeds only for a healthy status token; anything else counts as a
    /// server failure.
    pub async fn health(&self) -> Result<HealthStatus> {
        let gateway = &self.gateway;
        self.guarded("health", &self.shutdown, move || async move {
            let status = gateway.health().await?;
            if status.is_healthy() {
                Ok(status)
            } else {
                Err(RelayError::Unhealthy(status.status))
            }
        })
        .await
    }

    pub async fn stats(&self) -> Result<MemoryStats> {
        let gateway = &self.gateway;
        self.guarded("stats", &self.shutdown, move || gateway.stats()).await
    }

    /// Delete every memory matching `query` at or above `threshold`.
    /// A failed delete does not stop the rest; it lands in `failed`.
    pub async fn forget_matching(&self, query: &str, threshold: f64) -> Result<ForgetReport> {
        let hits = self
            .search_with(query, FORGET_SEARCH_LIMIT, threshold, &self.shutdown)
            .await?;

        let mut report = ForgetReport::default();
        for hit in hits.into_iter().filter(|hit| hit.score >= threshold) {
            match self.delete_with(&hit.memory.id, &self.shutdown).await {
                Ok(()) => report.deleted.push(hit.memory.id),
                Err(err) => {
                    warn!(id = %hit.memory.id, error = %err, "failed to forget memory");
                    report.failed.push(hit.memory.id);
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "forgot matching memories"
        );
        Ok(report)
    }

    pub fn circuit_status(&self) -> CircuitStatus {
        let retry_after = self.breaker.retry_after();
        CircuitStatus {
            open: retry_after.is_some(),
            consecutive_failures: self.breaker.snapshot().consecutive_failures,
            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
        }
    }

    /// Health, usage and breaker state. Never fails; problems land in `error`.
    pub async fn status(&self) -> StatusReport {
        let mut report = StatusReport {
            agent_id: self.config.agent_id.clone(),
            api_url: self.config.api_url.clone(),
            healthy: false,
            error: None,
            stats: None,
            circuit: self.circuit_status(),
        };

        match self.health().await {
            Ok(_) => report.healthy = true,
            Err(err) => report.error = Some(err.user_message()),
        }

        if report.healthy {
            match self.stats().await {
                Ok(stats) => report.stats = Some(stats),
                Err(err) => report.error = Some(err.user_message()),
            }
        }

        report.circuit = self.circuit_status();
        report
    }

    /// Memories relevant to `prompt`, rendered for injection ahead of it.
    pub async fn recall_context(&self, prompt: &str, cancel: &CancellationToken) -> Option<String> {
        if !self.config.auto_recall {
            return None;
        }
        if prompt.trim().chars().count() < MIN_RECALL_PROMPT_CHARS {
            return None;
        }
        if self.breaker.is_open() {
            debug!("circuit open, skipping auto-recall");
            return None;
        }

        let query = self.preprocessor.prepare(prompt);
        match self
            .search_with(
                &query,
                self.config.recall_limit,
                self.config.recall_threshold,
                cancel,
            )
            .await
        {
            Ok(hits) => {
                if !hits.is_empty() {
                    info!(count = hits.len(), "injecting recalled memories");
                }
                format_recall_block(&hits)
            }
            Err(RelayError::Cancelled) => None,
            Err(err) => {
                warn!(error = %err, "auto-recall failed, continuing without memories");
                None
            }
        }
    }

    /// Store what is worth remembering from a finished turn.
    pub async fn capture_turn(
        &self,
        messages: &[ConversationMessage],
        cancel: &CancellationToken,
    ) -> CaptureReport {
        let mut report = CaptureReport::default();
        if !self.config.auto_capture {
            return report;
        }

        report.considered = messages
            .iter()
            .filter(|m| m.role.is_conversational())
            .map(|m| m.content.texts().len())
            .sum();

        let candidates = self.capture.candidates(messages);
        report.accepted = candidates.len();

        for (index, candidate) in candidates.iter().enumerate() {
            if self.breaker.is_open() {
                debug!("circuit open, skipping remaining captures");
                report.failed += candidates.len() - index;
                break;
            }

            match self.capture_one(candidate, cancel).await {
                Ok(Some(id)) => report.stored.push(id),
                Ok(None) => report.duplicates += 1,
                Err(RelayError::Cancelled) => {
                    report.failed += candidates.len() - index;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "auto-capture failed for one candidate");
                    report.failed += 1;
                }
            }
        }

        if !report.stored.is_empty() {
            info!(
                stored = report.stored.len(),
                duplicates = report.duplicates,
                "auto-captured memories"
            );
        }
        report
    }

    /// `Ok(None)` when a near-identical memory already exists.
    async fn capture_one(
        &self,
        candidate: &CaptureCandidate,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let existing = self
            .search_with(&candidate.text, 1, self.config.capture.dedup_threshold, cancel)
            .await?;
        if !existing.is_empty() {
            debug!("skipping capture, near-duplicate exists");
            return Ok(None);
        }

        let metadata = capture_metadata(candidate);
        let record = self
            .store_with(&candidate.text, Some(&metadata), cancel)
            .await?;
        Ok(Some(record.id))
    }
}

impl<G> std::fmt::Debug for MemoryRelay<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRelay")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn capture_metadata(candidate: &CaptureCandidate) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), CAPTURE_SOURCE.to_string());
    metadata.insert("role".to_string(), candidate.role.as_str().to_string());
    metadata.insert("reason".to_string(), candidate.reason.as_str().to_string());
    metadata
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(RelayError::InvalidInput("content is empty".to_string()));
    }
    let chars = content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(RelayError::InvalidInput(format!(
            "content is {chars} chars, limit is {MAX_CONTENT_CHARS}"
        )));
    }
    Ok(())
}

fn validate_metadata(metadata: &Metadata) -> Result<()> {
    let size = serde_json::to_vec(metadata)?.len();
    if size > MAX_METADATA_BYTES {
        return Err(RelayError::InvalidInput(format!(
            "metadata is {size} bytes, limit is {MAX_METADATA_BYTES}"
        )));
    }
    Ok(())
}

/// Ids are opaque, but they become a path segment.
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(RelayError::InvalidInput(format!("invalid memory id {id:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_limits() {
        assert!(validate_content("hello").is_ok());
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"é".repeat(MAX_CONTENT_CHARS)).is_ok());
        assert!(validate_content(&"a".repeat(MAX_CONTENT_CHARS + 1)).is_err());
    }

    #[test]
    fn test_metadata_limit() {
        let mut metadata = Metadata::new();
        metadata.insert("k".into(), "v".repeat(MAX_METADATA_BYTES));
        assert!(matches!(
            validate_metadata(&metadata),
            Err(RelayError::InvalidInput(_))
        ));
        metadata.insert("k".into(), "v".into());
        assert!(validate_metadata(&metadata).is_ok());
    }

    #[test]
    fn test_id_must_be_one_segment() {
        assert!(validate_id("mem_123").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("../stats").is_err());
        assert!(validate_id("a?b").is_err());
    }
}
