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

//! Relay configuration.
//!
//! Keys are camelCase to match the host's plugin configuration, e.g.
//!
//! ```json
//! {
//!   "apiKey": "mem_prod_...",
//!   "agentId": "build-bot",
//!   "autoCapture": true,
//!   "circuitBreaker": { "maxFailures": 5 },
//!   "retry": { "baseDelayMs": 500 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::CaptureSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::resilience::{CircuitConfig, RetryPolicy};

/// Production endpoint of the memory service.
pub const DEFAULT_API_URL: &str = "https://api.memoryrelay.net";

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Bearer token for the memory service.
    pub api_key: String,

    /// Scope under which every memory is stored and searched.
    pub agent_id: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Inject relevant memories before each turn.
    #[serde(default = "default_auto_recall")]
    pub auto_recall: bool,

    /// Store noteworthy text after each turn.
    #[serde(default)]
    pub auto_capture: bool,

    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    /// Minimum similarity for recalled memories, in [0, 1].
    #[serde(default = "default_recall_threshold")]
    pub recall_threshold: f64,

    /// Hard per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub entity_extraction: FeatureToggle,

    #[serde(default)]
    pub query_preprocessing: FeatureToggle,

    #[serde(default)]
    pub capture: CaptureTuning,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_auto_recall() -> bool {
    true
}

fn default_recall_limit() -> usize {
    5
}

fn default_recall_threshold() -> f64 {
    0.3
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    pub max_failures: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failures: 3,
            reset_timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_circuit_config(&self) -> CircuitConfig {
        CircuitConfig {
            enabled: self.enabled,
            failure_threshold: self.max_failures,
            open_duration: Duration::from_millis(self.reset_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Retry requests the service rejected as malformed.
    pub retry_validation_errors: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 1_000,
            retry_validation_errors: true,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            enabled: self.enabled,
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            retry_validation: self.retry_validation_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureToggle {
    pub enabled: bool,
}

impl Default for FeatureToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Heuristic capture knobs. None of these are derived analytically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureTuning {
    pub min_length: usize,
    pub max_length: usize,
    pub max_per_turn: usize,
    /// Similarity at or above which a candidate counts as already stored.
    pub dedup_threshold: f64,
}

impl Default for CaptureTuning {
    fn default() -> Self {
        Self {
            min_length: 20,
            max_length: 2_000,
            max_per_turn: 3,
            dedup_threshold: 0.95,
        }
    }
}

impl RelayConfig {
    /// Configuration with every optional setting at its default.
    pub fn new(api_key: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            agent_id: agent_id.into(),
            api_url: default_api_url(),
            auto_recall: default_auto_recall(),
            auto_capture: false,
            recall_limit: default_recall_limit(),
            recall_threshold: default_recall_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
            circuit_breaker: CircuitBreakerSettings::default(),
            retry: RetrySettings::default(),
            entity_extraction: FeatureToggle::default(),
            query_preprocessing: FeatureToggle::default(),
            capture: CaptureTuning::default(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_auto_capture(mut self, enabled: bool) -> Self {
        self.auto_capture = enabled;
        self
    }

    pub fn with_auto_recall(mut self, enabled: bool) -> Self {
        self.auto_recall = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerSettings) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_value(value: serde_json::Value) -> ConfigResult<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("apiKey"));
        }
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::Missing("agentId"));
        }
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                field: "apiUrl",
                reason: format!("expected an http(s) URL, got {:?}", self.api_url),
            });
        }
        if self.recall_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "recallLimit",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.recall_threshold) {
            return Err(ConfigError::Invalid {
                field: "recallThreshold",
                reason: format!("{} is outside [0, 1]", self.recall_threshold),
            });
        }
        if self.circuit_breaker.enabled && self.circuit_breaker.max_failures == 0 {
            return Err(ConfigError::Invalid {
                field: "circuitBreaker.maxFailures",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.capture.dedup_threshold) {
            return Err(ConfigError::Invalid {
                field: "capture.dedupThreshold",
                reason: format!("{} is outside [0, 1]", self.capture.dedup_threshold),
            });
        }
        if self.capture.min_length > self.capture.max_length {
            return Err(ConfigError::Invalid {
                field: "capture.minLength",
                reason: "greater than capture.maxLength".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            min_length: self.capture.min_length,
            max_length: self.capture.max_length,
            max_per_turn: self.capture.max_per_turn,
            entity_extraction: self.entity_extraction.enabled,
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("api_url", &self.api_url)
            .field("auto_recall", &self.auto_recall)
            .field("auto_capture", &self.auto_capture)
            .field("recall_limit", &self.recall_limit)
            .field("recall_threshold", &self.recall_threshold)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("retry", &self.retry)
            .field("entity_extraction", &self.entity_extraction)
            .field("query_preprocessing", &self.query_preprocessing)
            .field("capture", &self.capture)
            .finish()
    }
}
