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

//! Memrelay Client Types
//!
//! Wire types for the memory service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form string metadata attached to a memory.
pub type Metadata = HashMap<String, String>;

/// Status tokens (case-insensitive) that mean the service is up.
pub const HEALTHY_STATUSES: &[&str] = &["ok", "healthy", "up"];

/// A stored memory. Records are snapshots; the service owns the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Server-assigned identifier
    pub id: String,
    pub content: String,
    /// Owning agent scope
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Seconds since epoch
    #[serde(default)]
    pub created_at: i64,
    /// Seconds since epoch
    #[serde(default)]
    pub updated_at: i64,
}

impl MemoryRecord {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.updated_at, 0)
    }
}

/// A record paired with its similarity to the query, in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub memory: MemoryRecord,
    pub score: f64,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        HEALTHY_STATUSES
            .iter()
            .any(|token| self.status.eq_ignore_ascii_case(token))
    }
}

/// Per-agent usage numbers. All zero when the service has no stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub total_memories: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// `{ "data": ... }` wrapper used by list-like endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StoreRequest<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Metadata>,
    pub agent_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    pub limit: usize,
    pub threshold: f64,
    pub agent_id: &'a str,
}

/// Outcome of one auto-capture pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    /// User and assistant texts examined.
    pub considered: usize,
    /// Candidates that passed the capture decision (after the per-turn cap).
    pub accepted: usize,
    /// Ids of newly stored memories.
    pub stored: Vec<String>,
    /// Candidates skipped because a near-identical memory exists.
    pub duplicates: usize,
    /// Candidates lost to errors, an open circuit, or cancellation.
    pub failed: usize,
}

/// Outcome of `forget_matching`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForgetReport {
    /// Ids removed from the store.
    pub deleted: Vec<String>,
    /// Ids whose delete failed; those memories still exist.
    pub failed: Vec<String>,
}

/// Breaker view included in [`StatusReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitStatus {
    pub open: bool,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Combined health, usage and breaker state for one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub agent_id: String,
    pub api_url: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MemoryStats>,
    pub circuit: CircuitStatus,
}
