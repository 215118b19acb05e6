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

//! Memrelay Core
//!
//! Network-free building blocks for talking to a remote agent memory store:
//!
//! - **Classification**: reduce any failure to an [`ErrorKind`]
//! - **Resilience**: per-client [`CircuitBreaker`] and [`RetryExecutor`]
//! - **Capture**: [`EntityExtractor`] and [`CaptureEngine`] decide what is worth storing
//! - **Recall**: [`QueryPreprocessor`] trims questions down to search terms
//!
//! ```text
//!  turn text ──► CaptureEngine / QueryPreprocessor
//!                         │
//!                         ▼
//!        breaker.is_open()? ──yes──► skip
//!                         │ no
//!                         ▼
//!        RetryExecutor ──► remote call ──► ErrorKind on failure
//!                         │
//!                         ▼
//!              breaker.record_success/failure
//! ```
//!
//! The transport lives in `memrelay-client`.

pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod message;
pub mod privacy;
pub mod query;
pub mod resilience;

pub use capture::{
    AcceptReason, CaptureCandidate, CaptureEngine, CaptureSettings, CaptureVerdict, RejectReason,
    RECALL_BLOCK_TAG,
};
pub use classify::{classify, Classify, ErrorKind, FailureInfo};
pub use config::{
    CaptureTuning, CircuitBreakerSettings, FeatureToggle, RelayConfig, RetrySettings,
    DEFAULT_API_URL,
};
pub use error::{ConfigError, ConfigResult};
pub use extract::{extract_entities, Entity, EntityExtractor, EntityKind};
pub use message::{ContentBlock, ConversationMessage, MessageContent, MessageRole};
pub use privacy::{redact_private, Redaction};
pub use query::{preprocess_query, QueryPreprocessor};
pub use resilience::{
    BreakerState, CircuitBreaker, CircuitConfig, CircuitSnapshot, RetryError, RetryExecutor,
    RetryPolicy,
};
pub use tokio_util::sync::CancellationToken;
