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

//! Errors surfaced by the memory relay.

use memrelay_core::{Classify, ConfigError, ErrorKind, FailureInfo};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Memory not found: {0}")]
    NotFound(String),

    #[error("Memory service reported status {0:?}")]
    Unhealthy(String),

    #[error("Circuit breaker open, retry after {}ms", .retry_after.as_millis())]
    CircuitOpen { retry_after: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Memory relay disabled: startup check failed: {0}")]
    Disabled(#[source] Box<RelayError>),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl Classify for RelayError {
    fn failure_info(&self) -> FailureInfo {
        match self {
            RelayError::Request(err) => {
                // reqwest's Display omits the io cause; surface it for the classifier
                let mut message = err.to_string();
                if err.is_timeout() {
                    message.push_str(" (timeout)");
                }
                if err.is_connect() {
                    message.push_str(" (connection refused)");
                }
                FailureInfo::new(err.status().map(|s| s.as_u16()), message)
            }
            RelayError::Api { status, message } => FailureInfo::new(Some(*status), message.clone()),
            RelayError::NotFound(id) => FailureInfo::new(Some(404), format!("memory {id} not found")),
            RelayError::Unhealthy(status) => {
                FailureInfo::new(Some(503), format!("service status {status}"))
            }
            RelayError::InvalidInput(reason) => FailureInfo::new(Some(400), reason.clone()),
            RelayError::Disabled(cause) => cause.failure_info(),
            other => FailureInfo::message(other.to_string()),
        }
    }
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        self.classify()
    }

    /// Message for end users, with a remediation hint for service failures.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::CircuitOpen { retry_after } => format!(
                "Memory service temporarily disabled after repeated failures; retrying in {}s",
                retry_after.as_secs().max(1)
            ),
            RelayError::Cancelled => "Memory operation cancelled".to_string(),
            RelayError::Config(err) => format!("Memory relay misconfigured: {err}"),
            RelayError::Disabled(cause) => format!(
                "Memory relay disabled for this session. {}",
                cause.user_message()
            ),
            other => format!("{other}. {}", other.kind().hint()),
        }
    }
}
