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

//! Failure classification.
//!
//! Every failed remote call is reduced to an [`ErrorKind`] before the retry
//! executor decides what to do with it. Classification only looks at the
//! HTTP status (when there is one) and the failure message.

use serde::{Deserialize, Serialize};

/// Policy-relevant category of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Credentials rejected (401/403). Never retried.
    Auth,
    /// Too many requests (429).
    RateLimit,
    /// Server-side failure (5xx) or anything unrecognised.
    Server,
    /// Connection refused, DNS failure, timeout.
    Network,
    /// Malformed request (400).
    Validation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "AUTH",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Server => "SERVER",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Validation => "VALIDATION",
        }
    }

    /// Short advice suitable for showing to a user next to the failure.
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "check that the API key is valid and has access to this agent",
            ErrorKind::RateLimit => "rate limited by the memory service; reduce call volume",
            ErrorKind::Server => "the memory service reported an internal error",
            ErrorKind::Network => "the memory service is unreachable; check connectivity",
            ErrorKind::Validation => "the request was rejected as malformed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw description of a failure as seen by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureInfo {
    pub status: Option<u16>,
    pub message: String,
}

impl FailureInfo {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::new(Some(status), String::new())
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

const NETWORK_INDICATORS: &[&str] = &[
    "econnrefused",
    "connection refused",
    "etimedout",
    "timed out",
    "timeout",
    "econnreset",
    "connection reset",
    "enotfound",
    "dns error",
    "error trying to connect",
];

/// Classify a failure. First match wins:
/// 401/403, 429, >=500, network indicators, 400, then `Server` as default.
pub fn classify(failure: &FailureInfo) -> ErrorKind {
    match failure.status {
        Some(401) | Some(403) => return ErrorKind::Auth,
        Some(429) => return ErrorKind::RateLimit,
        Some(s) if s >= 500 => return ErrorKind::Server,
        _ => {}
    }

    let message = failure.message.to_lowercase();
    if NETWORK_INDICATORS.iter().any(|needle| message.contains(needle)) {
        return ErrorKind::Network;
    }

    if failure.status == Some(400) {
        return ErrorKind::Validation;
    }

    ErrorKind::Server
}

/// Errors that can describe themselves to the classifier.
pub trait Classify {
    fn failure_info(&self) -> FailureInfo;

    fn classify(&self) -> ErrorKind {
        classify(&self.failure_info())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(classify(&FailureInfo::status(401)), ErrorKind::Auth);
        assert_eq!(classify(&FailureInfo::status(403)), ErrorKind::Auth);
        assert_eq!(classify(&FailureInfo::status(429)), ErrorKind::RateLimit);
        assert_eq!(classify(&FailureInfo::status(500)), ErrorKind::Server);
        assert_eq!(classify(&FailureInfo::status(503)), ErrorKind::Server);
        assert_eq!(classify(&FailureInfo::status(400)), ErrorKind::Validation);
    }

    #[test]
    fn test_network_indicators() {
        assert_eq!(
            classify(&FailureInfo::message("connect ECONNREFUSED 127.0.0.1:443")),
            ErrorKind::Network
        );
        assert_eq!(
            classify(&FailureInfo::message("operation timed out")),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_status_checked_before_message() {
        // A 503 mentioning a timeout is still a server failure.
        let failure = FailureInfo::new(Some(503), "upstream timeout");
        assert_eq!(classify(&failure), ErrorKind::Server);

        // A 400 mentioning a timeout is classified as network.
        let failure = FailureInfo::new(Some(400), "request timeout");
        assert_eq!(classify(&failure), ErrorKind::Network);
    }

    #[test]
    fn test_unknown_defaults_to_server() {
        assert_eq!(classify(&FailureInfo::status(404)), ErrorKind::Server);
        assert_eq!(classify(&FailureInfo::message("weird")), ErrorKind::Server);
        assert_eq!(classify(&FailureInfo::default()), ErrorKind::Server);
    }

    proptest! {
        #[test]
        fn prop_server_errors_always_server(status in 500u16..600, msg in ".*") {
            prop_assert_eq!(classify(&FailureInfo::new(Some(status), msg)), ErrorKind::Server);
        }

        #[test]
        fn prop_auth_wins_over_message(msg in ".*") {
            prop_assert_eq!(classify(&FailureInfo::new(Some(401), msg)), ErrorKind::Auth);
        }
    }
}
