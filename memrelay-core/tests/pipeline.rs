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

//! Config-driven pipeline checks through the public API.

use memrelay_core::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
struct Failure(FailureInfo);

impl Failure {
    fn status(status: u16) -> Self {
        Failure(FailureInfo::status(status))
    }
}

impl Classify for Failure {
    fn failure_info(&self) -> FailureInfo {
        self.0.clone()
    }
}

fn config_from_json() -> RelayConfig {
    RelayConfig::from_json_str(
        r#"{
            "apiKey": "mem_test_0123456789abcdef",
            "agentId": "ops-bot",
            "circuitBreaker": { "maxFailures": 2, "resetTimeoutMs": 250 },
            "retry": { "maxRetries": 1, "baseDelayMs": 100 },
            "entityExtraction": { "enabled": true }
        }"#,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_json_config_drives_breaker_and_retry() {
    let config = config_from_json();
    let breaker = CircuitBreaker::new(config.circuit_breaker.to_circuit_config());
    let executor = RetryExecutor::new(config.retry.to_policy());
    let cancel = CancellationToken::new();
    let calls = AtomicU32::new(0);
    let counter = &calls;

    let result: Result<(), _> = executor
        .execute(&breaker, &cancel, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Failure::status(503))
        })
        .await;

    match result {
        Err(RetryError::Failed { kind, attempts, .. }) => {
            assert_eq!(kind, ErrorKind::Server);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(breaker.is_open());
    assert_eq!(breaker.retry_after(), Some(Duration::from_millis(250)));

    tokio::time::advance(Duration::from_millis(250)).await;
    assert!(!breaker.is_open());
    assert_eq!(breaker.snapshot().consecutive_failures, 0);
}

#[test]
fn test_capture_and_recall_preparation() {
    let config = config_from_json();
    let engine = CaptureEngine::new(config.capture_settings());
    let preprocessor = QueryPreprocessor::new(config.query_preprocessing.enabled);

    let entities = extract_entities("key mem_prod_abcdEFGH12345678 and email a@b.co");
    let kinds: Vec<_> = entities.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [EntityKind::ApiKey, EntityKind::Email]);

    assert!(!engine.should_capture("remember that x"));
    assert_eq!(
        engine.decide("jonathan.appleseed@example.com"),
        CaptureVerdict::Accept(AcceptReason::Entities)
    );
    assert_eq!(
        preprocessor.prepare("What's the database password?"),
        "s the database password"
    );
}

#[test]
fn test_messages_from_host_json() {
    let messages: Vec<ConversationMessage> = serde_json::from_str(
        r#"[
            {"role": "user", "content": "My email is ops@example.com, remember that"},
            {"role": "assistant", "content": [
                {"type": "tool_use", "name": "search"},
                {"type": "text", "text": "I will always deploy from the release branch"}
            ]}
        ]"#,
    )
    .unwrap();

    let engine = CaptureEngine::new(config_from_json().capture_settings());
    let candidates = engine.candidates(&messages);

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].role, MessageRole::User);
    assert_eq!(candidates[1].reason, AcceptReason::Pattern);
}
