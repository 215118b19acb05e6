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

//! Bounded exponential-backoff retry.

use std::future::Future;

use thiserror::Error;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::CircuitBreaker;
use crate::classify::{Classify, ErrorKind};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Whether `Validation` failures are retried like transient ones.
    pub retry_validation: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    pub fn exponential() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            retry_validation: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::exponential()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// `base_delay * 2^attempt`, attempt zero-indexed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Whether a failure of `kind` earns another attempt under this policy.
    pub fn should_retry(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Auth => false,
            ErrorKind::Validation => self.retry_validation,
            _ => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The caller cancelled; nothing was recorded for the interrupted attempt.
    #[error("operation cancelled")]
    Cancelled,
    #[error("{kind} failure after {attempts} attempt(s): {source}")]
    Failed {
        kind: ErrorKind,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Cancelled => None,
            RetryError::Failed { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent. Every finished attempt is recorded in `breaker`;
    /// the breaker is not consulted.
    pub async fn execute<F, Fut, T, E>(
        &self,
        breaker: &CircuitBreaker,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::error::Error + 'static,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = operation() => outcome,
            };

            let error = match outcome {
                Ok(value) => {
                    breaker.record_success();
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = error.classify();
            breaker.record_failure();
            let attempts = attempt + 1;

            if attempts >= max_attempts || !self.policy.should_retry(kind) {
                return Err(RetryError::Failed {
                    kind,
                    attempts,
                    source: error,
                });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                attempt = attempts,
                max_attempts,
                kind = %kind,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying memory service call"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FailureInfo;
    use crate::resilience::CircuitConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, Clone, Error)]
    #[error("status {0}")]
    struct StatusError(u16);

    impl Classify for StatusError {
        fn failure_info(&self) -> FailureInfo {
            FailureInfo::status(self.0)
        }
    }

    fn quiet_breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitConfig {
            failure_threshold: 100,
            ..CircuitConfig::default()
        })
    }

    #[test]
    fn test_delays_double() {
        let policy = RetryPolicy::exponential();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4_000));
        // saturates instead of overflowing
        assert_eq!(policy.delay_for_attempt(40), policy.delay_for_attempt(32));
    }

    #[test]
    fn test_should_retry_by_kind() {
        let policy = RetryPolicy::exponential();
        assert!(!policy.should_retry(ErrorKind::Auth));
        assert!(policy.should_retry(ErrorKind::RateLimit));
        assert!(policy.should_retry(ErrorKind::Network));
        assert!(policy.should_retry(ErrorKind::Validation));

        let strict = RetryPolicy {
            retry_validation: false,
            ..RetryPolicy::exponential()
        };
        assert!(!strict.should_retry(ErrorKind::Validation));
        assert!(strict.should_retry(ErrorKind::Server));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let executor = RetryExecutor::new(RetryPolicy::exponential());
        let breaker = quiet_breaker();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<&str, RetryError<StatusError>> = executor
            .execute(&breaker, &CancellationToken::new(), || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(StatusError(503))
                } else {
                    Ok("stored")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "stored");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(3_000));
        assert_eq!(breaker.snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_is_not_retried() {
        let executor = RetryExecutor::new(RetryPolicy::exponential());
        let breaker = quiet_breaker();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<(), _> = executor
            .execute(&breaker, &CancellationToken::new(), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StatusError(401))
            })
            .await;

        match result {
            Err(RetryError::Failed { kind, attempts, .. }) => {
                assert_eq!(kind, ErrorKind::Auth);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(breaker.snapshot().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error_without_final_delay() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::exponential()
        });
        let breaker = quiet_breaker();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<(), _> = executor
            .execute(&breaker, &CancellationToken::new(), || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err(StatusError(500 + n as u16))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.into_inner().unwrap().0, 502);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100 + 200, nothing after the last attempt
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert_eq!(breaker.snapshot().consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_runs_once_and_reports() {
        let executor = RetryExecutor::new(RetryPolicy::disabled());
        let breaker = quiet_breaker();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = executor
            .execute(&breaker, &CancellationToken::new(), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StatusError(503))
            })
            .await;

        assert!(matches!(result, Err(RetryError::Failed { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.snapshot().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_not_retried_when_configured() {
        let executor = RetryExecutor::new(RetryPolicy {
            retry_validation: false,
            ..RetryPolicy::exponential()
        });
        let breaker = quiet_breaker();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = executor
            .execute(&breaker, &CancellationToken::new(), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StatusError(400))
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::Failed {
                kind: ErrorKind::Validation,
                attempts: 1,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_records_nothing_further() {
        let executor = RetryExecutor::new(RetryPolicy::exponential());
        let breaker = quiet_breaker();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                cancel.cancel();
            })
        };

        let result: Result<(), _> = executor
            .execute(&breaker, &cancel, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StatusError(503))
            })
            .await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_runs() {
        let executor = RetryExecutor::default();
        let breaker = quiet_breaker();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), RetryError<StatusError>> = executor
            .execute(&breaker, &cancel, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.snapshot(), Default::default());
    }
}
