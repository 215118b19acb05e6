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

//! Consecutive-failure circuit breaker with lazy re-close.

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CircuitConfig {
    pub enabled: bool,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open once tripped.
    pub open_duration: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 3,
            open_duration: Duration::from_millis(60_000),
        }
    }
}

/// Counter and deadline guarded together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub consecutive_failures: u32,
    pub open_until: Option<Instant>,
}

/// Read-only view of the breaker at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { retry_after: Duration },
    /// The deadline has passed; the next `is_open` check re-closes the circuit.
    CooledDown,
}

pub struct CircuitBreaker {
    config: CircuitConfig,
    state: Mutex<CircuitSnapshot>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CircuitSnapshot::default()),
        }
    }

    /// A breaker that never opens and ignores recorded outcomes.
    pub fn disabled() -> Self {
        Self::new(CircuitConfig {
            enabled: false,
            ..CircuitConfig::default()
        })
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        *self.state.lock()
    }

    /// Side-effect-free state read.
    pub fn state_at(&self, now: Instant) -> BreakerState {
        if !self.config.enabled {
            return BreakerState::Closed;
        }
        match self.state.lock().open_until {
            Some(until) if now < until => BreakerState::Open {
                retry_after: until - now,
            },
            Some(_) => BreakerState::CooledDown,
            None => BreakerState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    /// True while the deadline lies ahead of `now`. An expired deadline is
    /// cleared (counter included) under the same lock before returning false.
    pub fn is_open_at(&self, now: Instant) -> bool {
        if !self.config.enabled {
            return false;
        }
        let mut state = self.state.lock();
        match state.open_until {
            Some(until) if now < until => true,
            Some(_) => {
                *state = CircuitSnapshot::default();
                debug!("circuit breaker cooled down, closing");
                false
            }
            None => false,
        }
    }

    /// Time left until the circuit re-closes, if it is open.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.state_at(Instant::now()) {
            BreakerState::Open { retry_after } => Some(retry_after),
            _ => None,
        }
    }

    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.state.lock();
        if state.open_until.is_some() || state.consecutive_failures > 0 {
            debug!(
                failures = state.consecutive_failures,
                "circuit breaker reset by success"
            );
        }
        *state = CircuitSnapshot::default();
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures < self.config.failure_threshold {
            return;
        }

        // Every failure at or past the threshold restarts the cooldown.
        let already_open = matches!(state.open_until, Some(until) if now < until);
        state.open_until = Some(now + self.config.open_duration);
        if already_open {
            debug!(
                failures = state.consecutive_failures,
                "circuit breaker cooldown restarted"
            );
        } else {
            warn!(
                failures = state.consecutive_failures,
                open_for_ms = self.config.open_duration.as_millis() as u64,
                "circuit breaker opened"
            );
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.snapshot())
            .finish()
    }
}
