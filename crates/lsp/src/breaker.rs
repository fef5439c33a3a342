// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker for language-server starts and requests.
//!
//! closed + N failures → open; open + timeout elapsed → half-open with a
//! bounded number of probes; half-open + enough successes → closed;
//! half-open + failure → open again.

use std::time::{Duration, Instant};

/// Breaker thresholds.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Successes in half-open that close it again.
    pub success_threshold: u32,
    /// How long the breaker stays open before probing.
    pub open_timeout: Duration,
    /// Concurrent probes allowed while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// The breaker itself. Not internally locked; callers hold it under their
/// own lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    half_open_in_flight: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            half_open_in_flight: 0,
        }
    }

    /// Current state, accounting for open-timeout expiry.
    pub fn state(&mut self) -> BreakerState {
        if self.state == BreakerState::Open {
            let expired = self
                .last_failure
                .is_none_or(|at| at.elapsed() >= self.config.open_timeout);
            if expired {
                self.state = BreakerState::HalfOpen;
                self.success_count = 0;
                self.half_open_in_flight = 0;
            }
        }
        self.state
    }

    /// Whether a call may proceed right now. A half-open admission counts
    /// against the probe budget until `record_success`/`record_failure`.
    pub fn allow(&mut self) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                if self.half_open_in_flight < self.config.half_open_max_calls {
                    self.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            BreakerState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.state = BreakerState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            }
            BreakerState::Closed => {
                self.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        match self.state {
            BreakerState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.state = BreakerState::Open;
                self.last_failure = Some(Instant::now());
            }
            BreakerState::Closed => {
                self.failure_count += 1;
                self.last_failure = Some(Instant::now());
                if self.failure_count >= self.config.failure_threshold {
                    self.state = BreakerState::Open;
                }
            }
            BreakerState::Open => {
                self.last_failure = Some(Instant::now());
            }
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
