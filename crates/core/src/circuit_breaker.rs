//! Circuit breaker for best-effort remote calls
//!
//! Consecutive failures open the circuit; after the reset timeout a limited
//! number of probe calls are let through (half-open) and enough successes
//! close it again. Callers that see an open circuit should take their local
//! fallback path instead of waiting on the network.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected until the reset timeout elapses
    Open,
    /// Probe calls pass through
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of successes in half-open needed to close the circuit
    pub success_threshold: u32,
    /// Time to wait before trying half-open
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker for preventing cascading failures
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Check if the circuit allows a call right now
    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    fn can_execute_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
                if elapsed >= self.config.reset_timeout {
                    tracing::debug!("Circuit half-open, allowing probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.successes += 1;
            if inner.successes >= self.config.success_threshold {
                tracing::info!("Circuit closed");
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.failures += 1;

        let trip = match inner.state {
            CircuitState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if trip {
            tracing::warn!(
                failures = inner.failures,
                reset_secs = self.config.reset_timeout.as_secs(),
                "Circuit opened"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
        }
    }

    /// Run an async call under circuit protection
    pub async fn call<F, Fut, T, E>(&self, f: F) -> std::result::Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
    {
        if !self.can_execute() {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitBreakerError::ExecutionFailed(e))
            }
        }
    }

    /// Reset the circuit breaker
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.successes = 0;
        inner.opened_at = None;
    }
}

/// Circuit breaker error
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The call was not attempted
    #[error("Circuit breaker is open")]
    CircuitOpen,
    /// The call ran and failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(#[source] E),
}
