//! Session configuration: the immutable value describing one scripted run.

use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Immutable description of one scripted session.
///
/// Durations are configured as integer milliseconds (`*_ms` fields) and read
/// through the typed accessors.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Position directives iterated over cyclically (e.g. `position startpos`).
    pub positions: Vec<String>,
    /// The single search-limit directive sent after each position.
    #[serde(default = "default_search_limit")]
    pub search_limit: String,
    /// Iteration cap; absent means unbounded.
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Bound on waiting for each iteration's completion line.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Bound on waiting for completion after a cancellation directive.
    #[serde(default = "default_grace_timeout_ms")]
    pub grace_timeout_ms: u64,
    /// Bound on the initiation and readiness exchanges.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Pause between iterations; `0` disables the delay.
    #[serde(default)]
    pub iteration_delay_ms: u64,
    /// Re-run the readiness exchange before every iteration.
    #[serde(default)]
    pub resync_each_iteration: bool,
    /// Abort the run when a timed-out search also misses its grace window.
    #[serde(default)]
    pub fatal_timeouts: bool,
    /// Configuration directives sent once after the handshake (no ack).
    #[serde(default)]
    pub setup: Vec<String>,
}

fn default_search_limit() -> String {
    "go movetime 100".into()
}

fn default_step_timeout_ms() -> u64 {
    5000
}

fn default_grace_timeout_ms() -> u64 {
    1000
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

impl SessionConfig {
    /// Validate invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when `positions` is empty or any required
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(AppError::Config("positions must not be empty".into()));
        }
        if self.step_timeout_ms == 0 {
            return Err(AppError::Config("step_timeout_ms must be greater than zero".into()));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(AppError::Config(
                "handshake_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Per-iteration completion wait bound.
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Post-cancellation completion wait bound.
    #[must_use]
    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    /// Handshake and readiness wait bound.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Inter-iteration delay, when configured.
    #[must_use]
    pub fn iteration_delay(&self) -> Option<Duration> {
        (self.iteration_delay_ms > 0).then(|| Duration::from_millis(self.iteration_delay_ms))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            positions: vec!["position startpos".into()],
            search_limit: default_search_limit(),
            max_iterations: None,
            step_timeout_ms: default_step_timeout_ms(),
            grace_timeout_ms: default_grace_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            iteration_delay_ms: 0,
            resync_each_iteration: false,
            fatal_timeouts: false,
            setup: Vec::new(),
        }
    }
}
