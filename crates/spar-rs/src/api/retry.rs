//! Retry policy for remote model calls: exponential backoff with jitter and
//! transient/terminal failure classification.
//!
//! Transient failures (429, 500, 502, 503, 504, network timeouts) are worth
//! retrying; terminal ones (400, 401, 403, 404, 422, malformed requests) are
//! not. The policy itself is pure: [`next_step`] maps (config, attempt,
//! failure kind) to a decision, and the invoker loop in [`crate::battle::invoker`]
//! merely executes it.

use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    /// (0 = no retries, fail straight to fallback).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (2.0 = exponential doubling).
    pub multiplier: f64,
    /// Whether to add jitter to prevent synchronized retries across a round.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed):
    /// exponential growth capped at `max_delay`, plus a small additive jitter.
    ///
    /// Jitter is deterministic per attempt index rather than random; the two
    /// contestants of a round still desynchronize (their attempt clocks drift
    /// apart after the first failure) and tests stay exact without pulling in
    /// `rand`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            let jitter_fraction = match attempt % 4 {
                0 => 0.12,
                1 => 0.21,
                2 => 0.05,
                3 => 0.17,
                _ => 0.10,
            };
            let jittered = capped + capped * jitter_fraction;
            Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64()))
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

// ── Failure classification ─────────────────────────────────────────

/// How a failed attempt should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying: rate limit, server hiccup, timeout, network failure.
    Transient,
    /// Not worth retrying: bad request, bad credentials, anything unknown.
    Terminal,
}

/// Whether an error string indicates a transient (retryable) failure.
pub fn is_transient_error(error: &str) -> bool {
    let transient_statuses = ["429", "500", "502", "503", "504"];
    if transient_statuses
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
        "network",
        "rate limit",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether an error string indicates a terminal (non-retryable) failure.
pub fn is_terminal_error(error: &str) -> bool {
    [
        "HTTP 400",
        "HTTP 401",
        "HTTP 403",
        "HTTP 404",
        "HTTP 422",
        "invalid",
        "bad request",
        "unauthorized",
        "malformed",
    ]
    .iter()
    .any(|p| error.contains(p))
}

/// Classify an error string. Terminal markers win over transient ones
/// (a 401 wrapped in a network-sounding message must not be retried), and
/// anything unrecognized is terminal.
pub fn classify_failure(error: &str) -> FailureKind {
    if is_terminal_error(error) {
        FailureKind::Terminal
    } else if is_transient_error(error) {
        FailureKind::Transient
    } else {
        FailureKind::Terminal
    }
}

// ── Attempt outcomes and the pure policy ──────────────────────────

/// Explicit result of one attempt, with failures already classified.
#[derive(Debug, Clone)]
pub enum AttemptOutcome<T> {
    Success(T),
    Transient(String),
    Terminal(String),
}

impl<T> AttemptOutcome<T> {
    /// Lift a raw client result into a classified outcome.
    pub fn from_result(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(e) => match classify_failure(&e) {
                FailureKind::Transient => AttemptOutcome::Transient(e),
                FailureKind::Terminal => AttemptOutcome::Terminal(e),
            },
        }
    }
}

/// What the retry loop should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Sleep for the given delay, then attempt again.
    RetryAfter(Duration),
    /// Stop attempting; the caller degrades to its fallback.
    GiveUp,
}

/// The retry policy: transient failures retry until the attempt budget is
/// spent, terminal failures never retry.
pub fn next_step(config: &RetryConfig, attempt: u32, kind: FailureKind) -> RetryStep {
    match kind {
        FailureKind::Transient if attempt < config.max_retries => {
            RetryStep::RetryAfter(config.delay_for_attempt(attempt))
        }
        _ => RetryStep::GiveUp,
    }
}
