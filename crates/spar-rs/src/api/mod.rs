//! Remote-call support layer: retry policy, failure classification, pricing.
//!
//! These modules sit between the battle loop and the completion proxy:
//!
//! - [`retry`]: transient error detection (429, 5xx, network timeouts) with
//!   configurable exponential backoff and deterministic jitter, plus the pure
//!   [`next_step`](retry::next_step) policy the invoker loop executes. Never
//!   retries 400/401 errors.
//! - [`cost`]: per-model pricing table used to price fallback content, and
//!   the cumulative [`CostTracker`](cost::CostTracker) each battle feeds.

pub mod cost;
pub mod retry;

// Re-export commonly used items at the module level.
pub use cost::{CostTracker, pricing_for_model};
pub use retry::{AttemptOutcome, FailureKind, RetryConfig, RetryStep};
