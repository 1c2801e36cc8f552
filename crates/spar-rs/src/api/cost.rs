//! Per-model pricing and cumulative cost tracking for battles.
//!
//! The completion proxy meters real calls itself, so pricing here exists for
//! one job: pricing fallback responses on the same scale as real ones. The
//! tracker accumulates whatever the battle spends and is monotonic by
//! construction.

use crate::format_cents;

/// Approximate blended pricing for a model (cents per 1M tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub cents_per_million: f64,
}

impl ModelPricing {
    /// Estimate the cost of a token count, in cents.
    pub fn estimate_cents(&self, tokens: u32) -> f64 {
        (tokens as f64 / 1_000_000.0) * self.cents_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        // Mid-range estimate for models not in the table.
        Self {
            cents_per_million: 400.0,
        }
    }
}

/// Lookup approximate pricing for a model by id.
///
/// Matches on the model name segment (after the last `/` in ids like
/// `"anthropic/claude-sonnet-4"`) to avoid false positives from org
/// prefixes. These don't need to be exact; they keep fallback responses
/// priced consistently with real ones, they are not billing.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    let cents_per_million = if name.contains("opus") {
        7500.0
    } else if name.contains("sonnet") {
        1500.0
    } else if name.contains("haiku") {
        125.0
    } else if name.contains("gpt-4o-mini") || name.contains("4o-mini") {
        60.0
    } else if name.contains("gpt-4o") || name.contains("gpt-4") {
        1000.0
    } else if name.contains("gemini") && name.contains("flash") {
        30.0
    } else if name.contains("gemini") {
        500.0
    } else if name.contains("deepseek") {
        110.0
    } else if name.contains("qwen") || name.contains("coder") {
        90.0
    } else if name.contains("llama") {
        60.0
    } else if name.contains("mistral") {
        600.0
    } else {
        return ModelPricing::default();
    };

    ModelPricing { cents_per_million }
}

/// Cumulative spend tracker for one battle: responses, proposals and peer
/// review calls all land here.
#[derive(Debug, Default, Clone)]
pub struct CostTracker {
    pub total_tokens: u64,
    pub total_cents: f64,
    pub calls: u32,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one metered call. Negative or NaN cent amounts are recorded as
    /// zero so the running total never decreases.
    pub fn record(&mut self, tokens: u32, cents: f64) {
        self.total_tokens += tokens as u64;
        self.total_cents += cents.max(0.0);
        self.calls += 1;
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "calls: {}, tokens: {}, est. cost: {}",
            self.calls,
            self.total_tokens,
            format_cents(self.total_cents),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_estimation_in_cents() {
        let pricing = ModelPricing {
            cents_per_million: 1500.0,
        };
        let cents = pricing.estimate_cents(1_000_000);
        assert!((cents - 1500.0).abs() < 1e-9);
        assert!((pricing.estimate_cents(100_000) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn pricing_lookup_known_models() {
        let sonnet = pricing_for_model("anthropic/claude-sonnet-4");
        assert!(sonnet.cents_per_million > 1000.0);

        let mini = pricing_for_model("openai/gpt-4o-mini");
        assert!(mini.cents_per_million < 100.0);

        let flash = pricing_for_model("google/gemini-2.0-flash");
        assert!(
            flash.cents_per_million < pricing_for_model("google/gemini-2.5-pro").cents_per_million
        );

        let unknown = pricing_for_model("some-unknown-model");
        assert_eq!(unknown, ModelPricing::default());
    }

    #[test]
    fn name_segment_matching_ignores_org_prefix() {
        let custom = pricing_for_model("sonnet-labs/tiny-model");
        assert_eq!(custom, ModelPricing::default());
    }

    #[test]
    fn tracker_accumulates() {
        let mut tracker = CostTracker::new();
        tracker.record(1000, 0.15);
        tracker.record(2000, 0.30);
        assert_eq!(tracker.total_tokens, 3000);
        assert_eq!(tracker.calls, 2);
        assert!((tracker.total_cents - 0.45).abs() < 1e-9);
    }

    #[test]
    fn tracker_never_decreases() {
        let mut tracker = CostTracker::new();
        tracker.record(10, 0.5);
        let before = tracker.total_cents;
        tracker.record(10, -3.0);
        tracker.record(10, f64::NAN);
        assert!(tracker.total_cents >= before);
    }

    #[test]
    fn summary_format() {
        let mut tracker = CostTracker::new();
        tracker.record(1000, 0.5);
        let summary = tracker.summary();
        assert!(summary.contains("calls: 1"));
        assert!(summary.contains("tokens: 1000"));
        assert!(summary.contains("est. cost:"));
    }
}
