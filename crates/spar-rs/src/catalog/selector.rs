//! Auto-mode model selection: keyword buckets mapped to hand-curated
//! contrast pairs.
//!
//! Deterministic by design: identical `(prompt, category, battle_type)`
//! inputs always produce the identical pair and rationale, so auto-selection
//! is reproducible and testable. No randomness, no I/O.

use crate::battle::config::BattleType;
use crate::catalog::ModelCatalog;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of auto-selection: exactly two model ids plus the human-readable
/// justification, which names both models and then the bucket reasoning.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Selection {
    pub pair: [String; 2],
    pub rationale: String,
}

/// One keyword bucket and the contrast pair it maps to. Pairs deliberately
/// oppose a fast/general model and a specialist.
struct Bucket {
    reasoning: &'static str,
    categories: &'static [&'static str],
    keywords: &'static [&'static str],
    pair: [&'static str; 2],
}

// Probe order is fixed; the first bucket hit by the category tag or a prompt
// token wins, which keeps selection stable for mixed prompts.
const BUCKETS: [Bucket; 4] = [
    Bucket {
        reasoning: "the prompt reads as math/calculation work, pairing a fast generalist \
                    against a stepwise-reasoning specialist",
        categories: &["math"],
        keywords: &[
            "calculate",
            "solve",
            "equation",
            "math",
            "arithmetic",
            "sum",
            "integral",
            "derivative",
            "probability",
            "percentage",
        ],
        pair: ["openai/gpt-4o-mini", "deepseek/deepseek-r1"],
    },
    Bucket {
        reasoning: "the prompt reads as creative/narrative work, pairing a broad generalist \
                    against a prose specialist",
        categories: &["creative"],
        keywords: &[
            "story",
            "poem",
            "imagine",
            "creative",
            "fiction",
            "narrative",
            "character",
            "lyrics",
            "tale",
        ],
        pair: ["openai/gpt-4o", "anthropic/claude-sonnet-4"],
    },
    Bucket {
        reasoning: "the prompt reads as technical/code work, pairing a low-latency generalist \
                    against a code specialist",
        categories: &["technical", "code"],
        keywords: &[
            "code",
            "function",
            "debug",
            "implement",
            "algorithm",
            "api",
            "rust",
            "python",
            "javascript",
            "sql",
            "compile",
            "regex",
        ],
        pair: ["anthropic/claude-3.5-haiku", "qwen/qwen-2.5-coder-32b"],
    },
    Bucket {
        reasoning: "the prompt reads as explanation/teaching work, pairing a fast summarizer \
                    against a thorough long-context model",
        categories: &["explanation", "teaching"],
        keywords: &[
            "explain",
            "teach",
            "why",
            "how",
            "describe",
            "simply",
            "understand",
            "learn",
        ],
        pair: ["google/gemini-2.0-flash", "google/gemini-2.5-pro"],
    },
];

/// Used when no bucket matches, when the prompt is empty, or when a bucket's
/// pair isn't available in the injected catalog.
const BALANCED_PAIR: [&str; 2] = ["openai/gpt-4o-mini", "openai/gpt-4o"];

const BALANCED_REASONING: &str =
    "no specialty cues found, pairing a fast generalist against a larger generalist for \
     balanced contrast";

const EMPTY_PROMPT_REASONING: &str = "empty prompt, defaulting to the balanced generalist pairing";

/// Keyword-bucket selection over an injected catalog.
pub struct ModelSelector<'a> {
    catalog: &'a ModelCatalog,
}

impl<'a> ModelSelector<'a> {
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    /// Pick exactly two contestants. Never errors: degenerate inputs fall
    /// back to the balanced pair, and a catalog that can't even resolve the
    /// fallback is caught by battle validation, not here.
    pub fn select(&self, prompt: &str, category: &str, battle_type: BattleType) -> Selection {
        let goal = match battle_type {
            BattleType::Response => "direct responses",
            BattleType::Prompt => "prompt refinements",
        };

        if prompt.trim().is_empty() {
            return self.selection_for(BALANCED_PAIR, EMPTY_PROMPT_REASONING, goal);
        }

        let category = category.trim().to_lowercase();
        let words = token_set(prompt);

        for bucket in &BUCKETS {
            let category_hit = bucket.categories.contains(&category.as_str());
            let keyword_hit = bucket.keywords.iter().any(|k| words.contains(*k));
            if (category_hit || keyword_hit) && self.pair_available(bucket.pair) {
                return self.selection_for(bucket.pair, bucket.reasoning, goal);
            }
        }

        if self.pair_available(BALANCED_PAIR) {
            return self.selection_for(BALANCED_PAIR, BALANCED_REASONING, goal);
        }

        // Custom catalogs may not carry the curated ids at all; take the
        // first two available models so selection still never errors.
        let mut available = self.catalog.available();
        match (available.next(), available.next()) {
            (Some(a), Some(b)) => Selection {
                pair: [a.id.clone(), b.id.clone()],
                rationale: format!(
                    "{} vs {}: {}, judged on {}.",
                    a.display_name, b.display_name, BALANCED_REASONING, goal
                ),
            },
            // Fewer than two available models; battle validation rejects
            // this config before any remote call.
            _ => self.selection_for(BALANCED_PAIR, BALANCED_REASONING, goal),
        }
    }

    fn pair_available(&self, pair: [&str; 2]) -> bool {
        self.catalog.is_available(pair[0]) && self.catalog.is_available(pair[1])
    }

    fn selection_for(&self, pair: [&str; 2], reasoning: &str, goal: &str) -> Selection {
        let rationale = format!(
            "{} vs {}: {}, judged on {}.",
            self.catalog.display_name(pair[0]),
            self.catalog.display_name(pair[1]),
            reasoning,
            goal,
        );
        Selection {
            pair: [pair[0].to_string(), pair[1].to_string()],
            rationale,
        }
    }
}

/// Lowercased word set with edge punctuation stripped.
fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Model;

    fn selector_fixture() -> ModelCatalog {
        ModelCatalog::standard()
    }

    #[test]
    fn selection_is_deterministic() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let a = selector.select("Solve 2x + 3 = 11", "general", BattleType::Response);
        let b = selector.select("Solve 2x + 3 = 11", "general", BattleType::Response);
        assert_eq!(a, b);
    }

    #[test]
    fn math_keywords_pick_the_reasoning_specialist() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("Calculate the integral of x^2", "general", BattleType::Response);
        assert_eq!(s.pair[1], "deepseek/deepseek-r1");
        assert!(s.rationale.contains("math/calculation"));
    }

    #[test]
    fn category_tag_alone_picks_a_bucket() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("something neutral", "creative", BattleType::Response);
        assert_eq!(s.pair[1], "anthropic/claude-sonnet-4");
    }

    #[test]
    fn unknown_category_falls_back_to_balanced() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("tell me something neutral", "research", BattleType::Response);
        assert_eq!(s.pair, [
            "openai/gpt-4o-mini".to_string(),
            "openai/gpt-4o".to_string()
        ]);
        assert!(s.rationale.contains("balanced"));
    }

    #[test]
    fn empty_prompt_gets_generic_rationale_without_panicking() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("", "general", BattleType::Response);
        assert_eq!(s.pair, [
            "openai/gpt-4o-mini".to_string(),
            "openai/gpt-4o".to_string()
        ]);
        assert!(s.rationale.contains("empty prompt"));
    }

    #[test]
    fn rationale_names_both_models_before_the_reasoning() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("Write a short story about rain", "general", BattleType::Response);
        let names_end = s.rationale.find(':').unwrap();
        let names = s.rationale.get(..names_end).unwrap();
        assert!(names.contains("GPT-4o"));
        assert!(names.contains("Claude Sonnet 4"));
    }

    #[test]
    fn battle_type_changes_only_the_goal_wording() {
        let catalog = selector_fixture();
        let selector = ModelSelector::new(&catalog);
        let response = selector.select("explain gravity", "general", BattleType::Response);
        let prompt = selector.select("explain gravity", "general", BattleType::Prompt);
        assert_eq!(response.pair, prompt.pair);
        assert!(response.rationale.contains("direct responses"));
        assert!(prompt.rationale.contains("prompt refinements"));
    }

    #[test]
    fn unavailable_bucket_pair_falls_back() {
        let mut models: Vec<Model> = ModelCatalog::standard().iter().cloned().collect();
        for m in &mut models {
            if m.id == "deepseek/deepseek-r1" {
                m.available = false;
            }
        }
        let catalog = ModelCatalog::new(models);
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("solve this equation", "math", BattleType::Response);
        assert_ne!(s.pair[1], "deepseek/deepseek-r1");
        assert!(s.rationale.contains("balanced"));
    }

    #[test]
    fn custom_catalog_without_curated_ids_still_selects() {
        let catalog = ModelCatalog::new(vec![
            Model::new("lab/alpha", "Alpha", "Lab", "a"),
            Model::new("lab/beta", "Beta", "Lab", "b"),
        ]);
        let selector = ModelSelector::new(&catalog);
        let s = selector.select("explain tides", "general", BattleType::Response);
        assert_eq!(s.pair, ["lab/alpha".to_string(), "lab/beta".to_string()]);
    }

    #[test]
    fn token_set_strips_punctuation() {
        let words = token_set("Solve, please: 2x+3 (quickly)!");
        assert!(words.contains("solve"));
        assert!(words.contains("quickly"));
        assert!(!words.contains("solve,"));
    }
}
