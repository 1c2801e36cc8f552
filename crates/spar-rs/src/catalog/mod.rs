//! Model metadata registry and the auto-selection heuristic.
//!
//! The catalog is an explicitly constructed, read-only registry handed to the
//! orchestrator at construction time; no global state, so tests inject tiny
//! fake catalogs and concurrent battles share one instance safely.
//! [`ModelCatalog::standard`] carries the hand-curated production set;
//! [`selector`] picks contrast pairs out of whatever catalog it is given.

pub mod selector;

use serde::{Deserialize, Serialize};

/// One candidate model and its battle-relevant metadata. Immutable after
/// catalog construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Model {
    /// Stable id in `provider/name` form, as the completion proxy expects it.
    pub id: String,
    /// Human-readable name for rationales, fallback text and UI labels.
    pub display_name: String,
    pub provider: String,
    /// Unavailable models stay listed but are never selected or resolved.
    pub available: bool,
    pub premium: bool,
    /// Short capability descriptor, surfaced in selection rationales.
    pub strengths: String,
}

impl Model {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        provider: impl Into<String>,
        strengths: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            provider: provider.into(),
            available: true,
            premium: false,
            strengths: strengths.into(),
        }
    }

    pub fn premium(mut self) -> Self {
        self.premium = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

/// Read-only registry of candidate models.
#[derive(Clone, Debug, Default)]
pub struct ModelCatalog {
    models: Vec<Model>,
}

impl ModelCatalog {
    pub fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    /// The hand-curated production set. Ids must stay in sync with the
    /// contrast pairs in [`selector`].
    pub fn standard() -> Self {
        Self::new(vec![
            Model::new(
                "openai/gpt-4o-mini",
                "GPT-4o Mini",
                "OpenAI",
                "fast general-purpose answers",
            ),
            Model::new(
                "openai/gpt-4o",
                "GPT-4o",
                "OpenAI",
                "broad reasoning and balanced generalist output",
            )
            .premium(),
            Model::new(
                "anthropic/claude-sonnet-4",
                "Claude Sonnet 4",
                "Anthropic",
                "nuanced prose and careful step-by-step explanation",
            )
            .premium(),
            Model::new(
                "anthropic/claude-3.5-haiku",
                "Claude 3.5 Haiku",
                "Anthropic",
                "low-latency drafting",
            ),
            Model::new(
                "google/gemini-2.5-pro",
                "Gemini 2.5 Pro",
                "Google",
                "long-context analysis and thorough walkthroughs",
            )
            .premium(),
            Model::new(
                "google/gemini-2.0-flash",
                "Gemini 2.0 Flash",
                "Google",
                "fast summarization and teaching-style answers",
            ),
            Model::new(
                "deepseek/deepseek-r1",
                "DeepSeek R1",
                "DeepSeek",
                "stepwise math and symbolic reasoning",
            ),
            Model::new(
                "qwen/qwen-2.5-coder-32b",
                "Qwen 2.5 Coder",
                "Alibaba",
                "code generation and debugging",
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.get(id).is_some_and(|m| m.available)
    }

    /// Display name for an id, falling back to the id itself for models the
    /// catalog doesn't know (manual configs may reference them).
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map_or(id, |m| m.display_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn available(&self) -> impl Iterator<Item = &Model> {
        self.models.iter().filter(|m| m.available)
    }

    pub fn premium(&self) -> impl Iterator<Item = &Model> {
        self.models.iter().filter(|m| m.premium)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_usable() {
        let catalog = ModelCatalog::standard();
        assert!(catalog.available().count() >= 2);
        assert!(catalog.premium().count() >= 1);
        assert!(catalog.get("openai/gpt-4o-mini").is_some());
        assert!(catalog.get("nope/unknown").is_none());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let catalog = ModelCatalog::standard();
        assert_eq!(catalog.display_name("openai/gpt-4o"), "GPT-4o");
        assert_eq!(catalog.display_name("custom/model"), "custom/model");
    }

    #[test]
    fn availability_filtering() {
        let catalog = ModelCatalog::new(vec![
            Model::new("a/one", "One", "A", "x"),
            Model::new("a/two", "Two", "A", "y").unavailable(),
        ]);
        assert!(catalog.is_available("a/one"));
        assert!(!catalog.is_available("a/two"));
        assert!(!catalog.is_available("a/three"));
        assert_eq!(catalog.available().count(), 1);
        assert_eq!(catalog.len(), 2);
    }
}
