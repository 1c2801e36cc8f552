//! Cross-model peer review of candidate prompts.
//!
//! Every model that did not author the candidate is asked to critique it
//! along eight fixed criteria, each scored 0 to 10, replying in JSON. The
//! reply is schema-validated before use; an unreachable reviewer or an
//! unusable reply degrades to the neutral mid-scale review so the panel
//! always returns one [`PeerReview`] per eligible reviewer.

use crate::battle::invoker::RetryingInvoker;
use crate::battle::records::{PeerReview, ReviewScores};
use crate::catalog::Model;
use crate::json_schema_for;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

/// Reviews are short and structured; they get tighter generation parameters
/// than battle responses.
pub const REVIEW_MAX_TOKENS: u32 = 700;
pub const REVIEW_TEMPERATURE: f32 = 0.2;

/// The JSON shape reviewers are instructed to return.
#[derive(Deserialize, JsonSchema, Debug)]
struct ReviewSheet {
    clarity: f64,
    specificity: f64,
    completeness: f64,
    actionability: f64,
    conciseness: f64,
    context_coverage: f64,
    non_redundancy: f64,
    intent_tailoring: f64,
    critique: String,
    #[serde(default)]
    suggested_improvements: Vec<String>,
}

/// The instruction wrapped around a candidate prompt for one reviewer. The
/// user's original prompt rides along so intent_tailoring is judgeable.
pub(crate) fn review_instruction(candidate: &str, original: &str) -> String {
    format!(
        "You are judging a candidate prompt written by another model. It refines the \
         user's original prompt and must preserve that original intent. Rate the \
         candidate on each criterion from 0 to 10: clarity, specificity, completeness, \
         actionability, conciseness, context_coverage, non_redundancy, intent_tailoring. \
         Reply with only a JSON object containing those eight numeric fields plus \
         \"critique\" (one short paragraph) and \"suggested_improvements\" (an array \
         of strings).\n\nOriginal prompt:\n{original}\n\nCandidate prompt:\n{candidate}"
    )
}

/// Slice out the outermost JSON object, tolerating markdown fences and
/// surrounding prose.
pub(crate) fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

fn parse_review_sheet(text: &str) -> Result<ReviewSheet, String> {
    let raw = extract_json(text).ok_or("no JSON object in review reply")?;
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON in review reply: {e}"))?;

    let schema = json_schema_for::<ReviewSheet>();
    if let Ok(validator) = jsonschema::validator_for(&schema) {
        let errors: Vec<String> = validator
            .iter_errors(&value)
            .map(|e| format!("{}: {e}", e.instance_path()))
            .collect();
        if !errors.is_empty() {
            return Err(format!(
                "review reply failed schema validation: {}",
                errors.join("; ")
            ));
        }
    }

    serde_json::from_value(value).map_err(|e| format!("review reply shape mismatch: {e}"))
}

/// Runs one review pass over a candidate prompt.
pub struct PeerReviewPanel<'a> {
    invoker: &'a RetryingInvoker<'a>,
}

impl<'a> PeerReviewPanel<'a> {
    pub fn new(invoker: &'a RetryingInvoker<'a>) -> Self {
        Self { invoker }
    }

    /// Collect one review per reviewer that did not author the candidate.
    /// Reviewer calls run concurrently; results keep `reviewers` order.
    pub async fn review(
        &self,
        candidate: &str,
        original: &str,
        author: &str,
        reviewers: &[Model],
    ) -> Vec<PeerReview> {
        let calls = reviewers
            .iter()
            .filter(|m| m.id != author)
            .map(|reviewer| self.review_one(reviewer, candidate, original, author));
        futures::future::join_all(calls).await
    }

    async fn review_one(
        &self,
        reviewer: &Model,
        candidate: &str,
        original: &str,
        author: &str,
    ) -> PeerReview {
        let instruction = review_instruction(candidate, original);
        let response = self
            .invoker
            .invoke(reviewer, &instruction, REVIEW_MAX_TOKENS, REVIEW_TEMPERATURE)
            .await;

        if response.fallback {
            warn!("reviewer {} unreachable; recording neutral review", reviewer.id);
            return PeerReview::neutral(&reviewer.id, author, response.cost_cents);
        }

        match parse_review_sheet(&response.text) {
            Ok(sheet) => {
                let scores = ReviewScores {
                    clarity: sheet.clarity,
                    specificity: sheet.specificity,
                    completeness: sheet.completeness,
                    actionability: sheet.actionability,
                    conciseness: sheet.conciseness,
                    context_coverage: sheet.context_coverage,
                    non_redundancy: sheet.non_redundancy,
                    intent_tailoring: sheet.intent_tailoring,
                };
                let review = PeerReview::new(
                    &reviewer.id,
                    author,
                    scores,
                    sheet.critique,
                    sheet.suggested_improvements,
                    response.cost_cents,
                );
                debug!(
                    "review from {}: overall {:.1} for {author}",
                    reviewer.id, review.overall
                );
                review
            }
            Err(e) => {
                warn!(
                    "review from {} unusable ({e}); recording neutral review",
                    reviewer.id
                );
                PeerReview::neutral(&reviewer.id, author, response.cost_cents)
            }
        }
    }
}
