//! Domain records for one battle: responses, scores, peer reviews, rounds,
//! the prompt evolution trail and the `Battle` aggregate itself.
//!
//! Everything here is an explicit, serializable type constructed through
//! helpers that enforce the invariants (clamped score ranges, derived
//! overall values, append-only histories), so downstream code never needs to
//! re-check them.

use crate::Completion;
use crate::battle::config::BattleConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author id recorded for the round-0 original prompt in evolution history.
pub const USER_AUTHOR: &str = "user";

/// Round a value to one decimal place (score convention throughout).
pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ── Model responses ────────────────────────────────────────────────

/// One model's output for one round, real or fallback. Never mutated after
/// creation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelResponse {
    pub model: String,
    pub text: String,
    pub latency_ms: u64,
    pub tokens: u32,
    pub cost_cents: f64,
    pub created_at: DateTime<Utc>,
    /// True when retries were exhausted and the text was generated locally.
    /// Fallback responses are scoreable but the battle reports them.
    pub fallback: bool,
}

impl ModelResponse {
    /// Wrap a real completion from the proxy.
    pub fn real(model: impl Into<String>, completion: Completion) -> Self {
        Self {
            model: model.into(),
            text: completion.text,
            latency_ms: completion.latency_ms,
            tokens: completion.tokens,
            cost_cents: completion.cost_cents,
            created_at: Utc::now(),
            fallback: false,
        }
    }

    /// Wrap locally generated fallback text. Latency is the total wall time
    /// the failed attempts consumed.
    pub fn fallback(
        model: impl Into<String>,
        text: impl Into<String>,
        tokens: u32,
        cost_cents: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            model: model.into(),
            text: text.into(),
            latency_ms,
            tokens,
            cost_cents,
            created_at: Utc::now(),
            fallback: true,
        }
    }
}

// ── Scores ─────────────────────────────────────────────────────────

/// Four-axis heuristic score for one piece of text. `overall` is always the
/// mean of the four axes rounded to one decimal, and every axis lies in
/// [1.0, 10.0]; both hold from construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Score {
    pub accuracy: f64,
    pub reasoning: f64,
    pub structure: f64,
    pub creativity: f64,
    pub overall: f64,
    pub notes: String,
}

impl Score {
    pub fn from_axes(
        accuracy: f64,
        reasoning: f64,
        structure: f64,
        creativity: f64,
        notes: impl Into<String>,
    ) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.clamp(1.0, 10.0) } else { 1.0 };
        let (accuracy, reasoning, structure, creativity) = (
            clamp(accuracy),
            clamp(reasoning),
            clamp(structure),
            clamp(creativity),
        );
        let overall = round1((accuracy + reasoning + structure + creativity) / 4.0);
        Self {
            accuracy,
            reasoning,
            structure,
            creativity,
            overall,
            notes: notes.into(),
        }
    }
}

/// A response paired with its score. Keeps the (model, response, score)
/// association intact through concurrent rounds.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScoredResponse {
    pub response: ModelResponse,
    pub score: Score,
}

// ── Peer reviews ───────────────────────────────────────────────────

/// The eight fixed review criteria, each scored 0 to 10.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReviewScores {
    pub clarity: f64,
    pub specificity: f64,
    pub completeness: f64,
    pub actionability: f64,
    pub conciseness: f64,
    pub context_coverage: f64,
    pub non_redundancy: f64,
    pub intent_tailoring: f64,
}

impl ReviewScores {
    pub fn uniform(value: f64) -> Self {
        Self {
            clarity: value,
            specificity: value,
            completeness: value,
            actionability: value,
            conciseness: value,
            context_coverage: value,
            non_redundancy: value,
            intent_tailoring: value,
        }
    }

    /// Clamp every criterion into [0, 10]; non-finite values collapse to 0.
    pub fn clamped(self) -> Self {
        let c = |v: f64| if v.is_finite() { v.clamp(0.0, 10.0) } else { 0.0 };
        Self {
            clarity: c(self.clarity),
            specificity: c(self.specificity),
            completeness: c(self.completeness),
            actionability: c(self.actionability),
            conciseness: c(self.conciseness),
            context_coverage: c(self.context_coverage),
            non_redundancy: c(self.non_redundancy),
            intent_tailoring: c(self.intent_tailoring),
        }
    }

    pub fn mean(&self) -> f64 {
        (self.clarity
            + self.specificity
            + self.completeness
            + self.actionability
            + self.conciseness
            + self.context_coverage
            + self.non_redundancy
            + self.intent_tailoring)
            / 8.0
    }
}

/// One reviewer's critique of one candidate prompt. `overall` is the mean of
/// the eight criteria rounded to one decimal.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PeerReview {
    pub reviewer: String,
    /// Author of the candidate under review.
    pub reviewee: String,
    pub scores: ReviewScores,
    pub overall: f64,
    pub critique: String,
    pub suggested_improvements: Vec<String>,
    /// Cost of the underlying review call; battles sum these into totals.
    pub cost_cents: f64,
    /// True when the reviewer call failed and this is the neutral default.
    pub fallback: bool,
}

impl PeerReview {
    pub fn new(
        reviewer: impl Into<String>,
        reviewee: impl Into<String>,
        scores: ReviewScores,
        critique: impl Into<String>,
        suggested_improvements: Vec<String>,
        cost_cents: f64,
    ) -> Self {
        let scores = scores.clamped();
        let overall = round1(scores.mean());
        Self {
            reviewer: reviewer.into(),
            reviewee: reviewee.into(),
            scores,
            overall,
            critique: critique.into(),
            suggested_improvements,
            cost_cents,
            fallback: false,
        }
    }

    /// Mid-scale stand-in for a reviewer whose call failed. Always counted
    /// so the panel returns one review per eligible reviewer.
    pub fn neutral(
        reviewer: impl Into<String>,
        reviewee: impl Into<String>,
        cost_cents: f64,
    ) -> Self {
        let scores = ReviewScores::uniform(5.0);
        let overall = round1(scores.mean());
        Self {
            reviewer: reviewer.into(),
            reviewee: reviewee.into(),
            scores,
            overall,
            critique: "reviewer unavailable; neutral default applied".to_string(),
            suggested_improvements: Vec::new(),
            cost_cents,
            fallback: true,
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.overall == 10.0
    }
}

// ── Rounds ─────────────────────────────────────────────────────────

/// One round of a response battle: both models answered the same prompt.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResponseRound {
    pub round: u32,
    pub entries: [ScoredResponse; 2],
    pub champion: String,
}

/// One side of a prompt-battle round: a prompt text and its standing.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PromptCandidate {
    /// Model id, or [`USER_AUTHOR`] for the original prompt.
    pub author: String,
    pub text: String,
    /// Heuristic score against the original intent, kept for provenance.
    pub score: Score,
    /// Peer-review average earned when this candidate was reviewed;
    /// 0.0 for the unscored original.
    pub review_average: f64,
}

/// One round of a prompt battle: the incumbent champion prompt versus a
/// fresh refinement proposed by the non-champion model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PromptRound {
    pub round: u32,
    pub incumbent: PromptCandidate,
    pub challenger: PromptCandidate,
    /// The raw proposal call (carries cost/latency/fallback provenance).
    pub proposal: ModelResponse,
    pub reviews: Vec<PeerReview>,
    /// Author id of the winning candidate.
    pub champion: String,
}

impl PromptRound {
    pub fn champion_candidate(&self) -> &PromptCandidate {
        if self.champion == self.challenger.author {
            &self.challenger
        } else {
            &self.incumbent
        }
    }

    /// Whether this round's champion is the candidate the panel reviewed.
    /// Consensus can only be declared on such rounds.
    pub fn champion_was_reviewed(&self) -> bool {
        self.champion == self.challenger.author
    }
}

/// A completed round of either battle type.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundOutcome {
    Response(ResponseRound),
    Prompt(PromptRound),
}

impl RoundOutcome {
    pub fn round(&self) -> u32 {
        match self {
            RoundOutcome::Response(r) => r.round,
            RoundOutcome::Prompt(r) => r.round,
        }
    }

    pub fn champion(&self) -> &str {
        match self {
            RoundOutcome::Response(r) => &r.champion,
            RoundOutcome::Prompt(r) => &r.champion,
        }
    }

    /// The score the champion carried out of this round: heuristic overall
    /// for response rounds, peer-review average for prompt rounds.
    pub fn champion_score(&self) -> f64 {
        match self {
            RoundOutcome::Response(r) => r
                .entries
                .iter()
                .find(|e| e.response.model == r.champion)
                .map_or(0.0, |e| e.score.overall),
            RoundOutcome::Prompt(r) => r.champion_candidate().review_average,
        }
    }

    pub fn reviews(&self) -> &[PeerReview] {
        match self {
            RoundOutcome::Response(_) => &[],
            RoundOutcome::Prompt(r) => &r.reviews,
        }
    }

    /// Whether any underlying call degraded to fallback content.
    pub fn degraded(&self) -> bool {
        match self {
            RoundOutcome::Response(r) => r.entries.iter().any(|e| e.response.fallback),
            RoundOutcome::Prompt(r) => {
                r.proposal.fallback || r.reviews.iter().any(|rev| rev.fallback)
            }
        }
    }
}

// ── Prompt evolution ───────────────────────────────────────────────

/// One step in how the prompt changed over a prompt battle. Entries are
/// appended in round order and never retracted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromptEvolutionEntry {
    pub round: u32,
    pub prompt: String,
    pub author: String,
    pub improvements: Vec<String>,
    /// Peer-review average of the prompt at this round; 0.0 for round 0.
    pub score: f64,
}

impl PromptEvolutionEntry {
    /// The round-0 baseline: the user's original prompt, unscored.
    pub fn original(prompt: impl Into<String>) -> Self {
        Self {
            round: 0,
            prompt: prompt.into(),
            author: USER_AUTHOR.to_string(),
            improvements: Vec::new(),
            score: 0.0,
        }
    }
}

// ── Battle aggregate ───────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    Running,
    Completed,
    Failed,
}

/// The aggregate root for one battle. Owned exclusively by the orchestrator
/// while running; callers see it once finalized.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Battle {
    pub id: Uuid,
    pub config: BattleConfig,
    pub status: BattleStatus,
    /// The resolved contestant pair, fixed for the battle's lifetime.
    pub models: [String; 2],
    /// Selector justification; `None` for manual mode.
    pub selection_rationale: Option<String>,
    pub winner: Option<String>,
    /// Champion prompt of the final round (prompt battles only).
    pub final_prompt: Option<String>,
    pub total_cost_cents: f64,
    pub rounds: Vec<RoundOutcome>,
    pub evolution: Vec<PromptEvolutionEntry>,
    /// True only if every reviewer gave the final champion a perfect 10.
    pub global_consensus: bool,
    pub plateau_reason: Option<String>,
    /// Non-empty when any model degraded to fallback content.
    pub degradation_note: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Battle {
    /// Open a running battle with a fresh collision-resistant id.
    pub(crate) fn start(
        config: BattleConfig,
        models: [String; 2],
        selection_rationale: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: BattleStatus::Running,
            models,
            selection_rationale,
            winner: None,
            final_prompt: None,
            total_cost_cents: 0.0,
            rounds: Vec::new(),
            evolution: Vec::new(),
            global_consensus: false,
            plateau_reason: None,
            degradation_note: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a completed round. Histories only ever grow.
    pub(crate) fn push_round(&mut self, outcome: RoundOutcome) {
        self.rounds.push(outcome);
    }

    pub(crate) fn push_evolution(&mut self, entry: PromptEvolutionEntry) {
        self.evolution.push(entry);
    }

    /// Accumulate spend. Negative or NaN deltas are ignored so the total
    /// never decreases.
    pub(crate) fn add_cost(&mut self, cents: f64) {
        self.total_cost_cents += cents.max(0.0);
    }

    pub(crate) fn note_degraded(&mut self, note: impl Into<String>) {
        if self.degradation_note.is_none() {
            self.degradation_note = Some(note.into());
        }
    }

    pub(crate) fn complete(&mut self, winner: String) {
        self.status = BattleStatus::Completed;
        self.winner = Some(winner);
        self.finished_at = Some(Utc::now());
    }

    /// Champion of the most recent round, if any round has run.
    pub fn current_champion(&self) -> Option<&str> {
        self.rounds.last().map(|r| r.champion())
    }

    pub fn is_finished(&self) -> bool {
        self.status != BattleStatus::Running
    }
}
