//! The top-level battle coordinator.
//!
//! [`BattleOrchestrator::run`] is the single entry point: it validates the
//! configuration, resolves the two contestants (auto-selection or manual),
//! then drives rounds until the budget is spent or, for prompt battles, the
//! convergence detector calls a stop. Progress is published after every
//! phase transition through a non-blocking [`ProgressSink`].
//!
//! Only configuration errors surface as `Err`; once a battle starts it
//! always finishes `completed`, with provider outages absorbed into flagged
//! fallback content and a degradation note.

use crate::CompletionClient;
use crate::api::cost::CostTracker;
use crate::api::retry::RetryConfig;
use crate::battle::config::{BattleConfig, BattleMode, BattleType, resolve_pair};
use crate::battle::convergence::{Convergence, ConvergenceConfig, ConvergenceDetector};
use crate::battle::events::{
    BattlePhase, ModelStatus, NoopSink, ProgressCursor, ProgressSink, ProgressUpdate,
};
use crate::battle::invoker::{DEFAULT_CALL_TIMEOUT_SECS, RetryingInvoker};
use crate::battle::records::{
    Battle, PeerReview, PromptCandidate, PromptEvolutionEntry, PromptRound, RoundOutcome,
    USER_AUTHOR, round1,
};
use crate::battle::review::PeerReviewPanel;
use crate::battle::round::RoundExecutor;
use crate::battle::scoring::ResponseScorer;
use crate::catalog::selector::ModelSelector;
use crate::catalog::{Model, ModelCatalog};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

// ── Helpers ────────────────────────────────────────────────────────

/// Instruction wrapped around the current champion prompt for the proposer.
fn refinement_instruction(current: &str) -> String {
    format!(
        "Rewrite the prompt below so a capable assistant produces a materially better \
         answer. Keep the original intent, sharpen the task, add missing constraints, \
         and cut filler. Reply with only the rewritten prompt text, no preamble and no \
         commentary.\n\nPrompt to rewrite:\n{current}"
    )
}

/// Which model drafts the next refinement. With a model holding the title
/// the other one proposes; while the user's original still holds, the two
/// models alternate by round so both get a turn.
fn next_proposer<'m>(models: &'m [Model; 2], champion_author: &str, round_no: u32) -> &'m Model {
    if champion_author == models[0].id {
        &models[1]
    } else if champion_author == models[1].id {
        &models[0]
    } else {
        &models[((round_no - 1) % 2) as usize]
    }
}

fn average_overall(reviews: &[PeerReview]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    round1(reviews.iter().map(|r| r.overall).sum::<f64>() / reviews.len() as f64)
}

/// Position in the battle's model list; authors outside it (the user) rank
/// last, so on an exact tie a listed model takes the title from the user and
/// the earlier-listed model takes it from the later one.
fn author_rank(author: &str, model_order: &[String; 2]) -> usize {
    model_order
        .iter()
        .position(|id| id == author)
        .unwrap_or(model_order.len())
}

fn challenger_beats(
    challenger: &PromptCandidate,
    incumbent: &PromptCandidate,
    model_order: &[String; 2],
) -> bool {
    if challenger.review_average != incumbent.review_average {
        return challenger.review_average > incumbent.review_average;
    }
    author_rank(&challenger.author, model_order) < author_rank(&incumbent.author, model_order)
}

/// Distinct panel suggestions, in review order, capped for display.
fn improvement_tags(reviews: &[PeerReview]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for review in reviews {
        for suggestion in &review.suggested_improvements {
            let tag = suggestion.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags.truncate(6);
    tags
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Coordinates one battle from config to finalized [`Battle`].
///
/// Borrows its collaborators by reference, so bind them to `let` bindings
/// that outlive the `.run()` call:
///
/// ```ignore
/// let client = HttpCompletionClient::from_env()?;
/// let catalog = ModelCatalog::standard();
/// let (sink, mut rx) = ChannelSink::pair();
///
/// let battle = BattleOrchestrator::new(&client, &catalog)
///     .with_sink(&sink)
///     .run(BattleConfig::default().with_prompt("Explain photosynthesis simply"))
///     .await?;
/// println!("winner: {:?}", battle.winner);
/// ```
pub struct BattleOrchestrator<'a> {
    client: &'a dyn CompletionClient,
    catalog: &'a ModelCatalog,
    sink: &'a dyn ProgressSink,
    retry: RetryConfig,
    timeout: Duration,
    convergence: ConvergenceConfig,
}

impl<'a> BattleOrchestrator<'a> {
    pub fn new(client: &'a dyn CompletionClient, catalog: &'a ModelCatalog) -> Self {
        Self {
            client,
            catalog,
            sink: &NoopSink,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            convergence: ConvergenceConfig::default(),
        }
    }

    /// Attach a progress sink. Defaults to discarding updates.
    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Per-invocation timeout; exceeding it is a transient failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    /// Run one battle to completion.
    ///
    /// Returns `Err` only for configuration problems (unresolvable models,
    /// empty prompt for a response battle, bad generation parameters),
    /// detected before any remote call; no battle record exists in that
    /// case. Everything after validation degrades instead of failing.
    pub async fn run(&self, config: BattleConfig) -> Result<Battle, String> {
        config.validate(self.catalog)?;
        let (models, rationale) = self.resolve_contestants(&config)?;

        let mut battle = Battle::start(
            config,
            [models[0].id.clone(), models[1].id.clone()],
            rationale,
        );
        info!(
            "battle {}: {} vs {} ({:?}, {} round budget)",
            battle.id, models[0].id, models[1].id, battle.config.battle_type, battle.config.rounds,
        );

        let mut cursor = ProgressCursor::new();
        let mut statuses: BTreeMap<String, ModelStatus> = models
            .iter()
            .map(|m| (m.id.clone(), ModelStatus::Pending))
            .collect();
        let selection_message = match &battle.selection_rationale {
            Some(rationale) => format!("selected: {rationale}"),
            None => format!("manual pair: {} vs {}", models[0].id, models[1].id),
        };
        self.emit(
            &battle,
            &mut cursor,
            BattlePhase::Selection,
            0,
            5,
            selection_message,
            &statuses,
        );

        match battle.config.battle_type {
            BattleType::Response => {
                self.drive_response_rounds(&mut battle, &models, &mut cursor, &mut statuses)
                    .await;
            }
            BattleType::Prompt => {
                self.drive_prompt_rounds(&mut battle, &models, &mut cursor, &mut statuses)
                    .await;
            }
        }
        Ok(battle)
    }

    fn resolve_contestants(
        &self,
        config: &BattleConfig,
    ) -> Result<([Model; 2], Option<String>), String> {
        match config.mode {
            BattleMode::Auto => {
                let selection = ModelSelector::new(self.catalog).select(
                    &config.prompt,
                    &config.category,
                    config.battle_type,
                );
                let models = resolve_pair(self.catalog, &selection.pair)?;
                debug!("auto-selected {} and {}", models[0].id, models[1].id);
                Ok((models, Some(selection.rationale)))
            }
            BattleMode::Manual => {
                let ids: [String; 2] = match config.models.as_slice() {
                    [a, b] => [a.clone(), b.clone()],
                    _ => return Err("manual mode requires exactly two model ids".to_string()),
                };
                Ok((resolve_pair(self.catalog, &ids)?, None))
            }
        }
    }

    async fn drive_response_rounds(
        &self,
        battle: &mut Battle,
        models: &[Model; 2],
        cursor: &mut ProgressCursor,
        statuses: &mut BTreeMap<String, ModelStatus>,
    ) {
        let config = battle.config.clone();
        let invoker = self.invoker();
        let scorer = ResponseScorer::new();
        let executor = RoundExecutor::new(&invoker, &scorer);
        let budget = config.rounds;
        let mut costs = CostTracker::new();

        for round_no in 1..=budget {
            for status in statuses.values_mut() {
                *status = ModelStatus::Running;
            }
            self.emit(
                battle,
                cursor,
                BattlePhase::Round,
                round_no,
                5 + 90 * (round_no - 1) / budget,
                format!("round {round_no}: invoking both contestants"),
                statuses,
            );

            let outcome = executor
                .run_round(round_no, models, &config.prompt, &config)
                .await;
            for entry in &outcome.entries {
                let status = if entry.response.fallback {
                    ModelStatus::Failed
                } else {
                    ModelStatus::Completed
                };
                statuses.insert(entry.response.model.clone(), status);
                costs.record(entry.response.tokens, entry.response.cost_cents);
                battle.add_cost(entry.response.cost_cents);
            }
            if outcome.entries.iter().any(|e| e.response.fallback) {
                battle.note_degraded("one or more responses used locally generated fallback text");
            }

            let message = format!("round {round_no} scored: {} leads", outcome.champion);
            battle.push_round(RoundOutcome::Response(outcome));
            self.emit(
                battle,
                cursor,
                BattlePhase::Round,
                round_no,
                5 + 90 * round_no / budget,
                message,
                statuses,
            );
        }

        let winner = battle
            .current_champion()
            .map(str::to_string)
            .unwrap_or_else(|| models[0].id.clone());
        battle.complete(winner.clone());
        info!("battle {} finished, {}", battle.id, costs.summary());
        self.emit(
            battle,
            cursor,
            BattlePhase::Finished,
            budget,
            100,
            format!("battle completed: {winner} wins"),
            statuses,
        );
    }

    async fn drive_prompt_rounds(
        &self,
        battle: &mut Battle,
        models: &[Model; 2],
        cursor: &mut ProgressCursor,
        statuses: &mut BTreeMap<String, ModelStatus>,
    ) {
        let config = battle.config.clone();
        let invoker = self.invoker();
        let scorer = ResponseScorer::new();
        let panel = PeerReviewPanel::new(&invoker);
        let detector = ConvergenceDetector::with_config(self.convergence);
        let budget = config.rounds;
        let mut costs = CostTracker::new();

        battle.push_evolution(PromptEvolutionEntry::original(&config.prompt));
        let mut champion = PromptCandidate {
            author: USER_AUTHOR.to_string(),
            text: config.prompt.clone(),
            score: scorer.score(&config.prompt, &config.prompt, &config.category),
            review_average: 0.0,
        };

        for round_no in 1..=budget {
            let proposer = next_proposer(models, &champion.author, round_no);
            statuses.insert(proposer.id.clone(), ModelStatus::Running);
            self.emit(
                battle,
                cursor,
                BattlePhase::Round,
                round_no,
                5 + 90 * (round_no - 1) / budget,
                format!("round {round_no}: {} drafting a refinement", proposer.id),
                statuses,
            );

            let instruction = refinement_instruction(&champion.text);
            let proposal = invoker
                .invoke(proposer, &instruction, config.max_tokens, config.temperature)
                .await;
            statuses.insert(
                proposer.id.clone(),
                if proposal.fallback {
                    ModelStatus::Failed
                } else {
                    ModelStatus::Completed
                },
            );
            costs.record(proposal.tokens, proposal.cost_cents);
            battle.add_cost(proposal.cost_cents);

            let mut challenger = PromptCandidate {
                author: proposer.id.clone(),
                text: proposal.text.trim().to_string(),
                score: scorer.score(&proposal.text, &config.prompt, &config.category),
                review_average: 0.0,
            };

            for model in models {
                if model.id != challenger.author {
                    statuses.insert(model.id.clone(), ModelStatus::Running);
                }
            }
            self.emit(
                battle,
                cursor,
                BattlePhase::Review,
                round_no,
                (5 + 90 * round_no / budget).saturating_sub(3),
                format!("round {round_no}: panel reviewing {}'s candidate", challenger.author),
                statuses,
            );
            let reviews = panel
                .review(&challenger.text, &config.prompt, &challenger.author, models)
                .await;
            for review in &reviews {
                // Review token counts stay inside the panel; the tracker
                // still counts the call and its cost.
                costs.record(0, review.cost_cents);
                battle.add_cost(review.cost_cents);
                statuses.insert(
                    review.reviewer.clone(),
                    if review.fallback {
                        ModelStatus::Failed
                    } else {
                        ModelStatus::Completed
                    },
                );
            }
            challenger.review_average = average_overall(&reviews);

            let challenger_wins = challenger_beats(&challenger, &champion, &battle.models);
            let round_champion = if challenger_wins {
                challenger.clone()
            } else {
                champion.clone()
            };
            let outcome = RoundOutcome::Prompt(PromptRound {
                round: round_no,
                incumbent: champion.clone(),
                challenger,
                proposal,
                reviews,
                champion: round_champion.author.clone(),
            });
            if outcome.degraded() {
                battle.note_degraded("one or more prompt-battle calls used fallback content");
            }
            let improvements = if challenger_wins {
                improvement_tags(outcome.reviews())
            } else {
                Vec::new()
            };
            battle.push_round(outcome);
            champion = round_champion;
            battle.push_evolution(PromptEvolutionEntry {
                round: round_no,
                prompt: champion.text.clone(),
                author: champion.author.clone(),
                improvements,
                score: champion.review_average,
            });

            match detector.assess(&battle.rounds, budget) {
                Convergence::Continuing => {
                    self.emit(
                        battle,
                        cursor,
                        BattlePhase::Convergence,
                        round_no,
                        5 + 90 * round_no / budget,
                        format!(
                            "round {round_no}: {} holds the title at {:.1}",
                            champion.author, champion.review_average,
                        ),
                        statuses,
                    );
                }
                Convergence::ConsensusReached => {
                    battle.global_consensus = true;
                    self.emit(
                        battle,
                        cursor,
                        BattlePhase::Convergence,
                        round_no,
                        5 + 90 * round_no / budget,
                        format!("round {round_no}: unanimous perfect reviews, consensus reached"),
                        statuses,
                    );
                    break;
                }
                Convergence::Plateaued { reason } => {
                    battle.plateau_reason = Some(reason.clone());
                    self.emit(
                        battle,
                        cursor,
                        BattlePhase::Convergence,
                        round_no,
                        5 + 90 * round_no / budget,
                        format!("round {round_no}: plateau, {reason}"),
                        statuses,
                    );
                    break;
                }
            }
        }

        battle.final_prompt = Some(champion.text.clone());
        battle.complete(champion.author.clone());
        info!("battle {} finished, {}", battle.id, costs.summary());
        self.emit(
            battle,
            cursor,
            BattlePhase::Finished,
            battle.rounds.len() as u32,
            100,
            format!("battle completed: champion prompt by {}", champion.author),
            statuses,
        );
    }

    fn invoker(&self) -> RetryingInvoker<'_> {
        RetryingInvoker::new(self.client)
            .with_retry(self.retry.clone())
            .with_timeout(self.timeout)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        battle: &Battle,
        cursor: &mut ProgressCursor,
        phase: BattlePhase,
        round: u32,
        raw_percent: u32,
        message: String,
        statuses: &BTreeMap<String, ModelStatus>,
    ) {
        let update = ProgressUpdate {
            battle_id: battle.id,
            phase,
            round,
            total_rounds: battle.config.rounds,
            percent: cursor.advance(raw_percent.min(100) as u8),
            message,
            model_status: statuses.clone(),
        };
        debug!("progress {}%: {}", update.percent, update.message);
        self.sink.publish(&update);
    }
}
