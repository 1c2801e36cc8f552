//! Stop-condition detection for prompt battles.
//!
//! The detector is pure: it inspects the accumulated round history and the
//! round budget, performs no I/O, and decides between continuing, unanimous
//! perfect consensus, and plateau. Budget exhaustion itself is not a
//! convergence outcome; the orchestrator simply stops scheduling rounds.

use crate::battle::records::RoundOutcome;

/// Thresholds for plateau detection. The defaults are deliberately fixed
/// constants rather than tuned per battle.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceConfig {
    /// Minimum score gain that still counts as meaningful improvement.
    pub epsilon: f64,
    /// How many trailing rounds the improvement is measured across.
    pub window: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.3,
            window: 2,
        }
    }
}

/// Verdict over the history so far.
#[derive(Debug, Clone, PartialEq)]
pub enum Convergence {
    /// No stop condition met; the orchestrator may run another round.
    Continuing,
    /// Every reviewer gave the current champion a perfect overall 10.
    ConsensusReached,
    /// Refinement has stalled; the reason is ready for display.
    Plateaued { reason: String },
}

#[derive(Debug, Default)]
pub struct ConvergenceDetector {
    config: ConvergenceConfig,
}

impl ConvergenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ConvergenceConfig) -> Self {
        Self { config }
    }

    /// Assess the history after a completed round.
    ///
    /// Consensus requires the latest round's champion to be the candidate
    /// the panel actually reviewed, with every review a perfect 10. Plateau
    /// requires at least two completed rounds, remaining budget, and an
    /// improvement within epsilon across the trailing window.
    pub fn assess(&self, rounds: &[RoundOutcome], budget: u32) -> Convergence {
        let Some(last) = rounds.last() else {
            return Convergence::Continuing;
        };

        if let RoundOutcome::Prompt(pr) = last
            && pr.champion_was_reviewed()
            && !pr.reviews.is_empty()
            && pr.reviews.iter().all(|r| r.is_perfect())
        {
            return Convergence::ConsensusReached;
        }

        // With the budget spent, stopping is the loop's job, not a plateau.
        if (rounds.len() as u32) >= budget {
            return Convergence::Continuing;
        }

        if rounds.len() >= 2 && rounds.len() >= self.config.window {
            let current = last.champion_score();
            let baseline = rounds[rounds.len() - self.config.window].champion_score();
            let improvement = current - baseline;
            if improvement <= self.config.epsilon {
                return Convergence::Plateaued {
                    reason: format!(
                        "champion score moved {improvement:+.1} over the last {} rounds \
                         (within epsilon {:.1}); settled at {current:.1}",
                        self.config.window, self.config.epsilon,
                    ),
                };
            }
        }

        Convergence::Continuing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::records::{
        ModelResponse, PeerReview, PromptCandidate, PromptRound, ReviewScores, Score,
    };

    fn review(overall: f64) -> PeerReview {
        PeerReview::new(
            "deepseek/deepseek-r1",
            "openai/gpt-4o-mini",
            ReviewScores::uniform(overall),
            "",
            vec![],
            0.0,
        )
    }

    fn prompt_round(
        n: u32,
        champion_avg: f64,
        challenger_won: bool,
        reviews: Vec<PeerReview>,
    ) -> RoundOutcome {
        let score = Score::from_axes(5.0, 5.0, 5.0, 5.0, "");
        let incumbent = PromptCandidate {
            author: "user".to_string(),
            text: "original".to_string(),
            score: score.clone(),
            review_average: if challenger_won { 0.0 } else { champion_avg },
        };
        let challenger = PromptCandidate {
            author: "openai/gpt-4o-mini".to_string(),
            text: format!("refinement {n}"),
            score,
            review_average: if challenger_won { champion_avg } else { 4.0 },
        };
        let champion = if challenger_won {
            "openai/gpt-4o-mini"
        } else {
            "user"
        };
        RoundOutcome::Prompt(PromptRound {
            round: n,
            incumbent,
            challenger,
            proposal: ModelResponse::fallback("openai/gpt-4o-mini", "proposal", 1, 0.0, 1),
            reviews,
            champion: champion.to_string(),
        })
    }

    #[test]
    fn empty_history_continues() {
        let detector = ConvergenceDetector::new();
        assert_eq!(detector.assess(&[], 5), Convergence::Continuing);
    }

    #[test]
    fn unanimous_perfect_reviews_reach_consensus() {
        let detector = ConvergenceDetector::new();
        let rounds = vec![prompt_round(1, 10.0, true, vec![review(10.0)])];
        assert_eq!(detector.assess(&rounds, 5), Convergence::ConsensusReached);
    }

    #[test]
    fn near_perfect_review_is_not_consensus() {
        let detector = ConvergenceDetector::new();
        let rounds = vec![prompt_round(1, 9.9, true, vec![review(9.9)])];
        assert_eq!(detector.assess(&rounds, 5), Convergence::Continuing);
    }

    #[test]
    fn consensus_needs_the_reviewed_candidate_to_hold_the_title() {
        let detector = ConvergenceDetector::new();
        // Challenger was reviewed at 10 but the incumbent kept the title.
        let rounds = vec![prompt_round(1, 7.0, false, vec![review(10.0)])];
        assert_eq!(detector.assess(&rounds, 5), Convergence::Continuing);
    }

    #[test]
    fn stalled_improvement_plateaus_with_reason() {
        let detector = ConvergenceDetector::new();
        let rounds = vec![
            prompt_round(1, 6.0, true, vec![review(6.0)]),
            prompt_round(2, 7.0, true, vec![review(7.0)]),
            prompt_round(3, 7.1, true, vec![review(7.1)]),
        ];
        // After round 2 the gain is 1.0, still improving.
        assert_eq!(detector.assess(&rounds[..2], 5), Convergence::Continuing);
        // After round 3 the gain is 0.1, inside epsilon.
        match detector.assess(&rounds, 5) {
            Convergence::Plateaued { reason } => {
                assert!(!reason.is_empty());
                assert!(reason.contains("7.1"));
            }
            other => panic!("expected plateau, got {other:?}"),
        }
    }

    #[test]
    fn single_round_never_plateaus() {
        let detector = ConvergenceDetector::new();
        let rounds = vec![prompt_round(1, 5.0, true, vec![review(5.0)])];
        assert_eq!(detector.assess(&rounds, 5), Convergence::Continuing);
    }

    #[test]
    fn exhausted_budget_is_not_a_plateau() {
        let detector = ConvergenceDetector::new();
        let rounds = vec![
            prompt_round(1, 7.0, true, vec![review(7.0)]),
            prompt_round(2, 7.1, true, vec![review(7.1)]),
        ];
        assert_eq!(detector.assess(&rounds, 2), Convergence::Continuing);
    }

    #[test]
    fn consensus_on_the_final_budgeted_round_still_counts() {
        let detector = ConvergenceDetector::new();
        let rounds = vec![
            prompt_round(1, 7.0, true, vec![review(7.0)]),
            prompt_round(2, 10.0, true, vec![review(10.0)]),
        ];
        assert_eq!(detector.assess(&rounds, 2), Convergence::ConsensusReached);
    }
}
