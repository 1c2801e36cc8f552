//! One round of a response battle.
//!
//! Both contestants are invoked concurrently with the same prompt, each
//! result is scored locally, and a champion is declared. A round never
//! fails: provider outages surface as flagged fallback responses, which are
//! scored like any other text.

use crate::battle::config::BattleConfig;
use crate::battle::invoker::RetryingInvoker;
use crate::battle::records::{ResponseRound, ScoredResponse};
use crate::battle::scoring::ResponseScorer;
use crate::catalog::Model;
use tracing::debug;

pub struct RoundExecutor<'a> {
    invoker: &'a RetryingInvoker<'a>,
    scorer: &'a ResponseScorer,
}

impl<'a> RoundExecutor<'a> {
    pub fn new(invoker: &'a RetryingInvoker<'a>, scorer: &'a ResponseScorer) -> Self {
        Self { invoker, scorer }
    }

    /// Run one round over `prompt`. Entry order mirrors `models` order, and
    /// an exact overall tie goes to the first-listed model.
    pub async fn run_round(
        &self,
        round: u32,
        models: &[Model; 2],
        prompt: &str,
        config: &BattleConfig,
    ) -> ResponseRound {
        let (first, second) = futures::future::join(
            self.execute_one(&models[0], prompt, config),
            self.execute_one(&models[1], prompt, config),
        )
        .await;

        let champion = if second.score.overall > first.score.overall {
            second.response.model.clone()
        } else {
            first.response.model.clone()
        };
        debug!(
            "round {round}: {} {:.1} vs {} {:.1}; champion {champion}",
            first.response.model, first.score.overall, second.response.model, second.score.overall,
        );

        ResponseRound {
            round,
            entries: [first, second],
            champion,
        }
    }

    async fn execute_one(
        &self,
        model: &Model,
        prompt: &str,
        config: &BattleConfig,
    ) -> ScoredResponse {
        let response = self
            .invoker
            .invoke(model, prompt, config.max_tokens, config.temperature)
            .await;
        let score = self.scorer.score(&response.text, prompt, &config.category);
        ScoredResponse { response, score }
    }
}
