//! Integration tests for the battle engine's public surface.
//!
//! These tests drive complete battles through the prelude API over a
//! scripted completion client and round-trip the finished records through
//! the JSON-file store.

use spar_rs::prelude::*;

const PERFECT_SHEET: &str = r#"{"clarity": 10, "specificity": 10, "completeness": 10,
    "actionability": 10, "conciseness": 10, "context_coverage": 10,
    "non_redundancy": 10, "intent_tailoring": 10,
    "critique": "cannot improve on this", "suggested_improvements": []}"#;

/// Stand-in for the completion proxy: review prompts get a perfect sheet,
/// refinement prompts get a rewritten prompt, everything else gets a
/// keyword-rich answer.
struct StubProxy;

impl CompletionClient for StubProxy {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            let text = if request.prompt.starts_with("You are judging") {
                PERFECT_SHEET.to_string()
            } else if request.prompt.starts_with("Rewrite the prompt") {
                "Explain photosynthesis to a curious twelve-year-old in three short paragraphs."
                    .to_string()
            } else {
                format!(
                    "To explain photosynthesis simply: plants turn light into food. \
                     Consider a leaf as a solar panel, for example, because it captures \
                     sunlight. The practical result is sugar and oxygen. ({})",
                    request.model
                )
            };
            Ok(Completion {
                text,
                tokens: 60,
                cost_cents: 0.3,
                latency_ms: 12,
            })
        })
    }
}

// ── Response battles ─────────────────────────────────────────────────

#[tokio::test]
async fn response_battle_end_to_end_over_the_public_api() {
    let client = StubProxy;
    let catalog = ModelCatalog::standard();
    let (sink, mut rx) = ChannelSink::pair();
    let collector = tokio::spawn(async move {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    });

    let config = BattleConfig::new(BattleType::Response, BattleMode::Auto)
        .with_prompt("Explain photosynthesis simply")
        .with_category("general");
    let orchestrator = BattleOrchestrator::new(&client, &catalog).with_sink(&sink);
    let battle = orchestrator.run(config).await.unwrap();

    drop(orchestrator);
    drop(sink);
    let updates = collector.await.unwrap();

    assert_eq!(battle.status, BattleStatus::Completed);
    assert_eq!(battle.rounds.len(), 1);
    assert!(battle.selection_rationale.is_some());
    let RoundOutcome::Response(round) = &battle.rounds[0] else {
        panic!("expected a response round");
    };
    assert!(!round.entries[0].response.fallback);
    assert!(!round.entries[1].response.fallback);
    assert_eq!(battle.winner.as_deref(), Some(round.champion.as_str()));
    assert!(battle.total_cost_cents > 0.5);

    // Progress arrived in order and finished the bar.
    let percents: Vec<u8> = updates.iter().map(|u| u.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(updates.last().unwrap().percent, 100);
    assert_eq!(updates.last().unwrap().phase, BattlePhase::Finished);
}

// ── Prompt battles ───────────────────────────────────────────────────

#[tokio::test]
async fn prompt_battle_reaches_consensus_over_the_public_api() {
    let client = StubProxy;
    let catalog = ModelCatalog::standard();

    let config = BattleConfig::new(BattleType::Prompt, BattleMode::Manual)
        .with_prompt("Explain photosynthesis simply")
        .with_models("openai/gpt-4o-mini", "anthropic/claude-3.5-haiku")
        .with_rounds(5);
    let orchestrator = BattleOrchestrator::new(&client, &catalog);
    let battle = orchestrator.run(config).await.unwrap();

    // Perfect reviews stop the battle after the first round.
    assert!(battle.global_consensus);
    assert!(battle.plateau_reason.is_none());
    assert_eq!(battle.rounds.len(), 1);
    assert_eq!(battle.winner.as_deref(), Some("openai/gpt-4o-mini"));
    assert_eq!(
        battle.final_prompt.as_deref(),
        Some("Explain photosynthesis to a curious twelve-year-old in three short paragraphs.")
    );
    assert_eq!(battle.evolution.len(), 2);
    assert_eq!(battle.evolution[0].author, "user");
}

// ── Record store ─────────────────────────────────────────────────────

#[tokio::test]
async fn finished_battle_round_trips_through_the_store() {
    let client = StubProxy;
    let catalog = ModelCatalog::standard();
    let config = BattleConfig::new(BattleType::Response, BattleMode::Auto)
        .with_prompt("Explain photosynthesis simply");
    let battle = BattleOrchestrator::new(&client, &catalog)
        .run(config)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path()).unwrap();
    store.save(&BattleRecord::from_battle(&battle)).unwrap();

    let loaded = store.load(battle.id).unwrap().unwrap();
    assert_eq!(loaded.id, battle.id);
    assert_eq!(loaded.status, BattleStatus::Completed);
    assert_eq!(loaded.winner, battle.winner);
    assert_eq!(loaded.rounds.len(), 1);
}

#[tokio::test]
async fn rejected_config_persists_a_failed_record() {
    let client = StubProxy;
    let catalog = ModelCatalog::standard();
    let config = BattleConfig::new(BattleType::Response, BattleMode::Manual)
        .with_prompt("Explain photosynthesis simply")
        .with_models("openai/gpt-4o-mini", "openai/gpt-4o-mini");

    let err = BattleOrchestrator::new(&client, &catalog)
        .run(config.clone())
        .await
        .unwrap_err();

    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path()).unwrap();
    store.save(&BattleRecord::rejected(config, err)).unwrap();

    let records = store.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, BattleStatus::Failed);
    assert!(records[0].error.is_some());
}
