//! Battle records on disk.
//!
//! A finalized [`Battle`](crate::battle::records::Battle) maps to a
//! [`BattleRecord`] wire document, keyed by the battle id and written as one
//! pretty-printed JSON file per battle. [`BattleStore`] is the persistence
//! seam; [`JsonFileStore`] is the shipped implementation the CLI uses.

use crate::battle::config::BattleConfig;
use crate::battle::records::{Battle, BattleStatus, PromptEvolutionEntry, RoundOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Schema version stamped into every document, for future migrations.
pub const RECORD_VERSION: u32 = 1;

// ── BattleRecord ───────────────────────────────────────────────────

/// The persisted form of one battle, complete enough to replay the verdict
/// without the process that produced it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BattleRecord {
    pub version: u32,
    /// Battle id, also the document key on disk.
    pub id: Uuid,
    pub status: BattleStatus,
    pub config: BattleConfig,
    /// Resolved contestants; empty for configs rejected before resolution.
    pub models: Vec<String>,
    pub selection_rationale: Option<String>,
    pub winner: Option<String>,
    pub final_prompt: Option<String>,
    pub total_cost_cents: f64,
    pub rounds: Vec<RoundOutcome>,
    pub evolution: Vec<PromptEvolutionEntry>,
    pub global_consensus: bool,
    pub plateau_reason: Option<String>,
    pub degradation_note: Option<String>,
    /// Present only when the configuration was rejected and no battle ran.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BattleRecord {
    /// Map a finalized battle into its wire form.
    pub fn from_battle(battle: &Battle) -> Self {
        Self {
            version: RECORD_VERSION,
            id: battle.id,
            status: battle.status,
            config: battle.config.clone(),
            models: battle.models.to_vec(),
            selection_rationale: battle.selection_rationale.clone(),
            winner: battle.winner.clone(),
            final_prompt: battle.final_prompt.clone(),
            total_cost_cents: battle.total_cost_cents,
            rounds: battle.rounds.clone(),
            evolution: battle.evolution.clone(),
            global_consensus: battle.global_consensus,
            plateau_reason: battle.plateau_reason.clone(),
            degradation_note: battle.degradation_note.clone(),
            error: None,
            started_at: battle.started_at,
            finished_at: battle.finished_at,
        }
    }

    /// Record for a configuration rejected before any battle existed, for
    /// callers that persist every attempt. Status is `failed` and the error
    /// carries the rejection reason.
    pub fn rejected(config: BattleConfig, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: RECORD_VERSION,
            id: Uuid::new_v4(),
            status: BattleStatus::Failed,
            models: config.models.clone(),
            config,
            selection_rationale: None,
            winner: None,
            final_prompt: None,
            total_cost_cents: 0.0,
            rounds: Vec::new(),
            evolution: Vec::new(),
            global_consensus: false,
            plateau_reason: None,
            degradation_note: None,
            error: Some(reason.into()),
            started_at: now,
            finished_at: Some(now),
        }
    }
}

// ── BattleStore ────────────────────────────────────────────────────

/// Persistence seam for battle records.
pub trait BattleStore {
    /// Persist one record, returning where it landed.
    fn save(&self, record: &BattleRecord) -> Result<PathBuf, String>;
    /// Load a record by battle id. `None` if no such battle was stored.
    fn load(&self, id: Uuid) -> Result<Option<BattleRecord>, String>;
    /// All readable records, unordered. Malformed files are skipped.
    fn list(&self) -> Result<Vec<BattleRecord>, String>;
}

/// One `battle-{id}.json` document per battle in a flat directory.
pub struct JsonFileStore {
    records_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store, ensuring the records directory exists.
    pub fn new(records_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let records_dir = records_dir.into();
        std::fs::create_dir_all(&records_dir)?;
        Ok(Self { records_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.records_dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.records_dir.join(format!("battle-{id}.json"))
    }
}

impl BattleStore for JsonFileStore {
    /// Atomic write: serialize to a temp file, then rename into place.
    fn save(&self, record: &BattleRecord) -> Result<PathBuf, String> {
        let final_path = self.record_path(record.id);
        let tmp_path = self.records_dir.join(format!(".battle-{}.json.tmp", record.id));

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| format!("Failed to serialize battle record: {e}"))?;
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write temp battle record: {e}"))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| format!("Failed to rename battle record: {e}"))?;

        Ok(final_path)
    }

    fn load(&self, id: Uuid) -> Result<Option<BattleRecord>, String> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read battle record: {e}"))?;
        let record: BattleRecord = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse battle record: {e}"))?;
        Ok(Some(record))
    }

    fn list(&self) -> Result<Vec<BattleRecord>, String> {
        let entries = std::fs::read_dir(&self.records_dir)
            .map_err(|e| format!("Failed to read records dir: {e}"))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {e}"))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("battle-") || !name.ends_with(".json") {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(json) => match serde_json::from_str::<BattleRecord>(&json) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(
                            "Skipping malformed battle record at {}: {e}",
                            entry.path().display()
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        "Skipping unreadable battle record at {}: {e}",
                        entry.path().display()
                    );
                }
            }
        }
        Ok(records)
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::config::{BattleMode, BattleType};
    use crate::battle::records::{
        ModelResponse, PeerReview, PromptCandidate, PromptRound, ResponseRound, ReviewScores,
        Score, ScoredResponse,
    };

    fn finished_battle() -> Battle {
        let config = BattleConfig::new(BattleType::Response, BattleMode::Manual)
            .with_prompt("Explain photosynthesis simply")
            .with_models("a/one", "a/two");
        let mut battle = Battle::start(
            config,
            ["a/one".to_string(), "a/two".to_string()],
            Some("contrast pair".to_string()),
        );
        let entry = |model: &str| ScoredResponse {
            response: ModelResponse::fallback(model, "placeholder", 12, 0.01, 40),
            score: Score::from_axes(6.0, 7.0, 8.0, 5.0, "fixture"),
        };
        battle.push_round(RoundOutcome::Response(ResponseRound {
            round: 1,
            entries: [entry("a/one"), entry("a/two")],
            champion: "a/one".to_string(),
        }));
        battle.add_cost(0.02);
        battle.note_degraded("fixture degradation");
        battle.complete("a/one".to_string());
        battle
    }

    fn prompt_battle() -> Battle {
        let config = BattleConfig::new(BattleType::Prompt, BattleMode::Manual)
            .with_prompt("write a poem")
            .with_models("a/one", "a/two");
        let mut battle = Battle::start(
            config,
            ["a/one".to_string(), "a/two".to_string()],
            None,
        );
        let candidate = |author: &str, avg: f64| PromptCandidate {
            author: author.to_string(),
            text: format!("refined by {author}"),
            score: Score::from_axes(5.0, 5.0, 5.0, 5.0, ""),
            review_average: avg,
        };
        battle.push_evolution(PromptEvolutionEntry::original("write a poem"));
        battle.push_round(RoundOutcome::Prompt(PromptRound {
            round: 1,
            incumbent: candidate("user", 0.0),
            challenger: candidate("a/two", 8.2),
            proposal: ModelResponse::fallback("a/two", "refined by a/two", 8, 0.01, 30),
            reviews: vec![PeerReview::new(
                "a/one",
                "a/two",
                ReviewScores::uniform(8.2),
                "solid",
                vec!["tighten the ask".to_string()],
                0.03,
            )],
            champion: "a/two".to_string(),
        }));
        battle.complete("a/two".to_string());
        battle
    }

    #[test]
    fn record_roundtrips_through_serde() {
        let record = BattleRecord::from_battle(&finished_battle());
        let json = serde_json::to_string_pretty(&record).unwrap();
        let parsed: BattleRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.status, BattleStatus::Completed);
        assert_eq!(parsed.models, vec!["a/one", "a/two"]);
        assert_eq!(parsed.winner.as_deref(), Some("a/one"));
        assert_eq!(parsed.rounds.len(), 1);
        assert_eq!(parsed.version, RECORD_VERSION);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        let record = BattleRecord::from_battle(&prompt_battle());
        let path = store.save(&record).unwrap();
        assert!(path.exists());

        let loaded = store.load(record.id).unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.rounds.len(), 1);
        assert_eq!(loaded.evolution.len(), 1);
        assert_eq!(loaded.winner.as_deref(), Some("a/two"));
        let RoundOutcome::Prompt(round) = &loaded.rounds[0] else {
            panic!("expected a prompt round");
        };
        assert_eq!(round.reviews[0].overall, 8.2);
    }

    #[test]
    fn missing_record_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert!(store.load(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_skips_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        store
            .save(&BattleRecord::from_battle(&finished_battle()))
            .unwrap();
        store
            .save(&BattleRecord::from_battle(&prompt_battle()))
            .unwrap();
        std::fs::write(dir.path().join("battle-garbage.json"), "not json").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), "ignored").unwrap();

        let records = store.list().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn atomic_write_leaves_no_temp_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        let record = BattleRecord::from_battle(&finished_battle());
        store.save(&record).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejected_config_maps_to_failed_record() {
        let config = BattleConfig::new(BattleType::Response, BattleMode::Manual)
            .with_models("a/one", "a/one");
        let record = BattleRecord::rejected(config, "two distinct models required");

        assert_eq!(record.status, BattleStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("two distinct models required"));
        assert!(record.rounds.is_empty());
        assert!(record.winner.is_none());
        assert_eq!(record.total_cost_cents, 0.0);
        assert!(record.finished_at.is_some());
        assert_eq!(record.models, vec!["a/one", "a/one"]);
    }
}
