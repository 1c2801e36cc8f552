//! Battle configuration: type, mode, prompt, contestants and generation
//! parameters, plus the validation that runs before any remote call.

use crate::catalog::{Model, ModelCatalog};
use crate::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};

/// Round budget applied when the caller doesn't set one.
pub const DEFAULT_RESPONSE_ROUNDS: u32 = 1;
pub const DEFAULT_PROMPT_ROUNDS: u32 = 5;

/// What the contestants compete on.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BattleType {
    /// Both models answer the same prompt; best answer wins.
    Response,
    /// Models take turns refining the prompt itself; best refinement wins.
    Prompt,
}

/// How the contestants are chosen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BattleMode {
    /// The selector picks a contrast pair from the catalog.
    Auto,
    /// The caller supplies exactly two model ids.
    Manual,
}

/// Immutable configuration for one battle, created once from user input.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BattleConfig {
    pub battle_type: BattleType,
    pub mode: BattleMode,
    pub prompt: String,
    /// Open category tag (general, creative, technical, math, ...).
    /// Unrecognized values are accepted and just get default behavior.
    pub category: String,
    /// Manual mode: exactly two distinct model ids. Ignored in auto mode.
    pub models: Vec<String>,
    /// Round budget. Response battles run exactly this many rounds; prompt
    /// battles may stop earlier on consensus or plateau.
    pub rounds: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            battle_type: BattleType::Response,
            mode: BattleMode::Auto,
            prompt: String::new(),
            category: "general".to_string(),
            models: Vec::new(),
            rounds: DEFAULT_RESPONSE_ROUNDS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl BattleConfig {
    /// Create a config with the per-type default round budget.
    pub fn new(battle_type: BattleType, mode: BattleMode) -> Self {
        let rounds = match battle_type {
            BattleType::Response => DEFAULT_RESPONSE_ROUNDS,
            BattleType::Prompt => DEFAULT_PROMPT_ROUNDS,
        };
        Self {
            battle_type,
            mode,
            rounds,
            ..Default::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the manual-mode pair.
    pub fn with_models(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.models = vec![first.into(), second.into()];
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Reject configurations that could not produce a battle. Runs before
    /// any remote call; a failure here is the only way a battle errors.
    pub fn validate(&self, catalog: &ModelCatalog) -> Result<(), String> {
        if self.battle_type == BattleType::Response && self.prompt.trim().is_empty() {
            return Err("response battles require a non-empty prompt".to_string());
        }
        if self.rounds == 0 {
            return Err("round budget must be at least 1".to_string());
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be positive".to_string());
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} outside supported range 0.0..=2.0",
                self.temperature
            ));
        }
        match self.mode {
            BattleMode::Manual => {
                if self.models.len() != 2 {
                    return Err(format!(
                        "manual mode requires exactly two model ids, got {}",
                        self.models.len()
                    ));
                }
                if self.models[0] == self.models[1] {
                    return Err("manual mode requires two distinct model ids".to_string());
                }
                for id in &self.models {
                    if !catalog.is_available(id) {
                        return Err(format!("model '{id}' is not resolvable in the catalog"));
                    }
                }
            }
            BattleMode::Auto => {
                if catalog.available().count() < 2 {
                    return Err("catalog resolves fewer than two available models".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Resolve a validated id pair to owned catalog entries. Auto-selected pairs
/// go through this too, so a selector fallback that names ids a custom
/// catalog doesn't carry still surfaces as a configuration error.
pub(crate) fn resolve_pair(
    catalog: &ModelCatalog,
    ids: &[String; 2],
) -> Result<[Model; 2], String> {
    if ids[0] == ids[1] {
        return Err("a battle needs two distinct models".to_string());
    }
    let resolve_one = |id: &String| match catalog.get(id) {
        Some(m) if m.available => Ok(m.clone()),
        Some(_) => Err(format!("model '{id}' is currently unavailable")),
        None => Err(format!("model '{id}' is not resolvable in the catalog")),
    };
    Ok([resolve_one(&ids[0])?, resolve_one(&ids[1])?])
}
