//! Convenience re-exports for common `spar-rs` types.
//!
//! Meant to be glob-imported when running battles:
//!
//! ```ignore
//! use spar_rs::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of battle programs:
//! the [`HttpCompletionClient`], [`BattleConfig`] + enums, the
//! [`BattleOrchestrator`], progress sinks, the catalog, and the record
//! store. Specialized types (retry internals, scoring heuristics, the
//! review panel) are intentionally excluded; import those from their
//! modules directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    Completion, CompletionClient, CompletionFuture, CompletionRequest, HttpCompletionClient,
    format_cents, json_schema_for,
};

// ── Battle engine ───────────────────────────────────────────────────
pub use crate::battle::{
    Battle, BattleConfig, BattleMode, BattleOrchestrator, BattlePhase, BattleRecord, BattleStatus,
    BattleStore, BattleType, ChannelSink, CompositeSink, Convergence, ConvergenceConfig,
    ConvergenceDetector, FnSink, JsonFileStore, LoggingSink, ModelResponse, ModelStatus, NoopSink,
    PeerReview, ProgressSink, ProgressUpdate, PromptEvolutionEntry, RoundOutcome, Score,
};

// ── Catalog ─────────────────────────────────────────────────────────
pub use crate::catalog::selector::{ModelSelector, Selection};
pub use crate::catalog::{Model, ModelCatalog};

// ── Retry and cost ──────────────────────────────────────────────────
pub use crate::api::cost::CostTracker;
pub use crate::api::retry::RetryConfig;
