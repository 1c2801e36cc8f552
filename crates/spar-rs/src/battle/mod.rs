//! Battle engine: the [`BattleOrchestrator`] competition loop and its
//! supporting modules.
//!
//! This module contains everything needed to run a battle between two models:
//!
//! - [`orchestrator::BattleOrchestrator`]: drives one battle from config to
//!   finalized [`Battle`]. Start here.
//! - [`config::BattleConfig`]: battle type, mode, prompt, contestants and
//!   generation parameters, plus up-front validation.
//! - [`records`]: the serializable domain types: [`ModelResponse`],
//!   [`Score`], [`PeerReview`], round outcomes, the prompt evolution trail
//!   and the [`Battle`] aggregate.
//! - [`invoker`]: [`RetryingInvoker`], the never-failing call wrapper with
//!   timeout, backoff and fallback responses.
//! - [`round`]: [`RoundExecutor`], one concurrent response-battle round.
//! - [`scoring`]: [`ResponseScorer`], deterministic four-axis heuristics.
//! - [`review`]: [`PeerReviewPanel`], structured cross-model prompt reviews.
//! - [`convergence`]: [`ConvergenceDetector`], consensus and plateau stops.
//! - [`events`]: [`ProgressSink`] trait and [`ProgressUpdate`] snapshots,
//!   with no-op, logging, channel and composite sinks.
//! - [`record`]: [`BattleRecord`] wire documents and the [`BattleStore`]
//!   persistence seam with its JSON-file implementation.

pub mod config;
pub mod convergence;
pub mod events;
pub mod invoker;
pub mod orchestrator;
pub mod record;
pub mod records;
pub mod review;
pub mod round;
pub mod scoring;

// Re-export commonly used items at the module level.
pub use config::{BattleConfig, BattleMode, BattleType};
pub use convergence::{Convergence, ConvergenceConfig, ConvergenceDetector};
pub use events::{
    BattlePhase, ChannelSink, CompositeSink, FnSink, LoggingSink, ModelStatus, NoopSink,
    ProgressSink, ProgressUpdate,
};
pub use invoker::RetryingInvoker;
pub use orchestrator::BattleOrchestrator;
pub use record::{BattleRecord, BattleStore, JsonFileStore};
pub use records::{
    Battle, BattleStatus, ModelResponse, PeerReview, PromptEvolutionEntry, RoundOutcome, Score,
};
pub use review::PeerReviewPanel;
pub use round::RoundExecutor;
pub use scoring::ResponseScorer;
