//! Progress reporting for battles: updates, sinks, and the monotonic
//! percent cursor.
//!
//! The orchestrator publishes [`ProgressUpdate`]s at every phase boundary.
//! Publishing is fire-and-forget: sinks must never block the battle, and a
//! sink that has lost its consumer is silently ignored.
//!
//! # Choosing a sink
//!
//! | Sink | Use case |
//! |------|----------|
//! | [`NoopSink`] | Tests or fire-and-forget runs |
//! | [`LoggingSink`] | Structured logging via `tracing` |
//! | [`FnSink`] | Quick closures for simple callbacks |
//! | [`ChannelSink`] | Feed one consumer task over an unbounded channel |
//! | [`CompositeSink`] | Fan out to multiple sinks in order |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

// ── Updates ────────────────────────────────────────────────────────

/// Which stage of the battle an update belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BattlePhase {
    /// Contestants are being resolved or auto-selected.
    Selection,
    /// A round's completions are in flight.
    Round,
    /// Peer reviewers are judging a candidate.
    Review,
    /// Stop conditions are being evaluated.
    Convergence,
    /// The battle is finalized.
    Finished,
}

/// Where one contestant currently stands.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One progress snapshot. `percent` is already monotonic when it reaches a
/// sink; consumers can render it directly.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProgressUpdate {
    pub battle_id: Uuid,
    pub phase: BattlePhase,
    pub round: u32,
    pub total_rounds: u32,
    pub percent: u8,
    pub message: String,
    /// Per-contestant standing at the moment of emission.
    pub model_status: BTreeMap<String, ModelStatus>,
}

/// Keeps published percentages non-decreasing even when phases complete out
/// of the nominal order.
#[derive(Debug, Default)]
pub struct ProgressCursor {
    last: u8,
}

impl ProgressCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp a raw percentage against everything published so far.
    pub fn advance(&mut self, raw: u8) -> u8 {
        self.last = self.last.max(raw.min(100));
        self.last
    }
}

// ── Sinks ──────────────────────────────────────────────────────────

/// Receiver for battle progress.
///
/// Implementations must return promptly; a slow consumer belongs behind a
/// [`ChannelSink`], not inside `publish`.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, update: &ProgressUpdate);
}

/// Discards all updates.
pub struct NoopSink;
impl ProgressSink for NoopSink {
    fn publish(&self, _update: &ProgressUpdate) {}
}

/// A sink backed by a closure.
pub struct FnSink<F>(F)
where
    F: Fn(&ProgressUpdate) + Send + Sync;

impl<F> FnSink<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn publish(&self, update: &ProgressUpdate) {
        (self.0)(update);
    }
}

/// Logs updates via `tracing`.
pub struct LoggingSink;

impl ProgressSink for LoggingSink {
    fn publish(&self, update: &ProgressUpdate) {
        match update.phase {
            BattlePhase::Selection | BattlePhase::Finished => {
                info!(
                    "[battle {}] {}% {}",
                    update.battle_id, update.percent, update.message
                );
            }
            _ => {
                debug!(
                    "[battle {}] round {}/{} {}% {}",
                    update.battle_id,
                    update.round,
                    update.total_rounds,
                    update.percent,
                    update.message
                );
            }
        }
    }
}

/// Forwards updates into an unbounded channel for exactly one consumer task.
///
/// Sends never block and never fail the battle: once the receiver is gone,
/// further updates are dropped.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelSink {
    /// Create the sink together with its receiving half.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn publish(&self, update: &ProgressUpdate) {
        // A closed channel means the consumer stopped caring; not an error.
        let _ = self.tx.send(update.clone());
    }
}

/// Fans updates out to multiple sinks in registration order.
pub struct CompositeSink {
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl CompositeSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Conditionally add a sink. When `condition` is `false`, this is a
    /// no-op, keeping the builder chain intact.
    pub fn with_if(self, condition: bool, sink: impl ProgressSink + 'static) -> Self {
        if condition { self.with(sink) } else { self }
    }
}

impl Default for CompositeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for CompositeSink {
    fn publish(&self, update: &ProgressUpdate) {
        for sink in &self.sinks {
            sink.publish(update);
        }
    }
}
