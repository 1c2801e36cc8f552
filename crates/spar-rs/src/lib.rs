//! Model battle orchestration engine.
//!
//! `spar-rs` lets a caller submit a prompt and have two hosted LLM endpoints
//! compete to produce either the best *response* to that prompt or the best
//! *refinement* of the prompt itself. The core abstraction is the
//! [`BattleOrchestrator`](battle::orchestrator::BattleOrchestrator): a
//! coordinator that picks the contestants (or accepts a manual pair), drives
//! one or more competition rounds against remote model endpoints, scores and
//! compares the outputs, detects convergence or plateau during iterative
//! refinement, and produces a final [`Battle`](battle::records::Battle)
//! verdict with full provenance (responses, scores, evolution history).
//!
//! Remote calls go through a thin completion proxy reached via the
//! [`CompletionClient`] trait. Every call is wrapped in bounded retry with
//! backoff, and a model that keeps failing degrades to a deterministic
//! fallback response instead of sinking the battle; a battle that starts
//! always finishes.
//!
//! # Getting started
//!
//! Add `spar-rs` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! spar-rs = { path = "../spar-rs" }
//! ```
//!
//! Then run a battle:
//!
//! ```ignore
//! use spar_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let client = HttpCompletionClient::from_env()?;
//!     let catalog = ModelCatalog::standard();
//!
//!     let config = BattleConfig::new(BattleType::Response, BattleMode::Auto)
//!         .with_prompt("Explain photosynthesis simply")
//!         .with_category("general");
//!
//!     let battle = BattleOrchestrator::new(&client, &catalog)
//!         .with_sink(&LoggingSink)
//!         .run(config)
//!         .await?;
//!
//!     println!("winner: {}", battle.winner.as_deref().unwrap_or("-"));
//!     println!("cost: {}", format_cents(battle.total_cost_cents));
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Pick contestants:** see [`ModelCatalog`](catalog::ModelCatalog) for the
//!   injected, read-only model registry and
//!   [`ModelSelector`](catalog::selector::ModelSelector) for the keyword-bucket
//!   heuristic behind auto mode.
//! - **Configure a battle:** see [`BattleConfig`](battle::config::BattleConfig)
//!   and its `with_*` builders; validation happens once in
//!   [`BattleOrchestrator::run()`](battle::orchestrator::BattleOrchestrator::run)
//!   before any remote call.
//! - **Observe progress:** implement
//!   [`ProgressSink`](battle::events::ProgressSink), or use
//!   [`ChannelSink`](battle::events::ChannelSink) to consume updates from a
//!   channel and [`LoggingSink`](battle::events::LoggingSink) for
//!   tracing-based logging. Emission never blocks orchestration.
//! - **Understand retries:** see [`RetryConfig`](api::retry::RetryConfig) for
//!   the backoff policy and [`battle::invoker`] for the loop that turns
//!   exhausted retries into flagged fallback responses.
//! - **Track spend:** every response and peer review carries its cost in
//!   cents; [`CostTracker`](api::cost::CostTracker) accumulates them and
//!   per-model pricing lives in [`api::cost`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`battle`] | Orchestrator, round executor, scoring, peer review, convergence, progress events, records |
//! | [`catalog`] | Model metadata registry and the auto-selection heuristic |
//! | [`api`] | Retry/backoff policy, failure classification, pricing and cost tracking |
//!
//! # Design principles
//!
//! 1. **A started battle always completes.** Transient remote failures are
//!    retried, terminal ones are absorbed into scoreable fallback responses.
//!    Only configuration errors are surfaced to the caller.
//!
//! 2. **Deterministic where possible.** Selection, scoring, backoff jitter
//!    and fallback text are pure functions of their inputs, so identical
//!    battles are reproducible and testable without a network.
//!
//! 3. **Explicit types at every boundary.** Wire payloads, domain records and
//!    persistence records are separate types with explicit mapping functions;
//!    invariants hold from construction.
//!
//! 4. **Observability over magic.** The orchestrator decides rounds, champions
//!    and convergence automatically but reports every phase transition through
//!    the progress sink and `tracing`.

pub mod api;
pub mod battle;
pub mod catalog;
pub mod prelude;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

/// Default completion proxy endpoint, overridable via `SPAR_PROXY_URL`.
pub const DEFAULT_PROXY_URL: &str = "http://localhost:8787/v1/complete";

/// Default generation cap for battle responses.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature for battle responses.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types and
/// the JSON documents we ask reviewer models to produce.
///
/// # Example
///
/// ```
/// use spar_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Sheet {
///     clarity: f64,
///     #[serde(default)]
///     critique: Option<String>,
/// }
///
/// let schema = json_schema_for::<Sheet>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"clarity".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Token and cost helpers ─────────────────────────────────────────

/// Rough token estimate for text the proxy never metered (fallback content).
/// Uses the ~4 chars/token heuristic so fallback responses are priced on the
/// same scale as real ones.
pub fn approx_tokens(text: &str) -> u32 {
    ((text.len() / 4).max(1)) as u32
}

/// Render a cent amount as a dollar string, e.g. `$0.0132`.
pub fn format_cents(cents: f64) -> String {
    format!("${:.4}", cents / 100.0)
}

// ── Wire types ─────────────────────────────────────────────────────

/// One completion request as the proxy expects it: a single (model, prompt,
/// params) tuple. Zero-valued generation params are omitted so the proxy
/// applies its own defaults.
#[derive(Serialize, Clone, Debug, Default)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_params(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// Clean result of one remote completion: generated text plus the metering
/// the proxy reports alongside it.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens: u32,
    pub cost_cents: f64,
    pub latency_ms: u64,
}

/// Raw proxy response (internal deserialization target). The proxy reports
/// either a payload or an `error` object, occasionally both on partial
/// failures; `error` wins.
#[derive(Deserialize, Debug)]
struct RawCompletionResponse {
    text: Option<String>,
    tokens: Option<u32>,
    cost_cents: Option<f64>,
    latency_ms: Option<u64>,
    error: Option<ProxyError>,
}

#[derive(Deserialize, Debug)]
struct ProxyError {
    message: String,
}

/// Map a raw proxy body to a [`Completion`], filling unmetered fields from
/// local measurements.
fn parse_completion(body: &str, measured_latency_ms: u64) -> Result<Completion, String> {
    let raw: RawCompletionResponse =
        serde_json::from_str(body).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = raw.error {
        return Err(format!("completion proxy error: {}", err.message));
    }

    let text = match raw.text {
        Some(t) if !t.is_empty() => t,
        _ => return Err("completion proxy returned no text".to_string()),
    };

    let tokens = raw.tokens.unwrap_or_else(|| approx_tokens(&text));
    Ok(Completion {
        tokens,
        cost_cents: raw.cost_cents.unwrap_or(0.0),
        latency_ms: raw.latency_ms.unwrap_or(measured_latency_ms),
        text,
    })
}

// ── Client trait ───────────────────────────────────────────────────

/// Boxed future returned by [`CompletionClient::complete`]. Needed so the
/// trait stays dyn-compatible while remaining async.
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Completion, String>> + Send + 'a>>;

/// One remote model invocation.
///
/// The orchestration layers only ever talk to this trait, so tests substitute
/// scripted implementations and the retry loop stays transport-agnostic.
/// Errors are strings; transient ones (rate limits, timeouts, connection
/// drops) are recognized by [`api::retry::is_transient_error`].
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;
}

// ── HTTP client ────────────────────────────────────────────────────

/// Async HTTP client for the completion proxy.
pub struct HttpCompletionClient {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: String,
}

impl HttpCompletionClient {
    /// Create a client against the given endpoint with a bearer key.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("spar-client/0.3")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a client from `SPAR_PROXY_URL` / `SPAR_PROXY_KEY`.
    /// The URL falls back to [`DEFAULT_PROXY_URL`]; the key is required.
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            std::env::var("SPAR_PROXY_URL").unwrap_or_else(|_| DEFAULT_PROXY_URL.to_string());
        let api_key =
            std::env::var("SPAR_PROXY_KEY").map_err(|_| "SPAR_PROXY_KEY not set".to_string())?;
        Self::new(endpoint, api_key)
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Completion, String> {
        debug!(
            "completion request: model={}, prompt={} chars, max_tokens={}, temp={}",
            request.model,
            request.prompt.len(),
            request.max_tokens,
            request.temperature,
        );
        trace!(
            "request payload size: {} bytes",
            serde_json::to_string(request).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        let elapsed = start.elapsed();
        debug!(
            "completion response: HTTP {} in {:.1}s ({} bytes)",
            status,
            elapsed.as_secs_f64(),
            body.len()
        );

        if !status.is_success() {
            return Err(format!("completion proxy HTTP {status}: {body}"));
        }

        let completion = parse_completion(&body, elapsed.as_millis() as u64)?;
        debug!(
            "completion output: {} chars, {} tokens, {}",
            completion.text.len(),
            completion.tokens,
            format_cents(completion.cost_cents),
        );
        Ok(completion)
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.send(request))
    }
}

// ── Convenience ────────────────────────────────────────────────────

/// Run a one-shot auto-selected response battle with the standard catalog.
///
/// Reads the proxy configuration from the environment (see
/// [`HttpCompletionClient::from_env`]). Returns `Err` if the key is not set
/// or the configuration is invalid.
pub async fn quick_battle(prompt: &str, category: &str) -> Result<battle::records::Battle, String> {
    let client = HttpCompletionClient::from_env()?;
    let catalog = catalog::ModelCatalog::standard();

    let config = battle::config::BattleConfig::new(
        battle::config::BattleType::Response,
        battle::config::BattleMode::Auto,
    )
    .with_prompt(prompt)
    .with_category(category);

    battle::orchestrator::BattleOrchestrator::new(&client, &catalog)
        .run(config)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_skips_zero_params() {
        let req = CompletionRequest {
            model: "test-model".into(),
            prompt: "hi".into(),
            max_tokens: 0,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());

        let req = CompletionRequest::new("test-model", "hi").with_params(256, 0.2);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn parse_completion_fills_missing_metering() {
        let body = r#"{"text":"four score and seven"}"#;
        let c = parse_completion(body, 321).unwrap();
        assert_eq!(c.tokens, approx_tokens("four score and seven"));
        assert_eq!(c.latency_ms, 321);
        assert_eq!(c.cost_cents, 0.0);
    }

    #[test]
    fn parse_completion_prefers_proxy_error() {
        let body = r#"{"text":"partial","error":{"message":"rate limit exceeded"}}"#;
        let err = parse_completion(body, 0).unwrap_err();
        assert!(err.contains("rate limit exceeded"));
    }

    #[test]
    fn parse_completion_rejects_empty_text() {
        assert!(parse_completion(r#"{"text":""}"#, 0).is_err());
        assert!(parse_completion(r#"{}"#, 0).is_err());
    }

    #[test]
    fn approx_tokens_never_zero() {
        assert_eq!(approx_tokens(""), 1);
        assert_eq!(approx_tokens("abcdefgh"), 2);
    }

    #[test]
    fn format_cents_renders_dollars() {
        assert_eq!(format_cents(132.0), "$1.3200");
        assert_eq!(format_cents(0.0), "$0.0000");
    }
}
