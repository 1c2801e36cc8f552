//! Run a model battle from the command line and print the verdict.
//!
//! Reads the proxy key from the `SPAR_PROXY_KEY` environment variable; the
//! endpoint defaults to a local proxy and is overridable via `SPAR_PROXY_URL`.
//!
//! # Examples
//!
//! ```sh
//! # Auto-selected response battle
//! spar --prompt "Explain photosynthesis simply"
//!
//! # Prompt-refinement battle between a chosen pair
//! spar --prompt "write a poem about rust" --battle-type prompt \
//!   --model openai/gpt-4o --model anthropic/claude-sonnet-4 --rounds 5
//!
//! # Pipe the prompt from stdin and persist the record
//! cat prompt.txt | spar --stdin --out ./battles
//!
//! # Print the catalog
//! spar --list-models
//! ```

use clap::{Parser, ValueEnum};
use spar_rs::battle::invoker::DEFAULT_CALL_TIMEOUT_SECS;
use spar_rs::prelude::*;
use spar_rs::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run a model battle and print the verdict.
///
/// Reads the proxy key from the SPAR_PROXY_KEY environment variable.
#[derive(Parser)]
#[command(name = "spar")]
struct Cli {
    // ── Battle content ─────────────────────────────────────────
    /// The prompt the models compete on
    #[arg(long)]
    prompt: Option<String>,

    /// Read prompt content from stdin
    #[arg(long)]
    stdin: bool,

    /// Prompt category (general, creative, technical, analysis, summary,
    /// explanation, math, research)
    #[arg(long, default_value = "general")]
    category: String,

    // ── Battle shape ───────────────────────────────────────────
    /// What the contestants compete on
    #[arg(long, value_enum, default_value = "response")]
    battle_type: BattleTypeArg,

    /// Contestant model id; pass exactly twice for a manual pair.
    /// Without it, contestants are auto-selected from the catalog.
    #[arg(long = "model")]
    models: Vec<String>,

    /// Round budget (default: 1 for response battles, 5 for prompt battles)
    #[arg(long)]
    rounds: Option<u32>,

    // ── Generation parameters ──────────────────────────────────
    /// Maximum tokens per model response
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Sampling temperature (0.0 = deterministic, 2.0 = very creative)
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    // ── Reliability ────────────────────────────────────────────
    /// Per-call timeout in seconds; exceeding it counts as transient
    #[arg(long, default_value_t = DEFAULT_CALL_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Retries per call after the initial attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,

    // ── Output ─────────────────────────────────────────────────
    /// Directory to persist the battle record into (one JSON file per battle)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the full battle record as JSON instead of the summary
    #[arg(long)]
    json: bool,

    /// Print the model catalog and exit
    #[arg(long)]
    list_models: bool,

    /// Verbose logging (debug level)
    #[arg(long)]
    verbose: bool,
}

/// CLI-facing battle type; mapped onto the library enum.
#[derive(Clone, Copy, ValueEnum)]
enum BattleTypeArg {
    Response,
    Prompt,
}

impl From<BattleTypeArg> for BattleType {
    fn from(arg: BattleTypeArg) -> Self {
        match arg {
            BattleTypeArg::Response => BattleType::Response,
            BattleTypeArg::Prompt => BattleType::Prompt,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_prompt(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.prompt, stdin_text) {
        (Some(flag), Some(piped)) => Ok(format!("{flag}\n\n{piped}")),
        (Some(flag), None) => Ok(flag.clone()),
        (None, Some(piped)) => Ok(piped.trim().to_string()),
        (None, None) => Err("provide --prompt, --stdin, or both".to_string()),
    }
}

fn build_config(cli: &Cli, prompt: String) -> Result<BattleConfig, String> {
    let mode = if cli.models.is_empty() {
        BattleMode::Auto
    } else {
        BattleMode::Manual
    };

    let mut config = BattleConfig::new(BattleType::from(cli.battle_type), mode)
        .with_prompt(prompt)
        .with_category(cli.category.as_str())
        .with_max_tokens(cli.max_tokens)
        .with_temperature(cli.temperature);

    match cli.models.as_slice() {
        [] => {}
        [first, second] => config = config.with_models(first.as_str(), second.as_str()),
        other => {
            return Err(format!(
                "--model must be passed exactly twice for a manual pair, got {}",
                other.len()
            ));
        }
    }
    if let Some(rounds) = cli.rounds {
        config = config.with_rounds(rounds);
    }
    Ok(config)
}

fn render_catalog(catalog: &ModelCatalog) -> String {
    let mut out = String::from("models in the standard catalog:\n");
    for model in catalog.iter() {
        let tier = if model.premium { "premium" } else { "standard" };
        let availability = if model.available { "" } else { " (unavailable)" };
        out.push_str(&format!(
            "  {:<28} {:<18} {:<10} {:<9} {}{}\n",
            model.id, model.display_name, model.provider, tier, model.strengths, availability,
        ));
    }
    out
}

/// Short preview of a prompt for the evolution trail.
fn preview(text: &str) -> String {
    let cut: String = text.chars().take(70).collect();
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut
    }
}

fn render_verdict<'a>(battle: &'a Battle, catalog: &'a ModelCatalog) -> String {
    let name = |id: &'a str| catalog.display_name(id);
    let mut out = String::new();

    out.push_str(&format!(
        "battle {} completed after {} round(s)\n",
        battle.id,
        battle.rounds.len()
    ));
    out.push_str(&format!(
        "contestants: {} vs {}\n",
        name(&battle.models[0]),
        name(&battle.models[1])
    ));
    match &battle.selection_rationale {
        Some(rationale) => out.push_str(&format!("selection: auto ({rationale})\n")),
        None => out.push_str("selection: manual pair\n"),
    }

    out.push_str("rounds:\n");
    for outcome in &battle.rounds {
        match outcome {
            RoundOutcome::Response(round) => {
                let side = |i: usize| {
                    let entry = &round.entries[i];
                    let flag = if entry.response.fallback {
                        " (fallback)"
                    } else {
                        ""
                    };
                    format!("{} {:.1}{}", name(&entry.response.model), entry.score.overall, flag)
                };
                out.push_str(&format!(
                    "  {}: {} | {} -> {}\n",
                    round.round,
                    side(0),
                    side(1),
                    name(&round.champion)
                ));
            }
            RoundOutcome::Prompt(round) => {
                out.push_str(&format!(
                    "  {}: {} proposed, panel avg {:.1} -> champion {}\n",
                    round.round,
                    name(&round.challenger.author),
                    round.challenger.review_average,
                    name(&round.champion)
                ));
            }
        }
    }

    if battle.config.battle_type == BattleType::Prompt {
        if battle.global_consensus {
            out.push_str("stopped: consensus, every reviewer scored the champion a perfect 10\n");
        } else if let Some(reason) = &battle.plateau_reason {
            out.push_str(&format!("stopped: plateau, {reason}\n"));
        } else {
            out.push_str("stopped: round budget spent\n");
        }
        if let Some(final_prompt) = &battle.final_prompt {
            let author = battle.winner.as_deref().unwrap_or("-");
            out.push_str(&format!("final prompt (by {}):\n  {}\n", name(author), final_prompt));
        }
        if !battle.evolution.is_empty() {
            out.push_str("evolution:\n");
            for entry in &battle.evolution {
                let score = if entry.round == 0 {
                    "-".to_string()
                } else {
                    format!("{:.1}", entry.score)
                };
                out.push_str(&format!(
                    "  r{} {} [{}]: {}\n",
                    entry.round,
                    entry.author,
                    score,
                    preview(&entry.prompt)
                ));
            }
        }
    }

    if let Some(note) = &battle.degradation_note {
        out.push_str(&format!("note: {note}\n"));
    }
    out.push_str(&format!(
        "winner: {}\n",
        battle.winner.as_deref().map_or("-", |w| name(w))
    ));
    out.push_str(&format!("cost: {}", format_cents(battle.total_cost_cents)));
    out
}

// ── Battle run ─────────────────────────────────────────────────────

async fn run(cli: &Cli) -> Result<String, String> {
    let catalog = ModelCatalog::standard();

    if cli.list_models {
        return Ok(render_catalog(&catalog));
    }

    let prompt = build_prompt(cli)?;
    let config = build_config(cli, prompt)?;
    let client = HttpCompletionClient::from_env()?;

    // Progress goes to stderr while the battle runs; the channel drains
    // even if the consumer falls behind.
    let (sink, mut rx) = ChannelSink::pair();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            eprintln!("  [{:>3}%] {}", update.percent, update.message);
        }
    });

    let orchestrator = BattleOrchestrator::new(&client, &catalog)
        .with_sink(&sink)
        .with_retry(RetryConfig::with_retries(cli.retries))
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let result = orchestrator.run(config.clone()).await;

    drop(orchestrator);
    drop(sink);
    printer.await.ok();

    let battle = match result {
        Ok(battle) => battle,
        Err(reason) => {
            // Persist rejected configs too, so every attempt leaves a trace.
            if let Some(dir) = &cli.out {
                let store = JsonFileStore::new(dir)
                    .map_err(|e| format!("failed to open record store: {e}"))?;
                match store.save(&BattleRecord::rejected(config, reason.clone())) {
                    Ok(path) => eprintln!("  rejected config recorded at {}", path.display()),
                    Err(e) => eprintln!("  Warning: could not record rejected config: {e}"),
                }
            }
            return Err(reason);
        }
    };

    if let Some(dir) = &cli.out {
        let store =
            JsonFileStore::new(dir).map_err(|e| format!("failed to open record store: {e}"))?;
        let path = store.save(&BattleRecord::from_battle(&battle))?;
        eprintln!("  record written to {}", path.display());
    }

    if cli.json {
        return serde_json::to_string_pretty(&BattleRecord::from_battle(&battle))
            .map_err(|e| format!("failed to serialize battle record: {e}"));
    }
    Ok(render_verdict(&battle, &catalog))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(level),
        )
        .init();

    match run(&cli).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
