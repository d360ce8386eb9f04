// Reward Backtest Runner
// Replays score histories (or seeded synthetic populations) through the
// epoch reward pipeline and reports how weight is distributed.
//
// Usage:
//   cargo run --release --bin backtest                          # Synthetic, 30 seeds
//   cargo run --release --bin backtest -- --runs 5 --seed 42    # Quick mode
//   cargo run --release --bin backtest -- --miners 64 --epochs 45
//   cargo run --release --bin backtest -- --input scores.jsonl  # Replay a history
//   cargo run --release --bin backtest -- --output results      # Write JSON + JSONL
//   cargo run --release --bin backtest -- --input scores.jsonl --owner 248

mod monte_carlo;
mod report;
mod synthetic;
mod time_series;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use forecast_engine::{
    append_owner_allocation, EngineConfig, ExternalId, InMemoryScoreStore, ParticipantId,
    RewardPipeline, RewardSink, ScoreSource,
};

use monte_carlo::{run_monte_carlo, RunParams};
use time_series::{concentration, read_records, RewardTimeSeries};

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    config: PathBuf,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    runs: usize,
    seed: u64,
    miners: usize,
    epochs: usize,
    owner: Option<u32>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        config: PathBuf::from("config/default.toml"),
        input: None,
        output: None,
        runs: 30,
        seed: 0,
        miners: 32,
        epochs: 30,
        owner: None,
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => cli.config = PathBuf::from(v),
            ("--input", Some(v)) => cli.input = Some(PathBuf::from(v)),
            ("--output", Some(v)) => cli.output = Some(PathBuf::from(v)),
            ("--runs", Some(v)) => cli.runs = v.parse().unwrap_or(30),
            ("--seed", Some(v)) => cli.seed = v.parse().unwrap_or(0),
            ("--miners", Some(v)) => cli.miners = v.parse().unwrap_or(32),
            ("--epochs", Some(v)) => cli.epochs = v.parse().unwrap_or(30),
            ("--owner", Some(v)) => cli.owner = v.parse().ok(),
            (arg, _) => {
                eprintln!("Unknown or incomplete argument: {}", arg);
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    cli
}

fn load_config(path: &Path) -> Result<(EngineConfig, bool)> {
    if path.exists() {
        Ok((EngineConfig::load(path)?, true))
    } else {
        Ok((EngineConfig::default(), false))
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ─── Replay ─────────────────────────────────────────────────────────────────

/// Score every distinct scoring time found in a JSONL history.
fn replay(config: &EngineConfig, cli: &CliArgs, input: &Path) -> Result<()> {
    let records = read_records(input)?;
    let participants: BTreeSet<ParticipantId> = records.iter().map(|r| r.participant_id).collect();
    let times: BTreeSet<DateTime<Utc>> = records.iter().map(|r| r.scored_time).collect();

    let mut store = InMemoryScoreStore::new();
    store.extend(records);
    for p in &participants {
        if let Ok(uid) = u32::try_from(p.0) {
            store.register_identity(*p, ExternalId(uid));
        }
    }

    let pipeline = RewardPipeline::new(config.scoring.clone())?;
    let mut series = RewardTimeSeries::new();

    println!("\n  Reward Backtest (replay) | {} record(s) | {} epoch(s)", store.len(), times.len());
    println!("  {:<26} {:>8} {:>8} {:>10} {:>8}", "Scored time", "Miners", "Emitted", "HHI", "Top");
    println!("  {}", "-".repeat(64));

    for scored_time in times {
        let range = pipeline.fetch_range(scored_time)?;
        let assets = pipeline.config().asset_coefficients.assets();
        let snapshot = store.fetch_score_records(&range, &assets)?;
        let mut epoch = pipeline.compute(&snapshot, scored_time, &store)?;
        if epoch.rewards.is_empty() {
            tracing::warn!(%scored_time, "Empty reward table; skipping");
            continue;
        }

        println!(
            "  {:<26} {:>8} {:>8} {:>10.4} {:>8}",
            scored_time.to_rfc3339(),
            epoch.summary.participants,
            epoch.summary.emitted,
            concentration(&epoch.rewards),
            epoch.summary.top.map(|p| p.to_string()).unwrap_or_default(),
        );

        if let Some(owner) = cli.owner {
            append_owner_allocation(&mut epoch.rewards, ExternalId(owner), scored_time);
        }
        series.write_reward_records(&epoch.rewards)?;
    }

    if let Some(dir) = &cli.output {
        let path = dir.join("replay.jsonl");
        series
            .write_jsonl(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("\n  Rewards saved to: {}", path.display());
    }
    println!();
    Ok(())
}

// ─── Synthetic Monte Carlo ──────────────────────────────────────────────────

fn synthetic(config: &EngineConfig, cli: &CliArgs) -> Result<()> {
    let params = RunParams {
        miners: cli.miners,
        epochs: cli.epochs,
        start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().context("start time")?,
    };
    let ts_dir = cli.output.as_ref().map(|d| d.join("time-series"));

    println!("\n  Reward Backtest (synthetic)");
    println!(
        "  PRNG: ChaCha8Rng | Runs: {} | Base seed: {} | Miners: {} | Epochs: {}",
        cli.runs, cli.seed, cli.miners, cli.epochs
    );

    let suite_start = Instant::now();
    let report = run_monte_carlo(config, params, cli.runs, cli.seed, ts_dir.as_deref())?;

    println!("  {}", "-".repeat(64));
    println!("  {:<28} {:>10} {:>10} {:>10}", "Metric", "Mean", "±95% CI", "Max");
    for (name, stats) in [
        ("Concentration (HHI)", &report.concentration),
        ("New-joiner weight share", &report.new_joiner_share),
        ("Best-calibrated share", &report.best_calibrated_share),
        ("Emitted rows", &report.emitted),
    ] {
        println!("  {:<28} {:>10.4} {:>10.4} {:>10.4}", name, stats.mean, stats.half_width(), stats.max);
    }
    println!("  {}", "-".repeat(64));
    println!("  Suite time: {:.1}s\n", suite_start.elapsed().as_secs_f64());

    if let Some(dir) = &cli.output {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("backtest-{}.json", report.timestamp));
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("  Results saved to: {}\n", path.display());
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = parse_args();
    let (config, from_file) = load_config(&cli.config)?;
    init_tracing(&config.logging.level);
    if !from_file {
        tracing::warn!(path = %cli.config.display(), "Config file not found; using defaults");
    }

    match &cli.input {
        Some(input) => replay(&config, &cli, input),
        None => synthetic(&config, &cli),
    }
}
