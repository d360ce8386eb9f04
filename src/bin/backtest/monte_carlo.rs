// Monte Carlo Infrastructure: N seeded runs of a synthetic population
// Each run replays `epochs` daily scoring epochs through the reward pipeline.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::time::Instant;

use forecast_engine::{EngineConfig, EpochOutcome, InMemoryScoreStore, RewardPipeline};

use crate::report::{BacktestReport, RunResult};
use crate::synthetic::{score_prompt, Population, PromptShape};
use crate::time_series::RewardTimeSeries;

/// Hours between scoring epochs.
pub const EPOCH_HOURS: i64 = 24;

/// Horizon of the synthetic prompts.
const PROMPT_LENGTH_SECS: u64 = 3600;
const PROMPT_PATHS: usize = 50;
const LATE_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    pub miners: usize,
    pub epochs: usize,
    pub start: DateTime<Utc>,
}

/// Run a single backtest iteration with a specific seed.
pub fn run_single(
    config: &EngineConfig,
    params: RunParams,
    seed: u64,
    time_series_dir: Option<&Path>,
) -> Result<RunResult> {
    let started = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let population = Population::generate(&mut rng, params.miners, params.epochs, LATE_FRACTION);
    let pipeline = RewardPipeline::new(config.scoring.clone())?;
    let increment = config.simulation.time_increment.max(1);
    let shape = PromptShape {
        time_increment: increment,
        time_length: increment * (PROMPT_LENGTH_SECS / increment).max(1),
        num_paths: PROMPT_PATHS,
        sigma: config.simulation.sigma,
    };

    let mut store = InMemoryScoreStore::new();
    for miner in &population.miners {
        store.register_identity(miner.id, miner.external_id);
    }
    let mut series = RewardTimeSeries::new();
    let mut skipped = 0usize;

    for epoch in 0..params.epochs {
        let scored_time = params.start + Duration::hours(EPOCH_HOURS * epoch as i64);
        for asset in &config.simulation.assets {
            let records = score_prompt(&mut rng, &population, epoch, asset, scored_time, shape)?;
            store.extend(records);
        }
        match pipeline.run_epoch(&store, &store, &mut series, scored_time)? {
            EpochOutcome::Skipped => skipped += 1,
            EpochOutcome::Written { count } => {
                tracing::debug!(seed, epoch, count, "Epoch written");
            }
        }
    }

    if let Some(dir) = time_series_dir {
        let path = dir.join(format!("seed-{seed}.jsonl"));
        series
            .write_jsonl(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let snapshots = series.snapshots();
    let written = snapshots.len().max(1) as f64;
    let late_share = |s: &crate::time_series::EpochSnapshot| -> f64 {
        s.rewards
            .iter()
            .filter(|r| population.get(r.participant_id).is_some_and(|m| m.is_late_joiner()))
            .map(|r| r.reward_weight)
            .sum()
    };
    let best_calibrated_share = match (population.best_calibrated(), snapshots.last()) {
        (Some(best), Some(last)) => last.weight_of(best.id),
        _ => 0.0,
    };

    Ok(RunResult {
        seed,
        epochs_written: snapshots.len(),
        epochs_skipped: skipped,
        records: store.len(),
        concentration: snapshots.iter().map(|s| s.concentration).sum::<f64>() / written,
        new_joiner_share: snapshots.iter().map(late_share).sum::<f64>() / written,
        best_calibrated_share,
        emitted: snapshots.iter().map(|s| s.emitted as f64).sum::<f64>() / written,
        elapsed_ms: started.elapsed().as_millis(),
    })
}

/// Run `n_runs` iterations with seeds `base_seed..base_seed + n_runs`.
pub fn run_monte_carlo(
    config: &EngineConfig,
    params: RunParams,
    n_runs: usize,
    base_seed: u64,
    time_series_dir: Option<&Path>,
) -> Result<BacktestReport> {
    let runs = (0..n_runs as u64)
        .map(|i| run_single(config, params, base_seed.wrapping_add(i), time_series_dir))
        .collect::<Result<Vec<_>>>()?;
    Ok(BacktestReport::from_runs(
        Utc::now().timestamp_millis().to_string(),
        params.miners,
        params.epochs,
        runs,
    ))
}
