// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine

pub mod types;
pub mod error;
pub mod config;
pub mod simulation;
pub mod forecast;
pub mod grid;
pub mod normalize;
pub mod window;
pub mod weights;
pub mod pipeline;
pub mod store;

pub use config::{BlackoutInterval, EngineConfig, ScoringConfig, SimulationConfig};
pub use error::ScoringError;
pub use forecast::{round_to_significant_digits, ForecastPaths};
pub use grid::{Cohort, DenseScoreGrid, GridRow, ScoreGridBuilder};
pub use normalize::{AssetCoefficients, AssetNormalizer};
pub use pipeline::{
    append_owner_allocation, compute_rewards, EpochOutcome, EpochRewards, EpochSummary,
    IdentityResolver, RewardPipeline, RewardSink, ScoreSource,
};
pub use simulation::{
    simulate_price_paths, simulate_price_paths_with_rng, simulate_single_price_path,
    PathEnsemble, PathSimulator, SimulationRequest,
};
pub use store::InMemoryScoreStore;
pub use types::*;
pub use weights::{compute_softmax, WeightConverter};
pub use window::WindowAggregator;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wasm_bindgen::prelude::*;

fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn timestamp_from_ms(ms: f64) -> Result<DateTime<Utc>, JsValue> {
    if !ms.is_finite() {
        return Err(js_err(format!("invalid timestamp {ms}")));
    }
    DateTime::from_timestamp_millis(ms as i64).ok_or_else(|| js_err(format!("timestamp {ms} out of range")))
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Seeded reference ensemble as a `num_paths x (steps + 1)` array.
#[wasm_bindgen]
pub fn simulate_paths(
    current_price: f64,
    time_increment: u32,
    time_length: u32,
    sigma: f64,
    num_paths: u32,
    seed: u64,
) -> JsValue {
    install_panic_hook();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let ensemble = simulate_price_paths_with_rng(
        &mut rng,
        current_price,
        time_increment as u64,
        time_length as u64,
        sigma,
        num_paths as usize,
    );
    serde_wasm_bindgen::to_value(ensemble.paths()).unwrap_or(JsValue::NULL)
}

/// One-shot reward computation over a JS array of score records.
///
/// `identities` maps participant ids to external ids as `[[participant, external], ...]`.
/// A `null`/`undefined` config uses the defaults.
#[wasm_bindgen]
pub fn compute_epoch_rewards(
    records: JsValue,
    scored_time_ms: f64,
    config: JsValue,
    identities: JsValue,
) -> Result<JsValue, JsValue> {
    install_panic_hook();
    let records: Vec<ScoreRecord> = serde_wasm_bindgen::from_value(records).map_err(js_err)?;
    let config: ScoringConfig = if config.is_null() || config.is_undefined() {
        ScoringConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config).map_err(js_err)?
    };
    let pairs: Vec<(u64, u32)> = serde_wasm_bindgen::from_value(identities).map_err(js_err)?;

    let mut store = InMemoryScoreStore::new();
    for (participant, external) in pairs {
        store.register_identity(ParticipantId(participant), ExternalId(external));
    }

    let scored_time = timestamp_from_ms(scored_time_ms)?;
    let epoch = RewardPipeline::new(config)
        .and_then(|pipeline| pipeline.compute(&records, scored_time, &store))
        .map_err(js_err)?;
    serde_wasm_bindgen::to_value(&epoch).map_err(js_err)
}

/// Stateful scorer for dashboards: accumulate records, then score epochs.
#[wasm_bindgen]
pub struct RewardEngine {
    pipeline: RewardPipeline,
    store: InMemoryScoreStore,
}

#[wasm_bindgen]
impl RewardEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<RewardEngine, JsValue> {
        install_panic_hook();
        let config: ScoringConfig = if config.is_null() || config.is_undefined() {
            ScoringConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        let pipeline = RewardPipeline::new(config).map_err(js_err)?;
        Ok(Self { pipeline, store: InMemoryScoreStore::new() })
    }

    pub fn add_records(&mut self, records: JsValue) -> Result<u32, JsValue> {
        let records: Vec<ScoreRecord> = serde_wasm_bindgen::from_value(records).map_err(js_err)?;
        let count = records.len() as u32;
        self.store.extend(records);
        Ok(count)
    }

    pub fn register_identity(&mut self, participant_id: u64, external_id: u32) {
        self.store.register_identity(ParticipantId(participant_id), ExternalId(external_id));
    }

    pub fn record_count(&self) -> u32 {
        self.store.len() as u32
    }

    /// Score the epoch ending at `scored_time_ms` from the accumulated records.
    pub fn score_epoch(&self, scored_time_ms: f64) -> Result<JsValue, JsValue> {
        let scored_time = timestamp_from_ms(scored_time_ms)?;
        let assets = self.pipeline.config().asset_coefficients.assets();
        let epoch = self
            .pipeline
            .fetch_range(scored_time)
            .and_then(|range| self.store.fetch_score_records(&range, &assets))
            .and_then(|records| self.pipeline.compute(&records, scored_time, &self.store))
            .map_err(js_err)?;
        serde_wasm_bindgen::to_value(&epoch).map_err(js_err)
    }
}
