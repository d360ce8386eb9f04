#![cfg(target_arch = "wasm32")]

use chrono::{TimeZone, Utc};
use forecast_engine::{
    compute_epoch_rewards, simulate_paths, AssetSymbol, EpochRewards, ParticipantId, RewardEngine,
    ScoreDetail, ScoreRecord,
};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

fn records() -> Vec<ScoreRecord> {
    let t = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
    [(1u64, 0.5), (2, 0.2)]
        .into_iter()
        .map(|(p, s)| ScoreRecord {
            participant_id: ParticipantId(p),
            asset: AssetSymbol::from("BTC"),
            scored_time: t,
            prompt_start_time: t,
            raw_score: Some(s),
            score_detail: Some(ScoreDetail { percentile90: 1.0, lowest_score: 0.1 }),
        })
        .collect()
}

#[wasm_bindgen_test]
fn simulate_paths_returns_seeded_matrix() {
    let a: Vec<Vec<f64>> = serde_wasm_bindgen::from_value(simulate_paths(100.0, 300, 3600, 0.01, 5, 9)).unwrap();
    let b: Vec<Vec<f64>> = serde_wasm_bindgen::from_value(simulate_paths(100.0, 300, 3600, 0.01, 5, 9)).unwrap();
    assert_eq!(a.len(), 5);
    assert_eq!(a[0].len(), 13);
    assert_eq!(a, b);
}

#[wasm_bindgen_test]
fn compute_epoch_rewards_round_trips() {
    let scored_ms = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap().timestamp_millis() as f64;
    let js_records = serde_wasm_bindgen::to_value(&records()).unwrap();
    let identities = serde_wasm_bindgen::to_value(&vec![(1u64, 11u32), (2, 22)]).unwrap();

    let out = compute_epoch_rewards(js_records, scored_ms, JsValue::NULL, identities).unwrap();
    let epoch: EpochRewards = serde_wasm_bindgen::from_value(out).unwrap();
    assert_eq!(epoch.rewards.len(), 2);
    assert_eq!(epoch.summary.top, Some(ParticipantId(2)));
}

#[wasm_bindgen_test]
fn reward_engine_accumulates_records() {
    let mut engine = RewardEngine::new(JsValue::UNDEFINED).unwrap();
    let added = engine.add_records(serde_wasm_bindgen::to_value(&records()).unwrap()).unwrap();
    assert_eq!(added, 2);
    engine.register_identity(1, 11);
    assert_eq!(engine.record_count(), 2);

    let scored_ms = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap().timestamp_millis() as f64;
    let epoch: EpochRewards = serde_wasm_bindgen::from_value(engine.score_epoch(scored_ms).unwrap()).unwrap();
    // participant 2 has no identity
    assert_eq!(epoch.rewards.len(), 1);
}
