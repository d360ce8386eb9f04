// Per-Epoch JSONL Reward Recorder
// One JSON line per written epoch; also reads JSONL score histories back in.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use forecast_engine::{ParticipantId, RewardRecord, RewardSink, ScoreRecord, ScoringError};

#[derive(Debug, Clone, Serialize)]
pub struct EpochSnapshot {
    pub scored_time: Option<DateTime<Utc>>,
    pub emitted: usize,
    pub concentration: f64,
    pub top: Option<ParticipantId>,
    pub rewards: Vec<RewardRecord>,
}

impl EpochSnapshot {
    pub fn from_rewards(records: &[RewardRecord]) -> Self {
        Self {
            scored_time: records.first().map(|r| r.updated_at),
            emitted: records.len(),
            concentration: concentration(records),
            top: records
                .iter()
                .max_by(|a, b| a.reward_weight.total_cmp(&b.reward_weight))
                .map(|r| r.participant_id),
            rewards: records.to_vec(),
        }
    }

    pub fn weight_of(&self, participant: ParticipantId) -> f64 {
        self.rewards
            .iter()
            .filter(|r| r.participant_id == participant)
            .map(|r| r.reward_weight)
            .sum()
    }
}

/// Herfindahl index of the weights: 1.0 when one row holds everything.
pub fn concentration(records: &[RewardRecord]) -> f64 {
    records.iter().map(|r| r.reward_weight * r.reward_weight).sum()
}

/// Reward sink that keeps every written epoch in memory.
#[derive(Debug, Default)]
pub struct RewardTimeSeries {
    snapshots: Vec<EpochSnapshot>,
}

impl RewardTimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[EpochSnapshot] {
        &self.snapshots
    }

    /// Write all snapshots to a JSONL file
    pub fn write_jsonl(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot).map_err(std::io::Error::other)?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

impl RewardSink for RewardTimeSeries {
    fn write_reward_records(&mut self, records: &[RewardRecord]) -> Result<(), ScoringError> {
        self.snapshots.push(EpochSnapshot::from_rewards(records));
        Ok(())
    }
}

/// Read a JSONL file of score records. Blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<ScoreRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ScoreRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid score record", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forecast_engine::ExternalId;

    fn row(p: u64, w: f64) -> RewardRecord {
        RewardRecord {
            participant_id: ParticipantId(p),
            external_id: ExternalId(p as u32),
            smoothed_score: 0.0,
            reward_weight: w,
            updated_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn concentration_bounds() {
        assert_eq!(concentration(&[row(1, 1.0)]), 1.0);
        assert!((concentration(&[row(1, 0.5), row(2, 0.5)]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sink_records_snapshots() {
        let mut series = RewardTimeSeries::new();
        series.write_reward_records(&[row(1, 0.25), row(2, 0.75)]).unwrap();
        assert_eq!(series.snapshots().len(), 1);
        let snap = &series.snapshots()[0];
        assert_eq!(snap.top, Some(ParticipantId(2)));
        assert_eq!(snap.weight_of(ParticipantId(1)), 0.25);
    }
}
