// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - In-Memory Score Store

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::error::ScoringError;
use crate::pipeline::{IdentityResolver, RewardSink, ScoreSource};
use crate::types::{AssetSymbol, ExternalId, ParticipantId, RewardRecord, ScoreRecord, TimeRange};

type RecordKey = (DateTime<Utc>, ParticipantId, AssetSymbol);

/// Score history, identity table and reward log held in memory.
///
/// Writes to the same `(participant, asset, scored_time)` replace the earlier
/// record, so reads always see the latest version.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScoreStore {
    records: BTreeMap<RecordKey, ScoreRecord>,
    identities: HashMap<ParticipantId, ExternalId>,
    rewards: Vec<Vec<RewardRecord>>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one record. Returns the record it replaced, if any.
    pub fn insert(&mut self, record: ScoreRecord) -> Option<ScoreRecord> {
        let key = (record.scored_time, record.participant_id, record.asset.clone());
        self.records.insert(key, record)
    }

    pub fn extend<I: IntoIterator<Item = ScoreRecord>>(&mut self, records: I) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn register_identity(&mut self, participant_id: ParticipantId, external_id: ExternalId) {
        self.identities.insert(participant_id, external_id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reward tables in write order, one per written epoch.
    pub fn reward_history(&self) -> &[Vec<RewardRecord>] {
        &self.rewards
    }

    pub fn latest_rewards(&self) -> Option<&[RewardRecord]> {
        self.rewards.last().map(Vec::as_slice)
    }
}

impl ScoreSource for InMemoryScoreStore {
    fn fetch_score_records(
        &self,
        range: &TimeRange,
        assets: &[AssetSymbol],
    ) -> Result<Vec<ScoreRecord>, ScoringError> {
        if range.start > range.end {
            return Err(ScoringError::Source(format!(
                "inverted time range {} > {}",
                range.start, range.end
            )));
        }
        Ok(self
            .records
            .values()
            .filter(|r| range.contains(r.scored_time) && assets.contains(&r.asset))
            .cloned()
            .collect())
    }
}

impl IdentityResolver for InMemoryScoreStore {
    fn resolve_external_id(&self, participant_id: ParticipantId) -> Option<ExternalId> {
        self.identities.get(&participant_id).copied()
    }
}

impl RewardSink for InMemoryScoreStore {
    fn write_reward_records(&mut self, records: &[RewardRecord]) -> Result<(), ScoringError> {
        self.rewards.push(records.to_vec());
        Ok(())
    }
}
