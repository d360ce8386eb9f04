// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Epoch Reward Pipeline
//
// grid -> window -> softmax for one scoring epoch. Every call is a pure
// function of the record snapshot and the configuration it is handed; nothing
// is carried between epochs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::ScoringError;
use crate::grid::ScoreGridBuilder;
use crate::types::{
    AssetSymbol, ExternalId, ParticipantId, ResolvedScore, RewardRecord, ScoreRecord, TimeRange,
};
use crate::weights::WeightConverter;
use crate::window::{days_before, WindowAggregator};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Read-only access to persisted score records.
pub trait ScoreSource {
    /// Latest record per `(participant, asset, scored_time)` inside `range`.
    fn fetch_score_records(
        &self,
        range: &TimeRange,
        assets: &[AssetSymbol],
    ) -> Result<Vec<ScoreRecord>, ScoringError>;
}

/// Maps internal participant ids to reward-bearing identities.
pub trait IdentityResolver {
    fn resolve_external_id(&self, participant_id: ParticipantId) -> Option<ExternalId>;
}

impl<F> IdentityResolver for F
where
    F: Fn(ParticipantId) -> Option<ExternalId>,
{
    fn resolve_external_id(&self, participant_id: ParticipantId) -> Option<ExternalId> {
        self(participant_id)
    }
}

/// Append-only destination for an epoch's reward table.
pub trait RewardSink {
    fn write_reward_records(&mut self, records: &[RewardRecord]) -> Result<(), ScoringError>;
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub records: usize,
    pub grid_rows: usize,
    pub backfilled_rows: usize,
    pub established: usize,
    pub new_joiners: usize,
    pub participants: usize,
    pub unresolved: usize,
    pub without_window_scores: usize,
    pub emitted: usize,
    pub top: Option<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRewards {
    pub scored_time: DateTime<Utc>,
    pub rewards: Vec<RewardRecord>,
    pub summary: EpochSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochOutcome {
    /// Nothing to reward; the sink was not called.
    Skipped,
    Written { count: usize },
}

// ---------------------------------------------------------------------------
// RewardPipeline
// ---------------------------------------------------------------------------

/// Validated configuration plus the epoch entry points.
#[derive(Debug, Clone)]
pub struct RewardPipeline {
    config: ScoringConfig,
}

impl RewardPipeline {
    pub fn new(config: ScoringConfig) -> Result<Self, ScoringError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Range of scored times fetched for an epoch at `scored_time`.
    pub fn fetch_range(&self, scored_time: DateTime<Utc>) -> Result<TimeRange, ScoringError> {
        let start = days_before(scored_time, self.config.cutoff_days)?;
        Ok(TimeRange::new(start, scored_time))
    }

    /// Compute the reward table for one epoch from a record snapshot.
    ///
    /// An empty snapshot (or one emptied by black-out filtering) yields an
    /// empty table. Participants without an external id are dropped before
    /// the softmax, so the emitted weights still sum to one.
    pub fn compute(
        &self,
        records: &[ScoreRecord],
        scored_time: DateTime<Utc>,
        resolver: &dyn IdentityResolver,
    ) -> Result<EpochRewards, ScoringError> {
        let mut summary = EpochSummary { records: records.len(), ..Default::default() };

        let grid = ScoreGridBuilder::new(&self.config.blackout_intervals).build(records);
        if grid.is_empty() {
            tracing::info!(%scored_time, records = records.len(), "No score records for epoch");
            return Ok(EpochRewards { scored_time, rewards: Vec::new(), summary });
        }
        summary.grid_rows = grid.len();
        summary.backfilled_rows = grid.backfilled_count();
        (summary.established, summary.new_joiners) = grid.cohort_counts();

        let aggregator =
            WindowAggregator::new(&self.config.asset_coefficients, self.config.window_days)?;
        let smoothed = aggregator.aggregate(&grid, scored_time)?;
        summary.participants = smoothed.len();
        summary.without_window_scores =
            smoothed.iter().filter(|s| s.rolling_avg.is_infinite()).count();

        let resolved: Vec<ResolvedScore> = smoothed
            .iter()
            .filter_map(|s| {
                resolver.resolve_external_id(s.participant_id).map(|external_id| ResolvedScore {
                    participant_id: s.participant_id,
                    external_id,
                    rolling_avg: s.rolling_avg,
                })
            })
            .collect();
        summary.unresolved = smoothed.len() - resolved.len();

        let rewards = WeightConverter::new(self.config.softmax_beta)?.convert(&resolved, scored_time);
        summary.emitted = rewards.len();
        summary.top = rewards
            .iter()
            .max_by(|a, b| a.reward_weight.total_cmp(&b.reward_weight))
            .map(|r| r.participant_id);

        tracing::info!(
            %scored_time,
            participants = summary.participants,
            new_joiners = summary.new_joiners,
            unresolved = summary.unresolved,
            emitted = summary.emitted,
            "Computed epoch rewards"
        );
        Ok(EpochRewards { scored_time, rewards, summary })
    }

    /// Fetch, compute and persist one epoch.
    ///
    /// The sink is only called with a non-empty table; an empty epoch is
    /// reported as [`EpochOutcome::Skipped`] so the caller can skip weight
    /// submission.
    pub fn run_epoch<S, K>(
        &self,
        source: &S,
        resolver: &dyn IdentityResolver,
        sink: &mut K,
        scored_time: DateTime<Utc>,
    ) -> Result<EpochOutcome, ScoringError>
    where
        S: ScoreSource + ?Sized,
        K: RewardSink + ?Sized,
    {
        let range = self.fetch_range(scored_time)?;
        let assets = self.config.asset_coefficients.assets();
        let records = source.fetch_score_records(&range, &assets)?;

        let epoch = self.compute(&records, scored_time, resolver)?;
        if epoch.rewards.is_empty() {
            tracing::warn!(%scored_time, "Empty reward table; skipping write");
            return Ok(EpochOutcome::Skipped);
        }

        sink.write_reward_records(&epoch.rewards)?;
        Ok(EpochOutcome::Written { count: epoch.rewards.len() })
    }
}

/// One-shot form of [`RewardPipeline::compute`].
pub fn compute_rewards(
    records: &[ScoreRecord],
    scored_time: DateTime<Utc>,
    config: &ScoringConfig,
    resolver: &dyn IdentityResolver,
) -> Result<Vec<RewardRecord>, ScoringError> {
    let pipeline = RewardPipeline::new(config.clone())?;
    Ok(pipeline.compute(records, scored_time, resolver)?.rewards)
}

/// Append the owner/reserve record after the participant rows.
///
/// Its weight equals the sum of the existing weights, so after the append the
/// owner holds half of the table. Participant id 0 and a zero smoothed score
/// mark it as synthetic.
pub fn append_owner_allocation(
    rewards: &mut Vec<RewardRecord>,
    owner: ExternalId,
    updated_at: DateTime<Utc>,
) {
    let reward_weight = rewards.iter().map(|r| r.reward_weight).sum();
    tracing::info!(%owner, reward_weight, "Appending owner allocation");
    rewards.push(RewardRecord {
        participant_id: ParticipantId(0),
        external_id: owner,
        smoothed_score: 0.0,
        reward_weight,
        updated_at,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
