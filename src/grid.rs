// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Dense Score Grid
//
// Densifies a batch of score records over every participant x every observed
// scoring time. Participants first seen after the batch's earliest time are
// backfilled with the epoch's worst plausible score, so a late joiner is never
// ranked as perfect for epochs it skipped. Established participants are never
// backfilled; their gaps are simply dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::config::BlackoutInterval;
use crate::types::{AssetSymbol, ParticipantId, ScoreDetail, ScoreRecord};

// ---------------------------------------------------------------------------
// Cohort
// ---------------------------------------------------------------------------

/// Backfill policy for one participant, fixed per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cohort {
    /// First seen at the batch's earliest scoring time. Gaps are dropped.
    Established,
    /// First seen later. Gaps before and after joining take the worst score.
    New,
}

impl Cohort {
    fn classify(first_seen_idx: usize) -> Self {
        // times are sorted, so index 0 is the global minimum
        if first_seen_idx == 0 {
            Cohort::Established
        } else {
            Cohort::New
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// One cell of the dense grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub scored_time: DateTime<Utc>,
    pub participant_id: ParticipantId,
    pub raw_score: Option<f64>,
    pub score_detail: Option<ScoreDetail>,
    pub asset: AssetSymbol,
    /// Whether `raw_score` was synthesized from the epoch's worst score.
    pub backfilled: bool,
}

/// Rows sorted by `(scored_time, participant_id)` plus the index sets they
/// were built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseScoreGrid {
    rows: Vec<GridRow>,
    participants: Vec<ParticipantId>,
    cohorts: Vec<Cohort>,
    times: Vec<DateTime<Utc>>,
}

impl DenseScoreGrid {
    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct participants in ascending id order.
    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    /// Distinct scoring times in ascending order.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn global_min_time(&self) -> Option<DateTime<Utc>> {
        self.times.first().copied()
    }

    pub fn cohort_of(&self, participant: ParticipantId) -> Option<Cohort> {
        self.participants
            .binary_search(&participant)
            .ok()
            .map(|idx| self.cohorts[idx])
    }

    /// `(established, new)` participant counts.
    pub fn cohort_counts(&self) -> (usize, usize) {
        let established = self.cohorts.iter().filter(|c| **c == Cohort::Established).count();
        (established, self.cohorts.len() - established)
    }

    pub fn rows_for(&self, participant: ParticipantId) -> impl Iterator<Item = &GridRow> + '_ {
        self.rows.iter().filter(move |r| r.participant_id == participant)
    }

    pub fn backfilled_count(&self) -> usize {
        self.rows.iter().filter(|r| r.backfilled).count()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Worst score plus the representative record's detail and asset at one time.
#[derive(Debug, Clone)]
struct EpochWorst {
    score: f64,
    detail: ScoreDetail,
    asset: AssetSymbol,
}

/// Stateless grid builder borrowing the configured black-out intervals.
#[derive(Debug, Clone, Copy)]
pub struct ScoreGridBuilder<'a> {
    blackouts: &'a [BlackoutInterval],
}

impl<'a> ScoreGridBuilder<'a> {
    pub fn new(blackouts: &'a [BlackoutInterval]) -> Self {
        Self { blackouts }
    }

    /// Build the dense grid for one scoring run.
    ///
    /// Records are de-duplicated on `(participant, asset, scored_time)` with
    /// the last occurrence winning, and records whose prompt started inside a
    /// black-out interval are discarded before anything else is derived.
    pub fn build(&self, records: &[ScoreRecord]) -> DenseScoreGrid {
        let surviving = self.dedup_and_filter(records);
        if surviving.is_empty() {
            return DenseScoreGrid::default();
        }

        // Dense indices for both key sets.
        let participants: Vec<ParticipantId> = surviving
            .iter()
            .map(|r| r.participant_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let times: Vec<DateTime<Utc>> = surviving
            .iter()
            .map(|r| r.scored_time)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let p_index: HashMap<ParticipantId, usize> =
            participants.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        let t_index: HashMap<DateTime<Utc>, usize> =
            times.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let n_times = times.len();
        let mut cells: Vec<Vec<&ScoreRecord>> = vec![Vec::new(); participants.len() * n_times];
        let mut first_seen = vec![usize::MAX; participants.len()];
        for &record in &surviving {
            let p = p_index[&record.participant_id];
            let t = t_index[&record.scored_time];
            cells[p * n_times + t].push(record);
            first_seen[p] = first_seen[p].min(t);
        }
        for cell in &mut cells {
            cell.sort_by(|a, b| a.asset.cmp(&b.asset));
        }

        let cohorts: Vec<Cohort> = first_seen.iter().map(|idx| Cohort::classify(*idx)).collect();

        // Representative per time: lowest participant id with a score detail.
        let worst: Vec<Option<EpochWorst>> = (0..n_times)
            .map(|t| {
                (0..participants.len())
                    .flat_map(|p| cells[p * n_times + t].iter())
                    .find_map(|r| {
                        r.score_detail.map(|detail| EpochWorst {
                            score: detail.worst_score(),
                            detail,
                            asset: r.asset.clone(),
                        })
                    })
            })
            .collect();

        let mut rows = Vec::with_capacity(cells.len());
        for (t, scored_time) in times.iter().enumerate() {
            for (p, participant_id) in participants.iter().enumerate() {
                let present: Vec<&ScoreRecord> = cells[p * n_times + t]
                    .iter()
                    .copied()
                    .filter(|r| !r.is_missing())
                    .collect();

                match (cohorts[p], present.is_empty(), &worst[t]) {
                    (_, false, _) => {
                        for record in present {
                            let mut row = GridRow {
                                scored_time: *scored_time,
                                participant_id: *participant_id,
                                raw_score: record.raw_score,
                                score_detail: record.score_detail,
                                asset: record.asset.clone(),
                                backfilled: false,
                            };
                            if cohorts[p] == Cohort::New && row.raw_score.is_none() {
                                if let Some(w) = &worst[t] {
                                    row.raw_score = Some(w.score);
                                    row.backfilled = true;
                                }
                            }
                            rows.push(row);
                        }
                    }
                    (Cohort::New, true, Some(w)) => rows.push(GridRow {
                        scored_time: *scored_time,
                        participant_id: *participant_id,
                        raw_score: Some(w.score),
                        score_detail: Some(w.detail),
                        asset: w.asset.clone(),
                        backfilled: true,
                    }),
                    // Established gaps, and new-joiner gaps with no worst
                    // score at this time, are not part of the grid.
                    (Cohort::Established, true, _) | (Cohort::New, true, None) => {}
                }
            }
        }

        let grid = DenseScoreGrid { rows, participants, cohorts, times };
        let (established, new) = grid.cohort_counts();
        tracing::debug!(
            records = records.len(),
            surviving = surviving.len(),
            rows = grid.len(),
            backfilled = grid.backfilled_count(),
            established,
            new,
            "Built dense score grid"
        );
        grid
    }

    fn dedup_and_filter<'r>(&self, records: &'r [ScoreRecord]) -> Vec<&'r ScoreRecord> {
        let mut latest: HashMap<(ParticipantId, &AssetSymbol, DateTime<Utc>), usize> =
            HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            latest.insert((record.participant_id, &record.asset, record.scored_time), i);
        }

        let mut excluded = 0usize;
        let mut kept: Vec<usize> = latest.into_values().collect();
        kept.sort_unstable();
        let surviving: Vec<&ScoreRecord> = kept
            .into_iter()
            .map(|i| &records[i])
            .filter(|r| {
                let blacked_out = self.blackouts.iter().any(|b| b.contains(r.prompt_start_time));
                if blacked_out {
                    excluded += 1;
                }
                !blacked_out
            })
            .collect();

        if excluded > 0 {
            tracing::info!(excluded, "Discarded score records inside black-out intervals");
        }
        surviving
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
