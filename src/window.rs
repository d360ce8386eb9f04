// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Trailing Window Aggregation

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;

use crate::error::ScoringError;
use crate::grid::{DenseScoreGrid, GridRow};
use crate::normalize::{AssetCoefficients, AssetNormalizer};
use crate::types::{AssetSymbol, ParticipantId, SmoothedScore};

/// Reduces a dense grid to one smoothed score per participant.
#[derive(Debug, Clone, Copy)]
pub struct WindowAggregator<'a> {
    normalizer: AssetNormalizer<'a>,
    window_days: i64,
}

impl<'a> WindowAggregator<'a> {
    pub fn new(coefficients: &'a AssetCoefficients, window_days: i64) -> Result<Self, ScoringError> {
        if window_days <= 0 {
            return Err(ScoringError::InvalidConfig(format!(
                "window_days must be > 0, got {window_days}"
            )));
        }
        Ok(Self {
            normalizer: AssetNormalizer::new(coefficients),
            window_days,
        })
    }

    /// Smoothed score of every participant in the grid at `scored_time`.
    ///
    /// Rows in `(scored_time - window_days, scored_time]` with a score are
    /// normalized together as one batch, then summed per participant. Summing
    /// rather than averaging lets consistently present participants
    /// accumulate proportionally more mass. A participant with no valid row in
    /// the window scores `f64::INFINITY`. Output is ordered by participant id.
    pub fn aggregate(
        &self,
        grid: &DenseScoreGrid,
        scored_time: DateTime<Utc>,
    ) -> Result<Vec<SmoothedScore>, ScoringError> {
        let window_start = days_before(scored_time, self.window_days)?;

        let in_window: Vec<&GridRow> = grid
            .rows()
            .iter()
            .filter(|r| r.scored_time > window_start && r.scored_time <= scored_time)
            .filter(|r| r.raw_score.is_some_and(|s| !s.is_nan()))
            .collect();
        let batch: Vec<(&AssetSymbol, f64)> = in_window
            .iter()
            .map(|r| (&r.asset, r.raw_score.unwrap_or_default()))
            .collect();
        let normalized = self.normalizer.normalize(&batch)?;

        let mut sums: BTreeMap<ParticipantId, Option<f64>> =
            grid.participants().iter().map(|p| (*p, None)).collect();
        for (row, score) in in_window.iter().zip(normalized) {
            let slot = sums.entry(row.participant_id).or_default();
            *slot = Some(slot.unwrap_or(0.0) + score);
        }

        let smoothed = sums
            .into_iter()
            .map(|(participant_id, sum)| {
                let rolling_avg = sum.unwrap_or_else(|| {
                    tracing::warn!(
                        participant_id = %participant_id,
                        window_days = self.window_days,
                        "Participant has no valid scores in the window; assigning infinite rolling average"
                    );
                    f64::INFINITY
                });
                SmoothedScore { participant_id, rolling_avg }
            })
            .collect();

        Ok(smoothed)
    }
}

/// `t` shifted back by `days`, or `InvalidConfig` when that leaves chrono's range.
pub(crate) fn days_before(t: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, ScoringError> {
    TimeDelta::try_days(days)
        .and_then(|span| t.checked_sub_signed(span))
        .ok_or_else(|| {
            ScoringError::InvalidConfig(format!("{days} day(s) before {t} is out of range"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ScoreGridBuilder;
    use crate::types::{ScoreDetail, ScoreRecord};
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 0, 0, 0).unwrap()
    }

    fn rec(p: u64, asset: &str, d: u32, score: Option<f64>) -> ScoreRecord {
        ScoreRecord {
            participant_id: ParticipantId(p),
            asset: AssetSymbol::from(asset),
            scored_time: day(d),
            prompt_start_time: day(d) - Duration::days(1),
            raw_score: score,
            score_detail: Some(ScoreDetail { percentile90: 9.0, lowest_score: 1.0 }),
        }
    }

    fn score_of(scores: &[SmoothedScore], p: u64) -> f64 {
        scores
            .iter()
            .find(|s| s.participant_id == ParticipantId(p))
            .map(|s| s.rolling_avg)
            .expect("test: participant present")
    }

    #[test]
    fn window_is_open_on_the_left() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[
            rec(1, "BTC", 1, Some(100.0)),
            rec(1, "BTC", 5, Some(2.0)),
            rec(1, "BTC", 11, Some(4.0)),
        ]);
        let agg = WindowAggregator::new(&table, 10).unwrap();
        let scores = agg.aggregate(&grid, day(11)).unwrap();
        // day 1 sits exactly on the excluded left edge
        assert!((score_of(&scores, 1) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rows_after_scored_time_are_ignored() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[
            rec(1, "BTC", 3, Some(2.0)),
            rec(1, "BTC", 4, Some(50.0)),
        ]);
        let scores = WindowAggregator::new(&table, 10).unwrap().aggregate(&grid, day(3)).unwrap();
        assert!((score_of(&scores, 1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_window_yields_infinity() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[
            rec(1, "BTC", 1, Some(2.0)),
            rec(2, "BTC", 1, None),
            rec(1, "BTC", 20, Some(3.0)),
        ]);
        let scores = WindowAggregator::new(&table, 5).unwrap().aggregate(&grid, day(20)).unwrap();
        assert!(score_of(&scores, 2).is_infinite());
        assert!(score_of(&scores, 1).is_finite());
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn per_asset_coefficients_are_applied_to_the_slice() {
        let table = AssetCoefficients::empty().with("BTC", 1.0).with("ETH", 0.5);
        let grid = ScoreGridBuilder::new(&[]).build(&[
            rec(1, "BTC", 2, Some(3.0)),
            rec(1, "ETH", 3, Some(6.0)),
        ]);
        let scores = WindowAggregator::new(&table, 10).unwrap().aggregate(&grid, day(3)).unwrap();
        // (3 * 1.0 + 6 * 0.5) / (1.0 + 0.5)
        assert!((score_of(&scores, 1) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn normalization_spans_the_whole_window() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[
            rec(1, "BTC", 2, Some(0.5)),
            rec(1, "BTC", 3, Some(0.3)),
            rec(2, "BTC", 2, Some(0.4)),
        ]);
        let scores = WindowAggregator::new(&table, 10).unwrap().aggregate(&grid, day(3)).unwrap();
        // three in-window rows share one denominator
        assert!((score_of(&scores, 1) - 0.8 / 3.0).abs() < 1e-12);
        assert!((score_of(&scores, 2) - 0.4 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_asset_aborts_aggregation() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[rec(1, "DOGE", 2, Some(3.0))]);
        let err = WindowAggregator::new(&table, 10).unwrap().aggregate(&grid, day(3));
        assert!(matches!(err, Err(ScoringError::UnknownAsset(_))), "got {err:?}");
    }

    #[test]
    fn window_start_before_min_time_is_a_config_error() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[rec(1, "BTC", 2, Some(3.0))]);
        let err = WindowAggregator::new(&table, 100_000_000).unwrap().aggregate(&grid, day(3));
        assert!(matches!(err, Err(ScoringError::InvalidConfig(_))), "got {err:?}");

        let err = days_before(DateTime::<Utc>::MIN_UTC, 1).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(days_before(day(11), 10).unwrap(), day(1));
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let table = AssetCoefficients::default();
        assert!(WindowAggregator::new(&table, 0).is_err());
        assert!(WindowAggregator::new(&table, -3).is_err());
    }

    #[test]
    fn output_is_ordered_by_participant() {
        let table = AssetCoefficients::default();
        let grid = ScoreGridBuilder::new(&[]).build(&[
            rec(9, "BTC", 2, Some(1.0)),
            rec(4, "BTC", 2, Some(1.0)),
            rec(6, "BTC", 2, Some(1.0)),
        ]);
        let scores = WindowAggregator::new(&table, 10).unwrap().aggregate(&grid, day(2)).unwrap();
        let ids: Vec<u64> = scores.iter().map(|s| s.participant_id.0).collect();
        assert_eq!(ids, vec![4, 6, 9]);
    }
}
