// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Type Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Internal participant (miner) identifier assigned by the score store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self { ParticipantId(id) }
}

/// Reward-bearing on-chain identity (the UID slot weights are set against).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub u32);

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid-{}", self.0)
    }
}

/// Asset ticker symbol. Always stored uppercase, so `"btc"` and `"BTC"`
/// resolve to the same calibration coefficient.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AssetSymbol(String);

impl AssetSymbol {
    pub fn new(symbol: &str) -> Self {
        Self(symbol.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetSymbol {
    fn from(s: String) -> Self { AssetSymbol::new(&s) }
}

impl From<&str> for AssetSymbol {
    fn from(s: &str) -> Self { AssetSymbol::new(s) }
}

impl From<AssetSymbol> for String {
    fn from(a: AssetSymbol) -> Self { a.0 }
}

// ─── Time ───────────────────────────────────────────────────────────────────

/// Closed time range `[start, end]` used when querying the score source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

// ─── Scores ─────────────────────────────────────────────────────────────────

/// Batch-level distribution summary attached to a scored prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    /// 90th percentile of the raw CRPS values across all participants.
    pub percentile90: f64,
    /// Best (lowest) raw CRPS across all participants.
    pub lowest_score: f64,
}

impl ScoreDetail {
    /// Worst plausible prompt score at this epoch.
    pub fn worst_score(&self) -> f64 {
        self.percentile90 - self.lowest_score
    }
}

/// One scored forecast: a participant's score for one asset prompt at one
/// scoring time. Lower scores are better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub participant_id: ParticipantId,
    pub asset: AssetSymbol,
    pub scored_time: DateTime<Utc>,
    /// Start time of the forecast prompt this score belongs to.
    pub prompt_start_time: DateTime<Utc>,
    #[serde(default)]
    pub raw_score: Option<f64>,
    #[serde(default)]
    pub score_detail: Option<ScoreDetail>,
}

impl ScoreRecord {
    /// A record carrying neither a score nor a detail is treated as absent.
    pub fn is_missing(&self) -> bool {
        self.raw_score.is_none() && self.score_detail.is_none()
    }
}

/// Windowed score for one participant. `f64::INFINITY` means no valid
/// observation fell inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedScore {
    pub participant_id: ParticipantId,
    pub rolling_avg: f64,
}

/// A smoothed score whose participant resolved to an on-chain identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedScore {
    pub participant_id: ParticipantId,
    pub external_id: ExternalId,
    pub rolling_avg: f64,
}

// ─── Rewards ────────────────────────────────────────────────────────────────

/// One row of the reward table emitted for a scoring epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub participant_id: ParticipantId,
    pub external_id: ExternalId,
    /// Pre-softmax windowed score, kept for auditability.
    pub smoothed_score: f64,
    pub reward_weight: f64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn asset_symbol_is_case_insensitive() {
        assert_eq!(AssetSymbol::from("btc"), AssetSymbol::from(" BTC "));
        assert_eq!(AssetSymbol::new("sol").as_str(), "SOL");
    }

    #[test]
    fn asset_symbol_deserializes_uppercase() {
        let asset: AssetSymbol = serde_json::from_str("\"eth\"").unwrap();
        assert_eq!(asset.as_str(), "ETH");
        assert_eq!(serde_json::to_string(&asset).unwrap(), "\"ETH\"");
    }

    #[test]
    fn worst_score_is_spread_between_p90_and_best() {
        let detail = ScoreDetail { percentile90: 120.0, lowest_score: 20.0 };
        assert_eq!(detail.worst_score(), 100.0);
    }

    #[test]
    fn record_without_score_or_detail_is_missing() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut record = ScoreRecord {
            participant_id: ParticipantId(1),
            asset: AssetSymbol::from("BTC"),
            scored_time: t,
            prompt_start_time: t,
            raw_score: None,
            score_detail: None,
        };
        assert!(record.is_missing());
        record.score_detail = Some(ScoreDetail { percentile90: 1.0, lowest_score: 0.5 });
        assert!(!record.is_missing());
    }

    #[test]
    fn time_range_is_closed() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, end);
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));
    }
}
