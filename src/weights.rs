// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Reward Weight Conversion

use chrono::{DateTime, Utc};

use crate::error::ScoringError;
use crate::types::{ResolvedScore, RewardRecord};

/// Softmax over `-beta * score`, stabilized by subtracting the largest logit.
///
/// Lower scores get larger weights. Non-finite scores (the infinity sentinel,
/// or a stray NaN) get exactly zero. When no score is finite every weight is
/// zero rather than NaN.
pub fn compute_softmax(scores: &[f64], beta: f64) -> Vec<f64> {
    let logits: Vec<f64> = scores
        .iter()
        .map(|s| if s.is_finite() { -beta * s } else { f64::NEG_INFINITY })
        .collect();

    let max_logit = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max_logit.is_finite() {
        return vec![0.0; scores.len()];
    }

    let exps: Vec<f64> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    // the max element contributes exp(0) = 1, so the sum is at least 1
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Maps smoothed scores to the sparse reward table of one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightConverter {
    beta: f64,
}

impl WeightConverter {
    pub fn new(beta: f64) -> Result<Self, ScoringError> {
        if !beta.is_finite() || beta <= 0.0 {
            return Err(ScoringError::InvalidConfig(format!(
                "softmax_beta must be a positive finite number, got {beta}"
            )));
        }
        Ok(Self { beta })
    }

    /// Softmax the scores and drop every entry whose weight is exactly zero.
    ///
    /// Emitted records keep the input order and carry the pre-softmax score.
    pub fn convert(&self, scores: &[ResolvedScore], updated_at: DateTime<Utc>) -> Vec<RewardRecord> {
        let raw: Vec<f64> = scores.iter().map(|s| s.rolling_avg).collect();
        let weights = compute_softmax(&raw, self.beta);

        scores
            .iter()
            .zip(weights)
            .filter(|(_, w)| *w > 0.0)
            .map(|(s, w)| RewardRecord {
                participant_id: s.participant_id,
                external_id: s.external_id,
                smoothed_score: s.rolling_avg,
                reward_weight: w,
                updated_at,
            })
            .collect()
    }
}
