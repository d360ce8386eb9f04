// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Per-Asset Score Normalization
//
// Assets with different volatility and liquidity produce CRPS values on
// different scales. Each asset carries a fixed calibration coefficient; a
// batch is rescaled by it and then divided by the coefficient-weighted row
// count, so no single asset dominates the smoothed score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ScoringError;
use crate::types::AssetSymbol;

// ---------------------------------------------------------------------------
// Coefficient table
// ---------------------------------------------------------------------------

/// Static calibration table, one strictly positive coefficient per asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetCoefficients(BTreeMap<AssetSymbol, f64>);

impl Default for AssetCoefficients {
    fn default() -> Self {
        Self::empty()
            .with("BTC", 1.0)
            .with("ETH", 0.6210893136676585)
            .with("XAU", 1.4550630831254674)
            .with("SOL", 0.5021491038021751)
    }
}

impl AssetCoefficients {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert (replaces an existing entry).
    pub fn with(mut self, asset: &str, coefficient: f64) -> Self {
        self.0.insert(AssetSymbol::from(asset), coefficient);
        self
    }

    pub fn get(&self, asset: &AssetSymbol) -> Option<f64> {
        self.0.get(asset).copied()
    }

    /// Look up a coefficient, failing fast for assets missing from the table.
    pub fn coefficient(&self, asset: &AssetSymbol) -> Result<f64, ScoringError> {
        self.get(asset)
            .ok_or_else(|| ScoringError::UnknownAsset(asset.clone()))
    }

    /// Configured assets in symbol order.
    pub fn assets(&self) -> Vec<AssetSymbol> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.0.is_empty() {
            return Err(ScoringError::InvalidConfig(
                "asset coefficient table is empty".to_string(),
            ));
        }
        for (asset, coef) in &self.0 {
            if !coef.is_finite() || *coef <= 0.0 {
                return Err(ScoringError::InvalidConfig(format!(
                    "coefficient for {asset} must be a positive finite number, got {coef}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AssetNormalizer
// ---------------------------------------------------------------------------

/// Stateless rescaler borrowing the coefficient table.
#[derive(Debug, Clone, Copy)]
pub struct AssetNormalizer<'a> {
    coefficients: &'a AssetCoefficients,
}

impl<'a> AssetNormalizer<'a> {
    pub fn new(coefficients: &'a AssetCoefficients) -> Self {
        Self { coefficients }
    }

    /// Rescale a batch of `(asset, raw_score)` rows.
    ///
    /// Each score is multiplied by its asset coefficient and divided by
    /// `sum(coefficient[asset] * rows_with_asset)` over the batch. Output is
    /// row-aligned with the input. An asset missing from the table aborts the
    /// whole batch.
    pub fn normalize(&self, rows: &[(&AssetSymbol, f64)]) -> Result<Vec<f64>, ScoringError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut scaled = Vec::with_capacity(rows.len());
        let mut weighted_count = 0.0_f64;
        for (asset, score) in rows {
            let coef = self.coefficients.coefficient(asset)?;
            scaled.push(score * coef);
            weighted_count += coef;
        }

        Ok(scaled.into_iter().map(|s| s / weighted_count).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
