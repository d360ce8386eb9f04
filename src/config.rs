// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Configuration

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ScoringError;
use crate::normalize::AssetCoefficients;
use crate::types::AssetSymbol;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Everything the reward pipeline reads. Passed explicitly into every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Trailing window, in days, summed into the smoothed score.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// How far back, in days, score records are fetched for an epoch.
    #[serde(default = "default_cutoff_days")]
    pub cutoff_days: i64,
    #[serde(default = "default_softmax_beta")]
    pub softmax_beta: f64,
    #[serde(default)]
    pub asset_coefficients: AssetCoefficients,
    /// Prompt start-time ranges whose scores are discarded before aggregation.
    #[serde(default = "default_blackout_intervals")]
    pub blackout_intervals: Vec<BlackoutInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_assets")]
    pub assets: Vec<AssetSymbol>,
    #[serde(default = "default_time_increment")]
    pub time_increment: u64,
    #[serde(default = "default_time_length")]
    pub time_length: u64,
    #[serde(default = "default_num_paths")]
    pub num_paths: usize,
    /// Hourly volatility used by the reference simulator.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Operationally excluded range of prompt start times (inclusive bounds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackoutInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub label: Option<String>,
}

impl BlackoutInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, label: None }
    }

    /// Build from unix seconds; `None` if either bound is out of range.
    pub fn from_unix(start: i64, end: i64, label: &str) -> Option<Self> {
        Some(Self {
            start: DateTime::from_timestamp(start, 0)?,
            end: DateTime::from_timestamp(end, 0)?,
            label: Some(label.to_string()),
        })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

fn default_window_days() -> i64 { 10 }
fn default_cutoff_days() -> i64 { 14 }
fn default_softmax_beta() -> f64 { 0.1 }
fn default_time_increment() -> u64 { 300 }
fn default_time_length() -> u64 { 86_400 }
fn default_num_paths() -> usize { 1000 }
fn default_sigma() -> f64 { 0.01 }
fn default_log_level() -> String { "info".to_string() }

fn default_sim_assets() -> Vec<AssetSymbol> {
    ["BTC", "ETH", "XAU", "SOL"].iter().map(|s| AssetSymbol::from(*s)).collect()
}

/// 2025-11-18 11:53:00Z .. 14:08:00Z, a known bad scoring period.
fn default_blackout_intervals() -> Vec<BlackoutInterval> {
    BlackoutInterval::from_unix(1_763_466_780, 1_763_474_880, "2025-11-18 bad scoring data")
        .into_iter()
        .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            cutoff_days: default_cutoff_days(),
            softmax_beta: default_softmax_beta(),
            asset_coefficients: AssetCoefficients::default(),
            blackout_intervals: default_blackout_intervals(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            assets: default_sim_assets(),
            time_increment: default_time_increment(),
            time_length: default_time_length(),
            num_paths: default_num_paths(),
            sigma: default_sigma(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.window_days <= 0 {
            return Err(ScoringError::InvalidConfig(format!(
                "window_days must be > 0, got {}",
                self.window_days
            )));
        }
        if self.cutoff_days < self.window_days {
            return Err(ScoringError::InvalidConfig(format!(
                "cutoff_days ({}) must cover window_days ({})",
                self.cutoff_days, self.window_days
            )));
        }
        if !self.softmax_beta.is_finite() || self.softmax_beta <= 0.0 {
            return Err(ScoringError::InvalidConfig(format!(
                "softmax_beta must be a positive finite number, got {}",
                self.softmax_beta
            )));
        }
        self.asset_coefficients.validate()?;
        for interval in &self.blackout_intervals {
            if interval.start > interval.end {
                return Err(ScoringError::InvalidConfig(format!(
                    "blackout interval starts after it ends ({} > {})",
                    interval.start, interval.end
                )));
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s).context("failed to parse engine config")?;
        config.scoring.validate().context("scoring config is invalid")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))
    }
}
