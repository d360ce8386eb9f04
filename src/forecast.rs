// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Canonical Forecast Shape

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::simulation::{PathEnsemble, SimulationRequest};

/// Prices in a forecast are kept to this many significant digits.
pub const SIGNIFICANT_DIGITS: u32 = 8;

/// Round `value` to `digits` significant digits using decimal arithmetic.
///
/// Zero, non-finite values and values outside `Decimal`'s range come back
/// unchanged.
pub fn round_to_significant_digits(value: f64, digits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    Decimal::from_f64(value)
        .and_then(|d| d.round_sf(digits))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// An ensemble anchored at a unix start time, prices rounded to
/// [`SIGNIFICANT_DIGITS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPaths {
    pub start_time: i64,
    pub time_increment: u64,
    pub paths: Vec<Vec<f64>>,
}

impl ForecastPaths {
    pub fn from_ensemble(ensemble: &PathEnsemble, start_time: DateTime<Utc>) -> Self {
        let paths = ensemble
            .paths()
            .iter()
            .map(|path| {
                path.iter()
                    .map(|p| round_to_significant_digits(*p, SIGNIFICANT_DIGITS))
                    .collect()
            })
            .collect();
        Self {
            start_time: start_time.timestamp(),
            time_increment: ensemble.time_increment(),
            paths,
        }
    }

    /// Whether the forecast has exactly the shape `request` asked for.
    pub fn matches_request(&self, request: &SimulationRequest) -> bool {
        let expected_points = request.num_steps() + 1;
        self.start_time == request.start_time.timestamp()
            && self.time_increment == request.time_increment
            && self.paths.len() == request.num_paths
            && self.paths.iter().all(|p| p.len() == expected_points)
    }

    /// Timestamp of point `step` on every path.
    pub fn time_at(&self, step: usize) -> Option<DateTime<Utc>> {
        let offset = self.time_increment.checked_mul(step as u64)?;
        DateTime::from_timestamp(self.start_time.checked_add(i64::try_from(offset).ok()?)?, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::simulate_price_paths_with_rng;
    use crate::types::AssetSymbol;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * b.abs().max(1.0)
    }

    #[test]
    fn rounds_to_eight_significant_digits() {
        assert!(close(round_to_significant_digits(104_523.456789, 8), 104_523.46));
        assert!(close(round_to_significant_digits(0.000123456789, 8), 0.00012345679));
        assert!(close(round_to_significant_digits(-3.14159265358979, 3), -3.14));
        assert_eq!(round_to_significant_digits(0.0, 8), 0.0);
        assert!(round_to_significant_digits(f64::NAN, 8).is_nan());
    }

    #[test]
    fn rounding_agrees_with_decimal_round_sf() {
        let d = dec!(2613.987654321).round_sf(8).unwrap();
        assert_eq!(round_to_significant_digits(2613.987654321, 8), d.to_f64().unwrap());
    }

    #[test]
    fn forecast_matches_its_request() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let request = SimulationRequest {
            asset: AssetSymbol::from("ETH"),
            time_increment: 300,
            time_length: 3600,
            num_paths: 4,
            start_time: start,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let ensemble = simulate_price_paths_with_rng(&mut rng, 3456.789012345, 300, 3600, 0.01, 4);
        let forecast = ForecastPaths::from_ensemble(&ensemble, start);

        assert!(forecast.matches_request(&request));
        assert!(close(forecast.paths[0][0], 3456.789));
        assert_eq!(forecast.time_at(12), Some(start + chrono::Duration::seconds(3600)));

        let mut wider = request.clone();
        wider.num_paths = 5;
        assert!(!forecast.matches_request(&wider));
    }
}
