// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Reference Price Path Simulator
//
// Geometric random walk: per-step percentage returns are drawn from
// N(0, sigma * sqrt(dt)) with sigma quoted per hour, and compounded onto the
// anchor price. An ensemble of such paths is the canonical probabilistic
// forecast shape.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::types::AssetSymbol;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Volatility is expressed per hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Floor applied to each step's growth factor `1 + r`. A normal draw below
/// -100% would otherwise flip the path negative.
pub const MIN_STEP_FACTOR: f64 = 1e-9;

// ─── Request ────────────────────────────────────────────────────────────────

/// What a forecast prompt asks for: `num_paths` paths of `time_length`
/// seconds sampled every `time_increment` seconds from `start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub asset: AssetSymbol,
    pub time_increment: u64,
    pub time_length: u64,
    pub num_paths: usize,
    pub start_time: DateTime<Utc>,
}

impl SimulationRequest {
    /// Number of simulated steps (points per path minus the anchor).
    pub fn num_steps(&self) -> usize {
        if self.time_increment == 0 {
            return 0;
        }
        (self.time_length / self.time_increment) as usize
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.time_increment == 0 {
            return Err(ScoringError::InvalidSimulation(
                "time_increment must be > 0".to_string(),
            ));
        }
        if self.time_length == 0 {
            return Err(ScoringError::InvalidSimulation(
                "time_length must be > 0".to_string(),
            ));
        }
        if self.time_length % self.time_increment != 0 {
            return Err(ScoringError::InvalidSimulation(format!(
                "time_length {} is not a multiple of time_increment {}",
                self.time_length, self.time_increment
            )));
        }
        if self.num_paths == 0 {
            return Err(ScoringError::InvalidSimulation(
                "num_paths must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Ensemble ───────────────────────────────────────────────────────────────

/// `num_paths` price paths of equal length. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEnsemble {
    time_increment: u64,
    paths: Vec<Vec<f64>>,
}

impl PathEnsemble {
    pub fn new(time_increment: u64, paths: Vec<Vec<f64>>) -> Self {
        Self { time_increment, paths }
    }

    pub fn time_increment(&self) -> u64 {
        self.time_increment
    }

    pub fn paths(&self) -> &[Vec<f64>] {
        &self.paths
    }

    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// Points per path, anchor included.
    pub fn num_points(&self) -> usize {
        self.paths.first().map_or(0, Vec::len)
    }

    /// Cross-section of all paths at one step.
    pub fn prices_at(&self, step: usize) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.get(step).copied()).collect()
    }

    pub fn terminal_prices(&self) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.last().copied()).collect()
    }
}

// ─── Sampling ───────────────────────────────────────────────────────────────

/// Simulate one price path of `time_length / time_increment + 1` points.
///
/// The horizon is truncated by integer division when it is not a multiple of
/// the increment. Element 0 is exactly `current_price`.
pub fn simulate_single_price_path<R: Rng + ?Sized>(
    rng: &mut R,
    current_price: f64,
    time_increment: u64,
    time_length: u64,
    sigma: f64,
) -> Vec<f64> {
    if time_increment == 0 {
        return vec![current_price];
    }
    let dt = time_increment as f64 / SECONDS_PER_HOUR;
    let num_steps = (time_length / time_increment) as usize;
    let std_dev = sigma * dt.sqrt();

    let mut path = Vec::with_capacity(num_steps + 1);
    path.push(current_price);
    let mut cumulative = 1.0_f64;
    for _ in 0..num_steps {
        let z: f64 = rng.sample(StandardNormal);
        cumulative *= (1.0 + std_dev * z).max(MIN_STEP_FACTOR);
        path.push(current_price * cumulative);
    }
    path
}

/// Simulate `num_paths` independent paths from a caller-supplied generator.
pub fn simulate_price_paths_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    current_price: f64,
    time_increment: u64,
    time_length: u64,
    sigma: f64,
    num_paths: usize,
) -> PathEnsemble {
    let paths = (0..num_paths)
        .map(|_| simulate_single_price_path(rng, current_price, time_increment, time_length, sigma))
        .collect();
    PathEnsemble::new(time_increment, paths)
}

/// Simulate `num_paths` independent paths from fresh entropy.
pub fn simulate_price_paths(
    current_price: f64,
    time_increment: u64,
    time_length: u64,
    sigma: f64,
    num_paths: usize,
) -> PathEnsemble {
    let mut rng = ChaCha8Rng::from_entropy();
    simulate_price_paths_with_rng(&mut rng, current_price, time_increment, time_length, sigma, num_paths)
}

// ─── PathSimulator ──────────────────────────────────────────────────────────

/// Reference generator bound to one volatility level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSimulator {
    /// Hourly volatility.
    pub sigma: f64,
}

impl PathSimulator {
    pub fn new(sigma: f64) -> Result<Self, ScoringError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(ScoringError::InvalidSimulation(format!(
                "sigma must be a positive finite number, got {sigma}"
            )));
        }
        Ok(Self { sigma })
    }

    /// Validate `request` and simulate it from fresh entropy.
    pub fn simulate(
        &self,
        request: &SimulationRequest,
        current_price: f64,
    ) -> Result<PathEnsemble, ScoringError> {
        let mut rng = ChaCha8Rng::from_entropy();
        self.simulate_with_rng(&mut rng, request, current_price)
    }

    pub fn simulate_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        request: &SimulationRequest,
        current_price: f64,
    ) -> Result<PathEnsemble, ScoringError> {
        request.validate()?;
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(ScoringError::InvalidSimulation(format!(
                "current_price must be positive, got {current_price}"
            )));
        }
        tracing::debug!(
            asset = %request.asset,
            num_paths = request.num_paths,
            num_steps = request.num_steps(),
            "Simulating reference paths"
        );
        Ok(simulate_price_paths_with_rng(
            rng,
            current_price,
            request.time_increment,
            request.time_length,
            self.sigma,
            request.num_paths,
        ))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(increment: u64, length: u64, paths: usize) -> SimulationRequest {
        SimulationRequest {
            asset: AssetSymbol::from("BTC"),
            time_increment: increment,
            time_length: length,
            num_paths: paths,
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn single_path_starts_at_anchor() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let path = simulate_single_price_path(&mut rng, 2600.0, 300, 3600, 0.01);
        assert_eq!(path.len(), 13);
        assert_eq!(path[0], 2600.0);
        assert!(path.iter().all(|p| *p > 0.0));
    }

    #[test]
    fn horizon_truncates_by_integer_division() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        // 1000 / 300 = 3 steps
        let path = simulate_single_price_path(&mut rng, 10.0, 300, 1000, 0.01);
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = simulate_price_paths_with_rng(&mut ChaCha8Rng::seed_from_u64(1), 100.0, 60, 600, 0.02, 5);
        let b = simulate_price_paths_with_rng(&mut ChaCha8Rng::seed_from_u64(1), 100.0, 60, 600, 0.02, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn paths_do_not_share_random_state() {
        let ensemble = simulate_price_paths_with_rng(&mut ChaCha8Rng::seed_from_u64(3), 100.0, 300, 3600, 0.05, 2);
        assert_ne!(ensemble.paths()[0], ensemble.paths()[1]);
    }

    #[test]
    fn step_return_std_matches_sigma() {
        // sigma 0.06/h at 15-minute steps -> per-step std 0.03
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let ensemble = simulate_price_paths_with_rng(&mut rng, 1.0, 900, 900, 0.06, 20_000);
        let returns: Vec<f64> = ensemble.terminal_prices().iter().map(|p| p - 1.0).collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!(mean.abs() < 0.002, "mean return {mean}");
        assert!((var.sqrt() - 0.03).abs() < 0.002, "std {}", var.sqrt());
    }

    #[test]
    fn extreme_sigma_stays_positive() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ensemble = simulate_price_paths_with_rng(&mut rng, 50.0, 3600, 86_400, 5.0, 200);
        assert!(ensemble.paths().iter().flatten().all(|p| *p > 0.0));
    }

    #[test]
    fn request_validation() {
        assert!(request(300, 86_400, 1000).validate().is_ok());
        assert!(request(0, 86_400, 1000).validate().is_err());
        assert!(request(300, 0, 1000).validate().is_err());
        assert!(request(300, 1000, 1000).validate().is_err());
        assert!(request(300, 86_400, 0).validate().is_err());
        assert_eq!(request(300, 86_400, 1).num_steps(), 288);
    }

    #[test]
    fn simulator_rejects_bad_inputs() {
        assert!(PathSimulator::new(0.0).is_err());
        let sim = PathSimulator::new(0.01).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(sim.simulate_with_rng(&mut rng, &request(300, 1000, 10), 100.0).is_err());
        assert!(sim.simulate_with_rng(&mut rng, &request(300, 3600, 10), -1.0).is_err());
        let ok = sim.simulate_with_rng(&mut rng, &request(300, 3600, 10), 100.0).unwrap();
        assert_eq!((ok.num_paths(), ok.num_points()), (10, 13));
        assert_eq!(ok.prices_at(0), vec![100.0; 10]);
    }
}
