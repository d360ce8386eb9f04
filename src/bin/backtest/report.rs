// Backtest Report Types
// Structured output for offline analysis of reward distribution behaviour

use serde::Serialize;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

/// z for a two-sided 95% normal interval.
const Z_95: f64 = 1.96;

impl Stats {
    /// Summary of per-run samples. An empty slice gives all zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        let Some(&first) = samples.first() else {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        };
        let (min, max) = samples.iter().fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let n = samples.len();
        let mean = samples.iter().sum::<f64>() / n as f64;
        // Bessel-corrected; a single run has no spread
        let std_dev = match n {
            1 => 0.0,
            _ => (samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1) as f64).sqrt(),
        };
        let mut stats = Self { mean, std_dev, ci_lower: mean, ci_upper: mean, min, max, n };
        let half = stats.half_width();
        stats.ci_lower -= half;
        stats.ci_upper += half;
        stats
    }

    /// Half the width of the 95% interval on the mean.
    pub fn half_width(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        Z_95 * self.std_dev / (self.n as f64).sqrt()
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub seed: u64,
    pub epochs_written: usize,
    pub epochs_skipped: usize,
    pub records: usize,
    /// Mean Herfindahl index (sum of squared weights) over written epochs.
    pub concentration: f64,
    /// Mean weight share of late joiners over written epochs.
    pub new_joiner_share: f64,
    /// Weight of the best calibrated miner at the final epoch.
    pub best_calibrated_share: f64,
    /// Mean number of emitted reward rows per written epoch.
    pub emitted: f64,
    pub elapsed_ms: u128,
}

// ─── Monte Carlo Report ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs: usize,
    pub miners: usize,
    pub epochs: usize,
    pub concentration: Stats,
    pub new_joiner_share: Stats,
    pub best_calibrated_share: Stats,
    pub emitted: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<RunResult>,
}

impl BacktestReport {
    pub fn from_runs(
        timestamp: String,
        miners: usize,
        epochs: usize,
        runs: Vec<RunResult>,
    ) -> Self {
        let collect = |f: fn(&RunResult) -> f64| -> Vec<f64> { runs.iter().map(f).collect() };
        Self {
            timestamp,
            version: env!("CARGO_PKG_VERSION"),
            prng: "ChaCha8Rng",
            n_runs: runs.len(),
            miners,
            epochs,
            concentration: Stats::from_samples(&collect(|r| r.concentration)),
            new_joiner_share: Stats::from_samples(&collect(|r| r.new_joiner_share)),
            best_calibrated_share: Stats::from_samples(&collect(|r| r.best_calibrated_share)),
            emitted: Stats::from_samples(&collect(|r| r.emitted)),
            elapsed_ms: Stats::from_samples(&collect(|r| r.elapsed_ms as f64)),
            individual_runs: runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_samples_have_zero_width() {
        let s = Stats::from_samples(&[2.0, 2.0, 2.0]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.half_width(), 0.0);
        assert_eq!(s.n, 3);
    }

    #[test]
    fn stats_of_empty_samples_are_zero() {
        let s = Stats::from_samples(&[]);
        assert_eq!(s.n, 0);
        assert_eq!(s.mean, 0.0);
    }

    #[test]
    fn confidence_interval_brackets_the_mean() {
        let s = Stats::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!(s.ci_lower < s.mean && s.mean < s.ci_upper);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        // sample std of 1..=4 is sqrt(5/3)
        let expected = 1.96 * (5.0f64 / 3.0).sqrt() / 2.0;
        assert!((s.half_width() - expected).abs() < 1e-12);
        assert!((s.ci_upper - s.ci_lower - 2.0 * expected).abs() < 1e-12);
    }

    #[test]
    fn single_sample_has_no_spread() {
        let s = Stats::from_samples(&[7.5]);
        assert_eq!((s.min, s.max, s.ci_lower, s.ci_upper), (7.5, 7.5, 7.5, 7.5));
        assert_eq!(s.half_width(), 0.0);
    }
}
