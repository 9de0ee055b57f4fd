//! Zero-drift geometric Brownian motion price paths.
//!
//! `ln P(t+dt) = ln P(t) + σ·√dt·Z`, `dt = 1 / (365 · steps_per_day)`.
//! Normals come from `rand_distr::StandardNormal` on a seeded [`StdRng`], so a given
//! [`GbmParams`] always produces the same paths. Two parameter sets that
//! differ only in `sigma_annual` share the same shocks.

use eyre::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

#[derive(Clone, Debug, PartialEq)]
pub struct GbmParams {
    pub price0: f64,
    pub sigma_annual: f64,
    pub horizon_days: u32,
    pub steps_per_day: u32,
    pub n_paths: usize,
    pub seed: u64,
}

impl GbmParams {
    pub fn n_steps(&self) -> usize {
        self.horizon_days as usize * self.steps_per_day as usize
    }

    /// Step length in years.
    pub fn dt(&self) -> f64 {
        1.0 / (365.0 * f64::from(self.steps_per_day))
    }

    fn validate(&self) -> Result<()> {
        if !(self.price0.is_finite() && self.price0 > 0.0) {
            bail!("price0 must be positive, got {}", self.price0);
        }
        if !(self.sigma_annual.is_finite() && self.sigma_annual >= 0.0) {
            bail!("sigma_annual must be non-negative, got {}", self.sigma_annual);
        }
        if self.steps_per_day == 0 || self.horizon_days == 0 {
            bail!("horizon_days and steps_per_day must be positive");
        }
        if self.n_paths == 0 {
            bail!("n_paths must be positive");
        }
        Ok(())
    }
}

/// One standard normal draw.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

/// Simulated paths, row-major `n_paths × (n_steps + 1)`; column 0 is `price0`.
#[derive(Clone, Debug, PartialEq)]
pub struct PricePaths {
    n_paths: usize,
    n_steps: usize,
    values: Vec<f64>,
}

impl PricePaths {
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn path(&self, index: usize) -> &[f64] {
        let width = self.n_steps + 1;
        &self.values[index * width..(index + 1) * width]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.n_steps + 1)
    }

    pub fn terminal_prices(&self) -> Vec<f64> {
        self.iter().map(|path| path[path.len() - 1]).collect()
    }

    /// `(min, max)` price of every path.
    pub fn extremes(&self) -> Vec<(f64, f64)> {
        self.iter()
            .map(|path| {
                path.iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                        (lo.min(*p), hi.max(*p))
                    })
            })
            .collect()
    }
}

/// Simulate GBM price paths.
///
/// # Errors
/// Returns error on non-positive price, negative volatility, or zero
/// horizon/steps/paths.
#[tracing::instrument(skip(params), fields(sigma = params.sigma_annual, n_paths = params.n_paths))]
pub fn simulate_price_paths_gbm(params: &GbmParams) -> Result<PricePaths> {
    params.validate()?;

    let n_steps = params.n_steps();
    let width = n_steps + 1;
    let step_sigma = params.sigma_annual * params.dt().sqrt();

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut values = Vec::with_capacity(params.n_paths * width);

    for _ in 0..params.n_paths {
        let mut log_price = 0.0;
        values.push(params.price0);
        for _ in 0..n_steps {
            log_price += step_sigma * standard_normal(&mut rng);
            values.push(params.price0 * log_price.exp());
        }
    }

    tracing::debug!(n_steps, "price paths simulated");
    Ok(PricePaths {
        n_paths: params.n_paths,
        n_steps,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(sigma: f64) -> GbmParams {
        GbmParams {
            price0: 2000.0,
            sigma_annual: sigma,
            horizon_days: 2,
            steps_per_day: 24,
            n_paths: 200,
            seed: 42,
        }
    }

    #[test]
    fn shape_and_start_price() {
        let paths = simulate_price_paths_gbm(&params(0.6)).expect("paths");
        assert_eq!(paths.n_paths(), 200);
        assert_eq!(paths.n_steps(), 48);
        assert_eq!(paths.path(0).len(), 49);
        assert!(paths.iter().all(|p| p[0] == 2000.0));
        assert!(paths.iter().flatten().all(|p| *p > 0.0));
    }

    #[test]
    fn same_seed_reproduces_paths() {
        let a = simulate_price_paths_gbm(&params(0.6)).expect("paths");
        let b = simulate_price_paths_gbm(&params(0.6)).expect("paths");
        assert_eq!(a, b);

        let mut other = params(0.6);
        other.seed = 7;
        let c = simulate_price_paths_gbm(&other).expect("paths");
        assert_ne!(a, c);
    }

    #[test]
    fn zero_volatility_is_flat() {
        let paths = simulate_price_paths_gbm(&params(0.0)).expect("paths");
        assert!(paths.iter().flatten().all(|p| *p == 2000.0));
    }

    #[test]
    fn higher_volatility_widens_extremes() {
        let low = simulate_price_paths_gbm(&params(0.3)).expect("paths");
        let high = simulate_price_paths_gbm(&params(1.0)).expect("paths");
        for ((lo_min, lo_max), (hi_min, hi_max)) in low.extremes().into_iter().zip(high.extremes()) {
            assert!(hi_min <= lo_min);
            assert!(hi_max >= lo_max);
        }
    }

    #[test]
    fn standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn rejects_invalid_params() {
        let mut bad = params(0.5);
        bad.n_paths = 0;
        assert!(simulate_price_paths_gbm(&bad).is_err());
        let mut bad = params(-0.1);
        bad.sigma_annual = -0.1;
        assert!(simulate_price_paths_gbm(&bad).is_err());
    }
}
