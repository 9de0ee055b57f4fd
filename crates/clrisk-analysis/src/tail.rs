//! Tail-risk statistics under volatility regimes.
//!
//! Two questions per annualised volatility:
//! - how likely is the price to leave an LP range within the horizon
//!   ([`out_of_range_table`], from simulated GBM paths);
//! - how bad is execution in the worst 5% / 1% of market states
//!   ([`tail_slippage_table`], Monte Carlo over a [`SlippageModel`]).
//!
//! Every regime (and every regime/size cell) is re-seeded with the same
//! seed, so regimes see the same shocks scaled by their volatility and the
//! tables are monotone wherever the underlying model is.

use eyre::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use clrisk_sim::gbm::standard_normal;
use clrisk_sim::{simulate_price_paths_gbm, GbmParams, PricePaths};

use crate::pool::{PoolView, TradeSide};
use crate::slippage::execute_trade;

/// Days per year used to annualise horizons.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Quantile with linear interpolation between order statistics.
///
/// # Errors
/// Returns error on empty samples, NaN samples, or `q` outside `[0, 1]`.
pub fn quantile(samples: &[f64], q: f64) -> Result<f64> {
    if samples.is_empty() {
        bail!("quantile of empty sample");
    }
    if !(0.0..=1.0).contains(&q) {
        bail!("quantile level must be in [0, 1], got {q}");
    }
    if samples.iter().any(|v| v.is_nan()) {
        bail!("quantile input contains NaN");
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    let (v_lo, v_hi) = (sorted[lo], sorted[hi]);
    // equal endpoints (including ±inf) would give inf − inf
    if frac == 0.0 || v_lo == v_hi {
        return Ok(v_lo);
    }
    Ok(v_lo + (v_hi - v_lo) * frac)
}

/// Share of paths that leave `[P0(1−r), P0(1+r)]` at any step.
///
/// # Errors
/// Returns error if `price0` is not positive or `range_pct` is outside `(0, 1)`.
pub fn out_of_range_probability(paths: &PricePaths, price0: f64, range_pct: f64) -> Result<f64> {
    if !(price0.is_finite() && price0 > 0.0) {
        bail!("price0 must be positive, got {price0}");
    }
    if !(range_pct > 0.0 && range_pct < 1.0) {
        bail!("range must be in (0, 1), got {range_pct}");
    }
    let low = price0 * (1.0 - range_pct);
    let high = price0 * (1.0 + range_pct);

    let exits = paths
        .extremes()
        .into_iter()
        .filter(|(min, max)| *min < low || *max > high)
        .count();
    Ok(exits as f64 / paths.n_paths() as f64)
}

/// Horizon and sampling shared by every regime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathScenario {
    pub horizon_days: u32,
    pub steps_per_day: u32,
    pub n_paths: usize,
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutOfRangeRow {
    pub sigma_annual: f64,
    pub range_pct: f64,
    pub lower_price: f64,
    pub upper_price: f64,
    pub probability: f64,
}

/// Out-of-range probability for every (volatility, range) pair.
///
/// Rows are ordered by regime, then by range.
///
/// # Errors
/// Returns error if path simulation or a probability computation fails.
#[tracing::instrument(skip(vol_regimes, lp_ranges), fields(regimes = vol_regimes.len(), ranges = lp_ranges.len()))]
pub fn out_of_range_table(
    price0: f64,
    vol_regimes: &[f64],
    lp_ranges: &[f64],
    scenario: PathScenario,
) -> Result<Vec<OutOfRangeRow>> {
    let mut rows = Vec::with_capacity(vol_regimes.len() * lp_ranges.len());
    for &sigma_annual in vol_regimes {
        let paths = simulate_price_paths_gbm(&GbmParams {
            price0,
            sigma_annual,
            horizon_days: scenario.horizon_days,
            steps_per_day: scenario.steps_per_day,
            n_paths: scenario.n_paths,
            seed: scenario.seed,
        })?;
        for &range_pct in lp_ranges {
            let probability = out_of_range_probability(&paths, price0, range_pct)?;
            tracing::debug!(sigma_annual, range_pct, probability, "out-of-range probability");
            rows.push(OutOfRangeRow {
                sigma_annual,
                range_pct,
                lower_price: price0 * (1.0 - range_pct),
                upper_price: price0 * (1.0 + range_pct),
                probability,
            });
        }
    }
    Ok(rows)
}

/// One Monte Carlo draw of slippage for a trade in a volatility regime.
///
/// Returning `f64::INFINITY` marks a trade the market could not absorb.
pub trait SlippageModel {
    /// # Errors
    /// Implementations return error when the draw cannot be evaluated.
    fn sample(&self, sigma_annual: f64, trade_size: f64, rng: &mut StdRng) -> Result<f64>;
}

impl<F> SlippageModel for F
where
    F: Fn(f64, f64, &mut StdRng) -> f64,
{
    fn sample(&self, sigma_annual: f64, trade_size: f64, rng: &mut StdRng) -> Result<f64> {
        Ok(self(sigma_annual, trade_size, rng))
    }
}

/// Execute the trade on the fixed profile after a lognormal spot shock.
///
/// The spot moves by `exp(σ·√T·Z)` over the horizon; liquidity stays as in
/// the snapshot. A shocked price outside the profile or a trade larger than
/// the remaining liquidity yields infinite slippage.
#[derive(Clone, Copy, Debug)]
pub struct ShockedProfileModel<'a> {
    pub view: &'a PoolView,
    pub side: TradeSide,
    pub horizon_days: f64,
}

impl<'a> ShockedProfileModel<'a> {
    pub fn new(view: &'a PoolView, side: TradeSide, horizon_days: f64) -> Self {
        Self {
            view,
            side,
            horizon_days,
        }
    }
}

impl SlippageModel for ShockedProfileModel<'_> {
    fn sample(&self, sigma_annual: f64, trade_size: f64, rng: &mut StdRng) -> Result<f64> {
        let z = standard_normal(rng);
        let horizon_years = self.horizon_days / DAYS_PER_YEAR;
        // price shock exp(σ√T·Z) is a sqrt-price shock of half the exponent
        let shocked = self.view.spot_sqrt_price * (0.5 * sigma_annual * horizon_years.sqrt() * z).exp();

        let (lo, hi) = self.view.profile.sqrt_price_bounds();
        if shocked < lo || shocked > hi {
            return Ok(f64::INFINITY);
        }
        let point = execute_trade(self.view, self.side, trade_size, shocked)?;
        if point.exhausted {
            return Ok(f64::INFINITY);
        }
        Ok(point.slippage)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TailSlippageRow {
    pub sigma_annual: f64,
    pub trade_size: f64,
    /// Mean over draws that filled; NaN when none did.
    pub mean_slippage: f64,
    pub p95_slippage: f64,
    pub p99_slippage: f64,
    /// Share of draws with infinite slippage.
    pub unfilled_share: f64,
}

/// Mean, p95 and p99 slippage for every (volatility, size) cell.
///
/// Each cell draws `n_mc` samples from an rng seeded with `seed`.
///
/// # Errors
/// Returns error if `n_mc` is zero or the model fails or returns NaN.
#[tracing::instrument(skip(model, vol_regimes, trade_sizes), fields(regimes = vol_regimes.len(), sizes = trade_sizes.len()))]
pub fn tail_slippage_table<M>(
    model: &M,
    vol_regimes: &[f64],
    trade_sizes: &[f64],
    n_mc: usize,
    seed: u64,
) -> Result<Vec<TailSlippageRow>>
where
    M: SlippageModel + ?Sized,
{
    if n_mc == 0 {
        bail!("n_mc must be positive");
    }

    let mut rows = Vec::with_capacity(vol_regimes.len() * trade_sizes.len());
    let mut samples = Vec::with_capacity(n_mc);
    for &sigma_annual in vol_regimes {
        for &trade_size in trade_sizes {
            let mut rng = StdRng::seed_from_u64(seed);
            samples.clear();
            for _ in 0..n_mc {
                samples.push(model.sample(sigma_annual, trade_size, &mut rng)?);
            }

            let filled: Vec<f64> = samples.iter().copied().filter(|s| s.is_finite()).collect();
            let mean_slippage = if filled.is_empty() {
                f64::NAN
            } else {
                filled.iter().sum::<f64>() / filled.len() as f64
            };
            let row = TailSlippageRow {
                sigma_annual,
                trade_size,
                mean_slippage,
                p95_slippage: quantile(&samples, 0.95)?,
                p99_slippage: quantile(&samples, 0.99)?,
                unfilled_share: (n_mc - filled.len()) as f64 / n_mc as f64,
            };
            tracing::debug!(
                sigma_annual,
                trade_size,
                p95 = row.p95_slippage,
                p99 = row.p99_slippage,
                "tail slippage cell"
            );
            rows.push(row);
        }
    }
    Ok(rows)
}
