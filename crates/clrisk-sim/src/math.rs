//! Uniswap V3 tick and price conversions.
//!
//! ## Conventions
//!
//! Prices are token1 per token0. A *raw* price is in base units
//! (`1.0001^tick`); a *human* price is decimal-adjusted:
//!
//! $$P_{human} = P_{raw} \times 10^{d_0 - d_1}$$
//!
//! Liquidity math runs on raw sqrt prices so that `L·Δ√P` and `L·Δ(1/√P)`
//! give raw token amounts directly. [`PriceScale`] converts at the edges.

use alloy::primitives::U256;
use clrisk_data::types::{PoolSnapshot, SnapshotMeta};
use eyre::{bail, eyre, Result, WrapErr};
use serde::Serialize;

pub use clrisk_data::types::{tick_spacing_for_fee_tier, MAX_TICK, MIN_TICK};

/// Price ratio between adjacent ticks.
pub const TICK_BASE: f64 = 1.0001;

fn ln_tick_base() -> f64 {
    TICK_BASE.ln()
}

/// Raw price at `tick`: `1.0001^tick`.
pub fn tick_to_price(tick: i32) -> f64 {
    (f64::from(tick) * ln_tick_base()).exp()
}

/// Raw sqrt price at `tick`: `1.0001^(tick/2)`.
pub fn tick_to_sqrt_price(tick: i32) -> f64 {
    (f64::from(tick) * ln_tick_base() / 2.0).exp()
}

/// Nearest tick for a raw price.
///
/// # Errors
/// Returns error if `price` is not finite and positive.
pub fn price_to_tick(price: f64) -> Result<i32> {
    if !(price.is_finite() && price > 0.0) {
        bail!("price must be positive, got {price}");
    }
    let tick = (price.ln() / ln_tick_base()).round();
    if tick < f64::from(MIN_TICK) || tick > f64::from(MAX_TICK) {
        bail!("price {price} maps outside the tick range");
    }
    Ok(tick as i32)
}

/// Fractional tick for a raw sqrt price.
pub fn sqrt_price_to_tick_f64(sqrt_price: f64) -> f64 {
    2.0 * sqrt_price.ln() / ln_tick_base()
}

/// Apply a relative move: `+0.01` is +1%.
pub fn pct_move_to_price(price0: f64, pct_move: f64) -> f64 {
    price0 * (1.0 + pct_move)
}

/// Fee tier (hundredths of a bip) as a fraction of input.
pub fn fee_tier_to_fraction(fee_pips: u32) -> f64 {
    f64::from(fee_pips) / 1_000_000.0
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .enumerate()
        .map(|(i, limb)| (*limb as f64) * 2f64.powi(64 * i as i32))
        .sum()
}

/// Human token1/token0 price from a Q64.96 `sqrtPriceX96`.
///
/// `sqrtPriceX96` is uint160, so its square can exceed 256 bits. The value is
/// shifted right by 32 before squaring (at most 256 bits) and the square is
/// divided by `2^128` instead of `2^192`. The squaring is exact integer math;
/// only the final ratio is converted to `f64`.
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, token0_decimals: u8, token1_decimals: u8) -> f64 {
    let shifted: U256 = sqrt_price_x96 >> 32;
    if shifted.is_zero() {
        return 0.0;
    }

    let sq = shifted * shifted;
    let raw = u256_to_f64(sq) / 2f64.powi(128);
    let shift = i32::from(token0_decimals) - i32::from(token1_decimals);
    raw * 10f64.powi(shift)
}

/// Token decimals of a pool; converts raw prices and amounts to human units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PriceScale {
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    /// Decimals were guessed from price and tick, not read from the snapshot.
    pub inferred: bool,
}

/// Decimals assumed for the larger-decimals token when none are recorded.
pub const INFERRED_MAX_DECIMALS: u8 = 18;

impl PriceScale {
    pub fn new(token0_decimals: u8, token1_decimals: u8) -> Self {
        Self {
            token0_decimals,
            token1_decimals,
            inferred: false,
        }
    }

    /// Scale for two tokens with equal decimals: raw and human prices coincide.
    pub fn unit() -> Self {
        Self::new(0, 0)
    }

    /// Scale for a known `d0 - d1` with neither side recorded.
    ///
    /// The larger-decimals token is taken as 18 decimals (WETH, WBTC pairs
    /// against 6/8-decimal tokens), the other as `18 - |shift|`. A gap wider
    /// than 18 puts the whole shift on one token.
    ///
    /// # Errors
    /// Returns error if `|shift|` exceeds `u8`.
    pub fn from_decimal_shift(shift: i32) -> Result<Self> {
        let magnitude = u8::try_from(shift.unsigned_abs())
            .map_err(|_| eyre!("decimal shift {shift} out of range"))?;
        let (high, low) = match INFERRED_MAX_DECIMALS.checked_sub(magnitude) {
            Some(low) => (INFERRED_MAX_DECIMALS, low),
            None => (magnitude, 0),
        };
        let scale = if shift >= 0 {
            Self::new(high, low)
        } else {
            Self::new(low, high)
        };
        Ok(Self {
            inferred: true,
            ..scale
        })
    }

    /// `d0 - d1`.
    pub fn decimal_shift(&self) -> i32 {
        i32::from(self.token0_decimals) - i32::from(self.token1_decimals)
    }

    pub fn raw_to_human_price(&self, raw: f64) -> f64 {
        raw * 10f64.powi(self.decimal_shift())
    }

    pub fn human_to_raw_price(&self, human: f64) -> f64 {
        human / 10f64.powi(self.decimal_shift())
    }

    pub fn token0_to_human(&self, raw_amount: f64) -> f64 {
        raw_amount / 10f64.powi(i32::from(self.token0_decimals))
    }

    pub fn token1_to_human(&self, raw_amount: f64) -> f64 {
        raw_amount / 10f64.powi(i32::from(self.token1_decimals))
    }

    pub fn token0_to_raw(&self, human_amount: f64) -> f64 {
        human_amount * 10f64.powi(i32::from(self.token0_decimals))
    }

    pub fn token1_to_raw(&self, human_amount: f64) -> f64 {
        human_amount * 10f64.powi(i32::from(self.token1_decimals))
    }

    /// Decimals from the snapshot meta, or inferred from price and tick.
    ///
    /// Without explicit decimals only `d0 - d1` can be recovered, from
    /// `current_price / 1.0001^current_tick` rounded to a power of ten. With
    /// one side recorded the other follows exactly; with neither, see
    /// [`Self::from_decimal_shift`].
    ///
    /// # Errors
    /// Returns error if the snapshot price is not positive or the implied
    /// decimals are out of range.
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self> {
        let meta = &snapshot.meta;
        let scale = match (meta.token0_decimals, meta.token1_decimals) {
            (Some(d0), Some(d1)) => Self::new(d0, d1),
            (Some(d0), None) => {
                let d1 = i32::from(d0) - infer_decimal_shift(meta)?;
                Self::new(d0, decimals_from(d1, "token1")?)
            }
            (None, Some(d1)) => {
                let d0 = i32::from(d1) + infer_decimal_shift(meta)?;
                Self::new(decimals_from(d0, "token0")?, d1)
            }
            (None, None) => {
                let shift = infer_decimal_shift(meta)?;
                let scale = Self::from_decimal_shift(shift)?;
                tracing::warn!(
                    pool = %meta.pool_name,
                    decimal_shift = shift,
                    token0_decimals = scale.token0_decimals,
                    token1_decimals = scale.token1_decimals,
                    "token decimals missing from snapshot, inferred from price and tick"
                );
                scale
            }
        };

        let implied_tick = price_to_tick(scale.human_to_raw_price(meta.current_price))?;
        if (implied_tick - meta.current_tick).abs() > 1 {
            tracing::warn!(
                current_tick = meta.current_tick,
                implied_tick,
                current_price = meta.current_price,
                "current price disagrees with current tick"
            );
        }
        Ok(scale)
    }
}

fn decimals_from(value: i32, token: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| eyre!("{token} decimals {value} implied by price and tick are out of range"))
}

/// `d0 - d1` implied by the snapshot's price and tick.
///
/// # Errors
/// Returns error if `current_price` is not positive.
pub fn infer_decimal_shift(meta: &SnapshotMeta) -> Result<i32> {
    if !(meta.current_price.is_finite() && meta.current_price > 0.0) {
        bail!("current_price must be positive, got {}", meta.current_price);
    }
    let ratio = meta.current_price / tick_to_price(meta.current_tick);
    Ok(ratio.log10().round() as i32)
}

/// Raw spot sqrt price of the snapshot.
///
/// Uses `sqrt_price_x96` when present (exact on-chain value), otherwise the
/// decimal-adjusted `current_price`.
///
/// # Errors
/// Returns error if `sqrt_price_x96` is not a decimal integer.
pub fn spot_sqrt_price(meta: &SnapshotMeta, scale: &PriceScale) -> Result<f64> {
    if let Some(text) = &meta.sqrt_price_x96 {
        let value = U256::from_str_radix(text.trim(), 10)
            .wrap_err_with(|| format!("invalid sqrt_price_x96 '{text}'"))?;
        let raw = sqrt_price_x96_to_price(value, 0, 0);
        if raw > 0.0 {
            return Ok(raw.sqrt());
        }
    }
    Ok(scale.human_to_raw_price(meta.current_price).sqrt())
}
