//! Exact-input swap execution over a [`LiquidityProfile`].
//!
//! ## Step math
//!
//! Inside a segment of liquidity `L`:
//! - token1 in (price up): `Δ√P = Δy / L`, token0 out `L(1/√P₀ − 1/√P₁)`
//! - token0 in (price down): `Δ(1/√P) = Δx / L`, token1 out `L(√P₀ − √P₁)`
//!
//! When the input would carry the price past the segment boundary the step
//! stops at the boundary, the tick is crossed, and the remainder moves on.
//! Segments with zero liquidity are crossed without consuming input.
//!
//! The fee is taken from the input before stepping, which matches the
//! per-step fee of the pool up to rounding.

use eyre::{bail, Result};
use serde::Serialize;

use crate::profile::LiquidityProfile;

/// Which token is sold into the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Sell token0 for token1; price (token1/token0) falls.
    ZeroForOne,
    /// Sell token1 for token0; price rises.
    OneForZero,
}

/// Result of one simulated swap, raw token units.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwapQuote {
    pub direction: SwapDirection,
    /// Requested input, fee included.
    pub amount_in: f64,
    /// Input actually consumed, fee included.
    pub amount_in_filled: f64,
    pub fee_paid: f64,
    pub amount_out: f64,
    pub start_sqrt_price: f64,
    pub end_sqrt_price: f64,
    pub ticks_crossed: usize,
    /// The profile ran out of liquidity before the input was consumed.
    pub exhausted: bool,
}

impl SwapQuote {
    /// Relative pool price change, `P_end / P_start − 1`.
    pub fn price_change(&self) -> f64 {
        (self.end_sqrt_price / self.start_sqrt_price).powi(2) - 1.0
    }
}

/// Simulate an exact-input swap starting at `start_sqrt_price`.
///
/// A start price outside the profile returns an exhausted quote with no fill.
///
/// # Errors
/// Returns error if `amount_in` is negative or non-finite, `fee` is outside
/// `[0, 1)`, or `start_sqrt_price` is not positive.
pub fn simulate_exact_input(
    profile: &LiquidityProfile,
    start_sqrt_price: f64,
    direction: SwapDirection,
    amount_in: f64,
    fee: f64,
) -> Result<SwapQuote> {
    if !(amount_in.is_finite() && amount_in >= 0.0) {
        bail!("amount_in must be finite and non-negative, got {amount_in}");
    }
    if !(0.0..1.0).contains(&fee) {
        bail!("fee must be in [0, 1), got {fee}");
    }
    if !(start_sqrt_price.is_finite() && start_sqrt_price > 0.0) {
        bail!("start sqrt price must be positive, got {start_sqrt_price}");
    }

    let segments = profile.segments();
    let (bound_lo, bound_hi) = profile.sqrt_price_bounds();

    let mut quote = SwapQuote {
        direction,
        amount_in,
        amount_in_filled: 0.0,
        fee_paid: 0.0,
        amount_out: 0.0,
        start_sqrt_price,
        end_sqrt_price: start_sqrt_price,
        ticks_crossed: 0,
        exhausted: amount_in > 0.0,
    };
    if start_sqrt_price < bound_lo || start_sqrt_price > bound_hi {
        return Ok(quote);
    }

    let net_in = amount_in * (1.0 - fee);
    let mut remaining = net_in;
    let mut sqrt = start_sqrt_price;
    let mut out = 0.0;
    let mut crossed = 0usize;

    match direction {
        SwapDirection::OneForZero => {
            let mut idx = segments.partition_point(|s| s.sqrt_price_upper <= sqrt);
            while remaining > 0.0 && idx < segments.len() {
                let seg = &segments[idx];
                let upper = seg.sqrt_price_upper;
                let liquidity = seg.liquidity;
                if liquidity <= 0.0 {
                    sqrt = upper;
                    idx += 1;
                    crossed += 1;
                    continue;
                }

                let max_in = liquidity * (upper - sqrt);
                if remaining < max_in {
                    let next = sqrt + remaining / liquidity;
                    out += liquidity * (1.0 / sqrt - 1.0 / next);
                    sqrt = next;
                    remaining = 0.0;
                } else {
                    out += liquidity * (1.0 / sqrt - 1.0 / upper);
                    remaining -= max_in;
                    sqrt = upper;
                    idx += 1;
                    crossed += 1;
                }
            }
        }
        SwapDirection::ZeroForOne => {
            let mut idx = segments.partition_point(|s| s.sqrt_price_lower < sqrt);
            while remaining > 0.0 && idx > 0 {
                let seg = &segments[idx - 1];
                let lower = seg.sqrt_price_lower;
                let liquidity = seg.liquidity;
                if liquidity <= 0.0 {
                    sqrt = lower;
                    idx -= 1;
                    crossed += 1;
                    continue;
                }

                let max_in = liquidity * (1.0 / lower - 1.0 / sqrt);
                if remaining < max_in {
                    let next = 1.0 / (1.0 / sqrt + remaining / liquidity);
                    out += liquidity * (sqrt - next);
                    sqrt = next;
                    remaining = 0.0;
                } else {
                    out += liquidity * (sqrt - lower);
                    remaining -= max_in;
                    sqrt = lower;
                    idx -= 1;
                    crossed += 1;
                }
            }
        }
    }

    let filled_net = net_in - remaining;
    quote.amount_in_filled = filled_net / (1.0 - fee);
    quote.fee_paid = quote.amount_in_filled - filled_net;
    quote.amount_out = out;
    quote.end_sqrt_price = sqrt;
    quote.ticks_crossed = crossed;
    quote.exhausted = remaining > 0.0;

    tracing::trace!(
        direction = ?direction,
        amount_in,
        amount_out = out,
        ticks_crossed = crossed,
        exhausted = quote.exhausted,
        "swap simulated"
    );
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_to_sqrt_price;
    use crate::profile::LiquiditySegment;

    fn flat_profile(liquidity: f64) -> LiquidityProfile {
        LiquidityProfile::from_segments(
            vec![
                LiquiditySegment::new(-10_000, 0, liquidity),
                LiquiditySegment::new(0, 10_000, liquidity),
            ],
            0,
        )
        .expect("profile")
    }

    #[test]
    fn small_buy_matches_constant_product() {
        // Single range with L behaves like x·y = L² near the start price.
        let profile = flat_profile(1e12);
        let quote = simulate_exact_input(&profile, 1.0, SwapDirection::OneForZero, 1e6, 0.0)
            .expect("swap");

        // x = y = L at √P = 1; exact-in Δy gives Δx = x·Δy/(y+Δy)
        let expected = 1e12 * 1e6 / (1e12 + 1e6);
        assert!((quote.amount_out - expected).abs() / expected < 1e-9);
        assert!(!quote.exhausted);
        assert_eq!(quote.ticks_crossed, 0);
        assert!(quote.end_sqrt_price > 1.0);
    }

    #[test]
    fn fee_reduces_output() {
        let profile = flat_profile(1e12);
        let no_fee =
            simulate_exact_input(&profile, 1.0, SwapDirection::ZeroForOne, 1e9, 0.0).expect("swap");
        let with_fee = simulate_exact_input(&profile, 1.0, SwapDirection::ZeroForOne, 1e9, 0.003)
            .expect("swap");
        assert!(with_fee.amount_out < no_fee.amount_out);
        assert!((with_fee.fee_paid - 3e6).abs() < 1e-3);
        assert!(with_fee.end_sqrt_price < 1.0);
    }

    #[test]
    fn crosses_into_thinner_liquidity() {
        let profile = LiquidityProfile::from_segments(
            vec![
                LiquiditySegment::new(0, 100, 1e9),
                LiquiditySegment::new(100, 1000, 1e8),
            ],
            0,
        )
        .expect("profile");
        let boundary = tick_to_sqrt_price(100);
        let to_boundary = 1e9 * (boundary - 1.0);

        let quote = simulate_exact_input(
            &profile,
            1.0,
            SwapDirection::OneForZero,
            to_boundary * 1.5,
            0.0,
        )
        .expect("swap");
        assert_eq!(quote.ticks_crossed, 1);
        assert!(quote.end_sqrt_price > boundary);
        assert!(!quote.exhausted);
    }

    #[test]
    fn exhausts_at_profile_edge() {
        let profile = flat_profile(1e6);
        let quote = simulate_exact_input(&profile, 1.0, SwapDirection::OneForZero, 1e30, 0.0)
            .expect("swap");
        assert!(quote.exhausted);
        assert!(quote.amount_in_filled < quote.amount_in);
        assert!((quote.end_sqrt_price - tick_to_sqrt_price(10_000)).abs() < 1e-12);
    }

    #[test]
    fn zero_liquidity_gap_is_skipped() {
        let profile = LiquidityProfile::from_segments(
            vec![
                LiquiditySegment::new(-100, 0, 0.0),
                LiquiditySegment::new(-200, -100, 1e9),
            ]
            .into_iter()
            .rev()
            .collect(),
            0,
        )
        .expect("profile");
        let quote = simulate_exact_input(&profile, 1.0, SwapDirection::ZeroForOne, 1e3, 0.0)
            .expect("swap");
        assert!(quote.ticks_crossed >= 1);
        assert!(quote.end_sqrt_price < tick_to_sqrt_price(-100));
        assert!(quote.amount_out > 0.0);
    }

    #[test]
    fn start_outside_profile_fills_nothing() {
        let profile = flat_profile(1e6);
        let quote = simulate_exact_input(&profile, 100.0, SwapDirection::ZeroForOne, 10.0, 0.0)
            .expect("swap");
        assert!(quote.exhausted);
        assert_eq!(quote.amount_out, 0.0);
        assert_eq!(quote.amount_in_filled, 0.0);
    }

    #[test]
    fn rejects_bad_inputs() {
        let profile = flat_profile(1e6);
        assert!(simulate_exact_input(&profile, 1.0, SwapDirection::OneForZero, -1.0, 0.0).is_err());
        assert!(simulate_exact_input(&profile, 1.0, SwapDirection::OneForZero, 1.0, 1.0).is_err());
        assert!(simulate_exact_input(&profile, 0.0, SwapDirection::OneForZero, 1.0, 0.0).is_err());
    }
}
