//! Liquidity by price band around spot.
//!
//! Above spot, positions hold only token0; below spot only token1. Each band
//! reports the tokens its liquidity would release if the price swept through
//! it, and their value in the quote token at spot.

use eyre::{bail, Result};
use serde::Serialize;

use crate::pool::{PoolView, QuoteToken};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiquidityBand {
    pub pct_lower: f64,
    pub pct_upper: f64,
    /// Quote-per-base price at `pct_lower`.
    pub price_lower: f64,
    /// Quote-per-base price at `pct_upper`.
    pub price_upper: f64,
    /// Log-price weighted mean active liquidity, raw units.
    pub mean_liquidity: f64,
    /// Token0 locked in the band, human units.
    pub amount0: f64,
    /// Token1 locked in the band, human units.
    pub amount1: f64,
    pub value_quote: f64,
    /// Share of the total value over all bands.
    pub share: f64,
}

/// Liquidity distribution over bands between consecutive `band_edges_pct`.
///
/// Edges are relative moves in quote price (`-0.05` is 5% below spot). They
/// are sorted and deduplicated before use.
///
/// # Errors
/// Returns error if fewer than two distinct edges remain or an edge is not
/// finite or at or below −100%.
#[tracing::instrument(skip(view, band_edges_pct), fields(pool = %view.pool_name))]
pub fn liquidity_distribution(view: &PoolView, band_edges_pct: &[f64]) -> Result<Vec<LiquidityBand>> {
    if let Some(bad) = band_edges_pct.iter().find(|e| !e.is_finite() || **e <= -1.0) {
        bail!("band edge must be finite and above -100%, got {bad}");
    }
    let mut edges = band_edges_pct.to_vec();
    edges.sort_by(f64::total_cmp);
    edges.dedup();
    if edges.len() < 2 {
        bail!("need at least two distinct band edges, got {}", edges.len());
    }

    let spot_sqrt = view.spot_sqrt_price;
    let spot_quote = view.spot_quote_price();
    let spot_pool = view.spot_pool_price();

    let mut bands: Vec<LiquidityBand> = edges
        .windows(2)
        .map(|pair| {
            let (pct_lower, pct_upper) = (pair[0], pair[1]);
            let price_lower = spot_quote * (1.0 + pct_lower);
            let price_upper = spot_quote * (1.0 + pct_upper);
            let sqrt_a = view.sqrt_price_for_quote_price(price_lower);
            let sqrt_b = view.sqrt_price_for_quote_price(price_upper);
            let (lo, hi) = if sqrt_a <= sqrt_b { (sqrt_a, sqrt_b) } else { (sqrt_b, sqrt_a) };

            let above = hi > spot_sqrt;
            let below = lo < spot_sqrt;
            let raw0 = if above {
                view.profile.amounts_between(lo.max(spot_sqrt), hi).amount0
            } else {
                0.0
            };
            let raw1 = if below {
                view.profile.amounts_between(lo, hi.min(spot_sqrt)).amount1
            } else {
                0.0
            };

            let amount0 = view.scale.token0_to_human(raw0);
            let amount1 = view.scale.token1_to_human(raw1);
            let value_quote = match view.quote {
                QuoteToken::Token1 => amount1 + amount0 * spot_pool,
                QuoteToken::Token0 => amount0 + amount1 / spot_pool,
            };

            LiquidityBand {
                pct_lower,
                pct_upper,
                price_lower,
                price_upper,
                mean_liquidity: view.profile.mean_liquidity_between(lo, hi),
                amount0,
                amount1,
                value_quote,
                share: 0.0,
            }
        })
        .collect();

    let total: f64 = bands.iter().map(|b| b.value_quote).sum();
    if total > 0.0 {
        for band in &mut bands {
            band.share = band.value_quote / total;
        }
    }

    tracing::debug!(bands = bands.len(), total_value = total, "liquidity distribution computed");
    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::fixtures::layered_view;

    const EDGES: [f64; 7] = [-0.2, -0.05, -0.01, 0.0, 0.01, 0.05, 0.2];

    #[test]
    fn shares_sum_to_one() {
        let view = layered_view(QuoteToken::Token1);
        let bands = liquidity_distribution(&view, &EDGES).expect("bands");
        assert_eq!(bands.len(), 6);
        let total: f64 = bands.iter().map(|b| b.share).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn token_sides_split_at_spot() {
        let view = layered_view(QuoteToken::Token1);
        let bands = liquidity_distribution(&view, &EDGES).expect("bands");
        for band in &bands {
            if band.pct_lower >= 0.0 {
                assert_eq!(band.amount1, 0.0);
                assert!(band.amount0 > 0.0);
            } else {
                assert_eq!(band.amount0, 0.0);
                assert!(band.amount1 > 0.0);
            }
        }
    }

    #[test]
    fn core_band_is_denser_than_wing() {
        let view = layered_view(QuoteToken::Token1);
        let bands = liquidity_distribution(&view, &[0.0, 0.05, 0.3]).expect("bands");
        assert!((bands[0].mean_liquidity - 1e10).abs() < 1e-3);
        assert!(bands[1].mean_liquidity < bands[0].mean_liquidity);
    }

    #[test]
    fn edges_are_sorted_and_deduplicated() {
        let view = layered_view(QuoteToken::Token1);
        let bands = liquidity_distribution(&view, &[0.05, -0.05, 0.0, 0.05]).expect("bands");
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].pct_lower, -0.05);
        assert_eq!(bands[1].pct_upper, 0.05);
        assert!(bands[0].price_lower < bands[1].price_upper);
    }

    #[test]
    fn token0_quote_values_in_token0() {
        let view = layered_view(QuoteToken::Token0);
        let bands = liquidity_distribution(&view, &[-0.01, 0.0, 0.01]).expect("bands");
        // Quote price up means pool price down: the band above spot holds token1.
        assert!(bands[1].amount1 > 0.0);
        assert_eq!(bands[1].amount0, 0.0);
        let total: f64 = bands.iter().map(|b| b.share).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_degenerate_edges() {
        let view = layered_view(QuoteToken::Token1);
        assert!(liquidity_distribution(&view, &[0.1]).is_err());
        assert!(liquidity_distribution(&view, &[0.1, 0.1]).is_err());
        assert!(liquidity_distribution(&view, &[-1.5, 0.1]).is_err());
    }
}
