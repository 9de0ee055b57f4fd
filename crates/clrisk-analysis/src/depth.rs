//! Depth versus price move.
//!
//! Depth at move `m` is what a trader must swap to push the pool from spot
//! to `P0·(1+m)`: the token amounts held by the profile between the two
//! prices. Upward moves take quote in and base out; downward moves the
//! reverse. Because the intervals are nested, depth never shrinks as `|m|`
//! grows on either side.

use eyre::{bail, Result};
use serde::Serialize;

use crate::pool::{PoolView, QuoteToken};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepthPoint {
    /// Relative move from spot, `0.01` is +1%.
    pub pct_move: f64,
    /// Target quote-per-base price.
    pub price_target: f64,
    /// Token0 between spot and target, human units.
    pub depth_token0: f64,
    /// Token1 between spot and target, human units.
    pub depth_token1: f64,
    /// Quote-token side of the same swap.
    pub depth_quote: f64,
    /// Target lies inside the reconstructed profile.
    pub reachable: bool,
}

/// Depth needed to move the price by each of `pct_moves`.
///
/// # Errors
/// Returns error for a non-finite move or one at or below −100%.
#[tracing::instrument(skip(view, pct_moves), fields(pool = %view.pool_name, moves = pct_moves.len()))]
pub fn depth_curve(view: &PoolView, pct_moves: &[f64]) -> Result<Vec<DepthPoint>> {
    let spot_sqrt = view.spot_sqrt_price;
    let spot_quote = view.spot_quote_price();

    let mut curve = Vec::with_capacity(pct_moves.len());
    for &pct_move in pct_moves {
        if !pct_move.is_finite() || pct_move <= -1.0 {
            bail!("price move must be finite and above -100%, got {pct_move}");
        }

        let price_target = spot_quote * (1.0 + pct_move);
        let target_sqrt = view.sqrt_price_for_quote_price(price_target);
        let amounts = view.profile.amounts_between(spot_sqrt, target_sqrt);

        let depth_token0 = view.scale.token0_to_human(amounts.amount0);
        let depth_token1 = view.scale.token1_to_human(amounts.amount1);
        let depth_quote = match view.quote {
            QuoteToken::Token0 => depth_token0,
            QuoteToken::Token1 => depth_token1,
        };

        curve.push(DepthPoint {
            pct_move,
            price_target,
            depth_token0,
            depth_token1,
            depth_quote,
            reachable: amounts.within_profile,
        });
    }

    tracing::debug!(points = curve.len(), "depth curve computed");
    Ok(curve)
}

/// Quote depth of the row at the median move, after sorting by move.
///
/// Used as the single depth level behind the closed-form slippage proxy.
pub fn representative_depth(curve: &[DepthPoint]) -> Option<f64> {
    if curve.is_empty() {
        return None;
    }
    let mut rows: Vec<&DepthPoint> = curve.iter().collect();
    rows.sort_by(|a, b| a.pct_move.total_cmp(&b.pct_move));
    Some(rows[rows.len() / 2].depth_quote)
}
