//! Execution price versus trade size.
//!
//! Trades are sized in the quote token. A buy pays `size` quote; a sell pays
//! `size / spot` base, so both sides move comparable notional. Slippage is
//! the adverse relative gap between the average execution price and spot,
//! fee included:
//!
//! - buy: `avg / spot − 1`
//! - sell: `1 − avg / spot`
//!
//! Only the filled part of an exhausted trade is priced; `exhausted` flags
//! that the profile could not absorb the full size.

use eyre::{bail, Result};
use serde::Serialize;

use clrisk_sim::simulate_exact_input;

use crate::pool::{PoolView, TradeSide};

/// Guards the proxy against zero depth.
pub const DEPTH_EPSILON: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SlippagePoint {
    /// Requested size, quote units.
    pub trade_size: f64,
    pub side: TradeSide,
    /// Input consumed (quote for buys, base for sells), human units.
    pub amount_in: f64,
    /// Output received (base for buys, quote for sells), human units.
    pub amount_out: f64,
    /// Quote per base actually paid or received.
    pub avg_price: f64,
    pub slippage: f64,
    /// Absolute relative change of the quote price caused by the trade.
    pub price_impact: f64,
    pub ticks_crossed: usize,
    pub exhausted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProxySlippage {
    pub trade_size: f64,
    pub depth_level: f64,
    pub implied_slippage: f64,
}

/// Execute one trade starting at `start_sqrt_price` (raw).
///
/// # Errors
/// Returns error if `trade_size` is negative or non-finite, or the swap
/// simulation rejects its inputs.
pub fn execute_trade(
    view: &PoolView,
    side: TradeSide,
    trade_size: f64,
    start_sqrt_price: f64,
) -> Result<SlippagePoint> {
    if !(trade_size.is_finite() && trade_size >= 0.0) {
        bail!("trade size must be finite and non-negative, got {trade_size}");
    }

    let start_price = view.quote_price_at(start_sqrt_price);
    let raw_in = match side {
        TradeSide::Buy => view.quote_to_raw(trade_size),
        TradeSide::Sell => view.base_to_raw(trade_size / start_price),
    };

    let quote = simulate_exact_input(
        &view.profile,
        start_sqrt_price,
        view.direction_for(side),
        raw_in,
        view.fee,
    )?;

    let (amount_in, amount_out) = match side {
        TradeSide::Buy => (
            view.quote_to_human(quote.amount_in_filled),
            view.base_to_human(quote.amount_out),
        ),
        TradeSide::Sell => (
            view.base_to_human(quote.amount_in_filled),
            view.quote_to_human(quote.amount_out),
        ),
    };

    let (avg_price, slippage) = if amount_in > 0.0 && amount_out > 0.0 {
        match side {
            TradeSide::Buy => {
                let avg = amount_in / amount_out;
                (avg, avg / start_price - 1.0)
            }
            TradeSide::Sell => {
                let avg = amount_out / amount_in;
                (avg, 1.0 - avg / start_price)
            }
        }
    } else {
        (start_price, 0.0)
    };

    let end_price = view.quote_price_at(quote.end_sqrt_price);
    Ok(SlippagePoint {
        trade_size,
        side,
        amount_in,
        amount_out,
        avg_price,
        slippage,
        price_impact: (end_price / start_price - 1.0).abs(),
        ticks_crossed: quote.ticks_crossed,
        exhausted: quote.exhausted,
    })
}

/// Slippage of each trade size, starting from spot.
///
/// # Errors
/// Returns error on a negative or non-finite trade size.
#[tracing::instrument(skip(view, side, trade_sizes), fields(pool = %view.pool_name, side = %side))]
pub fn slippage_curve(view: &PoolView, side: TradeSide, trade_sizes: &[f64]) -> Result<Vec<SlippagePoint>> {
    let curve = trade_sizes
        .iter()
        .map(|size| execute_trade(view, side, *size, view.spot_sqrt_price))
        .collect::<Result<Vec<_>>>()?;

    let exhausted = curve.iter().filter(|p| p.exhausted).count();
    if exhausted > 0 {
        tracing::warn!(exhausted, "trades larger than the reconstructed profile");
    }
    Ok(curve)
}

/// Closed-form proxy `k·q / (depth + ε)`.
pub fn slippage_from_depth_proxy(depth_level: f64, trade_sizes: &[f64], k: f64) -> Vec<ProxySlippage> {
    trade_sizes
        .iter()
        .map(|&trade_size| ProxySlippage {
            trade_size,
            depth_level,
            implied_slippage: k * trade_size / (depth_level + DEPTH_EPSILON),
        })
        .collect()
}
