//! Shared fixtures: a synthetic USDC/WETH 0.05% pool.
//!
//! token0 is USDC (6 decimals), token1 is WETH (18 decimals), so the pool
//! price is WETH per USDC (~1/2000). Tests quote in token0 to read prices
//! as USDC per WETH.

#![allow(dead_code)]

use clrisk_analysis::{PoolView, QuoteToken};
use clrisk_data::{PoolSnapshot, SnapshotMeta, TickLiquidity};
use clrisk_sim::math::tick_to_price;

pub const CURRENT_TICK: i32 = 200_311;
/// Aligned centre of every position.
pub const CENTER_TICK: i32 = 200_310;

/// `(tick_lower, tick_upper, liquidity)` of the fixture positions.
pub const POSITIONS: [(i32, i32, f64); 3] = [
    (CENTER_TICK - 20_000, CENTER_TICK + 20_000, 5e17),
    (CENTER_TICK - 2_000, CENTER_TICK + 2_000, 1.5e18),
    (CENTER_TICK - 200, CENTER_TICK + 200, 3e18),
];

pub fn in_range_liquidity() -> f64 {
    POSITIONS.iter().map(|(_, _, l)| l).sum()
}

/// Initialized ticks produced by [`POSITIONS`].
pub fn fixture_ticks() -> Vec<TickLiquidity> {
    let mut ticks: Vec<TickLiquidity> = Vec::new();
    for (lower, upper, liquidity) in POSITIONS {
        ticks.push(TickLiquidity {
            tick: lower,
            liquidity_net: liquidity,
            liquidity_gross: Some(liquidity),
        });
        ticks.push(TickLiquidity {
            tick: upper,
            liquidity_net: -liquidity,
            liquidity_gross: Some(liquidity),
        });
    }
    ticks
}

pub fn fixture_meta() -> SnapshotMeta {
    SnapshotMeta {
        pool_name: "USDC/WETH 0.05%".to_string(),
        fee_tier: "500".to_string(),
        timestamp_utc: "2025-02-22T12:00:00+00:00".to_string(),
        current_tick: CURRENT_TICK,
        current_price: tick_to_price(CURRENT_TICK) * 1e-12,
        ticks_file: String::new(),
        token0_decimals: Some(6),
        token1_decimals: Some(18),
        tick_spacing: Some(10),
        liquidity: Some(in_range_liquidity()),
        sqrt_price_x96: None,
    }
}

pub fn fixture_snapshot() -> PoolSnapshot {
    PoolSnapshot::new(fixture_meta(), fixture_ticks())
}

/// View quoted in USDC with the full fixture inside the window.
pub fn usdc_view() -> PoolView {
    PoolView::from_snapshot(&fixture_snapshot(), 50_000, QuoteToken::Token0)
        .expect("fixture view")
}

pub fn assert_non_decreasing(values: &[f64], what: &str) {
    for pair in values.windows(2) {
        assert!(
            pair[1] >= pair[0] - 1e-12 * pair[0].abs().max(1.0),
            "{what} decreased: {values:?}"
        );
    }
}
