//! Integration tests for distribution, depth and slippage on the fixture pool.

mod common;

use clrisk_analysis::depth::representative_depth;
use clrisk_analysis::{
    depth_curve, liquidity_distribution, slippage_curve, slippage_from_depth_proxy, RiskConfig,
    TradeSide,
};
use common::*;

#[test]
fn spot_price_reads_in_usdc() {
    let view = usdc_view();
    let spot = view.spot_quote_price();
    assert!((1990.0..2010.0).contains(&spot), "spot {spot}");
}

#[test]
fn depth_is_monotone_on_both_sides() {
    let view = usdc_view();
    let config = RiskConfig::default();
    let curve = depth_curve(&view, &config.pct_moves).expect("depth");

    let up: Vec<f64> = curve
        .iter()
        .filter(|p| p.pct_move >= 0.0)
        .map(|p| p.depth_quote)
        .collect();
    let down: Vec<f64> = curve
        .iter()
        .rev()
        .filter(|p| p.pct_move <= 0.0)
        .map(|p| p.depth_quote)
        .collect();
    assert_non_decreasing(&up, "upward depth");
    assert_non_decreasing(&down, "downward depth");
    assert!(curve.iter().all(|p| p.reachable));
}

#[test]
fn buying_the_depth_moves_price_by_the_target() {
    let view = usdc_view();
    let depth = depth_curve(&view, &[0.01]).expect("depth");
    let size = depth[0].depth_quote;

    let fill = slippage_curve(&view, TradeSide::Buy, &[size]).expect("slippage");
    let impact = fill[0].price_impact;
    // the fee keeps a little of the input out of the pool
    assert!(impact <= 0.01 + 1e-9 && impact > 0.0099, "impact {impact}");
    assert!(!fill[0].exhausted);
}

#[test]
fn slippage_grows_with_size_on_both_sides() {
    let view = usdc_view();
    let sizes = [0.0, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8];
    for side in [TradeSide::Buy, TradeSide::Sell] {
        let curve = slippage_curve(&view, side, &sizes).expect("slippage");
        let slips: Vec<f64> = curve.iter().map(|p| p.slippage).collect();
        assert_non_decreasing(&slips, &format!("{side} slippage"));
        assert!(curve[1].slippage >= 0.0005 * 0.99, "fee floor: {}", curve[1].slippage);
        assert!(curve[4].ticks_crossed <= curve[6].ticks_crossed);
    }
}

#[test]
fn distribution_concentrates_near_spot() {
    let view = usdc_view();
    let bands = liquidity_distribution(&view, &[-0.2, -0.01, 0.0, 0.01, 0.2]).expect("bands");
    let total: f64 = bands.iter().map(|b| b.share).sum();
    assert!((total - 1.0).abs() < 1e-9);

    // inner 1% bands sit in the tight position; outer bands are far wider
    // but per unit of log-price much thinner
    assert!(bands[1].mean_liquidity > bands[0].mean_liquidity);
    assert!(bands[2].mean_liquidity > bands[3].mean_liquidity);
}

#[test]
fn proxy_uses_representative_depth() {
    let view = usdc_view();
    let config = RiskConfig::default();
    let depth = depth_curve(&view, &config.pct_moves).expect("depth");
    let level = representative_depth(&depth).expect("level");
    let proxy = slippage_from_depth_proxy(level, &config.trade_sizes_quote, config.depth_proxy_k);
    assert_eq!(proxy.len(), config.trade_sizes_quote.len());
    let implied: Vec<f64> = proxy.iter().map(|p| p.implied_slippage).collect();
    assert_non_decreasing(&implied, "proxy slippage");
}
