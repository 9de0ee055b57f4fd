//! clrisk-analysis: liquidity and execution-risk reports for a pool snapshot.
//!
//! - [`distribution`]: liquidity and token value by price band
//! - [`depth`]: swap size needed to move the price
//! - [`slippage`]: execution price versus trade size
//! - [`tail`]: out-of-range probability and tail slippage under volatility

pub mod config;
pub mod depth;
pub mod distribution;
pub mod pool;
pub mod slippage;
pub mod tail;

pub use config::RiskConfig;
pub use depth::{depth_curve, DepthPoint};
pub use distribution::{liquidity_distribution, LiquidityBand};
pub use pool::{PoolView, QuoteToken, TradeSide};
pub use slippage::{slippage_curve, slippage_from_depth_proxy, SlippagePoint};
pub use tail::{
    out_of_range_table, quantile, tail_slippage_table, ShockedProfileModel, SlippageModel,
};
