//! clrisk-sim: concentrated-liquidity simulation primitives.
//!
//! Reconstructs the active liquidity profile of a Uniswap V3 pool snapshot,
//! executes swaps across it tick by tick, and simulates price paths for
//! volatility scenarios.

pub mod gbm;
pub mod math;
pub mod profile;
pub mod swap;

pub use gbm::{simulate_price_paths_gbm, GbmParams, PricePaths};
pub use math::PriceScale;
pub use profile::{LiquidityProfile, LiquiditySegment};
pub use swap::{simulate_exact_input, SwapDirection, SwapQuote};
