//! Analysis view of a pool: profile, token scale, spot, fee, quote convention.
//!
//! Every report is expressed in a *base* and a *quote* token. With
//! [`QuoteToken::Token1`] (default) the base is token0 and prices read as
//! the pool's own token1/token0; with [`QuoteToken::Token0`] the view is
//! inverted.

use std::fmt;
use std::str::FromStr;

use clrisk_data::types::PoolSnapshot;
use clrisk_sim::math::{spot_sqrt_price, PriceScale};
use clrisk_sim::{LiquidityProfile, SwapDirection};
use eyre::{bail, eyre, Result};
use serde::{Deserialize, Serialize};

/// Token that trade sizes, prices and values are denominated in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteToken {
    Token0,
    #[default]
    Token1,
}

impl FromStr for QuoteToken {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "token0" | "0" => Ok(Self::Token0),
            "token1" | "1" => Ok(Self::Token1),
            other => Err(eyre!("unknown quote token '{other}', expected token0 or token1")),
        }
    }
}

impl fmt::Display for QuoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token0 => write!(f, "token0"),
            Self::Token1 => write!(f, "token1"),
        }
    }
}

/// Direction of a trade in the base token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Pay quote, receive base.
    #[default]
    Buy,
    /// Pay base, receive quote.
    Sell,
}

impl FromStr for TradeSide {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(eyre!("unknown trade side '{other}', expected buy or sell")),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PoolView {
    pub pool_name: String,
    pub profile: LiquidityProfile,
    pub scale: PriceScale,
    /// Raw sqrt price at snapshot time.
    pub spot_sqrt_price: f64,
    /// Swap fee as a fraction of input.
    pub fee: f64,
    pub quote: QuoteToken,
}

impl PoolView {
    /// Build the view from a validated snapshot.
    ///
    /// # Errors
    /// Returns error if the profile cannot be reconstructed, the fee tier is
    /// invalid, or the spot price cannot be derived.
    #[tracing::instrument(skip(snapshot), fields(pool = %snapshot.meta.pool_name))]
    pub fn from_snapshot(snapshot: &PoolSnapshot, tick_window: i32, quote: QuoteToken) -> Result<Self> {
        let scale = PriceScale::from_snapshot(snapshot)?;
        let profile = LiquidityProfile::build(snapshot, tick_window)?;
        let spot_sqrt_price = spot_sqrt_price(&snapshot.meta, &scale)?;
        let fee = snapshot.meta.fee_fraction()?;

        let (lo, hi) = profile.sqrt_price_bounds();
        if spot_sqrt_price < lo || spot_sqrt_price > hi {
            tracing::warn!(
                current_tick = snapshot.meta.current_tick,
                "spot price outside the reconstructed profile, swaps will not fill"
            );
        }

        Self::new(
            snapshot.meta.pool_name.clone(),
            profile,
            scale,
            spot_sqrt_price,
            fee,
            quote,
        )
    }

    /// # Errors
    /// Returns error if the spot sqrt price is not positive or the fee is
    /// outside `[0, 1)`.
    pub fn new(
        pool_name: String,
        profile: LiquidityProfile,
        scale: PriceScale,
        spot_sqrt_price: f64,
        fee: f64,
        quote: QuoteToken,
    ) -> Result<Self> {
        if !(spot_sqrt_price.is_finite() && spot_sqrt_price > 0.0) {
            bail!("spot sqrt price must be positive, got {spot_sqrt_price}");
        }
        if !(0.0..1.0).contains(&fee) {
            bail!("fee must be in [0, 1), got {fee}");
        }
        Ok(Self {
            pool_name,
            profile,
            scale,
            spot_sqrt_price,
            fee,
            quote,
        })
    }

    /// Human token1/token0 price at a raw sqrt price.
    pub fn pool_price_at(&self, sqrt_price: f64) -> f64 {
        self.scale.raw_to_human_price(sqrt_price * sqrt_price)
    }

    /// Human token1/token0 spot price.
    pub fn spot_pool_price(&self) -> f64 {
        self.pool_price_at(self.spot_sqrt_price)
    }

    /// Quote per base at a raw sqrt price.
    pub fn quote_price_at(&self, sqrt_price: f64) -> f64 {
        let pool_price = self.pool_price_at(sqrt_price);
        match self.quote {
            QuoteToken::Token1 => pool_price,
            QuoteToken::Token0 => 1.0 / pool_price,
        }
    }

    /// Quote per base at spot.
    pub fn spot_quote_price(&self) -> f64 {
        self.quote_price_at(self.spot_sqrt_price)
    }

    /// Raw sqrt price at which the quote price equals `quote_price`.
    pub fn sqrt_price_for_quote_price(&self, quote_price: f64) -> f64 {
        let pool_price = match self.quote {
            QuoteToken::Token1 => quote_price,
            QuoteToken::Token0 => 1.0 / quote_price,
        };
        self.scale.human_to_raw_price(pool_price).sqrt()
    }

    /// Swap direction that executes `side` in the base token.
    pub fn direction_for(&self, side: TradeSide) -> SwapDirection {
        match (self.quote, side) {
            (QuoteToken::Token1, TradeSide::Buy) | (QuoteToken::Token0, TradeSide::Sell) => {
                SwapDirection::OneForZero
            }
            (QuoteToken::Token1, TradeSide::Sell) | (QuoteToken::Token0, TradeSide::Buy) => {
                SwapDirection::ZeroForOne
            }
        }
    }

    pub fn quote_to_raw(&self, human: f64) -> f64 {
        match self.quote {
            QuoteToken::Token0 => self.scale.token0_to_raw(human),
            QuoteToken::Token1 => self.scale.token1_to_raw(human),
        }
    }

    pub fn base_to_raw(&self, human: f64) -> f64 {
        match self.quote {
            QuoteToken::Token0 => self.scale.token1_to_raw(human),
            QuoteToken::Token1 => self.scale.token0_to_raw(human),
        }
    }

    pub fn quote_to_human(&self, raw: f64) -> f64 {
        match self.quote {
            QuoteToken::Token0 => self.scale.token0_to_human(raw),
            QuoteToken::Token1 => self.scale.token1_to_human(raw),
        }
    }

    pub fn base_to_human(&self, raw: f64) -> f64 {
        match self.quote {
            QuoteToken::Token0 => self.scale.token1_to_human(raw),
            QuoteToken::Token1 => self.scale.token0_to_human(raw),
        }
    }

    /// Split human token0/token1 amounts into `(base, quote)`.
    pub fn base_quote_amounts(&self, amount0: f64, amount1: f64) -> (f64, f64) {
        match self.quote {
            QuoteToken::Token1 => (amount0, amount1),
            QuoteToken::Token0 => (amount1, amount0),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use clrisk_sim::LiquiditySegment;

    /// Pool at price 1 with a dense core (±1000 ticks) and thinner wings.
    pub fn layered_view(quote: QuoteToken) -> PoolView {
        let profile = LiquidityProfile::from_segments(
            vec![
                LiquiditySegment::new(-4000, -1000, 2e9),
                LiquiditySegment::new(-1000, 1000, 1e10),
                LiquiditySegment::new(1000, 4000, 2e9),
            ],
            0,
        )
        .expect("profile");
        PoolView::new(
            "TEST/POOL".to_string(),
            profile,
            PriceScale::new(0, 0),
            1.0,
            0.003,
            quote,
        )
        .expect("view")
    }
}
