//! Type definitions for Uniswap V3 pool snapshots.
//!
//! A snapshot is a frozen, point-in-time view of one pool: the tick-indexed
//! `liquidityNet` map plus the pool's current tick and price. Analyses only
//! read it; nothing in the workspace mutates a snapshot after construction.

use chrono::{DateTime, Utc};
use eyre::{bail, eyre, Result, WrapErr};
use serde::{Deserialize, Deserializer, Serialize};

/// Lowest tick representable by a Uniswap V3 pool.
pub const MIN_TICK: i32 = -887_272;
/// Highest tick representable by a Uniswap V3 pool.
pub const MAX_TICK: i32 = 887_272;

/// Liquidity change recorded at one initialized tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickLiquidity {
    /// Tick index.
    pub tick: i32,
    /// Signed change in active liquidity when the price crosses this tick upwards.
    pub liquidity_net: f64,
    /// Total liquidity referencing this tick (optional in older snapshots).
    pub liquidity_gross: Option<f64>,
}

/// Snapshot metadata, stored as `<base>.meta.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Human-readable pair name, e.g. `"USDC/WETH"`.
    pub pool_name: String,
    /// Fee tier in hundredths of a bip (`"500"` = 0.05%).
    #[serde(deserialize_with = "string_or_number")]
    pub fee_tier: String,
    /// Capture time, RFC 3339.
    pub timestamp_utc: String,
    /// Current pool tick.
    pub current_tick: i32,
    /// Current price, token1 per token0, decimal-adjusted.
    pub current_price: f64,
    /// File name of the ticks parquet next to the meta file.
    #[serde(default)]
    pub ticks_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token0_decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token1_decimals: Option<u8>,
    /// Explicit tick spacing; derived from the fee tier when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_spacing: Option<i32>,
    /// In-range liquidity reported by the pool (`liquidity()`), raw units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<f64>,
    /// Raw `sqrtPriceX96` as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqrt_price_x96: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Tick spacing Uniswap V3 assigns to each standard fee tier.
pub fn tick_spacing_for_fee_tier(fee_pips: u32) -> Option<i32> {
    match fee_pips {
        100 => Some(1),
        500 => Some(10),
        3000 => Some(60),
        10_000 => Some(200),
        _ => None,
    }
}

impl SnapshotMeta {
    /// Fee tier parsed as hundredths of a bip.
    ///
    /// # Errors
    /// Returns error if `fee_tier` is not an unsigned integer.
    pub fn fee_pips(&self) -> Result<u32> {
        self.fee_tier
            .trim()
            .parse::<u32>()
            .wrap_err_with(|| format!("fee tier '{}' is not an integer", self.fee_tier))
    }

    /// Swap fee as a fraction of the input amount (500 → 0.0005).
    pub fn fee_fraction(&self) -> Result<f64> {
        Ok(f64::from(self.fee_pips()?) / 1_000_000.0)
    }

    /// Explicit tick spacing, or the one implied by the fee tier.
    pub fn effective_tick_spacing(&self) -> Option<i32> {
        self.tick_spacing.or_else(|| {
            self.fee_pips()
                .ok()
                .and_then(tick_spacing_for_fee_tier)
        })
    }

    /// Parsed capture timestamp.
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp_utc)
            .map(|ts| ts.with_timezone(&Utc))
            .wrap_err_with(|| format!("invalid timestamp_utc '{}'", self.timestamp_utc))
    }
}

/// Frozen pool state consumed by every analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolSnapshot {
    pub meta: SnapshotMeta,
    /// Initialized ticks, ascending.
    pub ticks: Vec<TickLiquidity>,
}

impl PoolSnapshot {
    /// Builds a snapshot, sorting ticks ascending.
    pub fn new(meta: SnapshotMeta, mut ticks: Vec<TickLiquidity>) -> Self {
        ticks.sort_by_key(|t| t.tick);
        Self { meta, ticks }
    }

    /// Checks the structural invariants every analysis relies on.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.ticks.is_empty() {
            bail!("snapshot '{}' has no ticks", self.meta.pool_name);
        }
        if !(self.meta.current_price.is_finite() && self.meta.current_price > 0.0) {
            bail!(
                "current_price must be finite and positive, got {}",
                self.meta.current_price
            );
        }
        if !(MIN_TICK..=MAX_TICK).contains(&self.meta.current_tick) {
            bail!("current_tick {} out of range", self.meta.current_tick);
        }
        self.meta.timestamp()?;
        self.meta.fee_pips()?;

        let spacing = self.meta.effective_tick_spacing();
        if let Some(spacing) = spacing {
            if spacing <= 0 {
                bail!("tick spacing must be positive, got {spacing}");
            }
        }

        let mut previous: Option<i32> = None;
        for row in &self.ticks {
            if !(MIN_TICK..=MAX_TICK).contains(&row.tick) {
                bail!("tick {} outside [{MIN_TICK}, {MAX_TICK}]", row.tick);
            }
            if let Some(prev) = previous {
                if row.tick <= prev {
                    return Err(eyre!(
                        "ticks must be strictly increasing: {} follows {}",
                        row.tick,
                        prev
                    ));
                }
            }
            if !row.liquidity_net.is_finite() {
                bail!("tick {} has non-finite liquidity_net", row.tick);
            }
            if let Some(gross) = row.liquidity_gross {
                if !gross.is_finite() || gross < 0.0 {
                    bail!("tick {} has invalid liquidity_gross {}", row.tick, gross);
                }
            }
            if let Some(spacing) = spacing {
                if row.tick % spacing != 0 {
                    bail!("tick {} is not aligned to spacing {}", row.tick, spacing);
                }
            }
            previous = Some(row.tick);
        }

        Ok(())
    }
}
