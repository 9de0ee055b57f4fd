//! Analysis configuration.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! seed = 7
//! vol_regimes_annual = [0.5, 1.5]
//! quote = "token0"
//! ```

use std::path::Path;

use eyre::{bail, Result, WrapErr};
use serde::{Deserialize, Serialize};

use clrisk_data::SnapshotMeta;

use crate::pool::{QuoteToken, TradeSide};
use crate::tail::PathScenario;

fn default_seed() -> u64 {
    42
}
fn default_trade_sizes() -> Vec<f64> {
    vec![1_000.0, 10_000.0, 100_000.0, 1_000_000.0]
}
fn default_lp_ranges() -> Vec<f64> {
    vec![0.01, 0.02, 0.05]
}
fn default_vol_regimes() -> Vec<f64> {
    vec![0.30, 0.60, 1.00]
}
fn default_horizon_days() -> u32 {
    7
}
fn default_steps_per_day() -> u32 {
    1440
}
fn default_n_paths() -> usize {
    500
}
fn default_n_mc() -> usize {
    2000
}
fn default_tick_window() -> i32 {
    50_000
}
fn default_pct_moves() -> Vec<f64> {
    vec![
        -0.20, -0.10, -0.05, -0.02, -0.01, -0.005, 0.0, 0.005, 0.01, 0.02, 0.05, 0.10, 0.20,
    ]
}
fn default_band_edges() -> Vec<f64> {
    vec![-0.20, -0.10, -0.05, -0.02, -0.01, 0.0, 0.01, 0.02, 0.05, 0.10, 0.20]
}
fn default_proxy_k() -> f64 {
    1e-9
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Trade sizes in quote units.
    #[serde(default = "default_trade_sizes")]
    pub trade_sizes_quote: Vec<f64>,
    /// LP half-widths around spot, `0.01` is ±1%.
    #[serde(default = "default_lp_ranges")]
    pub lp_ranges_pct: Vec<f64>,
    #[serde(default = "default_vol_regimes")]
    pub vol_regimes_annual: Vec<f64>,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_steps_per_day")]
    pub steps_per_day: u32,
    #[serde(default = "default_n_paths")]
    pub n_paths: usize,
    /// Monte Carlo draws per tail-slippage cell.
    #[serde(default = "default_n_mc")]
    pub n_mc: usize,
    /// Ticks kept on each side of the current tick.
    #[serde(default = "default_tick_window")]
    pub tick_window: i32,
    #[serde(default = "default_pct_moves")]
    pub pct_moves: Vec<f64>,
    #[serde(default = "default_band_edges")]
    pub distribution_bands_pct: Vec<f64>,
    #[serde(default)]
    pub quote: QuoteToken,
    #[serde(default)]
    pub side: TradeSide,
    /// Coefficient of the depth-proxy slippage.
    #[serde(default = "default_proxy_k")]
    pub depth_proxy_k: f64,
    /// Token decimals to use when the snapshot does not record them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token0_decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token1_decimals: Option<u8>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            trade_sizes_quote: default_trade_sizes(),
            lp_ranges_pct: default_lp_ranges(),
            vol_regimes_annual: default_vol_regimes(),
            horizon_days: default_horizon_days(),
            steps_per_day: default_steps_per_day(),
            n_paths: default_n_paths(),
            n_mc: default_n_mc(),
            tick_window: default_tick_window(),
            pct_moves: default_pct_moves(),
            distribution_bands_pct: default_band_edges(),
            quote: QuoteToken::default(),
            side: TradeSide::default(),
            depth_proxy_k: default_proxy_k(),
            token0_decimals: None,
            token1_decimals: None,
        }
    }
}

impl RiskConfig {
    /// Read and validate a TOML config file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, does not parse, or fails
    /// [`Self::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    ///
    /// # Errors
    /// Same as [`Self::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// # Errors
    /// Returns error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        check_grid("trade_sizes_quote", &self.trade_sizes_quote, |v| v >= 0.0)?;
        check_grid("lp_ranges_pct", &self.lp_ranges_pct, |v| v > 0.0 && v < 1.0)?;
        check_grid("vol_regimes_annual", &self.vol_regimes_annual, |v| v >= 0.0)?;
        check_grid("pct_moves", &self.pct_moves, |v| v > -1.0)?;
        check_grid("distribution_bands_pct", &self.distribution_bands_pct, |v| v > -1.0)?;

        if self.distribution_bands_pct.len() < 2 {
            bail!("distribution_bands_pct needs at least two edges");
        }
        if self.horizon_days == 0 || self.steps_per_day == 0 {
            bail!("horizon_days and steps_per_day must be positive");
        }
        if self.n_paths == 0 || self.n_mc == 0 {
            bail!("n_paths and n_mc must be positive");
        }
        if self.tick_window <= 0 {
            bail!("tick_window must be positive, got {}", self.tick_window);
        }
        if !(self.depth_proxy_k.is_finite() && self.depth_proxy_k >= 0.0) {
            bail!("depth_proxy_k must be non-negative, got {}", self.depth_proxy_k);
        }
        Ok(())
    }

    /// Write configured token decimals into the snapshot meta.
    ///
    /// Configured values replace recorded ones; a disagreement is logged.
    pub fn apply_decimals(&self, meta: &mut SnapshotMeta) {
        for (token, configured, recorded) in [
            ("token0", self.token0_decimals, &mut meta.token0_decimals),
            ("token1", self.token1_decimals, &mut meta.token1_decimals),
        ] {
            let Some(configured) = configured else { continue };
            if let Some(previous) = recorded.replace(configured) {
                if previous != configured {
                    tracing::warn!(token, previous, configured, "overriding snapshot token decimals");
                }
            }
        }
    }

    pub fn path_scenario(&self) -> PathScenario {
        PathScenario {
            horizon_days: self.horizon_days,
            steps_per_day: self.steps_per_day,
            n_paths: self.n_paths,
            seed: self.seed,
        }
    }
}

fn check_grid(name: &str, values: &[f64], valid: impl Fn(f64) -> bool) -> Result<()> {
    if values.is_empty() {
        bail!("{name} must not be empty");
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || !valid(**v)) {
        bail!("{name} contains invalid value {bad}");
    }
    Ok(())
}
