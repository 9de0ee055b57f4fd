//! Piecewise-constant active liquidity reconstructed from `liquidityNet`.
//!
//! Between two consecutive initialized ticks the active liquidity is
//! constant; crossing tick `t` upwards adds `liquidity_net(t)`. A snapshot
//! only carries ticks inside a window around the current tick, so the
//! cumulative sum is known up to a constant:
//!
//! - [`ProfileAnchor::PoolLiquidity`]: the snapshot carries the pool's
//!   in-range liquidity, and the segment holding the current tick is pinned to it.
//! - [`ProfileAnchor::MinimumNonNegative`]: the smallest shift that makes every
//!   segment non-negative (exact when the window covers every position).
//!
//! Outside the window the profile holds no liquidity.

use clrisk_data::types::PoolSnapshot;
use eyre::{bail, Result};
use serde::Serialize;

use crate::math::{tick_to_sqrt_price, PriceScale};

/// How the cumulative `liquidity_net` sum was pinned to absolute liquidity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAnchor {
    PoolLiquidity,
    MinimumNonNegative,
}

/// Constant liquidity over `[tick_lower, tick_upper)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiquiditySegment {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub sqrt_price_lower: f64,
    pub sqrt_price_upper: f64,
    /// Active liquidity, raw units.
    pub liquidity: f64,
}

impl LiquiditySegment {
    pub fn new(tick_lower: i32, tick_upper: i32, liquidity: f64) -> Self {
        Self {
            tick_lower,
            tick_upper,
            sqrt_price_lower: tick_to_sqrt_price(tick_lower),
            sqrt_price_upper: tick_to_sqrt_price(tick_upper),
            liquidity,
        }
    }
}

/// One chartable point of the liquidity-by-price profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfilePoint {
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Human price at `tick_lower`.
    pub price_lower: f64,
    /// Human price at `tick_upper`.
    pub price_upper: f64,
    pub liquidity: f64,
}

/// Token amounts (raw units) held by the profile over a sqrt-price interval.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RangeAmounts {
    pub amount0: f64,
    pub amount1: f64,
    /// `false` when part of the interval lies outside the profile.
    pub within_profile: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiquidityProfile {
    segments: Vec<LiquiditySegment>,
    current_tick: i32,
    anchor: ProfileAnchor,
}

impl LiquidityProfile {
    /// Reconstruct active liquidity within `current_tick ± tick_window`.
    ///
    /// # Errors
    /// Returns error if the window is negative or fewer than two initialized
    /// ticks fall inside it.
    #[tracing::instrument(skip(snapshot), fields(pool = %snapshot.meta.pool_name))]
    pub fn build(snapshot: &PoolSnapshot, tick_window: i32) -> Result<Self> {
        if tick_window < 0 {
            bail!("tick window must be non-negative, got {tick_window}");
        }
        let current_tick = snapshot.meta.current_tick;
        let low = current_tick.saturating_sub(tick_window);
        let high = current_tick.saturating_add(tick_window);

        let window: Vec<_> = snapshot
            .ticks
            .iter()
            .filter(|t| t.tick >= low && t.tick <= high)
            .collect();
        if window.len() < 2 {
            bail!(
                "need at least two initialized ticks within ±{} of tick {}, found {}",
                tick_window,
                current_tick,
                window.len()
            );
        }

        let mut running = 0.0;
        let cumulative: Vec<f64> = window[..window.len() - 1]
            .iter()
            .map(|t| {
                running += t.liquidity_net;
                running
            })
            .collect();

        let containing = window
            .windows(2)
            .position(|pair| pair[0].tick <= current_tick && current_tick < pair[1].tick);

        let (anchor, offset) = match (snapshot.meta.liquidity, containing) {
            (Some(pool_liquidity), Some(idx)) => {
                (ProfileAnchor::PoolLiquidity, pool_liquidity - cumulative[idx])
            }
            (pool_liquidity, _) => {
                if pool_liquidity.is_some() {
                    tracing::warn!(
                        current_tick,
                        "current tick outside initialized window, ignoring pool liquidity"
                    );
                }
                let min = cumulative.iter().copied().fold(f64::INFINITY, f64::min);
                (ProfileAnchor::MinimumNonNegative, (-min).max(0.0))
            }
        };

        let mut clamped = 0usize;
        let segments: Vec<LiquiditySegment> = window
            .windows(2)
            .zip(&cumulative)
            .map(|(pair, cum)| {
                let mut liquidity = cum + offset;
                if liquidity < 0.0 {
                    clamped += 1;
                    liquidity = 0.0;
                }
                LiquiditySegment::new(pair[0].tick, pair[1].tick, liquidity)
            })
            .collect();

        if clamped > 0 {
            tracing::warn!(clamped, "negative active liquidity clamped to zero");
        }
        tracing::debug!(
            segments = segments.len(),
            anchor = ?anchor,
            offset,
            "liquidity profile built"
        );

        Ok(Self {
            segments,
            current_tick,
            anchor,
        })
    }

    /// Profile from explicit segments (contiguous, ascending).
    ///
    /// # Errors
    /// Returns error if segments are empty, non-contiguous, empty-width, or
    /// carry negative or non-finite liquidity.
    pub fn from_segments(segments: Vec<LiquiditySegment>, current_tick: i32) -> Result<Self> {
        if segments.is_empty() {
            bail!("profile needs at least one segment");
        }
        for seg in &segments {
            if seg.tick_upper <= seg.tick_lower {
                bail!("segment [{}, {}) is empty", seg.tick_lower, seg.tick_upper);
            }
            if !seg.liquidity.is_finite() || seg.liquidity < 0.0 {
                bail!("segment at {} has invalid liquidity {}", seg.tick_lower, seg.liquidity);
            }
        }
        for pair in segments.windows(2) {
            if pair[0].tick_upper != pair[1].tick_lower {
                bail!(
                    "segments not contiguous at {} / {}",
                    pair[0].tick_upper,
                    pair[1].tick_lower
                );
            }
        }
        Ok(Self {
            segments,
            current_tick,
            anchor: ProfileAnchor::MinimumNonNegative,
        })
    }

    pub fn segments(&self) -> &[LiquiditySegment] {
        &self.segments
    }

    pub fn current_tick(&self) -> i32 {
        self.current_tick
    }

    pub fn anchor(&self) -> ProfileAnchor {
        self.anchor
    }

    /// Lowest and highest tick covered.
    pub fn tick_bounds(&self) -> (i32, i32) {
        (
            self.segments[0].tick_lower,
            self.segments[self.segments.len() - 1].tick_upper,
        )
    }

    /// Raw sqrt prices at [`Self::tick_bounds`].
    pub fn sqrt_price_bounds(&self) -> (f64, f64) {
        (
            self.segments[0].sqrt_price_lower,
            self.segments[self.segments.len() - 1].sqrt_price_upper,
        )
    }

    /// Active liquidity at `tick`; zero outside the profile.
    pub fn active_liquidity_at(&self, tick: i32) -> f64 {
        let idx = self.segments.partition_point(|s| s.tick_upper <= tick);
        match self.segments.get(idx) {
            Some(seg) if seg.tick_lower <= tick => seg.liquidity,
            _ => 0.0,
        }
    }

    /// Largest liquidity of any segment.
    pub fn peak_liquidity(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.liquidity)
            .fold(0.0, f64::max)
    }

    /// Segments with human price bounds, for charting.
    pub fn points(&self, scale: &PriceScale) -> Vec<ProfilePoint> {
        self.segments
            .iter()
            .map(|seg| ProfilePoint {
                tick_lower: seg.tick_lower,
                tick_upper: seg.tick_upper,
                price_lower: scale.raw_to_human_price(seg.sqrt_price_lower.powi(2)),
                price_upper: scale.raw_to_human_price(seg.sqrt_price_upper.powi(2)),
                liquidity: seg.liquidity,
            })
            .collect()
    }

    /// Token amounts held over `[min(a,b), max(a,b)]` in raw sqrt price.
    ///
    /// Per segment: `Δx = L(1/√lo − 1/√hi)`, `Δy = L(√hi − √lo)`.
    pub fn amounts_between(&self, sqrt_a: f64, sqrt_b: f64) -> RangeAmounts {
        let (lo, hi) = if sqrt_a <= sqrt_b {
            (sqrt_a, sqrt_b)
        } else {
            (sqrt_b, sqrt_a)
        };
        let (bound_lo, bound_hi) = self.sqrt_price_bounds();

        let mut amounts = RangeAmounts {
            within_profile: lo >= bound_lo && hi <= bound_hi,
            ..RangeAmounts::default()
        };
        for seg in &self.segments {
            let s_lo = lo.max(seg.sqrt_price_lower);
            let s_hi = hi.min(seg.sqrt_price_upper);
            if s_hi <= s_lo || seg.liquidity <= 0.0 {
                continue;
            }
            amounts.amount0 += seg.liquidity * (1.0 / s_lo - 1.0 / s_hi);
            amounts.amount1 += seg.liquidity * (s_hi - s_lo);
        }
        amounts
    }

    /// Log-price weighted mean liquidity over the interval; zero-width → point value.
    pub fn mean_liquidity_between(&self, sqrt_a: f64, sqrt_b: f64) -> f64 {
        let (lo, hi) = if sqrt_a <= sqrt_b {
            (sqrt_a, sqrt_b)
        } else {
            (sqrt_b, sqrt_a)
        };
        let width = hi.ln() - lo.ln();
        if width <= 0.0 {
            let idx = self.segments.partition_point(|s| s.sqrt_price_upper <= lo);
            return match self.segments.get(idx) {
                Some(seg) if seg.sqrt_price_lower <= lo => seg.liquidity,
                _ => 0.0,
            };
        }

        let weighted: f64 = self
            .segments
            .iter()
            .filter_map(|seg| {
                let s_lo = lo.max(seg.sqrt_price_lower);
                let s_hi = hi.min(seg.sqrt_price_upper);
                (s_hi > s_lo).then(|| seg.liquidity * (s_hi.ln() - s_lo.ln()))
            })
            .sum();
        weighted / width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clrisk_data::types::{SnapshotMeta, TickLiquidity};

    fn snapshot(ticks: &[(i32, f64)], current_tick: i32, liquidity: Option<f64>) -> PoolSnapshot {
        let meta = SnapshotMeta {
            pool_name: "A/B".to_string(),
            fee_tier: "3000".to_string(),
            timestamp_utc: "2025-01-01T00:00:00Z".to_string(),
            current_tick,
            current_price: 1.0,
            ticks_file: String::new(),
            token0_decimals: Some(18),
            token1_decimals: Some(18),
            tick_spacing: None,
            liquidity,
            sqrt_price_x96: None,
        };
        let rows = ticks
            .iter()
            .map(|(tick, net)| TickLiquidity {
                tick: *tick,
                liquidity_net: *net,
                liquidity_gross: None,
            })
            .collect();
        PoolSnapshot::new(meta, rows)
    }

    #[test]
    fn full_window_reconstructs_positions() {
        // Two positions: [-120, 120) with 100, [-60, 60) with 50.
        let snap = snapshot(
            &[(-120, 100.0), (-60, 50.0), (60, -50.0), (120, -100.0)],
            0,
            None,
        );
        let profile = LiquidityProfile::build(&snap, 10_000).expect("profile");

        assert_eq!(profile.anchor(), ProfileAnchor::MinimumNonNegative);
        assert_eq!(profile.segments().len(), 3);
        assert_eq!(profile.active_liquidity_at(-100), 100.0);
        assert_eq!(profile.active_liquidity_at(0), 150.0);
        assert_eq!(profile.active_liquidity_at(119), 100.0);
        assert_eq!(profile.active_liquidity_at(120), 0.0);
        assert_eq!(profile.active_liquidity_at(-121), 0.0);
        assert_eq!(profile.tick_bounds(), (-120, 120));
        assert_eq!(profile.peak_liquidity(), 150.0);
    }

    #[test]
    fn pool_liquidity_pins_current_segment() {
        // Window missing a wide position's lower tick: cumulative sum starts at 0.
        let snap = snapshot(&[(-60, 50.0), (60, -50.0), (120, -100.0)], 0, Some(150.0));
        let profile = LiquidityProfile::build(&snap, 10_000).expect("profile");

        assert_eq!(profile.anchor(), ProfileAnchor::PoolLiquidity);
        assert_eq!(profile.active_liquidity_at(0), 150.0);
        assert_eq!(profile.active_liquidity_at(90), 100.0);
    }

    #[test]
    fn minimum_anchor_lifts_negative_sums() {
        let snap = snapshot(&[(-60, 50.0), (60, -50.0), (120, -100.0)], 0, None);
        let profile = LiquidityProfile::build(&snap, 10_000).expect("profile");
        // cumulative: 50, 0 → minimum 0, no shift needed; upper tail beyond 120 is outside
        assert_eq!(profile.active_liquidity_at(0), 50.0);
        assert_eq!(profile.active_liquidity_at(90), 0.0);

        let lifted = snapshot(&[(-60, -20.0), (60, -30.0), (120, 50.0)], 0, None);
        let profile = LiquidityProfile::build(&lifted, 10_000).expect("profile");
        assert!(profile.segments().iter().all(|s| s.liquidity >= 0.0));
        assert_eq!(profile.active_liquidity_at(90), 0.0);
        assert_eq!(profile.active_liquidity_at(0), 30.0);
    }

    #[test]
    fn window_filters_far_ticks() {
        let snap = snapshot(
            &[(-50_000, 10.0), (-60, 50.0), (60, -50.0), (50_000, -10.0)],
            0,
            None,
        );
        let profile = LiquidityProfile::build(&snap, 1_000).expect("profile");
        assert_eq!(profile.tick_bounds(), (-60, 60));
        assert!(LiquidityProfile::build(&snap, 10).is_err());
    }

    #[test]
    fn amounts_match_closed_form() {
        let profile =
            LiquidityProfile::from_segments(vec![LiquiditySegment::new(-1000, 1000, 1e6)], 0)
                .expect("profile");
        let a = tick_to_sqrt_price(-500);
        let b = tick_to_sqrt_price(500);
        let amounts = profile.amounts_between(b, a);
        assert!(amounts.within_profile);
        assert!((amounts.amount1 - 1e6 * (b - a)).abs() < 1e-6);
        assert!((amounts.amount0 - 1e6 * (1.0 / a - 1.0 / b)).abs() < 1e-6);

        let outside = profile.amounts_between(a, tick_to_sqrt_price(2000));
        assert!(!outside.within_profile);
        let capped = profile.amounts_between(a, tick_to_sqrt_price(1000));
        assert!((outside.amount1 - capped.amount1).abs() < 1e-9);
    }

    #[test]
    fn mean_liquidity_weights_by_log_price() {
        let profile = LiquidityProfile::from_segments(
            vec![
                LiquiditySegment::new(-100, 0, 10.0),
                LiquiditySegment::new(0, 100, 30.0),
            ],
            0,
        )
        .expect("profile");
        let mean =
            profile.mean_liquidity_between(tick_to_sqrt_price(-100), tick_to_sqrt_price(100));
        assert!((mean - 20.0).abs() < 1e-9);
        assert_eq!(profile.mean_liquidity_between(1.0, 1.0), 30.0);
    }

    #[test]
    fn from_segments_rejects_gaps() {
        let err = LiquidityProfile::from_segments(
            vec![
                LiquiditySegment::new(-100, 0, 1.0),
                LiquiditySegment::new(10, 100, 1.0),
            ],
            0,
        );
        assert!(err.is_err());
    }
}
