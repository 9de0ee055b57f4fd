use std::path::Path;

use clrisk_analysis::depth::DepthPoint;
use clrisk_analysis::distribution::LiquidityBand;
use clrisk_analysis::slippage::{ProxySlippage, SlippagePoint};
use clrisk_analysis::tail::{OutOfRangeRow, TailSlippageRow};
use clrisk_sim::profile::ProfilePoint;
use clrisk_sim::PriceScale;
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(eyre!(
                "unknown output format '{value}'; use 'table', 'json', or 'csv'"
            )),
        }
    }
}

/// A report row printable as a table row or a CSV line.
pub trait ReportRow: Serialize {
    const HEADERS: &'static [&'static str];

    /// Rounded cells for the terminal.
    fn cells(&self) -> Vec<String>;

    /// Full-precision cells for export.
    fn csv_cells(&self) -> Vec<String>;
}

fn pct(value: f64) -> String {
    if value.is_finite() {
        format!("{:.4}%", value * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn num(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if !value.is_finite() {
        "n/a".to_string()
    } else if value.abs() >= 1e6 || value.abs() < 1e-3 {
        format!("{value:.4e}")
    } else {
        format!("{value:.4}")
    }
}

fn flag(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

impl ReportRow for ProfilePoint {
    const HEADERS: &'static [&'static str] =
        &["tick_lower", "tick_upper", "price_lower", "price_upper", "liquidity"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.tick_lower.to_string(),
            self.tick_upper.to_string(),
            num(self.price_lower),
            num(self.price_upper),
            num(self.liquidity),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.tick_lower.to_string(),
            self.tick_upper.to_string(),
            self.price_lower.to_string(),
            self.price_upper.to_string(),
            self.liquidity.to_string(),
        ]
    }
}

impl ReportRow for LiquidityBand {
    const HEADERS: &'static [&'static str] = &[
        "pct_lower",
        "pct_upper",
        "price_lower",
        "price_upper",
        "mean_liquidity",
        "amount0",
        "amount1",
        "value_quote",
        "share",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            pct(self.pct_lower),
            pct(self.pct_upper),
            num(self.price_lower),
            num(self.price_upper),
            num(self.mean_liquidity),
            num(self.amount0),
            num(self.amount1),
            num(self.value_quote),
            pct(self.share),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.pct_lower.to_string(),
            self.pct_upper.to_string(),
            self.price_lower.to_string(),
            self.price_upper.to_string(),
            self.mean_liquidity.to_string(),
            self.amount0.to_string(),
            self.amount1.to_string(),
            self.value_quote.to_string(),
            self.share.to_string(),
        ]
    }
}

impl ReportRow for DepthPoint {
    const HEADERS: &'static [&'static str] = &[
        "pct_move",
        "price_target",
        "depth_token0",
        "depth_token1",
        "depth_quote",
        "reachable",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            pct(self.pct_move),
            num(self.price_target),
            num(self.depth_token0),
            num(self.depth_token1),
            num(self.depth_quote),
            flag(self.reachable),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.pct_move.to_string(),
            self.price_target.to_string(),
            self.depth_token0.to_string(),
            self.depth_token1.to_string(),
            self.depth_quote.to_string(),
            self.reachable.to_string(),
        ]
    }
}

impl ReportRow for SlippagePoint {
    const HEADERS: &'static [&'static str] = &[
        "trade_size",
        "side",
        "amount_in",
        "amount_out",
        "avg_price",
        "slippage",
        "price_impact",
        "ticks_crossed",
        "exhausted",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            num(self.trade_size),
            self.side.to_string(),
            num(self.amount_in),
            num(self.amount_out),
            num(self.avg_price),
            pct(self.slippage),
            pct(self.price_impact),
            self.ticks_crossed.to_string(),
            flag(self.exhausted),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.trade_size.to_string(),
            self.side.to_string(),
            self.amount_in.to_string(),
            self.amount_out.to_string(),
            self.avg_price.to_string(),
            self.slippage.to_string(),
            self.price_impact.to_string(),
            self.ticks_crossed.to_string(),
            self.exhausted.to_string(),
        ]
    }
}

impl ReportRow for ProxySlippage {
    const HEADERS: &'static [&'static str] = &["trade_size", "depth_level", "implied_slippage"];

    fn cells(&self) -> Vec<String> {
        vec![
            num(self.trade_size),
            num(self.depth_level),
            pct(self.implied_slippage),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.trade_size.to_string(),
            self.depth_level.to_string(),
            self.implied_slippage.to_string(),
        ]
    }
}

impl ReportRow for OutOfRangeRow {
    const HEADERS: &'static [&'static str] = &[
        "sigma_annual",
        "range_pct",
        "lower_price",
        "upper_price",
        "probability",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            pct(self.sigma_annual),
            pct(self.range_pct),
            num(self.lower_price),
            num(self.upper_price),
            pct(self.probability),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.sigma_annual.to_string(),
            self.range_pct.to_string(),
            self.lower_price.to_string(),
            self.upper_price.to_string(),
            self.probability.to_string(),
        ]
    }
}

impl ReportRow for TailSlippageRow {
    const HEADERS: &'static [&'static str] = &[
        "sigma_annual",
        "trade_size",
        "mean_slippage",
        "p95_slippage",
        "p99_slippage",
        "unfilled_share",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            pct(self.sigma_annual),
            num(self.trade_size),
            pct(self.mean_slippage),
            pct(self.p95_slippage),
            pct(self.p99_slippage),
            pct(self.unfilled_share),
        ]
    }

    fn csv_cells(&self) -> Vec<String> {
        vec![
            self.sigma_annual.to_string(),
            self.trade_size.to_string(),
            self.mean_slippage.to_string(),
            self.p95_slippage.to_string(),
            self.p99_slippage.to_string(),
            self.unfilled_share.to_string(),
        ]
    }
}

/// Caveat shown with absolute-amount reports built on guessed decimals.
pub fn decimals_note(scale: &PriceScale) -> Option<String> {
    scale.inferred.then(|| {
        format!(
            "note: token decimals inferred as {}/{} (token0/token1); pass --token0-decimals/--token1-decimals if wrong",
            scale.token0_decimals, scale.token1_decimals
        )
    })
}

pub fn table<R: ReportRow>(rows: &[R]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(R::HEADERS.to_vec());
    for row in rows {
        table.add_row(row.cells());
    }
    table
}

pub fn csv<R: ReportRow>(rows: &[R]) -> String {
    let mut out = R::HEADERS.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.csv_cells().join(","));
        out.push('\n');
    }
    out
}

/// Print one titled report in the chosen format.
///
/// `note` is shown under the table title; JSON and CSV stay bare.
pub fn print_report<R: ReportRow>(title: &str, note: Option<&str>, rows: &[R], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{title}");
            if let Some(note) = note {
                println!("{note}");
            }
            println!("{}\n", table(rows));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(rows)
                .wrap_err_with(|| format!("failed to serialize {title} to JSON"))?;
            println!("{json}");
        }
        OutputFormat::Csv => print!("{}", csv(rows)),
    }
    Ok(())
}

pub fn write_csv<R: ReportRow>(path: &Path, rows: &[R]) -> Result<()> {
    std::fs::write(path, csv(rows)).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "report written");
    Ok(())
}
