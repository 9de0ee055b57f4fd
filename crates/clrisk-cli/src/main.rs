mod output;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use clrisk_analysis::depth::representative_depth;
use clrisk_analysis::tail::{OutOfRangeRow, TailSlippageRow};
use clrisk_analysis::{
    depth_curve, liquidity_distribution, out_of_range_table, slippage_curve,
    slippage_from_depth_proxy, tail_slippage_table, PoolView, QuoteToken, RiskConfig,
    ShockedProfileModel, TradeSide,
};
use clrisk_data::paths::{ensure_dir, ProjectPaths};
use clrisk_data::{load_snapshot, PoolSnapshot};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use output::{decimals_note, print_report, write_csv, OutputFormat};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct AppContext {
    paths: ProjectPaths,
    config: RiskConfig,
    output: OutputFormat,
}

#[derive(Parser, Debug)]
#[command(name = "clrisk")]
#[command(about = "Liquidity and execution-risk reports for Uniswap V3 pool snapshots")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// TOML file overriding analysis defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: table, json, or csv.
    #[arg(long, global = true, default_value = "table")]
    output: String,

    /// Quote token (token0 or token1); overrides the config file.
    #[arg(long, global = true)]
    quote: Option<String>,

    /// token0 decimals; needed when the snapshot does not record them.
    #[arg(long, global = true)]
    token0_decimals: Option<u8>,

    /// token1 decimals; needed when the snapshot does not record them.
    #[arg(long, global = true)]
    token1_decimals: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot metadata and reconstructed liquidity profile.
    Inspect(InspectArgs),
    /// Liquidity and token value by price band.
    Distribution(SnapshotArgs),
    /// Depth needed to move the price.
    Depth(SnapshotArgs),
    /// Execution slippage by trade size.
    Slippage(SlippageArgs),
    /// Out-of-range probability and tail slippage under volatility regimes.
    Tail(TailArgs),
    /// Write every report as CSV plus a JSON summary.
    Report(ReportArgs),
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    /// Snapshot base path, e.g. data/processed/ETHUSDC_0p05.
    #[arg(long)]
    snapshot: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// Also list every profile segment.
    #[arg(long)]
    points: bool,
}

#[derive(Args, Debug)]
struct SlippageArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// buy or sell the base token; defaults to the config value.
    #[arg(long)]
    side: Option<String>,

    /// Also print the closed-form depth proxy.
    #[arg(long)]
    proxy: bool,
}

#[derive(Args, Debug)]
struct TailArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    #[arg(long)]
    side: Option<String>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// Defaults to <root>/reports/<snapshot name>.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let mut config = RiskConfig::load_or_default(cli.config.as_deref())?;
    if let Some(quote) = &cli.quote {
        config.quote = quote.parse::<QuoteToken>()?;
    }
    if cli.token0_decimals.is_some() {
        config.token0_decimals = cli.token0_decimals;
    }
    if cli.token1_decimals.is_some() {
        config.token1_decimals = cli.token1_decimals;
    }

    let ctx = AppContext {
        paths: ProjectPaths::from_env()?,
        config,
        output: OutputFormat::parse(&cli.output)?,
    };

    match cli.command {
        Commands::Inspect(args) => handle_inspect(&ctx, args),
        Commands::Distribution(args) => handle_distribution(&ctx, args),
        Commands::Depth(args) => handle_depth(&ctx, args),
        Commands::Slippage(args) => handle_slippage(&ctx, args),
        Commands::Tail(args) => handle_tail(&ctx, args),
        Commands::Report(args) => handle_report(&ctx, args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn open_snapshot(ctx: &AppContext, args: &SnapshotArgs) -> Result<(PoolSnapshot, PoolView)> {
    let base = ctx.paths.resolve_snapshot(&args.snapshot);
    let mut snapshot = load_snapshot(&base)
        .wrap_err_with(|| format!("failed to load snapshot {}", base.display()))?;
    ctx.config.apply_decimals(&mut snapshot.meta);
    let view = PoolView::from_snapshot(&snapshot, ctx.config.tick_window, ctx.config.quote)?;
    Ok((snapshot, view))
}

fn resolve_side(ctx: &AppContext, side: Option<&str>) -> Result<TradeSide> {
    match side {
        Some(side) => side.parse(),
        None => Ok(ctx.config.side),
    }
}

fn handle_inspect(ctx: &AppContext, args: InspectArgs) -> Result<()> {
    let (snapshot, view) = open_snapshot(ctx, &args.snapshot)?;
    let meta = &snapshot.meta;
    let (tick_lo, tick_hi) = view.profile.tick_bounds();

    if ctx.output == OutputFormat::Json {
        #[derive(serde::Serialize)]
        struct InspectJson<'a> {
            meta: &'a clrisk_data::SnapshotMeta,
            tick_count: usize,
            fee: f64,
            token0_decimals: u8,
            token1_decimals: u8,
            decimals_inferred: bool,
            quote: QuoteToken,
            spot_quote_price: f64,
            profile_anchor: clrisk_sim::profile::ProfileAnchor,
            profile_segments: usize,
            profile_tick_bounds: (i32, i32),
            peak_liquidity: f64,
            current_liquidity: f64,
        }

        let json = serde_json::to_string_pretty(&InspectJson {
            meta,
            tick_count: snapshot.ticks.len(),
            fee: view.fee,
            token0_decimals: view.scale.token0_decimals,
            token1_decimals: view.scale.token1_decimals,
            decimals_inferred: view.scale.inferred,
            quote: view.quote,
            spot_quote_price: view.spot_quote_price(),
            profile_anchor: view.profile.anchor(),
            profile_segments: view.profile.segments().len(),
            profile_tick_bounds: (tick_lo, tick_hi),
            peak_liquidity: view.profile.peak_liquidity(),
            current_liquidity: view.profile.active_liquidity_at(meta.current_tick),
        })
        .wrap_err("failed to serialize snapshot summary")?;
        println!("{json}");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Field", "Value"]);
        table.add_row(vec!["Pool".to_string(), meta.pool_name.clone()]);
        table.add_row(vec!["Fee tier".to_string(), format!("{} ({:.4}%)", meta.fee_tier, view.fee * 100.0)]);
        table.add_row(vec!["Timestamp (UTC)".to_string(), meta.timestamp_utc.clone()]);
        table.add_row(vec!["Current tick".to_string(), meta.current_tick.to_string()]);
        table.add_row(vec!["Current price (token1/token0)".to_string(), meta.current_price.to_string()]);
        table.add_row(vec![
            format!("Spot price ({} per base)", view.quote),
            format!("{:.6}", view.spot_quote_price()),
        ]);
        table.add_row(vec![
            "Decimals (token0/token1)".to_string(),
            format!(
                "{}/{}{}",
                view.scale.token0_decimals,
                view.scale.token1_decimals,
                if view.scale.inferred { " (inferred)" } else { "" }
            ),
        ]);
        table.add_row(vec![
            "Tick spacing".to_string(),
            meta.effective_tick_spacing()
                .map_or_else(|| "unknown".to_string(), |s| s.to_string()),
        ]);
        table.add_row(vec!["Initialized ticks".to_string(), snapshot.ticks.len().to_string()]);
        table.add_row(vec!["Profile anchor".to_string(), format!("{:?}", view.profile.anchor())]);
        table.add_row(vec!["Profile segments".to_string(), view.profile.segments().len().to_string()]);
        table.add_row(vec!["Profile ticks".to_string(), format!("[{tick_lo}, {tick_hi})")]);
        table.add_row(vec![
            "Active liquidity".to_string(),
            format!("{:.4e}", view.profile.active_liquidity_at(meta.current_tick)),
        ]);
        table.add_row(vec!["Peak liquidity".to_string(), format!("{:.4e}", view.profile.peak_liquidity())]);
        println!("\n{table}\n");
    }

    if args.points {
        let points = view.profile.points(&view.scale);
        print_report("Liquidity profile", decimals_note(&view.scale).as_deref(), &points, ctx.output)?;
    }

    info!(pool = %meta.pool_name, ticks = snapshot.ticks.len(), "inspect command completed");
    Ok(())
}

fn handle_distribution(ctx: &AppContext, args: SnapshotArgs) -> Result<()> {
    let (_, view) = open_snapshot(ctx, &args)?;
    let bands = liquidity_distribution(&view, &ctx.config.distribution_bands_pct)?;
    print_report(
        &format!("Liquidity distribution ({}, quote {})", view.pool_name, view.quote),
        decimals_note(&view.scale).as_deref(),
        &bands,
        ctx.output,
    )?;
    info!(bands = bands.len(), "distribution command completed");
    Ok(())
}

fn handle_depth(ctx: &AppContext, args: SnapshotArgs) -> Result<()> {
    let (_, view) = open_snapshot(ctx, &args)?;
    let curve = depth_curve(&view, &ctx.config.pct_moves)?;
    print_report(
        &format!("Depth curve ({}, quote {})", view.pool_name, view.quote),
        decimals_note(&view.scale).as_deref(),
        &curve,
        ctx.output,
    )?;
    info!(points = curve.len(), "depth command completed");
    Ok(())
}

fn handle_slippage(ctx: &AppContext, args: SlippageArgs) -> Result<()> {
    let (_, view) = open_snapshot(ctx, &args.snapshot)?;
    let side = resolve_side(ctx, args.side.as_deref())?;
    let curve = slippage_curve(&view, side, &ctx.config.trade_sizes_quote)?;
    print_report(
        &format!("Slippage curve ({}, {side}, quote {})", view.pool_name, view.quote),
        decimals_note(&view.scale).as_deref(),
        &curve,
        ctx.output,
    )?;

    if args.proxy {
        let depth = depth_curve(&view, &ctx.config.pct_moves)?;
        let level = representative_depth(&depth).ok_or_else(|| eyre!("pct_moves is empty"))?;
        let proxy = slippage_from_depth_proxy(level, &ctx.config.trade_sizes_quote, ctx.config.depth_proxy_k);
        print_report("Depth-proxy slippage", decimals_note(&view.scale).as_deref(), &proxy, ctx.output)?;
    }

    info!(side = %side, sizes = curve.len(), "slippage command completed");
    Ok(())
}

fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(&format!(
            "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}"
        ))
        .wrap_err("failed to create progress style")?
        .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Both tail tables, one regime at a time so progress can be shown.
fn run_tail(ctx: &AppContext, view: &PoolView, side: TradeSide) -> Result<(Vec<OutOfRangeRow>, Vec<TailSlippageRow>)> {
    let config = &ctx.config;
    let price0 = view.spot_quote_price();
    let model = ShockedProfileModel::new(view, side, f64::from(config.horizon_days));

    let pb = progress_bar(config.vol_regimes_annual.len(), "regimes")?;
    let mut out_of_range = Vec::new();
    let mut tail = Vec::new();
    for &sigma in &config.vol_regimes_annual {
        pb.set_message(format!("sigma {sigma}"));
        out_of_range.extend(out_of_range_table(
            price0,
            &[sigma],
            &config.lp_ranges_pct,
            config.path_scenario(),
        )?);
        tail.extend(tail_slippage_table(
            &model,
            &[sigma],
            &config.trade_sizes_quote,
            config.n_mc,
            config.seed,
        )?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok((out_of_range, tail))
}

fn handle_tail(ctx: &AppContext, args: TailArgs) -> Result<()> {
    let (_, view) = open_snapshot(ctx, &args.snapshot)?;
    let side = resolve_side(ctx, args.side.as_deref())?;
    let (out_of_range, tail) = run_tail(ctx, &view, side)?;

    print_report(
        &format!("Out-of-range probability over {} days", ctx.config.horizon_days),
        None,
        &out_of_range,
        ctx.output,
    )?;
    print_report(
        &format!("Tail slippage ({side}, {} draws per cell)", ctx.config.n_mc),
        decimals_note(&view.scale).as_deref(),
        &tail,
        ctx.output,
    )?;
    info!(regimes = ctx.config.vol_regimes_annual.len(), "tail command completed");
    Ok(())
}

fn snapshot_name(base: &Path) -> String {
    base.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string())
}

fn handle_report(ctx: &AppContext, args: ReportArgs) -> Result<()> {
    let (snapshot, view) = open_snapshot(ctx, &args.snapshot)?;
    let config = &ctx.config;

    let out_dir = match args.out_dir {
        Some(dir) => dir,
        None => ctx.paths.reports_dir().join(snapshot_name(&args.snapshot.snapshot)),
    };
    let out_dir = ensure_dir(&out_dir)?;

    let profile = view.profile.points(&view.scale);
    write_csv(&out_dir.join("profile.csv"), &profile)?;

    let bands = liquidity_distribution(&view, &config.distribution_bands_pct)?;
    write_csv(&out_dir.join("distribution.csv"), &bands)?;

    let depth = depth_curve(&view, &config.pct_moves)?;
    write_csv(&out_dir.join("depth.csv"), &depth)?;

    for side in [TradeSide::Buy, TradeSide::Sell] {
        let curve = slippage_curve(&view, side, &config.trade_sizes_quote)?;
        write_csv(&out_dir.join(format!("slippage_{side}.csv")), &curve)?;
    }

    if let Some(level) = representative_depth(&depth) {
        let proxy = slippage_from_depth_proxy(level, &config.trade_sizes_quote, config.depth_proxy_k);
        write_csv(&out_dir.join("slippage_proxy.csv"), &proxy)?;
    }

    let (out_of_range, tail) = run_tail(ctx, &view, config.side)?;
    write_csv(&out_dir.join("out_of_range.csv"), &out_of_range)?;
    write_csv(&out_dir.join("tail_slippage.csv"), &tail)?;

    #[derive(serde::Serialize)]
    struct Summary<'a> {
        generated_at: String,
        snapshot: &'a clrisk_data::SnapshotMeta,
        tick_count: usize,
        decimals: clrisk_sim::PriceScale,
        spot_quote_price: f64,
        config: &'a RiskConfig,
    }
    let summary = Summary {
        generated_at: Utc::now().to_rfc3339(),
        snapshot: &snapshot.meta,
        tick_count: snapshot.ticks.len(),
        decimals: view.scale,
        spot_quote_price: view.spot_quote_price(),
        config,
    };
    let json = serde_json::to_string_pretty(&summary).wrap_err("failed to serialize report summary")?;
    let summary_path = out_dir.join("summary.json");
    std::fs::write(&summary_path, json)
        .wrap_err_with(|| format!("failed to write {}", summary_path.display()))?;

    println!("Reports written to {}", out_dir.display());
    if let Some(note) = decimals_note(&view.scale) {
        println!("{note}");
    }
    info!(out_dir = %out_dir.display(), "report command completed");
    Ok(())
}
