//! On-disk snapshot format.
//!
//! A snapshot with base path `data/processed/ETHUSDC_0p05` is two files:
//! - `ETHUSDC_0p05.meta.json`: [`SnapshotMeta`] as pretty JSON
//! - `ETHUSDC_0p05.ticks.parquet`: one row per initialized tick with
//!   columns `tick`, `liquidity_net`, `liquidity_gross` (nullable)
//!
//! Integer or float parquet columns are both accepted on read; they are
//! cast to `Int64` / `Float64` before extraction.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use eyre::{eyre, Context, ContextCompat, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::types::{PoolSnapshot, SnapshotMeta, TickLiquidity};

/// Path of the metadata sidecar for a snapshot base path.
pub fn meta_path(base: &Path) -> PathBuf {
    base.with_extension("meta.json")
}

/// Path of the ticks parquet for a snapshot base path.
pub fn ticks_path(base: &Path) -> PathBuf {
    base.with_extension("ticks.parquet")
}

/// Validate and write a snapshot next to `base`.
///
/// # Errors
/// Returns error if validation fails or either file cannot be written.
#[tracing::instrument(skip(snapshot), fields(pool = %snapshot.meta.pool_name, base = %base.display()))]
pub fn save_snapshot(snapshot: &PoolSnapshot, base: &Path) -> Result<()> {
    snapshot.validate()?;

    if let Some(parent) = base.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let tick_path = ticks_path(base);
    write_ticks_parquet(&snapshot.ticks, &tick_path)?;

    let mut meta = snapshot.meta.clone();
    meta.ticks_file = tick_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let json = serde_json::to_string_pretty(&meta).wrap_err("failed to serialize meta")?;
    let meta_file = meta_path(base);
    std::fs::write(&meta_file, json)
        .wrap_err_with(|| format!("failed to write {}", meta_file.display()))?;

    tracing::info!(ticks = snapshot.ticks.len(), "snapshot saved");
    Ok(())
}

/// Load and validate the snapshot stored next to `base`.
///
/// # Errors
/// Returns error naming the missing file if either file is absent, or if
/// parsing or validation fails.
#[tracing::instrument(fields(base = %base.display()))]
pub fn load_snapshot(base: &Path) -> Result<PoolSnapshot> {
    let meta_file = meta_path(base);
    let tick_path = ticks_path(base);

    if !meta_file.exists() {
        return Err(eyre!("missing meta file: {}", meta_file.display()));
    }
    if !tick_path.exists() {
        return Err(eyre!("missing ticks file: {}", tick_path.display()));
    }

    let raw = std::fs::read_to_string(&meta_file)
        .wrap_err_with(|| format!("failed to read {}", meta_file.display()))?;
    let meta: SnapshotMeta = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("failed to parse {}", meta_file.display()))?;

    let ticks = read_ticks_parquet(&tick_path)?;
    let snapshot = PoolSnapshot::new(meta, ticks);
    snapshot.validate()?;

    tracing::info!(
        pool = %snapshot.meta.pool_name,
        ticks = snapshot.ticks.len(),
        current_tick = snapshot.meta.current_tick,
        "snapshot loaded"
    );
    Ok(snapshot)
}

fn ticks_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("tick", DataType::Int64, false),
        Field::new("liquidity_net", DataType::Float64, false),
        Field::new("liquidity_gross", DataType::Float64, true),
    ]))
}

fn write_ticks_parquet(ticks: &[TickLiquidity], path: &Path) -> Result<()> {
    let tick_array: ArrayRef = Arc::new(Int64Array::from_iter_values(
        ticks.iter().map(|t| i64::from(t.tick)),
    ));
    let net_array: ArrayRef = Arc::new(Float64Array::from_iter_values(
        ticks.iter().map(|t| t.liquidity_net),
    ));
    let gross_array: ArrayRef = Arc::new(Float64Array::from_iter(
        ticks.iter().map(|t| t.liquidity_gross),
    ));

    let schema = ticks_schema();
    let batch = RecordBatch::try_new(schema.clone(), vec![tick_array, net_array, gross_array])
        .wrap_err("failed to build ticks record batch")?;

    let file =
        File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).wrap_err("failed to create parquet writer")?;
    writer.write(&batch).wrap_err("failed to write ticks batch")?;
    writer.close().wrap_err("failed to finalize parquet file")?;
    Ok(())
}

/// Parse a ticks parquet file into [`TickLiquidity`] rows (unsorted).
///
/// # Errors
/// Returns error if the file cannot be opened, is not parquet, lacks the
/// `tick` or `liquidity_net` columns, or holds nulls in them.
pub fn read_ticks_parquet(path: &Path) -> Result<Vec<TickLiquidity>> {
    let file =
        File::open(path).wrap_err_with(|| format!("failed to open parquet file: {}", path.display()))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .wrap_err("failed to parse parquet metadata")?;
    let reader = builder
        .build()
        .wrap_err("failed to build parquet record batch reader")?;

    let schema = reader.schema();
    let col_idx = |name: &str| -> Result<usize> {
        schema
            .index_of(name)
            .context(format!("column {} not found in parquet schema", name))
    };

    let tick_idx = col_idx("tick")?;
    let net_idx = col_idx("liquidity_net")?;
    let gross_idx = schema.index_of("liquidity_gross").ok();

    let mut ticks = Vec::new();

    for batch_result in reader {
        let batch = batch_result.wrap_err("failed to read record batch")?;

        let tick_col = cast(batch.column(tick_idx), &DataType::Int64)
            .wrap_err("tick column is not numeric")?;
        let tick_col = tick_col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("tick column is not i64 after cast")?;

        let net_col = cast(batch.column(net_idx), &DataType::Float64)
            .wrap_err("liquidity_net column is not numeric")?;
        let net_col = net_col
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("liquidity_net column is not f64 after cast")?;

        let gross_col = match gross_idx {
            Some(idx) => Some(
                cast(batch.column(idx), &DataType::Float64)
                    .wrap_err("liquidity_gross column is not numeric")?,
            ),
            None => None,
        };
        let gross_col = gross_col
            .as_ref()
            .map(|col| {
                col.as_any()
                    .downcast_ref::<Float64Array>()
                    .context("liquidity_gross column is not f64 after cast")
            })
            .transpose()?;

        for row_idx in 0..batch.num_rows() {
            if tick_col.is_null(row_idx) || net_col.is_null(row_idx) {
                return Err(eyre!("null tick or liquidity_net at row {row_idx}"));
            }
            let tick = i32::try_from(tick_col.value(row_idx))
                .wrap_err_with(|| format!("tick at row {row_idx} does not fit i32"))?;
            let liquidity_gross = gross_col.and_then(|col| {
                if col.is_null(row_idx) {
                    None
                } else {
                    Some(col.value(row_idx))
                }
            });

            ticks.push(TickLiquidity {
                tick,
                liquidity_net: net_col.value(row_idx),
                liquidity_gross,
            });
        }
    }

    tracing::debug!(tick_count = ticks.len(), "parsed ticks parquet");
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Builder;

    fn sample_snapshot() -> PoolSnapshot {
        let meta = SnapshotMeta {
            pool_name: "USDC/WETH".to_string(),
            fee_tier: "500".to_string(),
            timestamp_utc: "2025-02-22T12:00:00+00:00".to_string(),
            current_tick: 200_000,
            current_price: 0.000_485,
            ticks_file: String::new(),
            token0_decimals: Some(6),
            token1_decimals: Some(18),
            tick_spacing: None,
            liquidity: Some(2.5e18),
            sqrt_price_x96: None,
        };
        let ticks = vec![
            TickLiquidity {
                tick: 199_900,
                liquidity_net: 2.5e18,
                liquidity_gross: Some(2.5e18),
            },
            TickLiquidity {
                tick: 200_100,
                liquidity_net: -2.5e18,
                liquidity_gross: None,
            },
        ];
        PoolSnapshot::new(meta, ticks)
    }

    #[test]
    fn save_then_load_preserves_snapshot() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let base = temp_dir.path().join("processed").join("ETHUSDC_0p05");

        let snap = sample_snapshot();
        save_snapshot(&snap, &base).expect("save snapshot");

        assert!(meta_path(&base).exists());
        assert!(ticks_path(&base).exists());

        let loaded = load_snapshot(&base).expect("load snapshot");
        assert_eq!(loaded.ticks, snap.ticks);
        assert_eq!(loaded.meta.ticks_file, "ETHUSDC_0p05.ticks.parquet");
        assert_eq!(loaded.meta.current_tick, 200_000);
        assert_eq!(loaded.meta.token1_decimals, Some(18));
    }

    #[test]
    fn load_reports_missing_meta() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let err = load_snapshot(&temp_dir.path().join("nothing")).expect_err("no files");
        assert!(err.to_string().contains("missing meta file"));
    }

    #[test]
    fn load_reports_missing_ticks() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let base = temp_dir.path().join("half");
        std::fs::write(meta_path(&base), "{}").expect("write meta");
        let err = load_snapshot(&base).expect_err("ticks file absent");
        assert!(err.to_string().contains("missing ticks file"));
    }

    #[test]
    fn reads_int32_ticks_without_gross_column() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let path = temp_dir.path().join("narrow.ticks.parquet");

        let mut tick_builder = Int32Builder::new();
        tick_builder.append_value(-60);
        tick_builder.append_value(60);
        let tick_array: ArrayRef = Arc::new(tick_builder.finish());
        let net_array: ArrayRef = Arc::new(Int64Array::from(vec![1_000i64, -1_000]));

        let schema = Arc::new(Schema::new(vec![
            Field::new("tick", DataType::Int32, false),
            Field::new("liquidity_net", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(schema.clone(), vec![tick_array, net_array])
            .expect("create record batch");

        let file = File::create(&path).expect("create parquet file");
        let mut writer = ArrowWriter::try_new(file, schema, None).expect("create arrow writer");
        writer.write(&batch).expect("write batch");
        writer.close().expect("close writer");

        let ticks = read_ticks_parquet(&path).expect("parse parquet");
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].tick, -60);
        assert_eq!(ticks[1].liquidity_net, -1_000.0);
        assert_eq!(ticks[0].liquidity_gross, None);
    }
}
