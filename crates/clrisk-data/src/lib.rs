//! clrisk-data crate
//!
//! Pool snapshot model, validation, and the meta JSON + ticks parquet
//! storage format consumed by the analysis crates.

pub mod paths;
pub mod snapshot;
pub mod types;

pub use snapshot::{load_snapshot, save_snapshot};
pub use types::{PoolSnapshot, SnapshotMeta, TickLiquidity};
