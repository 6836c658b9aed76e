//! Results export
//!
//! Writes a finished simulation's trades and valuations to Parquet

mod parquet;

pub use parquet::{trade_schema, valuation_schema, ParquetExporter, ParquetReader};
