//! Parquet export of simulation ledgers

use crate::backtest::BacktestResult;
use crate::portfolio::{TradeRecord, TradeType, ValuationRecord};
use crate::sim::SimulationReport;
use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

fn timestamp_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// Trade log schema; decimals are stored as strings to keep precision
pub fn trade_schema() -> Schema {
    Schema::new(vec![
        timestamp_field("timestamp"),
        Field::new("type", DataType::Utf8, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("shares", DataType::UInt64, false),
        Field::new("price", DataType::Utf8, false),
        Field::new("cost_basis", DataType::Utf8, false),
        Field::new("proceeds", DataType::Utf8, true),
        Field::new("realized_gain", DataType::Utf8, true),
    ])
}

/// Daily valuation schema
pub fn valuation_schema() -> Schema {
    Schema::new(vec![
        timestamp_field("timestamp"),
        Field::new("date", DataType::Utf8, false),
        Field::new("total_value", DataType::Utf8, false),
    ])
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

fn strings<'a>(values: &'a [String]) -> ArrayRef {
    Arc::new(StringArray::from(
        values.iter().map(String::as_str).collect::<Vec<&'a str>>(),
    ))
}

/// Writes ledgers under an output directory, one file pair per simulation
pub struct ParquetExporter {
    output_dir: PathBuf,
}

impl ParquetExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// File path for a simulation and prefix
    pub fn file_path(&self, prefix: &str, sim_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}.parquet", prefix, sim_id))
    }

    /// Write both logs of a report and summarize it
    pub fn export(&self, report: &SimulationReport) -> anyhow::Result<BacktestResult> {
        let trades_path = self.file_path("trades", &report.id);
        let equity_path = self.file_path("values", &report.id);
        self.write_trades(&trades_path, &report.trades)?;
        self.write_valuations(&equity_path, &report.values)?;

        Ok(BacktestResult {
            summary: report.summary(),
            trades_path,
            equity_path,
        })
    }

    /// Write trade records to a Parquet file
    pub fn write_trades(&self, path: &Path, trades: &[TradeRecord]) -> anyhow::Result<()> {
        self.ensure_dir()?;

        let schema = Arc::new(trade_schema());
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(writer_properties()))?;

        let timestamps: Vec<i64> = trades
            .iter()
            .map(|t| t.timestamp.timestamp_micros())
            .collect();
        let types: Vec<String> = trades.iter().map(|t| t.trade_type.to_string()).collect();
        let symbols: Vec<String> = trades.iter().map(|t| t.symbol.clone()).collect();
        let shares: Vec<u64> = trades.iter().map(|t| t.shares).collect();
        let prices: Vec<String> = trades.iter().map(|t| t.price.to_string()).collect();
        let bases: Vec<String> = trades.iter().map(|t| t.cost_basis.to_string()).collect();
        let proceeds: Vec<Option<String>> = trades
            .iter()
            .map(|t| t.proceeds.map(|p| p.to_string()))
            .collect();
        let gains: Vec<Option<String>> = trades
            .iter()
            .map(|t| t.realized_gain.map(|g| g.to_string()))
            .collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC"))
                    as ArrayRef,
                strings(&types),
                strings(&symbols),
                Arc::new(UInt64Array::from(shares)) as ArrayRef,
                strings(&prices),
                strings(&bases),
                Arc::new(StringArray::from(proceeds)) as ArrayRef,
                Arc::new(StringArray::from(gains)) as ArrayRef,
            ],
        )?;

        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = trades.len(), "Wrote trades to Parquet");
        Ok(())
    }

    /// Write valuation records to a Parquet file
    pub fn write_valuations(&self, path: &Path, values: &[ValuationRecord]) -> anyhow::Result<()> {
        self.ensure_dir()?;

        let schema = Arc::new(valuation_schema());
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(writer_properties()))?;

        let timestamps: Vec<i64> = values
            .iter()
            .map(|v| v.timestamp.timestamp_micros())
            .collect();
        let dates: Vec<String> = values.iter().map(|v| v.date.clone()).collect();
        let totals: Vec<String> = values.iter().map(|v| v.total_value.to_string()).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC"))
                    as ArrayRef,
                strings(&dates),
                strings(&totals),
            ],
        )?;

        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = values.len(), "Wrote valuations to Parquet");
        Ok(())
    }
}

/// Reader for exported Parquet files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn batches(&self) -> anyhow::Result<Vec<RecordBatch>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        Ok(reader.collect::<Result<Vec<_>, _>>()?)
    }

    /// Read valuation records
    pub fn read_valuations(&self) -> anyhow::Result<Vec<ValuationRecord>> {
        let mut values = Vec::new();

        for batch in self.batches()? {
            let timestamps = column::<TimestampMicrosecondArray>(&batch, 0, "timestamp")?;
            let dates = column::<StringArray>(&batch, 1, "date")?;
            let totals = column::<StringArray>(&batch, 2, "total_value")?;

            for i in 0..batch.num_rows() {
                values.push(ValuationRecord {
                    timestamp: DateTime::from_timestamp_micros(timestamps.value(i))
                        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?,
                    date: dates.value(i).to_string(),
                    total_value: Decimal::from_str(totals.value(i))?,
                });
            }
        }

        Ok(values)
    }

    /// Read trade records
    pub fn read_trades(&self) -> anyhow::Result<Vec<TradeRecord>> {
        let mut trades = Vec::new();

        for batch in self.batches()? {
            let timestamps = column::<TimestampMicrosecondArray>(&batch, 0, "timestamp")?;
            let types = column::<StringArray>(&batch, 1, "type")?;
            let symbols = column::<StringArray>(&batch, 2, "symbol")?;
            let shares = column::<UInt64Array>(&batch, 3, "shares")?;
            let prices = column::<StringArray>(&batch, 4, "price")?;
            let bases = column::<StringArray>(&batch, 5, "cost_basis")?;
            let proceeds = column::<StringArray>(&batch, 6, "proceeds")?;
            let gains = column::<StringArray>(&batch, 7, "realized_gain")?;

            for i in 0..batch.num_rows() {
                let trade_type = match types.value(i) {
                    "Buy" => TradeType::Buy,
                    "Sell" => TradeType::Sell,
                    other => anyhow::bail!("Unknown trade type {}", other),
                };
                let optional = |array: &StringArray| -> anyhow::Result<Option<Decimal>> {
                    if array.is_null(i) {
                        Ok(None)
                    } else {
                        Ok(Some(Decimal::from_str(array.value(i))?))
                    }
                };
                let symbol = symbols.value(i).to_string();
                let price = Decimal::from_str(prices.value(i))?;
                let count = shares.value(i);

                trades.push(TradeRecord {
                    timestamp: DateTime::from_timestamp_micros(timestamps.value(i))
                        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?,
                    trade_type,
                    text: format!("{} {} of {} @ {}", trade_type, count, symbol, price),
                    symbol,
                    shares: count,
                    price,
                    cost_basis: Decimal::from_str(bases.value(i))?,
                    proceeds: optional(proceeds)?,
                    realized_gain: optional(gains)?,
                });
            }
        }

        Ok(trades)
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    index: usize,
    name: &str,
) -> anyhow::Result<&'a T> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
}
