//! Simulate command implementation

use super::Runtime;
use crate::data::ParquetExporter;
use crate::date::start_of_day;
use crate::sim::SimulationRequest;
use chrono::{NaiveDate, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Comma-separated ticker symbols
    #[arg(long)]
    pub symbols: String,

    /// First trading day (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last trading day (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Strategy name
    #[arg(long, default_value = "BuyAndHold")]
    pub strategy: String,

    /// Directory to export trades and valuations to as Parquet
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl SimulateArgs {
    pub fn request(&self) -> SimulationRequest {
        let mut request = SimulationRequest::new(
            &self.symbols,
            start_of_day(self.start),
            start_of_day(self.end),
            self.strategy.clone(),
        );
        request.request_time = Some(Utc::now());
        request
    }

    pub async fn execute(&self, runtime: &Runtime) -> anyhow::Result<()> {
        let id = runtime.orchestrator.submit(&self.request()).await?;
        tracing::info!(sim_id = %id, strategy = %self.strategy, "Simulation submitted");

        let report = runtime.orchestrator.run_stored(&id).await?;
        runtime.persist().await?;

        if let Some(dir) = &self.export {
            let result = ParquetExporter::new(dir.clone()).export(&report)?;
            tracing::info!(
                trades = %result.trades_path.display(),
                values = %result.equity_path.display(),
                "Exported results"
            );
        }

        let summary = report.summary();
        match self.format.as_str() {
            "json" => {
                let output = serde_json::json!({
                    "id": report.id,
                    "status": report.status,
                    "message": report.message,
                    "initial_value": summary.initial_value,
                    "final_value": summary.final_value,
                    "total_return": summary.total_return,
                    "max_drawdown": summary.max_drawdown,
                    "trades": report.trades,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => println!("{}", summary.format_table()),
        }

        anyhow::ensure!(
            report.is_complete(),
            "Simulation {} ended in {}: {}",
            report.id,
            report.status,
            report.message
        );
        Ok(())
    }
}
