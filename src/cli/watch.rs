//! Watch command implementation

use super::Runtime;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl WatchArgs {
    pub async fn execute(&self, runtime: &Runtime) -> anyhow::Result<()> {
        let timeout = self.timeout_secs.map(Duration::from_secs);
        let shutdown = async move {
            match timeout {
                Some(limit) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = tokio::time::sleep(limit) => {}
                    }
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!(error = %e, "Ctrl-C handler unavailable");
                        std::future::pending::<()>().await;
                    }
                }
            }
        };

        let started = runtime.orchestrator.watch(shutdown).await?;
        tracing::info!(started, "Watch stopped");
        runtime.persist().await
    }
}
