//! Maintenance commands

use super::Runtime;

/// What a clean command removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanTarget {
    Simulations,
    History,
}

impl CleanTarget {
    pub async fn execute(self, runtime: &Runtime) -> anyhow::Result<()> {
        match self {
            CleanTarget::Simulations => runtime.orchestrator.clean_simulations().await?,
            CleanTarget::History => runtime.orchestrator.clean_history().await?,
        }
        runtime.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::DataStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_clean_targets() {
        let runtime = Runtime::start(Config::default()).await.unwrap();
        runtime.store.set("simulations/a/op", json!("x")).await.unwrap();
        runtime.store.set("history/daily/2015-01-02/SPY", json!({"close": "1"})).await.unwrap();

        CleanTarget::History.execute(&runtime).await.unwrap();
        assert!(runtime.store.get("history").await.unwrap().is_none());
        assert!(runtime.store.get("simulations").await.unwrap().is_some());

        CleanTarget::Simulations.execute(&runtime).await.unwrap();
        assert!(runtime.store.get("simulations").await.unwrap().is_none());
    }
}
