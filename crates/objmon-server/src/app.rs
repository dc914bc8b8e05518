use crate::config::ServerConfig;
use objmon_alert::engine::ExecutionEngine;
use objmon_alert::lifecycle::RuleManager;
use objmon_common::clock::Clock;
use objmon_storage::file::JsonObjectiveSource;
use objmon_storage::sqlite::SqliteStore;
use objmon_storage::{AlertLog, ObjectiveSource, RuleStore};
use std::path::Path;
use std::sync::Arc;

/// Rule manager and execution engine wired to the configured stores.
pub struct App {
    pub rules: RuleManager,
    pub engine: ExecutionEngine,
    pub alerts: Arc<dyn AlertLog>,
}

impl App {
    pub fn open(config: &ServerConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteStore::open(Path::new(&config.data_dir))?);
        let objectives: Arc<dyn ObjectiveSource> =
            Arc::new(JsonObjectiveSource::new(&config.objectives_file));
        Ok(Self::with_stores(
            config,
            store.clone(),
            store,
            objectives,
            clock,
        ))
    }

    pub fn with_stores(
        config: &ServerConfig,
        rule_store: Arc<dyn RuleStore>,
        alerts: Arc<dyn AlertLog>,
        objectives: Arc<dyn ObjectiveSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rules = RuleManager::new(
            rule_store.clone(),
            objectives.clone(),
            clock.clone(),
            &config.locale,
        );
        let engine = ExecutionEngine::new(rule_store, alerts.clone(), objectives, clock, &config.locale)
            .with_dedup_window(config.dedup_window());
        Self {
            rules,
            engine,
            alerts,
        }
    }
}
