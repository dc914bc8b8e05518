use objmon_alert::engine::ExecutionEngine;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Periodically runs every active custom alert rule.
pub struct RuleExecutionScheduler {
    engine: Arc<ExecutionEngine>,
    tick_secs: u64,
}

impl RuleExecutionScheduler {
    pub fn new(engine: Arc<ExecutionEngine>, tick_secs: u64) -> Self {
        Self { engine, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.tick_secs,
            dedup_window_secs = self.engine.dedup_window().num_seconds(),
            "Custom alert rule scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.run_once().await;
        }
    }

    /// One sweep on the blocking pool; the stores use synchronous I/O.
    pub async fn run_once(&self) {
        let engine = self.engine.clone();
        match tokio::task::spawn_blocking(move || engine.run_active_rules(None)).await {
            Ok(Ok(alerts)) => {
                if !alerts.is_empty() {
                    tracing::info!(count = alerts.len(), "Custom alerts created");
                }
            }
            Ok(Err(e)) => tracing::error!(error = %e, "Custom alert rule sweep failed"),
            Err(e) => tracing::error!(error = %e, "Custom alert rule sweep panicked"),
        }
    }
}
