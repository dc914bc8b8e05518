use crate::matcher::matching_objectives;
use crate::template::build_alert;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use objmon_common::clock::Clock;
use objmon_common::i18n::normalize_locale;
use objmon_common::types::{Alert, CustomAlertRule, Objective, ObjectiveFilter, Role};
use objmon_storage::{AlertLog, ObjectiveSource, RuleStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;

/// Default suppression window per (rule, objective) pair.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Turns active rule matches into alerts.
///
/// Each sweep reads the executable rules (`enabled && active`) in store
/// order, matches them against the objectives visible to the rule's role and
/// appends one alert per pair unless that pair already alerted within the
/// dedup window. A failure while processing one rule is logged and the sweep
/// moves on to the next rule.
pub struct ExecutionEngine {
    rules: Arc<dyn RuleStore>,
    alerts: Arc<dyn AlertLog>,
    objectives: Arc<dyn ObjectiveSource>,
    clock: Arc<dyn Clock>,
    locale: String,
    dedup_window: Duration,
}

impl ExecutionEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        alerts: Arc<dyn AlertLog>,
        objectives: Arc<dyn ObjectiveSource>,
        clock: Arc<dyn Clock>,
        locale: &str,
    ) -> Self {
        Self {
            rules,
            alerts,
            objectives,
            clock,
            locale: normalize_locale(locale).to_string(),
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }

    /// Run every executable rule visible to `role` once.
    ///
    /// Returns only the alerts created by this sweep. Fails only when the
    /// rule list itself cannot be read.
    pub fn run_active_rules(&self, role: Option<Role>) -> Result<Vec<Alert>> {
        let now = self.clock.now();
        let rules: Vec<CustomAlertRule> = self
            .rules
            .list(role)?
            .into_iter()
            .filter(CustomAlertRule::is_executable)
            .collect();

        let mut objectives_by_role: HashMap<Option<Role>, Vec<Objective>> = HashMap::new();
        let mut created = Vec::new();
        let mut failed = 0usize;

        for rule in &rules {
            let scope = rule.role.or(role);
            if !objectives_by_role.contains_key(&scope) {
                match self
                    .objectives
                    .get_objectives(&ObjectiveFilter::default(), scope)
                {
                    Ok(objectives) => {
                        objectives_by_role.insert(scope, objectives);
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::error!(
                            rule_id = %rule.id,
                            error = %e,
                            "Failed to load objectives, skipping rule"
                        );
                        continue;
                    }
                }
            }
            let objectives = objectives_by_role
                .get(&scope)
                .map(Vec::as_slice)
                .unwrap_or_default();

            if let Err(e) = self.run_rule(rule, objectives, now, &mut created) {
                failed += 1;
                tracing::error!(
                    rule_id = %rule.id,
                    rule_name = %rule.name,
                    error = %e,
                    "Custom alert rule failed, skipping for this run"
                );
            }
        }

        tracing::info!(
            rules = rules.len(),
            failed,
            alerts = created.len(),
            "Custom alert rule sweep finished"
        );
        Ok(created)
    }

    fn run_rule(
        &self,
        rule: &CustomAlertRule,
        objectives: &[Objective],
        now: DateTime<Utc>,
        created: &mut Vec<Alert>,
    ) -> std::result::Result<(), StorageError> {
        let since = now - self.dedup_window;
        for objective in matching_objectives(rule, objectives, now) {
            let alert = build_alert(rule, objective, now, &self.locale);
            if self.alerts.append_if_absent(&alert, since)? {
                created.push(alert);
            } else {
                tracing::debug!(
                    rule_id = %rule.id,
                    objective_id = %objective.id,
                    "Alert suppressed (dedup window)"
                );
            }
        }
        Ok(())
    }
}
