//! In-process stores, used by tests and by hosts that keep state elsewhere.

use crate::error::{Result, StorageError};
use crate::{select_objectives, AlertLog, AlertQuery, ObjectiveRecord, ObjectiveSource, RuleStore};
use chrono::{DateTime, Utc};
use objmon_common::types::{Alert, CustomAlertRule, Objective, ObjectiveFilter, Role};
use std::sync::{Mutex, MutexGuard, RwLock};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: Mutex<Vec<CustomAlertRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleStore for MemoryRuleStore {
    fn list(&self, role: Option<Role>) -> Result<Vec<CustomAlertRule>> {
        Ok(lock(&self.rules)
            .iter()
            .filter(|r| r.visible_to(role))
            .cloned()
            .collect())
    }

    fn get(&self, id: &str) -> Result<Option<CustomAlertRule>> {
        Ok(lock(&self.rules).iter().find(|r| r.id == id).cloned())
    }

    fn create(&self, rule: &CustomAlertRule) -> Result<()> {
        let mut rules = lock(&self.rules);
        if rules.iter().any(|r| r.id == rule.id) {
            return Err(StorageError::Duplicate {
                entity: "alert_rule",
                id: rule.id.clone(),
            });
        }
        rules.push(rule.clone());
        Ok(())
    }

    fn update(&self, rule: &CustomAlertRule) -> Result<()> {
        let mut rules = lock(&self.rules);
        let slot = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "alert_rule",
                id: rule.id.clone(),
            })?;
        *slot = rule.clone();
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut rules = lock(&self.rules);
        let len_before = rules.len();
        rules.retain(|r| r.id != id);
        Ok(rules.len() < len_before)
    }
}

#[derive(Debug, Default)]
pub struct MemoryAlertLog {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.alerts).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.alerts).is_empty()
    }
}

impl AlertLog for MemoryAlertLog {
    fn list(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        Ok(lock(&self.alerts)
            .iter()
            .filter(|a| query.accepts(a))
            .cloned()
            .collect())
    }

    fn append(&self, alert: &Alert) -> Result<()> {
        lock(&self.alerts).push(alert.clone());
        Ok(())
    }

    fn mark_read(&self, alert_id: &str) -> Result<bool> {
        let mut alerts = lock(&self.alerts);
        match alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_if_absent(&self, alert: &Alert, since: DateTime<Utc>) -> Result<bool> {
        // Check and push under one guard so concurrent sweeps cannot both append.
        let mut alerts = lock(&self.alerts);
        let duplicate = alerts.iter().any(|a| {
            a.custom_rule_id == alert.custom_rule_id
                && a.objective_id == alert.objective_id
                && a.created_at >= since
        });
        if duplicate {
            return Ok(false);
        }
        alerts.push(alert.clone());
        Ok(true)
    }
}

/// Objective source over a replaceable in-memory snapshot.
#[derive(Debug, Default)]
pub struct MemoryObjectiveSource {
    records: RwLock<Vec<ObjectiveRecord>>,
}

impl MemoryObjectiveSource {
    pub fn new(records: Vec<ObjectiveRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Objectives visible to every role.
    pub fn shared(objectives: Vec<Objective>) -> Self {
        Self::new(
            objectives
                .into_iter()
                .map(|objective| ObjectiveRecord {
                    role: None,
                    objective,
                })
                .collect(),
        )
    }

    pub fn replace(&self, records: Vec<ObjectiveRecord>) {
        *self.records.write().unwrap_or_else(|p| p.into_inner()) = records;
    }
}

impl ObjectiveSource for MemoryObjectiveSource {
    fn get_objectives(&self, filter: &ObjectiveFilter, role: Option<Role>) -> Result<Vec<Objective>> {
        let records = self.records.read().unwrap_or_else(|p| p.into_inner());
        Ok(select_objectives(&records, filter, role))
    }
}
