//! Persistence seams for the custom alert rule engine.
//!
//! Three interfaces are consumed by the engine: the durable [`RuleStore`],
//! the append-only [`AlertLog`] and the read-only [`ObjectiveSource`].
//! In-memory implementations live in [`memory`], SQLite-backed ones in
//! [`sqlite`], and [`file::JsonObjectiveSource`] reads objectives exported
//! as JSON.

pub mod error;
pub mod file;
pub mod memory;
pub mod sqlite;


use chrono::{DateTime, Utc};
use error::Result;
use objmon_common::types::{Alert, CustomAlertRule, Objective, ObjectiveFilter, Role};

pub use error::StorageError;

/// Durable storage for custom alert rules and their test history.
///
/// `list` returns rules in insertion order; the execution sweep processes
/// them in that order.
pub trait RuleStore: Send + Sync {
    /// Lists rules visible to `role` (role-less rules are visible to every role).
    fn list(&self, role: Option<Role>) -> Result<Vec<CustomAlertRule>>;

    fn get(&self, id: &str) -> Result<Option<CustomAlertRule>>;

    fn create(&self, rule: &CustomAlertRule) -> Result<()>;

    /// Replaces a stored rule. Fails with [`StorageError::NotFound`] when absent.
    fn update(&self, rule: &CustomAlertRule) -> Result<()>;

    /// Removes a rule and its test history. Returns whether a rule was removed.
    fn delete(&self, id: &str) -> Result<bool>;
}

/// Filters for alert log lookups. `None` fields do not constrain.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use objmon_storage::AlertQuery;
///
/// let now = Utc::now();
/// let q = AlertQuery::for_pair("rule-1", "obj-1").since(now - Duration::hours(24));
/// assert_eq!(q.custom_rule_id.as_deref(), Some("rule-1"));
/// assert!(q.since.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub custom_rule_id: Option<String>,
    pub objective_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub unread_only: bool,
}

impl AlertQuery {
    pub fn for_pair(custom_rule_id: &str, objective_id: &str) -> Self {
        Self {
            custom_rule_id: Some(custom_rule_id.to_string()),
            objective_id: Some(objective_id.to_string()),
            ..Default::default()
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn accepts(&self, alert: &Alert) -> bool {
        if let Some(rule_id) = &self.custom_rule_id {
            if alert.custom_rule_id.as_ref() != Some(rule_id) {
                return false;
            }
        }
        if let Some(objective_id) = &self.objective_id {
            if &alert.objective_id != objective_id {
                return false;
            }
        }
        if self.since.is_some_and(|since| alert.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| alert.created_at > until) {
            return false;
        }
        !(self.unread_only && alert.read)
    }
}

/// Append-only alert log.
pub trait AlertLog: Send + Sync {
    /// Alerts matching `query`, oldest first.
    fn list(&self, query: &AlertQuery) -> Result<Vec<Alert>>;

    fn append(&self, alert: &Alert) -> Result<()>;

    /// Marks an alert as read. Returns true if found.
    fn mark_read(&self, alert_id: &str) -> Result<bool>;

    /// Appends `alert` unless the log already holds an alert for the same
    /// `(custom_rule_id, objective_id)` pair created at or after `since`.
    /// Returns whether the alert was appended.
    ///
    /// The default composes `list` and `append` and is therefore not atomic;
    /// the bundled stores override it with a single critical section.
    fn append_if_absent(&self, alert: &Alert, since: DateTime<Utc>) -> Result<bool> {
        let query = AlertQuery {
            custom_rule_id: alert.custom_rule_id.clone(),
            objective_id: Some(alert.objective_id.clone()),
            since: Some(since),
            ..Default::default()
        };
        if !self.list(&query)?.is_empty() {
            return Ok(false);
        }
        self.append(alert)?;
        Ok(true)
    }
}

/// Read-only access to the objective universe.
pub trait ObjectiveSource: Send + Sync {
    /// Objectives accepted by `filter` for `role` (`None` means every role),
    /// in retrieval order.
    fn get_objectives(&self, filter: &ObjectiveFilter, role: Option<Role>) -> Result<Vec<Objective>>;
}

/// An objective together with the role whose dataset it belongs to.
/// Records without a role are visible to every role.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectiveRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub objective: Objective,
}

impl ObjectiveRecord {
    pub fn visible_to(&self, role: Option<Role>) -> bool {
        match (role, self.role) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(owner)) => wanted == owner,
        }
    }
}

/// Shared selection logic for sources that hold [`ObjectiveRecord`]s.
pub(crate) fn select_objectives(
    records: &[ObjectiveRecord],
    filter: &ObjectiveFilter,
    role: Option<Role>,
) -> Vec<Objective> {
    records
        .iter()
        .filter(|r| r.visible_to(role) && filter.accepts(&r.objective))
        .map(|r| r.objective.clone())
        .collect()
}
