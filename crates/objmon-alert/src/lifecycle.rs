//! Rule CRUD and the `{enabled, active}` state machine.
//!
//! New rules start `enabled = true, active = false`. Activation requires at
//! least one recorded test; deactivation and the enable toggle are always
//! allowed. Editing conditions or scope does not reset `active`: operators
//! retest and reactivate explicitly.

use crate::error::{Result, RuleError};
use crate::tester::run_test;
use objmon_common::clock::Clock;
use objmon_common::i18n::normalize_locale;
use objmon_common::types::{
    AlertCondition, AlertPeriod, AlertRuleTestResult, ConditionLogic, ConditionOperator,
    CustomAlertRule, NotificationChannel, ObjectiveFilter, Priority, Role, RuleAlertType, Severity,
};
use objmon_storage::{ObjectiveSource, RuleStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for creating a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub conditions: Vec<AlertCondition>,
    #[serde(default)]
    pub condition_logic: ConditionLogic,
    #[serde(default)]
    pub responsible_ids: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub objective_ids: Vec<String>,
    #[serde(default)]
    pub period: AlertPeriod,
    #[serde(default = "default_alert_type")]
    pub alert_type: RuleAlertType,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub title_template: Option<String>,
    #[serde(default)]
    pub message_template: Option<String>,
    #[serde(default = "default_channels")]
    pub notification_channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_by_name: String,
}

fn default_alert_type() -> RuleAlertType {
    RuleAlertType::ObjectiveDeviation
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn default_channels() -> Vec<NotificationChannel> {
    vec![NotificationChannel::InApp]
}

impl RuleDraft {
    /// A draft with the rule builder's defaults.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            role: None,
            conditions: Vec::new(),
            condition_logic: ConditionLogic::And,
            responsible_ids: Vec::new(),
            category: None,
            objective_ids: Vec::new(),
            period: AlertPeriod::Month,
            alert_type: default_alert_type(),
            priority: default_priority(),
            severity: default_severity(),
            title_template: None,
            message_template: None,
            notification_channels: default_channels(),
            created_by: String::new(),
            created_by_name: String::new(),
        }
    }
}

/// Partial rule edit. `None` leaves the field unchanged; `active` is not
/// editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub conditions: Option<Vec<AlertCondition>>,
    pub condition_logic: Option<ConditionLogic>,
    pub responsible_ids: Option<Vec<String>>,
    /// `Some(None)` clears the category filter.
    pub category: Option<Option<String>>,
    pub objective_ids: Option<Vec<String>>,
    pub period: Option<AlertPeriod>,
    pub alert_type: Option<RuleAlertType>,
    pub priority: Option<Priority>,
    pub severity: Option<Severity>,
    pub title_template: Option<Option<String>>,
    pub message_template: Option<Option<String>>,
    pub notification_channels: Option<Vec<NotificationChannel>>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RuleError::Validation("rule name must not be empty".into()));
    }
    Ok(())
}

fn validate_conditions(conditions: &[AlertCondition]) -> Result<()> {
    for (idx, condition) in conditions.iter().enumerate() {
        if condition.operator != ConditionOperator::Between {
            continue;
        }
        let bounds = (
            condition.value.as_number(),
            condition.value2.as_ref().and_then(|v| v.as_number()),
        );
        if !matches!(bounds, (Some(_), Some(_))) {
            return Err(RuleError::Validation(format!(
                "condition #{} uses 'between' without numeric value and value2",
                idx + 1
            )));
        }
    }
    Ok(())
}

fn assign_condition_ids(conditions: &mut [AlertCondition]) {
    for condition in conditions.iter_mut().filter(|c| c.id.is_empty()) {
        condition.id = objmon_common::id::next_tagged("cond");
    }
}

pub struct RuleManager {
    rules: Arc<dyn RuleStore>,
    objectives: Arc<dyn ObjectiveSource>,
    clock: Arc<dyn Clock>,
    locale: String,
}

impl RuleManager {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        objectives: Arc<dyn ObjectiveSource>,
        clock: Arc<dyn Clock>,
        locale: &str,
    ) -> Self {
        Self {
            rules,
            objectives,
            clock,
            locale: normalize_locale(locale).to_string(),
        }
    }

    pub fn list(&self, role: Option<Role>) -> Result<Vec<CustomAlertRule>> {
        Ok(self.rules.list(role)?)
    }

    pub fn get(&self, id: &str) -> Result<CustomAlertRule> {
        self.rules
            .get(id)?
            .ok_or_else(|| RuleError::NotFound(id.to_string()))
    }

    pub fn create(&self, draft: RuleDraft) -> Result<CustomAlertRule> {
        validate_name(&draft.name)?;
        validate_conditions(&draft.conditions)?;

        let now = self.clock.now();
        let mut conditions = draft.conditions;
        assign_condition_ids(&mut conditions);

        let rule = CustomAlertRule {
            id: objmon_common::id::next_tagged("rule"),
            name: draft.name.trim().to_string(),
            description: draft.description,
            role: draft.role,
            enabled: true,
            active: false,
            conditions,
            condition_logic: draft.condition_logic,
            responsible_ids: draft.responsible_ids,
            category: draft.category,
            objective_ids: draft.objective_ids,
            period: draft.period,
            alert_type: draft.alert_type,
            priority: draft.priority,
            severity: draft.severity,
            title_template: draft.title_template,
            message_template: draft.message_template,
            notification_channels: draft.notification_channels,
            test_results: Vec::new(),
            last_tested_at: None,
            last_tested_by: None,
            created_by: draft.created_by,
            created_by_name: draft.created_by_name,
            created_at: now,
            updated_at: now,
        };
        self.rules.create(&rule)?;
        tracing::info!(rule_id = %rule.id, rule_name = %rule.name, "Custom alert rule created");
        Ok(rule)
    }

    pub fn update(&self, id: &str, update: AlertRuleUpdate) -> Result<CustomAlertRule> {
        let mut rule = self.get(id)?;

        if let Some(name) = update.name {
            validate_name(&name)?;
            rule.name = name.trim().to_string();
        }
        if let Some(mut conditions) = update.conditions {
            validate_conditions(&conditions)?;
            assign_condition_ids(&mut conditions);
            rule.conditions = conditions;
        }
        if let Some(description) = update.description {
            rule.description = description;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(logic) = update.condition_logic {
            rule.condition_logic = logic;
        }
        if let Some(ids) = update.responsible_ids {
            rule.responsible_ids = ids;
        }
        if let Some(category) = update.category {
            rule.category = category;
        }
        if let Some(ids) = update.objective_ids {
            rule.objective_ids = ids;
        }
        if let Some(period) = update.period {
            rule.period = period;
        }
        if let Some(alert_type) = update.alert_type {
            rule.alert_type = alert_type;
        }
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }
        if let Some(severity) = update.severity {
            rule.severity = severity;
        }
        if let Some(template) = update.title_template {
            rule.title_template = template;
        }
        if let Some(template) = update.message_template {
            rule.message_template = template;
        }
        if let Some(channels) = update.notification_channels {
            rule.notification_channels = channels;
        }

        rule.updated_at = self.clock.now();
        self.rules.update(&rule)?;
        tracing::info!(rule_id = %rule.id, active = rule.active, "Custom alert rule updated");
        Ok(rule)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<CustomAlertRule> {
        let mut rule = self.get(id)?;
        rule.enabled = enabled;
        rule.updated_at = self.clock.now();
        self.rules.update(&rule)?;
        tracing::info!(rule_id = %rule.id, enabled, "Custom alert rule toggled");
        Ok(rule)
    }

    pub fn activate(&self, id: &str) -> Result<CustomAlertRule> {
        let mut rule = self.get(id)?;
        if rule.test_results.is_empty() {
            return Err(RuleError::PreconditionFailed(
                "rule must be tested before activation".into(),
            ));
        }
        rule.active = true;
        rule.updated_at = self.clock.now();
        self.rules.update(&rule)?;
        tracing::info!(rule_id = %rule.id, "Custom alert rule activated");
        Ok(rule)
    }

    pub fn deactivate(&self, id: &str) -> Result<CustomAlertRule> {
        let mut rule = self.get(id)?;
        rule.active = false;
        rule.updated_at = self.clock.now();
        self.rules.update(&rule)?;
        tracing::info!(rule_id = %rule.id, "Custom alert rule deactivated");
        Ok(rule)
    }

    /// Removes the rule and its test history. Deleting a missing rule is not an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self.rules.delete(id)?;
        tracing::info!(rule_id = %id, removed, "Custom alert rule deleted");
        Ok(())
    }

    /// Test `rule` as given (possibly with unsaved edits) against the
    /// objectives visible to its role, then append the result to the stored
    /// rule's history.
    pub fn test(
        &self,
        rule: &CustomAlertRule,
        tested_by: &str,
        tested_by_name: &str,
    ) -> Result<AlertRuleTestResult> {
        validate_name(&rule.name)?;
        validate_conditions(&rule.conditions)?;
        let mut stored = self.get(&rule.id)?;
        let objectives = self
            .objectives
            .get_objectives(&ObjectiveFilter::default(), rule.role)?;
        let now = self.clock.now();
        let result = run_test(rule, &objectives, tested_by, tested_by_name, now, &self.locale);

        stored.test_results.push(result.clone());
        stored.last_tested_at = Some(now);
        stored.last_tested_by = Some(tested_by.to_string());
        self.rules.update(&stored)?;

        tracing::info!(
            rule_id = %rule.id,
            matched = result.matched_count,
            total = objectives.len(),
            noise = %result.noise_level,
            "Custom alert rule tested"
        );
        Ok(result)
    }

    /// [`Self::test`] on the stored version of the rule.
    pub fn test_by_id(
        &self,
        id: &str,
        tested_by: &str,
        tested_by_name: &str,
    ) -> Result<AlertRuleTestResult> {
        let rule = self.get(id)?;
        self.test(&rule, tested_by, tested_by_name)
    }
}
