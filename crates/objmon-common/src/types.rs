use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator role that owns objectives and rules.
///
/// # Examples
///
/// ```
/// use objmon_common::types::Role;
///
/// let role: Role = "gym".parse().unwrap();
/// assert_eq!(role, Role::Gym);
/// assert_eq!(role.to_string(), "gym");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Trainer,
    Gym,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Trainer => write!(f, "trainer"),
            Role::Gym => write!(f, "gym"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trainer" => Ok(Role::Trainer),
            "gym" => Ok(Role::Gym),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

// ---- Objectives (read-only input) ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    NotStarted,
    InProgress,
    Achieved,
    AtRisk,
    Failed,
}

impl ObjectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveStatus::NotStarted => "not_started",
            ObjectiveStatus::InProgress => "in_progress",
            ObjectiveStatus::Achieved => "achieved",
            ObjectiveStatus::AtRisk => "at_risk",
            ObjectiveStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked business target.
///
/// `progress` is read as given; it is not recomputed from
/// `current_value / target_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub id: String,
    pub title: String,
    pub metric: String,
    #[serde(default)]
    pub category: String,
    pub current_value: f64,
    pub target_value: f64,
    /// 0-100
    pub progress: f64,
    pub status: ObjectiveStatus,
    pub deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters accepted by objective retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveFilter {
    pub status: Option<ObjectiveStatus>,
    pub category: Option<String>,
    pub responsible: Option<String>,
}

impl ObjectiveFilter {
    pub fn accepts(&self, objective: &Objective) -> bool {
        if self.status.is_some_and(|s| s != objective.status) {
            return false;
        }
        if let Some(category) = &self.category {
            if &objective.category != category {
                return false;
            }
        }
        if let Some(responsible) = &self.responsible {
            if objective.responsible.as_ref() != Some(responsible) {
                return false;
            }
        }
        true
    }
}

// ---- Alert classification ----

/// Presentation class of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Warning,
    Error,
    Info,
    Success,
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use objmon_common::types::Severity;
///
/// let sev: Severity = "medium".parse().unwrap();
/// assert_eq!(sev, Severity::Medium);
/// assert!(Severity::High > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// What a custom rule is watching for. Drives the derived [`AlertKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAlertType {
    ObjectiveDeviation,
    ObjectiveAtRisk,
    ObjectiveFailed,
    ObjectiveNotUpdated,
    KpiCriticalDrop,
    Custom,
}

impl RuleAlertType {
    pub fn kind(&self) -> AlertKind {
        match self {
            RuleAlertType::ObjectiveAtRisk
            | RuleAlertType::ObjectiveFailed
            | RuleAlertType::KpiCriticalDrop => AlertKind::Error,
            RuleAlertType::ObjectiveDeviation | RuleAlertType::ObjectiveNotUpdated => {
                AlertKind::Warning
            }
            RuleAlertType::Custom => AlertKind::Info,
        }
    }
}

/// An alert record appended to the alert log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub alert_type: RuleAlertType,
    pub title: String,
    pub message: String,
    pub objective_id: String,
    pub severity: Severity,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    /// Back-reference to the custom rule that produced this alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rule_id: Option<String>,
}

// ---- Custom alert rules ----

/// Objective attribute a condition reads. Derived fields are computed at
/// evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionField {
    Progress,
    CurrentValue,
    TargetValue,
    Deviation,
    DaysUntilDeadline,
    DaysSinceUpdate,
    Status,
    Metric,
    Category,
    /// Anything a newer or hand-edited rule carries that this build does not know.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    GreaterThan,
    LessThan,
    Equals,
    NotEquals,
    GreaterOrEqual,
    LessOrEqual,
    Between,
    Contains,
    NotContains,
    #[serde(other)]
    Unknown,
}

/// Comparison operand as persisted: either a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

impl ConditionValue {
    /// Numeric view of the value. Strings are parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            ConditionValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionValue::Number(n) => write!(f, "{n}"),
            ConditionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        ConditionValue::Number(n)
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCondition {
    #[serde(default)]
    pub id: String,
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
    /// Upper bound, only meaningful for `between`. Stored numbers and
    /// numeric strings are both accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<ConditionValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionLogic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// Informational bucketing period. Not enforced by the evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPeriod {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for NoiseLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseLevel::Low => write!(f, "low"),
            NoiseLevel::Medium => write!(f, "medium"),
            NoiseLevel::High => write!(f, "high"),
        }
    }
}

/// Outcome of a dry run of a rule against the current objective set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRuleTestResult {
    pub id: String,
    pub rule_id: String,
    pub tested_at: DateTime<Utc>,
    pub tested_by: String,
    #[serde(default)]
    pub tested_by_name: String,
    pub matched_objectives: Vec<String>,
    pub matched_count: usize,
    pub would_generate_alerts: usize,
    /// At most five rendered alerts.
    pub sample_alerts: Vec<Alert>,
    pub noise_level: NoiseLevel,
    pub noise_reason: String,
    pub recommendations: Vec<String>,
}

/// Operator-defined rule that decides which objectives raise an alert.
///
/// `enabled` is the user toggle; `active` is system-gated and only set after
/// at least one recorded test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAlertRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub enabled: bool,
    pub active: bool,
    pub conditions: Vec<AlertCondition>,
    #[serde(default)]
    pub condition_logic: ConditionLogic,
    #[serde(default)]
    pub responsible_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub objective_ids: Vec<String>,
    #[serde(default)]
    pub period: AlertPeriod,
    pub alert_type: RuleAlertType,
    pub priority: Priority,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template: Option<String>,
    #[serde(default)]
    pub notification_channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub test_results: Vec<AlertRuleTestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested_by: Option<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomAlertRule {
    /// Whether the execution sweep picks this rule up.
    pub fn is_executable(&self) -> bool {
        self.enabled && self.active
    }

    pub fn latest_test_result(&self) -> Option<&AlertRuleTestResult> {
        self.test_results.last()
    }

    /// Rule is visible to `role` when it has no owner or the same owner.
    pub fn visible_to(&self, role: Option<Role>) -> bool {
        match (role, self.role) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(owner)) => wanted == owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_field_and_operator_deserialize_fail_closed() {
        let json = r#"{"field":"velocity","operator":"approx","value":3}"#;
        let cond: AlertCondition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.field, ConditionField::Unknown);
        assert_eq!(cond.operator, ConditionOperator::Unknown);
        assert_eq!(cond.value, ConditionValue::Number(3.0));
    }

    #[test]
    fn condition_value_accepts_strings_and_numbers() {
        let cond: AlertCondition =
            serde_json::from_str(r#"{"field":"status","operator":"equals","value":"at_risk"}"#)
                .unwrap();
        assert_eq!(cond.value, ConditionValue::Text("at_risk".into()));
        assert_eq!(ConditionValue::Text(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(ConditionValue::Text("abc".into()).as_number(), None);
    }

    #[test]
    fn condition_logic_uses_upper_case_names() {
        assert_eq!(serde_json::to_string(&ConditionLogic::Or).unwrap(), "\"OR\"");
        let logic: ConditionLogic = serde_json::from_str("\"AND\"").unwrap();
        assert_eq!(logic, ConditionLogic::And);
    }

    #[test]
    fn alert_kind_follows_rule_alert_type() {
        assert_eq!(RuleAlertType::ObjectiveAtRisk.kind(), AlertKind::Error);
        assert_eq!(RuleAlertType::ObjectiveDeviation.kind(), AlertKind::Warning);
        assert_eq!(RuleAlertType::Custom.kind(), AlertKind::Info);
    }

    #[test]
    fn objective_filter_matches_all_criteria() {
        let now = Utc::now();
        let objective = Objective {
            id: "obj-1".into(),
            title: "Revenue Q1".into(),
            metric: "revenue".into(),
            category: "finance".into(),
            current_value: 10.0,
            target_value: 100.0,
            progress: 10.0,
            status: ObjectiveStatus::InProgress,
            deadline: now,
            responsible: Some("u-1".into()),
            created_at: now,
            updated_at: now,
        };
        assert!(ObjectiveFilter::default().accepts(&objective));
        let filter = ObjectiveFilter {
            status: Some(ObjectiveStatus::InProgress),
            category: Some("finance".into()),
            responsible: Some("u-1".into()),
        };
        assert!(filter.accepts(&objective));
        let filter = ObjectiveFilter {
            responsible: Some("u-2".into()),
            ..Default::default()
        };
        assert!(!filter.accepts(&objective));
    }

    #[test]
    fn alert_serializes_kind_as_type() {
        let alert = Alert {
            id: "1".into(),
            kind: AlertKind::Warning,
            alert_type: RuleAlertType::ObjectiveDeviation,
            title: "t".into(),
            message: "m".into(),
            objective_id: "obj-1".into(),
            severity: Severity::Medium,
            priority: Priority::High,
            created_at: Utc::now(),
            read: false,
            custom_rule_id: Some("rule-1".into()),
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "warning");
        assert_eq!(value["customRuleId"], "rule-1");
        assert_eq!(value["alertType"], "objective_deviation");
    }
}
