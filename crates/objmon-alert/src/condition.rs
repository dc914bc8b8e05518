//! Single-condition evaluation.
//!
//! A condition resolves its field against an objective (computing the
//! time-derived fields from `now`) and applies its operator. Anything that
//! cannot be resolved or compared evaluates to `false`.

use chrono::{DateTime, Utc};
use objmon_common::types::{
    AlertCondition, ConditionField, ConditionOperator, ConditionValue, Objective,
};

const DAY_MS: f64 = 86_400_000.0;

/// A resolved objective field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    fn strictly_equals(&self, value: &ConditionValue) -> bool {
        match (self, value) {
            (FieldValue::Number(a), ConditionValue::Number(b)) => a == b,
            (FieldValue::Text(a), ConditionValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// Whole days from `from` to `to`, rounded up. Negative when `to` is earlier.
fn ceil_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let days = ((to - from).num_milliseconds() as f64 / DAY_MS).ceil();
    // ceil(-0.3) is -0.0; keep it printable as "0".
    if days == 0.0 {
        0.0
    } else {
        days
    }
}

/// Progress an objective should have reached by `now` if it advanced
/// linearly from creation to deadline, capped at 100.
pub fn expected_progress(objective: &Objective, now: DateTime<Utc>) -> f64 {
    let total_days = ceil_days(objective.created_at, objective.deadline);
    if total_days <= 0.0 {
        return 0.0;
    }
    let elapsed_days = ceil_days(objective.created_at, now);
    (elapsed_days / total_days * 100.0).min(100.0)
}

/// Expected progress minus actual progress. Positive means behind schedule.
pub fn deviation(objective: &Objective, now: DateTime<Utc>) -> f64 {
    expected_progress(objective, now) - objective.progress
}

pub fn days_until_deadline(objective: &Objective, now: DateTime<Utc>) -> f64 {
    ceil_days(now, objective.deadline)
}

pub fn days_since_update(objective: &Objective, now: DateTime<Utc>) -> f64 {
    ceil_days(objective.updated_at, now)
}

/// Resolve `field` for `objective`. `None` for fields this build does not know.
pub fn resolve_field(
    field: ConditionField,
    objective: &Objective,
    now: DateTime<Utc>,
) -> Option<FieldValue> {
    let value = match field {
        ConditionField::Progress => FieldValue::Number(objective.progress),
        ConditionField::CurrentValue => FieldValue::Number(objective.current_value),
        ConditionField::TargetValue => FieldValue::Number(objective.target_value),
        ConditionField::Deviation => FieldValue::Number(deviation(objective, now)),
        ConditionField::DaysUntilDeadline => {
            FieldValue::Number(days_until_deadline(objective, now))
        }
        ConditionField::DaysSinceUpdate => FieldValue::Number(days_since_update(objective, now)),
        ConditionField::Status => FieldValue::Text(objective.status.as_str().to_string()),
        ConditionField::Metric => FieldValue::Text(objective.metric.clone()),
        ConditionField::Category => FieldValue::Text(objective.category.clone()),
        ConditionField::Unknown => return None,
    };
    Some(value)
}

fn compare(field: &FieldValue, value: &ConditionValue, check: impl Fn(f64, f64) -> bool) -> bool {
    match (field.as_number(), value.as_number()) {
        (Some(a), Some(b)) => check(a, b),
        _ => false,
    }
}

/// Strict equality, or case-insensitive equality of both sides as strings.
/// The second form tolerates numbers persisted as strings and vice versa.
fn loosely_equals(field: &FieldValue, value: &ConditionValue) -> bool {
    field.strictly_equals(value)
        || field.as_text().to_lowercase() == value.to_string().to_lowercase()
}

fn contains(field: &FieldValue, value: &ConditionValue) -> bool {
    field
        .as_text()
        .to_lowercase()
        .contains(&value.to_string().to_lowercase())
}

/// Evaluate one condition against one objective at `now`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use objmon_alert::condition::evaluate_condition;
/// use objmon_common::types::*;
///
/// let now = Utc::now();
/// let objective = Objective {
///     id: "obj-1".into(),
///     title: "Revenue Q1".into(),
///     metric: "revenue".into(),
///     category: "finance".into(),
///     current_value: 40.0,
///     target_value: 100.0,
///     progress: 40.0,
///     status: ObjectiveStatus::InProgress,
///     deadline: now + Duration::days(10),
///     responsible: None,
///     created_at: now - Duration::days(10),
///     updated_at: now,
/// };
/// let condition = AlertCondition {
///     id: "c1".into(),
///     field: ConditionField::Progress,
///     operator: ConditionOperator::LessThan,
///     value: ConditionValue::Number(50.0),
///     value2: None,
/// };
/// assert!(evaluate_condition(&condition, &objective, now));
/// ```
pub fn evaluate_condition(
    condition: &AlertCondition,
    objective: &Objective,
    now: DateTime<Utc>,
) -> bool {
    let Some(field) = resolve_field(condition.field, objective, now) else {
        return false;
    };
    let value = &condition.value;

    match condition.operator {
        ConditionOperator::GreaterThan => compare(&field, value, |a, b| a > b),
        ConditionOperator::LessThan => compare(&field, value, |a, b| a < b),
        ConditionOperator::GreaterOrEqual => compare(&field, value, |a, b| a >= b),
        ConditionOperator::LessOrEqual => compare(&field, value, |a, b| a <= b),
        ConditionOperator::Equals => loosely_equals(&field, value),
        ConditionOperator::NotEquals => !loosely_equals(&field, value),
        ConditionOperator::Between => match (
            field.as_number(),
            value.as_number(),
            condition.value2.as_ref().and_then(ConditionValue::as_number),
        ) {
            (Some(x), Some(low), Some(high)) => x >= low && x <= high,
            _ => false,
        },
        ConditionOperator::Contains => contains(&field, value),
        ConditionOperator::NotContains => !contains(&field, value),
        ConditionOperator::Unknown => false,
    }
}
