use crate::condition::evaluate_condition;
use chrono::{DateTime, Utc};
use objmon_common::types::{ConditionLogic, CustomAlertRule, Objective};

/// Scope filters are conjunctive and independent of `condition_logic`.
pub fn in_scope(rule: &CustomAlertRule, objective: &Objective) -> bool {
    if !rule.responsible_ids.is_empty() {
        match &objective.responsible {
            Some(responsible) if rule.responsible_ids.contains(responsible) => {}
            _ => return false,
        }
    }
    if let Some(category) = &rule.category {
        if &objective.category != category {
            return false;
        }
    }
    if !rule.objective_ids.is_empty() && !rule.objective_ids.contains(&objective.id) {
        return false;
    }
    true
}

/// Does `rule` apply to `objective` at `now`?
///
/// A rule without conditions matches nothing.
pub fn matches(rule: &CustomAlertRule, objective: &Objective, now: DateTime<Utc>) -> bool {
    if rule.conditions.is_empty() || !in_scope(rule, objective) {
        return false;
    }
    let mut results = rule
        .conditions
        .iter()
        .map(|c| evaluate_condition(c, objective, now));
    match rule.condition_logic {
        ConditionLogic::And => results.all(|hit| hit),
        ConditionLogic::Or => results.any(|hit| hit),
    }
}

/// Objectives `rule` applies to, in input order.
pub fn matching_objectives<'a>(
    rule: &CustomAlertRule,
    objectives: &'a [Objective],
    now: DateTime<Utc>,
) -> Vec<&'a Objective> {
    objectives
        .iter()
        .filter(|o| matches(rule, o, now))
        .collect()
}
