//! Alert text rendering.
//!
//! Operator templates support `{objective}`, `{progress}`, `{currentValue}`
//! and `{targetValue}`. Each placeholder is replaced once, at its first
//! occurrence. Rules without a template get the localized default.
//!
//! Tester samples go through this same renderer, so sample text already
//! substitutes `{currentValue}` and `{targetValue}` and matches the alerts a
//! sweep creates word for word.

use chrono::{DateTime, Utc};
use objmon_common::i18n::TRANSLATIONS;
use objmon_common::types::{Alert, CustomAlertRule, Objective};

fn non_blank(template: &Option<String>) -> Option<&str> {
    template.as_deref().filter(|t| !t.trim().is_empty())
}

/// Replace the first occurrence of each supported placeholder.
///
/// # Examples
///
/// ```
/// # use chrono::Utc;
/// # use objmon_common::types::*;
/// use objmon_alert::template::substitute;
///
/// # let now = Utc::now();
/// let objective = Objective {
///     id: "obj-1".into(),
///     title: "Revenue Q1".into(),
///     metric: "revenue".into(),
///     category: String::new(),
///     current_value: 4000.0,
///     target_value: 10000.0,
///     progress: 40.0,
///     status: ObjectiveStatus::InProgress,
///     deadline: now,
///     responsible: None,
///     created_at: now,
///     updated_at: now,
/// };
/// assert_eq!(
///     substitute("{objective} at {progress}% ({currentValue}/{targetValue})", &objective),
///     "Revenue Q1 at 40% (4000/10000)"
/// );
/// ```
pub fn substitute(template: &str, objective: &Objective) -> String {
    template
        .replacen("{objective}", &objective.title, 1)
        .replacen("{progress}", &objective.progress.to_string(), 1)
        .replacen("{currentValue}", &objective.current_value.to_string(), 1)
        .replacen("{targetValue}", &objective.target_value.to_string(), 1)
}

pub fn render_title(rule: &CustomAlertRule, objective: &Objective, locale: &str) -> String {
    match non_blank(&rule.title_template) {
        Some(template) => substitute(template, objective),
        None => TRANSLATIONS
            .get(locale, "alert.default_title", "Alerta: {title}")
            .replace("{title}", &objective.title),
    }
}

pub fn render_message(rule: &CustomAlertRule, objective: &Objective, locale: &str) -> String {
    match non_blank(&rule.message_template) {
        Some(template) => substitute(template, objective),
        None => TRANSLATIONS
            .get(
                locale,
                "alert.default_message",
                "Objective \"{title}\" meets the conditions of rule \"{rule}\" (progress: {progress}%)",
            )
            .replace("{title}", &objective.title)
            .replace("{rule}", &rule.name)
            .replace("{progress}", &format!("{:.1}", objective.progress)),
    }
}

/// Build the unread alert `rule` raises for `objective`.
pub fn build_alert(
    rule: &CustomAlertRule,
    objective: &Objective,
    now: DateTime<Utc>,
    locale: &str,
) -> Alert {
    Alert {
        id: objmon_common::id::next_tagged("alert"),
        kind: rule.alert_type.kind(),
        alert_type: rule.alert_type,
        title: render_title(rule, objective, locale),
        message: render_message(rule, objective, locale),
        objective_id: objective.id.clone(),
        severity: rule.severity,
        priority: rule.priority,
        created_at: now,
        read: false,
        custom_rule_id: Some(rule.id.clone()),
    }
}
