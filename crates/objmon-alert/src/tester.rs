//! Dry-run of a rule against the current objective set.
//!
//! The noise level classifies how much of the population a rule matches:
//! above 50% is `high`, above 20% up to 50% is `medium`, 20% or less is
//! `low`. With no objectives at all the percentage is 0.

use crate::matcher::matching_objectives;
use crate::template::build_alert;
use chrono::{DateTime, Utc};
use objmon_common::i18n::TRANSLATIONS;
use objmon_common::types::{AlertRuleTestResult, CustomAlertRule, NoiseLevel, Objective};

pub const SAMPLE_ALERT_LIMIT: usize = 5;
pub const HIGH_NOISE_PERCENT: f64 = 50.0;
pub const MEDIUM_NOISE_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseAssessment {
    pub level: NoiseLevel,
    pub match_percentage: f64,
    pub reason: String,
    pub recommendations: Vec<String>,
}

pub fn match_percentage(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Multiply first so exact boundaries (2 of 10, 5 of 10) stay exact.
    matched as f64 * 100.0 / total as f64
}

pub fn assess_noise(matched: usize, total: usize, locale: &str) -> NoiseAssessment {
    let pct = match_percentage(matched, total);
    let t = |key: &str, default: &'static str| -> String {
        TRANSLATIONS
            .get(locale, key, default)
            .replace("{pct}", &format!("{pct:.1}"))
            .replace("{matched}", &matched.to_string())
            .replace("{total}", &total.to_string())
    };

    if pct > HIGH_NOISE_PERCENT {
        NoiseAssessment {
            level: NoiseLevel::High,
            match_percentage: pct,
            reason: t("noise.high.reason", "The rule matches {pct}% of objectives"),
            recommendations: vec![
                t("noise.high.narrow_conditions", "Narrow the conditions"),
                t("noise.high.add_filters", "Add responsible or category filters"),
            ],
        }
    } else if pct > MEDIUM_NOISE_PERCENT {
        NoiseAssessment {
            level: NoiseLevel::Medium,
            match_percentage: pct,
            reason: t("noise.medium.reason", "The rule matches {pct}% of objectives"),
            recommendations: vec![t(
                "noise.medium.add_conditions",
                "Consider adding conditions to reduce false positives",
            )],
        }
    } else {
        let mut recommendations = Vec::new();
        if matched == 0 {
            recommendations.push(t(
                "noise.low.no_matches",
                "Rule matches no objectives, verify conditions",
            ));
        }
        NoiseAssessment {
            level: NoiseLevel::Low,
            match_percentage: pct,
            reason: t("noise.low.reason", "The rule matches {pct}% of objectives"),
            recommendations,
        }
    }
}

/// Evaluate `rule` against `objectives` and build the test report.
///
/// Pure: recording the result on the rule is the caller's job (see
/// [`crate::lifecycle::RuleManager::test`]).
pub fn run_test(
    rule: &CustomAlertRule,
    objectives: &[Objective],
    tested_by: &str,
    tested_by_name: &str,
    now: DateTime<Utc>,
    locale: &str,
) -> AlertRuleTestResult {
    let matched = matching_objectives(rule, objectives, now);
    let noise = assess_noise(matched.len(), objectives.len(), locale);
    let sample_alerts = matched
        .iter()
        .take(SAMPLE_ALERT_LIMIT)
        .map(|o| build_alert(rule, o, now, locale))
        .collect();

    AlertRuleTestResult {
        id: objmon_common::id::next_tagged("test"),
        rule_id: rule.id.clone(),
        tested_at: now,
        tested_by: tested_by.to_string(),
        tested_by_name: tested_by_name.to_string(),
        matched_objectives: matched.iter().map(|o| o.id.clone()).collect(),
        matched_count: matched.len(),
        would_generate_alerts: matched.len(),
        sample_alerts,
        noise_level: noise.level,
        noise_reason: noise.reason,
        recommendations: noise.recommendations,
    }
}
