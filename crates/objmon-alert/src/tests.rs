use crate::engine::ExecutionEngine;
use crate::lifecycle::{AlertRuleUpdate, RuleDraft, RuleManager};
use crate::matcher::{matches, matching_objectives};
use crate::RuleError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use objmon_common::clock::{Clock, ManualClock};
use objmon_common::types::*;
use objmon_storage::memory::{MemoryAlertLog, MemoryObjectiveSource, MemoryRuleStore};
use objmon_storage::{AlertLog, AlertQuery, ObjectiveRecord, RuleStore, StorageError};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn objective(id: &str, title: &str, progress: f64) -> Objective {
    Objective {
        id: id.to_string(),
        title: title.to_string(),
        metric: "revenue".to_string(),
        category: "sales".to_string(),
        current_value: progress * 100.0,
        target_value: 10000.0,
        progress,
        status: ObjectiveStatus::InProgress,
        deadline: t0() + Duration::days(30),
        responsible: Some("u1".to_string()),
        created_at: t0() - Duration::days(30),
        updated_at: t0() - Duration::days(2),
    }
}

fn condition(field: ConditionField, operator: ConditionOperator, value: ConditionValue) -> AlertCondition {
    AlertCondition {
        id: String::new(),
        field,
        operator,
        value,
        value2: None,
    }
}

fn progress_below(limit: f64) -> AlertCondition {
    condition(ConditionField::Progress, ConditionOperator::LessThan, limit.into())
}

/// Ten objectives with progress 5, 15, ..., 95.
fn population() -> Vec<Objective> {
    (0..10)
        .map(|i| objective(&format!("obj-{i}"), &format!("Objective {i}"), 5.0 + 10.0 * i as f64))
        .collect()
}

struct Harness {
    clock: Arc<ManualClock>,
    rules: Arc<MemoryRuleStore>,
    alerts: Arc<MemoryAlertLog>,
    manager: RuleManager,
    engine: ExecutionEngine,
}

fn harness(objectives: Vec<Objective>, locale: &str) -> Harness {
    harness_with_records(
        objectives
            .into_iter()
            .map(|objective| ObjectiveRecord {
                role: None,
                objective,
            })
            .collect(),
        locale,
    )
}

fn harness_with_records(records: Vec<ObjectiveRecord>, locale: &str) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let rules = Arc::new(MemoryRuleStore::new());
    let alerts = Arc::new(MemoryAlertLog::new());
    let objectives = Arc::new(MemoryObjectiveSource::new(records));
    let manager = RuleManager::new(rules.clone(), objectives.clone(), clock.clone(), locale);
    let engine = ExecutionEngine::new(rules.clone(), alerts.clone(), objectives, clock.clone(), locale);
    Harness {
        clock,
        rules,
        alerts,
        manager,
        engine,
    }
}

fn draft(name: &str, conditions: Vec<AlertCondition>) -> RuleDraft {
    RuleDraft {
        conditions,
        ..RuleDraft::named(name)
    }
}

fn rule_with(conditions: Vec<AlertCondition>, logic: ConditionLogic) -> CustomAlertRule {
    let h = harness(Vec::new(), "en");
    let mut d = draft("preview", conditions);
    d.condition_logic = logic;
    h.manager.create(d).unwrap()
}

// ---- matcher ----

#[test]
fn and_requires_every_condition() {
    let rule = rule_with(
        vec![
            progress_below(50.0),
            condition(ConditionField::Category, ConditionOperator::Equals, "sales".into()),
        ],
        ConditionLogic::And,
    );
    assert!(matches(&rule, &objective("a", "A", 30.0), t0()));
    let mut other = objective("b", "B", 30.0);
    other.category = "ops".into();
    assert!(!matches(&rule, &other, t0()));
}

#[test]
fn progress_below_fifty_scenario() {
    let rule = rule_with(vec![progress_below(50.0)], ConditionLogic::And);
    assert!(matches(&rule, &objective("a", "A", 40.0), t0()));
    assert!(!matches(&rule, &objective("b", "B", 60.0), t0()));
}

#[test]
fn or_requires_any_condition() {
    let rule = rule_with(
        vec![
            progress_below(10.0),
            condition(ConditionField::Status, ConditionOperator::Equals, "at_risk".into()),
        ],
        ConditionLogic::Or,
    );
    let mut at_risk = objective("a", "A", 80.0);
    at_risk.status = ObjectiveStatus::AtRisk;
    assert!(matches(&rule, &at_risk, t0()));
    assert!(matches(&rule, &objective("b", "B", 5.0), t0()));
    assert!(!matches(&rule, &objective("c", "C", 50.0), t0()));
}

#[test]
fn rule_without_conditions_matches_nothing() {
    let rule = rule_with(Vec::new(), ConditionLogic::Or);
    assert!(matching_objectives(&rule, &population(), t0()).is_empty());
}

#[test]
fn scope_filters_apply_regardless_of_logic() {
    let mut rule = rule_with(vec![progress_below(100.0)], ConditionLogic::Or);
    let objectives = population();

    rule.objective_ids = vec!["obj-1".into(), "obj-3".into()];
    let ids: Vec<_> = matching_objectives(&rule, &objectives, t0())
        .into_iter()
        .map(|o| o.id.as_str())
        .collect();
    assert_eq!(ids, vec!["obj-1", "obj-3"]);

    rule.objective_ids.clear();
    rule.responsible_ids = vec!["someone-else".into()];
    assert!(matching_objectives(&rule, &objectives, t0()).is_empty());

    rule.responsible_ids.clear();
    rule.category = Some("ops".into());
    assert!(matching_objectives(&rule, &objectives, t0()).is_empty());
}

#[test]
fn responsible_filter_skips_unassigned_objectives() {
    let mut rule = rule_with(vec![progress_below(100.0)], ConditionLogic::And);
    rule.responsible_ids = vec!["u1".into()];
    let mut unassigned = objective("a", "A", 10.0);
    unassigned.responsible = None;
    assert!(!matches(&rule, &unassigned, t0()));
    assert!(matches(&rule, &objective("b", "B", 10.0), t0()));
}

// ---- lifecycle ----

#[test]
fn create_assigns_ids_and_starts_inactive() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("Low progress", vec![progress_below(20.0)])).unwrap();

    assert!(rule.id.starts_with("rule-"));
    assert!(rule.conditions.iter().all(|c| c.id.starts_with("cond-")));
    assert!(rule.enabled);
    assert!(!rule.active);
    assert!(rule.test_results.is_empty());
    assert_eq!(rule.notification_channels, vec![NotificationChannel::InApp]);
    assert_eq!(rule.created_at, t0());
    assert_eq!(h.manager.get(&rule.id).unwrap(), rule);
}

#[test]
fn create_rejects_invalid_drafts() {
    let h = harness(Vec::new(), "en");
    assert!(matches!(
        h.manager.create(draft("  ", vec![progress_below(1.0)])),
        Err(RuleError::Validation(_))
    ));

    let between = condition(ConditionField::Progress, ConditionOperator::Between, 10.0.into());
    assert!(matches!(
        h.manager.create(draft("range", vec![between])),
        Err(RuleError::Validation(_))
    ));
    assert!(h.manager.list(None).unwrap().is_empty());
}

#[test]
fn testing_a_malformed_rule_is_rejected_and_not_recorded() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("range", vec![progress_below(50.0)])).unwrap();

    let mut edited = rule.clone();
    edited.conditions = vec![condition(
        ConditionField::Progress,
        ConditionOperator::Between,
        10.0.into(),
    )];
    assert!(matches!(
        h.manager.test(&edited, "u", "U"),
        Err(RuleError::Validation(_))
    ));

    edited.conditions[0].value2 = Some("not a number".into());
    assert!(matches!(
        h.manager.test(&edited, "u", "U"),
        Err(RuleError::Validation(_))
    ));

    let stored = h.manager.get(&rule.id).unwrap();
    assert!(stored.test_results.is_empty());
    assert!(stored.last_tested_at.is_none());
    assert!(matches!(
        h.manager.activate(&rule.id),
        Err(RuleError::PreconditionFailed(_))
    ));
}

#[test]
fn numeric_string_upper_bound_is_accepted() {
    let h = harness(population(), "en");
    let mut between = condition(ConditionField::Progress, ConditionOperator::Between, 10.0.into());
    between.value2 = Some("30".into());
    let rule = h.manager.create(draft("range", vec![between])).unwrap();
    // progress 15 and 25
    assert_eq!(h.manager.test_by_id(&rule.id, "u", "U").unwrap().matched_count, 2);
}

#[test]
fn activation_requires_a_test() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("Low progress", vec![progress_below(20.0)])).unwrap();

    match h.manager.activate(&rule.id) {
        Err(RuleError::PreconditionFailed(msg)) => {
            assert_eq!(msg, "rule must be tested before activation")
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }
    assert!(!h.manager.get(&rule.id).unwrap().active);

    h.manager.test_by_id(&rule.id, "u-admin", "Admin").unwrap();
    assert!(h.manager.activate(&rule.id).unwrap().active);
}

#[test]
fn deactivate_and_toggle_are_unconditional() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("r", vec![progress_below(20.0)])).unwrap();

    assert!(!h.manager.deactivate(&rule.id).unwrap().active);
    assert!(!h.manager.set_enabled(&rule.id, false).unwrap().enabled);
    assert!(h.manager.set_enabled(&rule.id, true).unwrap().enabled);
}

#[test]
fn unknown_rule_is_not_found() {
    let h = harness(Vec::new(), "en");
    assert!(matches!(h.manager.get("rule-missing"), Err(RuleError::NotFound(_))));
    assert!(matches!(h.manager.activate("rule-missing"), Err(RuleError::NotFound(_))));
    assert!(matches!(
        h.manager.update("rule-missing", AlertRuleUpdate::default()),
        Err(RuleError::NotFound(_))
    ));
    h.manager.delete("rule-missing").unwrap();
}

#[test]
fn update_keeps_activation_and_bumps_updated_at() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("r", vec![progress_below(20.0)])).unwrap();
    h.manager.test_by_id(&rule.id, "u", "U").unwrap();
    h.manager.activate(&rule.id).unwrap();

    h.clock.advance(Duration::minutes(5));
    let updated = h
        .manager
        .update(
            &rule.id,
            AlertRuleUpdate {
                conditions: Some(vec![progress_below(60.0)]),
                category: Some(Some("sales".into())),
                ..Default::default()
            },
        )
        .unwrap();

    assert!(updated.active);
    assert_eq!(updated.updated_at, t0() + Duration::minutes(5));
    assert_eq!(updated.category.as_deref(), Some("sales"));
    assert!(updated.conditions[0].id.starts_with("cond-"));
    assert_eq!(updated.test_results.len(), 1);
}

#[test]
fn delete_removes_rule_and_history() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("r", vec![progress_below(20.0)])).unwrap();
    h.manager.test_by_id(&rule.id, "u", "U").unwrap();
    h.manager.delete(&rule.id).unwrap();
    assert!(h.manager.list(None).unwrap().is_empty());
    h.manager.delete(&rule.id).unwrap();
}

// ---- tester ----

fn noise_for(limit: f64) -> AlertRuleTestResult {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("n", vec![progress_below(limit)])).unwrap();
    h.manager.test_by_id(&rule.id, "u", "U").unwrap()
}

#[test]
fn noise_levels_follow_match_share() {
    // progress 5..95: below 60 matches six, below 30 three, below 10 one.
    let high = noise_for(60.0);
    assert_eq!(high.matched_count, 6);
    assert_eq!(high.noise_level, NoiseLevel::High);
    assert_eq!(high.recommendations.len(), 2);

    let medium = noise_for(30.0);
    assert_eq!(medium.matched_count, 3);
    assert_eq!(medium.noise_level, NoiseLevel::Medium);
    assert_eq!(medium.recommendations.len(), 1);

    let low = noise_for(10.0);
    assert_eq!(low.matched_count, 1);
    assert_eq!(low.noise_level, NoiseLevel::Low);
    assert!(low.recommendations.is_empty());
}

#[test]
fn test_result_is_recorded_and_samples_are_capped() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("wide", vec![progress_below(100.0)])).unwrap();
    h.clock.advance(Duration::hours(1));
    let result = h.manager.test_by_id(&rule.id, "u-admin", "Admin").unwrap();

    assert_eq!(result.rule_id, rule.id);
    assert_eq!(result.matched_count, 10);
    assert_eq!(result.would_generate_alerts, 10);
    assert_eq!(result.matched_objectives.len(), 10);
    assert_eq!(result.sample_alerts.len(), 5);
    assert_eq!(result.tested_by_name, "Admin");
    assert!(result.sample_alerts.iter().all(|a| !a.read));

    let stored = h.manager.get(&rule.id).unwrap();
    assert_eq!(stored.latest_test_result(), Some(&result));
    assert_eq!(stored.last_tested_at, Some(t0() + Duration::hours(1)));
    assert_eq!(stored.last_tested_by.as_deref(), Some("u-admin"));
    assert_eq!(stored.updated_at, t0());
}

#[test]
fn testing_never_writes_alerts() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("wide", vec![progress_below(100.0)])).unwrap();
    h.manager.test_by_id(&rule.id, "u", "U").unwrap();
    assert!(h.alerts.is_empty());
}

#[test]
fn unsaved_edits_are_tested_against_the_stored_history() {
    let h = harness(population(), "en");
    let rule = h.manager.create(draft("r", vec![progress_below(10.0)])).unwrap();
    let mut edited = rule.clone();
    edited.conditions = vec![progress_below(60.0)];

    let result = h.manager.test(&edited, "u", "U").unwrap();
    assert_eq!(result.matched_count, 6);
    // Stored conditions are untouched, only the history grows.
    let stored = h.manager.get(&rule.id).unwrap();
    assert_eq!(stored.conditions, rule.conditions);
    assert_eq!(stored.test_results.len(), 1);
}

#[test]
fn testing_an_unsaved_rule_is_not_found() {
    let h = harness(population(), "en");
    let mut rule = h.manager.create(draft("r", vec![progress_below(10.0)])).unwrap();
    rule.id = "rule-never-saved".into();
    assert!(matches!(h.manager.test(&rule, "u", "U"), Err(RuleError::NotFound(_))));
}

// ---- execution ----

fn active_rule(h: &Harness, d: RuleDraft) -> CustomAlertRule {
    let rule = h.manager.create(d).unwrap();
    h.manager.test_by_id(&rule.id, "u", "U").unwrap();
    h.manager.activate(&rule.id).unwrap()
}

#[test]
fn only_enabled_and_active_rules_execute() {
    let h = harness(population(), "en");
    let untested = h.manager.create(draft("untested", vec![progress_below(100.0)])).unwrap();
    let disabled = active_rule(&h, draft("disabled", vec![progress_below(100.0)]));
    h.manager.set_enabled(&disabled.id, false).unwrap();
    let live = active_rule(&h, draft("live", vec![progress_below(10.0)]));

    let created = h.engine.run_active_rules(None).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].custom_rule_id.as_deref(), Some(live.id.as_str()));
    assert!(h
        .alerts
        .list(&AlertQuery {
            custom_rule_id: Some(untested.id),
            ..Default::default()
        })
        .unwrap()
        .is_empty());
}

#[test]
fn dedup_suppresses_within_window_and_reopens_after() {
    let h = harness(vec![objective("obj-rev", "Revenue Q1", 10.0)], "en");
    active_rule(&h, draft("low", vec![progress_below(20.0)]));

    assert_eq!(h.engine.run_active_rules(None).unwrap().len(), 1);
    h.clock.advance(Duration::hours(1));
    assert!(h.engine.run_active_rules(None).unwrap().is_empty());
    assert_eq!(h.alerts.len(), 1);

    h.clock.advance(Duration::hours(24));
    assert_eq!(h.engine.run_active_rules(None).unwrap().len(), 1);
    assert_eq!(h.alerts.len(), 2);
}

#[test]
fn dedup_window_is_configurable() {
    let clock = Arc::new(ManualClock::new(t0()));
    let rules = Arc::new(MemoryRuleStore::new());
    let alerts = Arc::new(MemoryAlertLog::new());
    let objectives = Arc::new(MemoryObjectiveSource::shared(vec![objective("o", "O", 1.0)]));
    let manager = RuleManager::new(rules.clone(), objectives.clone(), clock.clone(), "en");
    let engine = ExecutionEngine::new(rules, alerts.clone(), objectives, clock.clone(), "en")
        .with_dedup_window(Duration::hours(1));
    assert_eq!(engine.dedup_window(), Duration::hours(1));

    let rule = manager.create(draft("r", vec![progress_below(5.0)])).unwrap();
    manager.test_by_id(&rule.id, "u", "U").unwrap();
    manager.activate(&rule.id).unwrap();

    assert_eq!(engine.run_active_rules(None).unwrap().len(), 1);
    clock.advance(Duration::minutes(61));
    assert_eq!(engine.run_active_rules(None).unwrap().len(), 1);
    assert_eq!(alerts.len(), 2);
}

#[test]
fn alert_carries_rule_attributes_and_rendered_template() {
    let h = harness(vec![objective("obj-rev", "Revenue Q1", 10.0)], "en");
    let mut d = draft("low", vec![progress_below(20.0)]);
    d.title_template = Some("Alert: {objective}".into());
    d.message_template = Some("{objective} is at {progress}%".into());
    d.alert_type = RuleAlertType::ObjectiveAtRisk;
    d.severity = Severity::High;
    d.priority = Priority::Critical;
    let rule = active_rule(&h, d);

    let created = h.engine.run_active_rules(None).unwrap();
    let alert = &created[0];
    assert_eq!(alert.title, "Alert: Revenue Q1");
    assert_eq!(alert.message, "Revenue Q1 is at 10%");
    assert_eq!(alert.kind, AlertKind::Error);
    assert_eq!(alert.alert_type, RuleAlertType::ObjectiveAtRisk);
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.priority, Priority::Critical);
    assert_eq!(alert.objective_id, "obj-rev");
    assert_eq!(alert.custom_rule_id.as_deref(), Some(rule.id.as_str()));
    assert_eq!(alert.created_at, t0());
    assert!(!alert.read);
}

#[test]
fn default_title_is_localized() {
    let h = harness(vec![objective("obj-rev", "Revenue Q1", 10.0)], "es");
    active_rule(&h, draft("low", vec![progress_below(20.0)]));
    let created = h.engine.run_active_rules(None).unwrap();
    assert_eq!(created[0].title, "Alerta: Revenue Q1");
    assert_eq!(created[0].kind, AlertKind::Warning);

    let english = harness(vec![objective("obj-rev", "Revenue Q1", 10.0)], "en");
    active_rule(&english, draft("low", vec![progress_below(20.0)]));
    let created = english.engine.run_active_rules(None).unwrap();
    assert_eq!(created[0].title, "Alert: Revenue Q1");
}

#[test]
fn samples_match_production_alert_text() {
    let h = harness(vec![objective("obj-rev", "Revenue Q1", 10.0)], "en");
    let mut d = draft("low", vec![progress_below(20.0)]);
    d.title_template = Some("{objective}: {currentValue}/{targetValue}".into());
    let rule = active_rule(&h, d);

    let sample = h.manager.get(&rule.id).unwrap().test_results[0].sample_alerts[0].clone();
    let real = h.engine.run_active_rules(None).unwrap().remove(0);
    assert_eq!(sample.title, real.title);
    assert_eq!(sample.message, real.message);
    assert_eq!(real.title, "Revenue Q1: 1000/10000");
}

#[test]
fn rules_run_against_their_own_role() {
    let trainer = ObjectiveRecord {
        role: Some(Role::Trainer),
        objective: objective("obj-t", "Trainer goal", 10.0),
    };
    let gym = ObjectiveRecord {
        role: Some(Role::Gym),
        objective: objective("obj-g", "Gym goal", 10.0),
    };
    let h = harness_with_records(vec![trainer, gym], "en");
    let mut d = draft("trainer rule", vec![progress_below(20.0)]);
    d.role = Some(Role::Trainer);
    active_rule(&h, d);

    assert!(h.engine.run_active_rules(Some(Role::Gym)).unwrap().is_empty());
    let created = h.engine.run_active_rules(None).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].objective_id, "obj-t");
}

/// Alert log whose writes fail for one rule.
struct FlakyLog {
    inner: MemoryAlertLog,
    failing_rule: String,
}

impl AlertLog for FlakyLog {
    fn list(&self, query: &AlertQuery) -> objmon_storage::error::Result<Vec<Alert>> {
        self.inner.list(query)
    }

    fn append(&self, alert: &Alert) -> objmon_storage::error::Result<()> {
        self.inner.append(alert)
    }

    fn mark_read(&self, alert_id: &str) -> objmon_storage::error::Result<bool> {
        self.inner.mark_read(alert_id)
    }

    fn append_if_absent(
        &self,
        alert: &Alert,
        since: DateTime<Utc>,
    ) -> objmon_storage::error::Result<bool> {
        if alert.custom_rule_id.as_deref() == Some(self.failing_rule.as_str()) {
            return Err(StorageError::Other("disk full".into()));
        }
        self.inner.append_if_absent(alert, since)
    }
}

#[test]
fn failing_rule_does_not_stop_the_sweep() {
    let clock = Arc::new(ManualClock::new(t0()));
    let rules = Arc::new(MemoryRuleStore::new());
    let objectives = Arc::new(MemoryObjectiveSource::shared(population()));
    let manager = RuleManager::new(rules.clone(), objectives.clone(), clock.clone(), "en");

    let mut ids = Vec::new();
    for name in ["first", "second"] {
        let rule = manager.create(draft(name, vec![progress_below(10.0)])).unwrap();
        manager.test_by_id(&rule.id, "u", "U").unwrap();
        manager.activate(&rule.id).unwrap();
        ids.push(rule.id);
    }

    let log = Arc::new(FlakyLog {
        inner: MemoryAlertLog::new(),
        failing_rule: ids[0].clone(),
    });
    let engine = ExecutionEngine::new(rules, log.clone(), objectives, clock, "en");
    let created = engine.run_active_rules(None).unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].custom_rule_id.as_deref(), Some(ids[1].as_str()));
    assert_eq!(log.inner.len(), 1);
}

#[test]
fn clock_is_the_only_time_source() {
    let h = harness(vec![objective("o", "O", 10.0)], "en");
    active_rule(&h, draft("r", vec![progress_below(20.0)]));
    h.clock.set(t0() + Duration::days(3));
    let created = h.engine.run_active_rules(None).unwrap();
    assert_eq!(created[0].created_at, h.clock.now());
    assert_eq!(h.rules.list(None).unwrap().len(), 1);
}
