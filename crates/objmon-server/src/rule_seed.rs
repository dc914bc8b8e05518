use objmon_alert::lifecycle::{RuleDraft, RuleManager};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shape of the `init-rules` seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<RuleDraft>,
}

impl RulesSeedFile {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", path, e))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Create every seeded rule whose name is not taken yet. Seeded rules start
/// inactive like any other new rule.
pub fn init_rules(manager: &RuleManager, seed: RulesSeedFile) -> anyhow::Result<SeedReport> {
    let mut existing: HashSet<String> = manager
        .list(None)?
        .into_iter()
        .map(|r| r.name)
        .collect();
    let mut report = SeedReport::default();

    for draft in seed.rules {
        if existing.contains(draft.name.trim()) {
            tracing::warn!(name = %draft.name, "Custom alert rule already exists, skipping");
            report.skipped += 1;
            continue;
        }
        let name = draft.name.clone();
        match manager.create(draft) {
            Ok(rule) => {
                tracing::info!(name = %rule.name, rule_id = %rule.id, "Seeded custom alert rule");
                existing.insert(rule.name);
                report.created += 1;
            }
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Failed to seed custom alert rule");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        failed = report.failed,
        "Custom alert rules initialized"
    );
    Ok(report)
}
