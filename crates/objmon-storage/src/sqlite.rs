//! SQLite-backed rule store and alert log.
//!
//! Rule and alert bodies are stored as JSON next to the columns used for
//! lookups. The dedup check and insert of
//! [`AlertLog::append_if_absent`] run inside one `BEGIN IMMEDIATE`
//! transaction, so two processes sweeping the same database cannot both
//! append an alert for the same pair within the window.

use crate::error::{Result, StorageError};
use crate::{AlertLog, AlertQuery, RuleStore};
use chrono::{DateTime, Utc};
use objmon_common::types::{Alert, CustomAlertRule, Role};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DB_FILE: &str = "objmon.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS custom_alert_rules (
    id TEXT PRIMARY KEY,
    role TEXT,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    custom_rule_id TEXT,
    objective_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_rule_objective_time
    ON alerts(custom_rule_id, objective_id, created_at);
CREATE INDEX IF NOT EXISTS idx_alerts_time ON alerts(created_at);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) `objmon.db` under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        tracing::info!(path = %path.display(), "Opened rule database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn role_str(role: Option<Role>) -> Option<String> {
    role.map(|r| r.to_string())
}

fn decode_alert(body: &str, read: bool) -> Result<Alert> {
    let mut alert: Alert = serde_json::from_str(body)?;
    alert.read = read;
    Ok(alert)
}

fn insert_alert(conn: &Connection, alert: &Alert) -> Result<()> {
    let body = serde_json::to_string(alert)?;
    conn.execute(
        "INSERT INTO alerts (id, custom_rule_id, objective_id, created_at, read, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            &alert.id,
            &alert.custom_rule_id,
            &alert.objective_id,
            alert.created_at.timestamp_millis(),
            alert.read,
            body,
        ],
    )?;
    Ok(())
}

impl RuleStore for SqliteStore {
    fn list(&self, role: Option<Role>) -> Result<Vec<CustomAlertRule>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, body FROM custom_alert_rules
             WHERE ?1 IS NULL OR role IS NULL OR role = ?1
             ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![role_str(role)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut rules = Vec::new();
        for row in rows {
            let (id, body) = row?;
            // An undecodable body hides only that rule.
            match serde_json::from_str(&body) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "Skipping undecodable custom alert rule")
                }
            }
        }
        Ok(rules)
    }

    fn get(&self, id: &str) -> Result<Option<CustomAlertRule>> {
        let conn = self.lock_conn();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM custom_alert_rules WHERE id = ?1",
                rusqlite::params![id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn create(&self, rule: &CustomAlertRule) -> Result<()> {
        let conn = self.lock_conn();
        let body = serde_json::to_string(rule)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO custom_alert_rules (id, role, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                &rule.id,
                role_str(rule.role),
                body,
                rule.created_at.timestamp_millis(),
                rule.updated_at.timestamp_millis(),
            ],
        )?;
        if inserted == 0 {
            return Err(StorageError::Duplicate {
                entity: "alert_rule",
                id: rule.id.clone(),
            });
        }
        Ok(())
    }

    fn update(&self, rule: &CustomAlertRule) -> Result<()> {
        let conn = self.lock_conn();
        let body = serde_json::to_string(rule)?;
        let updated = conn.execute(
            "UPDATE custom_alert_rules SET role = ?2, body = ?3, updated_at = ?4 WHERE id = ?1",
            rusqlite::params![
                &rule.id,
                role_str(rule.role),
                body,
                rule.updated_at.timestamp_millis(),
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "alert_rule",
                id: rule.id.clone(),
            });
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock_conn();
        let removed = conn.execute(
            "DELETE FROM custom_alert_rules WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(removed > 0)
    }
}

impl AlertLog for SqliteStore {
    fn list(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        let conn = self.lock_conn();
        let mut sql = String::from("SELECT body, read FROM alerts WHERE 1 = 1");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(rule_id) = &query.custom_rule_id {
            params.push(Box::new(rule_id.clone()));
            sql.push_str(&format!(" AND custom_rule_id = ?{}", params.len()));
        }
        if let Some(objective_id) = &query.objective_id {
            params.push(Box::new(objective_id.clone()));
            sql.push_str(&format!(" AND objective_id = ?{}", params.len()));
        }
        if let Some(since) = query.since {
            params.push(Box::new(since.timestamp_millis()));
            sql.push_str(&format!(" AND created_at >= ?{}", params.len()));
        }
        if let Some(until) = query.until {
            params.push(Box::new(until.timestamp_millis()));
            sql.push_str(&format!(" AND created_at <= ?{}", params.len()));
        }
        if query.unread_only {
            sql.push_str(" AND read = 0");
        }
        sql.push_str(" ORDER BY created_at ASC, rowid ASC");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            let (body, read) = row?;
            alerts.push(decode_alert(&body, read)?);
        }
        Ok(alerts)
    }

    fn append(&self, alert: &Alert) -> Result<()> {
        let conn = self.lock_conn();
        insert_alert(&conn, alert)
    }

    fn mark_read(&self, alert_id: &str) -> Result<bool> {
        let conn = self.lock_conn();
        let updated = conn.execute(
            "UPDATE alerts SET read = 1 WHERE id = ?1",
            rusqlite::params![alert_id],
        )?;
        Ok(updated > 0)
    }

    fn append_if_absent(&self, alert: &Alert, since: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM alerts
             WHERE custom_rule_id IS ?1 AND objective_id = ?2 AND created_at >= ?3",
            rusqlite::params![
                &alert.custom_rule_id,
                &alert.objective_id,
                since.timestamp_millis(),
            ],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(false);
        }
        insert_alert(&tx, alert)?;
        tx.commit()?;
        Ok(true)
    }
}
