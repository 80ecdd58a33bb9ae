//! SQLite implementation of the RuleRepository port.

use async_trait::async_trait;
use chrono::Utc;
use hourmark_core::classification::ports::RuleRepository;
use hourmark_domain::{ClassificationRule, Result, RuleTarget};
use rusqlite::{params, Row};
use tracing::instrument;

use super::manager::{optional, DbPool};
use crate::errors::InfraError;

/// SQLite implementation of [`RuleRepository`]
pub struct SqliteRuleRepository {
    pool: DbPool,
}

impl SqliteRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str =
    "id, user_id, query, target_kind, target_project_id, weight, is_enabled, priority";

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<ClassificationRule> {
    let target_kind: String = row.get(3)?;
    let target_project_id: Option<String> = row.get(4)?;
    let target = match (target_kind.as_str(), target_project_id) {
        ("project", Some(id)) => RuleTarget::Project(id),
        ("attended", _) => RuleTarget::Attended,
        _ => RuleTarget::NotAttended,
    };
    Ok(ClassificationRule {
        id: row.get(0)?,
        user_id: row.get(1)?,
        query: row.get(2)?,
        target,
        weight: row.get(5)?,
        is_enabled: row.get(6)?,
        priority: row.get(7)?,
    })
}

fn target_columns(target: &RuleTarget) -> (&'static str, Option<&str>) {
    match target {
        RuleTarget::Project(id) => ("project", Some(id.as_str())),
        RuleTarget::Attended => ("attended", None),
        RuleTarget::NotAttended => ("not_attended", None),
    }
}

#[async_trait]
impl RuleRepository for SqliteRuleRepository {
    #[instrument(skip(self))]
    async fn list_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>> {
        self.list_where(user_id, false)
    }

    #[instrument(skip(self))]
    async fn list_enabled_rules(&self, user_id: &str) -> Result<Vec<ClassificationRule>> {
        self.list_where(user_id, true)
    }

    #[instrument(skip(self))]
    async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<ClassificationRule>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!("SELECT {COLUMNS} FROM classification_rules WHERE user_id = ?1 AND id = ?2"),
            params![user_id, rule_id],
            row_to_rule,
        ))
    }

    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    async fn save_rule(&self, rule: &ClassificationRule) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let now = Utc::now().timestamp();
        let (kind, project_id) = target_columns(&rule.target);

        conn.execute(
            "INSERT INTO classification_rules (
                id, user_id, query, target_kind, target_project_id,
                weight, is_enabled, priority, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(id) DO UPDATE SET
                query = excluded.query,
                target_kind = excluded.target_kind,
                target_project_id = excluded.target_project_id,
                weight = excluded.weight,
                is_enabled = excluded.is_enabled,
                priority = excluded.priority,
                updated_at = excluded.updated_at",
            params![
                rule.id,
                rule.user_id,
                rule.query,
                kind,
                project_id,
                rule.weight,
                rule.is_enabled,
                rule.priority,
                now,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let deleted = conn
            .execute(
                "DELETE FROM classification_rules WHERE user_id = ?1 AND id = ?2",
                params![user_id, rule_id],
            )
            .map_err(InfraError::from)?;
        Ok(deleted > 0)
    }
}

impl SqliteRuleRepository {
    fn list_where(&self, user_id: &str, enabled_only: bool) -> Result<Vec<ClassificationRule>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let filter = if enabled_only { " AND is_enabled = 1" } else { "" };
        let sql = format!(
            "SELECT {COLUMNS} FROM classification_rules
             WHERE user_id = ?1{filter}
             ORDER BY priority DESC, id"
        );
        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![user_id], row_to_rule)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }
}
