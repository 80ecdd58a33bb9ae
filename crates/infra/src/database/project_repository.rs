//! SQLite implementation of the ProjectRepository port.

use async_trait::async_trait;
use chrono::Utc;
use hourmark_core::classification::ports::ProjectRepository;
use hourmark_domain::{Project, ProjectFingerprint, Result};
use rusqlite::{params, Row};
use tracing::instrument;

use super::manager::{optional, DbPool};
use crate::errors::InfraError;

/// SQLite implementation of [`ProjectRepository`]
pub struct SqliteProjectRepository {
    pool: DbPool,
}

impl SqliteProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, user_id, name, short_code, client_name, color,
    is_billable, track_hours, is_archived, fingerprint";

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    let fingerprint_json: String = row.get(9)?;
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        short_code: row.get(3)?,
        client_name: row.get(4)?,
        color: row.get(5)?,
        is_billable: row.get(6)?,
        track_hours: row.get(7)?,
        is_archived: row.get(8)?,
        fingerprint: serde_json::from_str(&fingerprint_json)
            .unwrap_or_else(|_| ProjectFingerprint::default()),
    })
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    #[instrument(skip(self))]
    async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {COLUMNS} FROM projects WHERE user_id = ?1 ORDER BY id"))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(params![user_id], row_to_project)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_project(&self, user_id: &str, project_id: &str) -> Result<Option<Project>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        optional(conn.query_row(
            &format!("SELECT {COLUMNS} FROM projects WHERE user_id = ?1 AND id = ?2"),
            params![user_id, project_id],
            row_to_project,
        ))
    }

    #[instrument(skip(self, project), fields(project_id = %project.id))]
    async fn save_project(&self, project: &Project) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let now = Utc::now().timestamp();
        let fingerprint =
            serde_json::to_string(&project.fingerprint).map_err(InfraError::from)?;

        conn.execute(
            "INSERT INTO projects (
                id, user_id, name, short_code, client_name, color,
                is_billable, track_hours, is_archived, fingerprint,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                short_code = excluded.short_code,
                client_name = excluded.client_name,
                color = excluded.color,
                is_billable = excluded.is_billable,
                track_hours = excluded.track_hours,
                is_archived = excluded.is_archived,
                fingerprint = excluded.fingerprint,
                updated_at = excluded.updated_at",
            params![
                project.id,
                project.user_id,
                project.name,
                project.short_code,
                project.client_name,
                project.color,
                project.is_billable,
                project.track_hours,
                project.is_archived,
                fingerprint,
                now,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}
