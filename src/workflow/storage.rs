/// SQLite persistence layer for workflow storage
///
/// Workflows live in their own table: the full definition as a JSON column plus
/// indexed lookup fields (name, company, active flag).

use crate::store::database::timestamp;
use crate::workflow::types::Workflow;
use anyhow::Result;
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new workflow or update existing one
    ///
    /// Uses UPSERT to handle both create and update operations atomically.
    pub async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let definition_json = serde_json::to_string(workflow)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, company_id, is_active, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                company_id = excluded.company_id,
                is_active = excluded.is_active,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.name)
        .bind(&workflow.company_id)
        .bind(workflow.is_active)
        .bind(&definition_json)
        .bind(timestamp(workflow.created_at))
        .bind(timestamp(workflow.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a workflow by ID
    pub async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let definition_json: String = row.get("definition");
                Ok(Some(serde_json::from_str(&definition_json)?))
            }
            None => Ok(None),
        }
    }

    /// List workflows, newest update first, optionally for one company
    pub async fn list_workflows(&self, company_id: Option<&str>) -> Result<Vec<Workflow>> {
        let rows = match company_id {
            Some(company_id) => {
                sqlx::query(
                    "SELECT definition FROM workflows WHERE company_id = ? ORDER BY updated_at DESC",
                )
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT definition FROM workflows ORDER BY updated_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            let definition_json: String = row.get("definition");
            workflows.push(serde_json::from_str(&definition_json)?);
        }

        Ok(workflows)
    }

    /// Load all workflows for registry initialization
    pub async fn load_all_workflows(&self) -> Result<HashMap<String, Workflow>> {
        let rows = sqlx::query("SELECT id, definition FROM workflows")
            .fetch_all(&self.pool)
            .await?;

        let mut workflows = HashMap::new();
        for row in rows {
            let id: String = row.get("id");
            let definition_json: String = row.get("definition");
            let workflow: Workflow = serde_json::from_str(&definition_json)?;
            workflows.insert(id, workflow);
        }

        Ok(workflows)
    }

    /// Delete a workflow by ID; returns whether a row was removed
    pub async fn delete_workflow(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
