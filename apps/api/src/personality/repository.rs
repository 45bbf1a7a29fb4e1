use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::personality::composer::Report;
use crate::personality::demographics::Demographics;
use crate::personality::questions::AnswerRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no result with id {0}")]
    Missing(Uuid),
}

/// Everything persisted for one test submission.
#[derive(Debug, Clone)]
pub struct StoredResult {
    pub answers: Vec<AnswerRecord>,
    pub demographics: Option<Demographics>,
    pub top_coalition: Option<String>,
    /// Bumped by every `clear_report`; a report is only stored against the
    /// version it was computed from.
    pub report_version: i64,
}

/// Persistence seam for test results. `PgResultRepository` in production;
/// tests use an in-memory double.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn create_result(&self, answers: &[AnswerRecord]) -> Result<Uuid, StoreError>;
    async fn load_result(&self, id: Uuid) -> Result<Option<StoredResult>, StoreError>;
    async fn save_demographics(&self, id: Uuid, demographics: &Demographics) -> Result<(), StoreError>;
    async fn set_top_coalition(&self, id: Uuid, coalition: &str) -> Result<(), StoreError>;
    /// The persisted report, if one is stored for the current version.
    async fn load_report(&self, id: Uuid) -> Result<Option<Report>, StoreError>;
    /// Stores `report` if `version` is still current. Returns `false` when the
    /// report was invalidated in the meantime and nothing was written.
    async fn store_report(&self, id: Uuid, version: i64, report: &Report) -> Result<bool, StoreError>;
    /// Drops the persisted report and bumps the report version.
    async fn clear_report(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Debug, FromRow)]
struct ResultRow {
    answers: Json<Vec<AnswerRecord>>,
    demographics: Option<Json<Demographics>>,
    top_coalition: Option<String>,
    report_version: i64,
}

impl From<ResultRow> for StoredResult {
    fn from(row: ResultRow) -> Self {
        Self {
            answers: row.answers.0,
            demographics: row.demographics.map(|d| d.0),
            top_coalition: row.top_coalition,
            report_version: row.report_version,
        }
    }
}

pub struct PgResultRepository {
    pool: PgPool,
}

impl PgResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs an UPDATE keyed by `id`, reporting a missing row as an error.
    async fn execute_for(
        &self,
        id: Uuid,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<(), StoreError> {
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ResultRepository for PgResultRepository {
    async fn create_result(&self, answers: &[AnswerRecord]) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO personality_results (answers) VALUES ($1) RETURNING id",
        )
        .bind(Json(answers))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn load_result(&self, id: Uuid) -> Result<Option<StoredResult>, StoreError> {
        let row = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT answers, demographics, top_coalition, report_version
            FROM personality_results
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoredResult::from))
    }

    async fn save_demographics(&self, id: Uuid, demographics: &Demographics) -> Result<(), StoreError> {
        self.execute_for(
            id,
            sqlx::query("UPDATE personality_results SET demographics = $2 WHERE id = $1")
                .bind(id)
                .bind(Json(demographics)),
        )
        .await
    }

    async fn set_top_coalition(&self, id: Uuid, coalition: &str) -> Result<(), StoreError> {
        self.execute_for(
            id,
            sqlx::query("UPDATE personality_results SET top_coalition = $2 WHERE id = $1")
                .bind(id)
                .bind(coalition),
        )
        .await
    }

    async fn load_report(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        let body: Option<Option<serde_json::Value>> =
            sqlx::query_scalar("SELECT final_report FROM personality_results WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match body.flatten() {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn store_report(&self, id: Uuid, version: i64, report: &Report) -> Result<bool, StoreError> {
        let body = serde_json::to_value(report)?;
        let result = sqlx::query(
            r#"
            UPDATE personality_results
            SET final_report = $3
            WHERE id = $1 AND report_version = $2
            "#,
        )
        .bind(id)
        .bind(version)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_report(&self, id: Uuid) -> Result<(), StoreError> {
        self.execute_for(
            id,
            sqlx::query(
                r#"
                UPDATE personality_results
                SET final_report = NULL, report_version = report_version + 1
                WHERE id = $1
                "#,
            )
            .bind(id),
        )
        .await
    }
}
