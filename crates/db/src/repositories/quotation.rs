use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use thosejobs_core::domain::job::JobId;
use thosejobs_core::domain::profile::ProfileId;
use thosejobs_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use thosejobs_core::errors::StoreError;
use thosejobs_core::store::QuotationStore;

use super::{encode_timestamp, parse_decimal, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuotationStore for SqlQuotationRepository {
    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO quotation (
                id,
                job_id,
                worker_id,
                quoted_amount,
                proposed_timeline,
                message,
                status,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quotation.id.0)
        .bind(&quotation.job_id.0)
        .bind(&quotation.worker_id.0)
        .bind(quotation.quoted_amount.to_string())
        .bind(quotation.proposed_timeline.as_deref())
        .bind(quotation.message.as_deref())
        .bind(quotation.status.as_str())
        .bind(encode_timestamp(&quotation.created_at))
        .bind(encode_timestamp(&quotation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError> {
        let row = sqlx::query(
            "SELECT
                id,
                job_id,
                worker_id,
                quoted_amount,
                proposed_timeline,
                message,
                status,
                created_at,
                updated_at
             FROM quotation
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(quotation_from_row).transpose()?)
    }

    async fn list_for_job(
        &self,
        job_id: &JobId,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<Quotation>, StoreError> {
        let rows = if let Some(status) = status {
            sqlx::query(
                "SELECT
                    id,
                    job_id,
                    worker_id,
                    quoted_amount,
                    proposed_timeline,
                    message,
                    status,
                    created_at,
                    updated_at
                 FROM quotation
                 WHERE job_id = ? AND status = ?
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(&job_id.0)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?
        } else {
            sqlx::query(
                "SELECT
                    id,
                    job_id,
                    worker_id,
                    quoted_amount,
                    proposed_timeline,
                    message,
                    status,
                    created_at,
                    updated_at
                 FROM quotation
                 WHERE job_id = ?
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(&job_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?
        };

        Ok(rows.into_iter().map(quotation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_for_worker(&self, worker_id: &ProfileId) -> Result<Vec<Quotation>, StoreError> {
        let rows = sqlx::query(
            "SELECT
                id,
                job_id,
                worker_id,
                quoted_amount,
                proposed_timeline,
                message,
                status,
                created_at,
                updated_at
             FROM quotation
             WHERE worker_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(&worker_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(quotation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_status_if(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        next: QuotationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Quotation>, StoreError> {
        let row = sqlx::query(
            "UPDATE quotation
             SET status = ?, updated_at = ?
             WHERE id = ? AND status = ?
             RETURNING
                id,
                job_id,
                worker_id,
                quoted_amount,
                proposed_timeline,
                message,
                status,
                created_at,
                updated_at",
        )
        .bind(next.as_str())
        .bind(encode_timestamp(&now))
        .bind(&id.0)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(quotation_from_row).transpose()?)
    }

    async fn reject_pending_siblings(
        &self,
        job_id: &JobId,
        keep: &QuotationId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE quotation
             SET status = 'rejected', updated_at = ?
             WHERE job_id = ? AND id != ? AND status = 'pending'",
        )
        .bind(encode_timestamp(&now))
        .bind(&job_id.0)
        .bind(&keep.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected())
    }

    async fn count_by_worker(&self, worker_id: &ProfileId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotation WHERE worker_id = ?")
            .bind(&worker_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(count.max(0) as u64)
    }
}

fn quotation_from_row(row: SqliteRow) -> Result<Quotation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuotationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown quotation status `{status_raw}`"))
    })?;

    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        job_id: JobId(row.try_get("job_id")?),
        worker_id: ProfileId(row.try_get("worker_id")?),
        quoted_amount: parse_decimal("quoted_amount", row.try_get("quoted_amount")?)?,
        proposed_timeline: row.try_get("proposed_timeline")?,
        message: row.try_get("message")?,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
