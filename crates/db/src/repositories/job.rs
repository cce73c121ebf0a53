use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use thosejobs_core::domain::job::{Job, JobId, JobStatus};
use thosejobs_core::domain::profile::ProfileId;
use thosejobs_core::errors::StoreError;
use thosejobs_core::lifecycle::{JobCondition, JobWrite, PartyMatch, WorkerWrite};
use thosejobs_core::query::{JobQuery, JobView, SortColumn};
use thosejobs_core::store::{AppendOutcome, FilterOptions, JobStore};

use super::{
    encode_json_list, encode_timestamp, parse_decimal, parse_json_list, parse_timestamp,
    RepositoryError,
};
use crate::DbPool;

const JOB_COLUMNS: &str = "id, provider_id, worker_id, title, category, description, location, \
     budget, deadline_at, time_window, special_requirements, media_urls, status, \
     quoted_worker_ids, created_at, updated_at";

pub struct SqlJobRepository {
    pool: DbPool,
}

impl SqlJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl JobStore for SqlJobRepository {
    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO job (
                id,
                provider_id,
                worker_id,
                title,
                category,
                description,
                location,
                budget,
                deadline_at,
                time_window,
                special_requirements,
                media_urls,
                status,
                quoted_worker_ids,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id.0)
        .bind(&job.provider_id.0)
        .bind(job.worker_id.as_ref().map(|id| id.0.as_str()))
        .bind(&job.title)
        .bind(&job.category)
        .bind(&job.description)
        .bind(&job.location)
        .bind(job.budget.to_string())
        .bind(encode_timestamp(&job.deadline_at))
        .bind(&job.time_window)
        .bind(job.special_requirements.as_deref())
        .bind(encode_json_list(job.media_urls.iter().map(String::as_str)))
        .bind(job.status.as_str())
        .bind(encode_json_list(job.quoted_worker_ids.iter().map(ProfileId::as_str)))
        .bind(encode_timestamp(&job.created_at))
        .bind(encode_timestamp(&job.updated_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM job WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(job_from_row).transpose()?)
    }

    async fn find_jobs_by_ids(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {JOB_COLUMNS} FROM job WHERE id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.0.as_str());
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let rows =
            builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(rows.into_iter().map(job_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {JOB_COLUMNS} FROM job WHERE "));
        let viewer = query.viewer.0.as_str();

        match query.view {
            JobView::Provider => {
                builder.push("provider_id = ").push_bind(viewer);
            }
            JobView::WorkerAvailable => {
                builder
                    .push("status = 'posted' AND worker_id IS NULL AND provider_id != ")
                    .push_bind(viewer)
                    .push(
                        " AND NOT EXISTS (SELECT 1 FROM json_each(job.quoted_worker_ids) \
                         WHERE json_each.value = ",
                    )
                    .push_bind(viewer)
                    .push(")");
            }
            JobView::WorkerMyWork => {
                builder.push("worker_id = ").push_bind(viewer);
            }
        }

        if let Some(term) = &query.search {
            let pattern = format!("%{}%", escape_like(term));
            builder
                .push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR category LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(location) = &query.location {
            builder.push(" AND location = ").push_bind(location.as_str());
        }
        if let Some(category) = &query.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }

        let column = match query.sort.column {
            SortColumn::CreatedAt => "created_at",
            SortColumn::Budget => "CAST(budget AS REAL)",
            SortColumn::DeadlineAt => "deadline_at",
            SortColumn::Title => "title",
        };
        builder.push(format!(" ORDER BY {column} {}, id ASC", query.sort.direction.as_sql()));

        let rows =
            builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(rows.into_iter().map(job_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_job_if(
        &self,
        id: &JobId,
        condition: &JobCondition,
        write: &JobWrite,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, StoreError> {
        if condition.statuses.is_empty() {
            return Ok(None);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE job SET status = ");
        builder.push_bind(write.status.as_str());
        match &write.worker {
            WorkerWrite::Keep => {}
            WorkerWrite::Assign(worker_id) => {
                builder.push(", worker_id = ").push_bind(worker_id.0.as_str());
            }
            WorkerWrite::Clear => {
                builder.push(", worker_id = NULL");
            }
        }
        builder.push(", updated_at = ").push_bind(encode_timestamp(&now));

        builder.push(" WHERE id = ").push_bind(id.0.as_str());
        builder.push(" AND status IN (");
        let mut statuses = builder.separated(", ");
        for status in &condition.statuses {
            statuses.push_bind(status.as_str());
        }
        statuses.push_unseparated(")");

        if condition.require_unassigned {
            builder.push(" AND worker_id IS NULL");
        }
        match &condition.party {
            PartyMatch::Anyone => {}
            PartyMatch::Owner(profile_id) => {
                builder.push(" AND provider_id = ").push_bind(profile_id.0.as_str());
            }
            PartyMatch::NotOwner(profile_id) => {
                builder.push(" AND provider_id != ").push_bind(profile_id.0.as_str());
            }
            PartyMatch::AssignedWorker(profile_id) => {
                builder.push(" AND worker_id = ").push_bind(profile_id.0.as_str());
            }
            PartyMatch::OwnerOrAssignedWorker(profile_id) => {
                builder
                    .push(" AND (provider_id = ")
                    .push_bind(profile_id.0.as_str())
                    .push(" OR worker_id = ")
                    .push_bind(profile_id.0.as_str())
                    .push(")");
            }
        }
        builder.push(format!(" RETURNING {JOB_COLUMNS}"));

        let row =
            builder.build().fetch_optional(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(row.map(job_from_row).transpose()?)
    }

    async fn append_quoted_worker(
        &self,
        id: &JobId,
        worker_id: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StoreError> {
        let appended = sqlx::query(
            "UPDATE job
             SET quoted_worker_ids = json_insert(quoted_worker_ids, '$[#]', ?),
                 updated_at = ?
             WHERE id = ?
               AND status = 'posted'
               AND NOT EXISTS (
                   SELECT 1 FROM json_each(job.quoted_worker_ids) WHERE json_each.value = ?
               )",
        )
        .bind(&worker_id.0)
        .bind(encode_timestamp(&now))
        .bind(&id.0)
        .bind(&worker_id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if appended.rows_affected() == 1 {
            return Ok(AppendOutcome::Appended);
        }

        let row = sqlx::query(
            "SELECT
                status,
                EXISTS (
                    SELECT 1 FROM json_each(job.quoted_worker_ids) WHERE json_each.value = ?
                ) AS present
             FROM job
             WHERE id = ?",
        )
        .bind(&worker_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(AppendOutcome::JobMissing);
        };
        let present = row.try_get::<i64, _>("present").map_err(RepositoryError::from)? != 0;
        Ok(if present { AppendOutcome::AlreadyPresent } else { AppendOutcome::JobNotOpen })
    }

    async fn count_jobs_by_provider(&self, provider_id: &ProfileId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job WHERE provider_id = ?")
            .bind(&provider_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(count.max(0) as u64)
    }

    async fn filter_options(&self) -> Result<FilterOptions, StoreError> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM job WHERE trim(category) != '' ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        let locations: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT location FROM job WHERE trim(location) != '' ORDER BY location ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(FilterOptions { categories, locations })
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn job_from_row(row: SqliteRow) -> Result<Job, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown job status `{status_raw}`")))?;

    Ok(Job {
        id: JobId(row.try_get("id")?),
        provider_id: ProfileId(row.try_get("provider_id")?),
        worker_id: row.try_get::<Option<String>, _>("worker_id")?.map(ProfileId),
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        budget: parse_decimal("budget", row.try_get("budget")?)?,
        deadline_at: parse_timestamp("deadline_at", row.try_get("deadline_at")?)?,
        time_window: row.try_get("time_window")?,
        special_requirements: row.try_get("special_requirements")?,
        media_urls: parse_json_list("media_urls", row.try_get("media_urls")?)?,
        status,
        quoted_worker_ids: parse_json_list("quoted_worker_ids", row.try_get("quoted_worker_ids")?)?
            .into_iter()
            .map(ProfileId)
            .collect(),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
