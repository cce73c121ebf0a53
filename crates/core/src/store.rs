use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId};
use crate::domain::profile::{Profile, ProfileId, Role};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::errors::StoreError;
use crate::lifecycle::{JobCondition, JobWrite};
use crate::query::JobQuery;

/// Result of the atomic append onto `quoted_worker_ids`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    Appended,
    AlreadyPresent,
    /// The job exists but is no longer `posted`.
    JobNotOpen,
    JobMissing,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub categories: Vec<String>,
    pub locations: Vec<String>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &Job) -> Result<(), StoreError>;

    async fn find_job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    async fn find_jobs_by_ids(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError>;

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;

    /// Applies `write` only when the stored row satisfies `condition`.
    /// `Ok(None)` means no row matched.
    async fn update_job_if(
        &self,
        id: &JobId,
        condition: &JobCondition,
        write: &JobWrite,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, StoreError>;

    async fn append_quoted_worker(
        &self,
        id: &JobId,
        worker_id: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StoreError>;

    async fn count_jobs_by_provider(&self, provider_id: &ProfileId) -> Result<u64, StoreError>;

    async fn filter_options(&self) -> Result<FilterOptions, StoreError>;
}

#[async_trait]
pub trait QuotationStore: Send + Sync {
    /// Fails with `StoreError::UniqueViolation` when the worker already holds a
    /// non-rejected quotation for the job.
    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), StoreError>;

    async fn find_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError>;

    /// Newest first.
    async fn list_for_job(
        &self,
        job_id: &JobId,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<Quotation>, StoreError>;

    /// Newest first.
    async fn list_for_worker(&self, worker_id: &ProfileId) -> Result<Vec<Quotation>, StoreError>;

    async fn update_status_if(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        next: QuotationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Quotation>, StoreError>;

    /// Rejects every pending quotation on the job except `keep`; returns the
    /// number of rows changed.
    async fn reject_pending_siblings(
        &self,
        job_id: &JobId,
        keep: &QuotationId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn count_by_worker(&self, worker_id: &ProfileId) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError>;

    /// One batched lookup of usernames. Unknown ids are absent from the map.
    async fn display_names(
        &self,
        ids: &[ProfileId],
    ) -> Result<BTreeMap<ProfileId, String>, StoreError>;

    async fn update_role_if(
        &self,
        id: &ProfileId,
        expected: Role,
        next: Role,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError>;

    async fn update_username(
        &self,
        id: &ProfileId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError>;
}
