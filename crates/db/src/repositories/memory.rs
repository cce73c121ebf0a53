use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use thosejobs_core::domain::job::{Job, JobId, JobStatus};
use thosejobs_core::domain::profile::{Profile, ProfileId, Role};
use thosejobs_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use thosejobs_core::errors::StoreError;
use thosejobs_core::lifecycle::{JobCondition, JobWrite};
use thosejobs_core::query::JobQuery;
use thosejobs_core::store::{AppendOutcome, FilterOptions, JobStore, ProfileStore, QuotationStore};

/// Process-local stores with the same conditional-write semantics as the
/// SQLite repositories. Every check-and-write happens under one write lock.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<BTreeMap<String, Job>>,
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobRepository {
    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id.0) {
            return Err(StoreError::UniqueViolation(format!("job `{}` already exists", job.id)));
        }
        jobs.insert(job.id.0.clone(), job.clone());
        Ok(())
    }

    async fn find_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id.0).cloned())
    }

    async fn find_jobs_by_ids(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let wanted: BTreeSet<&str> = ids.iter().map(|id| id.0.as_str()).collect();
        Ok(wanted.into_iter().filter_map(|id| jobs.get(id).cloned()).collect())
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> =
            jobs.values().filter(|job| query.matches(job)).cloned().collect();
        query.sort_jobs(&mut matched);
        Ok(matched)
    }

    async fn update_job_if(
        &self,
        id: &JobId,
        condition: &JobCondition,
        write: &JobWrite,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id.0) else {
            return Ok(None);
        };
        if !condition.matches(job) {
            return Ok(None);
        }

        let mut updated = job.clone();
        write.apply_to(&mut updated);
        updated.updated_at = now;
        if updated.status == JobStatus::Posted && updated.worker_id.is_some() {
            return Err(StoreError::Transport(format!(
                "job `{id}` would be posted with an assigned worker"
            )));
        }
        *job = updated.clone();
        Ok(Some(updated))
    }

    async fn append_quoted_worker(
        &self,
        id: &JobId,
        worker_id: &ProfileId,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, StoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id.0) else {
            return Ok(AppendOutcome::JobMissing);
        };
        if job.has_quote_from(worker_id) {
            return Ok(AppendOutcome::AlreadyPresent);
        }
        if job.status != JobStatus::Posted {
            return Ok(AppendOutcome::JobNotOpen);
        }
        job.quoted_worker_ids.push(worker_id.clone());
        job.updated_at = now;
        Ok(AppendOutcome::Appended)
    }

    async fn count_jobs_by_provider(&self, provider_id: &ProfileId) -> Result<u64, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().filter(|job| &job.provider_id == provider_id).count() as u64)
    }

    async fn filter_options(&self) -> Result<FilterOptions, StoreError> {
        let jobs = self.jobs.read().await;
        let mut categories = BTreeSet::new();
        let mut locations = BTreeSet::new();
        for job in jobs.values() {
            if !job.category.trim().is_empty() {
                categories.insert(job.category.clone());
            }
            if !job.location.trim().is_empty() {
                locations.insert(job.location.clone());
            }
        }
        Ok(FilterOptions {
            categories: categories.into_iter().collect(),
            locations: locations.into_iter().collect(),
        })
    }
}

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    quotations: RwLock<BTreeMap<String, Quotation>>,
}

fn newest_first(quotations: &mut [Quotation]) {
    quotations.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
    });
}

#[async_trait::async_trait]
impl QuotationStore for InMemoryQuotationRepository {
    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), StoreError> {
        let mut quotations = self.quotations.write().await;
        if quotations.contains_key(&quotation.id.0) {
            return Err(StoreError::UniqueViolation(format!(
                "quotation `{}` already exists",
                quotation.id
            )));
        }
        let open_duplicate = quotation.status != QuotationStatus::Rejected
            && quotations.values().any(|existing| {
                existing.job_id == quotation.job_id
                    && existing.worker_id == quotation.worker_id
                    && existing.status != QuotationStatus::Rejected
            });
        if open_duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "worker `{}` already quoted job `{}`",
                quotation.worker_id, quotation.job_id
            )));
        }
        quotations.insert(quotation.id.0.clone(), quotation.clone());
        Ok(())
    }

    async fn find_quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, StoreError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.get(&id.0).cloned())
    }

    async fn list_for_job(
        &self,
        job_id: &JobId,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<Quotation>, StoreError> {
        let quotations = self.quotations.read().await;
        let mut matched: Vec<Quotation> = quotations
            .values()
            .filter(|quotation| &quotation.job_id == job_id)
            .filter(|quotation| status.map_or(true, |status| quotation.status == status))
            .cloned()
            .collect();
        newest_first(&mut matched);
        Ok(matched)
    }

    async fn list_for_worker(&self, worker_id: &ProfileId) -> Result<Vec<Quotation>, StoreError> {
        let quotations = self.quotations.read().await;
        let mut matched: Vec<Quotation> = quotations
            .values()
            .filter(|quotation| &quotation.worker_id == worker_id)
            .cloned()
            .collect();
        newest_first(&mut matched);
        Ok(matched)
    }

    async fn update_status_if(
        &self,
        id: &QuotationId,
        expected: QuotationStatus,
        next: QuotationStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Quotation>, StoreError> {
        let mut quotations = self.quotations.write().await;
        let Some(current) = quotations.get(&id.0) else {
            return Ok(None);
        };
        if current.status != expected {
            return Ok(None);
        }

        if next == QuotationStatus::Accepted {
            let job_id = current.job_id.clone();
            let already_accepted = quotations.values().any(|other| {
                other.job_id == job_id
                    && other.id != *id
                    && other.status == QuotationStatus::Accepted
            });
            if already_accepted {
                return Err(StoreError::UniqueViolation(format!(
                    "job `{job_id}` already has an accepted quotation"
                )));
            }
        }

        let Some(quotation) = quotations.get_mut(&id.0) else {
            return Ok(None);
        };
        quotation.status = next;
        quotation.updated_at = now;
        Ok(Some(quotation.clone()))
    }

    async fn reject_pending_siblings(
        &self,
        job_id: &JobId,
        keep: &QuotationId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut quotations = self.quotations.write().await;
        let mut changed = 0;
        for quotation in quotations.values_mut() {
            if &quotation.job_id == job_id
                && &quotation.id != keep
                && quotation.status == QuotationStatus::Pending
            {
                quotation.status = QuotationStatus::Rejected;
                quotation.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_by_worker(&self, worker_id: &ProfileId) -> Result<u64, StoreError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.values().filter(|quotation| &quotation.worker_id == worker_id).count()
            as u64)
    }
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<BTreeMap<String, Profile>>,
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileRepository {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.id.0) {
            return Err(StoreError::UniqueViolation(format!(
                "profile `{}` already exists",
                profile.id
            )));
        }
        if profiles.values().any(|existing| existing.username == profile.username) {
            return Err(StoreError::UniqueViolation(format!(
                "username `{}` is taken",
                profile.username
            )));
        }
        profiles.insert(profile.id.0.clone(), profile.clone());
        Ok(())
    }

    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&id.0).cloned())
    }

    async fn display_names(
        &self,
        ids: &[ProfileId],
    ) -> Result<BTreeMap<ProfileId, String>, StoreError> {
        let profiles = self.profiles.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                profiles.get(&id.0).map(|profile| (id.clone(), profile.username.clone()))
            })
            .collect())
    }

    async fn update_role_if(
        &self,
        id: &ProfileId,
        expected: Role,
        next: Role,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError> {
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(&id.0) else {
            return Ok(None);
        };
        if profile.role != expected {
            return Ok(None);
        }
        profile.role = next;
        profile.updated_at = now;
        Ok(Some(profile.clone()))
    }

    async fn update_username(
        &self,
        id: &ProfileId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError> {
        let mut profiles = self.profiles.write().await;
        let taken = profiles
            .values()
            .any(|existing| existing.username == username && existing.id != *id);
        if taken {
            return Err(StoreError::UniqueViolation(format!("username `{username}` is taken")));
        }
        let Some(profile) = profiles.get_mut(&id.0) else {
            return Ok(None);
        };
        profile.username = username.to_owned();
        profile.updated_at = now;
        Ok(Some(profile.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use thosejobs_core::domain::job::{Job, JobId, JobStatus};
    use thosejobs_core::domain::profile::ProfileId;
    use thosejobs_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
    use thosejobs_core::errors::StoreError;
    use thosejobs_core::lifecycle::{JobCondition, JobWrite, PartyMatch, WorkerWrite};
    use thosejobs_core::store::{AppendOutcome, JobStore, QuotationStore};

    use super::{InMemoryJobRepository, InMemoryQuotationRepository};

    fn posted_job(id: &str) -> Job {
        let now = Utc::now();
        Job {
            id: JobId(id.to_owned()),
            provider_id: ProfileId("P-1".to_owned()),
            worker_id: None,
            title: "Fix fence".to_owned(),
            category: "Repairs".to_owned(),
            description: "Two broken panels".to_owned(),
            location: "Leeds".to_owned(),
            budget: Decimal::new(120, 0),
            deadline_at: now + Duration::days(3),
            time_window: "Within 3 Days".to_owned(),
            special_requirements: None,
            media_urls: Vec::new(),
            status: JobStatus::Posted,
            quoted_worker_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn quotation(id: &str, worker: &str, minutes_ago: i64) -> Quotation {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Quotation {
            id: QuotationId(id.to_owned()),
            job_id: JobId("J-1".to_owned()),
            worker_id: ProfileId(worker.to_owned()),
            quoted_amount: Decimal::new(100, 0),
            proposed_timeline: None,
            message: None,
            status: QuotationStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    fn claim_condition(worker: &str) -> JobCondition {
        JobCondition {
            statuses: vec![JobStatus::Posted],
            party: PartyMatch::NotOwner(ProfileId(worker.to_owned())),
            require_unassigned: true,
        }
    }

    fn claim_write(worker: &str) -> JobWrite {
        JobWrite {
            status: JobStatus::Submitted,
            worker: WorkerWrite::Assign(ProfileId(worker.to_owned())),
        }
    }

    #[tokio::test]
    async fn conditional_update_matches_once() {
        let repo = InMemoryJobRepository::default();
        repo.insert_job(&posted_job("J-1")).await.expect("insert");
        let id = JobId("J-1".to_owned());

        let first = repo
            .update_job_if(&id, &claim_condition("W-1"), &claim_write("W-1"), Utc::now())
            .await
            .expect("update");
        let second = repo
            .update_job_if(&id, &claim_condition("W-2"), &claim_write("W-2"), Utc::now())
            .await
            .expect("update");

        let claimed = first.expect("first claim wins");
        assert_eq!(claimed.status, JobStatus::Submitted);
        assert_eq!(claimed.worker_id, Some(ProfileId("W-1".to_owned())));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn append_reports_each_outcome() {
        let repo = InMemoryJobRepository::default();
        repo.insert_job(&posted_job("J-1")).await.expect("insert");
        let id = JobId("J-1".to_owned());
        let worker = ProfileId("W-1".to_owned());

        assert_eq!(
            repo.append_quoted_worker(&id, &worker, Utc::now()).await.expect("append"),
            AppendOutcome::Appended
        );
        assert_eq!(
            repo.append_quoted_worker(&id, &worker, Utc::now()).await.expect("append"),
            AppendOutcome::AlreadyPresent
        );
        assert_eq!(
            repo.append_quoted_worker(&JobId("nope".to_owned()), &worker, Utc::now())
                .await
                .expect("append"),
            AppendOutcome::JobMissing
        );

        repo.update_job_if(&id, &claim_condition("W-2"), &claim_write("W-2"), Utc::now())
            .await
            .expect("update")
            .expect("claimed");
        assert_eq!(
            repo.append_quoted_worker(&id, &ProfileId("W-3".to_owned()), Utc::now())
                .await
                .expect("append"),
            AppendOutcome::JobNotOpen
        );
        let stored = repo.find_job(&id).await.expect("find").expect("exists");
        assert_eq!(stored.quoted_worker_ids, vec![worker]);
    }

    #[tokio::test]
    async fn duplicate_open_quotation_is_a_unique_violation() {
        let repo = InMemoryQuotationRepository::default();
        repo.insert_quotation(&quotation("Q-1", "W-1", 5)).await.expect("insert");

        let duplicate = repo.insert_quotation(&quotation("Q-2", "W-1", 1)).await;
        assert!(matches!(duplicate, Err(StoreError::UniqueViolation(_))));

        repo.update_status_if(
            &QuotationId("Q-1".to_owned()),
            QuotationStatus::Pending,
            QuotationStatus::Rejected,
            Utc::now(),
        )
        .await
        .expect("reject")
        .expect("matched");
        repo.insert_quotation(&quotation("Q-2", "W-1", 1)).await.expect("requote after reject");
    }

    #[tokio::test]
    async fn second_acceptance_on_a_job_is_refused() {
        let repo = InMemoryQuotationRepository::default();
        repo.insert_quotation(&quotation("Q-1", "W-1", 5)).await.expect("insert");
        repo.insert_quotation(&quotation("Q-2", "W-2", 3)).await.expect("insert");

        repo.update_status_if(
            &QuotationId("Q-1".to_owned()),
            QuotationStatus::Pending,
            QuotationStatus::Accepted,
            Utc::now(),
        )
        .await
        .expect("accept")
        .expect("matched");
        let second = repo
            .update_status_if(
                &QuotationId("Q-2".to_owned()),
                QuotationStatus::Pending,
                QuotationStatus::Accepted,
                Utc::now(),
            )
            .await;
        assert!(matches!(second, Err(StoreError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_sibling_rejection_keeps_one() {
        let repo = InMemoryQuotationRepository::default();
        repo.insert_quotation(&quotation("Q-1", "W-1", 30)).await.expect("insert");
        repo.insert_quotation(&quotation("Q-2", "W-2", 10)).await.expect("insert");
        repo.insert_quotation(&quotation("Q-3", "W-3", 20)).await.expect("insert");

        let job_id = JobId("J-1".to_owned());
        let listed = repo.list_for_job(&job_id, None).await.expect("list");
        let order: Vec<&str> = listed.iter().map(|quotation| quotation.id.0.as_str()).collect();
        assert_eq!(order, vec!["Q-2", "Q-3", "Q-1"]);

        let changed = repo
            .reject_pending_siblings(&job_id, &QuotationId("Q-3".to_owned()), Utc::now())
            .await
            .expect("reject siblings");
        assert_eq!(changed, 2);
        let pending =
            repo.list_for_job(&job_id, Some(QuotationStatus::Pending)).await.expect("list");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.0, "Q-3");
    }
}
