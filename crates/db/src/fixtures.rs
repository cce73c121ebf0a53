use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_PROFILES: &[SeedProfileContract] = &[
    SeedProfileContract { id: "demo-provider-001", username: "pat_provides", role: "provider" },
    SeedProfileContract { id: "demo-worker-001", username: "wes_works", role: "worker" },
    SeedProfileContract { id: "demo-worker-002", username: "wanda_fixes", role: "worker" },
    SeedProfileContract { id: "demo-admin-001", username: "ada_admin", role: "admin" },
];

const SEED_JOBS: &[SeedJobContract] = &[
    SeedJobContract {
        id: "demo-job-open",
        status: "posted",
        worker_id: None,
        quoted_worker_ids: &["demo-worker-001"],
        description: "Open job with one pending quotation",
    },
    SeedJobContract {
        id: "demo-job-assigned",
        status: "accepted",
        worker_id: Some("demo-worker-002"),
        quoted_worker_ids: &["demo-worker-002"],
        description: "Job assigned through an accepted quotation",
    },
    SeedJobContract {
        id: "demo-job-paid",
        status: "paid",
        worker_id: Some("demo-worker-002"),
        quoted_worker_ids: &[],
        description: "Claimed job carried through to payment",
    },
];

const SEED_QUOTATIONS: &[(&str, &str)] =
    &[("demo-quote-open", "pending"), ("demo-quote-assigned", "accepted")];

/// Deterministic demo marketplace used by `thosejobs seed` and the
/// integration tests.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset in one transaction. Safe to call repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        tracing::info!(
            event_name = "db.seed.loaded",
            profiles = SEED_PROFILES.len(),
            jobs = SEED_JOBS.len(),
            "demo dataset loaded"
        );

        Ok(SeedResult {
            profiles_seeded: SEED_PROFILES.len(),
            jobs_seeded: SEED_JOBS
                .iter()
                .map(|job| JobSeedInfo { job_id: job.id, description: job.description })
                .collect(),
            quotations_seeded: SEED_QUOTATIONS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for profile in SEED_PROFILES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM profile WHERE id = ?1 AND username = ?2 AND role = ?3)",
            )
            .bind(profile.id)
            .bind(profile.username)
            .bind(profile.role)
            .fetch_one(pool)
            .await?;
            checks.push((profile.id, present == 1));
        }

        for job in SEED_JOBS {
            let row = sqlx::query_as::<_, (String, Option<String>, String)>(
                "SELECT status, worker_id, quoted_worker_ids FROM job WHERE id = ?1",
            )
            .bind(job.id)
            .fetch_optional(pool)
            .await?;

            let matches = match row {
                Some((status, worker_id, quoted_json)) => {
                    let quoted: Vec<String> = serde_json::from_str(&quoted_json)
                        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
                    status == job.status
                        && worker_id.as_deref() == job.worker_id
                        && string_list_matches(&quoted, job.quoted_worker_ids)
                }
                None => false,
            };
            checks.push((job.id, matches));
        }

        for (quotation_id, status) in SEED_QUOTATIONS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM quotation WHERE id = ?1 AND status = ?2)",
            )
            .bind(quotation_id)
            .bind(status)
            .fetch_one(pool)
            .await?;
            checks.push((*quotation_id, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quotation_ids = sql_array_from_ids(SEED_QUOTATIONS.iter().map(|(id, _)| *id));
        let job_ids = sql_array_from_ids(SEED_JOBS.iter().map(|job| job.id));
        let profile_ids = sql_array_from_ids(SEED_PROFILES.iter().map(|profile| profile.id));

        sqlx::query(&format!("DELETE FROM quotation WHERE id IN {quotation_ids}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM job WHERE id IN {job_ids}")).execute(&mut *tx).await?;
        sqlx::query(&format!("DELETE FROM profile WHERE id IN {profile_ids}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedProfileContract {
    id: &'static str,
    username: &'static str,
    role: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedJobContract {
    id: &'static str,
    status: &'static str,
    worker_id: Option<&'static str>,
    quoted_worker_ids: &'static [&'static str],
    description: &'static str,
}

fn string_list_matches(actual: &[String], expected: &[&str]) -> bool {
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, b)| a == b)
}

fn sql_array_from_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let quoted = ids.map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, serde::Serialize)]
pub struct SeedResult {
    pub profiles_seeded: usize,
    pub jobs_seeded: Vec<JobSeedInfo>,
    pub quotations_seeded: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct JobSeedInfo {
    pub job_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug, serde::Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
