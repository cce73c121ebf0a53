use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::job::{Job, JobId};
use crate::domain::profile::ProfileId;
use crate::domain::quotation::Quotation;
use crate::store::{JobStore, ProfileStore};

/// Which side of a job the listing names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counterpart {
    Provider,
    Worker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    #[serde(flatten)]
    pub job: Job,
    pub client_name: Option<String>,
    pub worker_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationListing {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub worker_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerQuotation {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub job_title: Option<String>,
}

/// Resolves profile and job references to display values with one batched
/// lookup per listing instead of a join. A failed lookup degrades to missing
/// names; the primary rows are still returned.
#[derive(Clone)]
pub struct Denormalizer {
    profiles: Arc<dyn ProfileStore>,
    jobs: Arc<dyn JobStore>,
}

impl Denormalizer {
    pub fn new(profiles: Arc<dyn ProfileStore>, jobs: Arc<dyn JobStore>) -> Self {
        Self { profiles, jobs }
    }

    pub async fn jobs(&self, jobs: Vec<Job>, counterpart: Counterpart) -> Vec<JobListing> {
        let ids = distinct(jobs.iter().filter_map(|job| match counterpart {
            Counterpart::Provider => Some(&job.provider_id),
            Counterpart::Worker => job.worker_id.as_ref(),
        }));
        let names = self.names(&ids).await;

        jobs.into_iter()
            .map(|job| {
                let (client_name, worker_name) = match counterpart {
                    Counterpart::Provider => (names.get(&job.provider_id).cloned(), None),
                    Counterpart::Worker => {
                        (None, job.worker_id.as_ref().and_then(|id| names.get(id)).cloned())
                    }
                };
                JobListing { job, client_name, worker_name }
            })
            .collect()
    }

    pub async fn quotations(&self, quotations: Vec<Quotation>) -> Vec<QuotationListing> {
        let ids = distinct(quotations.iter().map(|quotation| &quotation.worker_id));
        let names = self.names(&ids).await;

        quotations
            .into_iter()
            .map(|quotation| {
                let worker_name = names.get(&quotation.worker_id).cloned();
                QuotationListing { quotation, worker_name }
            })
            .collect()
    }

    pub async fn worker_quotations(&self, quotations: Vec<Quotation>) -> Vec<WorkerQuotation> {
        let ids: Vec<JobId> = quotations
            .iter()
            .map(|quotation| quotation.job_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let titles: BTreeMap<JobId, String> = if ids.is_empty() {
            BTreeMap::new()
        } else {
            match self.jobs.find_jobs_by_ids(&ids).await {
                Ok(jobs) => jobs.into_iter().map(|job| (job.id, job.title)).collect(),
                Err(error) => {
                    warn!(
                        event_name = "enrich.job_titles_failed",
                        requested = ids.len(),
                        error = %error,
                        "job title lookup failed; returning quotations without titles"
                    );
                    BTreeMap::new()
                }
            }
        };

        quotations
            .into_iter()
            .map(|quotation| {
                let job_title = titles.get(&quotation.job_id).cloned();
                WorkerQuotation { quotation, job_title }
            })
            .collect()
    }

    async fn names(&self, ids: &[ProfileId]) -> BTreeMap<ProfileId, String> {
        if ids.is_empty() {
            return BTreeMap::new();
        }
        match self.profiles.display_names(ids).await {
            Ok(names) => names,
            Err(error) => {
                warn!(
                    event_name = "enrich.display_names_failed",
                    requested = ids.len(),
                    error = %error,
                    "display name lookup failed; returning rows without names"
                );
                BTreeMap::new()
            }
        }
    }
}

fn distinct<'a>(ids: impl Iterator<Item = &'a ProfileId>) -> Vec<ProfileId> {
    ids.cloned().collect::<BTreeSet<_>>().into_iter().collect()
}
