use tracing::{debug, error};

use crate::context::MarketplaceContext;
use crate::domain::profile::Role;
use crate::enrich::{Counterpart, Denormalizer, JobListing};
use crate::errors::WorkflowError;
use crate::query::{JobFilters, JobQuery, JobView, DEFAULT_SORT};
use crate::store::FilterOptions;

/// Read side of the marketplace: role-scoped job listings with names resolved.
#[derive(Clone)]
pub struct JobBoard {
    context: MarketplaceContext,
    denormalizer: Denormalizer,
    default_sort: String,
}

impl JobBoard {
    pub fn new(context: MarketplaceContext) -> Self {
        let denormalizer = Denormalizer::new(context.profiles.clone(), context.jobs.clone());
        Self { context, denormalizer, default_sort: DEFAULT_SORT.to_owned() }
    }

    pub fn with_default_sort(mut self, default_sort: impl Into<String>) -> Self {
        self.default_sort = default_sort.into();
        self
    }

    /// The view a role lands on when it does not ask for one.
    pub fn default_view(role: Role) -> JobView {
        match role {
            Role::Worker => JobView::WorkerAvailable,
            Role::Provider | Role::Admin => JobView::Provider,
        }
    }

    pub async fn list(
        &self,
        view: JobView,
        filters: &JobFilters,
    ) -> Result<Vec<JobListing>, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let query = JobQuery::new(view, actor.id.clone(), filters, &self.default_sort)?;

        let jobs = self.context.jobs.list_jobs(&query).await.map_err(|source| {
            error!(
                event_name = "board.list_failed",
                view = view.as_str(),
                profile_id = %actor.id,
                error = %source,
                "job listing query failed"
            );
            WorkflowError::from(source)
        })?;

        debug!(
            event_name = "board.listed",
            view = view.as_str(),
            profile_id = %actor.id,
            sort = %query.sort.as_string(),
            count = jobs.len(),
            "job listing served"
        );

        let counterpart = match view {
            JobView::Provider => Counterpart::Worker,
            JobView::WorkerAvailable | JobView::WorkerMyWork => Counterpart::Provider,
        };
        Ok(self.denormalizer.jobs(jobs, counterpart).await)
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, WorkflowError> {
        Ok(self.context.jobs.filter_options().await?)
    }
}
