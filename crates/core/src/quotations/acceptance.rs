use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::MarketplaceContext;
use crate::domain::job::{Job, JobStatus};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::errors::WorkflowError;
use crate::lifecycle::service::classify_miss;
use crate::lifecycle::JobLifecycle;
use crate::quotations::workflow::ensure_owner;
use crate::session::Actor;

const WORKFLOW: &str = "accept_quotation";
const ASSIGN_JOB: &str = "assign_job";
const ACCEPT_QUOTATION: &str = "accept_quotation";
const REJECT_SIBLINGS: &str = "reject_siblings";

/// Which of the three acceptance writes are already reflected in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceProgress {
    pub job_assigned: bool,
    pub quotation_accepted: bool,
    pub siblings_rejected: bool,
}

impl AcceptanceProgress {
    /// Re-derives progress from stored state. Sibling rejection is always
    /// re-run since it is a no-op once done.
    pub fn derive(job: &Job, quotation: &Quotation) -> Self {
        Self {
            job_assigned: job.status != JobStatus::Posted
                && job.worker_id.as_ref() == Some(&quotation.worker_id),
            quotation_accepted: quotation.status == QuotationStatus::Accepted,
            siblings_rejected: false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        !self.job_assigned && !self.quotation_accepted
    }

    fn steps(&self) -> [(&'static str, bool); 3] {
        [
            (ASSIGN_JOB, self.job_assigned),
            (ACCEPT_QUOTATION, self.quotation_accepted),
            (REJECT_SIBLINGS, self.siblings_rejected),
        ]
    }

    pub fn completed(&self) -> Vec<&'static str> {
        self.steps().into_iter().filter_map(|(step, done)| done.then_some(step)).collect()
    }

    pub fn pending(&self) -> Vec<&'static str> {
        self.steps().into_iter().filter_map(|(step, done)| (!done).then_some(step)).collect()
    }

    fn incomplete(&self, reason: impl Into<String>) -> WorkflowError {
        WorkflowError::Incomplete {
            workflow: WORKFLOW,
            completed: self.completed(),
            pending: self.pending(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceReceipt {
    pub job: Job,
    pub quotation: Quotation,
    pub rejected_siblings: u64,
    /// True when an earlier partial run had already applied some steps.
    pub resumed: bool,
}

/// Accepting a quotation takes three writes the store cannot group: assign
/// the job, accept the quotation, reject the pending siblings. Each run
/// re-derives what is still missing, so a retry after a partial failure
/// finishes the job instead of repeating or conflicting with earlier writes.
///
/// The job write goes first. Its predicate (`posted`, unassigned, owned by
/// the actor) is what serializes competing acceptances.
pub(crate) struct QuotationAcceptance<'a> {
    context: &'a MarketplaceContext,
    engine: JobLifecycle,
}

impl<'a> QuotationAcceptance<'a> {
    pub(crate) fn new(context: &'a MarketplaceContext, engine: JobLifecycle) -> Self {
        Self { context, engine }
    }

    pub(crate) async fn run(
        &self,
        actor: &Actor,
        quotation_id: &QuotationId,
    ) -> Result<AcceptanceReceipt, WorkflowError> {
        let quotation = self
            .context
            .quotations
            .find_quotation(quotation_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("quotation", quotation_id.0.as_str()))?;
        let job = self
            .context
            .jobs
            .find_job(&quotation.job_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("job", quotation.job_id.as_str()))?;
        ensure_owner(actor, &job)?;

        let plan = self
            .engine
            .plan_quotation_acceptance(actor, &quotation.worker_id)
            .map_err(|rejection| WorkflowError::Forbidden(rejection.to_string()))?;

        if quotation.status == QuotationStatus::Rejected {
            return Err(WorkflowError::claim_conflict(
                "This quotation was rejected and can no longer be accepted.",
            ));
        }

        let mut progress = AcceptanceProgress::derive(&job, &quotation);
        if !progress.job_assigned && !job.is_open_for_quotes() {
            return Err(WorkflowError::claim_conflict(
                "Job is already assigned or no longer open for quotations.",
            ));
        }
        let resumed = !progress.is_fresh();
        if resumed {
            info!(
                event_name = "quotation.acceptance_resumed",
                job_id = %job.id,
                quotation_id = %quotation_id,
                completed = ?progress.completed(),
                "resuming partially applied acceptance"
            );
        }

        let job = if progress.job_assigned {
            job
        } else {
            let updated = self
                .context
                .jobs
                .update_job_if(&job.id, &plan.condition, &plan.write, Utc::now())
                .await?;
            match updated {
                Some(updated) => updated,
                None => {
                    let current = self.context.jobs.find_job(&job.id).await?;
                    match current {
                        // A concurrent run of this same acceptance won the write.
                        Some(current)
                            if AcceptanceProgress::derive(&current, &quotation).job_assigned =>
                        {
                            current
                        }
                        other => {
                            let failure =
                                classify_miss(&self.engine, &job.id, other.as_ref(), &plan);
                            warn!(
                                event_name = "quotation.acceptance_conflict",
                                job_id = %job.id,
                                quotation_id = %quotation_id,
                                reason = %failure,
                                "job could not be assigned"
                            );
                            return Err(failure);
                        }
                    }
                }
            }
        };
        progress.job_assigned = true;

        let quotation = if progress.quotation_accepted {
            quotation
        } else {
            let updated = self
                .context
                .quotations
                .update_status_if(
                    quotation_id,
                    QuotationStatus::Pending,
                    QuotationStatus::Accepted,
                    Utc::now(),
                )
                .await
                .map_err(|source| self.incomplete(&progress, quotation_id, source.to_string()))?;
            match updated {
                Some(updated) => updated,
                None => match self.context.quotations.find_quotation(quotation_id).await {
                    Ok(Some(current)) if current.status == QuotationStatus::Accepted => current,
                    Ok(Some(current)) => {
                        return Err(self.incomplete(
                            &progress,
                            quotation_id,
                            format!("quotation is {} after the job was assigned", current.status),
                        ))
                    }
                    Ok(None) => {
                        return Err(self.incomplete(
                            &progress,
                            quotation_id,
                            "quotation disappeared after the job was assigned",
                        ))
                    }
                    Err(source) => {
                        return Err(self.incomplete(&progress, quotation_id, source.to_string()))
                    }
                },
            }
        };
        progress.quotation_accepted = true;

        let rejected_siblings = self
            .context
            .quotations
            .reject_pending_siblings(&job.id, quotation_id, Utc::now())
            .await
            .map_err(|source| self.incomplete(&progress, quotation_id, source.to_string()))?;
        progress.siblings_rejected = true;

        info!(
            event_name = "quotation.accepted",
            job_id = %job.id,
            quotation_id = %quotation_id,
            worker_id = %quotation.worker_id,
            rejected_siblings,
            resumed,
            "quotation accepted and job assigned"
        );

        Ok(AcceptanceReceipt { job, quotation, rejected_siblings, resumed })
    }

    fn incomplete(
        &self,
        progress: &AcceptanceProgress,
        quotation_id: &QuotationId,
        reason: impl Into<String>,
    ) -> WorkflowError {
        let failure = progress.incomplete(reason);
        warn!(
            event_name = "quotation.acceptance_incomplete",
            quotation_id = %quotation_id,
            error = %failure,
            "acceptance stopped after a partial write; retry to resume"
        );
        failure
    }
}
