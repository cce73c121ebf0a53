use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{new_correlation_id, AuditCategory, AuditEvent, AuditOutcome};
use crate::context::MarketplaceContext;
use crate::domain::job::{Job, JobId};
use crate::domain::profile::Role;
use crate::domain::quotation::{Quotation, QuotationDraft, QuotationId, QuotationStatus};
use crate::enrich::{Denormalizer, QuotationListing, WorkerQuotation};
use crate::errors::{StoreError, WorkflowError};
use crate::fees::{FeeBreakdown, FeeSchedule};
use crate::lifecycle::JobLifecycle;
use crate::quotations::acceptance::{AcceptanceProgress, AcceptanceReceipt, QuotationAcceptance};
use crate::session::Actor;
use crate::store::AppendOutcome;

const SUBMIT_WORKFLOW: &str = "submit_quotation";

/// Quotation submission, review and acceptance for a single marketplace.
#[derive(Clone)]
pub struct QuotationWorkflow {
    context: MarketplaceContext,
    denormalizer: Denormalizer,
    fees: FeeSchedule,
}

impl QuotationWorkflow {
    pub fn new(context: MarketplaceContext, fees: FeeSchedule) -> Self {
        let denormalizer = Denormalizer::new(context.profiles.clone(), context.jobs.clone());
        Self { context, denormalizer, fees }
    }

    pub fn fee_breakdown(&self, amount: Decimal) -> Result<FeeBreakdown, WorkflowError> {
        Ok(self.fees.breakdown(amount)?)
    }

    /// Inserts a pending quotation and records the worker on the job.
    ///
    /// Duplicate detection runs twice: against `quoted_worker_ids` before the
    /// insert and through the store's uniqueness conflict during it. Both
    /// report `AlreadyQuoted`.
    pub async fn submit(
        &self,
        job_id: &JobId,
        draft: QuotationDraft,
    ) -> Result<Quotation, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        if actor.role != Role::Worker {
            return Err(WorkflowError::Forbidden("only workers can submit quotations".to_owned()));
        }
        draft.validate()?;

        let job = self.load_job(job_id).await?;
        if job.provider_id == actor.id {
            return Err(WorkflowError::Forbidden("you cannot quote on your own job".to_owned()));
        }
        if job.has_quote_from(&actor.id) {
            warn!(
                event_name = "quotation.duplicate",
                job_id = %job_id,
                profile_id = %actor.id,
                detected_by = "quoted_worker_ids",
                "duplicate quotation rejected"
            );
            return Err(WorkflowError::AlreadyQuoted { job_id: job_id.clone() });
        }
        if !job.is_open_for_quotes() {
            return Err(WorkflowError::claim_conflict(
                "This job is no longer accepting quotations.",
            ));
        }

        let now = Utc::now();
        let quotation = Quotation::pending(
            QuotationId(Uuid::new_v4().to_string()),
            job_id.clone(),
            actor.id.clone(),
            draft,
            now,
        )?;

        match self.context.quotations.insert_quotation(&quotation).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(detail)) => {
                warn!(
                    event_name = "quotation.duplicate",
                    job_id = %job_id,
                    profile_id = %actor.id,
                    detected_by = "unique_constraint",
                    detail = %detail,
                    "duplicate quotation rejected"
                );
                // An earlier attempt may have inserted without appending.
                if let Err(repair) =
                    self.context.jobs.append_quoted_worker(job_id, &actor.id, now).await
                {
                    warn!(
                        event_name = "quotation.repair_append_failed",
                        job_id = %job_id,
                        profile_id = %actor.id,
                        error = %repair,
                        "could not restore quoted worker entry"
                    );
                }
                return Err(WorkflowError::AlreadyQuoted { job_id: job_id.clone() });
            }
            Err(source) => {
                error!(
                    event_name = "quotation.insert_failed",
                    job_id = %job_id,
                    profile_id = %actor.id,
                    error = %source,
                    "quotation insert failed"
                );
                return Err(source.into());
            }
        }

        let appended = self.context.jobs.append_quoted_worker(job_id, &actor.id, now).await;
        match appended {
            Ok(AppendOutcome::Appended | AppendOutcome::AlreadyPresent) => {}
            Ok(AppendOutcome::JobNotOpen | AppendOutcome::JobMissing) => {
                // The job closed between the preflight and the append.
                self.context
                    .quotations
                    .update_status_if(
                        &quotation.id,
                        QuotationStatus::Pending,
                        QuotationStatus::Rejected,
                        Utc::now(),
                    )
                    .await
                    .map_err(|source| incomplete_submit(&quotation, source.to_string()))?;
                return Err(WorkflowError::claim_conflict(
                    "This job is no longer accepting quotations.",
                ));
            }
            Err(source) => {
                error!(
                    event_name = "quotation.append_failed",
                    job_id = %job_id,
                    quotation_id = %quotation.id,
                    error = %source,
                    "quotation stored but quoted worker entry is missing"
                );
                return Err(incomplete_submit(&quotation, source.to_string()));
            }
        }

        info!(
            event_name = "quotation.submitted",
            job_id = %job_id,
            quotation_id = %quotation.id,
            profile_id = %actor.id,
            amount = %quotation.quoted_amount,
            "quotation submitted"
        );
        self.audit(&actor, job_id, "quotation.submitted", AuditOutcome::Success, &quotation.id);
        Ok(quotation)
    }

    pub async fn accept(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<AcceptanceReceipt, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let acceptance = QuotationAcceptance::new(&self.context, JobLifecycle);
        let result = acceptance.run(&actor, quotation_id).await;

        let (job_id, outcome) = match &result {
            Ok(receipt) => (Some(receipt.job.id.clone()), AuditOutcome::Success),
            Err(WorkflowError::Incomplete { .. }) => (None, AuditOutcome::Failed),
            Err(_) => (None, AuditOutcome::Rejected),
        };
        let mut event = AuditEvent::new(
            job_id,
            new_correlation_id(),
            "quotation.accepted",
            AuditCategory::Quotation,
            actor.id.as_str(),
            outcome,
        )
        .with_metadata("quotation_id", quotation_id.0.clone());
        if let Err(failure) = &result {
            event = event.with_metadata("reason", failure.to_string());
        }
        self.context.audit.emit(event);

        result
    }

    /// Provider rejects one pending quotation. Nothing else changes.
    ///
    /// A quotation whose worker already holds the job is mid-acceptance and
    /// can only be finished by retrying `accept`.
    pub async fn reject(&self, quotation_id: &QuotationId) -> Result<Quotation, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let quotation = self.load_quotation(quotation_id).await?;
        let job = self.load_job(&quotation.job_id).await?;
        ensure_owner(&actor, &job)?;

        if AcceptanceProgress::derive(&job, &quotation).job_assigned {
            warn!(
                event_name = "quotation.reject_blocked",
                job_id = %job.id,
                quotation_id = %quotation_id,
                "quotation worker already holds the job"
            );
            return Err(WorkflowError::claim_conflict(
                "This quotation is already being accepted. Retry the acceptance to finish it.",
            ));
        }

        let updated = self
            .context
            .quotations
            .update_status_if(
                quotation_id,
                QuotationStatus::Pending,
                QuotationStatus::Rejected,
                Utc::now(),
            )
            .await?;

        let Some(rejected) = updated else {
            return Err(match self.context.quotations.find_quotation(quotation_id).await? {
                None => WorkflowError::not_found("quotation", quotation_id.0.as_str()),
                Some(current) => WorkflowError::claim_conflict(format!(
                    "Quotation is already {} and can no longer be rejected.",
                    current.status
                )),
            });
        };

        info!(
            event_name = "quotation.rejected",
            job_id = %job.id,
            quotation_id = %quotation_id,
            profile_id = %actor.id,
            "quotation rejected"
        );
        self.audit(&actor, &job.id, "quotation.rejected", AuditOutcome::Success, quotation_id);
        Ok(rejected)
    }

    /// Quotations on one of the provider's jobs, newest first. Defaults to
    /// the actionable pending set.
    pub async fn list_for_job(
        &self,
        job_id: &JobId,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<QuotationListing>, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let job = self.load_job(job_id).await?;
        ensure_owner(&actor, &job)?;

        let quotations = self.context.quotations.list_for_job(job_id, status).await?;
        Ok(self.denormalizer.quotations(quotations).await)
    }

    /// The signed-in worker's own quotations, newest first, with job titles.
    pub async fn list_mine(&self) -> Result<Vec<WorkerQuotation>, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let quotations = self.context.quotations.list_for_worker(&actor.id).await?;
        Ok(self.denormalizer.worker_quotations(quotations).await)
    }

    async fn load_job(&self, job_id: &JobId) -> Result<Job, WorkflowError> {
        self.context
            .jobs
            .find_job(job_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("job", job_id.as_str()))
    }

    async fn load_quotation(&self, id: &QuotationId) -> Result<Quotation, WorkflowError> {
        self.context
            .quotations
            .find_quotation(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("quotation", id.0.as_str()))
    }

    fn audit(
        &self,
        actor: &Actor,
        job_id: &JobId,
        event_type: &str,
        outcome: AuditOutcome,
        quotation_id: &QuotationId,
    ) {
        self.context.audit.emit(
            AuditEvent::new(
                Some(job_id.clone()),
                new_correlation_id(),
                event_type,
                AuditCategory::Quotation,
                actor.id.as_str(),
                outcome,
            )
            .with_metadata("quotation_id", quotation_id.0.clone()),
        );
    }
}

pub(crate) fn ensure_owner(actor: &Actor, job: &Job) -> Result<(), WorkflowError> {
    if actor.role == Role::Admin || job.provider_id == actor.id {
        return Ok(());
    }
    Err(WorkflowError::Forbidden(format!("job {} belongs to another provider", job.id)))
}

fn incomplete_submit(quotation: &Quotation, reason: String) -> WorkflowError {
    WorkflowError::Incomplete {
        workflow: SUBMIT_WORKFLOW,
        completed: vec!["insert_quotation"],
        pending: vec!["append_quoted_worker"],
        reason: format!("quotation {}: {reason}", quotation.id),
    }
}
