use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{new_correlation_id, AuditCategory, AuditEvent, AuditOutcome};
use crate::context::MarketplaceContext;
use crate::domain::job::{Job, JobId, NewJob};
use crate::domain::profile::Role;
use crate::errors::WorkflowError;
use crate::lifecycle::engine::{JobLifecycle, TransitionError};
use crate::lifecycle::states::{JobCommand, TransitionPlan};
use crate::session::Actor;

const CLAIM_CONFLICT_MESSAGE: &str = "Job is already claimed or no longer available.";

/// Executes lifecycle commands as single conditional updates.
#[derive(Clone)]
pub struct JobLifecycleService {
    context: MarketplaceContext,
    engine: JobLifecycle,
}

impl JobLifecycleService {
    pub fn new(context: MarketplaceContext) -> Self {
        Self { context, engine: JobLifecycle }
    }

    pub async fn post_job(&self, posting: NewJob) -> Result<Job, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        if actor.role != Role::Provider {
            return Err(WorkflowError::Forbidden("only providers can post jobs".to_owned()));
        }

        let job = Job::posted(
            JobId(Uuid::new_v4().to_string()),
            actor.id.clone(),
            posting,
            Utc::now(),
        )?;
        self.context.jobs.insert_job(&job).await.map_err(|source| {
            error!(
                event_name = "job.post_failed",
                profile_id = %actor.id,
                error = %source,
                "job insert failed"
            );
            WorkflowError::from(source)
        })?;

        info!(
            event_name = "job.posted",
            job_id = %job.id,
            profile_id = %actor.id,
            time_window = %job.time_window,
            "job posted"
        );
        Ok(job)
    }

    pub async fn apply(&self, command: &JobCommand) -> Result<Job, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let correlation_id = new_correlation_id();
        let job_id = command.job_id();

        let plan = match self.engine.plan(command, &actor) {
            Ok(plan) => plan,
            Err(rejection) => {
                self.audit_rejection(job_id, &correlation_id, &actor, command, &rejection);
                return Err(WorkflowError::Forbidden(rejection.to_string()));
            }
        };

        match self.execute(job_id, &plan, &actor).await {
            Ok(job) => {
                info!(
                    event_name = "job.transition_applied",
                    job_id = %job.id,
                    action = %plan.action,
                    to = %job.status,
                    profile_id = %actor.id,
                    correlation_id = %correlation_id,
                    "job transition applied"
                );
                self.context.audit.emit(
                    AuditEvent::new(
                        Some(job.id.clone()),
                        correlation_id,
                        "job.transition_applied",
                        AuditCategory::Lifecycle,
                        actor.id.as_str(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("action", plan.action.as_str())
                    .with_metadata("to", job.status.as_str()),
                );
                Ok(job)
            }
            Err(failure) => {
                let outcome = match failure {
                    WorkflowError::Store(_) => AuditOutcome::Failed,
                    _ => AuditOutcome::Rejected,
                };
                self.context.audit.emit(
                    AuditEvent::new(
                        Some(job_id.clone()),
                        correlation_id,
                        "job.transition_rejected",
                        AuditCategory::Lifecycle,
                        actor.id.as_str(),
                        outcome,
                    )
                    .with_metadata("action", plan.action.as_str())
                    .with_metadata("reason", failure.to_string()),
                );
                Err(failure)
            }
        }
    }

    /// Runs `plan` as one conditional update. A miss is explained by re-reading
    /// the job and evaluating the plan against what is stored now.
    pub(crate) async fn execute(
        &self,
        job_id: &JobId,
        plan: &TransitionPlan,
        actor: &Actor,
    ) -> Result<Job, WorkflowError> {
        let updated = self
            .context
            .jobs
            .update_job_if(job_id, &plan.condition, &plan.write, Utc::now())
            .await
            .map_err(|source| {
                error!(
                    event_name = "job.transition_failed",
                    job_id = %job_id,
                    action = %plan.action,
                    error = %source,
                    "conditional job update failed"
                );
                WorkflowError::from(source)
            })?;

        if let Some(job) = updated {
            job.check_invariants().map_err(WorkflowError::from)?;
            return Ok(job);
        }

        let current = self.context.jobs.find_job(job_id).await?;
        let failure = classify_miss(&self.engine, job_id, current.as_ref(), plan);
        warn!(
            event_name = "job.transition_conflict",
            job_id = %job_id,
            action = %plan.action,
            profile_id = %actor.id,
            reason = %failure,
            "conditional job update matched no row"
        );
        Err(failure)
    }

    fn audit_rejection(
        &self,
        job_id: &JobId,
        correlation_id: &str,
        actor: &Actor,
        command: &JobCommand,
        rejection: &TransitionError,
    ) {
        warn!(
            event_name = "job.transition_denied",
            job_id = %job_id,
            action = %command.action(),
            profile_id = %actor.id,
            role = %actor.role,
            reason = %rejection,
            "lifecycle command denied"
        );
        self.context.audit.emit(
            AuditEvent::new(
                Some(job_id.clone()),
                correlation_id,
                "job.transition_rejected",
                AuditCategory::Lifecycle,
                actor.id.as_str(),
                AuditOutcome::Rejected,
            )
            .with_metadata("action", command.action().as_str())
            .with_metadata("reason", rejection.to_string()),
        );
    }
}

pub(crate) fn classify_miss(
    engine: &JobLifecycle,
    job_id: &JobId,
    current: Option<&Job>,
    plan: &TransitionPlan,
) -> WorkflowError {
    let Some(current) = current else {
        return WorkflowError::not_found("job", job_id.as_str());
    };

    match engine.evaluate(current, plan) {
        Err(TransitionError::NotParticipant { .. }) => WorkflowError::Forbidden(format!(
            "{} is not permitted on job {job_id} for this profile",
            plan.action
        )),
        Err(TransitionError::InvalidTransition { from, action }) => {
            WorkflowError::claim_conflict(format!(
                "{CLAIM_CONFLICT_MESSAGE} (job is {from}, {action} needs {})",
                plan.condition
                    .statuses
                    .iter()
                    .map(|status| status.as_str())
                    .collect::<Vec<_>>()
                    .join(" or ")
            ))
        }
        Err(TransitionError::AlreadyAssigned { .. }) => {
            WorkflowError::claim_conflict(CLAIM_CONFLICT_MESSAGE)
        }
        Err(rejection @ TransitionError::RoleNotPermitted { .. }) => {
            WorkflowError::Forbidden(rejection.to_string())
        }
        // The row changed between the update and the re-read.
        Ok(_) => WorkflowError::claim_conflict(CLAIM_CONFLICT_MESSAGE),
    }
}
