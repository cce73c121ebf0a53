use thiserror::Error;

use crate::domain::job::{Job, JobStatus};
use crate::domain::profile::{ProfileId, Role};
use crate::lifecycle::states::{
    DisputeResolution, JobAction, JobCommand, JobCondition, JobWrite, PartyMatch,
    TransitionOutcome, TransitionPlan, WorkerWrite,
};
use crate::session::Actor;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{action} is not available to the {role} role")]
    RoleNotPermitted { action: JobAction, role: Role },
    #[error("{action} requires the acting profile to be {relation} of the job")]
    NotParticipant { action: JobAction, relation: &'static str },
    #[error("{action} is not valid for a job in status {from}")]
    InvalidTransition { from: JobStatus, action: JobAction },
    #[error("{action} requires an unclaimed job")]
    AlreadyAssigned { action: JobAction },
}

/// The job status state machine: which command moves which status, who may
/// issue it, and which fields it writes.
#[derive(Clone, Debug, Default)]
pub struct JobLifecycle;

impl JobLifecycle {
    pub fn initial_status(&self) -> JobStatus {
        JobStatus::Posted
    }

    /// Builds the conditional update for `command`. Status preconditions are
    /// not checked here; they travel with the update so the store enforces
    /// them atomically.
    pub fn plan(
        &self,
        command: &JobCommand,
        actor: &Actor,
    ) -> Result<TransitionPlan, TransitionError> {
        let action = command.action();
        let allowed_roles = allowed_roles(action);
        if !allowed_roles.contains(&actor.role) {
            return Err(TransitionError::RoleNotPermitted { action, role: actor.role });
        }

        let (statuses, party, require_unassigned, write) = match action {
            JobAction::ClaimJob => (
                vec![JobStatus::Posted],
                PartyMatch::NotOwner(actor.id.clone()),
                true,
                JobWrite {
                    status: JobStatus::Submitted,
                    worker: WorkerWrite::Assign(actor.id.clone()),
                },
            ),
            JobAction::ApproveAssignment => (
                vec![JobStatus::Submitted],
                owner_unless_admin(actor),
                false,
                JobWrite { status: JobStatus::Accepted, worker: WorkerWrite::Keep },
            ),
            JobAction::DeclineAssignment => (
                vec![JobStatus::Submitted],
                owner_unless_admin(actor),
                false,
                JobWrite { status: JobStatus::Posted, worker: WorkerWrite::Clear },
            ),
            JobAction::MarkCompleted => (
                vec![JobStatus::Accepted],
                PartyMatch::AssignedWorker(actor.id.clone()),
                false,
                JobWrite { status: JobStatus::Completed, worker: WorkerWrite::Keep },
            ),
            JobAction::ApproveCompletion => (
                vec![JobStatus::Completed],
                owner_unless_admin(actor),
                false,
                JobWrite { status: JobStatus::Approved, worker: WorkerWrite::Keep },
            ),
            JobAction::RecordPayment => (
                vec![JobStatus::Approved],
                PartyMatch::Anyone,
                false,
                JobWrite { status: JobStatus::Paid, worker: WorkerWrite::Keep },
            ),
            JobAction::RaiseDispute => (
                vec![JobStatus::Accepted, JobStatus::Completed],
                PartyMatch::OwnerOrAssignedWorker(actor.id.clone()),
                false,
                JobWrite { status: JobStatus::Disputed, worker: WorkerWrite::Keep },
            ),
            JobAction::ResolveDispute(resolution) => (
                vec![JobStatus::Disputed],
                PartyMatch::Anyone,
                false,
                JobWrite {
                    status: match resolution {
                        DisputeResolution::Approve => JobStatus::Approved,
                        DisputeResolution::Cancel => JobStatus::Cancelled,
                    },
                    worker: WorkerWrite::Keep,
                },
            ),
            JobAction::CancelJob => (
                vec![JobStatus::Posted, JobStatus::Submitted],
                owner_unless_admin(actor),
                false,
                JobWrite { status: JobStatus::Cancelled, worker: WorkerWrite::Clear },
            ),
            JobAction::AcceptQuotation => {
                return Err(TransitionError::RoleNotPermitted { action, role: actor.role })
            }
        };

        Ok(TransitionPlan {
            action,
            condition: JobCondition { statuses, party, require_unassigned },
            write,
        })
    }

    /// Plan used by quotation acceptance: the owner assigns the quoting worker
    /// and moves the job straight to `accepted`.
    pub fn plan_quotation_acceptance(
        &self,
        actor: &Actor,
        worker_id: &ProfileId,
    ) -> Result<TransitionPlan, TransitionError> {
        if !matches!(actor.role, Role::Provider | Role::Admin) {
            return Err(TransitionError::RoleNotPermitted {
                action: JobAction::AcceptQuotation,
                role: actor.role,
            });
        }

        Ok(TransitionPlan {
            action: JobAction::AcceptQuotation,
            condition: JobCondition {
                statuses: vec![JobStatus::Posted],
                party: owner_unless_admin(actor),
                require_unassigned: true,
            },
            write: JobWrite {
                status: JobStatus::Accepted,
                worker: WorkerWrite::Assign(worker_id.clone()),
            },
        })
    }

    /// Evaluates `plan` against a snapshot. Used to explain why a conditional
    /// update matched no row and to reason about transitions in isolation.
    pub fn evaluate(
        &self,
        job: &Job,
        plan: &TransitionPlan,
    ) -> Result<TransitionOutcome, TransitionError> {
        if !plan.condition.party.matches(job) {
            return Err(TransitionError::NotParticipant {
                action: plan.action,
                relation: relation_label(&plan.condition.party),
            });
        }
        if !plan.condition.statuses.contains(&job.status) {
            return Err(TransitionError::InvalidTransition {
                from: job.status,
                action: plan.action,
            });
        }
        if plan.condition.require_unassigned && job.worker_id.is_some() {
            return Err(TransitionError::AlreadyAssigned { action: plan.action });
        }

        Ok(TransitionOutcome {
            job_id: job.id.clone(),
            action: plan.action,
            from: job.status,
            to: plan.write.status,
        })
    }
}

fn allowed_roles(action: JobAction) -> &'static [Role] {
    match action {
        JobAction::ClaimJob | JobAction::MarkCompleted => &[Role::Worker],
        JobAction::ApproveAssignment
        | JobAction::DeclineAssignment
        | JobAction::ApproveCompletion
        | JobAction::CancelJob
        | JobAction::AcceptQuotation => &[Role::Provider, Role::Admin],
        JobAction::RaiseDispute => &[Role::Provider, Role::Worker],
        JobAction::RecordPayment | JobAction::ResolveDispute(_) => &[Role::Admin],
    }
}

fn owner_unless_admin(actor: &Actor) -> PartyMatch {
    match actor.role {
        Role::Admin => PartyMatch::Anyone,
        _ => PartyMatch::Owner(actor.id.clone()),
    }
}

fn relation_label(party: &PartyMatch) -> &'static str {
    match party {
        PartyMatch::Anyone => "any participant",
        PartyMatch::Owner(_) => "the owner",
        PartyMatch::NotOwner(_) => "someone other than the owner",
        PartyMatch::AssignedWorker(_) => "the assigned worker",
        PartyMatch::OwnerOrAssignedWorker(_) => "the owner or assigned worker",
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::job::{Job, JobId, JobStatus};
    use crate::domain::profile::{ProfileId, Role};
    use crate::lifecycle::engine::{JobLifecycle, TransitionError};
    use crate::lifecycle::states::{
        DisputeResolution, JobAction, JobCommand, PartyMatch, WorkerWrite,
    };
    use crate::session::Actor;

    fn actor(id: &str, role: Role) -> Actor {
        Actor { id: ProfileId(id.to_owned()), role }
    }

    fn job(status: JobStatus, worker: Option<&str>) -> Job {
        let now = Utc::now();
        Job {
            id: JobId("J-1".to_owned()),
            provider_id: ProfileId("P-1".to_owned()),
            worker_id: worker.map(|id| ProfileId(id.to_owned())),
            title: "Walkthrough video".to_owned(),
            category: "Walkthrough".to_owned(),
            description: "Record a walkthrough".to_owned(),
            location: "Denver".to_owned(),
            budget: Decimal::new(150, 0),
            deadline_at: now,
            time_window: "Immediate (Today)".to_owned(),
            special_requirements: None,
            media_urls: Vec::new(),
            status,
            quoted_worker_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn command(action: JobAction) -> JobCommand {
        let job_id = JobId("J-1".to_owned());
        match action {
            JobAction::ClaimJob => JobCommand::ClaimJob { job_id },
            JobAction::ApproveAssignment => JobCommand::ApproveAssignment { job_id },
            JobAction::DeclineAssignment => JobCommand::DeclineAssignment { job_id },
            JobAction::MarkCompleted => JobCommand::MarkCompleted { job_id },
            JobAction::ApproveCompletion => JobCommand::ApproveCompletion { job_id },
            JobAction::RecordPayment => JobCommand::RecordPayment { job_id },
            JobAction::RaiseDispute => JobCommand::RaiseDispute { job_id },
            JobAction::ResolveDispute(resolution) => {
                JobCommand::ResolveDispute { job_id, resolution }
            }
            JobAction::CancelJob | JobAction::AcceptQuotation => JobCommand::CancelJob { job_id },
        }
    }

    #[test]
    fn claim_targets_posted_unclaimed_jobs_not_owned_by_the_worker() {
        let engine = JobLifecycle;
        let plan = engine
            .plan(&command(JobAction::ClaimJob), &actor("W-1", Role::Worker))
            .expect("workers may claim");

        assert_eq!(plan.condition.statuses, vec![JobStatus::Posted]);
        assert!(plan.condition.require_unassigned);
        assert_eq!(plan.condition.party, PartyMatch::NotOwner(ProfileId("W-1".to_owned())));
        assert_eq!(plan.write.status, JobStatus::Submitted);
        assert_eq!(plan.write.worker, WorkerWrite::Assign(ProfileId("W-1".to_owned())));
    }

    #[test]
    fn happy_path_walks_every_status_in_order() {
        let engine = JobLifecycle;
        let provider = actor("P-1", Role::Provider);
        let worker = actor("W-1", Role::Worker);
        let admin = actor("A-1", Role::Admin);
        let mut current = job(engine.initial_status(), None);

        let steps = [
            (JobAction::ClaimJob, &worker, JobStatus::Submitted),
            (JobAction::ApproveAssignment, &provider, JobStatus::Accepted),
            (JobAction::MarkCompleted, &worker, JobStatus::Completed),
            (JobAction::ApproveCompletion, &provider, JobStatus::Approved),
            (JobAction::RecordPayment, &admin, JobStatus::Paid),
        ];

        for (action, who, expected) in steps {
            let plan = engine.plan(&command(action), who).expect("plan");
            let outcome = engine.evaluate(&current, &plan).expect("transition applies");
            assert_eq!(outcome.to, expected);
            plan.write.apply_to(&mut current);
            current.check_invariants().expect("invariants hold after every step");
        }

        assert_eq!(current.status, JobStatus::Paid);
        assert!(current.status.is_terminal());
        assert_eq!(current.worker_id, Some(ProfileId("W-1".to_owned())));
    }

    #[test]
    fn approve_assignment_is_rejected_outside_submitted() {
        let engine = JobLifecycle;
        let plan = engine
            .plan(&command(JobAction::ApproveAssignment), &actor("P-1", Role::Provider))
            .expect("plan");

        let error = engine.evaluate(&job(JobStatus::Posted, None), &plan).expect_err("posted");
        assert_eq!(
            error,
            TransitionError::InvalidTransition {
                from: JobStatus::Posted,
                action: JobAction::ApproveAssignment
            }
        );
    }

    #[test]
    fn claim_on_an_assigned_job_reports_already_assigned() {
        let engine = JobLifecycle;
        let plan =
            engine.plan(&command(JobAction::ClaimJob), &actor("W-2", Role::Worker)).expect("plan");

        let mut snapshot = job(JobStatus::Posted, None);
        snapshot.worker_id = Some(ProfileId("W-1".to_owned()));
        assert_eq!(
            engine.evaluate(&snapshot, &plan),
            Err(TransitionError::AlreadyAssigned { action: JobAction::ClaimJob })
        );
    }

    #[test]
    fn owner_cannot_claim_own_job() {
        let engine = JobLifecycle;
        let provider_as_worker = actor("P-1", Role::Worker);
        let plan = engine.plan(&command(JobAction::ClaimJob), &provider_as_worker).expect("plan");

        assert!(matches!(
            engine.evaluate(&job(JobStatus::Posted, None), &plan),
            Err(TransitionError::NotParticipant { .. })
        ));
    }

    #[test]
    fn roles_are_enforced_before_any_write() {
        let engine = JobLifecycle;

        assert_eq!(
            engine.plan(&command(JobAction::ClaimJob), &actor("P-1", Role::Provider)),
            Err(TransitionError::RoleNotPermitted {
                action: JobAction::ClaimJob,
                role: Role::Provider
            })
        );
        assert!(engine
            .plan(&command(JobAction::RecordPayment), &actor("P-1", Role::Provider))
            .is_err());
    }

    #[test]
    fn decline_and_cancel_clear_the_worker_so_posted_stays_unclaimed() {
        let engine = JobLifecycle;
        let provider = actor("P-1", Role::Provider);

        let mut declined = job(JobStatus::Submitted, Some("W-1"));
        let plan = engine.plan(&command(JobAction::DeclineAssignment), &provider).expect("plan");
        engine.evaluate(&declined, &plan).expect("submitted jobs can be declined");
        plan.write.apply_to(&mut declined);
        assert_eq!(declined.status, JobStatus::Posted);
        assert_eq!(declined.worker_id, None);
        declined.check_invariants().expect("posted job is unclaimed");

        let mut cancelled = job(JobStatus::Submitted, Some("W-1"));
        let plan = engine.plan(&command(JobAction::CancelJob), &provider).expect("plan");
        engine.evaluate(&cancelled, &plan).expect("submitted jobs can be cancelled");
        plan.write.apply_to(&mut cancelled);
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_eq!(cancelled.worker_id, None);
    }

    #[test]
    fn disputes_open_from_accepted_or_completed_and_resolve_by_admin() {
        let engine = JobLifecycle;
        let worker = actor("W-1", Role::Worker);
        let admin = actor("A-1", Role::Admin);

        let plan = engine.plan(&command(JobAction::RaiseDispute), &worker).expect("plan");
        for status in [JobStatus::Accepted, JobStatus::Completed] {
            engine.evaluate(&job(status, Some("W-1")), &plan).expect("dispute allowed");
        }
        assert!(engine.evaluate(&job(JobStatus::Posted, None), &plan).is_err());

        let resolve = engine
            .plan(&command(JobAction::ResolveDispute(DisputeResolution::Cancel)), &admin)
            .expect("admin resolves");
        let outcome = engine
            .evaluate(&job(JobStatus::Disputed, Some("W-1")), &resolve)
            .expect("disputed jobs resolve");
        assert_eq!(outcome.to, JobStatus::Cancelled);
    }

    #[test]
    fn quotation_acceptance_plan_assigns_the_quoting_worker() {
        let engine = JobLifecycle;
        let plan = engine
            .plan_quotation_acceptance(
                &actor("P-1", Role::Provider),
                &ProfileId("W-9".to_owned()),
            )
            .expect("providers accept quotations");

        assert_eq!(plan.write.status, JobStatus::Accepted);
        assert_eq!(plan.write.worker, WorkerWrite::Assign(ProfileId("W-9".to_owned())));
        assert!(plan.condition.require_unassigned);
        assert!(engine
            .plan_quotation_acceptance(&actor("W-1", Role::Worker), &ProfileId("W-9".to_owned()))
            .is_err());
    }
}
