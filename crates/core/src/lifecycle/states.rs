use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobId, JobStatus};
use crate::domain::profile::ProfileId;

/// One typed command per lifecycle transition. Each carries only the fields
/// its transition is allowed to write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum JobCommand {
    ClaimJob { job_id: JobId },
    ApproveAssignment { job_id: JobId },
    DeclineAssignment { job_id: JobId },
    MarkCompleted { job_id: JobId },
    ApproveCompletion { job_id: JobId },
    RecordPayment { job_id: JobId },
    RaiseDispute { job_id: JobId },
    ResolveDispute { job_id: JobId, resolution: DisputeResolution },
    CancelJob { job_id: JobId },
}

impl JobCommand {
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::ClaimJob { job_id }
            | Self::ApproveAssignment { job_id }
            | Self::DeclineAssignment { job_id }
            | Self::MarkCompleted { job_id }
            | Self::ApproveCompletion { job_id }
            | Self::RecordPayment { job_id }
            | Self::RaiseDispute { job_id }
            | Self::ResolveDispute { job_id, .. }
            | Self::CancelJob { job_id } => job_id,
        }
    }

    pub fn action(&self) -> JobAction {
        match self {
            Self::ClaimJob { .. } => JobAction::ClaimJob,
            Self::ApproveAssignment { .. } => JobAction::ApproveAssignment,
            Self::DeclineAssignment { .. } => JobAction::DeclineAssignment,
            Self::MarkCompleted { .. } => JobAction::MarkCompleted,
            Self::ApproveCompletion { .. } => JobAction::ApproveCompletion,
            Self::RecordPayment { .. } => JobAction::RecordPayment,
            Self::RaiseDispute { .. } => JobAction::RaiseDispute,
            Self::ResolveDispute { resolution, .. } => JobAction::ResolveDispute(*resolution),
            Self::CancelJob { .. } => JobAction::CancelJob,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    Approve,
    Cancel,
}

/// Field-free identity of a lifecycle transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    ClaimJob,
    ApproveAssignment,
    DeclineAssignment,
    MarkCompleted,
    ApproveCompletion,
    RecordPayment,
    RaiseDispute,
    ResolveDispute(DisputeResolution),
    CancelJob,
    AcceptQuotation,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimJob => "claim_job",
            Self::ApproveAssignment => "approve_assignment",
            Self::DeclineAssignment => "decline_assignment",
            Self::MarkCompleted => "mark_completed",
            Self::ApproveCompletion => "approve_completion",
            Self::RecordPayment => "record_payment",
            Self::RaiseDispute => "raise_dispute",
            Self::ResolveDispute(DisputeResolution::Approve) => "resolve_dispute_approve",
            Self::ResolveDispute(DisputeResolution::Cancel) => "resolve_dispute_cancel",
            Self::CancelJob => "cancel_job",
            Self::AcceptQuotation => "accept_quotation",
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which participant relationship the acting profile must have with the job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "profile_id", rename_all = "snake_case")]
pub enum PartyMatch {
    Anyone,
    Owner(ProfileId),
    NotOwner(ProfileId),
    AssignedWorker(ProfileId),
    OwnerOrAssignedWorker(ProfileId),
}

impl PartyMatch {
    pub fn matches(&self, job: &Job) -> bool {
        match self {
            Self::Anyone => true,
            Self::Owner(id) => &job.provider_id == id,
            Self::NotOwner(id) => &job.provider_id != id,
            Self::AssignedWorker(id) => job.worker_id.as_ref() == Some(id),
            Self::OwnerOrAssignedWorker(id) => {
                &job.provider_id == id || job.worker_id.as_ref() == Some(id)
            }
        }
    }
}

/// Precondition carried by a conditional job update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCondition {
    pub statuses: Vec<JobStatus>,
    pub party: PartyMatch,
    pub require_unassigned: bool,
}

impl JobCondition {
    pub fn matches(&self, job: &Job) -> bool {
        self.statuses.contains(&job.status)
            && self.party.matches(job)
            && (!self.require_unassigned || job.worker_id.is_none())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "profile_id", rename_all = "snake_case")]
pub enum WorkerWrite {
    Keep,
    Assign(ProfileId),
    Clear,
}

/// The exact field set a transition writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobWrite {
    pub status: JobStatus,
    pub worker: WorkerWrite,
}

impl JobWrite {
    pub fn apply_to(&self, job: &mut Job) {
        job.status = self.status;
        match &self.worker {
            WorkerWrite::Keep => {}
            WorkerWrite::Assign(id) => job.worker_id = Some(id.clone()),
            WorkerWrite::Clear => job.worker_id = None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub action: JobAction,
    pub condition: JobCondition,
    pub write: JobWrite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub job_id: JobId,
    pub action: JobAction,
    pub from: JobStatus,
    pub to: JobStatus,
}
