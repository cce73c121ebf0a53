pub mod engine;
pub mod service;
pub mod states;

pub use engine::{JobLifecycle, TransitionError};
pub use service::JobLifecycleService;
pub use states::{
    DisputeResolution, JobAction, JobCommand, JobCondition, JobWrite, PartyMatch,
    TransitionOutcome, TransitionPlan, WorkerWrite,
};
