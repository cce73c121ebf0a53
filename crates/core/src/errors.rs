use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::job::JobId;
use crate::lifecycle::TransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),
    #[error("{field} must be a positive amount (got {value})")]
    InvalidAmount { field: &'static str, value: Decimal },
    #[error("unsupported sort key `{0}` (expected <column>_<asc|desc>)")]
    InvalidSortKey(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures reported by the backing data service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("uniqueness constraint violated: {0}")]
    UniqueViolation(String),
    #[error("data service unavailable: {0}")]
    Transport(String),
    #[error("could not decode stored record: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no authenticated user")]
    NotAuthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{message}")]
    ClaimConflict { message: String },
    #[error("a quotation for job {job_id} was already submitted by this worker")]
    AlreadyQuoted { job_id: JobId },
    #[error("action not allowed: {reason}")]
    GuardViolation { reason: String },
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error("{workflow} incomplete: done {completed:?}, pending {pending:?}: {reason}")]
    Incomplete {
        workflow: &'static str,
        completed: Vec<&'static str>,
        pending: Vec<&'static str>,
        reason: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn claim_conflict(message: impl Into<String>) -> Self {
        Self::ClaimConflict { message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Domain(_) | Self::UsernameTaken(_) => ErrorKind::Validation,
            Self::ClaimConflict { .. } => ErrorKind::ClaimConflict,
            Self::AlreadyQuoted { .. } => ErrorKind::AlreadyQuoted,
            Self::GuardViolation { .. } => ErrorKind::GuardViolation,
            Self::Incomplete { .. } => ErrorKind::Incomplete,
            Self::Store(StoreError::UniqueViolation(_)) => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Transport,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "You must be logged in to continue.".to_owned(),
            Self::Forbidden(_) => "You are not allowed to perform this action.".to_owned(),
            Self::NotFound { entity, .. } => format!("The requested {entity} no longer exists."),
            Self::Domain(error) => error.to_string(),
            Self::ClaimConflict { message } => message.clone(),
            Self::AlreadyQuoted { .. } => {
                "You have already submitted a quote for this job.".to_owned()
            }
            Self::GuardViolation { reason } => format!("Action not allowed: {reason}"),
            Self::UsernameTaken(_) => "The chosen username is already taken.".to_owned(),
            Self::Incomplete { pending, .. } => format!(
                "The operation was only partially applied ({} still pending). Retry to finish it.",
                pending.join(", ")
            ),
            Self::Store(StoreError::UniqueViolation(_)) => {
                "A conflicting record already exists.".to_owned()
            }
            Self::Store(_) => {
                "The data service is temporarily unavailable. Please retry shortly.".to_owned()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotAuthenticated,
    Forbidden,
    NotFound,
    Validation,
    ClaimConflict,
    AlreadyQuoted,
    GuardViolation,
    Incomplete,
    Conflict,
    Transport,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Uniform result shape handed across the presentation boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl<T> ActionOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failed(error: &WorkflowError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ActionError { kind: error.kind(), message: error.user_message() }),
        }
    }
}

impl<T> From<Result<T, WorkflowError>> for ActionOutcome<T> {
    fn from(value: Result<T, WorkflowError>) -> Self {
        match value {
            Ok(data) => Self::ok(data),
            Err(error) => Self::failed(&error),
        }
    }
}
