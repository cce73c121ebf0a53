use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::profile::ProfileId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Posted,
    Submitted,
    Accepted,
    Completed,
    Approved,
    Paid,
    Disputed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Submitted => "submitted",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Disputed => "disputed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "posted" => Some(Self::Posted),
            "submitted" => Some(Self::Submitted),
            "accepted" => Some(Self::Accepted),
            "completed" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            "paid" => Some(Self::Paid),
            "disputed" => Some(Self::Disputed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub provider_id: ProfileId,
    pub worker_id: Option<ProfileId>,
    pub title: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub budget: Decimal,
    pub deadline_at: DateTime<Utc>,
    pub time_window: String,
    pub special_requirements: Option<String>,
    pub media_urls: Vec<String>,
    pub status: JobStatus,
    pub quoted_worker_ids: Vec<ProfileId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Builds the initial `posted` record for a validated posting.
    pub fn posted(
        id: JobId,
        provider_id: ProfileId,
        posting: NewJob,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        posting.validate()?;
        let time_window = time_window_label(posting.deadline_at, now);

        Ok(Self {
            id,
            provider_id,
            worker_id: None,
            title: posting.title.trim().to_owned(),
            category: posting.category.trim().to_owned(),
            description: posting.description.trim().to_owned(),
            location: posting.location.trim().to_owned(),
            budget: posting.budget,
            deadline_at: posting.deadline_at,
            time_window,
            special_requirements: posting
                .special_requirements
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            media_urls: posting.media_urls,
            status: JobStatus::Posted,
            quoted_worker_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_quote_from(&self, worker_id: &ProfileId) -> bool {
        self.quoted_worker_ids.iter().any(|id| id == worker_id)
    }

    pub fn is_open_for_quotes(&self) -> bool {
        self.status == JobStatus::Posted && self.worker_id.is_none()
    }

    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.status == JobStatus::Posted && self.worker_id.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "job {} is posted but has an assigned worker",
                self.id
            )));
        }
        if self.quoted_worker_ids.iter().any(|id| id == &self.provider_id) {
            return Err(DomainError::InvariantViolation(format!(
                "job {} lists its own provider as a quoting worker",
                self.id
            )));
        }
        Ok(())
    }
}

/// Provider input for a new job posting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub budget: Decimal,
    pub deadline_at: DateTime<Utc>,
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

impl NewJob {
    pub fn validate(&self) -> Result<(), DomainError> {
        let missing = [
            ("title", self.title.trim().is_empty()),
            ("category", self.category.trim().is_empty()),
            ("description", self.description.trim().is_empty()),
            ("location", self.location.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then(|| field.to_owned()))
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(DomainError::MissingRequiredFields(missing));
        }
        if self.budget <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount { field: "budget", value: self.budget });
        }
        Ok(())
    }
}

/// Human label describing how soon a job is due, relative to `now`.
pub fn time_window_label(deadline_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let millis = (deadline_at - now).num_milliseconds();
    let days = (millis as f64 / 86_400_000.0).ceil() as i64;

    match days {
        d if d < 1 => "Immediate (Today)".to_owned(),
        1 => "Within 24 Hours".to_owned(),
        d if d <= 7 => format!("Within {d} Days"),
        d if d <= 30 => format!("Within {} Weeks", (d as f64 / 7.0).round() as i64),
        _ => "Flexible (Long Term)".to_owned(),
    }
}
