//! Role-scoped job queries: base predicate per view, optional search and
//! exact-match filters, and a whitelisted sort key.

pub mod board;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobStatus};
use crate::domain::profile::ProfileId;
use crate::errors::DomainError;

pub use board::JobBoard;

pub const DEFAULT_SORT: &str = "created_at_desc";

/// Which base predicate a listing starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobView {
    /// Jobs the viewer posted.
    Provider,
    /// Posted, unclaimed jobs the viewer neither owns nor has quoted on.
    WorkerAvailable,
    /// Jobs assigned to the viewer.
    WorkerMyWork,
}

impl JobView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::WorkerAvailable => "worker_available",
            Self::WorkerMyWork => "worker_my_work",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "provider" | "posted" => Some(Self::Provider),
            "worker_available" | "available" => Some(Self::WorkerAvailable),
            "worker_my_work" | "my_work" => Some(Self::WorkerMyWork),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    CreatedAt,
    Budget,
    DeadlineAt,
    Title,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Budget => "budget",
            Self::DeadlineAt => "deadline_at",
            Self::Title => "title",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "budget" => Some(Self::Budget),
            "deadline_at" | "deadline" => Some(Self::DeadlineAt),
            "title" => Some(Self::Title),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortKey {
    /// Parses `{column}_{asc|desc}`, splitting at the last underscore.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidSortKey(raw.to_owned());
        let (column, direction) = raw.trim().rsplit_once('_').ok_or_else(invalid)?;

        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Err(invalid()),
        };
        let column = SortColumn::parse(column).ok_or_else(invalid)?;

        Ok(Self { column, direction })
    }

    pub fn as_string(&self) -> String {
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        format!("{}_{direction}", self.column.as_str())
    }

    /// Compares by the sort column, then by id ascending so equal keys have a
    /// stable order.
    pub fn compare(&self, left: &Job, right: &Job) -> Ordering {
        let primary = match self.column {
            SortColumn::CreatedAt => left.created_at.cmp(&right.created_at),
            SortColumn::Budget => left.budget.cmp(&right.budget),
            SortColumn::DeadlineAt => left.deadline_at.cmp(&right.deadline_at),
            SortColumn::Title => left.title.cmp(&right.title),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| left.id.cmp(&right.id))
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self { column: SortColumn::CreatedAt, direction: SortDirection::Desc }
    }
}

/// Raw user-supplied filter set, as it arrives from a form or a CLI flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilters {
    pub search: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

/// A validated query the stores can execute directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQuery {
    pub view: JobView,
    pub viewer: ProfileId,
    pub search: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub sort: SortKey,
}

impl JobQuery {
    pub fn new(
        view: JobView,
        viewer: ProfileId,
        filters: &JobFilters,
        default_sort: &str,
    ) -> Result<Self, DomainError> {
        let sort = match filters.sort.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => SortKey::parse(raw)?,
            None => SortKey::parse(default_sort)?,
        };

        Ok(Self {
            view,
            viewer,
            search: filters
                .search
                .as_deref()
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(str::to_owned),
            location: equality_filter(filters.location.as_deref()),
            category: equality_filter(filters.category.as_deref()),
            sort,
        })
    }

    pub fn matches(&self, job: &Job) -> bool {
        let base = match self.view {
            JobView::Provider => job.provider_id == self.viewer,
            JobView::WorkerAvailable => {
                job.status == JobStatus::Posted
                    && job.worker_id.is_none()
                    && job.provider_id != self.viewer
                    && !job.has_quote_from(&self.viewer)
            }
            JobView::WorkerMyWork => job.worker_id.as_ref() == Some(&self.viewer),
        };
        if !base {
            return false;
        }

        if let Some(term) = &self.search {
            if !contains_ignore_ascii_case(&job.title, term)
                && !contains_ignore_ascii_case(&job.category, term)
            {
                return false;
            }
        }
        if self.location.as_ref().is_some_and(|location| &job.location != location) {
            return false;
        }
        if self.category.as_ref().is_some_and(|category| &job.category != category) {
            return false;
        }
        true
    }

    pub fn sort_jobs(&self, jobs: &mut [Job]) {
        jobs.sort_by(|left, right| self.sort.compare(left, right));
    }
}

/// Folds ASCII letters only, the same way SQLite's `LIKE` does, so both
/// stores return the same rows for a non-ASCII search term.
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

/// Location and category only filter when a real value is supplied; the
/// literal string "null" is what an unset picker sends.
fn equality_filter(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("null"))
        .map(str::to_owned)
}
