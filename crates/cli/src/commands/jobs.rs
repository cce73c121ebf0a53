use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;

use thosejobs_core::domain::job::{JobId, NewJob};
use thosejobs_core::errors::WorkflowError;
use thosejobs_core::lifecycle::{DisputeResolution, JobCommand, JobLifecycleService};
use thosejobs_core::query::{JobBoard, JobFilters, JobView};
use thosejobs_core::store::FilterOptions;

use crate::commands::{run_action, CommandResult, GlobalArgs};

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    #[command(about = "Post a new job as the acting provider")]
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        location: String,
        #[arg(long, value_parser = parse_amount)]
        budget: Decimal,
        #[arg(long, value_parser = parse_deadline, help = "RFC 3339 timestamp or YYYY-MM-DD")]
        deadline: DateTime<Utc>,
        #[arg(long = "requirements")]
        special_requirements: Option<String>,
        #[arg(long = "media-url")]
        media_urls: Vec<String>,
    },
    #[command(about = "List jobs for a board view (defaults to the acting role's view)")]
    List {
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, help = "<created_at|budget|deadline_at|title>_<asc|desc>")]
        sort: Option<String>,
    },
    #[command(about = "Claim a posted job as the acting worker")]
    Claim { job_id: String },
    #[command(about = "Move a job through its lifecycle")]
    Transition {
        job_id: String,
        #[arg(value_enum)]
        action: TransitionArg,
    },
    #[command(about = "Filter values in use plus the configured categories for new posts")]
    Filters,
}

/// `categories` and `locations` come from stored jobs; `post_categories` is
/// the configured pick list offered when posting.
#[derive(Debug, Serialize)]
struct FilterChoices {
    #[serde(flatten)]
    in_use: FilterOptions,
    post_categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ViewArg {
    Provider,
    Available,
    MyWork,
}

impl From<ViewArg> for JobView {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Provider => Self::Provider,
            ViewArg::Available => Self::WorkerAvailable,
            ViewArg::MyWork => Self::WorkerMyWork,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TransitionArg {
    ApproveAssignment,
    DeclineAssignment,
    Complete,
    ApproveCompletion,
    RecordPayment,
    Dispute,
    ResolveApprove,
    ResolveCancel,
    Cancel,
}

impl TransitionArg {
    fn into_command(self, job_id: JobId) -> JobCommand {
        match self {
            Self::ApproveAssignment => JobCommand::ApproveAssignment { job_id },
            Self::DeclineAssignment => JobCommand::DeclineAssignment { job_id },
            Self::Complete => JobCommand::MarkCompleted { job_id },
            Self::ApproveCompletion => JobCommand::ApproveCompletion { job_id },
            Self::RecordPayment => JobCommand::RecordPayment { job_id },
            Self::Dispute => JobCommand::RaiseDispute { job_id },
            Self::ResolveApprove => {
                JobCommand::ResolveDispute { job_id, resolution: DisputeResolution::Approve }
            }
            Self::ResolveCancel => {
                JobCommand::ResolveDispute { job_id, resolution: DisputeResolution::Cancel }
            }
            Self::Cancel => JobCommand::CancelJob { job_id },
        }
    }
}

pub fn run(global: &GlobalArgs, command: JobsCommand) -> CommandResult {
    match command {
        JobsCommand::Post {
            title,
            category,
            description,
            location,
            budget,
            deadline,
            special_requirements,
            media_urls,
        } => {
            let posting = NewJob {
                title,
                category,
                description,
                location,
                budget,
                deadline_at: deadline,
                special_requirements,
                media_urls,
            };
            run_action("jobs post", global, |context, _| async move {
                JobLifecycleService::new(context).post_job(posting).await
            })
        }
        JobsCommand::List { view, search, location, category, sort } => {
            let filters = JobFilters { search, location, category, sort };
            run_action("jobs list", global, |context, config| async move {
                let view = match view {
                    Some(view) => JobView::from(view),
                    None => context
                        .session
                        .current_role()
                        .map(JobBoard::default_view)
                        .ok_or(WorkflowError::NotAuthenticated)?,
                };
                JobBoard::new(context)
                    .with_default_sort(config.marketplace.default_sort)
                    .list(view, &filters)
                    .await
            })
        }
        JobsCommand::Claim { job_id } => {
            let command = JobCommand::ClaimJob { job_id: JobId(job_id) };
            run_action("jobs claim", global, |context, _| async move {
                JobLifecycleService::new(context).apply(&command).await
            })
        }
        JobsCommand::Transition { job_id, action } => {
            let command = action.into_command(JobId(job_id));
            run_action("jobs transition", global, |context, _| async move {
                JobLifecycleService::new(context).apply(&command).await
            })
        }
        JobsCommand::Filters => run_action("jobs filters", global, |context, config| async move {
            let in_use = JobBoard::new(context)
                .with_default_sort(config.marketplace.default_sort)
                .filter_options()
                .await?;
            Ok(FilterChoices { in_use, post_categories: config.marketplace.categories })
        }),
    }
}

pub(crate) fn parse_amount(raw: &str) -> anyhow::Result<Decimal> {
    raw.trim().parse::<Decimal>().with_context(|| format!("`{raw}` is not a decimal amount"))
}

/// Accepts a full RFC 3339 timestamp or a bare date, which means the end of
/// that day in UTC.
fn parse_deadline(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("`{raw}` is neither RFC 3339 nor YYYY-MM-DD"))?;
    date.and_hms_opt(23, 59, 59)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("`{raw}` has no end-of-day timestamp"))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use rust_decimal::Decimal;

    use super::{parse_amount, parse_deadline};

    #[test]
    fn bare_dates_mean_end_of_day() {
        let deadline = parse_deadline("2026-03-14").expect("date parses");
        assert_eq!((deadline.year(), deadline.month(), deadline.day()), (2026, 3, 14));
        assert_eq!((deadline.hour(), deadline.minute()), (23, 59));
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        let deadline = parse_deadline("2026-03-14T10:00:00+02:00").expect("timestamp parses");
        assert_eq!(deadline.hour(), 8);
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(parse_deadline("next tuesday").is_err());
        assert!(parse_amount("twelve").is_err());
        assert_eq!(parse_amount(" 120.50 ").expect("amount"), Decimal::new(12050, 2));
    }
}
