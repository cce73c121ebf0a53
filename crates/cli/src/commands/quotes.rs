use clap::{Subcommand, ValueEnum};
use rust_decimal::Decimal;

use thosejobs_core::domain::job::JobId;
use thosejobs_core::domain::quotation::{QuotationDraft, QuotationId, QuotationStatus};
use thosejobs_core::errors::{ActionOutcome, WorkflowError};
use thosejobs_core::fees::FeeSchedule;
use thosejobs_core::quotations::QuotationWorkflow;

use crate::commands::jobs::parse_amount;
use crate::commands::{load_config, run_action, CommandResult, GlobalArgs};

#[derive(Debug, Subcommand)]
pub enum QuotesCommand {
    #[command(about = "Submit a quotation on a posted job as the acting worker")]
    Submit {
        job_id: String,
        #[arg(long, value_parser = parse_amount)]
        amount: Decimal,
        #[arg(long)]
        timeline: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    #[command(about = "Accept a quotation, assigning its worker and rejecting the rest")]
    Accept { quotation_id: String },
    #[command(about = "Reject a pending quotation")]
    Reject { quotation_id: String },
    #[command(about = "List quotations on one of the acting provider's jobs")]
    List {
        job_id: String,
        #[arg(long, value_enum, default_value = "pending")]
        status: StatusArg,
    },
    #[command(about = "List the acting worker's own quotations")]
    Mine,
    #[command(about = "Show the platform fee and worker payout for a quote amount")]
    Fee {
        #[arg(value_parser = parse_amount)]
        amount: Decimal,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Accepted,
    Rejected,
    All,
}

impl StatusArg {
    fn as_filter(self) -> Option<QuotationStatus> {
        match self {
            Self::Pending => Some(QuotationStatus::Pending),
            Self::Accepted => Some(QuotationStatus::Accepted),
            Self::Rejected => Some(QuotationStatus::Rejected),
            Self::All => None,
        }
    }
}

pub fn run(global: &GlobalArgs, command: QuotesCommand) -> CommandResult {
    match command {
        QuotesCommand::Submit { job_id, amount, timeline, message } => {
            let draft = QuotationDraft { amount, proposed_timeline: timeline, message };
            run_action("quotes submit", global, |context, config| async move {
                let fees = fee_schedule(config.marketplace.platform_fee_percent)?;
                QuotationWorkflow::new(context, fees).submit(&JobId(job_id), draft).await
            })
        }
        QuotesCommand::Accept { quotation_id } => {
            run_action("quotes accept", global, |context, config| async move {
                let fees = fee_schedule(config.marketplace.platform_fee_percent)?;
                QuotationWorkflow::new(context, fees).accept(&QuotationId(quotation_id)).await
            })
        }
        QuotesCommand::Reject { quotation_id } => {
            run_action("quotes reject", global, |context, config| async move {
                let fees = fee_schedule(config.marketplace.platform_fee_percent)?;
                QuotationWorkflow::new(context, fees).reject(&QuotationId(quotation_id)).await
            })
        }
        QuotesCommand::List { job_id, status } => {
            run_action("quotes list", global, |context, config| async move {
                let fees = fee_schedule(config.marketplace.platform_fee_percent)?;
                QuotationWorkflow::new(context, fees)
                    .list_for_job(&JobId(job_id), status.as_filter())
                    .await
            })
        }
        QuotesCommand::Mine => run_action("quotes mine", global, |context, config| async move {
            let fees = fee_schedule(config.marketplace.platform_fee_percent)?;
            QuotationWorkflow::new(context, fees).list_mine().await
        }),
        QuotesCommand::Fee { amount } => fee(global, amount),
    }
}

/// Fee preview needs no database or session.
fn fee(global: &GlobalArgs, amount: Decimal) -> CommandResult {
    let config = match load_config("quotes fee", global) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let breakdown = fee_schedule(config.marketplace.platform_fee_percent)
        .and_then(|fees| fees.breakdown(amount).map_err(WorkflowError::from));
    CommandResult::action("quotes fee", ActionOutcome::from(breakdown))
}

fn fee_schedule(percent: Decimal) -> Result<FeeSchedule, WorkflowError> {
    Ok(FeeSchedule::new(percent)?)
}
