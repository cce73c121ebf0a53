pub mod acceptance;
pub mod workflow;

pub use acceptance::{AcceptanceProgress, AcceptanceReceipt};
pub use workflow::QuotationWorkflow;
