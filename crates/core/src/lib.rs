pub mod audit;
pub mod config;
pub mod context;
pub mod domain;
pub mod enrich;
pub mod errors;
pub mod fees;
pub mod lifecycle;
pub mod profiles;
pub mod query;
pub mod quotations;
pub mod roles;
pub mod session;
pub mod store;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::AppConfig;
pub use context::MarketplaceContext;
pub use domain::job::{Job, JobId, JobStatus, NewJob};
pub use domain::profile::{Profile, ProfileId, Role};
pub use domain::quotation::{Quotation, QuotationDraft, QuotationId, QuotationStatus};
pub use enrich::{JobListing, QuotationListing, WorkerQuotation};
pub use errors::{ActionOutcome, DomainError, ErrorKind, StoreError, WorkflowError};
pub use fees::{FeeBreakdown, FeeSchedule};
pub use lifecycle::{JobCommand, JobLifecycle, JobLifecycleService};
pub use profiles::ProfileService;
pub use query::{JobBoard, JobFilters, JobQuery, JobView, SortKey};
pub use quotations::{AcceptanceReceipt, QuotationWorkflow};
pub use roles::{RoleGuard, RoleSwitch};
pub use session::{Actor, SessionContext};
pub use store::{AppendOutcome, FilterOptions, JobStore, ProfileStore, QuotationStore};
