use std::sync::Arc;

use thosejobs_core::context::MarketplaceContext;
use thosejobs_core::session::SessionContext;

use crate::repositories::{
    InMemoryJobRepository, InMemoryProfileRepository, InMemoryQuotationRepository,
    SqlJobRepository, SqlProfileRepository, SqlQuotationRepository,
};
use crate::DbPool;

/// Wires the SQLite repositories into a marketplace context.
pub fn sqlite_context(pool: DbPool, session: SessionContext) -> MarketplaceContext {
    tracing::debug!(event_name = "db.context.sqlite", "building SQLite-backed marketplace context");
    MarketplaceContext::new(
        Arc::new(SqlJobRepository::new(pool.clone())),
        Arc::new(SqlQuotationRepository::new(pool.clone())),
        Arc::new(SqlProfileRepository::new(pool)),
        session,
    )
}

pub fn in_memory_context(session: SessionContext) -> MarketplaceContext {
    MarketplaceContext::new(
        Arc::new(InMemoryJobRepository::default()),
        Arc::new(InMemoryQuotationRepository::default()),
        Arc::new(InMemoryProfileRepository::default()),
        session,
    )
}
