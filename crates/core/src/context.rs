use std::sync::Arc;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::session::SessionContext;
use crate::store::{JobStore, ProfileStore, QuotationStore};

/// Everything a marketplace service needs: the three stores, the session and
/// an audit sink. Cheap to clone.
#[derive(Clone)]
pub struct MarketplaceContext {
    pub jobs: Arc<dyn JobStore>,
    pub quotations: Arc<dyn QuotationStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub session: SessionContext,
    pub audit: Arc<dyn AuditSink>,
}

impl MarketplaceContext {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        quotations: Arc<dyn QuotationStore>,
        profiles: Arc<dyn ProfileStore>,
        session: SessionContext,
    ) -> Self {
        Self { jobs, quotations, profiles, session, audit: Arc::new(TracingAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}
