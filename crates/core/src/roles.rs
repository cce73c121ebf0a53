use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{new_correlation_id, AuditCategory, AuditEvent, AuditOutcome};
use crate::context::MarketplaceContext;
use crate::domain::profile::Role;
use crate::errors::WorkflowError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSwitch {
    pub previous: Role,
    pub current: Role,
    pub changed: bool,
}

/// Keeps a profile from carrying history across roles: a worker who has
/// quoted stays a worker, a provider who has posted stays a provider.
#[derive(Clone)]
pub struct RoleGuard {
    context: MarketplaceContext,
}

impl RoleGuard {
    pub fn new(context: MarketplaceContext) -> Self {
        Self { context }
    }

    pub async fn switch_role(&self, target: Role) -> Result<RoleSwitch, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let profile = self
            .context
            .profiles
            .find_profile(&actor.id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("profile", actor.id.as_str()))?;

        if profile.role == target {
            self.context.session.set_role(target);
            return Ok(RoleSwitch { previous: profile.role, current: target, changed: false });
        }

        let blocked = match (profile.role, target) {
            (Role::Admin, _) | (_, Role::Admin) => {
                Some("admin roles are assigned by operators".to_owned())
            }
            (Role::Worker, Role::Provider) => {
                let quotations = self.context.quotations.count_by_worker(&actor.id).await?;
                (quotations > 0).then(|| {
                    format!(
                        "cannot switch to provider after submitting {quotations} quotation(s)"
                    )
                })
            }
            (Role::Provider, Role::Worker) => {
                let jobs = self.context.jobs.count_jobs_by_provider(&actor.id).await?;
                (jobs > 0).then(|| format!("cannot switch to worker after posting {jobs} job(s)"))
            }
            _ => None,
        };

        if let Some(reason) = blocked {
            warn!(
                event_name = "role.switch_blocked",
                profile_id = %actor.id,
                from = %profile.role,
                to = %target,
                reason = %reason,
                "role switch blocked"
            );
            self.audit(&actor.id.0, profile.role, target, AuditOutcome::Rejected, Some(&reason));
            return Err(WorkflowError::GuardViolation { reason });
        }

        let updated = self
            .context
            .profiles
            .update_role_if(&actor.id, profile.role, target, Utc::now())
            .await?
            .ok_or_else(|| {
                WorkflowError::claim_conflict("Your role changed in another session. Retry.")
            })?;

        self.context.session.set_role(updated.role);
        info!(
            event_name = "role.switched",
            profile_id = %actor.id,
            from = %profile.role,
            to = %updated.role,
            "role switched"
        );
        self.audit(&actor.id.0, profile.role, updated.role, AuditOutcome::Success, None);

        Ok(RoleSwitch { previous: profile.role, current: updated.role, changed: true })
    }

    fn audit(
        &self,
        actor: &str,
        from: Role,
        to: Role,
        outcome: AuditOutcome,
        reason: Option<&str>,
    ) {
        let mut event = AuditEvent::new(
            None,
            new_correlation_id(),
            "role.switch",
            AuditCategory::Role,
            actor,
            outcome,
        )
        .with_metadata("from", from.as_str())
        .with_metadata("to", to.as_str());
        if let Some(reason) = reason {
            event = event.with_metadata("reason", reason);
        }
        self.context.audit.emit(event);
    }
}
