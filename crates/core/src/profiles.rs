use chrono::Utc;
use tracing::info;

use crate::audit::{new_correlation_id, AuditCategory, AuditEvent, AuditOutcome};
use crate::context::MarketplaceContext;
use crate::domain::profile::Profile;
use crate::errors::{DomainError, StoreError, WorkflowError};

#[derive(Clone)]
pub struct ProfileService {
    context: MarketplaceContext,
}

impl ProfileService {
    pub fn new(context: MarketplaceContext) -> Self {
        Self { context }
    }

    pub async fn current(&self) -> Result<Profile, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        self.context
            .profiles
            .find_profile(&actor.id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("profile", actor.id.as_str()))
    }

    pub async fn rename(&self, username: &str) -> Result<Profile, WorkflowError> {
        let actor = self.context.session.require_actor()?;
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::MissingRequiredFields(vec!["username".to_owned()]).into());
        }

        let renamed = self.context.profiles.update_username(&actor.id, username, Utc::now()).await;
        let updated = match renamed {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err(WorkflowError::not_found("profile", actor.id.as_str())),
            Err(StoreError::UniqueViolation(_)) => {
                return Err(WorkflowError::UsernameTaken(username.to_owned()))
            }
            Err(source) => return Err(source.into()),
        };

        self.context.session.set_username(&updated.username);
        info!(
            event_name = "profile.renamed",
            profile_id = %actor.id,
            username = %updated.username,
            "username updated"
        );
        self.context.audit.emit(
            AuditEvent::new(
                None,
                new_correlation_id(),
                "profile.renamed",
                AuditCategory::Profile,
                actor.id.as_str(),
                AuditOutcome::Success,
            )
            .with_metadata("username", updated.username.clone()),
        );
        Ok(updated)
    }
}
