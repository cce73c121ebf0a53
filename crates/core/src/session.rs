use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::domain::profile::{Profile, ProfileId, Role};
use crate::errors::WorkflowError;

/// The authenticated principal a service call acts for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ProfileId,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SignedIn {
    profile_id: ProfileId,
    username: String,
    role: Role,
}

/// Process-wide session state. Role switches write through `set_role`
/// instead of re-fetching the whole session.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<SignedIn>>>,
}

impl SessionContext {
    pub fn signed_in(profile: &Profile) -> Self {
        let session = Self::default();
        session.sign_in(profile);
        session
    }

    pub fn sign_in(&self, profile: &Profile) {
        let next = SignedIn {
            profile_id: profile.id.clone(),
            username: profile.username.clone(),
            role: profile.role,
        };
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(next),
            Err(poisoned) => *poisoned.into_inner() = Some(next),
        }
    }

    pub fn sign_out(&self) {
        match self.inner.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn current_principal(&self) -> Option<ProfileId> {
        self.read(|state| state.profile_id.clone())
    }

    pub fn current_role(&self) -> Option<Role> {
        self.read(|state| state.role)
    }

    pub fn current_username(&self) -> Option<String> {
        self.read(|state| state.username.clone())
    }

    /// Returns false when nobody is signed in.
    pub fn set_role(&self, role: Role) -> bool {
        self.write(|state| state.role = role)
    }

    pub fn set_username(&self, username: &str) -> bool {
        self.write(|state| state.username = username.to_owned())
    }

    pub fn require_actor(&self) -> Result<Actor, WorkflowError> {
        self.read(|state| Actor { id: state.profile_id.clone(), role: state.role })
            .ok_or(WorkflowError::NotAuthenticated)
    }

    fn read<T>(&self, f: impl FnOnce(&SignedIn) -> T) -> Option<T> {
        match self.inner.read() {
            Ok(guard) => guard.as_ref().map(f),
            Err(poisoned) => poisoned.into_inner().as_ref().map(f),
        }
    }

    fn write(&self, f: impl FnOnce(&mut SignedIn)) -> bool {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }
}
