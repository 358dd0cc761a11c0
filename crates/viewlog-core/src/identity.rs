use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ViewlogError;
use crate::traits::IdentityProvider;

/// A fixed identity, mostly useful in tests and one-shot commands.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Shared, mutable sign-in state for a running session.
///
/// Clones observe the same state, so signing out through one handle makes
/// every store holding another clone stop reading and writing records.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Arc<RwLock<Option<String>>>,
}

impl Session {
    /// A blank `user_id` starts the session signed out.
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user: Arc::new(RwLock::new(user_id.as_deref().and_then(normalize))),
        }
    }

    /// Sign in as the trimmed `user_id`. Blank ids are rejected and leave
    /// the current state alone.
    pub fn sign_in(&self, user_id: &str) -> Result<String, ViewlogError> {
        let user_id = normalize(user_id)
            .ok_or_else(|| ViewlogError::Config("user id must not be empty".into()))?;
        tracing::info!(user = %user_id, "Signed in");
        *self.write() = Some(user_id.clone());
        Ok(user_id)
    }

    pub fn sign_out(&self) {
        tracing::info!("Signed out");
        *self.write() = None;
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.user.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.user.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityProvider for Session {
    fn current_user_id(&self) -> Option<String> {
        self.read().clone()
    }
}

fn normalize(user_id: &str) -> Option<String> {
    let user_id = user_id.trim();
    (!user_id.is_empty()).then(|| user_id.to_owned())
}
