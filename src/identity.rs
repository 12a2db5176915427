//! Identity collaborator boundary.
//!
//! The tracking core never owns authentication; it only needs to know which
//! user the current operation runs as. Embedders inject an implementor of
//! [`IdentityProvider`], typically backed by their auth session.

use std::sync::Arc;

pub trait IdentityProvider: Send + Sync {
    /// Id of the signed-in user, or `None` when nobody is signed in.
    fn current_user_id(&self) -> Option<String>;
}

/// Identity fixed at construction time. Used by embedders that resolve the
/// user once per process, and by tests.
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            user_id: Some(user_id.into()),
        })
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self { user_id: None })
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
