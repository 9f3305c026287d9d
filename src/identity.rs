//! Who is signed in. Built once by [`crate::app::AppState`] and handed to
//! every store; only the session store changes it after bootstrap.

use log::{debug, info};
use tokio::sync::watch;
use uuid::Uuid;

use crate::remote::AuthBackend;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub user_id: Option<Uuid>,
    /// True while an existing session is being resolved.
    pub loading: bool,
}

pub struct IdentityContext {
    state: watch::Sender<IdentityState>,
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(IdentityState::default());
        Self { state }
    }

    pub fn current_user(&self) -> Option<Uuid> {
        self.state.borrow().user_id
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn snapshot(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    /// Resolves a session the backend already holds. Any failure counts as
    /// "logged out" and is never returned.
    pub async fn bootstrap(&self, auth: &dyn AuthBackend) -> Option<Uuid> {
        self.state.send_modify(|state| state.loading = true);

        let user_id = match auth.current_session().await {
            Ok(Some(session)) => {
                info!("Restored session for user {}", session.user_id);
                Some(session.user_id)
            }
            Ok(None) => None,
            Err(err) => {
                debug!("Session bootstrap failed, continuing signed out: {err}");
                None
            }
        };

        self.state.send_replace(IdentityState {
            user_id,
            loading: false,
        });
        user_id
    }

    pub(crate) fn set_user(&self, user_id: Option<Uuid>) {
        self.state.send_modify(|state| {
            state.user_id = user_id;
            state.loading = false;
        });
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::AuthError;
    use crate::models::AuthSession;

    struct FixedSession(Result<Option<AuthSession>, AuthError>);

    #[async_trait]
    impl AuthBackend for FixedSession {
        async fn sign_in(&self, _: &str, _: &str) -> Result<AuthSession, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_up(&self, _: &str, _: &str) -> Result<AuthSession, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            Ok(())
        }

        async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn bootstrap_publishes_existing_user() {
        let user_id = Uuid::new_v4();
        let identity = IdentityContext::new();
        let mut updates = identity.subscribe();

        let backend = FixedSession(Ok(Some(AuthSession {
            user_id,
            access_token: "token".into(),
            email: None,
        })));
        assert_eq!(identity.bootstrap(&backend).await, Some(user_id));

        assert!(updates.has_changed().unwrap());
        assert_eq!(
            *updates.borrow_and_update(),
            IdentityState {
                user_id: Some(user_id),
                loading: false
            }
        );
    }

    #[tokio::test]
    async fn bootstrap_failure_means_signed_out() {
        let identity = IdentityContext::new();
        identity.set_user(Some(Uuid::new_v4()));

        let backend = FixedSession(Err(AuthError::SessionExpired));
        assert_eq!(identity.bootstrap(&backend).await, None);
        assert_eq!(identity.current_user(), None);
        assert!(!identity.is_loading());
    }
}
