//! Sign-in / sign-up / sign-out transitions and the profile row created on
//! sign-up.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AuthError, RemoteRequestError};
use crate::identity::IdentityContext;
use crate::models::{NewProfile, Profile};
use crate::remote::{AuthBackend, RemoteCollection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated {
        user_id: Uuid,
    },
}

/// Result of a sign-up whose credential was created.
///
/// The profile insert runs after the credential exists and is not rolled
/// back. When it fails the session is still live and `profile_error` says
/// why; callers decide whether to retry the profile or let the user fix the
/// username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user_id: Uuid,
    pub profile_error: Option<RemoteRequestError>,
}

pub struct SessionStore {
    auth: Arc<dyn AuthBackend>,
    profiles: RemoteCollection<Profile>,
    identity: Arc<IdentityContext>,
    state: watch::Sender<AuthState>,
}

impl SessionStore {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        profiles: RemoteCollection<Profile>,
        identity: Arc<IdentityContext>,
    ) -> Self {
        let initial = match identity.current_user() {
            Some(user_id) => AuthState::Authenticated { user_id },
            None => AuthState::Unauthenticated,
        };
        let (state, _) = watch::channel(initial);
        Self {
            auth,
            profiles,
            identity,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Picks up a session the backend already holds.
    pub async fn restore(&self) -> Option<Uuid> {
        self.state.send_replace(AuthState::Authenticating);
        let user_id = self.identity.bootstrap(self.auth.as_ref()).await;
        self.publish(user_id);
        user_id
    }

    /// A rejected attempt republishes whoever was signed in before it, so a
    /// failed switch of accounts leaves the previous user `Authenticated`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Uuid, AuthError> {
        let email = validate_credentials(email, password)?;
        self.state.send_replace(AuthState::Authenticating);

        match self.auth.sign_in(&email, password).await {
            Ok(session) => {
                info!("Signed in user {}", session.user_id);
                self.identity.set_user(Some(session.user_id));
                self.publish(Some(session.user_id));
                Ok(session.user_id)
            }
            Err(err) => {
                self.publish(self.identity.current_user());
                Err(err)
            }
        }
    }

    /// Creates the credential, then the profile row. A rejected credential
    /// republishes the prior identity like [`SessionStore::sign_in`]. A
    /// failed profile insert does not undo the credential: the new user is
    /// signed in and the error comes back in [`SignUpOutcome::profile_error`].
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = validate_credentials(email, password)?;
        if username.trim().is_empty() {
            return Err(AuthError::InvalidInput("username is required".into()));
        }
        self.state.send_replace(AuthState::Authenticating);

        let session = match self.auth.sign_up(&email, password).await {
            Ok(session) => session,
            Err(err) => {
                self.publish(self.identity.current_user());
                return Err(err);
            }
        };

        let profile = NewProfile::new(session.user_id, username);
        let profile_error = match self.profiles.insert_silent(&profile).await {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    "Credential for {} created but profile insert failed: {err}",
                    session.user_id
                );
                Some(err)
            }
        };

        info!("Signed up user {} as {}", session.user_id, profile.username);
        self.identity.set_user(Some(session.user_id));
        self.publish(Some(session.user_id));

        Ok(SignUpOutcome {
            user_id: session.user_id,
            profile_error,
        })
    }

    /// Remote invalidation is best effort; the local identity is always
    /// cleared.
    pub async fn sign_out(&self) {
        if let Err(err) = self.auth.sign_out().await {
            warn!("Remote sign-out failed, clearing local session anyway: {err}");
        }
        self.identity.set_user(None);
        self.publish(None);
    }

    fn publish(&self, user_id: Option<Uuid>) {
        self.state.send_replace(match user_id {
            Some(user_id) => AuthState::Authenticated { user_id },
            None => AuthState::Unauthenticated,
        });
    }
}

/// Returns the trimmed email.
fn validate_credentials(email: &str, password: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidInput("a valid email is required".into()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".into()));
    }
    Ok(email.to_string())
}
