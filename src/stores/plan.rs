//! The user's training calendar, kept sorted by day and time of day.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{RemoteRequestError, RemoteResult};
use crate::identity::IdentityContext;
use crate::models::plan::sort_sessions;
use crate::models::{NewPlannedSession, PlannedSession, PlannedSessionExercise};
use crate::remote::{Filter, Order, RemoteCollection};
use crate::{log_debug, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanState {
    /// User whose calendar `sessions` holds.
    pub owner: Option<Uuid>,
    /// Sorted by [`PlannedSession::sort_key`].
    pub sessions: Vec<PlannedSession>,
    pub error_message: Option<String>,
}

pub struct PlanStore {
    sessions: RemoteCollection<PlannedSession>,
    entries: RemoteCollection<PlannedSessionExercise>,
    identity: Arc<IdentityContext>,
    state: watch::Sender<PlanState>,
}

impl PlanStore {
    pub fn new(
        sessions: RemoteCollection<PlannedSession>,
        entries: RemoteCollection<PlannedSessionExercise>,
        identity: Arc<IdentityContext>,
    ) -> Self {
        let (state, _) = watch::channel(PlanState::default());
        Self {
            sessions,
            entries,
            identity,
            state,
        }
    }

    pub fn snapshot(&self) -> PlanState {
        self.sync_owner();
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlanState> {
        self.sync_owner();
        self.state.subscribe()
    }

    pub async fn load(&self, user_id: Uuid) -> RemoteResult<()> {
        let mut sessions = match self
            .sessions
            .list(Filter::new().eq("user_id", user_id.to_string()), None)
            .await
        {
            Ok(sessions) => sessions,
            Err(err) => return Err(self.record_failure(err)),
        };
        sort_sessions(&mut sessions);

        log_debug!("Loaded {} planned sessions", sessions.len());
        self.sync_owner();
        self.state.send_if_modified(|state| {
            if state.owner != Some(user_id) {
                return false;
            }
            state.sessions = sessions;
            state.error_message = None;
            true
        });
        Ok(())
    }

    pub async fn exercises_for(&self, session_id: Uuid) -> RemoteResult<Vec<PlannedSessionExercise>> {
        self.entries
            .list(
                Filter::new().eq("sesion_id", session_id.to_string()),
                Some(Order::asc("orden")),
            )
            .await
            .map_err(|err| self.record_failure(err))
    }

    pub async fn schedule(&self, session: &NewPlannedSession) -> RemoteResult<PlannedSession> {
        let created = self
            .sessions
            .insert(session)
            .await
            .map_err(|err| self.record_failure(err))?;

        let inserted = created.clone();
        self.sync_owner();
        self.state.send_if_modified(|state| {
            if state.owner != Some(inserted.user_id) {
                return false;
            }
            state.sessions.push(inserted);
            sort_sessions(&mut state.sessions);
            state.error_message = None;
            true
        });
        Ok(created)
    }

    /// Deleting a session also drops its exercise entries on the backend.
    pub async fn remove(&self, session_id: Uuid) -> RemoteResult<()> {
        self.sessions
            .delete(Filter::new().eq("id", session_id.to_string()))
            .await
            .map_err(|err| self.record_failure(err))?;

        self.state.send_modify(|state| {
            state.sessions.retain(|session| session.id != session_id);
            state.error_message = None;
        });
        Ok(())
    }

    /// Drops a calendar that was loaded for a different user.
    fn sync_owner(&self) {
        let user = self.identity.current_user();
        self.state.send_if_modified(|state| {
            if state.owner == user {
                return false;
            }
            state.owner = user;
            state.sessions.clear();
            true
        });
    }

    fn record_failure(&self, err: RemoteRequestError) -> RemoteRequestError {
        log_warn!("Plan request failed: {err}");
        let message = err.to_string();
        self.state
            .send_modify(|state| state.error_message = Some(message));
        err
    }
}
