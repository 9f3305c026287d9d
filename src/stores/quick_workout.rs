//! Quick-workout catalog and the start/finish lifecycle of a timed session.

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{RemoteRequestError, RemoteResult};
use crate::identity::IdentityContext;
use crate::models::{
    FinishQuickWorkout, NewQuickWorkoutSession, QuickWorkoutSession, QuickWorkoutType,
};
use crate::remote::{Filter, Order, RemoteCollection};
use crate::{log_debug, log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// A session started by this store and not yet finished.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveWorkout {
    pub session: QuickWorkoutSession,
    anchor: Instant,
}

impl ActiveWorkout {
    fn new(session: QuickWorkoutSession) -> Self {
        Self {
            session,
            anchor: Instant::now(),
        }
    }

    /// Whole seconds since the start call returned, from a monotonic clock.
    pub fn elapsed_seconds(&self) -> i64 {
        i64::try_from(self.anchor.elapsed().as_secs()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuickWorkoutState {
    pub types: Vec<QuickWorkoutType>,
    pub active: Option<ActiveWorkout>,
    pub error_message: Option<String>,
}

pub struct QuickWorkoutStore {
    types: RemoteCollection<QuickWorkoutType>,
    sessions: RemoteCollection<QuickWorkoutSession>,
    identity: Arc<IdentityContext>,
    state: watch::Sender<QuickWorkoutState>,
}

impl QuickWorkoutStore {
    pub fn new(
        types: RemoteCollection<QuickWorkoutType>,
        sessions: RemoteCollection<QuickWorkoutSession>,
        identity: Arc<IdentityContext>,
    ) -> Self {
        let (state, _) = watch::channel(QuickWorkoutState::default());
        Self {
            types,
            sessions,
            identity,
            state,
        }
    }

    pub fn snapshot(&self) -> QuickWorkoutState {
        self.sync_owner();
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QuickWorkoutState> {
        self.sync_owner();
        self.state.subscribe()
    }

    pub fn active(&self) -> Option<ActiveWorkout> {
        self.sync_owner();
        self.state.borrow().active.clone()
    }

    /// Replaces the catalog wholesale. A failure keeps the previous list.
    pub async fn load_types(&self) -> RemoteResult<()> {
        let types = match self
            .types
            .list(Filter::new(), Some(Order::asc("orden")))
            .await
        {
            Ok(types) => types,
            Err(err) => return Err(self.record_failure(err)),
        };

        log_debug!("Loaded {} quick workout types", types.len());
        self.state.send_modify(|state| {
            state.types = types;
            state.error_message = None;
        });
        Ok(())
    }

    /// Inserts a session row for `user_id` and keeps the server's copy, with
    /// its generated id and start time, as the active workout.
    pub async fn start_session(
        &self,
        workout: &QuickWorkoutType,
        user_id: Uuid,
    ) -> RemoteResult<QuickWorkoutSession> {
        let payload = NewQuickWorkoutSession {
            user_id,
            type_id: workout.id,
        };
        let session = match self.sessions.insert(&payload).await {
            Ok(session) => session,
            Err(err) => return Err(self.record_failure(err)),
        };

        log_info!("Started {} session {}", workout.slug, session.id);
        let active = ActiveWorkout::new(session.clone());
        let signed_in = self.identity.current_user();
        self.state.send_modify(|state| {
            // Only the signed-in user's timer is tracked.
            if signed_in == Some(active.session.user_id) {
                state.active = Some(active);
            }
            state.error_message = None;
        });
        Ok(session)
    }

    /// Writes the end time, duration and whichever metrics were measured.
    ///
    /// Finishing twice, or finishing a session another client started, is
    /// not guarded against: the last update wins.
    pub async fn finish_session(
        &self,
        session_id: Uuid,
        elapsed_seconds: i64,
        calories: Option<i32>,
        distance_meters: Option<f64>,
    ) -> RemoteResult<()> {
        let elapsed_seconds = elapsed_seconds.max(0);
        self.sync_owner();
        let started_at = self
            .state
            .borrow()
            .active
            .as_ref()
            .filter(|active| active.session.id == session_id)
            .map(|active| active.session.started_at);

        let patch = FinishQuickWorkout {
            ended_at: ended_at(started_at, elapsed_seconds),
            duration_seconds: elapsed_seconds,
            calories,
            distance_meters,
        };
        let key = Filter::new().eq("id", session_id.to_string());
        if let Err(err) = self.sessions.update(key, &patch).await {
            return Err(self.record_failure(err));
        }

        log_info!("Finished session {session_id} after {elapsed_seconds}s");
        self.state.send_modify(|state| {
            if state
                .active
                .as_ref()
                .is_some_and(|active| active.session.id == session_id)
            {
                state.active = None;
            }
            state.error_message = None;
        });
        Ok(())
    }

    /// The user's sessions, newest first.
    pub async fn history(&self, user_id: Uuid) -> RemoteResult<Vec<QuickWorkoutSession>> {
        self.sessions
            .list(
                Filter::new().eq("user_id", user_id.to_string()),
                Some(Order::desc("started_at")),
            )
            .await
            .map_err(|err| self.record_failure(err))
    }

    /// Forgets an active workout that belongs to someone no longer signed in.
    fn sync_owner(&self) {
        let user = self.identity.current_user();
        self.state.send_if_modified(|state| {
            let stale = state
                .active
                .as_ref()
                .is_some_and(|active| Some(active.session.user_id) != user);
            if stale {
                state.active = None;
            }
            stale
        });
    }

    fn record_failure(&self, err: RemoteRequestError) -> RemoteRequestError {
        log_warn!("Quick workout request failed: {err}");
        let message = err.to_string();
        self.state
            .send_modify(|state| state.error_message = Some(message));
        err
    }
}

/// Anchored on the server's start time when this store started the session,
/// so `ended_at - started_at` equals the reported duration. Otherwise the
/// wall clock.
fn ended_at(started_at: Option<DateTime<Utc>>, elapsed_seconds: i64) -> DateTime<Utc> {
    started_at
        .zip(TimeDelta::try_seconds(elapsed_seconds))
        .and_then(|(start, elapsed)| start.checked_add_signed(elapsed))
        .unwrap_or_else(Utc::now)
}
