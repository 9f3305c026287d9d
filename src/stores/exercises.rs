//! Exercise catalog by type plus the signed-in user's favorite set.
//!
//! Loads and toggles never block the UI: failures are written into
//! `error_message` and handed back as `Err` for the caller to ignore or show.
//! Overlapping toggles on the same exercise are not serialized.
//!
//! The favorite set belongs to one user. Whenever the shared identity names
//! someone else, the set is dropped before it is read or written.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{RemoteRequestError, RemoteResult};
use crate::identity::IdentityContext;
use crate::models::{Exercise, ExerciseType, FavoriteMark};
use crate::remote::{ConflictTarget, Filter, Order, RemoteCollection};
use crate::{log_debug, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseState {
    /// User whose favorites `favorite_ids` holds.
    pub owner: Option<Uuid>,
    pub exercises: HashMap<ExerciseType, Vec<Exercise>>,
    pub favorite_ids: HashSet<Uuid>,
    pub error_message: Option<String>,
}

pub struct ExerciseStore {
    exercises: RemoteCollection<Exercise>,
    favorites: RemoteCollection<FavoriteMark>,
    identity: Arc<IdentityContext>,
    state: watch::Sender<ExerciseState>,
}

impl ExerciseStore {
    pub fn new(
        exercises: RemoteCollection<Exercise>,
        favorites: RemoteCollection<FavoriteMark>,
        identity: Arc<IdentityContext>,
    ) -> Self {
        let (state, _) = watch::channel(ExerciseState::default());
        Self {
            exercises,
            favorites,
            identity,
            state,
        }
    }

    pub fn snapshot(&self) -> ExerciseState {
        self.sync_owner();
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExerciseState> {
        self.sync_owner();
        self.state.subscribe()
    }

    pub fn exercises_of(&self, kind: ExerciseType) -> Vec<Exercise> {
        self.state
            .borrow()
            .exercises
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Fetches one type ordered by name, then the whole favorite set.
    pub async fn load(&self, kind: ExerciseType) -> RemoteResult<()> {
        let filter = Filter::new().eq("tipo", kind.as_str());
        let list = match self.exercises.list(filter, Some(Order::asc("nombre"))).await {
            Ok(list) => list,
            Err(err) => return Err(self.record_failure(err)),
        };

        log_debug!("Loaded {} {} exercises", list.len(), kind);
        self.state.send_modify(|state| {
            state.exercises.insert(kind, list);
            state.error_message = None;
        });

        self.refresh_favorites().await
    }

    pub async fn refresh_favorites(&self) -> RemoteResult<()> {
        let user_id = self.require_user()?;
        let marks = match self
            .favorites
            .list(Filter::new().eq("user_id", user_id.to_string()), None)
            .await
        {
            Ok(marks) => marks,
            Err(err) => return Err(self.record_failure(err)),
        };

        let ids: HashSet<Uuid> = marks.into_iter().map(|mark| mark.exercise_id).collect();
        self.state.send_if_modified(|state| {
            // The user may have changed while the request was in flight.
            if state.owner != Some(user_id) {
                return false;
            }
            state.favorite_ids = ids;
            true
        });
        Ok(())
    }

    /// Flips membership remotely, then locally. Returns the new membership.
    /// On failure the local set is left as it was.
    pub async fn toggle_favorite(&self, exercise_id: Uuid) -> RemoteResult<bool> {
        let user_id = self.require_user()?;
        let was_favorite = self.is_favorite(exercise_id);

        let result = if was_favorite {
            let key = Filter::new()
                .eq("user_id", user_id.to_string())
                .eq("ejercicio_id", exercise_id.to_string());
            self.favorites.delete(key).await
        } else {
            let mark = FavoriteMark {
                user_id,
                exercise_id,
            };
            self.favorites
                .upsert(&mark, ConflictTarget::new(FavoriteMark::CONFLICT_COLUMNS))
                .await
        };

        if let Err(err) = result {
            return Err(self.record_failure(err));
        }

        self.state.send_if_modified(|state| {
            if state.owner != Some(user_id) {
                return false;
            }
            if was_favorite {
                state.favorite_ids.remove(&exercise_id);
            } else {
                state.favorite_ids.insert(exercise_id);
            }
            state.error_message = None;
            true
        });
        Ok(!was_favorite)
    }

    pub fn is_favorite(&self, exercise_id: Uuid) -> bool {
        self.sync_owner();
        self.state.borrow().favorite_ids.contains(&exercise_id)
    }

    /// Loaded exercises that are favorited, by name.
    pub fn favorites(&self) -> Vec<Exercise> {
        self.sync_owner();
        let state = self.state.borrow();
        let mut favorites: Vec<Exercise> = state
            .exercises
            .values()
            .flatten()
            .filter(|exercise| state.favorite_ids.contains(&exercise.id))
            .cloned()
            .collect();
        favorites.sort_by(|a, b| a.name.cmp(&b.name));
        favorites
    }

    /// Drops the favorite set when it was loaded for a different user.
    fn sync_owner(&self) {
        let user = self.identity.current_user();
        self.state.send_if_modified(|state| {
            if state.owner == user {
                return false;
            }
            state.owner = user;
            state.favorite_ids.clear();
            true
        });
    }

    fn require_user(&self) -> RemoteResult<Uuid> {
        self.sync_owner();
        self.identity.current_user().ok_or_else(|| {
            self.record_failure(RemoteRequestError::unauthorized(
                "sign in to manage favorites",
            ))
        })
    }

    fn record_failure(&self, err: RemoteRequestError) -> RemoteRequestError {
        log_warn!("Exercise store request failed: {err}");
        let message = err.to_string();
        self.state
            .send_modify(|state| state.error_message = Some(message));
        err
    }
}
