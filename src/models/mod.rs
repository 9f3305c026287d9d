pub mod exercise;
pub mod plan;
pub mod profile;
pub mod quick_workout;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

pub use exercise::{Exercise, ExerciseType, FavoriteMark};
pub use plan::{NewPlannedSession, PlannedSession, PlannedSessionExercise};
pub use profile::{NewProfile, Profile};
pub use quick_workout::{
    FinishQuickWorkout, NewQuickWorkoutSession, QuickWorkoutSession, QuickWorkoutType,
};

/// A row type backed by one table of the remote backend.
pub trait Entity: DeserializeOwned + Send + 'static {
    const TABLE: &'static str;
}

/// Session handed out by the auth endpoint. The user id is the tenant key for
/// every row-level secured table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub access_token: String,
    pub email: Option<String>,
}
