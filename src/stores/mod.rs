//! Observable, session-scoped stores. Each owns a `watch` channel that UI code
//! subscribes to; every public operation is one awaited unit of work.

pub mod exercises;
pub mod plan;
pub mod profiles;
pub mod quick_workout;
pub mod session;

pub use exercises::{ExerciseState, ExerciseStore};
pub use plan::{PlanState, PlanStore};
pub use profiles::ProfileStore;
pub use quick_workout::{ActiveWorkout, QuickWorkoutState, QuickWorkoutStore};
pub use session::{AuthState, SessionStore, SignUpOutcome};
