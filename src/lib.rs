//! Session-scoped data stores for the fitness client: identity, exercise
//! favorites, quick-workout timers, the training plan and profile search,
//! all talking to a hosted table/auth backend or a local SQLite stand-in.

pub mod app;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod remote;
pub mod settings;
pub mod stores;
pub mod utils;

use std::path::PathBuf;

use anyhow::Result;

pub use app::AppState;
pub use db::LocalBackend;
pub use error::{AuthError, RemoteErrorKind, RemoteRequestError, RemoteResult};
pub use identity::{IdentityContext, IdentityState};
pub use remote::{AuthBackend, RemoteCollection, RestBackend, TableBackend};
pub use settings::{BackendMode, BackendSettings, SettingsStore};
pub use stores::{AuthState, ExerciseStore, PlanStore, ProfileStore, QuickWorkoutStore, SessionStore};

/// Boots a client: logging, settings from `settings_path` (created on first
/// save), the configured backend, then any session the backend still holds.
pub async fn start(settings_path: PathBuf) -> Result<AppState> {
    utils::logging::init_logging(log::LevelFilter::Info);
    log::info!("FitSocial client starting up...");

    let settings = SettingsStore::new(settings_path)?;
    let state = AppState::from_settings(&settings.backend())?;

    match state.restore().await {
        Some(user_id) => log::info!("Resumed session for {user_id}"),
        None => log::info!("No existing session; starting signed out"),
    }
    Ok(state)
}
