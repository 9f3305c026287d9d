use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use uuid::Uuid;

use crate::db::LocalBackend;
use crate::identity::IdentityContext;
use crate::remote::{AuthBackend, RemoteCollection, RestBackend, TableBackend};
use crate::settings::{BackendMode, BackendSettings};
use crate::stores::{ExerciseStore, PlanStore, ProfileStore, QuickWorkoutStore, SessionStore};

/// Every store of one signed-in (or signed-out) client, sharing a single
/// identity and a single backend.
pub struct AppState {
    pub identity: Arc<IdentityContext>,
    pub session: SessionStore,
    pub exercises: ExerciseStore,
    pub quick_workouts: QuickWorkoutStore,
    pub plan: PlanStore,
    pub profiles: ProfileStore,
}

impl AppState {
    pub fn with_backend<B>(backend: Arc<B>) -> Self
    where
        B: TableBackend + AuthBackend + 'static,
    {
        let tables: Arc<dyn TableBackend> = backend.clone();
        let auth: Arc<dyn AuthBackend> = backend;
        Self::assemble(tables, auth)
    }

    pub fn from_settings(settings: &BackendSettings) -> Result<Self> {
        match settings.mode {
            BackendMode::Rest => {
                let backend = RestBackend::new(settings)
                    .context("Failed to configure REST backend")?;
                info!("Using REST backend at {}", backend.base_url());
                Ok(Self::with_backend(Arc::new(backend)))
            }
            BackendMode::Local => {
                let backend = match &settings.local_db_path {
                    Some(path) => {
                        info!("Using local backend at {}", path.display());
                        LocalBackend::open(path.clone())?
                    }
                    None => {
                        warn!("Local backend without a database path; data will not persist");
                        LocalBackend::in_memory()?
                    }
                };
                Ok(Self::with_backend(Arc::new(backend)))
            }
        }
    }

    fn assemble(tables: Arc<dyn TableBackend>, auth: Arc<dyn AuthBackend>) -> Self {
        let identity = Arc::new(IdentityContext::new());
        let session = SessionStore::new(
            auth,
            RemoteCollection::new(tables.clone()),
            identity.clone(),
        );
        let exercises = ExerciseStore::new(
            RemoteCollection::new(tables.clone()),
            RemoteCollection::new(tables.clone()),
            identity.clone(),
        );
        let quick_workouts = QuickWorkoutStore::new(
            RemoteCollection::new(tables.clone()),
            RemoteCollection::new(tables.clone()),
            identity.clone(),
        );
        let plan = PlanStore::new(
            RemoteCollection::new(tables.clone()),
            RemoteCollection::new(tables.clone()),
            identity.clone(),
        );
        let profiles = ProfileStore::new(RemoteCollection::new(tables), identity.clone());

        Self {
            identity,
            session,
            exercises,
            quick_workouts,
            plan,
            profiles,
        }
    }

    /// Resolves an existing backend session into the shared identity.
    pub async fn restore(&self) -> Option<Uuid> {
        self.session.restore().await
    }
}
