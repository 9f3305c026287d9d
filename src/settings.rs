use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

pub const URL_ENV: &str = "FITSOCIAL_URL";
pub const ANON_KEY_ENV: &str = "FITSOCIAL_ANON_KEY";
pub const LOCAL_DB_ENV: &str = "FITSOCIAL_LOCAL_DB";
pub const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum BackendMode {
    #[default]
    Rest,
    /// SQLite file speaking the same table contract; used for development.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    pub mode: BackendMode,
    pub url: String,
    pub anon_key: String,
    pub local_db_path: Option<PathBuf>,
    /// Where the REST backend keeps its signed-in session between runs.
    /// Derived from the settings location, never read from the file.
    #[serde(skip)]
    pub session_path: Option<PathBuf>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            mode: BackendMode::Rest,
            url: "http://localhost:54321".into(),
            anon_key: String::new(),
            local_db_path: None,
            session_path: None,
        }
    }
}

impl BackendSettings {
    /// Environment variables win over the file. Pointing at a local database
    /// switches the mode to [`BackendMode::Local`].
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(URL_ENV) {
            self.url = url;
        }
        if let Ok(key) = env::var(ANON_KEY_ENV) {
            self.anon_key = key;
        }
        if let Ok(path) = env::var(LOCAL_DB_ENV) {
            self.local_db_path = Some(PathBuf::from(path));
            self.mode = BackendMode::Local;
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    backend: BackendSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored backend settings with environment overrides applied and the
    /// session file placed next to the settings file.
    pub fn backend(&self) -> BackendSettings {
        BackendSettings {
            session_path: Some(self.session_path()),
            ..self.stored_backend().with_env_overrides()
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.path.with_file_name(SESSION_FILE_NAME)
    }

    pub fn stored_backend(&self) -> BackendSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .backend
            .clone()
    }

    pub fn update_backend(&self, settings: BackendSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.backend = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
