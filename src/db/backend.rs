use std::{
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AuthError, RemoteRequestError, RemoteResult};
use crate::models::AuthSession;
use crate::remote::{AuthBackend, ConflictTarget, Filter, Order, Returning, TableBackend};

use super::{
    policy::PolicyError,
    repositories::{auth, auth::CredentialError, rows},
    Database,
};

/// bcrypt cost for on-disk databases.
const PASSWORD_HASH_COST: u32 = 10;
/// In-memory databases only live for tests and demos.
const EPHEMERAL_HASH_COST: u32 = 4;

/// Answers the table and auth contract from SQLite, emulating the hosted
/// service's row-level policies for whoever is signed in.
pub struct LocalBackend {
    db: Database,
    session: RwLock<Option<AuthSession>>,
    hash_cost: u32,
}

impl LocalBackend {
    pub fn open(path: PathBuf) -> Result<Self> {
        Ok(Self::with_database(Database::new(path)?, PASSWORD_HASH_COST))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::with_database(Database::in_memory()?, EPHEMERAL_HASH_COST))
    }

    fn with_database(db: Database, hash_cost: u32) -> Self {
        Self {
            db,
            session: RwLock::new(None),
            hash_cost,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Writes a row bypassing row-level policies, like a service-role key.
    /// Used to seed catalog tables.
    pub async fn service_insert(&self, table: &str, row: Value) -> RemoteResult<Value> {
        let table = table.to_string();
        self.db
            .execute(move |conn| rows::service_insert(conn, &table, row))
            .await
            .map_err(into_remote)
    }

    fn current_user(&self) -> Option<Uuid> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.user_id)
    }

    fn open_session(&self, user_id: Uuid, email: &str) -> AuthSession {
        let session = AuthSession {
            user_id,
            access_token: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        session
    }
}

fn into_remote(err: anyhow::Error) -> RemoteRequestError {
    match err.downcast_ref::<PolicyError>() {
        Some(policy) if policy.is_access_denied() => {
            RemoteRequestError::unauthorized(policy.to_string())
        }
        Some(policy) => RemoteRequestError::backend(policy.to_string()),
        None => RemoteRequestError::backend(format!("{err:#}")),
    }
}

#[async_trait]
impl TableBackend for LocalBackend {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>> {
        let user = self.current_user();
        let table = table.to_string();
        let filter = filter.clone();
        let order = order.cloned();
        self.db
            .execute(move |conn| rows::select_rows(conn, &table, &filter, order.as_ref(), user))
            .await
            .map_err(into_remote)
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: Returning,
    ) -> RemoteResult<Option<Value>> {
        let user = self.current_user();
        let table = table.to_string();
        let persisted = self
            .db
            .execute(move |conn| rows::insert_row(conn, &table, row, user))
            .await
            .map_err(into_remote)?;
        Ok(match returning {
            Returning::Representation => Some(persisted),
            Returning::Minimal => None,
        })
    }

    async fn update(&self, table: &str, key: &Filter, patch: Value) -> RemoteResult<()> {
        let user = self.current_user();
        let table = table.to_string();
        let key = key.clone();
        let changed = self
            .db
            .execute(move |conn| rows::update_rows(conn, &table, &key, patch, user))
            .await
            .map_err(into_remote)?;
        debug!("update touched {changed} row(s)");
        Ok(())
    }

    async fn delete(&self, table: &str, key: &Filter) -> RemoteResult<()> {
        let user = self.current_user();
        let table = table.to_string();
        let key = key.clone();
        let removed = self
            .db
            .execute(move |conn| rows::delete_rows(conn, &table, &key, user))
            .await
            .map_err(into_remote)?;
        debug!("delete removed {removed} row(s)");
        Ok(())
    }

    async fn upsert(&self, table: &str, row: Value, conflict: &ConflictTarget) -> RemoteResult<()> {
        conflict.validate()?;
        let user = self.current_user();
        let table = table.to_string();
        let conflict = conflict.clone();
        self.db
            .execute(move |conn| rows::upsert_row(conn, &table, row, &conflict, user))
            .await
            .map_err(into_remote)
    }
}

#[async_trait]
impl AuthBackend for LocalBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let (email_owned, password) = (email.to_string(), password.to_string());
        let user = self
            .db
            .execute(move |conn| auth::verify_user(conn, &email_owned, &password))
            .await
            .map_err(into_remote)?;

        match user {
            Some(user_id) => Ok(self.open_session(user_id, email)),
            None => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let (email_owned, password) = (email.to_string(), password.to_string());
        let cost = self.hash_cost;
        let created = self
            .db
            .execute(move |conn| auth::create_user(conn, &email_owned, &password, cost))
            .await;

        match created {
            Ok(user_id) => {
                info!("Registered local user {user_id}");
                Ok(self.open_session(user_id, email))
            }
            Err(err) if err.downcast_ref::<CredentialError>().is_some() => {
                Err(AuthError::AlreadyRegistered)
            }
            Err(err) => Err(into_remote(err).into()),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return Ok(None);
        };

        let user_id = session.user_id;
        let exists = self
            .db
            .execute(move |conn| auth::user_exists(conn, user_id))
            .await
            .map_err(into_remote)?;
        if exists {
            Ok(Some(session))
        } else {
            *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
            Err(AuthError::SessionExpired)
        }
    }
}
