//! Seam between the stores and whatever answers table and auth requests.
//!
//! [`TableBackend`] speaks raw JSON rows; [`RemoteCollection`] layers the typed
//! per-entity façade on top of it. [`rest::RestBackend`] talks to the hosted
//! service, `crate::db::LocalBackend` answers the same contract from SQLite.

pub mod collection;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AuthError, RemoteResult};
use crate::models::AuthSession;

pub use collection::RemoteCollection;
pub use query::{ConflictTarget, Filter, Order, Returning};
pub use rest::RestBackend;

#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>>;

    /// Returns the persisted row only for [`Returning::Representation`].
    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: Returning,
    ) -> RemoteResult<Option<Value>>;

    async fn update(&self, table: &str, key: &Filter, patch: Value) -> RemoteResult<()>;

    async fn delete(&self, table: &str, key: &Filter) -> RemoteResult<()>;

    async fn upsert(&self, table: &str, row: Value, conflict: &ConflictTarget) -> RemoteResult<()>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Resolves a session the backend already holds, if any.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError>;
}
