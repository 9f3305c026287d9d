#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use fitsocial::models::AuthSession;
use fitsocial::remote::{ConflictTarget, Filter, Order, Returning};
use fitsocial::{
    AppState, AuthBackend, AuthError, LocalBackend, RemoteRequestError, RemoteResult, TableBackend,
};
use serde_json::Value;
use uuid::Uuid;

pub const SQUAT: &str = "2c9d7e4a-1f3b-4a6c-8d5e-0a1b2c3d4e01";
pub const BENCH_PRESS: &str = "2c9d7e4a-1f3b-4a6c-8d5e-0a1b2c3d4e02";
pub const ROWING: &str = "2c9d7e4a-1f3b-4a6c-8d5e-0a1b2c3d4e05";

pub fn id(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap()
}

pub fn local_app() -> (AppState, Arc<LocalBackend>) {
    let backend = Arc::new(LocalBackend::in_memory().unwrap());
    (AppState::with_backend(backend.clone()), backend)
}

pub async fn signed_in_app() -> (AppState, Uuid) {
    let (app, _) = local_app();
    let outcome = app
        .session
        .sign_up("ana@example.com", "secret-pw", "RunnerAna")
        .await
        .unwrap();
    assert_eq!(outcome.profile_error, None);
    (app, outcome.user_id)
}

/// Local backend whose table calls can be made to fail on demand, and whose
/// sign-out always fails.
pub struct Flaky {
    pub inner: LocalBackend,
    pub failing: AtomicBool,
}

impl Flaky {
    pub fn new() -> Self {
        Self {
            inner: LocalBackend::in_memory().unwrap(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> RemoteResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteRequestError::network("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl TableBackend for Flaky {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>> {
        self.check()?;
        self.inner.select(table, filter, order).await
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: Returning,
    ) -> RemoteResult<Option<Value>> {
        self.check()?;
        self.inner.insert(table, row, returning).await
    }

    async fn update(&self, table: &str, key: &Filter, patch: Value) -> RemoteResult<()> {
        self.check()?;
        self.inner.update(table, key, patch).await
    }

    async fn delete(&self, table: &str, key: &Filter) -> RemoteResult<()> {
        self.check()?;
        self.inner.delete(table, key).await
    }

    async fn upsert(&self, table: &str, row: Value, conflict: &ConflictTarget) -> RemoteResult<()> {
        self.check()?;
        self.inner.upsert(table, row, conflict).await
    }
}

#[async_trait]
impl AuthBackend for Flaky {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.inner.sign_up(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Err(RemoteRequestError::network("offline").into())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        self.inner.current_session().await
    }
}
