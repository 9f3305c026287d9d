use std::{marker::PhantomData, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{RemoteRequestError, RemoteResult};
use crate::models::Entity;

use super::{ConflictTarget, Filter, Order, Returning, TableBackend};

/// Typed view of one backend table. Every call is exactly one round trip.
pub struct RemoteCollection<E> {
    backend: Arc<dyn TableBackend>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for RemoteCollection<E> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> RemoteCollection<E> {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            backend,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        E::TABLE
    }

    pub async fn list(&self, filter: Filter, order: Option<Order>) -> RemoteResult<Vec<E>> {
        let rows = self
            .backend
            .select(E::TABLE, &filter, order.as_ref())
            .await?;
        rows.into_iter().map(decode::<E>).collect()
    }

    /// Inserts and returns the persisted row, including server defaults.
    pub async fn insert<P: Serialize>(&self, payload: &P) -> RemoteResult<E> {
        let row = encode(E::TABLE, payload)?;
        let persisted = self
            .backend
            .insert(E::TABLE, row, Returning::Representation)
            .await?
            .ok_or_else(|| {
                RemoteRequestError::decode(format!(
                    "insert into {} returned no representation",
                    E::TABLE
                ))
            })?;
        decode(persisted)
    }

    pub async fn insert_silent<P: Serialize>(&self, payload: &P) -> RemoteResult<()> {
        let row = encode(E::TABLE, payload)?;
        self.backend
            .insert(E::TABLE, row, Returning::Minimal)
            .await
            .map(|_| ())
    }

    pub async fn update<P: Serialize>(&self, key: Filter, patch: &P) -> RemoteResult<()> {
        require_key(E::TABLE, "update", &key)?;
        let patch = encode(E::TABLE, patch)?;
        self.backend.update(E::TABLE, &key, patch).await
    }

    pub async fn delete(&self, key: Filter) -> RemoteResult<()> {
        require_key(E::TABLE, "delete", &key)?;
        self.backend.delete(E::TABLE, &key).await
    }

    pub async fn upsert<P: Serialize>(
        &self,
        payload: &P,
        conflict: ConflictTarget,
    ) -> RemoteResult<()> {
        let row = encode(E::TABLE, payload)?;
        self.backend.upsert(E::TABLE, row, &conflict).await
    }
}

fn require_key(table: &str, op: &str, key: &Filter) -> RemoteResult<()> {
    if key.is_empty() {
        return Err(RemoteRequestError::backend(format!(
            "refusing to {op} every row of {table}: key predicate is empty"
        )));
    }
    Ok(())
}

fn encode<P: Serialize>(table: &str, payload: &P) -> RemoteResult<Value> {
    serde_json::to_value(payload).map_err(|err| {
        RemoteRequestError::decode(format!("failed to encode payload for {table}: {err}"))
    })
}

fn decode<E: Entity + DeserializeOwned>(row: Value) -> RemoteResult<E> {
    serde_json::from_value(row).map_err(|err| {
        RemoteRequestError::decode(format!("unexpected row shape in {}: {err}", E::TABLE))
    })
}
