//! Row-level access rules the local backend applies in place of the hosted
//! service's policies.

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable by anyone, never written by clients.
    Catalog,
    /// Rows belong to the user named in `column`.
    Owned {
        column: &'static str,
        public_read: bool,
    },
    /// Rows belong to whoever owns the parent row that `column` points at.
    OwnedByParent {
        column: &'static str,
        parent: &'static str,
        parent_owner: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TablePolicy {
    pub table: &'static str,
    pub access: Access,
}

pub const TABLE_POLICIES: &[TablePolicy] = &[
    TablePolicy {
        table: "perfil",
        access: Access::Owned {
            column: "id",
            public_read: true,
        },
    },
    TablePolicy {
        table: "ejercicios",
        access: Access::Catalog,
    },
    TablePolicy {
        table: "ejercicios_favoritos",
        access: Access::Owned {
            column: "user_id",
            public_read: false,
        },
    },
    TablePolicy {
        table: "entrenamientos_rapidos",
        access: Access::Catalog,
    },
    TablePolicy {
        table: "sesiones_entrenamiento_rapido",
        access: Access::Owned {
            column: "user_id",
            public_read: false,
        },
    },
    TablePolicy {
        table: "plan_sesiones",
        access: Access::Owned {
            column: "user_id",
            public_read: false,
        },
    },
    TablePolicy {
        table: "plan_sesion_ejercicios",
        access: Access::OwnedByParent {
            column: "sesion_id",
            parent: "plan_sesiones",
            parent_owner: "user_id",
        },
    },
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("relation \"{0}\" does not exist")]
    UnknownRelation(String),
    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    UnknownColumn { table: String, column: String },
    #[error("permission denied for table {0}")]
    PermissionDenied(String),
    #[error("new row violates row-level security policy for table \"{0}\"")]
    RowSecurity(String),
}

impl PolicyError {
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            PolicyError::PermissionDenied(_) | PolicyError::RowSecurity(_)
        )
    }
}

/// Extra predicate a statement must carry for the current caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerScope {
    Unscoped,
    /// `column = user`.
    Owner { column: &'static str, user: Uuid },
    /// `column IN (SELECT id FROM parent WHERE parent_owner = user)`.
    Parent {
        column: &'static str,
        parent: &'static str,
        parent_owner: &'static str,
        user: Uuid,
    },
}

impl TablePolicy {
    pub fn lookup(table: &str) -> Result<&'static TablePolicy, PolicyError> {
        TABLE_POLICIES
            .iter()
            .find(|policy| policy.table == table)
            .ok_or_else(|| PolicyError::UnknownRelation(table.to_string()))
    }

    pub fn read_scope(&self, user: Option<Uuid>) -> Result<OwnerScope, PolicyError> {
        match (self.access, user) {
            (Access::Catalog, _) => Ok(OwnerScope::Unscoped),
            (Access::Owned { public_read: true, .. }, _) => Ok(OwnerScope::Unscoped),
            (_, Some(user)) => Ok(self.owned_scope(user)),
            (_, None) => Err(self.denied()),
        }
    }

    pub fn write_scope(&self, user: Option<Uuid>) -> Result<OwnerScope, PolicyError> {
        match (self.access, user) {
            (Access::Catalog, _) | (_, None) => Err(self.denied()),
            (_, Some(user)) => Ok(self.owned_scope(user)),
        }
    }

    fn owned_scope(&self, user: Uuid) -> OwnerScope {
        match self.access {
            Access::Catalog => OwnerScope::Unscoped,
            Access::Owned { column, .. } => OwnerScope::Owner { column, user },
            Access::OwnedByParent {
                column,
                parent,
                parent_owner,
            } => OwnerScope::Parent {
                column,
                parent,
                parent_owner,
                user,
            },
        }
    }

    /// Fills a missing owner column with the caller and rejects rows that
    /// name somebody else.
    pub fn stamp_owner(
        &self,
        row: &mut Map<String, Value>,
        user: Option<Uuid>,
    ) -> Result<(), PolicyError> {
        let OwnerScope::Owner { column, user } = self.write_scope(user)? else {
            return Ok(());
        };
        let expected = user.to_string();
        match row.get(column) {
            None | Some(Value::Null) => {
                row.insert(column.to_string(), Value::String(expected));
                Ok(())
            }
            Some(Value::String(owner)) if owner.eq_ignore_ascii_case(&expected) => Ok(()),
            Some(_) => Err(PolicyError::RowSecurity(self.table.to_string())),
        }
    }

    fn denied(&self) -> PolicyError {
        PolicyError::PermissionDenied(self.table.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_reads_are_open_but_writes_are_denied() {
        let policy = TablePolicy::lookup("ejercicios").unwrap();
        assert_eq!(policy.read_scope(None), Ok(OwnerScope::Unscoped));
        assert!(policy.write_scope(Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn owned_tables_require_a_user() {
        let policy = TablePolicy::lookup("ejercicios_favoritos").unwrap();
        let err = policy.read_scope(None).unwrap_err();
        assert!(err.is_access_denied());

        let user = Uuid::new_v4();
        assert_eq!(
            policy.read_scope(Some(user)),
            Ok(OwnerScope::Owner {
                column: "user_id",
                user
            })
        );
    }

    #[test]
    fn profiles_are_publicly_readable() {
        let policy = TablePolicy::lookup("perfil").unwrap();
        assert_eq!(policy.read_scope(None), Ok(OwnerScope::Unscoped));
        assert!(policy.write_scope(None).is_err());
    }

    #[test]
    fn plan_entries_are_scoped_through_their_session() {
        let policy = TablePolicy::lookup("plan_sesion_ejercicios").unwrap();
        assert!(policy.read_scope(None).unwrap_err().is_access_denied());

        let user = Uuid::new_v4();
        assert_eq!(
            policy.write_scope(Some(user)),
            Ok(OwnerScope::Parent {
                column: "sesion_id",
                parent: "plan_sesiones",
                parent_owner: "user_id",
                user
            })
        );
    }

    #[test]
    fn stamp_owner_fills_or_rejects() {
        let policy = TablePolicy::lookup("plan_sesiones").unwrap();
        let user = Uuid::new_v4();

        let mut row = json!({ "fecha": "2026-10-19" }).as_object().unwrap().clone();
        policy.stamp_owner(&mut row, Some(user)).unwrap();
        assert_eq!(row["user_id"], json!(user.to_string()));

        let mut foreign = json!({ "user_id": Uuid::new_v4().to_string() })
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(
            policy.stamp_owner(&mut foreign, Some(user)),
            Err(PolicyError::RowSecurity("plan_sesiones".into()))
        );
    }

    #[test]
    fn unknown_tables_are_reported() {
        assert_eq!(
            TablePolicy::lookup("mensajes").unwrap_err(),
            PolicyError::UnknownRelation("mensajes".into())
        );
    }
}
