//! Generic row operations behind the table contract. Every identifier that
//! reaches SQL text has been checked against the policy list and the table's
//! own `PRAGMA table_info`.

use anyhow::{bail, Context, Result};
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::{
    helpers::{into_object, json_to_sql, sql_to_json},
    policy::{OwnerScope, PolicyError, TablePolicy},
};
use crate::remote::{ConflictTarget, Filter, Order};

struct Column {
    name: String,
    decl_type: String,
}

struct TableSchema {
    table: &'static str,
    columns: Vec<Column>,
}

impl TableSchema {
    fn load(conn: &Connection, policy: &TablePolicy) -> Result<Self> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", policy.table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(Column {
                    name: row.get(1)?,
                    decl_type: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            bail!(PolicyError::UnknownRelation(policy.table.to_string()));
        }

        Ok(Self {
            table: policy.table,
            columns,
        })
    }

    fn has(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    /// Returns the schema's own spelling of the column so SQL text never
    /// contains caller-provided strings.
    fn column(&self, name: &str) -> Result<&str> {
        match self.columns.iter().find(|column| column.name == name) {
            Some(column) => Ok(column.name.as_str()),
            None => bail!(PolicyError::UnknownColumn {
                table: self.table.to_string(),
                column: name.to_string(),
            }),
        }
    }

    fn decl_type(&self, name: &str) -> &str {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.decl_type.as_str())
            .unwrap_or("")
    }
}

struct WhereClause {
    sql: String,
    params: Vec<SqlValue>,
}

fn where_clause(schema: &TableSchema, filter: &Filter, scope: OwnerScope) -> Result<WhereClause> {
    let mut terms = Vec::new();
    let mut params = Vec::new();

    for (field, value) in filter.predicates() {
        let column = schema.column(field)?;
        if value.is_null() {
            terms.push(format!("{column} IS NULL"));
        } else {
            terms.push(format!("{column} = ?"));
            params.push(json_to_sql(value)?);
        }
    }

    match scope {
        OwnerScope::Unscoped => {}
        OwnerScope::Owner { column, user } => {
            terms.push(format!("{} = ?", schema.column(column)?));
            params.push(SqlValue::Text(user.to_string()));
        }
        OwnerScope::Parent {
            column,
            parent,
            parent_owner,
            user,
        } => {
            terms.push(format!(
                "{} IN (SELECT id FROM {parent} WHERE {parent_owner} = ?)",
                schema.column(column)?
            ));
            params.push(SqlValue::Text(user.to_string()));
        }
    }

    let sql = if terms.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", terms.join(" AND "))
    };
    Ok(WhereClause { sql, params })
}

fn query_rows(
    conn: &Connection,
    schema: &TableSchema,
    sql: &str,
    params: Vec<SqlValue>,
) -> Result<Vec<Value>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("failed to prepare statement on {}", schema.table))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (index, name) in names.iter().enumerate() {
            let value = sql_to_json(row.get_ref(index)?, schema.decl_type(name), name)?;
            object.insert(name.clone(), value);
        }
        out.push(Value::Object(object));
    }
    Ok(out)
}

/// Splits a payload into schema-checked column names and bound values.
fn columns_and_values(
    schema: &TableSchema,
    row: &Map<String, Value>,
) -> Result<(Vec<String>, Vec<SqlValue>)> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (field, value) in row {
        columns.push(schema.column(field)?.to_string());
        values.push(json_to_sql(value)?);
    }
    Ok((columns, values))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// For parent-owned tables, the referenced parent row must belong to the
/// caller. Other scopes are settled by [`TablePolicy::stamp_owner`].
fn check_parent(
    conn: &Connection,
    table: &str,
    row: &Map<String, Value>,
    scope: OwnerScope,
) -> Result<()> {
    let OwnerScope::Parent {
        column,
        parent,
        parent_owner,
        user,
    } = scope
    else {
        return Ok(());
    };
    let Some(parent_id) = row.get(column).and_then(Value::as_str) else {
        bail!(PolicyError::RowSecurity(table.to_string()));
    };

    let owned: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {parent} WHERE id = ?1 AND {parent_owner} = ?2"),
            params![parent_id, user.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if owned.is_none() {
        bail!(PolicyError::RowSecurity(table.to_string()));
    }
    Ok(())
}

/// Server-side defaults the hosted backend would assign.
fn assign_defaults(schema: &TableSchema, row: &mut Map<String, Value>) {
    if schema.has("id") && row.get("id").map_or(true, Value::is_null) {
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
}

pub fn select_rows(
    conn: &Connection,
    table: &str,
    filter: &Filter,
    order: Option<&Order>,
    user: Option<Uuid>,
) -> Result<Vec<Value>> {
    let policy = TablePolicy::lookup(table)?;
    let scope = policy.read_scope(user)?;
    let schema = TableSchema::load(conn, policy)?;
    let clause = where_clause(&schema, filter, scope)?;

    let mut sql = format!("SELECT * FROM {}{}", schema.table, clause.sql);
    if let Some(order) = order {
        let direction = if order.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY {} {direction}", schema.column(&order.field)?));
    }

    query_rows(conn, &schema, &sql, clause.params)
}

pub fn insert_row(
    conn: &Connection,
    table: &str,
    row: Value,
    user: Option<Uuid>,
) -> Result<Value> {
    let policy = TablePolicy::lookup(table)?;
    let mut row = into_object(row, table)?;
    policy.stamp_owner(&mut row, user)?;
    check_parent(conn, table, &row, policy.write_scope(user)?)?;
    let schema = TableSchema::load(conn, policy)?;
    assign_defaults(&schema, &mut row);

    let (columns, values) = columns_and_values(&schema, &row)?;
    if columns.is_empty() {
        bail!("insert into {table} has no columns");
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        schema.table,
        columns.join(", "),
        placeholders(values.len())
    );

    query_rows(conn, &schema, &sql, values)?
        .into_iter()
        .next()
        .with_context(|| format!("insert into {table} returned no row"))
}

pub fn upsert_row(
    conn: &Connection,
    table: &str,
    row: Value,
    conflict: &ConflictTarget,
    user: Option<Uuid>,
) -> Result<()> {
    let policy = TablePolicy::lookup(table)?;
    let mut row = into_object(row, table)?;
    policy.stamp_owner(&mut row, user)?;
    check_parent(conn, table, &row, policy.write_scope(user)?)?;
    let schema = TableSchema::load(conn, policy)?;
    assign_defaults(&schema, &mut row);

    let mut targets = Vec::with_capacity(conflict.columns().len());
    for column in conflict.columns() {
        if !row.contains_key(column) {
            bail!("upsert into {table} is missing conflict column {column}");
        }
        targets.push(schema.column(column)?.to_string());
    }

    let (columns, values) = columns_and_values(&schema, &row)?;
    let assignments: Vec<String> = columns
        .iter()
        .filter(|column| !targets.contains(*column) && column.as_str() != "id")
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();
    let action = if assignments.is_empty() {
        "NOTHING".to_string()
    } else {
        format!("UPDATE SET {}", assignments.join(", "))
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO {}",
        schema.table,
        columns.join(", "),
        placeholders(values.len()),
        targets.join(", "),
        action
    );
    conn.execute(&sql, params_from_iter(values.iter()))
        .with_context(|| format!("failed to upsert into {table}"))?;
    Ok(())
}

pub fn update_rows(
    conn: &Connection,
    table: &str,
    key: &Filter,
    patch: Value,
    user: Option<Uuid>,
) -> Result<usize> {
    let policy = TablePolicy::lookup(table)?;
    let scope = policy.write_scope(user)?;
    let patch = into_object(patch, table)?;
    if patch.is_empty() {
        bail!("update of {table} has no columns");
    }
    match scope {
        OwnerScope::Owner { column, user } => {
            if let Some(value) = patch.get(column) {
                if value.as_str() != Some(user.to_string().as_str()) {
                    bail!(PolicyError::RowSecurity(table.to_string()));
                }
            }
        }
        OwnerScope::Parent { column, .. } if patch.contains_key(column) => {
            check_parent(conn, table, &patch, scope)?;
        }
        _ => {}
    }

    let schema = TableSchema::load(conn, policy)?;
    let (columns, mut values) = columns_and_values(&schema, &patch)?;
    let clause = where_clause(&schema, key, scope)?;
    let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
    values.extend(clause.params);

    let sql = format!(
        "UPDATE {} SET {}{}",
        schema.table,
        assignments.join(", "),
        clause.sql
    );
    conn.execute(&sql, params_from_iter(values.iter()))
        .with_context(|| format!("failed to update {table}"))
}

pub fn delete_rows(
    conn: &Connection,
    table: &str,
    key: &Filter,
    user: Option<Uuid>,
) -> Result<usize> {
    let policy = TablePolicy::lookup(table)?;
    let scope = policy.write_scope(user)?;
    let schema = TableSchema::load(conn, policy)?;
    let clause = where_clause(&schema, key, scope)?;

    let sql = format!("DELETE FROM {}{}", schema.table, clause.sql);
    conn.execute(&sql, params_from_iter(clause.params.iter()))
        .with_context(|| format!("failed to delete from {table}"))
}

/// Insert that skips row-level checks, the way a service-role key would.
pub fn service_insert(conn: &Connection, table: &str, row: Value) -> Result<Value> {
    let policy = TablePolicy::lookup(table)?;
    let mut row = into_object(row, table)?;
    let schema = TableSchema::load(conn, policy)?;
    assign_defaults(&schema, &mut row);

    let (columns, values) = columns_and_values(&schema, &row)?;
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        schema.table,
        columns.join(", "),
        placeholders(values.len())
    );
    query_rows(conn, &schema, &sql, values)?
        .into_iter()
        .next()
        .with_context(|| format!("insert into {table} returned no row"))
}
