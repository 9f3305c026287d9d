use anyhow::{bail, Context, Result};
use rusqlite::Connection;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Applied in order; a database at `user_version = n` has run the first `n`.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "schema_v1.sql",
        sql: include_str!("schemas/schema_v1.sql"),
    },
    Migration {
        name: "schema_v2.sql",
        sql: include_str!("schemas/schema_v2.sql"),
    },
];

pub(crate) const CURRENT_SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Brings the schema to [`CURRENT_SCHEMA_VERSION`] inside one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let found: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;
    let applied = usize::try_from(found)
        .with_context(|| format!("invalid database version {found}"))?;
    let Some(pending) = MIGRATIONS.get(applied..) else {
        bail!("database version {found} is newer than supported schema {CURRENT_SCHEMA_VERSION}");
    };
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending {
        tx.execute_batch(migration.sql)
            .with_context(|| format!("failed to apply {}", migration.name))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit().context("failed to commit migrations")
}
