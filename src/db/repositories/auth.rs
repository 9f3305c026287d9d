use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("user already registered")]
    AlreadyRegistered,
}

pub fn create_user(conn: &Connection, email: &str, password: &str, cost: u32) -> Result<Uuid> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM auth_users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(CredentialError::AlreadyRegistered.into());
    }

    let hash = bcrypt::hash(password, cost).context("failed to hash password")?;
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO auth_users (id, email, password_hash) VALUES (?1, ?2, ?3)",
        params![id.to_string(), email, hash],
    )
    .context("failed to insert auth user")?;

    Ok(id)
}

/// `None` when the email is unknown or the password does not match.
pub fn verify_user(conn: &Connection, email: &str, password: &str) -> Result<Option<Uuid>> {
    let record: Option<(String, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM auth_users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((id, hash)) = record else {
        return Ok(None);
    };
    if !bcrypt::verify(password, &hash).context("failed to verify password hash")? {
        return Ok(None);
    }

    let id = Uuid::parse_str(&id).with_context(|| format!("auth user has malformed id {id}"))?;
    Ok(Some(id))
}

pub fn user_exists(conn: &Connection, user_id: Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM auth_users WHERE id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn verifies_only_the_right_password() {
        let conn = conn();
        let id = create_user(&conn, "a@x.com", "pw-123", 4).unwrap();
        assert_eq!(verify_user(&conn, "a@x.com", "pw-123").unwrap(), Some(id));
        assert_eq!(verify_user(&conn, "A@X.com", "pw-123").unwrap(), Some(id));
        assert_eq!(verify_user(&conn, "a@x.com", "wrong").unwrap(), None);
        assert_eq!(verify_user(&conn, "b@x.com", "pw-123").unwrap(), None);
        assert!(user_exists(&conn, id).unwrap());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = conn();
        create_user(&conn, "a@x.com", "pw", 4).unwrap();
        let err = create_user(&conn, "A@x.com", "pw", 4).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CredentialError>(),
            Some(&CredentialError::AlreadyRegistered)
        );
    }
}
