//! User registry. Roles feed identifier prefixes and admin checks.

use super::{Database, now_ms};
use crate::error::AppError;
use crate::types::{NewUser, Role, User};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        role: Role::parse(&role),
        created_at: row.get("created_at")?,
    })
}

/// Get a user using an existing connection (avoids deadlock).
pub(crate) fn get_user_internal(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, role, created_at FROM users WHERE id = ?1",
            params![user_id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

impl Database {
    /// Register a user.
    pub fn create_user(&self, input: NewUser) -> Result<User> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::missing_field("name").into());
        }
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, role, created_at) VALUES (?1, ?2, ?3)",
                params![name, input.role.as_str(), now],
            )?;
            let user = User {
                id: conn.last_insert_rowid(),
                name,
                role: input.role,
                created_at: now,
            };
            info!(user_id = user.id, role = user.role.as_str(), "Registered user");
            Ok(user)
        })
    }

    /// Get a user by id.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// List all users ordered by id.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, role, created_at FROM users ORDER BY id")?;
            let users = stmt
                .query_map([], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }
}
