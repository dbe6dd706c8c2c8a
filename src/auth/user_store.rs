//! Identity Storage
//! Mission: Store and look up accounts; uniqueness is enforced by the schema

use crate::{
    auth::models::{AccountStatus, Identity},
    db::{from_millis, now_millis, Database},
    error::{is_unique_violation, AppError, AppResult},
    ids::{new_id, IdKind},
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

pub(crate) const IDENTITY_COLUMNS: &str = "id, email, username, first_name, last_name, bio, \
     password_hash, account_status, last_login_at, created_at";

pub(crate) fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    let status: String = row.get(7)?;
    let last_login: Option<i64> = row.get(8)?;
    Ok(Identity {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        bio: row.get(5)?,
        password_hash: row.get(6)?,
        // Anything unrecognised is treated as blocked.
        status: AccountStatus::parse(&status).unwrap_or(AccountStatus::Suspended),
        last_login_at: last_login.map(from_millis),
        created_at: from_millis(row.get(9)?),
    })
}

/// New account fields, already validated and hashed.
pub struct NewIdentity<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: String,
}

/// Account repository over the shared database.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new active identity. Duplicate email or username is a `Conflict`.
    pub fn create(&self, new: NewIdentity<'_>) -> AppResult<Identity> {
        let id = new_id(IdKind::User);
        let now = now_millis();

        let conn = self.db.lock();
        let inserted = conn.execute(
            "INSERT INTO users (id, email, username, first_name, last_name, password_hash,
                                account_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7, ?7)",
            params![
                id,
                new.email,
                new.username,
                new.first_name,
                new.last_name,
                new.password_hash,
                now
            ],
        );

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                let field = if e.to_string().contains("users.email") {
                    "email"
                } else {
                    "username"
                };
                return Err(AppError::Conflict(field));
            }
            return Err(e.into());
        }

        info!(user_id = %id, username = %new.username, "Created identity");

        find_by(&conn, "id", &id)?
            .ok_or_else(|| AppError::Internal("identity vanished after insert".into()))
    }

    pub fn get_by_id(&self, id: &str) -> AppResult<Option<Identity>> {
        find_by(&self.db.lock(), "id", id)
    }

    pub fn get_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        find_by(&self.db.lock(), "email", email)
    }

    pub fn get_by_username(&self, username: &str) -> AppResult<Option<Identity>> {
        find_by(&self.db.lock(), "username", username)
    }

    /// Record a successful login.
    pub fn touch_last_login(&self, id: &str) -> AppResult<()> {
        let now = now_millis();
        let changed = self.db.lock().execute(
            "UPDATE users SET last_login_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("user"));
        }
        Ok(())
    }

    /// Admin action: change account status.
    pub fn set_status(&self, id: &str, status: AccountStatus) -> AppResult<()> {
        let changed = self.db.lock().execute(
            "UPDATE users SET account_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_millis(), id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("user"));
        }
        info!(user_id = %id, status = status.as_str(), "Account status changed");
        Ok(())
    }
}

fn find_by(conn: &Connection, column: &str, value: &str) -> AppResult<Option<Identity>> {
    // `column` is always one of our own literals, never caller input.
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE {column} = ?1");
    let identity = conn
        .prepare_cached(&sql)?
        .query_row(params![value], identity_from_row)
        .optional()?;
    Ok(identity)
}
