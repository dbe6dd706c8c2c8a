//! Session Storage
//! Mission: Create, resolve and destroy opaque server-side sessions
//!
//! Expiry is enforced inside the lookup query itself (`expires_at > now`), so an expired
//! row is indistinguishable from a missing one and no reaper has to run for decisions to
//! be correct. Stale rows linger until `purge_expired` is called.

use crate::{
    auth::{
        models::{ClientMetadata, Identity, Session},
        user_store::{identity_from_row, IDENTITY_COLUMNS},
    },
    db::{from_millis, now_millis, Database},
    error::{AppError, AppResult},
    ids::{IdKind, TypedId},
};
use chrono::Duration;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

/// Session lifetimes: a normal login and a "remember me" login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub default_ttl: Duration,
    pub remember_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::hours(24),
            remember_ttl: Duration::days(30),
        }
    }
}

impl SessionPolicy {
    pub fn ttl(&self, remember: bool) -> Duration {
        if remember {
            self.remember_ttl
        } else {
            self.default_ttl
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    policy: SessionPolicy,
}

impl SessionStore {
    pub fn new(db: Database, policy: SessionPolicy) -> Self {
        Self { db, policy }
    }

    /// Persist a new session for `identity_id`. The id is freshly generated and never reused.
    pub fn create(
        &self,
        identity_id: &str,
        client: ClientMetadata,
        remember: bool,
    ) -> AppResult<Session> {
        let token = TypedId::generate(IdKind::Session);
        let created_at = now_millis();
        let expires_at = created_at + self.policy.ttl(remember).num_milliseconds();

        self.db.lock().execute(
            "INSERT INTO sessions (id, user_id, expires_at, ip_address, user_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.as_str(),
                identity_id,
                expires_at,
                client.ip_address,
                client.user_agent,
                created_at
            ],
        )?;

        debug!(session = %token.redacted(), user_id = %identity_id, remember, "Session created");

        Ok(Session {
            id: token.into_string(),
            user_id: identity_id.to_string(),
            expires_at: from_millis(expires_at),
            created_at: from_millis(created_at),
            client,
        })
    }

    /// Look up a live session. Expired and missing tokens both yield `None`.
    pub fn resolve(&self, token: &TypedId) -> AppResult<Option<Session>> {
        let conn = self.db.lock();
        let session = conn
            .prepare_cached(
                "SELECT id, user_id, expires_at, created_at, ip_address, user_agent
                 FROM sessions WHERE id = ?1 AND expires_at > ?2",
            )?
            .query_row(params![token.as_str(), now_millis()], |row| {
                Ok(Session {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: from_millis(row.get(2)?),
                    created_at: from_millis(row.get(3)?),
                    client: ClientMetadata {
                        ip_address: row.get(4)?,
                        user_agent: row.get(5)?,
                    },
                })
            })
            .optional()?;
        Ok(session)
    }

    /// Resolve a live session, then load the identity that owns it.
    pub fn session_owner(&self, token: &TypedId) -> AppResult<Option<Identity>> {
        let Some(session) = self.resolve(token)? else {
            return Ok(None);
        };
        let conn = self.db.lock();
        let identity = conn
            .prepare_cached(&format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = ?1"))?
            .query_row(params![session.user_id], identity_from_row)
            .optional()?;
        Ok(identity)
    }

    /// Delete a session (logout). Deleting a session that does not exist is an error.
    pub fn destroy(&self, token: &TypedId) -> AppResult<()> {
        let deleted = self
            .db
            .lock()
            .execute("DELETE FROM sessions WHERE id = ?1", params![token.as_str()])?;
        if deleted == 0 {
            return Err(AppError::NotFound("session"));
        }
        debug!(session = %token.redacted(), "Session destroyed");
        Ok(())
    }

    /// Remove rows whose expiry has passed. Returns how many were deleted.
    pub fn purge_expired(&self) -> AppResult<usize> {
        let purged = self.db.lock().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        if purged > 0 {
            info!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }

    /// Count rows for a token regardless of expiry.
    #[cfg(test)]
    fn row_exists(&self, token: &TypedId) -> AppResult<bool> {
        let count: i64 = self.db.lock().query_row(
            "SELECT COUNT(*) FROM sessions WHERE id = ?1",
            params![token.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
