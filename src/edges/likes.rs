//! Like edges. One row per (user, project); liking twice is a no-op.

use super::{
    counters::{CounterDelta, CounterField, MutationOutcome},
    EdgeMutator,
};
use crate::{
    db::{from_millis, now_millis},
    error::{AppError, AppResult},
    ids::{new_id, IdKind},
    models::{Liker, Pagination},
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

fn project_exists(conn: &Connection, project_id: &str) -> AppResult<bool> {
    let found = conn
        .prepare_cached("SELECT 1 FROM projects WHERE id = ?1")?
        .query_row(params![project_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

impl EdgeMutator {
    /// Record a like. An existing like leaves both the row and the counter untouched.
    pub fn like(&self, identity_id: &str, project_id: &str) -> AppResult<MutationOutcome> {
        let outcome = self.engine.apply(|conn, pending| {
            if !project_exists(conn, project_id)? {
                return Err(AppError::NotFound("project"));
            }
            let inserted = conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO likes (id, user_id, project_id, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?
                .execute(params![
                    new_id(IdKind::Like),
                    identity_id,
                    project_id,
                    now_millis()
                ])?;
            if inserted == 0 {
                return Ok(false);
            }
            pending.push(CounterDelta::increment(CounterField::ProjectLikes, project_id));
            Ok(true)
        })?;

        if outcome.changed {
            info!(user_id = %identity_id, project_id = %project_id, "Project liked");
        }
        Ok(outcome)
    }

    /// Remove a like. Unliking something never liked is `NotFound`.
    pub fn unlike(&self, identity_id: &str, project_id: &str) -> AppResult<MutationOutcome> {
        let outcome = self.engine.apply(|conn, pending| {
            let deleted = conn
                .prepare_cached("DELETE FROM likes WHERE user_id = ?1 AND project_id = ?2")?
                .execute(params![identity_id, project_id])?;
            if deleted == 0 {
                return Err(AppError::NotFound("like"));
            }
            pending.push(CounterDelta::decrement(CounterField::ProjectLikes, project_id));
            Ok(true)
        })?;

        info!(user_id = %identity_id, project_id = %project_id, "Project unliked");
        Ok(outcome)
    }

    pub fn is_liked(&self, identity_id: &str, project_id: &str) -> AppResult<bool> {
        let conn = self.db().lock();
        let found = conn
            .prepare_cached("SELECT 1 FROM likes WHERE user_id = ?1 AND project_id = ?2")?
            .query_row(params![identity_id, project_id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Users who liked a project, newest first.
    pub fn likers(&self, project_id: &str, page: Pagination) -> AppResult<Vec<Liker>> {
        let conn = self.db().lock();
        let mut stmt = conn.prepare_cached(
            "SELECT u.id, u.username, l.created_at
             FROM likes l JOIN users u ON u.id = l.user_id
             WHERE l.project_id = ?1
             ORDER BY l.created_at DESC, l.id
             LIMIT ?2 OFFSET ?3",
        )?;
        let likers = stmt
            .query_map(params![project_id, page.limit, page.offset], |row| {
                Ok(Liker {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    liked_at: from_millis(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(likers)
    }
}
