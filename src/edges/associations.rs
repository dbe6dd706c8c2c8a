//! Tag associations: project tags and user technologies.
//!
//! Both kinds reference a tag looked up by normalized slug and created on first use. Every
//! association row counts once towards the tag's `usage_count`.

use super::{
    counters::{CounterDelta, CounterField, MutationOutcome, PendingDeltas},
    slug::{parse_labels, TagLabel},
    EdgeMutator,
};
use crate::{
    db::now_millis,
    error::{is_unique_violation, AppError, AppResult},
    ids::{new_id, IdKind},
    models::TechnologyMetadata,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

fn tag_id_by_slug(conn: &Connection, slug: &str) -> AppResult<Option<String>> {
    let id = conn
        .prepare_cached("SELECT id FROM tags WHERE slug = ?1")?
        .query_row(params![slug], |row| row.get(0))
        .optional()?;
    Ok(id)
}

/// Look up a tag by slug, creating it from `label` on a miss.
pub(crate) fn get_or_create_tag(conn: &Connection, label: &TagLabel) -> AppResult<String> {
    if let Some(id) = tag_id_by_slug(conn, &label.slug)? {
        return Ok(id);
    }
    insert_tag(conn, label)
}

/// Insert a tag for `label`.
///
/// A concurrent creator may have won the slug since our lookup; the unique index turns that
/// into a constraint error, after which the winner's id is returned.
fn insert_tag(conn: &Connection, label: &TagLabel) -> AppResult<String> {
    let id = new_id(IdKind::Tag);
    let now = now_millis();
    let inserted = conn
        .prepare_cached(
            "INSERT INTO tags (id, name, slug, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )?
        .execute(params![id, label.name, label.slug, now]);

    match inserted {
        Ok(_) => {
            debug!(tag_id = %id, slug = %label.slug, "Created tag");
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => {
            debug!(slug = %label.slug, "Tag created concurrently, retrying lookup");
            tag_id_by_slug(conn, &label.slug)?
                .ok_or_else(|| AppError::Internal(format!("tag {} vanished", label.slug)))
        }
        Err(e) => Err(e.into()),
    }
}

fn ensure_project(conn: &Connection, project_id: &str) -> AppResult<()> {
    conn.prepare_cached("SELECT 1 FROM projects WHERE id = ?1")?
        .query_row(params![project_id], |_| Ok(()))
        .optional()?
        .ok_or(AppError::NotFound("project"))
}

/// Insert one project-tag row. Returns whether a row was written.
fn link_project_tag(conn: &Connection, project_id: &str, tag_id: &str) -> AppResult<bool> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO project_tags (id, project_id, tag_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            new_id(IdKind::ProjectTag),
            project_id,
            tag_id,
            now_millis()
        ])?;
    Ok(inserted > 0)
}

/// Tag ids currently linked to a project.
pub(crate) fn project_tag_ids(conn: &Connection, project_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT tag_id FROM project_tags WHERE project_id = ?1")?;
    let ids = stmt
        .query_map(params![project_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Replace a project's links with `labels`, recording a delta for every row touched.
///
/// The old links go first. Under best-effort pairing that delete is already committed if a
/// later link fails, so its decrements are recorded before any link is attempted.
fn write_project_tags(
    conn: &Connection,
    project_id: &str,
    labels: &[TagLabel],
    pending: &mut PendingDeltas,
) -> AppResult<()> {
    let previous = project_tag_ids(conn, project_id)?;
    conn.prepare_cached("DELETE FROM project_tags WHERE project_id = ?1")?
        .execute(params![project_id])?;
    for tag_id in previous {
        pending.push(CounterDelta::decrement(CounterField::TagUsage, tag_id));
    }

    for label in labels {
        let tag_id = get_or_create_tag(conn, label)?;
        if link_project_tag(conn, project_id, &tag_id)? {
            pending.push(CounterDelta::increment(CounterField::TagUsage, tag_id));
        }
    }
    Ok(())
}

impl EdgeMutator {
    /// Tag a project. An existing (project, tag) pair is a no-op.
    pub fn add_project_tag(&self, project_id: &str, raw_label: &str) -> AppResult<MutationOutcome> {
        let label = TagLabel::parse(raw_label)?;
        self.engine.apply(|conn, pending| {
            ensure_project(conn, project_id)?;
            let tag_id = get_or_create_tag(conn, &label)?;
            if !link_project_tag(conn, project_id, &tag_id)? {
                return Ok(false);
            }
            debug!(project_id = %project_id, slug = %label.slug, "Project tagged");
            pending.push(CounterDelta::increment(CounterField::TagUsage, tag_id));
            Ok(true)
        })
    }

    /// Replace a project's whole tag set: drop every existing link, then add `raw_labels`.
    ///
    /// Labels are validated before anything is written. Labels that normalize to the same
    /// slug collapse into one link.
    pub fn replace_project_tags<S: AsRef<str>>(
        &self,
        project_id: &str,
        raw_labels: &[S],
    ) -> AppResult<MutationOutcome> {
        let labels = parse_labels(raw_labels)?;
        let outcome = self.write_project(project_id, Some(labels.as_slice()), |conn| {
            ensure_project(conn, project_id)
        })?;

        info!(project_id = %project_id, tags = labels.len(), "Project tags replaced");
        Ok(outcome)
    }

    /// Run a write on the project row itself, then optionally replace its tag set, as one
    /// counted mutation. Under transactional pairing the row write and the links commit or
    /// roll back together.
    pub(crate) fn write_project<F>(
        &self,
        project_id: &str,
        labels: Option<&[TagLabel]>,
        write: F,
    ) -> AppResult<MutationOutcome>
    where
        F: FnOnce(&Connection) -> AppResult<()>,
    {
        self.engine.apply(|conn, pending| {
            write(conn)?;
            if let Some(labels) = labels {
                write_project_tags(conn, project_id, labels, pending)?;
            }
            Ok(true)
        })
    }

    /// Delete a project, releasing the usage its tag links held. Likes and links cascade.
    pub fn delete_project(&self, project_id: &str) -> AppResult<MutationOutcome> {
        self.engine.apply(|conn, pending| {
            let tag_ids = project_tag_ids(conn, project_id)?;
            let deleted = conn
                .prepare_cached("DELETE FROM projects WHERE id = ?1")?
                .execute(params![project_id])?;
            if deleted == 0 {
                return Err(AppError::NotFound("project"));
            }
            for tag_id in tag_ids {
                pending.push(CounterDelta::decrement(CounterField::TagUsage, tag_id));
            }
            Ok(true)
        })
    }

    /// Add a technology to a user's profile. A duplicate is a `Conflict`.
    pub fn add_user_technology(
        &self,
        identity_id: &str,
        raw_label: &str,
        meta: &TechnologyMetadata,
    ) -> AppResult<MutationOutcome> {
        let label = TagLabel::parse(raw_label)?;
        validate_years(meta.years_experience)?;

        let outcome = self.engine.apply(|conn, pending| {
            let tag_id = get_or_create_tag(conn, &label)?;
            let now = now_millis();
            let inserted = conn
                .prepare_cached(
                    "INSERT INTO user_technologies
                        (id, user_id, technology_id, skill_level, years_experience, is_primary,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                )?
                .execute(params![
                    new_id(IdKind::UserTechnology),
                    identity_id,
                    tag_id,
                    meta.skill_level.unwrap_or_default().as_str(),
                    meta.years_experience,
                    meta.is_primary.unwrap_or(false),
                    now
                ]);
            match inserted {
                Ok(_) => {
                    pending.push(CounterDelta::increment(CounterField::TagUsage, tag_id));
                    Ok(true)
                }
                Err(e) if is_unique_violation(&e) => Err(AppError::Conflict("technology")),
                Err(e) => Err(e.into()),
            }
        })?;

        info!(user_id = %identity_id, slug = %label.slug, "Technology added to user");
        Ok(outcome)
    }

    /// Change the metadata on an existing user technology. Absent fields keep their value.
    pub fn update_user_technology(
        &self,
        identity_id: &str,
        slug: &str,
        meta: &TechnologyMetadata,
    ) -> AppResult<()> {
        validate_years(meta.years_experience)?;
        let conn = self.db().lock();
        let tag_id = tag_id_by_slug(&conn, slug)?.ok_or(AppError::NotFound("tag"))?;
        let updated = conn
            .prepare_cached(
                "UPDATE user_technologies SET
                    skill_level = COALESCE(?1, skill_level),
                    years_experience = COALESCE(?2, years_experience),
                    is_primary = COALESCE(?3, is_primary),
                    updated_at = ?4
                 WHERE user_id = ?5 AND technology_id = ?6",
            )?
            .execute(params![
                meta.skill_level.map(|s| s.as_str()),
                meta.years_experience,
                meta.is_primary,
                now_millis(),
                identity_id,
                tag_id
            ])?;
        if updated == 0 {
            return Err(AppError::NotFound("technology"));
        }
        info!(user_id = %identity_id, slug = %slug, "User technology updated");
        Ok(())
    }

    /// Remove a technology from a user's profile.
    pub fn remove_user_technology(&self, identity_id: &str, slug: &str) -> AppResult<MutationOutcome> {
        let outcome = self.engine.apply(|conn, pending| {
            let tag_id = tag_id_by_slug(conn, slug)?.ok_or(AppError::NotFound("tag"))?;
            let deleted = conn
                .prepare_cached(
                    "DELETE FROM user_technologies WHERE user_id = ?1 AND technology_id = ?2",
                )?
                .execute(params![identity_id, tag_id])?;
            if deleted == 0 {
                return Err(AppError::NotFound("technology"));
            }
            pending.push(CounterDelta::decrement(CounterField::TagUsage, tag_id));
            Ok(true)
        })?;

        info!(user_id = %identity_id, slug = %slug, "Technology removed from user");
        Ok(outcome)
    }
}

fn validate_years(years: Option<f64>) -> AppResult<()> {
    match years {
        Some(y) if !y.is_finite() || !(0.0..=100.0).contains(&y) => Err(AppError::validation(
            "years_experience must be between 0 and 100",
        )),
        _ => Ok(()),
    }
}
