//! Public profiles and user technology listings.

use crate::{
    auth::{models::Identity, user_store::UserStore},
    db::{from_millis, Database},
    error::{AppError, AppResult},
    models::{Profile, SkillLevel, TagCategory, UserTechnology},
};
use rusqlite::params;

#[derive(Clone)]
pub struct ProfileStore {
    db: Database,
    users: UserStore,
}

impl ProfileStore {
    pub fn new(db: Database, users: UserStore) -> Self {
        Self { db, users }
    }

    pub fn identity_by_username(&self, username: &str) -> AppResult<Identity> {
        self.users
            .get_by_username(username)?
            .ok_or(AppError::NotFound("user"))
    }

    /// Technologies on a profile, primary ones first.
    pub fn technologies(&self, identity_id: &str) -> AppResult<Vec<UserTechnology>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT ut.id, t.name, t.slug, t.category, ut.skill_level, ut.years_experience,
                    ut.is_primary, ut.created_at
             FROM user_technologies ut JOIN tags t ON t.id = ut.technology_id
             WHERE ut.user_id = ?1
             ORDER BY ut.is_primary DESC, t.name ASC",
        )?;
        let technologies = stmt
            .query_map(params![identity_id], |row| {
                let category: String = row.get(3)?;
                let level: String = row.get(4)?;
                Ok(UserTechnology {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                    category: TagCategory::parse(&category).unwrap_or_default(),
                    skill_level: SkillLevel::parse(&level).unwrap_or_default(),
                    years_experience: row.get(5)?,
                    is_primary: row.get(6)?,
                    created_at: from_millis(row.get(7)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(technologies)
    }

    pub fn profile(&self, username: &str) -> AppResult<Profile> {
        let identity = self.identity_by_username(username)?;
        let technologies = self
            .technologies(&identity.id)?
            .into_iter()
            .map(|t| t.slug)
            .collect();
        let project_count: i64 = self.db.lock().query_row(
            "SELECT COUNT(*) FROM projects WHERE owner_id = ?1 AND is_public = 1",
            params![identity.id],
            |row| row.get(0),
        )?;

        Ok(Profile {
            id: identity.id,
            username: identity.username,
            first_name: identity.first_name,
            last_name: identity.last_name,
            bio: identity.bio,
            technologies,
            project_count,
        })
    }
}
