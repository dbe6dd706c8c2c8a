//! Tag Repository
//! Mission: Read side of the tag catalogue (listing, trending, lookups, who uses what)

use crate::{
    db::{from_millis, Database},
    error::{AppError, AppResult},
    models::{Page, Pagination, SkillLevel, Tag, TagCategory},
};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

pub const TRENDING_DEFAULT: u32 = 10;
pub const TRENDING_MAX: u32 = 50;

const TAG_COLUMNS: &str =
    "t.id, t.name, t.slug, t.description, t.category, t.usage_count, t.created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSort {
    #[default]
    Popular,
    Alphabetical,
    Recent,
}

impl TagSort {
    fn order_by(self) -> &'static str {
        match self {
            TagSort::Popular => "t.usage_count DESC, t.name ASC",
            TagSort::Alphabetical => "t.name ASC",
            TagSort::Recent => "t.created_at DESC, t.id",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    pub search: Option<String>,
    pub category: Option<TagCategory>,
    pub sort: TagSort,
}

/// A user listed under a technology.
#[derive(Debug, Clone, Serialize)]
pub struct TechnologyUser {
    pub user_id: String,
    pub username: String,
    pub skill_level: SkillLevel,
    pub years_experience: Option<f64>,
    pub is_primary: bool,
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    let category: String = row.get(4)?;
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        category: TagCategory::parse(&category).unwrap_or_default(),
        usage_count: row.get(5)?,
        created_at: from_millis(row.get(6)?),
    })
}

/// `LIKE` pattern matching `needle` literally anywhere in the column.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct TagStore {
    db: Database,
}

impl TagStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn list(&self, query: &TagQuery, page: Pagination) -> AppResult<Page<Tag>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            clauses.push("t.name LIKE ? ESCAPE '\\'");
            args.push(Value::Text(contains_pattern(search)));
        }
        if let Some(category) = query.category {
            clauses.push("t.category = ?");
            args.push(Value::Text(category.as_str().to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.db.lock();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM tags t {where_sql}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        args.push(Value::Integer(page.limit.into()));
        args.push(Value::Integer(page.offset.into()));
        let mut stmt = conn.prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t {where_sql} ORDER BY {} LIMIT ? OFFSET ?",
            query.sort.order_by()
        ))?;
        let items = stmt
            .query_map(params_from_iter(args), tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Most used tags. Unused tags never trend.
    pub fn trending(&self, limit: Option<u32>) -> AppResult<Vec<Tag>> {
        let limit = limit.unwrap_or(TRENDING_DEFAULT).clamp(1, TRENDING_MAX);
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t WHERE t.usage_count > 0
             ORDER BY t.usage_count DESC, t.name ASC LIMIT ?1"
        ))?;
        let tags = stmt
            .query_map(params![limit], tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    pub fn get_by_slug(&self, slug: &str) -> AppResult<Tag> {
        let conn = self.db.lock();
        let tag = conn
            .prepare_cached(&format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.slug = ?1"))?
            .query_row(params![slug], tag_from_row)
            .optional()?;
        tag.ok_or(AppError::NotFound("tag"))
    }

    /// Users who list the technology, primary users first.
    pub fn users_with_technology(
        &self,
        slug: &str,
        page: Pagination,
    ) -> AppResult<Vec<TechnologyUser>> {
        let tag = self.get_by_slug(slug)?;
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT u.id, u.username, ut.skill_level, ut.years_experience, ut.is_primary
             FROM user_technologies ut JOIN users u ON u.id = ut.user_id
             WHERE ut.technology_id = ?1
             ORDER BY ut.is_primary DESC, u.username ASC
             LIMIT ?2 OFFSET ?3",
        )?;
        let users = stmt
            .query_map(params![tag.id, page.limit, page.offset], |row| {
                let level: String = row.get(2)?;
                Ok(TechnologyUser {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    skill_level: SkillLevel::parse(&level).unwrap_or_default(),
                    years_experience: row.get(3)?,
                    is_primary: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::now_millis,
        edges::{CounterPairing, EdgeMutator},
        models::TechnologyMetadata,
    };

    fn setup() -> (TagStore, EdgeMutator) {
        let db = Database::open(":memory:").unwrap();
        {
            let conn = db.lock();
            let now = now_millis();
            for (id, name) in [("usr_1", "ada"), ("usr_2", "bob")] {
                conn.execute(
                    "INSERT INTO users (id, email, username, password_hash, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 'x', ?4, ?4)",
                    params![id, format!("{name}@x.com"), name, now],
                )
                .unwrap();
            }
            conn.execute(
                "INSERT INTO projects (id, owner_id, name, created_at, updated_at)
                 VALUES ('proj_1', 'usr_1', 'p', ?1, ?1)",
                params![now],
            )
            .unwrap();
        }
        let edges = EdgeMutator::new(db.clone(), CounterPairing::BestEffort);
        (TagStore::new(db), edges)
    }

    #[test]
    fn test_list_search_and_sort() {
        let (tags, edges) = setup();
        edges
            .replace_project_tags("proj_1", &["Rust", "Go", "TypeScript"])
            .unwrap();
        edges
            .add_user_technology("usr_1", "Rust", &TechnologyMetadata::default())
            .unwrap();

        let popular = tags.list(&TagQuery::default(), Pagination::default()).unwrap();
        assert_eq!(popular.total, 3);
        assert_eq!(popular.items[0].slug, "rust");
        assert_eq!(popular.items[0].usage_count, 2);

        let alpha = tags
            .list(
                &TagQuery {
                    sort: TagSort::Alphabetical,
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        let names: Vec<_> = alpha.items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Go", "Rust", "TypeScript"]);

        let search = tags
            .list(
                &TagQuery {
                    search: Some("script".into()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(search.total, 1);

        let by_category = tags
            .list(
                &TagQuery {
                    category: Some(TagCategory::Database),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(by_category.total, 0);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let (tags, edges) = setup();
        edges.replace_project_tags("proj_1", &["Rust"]).unwrap();
        let result = tags
            .list(
                &TagQuery {
                    search: Some("%".into()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_trending_skips_unused() {
        let (tags, edges) = setup();
        edges.replace_project_tags("proj_1", &["Rust", "Go"]).unwrap();
        edges.replace_project_tags("proj_1", &["Rust"]).unwrap();

        let trending = tags.trending(Some(500)).unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].slug, "rust");
    }

    #[test]
    fn test_users_with_technology() {
        let (tags, edges) = setup();
        edges
            .add_user_technology("usr_1", "Rust", &TechnologyMetadata::default())
            .unwrap();
        edges
            .add_user_technology(
                "usr_2",
                "rust",
                &TechnologyMetadata {
                    is_primary: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let users = tags
            .users_with_technology("rust", Pagination::default())
            .unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "ada"]);
        assert!(matches!(
            tags.users_with_technology("cobol", Pagination::default()),
            Err(AppError::NotFound("tag"))
        ));
    }
}
