//! Project Repository
//! Mission: Project CRUD and the per-identity access patterns (owned, liked)
//!
//! Writes that touch edges (tags on create/update, deletion) go through the [`EdgeMutator`]
//! so tag usage stays in step. Mutations load the project first, so a missing project is
//! always `NotFound` before ownership is ever checked.

use crate::{
    auth::{models::Identity, policy::authorize_mutation},
    db::{from_millis, now_millis, Database},
    edges::{normalize_slug, slug::parse_labels, EdgeMutator},
    error::{AppError, AppResult},
    ids::{new_id, IdKind},
    models::{Page, Pagination, Project},
};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::info;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 2000;

const PROJECT_SELECT: &str = "SELECT p.id, p.owner_id, u.username, p.name, p.description,
        p.is_public, p.like_count, p.created_at, p.updated_at
     FROM projects p JOIN users u ON u.id = p.owner_id";

/// Create request
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. `tags: Some(..)` replaces the whole tag set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// List filters. `tags` matches projects carrying any of the slugs.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub tags: Vec<String>,
    pub owner_username: Option<String>,
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        owner_username: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        is_public: row.get(5)?,
        like_count: row.get(6)?,
        tags: Vec::new(),
        created_at: from_millis(row.get(7)?),
        updated_at: from_millis(row.get(8)?),
    })
}

fn load_tags(conn: &Connection, project: &mut Project) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.slug FROM project_tags pt JOIN tags t ON t.id = pt.tag_id
         WHERE pt.project_id = ?1 ORDER BY t.slug",
    )?;
    project.tags = stmt
        .query_map(params![project.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(())
}

fn query_projects(conn: &Connection, sql: &str, args: Vec<Value>) -> AppResult<Vec<Project>> {
    let mut stmt = conn.prepare(sql)?;
    let mut projects = stmt
        .query_map(params_from_iter(args), project_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for project in &mut projects {
        load_tags(conn, project)?;
    }
    Ok(projects)
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "project name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> AppResult<()> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(AppError::validation(format!(
            "description longer than {MAX_DESCRIPTION_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct ProjectStore {
    db: Database,
    edges: EdgeMutator,
}

impl ProjectStore {
    pub fn new(db: Database, edges: EdgeMutator) -> Self {
        Self { db, edges }
    }

    /// Insert the project row and its tag links as one counted mutation.
    ///
    /// Under best-effort pairing the row commits before its links; a failing link surfaces
    /// as an error while the project itself remains. Transactional pairing rolls both back.
    pub fn create(&self, owner: &Identity, new: NewProject) -> AppResult<Project> {
        let name = new.name.trim();
        validate_name(name)?;
        validate_description(new.description.as_deref())?;
        let labels = parse_labels(&new.tags)?;

        let id = new_id(IdKind::Project);
        let now = now_millis();
        self.edges.write_project(&id, Some(labels.as_slice()), |conn| {
            conn.execute(
                "INSERT INTO projects (id, owner_id, name, description, is_public, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id,
                    owner.id,
                    name,
                    new.description,
                    new.is_public.unwrap_or(true),
                    now
                ],
            )?;
            Ok(())
        })?;

        info!(project_id = %id, owner_id = %owner.id, "Project created");
        self.get(&id)
    }

    pub fn get(&self, id: &str) -> AppResult<Project> {
        let conn = self.db.lock();
        let mut project = conn
            .prepare_cached(&format!("{PROJECT_SELECT} WHERE p.id = ?1"))?
            .query_row(params![id], project_from_row)
            .optional()?
            .ok_or(AppError::NotFound("project"))?;
        load_tags(&conn, &mut project)?;
        Ok(project)
    }

    /// Like [`get`](Self::get), but a private project the viewer does not own is `NotFound`.
    pub fn get_visible(&self, id: &str, viewer: Option<&Identity>) -> AppResult<Project> {
        let project = self.get(id)?;
        if !project.visible_to(viewer.map(|v| v.id.as_str())) {
            return Err(AppError::NotFound("project"));
        }
        Ok(project)
    }

    pub fn update(&self, identity: &Identity, id: &str, update: ProjectUpdate) -> AppResult<Project> {
        let project = self.get(id)?;
        authorize_mutation(identity, &project)?;

        let name = update.name.as_deref().map(str::trim);
        if let Some(name) = name {
            validate_name(name)?;
        }
        validate_description(update.description.as_deref())?;
        let labels = update.tags.as_ref().map(|tags| parse_labels(tags)).transpose()?;

        self.edges.write_project(id, labels.as_deref(), |conn| {
            conn.execute(
                "UPDATE projects SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    is_public = COALESCE(?3, is_public),
                    updated_at = ?4
                 WHERE id = ?5",
                params![name, update.description, update.is_public, now_millis(), id],
            )?;
            Ok(())
        })?;

        info!(project_id = %id, "Project updated");
        self.get(id)
    }

    pub fn delete(&self, identity: &Identity, id: &str) -> AppResult<()> {
        let project = self.get(id)?;
        authorize_mutation(identity, &project)?;
        self.edges.delete_project(id)?;
        info!(project_id = %id, "Project deleted");
        Ok(())
    }

    /// Public projects, plus the viewer's own private ones, newest first.
    pub fn list(
        &self,
        filter: &ProjectFilter,
        viewer: Option<&Identity>,
        page: Pagination,
    ) -> AppResult<Page<Project>> {
        let mut clauses = vec!["(p.is_public = 1 OR p.owner_id = ?)".to_string()];
        let mut args: Vec<Value> = vec![Value::Text(
            viewer.map(|v| v.id.clone()).unwrap_or_default(),
        )];

        let slugs: Vec<String> = filter
            .tags
            .iter()
            .map(|t| normalize_slug(t.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        if !slugs.is_empty() {
            let placeholders = vec!["?"; slugs.len()].join(", ");
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM project_tags pt JOIN tags t ON t.id = pt.tag_id
                         WHERE pt.project_id = p.id AND t.slug IN ({placeholders}))"
            ));
            args.extend(slugs.into_iter().map(Value::Text));
        }

        if let Some(owner) = &filter.owner_username {
            clauses.push("u.username = ?".to_string());
            args.push(Value::Text(owner.clone()));
        }

        let where_sql = clauses.join(" AND ");
        let conn = self.db.lock();

        let total: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM projects p JOIN users u ON u.id = p.owner_id WHERE {where_sql}"
            ),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let mut page_args = args;
        page_args.push(Value::Integer(page.limit.into()));
        page_args.push(Value::Integer(page.offset.into()));
        let items = query_projects(
            &conn,
            &format!(
                "{PROJECT_SELECT} WHERE {where_sql}
                 ORDER BY p.created_at DESC, p.id LIMIT ? OFFSET ?"
            ),
            page_args,
        )?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Projects owned by `identity_id` that `viewer` may see.
    pub fn owned_projects(
        &self,
        identity_id: &str,
        viewer: Option<&Identity>,
    ) -> AppResult<Vec<Project>> {
        let viewer_id = viewer.map(|v| v.id.clone()).unwrap_or_default();
        let conn = self.db.lock();
        query_projects(
            &conn,
            &format!(
                "{PROJECT_SELECT} WHERE p.owner_id = ?1 AND (p.is_public = 1 OR p.owner_id = ?2)
                 ORDER BY p.created_at DESC, p.id"
            ),
            vec![Value::Text(identity_id.to_string()), Value::Text(viewer_id)],
        )
    }

    /// Projects `identity_id` has liked that `viewer` may see, most recent like first.
    pub fn liked_projects(
        &self,
        identity_id: &str,
        viewer: Option<&Identity>,
    ) -> AppResult<Vec<Project>> {
        let viewer_id = viewer.map(|v| v.id.clone()).unwrap_or_default();
        let conn = self.db.lock();
        query_projects(
            &conn,
            &format!(
                "{PROJECT_SELECT} JOIN likes l ON l.project_id = p.id
                 WHERE l.user_id = ?1 AND (p.is_public = 1 OR p.owner_id = ?2)
                 ORDER BY l.created_at DESC, p.id"
            ),
            vec![Value::Text(identity_id.to_string()), Value::Text(viewer_id)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::user_store::{NewIdentity, UserStore},
        edges::CounterPairing,
    };

    struct Fixture {
        db: Database,
        projects: ProjectStore,
        edges: EdgeMutator,
        jo: Identity,
        ivy: Identity,
    }

    fn fixture() -> Fixture {
        fixture_with(CounterPairing::BestEffort)
    }

    fn fixture_with(pairing: CounterPairing) -> Fixture {
        let db = Database::open(":memory:").unwrap();
        let users = UserStore::new(db.clone());
        let make = |name: &str| {
            users
                .create(NewIdentity {
                    email: &format!("{name}@x.com"),
                    username: name,
                    first_name: "",
                    last_name: "",
                    password_hash: "x".to_string(),
                })
                .unwrap()
        };
        let jo = make("jo");
        let ivy = make("ivy");
        let edges = EdgeMutator::new(db.clone(), pairing);
        Fixture {
            projects: ProjectStore::new(db.clone(), edges.clone()),
            db,
            edges,
            jo,
            ivy,
        }
    }

    fn new_project(name: &str, tags: &[&str]) -> NewProject {
        NewProject {
            name: name.to_string(),
            description: None,
            is_public: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_create_with_tags() {
        let f = fixture();
        let project = f
            .projects
            .create(&f.jo, new_project("Spark", &["Rust", "Go Lang"]))
            .unwrap();
        assert!(project.id.starts_with("proj_"));
        assert_eq!(project.owner_username, "jo");
        assert!(project.is_public);
        assert_eq!(project.tags, vec!["go-lang", "rust"]);
    }

    const REJECT_BOOM_LINKS: &str = "CREATE TRIGGER reject_boom BEFORE INSERT ON project_tags
        WHEN (SELECT slug FROM tags WHERE id = NEW.tag_id) = 'boom'
        BEGIN SELECT RAISE(ABORT, 'link rejected'); END;";

    fn project_rows(db: &Database) -> i64 {
        db.lock()
            .query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_transactional_create_rolls_back_row_with_links() {
        let f = fixture_with(CounterPairing::Transactional);
        f.db.lock().execute_batch(REJECT_BOOM_LINKS).unwrap();

        assert!(f
            .projects
            .create(&f.jo, new_project("Spark", &["Rust", "Boom"]))
            .is_err());
        assert_eq!(project_rows(&f.db), 0);
        let usage: i64 = f
            .db
            .lock()
            .query_row("SELECT COALESCE(SUM(usage_count), 0) FROM tags", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(usage, 0);
    }

    #[test]
    fn test_best_effort_create_keeps_row_and_counts_links() {
        let f = fixture();
        f.db.lock().execute_batch(REJECT_BOOM_LINKS).unwrap();

        assert!(f
            .projects
            .create(&f.jo, new_project("Spark", &["Rust", "Boom"]))
            .is_err());
        assert_eq!(project_rows(&f.db), 1);
        let (links, rust_usage): (i64, i64) = f
            .db
            .lock()
            .query_row(
                "SELECT (SELECT COUNT(*) FROM project_tags),
                        (SELECT usage_count FROM tags WHERE slug = 'rust')",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(links, 1);
        assert_eq!(rust_usage, 1);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let f = fixture();
        assert!(matches!(
            f.projects.create(&f.jo, new_project("   ", &[])),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_non_owner_gets_forbidden_not_not_found() {
        let f = fixture();
        let project = f.projects.create(&f.jo, new_project("Spark", &[])).unwrap();

        assert!(matches!(
            f.projects
                .update(&f.ivy, &project.id, ProjectUpdate::default()),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.projects.delete(&f.ivy, &project.id),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.projects.delete(&f.ivy, "proj_missing"),
            Err(AppError::NotFound("project"))
        ));
        assert!(f.projects.get(&project.id).is_ok());
    }

    #[test]
    fn test_owner_updates_and_replaces_tags() {
        let f = fixture();
        let project = f
            .projects
            .create(&f.jo, new_project("Spark", &["Rust"]))
            .unwrap();
        let updated = f
            .projects
            .update(
                &f.jo,
                &project.id,
                ProjectUpdate {
                    name: Some("Spark 2".into()),
                    tags: Some(vec!["Zig".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Spark 2");
        assert_eq!(updated.tags, vec!["zig"]);
    }

    #[test]
    fn test_private_projects_hidden_from_others() {
        let f = fixture();
        let mut hidden = new_project("Hidden", &[]);
        hidden.is_public = Some(false);
        let hidden = f.projects.create(&f.jo, hidden).unwrap();
        f.projects.create(&f.jo, new_project("Open", &[])).unwrap();

        assert!(matches!(
            f.projects.get_visible(&hidden.id, Some(&f.ivy)),
            Err(AppError::NotFound("project"))
        ));
        assert!(f.projects.get_visible(&hidden.id, Some(&f.jo)).is_ok());

        let anon = f
            .projects
            .list(&ProjectFilter::default(), None, Pagination::default())
            .unwrap();
        assert_eq!(anon.total, 1);
        let owner = f
            .projects
            .list(&ProjectFilter::default(), Some(&f.jo), Pagination::default())
            .unwrap();
        assert_eq!(owner.total, 2);
        assert_eq!(f.projects.owned_projects(&f.jo.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_list_filters_and_pagination() {
        let f = fixture();
        f.projects
            .create(&f.jo, new_project("A", &["Rust"]))
            .unwrap();
        f.projects
            .create(&f.jo, new_project("B", &["Go"]))
            .unwrap();
        f.projects
            .create(&f.ivy, new_project("C", &["Rust", "Go"]))
            .unwrap();

        let rust = f
            .projects
            .list(
                &ProjectFilter {
                    tags: vec!["rust".into()],
                    owner_username: None,
                },
                None,
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(rust.total, 2);

        let ivys = f
            .projects
            .list(
                &ProjectFilter {
                    tags: vec![],
                    owner_username: Some("ivy".into()),
                },
                None,
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(ivys.total, 1);
        assert_eq!(ivys.items[0].name, "C");

        let first = f
            .projects
            .list(&ProjectFilter::default(), None, Pagination::new(Some(2), None))
            .unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.items.len(), 2);
    }

    #[test]
    fn test_liked_projects_and_cascading_delete() {
        let f = fixture();
        let project = f.projects.create(&f.jo, new_project("A", &[])).unwrap();
        f.edges.like(&f.ivy.id, &project.id).unwrap();

        let liked = f.projects.liked_projects(&f.ivy.id, None).unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].like_count, 1);

        f.projects.delete(&f.jo, &project.id).unwrap();
        assert!(f.projects.liked_projects(&f.ivy.id, None).unwrap().is_empty());
        assert!(!f.edges.is_liked(&f.ivy.id, &project.id).unwrap());
    }
}
