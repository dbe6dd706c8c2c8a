//! Tag catalogue endpoints.

use super::{extract::ApiQuery, response::ApiResponse, AppState};
use crate::{
    auth::middleware::MaybeUser,
    error::{AppError, AppResult},
    models::{Page, Pagination, Project, Tag, TagCategory},
    store::{tags::TechnologyUser, ProjectFilter, TagQuery, TagSort},
};
use axum::extract::{Path, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<TagSort>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/v1/tags
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<ApiResponse<Page<Tag>>> {
    let category = match query.category.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            TagCategory::parse(raw).ok_or_else(|| AppError::validation("unknown tag category"))?,
        ),
    };
    let tags = state.tags.list(
        &TagQuery {
            search: query.search,
            category,
            sort: query.sort.unwrap_or_default(),
        },
        Pagination::new(query.limit, query.offset),
    )?;
    Ok(ApiResponse::ok("Tags retrieved successfully", tags))
}

/// GET /api/v1/tags/trending
pub async fn trending(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TrendingQuery>,
) -> AppResult<ApiResponse<Vec<Tag>>> {
    let tags = state.tags.trending(query.limit)?;
    Ok(ApiResponse::ok("Trending tags retrieved successfully", tags))
}

/// GET /api/v1/tags/:slug
pub async fn get(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<ApiResponse<Tag>> {
    let tag = state.tags.get_by_slug(&slug)?;
    Ok(ApiResponse::ok("Tag retrieved successfully", tag))
}

/// GET /api/v1/tags/:slug/projects
pub async fn projects(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(slug): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Page<Project>>> {
    let tag = state.tags.get_by_slug(&slug)?;
    let page = state.projects.list(
        &ProjectFilter {
            tags: vec![tag.slug],
            owner_username: None,
        },
        viewer.as_ref(),
        Pagination::new(query.limit, query.offset),
    )?;
    Ok(ApiResponse::ok("Tag projects retrieved successfully", page))
}

/// GET /api/v1/tags/:slug/users
pub async fn users(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<TechnologyUser>>> {
    let users = state
        .tags
        .users_with_technology(&slug, Pagination::new(query.limit, query.offset))?;
    Ok(ApiResponse::ok("Tag users retrieved successfully", users))
}
