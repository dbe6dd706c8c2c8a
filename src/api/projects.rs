//! Project endpoints, including likes.

use super::{
    extract::{ApiJson, ApiQuery},
    response::ApiResponse,
    AppState,
};
use crate::{
    auth::middleware::{CurrentUser, MaybeUser},
    error::AppResult,
    models::{Liker, Page, Pagination, Project},
    store::{NewProject, ProjectFilter, ProjectUpdate},
};
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Comma-separated tag slugs
    pub tags: Option<String>,
    /// Owner username
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LikedResponse {
    pub liked: bool,
}

/// GET /api/v1/projects
pub async fn list(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<ApiResponse<Page<Project>>> {
    let filter = ProjectFilter {
        tags: query
            .tags
            .as_deref()
            .map(|t| t.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        owner_username: query.owner,
    };
    let page = state.projects.list(
        &filter,
        viewer.as_ref(),
        Pagination::new(query.limit, query.offset),
    )?;
    Ok(ApiResponse::ok("Projects retrieved successfully", page))
}

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiJson(payload): ApiJson<NewProject>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.projects.create(&identity, payload)?;
    Ok(ApiResponse::created("Project created successfully", project))
}

/// GET /api/v1/projects/:id
pub async fn get(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.projects.get_visible(&id, viewer.as_ref())?;
    Ok(ApiResponse::ok("Project retrieved successfully", project))
}

/// PUT /api/v1/projects/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ProjectUpdate>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.projects.update(&identity, &id, payload)?;
    Ok(ApiResponse::ok("Project updated successfully", project))
}

/// DELETE /api/v1/projects/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.projects.delete(&identity, &id)?;
    Ok(ApiResponse::message("Project deleted successfully"))
}

/// POST /api/v1/projects/:id/like
pub async fn like(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    // Private projects stay invisible to non-owners, likes included.
    state.projects.get_visible(&id, Some(&identity))?;
    let outcome = state.edges.like(&identity.id, &id)?;
    let message = if outcome.changed {
        "Project liked successfully"
    } else {
        "Project already liked"
    };
    Ok(ApiResponse::message(message).with_outcome(outcome))
}

/// DELETE /api/v1/projects/:id/like
pub async fn unlike(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let outcome = state.edges.unlike(&identity.id, &id)?;
    Ok(ApiResponse::message("Project unliked successfully").with_outcome(outcome))
}

/// GET /api/v1/projects/:id/liked
pub async fn is_liked(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikedResponse>> {
    let liked = state.edges.is_liked(&identity.id, &id)?;
    Ok(ApiResponse::ok("Like status retrieved", LikedResponse { liked }))
}

/// GET /api/v1/projects/:id/likes
pub async fn likers(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<Liker>>> {
    state.projects.get_visible(&id, viewer.as_ref())?;
    let likers = state
        .edges
        .likers(&id, Pagination::new(query.limit, query.offset))?;
    Ok(ApiResponse::ok("Project likes retrieved successfully", likers))
}
