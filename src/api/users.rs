//! User profile and technology endpoints.

use super::{extract::ApiJson, response::ApiResponse, AppState};
use crate::{
    auth::{
        middleware::{CurrentUser, MaybeUser},
        models::IdentityResponse,
    },
    error::AppResult,
    models::{Profile, Project, TechnologyMetadata, UserTechnology},
};
use axum::extract::{Path, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AddTechnologyRequest {
    pub tag_slug: String,
    #[serde(flatten)]
    pub meta: TechnologyMetadata,
}

/// GET /api/v1/users/me
pub async fn me(CurrentUser(identity): CurrentUser) -> ApiResponse<IdentityResponse> {
    ApiResponse::ok(
        "User retrieved successfully",
        IdentityResponse::from_identity(&identity),
    )
}

/// GET /api/v1/users/:username
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<Profile>> {
    let profile = state.profiles.profile(&username)?;
    Ok(ApiResponse::ok("User profile retrieved successfully", profile))
}

/// GET /api/v1/users/:username/technologies
pub async fn technologies(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<Vec<UserTechnology>>> {
    let identity = state.profiles.identity_by_username(&username)?;
    let technologies = state.profiles.technologies(&identity.id)?;
    Ok(ApiResponse::ok(
        "User technologies retrieved successfully",
        technologies,
    ))
}

/// GET /api/v1/users/:username/projects
pub async fn projects(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<Vec<Project>>> {
    let identity = state.profiles.identity_by_username(&username)?;
    let projects = state.projects.owned_projects(&identity.id, viewer.as_ref())?;
    Ok(ApiResponse::ok("User projects retrieved successfully", projects))
}

/// GET /api/v1/users/:username/likes
pub async fn liked_projects(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<Vec<Project>>> {
    let identity = state.profiles.identity_by_username(&username)?;
    let projects = state.projects.liked_projects(&identity.id, viewer.as_ref())?;
    Ok(ApiResponse::ok(
        "Liked projects retrieved successfully",
        projects,
    ))
}

/// POST /api/v1/users/technologies
pub async fn add_technology(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ApiJson(payload): ApiJson<AddTechnologyRequest>,
) -> AppResult<ApiResponse<Vec<UserTechnology>>> {
    let outcome = state
        .edges
        .add_user_technology(&identity.id, &payload.tag_slug, &payload.meta)?;
    let technologies = state.profiles.technologies(&identity.id)?;
    Ok(ApiResponse::created("Technology added successfully", technologies).with_outcome(outcome))
}

/// PUT /api/v1/users/technologies/:slug
pub async fn update_technology(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(slug): Path<String>,
    ApiJson(meta): ApiJson<TechnologyMetadata>,
) -> AppResult<ApiResponse<Vec<UserTechnology>>> {
    state
        .edges
        .update_user_technology(&identity.id, &slug, &meta)?;
    let technologies = state.profiles.technologies(&identity.id)?;
    Ok(ApiResponse::ok(
        "Technology updated successfully",
        technologies,
    ))
}

/// DELETE /api/v1/users/technologies/:slug
pub async fn remove_technology(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(slug): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let outcome = state.edges.remove_user_technology(&identity.id, &slug)?;
    Ok(ApiResponse::message("Technology removed successfully").with_outcome(outcome))
}
