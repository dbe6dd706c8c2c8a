//! Authentication API Endpoints
//! Mission: Sign-up, login and logout over HTTP

use super::{extract::ApiJson, response::ApiResponse, AppState};
use crate::{
    auth::models::{ClientMetadata, IdentityResponse, LoginRequest, LoginResponse, SignUpRequest},
    error::{AppError, AppResult},
};
use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use std::net::SocketAddr;

/// Run password hashing off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}

/// POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignUpRequest>,
) -> AppResult<ApiResponse<IdentityResponse>> {
    let auth = state.auth.clone();
    let identity = blocking(move || auth.sign_up(&payload)).await?;
    Ok(ApiResponse::created(
        "User created successfully",
        IdentityResponse::from_identity(&identity),
    ))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    user_agent: Option<TypedHeader<UserAgent>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    let client = ClientMetadata {
        ip_address: peer.map(|ConnectInfo(addr)| addr.ip().to_string()),
        user_agent: user_agent.map(|TypedHeader(ua)| ua.as_str().to_string()),
    };

    let auth = state.auth.clone();
    let (identity, session) = blocking(move || {
        auth.login(&payload.email, &payload.password, payload.remember, client)
    })
    .await?;

    Ok(ApiResponse::ok(
        "Login successful",
        LoginResponse {
            session_id: session.id,
            expires_at: session.expires_at,
            user: IdentityResponse::from_identity(&identity),
        },
    ))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<ApiResponse<()>> {
    state.auth.logout(&headers)?;
    Ok(ApiResponse::message("Logout successful"))
}
