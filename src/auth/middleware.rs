//! Authentication Middleware
//! Mission: Turn `Authorization: Bearer <session>` into a typed identity, or refuse
//!
//! Pipeline: parse header -> parse typed session id -> live session -> owning identity ->
//! status check. Anything malformed is rejected before storage is touched.

use crate::{
    auth::{models::Identity, session_store::SessionStore},
    error::{AppError, AppResult},
    ids::{IdKind, TypedId},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Resolves bearer tokens to identities.
#[derive(Clone)]
pub struct AuthGate {
    sessions: SessionStore,
}

impl AuthGate {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    /// Full resolution. `SessionInvalid` for every token problem, `AccountSuspended` only
    /// for a live session whose owner is blocked.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<Identity> {
        let token = bearer_token(headers)?;

        let identity = match self.sessions.session_owner(&token)? {
            Some(identity) => identity,
            None => {
                debug!(session = %token.redacted(), "No live session for token");
                return Err(AppError::SessionInvalid);
            }
        };

        if identity.is_suspended() {
            debug!(user_id = %identity.id, "User account is suspended");
            return Err(AppError::AccountSuspended);
        }

        Ok(identity)
    }
}

/// Extract and validate the session token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> AppResult<TypedId> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        debug!("Missing Authorization header");
        return Err(AppError::SessionInvalid);
    };

    let raw = value
        .to_str()
        .ok()
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
        .ok_or(AppError::SessionInvalid)?;

    TypedId::parse(IdKind::Session, raw).map_err(|e| {
        debug!(error = %e, "Failed to parse session id");
        AppError::SessionInvalid
    })
}

/// The authenticated caller, attached by [`require_auth`] / [`optional_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

/// The caller if one was authenticated; `None` means anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

/// Mandatory gate: short-circuits before the handler on any failure.
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = gate.authenticate(req.headers())?;
    req.extensions_mut().insert(CurrentUser(identity));
    Ok(next.run(req).await)
}

/// Optional gate: failures are swallowed and the request continues anonymously.
pub async fn optional_auth(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Response {
    if req.headers().contains_key(AUTHORIZATION) {
        match gate.authenticate(req.headers()) {
            Ok(identity) => {
                req.extensions_mut().insert(CurrentUser(identity));
            }
            Err(e) => debug!(error = %e, "Optional auth failed, continuing anonymously"),
        }
    }
    next.run(req).await
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::SessionInvalid)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<CurrentUser>().map(|u| u.0.clone()),
        ))
    }
}
