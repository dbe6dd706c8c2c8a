pub mod auth;
pub mod extract;
pub mod projects;
pub mod response;
pub mod tags;
pub mod users;

use crate::{
    auth::{
        middleware::{optional_auth, require_auth},
        password::PasswordHasher,
        service::AuthService,
        session_store::SessionStore,
        user_store::UserStore,
    },
    config::Config,
    db::Database,
    edges::EdgeMutator,
    middleware::{cors_layer, request_logging, with_request_id, with_security_headers},
    store::{ProfileStore, ProjectStore, TagStore},
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub edges: EdgeMutator,
    pub projects: ProjectStore,
    pub tags: TagStore,
    pub profiles: ProfileStore,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        let users = UserStore::new(db.clone());
        let sessions = SessionStore::new(db.clone(), config.session_policy);
        let auth = AuthService::new(
            users.clone(),
            sessions,
            PasswordHasher::new(config.bcrypt_cost),
        );
        let edges = EdgeMutator::new(db.clone(), config.counter_pairing);

        Self {
            projects: ProjectStore::new(db.clone(), edges.clone()),
            tags: TagStore::new(db.clone()),
            profiles: ProfileStore::new(db.clone(), users),
            auth,
            edges,
            db,
        }
    }
}

/// Build the full HTTP surface: `/health` plus everything under `/api/v1`.
pub fn create_router(state: AppState, config: &Config) -> Router {
    let gate = state.auth.gate().clone();

    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    // Mandatory gate: the handler never runs without a live, active identity.
    let protected_routes = Router::new()
        .route("/users/me", get(users::me))
        .route("/users/technologies", post(users::add_technology))
        .route(
            "/users/technologies/:slug",
            put(users::update_technology).delete(users::remove_technology),
        )
        .route("/projects", post(projects::create))
        .route(
            "/projects/:id",
            put(projects::update).delete(projects::delete),
        )
        .route(
            "/projects/:id/like",
            post(projects::like).delete(projects::unlike),
        )
        .route("/projects/:id/liked", get(projects::is_liked))
        .route_layer(middleware::from_fn_with_state(gate.clone(), require_auth));

    // Optional gate: anonymous callers get public data only.
    let browse_routes = Router::new()
        .route("/users/:username", get(users::profile))
        .route("/users/:username/technologies", get(users::technologies))
        .route("/users/:username/projects", get(users::projects))
        .route("/users/:username/likes", get(users::liked_projects))
        .route("/projects", get(projects::list))
        .route("/projects/:id", get(projects::get))
        .route("/projects/:id/likes", get(projects::likers))
        .route("/tags", get(tags::list))
        .route("/tags/trending", get(tags::trending))
        .route("/tags/:slug", get(tags::get))
        .route("/tags/:slug/projects", get(tags::projects))
        .route("/tags/:slug/users", get(tags::users))
        .route_layer(middleware::from_fn_with_state(gate, optional_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(browse_routes);

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http());

    with_security_headers(with_request_id(app)).layer(cors_layer(&config.allowed_origins))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Response {
    let db_ok = state
        .db
        .lock()
        .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .is_ok();

    let (status, body) = if db_ok {
        (
            StatusCode::OK,
            HealthResponse {
                status: "healthy",
                version: env!("CARGO_PKG_VERSION"),
                database: "ok",
            },
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "unhealthy",
                version: env!("CARGO_PKG_VERSION"),
                database: "unreachable",
            },
        )
    };
    (status, Json(body)).into_response()
}
