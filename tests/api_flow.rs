//! End-to-end flows through the full router.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use hackspark_backend::{
    auth::{models::AccountStatus, SessionPolicy, UserStore},
    edges::CounterPairing,
    create_router, AppState, Config, Database,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: Database,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(Config::for_tests())
    }

    fn with_pairing(pairing: CounterPairing) -> Self {
        let mut config = Config::for_tests();
        config.counter_pairing = pairing;
        Self::with_config(config)
    }

    fn with_config(config: Config) -> Self {
        let db = Database::open(":memory:").expect("open db");
        let router = create_router(AppState::new(db.clone(), &config), &config);
        Self { router, db }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Sign up and log in; returns (identity id, session token).
    async fn register(&self, username: &str) -> (String, String) {
        let email = format!("{username}@x.com");
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "username": username,
                    "password": "longenough1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": "longenough1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        let token = body["data"]["sessionId"].as_str().unwrap().to_string();
        (id, token)
    }

    async fn create_project(&self, token: &str, body: Value) -> String {
        let (status, body) = self
            .send(Method::POST, "/api/v1/projects", Some(token), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn like_count(&self, project_id: &str) -> i64 {
        let (_, body) = self
            .send(
                Method::GET,
                &format!("/api/v1/projects/{project_id}"),
                None,
                None,
            )
            .await;
        body["data"]["like_count"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn signup_login_and_resolve_identity() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(json!({
                "email": "a@x.com",
                "username": "ada",
                "password": "longenough1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("usr_"));
    let text = body.to_string();
    assert!(!text.contains("password"));
    assert!(!text.contains("longenough1"));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "longenough1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["sessionId"].as_str().unwrap();
    assert!(token.starts_with("sess_"));

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());
}

#[tokio::test]
async fn login_failures_do_not_reveal_accounts() {
    let app = TestApp::new();
    app.register("ada").await;

    let (unknown_status, unknown) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@x.com", "password": "longenough1" })),
        )
        .await;
    let (wrong_status, wrong) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@x.com", "password": "not-the-password" })),
        )
        .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, wrong_status);
    assert_eq!(unknown, wrong);
    assert_eq!(unknown["code"], "invalid_credentials");
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = TestApp::new();
    app.register("ada").await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(json!({
                "email": "ada@x.com",
                "username": "someone-else",
                "password": "longenough1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_input_gets_error_envelope() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation");

    let (status, body) = app
        .send(Method::GET, "/api/v1/projects?limit=-3", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn malformed_and_missing_tokens_are_rejected() {
    let app = TestApp::new();
    for token in [None, Some("garbage"), Some("proj_0123456789abcdef0123456789abcdef")] {
        let (status, body) = app.send(Method::GET, "/api/v1/users/me", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "session_invalid");
    }
}

#[tokio::test]
async fn expired_session_resolves_to_no_identity() {
    let mut config = Config::for_tests();
    config.session_policy = SessionPolicy {
        default_ttl: Duration::zero(),
        remember_ttl: Duration::zero(),
    };
    let app = TestApp::with_config(config);
    let (_, token) = app.register("ada").await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "session_invalid");

    let rows: i64 = app
        .db
        .lock()
        .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn suspended_identity_is_distinct_from_invalid_session() {
    let app = TestApp::new();
    let (id, token) = app.register("ada").await;
    UserStore::new(app.db.clone())
        .set_status(&id, AccountStatus::Suspended)
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "account_suspended");

    // Optional routes treat a suspended caller as anonymous.
    let (status, _) = app.send(Method::GET, "/api/v1/projects", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_invalidates_session() {
    let app = TestApp::new();
    let (_, token) = app.register("ada").await;

    let (status, _) = app
        .send(Method::POST, "/api/v1/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::POST, "/api/v1/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn non_owner_gets_forbidden_not_not_found() {
    let app = TestApp::new();
    let (_, jo) = app.register("jo").await;
    let (_, ivy) = app.register("ivy").await;
    let project = app.create_project(&jo, json!({ "name": "Spark" })).await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/projects/{project}"),
            Some(&ivy),
            Some(json!({ "name": "Stolen" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/projects/{project}"),
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::DELETE,
            "/api/v1/projects/proj_0123456789abcdef0123456789abcdef",
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/projects/{project}"),
            Some(&jo),
            Some(json!({ "name": "Spark 2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Spark 2");
}

#[tokio::test]
async fn double_like_counts_once_and_unlike_twice_is_not_found() {
    let app = TestApp::new();
    let (_, jo) = app.register("jo").await;
    let (_, ivy) = app.register("ivy").await;
    let project = app.create_project(&jo, json!({ "name": "Spark" })).await;
    let like_uri = format!("/api/v1/projects/{project}/like");

    for _ in 0..2 {
        let (status, _) = app.send(Method::POST, &like_uri, Some(&ivy), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(app.like_count(&project).await, 1);

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/projects/{project}/liked"),
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(body["data"]["liked"], true);

    let (status, _) = app.send(Method::DELETE, &like_uri, Some(&ivy), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.send(Method::DELETE, &like_uri, Some(&ivy), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert_eq!(app.like_count(&project).await, 0);
}

#[tokio::test]
async fn equivalent_labels_share_one_tag() {
    let app = TestApp::new();
    let (_, jo) = app.register("jo").await;
    app.create_project(&jo, json!({ "name": "Spark", "tags": ["Go Lang"] }))
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users/technologies",
            Some(&jo),
            Some(json!({ "tag_slug": "go-lang ", "skill_level": "expert", "is_primary": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, body) = app.send(Method::GET, "/api/v1/tags", None, None).await;
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = app.send(Method::GET, "/api/v1/tags/go-lang", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["usage_count"], 2);
    assert_eq!(body["data"]["name"], "Go Lang");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users/technologies",
            Some(&jo),
            Some(json!({ "tag_slug": "GO LANG" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.send(Method::GET, "/api/v1/users/jo", None, None).await;
    assert_eq!(body["data"]["technologies"], json!(["go-lang"]));
    assert_eq!(body["data"]["project_count"], 1);
}

#[tokio::test]
async fn replacing_and_deleting_projects_releases_tag_usage() {
    let app = TestApp::new();
    let (_, jo) = app.register("jo").await;
    let project = app
        .create_project(&jo, json!({ "name": "Spark", "tags": ["Rust", "SQL"] }))
        .await;

    app.send(
        Method::PUT,
        &format!("/api/v1/projects/{project}"),
        Some(&jo),
        Some(json!({ "tags": ["Rust", "Zig"] })),
    )
    .await;

    let (_, trending) = app.send(Method::GET, "/api/v1/tags/trending", None, None).await;
    let slugs: Vec<&str> = trending["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs.len(), 2);
    assert!(slugs.contains(&"rust") && slugs.contains(&"zig"));

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/projects/{project}"),
            Some(&jo),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/api/v1/tags/rust", None, None).await;
    assert_eq!(body["data"]["usage_count"], 0);
}

#[tokio::test]
async fn private_projects_are_hidden_from_others() {
    let app = TestApp::new();
    let (_, jo) = app.register("jo").await;
    let (_, ivy) = app.register("ivy").await;
    let project = app
        .create_project(&jo, json!({ "name": "Secret", "is_public": false }))
        .await;
    let uri = format!("/api/v1/projects/{project}");

    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::GET, &uri, Some(&ivy), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::GET, &uri, Some(&jo), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::POST, &format!("{uri}/like"), Some(&ivy), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

const BREAK_LIKE_COUNTER: &str = "CREATE TRIGGER break_like_count
    BEFORE UPDATE OF like_count ON projects
    BEGIN SELECT RAISE(ABORT, 'counter offline'); END;";

#[tokio::test]
async fn best_effort_counter_failure_keeps_like_and_warns() {
    let app = TestApp::with_pairing(CounterPairing::BestEffort);
    let (_, jo) = app.register("jo").await;
    let (_, ivy) = app.register("ivy").await;
    let project = app.create_project(&jo, json!({ "name": "Spark" })).await;
    app.db.lock().execute_batch(BREAK_LIKE_COUNTER).unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/projects/{project}/like"),
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["warning"].is_string());

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/projects/{project}/liked"),
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(body["data"]["liked"], true);
    assert_eq!(app.like_count(&project).await, 0);
}

#[tokio::test]
async fn transactional_counter_failure_rolls_back_like() {
    let app = TestApp::with_pairing(CounterPairing::Transactional);
    let (_, jo) = app.register("jo").await;
    let (_, ivy) = app.register("ivy").await;
    let project = app.create_project(&jo, json!({ "name": "Spark" })).await;
    app.db.lock().execute_batch(BREAK_LIKE_COUNTER).unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/projects/{project}/like"),
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal");
    assert!(!body.to_string().contains("counter offline"));

    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/projects/{project}/liked"),
            Some(&ivy),
            None,
        )
        .await;
    assert_eq!(body["data"]["liked"], false);
}

#[tokio::test]
async fn health_and_request_id() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
