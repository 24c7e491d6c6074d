//! End-to-end tests over the assembled router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use jsonwebtoken::{decode, DecodingKey, Validation};
use rally_server::service::config::{AppConfig, GATEWAY_SERVICE};
use rally_server::service::gateway::{Credential, CredentialExchange};
use rally_server::service::token::Claims;
use rally_server::AppBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "S";

struct Harness {
    router: Router,
}

struct Reply {
    status: StatusCode,
    body: Value,
    raw: Bytes,
}

impl Harness {
    /// All services, signing with a fixed gateway credential.
    fn new() -> Self {
        let mut config = AppConfig::default();
        config.identity.shared_secret = Some(SECRET.to_string());
        let app = AppBuilder::new(config)
            .credentials(Arc::new(CredentialExchange::fixed(Credential {
                key: "K".to_string(),
                secret: SECRET.to_string(),
            })))
            .build()
            .unwrap();
        Self {
            router: app.router(),
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let raw = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);
        Reply { status, body, raw }
    }

    async fn register(&self, email: &str, password: &str) -> Reply {
        self.call(
            Method::POST,
            "/auth",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Registers `email` and returns its bearer token.
    async fn token_for(&self, email: &str) -> String {
        let reply = self.register(email, "correct horse").await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.body["token"].as_str().unwrap().to_string()
    }

    async fn create_profile(&self, token: &str, name: &str) -> Value {
        let reply = self
            .call(Method::POST, "/user", Some(token), Some(json!({ "display_name": name })))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.body
    }
}

fn claims(token: &str) -> Claims {
    decode::<Claims>(token, &DecodingKey::from_secret(SECRET.as_bytes()), &Validation::default())
        .unwrap()
        .claims
}

// ---------------------------------------------------------------------------
// Create, read, conflict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_assigned_key_and_echoes_input() {
    let harness = Harness::new();
    let token = harness.token_for("ada@rally.test").await;

    let profile = harness.create_profile(&token, "Ada").await;
    assert_eq!(profile["id"], 1);
    assert_eq!(profile["display_name"], "Ada");
    assert_eq!(profile["auth_id"], claims(&token).sub);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let harness = Harness::new();
    harness.token_for("ada@rally.test").await;

    let reply = harness.register("  ADA@rally.test ", "another one").await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.body["error"].as_str().unwrap().contains("duplicate"));
}

#[tokio::test]
async fn missing_record_is_not_found_with_key() {
    let harness = Harness::new();
    let reply = harness.call(Method::GET, "/user/999", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let harness = Harness::new();
    let token = harness.token_for("ada@rally.test").await;
    harness.create_profile(&token, "Ada").await;

    let first = harness.call(Method::GET, "/user/1", None, None).await;
    let second = harness.call(Method::GET, "/user/1", None, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.raw, second.raw);
}

#[tokio::test]
async fn updates_move_updated_at_forward() {
    let harness = Harness::new();
    let token = harness.token_for("ada@rally.test").await;
    let created = harness.create_profile(&token, "Ada").await;

    let mut last = created["updated_at"].as_u64().unwrap();
    for bio in ["chess", "go", "shogi"] {
        let reply = harness
            .call(Method::PUT, "/user/1", Some(&token), Some(json!({ "bio": bio })))
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        let stamped = reply.body["updated_at"].as_u64().unwrap();
        assert!(stamped > last);
        assert_eq!(reply.body["created_at"], created["created_at"]);
        last = stamped;
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_verifies_password_and_issues_token() {
    let harness = Harness::new();
    let registered = harness.register("ada@rally.test", "correct horse").await;

    let wrong = harness
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@rally.test", "password": "battery staple" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert!(wrong.body.get("token").is_none());

    let right = harness
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "Ada@Rally.test", "password": "correct horse" })),
        )
        .await;
    assert_eq!(right.status, StatusCode::OK);
    assert!(right.body.get("password_hash").is_none());
    let token = right.body["token"].as_str().unwrap();
    assert_eq!(claims(token).sub, registered.body["id"].as_str().unwrap());
    assert_eq!(claims(token).email.as_deref(), Some("ada@rally.test"));
}

#[tokio::test]
async fn anonymous_and_garbage_callers_are_unauthorized() {
    let harness = Harness::new();
    let body = json!({ "display_name": "Ada" });

    let anonymous = harness.call(Method::POST, "/user", None, Some(body.clone())).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let garbage = harness.call(Method::POST, "/user", Some("not-a-token"), Some(body)).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_subjects_cannot_modify_records() {
    let harness = Harness::new();
    let owner = harness.token_for("ada@rally.test").await;
    let intruder = harness.token_for("eve@rally.test").await;
    harness.create_profile(&owner, "Ada").await;

    let update = harness
        .call(Method::PUT, "/user/1", Some(&intruder), Some(json!({ "bio": "pwned" })))
        .await;
    assert_eq!(update.status, StatusCode::FORBIDDEN);

    let delete = harness.call(Method::DELETE, "/user/1", Some(&intruder), None).await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let credential = harness
        .call(Method::DELETE, "/auth/ada@rally.test", Some(&intruder), None)
        .await;
    assert_eq!(credential.status, StatusCode::FORBIDDEN);

    let unchanged = harness.call(Method::GET, "/user/1", None, None).await;
    assert_eq!(unchanged.body["bio"], "");

    let removed = harness.call(Method::DELETE, "/user/1", Some(&owner), None).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body, json!({ "id": 1, "deleted": true }));
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_input_is_bad_request() {
    let harness = Harness::new();
    let token = harness.token_for("ada@rally.test").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/user")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from("{\"display_name\":"))
        .unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bad_key = harness.call(Method::GET, "/user/not-a-number", None, None).await;
    assert_eq!(bad_key.status, StatusCode::BAD_REQUEST);

    let short_password = harness.register("bob@rally.test", "short").await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);
    assert!(short_password.body["error"].as_str().unwrap().contains("password"));
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn matches_require_known_players() {
    let harness = Harness::new();
    let ada = harness.token_for("ada@rally.test").await;
    let bob = harness.token_for("bob@rally.test").await;
    harness.create_profile(&ada, "Ada").await;
    harness.create_profile(&bob, "Bob").await;

    let unknown = harness
        .call(
            Method::POST,
            "/match",
            Some(&ada),
            Some(json!({ "title": "final", "players": [1, 3] })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["error"], "player 3 does not exist");

    let created = harness
        .call(
            Method::POST,
            "/match",
            Some(&ada),
            Some(json!({ "title": "final", "players": [1, 2] })),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["owner_id"], claims(&ada).sub);

    let listed = harness.call(Method::GET, "/matches?player=2", None, None).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body.as_array().unwrap().len(), 1);

    let id = created.body["id"].as_str().unwrap();
    let finished = harness
        .call(
            Method::PUT,
            &format!("/match/{id}"),
            Some(&ada),
            Some(json!({ "winner": 2, "status": "completed" })),
        )
        .await;
    assert_eq!(finished.status, StatusCode::OK);
    assert_eq!(finished.body["status"], "completed");

    let stray = harness
        .call(
            Method::PUT,
            &format!("/match/{id}"),
            Some(&ada),
            Some(json!({ "winner": 99 })),
        )
        .await;
    assert_eq!(stray.status, StatusCode::BAD_REQUEST);
    assert!(stray.body["error"].as_str().unwrap().contains("99"));

    let after = harness.call(Method::GET, &format!("/match/{id}"), None, None).await;
    assert_eq!(after.body["winner"], 2);
}

// ---------------------------------------------------------------------------
// Credential exchange against a live gateway
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Gateway {
    registrations: Arc<AtomicUsize>,
    refuse_registration: bool,
}

async fn register_consumer(
    State(gateway): State<Gateway>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if gateway.refuse_registration {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "username already taken" })),
        );
    }
    let n = gateway.registrations.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::CREATED,
        Json(json!({ "id": format!("consumer-{n}"), "username": body["username"] })),
    )
}

async fn issue_credential(Path(_username): Path<String>) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "key": "K", "secret": SECRET })))
}

async fn spawn_gateway(gateway: Gateway) -> String {
    let app = Router::new()
        .route("/consumers", post(register_consumer))
        .route("/consumers/{username}/jwt", post(issue_credential))
        .with_state(gateway);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn issued_tokens_carry_gateway_key_as_issuer() {
    let gateway = Gateway::default();
    let base = spawn_gateway(gateway.clone()).await;

    let mut config = AppConfig::default();
    config.services.insert(GATEWAY_SERVICE.to_string(), base);
    let app = AppBuilder::new(config).build().unwrap();
    let harness = Harness {
        router: app.router(),
    };

    let first = harness.token_for("ada@rally.test").await;
    let second = harness.token_for("bob@rally.test").await;
    assert_eq!(claims(&first).iss, "K");
    assert_eq!(claims(&second).iss, "K");
    assert_eq!(gateway.registrations.load(Ordering::SeqCst), 1);

    let reader = harness.call(Method::GET, "/users", Some(&first), None).await;
    assert_eq!(reader.status, StatusCode::OK);
}

#[tokio::test]
async fn refused_registration_fails_create_with_generic_error() {
    let gateway = Gateway {
        refuse_registration: true,
        ..Gateway::default()
    };
    let base = spawn_gateway(gateway.clone()).await;

    let mut config = AppConfig::default();
    config.services.insert(GATEWAY_SERVICE.to_string(), base);
    let app = AppBuilder::new(config).build().unwrap();
    let harness = Harness {
        router: app.router(),
    };

    let reply = harness.register("ada@rally.test", "correct horse").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, json!({ "error": rally_core::INTERNAL_MESSAGE }));
    assert!(!String::from_utf8_lossy(&reply.raw).contains("username already taken"));
    assert_eq!(gateway.registrations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_gateway_hides_detail() {
    let mut config = AppConfig::default();
    config
        .services
        .insert(GATEWAY_SERVICE.to_string(), "http://127.0.0.1:9".to_string());
    let app = AppBuilder::new(config).build().unwrap();
    let harness = Harness {
        router: app.router(),
    };

    let reply = harness.register("ada@rally.test", "correct horse").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, json!({ "error": rally_core::INTERNAL_MESSAGE }));
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_lists_hosted_services() {
    let harness = Harness::new();
    let reply = harness.call(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["services"], json!(["auth", "users", "matches"]));
}
