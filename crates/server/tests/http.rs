//! Router-level tests over in-memory adapters

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;
use tower::util::ServiceExt;

use postflight::http::{AppState, AuthConfig, router};
use postflight_adapters::store::InMemoryStore;
use postflight_adapters::stub::StubPublisher;
use postflight_adapters::tokens::StaticTokenProvider;
use postflight_domain::usecases::{PublishEngine, PublishEngineConfig, PublisherSet};
use postflight_domain::{
    AccessTokenProvider, AttemptLog, Clock, Platform, PublicationLedger, PublishError, Strategy,
    StrategyStore, SystemClock, derive_idempotency_key,
};

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    linkedin: Arc<StubPublisher>,
    twitter: Arc<StubPublisher>,
}

fn harness_with(auth: AuthConfig, linkedin: StubPublisher, twitter: StubPublisher) -> Harness {
    harness_full(auth, linkedin, twitter, true, true)
}

fn harness_full(
    auth: AuthConfig,
    linkedin: StubPublisher,
    twitter: StubPublisher,
    linkedin_enabled: bool,
    x_enabled: bool,
) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let linkedin = Arc::new(linkedin);
    let twitter = Arc::new(twitter);

    let tokens: Arc<dyn AccessTokenProvider> = Arc::new(
        StaticTokenProvider::new()
            .with_token(Platform::Linkedin, "test-token")
            .with_token(Platform::Twitter, "test-token"),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let engine = PublishEngine::new(
        store.clone() as Arc<dyn PublicationLedger>,
        store.clone() as Arc<dyn AttemptLog>,
        store.clone() as Arc<dyn StrategyStore>,
        tokens,
        clock,
        PublisherSet::new(linkedin.clone(), twitter.clone()),
        PublishEngineConfig::default(),
    );

    let state = AppState {
        engine,
        strategies: store.clone(),
        ledger: store.clone(),
        attempts: store.clone(),
        auth,
        default_user_id: "local".to_string(),
        linkedin_enabled,
        x_enabled,
    };

    Harness {
        app: router(state),
        store,
        linkedin,
        twitter,
    }
}

fn harness() -> Harness {
    harness_with(
        AuthConfig::default(),
        StubPublisher::new(Platform::Linkedin),
        StubPublisher::new(Platform::Twitter),
    )
}

fn strategy(id: &str, author: &str, content: &str, platform: Platform) -> Strategy {
    let now = OffsetDateTime::now_utc();
    Strategy {
        id: id.to_string(),
        content: content.to_string(),
        platform,
        author_id: author.to_string(),
        title: None,
        is_published: false,
        published_url: None,
        created_at: now,
        updated_at: now,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let h = harness_with(
        AuthConfig {
            bearer_token: Some(SecretString::new("sekrit".into())),
        },
        StubPublisher::new(Platform::Linkedin),
        StubPublisher::new(Platform::Twitter),
    );

    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let h = harness_with(
        AuthConfig {
            bearer_token: Some(SecretString::new("sekrit".into())),
        },
        StubPublisher::new(Platform::Linkedin),
        StubPublisher::new(Platform::Twitter),
    );

    let request = post_json("/distribute", &json!({ "platform": "x", "content": "hi" }));
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_bearer_is_accepted() {
    let h = harness_with(
        AuthConfig {
            bearer_token: Some(SecretString::new("sekrit".into())),
        },
        StubPublisher::new(Platform::Linkedin),
        StubPublisher::new(Platform::Twitter),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/distribute")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer sekrit")
        .body(Body::from(
            json!({ "platform": "x", "content": "hi" }).to_string(),
        ))
        .unwrap();

    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_distribute_creates_strategy_and_publishes() {
    let h = harness();

    let request = post_json(
        "/distribute",
        &json!({ "platform": "x", "content": "hello world", "title": "Post" }),
    );
    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["postId"], "stub-twitter-1");
    assert_eq!(h.twitter.calls(), 1);

    let strategy_id = body["strategyId"].as_str().unwrap();
    let stored = StrategyStore::get(h.store.as_ref(), strategy_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_published);
    assert_eq!(stored.published_url.as_deref(), body["url"].as_str());
}

#[tokio::test]
async fn test_replay_returns_already_published_without_second_call() {
    let h = harness();
    h.store
        .insert_strategy(strategy("s1", "local", "same text", Platform::Twitter));

    let request = post_json(
        "/distribute",
        &json!({ "strategyId": "s1", "platform": "x" }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let request = post_json(
        "/distribute",
        &json!({ "strategyId": "s1", "platform": "x" }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_published");
    assert_eq!(body["postId"], "stub-twitter-1");
    assert_eq!(h.twitter.calls(), 1);
}

#[tokio::test]
async fn test_changed_content_publishes_again() {
    let h = harness();
    h.store
        .insert_strategy(strategy("s1", "local", "first draft", Platform::Twitter));

    let request = post_json(
        "/distribute",
        &json!({ "strategyId": "s1", "platform": "x" }),
    );
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);

    // Edited content is a new publish intent, not a replay
    let request = post_json(
        "/distribute",
        &json!({ "strategyId": "s1", "platform": "x", "content": "second draft" }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(h.twitter.calls(), 2);
}

#[tokio::test]
async fn test_unknown_strategy_is_not_found() {
    let h = harness();

    let request = post_json("/linkedin/publish", &json!({ "strategyId": "nope" }));
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_foreign_user_is_forbidden() {
    let h = harness();
    h.store
        .insert_strategy(strategy("s1", "alice", "her post", Platform::Linkedin));

    let request = Request::builder()
        .method("POST")
        .uri("/linkedin/publish")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "bob")
        .body(Body::from(json!({ "strategyId": "s1" }).to_string()))
        .unwrap();

    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.linkedin.calls(), 0);
}

#[tokio::test]
async fn test_over_limit_content_is_rejected() {
    let h = harness();

    let request = post_json(
        "/distribute",
        &json!({ "platform": "x", "content": "a".repeat(281) }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("280"));
    assert_eq!(h.twitter.calls(), 0);
}

#[tokio::test]
async fn test_disabled_platform_is_rejected() {
    let h = harness_full(
        AuthConfig::default(),
        StubPublisher::new(Platform::Linkedin),
        StubPublisher::new(Platform::Twitter),
        false,
        true,
    );

    let request = post_json("/linkedin/publish", &json!({ "strategyId": "s1" }));
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("linkedin"));
    assert_eq!(h.linkedin.calls(), 0);
}

#[tokio::test]
async fn test_adapter_failure_maps_to_bad_gateway() {
    let h = harness_with(
        AuthConfig::default(),
        StubPublisher::new(Platform::Linkedin),
        StubPublisher::failing(
            Platform::Twitter,
            PublishError::Transient("connection reset".to_string()),
        ),
    );
    h.store
        .insert_strategy(strategy("s1", "local", "doomed", Platform::Twitter));

    let request = post_json(
        "/distribute",
        &json!({ "strategyId": "s1", "platform": "x" }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["errorCode"], "TRANSIENT");

    // The ledger row is FAILED and visible through the read endpoint
    let (status, body) = send(&h.app, get("/publications/s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publications"][0]["status"], "FAILED");
}

#[tokio::test]
async fn test_auth_expired_failure_maps_to_unauthorized() {
    let h = harness_with(
        AuthConfig::default(),
        StubPublisher::failing(
            Platform::Linkedin,
            PublishError::AuthExpired("token revoked".to_string()),
        ),
        StubPublisher::new(Platform::Twitter),
    );
    h.store
        .insert_strategy(strategy("s1", "local", "post", Platform::Linkedin));

    let request = post_json("/linkedin/publish", &json!({ "strategyId": "s1" }));
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errorCode"], "AUTH_EXPIRED");
}

#[tokio::test]
async fn test_distribute_then_keyed_replay_end_to_end() {
    let h = harness();

    // First publish: no strategy id, the boundary creates one
    let request = post_json(
        "/distribute",
        &json!({ "platform": "linkedin", "content": "launch post" }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let strategy_id = body["strategyId"].as_str().unwrap().to_string();

    // Replay with the explicit strategy id and the derived key
    let key = derive_idempotency_key(&strategy_id, Platform::Linkedin, "launch post");
    let request = post_json(
        "/distribute",
        &json!({
            "strategyId": strategy_id,
            "platform": "linkedin",
            "content": "launch post",
            "idempotencyKey": key,
        }),
    );
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "already_published");
    assert_eq!(body["strategyId"].as_str().unwrap(), strategy_id);
    assert_eq!(h.linkedin.calls(), 1);

    // Exactly one completed attempt row across both invocations
    let attempts = h.store.list(&strategy_id, Platform::Linkedin).await.unwrap();
    let completed = attempts
        .iter()
        .filter(|a| a.outcome == postflight_domain::AttemptOutcome::Completed)
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_publications_endpoint_shows_ledger_and_attempts() {
    let h = harness();
    h.store
        .insert_strategy(strategy("s1", "local", "the post", Platform::Linkedin));

    let request = post_json("/linkedin/publish", &json!({ "strategyId": "s1" }));
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.app, get("/publications/s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["strategyId"], "s1");

    let publication = &body["publications"][0];
    assert_eq!(publication["status"], "COMPLETED");
    assert_eq!(
        publication["idempotencyKey"],
        derive_idempotency_key("s1", Platform::Linkedin, "the post")
    );

    let attempts = body["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["outcome"], "started");
    assert_eq!(attempts[1]["outcome"], "completed");
}
