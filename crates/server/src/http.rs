//! HTTP boundary: router, handlers, and bearer auth
//!
//! Outcome-to-status mapping: completed and already_published are 200,
//! an in-flight duplicate is 409, adapter failures surface as 401, 422,
//! or 502 depending on the error class.

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use postflight_domain::usecases::PublishEngine;
use postflight_domain::{
    AccessTokenProvider, AttemptLog, Clock, EngineError, NewStrategy, Platform, PublicationLedger,
    PublishAttempt, PublishError, PublishOutcome, PublishRequest, PublicationRecord, StrategyStore,
    validate_content,
};

/// Engine wired over trait objects, as the handlers hold it
pub type DynPublishEngine = PublishEngine<
    dyn PublicationLedger,
    dyn AttemptLog,
    dyn StrategyStore,
    dyn AccessTokenProvider,
    dyn Clock,
>;

/// Bearer auth settings. An absent token disables authentication.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub bearer_token: Option<SecretString>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: DynPublishEngine,
    pub strategies: Arc<dyn StrategyStore>,
    pub ledger: Arc<dyn PublicationLedger>,
    pub attempts: Arc<dyn AttemptLog>,
    pub auth: AuthConfig,
    pub default_user_id: String,
    pub linkedin_enabled: bool,
    pub x_enabled: bool,
}

/// Build the application router. `/health` is public; everything else
/// sits behind bearer auth when a token is configured.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/distribute", post(distribute))
        .route("/linkedin/publish", post(linkedin_publish))
        .route("/publications/{strategy_id}", get(get_publications))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.auth.bearer_token else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected.expose_secret() => next.run(request).await,
        _ => ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid or missing bearer token",
        )
        .into_response(),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Error responses carry a single `error` field
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::StrategyNotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            EngineError::NotOwner { .. } => ApiError::new(StatusCode::FORBIDDEN, err.to_string()),
            EngineError::Store(e) => {
                error!(error = %e, "Store failure during publish");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeRequest {
    /// Existing strategy to publish. Omit to create one from `content`.
    pub strategy_id: Option<String>,
    pub platform: Platform,
    /// Post text; overrides the strategy's stored content when both are
    /// present, required when no strategy id is given
    pub content: Option<String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    /// Client-supplied idempotency key; derived from the content when
    /// absent
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInPublishRequest {
    pub strategy_id: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    success: bool,
    status: &'static str,
    strategy_id: String,
    platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn distribute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DistributeRequest>,
) -> Result<Response, ApiError> {
    let user_id = acting_user(&headers, &state);
    ensure_platform_enabled(&state, body.platform)?;

    let (strategy_id, content) = match body.strategy_id {
        Some(strategy_id) => {
            let strategy = state
                .strategies
                .get(&strategy_id)
                .await
                .map_err(|e| ApiError::from(EngineError::Store(e)))?
                .ok_or_else(|| {
                    ApiError::new(
                        StatusCode::NOT_FOUND,
                        format!("Strategy not found: {}", strategy_id),
                    )
                })?;
            let content = body.content.unwrap_or(strategy.content);
            (strategy_id, content)
        }
        None => {
            let content = body.content.ok_or_else(|| {
                ApiError::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Either strategyId or content is required",
                )
            })?;
            let strategy = state
                .strategies
                .create(
                    NewStrategy {
                        content: content.clone(),
                        platform: body.platform,
                        author_id: user_id.clone(),
                        title: body.title,
                    },
                    time::OffsetDateTime::now_utc(),
                )
                .await
                .map_err(|e| ApiError::from(EngineError::Store(e)))?;
            (strategy.id, content)
        }
    };

    validate_content(body.platform, &content)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let outcome = state
        .engine
        .execute(PublishRequest {
            strategy_id: strategy_id.clone(),
            platform: body.platform,
            user_id,
            content,
            image_url: body.image_url,
            idempotency_key: body.idempotency_key,
        })
        .await?;

    Ok(outcome_response(strategy_id, body.platform, outcome))
}

async fn linkedin_publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LinkedInPublishRequest>,
) -> Result<Response, ApiError> {
    let user_id = acting_user(&headers, &state);
    ensure_platform_enabled(&state, Platform::Linkedin)?;

    let strategy = state
        .strategies
        .get(&body.strategy_id)
        .await
        .map_err(|e| ApiError::from(EngineError::Store(e)))?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                format!("Strategy not found: {}", body.strategy_id),
            )
        })?;
    let content = body.content.unwrap_or(strategy.content);

    validate_content(Platform::Linkedin, &content)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let outcome = state
        .engine
        .execute(PublishRequest {
            strategy_id: body.strategy_id.clone(),
            platform: Platform::Linkedin,
            user_id,
            content,
            image_url: body.image_url,
            idempotency_key: body.idempotency_key,
        })
        .await?;

    Ok(outcome_response(body.strategy_id, Platform::Linkedin, outcome))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicationsResponse {
    strategy_id: String,
    publications: Vec<PublicationRecord>,
    attempts: Vec<PublishAttempt>,
}

async fn get_publications(
    State(state): State<AppState>,
    Path(strategy_id): Path<String>,
) -> Result<Json<PublicationsResponse>, ApiError> {
    let mut publications = Vec::new();
    let mut attempts = Vec::new();

    for platform in Platform::ALL {
        if let Some(record) = state
            .ledger
            .get(&strategy_id, platform)
            .await
            .map_err(|e| ApiError::from(EngineError::Store(e)))?
        {
            publications.push(record);
        }
        attempts.extend(
            state
                .attempts
                .list(&strategy_id, platform)
                .await
                .map_err(|e| ApiError::from(EngineError::Store(e)))?,
        );
    }

    attempts.sort_by_key(|a| a.timestamp);

    Ok(Json(PublicationsResponse {
        strategy_id,
        publications,
        attempts,
    }))
}

fn acting_user(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.default_user_id.clone())
}

fn ensure_platform_enabled(state: &AppState, platform: Platform) -> Result<(), ApiError> {
    let enabled = match platform {
        Platform::Linkedin => state.linkedin_enabled,
        Platform::Twitter => state.x_enabled,
    };
    if enabled {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Platform not enabled: {}", platform),
        ))
    }
}

fn outcome_response(strategy_id: String, platform: Platform, outcome: PublishOutcome) -> Response {
    let (status, body) = match outcome {
        PublishOutcome::Completed { external_id, url } => (
            StatusCode::OK,
            PublishResponse {
                success: true,
                status: "completed",
                strategy_id,
                platform,
                post_id: Some(external_id),
                url: Some(url),
                message: Some(format!("Published to {}", platform)),
                error_code: None,
                error: None,
            },
        ),
        PublishOutcome::AlreadyPublished { external_id, url } => (
            StatusCode::OK,
            PublishResponse {
                success: true,
                status: "already_published",
                strategy_id,
                platform,
                post_id: Some(external_id),
                url,
                message: Some(format!("Already published to {}", platform)),
                error_code: None,
                error: None,
            },
        ),
        PublishOutcome::InProgress => (
            StatusCode::CONFLICT,
            PublishResponse {
                success: false,
                status: "in_progress",
                strategy_id,
                platform,
                post_id: None,
                url: None,
                message: None,
                error_code: None,
                error: Some("Another publish attempt is in progress; retry shortly".to_string()),
            },
        ),
        PublishOutcome::Failed { error } => (
            failure_status(&error),
            PublishResponse {
                success: false,
                status: "failed",
                strategy_id,
                platform,
                post_id: None,
                url: None,
                message: None,
                error_code: Some(error.code()),
                error: Some(truncate(&error.to_string(), 300)),
            },
        ),
    };

    (status, Json(body)).into_response()
}

fn failure_status(error: &PublishError) -> StatusCode {
    match error {
        PublishError::AuthExpired(_) => StatusCode::UNAUTHORIZED,
        PublishError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PublishError::Transient(_) | PublishError::RateLimited => StatusCode::BAD_GATEWAY,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
