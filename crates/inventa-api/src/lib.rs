//! # inventa-api: Axum API Service for Inventa
//!
//! Back-office service for a technical school: reference catalogs,
//! warehouse stock, assets, workshop equipment, purchasing, material
//! requests, inventory write-offs, system-access profile requests and
//! personnel with fingerprint enrollment.
//!
//! ## API Surface
//!
//! | Prefix                          | Module                   | Domain                  |
//! |---------------------------------|--------------------------|-------------------------|
//! | `/v1/catalog/*`                 | [`routes::catalog`]      | Reference catalogs      |
//! | `/v1/catalog/equipment/*`       | [`routes::equipment`]    | Equipment, maintenance  |
//! | `/v1/warehouse/*`               | [`routes::warehouse`]    | Articles, stock         |
//! | `/v1/assets/*`                  | [`routes::assets`]       | Asset items, movements  |
//! | `/v1/purchasing/suppliers/*`    | [`routes::purchasing`]   | Suppliers               |
//! | `/v1/purchasing/orders/*`       | [`routes::purchasing`]   | Purchase orders         |
//! | `/v1/purchasing/*-receptions/*` | [`routes::receptions`]   | Receptions              |
//! | `/v1/requests/*`                | [`routes::requests`]     | Material requests       |
//! | `/v1/write-offs/*`              | [`routes::write_offs`]   | Inventory write-offs    |
//! | `/v1/profile-requests/*`        | [`routes::profiles`]     | Profile requests        |
//! | `/v1/personnel/*`               | [`routes::personnel`]    | Staff, fingerprints     |
//! | `/v1/metrics`                   | this module              | Prometheus exposition   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → RateLimitMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros and served at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::{require_role, AuthConfig, CallerIdentity, Role};
use crate::error::AppError;
use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::RateLimiter;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health checks (`/health/*`) are mounted outside the auth middleware so
/// they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(state.config.rate_limit);

    // Auth runs before rate limiting so rejected credentials never consume
    // a caller's budget.
    let api = Router::new()
        .merge(routes::catalog::router())
        .merge(routes::equipment::router())
        .merge(routes::warehouse::router())
        .merge(routes::assets::router())
        .merge(routes::purchasing::router())
        .merge(routes::receptions::router())
        .merge(routes::requests::router())
        .merge(routes::write_offs::router())
        .merge(routes::profiles::router())
        .merge(routes::personnel::router())
        .route("/v1/metrics", get(api_metrics))
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(limiter))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /v1/metrics: Prometheus text exposition.
///
/// Inventory gauges are refreshed from the stores before gathering.
async fn api_metrics(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> Result<Response, AppError> {
    require_role(&caller, Role::Viewer)?;
    metrics.observe_state(&state);
    let body = metrics.gather_and_encode().map_err(AppError::Internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check. Returns 503 when the configured database is unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
