//! # Integration Tests for inventa-api
//!
//! Drives the fully assembled router: health checks, bearer authentication
//! and roles, metrics, the OpenAPI document, and business flows that cross
//! catalogs, stock, purchasing, material requests and write-offs.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use rust_decimal::Decimal;

use inventa_api::auth::SecretToken;
use inventa_api::middleware::rate_limit::RateLimitConfig;
use inventa_api::state::{AppConfig, AppState};

const SECRET: &str = "s3cret";
const ADMIN: &str = "administrator::s3cret";
const OPERATOR: &str = "operator:00000000-0000-0000-0000-000000000001:s3cret";
const VIEWER: &str = "viewer::s3cret";

/// Helper: build the test app with auth disabled.
fn test_app() -> axum::Router {
    inventa_api::app(AppState::new())
}

/// Helper: build the test app with auth enabled.
fn test_app_with_auth() -> axum::Router {
    let config = AppConfig {
        auth_token: Some(SecretToken::new(SECRET)),
        ..AppConfig::default()
    };
    inventa_api::app(AppState::with_config(config, None))
}

/// Helper: send a request and decode the JSON body (or `Null` when empty).
async fn call(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// Helper: read a decimal field serialized as a string.
fn dec(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// Helper: create a record and return its id.
async fn create(app: &axum::Router, uri: &str, token: Option<&str>, body: Value) -> String {
    let (status, value) = call(app, "POST", uri, token, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "POST {uri}: {value}");
    value["id"].as_str().unwrap().to_string()
}

// -- Health Checks ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_check() {
    let (status, body) = call(&test_app_with_auth(), "GET", "/health/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_readiness_check_without_database() {
    let (status, body) = call(&test_app(), "GET", "/health/readiness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (status, body) = call(&test_app_with_auth(), "GET", "/v1/catalog/brands", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized() {
    let (status, _) = call(
        &test_app_with_auth(),
        "GET",
        "/v1/catalog/brands",
        Some("viewer::wrong"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_legacy_token_is_administrator() {
    let app = test_app_with_auth();
    let id = create(&app, "/v1/catalog/brands", Some(SECRET), json!({"code": "HP", "name": "HP"})).await;
    let (status, _) = call(&app, "DELETE", &format!("/v1/catalog/brands/{id}"), Some(SECRET), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_roles_gate_reads_writes_and_deletes() {
    let app = test_app_with_auth();

    let (status, _) = call(&app, "GET", "/v1/catalog/brands", Some(VIEWER), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/catalog/brands",
        Some(VIEWER),
        Some(json!({"code": "HP", "name": "HP"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let id = create(&app, "/v1/catalog/brands", Some(OPERATOR), json!({"code": "HP", "name": "HP"})).await;

    let (status, _) = call(&app, "DELETE", &format!("/v1/catalog/brands/{id}"), Some(OPERATOR), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "DELETE", &format!("/v1/catalog/brands/{id}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, "GET", &format!("/v1/catalog/brands/{id}"), Some(VIEWER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_applies_per_caller() {
    let config = AppConfig {
        auth_token: Some(SecretToken::new(SECRET)),
        rate_limit: RateLimitConfig {
            max_requests: 2,
            window_secs: 60,
        },
        ..AppConfig::default()
    };
    let app = inventa_api::app(AppState::with_config(config, None));

    for _ in 0..2 {
        let (status, _) = call(&app, "GET", "/v1/assets/units", Some(OPERATOR), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(&app, "GET", "/v1/assets/units", Some(OPERATOR), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // Health checks sit outside the limiter.
    let (status, _) = call(&app, "GET", "/health/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// -- Metrics and OpenAPI ------------------------------------------------------

#[tokio::test]
async fn test_metrics_count_client_errors() {
    let app = test_app();
    call(&app, "GET", "/v1/catalog/brands", None, None).await;
    call(&app, "GET", "/v1/catalog/brands/00000000-0000-0000-0000-000000000000", None, None).await;

    let (status, body) = call(&app, "GET", "/v1/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains(
        "inventa_http_requests_total{method=\"GET\",path=\"/v1/catalog/brands\",status=\"200\"} 1"
    ));
    assert!(text.contains(
        "inventa_http_errors_total{method=\"GET\",path=\"/v1/catalog/brands/{id}\",status=\"404\"} 1"
    ));
    assert!(text.contains("inventa_articles_low_stock 0"));
}

#[tokio::test]
async fn test_metrics_require_viewer_role() {
    let app = test_app_with_auth();
    let (status, _) = call(&app, "GET", "/v1/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call(&app, "GET", "/v1/metrics", Some(VIEWER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("inventa_http_request_duration_seconds"));
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let (status, body) = call(&test_app(), "GET", "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Inventa API");
    assert!(body["paths"]["/v1/requests/{id}/dispatch"].is_object());
}

// -- Error envelope -----------------------------------------------------------

#[tokio::test]
async fn test_validation_errors_carry_field_details() {
    let (status, body) = call(
        &test_app(),
        "POST",
        "/v1/purchasing/suppliers",
        None,
        Some(json!({"rut": "12.345.678-0", "business_name": "", "address": "Calle 1", "city": "Talca"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["rut"].is_string());
    assert!(body["error"]["details"]["business_name"].is_string());
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/catalog/brands")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

// -- Stock flow ---------------------------------------------------------------

struct Warehouse {
    app: axum::Router,
    warehouse: String,
    article: String,
    movement_type: String,
}

async fn warehouse_setup() -> Warehouse {
    let app = test_app();
    let category = create(&app, "/v1/warehouse/categories", None, json!({"code": "OF", "name": "Oficina"})).await;
    let warehouse = create(&app, "/v1/warehouse/warehouses", None, json!({"code": "B1", "name": "Bodega central"})).await;
    let movement_type = create(&app, "/v1/warehouse/movement-types", None, json!({"code": "AJ", "name": "Ajuste"})).await;
    let article = create(
        &app,
        "/v1/warehouse/articles",
        None,
        json!({
            "sku": "RESMA-A4",
            "code": "RESMA-A4",
            "name": "Resma carta A4",
            "category_id": category,
            "warehouse_id": warehouse,
            "initial_stock": "5",
            "minimum_stock": "2"
        }),
    )
    .await;
    Warehouse {
        app,
        warehouse,
        article,
        movement_type,
    }
}

#[tokio::test]
async fn test_exit_movement_updates_stock_and_low_stock_view() {
    let w = warehouse_setup().await;

    let (status, movement) = call(
        &w.app,
        "POST",
        "/v1/warehouse/movements",
        None,
        Some(json!({
            "article_id": w.article,
            "movement_type_id": w.movement_type,
            "operation": "EXIT",
            "quantity": "4",
            "reason": "entrega a taller"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{movement}");
    assert_eq!(dec(&movement["stock_before"]), Decimal::from(5));
    assert_eq!(dec(&movement["stock_after"]), Decimal::from(1));

    let (status, low) = call(&w.app, "GET", "/v1/warehouse/articles/low-stock", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = low.as_array().unwrap().iter().filter_map(|a| a["id"].as_str()).collect();
    assert!(ids.contains(&w.article.as_str()), "{low}");
}

#[tokio::test]
async fn test_exit_beyond_stock_leaves_article_untouched() {
    let w = warehouse_setup().await;

    let (status, body) = call(
        &w.app,
        "POST",
        "/v1/warehouse/movements",
        None,
        Some(json!({
            "article_id": w.article,
            "movement_type_id": w.movement_type,
            "operation": "EXIT",
            "quantity": "50",
            "reason": "error de digitación"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (_, article) = call(&w.app, "GET", &format!("/v1/warehouse/articles/{}", w.article), None, None).await;
    assert_eq!(dec(&article["stock"]), Decimal::from(5));
    let (_, movements) = call(
        &w.app,
        "GET",
        &format!("/v1/warehouse/articles/{}/movements", w.article),
        None,
        None,
    )
    .await;
    assert_eq!(movements.as_array().map_or(0, Vec::len), 0);
}

// -- Purchasing flow ----------------------------------------------------------

#[tokio::test]
async fn test_order_reception_raises_stock() {
    let w = warehouse_setup().await;
    create(
        &w.app,
        "/v1/purchasing/order-statuses",
        None,
        json!({"code": "BORRADOR", "name": "Borrador", "is_initial": true}),
    )
    .await;
    create(
        &w.app,
        "/v1/purchasing/reception-statuses",
        None,
        json!({"code": "PENDIENTE", "name": "Pendiente", "is_initial": true}),
    )
    .await;
    let supplier = create(
        &w.app,
        "/v1/purchasing/suppliers",
        None,
        json!({
            "rut": "76.086.428-5",
            "business_name": "Librería Central SpA",
            "address": "1 Sur 123",
            "city": "Talca",
            "email": "Ventas@Libreria.CL"
        }),
    )
    .await;

    let (status, order) = call(
        &w.app,
        "POST",
        "/v1/purchasing/orders",
        None,
        Some(json!({"supplier_id": supplier, "warehouse_id": w.warehouse})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["number"], "OC-00000001");

    let (status, order) = call(
        &w.app,
        "POST",
        &format!("/v1/purchasing/orders/{order_id}/article-lines"),
        None,
        Some(json!({"article_id": w.article, "quantity": "10", "unit_price": "1000"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(dec(&order["subtotal"]), Decimal::from(10_000));
    assert_eq!(dec(&order["tax"]), Decimal::from(1_900));
    assert_eq!(dec(&order["total"]), Decimal::from(11_900));

    let reception = create(
        &w.app,
        "/v1/purchasing/article-receptions",
        None,
        json!({"warehouse_id": w.warehouse, "order_id": order_id}),
    )
    .await;
    let (status, body) = call(
        &w.app,
        "POST",
        &format!("/v1/purchasing/article-receptions/{reception}/lines"),
        None,
        Some(json!({"article_id": w.article, "quantity": "10"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, article) = call(&w.app, "GET", &format!("/v1/warehouse/articles/{}", w.article), None, None).await;
    assert_eq!(dec(&article["stock"]), Decimal::from(15));
    let (_, order) = call(&w.app, "GET", &format!("/v1/purchasing/orders/{order_id}"), None, None).await;
    assert_eq!(dec(&order["lines"][0]["received_quantity"]), Decimal::from(10));
}

// -- Material request flow ----------------------------------------------------

#[tokio::test]
async fn test_request_approval_workflow() {
    let w = warehouse_setup().await;
    let request_type = create(&w.app, "/v1/requests/types", None, json!({"code": "ACT", "name": "Actividad"})).await;
    for (code, initial, is_final) in [
        ("PENDIENTE", true, false),
        ("APPROVED", false, false),
        ("REJECTED", false, true),
        ("DISPATCHED", false, true),
        ("CANCELLED", false, true),
    ] {
        create(
            &w.app,
            "/v1/requests/statuses",
            None,
            json!({"code": code, "name": code, "is_initial": initial, "is_final": is_final}),
        )
        .await;
    }

    let required = (Utc::now() + Duration::days(7)).date_naive();
    let (status, request) = call(
        &w.app,
        "POST",
        "/v1/requests",
        None,
        Some(json!({
            "kind": "ARTICLE",
            "request_type_id": request_type,
            "requester_area": "Taller eléctrico",
            "required_date": required,
            "origin_warehouse_id": w.warehouse,
            "reason": "práctica de segundo medio"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{request}");
    let id = request["id"].as_str().unwrap().to_string();
    assert!(request["number"].as_str().unwrap().starts_with("SOL-"));

    // Nothing to approve yet.
    let (status, _) = call(&w.app, "POST", &format!("/v1/requests/{id}/approve"), None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, request) = call(
        &w.app,
        "POST",
        &format!("/v1/requests/{id}/lines"),
        None,
        Some(json!({"article_id": w.article, "requested_quantity": "3"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{request}");
    let line = request["lines"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &w.app,
        "POST",
        &format!("/v1/requests/{id}/approve"),
        None,
        Some(json!({"lines": [{"line_id": line, "quantity": "4"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, approved) = call(
        &w.app,
        "POST",
        &format!("/v1/requests/{id}/approve"),
        None,
        Some(json!({"lines": [{"line_id": line, "approved_quantity": "2"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(dec(&approved["lines"][0]["approved_quantity"]), Decimal::from(2));

    let (status, _) = call(&w.app, "POST", &format!("/v1/requests/{id}/approve"), None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, dispatched) = call(
        &w.app,
        "POST",
        &format!("/v1/requests/{id}/dispatch"),
        None,
        Some(json!({"lines": [{"line_id": line, "dispatched_quantity": "2"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{dispatched}");
    assert_eq!(dispatched["history"].as_array().unwrap().len(), 3);

    let (status, body) = call(
        &w.app,
        "POST",
        &format!("/v1/requests/{id}/cancel"),
        None,
        Some(json!({"reason": "ya no se necesita"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

// -- Write-off flow -----------------------------------------------------------

#[tokio::test]
async fn test_write_off_confirmation_reduces_stock() {
    let w = warehouse_setup().await;
    for (code, initial, is_final) in [
        ("PENDIENTE", true, false),
        ("AUTHORIZED", false, false),
        ("REJECTED", false, true),
        ("CONFIRMED", false, true),
    ] {
        create(
            &w.app,
            "/v1/write-offs/statuses",
            None,
            json!({"code": code, "name": code, "is_initial": initial, "is_final": is_final}),
        )
        .await;
    }
    let reason = create(&w.app, "/v1/write-offs/reasons", None, json!({"code": "DETERIORO", "name": "Deterioro"})).await;
    create(&w.app, "/v1/warehouse/movement-types", None, json!({"code": "BAJA", "name": "Baja"})).await;

    let (status, write_off) = call(
        &w.app,
        "POST",
        "/v1/write-offs",
        None,
        Some(json!({
            "reason_id": reason,
            "warehouse_id": w.warehouse,
            "description": "Resmas mojadas por filtración"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{write_off}");
    assert_eq!(write_off["number"], "BAJA-00000001");
    let id = write_off["id"].as_str().unwrap().to_string();

    let (status, write_off) = call(
        &w.app,
        "POST",
        &format!("/v1/write-offs/{id}/lines"),
        None,
        Some(json!({"article_id": w.article, "quantity": "3", "unit_value": "2500"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{write_off}");
    assert_eq!(dec(&write_off["total_value"]), Decimal::from(7500));

    let (status, _) = call(&w.app, "POST", &format!("/v1/write-offs/{id}/confirm"), None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&w.app, "POST", &format!("/v1/write-offs/{id}/authorize"), None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, confirmed) = call(&w.app, "POST", &format!("/v1/write-offs/{id}/confirm"), None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{confirmed}");
    assert_eq!(confirmed["history"].as_array().unwrap().len(), 3);

    let (_, article) = call(&w.app, "GET", &format!("/v1/warehouse/articles/{}", w.article), None, None).await;
    assert_eq!(dec(&article["stock"]), Decimal::from(2));
    let (_, movements) = call(
        &w.app,
        "GET",
        &format!("/v1/warehouse/articles/{}/movements", w.article),
        None,
        None,
    )
    .await;
    assert_eq!(movements[0]["operation"], "EXIT");
    assert_eq!(dec(&movements[0]["quantity"]), Decimal::from(3));

    let (status, body) = call(&w.app, "DELETE", &format!("/v1/write-offs/reasons/{reason}"), None, None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}
