//! # Integration Tests for the CLI's API calls
//!
//! Runs seeding and fingerprint enrollment against wiremock servers to
//! check request construction, idempotency, and error reporting.

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inventa_biometric::{template_hash, CaptureResult};
use inventa_cli::api::ApiClient;
use inventa_cli::fingerprint::enroll;
use inventa_cli::seed::{seed, SeedRecord};

fn empty_page() -> serde_json::Value {
    json!({"items": [], "total": 0, "limit": 1000, "offset": 0})
}

#[tokio::test]
async fn seed_creates_only_missing_codes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/assets/units"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": Uuid::nil(), "code": "UN", "name": "Unidad"}],
            "total": 1, "limit": 1000, "offset": 0
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/warehouse/movement-types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/warehouse/movement-types"))
        .and(header("Authorization", "Bearer administrator::s3cret"))
        .and(body_partial_json(json!({"code": "AJUSTE"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": Uuid::nil(), "code": "AJUSTE"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/assets/units"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let records = vec![
        SeedRecord {
            path: "assets/units".into(),
            code: "UN".into(),
            body: json!({"code": "UN", "name": "Unidad"}),
        },
        SeedRecord {
            path: "warehouse/movement-types".into(),
            code: "AJUSTE".into(),
            body: json!({"code": "AJUSTE", "name": "Ajuste"}),
        },
    ];
    let api = ApiClient::new(&server.uri(), Some("administrator::s3cret")).unwrap();
    let report = seed(&api, &records).await.unwrap();

    assert_eq!(report.created, vec!["warehouse/movement-types/AJUSTE".to_string()]);
    assert_eq!(report.skipped, vec!["assets/units/UN".to_string()]);
}

#[tokio::test]
async fn seed_surfaces_api_error_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/assets/states"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "FORBIDDEN", "message": "role 'operator' required, caller has 'viewer'"}
        })))
        .mount(&server)
        .await;

    let records = vec![SeedRecord {
        path: "assets/states".into(),
        code: "DISPONIBLE".into(),
        body: json!({"code": "DISPONIBLE", "name": "Disponible", "is_initial": true}),
    }];
    let api = ApiClient::new(&server.uri(), Some("viewer::s3cret")).unwrap();
    let err = seed(&api, &records).await.unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("403"), "{text}");
    assert!(text.contains("role 'operator' required"), "{text}");
}

#[tokio::test]
async fn enroll_posts_capture_for_staff_member() {
    let server = MockServer::start().await;
    let staff_id = Uuid::new_v4();
    let template = "template-bytes";
    let hash = template_hash(template);

    Mock::given(method("POST"))
        .and(path(format!("/v1/personnel/{staff_id}/fingerprint")))
        .and(body_partial_json(json!({"template": template, "hash": hash, "quality": 87})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "hash": hash,
            "quality": 87,
            "enrolled_at": "2026-10-19T12:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let capture = CaptureResult {
        template: template.into(),
        hash: hash.clone(),
        image: None,
        quality: Some(87),
        device_id: Some("SIM-0001".into()),
    };
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let enrollment = enroll(&api, staff_id, &capture).await.unwrap();
    assert_eq!(enrollment["hash"], hash);
}

#[tokio::test]
async fn enroll_reports_duplicate_fingerprint() {
    let server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(format!("/v1/personnel/{staff_id}/fingerprint")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": "CONFLICT", "message": "fingerprint already enrolled for another staff member"}
        })))
        .mount(&server)
        .await;

    let capture = CaptureResult {
        template: "t".into(),
        hash: template_hash("t"),
        image: None,
        quality: Some(90),
        device_id: None,
    };
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let err = enroll(&api, staff_id, &capture).await.unwrap_err();
    assert!(format!("{err:#}").contains("already enrolled"));
}
