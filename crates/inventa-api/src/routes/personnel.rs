//! # Personnel and Fingerprint Enrollment
//!
//! Routes:
//! - GET    /v1/personnel                    list (search, status, include_deleted)
//! - POST   /v1/personnel                    create
//! - GET    /v1/personnel/stats              totals over non-deleted members
//! - POST   /v1/personnel/identify           member enrolled with a template hash
//! - GET    /v1/personnel/:id                fetch
//! - PUT    /v1/personnel/:id                update
//! - DELETE /v1/personnel/:id                soft delete
//! - POST   /v1/personnel/:id/fingerprint    enroll a capture result
//! - GET    /v1/personnel/:id/fingerprint    stored enrollment
//!
//! Enrollment keeps only the template hash and capture metadata. The raw
//! template and preview image are verified and then dropped.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use inventa_biometric::CaptureResult;
use inventa_core::text::contains_ci;
use inventa_core::{Email, FieldErrors};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::personnel::{FingerprintEnrollment, StaffMember, StaffStatus};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::state::AppState;

/// Captures scored below this are refused.
pub const MIN_FINGERPRINT_QUALITY: u8 = 40;

/// Request to create or update a staff member.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StaffInput {
    pub first_names: String,
    pub last_names: String,
    pub email: String,
    #[serde(default)]
    pub status: Option<StaffStatus>,
}

impl Validate for StaffInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "first_names", &self.first_names);
        require_text(errors, "last_names", &self.last_names);
        if let Err(e) = Email::new(&self.email) {
            errors.add("email", e.to_string());
        }
    }
}

impl Validate for CaptureResult {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "template", &self.template);
        errors.require(
            !self.template.is_empty() && !self.verify(),
            "hash",
            "does not match the SHA-256 of the template",
        );
        errors.require(
            self.quality.is_some_and(|q| q < MIN_FINGERPRINT_QUALITY),
            "quality",
            "capture quality is too low, scan again",
        );
    }
}

/// Lookup by template hash.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IdentifyInput {
    pub hash: String,
}

impl Validate for IdentifyInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "hash", &self.hash);
    }
}

/// Member counts over non-deleted staff.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StaffStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StaffQuery {
    /// Case-insensitive match on names and email.
    pub search: Option<String>,
    pub status: Option<StaffStatus>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

/// Build the personnel router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/personnel", get(list_staff).post(create_staff))
        .route("/v1/personnel/stats", get(staff_stats))
        .route("/v1/personnel/identify", post(identify))
        .route(
            "/v1/personnel/:id",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
        .route(
            "/v1/personnel/:id/fingerprint",
            get(get_fingerprint).post(enroll_fingerprint),
        )
}

fn find_member(state: &AppState, id: Uuid) -> Result<StaffMember, AppError> {
    state
        .staff
        .get(&id)
        .filter(|m| !m.deleted)
        .ok_or_else(|| AppError::NotFound(format!("staff member {id} not found")))
}

/// Normalized email, unique among non-deleted members other than `id`.
fn unique_email(state: &AppState, raw: &str, id: Option<Uuid>) -> Result<String, AppError> {
    let email = Email::new(raw)?.as_str().to_string();
    if state
        .staff
        .any(|m| !m.deleted && Some(m.id) != id && m.email == email)
    {
        return Err(AppError::field("email", "a staff member with this email already exists"));
    }
    Ok(email)
}

/// GET /v1/personnel: List staff members by last name.
#[utoipa::path(
    get,
    path = "/v1/personnel",
    params(StaffQuery),
    responses((status = 200, description = "Page of staff members")),
    tag = "personnel"
)]
async fn list_staff(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<StaffQuery>, QueryRejection>,
) -> Result<Json<Page<StaffMember>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let search = inventa_core::text::optional(query.search);

    let mut members = state.staff.filter(|m| {
        (query.include_deleted || !m.deleted)
            && query.status.map_or(true, |s| m.status == s)
            && search.as_deref().map_or(true, |q| {
                contains_ci(&m.first_names, q)
                    || contains_ci(&m.last_names, q)
                    || contains_ci(&m.email, q)
            })
    });
    members.sort_by(|a, b| {
        a.last_names
            .to_lowercase()
            .cmp(&b.last_names.to_lowercase())
            .then_with(|| a.first_names.to_lowercase().cmp(&b.first_names.to_lowercase()))
    });

    Ok(Json(Page::from_items(members, query.limit, query.offset)))
}

/// GET /v1/personnel/stats: Member counts.
#[utoipa::path(
    get,
    path = "/v1/personnel/stats",
    responses((status = 200, description = "Counts over non-deleted members", body = StaffStats)),
    tag = "personnel"
)]
async fn staff_stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<StaffStats>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let active = state
        .staff
        .count(|m| !m.deleted && m.status == StaffStatus::Active);
    let inactive = state
        .staff
        .count(|m| !m.deleted && m.status == StaffStatus::Inactive);
    Ok(Json(StaffStats {
        total: active + inactive,
        active,
        inactive,
    }))
}

/// POST /v1/personnel: Register a staff member.
#[utoipa::path(
    post,
    path = "/v1/personnel",
    request_body = StaffInput,
    responses(
        (status = 201, description = "Member created", body = StaffMember),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn create_staff(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<StaffInput>, JsonRejection>,
) -> Result<(StatusCode, Json<StaffMember>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let email = unique_email(&state, &input.email, None)?;
    let now = Utc::now();
    let member = StaffMember {
        id: Uuid::new_v4(),
        first_names: input.first_names.trim().to_string(),
        last_names: input.last_names.trim().to_string(),
        email,
        status: input.status.unwrap_or_default(),
        deleted: false,
        fingerprint: None,
        created_at: now,
        updated_at: now,
    };

    let member = state.save(&state.staff, member).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// GET /v1/personnel/:id: Fetch a staff member.
#[utoipa::path(
    get,
    path = "/v1/personnel/{id}",
    params(("id" = Uuid, Path, description = "Staff member ID")),
    responses(
        (status = 200, description = "Staff member", body = StaffMember),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn get_staff(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<StaffMember>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_member(&state, id).map(Json)
}

/// PUT /v1/personnel/:id: Update a staff member.
#[utoipa::path(
    put,
    path = "/v1/personnel/{id}",
    params(("id" = Uuid, Path, description = "Staff member ID")),
    request_body = StaffInput,
    responses(
        (status = 200, description = "Member updated", body = StaffMember),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn update_staff(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<StaffInput>, JsonRejection>,
) -> Result<Json<StaffMember>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut member = find_member(&state, id)?;
    member.email = unique_email(&state, &input.email, Some(id))?;
    member.first_names = input.first_names.trim().to_string();
    member.last_names = input.last_names.trim().to_string();
    if let Some(status) = input.status {
        member.status = status;
    }
    member.updated_at = Utc::now();

    let member = state.save(&state.staff, member).await?;
    Ok(Json(member))
}

/// DELETE /v1/personnel/:id: Soft-delete a staff member.
#[utoipa::path(
    delete,
    path = "/v1/personnel/{id}",
    params(("id" = Uuid, Path, description = "Staff member ID")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn delete_staff(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Administrator)?;

    let _gate = state.write_lock().await;
    let mut member = find_member(&state, id)?;
    member.deleted = true;
    member.status = StaffStatus::Inactive;
    member.updated_at = Utc::now();

    state.save(&state.staff, member).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/personnel/:id/fingerprint: Enroll a capture result.
///
/// The body is the reader's capture result. The hash must match the
/// template, and low-quality captures are refused. Re-enrolling replaces
/// the previous enrollment.
#[utoipa::path(
    post,
    path = "/v1/personnel/{id}/fingerprint",
    params(("id" = Uuid, Path, description = "Staff member ID")),
    request_body = Object,
    responses(
        (status = 201, description = "Fingerprint enrolled", body = FingerprintEnrollment),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Hash mismatch or low quality", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn enroll_fingerprint(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CaptureResult>, JsonRejection>,
) -> Result<(StatusCode, Json<FingerprintEnrollment>), AppError> {
    require_role(&caller, Role::Operator)?;
    let capture = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut member = find_member(&state, id)?;
    let hash = capture.hash.to_ascii_lowercase();
    if state
        .staff
        .any(|m| !m.deleted && m.id != id && m.fingerprint.as_ref().is_some_and(|f| f.hash == hash))
    {
        return Err(AppError::Conflict(
            "this fingerprint is already enrolled for another member".into(),
        ));
    }

    let enrollment = FingerprintEnrollment {
        hash,
        quality: capture.quality,
        device_id: capture.device_id,
        enrolled_at: Utc::now(),
        enrolled_by: caller.user_id,
    };
    member.fingerprint = Some(enrollment.clone());
    member.updated_at = enrollment.enrolled_at;

    state.save(&state.staff, member).await?;
    tracing::info!(member = %id, quality = ?enrollment.quality, "fingerprint enrolled");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// GET /v1/personnel/:id/fingerprint: Stored enrollment.
#[utoipa::path(
    get,
    path = "/v1/personnel/{id}/fingerprint",
    params(("id" = Uuid, Path, description = "Staff member ID")),
    responses(
        (status = 200, description = "Enrollment", body = FingerprintEnrollment),
        (status = 404, description = "Member not found or not enrolled", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn get_fingerprint(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<FingerprintEnrollment>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_member(&state, id)?
        .fingerprint
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("staff member {id} has no fingerprint enrolled")))
}

/// POST /v1/personnel/identify: Find the member enrolled with a hash.
#[utoipa::path(
    post,
    path = "/v1/personnel/identify",
    request_body = IdentifyInput,
    responses(
        (status = 200, description = "Matching member", body = StaffMember),
        (status = 404, description = "No member enrolled with this hash", body = crate::error::ErrorBody),
    ),
    tag = "personnel"
)]
async fn identify(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<IdentifyInput>, JsonRejection>,
) -> Result<Json<StaffMember>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let input = extract_validated_json(body)?;
    let hash = input.hash.trim().to_ascii_lowercase();

    state
        .staff
        .find(|m| !m.deleted && m.fingerprint.as_ref().is_some_and(|f| f.hash == hash))
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no staff member is enrolled with this fingerprint".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use inventa_biometric::template_hash;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let app = router()
            .layer(axum::Extension(CallerIdentity::system()))
            .with_state(state.clone());
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn member(state: &AppState, email: &str) -> String {
        let (status, body) = send(
            state,
            "POST",
            "/v1/personnel",
            Some(json!({"first_names": "Ana María", "last_names": "Pérez", "email": email})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn email_is_unique_among_live_members() {
        let state = AppState::new();
        let first = member(&state, "ana@example.cl").await;

        let (status, body) = send(
            &state,
            "POST",
            "/v1/personnel",
            Some(json!({"first_names": "Otra", "last_names": "Persona", "email": "ANA@example.cl"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["email"].is_string());

        let (status, _) = send(
            &state,
            "PUT",
            &format!("/v1/personnel/{first}"),
            Some(json!({"first_names": "Ana", "last_names": "Pérez", "email": "ana@example.cl"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&state, "DELETE", &format!("/v1/personnel/{first}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        member(&state, "ana@example.cl").await;
    }

    #[tokio::test]
    async fn stats_and_listing_skip_deleted() {
        let state = AppState::new();
        let a = member(&state, "a@example.cl").await;
        member(&state, "b@example.cl").await;
        let c = member(&state, "c@example.cl").await;
        send(
            &state,
            "PUT",
            &format!("/v1/personnel/{a}"),
            Some(json!({"first_names": "A", "last_names": "Z", "email": "a@example.cl", "status": "inactive"})),
        )
        .await;
        send(&state, "DELETE", &format!("/v1/personnel/{c}"), None).await;

        let (status, stats) = send(&state, "GET", "/v1/personnel/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats, json!({"total": 2, "active": 1, "inactive": 1}));

        let (_, page) = send(&state, "GET", "/v1/personnel", None).await;
        assert_eq!(page["total"], 2);
        let (_, page) = send(&state, "GET", "/v1/personnel?include_deleted=true", None).await;
        assert_eq!(page["total"], 3);
        let (_, page) = send(&state, "GET", "/v1/personnel?search=B%40EXAMPLE", None).await;
        assert_eq!(page["total"], 1);
    }

    #[tokio::test]
    async fn enrollment_verifies_hash_and_quality() {
        let state = AppState::new();
        let id = member(&state, "ana@example.cl").await;
        let uri = format!("/v1/personnel/{id}/fingerprint");

        let (status, _) = send(&state, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &state,
            "POST",
            &uri,
            Some(json!({"template": "minutiae-1", "hash": "deadbeef", "quality": 90})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["hash"].is_string());

        let hash = template_hash("minutiae-1");
        let (status, body) = send(
            &state,
            "POST",
            &uri,
            Some(json!({"template": "minutiae-1", "hash": hash, "quality": 39})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["quality"].is_string());

        let (status, body) = send(
            &state,
            "POST",
            &uri,
            Some(json!({
                "template": "minutiae-1",
                "hash": hash,
                "quality": 40,
                "device_id": "U4500",
                "image": "iVBORw0KGgo="
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["hash"], hash);
        assert!(body.get("template").is_none());
        assert!(body.get("image").is_none());

        let (status, body) = send(&state, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["device_id"], "U4500");
    }

    #[tokio::test]
    async fn identify_by_hash() {
        let state = AppState::new();
        let id = member(&state, "ana@example.cl").await;
        let hash = template_hash("minutiae-2");
        send(
            &state,
            "POST",
            &format!("/v1/personnel/{id}/fingerprint"),
            Some(json!({"template": "minutiae-2", "hash": hash})),
        )
        .await;

        let (status, body) = send(
            &state,
            "POST",
            "/v1/personnel/identify",
            Some(json!({"hash": hash.to_uppercase()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);

        let (status, _) = send(
            &state,
            "POST",
            "/v1/personnel/identify",
            Some(json!({"hash": template_hash("someone-else")})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
