//! # Profile Requests
//!
//! System-access requests for new staff, countersigned by their manager.
//! Submitted as `PENDING`; an administrator reviews each one exactly once.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use inventa_core::text::optional;
use inventa_core::{Email, FieldErrors, Rut, WorkflowError};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::profiles::{ProfileRequest, ProfileStatus};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::state::AppState;

/// A profile request submission.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_names: String,
    pub rut: String,
    pub email: String,
    pub unit: String,
    pub staff_category: String,
    pub position: String,

    pub manager_first_name: String,
    pub manager_last_names: String,
    pub manager_rut: String,
    pub manager_email: String,
    pub manager_unit: String,
    pub manager_staff_category: String,
    pub manager_position: String,

    /// Systems access is requested for. At least one.
    #[serde(default)]
    pub systems: Vec<String>,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub homologation: Option<String>,
}

impl ProfileInput {
    fn systems(&self) -> Vec<String> {
        self.systems
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Validate for ProfileInput {
    fn validate(&self, errors: &mut FieldErrors) {
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_names", &self.last_names),
            ("unit", &self.unit),
            ("staff_category", &self.staff_category),
            ("position", &self.position),
            ("manager_first_name", &self.manager_first_name),
            ("manager_last_names", &self.manager_last_names),
            ("manager_unit", &self.manager_unit),
            ("manager_staff_category", &self.manager_staff_category),
            ("manager_position", &self.manager_position),
        ] {
            require_text(errors, field, value);
        }
        for (field, value) in [("rut", &self.rut), ("manager_rut", &self.manager_rut)] {
            if let Err(e) = Rut::new(value) {
                errors.add(field, e.to_string());
            }
        }
        for (field, value) in [("email", &self.email), ("manager_email", &self.manager_email)] {
            if let Err(e) = Email::new(value) {
                errors.add(field, e.to_string());
            }
        }
        errors.require(self.systems().is_empty(), "systems", "select at least one system");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

/// Review outcome.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewInput {
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for ReviewInput {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProfileQuery {
    pub status: Option<ProfileStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

/// Build the profile requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/profile-requests", get(list_profiles).post(create_profile))
        .route("/v1/profile-requests/:id", get(get_profile))
        .route("/v1/profile-requests/:id/review", post(review_profile))
}

fn find_profile(state: &AppState, id: Uuid) -> Result<ProfileRequest, AppError> {
    state
        .profile_requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("profile request {id} not found")))
}

/// Formatted RUT; only called on validated input.
fn formatted_rut(raw: &str) -> Result<String, AppError> {
    Ok(Rut::new(raw)?.formatted())
}

fn normalized_email(raw: &str) -> Result<String, AppError> {
    Ok(Email::new(raw)?.as_str().to_string())
}

/// GET /v1/profile-requests: List profile requests, newest first.
#[utoipa::path(
    get,
    path = "/v1/profile-requests",
    params(ProfileQuery),
    responses((status = 200, description = "Page of profile requests")),
    tag = "profiles"
)]
async fn list_profiles(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ProfileQuery>, QueryRejection>,
) -> Result<Json<Page<ProfileRequest>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;

    let mut profiles = state
        .profile_requests
        .filter(|p| query.status.map_or(true, |s| p.status == s));
    profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(Page::from_items(profiles, query.limit, query.offset)))
}

/// POST /v1/profile-requests: Submit a profile request.
#[utoipa::path(
    post,
    path = "/v1/profile-requests",
    request_body = ProfileInput,
    responses(
        (status = 201, description = "Request submitted", body = ProfileRequest),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "profiles"
)]
async fn create_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ProfileRequest>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let profile = ProfileRequest {
        id: Uuid::new_v4(),
        first_name: input.first_name.trim().to_string(),
        last_names: input.last_names.trim().to_string(),
        rut: formatted_rut(&input.rut)?,
        email: normalized_email(&input.email)?,
        unit: input.unit.trim().to_string(),
        staff_category: input.staff_category.trim().to_string(),
        position: input.position.trim().to_string(),
        manager_first_name: input.manager_first_name.trim().to_string(),
        manager_last_names: input.manager_last_names.trim().to_string(),
        manager_rut: formatted_rut(&input.manager_rut)?,
        manager_email: normalized_email(&input.manager_email)?,
        manager_unit: input.manager_unit.trim().to_string(),
        manager_staff_category: input.manager_staff_category.trim().to_string(),
        manager_position: input.manager_position.trim().to_string(),
        systems: input.systems(),
        permissions: optional(input.permissions),
        homologation: optional(input.homologation),
        status: ProfileStatus::Pending,
        reviewed_by: None,
        reviewed_at: None,
        review_notes: None,
        created_at: Utc::now(),
    };

    let _gate = state.write_lock().await;
    let profile = state.save(&state.profile_requests, profile).await?;
    tracing::info!(id = %profile.id, rut = %profile.rut, "profile request submitted");
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /v1/profile-requests/:id: Fetch a profile request.
#[utoipa::path(
    get,
    path = "/v1/profile-requests/{id}",
    params(("id" = Uuid, Path, description = "Profile request ID")),
    responses(
        (status = 200, description = "Profile request", body = ProfileRequest),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "profiles"
)]
async fn get_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileRequest>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_profile(&state, id).map(Json)
}

/// POST /v1/profile-requests/:id/review: Approve or reject a pending request.
#[utoipa::path(
    post,
    path = "/v1/profile-requests/{id}/review",
    params(("id" = Uuid, Path, description = "Profile request ID")),
    request_body = ReviewInput,
    responses(
        (status = 200, description = "Request reviewed", body = ProfileRequest),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already reviewed", body = crate::error::ErrorBody),
    ),
    tag = "profiles"
)]
async fn review_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<ProfileRequest>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut profile = find_profile(&state, id)?;
    if profile.status != ProfileStatus::Pending {
        return Err(WorkflowError::NotAllowed(format!(
            "profile request {id} was already reviewed"
        ))
        .into());
    }

    profile.status = match input.decision {
        Decision::Approved => ProfileStatus::Approved,
        Decision::Rejected => ProfileStatus::Rejected,
    };
    profile.reviewed_by = caller.user_id;
    profile.reviewed_at = Some(Utc::now());
    profile.review_notes = optional(input.notes);

    let profile = state.save(&state.profile_requests, profile).await?;
    tracing::info!(id = %profile.id, status = ?profile.status, "profile request reviewed");
    Ok(Json(profile))
}
