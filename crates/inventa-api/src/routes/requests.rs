//! # Material Requests
//!
//! Staff ask the warehouse for articles or assets. A request is created in
//! the initial status, collects lines, and then moves through the workflow
//! by status code: `APPROVED`, `REJECTED`, `DISPATCHED`, `CANCELLED`.
//! Every transition appends a history entry.
//!
//! Dispatch records quantities only; stock changes go through warehouse
//! movements.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use inventa_core::numbering::{self, MATERIAL_REQUEST};
use inventa_core::text::optional;
use inventa_core::{Audit, FieldErrors, WorkflowError};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::catalog::RequestStatus;
use crate::models::requests::{MaterialRequest, RequestKind, RequestLine, StatusChange};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::routes::catalog::{by_code, check_optional_ref, check_ref, initial_status};
use crate::routes::purchasing::assign_number;
use crate::state::AppState;

const APPROVED: &str = "APPROVED";
const REJECTED: &str = "REJECTED";
const DISPATCHED: &str = "DISPATCHED";
const CANCELLED: &str = "CANCELLED";

// -- Request types ---------------------------------------------------------------

/// Request to open a material request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestInput {
    pub kind: RequestKind,
    /// Assigned automatically when omitted.
    #[serde(default)]
    pub number: Option<String>,
    pub request_type_id: Uuid,
    pub requester_area: String,
    #[serde(default)]
    pub activity_title: Option<String>,
    #[serde(default)]
    pub activity_goal: Option<String>,
    pub required_date: NaiveDate,
    /// Required for article requests.
    #[serde(default)]
    pub origin_warehouse_id: Option<Uuid>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for RequestInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "requester_area", &self.requester_area);
        require_text(errors, "reason", &self.reason);
        errors.require(
            self.required_date < Utc::now().date_naive(),
            "required_date",
            "must not be in the past",
        );
        errors.require(
            self.kind == RequestKind::Article && self.origin_warehouse_id.is_none(),
            "origin_warehouse_id",
            "article requests need an origin warehouse",
        );
    }
}

/// A requested article or asset; which one must match the request kind.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestLineInput {
    #[serde(default)]
    pub article_id: Option<Uuid>,
    #[serde(default)]
    pub asset_id: Option<Uuid>,
    pub requested_quantity: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for RequestLineInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(
            self.requested_quantity <= Decimal::ZERO,
            "requested_quantity",
            "must be greater than zero",
        );
    }
}

/// Quantity decided for one line during approval or dispatch.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LineQuantity {
    pub line_id: Uuid,
    #[serde(alias = "approved_quantity", alias = "dispatched_quantity")]
    pub quantity: Decimal,
}

/// Approval or dispatch decision.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DecisionInput {
    /// Lines not listed keep the default: approved in full on approval,
    /// untouched on dispatch.
    #[serde(default)]
    pub lines: Vec<LineQuantity>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for DecisionInput {
    fn validate(&self, errors: &mut FieldErrors) {
        for (i, line) in self.lines.iter().enumerate() {
            errors.require(
                line.quantity < Decimal::ZERO,
                &format!("lines[{i}].quantity"),
                "must not be negative",
            );
        }
    }
}

/// Rejection or cancellation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReasonInput {
    pub reason: String,
}

impl Validate for ReasonInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "reason", &self.reason);
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RequestQuery {
    pub status_id: Option<Uuid>,
    pub kind: Option<RequestKind>,
    pub requested_by: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

// -- Router ------------------------------------------------------------------------

/// Build the material requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", get(list_requests).post(create_request))
        .route("/v1/requests/:id", get(get_request))
        .route("/v1/requests/:id/lines", post(add_line))
        .route("/v1/requests/:id/lines/:line_id", delete(remove_line))
        .route("/v1/requests/:id/approve", post(approve))
        .route("/v1/requests/:id/reject", post(reject))
        .route("/v1/requests/:id/dispatch", post(dispatch))
        .route("/v1/requests/:id/cancel", post(cancel))
}

// -- Helpers -----------------------------------------------------------------------

fn find_request(state: &AppState, id: Uuid) -> Result<MaterialRequest, AppError> {
    state
        .requests
        .get(&id)
        .filter(|r| r.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))
}

/// Refuse changes to a request in a final status.
fn ensure_open(state: &AppState, request: &MaterialRequest) -> Result<(), AppError> {
    match state.request_statuses.get(&request.status_id) {
        Some(status) if status.fields.is_final => Err(WorkflowError::Final {
            document: format!("request {}", request.number),
            status: status.code,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Workflow target status looked up by code.
fn target_status(state: &AppState, code: &str) -> Result<RequestStatus, AppError> {
    by_code(&state.request_statuses, code)
        .ok_or_else(|| AppError::Validation(format!("request status {code} is not configured")))
}

/// Line index by id, or a field error naming the offending entry.
fn line_index(
    request: &MaterialRequest,
    entry: usize,
    line_id: Uuid,
    errors: &mut FieldErrors,
) -> Option<usize> {
    let index = request.lines.iter().position(|l| l.id == line_id);
    if index.is_none() {
        errors.add(format!("lines[{entry}].line_id"), "line does not belong to this request");
    }
    index
}

// -- Handlers ----------------------------------------------------------------------

/// GET /v1/requests: List requests, newest first.
#[utoipa::path(
    get,
    path = "/v1/requests",
    params(RequestQuery),
    responses((status = 200, description = "Page of requests")),
    tag = "requests"
)]
async fn list_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<RequestQuery>, QueryRejection>,
) -> Result<Json<Page<MaterialRequest>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;

    let mut requests = state.requests.filter(|r| {
        r.audit.is_visible()
            && query.status_id.map_or(true, |s| r.status_id == s)
            && query.kind.map_or(true, |k| r.kind == k)
            && query.requested_by.map_or(true, |u| r.requested_by == Some(u))
    });
    requests.sort_by(|a, b| b.audit.created_at.cmp(&a.audit.created_at));

    Ok(Json(Page::from_items(requests, query.limit, query.offset)))
}

/// POST /v1/requests: Open a request in the initial status.
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = RequestInput,
    responses(
        (status = 201, description = "Request created", body = MaterialRequest),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn create_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<RequestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MaterialRequest>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "request_type_id", &state.request_types, input.request_type_id);
    check_optional_ref(&mut errors, "origin_warehouse_id", &state.warehouses, input.origin_warehouse_id);
    check_optional_ref(&mut errors, "department_id", &state.departments, input.department_id);
    errors.into_result()?;

    let status = initial_status(&state.request_statuses)
        .ok_or_else(|| AppError::Validation("no initial request status is configured".into()))?;

    let now = Utc::now();
    let existing = state.requests.list();
    let number = assign_number(
        input.number,
        existing.iter().map(|r| r.number.as_str()),
        || {
            numbering::next_yearly_number(
                MATERIAL_REQUEST,
                now.date_naive(),
                existing.iter().map(|r| r.number.as_str()),
            )
        },
    )?;

    let request = MaterialRequest {
        id: Uuid::new_v4(),
        kind: input.kind,
        number,
        request_type_id: input.request_type_id,
        status_id: status.id,
        requested_by: caller.user_id,
        requester_area: input.requester_area.trim().to_string(),
        activity_title: optional(input.activity_title),
        activity_goal: optional(input.activity_goal),
        required_date: input.required_date,
        origin_warehouse_id: input.origin_warehouse_id,
        department_id: input.department_id,
        reason: input.reason.trim().to_string(),
        notes: optional(input.notes),
        approved_by: None,
        approved_at: None,
        approval_notes: None,
        rejected_by: None,
        rejected_at: None,
        rejection_reason: None,
        dispatched_by: None,
        dispatched_at: None,
        dispatch_notes: None,
        lines: Vec::new(),
        history: vec![StatusChange {
            from_status_id: None,
            to_status_id: status.id,
            user: caller.user_id,
            notes: "request created".into(),
            changed_at: now,
        }],
        audit: Audit::new(),
    };

    let request = state.save(&state.requests, request).await?;
    tracing::info!(number = %request.number, kind = ?request.kind, "material request created");
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /v1/requests/:id: Fetch a request with lines and history.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request", body = MaterialRequest),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn get_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MaterialRequest>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_request(&state, id).map(Json)
}

/// POST /v1/requests/:id/lines: Add a line.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/lines",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RequestLineInput,
    responses(
        (status = 201, description = "Line added; returns the request", body = MaterialRequest),
        (status = 409, description = "Request is in a final status", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn add_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RequestLineInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MaterialRequest>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut request = find_request(&state, id)?;
    ensure_open(&state, &request)?;

    let mut errors = FieldErrors::new();
    let (article_id, asset_id) = match request.kind {
        RequestKind::Article => {
            errors.require(input.asset_id.is_some(), "asset_id", "article requests take articles only");
            match input.article_id {
                Some(article) => errors.require(
                    !state.articles.any(|a| a.id == article && a.audit.is_usable()),
                    "article_id",
                    "article does not exist or is inactive",
                ),
                None => errors.add("article_id", "this field is required"),
            }
            (input.article_id, None)
        }
        RequestKind::Asset => {
            errors.require(input.article_id.is_some(), "article_id", "asset requests take assets only");
            match input.asset_id {
                Some(asset) => errors.require(
                    !state.assets.any(|a| a.id == asset && a.audit.is_usable()),
                    "asset_id",
                    "asset does not exist or is inactive",
                ),
                None => errors.add("asset_id", "this field is required"),
            }
            (None, input.asset_id)
        }
    };
    errors.into_result()?;

    request.lines.push(RequestLine {
        id: Uuid::new_v4(),
        article_id,
        asset_id,
        requested_quantity: input.requested_quantity,
        approved_quantity: Decimal::ZERO,
        dispatched_quantity: Decimal::ZERO,
        notes: optional(input.notes),
    });
    request.audit.touch();

    let request = state.save(&state.requests, request).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// DELETE /v1/requests/:id/lines/:line_id: Remove a line.
#[utoipa::path(
    delete,
    path = "/v1/requests/{id}/lines/{line_id}",
    params(
        ("id" = Uuid, Path, description = "Request ID"),
        ("line_id" = Uuid, Path, description = "Line ID"),
    ),
    responses(
        (status = 200, description = "Line removed; returns the request", body = MaterialRequest),
        (status = 404, description = "Request or line not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request is in a final status", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn remove_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MaterialRequest>, AppError> {
    require_role(&caller, Role::Operator)?;

    let _gate = state.write_lock().await;
    let mut request = find_request(&state, id)?;
    ensure_open(&state, &request)?;

    let before = request.lines.len();
    request.lines.retain(|l| l.id != line_id);
    if request.lines.len() == before {
        return Err(AppError::NotFound(format!(
            "line {line_id} not found in request {}",
            request.number
        )));
    }
    request.audit.touch();

    let request = state.save(&state.requests, request).await?;
    Ok(Json(request))
}

/// POST /v1/requests/:id/approve: Approve with per-line quantities.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = DecisionInput,
    responses(
        (status = 200, description = "Request approved", body = MaterialRequest),
        (status = 409, description = "Already approved or final", body = crate::error::ErrorBody),
        (status = 422, description = "Quantities out of range", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn approve(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<DecisionInput>, JsonRejection>,
) -> Result<Json<MaterialRequest>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut request = find_request(&state, id)?;
    if request.is_approved() {
        return Err(WorkflowError::NotAllowed(format!(
            "request {} is already approved",
            request.number
        ))
        .into());
    }
    ensure_open(&state, &request)?;
    if request.lines.is_empty() {
        return Err(AppError::Validation(format!(
            "request {} has no lines to approve",
            request.number
        )));
    }
    let target = target_status(&state, APPROVED)?;

    for line in &mut request.lines {
        line.approved_quantity = line.requested_quantity;
    }
    let mut errors = FieldErrors::new();
    for (i, entry) in input.lines.iter().enumerate() {
        if let Some(index) = line_index(&request, i, entry.line_id, &mut errors) {
            let line = &mut request.lines[index];
            if entry.quantity > line.requested_quantity {
                errors.add(
                    format!("lines[{i}].quantity"),
                    format!("exceeds the requested quantity {}", line.requested_quantity),
                );
            } else {
                line.approved_quantity = entry.quantity;
            }
        }
    }
    errors.into_result()?;

    let notes = optional(input.notes);
    request.approved_by = caller.user_id;
    request.approved_at = Some(Utc::now());
    request.approval_notes = notes.clone();
    request.transition(target.id, caller.user_id, notes.unwrap_or_else(|| "approved".into()));

    let request = state.save(&state.requests, request).await?;
    tracing::info!(number = %request.number, "material request approved");
    Ok(Json(request))
}

/// POST /v1/requests/:id/reject: Reject with a reason.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = ReasonInput,
    responses(
        (status = 200, description = "Request rejected", body = MaterialRequest),
        (status = 409, description = "Request is in a final status", body = crate::error::ErrorBody),
        (status = 422, description = "Missing reason", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn reject(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReasonInput>, JsonRejection>,
) -> Result<Json<MaterialRequest>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut request = find_request(&state, id)?;
    ensure_open(&state, &request)?;
    let target = target_status(&state, REJECTED)?;

    let reason = input.reason.trim().to_string();
    request.rejected_by = caller.user_id;
    request.rejected_at = Some(Utc::now());
    request.rejection_reason = Some(reason.clone());
    request.transition(target.id, caller.user_id, reason);

    let request = state.save(&state.requests, request).await?;
    tracing::info!(number = %request.number, "material request rejected");
    Ok(Json(request))
}

/// POST /v1/requests/:id/dispatch: Record dispatched quantities.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/dispatch",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = DecisionInput,
    responses(
        (status = 200, description = "Request dispatched", body = MaterialRequest),
        (status = 409, description = "Not approved or already dispatched", body = crate::error::ErrorBody),
        (status = 422, description = "Quantities out of range", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn dispatch(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<DecisionInput>, JsonRejection>,
) -> Result<Json<MaterialRequest>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut request = find_request(&state, id)?;
    ensure_open(&state, &request)?;
    if !request.is_approved() {
        return Err(WorkflowError::NotAllowed(format!(
            "request {} must be approved before dispatch",
            request.number
        ))
        .into());
    }
    if request.is_dispatched() {
        return Err(WorkflowError::NotAllowed(format!(
            "request {} is already dispatched",
            request.number
        ))
        .into());
    }
    let target = target_status(&state, DISPATCHED)?;

    let mut errors = FieldErrors::new();
    for (i, entry) in input.lines.iter().enumerate() {
        if let Some(index) = line_index(&request, i, entry.line_id, &mut errors) {
            let line = &mut request.lines[index];
            if entry.quantity > line.approved_quantity {
                errors.add(
                    format!("lines[{i}].quantity"),
                    format!("exceeds the approved quantity {}", line.approved_quantity),
                );
            } else {
                line.dispatched_quantity = entry.quantity;
            }
        }
    }
    errors.into_result()?;

    let notes = optional(input.notes);
    request.dispatched_by = caller.user_id;
    request.dispatched_at = Some(Utc::now());
    request.dispatch_notes = notes.clone();
    request.transition(target.id, caller.user_id, notes.unwrap_or_else(|| "dispatched".into()));

    let request = state.save(&state.requests, request).await?;
    tracing::info!(number = %request.number, "material request dispatched");
    Ok(Json(request))
}

/// POST /v1/requests/:id/cancel: Cancel with a reason.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/cancel",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = ReasonInput,
    responses(
        (status = 200, description = "Request cancelled", body = MaterialRequest),
        (status = 409, description = "Request is in a final status", body = crate::error::ErrorBody),
        (status = 422, description = "Missing reason", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn cancel(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReasonInput>, JsonRejection>,
) -> Result<Json<MaterialRequest>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut request = find_request(&state, id)?;
    ensure_open(&state, &request)?;
    let target = target_status(&state, CANCELLED)?;

    request.transition(target.id, caller.user_id, input.reason.trim());

    let request = state.save(&state.requests, request).await?;
    tracing::info!(number = %request.number, "material request cancelled");
    Ok(Json(request))
}
