//! # Inventory Write-offs
//!
//! Stock that leaves a warehouse for good: damage, loss, expiry. A
//! write-off is opened in the initial status for one warehouse and a
//! reason, collects article lines, and then moves by status code:
//! `AUTHORIZED`, `REJECTED`, `CONFIRMED`.
//!
//! Reasons flagged `requires_authorization` must be authorized before
//! confirmation. Confirmation takes every line out of stock and records a
//! warehouse movement of type `BAJA` per article. The write-off, the
//! articles and the movements are persisted in one commit.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use inventa_core::numbering::{self, WRITE_OFF};
use inventa_core::text::optional;
use inventa_core::{Audit, FieldErrors, Operation, WorkflowError};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::documents::Changes;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::catalog::{WriteOffReason, WriteOffStatus};
use crate::models::requests::StatusChange;
use crate::models::warehouse::Movement;
use crate::models::write_offs::{WriteOff, WriteOffLine};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::routes::catalog::{by_code, check_ref, initial_status};
use crate::routes::purchasing::assign_number;
use crate::routes::requests::ReasonInput;
use crate::state::AppState;

const AUTHORIZED: &str = "AUTHORIZED";
const REJECTED: &str = "REJECTED";
const CONFIRMED: &str = "CONFIRMED";

/// Movement type recorded for each article leaving stock on confirmation.
const WRITE_OFF_MOVEMENT: &str = "BAJA";

// -- Request types ---------------------------------------------------------------

/// Request to open a write-off.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WriteOffInput {
    /// Assigned automatically when omitted.
    #[serde(default)]
    pub number: Option<String>,
    /// Defaults to today. Must not be in the future.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub reason_id: Uuid,
    pub warehouse_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Required when the reason asks for one.
    #[serde(default)]
    pub document: Option<String>,
}

impl Validate for WriteOffInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "description", &self.description);
        errors.require(
            self.date.is_some_and(|d| d > Utc::now().date_naive()),
            "date",
            "must not be in the future",
        );
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WriteOffLineInput {
    pub article_id: Uuid,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for WriteOffLineInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(self.quantity <= Decimal::ZERO, "quantity", "must be greater than zero");
        errors.require(self.unit_value < Decimal::ZERO, "unit_value", "must not be negative");
    }
}

/// Authorization or confirmation notes.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotesInput {
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for NotesInput {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WriteOffQuery {
    pub status_id: Option<Uuid>,
    pub reason_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub requested_by: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

// -- Router ------------------------------------------------------------------------

/// Build the write-offs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/write-offs", get(list_write_offs).post(create_write_off))
        .route("/v1/write-offs/:id", get(get_write_off))
        .route("/v1/write-offs/:id/lines", post(add_line))
        .route("/v1/write-offs/:id/lines/:line_id", delete(remove_line))
        .route("/v1/write-offs/:id/authorize", post(authorize))
        .route("/v1/write-offs/:id/reject", post(reject))
        .route("/v1/write-offs/:id/confirm", post(confirm))
}

// -- Helpers -----------------------------------------------------------------------

fn find_write_off(state: &AppState, id: Uuid) -> Result<WriteOff, AppError> {
    state
        .write_offs
        .get(&id)
        .filter(|w| w.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("write-off {id} not found")))
}

fn current_status(state: &AppState, write_off: &WriteOff) -> Option<WriteOffStatus> {
    state.write_off_statuses.get(&write_off.status_id)
}

/// Refuse changes to a write-off in a final status.
fn ensure_open(state: &AppState, write_off: &WriteOff) -> Result<(), AppError> {
    match current_status(state, write_off) {
        Some(status) if status.fields.is_final => Err(WorkflowError::Final {
            document: format!("write-off {}", write_off.number),
            status: status.code,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Refuse line changes unless the current status allows editing.
fn ensure_editable(state: &AppState, write_off: &WriteOff) -> Result<(), AppError> {
    ensure_open(state, write_off)?;
    match current_status(state, write_off) {
        Some(status) if !status.fields.allows_edit => Err(WorkflowError::NotAllowed(format!(
            "write-off {} cannot be edited in status {}",
            write_off.number, status.code
        ))
        .into()),
        _ => Ok(()),
    }
}

fn target_status(state: &AppState, code: &str) -> Result<WriteOffStatus, AppError> {
    by_code(&state.write_off_statuses, code)
        .ok_or_else(|| AppError::Validation(format!("write-off status {code} is not configured")))
}

fn reason_of(state: &AppState, write_off: &WriteOff) -> Result<WriteOffReason, AppError> {
    state
        .write_off_reasons
        .get(&write_off.reason_id)
        .ok_or_else(|| AppError::Internal(format!("write-off {} has no reason", write_off.number)))
}

fn require_lines(write_off: &WriteOff, action: &str) -> Result<(), AppError> {
    if write_off.lines.is_empty() {
        return Err(AppError::Validation(format!(
            "write-off {} has no lines to {action}",
            write_off.number
        )));
    }
    Ok(())
}

// -- Handlers ----------------------------------------------------------------------

/// GET /v1/write-offs: List write-offs, newest first.
#[utoipa::path(
    get,
    path = "/v1/write-offs",
    params(WriteOffQuery),
    responses((status = 200, description = "Page of write-offs")),
    tag = "write-offs"
)]
async fn list_write_offs(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<WriteOffQuery>, QueryRejection>,
) -> Result<Json<Page<WriteOff>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;

    let mut write_offs = state.write_offs.filter(|w| {
        w.audit.is_visible()
            && query.status_id.map_or(true, |s| w.status_id == s)
            && query.reason_id.map_or(true, |r| w.reason_id == r)
            && query.warehouse_id.map_or(true, |b| w.warehouse_id == b)
            && query.requested_by.map_or(true, |u| w.requested_by == Some(u))
    });
    write_offs.sort_by(|a, b| b.audit.created_at.cmp(&a.audit.created_at));

    Ok(Json(Page::from_items(write_offs, query.limit, query.offset)))
}

/// POST /v1/write-offs: Open a write-off in the initial status.
#[utoipa::path(
    post,
    path = "/v1/write-offs",
    request_body = WriteOffInput,
    responses(
        (status = 201, description = "Write-off created", body = WriteOff),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn create_write_off(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<WriteOffInput>, JsonRejection>,
) -> Result<(StatusCode, Json<WriteOff>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "warehouse_id", &state.warehouses, input.warehouse_id);
    let document = optional(input.document);
    match state.write_off_reasons.get(&input.reason_id) {
        Some(reason) if reason.is_usable() => errors.require(
            reason.fields.requires_document && document.is_none(),
            "document",
            "this reason requires a supporting document",
        ),
        _ => errors.add("reason_id", "reason does not exist or is inactive"),
    }
    errors.into_result()?;

    let status = initial_status(&state.write_off_statuses)
        .ok_or_else(|| AppError::Validation("no initial write-off status is configured".into()))?;

    let existing = state.write_offs.list();
    let number = assign_number(
        input.number,
        existing.iter().map(|w| w.number.as_str()),
        || numbering::next_number(WRITE_OFF, existing.iter().map(|w| w.number.as_str())),
    )?;

    let now = Utc::now();
    let write_off = WriteOff {
        id: Uuid::new_v4(),
        number,
        date: input.date.unwrap_or_else(|| now.date_naive()),
        reason_id: input.reason_id,
        status_id: status.id,
        warehouse_id: input.warehouse_id,
        requested_by: caller.user_id,
        description: input.description.trim().to_string(),
        notes: optional(input.notes),
        document,
        authorized_by: None,
        authorized_at: None,
        authorization_notes: None,
        confirmed_by: None,
        confirmed_at: None,
        total_value: Decimal::ZERO,
        lines: Vec::new(),
        history: vec![StatusChange {
            from_status_id: None,
            to_status_id: status.id,
            user: caller.user_id,
            notes: "write-off created".into(),
            changed_at: now,
        }],
        audit: Audit::new(),
    };

    let write_off = state.save(&state.write_offs, write_off).await?;
    tracing::info!(number = %write_off.number, "write-off created");
    Ok((StatusCode::CREATED, Json(write_off)))
}

/// GET /v1/write-offs/:id: Fetch a write-off with lines and history.
#[utoipa::path(
    get,
    path = "/v1/write-offs/{id}",
    params(("id" = Uuid, Path, description = "Write-off ID")),
    responses(
        (status = 200, description = "Write-off", body = WriteOff),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn get_write_off(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<WriteOff>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_write_off(&state, id).map(Json)
}

/// POST /v1/write-offs/:id/lines: Add an article line.
#[utoipa::path(
    post,
    path = "/v1/write-offs/{id}/lines",
    params(("id" = Uuid, Path, description = "Write-off ID")),
    request_body = WriteOffLineInput,
    responses(
        (status = 201, description = "Line added; returns the write-off", body = WriteOff),
        (status = 409, description = "Write-off can no longer be edited", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn add_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<WriteOffLineInput>, JsonRejection>,
) -> Result<(StatusCode, Json<WriteOff>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut write_off = find_write_off(&state, id)?;
    ensure_editable(&state, &write_off)?;

    match state.articles.get(&input.article_id) {
        Some(article) if article.audit.is_usable() => {
            if article.warehouse_id != write_off.warehouse_id {
                return Err(AppError::field(
                    "article_id",
                    format!("article {} is not stocked in this warehouse", article.code),
                ));
            }
        }
        _ => return Err(AppError::field("article_id", "article does not exist or is inactive")),
    }

    write_off.lines.push(WriteOffLine {
        id: Uuid::new_v4(),
        article_id: input.article_id,
        quantity: input.quantity,
        unit_value: input.unit_value,
        total_value: input.quantity * input.unit_value,
        lot: optional(input.lot),
        serial_number: optional(input.serial_number),
        notes: optional(input.notes),
    });
    write_off.recalculate_total();
    write_off.audit.touch();

    let write_off = state.save(&state.write_offs, write_off).await?;
    Ok((StatusCode::CREATED, Json(write_off)))
}

/// DELETE /v1/write-offs/:id/lines/:line_id: Remove a line.
#[utoipa::path(
    delete,
    path = "/v1/write-offs/{id}/lines/{line_id}",
    params(
        ("id" = Uuid, Path, description = "Write-off ID"),
        ("line_id" = Uuid, Path, description = "Line ID"),
    ),
    responses(
        (status = 200, description = "Line removed; returns the write-off", body = WriteOff),
        (status = 404, description = "Write-off or line not found", body = crate::error::ErrorBody),
        (status = 409, description = "Write-off can no longer be edited", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn remove_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<WriteOff>, AppError> {
    require_role(&caller, Role::Operator)?;

    let _gate = state.write_lock().await;
    let mut write_off = find_write_off(&state, id)?;
    ensure_editable(&state, &write_off)?;

    let before = write_off.lines.len();
    write_off.lines.retain(|l| l.id != line_id);
    if write_off.lines.len() == before {
        return Err(AppError::NotFound(format!(
            "line {line_id} not found in write-off {}",
            write_off.number
        )));
    }
    write_off.recalculate_total();
    write_off.audit.touch();

    let write_off = state.save(&state.write_offs, write_off).await?;
    Ok(Json(write_off))
}

/// POST /v1/write-offs/:id/authorize: Authorize a write-off.
#[utoipa::path(
    post,
    path = "/v1/write-offs/{id}/authorize",
    params(("id" = Uuid, Path, description = "Write-off ID")),
    request_body = NotesInput,
    responses(
        (status = 200, description = "Write-off authorized", body = WriteOff),
        (status = 409, description = "Already authorized, not required, or final", body = crate::error::ErrorBody),
        (status = 422, description = "No lines to authorize", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn authorize(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<NotesInput>, JsonRejection>,
) -> Result<Json<WriteOff>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut write_off = find_write_off(&state, id)?;
    ensure_open(&state, &write_off)?;
    if write_off.is_authorized() {
        return Err(WorkflowError::NotAllowed(format!(
            "write-off {} is already authorized",
            write_off.number
        ))
        .into());
    }
    let reason = reason_of(&state, &write_off)?;
    if !reason.fields.requires_authorization {
        return Err(WorkflowError::NotAllowed(format!(
            "write-offs for reason {} do not require authorization",
            reason.code
        ))
        .into());
    }
    require_lines(&write_off, "authorize")?;
    let target = target_status(&state, AUTHORIZED)?;

    let notes = optional(input.notes);
    write_off.authorized_by = caller.user_id;
    write_off.authorized_at = Some(Utc::now());
    write_off.authorization_notes = notes.clone();
    write_off.transition(target.id, caller.user_id, notes.unwrap_or_else(|| "authorized".into()));

    let write_off = state.save(&state.write_offs, write_off).await?;
    tracing::info!(number = %write_off.number, "write-off authorized");
    Ok(Json(write_off))
}

/// POST /v1/write-offs/:id/reject: Reject with a reason.
#[utoipa::path(
    post,
    path = "/v1/write-offs/{id}/reject",
    params(("id" = Uuid, Path, description = "Write-off ID")),
    request_body = ReasonInput,
    responses(
        (status = 200, description = "Write-off rejected", body = WriteOff),
        (status = 409, description = "Write-off is in a final status", body = crate::error::ErrorBody),
        (status = 422, description = "Missing reason", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn reject(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReasonInput>, JsonRejection>,
) -> Result<Json<WriteOff>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut write_off = find_write_off(&state, id)?;
    ensure_open(&state, &write_off)?;
    let target = target_status(&state, REJECTED)?;

    let reason = input.reason.trim().to_string();
    write_off.authorization_notes = Some(format!("REJECTED: {reason}"));
    write_off.transition(target.id, caller.user_id, reason);

    let write_off = state.save(&state.write_offs, write_off).await?;
    tracing::info!(number = %write_off.number, "write-off rejected");
    Ok(Json(write_off))
}

/// POST /v1/write-offs/:id/confirm: Take the lines out of stock.
///
/// Every article must have enough stock for the summed quantity of its
/// lines. Nothing is written unless all of them do.
#[utoipa::path(
    post,
    path = "/v1/write-offs/{id}/confirm",
    params(("id" = Uuid, Path, description = "Write-off ID")),
    request_body = NotesInput,
    responses(
        (status = 200, description = "Write-off confirmed and stock reduced", body = WriteOff),
        (status = 409, description = "Not authorized or final", body = crate::error::ErrorBody),
        (status = 422, description = "No lines or insufficient stock", body = crate::error::ErrorBody),
    ),
    tag = "write-offs"
)]
async fn confirm(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<NotesInput>, JsonRejection>,
) -> Result<Json<WriteOff>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut write_off = find_write_off(&state, id)?;
    ensure_open(&state, &write_off)?;
    let reason = reason_of(&state, &write_off)?;
    if reason.fields.requires_authorization && !write_off.is_authorized() {
        return Err(WorkflowError::NotAllowed(format!(
            "write-off {} must be authorized before confirmation",
            write_off.number
        ))
        .into());
    }
    require_lines(&write_off, "confirm")?;
    let target = target_status(&state, CONFIRMED)?;
    let movement_type = by_code(&state.movement_types, WRITE_OFF_MOVEMENT).ok_or_else(|| {
        AppError::Validation(format!("movement type {WRITE_OFF_MOVEMENT} is not configured"))
    })?;

    let now = Utc::now();
    let mut articles = Vec::new();
    let mut movements = Vec::new();
    for (article_id, quantity) in write_off.quantities_by_article() {
        let mut article = state
            .articles
            .get(&article_id)
            .filter(|a| a.audit.is_visible())
            .ok_or_else(|| AppError::Validation(format!("article {article_id} no longer exists")))?;
        let stock_before = article.stock;
        let stock_after = article.levels().exit(stock_before, quantity).map_err(|e| {
            AppError::Validation(format!("article {}: {e}", article.code))
        })?;
        article.stock = stock_after;
        article.audit.updated_at = now;
        movements.push(Movement {
            id: Uuid::new_v4(),
            article_id,
            movement_type_id: movement_type.id,
            operation: Operation::Exit,
            quantity,
            reason: format!("write-off {}", write_off.number),
            recorded_by: caller.user_id,
            stock_before,
            stock_after,
            created_at: now,
        });
        articles.push(article);
    }

    write_off.confirmed_by = caller.user_id;
    write_off.confirmed_at = Some(now);
    write_off.transition(
        target.id,
        caller.user_id,
        optional(input.notes).unwrap_or_else(|| "confirmed".into()),
    );

    let mut changes = Changes::new();
    changes.put(&write_off)?;
    for article in &articles {
        changes.put(article)?;
    }
    for movement in &movements {
        changes.put(movement)?;
    }
    state.commit(changes).await?;

    tracing::info!(
        number = %write_off.number,
        articles = articles.len(),
        total = %write_off.total_value,
        "write-off confirmed"
    );
    state.write_offs.put(write_off.clone());
    for article in articles {
        state.articles.put(article);
    }
    for movement in movements {
        state.movements.put(movement);
    }
    Ok(Json(write_off))
}
