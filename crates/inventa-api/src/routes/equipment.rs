//! # Equipment and Maintenance
//!
//! Routes:
//! - GET    /v1/catalog/equipment                      list (search, status, workshop_id, equipment_type_id)
//! - POST   /v1/catalog/equipment                      create
//! - GET    /v1/catalog/equipment/maintenance-due      due within `days` (default 30)
//! - GET    /v1/catalog/equipment/:id                  fetch
//! - PUT    /v1/catalog/equipment/:id                  update
//! - DELETE /v1/catalog/equipment/:id                  soft delete
//! - POST   /v1/catalog/equipment/:id/maintenance      record maintenance
//! - GET    /v1/catalog/equipment/:id/maintenance      history, newest first

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Days, NaiveDate, Utc};
use inventa_core::text::{contains_ci, optional};
use inventa_core::{Audit, FieldErrors};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::documents::Changes;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::equipment::{Equipment, EquipmentStatus, MaintenanceKind, MaintenanceRecord};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::routes::catalog::{check_optional_ref, check_ref};
use crate::state::AppState;

const DEFAULT_DUE_DAYS: u64 = 30;

/// Request to create or update equipment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EquipmentInput {
    pub code: String,
    pub name: String,
    pub equipment_type_id: Uuid,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub acquisition_date: Option<NaiveDate>,
    #[serde(default)]
    pub acquisition_value: Option<Decimal>,
    #[serde(default)]
    pub status: Option<EquipmentStatus>,
    #[serde(default)]
    pub current_location: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub workshop_id: Option<Uuid>,
    #[serde(default)]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl Validate for EquipmentInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "code", &self.code);
        require_text(errors, "name", &self.name);
        errors.require(
            self.acquisition_value.is_some_and(|v| v < Decimal::ZERO),
            "acquisition_value",
            "must not be negative",
        );
    }
}

/// Request to record a maintenance.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MaintenanceInput {
    pub date: NaiveDate,
    pub kind: MaintenanceKind,
    pub description: String,
    pub performed_by: String,
    #[serde(default)]
    pub cost: Option<Decimal>,
    /// Derived from the equipment type's period when omitted.
    #[serde(default)]
    pub next_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for MaintenanceInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "description", &self.description);
        require_text(errors, "performed_by", &self.performed_by);
        errors.require(
            self.cost.is_some_and(|c| c < Decimal::ZERO),
            "cost",
            "must not be negative",
        );
        errors.require(
            self.next_maintenance.is_some_and(|next| next < self.date),
            "next_maintenance",
            "must not be before the maintenance date",
        );
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EquipmentQuery {
    /// Case-insensitive match on code, name or serial number.
    pub search: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub workshop_id: Option<Uuid>,
    pub equipment_type_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DueQuery {
    /// Horizon in days from today.
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub days: Option<u64>,
}

/// Build the equipment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/catalog/equipment",
            get(list_equipment).post(create_equipment),
        )
        .route("/v1/catalog/equipment/maintenance-due", get(maintenance_due))
        .route(
            "/v1/catalog/equipment/:id",
            get(get_equipment)
                .put(update_equipment)
                .delete(delete_equipment),
        )
        .route(
            "/v1/catalog/equipment/:id/maintenance",
            get(maintenance_history).post(record_maintenance),
        )
}

fn find_equipment(state: &AppState, id: Uuid) -> Result<Equipment, AppError> {
    state
        .equipment
        .get(&id)
        .filter(|e| e.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("equipment {id} not found")))
}

/// Returns the normalized code and serial number.
fn check_equipment(
    state: &AppState,
    input: &EquipmentInput,
    id: Option<Uuid>,
) -> Result<(String, Option<String>), AppError> {
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "equipment_type_id", &state.equipment_types, input.equipment_type_id);
    check_optional_ref(&mut errors, "workshop_id", &state.workshops, input.workshop_id);

    let code = input.code.trim().to_uppercase();
    let others = |e: &Equipment| e.audit.is_visible() && Some(e.id) != id;
    errors.require(
        state.equipment.any(|e| others(e) && e.code == code),
        "code",
        "equipment with this code already exists",
    );

    let serial = optional(input.serial_number.clone());
    if let Some(serial) = &serial {
        errors.require(
            state
                .equipment
                .any(|e| others(e) && e.serial_number.as_deref() == Some(serial.as_str())),
            "serial_number",
            "equipment with this serial number already exists",
        );
    }
    errors.into_result()?;
    Ok((code, serial))
}

/// GET /v1/catalog/equipment: List equipment.
#[utoipa::path(
    get,
    path = "/v1/catalog/equipment",
    params(EquipmentQuery),
    responses((status = 200, description = "Page of equipment")),
    tag = "equipment"
)]
async fn list_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<EquipmentQuery>, QueryRejection>,
) -> Result<Json<Page<Equipment>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let search = optional(query.search);

    let mut items = state.equipment.filter(|e| {
        e.audit.is_visible()
            && query.status.map_or(true, |s| e.status == s)
            && query.workshop_id.map_or(true, |w| e.workshop_id == Some(w))
            && query.equipment_type_id.map_or(true, |t| e.equipment_type_id == t)
            && search.as_deref().map_or(true, |s| {
                contains_ci(&e.code, s)
                    || contains_ci(&e.name, s)
                    || e.serial_number.as_deref().is_some_and(|n| contains_ci(n, s))
            })
    });
    items.sort_by(|a, b| a.code.cmp(&b.code));

    Ok(Json(Page::from_items(items, query.limit, query.offset)))
}

/// POST /v1/catalog/equipment: Register equipment.
#[utoipa::path(
    post,
    path = "/v1/catalog/equipment",
    request_body = EquipmentInput,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn create_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<EquipmentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Equipment>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let (code, serial_number) = check_equipment(&state, &input, None)?;

    let mut audit = Audit::new();
    audit.active = input.active.unwrap_or(true);
    let equipment = Equipment {
        id: Uuid::new_v4(),
        code,
        name: input.name.trim().to_string(),
        equipment_type_id: input.equipment_type_id,
        brand: optional(input.brand),
        model: optional(input.model),
        serial_number,
        acquisition_date: input.acquisition_date,
        acquisition_value: input.acquisition_value,
        status: input.status.unwrap_or_default(),
        current_location: optional(input.current_location),
        responsible: optional(input.responsible),
        workshop_id: input.workshop_id,
        last_maintenance: input.last_maintenance,
        next_maintenance: input.next_maintenance,
        notes: optional(input.notes),
        audit,
    };

    let equipment = state.save(&state.equipment, equipment).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// GET /v1/catalog/equipment/:id: Fetch equipment.
#[utoipa::path(
    get,
    path = "/v1/catalog/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment", body = Equipment),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn get_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Equipment>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_equipment(&state, id).map(Json)
}

/// PUT /v1/catalog/equipment/:id: Update equipment.
#[utoipa::path(
    put,
    path = "/v1/catalog/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = EquipmentInput,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn update_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<EquipmentInput>, JsonRejection>,
) -> Result<Json<Equipment>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut equipment = find_equipment(&state, id)?;
    let (code, serial_number) = check_equipment(&state, &input, Some(id))?;

    equipment.code = code;
    equipment.name = input.name.trim().to_string();
    equipment.equipment_type_id = input.equipment_type_id;
    equipment.brand = optional(input.brand);
    equipment.model = optional(input.model);
    equipment.serial_number = serial_number;
    equipment.acquisition_date = input.acquisition_date;
    equipment.acquisition_value = input.acquisition_value;
    if let Some(status) = input.status {
        equipment.status = status;
    }
    equipment.current_location = optional(input.current_location);
    equipment.responsible = optional(input.responsible);
    equipment.workshop_id = input.workshop_id;
    equipment.last_maintenance = input.last_maintenance.or(equipment.last_maintenance);
    equipment.next_maintenance = input.next_maintenance.or(equipment.next_maintenance);
    equipment.notes = optional(input.notes);
    if let Some(active) = input.active {
        equipment.audit.active = active;
    }
    equipment.audit.touch();

    let equipment = state.save(&state.equipment, equipment).await?;
    Ok(Json(equipment))
}

/// DELETE /v1/catalog/equipment/:id: Soft-delete equipment.
#[utoipa::path(
    delete,
    path = "/v1/catalog/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn delete_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Administrator)?;

    let _gate = state.write_lock().await;
    let mut equipment = find_equipment(&state, id)?;
    equipment.audit.soft_delete();
    state.save(&state.equipment, equipment).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/catalog/equipment/:id/maintenance: Record a maintenance.
///
/// Updates the equipment's last and next maintenance dates in the same
/// transaction.
#[utoipa::path(
    post,
    path = "/v1/catalog/equipment/{id}/maintenance",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = MaintenanceInput,
    responses(
        (status = 201, description = "Maintenance recorded", body = MaintenanceRecord),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorBody),
        (status = 409, description = "Equipment is retired", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
async fn record_maintenance(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<MaintenanceInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MaintenanceRecord>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut equipment = find_equipment(&state, id)?;
    if equipment.status == EquipmentStatus::Retired {
        return Err(AppError::Conflict(format!(
            "equipment {} is retired",
            equipment.code
        )));
    }

    let period = state
        .equipment_types
        .get(&equipment.equipment_type_id)
        .and_then(|t| t.fields.maintenance_period_days);
    let next_maintenance = input.next_maintenance.or_else(|| {
        period.and_then(|days| input.date.checked_add_days(Days::new(u64::from(days))))
    });

    let record = MaintenanceRecord {
        id: Uuid::new_v4(),
        equipment_id: id,
        date: input.date,
        kind: input.kind,
        description: input.description.trim().to_string(),
        performed_by: input.performed_by.trim().to_string(),
        cost: input.cost,
        next_maintenance,
        notes: optional(input.notes),
        recorded_by: caller.user_id,
        created_at: Utc::now(),
    };

    equipment.last_maintenance = Some(input.date);
    if next_maintenance.is_some() {
        equipment.next_maintenance = next_maintenance;
    }
    equipment.audit.touch();

    let mut changes = Changes::new();
    changes.put(&record)?;
    changes.put(&equipment)?;
    state.commit(changes).await?;

    state.maintenance.put(record.clone());
    state.equipment.put(equipment);
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/catalog/equipment/:id/maintenance: Maintenance history.
#[utoipa::path(
    get,
    path = "/v1/catalog/equipment/{id}/maintenance",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses((status = 200, description = "Records, newest first", body = Vec<MaintenanceRecord>)),
    tag = "equipment"
)]
async fn maintenance_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MaintenanceRecord>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_equipment(&state, id)?;
    let mut records = state.maintenance.filter(|m| m.equipment_id == id);
    records.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
    Ok(Json(records))
}

/// GET /v1/catalog/equipment/maintenance-due: Active equipment due for maintenance.
#[utoipa::path(
    get,
    path = "/v1/catalog/equipment/maintenance-due",
    params(DueQuery),
    responses((status = 200, description = "Equipment due, soonest first", body = Vec<Equipment>)),
    tag = "equipment"
)]
async fn maintenance_due(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<DueQuery>, QueryRejection>,
) -> Result<Json<Vec<Equipment>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let days = query.days.unwrap_or(DEFAULT_DUE_DAYS);
    let limit = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX);

    let mut due = state
        .equipment
        .filter(|e| e.audit.is_usable() && e.maintenance_due_by(limit));
    due.sort_by(|a, b| a.next_maintenance.cmp(&b.next_maintenance));
    Ok(Json(due))
}
