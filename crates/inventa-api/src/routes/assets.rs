//! # Assets: Items, Movements and Current Location
//!
//! Routes:
//! - GET    /v1/assets/items                  list (search, category_id, state_id, active)
//! - POST   /v1/assets/items                  create in the initial state
//! - GET    /v1/assets/items/:id              fetch
//! - PUT    /v1/assets/items/:id              update
//! - DELETE /v1/assets/items/:id              soft delete
//! - GET    /v1/assets/items/:id/movements    history, newest first
//! - GET    /v1/assets/items/:id/location     current location
//! - POST   /v1/assets/movements              register a movement
//! - GET    /v1/assets/by-location/:location_id
//! - GET    /v1/assets/by-responsible?responsible=

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use inventa_core::text::{contains_ci, optional};
use inventa_core::{Audit, FieldErrors, StockLevels};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::documents::Changes;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::assets::{default_barcode, Asset, AssetMovement, CurrentLocation};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::routes::catalog::{check_optional_ref, check_ref, initial_status};
use crate::state::AppState;

/// Request to create or update an asset.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssetInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: Uuid,
    pub unit_id: Uuid,
    /// Ignored on create, which always starts in the initial state.
    #[serde(default)]
    pub state_id: Option<Uuid>,
    #[serde(default)]
    pub article_name_id: Option<Uuid>,
    #[serde(default)]
    pub sector_id: Option<Uuid>,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub model_id: Option<Uuid>,
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Derived from the code when omitted.
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub minimum_stock: Decimal,
    #[serde(default)]
    pub maximum_stock: Option<Decimal>,
    #[serde(default)]
    pub reorder_point: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub average_cost: Decimal,
    #[serde(default)]
    pub requires_serial: bool,
    #[serde(default)]
    pub requires_lot: bool,
    #[serde(default)]
    pub requires_expiry: bool,
    #[serde(default)]
    pub active: Option<bool>,
}

impl Validate for AssetInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "code", &self.code);
        require_text(errors, "name", &self.name);
        let levels = StockLevels {
            minimum: self.minimum_stock,
            maximum: self.maximum_stock,
            reorder_point: self.reorder_point,
        };
        if let Err(e) = levels.validate() {
            errors.add("minimum_stock", e.to_string());
        }
        errors.require(self.unit_price < Decimal::ZERO, "unit_price", "must not be negative");
        errors.require(
            self.average_cost < Decimal::ZERO,
            "average_cost",
            "must not be negative",
        );
    }
}

/// Request to register an asset movement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssetMovementInput {
    pub asset_id: Uuid,
    pub movement_type_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub destination_location_id: Option<Uuid>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub provenance_id: Option<Uuid>,
    #[serde(default)]
    pub disposal_date: Option<NaiveDate>,
    #[serde(default)]
    pub disposal_reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for AssetMovementInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(
            self.quantity <= Decimal::ZERO,
            "quantity",
            "must be greater than zero",
        );
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AssetQuery {
    /// Case-insensitive match on code, name or barcode.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ResponsibleQuery {
    /// Substring of the responsible person's name.
    pub responsible: String,
}

/// Build the assets router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/assets/items", get(list_assets).post(create_asset))
        .route(
            "/v1/assets/items/:id",
            get(get_asset).put(update_asset).delete(delete_asset),
        )
        .route("/v1/assets/items/:id/movements", get(asset_movements))
        .route("/v1/assets/items/:id/location", get(asset_location))
        .route("/v1/assets/movements", post(create_movement))
        .route("/v1/assets/by-location/:location_id", get(by_location))
        .route("/v1/assets/by-responsible", get(by_responsible))
}

pub(crate) fn find_asset(state: &AppState, id: Uuid) -> Result<Asset, AppError> {
    state
        .assets
        .get(&id)
        .filter(|a| a.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("asset {id} not found")))
}

/// Reference, code and barcode checks shared by create and update.
/// Returns the normalized code and barcode.
fn check_asset(
    state: &AppState,
    input: &AssetInput,
    id: Option<Uuid>,
) -> Result<(String, String), AppError> {
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "category_id", &state.asset_categories, input.category_id);
    check_ref(&mut errors, "unit_id", &state.units, input.unit_id);
    check_optional_ref(&mut errors, "article_name_id", &state.article_names, input.article_name_id);
    check_optional_ref(&mut errors, "sector_id", &state.sectors, input.sector_id);
    check_optional_ref(&mut errors, "brand_id", &state.brands, input.brand_id);
    check_optional_ref(&mut errors, "model_id", &state.models, input.model_id);

    if let (Some(brand_id), Some(model_id)) = (input.brand_id, input.model_id) {
        if let Some(model) = state.models.get(&model_id) {
            errors.require(
                model.fields.brand_id != brand_id,
                "model_id",
                "model does not belong to the selected brand",
            );
        }
    }

    let code = input.code.trim().to_uppercase();
    let taken = state
        .assets
        .any(|a| a.audit.is_visible() && Some(a.id) != id && a.code == code);
    errors.require(taken, "code", "an asset with this code already exists");
    errors.into_result()?;

    let barcode = optional(input.barcode.clone())
        .map(|b| b.to_uppercase())
        .unwrap_or_else(|| default_barcode(&code));
    if state
        .assets
        .any(|a| a.audit.is_visible() && Some(a.id) != id && a.barcode == barcode)
    {
        return Err(AppError::Conflict(format!("barcode {barcode} is already assigned")));
    }

    Ok((code, barcode))
}

/// GET /v1/assets/items: List assets.
#[utoipa::path(
    get,
    path = "/v1/assets/items",
    params(AssetQuery),
    responses((status = 200, description = "Page of assets")),
    tag = "assets"
)]
async fn list_assets(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AssetQuery>, QueryRejection>,
) -> Result<Json<Page<Asset>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let search = optional(query.search);

    let mut assets = state.assets.filter(|a| {
        a.audit.is_visible()
            && query.category_id.map_or(true, |c| a.category_id == c)
            && query.state_id.map_or(true, |s| a.state_id == s)
            && query.active.map_or(true, |active| a.audit.active == active)
            && search.as_deref().map_or(true, |s| {
                contains_ci(&a.code, s) || contains_ci(&a.name, s) || contains_ci(&a.barcode, s)
            })
    });
    assets.sort_by(|a, b| a.code.cmp(&b.code));

    Ok(Json(Page::from_items(assets, query.limit, query.offset)))
}

/// POST /v1/assets/items: Create an asset in the initial state.
#[utoipa::path(
    post,
    path = "/v1/assets/items",
    request_body = AssetInput,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 409, description = "Barcode already assigned", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error or no initial state", body = crate::error::ErrorBody),
    ),
    tag = "assets"
)]
async fn create_asset(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<AssetInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let (code, barcode) = check_asset(&state, &input, None)?;
    let initial = initial_status(&state.asset_states)
        .ok_or_else(|| AppError::Validation("no initial asset state is configured".into()))?;

    let mut audit = Audit::new();
    audit.active = input.active.unwrap_or(true);
    let asset = Asset {
        id: Uuid::new_v4(),
        code,
        name: input.name.trim().to_string(),
        description: optional(input.description),
        category_id: input.category_id,
        unit_id: input.unit_id,
        state_id: initial.id,
        article_name_id: input.article_name_id,
        sector_id: input.sector_id,
        brand_id: input.brand_id,
        model_id: input.model_id,
        serial_number: optional(input.serial_number),
        barcode,
        minimum_stock: input.minimum_stock,
        maximum_stock: input.maximum_stock,
        reorder_point: input.reorder_point,
        unit_price: input.unit_price,
        average_cost: input.average_cost,
        requires_serial: input.requires_serial,
        requires_lot: input.requires_lot,
        requires_expiry: input.requires_expiry,
        audit,
    };

    let asset = state.save(&state.assets, asset).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// GET /v1/assets/items/:id: Fetch an asset.
#[utoipa::path(
    get,
    path = "/v1/assets/items/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "assets"
)]
async fn get_asset(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Asset>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_asset(&state, id).map(Json)
}

/// PUT /v1/assets/items/:id: Update an asset, optionally changing its state.
#[utoipa::path(
    put,
    path = "/v1/assets/items/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    request_body = AssetInput,
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Barcode already assigned", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "assets"
)]
async fn update_asset(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AssetInput>, JsonRejection>,
) -> Result<Json<Asset>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut asset = find_asset(&state, id)?;
    let (code, barcode) = check_asset(&state, &input, Some(id))?;
    if let Some(state_id) = input.state_id {
        let usable = state.asset_states.get(&state_id).is_some_and(|s| s.is_usable());
        if !usable {
            return Err(AppError::field("state_id", "state does not exist or is inactive"));
        }
        asset.state_id = state_id;
    }

    asset.code = code;
    asset.barcode = barcode;
    asset.name = input.name.trim().to_string();
    asset.description = optional(input.description);
    asset.category_id = input.category_id;
    asset.unit_id = input.unit_id;
    asset.article_name_id = input.article_name_id;
    asset.sector_id = input.sector_id;
    asset.brand_id = input.brand_id;
    asset.model_id = input.model_id;
    asset.serial_number = optional(input.serial_number);
    asset.minimum_stock = input.minimum_stock;
    asset.maximum_stock = input.maximum_stock;
    asset.reorder_point = input.reorder_point;
    asset.unit_price = input.unit_price;
    asset.average_cost = input.average_cost;
    asset.requires_serial = input.requires_serial;
    asset.requires_lot = input.requires_lot;
    asset.requires_expiry = input.requires_expiry;
    if let Some(active) = input.active {
        asset.audit.active = active;
    }
    asset.audit.touch();

    let asset = state.save(&state.assets, asset).await?;
    Ok(Json(asset))
}

/// DELETE /v1/assets/items/:id: Soft-delete an asset.
#[utoipa::path(
    delete,
    path = "/v1/assets/items/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "assets"
)]
async fn delete_asset(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Administrator)?;

    let _gate = state.write_lock().await;
    let mut asset = find_asset(&state, id)?;
    asset.audit.soft_delete();
    state.save(&state.assets, asset).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/assets/movements: Register an asset movement.
///
/// All field problems are reported together. When the movement names a
/// destination or a responsible person, the asset's current location is
/// replaced in the same transaction.
#[utoipa::path(
    post,
    path = "/v1/assets/movements",
    request_body = AssetMovementInput,
    responses(
        (status = 201, description = "Movement registered", body = AssetMovement),
        (status = 404, description = "Asset not found", body = crate::error::ErrorBody),
        (status = 422, description = "Field errors", body = crate::error::ErrorBody),
    ),
    tag = "assets"
)]
async fn create_movement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<AssetMovementInput>, JsonRejection>,
) -> Result<(StatusCode, Json<AssetMovement>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let asset = find_asset(&state, input.asset_id)?;

    let serial_number = optional(input.serial_number);
    let lot = optional(input.lot);
    let responsible = optional(input.responsible);

    let mut errors = FieldErrors::new();
    errors.require(
        asset.requires_serial && serial_number.is_none(),
        "serial_number",
        "this asset requires a serial number",
    );
    errors.require(
        asset.requires_lot && lot.is_none(),
        "lot",
        "this asset requires a lot",
    );
    errors.require(
        asset.requires_expiry && input.expiry_date.is_none(),
        "expiry_date",
        "this asset requires an expiry date",
    );

    match state
        .asset_movement_types
        .get(&input.movement_type_id)
        .filter(|t| t.is_visible())
    {
        Some(kind) => {
            errors.require(
                kind.fields.requires_location && input.destination_location_id.is_none(),
                "destination_location_id",
                "this movement type requires a destination",
            );
            errors.require(
                kind.fields.requires_responsible && responsible.is_none(),
                "responsible",
                "this movement type requires a responsible person",
            );
        }
        None => errors.add("movement_type_id", "referenced record does not exist"),
    }

    if let Some(current) = state.asset_states.get(&asset.state_id) {
        errors.require(
            !current.fields.allows_movement,
            "asset_id",
            format!("assets in state {} cannot be moved", current.code).as_str(),
        );
    }
    check_optional_ref(
        &mut errors,
        "destination_location_id",
        &state.locations,
        input.destination_location_id,
    );
    check_optional_ref(&mut errors, "provenance_id", &state.provenances, input.provenance_id);
    errors.into_result()?;

    let now = Utc::now();
    let movement = AssetMovement {
        id: Uuid::new_v4(),
        asset_id: asset.id,
        movement_type_id: input.movement_type_id,
        quantity: input.quantity,
        destination_location_id: input.destination_location_id,
        responsible,
        serial_number,
        lot,
        expiry_date: input.expiry_date,
        entry_date: input.entry_date,
        invoice_number: optional(input.invoice_number),
        provenance_id: input.provenance_id,
        disposal_date: input.disposal_date,
        disposal_reason: optional(input.disposal_reason),
        notes: optional(input.notes),
        recorded_by: caller.user_id,
        created_at: now,
    };

    let placement = (movement.destination_location_id.is_some() || movement.responsible.is_some())
        .then(|| CurrentLocation {
            asset_id: asset.id,
            location_id: movement.destination_location_id,
            responsible: movement.responsible.clone(),
            last_movement_id: movement.id,
            updated_at: now,
        });

    let mut changes = Changes::new();
    changes.put(&movement)?;
    if let Some(placement) = &placement {
        changes.put(placement)?;
    }
    state.commit(changes).await?;

    state.asset_movements.put(movement.clone());
    if let Some(placement) = placement {
        state.current_locations.put(placement);
    }
    Ok((StatusCode::CREATED, Json(movement)))
}

/// GET /v1/assets/items/:id/movements: Movement history of an asset.
#[utoipa::path(
    get,
    path = "/v1/assets/items/{id}/movements",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses((status = 200, description = "Movements, newest first", body = Vec<AssetMovement>)),
    tag = "assets"
)]
async fn asset_movements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AssetMovement>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_asset(&state, id)?;
    let mut movements = state.asset_movements.filter(|m| m.asset_id == id);
    movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(movements))
}

/// GET /v1/assets/items/:id/location: Where the asset is now.
#[utoipa::path(
    get,
    path = "/v1/assets/items/{id}/location",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Current location", body = CurrentLocation),
        (status = 404, description = "Asset never moved", body = crate::error::ErrorBody),
    ),
    tag = "assets"
)]
async fn asset_location(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CurrentLocation>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_asset(&state, id)?;
    state
        .current_locations
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("asset {id} has no recorded location")))
}

/// Visible assets whose current placement matches `pred`.
fn placed(state: &AppState, pred: impl Fn(&CurrentLocation) -> bool) -> Vec<Asset> {
    let mut assets: Vec<Asset> = state
        .current_locations
        .filter(pred)
        .into_iter()
        .filter_map(|c| state.assets.get(&c.asset_id))
        .filter(|a| a.audit.is_visible())
        .collect();
    assets.sort_by(|a, b| a.code.cmp(&b.code));
    assets
}

/// GET /v1/assets/by-location/:location_id: Assets currently at a location.
#[utoipa::path(
    get,
    path = "/v1/assets/by-location/{location_id}",
    params(("location_id" = Uuid, Path, description = "Location ID")),
    responses((status = 200, description = "Assets at the location", body = Vec<Asset>)),
    tag = "assets"
)]
async fn by_location(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(location_id): Path<Uuid>,
) -> Result<Json<Vec<Asset>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    Ok(Json(placed(&state, |c| c.location_id == Some(location_id))))
}

/// GET /v1/assets/by-responsible: Assets held by someone.
#[utoipa::path(
    get,
    path = "/v1/assets/by-responsible",
    params(ResponsibleQuery),
    responses((status = 200, description = "Assets held by the person", body = Vec<Asset>)),
    tag = "assets"
)]
async fn by_responsible(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ResponsibleQuery>, QueryRejection>,
) -> Result<Json<Vec<Asset>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let needle = query.responsible.trim().to_string();
    if needle.is_empty() {
        return Err(AppError::field("responsible", "this field is required"));
    }
    Ok(Json(placed(&state, |c| {
        c.responsible.as_deref().is_some_and(|r| contains_ci(r, &needle))
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn record<X>(code: &str, fields: X) -> CatalogRecord<X> {
        CatalogRecord {
            id: Uuid::new_v4(),
            code: code.into(),
            name: code.into(),
            description: None,
            fields,
            audit: Audit::new(),
        }
    }

    struct Fixture {
        state: AppState,
        category: Uuid,
        unit: Uuid,
        transfer: Uuid,
        assign: Uuid,
        office: Uuid,
        blocked_state: Uuid,
    }

    fn fixture() -> Fixture {
        let state = AppState::new();
        let category: AssetCategory = record("COMP", AssetCategoryFields {});
        let unit: Unit = record("UN", UnitFields { symbol: None });
        let initial: AssetState = record(
            "NUEVO",
            AssetStateFields {
                color: "#fff".into(),
                is_initial: true,
                allows_movement: true,
            },
        );
        let blocked: AssetState = record(
            "BAJA",
            AssetStateFields {
                color: "#000".into(),
                is_initial: false,
                allows_movement: false,
            },
        );
        let transfer: AssetMovementType = record(
            "TRASLADO",
            AssetMovementTypeFields {
                requires_location: true,
                requires_responsible: false,
            },
        );
        let assign: AssetMovementType = record(
            "ASIGNACION",
            AssetMovementTypeFields {
                requires_location: false,
                requires_responsible: true,
            },
        );
        let office: Location = record("OF-1", LocationFields::default());

        let fx = Fixture {
            category: category.id,
            unit: unit.id,
            transfer: transfer.id,
            assign: assign.id,
            office: office.id,
            blocked_state: blocked.id,
            state: state.clone(),
        };
        state.asset_categories.put(category);
        state.units.put(unit);
        state.asset_states.put(initial);
        state.asset_states.put(blocked);
        state.asset_movement_types.put(transfer);
        state.asset_movement_types.put(assign);
        state.locations.put(office);
        fx
    }

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

    async fn create(fx: &Fixture, code: &str, extra: Value) -> (StatusCode, Value) {
        let mut body = json!({
            "code": code,
            "name": format!("Asset {code}"),
            "category_id": fx.category,
            "unit_id": fx.unit,
        });
        if let (Some(map), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            map.extend(extra.clone());
        }
        send(&fx.state, "POST", "/v1/assets/items", Some(body)).await
    }

    #[tokio::test]
    async fn create_assigns_initial_state_and_barcode() {
        let fx = fixture();
        let (status, asset) = create(&fx, "nb-dell_01", json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(asset["code"], "NB-DELL_01");
        assert_eq!(asset["barcode"], "CODNBDELL01");
        let initial = initial_status(&fx.state.asset_states).unwrap();
        assert_eq!(asset["state_id"], initial.id.to_string());
    }

    #[tokio::test]
    async fn barcode_collision_is_a_conflict() {
        let fx = fixture();
        create(&fx, "AB-1", json!({})).await;
        let (status, _) = create(&fx, "AB_1", json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_without_initial_state_fails() {
        let fx = fixture();
        for s in fx.state.asset_states.list() {
            fx.state.asset_states.remove(&s.id);
        }
        let (status, body) = create(&fx, "X1", json!({})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["message"].as_str().unwrap().contains("initial"));
    }

    #[tokio::test]
    async fn model_must_belong_to_brand() {
        let fx = fixture();
        let brand: Brand = record("HP", BrandFields::default());
        let other: Brand = record("DELL", BrandFields::default());
        let model: Model = record("T14", ModelFields { brand_id: other.id });
        let (brand_id, model_id) = (brand.id, model.id);
        fx.state.brands.put(brand);
        fx.state.brands.put(other);
        fx.state.models.put(model);

        let (status, body) =
            create(&fx, "X1", json!({"brand_id": brand_id, "model_id": model_id})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["model_id"].is_string());
    }

    #[tokio::test]
    async fn movement_collects_all_field_errors() {
        let fx = fixture();
        let (_, asset) = create(
            &fx,
            "PRY-1",
            json!({"requires_serial": true, "requires_lot": true}),
        )
        .await;
        let (status, body) = send(
            &fx.state,
            "POST",
            "/v1/assets/movements",
            Some(json!({
                "asset_id": asset["id"],
                "movement_type_id": fx.transfer,
                "quantity": "1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let details = &body["error"]["details"];
        assert!(details["serial_number"].is_string());
        assert!(details["lot"].is_string());
        assert!(details["destination_location_id"].is_string());
        assert!(fx.state.asset_movements.is_empty());
    }

    #[tokio::test]
    async fn movement_places_asset() {
        let fx = fixture();
        let (_, asset) = create(&fx, "PC-7", json!({})).await;
        let id = asset["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &fx.state,
            "POST",
            "/v1/assets/movements",
            Some(json!({
                "asset_id": id,
                "movement_type_id": fx.transfer,
                "quantity": "1",
                "destination_location_id": fx.office
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, location) =
            send(&fx.state, "GET", &format!("/v1/assets/items/{id}/location"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(location["location_id"], fx.office.to_string());

        let (_, here) =
            send(&fx.state, "GET", &format!("/v1/assets/by-location/{}", fx.office), None).await;
        assert_eq!(here.as_array().unwrap().len(), 1);

        let (status, _) = send(
            &fx.state,
            "POST",
            "/v1/assets/movements",
            Some(json!({
                "asset_id": id,
                "movement_type_id": fx.assign,
                "quantity": "1",
                "responsible": "María Pérez"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, held) =
            send(&fx.state, "GET", "/v1/assets/by-responsible?responsible=maría", None).await;
        assert_eq!(held.as_array().unwrap().len(), 1);

        let (_, history) =
            send(&fx.state, "GET", &format!("/v1/assets/items/{id}/movements"), None).await;
        assert_eq!(history.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn never_moved_asset_has_no_location() {
        let fx = fixture();
        let (_, asset) = create(&fx, "PC-8", json!({})).await;
        let (status, _) = send(
            &fx.state,
            "GET",
            &format!("/v1/assets/items/{}/location", asset["id"].as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn state_without_movement_blocks_moves() {
        let fx = fixture();
        let (_, asset) = create(&fx, "PC-9", json!({})).await;
        let id = asset["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &fx.state,
            "PUT",
            &format!("/v1/assets/items/{id}"),
            Some(json!({
                "code": "PC-9", "name": "PC", "category_id": fx.category,
                "unit_id": fx.unit, "state_id": fx.blocked_state
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &fx.state,
            "POST",
            "/v1/assets/movements",
            Some(json!({
                "asset_id": id,
                "movement_type_id": fx.assign,
                "quantity": "1",
                "responsible": "Juan"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["asset_id"]
            .as_str()
            .unwrap()
            .contains("BAJA"));
    }
}
