//! # Reference Catalogs
//!
//! Twenty-two lookup tables share one set of handlers. Each catalog is a
//! [`CatalogKind`]: the kind-specific fields plus where its records live,
//! which references they hold and which records depend on them.
//!
//! Routes per catalog (`<path>` from the table in [`router`]):
//! - GET    /v1/<path>       list (search, active, limit, offset), ordered by code
//! - POST   /v1/<path>       create
//! - GET    /v1/<path>/:id   fetch
//! - PUT    /v1/<path>/:id   replace editable fields
//! - DELETE /v1/<path>/:id   soft delete, refused while dependants exist
//!
//! Plus `GET /v1/catalog/brands/:id/models`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use inventa_core::text::{contains_ci, normalize_code, optional};
use inventa_core::{Audit, FieldErrors};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::documents::Document;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, require_text};
use crate::models::catalog::*;
use crate::pagination::{deserialize_optional_u64, Page};
use crate::state::{AppState, Store};

/// One reference catalog.
pub trait CatalogKind: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Document collection name.
    const COLLECTION: &'static str;
    /// Singular label used in messages.
    const LABEL: &'static str;

    fn store(state: &AppState) -> &Store<CatalogRecord<Self>>;

    /// Check references and kind-specific uniqueness of a create or update.
    /// `id` is the record being replaced, if any.
    fn check(&self, _state: &AppState, _name: &str, _id: Option<Uuid>, _errors: &mut FieldErrors) {}

    /// Describe the dependants that prevent deleting `id`, if any.
    fn blockers(state: &AppState, id: Uuid) -> Option<String>;
}

impl<K: CatalogKind> Document for CatalogRecord<K> {
    const COLLECTION: &'static str = K::COLLECTION;
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Whether `id` names a non-deleted record of the catalog.
pub fn exists<X: Clone + Send + Sync>(store: &Store<CatalogRecord<X>>, id: Uuid) -> bool {
    store.get(&id).is_some_and(|r| r.is_visible())
}

/// Record a field error unless `id` names a non-deleted record.
pub fn check_ref<X: Clone + Send + Sync>(
    errors: &mut FieldErrors,
    field: &str,
    store: &Store<CatalogRecord<X>>,
    id: Uuid,
) {
    errors.require(!exists(store, id), field, "referenced record does not exist");
}

/// Like [`check_ref`] for an optional reference.
pub fn check_optional_ref<X: Clone + Send + Sync>(
    errors: &mut FieldErrors,
    field: &str,
    store: &Store<CatalogRecord<X>>,
    id: Option<Uuid>,
) {
    if let Some(id) = id {
        check_ref(errors, field, store, id);
    }
}

/// First active status flagged initial, by code.
pub fn initial_status<X: StatusFlags + Clone + Send + Sync>(
    store: &Store<CatalogRecord<X>>,
) -> Option<CatalogRecord<X>> {
    store
        .filter(|r| r.is_usable() && r.fields.is_initial())
        .into_iter()
        .min_by(|a, b| a.code.cmp(&b.code))
}

/// Non-deleted record with the given code.
pub fn by_code<X: Clone + Send + Sync>(
    store: &Store<CatalogRecord<X>>,
    code: &str,
) -> Option<CatalogRecord<X>> {
    store.find(|r| r.is_visible() && r.code.eq_ignore_ascii_case(code))
}

fn blocked(count: usize, what: &str) -> Option<String> {
    (count > 0).then(|| format!("{count} {what} still reference it"))
}

// -- Kinds ---------------------------------------------------------------------

impl CatalogKind for BrandFields {
    const COLLECTION: &'static str = "brands";
    const LABEL: &'static str = "brand";
    fn store(state: &AppState) -> &Store<Brand> {
        &state.brands
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.models.count(|m| m.is_usable() && m.fields.brand_id == id),
            "active models",
        )
        .or_else(|| {
            blocked(
                state.assets.count(|a| a.audit.is_visible() && a.brand_id == Some(id)),
                "assets",
            )
        })
    }
}

impl CatalogKind for ModelFields {
    const COLLECTION: &'static str = "models";
    const LABEL: &'static str = "model";
    fn store(state: &AppState) -> &Store<Model> {
        &state.models
    }
    fn check(&self, state: &AppState, name: &str, id: Option<Uuid>, errors: &mut FieldErrors) {
        check_ref(errors, "brand_id", &state.brands, self.brand_id);
        let duplicate = state.models.any(|m| {
            m.is_visible()
                && Some(m.id) != id
                && m.fields.brand_id == self.brand_id
                && m.name.trim().eq_ignore_ascii_case(name.trim())
        });
        errors.require(duplicate, "name", "this brand already has a model with that name");
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.assets.count(|a| a.audit.is_visible() && a.model_id == Some(id)),
            "assets",
        )
    }
}

impl CatalogKind for ArticleNameFields {
    const COLLECTION: &'static str = "article_names";
    const LABEL: &'static str = "article name";
    fn store(state: &AppState) -> &Store<ArticleName> {
        &state.article_names
    }
    fn check(&self, state: &AppState, _name: &str, _id: Option<Uuid>, errors: &mut FieldErrors) {
        check_optional_ref(
            errors,
            "recommended_category_id",
            &state.article_categories,
            self.recommended_category_id,
        );
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.assets.count(|a| a.audit.is_visible() && a.article_name_id == Some(id)),
            "assets",
        )
    }
}

impl CatalogKind for SectorFields {
    const COLLECTION: &'static str = "sectors";
    const LABEL: &'static str = "sector";
    fn store(state: &AppState) -> &Store<Sector> {
        &state.sectors
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.assets.count(|a| a.audit.is_visible() && a.sector_id == Some(id)),
            "assets",
        )
    }
}

impl CatalogKind for WorkshopFields {
    const COLLECTION: &'static str = "workshops";
    const LABEL: &'static str = "workshop";
    fn store(state: &AppState) -> &Store<Workshop> {
        &state.workshops
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.equipment.count(|e| e.audit.is_visible() && e.workshop_id == Some(id)),
            "equipment",
        )
    }
}

impl CatalogKind for EquipmentTypeFields {
    const COLLECTION: &'static str = "equipment_types";
    const LABEL: &'static str = "equipment type";
    fn store(state: &AppState) -> &Store<EquipmentType> {
        &state.equipment_types
    }
    fn check(&self, _state: &AppState, _name: &str, _id: Option<Uuid>, errors: &mut FieldErrors) {
        errors.require(
            self.maintenance_period_days == Some(0),
            "maintenance_period_days",
            "must be greater than zero",
        );
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.equipment.count(|e| e.audit.is_visible() && e.equipment_type_id == id),
            "equipment",
        )
    }
}

impl CatalogKind for ProvenanceFields {
    const COLLECTION: &'static str = "provenances";
    const LABEL: &'static str = "provenance";
    fn store(state: &AppState) -> &Store<Provenance> {
        &state.provenances
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.asset_movements.count(|m| m.provenance_id == Some(id)),
            "asset movements",
        )
    }
}

impl CatalogKind for DepartmentFields {
    const COLLECTION: &'static str = "departments";
    const LABEL: &'static str = "department";
    fn store(state: &AppState) -> &Store<Department> {
        &state.departments
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.requests.count(|r| r.audit.is_visible() && r.department_id == Some(id)),
            "material requests",
        )
    }
}

impl CatalogKind for WarehouseFields {
    const COLLECTION: &'static str = "warehouses";
    const LABEL: &'static str = "warehouse";
    fn store(state: &AppState) -> &Store<Warehouse> {
        &state.warehouses
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.articles.count(|a| a.audit.is_visible() && a.warehouse_id == id),
            "articles",
        )
        .or_else(|| {
            blocked(
                state
                    .requests
                    .count(|r| r.audit.is_visible() && r.origin_warehouse_id == Some(id)),
                "material requests",
            )
        })
        .or_else(|| {
            blocked(
                state.article_receptions.count(|r| r.warehouse_id == id)
                    + state.asset_receptions.count(|r| r.warehouse_id == id),
                "receptions",
            )
        })
        .or_else(|| {
            blocked(
                state.write_offs.count(|w| w.audit.is_visible() && w.warehouse_id == id),
                "write-offs",
            )
        })
    }
}

impl CatalogKind for ArticleCategoryFields {
    const COLLECTION: &'static str = "article_categories";
    const LABEL: &'static str = "article category";
    fn store(state: &AppState) -> &Store<ArticleCategory> {
        &state.article_categories
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.articles.count(|a| a.audit.is_usable() && a.category_id == id),
            "active articles",
        )
    }
}

impl CatalogKind for MovementTypeFields {
    const COLLECTION: &'static str = "movement_types";
    const LABEL: &'static str = "movement type";
    fn store(state: &AppState) -> &Store<MovementType> {
        &state.movement_types
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(state.movements.count(|m| m.movement_type_id == id), "movements")
    }
}

impl CatalogKind for AssetCategoryFields {
    const COLLECTION: &'static str = "asset_categories";
    const LABEL: &'static str = "asset category";
    fn store(state: &AppState) -> &Store<AssetCategory> {
        &state.asset_categories
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.assets.count(|a| a.audit.is_usable() && a.category_id == id),
            "active assets",
        )
    }
}

impl CatalogKind for UnitFields {
    const COLLECTION: &'static str = "units";
    const LABEL: &'static str = "unit of measure";
    fn store(state: &AppState) -> &Store<Unit> {
        &state.units
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.assets.count(|a| a.audit.is_visible() && a.unit_id == id),
            "assets",
        )
    }
}

impl CatalogKind for AssetStateFields {
    const COLLECTION: &'static str = "asset_states";
    const LABEL: &'static str = "asset state";
    fn store(state: &AppState) -> &Store<AssetState> {
        &state.asset_states
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.assets.count(|a| a.audit.is_visible() && a.state_id == id),
            "assets",
        )
    }
}

impl CatalogKind for LocationFields {
    const COLLECTION: &'static str = "locations";
    const LABEL: &'static str = "location";
    fn store(state: &AppState) -> &Store<Location> {
        &state.locations
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.current_locations.count(|c| c.location_id == Some(id)),
            "assets currently placed here",
        )
    }
}

impl CatalogKind for AssetMovementTypeFields {
    const COLLECTION: &'static str = "asset_movement_types";
    const LABEL: &'static str = "asset movement type";
    fn store(state: &AppState) -> &Store<AssetMovementType> {
        &state.asset_movement_types
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.asset_movements.count(|m| m.movement_type_id == id),
            "asset movements",
        )
    }
}

impl CatalogKind for OrderStatusFields {
    const COLLECTION: &'static str = "order_statuses";
    const LABEL: &'static str = "purchase order status";
    fn store(state: &AppState) -> &Store<OrderStatus> {
        &state.order_statuses
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.purchase_orders.count(|o| o.audit.is_visible() && o.status_id == id),
            "purchase orders",
        )
    }
}

impl CatalogKind for ReceptionStatusFields {
    const COLLECTION: &'static str = "reception_statuses";
    const LABEL: &'static str = "reception status";
    fn store(state: &AppState) -> &Store<ReceptionStatus> {
        &state.reception_statuses
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.article_receptions.count(|r| r.status_id == id)
                + state.asset_receptions.count(|r| r.status_id == id),
            "receptions",
        )
    }
}

impl CatalogKind for RequestTypeFields {
    const COLLECTION: &'static str = "request_types";
    const LABEL: &'static str = "request type";
    fn store(state: &AppState) -> &Store<RequestType> {
        &state.request_types
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.requests.count(|r| r.audit.is_visible() && r.request_type_id == id),
            "material requests",
        )
    }
}

impl CatalogKind for RequestStatusFields {
    const COLLECTION: &'static str = "request_statuses";
    const LABEL: &'static str = "request status";
    fn store(state: &AppState) -> &Store<RequestStatus> {
        &state.request_statuses
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.requests.count(|r| r.audit.is_visible() && r.status_id == id),
            "material requests",
        )
    }
}

impl CatalogKind for WriteOffReasonFields {
    const COLLECTION: &'static str = "write_off_reasons";
    const LABEL: &'static str = "write-off reason";
    fn store(state: &AppState) -> &Store<WriteOffReason> {
        &state.write_off_reasons
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.write_offs.count(|w| w.audit.is_visible() && w.reason_id == id),
            "write-offs",
        )
    }
}

impl CatalogKind for WriteOffStatusFields {
    const COLLECTION: &'static str = "write_off_statuses";
    const LABEL: &'static str = "write-off status";
    fn store(state: &AppState) -> &Store<WriteOffStatus> {
        &state.write_off_statuses
    }
    fn blockers(state: &AppState, id: Uuid) -> Option<String> {
        blocked(
            state.write_offs.count(|w| w.audit.is_visible() && w.status_id == id),
            "write-offs",
        )
    }
}

// -- Router --------------------------------------------------------------------

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(resource::<BrandFields>("catalog/brands"))
        .merge(resource::<ModelFields>("catalog/models"))
        .merge(resource::<ArticleNameFields>("catalog/article-names"))
        .merge(resource::<SectorFields>("catalog/sectors"))
        .merge(resource::<WorkshopFields>("catalog/workshops"))
        .merge(resource::<EquipmentTypeFields>("catalog/equipment-types"))
        .merge(resource::<ProvenanceFields>("catalog/provenances"))
        .merge(resource::<DepartmentFields>("catalog/departments"))
        .merge(resource::<WarehouseFields>("warehouse/warehouses"))
        .merge(resource::<ArticleCategoryFields>("warehouse/categories"))
        .merge(resource::<MovementTypeFields>("warehouse/movement-types"))
        .merge(resource::<AssetCategoryFields>("assets/categories"))
        .merge(resource::<UnitFields>("assets/units"))
        .merge(resource::<AssetStateFields>("assets/states"))
        .merge(resource::<LocationFields>("assets/locations"))
        .merge(resource::<AssetMovementTypeFields>("assets/movement-types"))
        .merge(resource::<OrderStatusFields>("purchasing/order-statuses"))
        .merge(resource::<ReceptionStatusFields>("purchasing/reception-statuses"))
        .merge(resource::<RequestTypeFields>("requests/types"))
        .merge(resource::<RequestStatusFields>("requests/statuses"))
        .merge(resource::<WriteOffReasonFields>("write-offs/reasons"))
        .merge(resource::<WriteOffStatusFields>("write-offs/statuses"))
        .route("/v1/catalog/brands/:id/models", get(brand_models))
}

/// The five CRUD routes for one catalog under `/v1/{path}`.
pub fn resource<K: CatalogKind>(path: &str) -> Router<AppState> {
    Router::new()
        .route(&format!("/v1/{path}"), get(list::<K>).post(create::<K>))
        .route(
            &format!("/v1/{path}/:id"),
            get(fetch::<K>).put(update::<K>).delete(remove::<K>),
        )
}

// -- Handlers ------------------------------------------------------------------

/// Query parameters for catalog listings.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    /// Case-insensitive match on code or name.
    pub search: Option<String>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

async fn list<K: CatalogKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> Result<Json<Page<CatalogRecord<K>>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let search = optional(query.search);

    let mut records = K::store(&state).filter(|r| {
        r.is_visible()
            && query.active.map_or(true, |active| r.audit.active == active)
            && search
                .as_deref()
                .map_or(true, |s| contains_ci(&r.code, s) || contains_ci(&r.name, s))
    });
    records.sort_by(|a, b| a.code.cmp(&b.code));

    Ok(Json(Page::from_items(records, query.limit, query.offset)))
}

async fn fetch<K: CatalogKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CatalogRecord<K>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find::<K>(&state, id).map(Json)
}

fn find<K: CatalogKind>(state: &AppState, id: Uuid) -> Result<CatalogRecord<K>, AppError> {
    K::store(state)
        .get(&id)
        .filter(|r| r.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", K::LABEL)))
}

/// Normalize and check an input. Returns the normalized code.
fn validate<K: CatalogKind>(
    state: &AppState,
    input: &CatalogInput<K>,
    id: Option<Uuid>,
) -> Result<String, AppError> {
    let mut errors = FieldErrors::new();
    require_text(&mut errors, "name", &input.name);

    let code = match normalize_code(&input.code) {
        Ok(code) => {
            let taken = K::store(state)
                .any(|r| r.is_visible() && Some(r.id) != id && r.code.eq_ignore_ascii_case(&code));
            errors.require(taken, "code", "a record with this code already exists");
            code
        }
        Err(e) => {
            errors.add("code", e.to_string());
            String::new()
        }
    };

    input.fields.check(state, &input.name, id, &mut errors);
    errors.into_result()?;
    Ok(code)
}

async fn create<K: CatalogKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CatalogInput<K>>, JsonRejection>,
) -> Result<(StatusCode, Json<CatalogRecord<K>>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_json(body)?;

    let _gate = state.write_lock().await;
    let code = validate(&state, &input, None)?;

    let mut audit = Audit::new();
    audit.active = input.active.unwrap_or(true);
    let record = CatalogRecord {
        id: Uuid::new_v4(),
        code,
        name: input.name.trim().to_string(),
        description: optional(input.description),
        fields: input.fields,
        audit,
    };

    let record = state.save(K::store(&state), record).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update<K: CatalogKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CatalogInput<K>>, JsonRejection>,
) -> Result<Json<CatalogRecord<K>>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_json(body)?;

    let _gate = state.write_lock().await;
    let mut record = find::<K>(&state, id)?;
    let code = validate(&state, &input, Some(id))?;

    record.code = code;
    record.name = input.name.trim().to_string();
    record.description = optional(input.description);
    record.fields = input.fields;
    if let Some(active) = input.active {
        record.audit.active = active;
    }
    record.audit.touch();

    let record = state.save(K::store(&state), record).await?;
    Ok(Json(record))
}

async fn remove<K: CatalogKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Administrator)?;

    let _gate = state.write_lock().await;
    let mut record = find::<K>(&state, id)?;
    if let Some(reason) = K::blockers(&state, id) {
        return Err(AppError::Conflict(format!(
            "cannot delete {} {}: {reason}",
            K::LABEL,
            record.code
        )));
    }

    record.audit.soft_delete();
    state.save(K::store(&state), record).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/catalog/brands/:id/models: Active models of a brand, by name.
#[utoipa::path(
    get,
    path = "/v1/catalog/brands/{id}/models",
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Active models of the brand"),
        (status = 404, description = "Brand not found"),
    ),
    tag = "catalog"
)]
async fn brand_models(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Model>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find::<BrandFields>(&state, id)?;

    let mut models = state
        .models
        .filter(|m| m.is_usable() && m.fields.brand_id == id);
    models.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(Json(models))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(state: AppState, caller: CallerIdentity) -> Router {
        router()
            .layer(axum::Extension(caller))
            .with_state(state)
    }

    fn app(state: AppState) -> Router {
        app_with(state, CallerIdentity::system())
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn create_normalizes_code_and_defaults_fields() {
        let state = AppState::new();
        let (status, body) = send(
            app(state.clone()),
            "POST",
            "/v1/assets/states",
            Some(json!({"code": "  nuevo ", "name": "Nuevo", "is_initial": true})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["code"], "NUEVO");
        assert_eq!(body["color"], "#6c757d");
        assert_eq!(body["allows_movement"], true);
        assert_eq!(body["active"], true);
        assert_eq!(state.asset_states.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected_case_insensitively() {
        let state = AppState::new();
        let payload = json!({"code": "HP", "name": "HP"});
        send(app(state.clone()), "POST", "/v1/catalog/brands", Some(payload)).await;
        let (status, body) = send(
            app(state),
            "POST",
            "/v1/catalog/brands",
            Some(json!({"code": "hp", "name": "Other"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["code"].is_string());
    }

    #[tokio::test]
    async fn update_may_keep_its_own_code() {
        let state = AppState::new();
        let (_, created) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/sectors",
            Some(json!({"code": "LAB", "name": "Lab"})),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        let (status, body) = send(
            app(state),
            "PUT",
            &format!("/v1/catalog/sectors/{id}"),
            Some(json!({"code": "lab", "name": "Laboratorio", "responsible": "Ana"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Laboratorio");
        assert_eq!(body["responsible"], "Ana");
    }

    #[tokio::test]
    async fn model_requires_existing_brand_and_unique_name() {
        let state = AppState::new();
        let (status, body) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/models",
            Some(json!({"code": "M1", "name": "Latitude", "brand_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["brand_id"].is_string());

        let (_, brand) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/brands",
            Some(json!({"code": "DELL", "name": "Dell"})),
        )
        .await;
        let brand_id = brand["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/models",
            Some(json!({"code": "M1", "name": "Latitude", "brand_id": brand_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(
            app(state),
            "POST",
            "/v1/catalog/models",
            Some(json!({"code": "M2", "name": "latitude", "brand_id": brand_id})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["name"].is_string());
    }

    #[tokio::test]
    async fn brand_with_active_models_cannot_be_deleted() {
        let state = AppState::new();
        let (_, brand) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/brands",
            Some(json!({"code": "LENOVO", "name": "Lenovo"})),
        )
        .await;
        let brand_id = brand["id"].as_str().unwrap().to_string();
        send(
            app(state.clone()),
            "POST",
            "/v1/catalog/models",
            Some(json!({"code": "T14", "name": "ThinkPad T14", "brand_id": brand_id})),
        )
        .await;

        let (status, body) =
            send(app(state.clone()), "DELETE", &format!("/v1/catalog/brands/{brand_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]["message"].as_str().unwrap().contains("1 active models"));

        let (status, models) = send(
            app(state),
            "GET",
            &format!("/v1/catalog/brands/{brand_id}/models"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(models.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn soft_deleted_record_disappears() {
        let state = AppState::new();
        let (_, created) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/provenances",
            Some(json!({"code": "DON", "name": "Donación"})),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        let (status, _) =
            send(app(state.clone()), "DELETE", &format!("/v1/catalog/provenances/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send(app(state.clone()), "GET", &format!("/v1/catalog/provenances/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, page) = send(app(state.clone()), "GET", "/v1/catalog/provenances", None).await;
        assert_eq!(page["total"], 0);
        assert_eq!(state.provenances.len(), 1);
    }

    #[tokio::test]
    async fn list_searches_orders_and_pages() {
        let state = AppState::new();
        for (code, name) in [("C", "Kilogramo"), ("A", "Unidad"), ("B", "Litro")] {
            send(
                app(state.clone()),
                "POST",
                "/v1/assets/units",
                Some(json!({"code": code, "name": name})),
            )
            .await;
        }
        let (_, page) = send(app(state.clone()), "GET", "/v1/assets/units?limit=2", None).await;
        assert_eq!(page["total"], 3);
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
        assert_eq!(page["items"][0]["code"], "A");

        let (_, page) = send(app(state), "GET", "/v1/assets/units?search=litro", None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["code"], "B");
    }

    #[tokio::test]
    async fn viewer_cannot_create_and_operator_cannot_delete() {
        let state = AppState::new();
        let viewer = CallerIdentity {
            role: Role::Viewer,
            user_id: None,
        };
        let (status, _) = send(
            app_with(state.clone(), viewer),
            "POST",
            "/v1/catalog/brands",
            Some(json!({"code": "X", "name": "X"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, created) = send(
            app(state.clone()),
            "POST",
            "/v1/catalog/brands",
            Some(json!({"code": "X", "name": "X"})),
        )
        .await;
        let operator = CallerIdentity {
            role: Role::Operator,
            user_id: None,
        };
        let (status, _) = send(
            app_with(state, operator),
            "DELETE",
            &format!("/v1/catalog/brands/{}", created["id"].as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn initial_status_prefers_lowest_active_code() {
        let store: Store<OrderStatus> = Store::new();
        let status = |code: &str, initial: bool, active: bool| {
            let mut audit = Audit::new();
            audit.active = active;
            OrderStatus {
                id: Uuid::new_v4(),
                code: code.into(),
                name: code.into(),
                description: None,
                fields: OrderStatusFields {
                    color: "#000".into(),
                    is_initial: initial,
                    is_final: false,
                    allows_edit: true,
                },
                audit,
            }
        };
        store.put(status("B", true, true));
        store.put(status("A", true, false));
        store.put(status("C", true, true));
        store.put(status("0", false, true));
        assert_eq!(initial_status(&store).map(|s| s.code), Some("B".to_string()));
        assert!(by_code(&store, "c").is_some());
    }
}
