//! # Purchasing: Suppliers and Purchase Orders
//!
//! Routes:
//! - GET    /v1/purchasing/suppliers                      list (search, active)
//! - POST   /v1/purchasing/suppliers                      create
//! - GET    /v1/purchasing/suppliers/:id                  fetch
//! - PUT    /v1/purchasing/suppliers/:id                  update
//! - DELETE /v1/purchasing/suppliers/:id                  soft delete, refused while orders exist
//! - GET    /v1/purchasing/orders                         list (supplier_id, status_id)
//! - POST   /v1/purchasing/orders                         create in the initial status
//! - GET    /v1/purchasing/orders/:id                     fetch with lines
//! - PUT    /v1/purchasing/orders/:id                     edit dates, notes, discount
//! - POST   /v1/purchasing/orders/:id/status              change status
//! - POST   /v1/purchasing/orders/:id/article-lines       add an article line
//! - POST   /v1/purchasing/orders/:id/asset-lines         add an asset line
//! - DELETE /v1/purchasing/orders/:id/lines/:line_id      remove a line
//!
//! Lines can only change while the order's status allows editing. Every
//! line change recalculates the order totals before it is persisted.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use inventa_core::numbering::{self, PURCHASE_ORDER};
use inventa_core::text::{contains_ci, optional};
use inventa_core::{line_subtotal, Audit, Email, FieldErrors, Rut, WorkflowError};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::purchasing::{OrderLine, PurchaseOrder, Supplier};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::routes::assets::find_asset;
use crate::routes::catalog::check_optional_ref;
use crate::routes::warehouse::find_article;
use crate::state::AppState;

const DEFAULT_PAYMENT_TERMS: &str = "Contado";

// -- Request types ---------------------------------------------------------------

/// Request to create or update a supplier.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SupplierInput {
    /// RUT in any common notation; stored formatted.
    pub rut: String,
    pub business_name: String,
    #[serde(default)]
    pub trade_name: Option<String>,
    #[serde(default)]
    pub line_of_business: Option<String>,
    pub address: String,
    #[serde(default)]
    pub commune: Option<String>,
    pub city: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub credit_days: u32,
    #[serde(default)]
    pub active: Option<bool>,
}

impl Validate for SupplierInput {
    fn validate(&self, errors: &mut FieldErrors) {
        if let Err(e) = Rut::new(&self.rut) {
            errors.add("rut", e.to_string());
        }
        require_text(errors, "business_name", &self.business_name);
        require_text(errors, "address", &self.address);
        require_text(errors, "city", &self.city);
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if let Err(e) = Email::new(email) {
                errors.add("email", e.to_string());
            }
        }
    }
}

/// Request to create a purchase order.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderInput {
    /// Assigned automatically when omitted.
    #[serde(default)]
    pub number: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    pub supplier_id: Uuid,
    #[serde(default)]
    pub warehouse_id: Option<Uuid>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
}

impl Validate for OrderInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(self.discount < Decimal::ZERO, "discount", "must not be negative");
        if let (Some(order), Some(expected)) = (self.order_date, self.expected_delivery) {
            errors.require(
                expected < order,
                "expected_delivery",
                "must not be before the order date",
            );
        }
    }
}

/// Editable fields of an existing order. Omitted fields keep their value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderUpdate {
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub actual_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
}

impl Validate for OrderUpdate {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(
            self.discount.is_some_and(|d| d < Decimal::ZERO),
            "discount",
            "must not be negative",
        );
    }
}

/// Refresh order totals, reporting an oversized discount against `discount`.
fn recalculate(order: &mut PurchaseOrder) -> Result<(), AppError> {
    order
        .recalculate()
        .map_err(|e| AppError::field("discount", e.to_string()))
}

/// Request to move a document to another status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusInput {
    pub status_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for StatusInput {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

/// Request to add an order line. The item field depends on the route.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LineInput {
    #[serde(default)]
    pub article_id: Option<Uuid>,
    #[serde(default)]
    pub asset_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for LineInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(self.quantity <= Decimal::ZERO, "quantity", "must be greater than zero");
        errors.require(self.unit_price < Decimal::ZERO, "unit_price", "must not be negative");
        errors.require(self.discount < Decimal::ZERO, "discount", "must not be negative");
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SupplierQuery {
    /// Case-insensitive match on RUT, business name or trade name.
    pub search: Option<String>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderQuery {
    pub supplier_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

// -- Router ------------------------------------------------------------------------

/// Build the purchasing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/purchasing/suppliers",
            get(list_suppliers).post(create_supplier),
        )
        .route(
            "/v1/purchasing/suppliers/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/v1/purchasing/orders", get(list_orders).post(create_order))
        .route("/v1/purchasing/orders/:id", get(get_order).put(update_order))
        .route("/v1/purchasing/orders/:id/status", post(change_order_status))
        .route("/v1/purchasing/orders/:id/article-lines", post(add_article_line))
        .route("/v1/purchasing/orders/:id/asset-lines", post(add_asset_line))
        .route("/v1/purchasing/orders/:id/lines/:line_id", delete(remove_line))
}

// -- Suppliers ---------------------------------------------------------------------

fn find_supplier(state: &AppState, id: Uuid) -> Result<Supplier, AppError> {
    state
        .suppliers
        .get(&id)
        .filter(|s| s.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("supplier {id} not found")))
}

/// Normalized RUT and email of a validated input, with the RUT uniqueness check.
fn check_supplier(
    state: &AppState,
    input: &SupplierInput,
    id: Option<Uuid>,
) -> Result<(String, Option<String>), AppError> {
    let rut = Rut::new(&input.rut)?.formatted();
    if state
        .suppliers
        .any(|s| s.audit.is_visible() && Some(s.id) != id && s.rut == rut)
    {
        return Err(AppError::field("rut", "a supplier with this RUT already exists"));
    }
    let email = optional(input.email.clone())
        .map(Email::new)
        .transpose()?
        .map(|e| e.as_str().to_string());
    Ok((rut, email))
}

/// GET /v1/purchasing/suppliers: List suppliers.
#[utoipa::path(
    get,
    path = "/v1/purchasing/suppliers",
    params(SupplierQuery),
    responses((status = 200, description = "Page of suppliers")),
    tag = "purchasing"
)]
async fn list_suppliers(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<SupplierQuery>, QueryRejection>,
) -> Result<Json<Page<Supplier>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let search = optional(query.search);

    let mut suppliers = state.suppliers.filter(|s| {
        s.audit.is_visible()
            && query.active.map_or(true, |active| s.audit.active == active)
            && search.as_deref().map_or(true, |q| {
                contains_ci(&s.rut, q)
                    || contains_ci(&s.business_name, q)
                    || s.trade_name.as_deref().is_some_and(|t| contains_ci(t, q))
            })
    });
    suppliers.sort_by(|a, b| a.business_name.to_lowercase().cmp(&b.business_name.to_lowercase()));

    Ok(Json(Page::from_items(suppliers, query.limit, query.offset)))
}

/// POST /v1/purchasing/suppliers: Register a supplier.
#[utoipa::path(
    post,
    path = "/v1/purchasing/suppliers",
    request_body = SupplierInput,
    responses(
        (status = 201, description = "Supplier created", body = Supplier),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn create_supplier(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SupplierInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Supplier>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let (rut, email) = check_supplier(&state, &input, None)?;

    let mut audit = Audit::new();
    audit.active = input.active.unwrap_or(true);
    let supplier = Supplier {
        id: Uuid::new_v4(),
        rut,
        business_name: input.business_name.trim().to_string(),
        trade_name: optional(input.trade_name),
        line_of_business: optional(input.line_of_business),
        address: input.address.trim().to_string(),
        commune: optional(input.commune),
        city: input.city.trim().to_string(),
        phone: optional(input.phone),
        email,
        website: optional(input.website),
        payment_terms: optional(input.payment_terms)
            .unwrap_or_else(|| DEFAULT_PAYMENT_TERMS.to_string()),
        credit_days: input.credit_days,
        audit,
    };

    let supplier = state.save(&state.suppliers, supplier).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// GET /v1/purchasing/suppliers/:id: Fetch a supplier.
#[utoipa::path(
    get,
    path = "/v1/purchasing/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier", body = Supplier),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn get_supplier(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Supplier>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_supplier(&state, id).map(Json)
}

/// PUT /v1/purchasing/suppliers/:id: Update a supplier.
#[utoipa::path(
    put,
    path = "/v1/purchasing/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = SupplierInput,
    responses(
        (status = 200, description = "Supplier updated", body = Supplier),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn update_supplier(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<SupplierInput>, JsonRejection>,
) -> Result<Json<Supplier>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut supplier = find_supplier(&state, id)?;
    let (rut, email) = check_supplier(&state, &input, Some(id))?;

    supplier.rut = rut;
    supplier.business_name = input.business_name.trim().to_string();
    supplier.trade_name = optional(input.trade_name);
    supplier.line_of_business = optional(input.line_of_business);
    supplier.address = input.address.trim().to_string();
    supplier.commune = optional(input.commune);
    supplier.city = input.city.trim().to_string();
    supplier.phone = optional(input.phone);
    supplier.email = email;
    supplier.website = optional(input.website);
    if let Some(terms) = optional(input.payment_terms) {
        supplier.payment_terms = terms;
    }
    supplier.credit_days = input.credit_days;
    if let Some(active) = input.active {
        supplier.audit.active = active;
    }
    supplier.audit.touch();

    let supplier = state.save(&state.suppliers, supplier).await?;
    Ok(Json(supplier))
}

/// DELETE /v1/purchasing/suppliers/:id: Soft-delete a supplier without orders.
#[utoipa::path(
    delete,
    path = "/v1/purchasing/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 204, description = "Supplier deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Supplier has purchase orders", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn delete_supplier(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Administrator)?;

    let _gate = state.write_lock().await;
    let mut supplier = find_supplier(&state, id)?;
    let orders = state.purchase_orders.count(|o| o.supplier_id == id);
    if orders > 0 {
        return Err(AppError::Conflict(format!(
            "supplier {} has {orders} purchase orders",
            supplier.rut
        )));
    }

    supplier.audit.soft_delete();
    state.save(&state.suppliers, supplier).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Orders --------------------------------------------------------------------------

fn find_order(state: &AppState, id: Uuid) -> Result<PurchaseOrder, AppError> {
    state
        .purchase_orders
        .get(&id)
        .filter(|o| o.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("purchase order {id} not found")))
}

/// Refuse changes unless the order's status allows editing.
fn ensure_editable(state: &AppState, order: &PurchaseOrder) -> Result<(), AppError> {
    match state.order_statuses.get(&order.status_id) {
        Some(status) if !status.fields.allows_edit => Err(WorkflowError::NotAllowed(format!(
            "purchase order {} cannot be edited in status {}",
            order.number, status.code
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Caller-provided number if unique, otherwise the next in sequence.
pub(crate) fn assign_number<'a>(
    provided: Option<String>,
    existing: impl Iterator<Item = &'a str> + Clone,
    next: impl FnOnce() -> String,
) -> Result<String, AppError> {
    match optional(provided) {
        Some(number) => {
            let number = number.to_uppercase();
            if existing.clone().any(|n| n == number) {
                Err(AppError::field("number", "this number is already in use"))
            } else {
                Ok(number)
            }
        }
        None => Ok(next()),
    }
}

/// GET /v1/purchasing/orders: List orders, newest first.
#[utoipa::path(
    get,
    path = "/v1/purchasing/orders",
    params(OrderQuery),
    responses((status = 200, description = "Page of purchase orders")),
    tag = "purchasing"
)]
async fn list_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<OrderQuery>, QueryRejection>,
) -> Result<Json<Page<PurchaseOrder>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;

    let mut orders = state.purchase_orders.filter(|o| {
        o.audit.is_visible()
            && query.supplier_id.map_or(true, |s| o.supplier_id == s)
            && query.status_id.map_or(true, |s| o.status_id == s)
    });
    orders.sort_by(|a, b| {
        b.order_date
            .cmp(&a.order_date)
            .then(b.number.cmp(&a.number))
    });

    Ok(Json(Page::from_items(orders, query.limit, query.offset)))
}

/// POST /v1/purchasing/orders: Create a purchase order.
#[utoipa::path(
    post,
    path = "/v1/purchasing/orders",
    request_body = OrderInput,
    responses(
        (status = 201, description = "Order created", body = PurchaseOrder),
        (status = 422, description = "Validation error or no initial status", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn create_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<OrderInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseOrder>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut errors = FieldErrors::new();
    let supplier_ok = state
        .suppliers
        .get(&input.supplier_id)
        .is_some_and(|s| s.audit.is_usable());
    errors.require(!supplier_ok, "supplier_id", "supplier does not exist or is inactive");
    check_optional_ref(&mut errors, "warehouse_id", &state.warehouses, input.warehouse_id);
    errors.into_result()?;

    let status = crate::routes::catalog::initial_status(&state.order_statuses)
        .ok_or_else(|| AppError::Validation("no initial purchase order status is configured".into()))?;

    let existing = state.purchase_orders.list();
    let number = assign_number(
        input.number,
        existing.iter().map(|o| o.number.as_str()),
        || numbering::next_number(PURCHASE_ORDER, existing.iter().map(|o| o.number.as_str())),
    )?;

    let mut order = PurchaseOrder {
        id: Uuid::new_v4(),
        number,
        order_date: input.order_date.unwrap_or_else(|| Utc::now().date_naive()),
        expected_delivery: input.expected_delivery,
        actual_delivery: None,
        supplier_id: input.supplier_id,
        warehouse_id: input.warehouse_id,
        status_id: status.id,
        requested_by: caller.user_id,
        approved_by: None,
        subtotal: Decimal::ZERO,
        tax: Decimal::ZERO,
        discount: input.discount,
        total: Decimal::ZERO,
        notes: optional(input.notes),
        internal_notes: optional(input.internal_notes),
        lines: Vec::new(),
        audit: Audit::new(),
    };
    recalculate(&mut order)?;

    let order = state.save(&state.purchase_orders, order).await?;
    tracing::info!(number = %order.number, "purchase order created");
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/purchasing/orders/:id: Fetch an order with its lines.
#[utoipa::path(
    get,
    path = "/v1/purchasing/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = PurchaseOrder),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn get_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrder>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_order(&state, id).map(Json)
}

/// PUT /v1/purchasing/orders/:id: Edit dates, notes and discount.
#[utoipa::path(
    put,
    path = "/v1/purchasing/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OrderUpdate,
    responses(
        (status = 200, description = "Order updated", body = PurchaseOrder),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Status does not allow editing", body = crate::error::ErrorBody),
        (status = 422, description = "Discount negative or above the subtotal", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn update_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<OrderUpdate>, JsonRejection>,
) -> Result<Json<PurchaseOrder>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut order = find_order(&state, id)?;
    ensure_editable(&state, &order)?;

    if let Some(date) = input.order_date {
        order.order_date = date;
    }
    if input.expected_delivery.is_some() {
        order.expected_delivery = input.expected_delivery;
    }
    if input.actual_delivery.is_some() {
        order.actual_delivery = input.actual_delivery;
    }
    if let Some(discount) = input.discount {
        order.discount = discount;
    }
    if input.notes.is_some() {
        order.notes = optional(input.notes);
    }
    if input.internal_notes.is_some() {
        order.internal_notes = optional(input.internal_notes);
    }
    recalculate(&mut order)?;
    order.audit.touch();

    let order = state.save(&state.purchase_orders, order).await?;
    Ok(Json(order))
}

/// POST /v1/purchasing/orders/:id/status: Move an order to another status.
///
/// Refused once the order is in a final status. Moving into a final status
/// records the caller as approver when none is set.
#[utoipa::path(
    post,
    path = "/v1/purchasing/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = StatusInput,
    responses(
        (status = 200, description = "Status changed", body = PurchaseOrder),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Order is in a final status", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn change_order_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusInput>, JsonRejection>,
) -> Result<Json<PurchaseOrder>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut order = find_order(&state, id)?;
    if let Some(current) = state.order_statuses.get(&order.status_id) {
        if current.fields.is_final {
            return Err(WorkflowError::Final {
                document: format!("purchase order {}", order.number),
                status: current.code,
            }
            .into());
        }
    }
    let target = state
        .order_statuses
        .get(&input.status_id)
        .filter(|s| s.is_usable())
        .ok_or_else(|| AppError::field("status_id", "status does not exist or is inactive"))?;

    order.status_id = target.id;
    if target.fields.is_final && order.approved_by.is_none() {
        order.approved_by = caller.user_id;
    }
    if let Some(notes) = optional(input.notes) {
        order.internal_notes = Some(match order.internal_notes.take() {
            Some(existing) => format!("{existing}\n{notes}"),
            None => notes,
        });
    }
    order.audit.touch();

    let order = state.save(&state.purchase_orders, order).await?;
    tracing::info!(number = %order.number, status = %target.code, "purchase order status changed");
    Ok(Json(order))
}

/// Shared part of adding a line: editability, subtotal, recalculation, save.
async fn add_line(
    state: &AppState,
    order_id: Uuid,
    input: LineInput,
) -> Result<PurchaseOrder, AppError> {
    let mut order = find_order(state, order_id)?;
    ensure_editable(state, &order)?;

    let subtotal = line_subtotal(input.quantity, input.unit_price, input.discount)?;
    order.lines.push(OrderLine {
        id: Uuid::new_v4(),
        article_id: input.article_id,
        asset_id: input.asset_id,
        quantity: input.quantity,
        unit_price: input.unit_price,
        discount: input.discount,
        subtotal,
        received_quantity: Decimal::ZERO,
        notes: optional(input.notes),
    });
    recalculate(&mut order)?;
    order.audit.touch();

    state.save(&state.purchase_orders, order).await
}

/// POST /v1/purchasing/orders/:id/article-lines: Add an article line.
#[utoipa::path(
    post,
    path = "/v1/purchasing/orders/{id}/article-lines",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = LineInput,
    responses(
        (status = 201, description = "Line added; returns the recalculated order", body = PurchaseOrder),
        (status = 409, description = "Status does not allow editing", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn add_article_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<LineInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseOrder>), AppError> {
    require_role(&caller, Role::Operator)?;
    let mut input = extract_validated_json(body)?;
    let article_id = input
        .article_id
        .ok_or_else(|| AppError::field("article_id", "this field is required"))?;
    input.asset_id = None;

    let _gate = state.write_lock().await;
    find_article(&state, article_id)?;
    let order = add_line(&state, id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /v1/purchasing/orders/:id/asset-lines: Add an asset line.
#[utoipa::path(
    post,
    path = "/v1/purchasing/orders/{id}/asset-lines",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = LineInput,
    responses(
        (status = 201, description = "Line added; returns the recalculated order", body = PurchaseOrder),
        (status = 409, description = "Status does not allow editing", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn add_asset_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<LineInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseOrder>), AppError> {
    require_role(&caller, Role::Operator)?;
    let mut input = extract_validated_json(body)?;
    let asset_id = input
        .asset_id
        .ok_or_else(|| AppError::field("asset_id", "this field is required"))?;
    input.article_id = None;

    let _gate = state.write_lock().await;
    find_asset(&state, asset_id)?;
    let order = add_line(&state, id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// DELETE /v1/purchasing/orders/:id/lines/:line_id: Remove a line.
#[utoipa::path(
    delete,
    path = "/v1/purchasing/orders/{id}/lines/{line_id}",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("line_id" = Uuid, Path, description = "Line ID"),
    ),
    responses(
        (status = 200, description = "Line removed; returns the recalculated order", body = PurchaseOrder),
        (status = 404, description = "Order or line not found", body = crate::error::ErrorBody),
        (status = 409, description = "Status does not allow editing", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn remove_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PurchaseOrder>, AppError> {
    require_role(&caller, Role::Operator)?;

    let _gate = state.write_lock().await;
    let mut order = find_order(&state, id)?;
    ensure_editable(&state, &order)?;

    let before = order.lines.len();
    order.lines.retain(|l| l.id != line_id);
    if order.lines.len() == before {
        return Err(AppError::NotFound(format!(
            "line {line_id} not found in purchase order {}",
            order.number
        )));
    }
    recalculate(&mut order)?;
    order.audit.touch();

    let order = state.save(&state.purchase_orders, order).await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{
        ArticleCategory, ArticleCategoryFields, CatalogRecord, OrderStatus, OrderStatusFields,
        Warehouse, WarehouseFields,
    };
    use crate::models::warehouse::Article;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn status(code: &str, initial: bool, is_final: bool, allows_edit: bool) -> OrderStatus {
        CatalogRecord {
            id: Uuid::new_v4(),
            code: code.into(),
            name: code.into(),
            description: None,
            fields: OrderStatusFields {
                color: "#000".into(),
                is_initial: initial,
                is_final,
                allows_edit,
            },
            audit: Audit::new(),
        }
    }

    struct Fixture {
        state: AppState,
        sent: Uuid,
        closed: Uuid,
        article: Uuid,
    }

    fn fixture() -> Fixture {
        let state = AppState::new();
        let draft = status("BORRADOR", true, false, true);
        let sent = status("ENVIADA", false, false, false);
        let closed = status("CERRADA", false, true, false);
        let category: ArticleCategory = CatalogRecord {
            id: Uuid::new_v4(),
            code: "OF".into(),
            name: "Oficina".into(),
            description: None,
            fields: ArticleCategoryFields {},
            audit: Audit::new(),
        };
        let warehouse: Warehouse = CatalogRecord {
            id: Uuid::new_v4(),
            code: "B1".into(),
            name: "Bodega".into(),
            description: None,
            fields: WarehouseFields { responsible: None },
            audit: Audit::new(),
        };
        let article = Article {
            id: Uuid::new_v4(),
            sku: "RESMA".into(),
            code: "RESMA".into(),
            name: "Resma carta".into(),
            description: None,
            brand: None,
            category_id: category.id,
            warehouse_id: warehouse.id,
            stock: Decimal::ZERO,
            minimum_stock: Decimal::ZERO,
            maximum_stock: None,
            reorder_point: None,
            unit: "UN".into(),
            notes: None,
            audit: Audit::new(),
        };
        let fx = Fixture {
            state: state.clone(),
            sent: sent.id,
            closed: closed.id,
            article: article.id,
        };
        state.order_statuses.put(draft);
        state.order_statuses.put(sent);
        state.order_statuses.put(closed);
        state.article_categories.put(category);
        state.warehouses.put(warehouse);
        state.articles.put(article);
        fx
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let caller = CallerIdentity {
            role: Role::Administrator,
            user_id: Some(Uuid::nil()),
        };
        let app = router()
            .layer(axum::Extension(caller))
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

    fn supplier_body(rut: &str) -> Value {
        json!({
            "rut": rut,
            "business_name": "Librería Central SpA",
            "address": "Av. Matta 123",
            "city": "Santiago",
            "email": " Ventas@Libreria.CL "
        })
    }

    async fn supplier(state: &AppState) -> String {
        let (status, body) =
            send(state, "POST", "/v1/purchasing/suppliers", Some(supplier_body("76.086.428-5"))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn supplier_rut_is_validated_and_formatted() {
        let fx = fixture();
        let (status, body) =
            send(&fx.state, "POST", "/v1/purchasing/suppliers", Some(supplier_body("760864285"))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["rut"], "76.086.428-5");
        assert_eq!(body["email"], "ventas@libreria.cl");
        assert_eq!(body["payment_terms"], "Contado");

        let (status, body) =
            send(&fx.state, "POST", "/v1/purchasing/suppliers", Some(supplier_body("76086428-5"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["rut"].is_string());

        let (status, body) =
            send(&fx.state, "POST", "/v1/purchasing/suppliers", Some(supplier_body("76086428-1"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["rut"].is_string());
    }

    #[tokio::test]
    async fn order_numbers_and_totals() {
        let fx = fixture();
        let supplier_id = supplier(&fx.state).await;

        let (status, order) = send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        assert_eq!(order["number"], "OC-00000001");
        assert_eq!(order["requested_by"], Uuid::nil().to_string());
        let id = order["id"].as_str().unwrap().to_string();

        let (status, order) = send(
            &fx.state,
            "POST",
            &format!("/v1/purchasing/orders/{id}/article-lines"),
            Some(json!({"article_id": fx.article, "quantity": "10", "unit_price": "110"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        let (status, _) = send(
            &fx.state,
            "PUT",
            &format!("/v1/purchasing/orders/{id}"),
            Some(json!({"discount": "100"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored = fx.state.purchase_orders.get(&id.parse().unwrap()).unwrap();
        assert_eq!(stored.subtotal, dec!(1100));
        assert_eq!(stored.tax, dec!(190));
        assert_eq!(stored.total, dec!(1190));

        let line_id = order["lines"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &fx.state,
            "PUT",
            &format!("/v1/purchasing/orders/{id}"),
            Some(json!({"discount": "0"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &fx.state,
            "DELETE",
            &format!("/v1/purchasing/orders/{id}/lines/{line_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored = fx.state.purchase_orders.get(&id.parse().unwrap()).unwrap();
        assert!(stored.lines.is_empty());
        assert_eq!(stored.subtotal, Decimal::ZERO);

        let (_, second) = send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id})),
        )
        .await;
        assert_eq!(second["number"], "OC-00000002");
    }

    #[tokio::test]
    async fn discount_cannot_exceed_subtotal() {
        let fx = fixture();
        let supplier_id = supplier(&fx.state).await;

        let (status, body) = send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id, "discount": "100"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["discount"].is_string());

        let (_, order) = send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id})),
        )
        .await;
        let id = order["id"].as_str().unwrap().to_string();
        let (_, order) = send(
            &fx.state,
            "POST",
            &format!("/v1/purchasing/orders/{id}/article-lines"),
            Some(json!({"article_id": fx.article, "quantity": "2", "unit_price": "500"})),
        )
        .await;
        let line_id = order["lines"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &fx.state,
            "PUT",
            &format!("/v1/purchasing/orders/{id}"),
            Some(json!({"discount": "1000.01"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["discount"].as_str().unwrap().contains("exceeds"));

        let (status, _) = send(
            &fx.state,
            "PUT",
            &format!("/v1/purchasing/orders/{id}"),
            Some(json!({"discount": "1000"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Removing the only line would leave the discount above a zero subtotal.
        let (status, _) = send(
            &fx.state,
            "DELETE",
            &format!("/v1/purchasing/orders/{id}/lines/{line_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let stored = fx.state.purchase_orders.get(&id.parse().unwrap()).unwrap();
        assert_eq!(stored.lines.len(), 1);
        assert_eq!(stored.discount, dec!(1000));
        assert_eq!(stored.total, Decimal::ZERO);
        assert!(stored.tax >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn lines_refused_when_status_disallows_edit() {
        let fx = fixture();
        let supplier_id = supplier(&fx.state).await;
        let (_, order) = send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id})),
        )
        .await;
        let id = order["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &fx.state,
            "POST",
            &format!("/v1/purchasing/orders/{id}/status"),
            Some(json!({"status_id": fx.sent})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &fx.state,
            "POST",
            &format!("/v1/purchasing/orders/{id}/article-lines"),
            Some(json!({"article_id": fx.article, "quantity": "1", "unit_price": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn final_status_is_terminal_and_records_approver() {
        let fx = fixture();
        let supplier_id = supplier(&fx.state).await;
        let (_, order) = send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id})),
        )
        .await;
        let id = order["id"].as_str().unwrap().to_string();

        let (status, order) = send(
            &fx.state,
            "POST",
            &format!("/v1/purchasing/orders/{id}/status"),
            Some(json!({"status_id": fx.closed})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["approved_by"], Uuid::nil().to_string());

        let (status, body) = send(
            &fx.state,
            "POST",
            &format!("/v1/purchasing/orders/{id}/status"),
            Some(json!({"status_id": fx.sent})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]["message"].as_str().unwrap().contains("final status"));
    }

    #[tokio::test]
    async fn supplier_with_orders_cannot_be_deleted() {
        let fx = fixture();
        let supplier_id = supplier(&fx.state).await;
        send(
            &fx.state,
            "POST",
            "/v1/purchasing/orders",
            Some(json!({"supplier_id": supplier_id})),
        )
        .await;
        let (status, _) = send(
            &fx.state,
            "DELETE",
            &format!("/v1/purchasing/suppliers/{supplier_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn duplicate_order_number_is_rejected() {
        let fx = fixture();
        let supplier_id = supplier(&fx.state).await;
        let body = json!({"supplier_id": supplier_id, "number": "oc-manual-1"});
        let (status, order) =
            send(&fx.state, "POST", "/v1/purchasing/orders", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["number"], "OC-MANUAL-1");
        let (status, _) = send(&fx.state, "POST", "/v1/purchasing/orders", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
