//! # Goods Receptions
//!
//! Article receptions (`RART-`) raise warehouse stock; asset receptions
//! (`RACT-`) record incoming assets. Both may reference a purchase order,
//! whose matching line accumulates `received_quantity`.
//!
//! Routes, for `{kind}` in `article-receptions` and `asset-receptions`:
//! - GET  /v1/purchasing/{kind}              list (order_id, status_id, warehouse_id)
//! - POST /v1/purchasing/{kind}              create in the initial status
//! - GET  /v1/purchasing/{kind}/:id          fetch with lines
//! - POST /v1/purchasing/{kind}/:id/lines    add a received line
//! - POST /v1/purchasing/{kind}/:id/status   change status
//!
//! Receptions in a final status accept neither lines nor status changes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use inventa_core::numbering::{self, NumberFormat, ARTICLE_RECEPTION, ASSET_RECEPTION};
use inventa_core::text::optional;
use inventa_core::{Audit, FieldErrors, WorkflowError};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::documents::Changes;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::models::purchasing::{
    ArticleReceptionLine, AssetReceptionLine, PurchaseOrder, Reception, ReceptionLine,
};
use crate::pagination::{deserialize_optional_u64, Page};
use crate::routes::assets::find_asset;
use crate::routes::catalog::{check_ref, initial_status};
use crate::routes::purchasing::{assign_number, StatusInput};
use crate::routes::warehouse::find_article;
use crate::state::{AppState, Store};

/// A reception kind served under its own path.
pub trait ReceptionKind: ReceptionLine {
    const LABEL: &'static str;
    const NUMBERING: NumberFormat;
    fn store(state: &AppState) -> &Store<Reception<Self>>;
}

impl ReceptionKind for ArticleReceptionLine {
    const LABEL: &'static str = "article reception";
    const NUMBERING: NumberFormat = ARTICLE_RECEPTION;
    fn store(state: &AppState) -> &Store<Reception<Self>> {
        &state.article_receptions
    }
}

impl ReceptionKind for AssetReceptionLine {
    const LABEL: &'static str = "asset reception";
    const NUMBERING: NumberFormat = ASSET_RECEPTION;
    fn store(state: &AppState) -> &Store<Reception<Self>> {
        &state.asset_receptions
    }
}

// -- Request types ---------------------------------------------------------------

/// Request to open a reception.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReceptionInput {
    /// Assigned automatically when omitted.
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    /// Supplier invoice or dispatch guide.
    #[serde(default)]
    pub document_reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl Validate for ReceptionInput {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

/// A received article quantity.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ArticleLineInput {
    pub article_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for ArticleLineInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(self.quantity <= Decimal::ZERO, "quantity", "must be greater than zero");
    }
}

/// A received asset quantity.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssetLineInput {
    pub asset_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for AssetLineInput {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require(self.quantity <= Decimal::ZERO, "quantity", "must be greater than zero");
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReceptionQuery {
    pub order_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

// -- Router ------------------------------------------------------------------------

/// Build the receptions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(resource::<ArticleReceptionLine>("article-receptions"))
        .route(
            "/v1/purchasing/article-receptions/:id/lines",
            post(add_article_line),
        )
        .merge(resource::<AssetReceptionLine>("asset-receptions"))
        .route(
            "/v1/purchasing/asset-receptions/:id/lines",
            post(add_asset_line),
        )
}

fn resource<K: ReceptionKind>(path: &str) -> Router<AppState> {
    let base = format!("/v1/purchasing/{path}");
    Router::new()
        .route(&base, get(list::<K>).post(create::<K>))
        .route(&format!("{base}/:id"), get(fetch::<K>))
        .route(&format!("{base}/:id/status"), post(change_status::<K>))
}

// -- Shared helpers ----------------------------------------------------------------

fn find<K: ReceptionKind>(state: &AppState, id: Uuid) -> Result<Reception<K>, AppError> {
    K::store(state)
        .get(&id)
        .filter(|r| r.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", K::LABEL)))
}

/// Refuse changes to a reception in a final status.
fn ensure_open<L>(state: &AppState, label: &str, reception: &Reception<L>) -> Result<(), AppError> {
    match state.reception_statuses.get(&reception.status_id) {
        Some(status) if status.fields.is_final => Err(WorkflowError::Final {
            document: format!("{label} {}", reception.number),
            status: status.code,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Order referenced by a reception, if it still exists.
fn linked_order<L>(state: &AppState, reception: &Reception<L>) -> Option<PurchaseOrder> {
    reception
        .order_id
        .and_then(|id| state.purchase_orders.get(&id))
        .filter(|o| o.audit.is_visible())
}

// -- Generic handlers --------------------------------------------------------------

async fn list<K: ReceptionKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ReceptionQuery>, QueryRejection>,
) -> Result<Json<Page<Reception<K>>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;

    let mut receptions = K::store(&state).filter(|r| {
        r.audit.is_visible()
            && query.order_id.map_or(true, |o| r.order_id == Some(o))
            && query.status_id.map_or(true, |s| r.status_id == s)
            && query.warehouse_id.map_or(true, |w| r.warehouse_id == w)
    });
    receptions.sort_by(|a, b| b.received_at.cmp(&a.received_at));

    Ok(Json(Page::from_items(receptions, query.limit, query.offset)))
}

async fn create<K: ReceptionKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ReceptionInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Reception<K>>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "warehouse_id", &state.warehouses, input.warehouse_id);
    if let Some(order_id) = input.order_id {
        let found = state
            .purchase_orders
            .get(&order_id)
            .is_some_and(|o| o.audit.is_visible());
        errors.require(!found, "order_id", "purchase order does not exist");
    }
    errors.into_result()?;

    let status = initial_status(&state.reception_statuses)
        .ok_or_else(|| AppError::Validation("no initial reception status is configured".into()))?;

    let existing = K::store(&state).list();
    let number = assign_number(
        input.number,
        existing.iter().map(|r| r.number.as_str()),
        || numbering::next_number(K::NUMBERING, existing.iter().map(|r| r.number.as_str())),
    )?;

    let reception = Reception {
        id: Uuid::new_v4(),
        number,
        order_id: input.order_id,
        warehouse_id: input.warehouse_id,
        status_id: status.id,
        received_by: caller.user_id,
        document_reference: optional(input.document_reference),
        notes: optional(input.notes),
        received_at: input.received_at.unwrap_or_else(Utc::now),
        lines: Vec::new(),
        audit: Audit::new(),
    };

    let reception = state.save(K::store(&state), reception).await?;
    tracing::info!(number = %reception.number, kind = K::LABEL, "reception created");
    Ok((StatusCode::CREATED, Json(reception)))
}

async fn fetch<K: ReceptionKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Reception<K>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find::<K>(&state, id).map(Json)
}

async fn change_status<K: ReceptionKind>(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusInput>, JsonRejection>,
) -> Result<Json<Reception<K>>, AppError> {
    require_role(&caller, Role::Administrator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut reception = find::<K>(&state, id)?;
    ensure_open(&state, K::LABEL, &reception)?;
    let target = state
        .reception_statuses
        .get(&input.status_id)
        .filter(|s| s.is_usable())
        .ok_or_else(|| AppError::field("status_id", "status does not exist or is inactive"))?;

    reception.status_id = target.id;
    if let Some(notes) = optional(input.notes) {
        reception.notes = Some(match reception.notes.take() {
            Some(existing) => format!("{existing}\n{notes}"),
            None => notes,
        });
    }
    reception.audit.touch();

    let reception = state.save(K::store(&state), reception).await?;
    tracing::info!(number = %reception.number, status = %target.code, "reception status changed");
    Ok(Json(reception))
}

// -- Lines -------------------------------------------------------------------------

/// POST /v1/purchasing/article-receptions/:id/lines: Receive articles into stock.
///
/// The article's stock rises by the quantity, subject to its maximum. When
/// the reception references an order, the order's first line for the
/// article accumulates the received quantity.
#[utoipa::path(
    post,
    path = "/v1/purchasing/article-receptions/{id}/lines",
    params(("id" = Uuid, Path, description = "Reception ID")),
    request_body = ArticleLineInput,
    responses(
        (status = 201, description = "Line added; returns the reception"),
        (status = 409, description = "Reception is in a final status", body = crate::error::ErrorBody),
        (status = 422, description = "Validation or stock error", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn add_article_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ArticleLineInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Reception<ArticleReceptionLine>>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut reception = find::<ArticleReceptionLine>(&state, id)?;
    ensure_open(&state, ArticleReceptionLine::LABEL, &reception)?;
    let mut article = find_article(&state, input.article_id)?;

    article.stock = article.levels().enter(article.stock, input.quantity)?;
    article.audit.touch();

    let mut order = linked_order(&state, &reception);
    if let Some(order) = order.as_mut() {
        if let Some(line) = order
            .lines
            .iter_mut()
            .find(|l| l.article_id == Some(article.id))
        {
            line.received_quantity += input.quantity;
            order.audit.touch();
        }
    }

    reception.lines.push(ArticleReceptionLine {
        id: Uuid::new_v4(),
        article_id: article.id,
        quantity: input.quantity,
        lot: optional(input.lot),
        expiry_date: input.expiry_date,
        notes: optional(input.notes),
    });
    reception.audit.touch();

    let mut changes = Changes::new();
    changes.put(&reception)?;
    changes.put(&article)?;
    if let Some(order) = &order {
        changes.put(order)?;
    }
    state.commit(changes).await?;

    tracing::info!(
        reception = %reception.number,
        article = %article.sku,
        quantity = %input.quantity,
        stock = %article.stock,
        "articles received"
    );
    state.articles.put(article);
    if let Some(order) = order {
        state.purchase_orders.put(order);
    }
    state.article_receptions.put(reception.clone());
    Ok((StatusCode::CREATED, Json(reception)))
}

/// POST /v1/purchasing/asset-receptions/:id/lines: Record received assets.
#[utoipa::path(
    post,
    path = "/v1/purchasing/asset-receptions/{id}/lines",
    params(("id" = Uuid, Path, description = "Reception ID")),
    request_body = AssetLineInput,
    responses(
        (status = 201, description = "Line added; returns the reception"),
        (status = 409, description = "Reception is in a final status", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "purchasing"
)]
async fn add_asset_line(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AssetLineInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Reception<AssetReceptionLine>>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut reception = find::<AssetReceptionLine>(&state, id)?;
    ensure_open(&state, AssetReceptionLine::LABEL, &reception)?;
    let asset = find_asset(&state, input.asset_id)?;

    let serial = optional(input.serial_number);
    if asset.requires_serial && serial.is_none() {
        return Err(AppError::field(
            "serial_number",
            "this asset requires a serial number",
        ));
    }

    let mut order = linked_order(&state, &reception);
    if let Some(order) = order.as_mut() {
        if let Some(line) = order
            .lines
            .iter_mut()
            .find(|l| l.asset_id == Some(asset.id))
        {
            line.received_quantity += input.quantity;
            order.audit.touch();
        }
    }

    reception.lines.push(AssetReceptionLine {
        id: Uuid::new_v4(),
        asset_id: asset.id,
        quantity: input.quantity,
        serial_number: serial,
        notes: optional(input.notes),
    });
    reception.audit.touch();

    let mut changes = Changes::new();
    changes.put(&reception)?;
    if let Some(order) = &order {
        changes.put(order)?;
    }
    state.commit(changes).await?;

    if let Some(order) = order {
        state.purchase_orders.put(order);
    }
    state.asset_receptions.put(reception.clone());
    Ok((StatusCode::CREATED, Json(reception)))
}
