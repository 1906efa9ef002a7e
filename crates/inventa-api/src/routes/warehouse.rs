//! # Warehouse: Articles and Stock Movements
//!
//! Routes:
//! - GET    /v1/warehouse/articles                 list (search, category_id, warehouse_id, active)
//! - POST   /v1/warehouse/articles                 create
//! - GET    /v1/warehouse/articles/low-stock       active articles at or below minimum
//! - GET    /v1/warehouse/articles/reorder         active articles at or below reorder point
//! - GET    /v1/warehouse/articles/:id             fetch
//! - PUT    /v1/warehouse/articles/:id             update (stock is not editable)
//! - DELETE /v1/warehouse/articles/:id             soft delete
//! - GET    /v1/warehouse/articles/:id/movements   history, newest first
//! - POST   /v1/warehouse/movements                register a stock entry or exit
//! - GET    /v1/warehouse/movements                list, newest first
//! - GET    /v1/warehouse/movements/:id            fetch

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use inventa_core::text::{contains_ci, optional};
use inventa_core::{Audit, FieldErrors, Operation, StockLevels};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::db::documents::Changes;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require_text, Validate};
use crate::models::warehouse::{Article, Movement};
use crate::pagination::{deserialize_optional_u64, Page, DEFAULT_PAGE_LIMIT};
use crate::routes::catalog::check_ref;
use crate::state::AppState;

const DEFAULT_UNIT: &str = "UN";

/// Request to create or update an article.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ArticleInput {
    pub sku: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub category_id: Uuid,
    pub warehouse_id: Uuid,
    /// Opening stock. Only read on create.
    #[serde(default)]
    pub initial_stock: Option<Decimal>,
    #[serde(default)]
    pub minimum_stock: Decimal,
    #[serde(default)]
    pub maximum_stock: Option<Decimal>,
    #[serde(default)]
    pub reorder_point: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ArticleInput {
    fn levels(&self) -> StockLevels {
        StockLevels {
            minimum: self.minimum_stock,
            maximum: self.maximum_stock,
            reorder_point: self.reorder_point,
        }
    }
}

impl Validate for ArticleInput {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "sku", &self.sku);
        require_text(errors, "code", &self.code);
        require_text(errors, "name", &self.name);
        if let Err(e) = self.levels().validate() {
            errors.add("minimum_stock", e.to_string());
        }
        if let Some(initial) = self.initial_stock {
            errors.require(initial < Decimal::ZERO, "initial_stock", "must not be negative");
            if let Some(max) = self.maximum_stock {
                errors.require(initial > max, "initial_stock", "exceeds maximum_stock");
            }
        }
    }
}

/// Request to register a stock movement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MovementInput {
    pub article_id: Uuid,
    pub movement_type_id: Uuid,
    /// `ENTRY` or `EXIT`.
    pub operation: String,
    pub quantity: Decimal,
    pub reason: String,
}

impl Validate for MovementInput {
    fn validate(&self, errors: &mut FieldErrors) {
        if let Err(e) = self.operation.parse::<Operation>() {
            errors.add("operation", e);
        }
        errors.require(
            self.quantity <= Decimal::ZERO,
            "quantity",
            "must be greater than zero",
        );
        require_text(errors, "reason", &self.reason);
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ArticleQuery {
    /// Case-insensitive match on SKU, code or name.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MovementQuery {
    pub article_id: Option<Uuid>,
    pub movement_type_id: Option<Uuid>,
    pub operation: Option<Operation>,
    pub recorded_by: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
}

/// Build the warehouse router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/warehouse/articles",
            get(list_articles).post(create_article),
        )
        .route("/v1/warehouse/articles/low-stock", get(low_stock))
        .route("/v1/warehouse/articles/reorder", get(reorder))
        .route(
            "/v1/warehouse/articles/:id",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/v1/warehouse/articles/:id/movements", get(article_movements))
        .route(
            "/v1/warehouse/movements",
            get(list_movements).post(create_movement),
        )
        .route("/v1/warehouse/movements/:id", get(get_movement))
}

pub(crate) fn find_article(state: &AppState, id: Uuid) -> Result<Article, AppError> {
    state
        .articles
        .get(&id)
        .filter(|a| a.audit.is_visible())
        .ok_or_else(|| AppError::NotFound(format!("article {id} not found")))
}

/// Cross-record checks shared by create and update.
fn check_article(state: &AppState, input: &ArticleInput, id: Option<Uuid>) -> Result<String, AppError> {
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "category_id", &state.article_categories, input.category_id);
    check_ref(&mut errors, "warehouse_id", &state.warehouses, input.warehouse_id);

    let sku = input.sku.trim().to_uppercase();
    let taken = state
        .articles
        .any(|a| a.audit.is_visible() && Some(a.id) != id && a.sku == sku);
    errors.require(taken, "sku", "an article with this SKU already exists");
    errors.into_result()?;
    Ok(sku)
}

/// GET /v1/warehouse/articles: List articles.
#[utoipa::path(
    get,
    path = "/v1/warehouse/articles",
    params(ArticleQuery),
    responses((status = 200, description = "Page of articles")),
    tag = "warehouse"
)]
async fn list_articles(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ArticleQuery>, QueryRejection>,
) -> Result<Json<Page<Article>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    let search = optional(query.search);

    let mut articles = state.articles.filter(|a| {
        a.audit.is_visible()
            && query.category_id.map_or(true, |c| a.category_id == c)
            && query.warehouse_id.map_or(true, |w| a.warehouse_id == w)
            && query.active.map_or(true, |active| a.audit.active == active)
            && search.as_deref().map_or(true, |s| {
                contains_ci(&a.sku, s) || contains_ci(&a.code, s) || contains_ci(&a.name, s)
            })
    });
    articles.sort_by(|a, b| a.code.cmp(&b.code));

    Ok(Json(Page::from_items(articles, query.limit, query.offset)))
}

/// POST /v1/warehouse/articles: Create an article.
#[utoipa::path(
    post,
    path = "/v1/warehouse/articles",
    request_body = ArticleInput,
    responses(
        (status = 201, description = "Article created", body = Article),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "warehouse"
)]
async fn create_article(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ArticleInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let sku = check_article(&state, &input, None)?;

    let mut audit = Audit::new();
    audit.active = input.active.unwrap_or(true);
    let article = Article {
        id: Uuid::new_v4(),
        sku,
        code: input.code.trim().to_uppercase(),
        name: input.name.trim().to_string(),
        description: optional(input.description),
        brand: optional(input.brand),
        category_id: input.category_id,
        warehouse_id: input.warehouse_id,
        stock: input.initial_stock.unwrap_or(Decimal::ZERO),
        minimum_stock: input.minimum_stock,
        maximum_stock: input.maximum_stock,
        reorder_point: input.reorder_point,
        unit: optional(input.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        notes: optional(input.notes),
        audit,
    };

    let article = state.save(&state.articles, article).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// GET /v1/warehouse/articles/:id: Fetch an article.
#[utoipa::path(
    get,
    path = "/v1/warehouse/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article", body = Article),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "warehouse"
)]
async fn get_article(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>, AppError> {
    require_role(&caller, Role::Viewer)?;
    find_article(&state, id).map(Json)
}

/// PUT /v1/warehouse/articles/:id: Update an article. Stock is left unchanged.
#[utoipa::path(
    put,
    path = "/v1/warehouse/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = ArticleInput,
    responses(
        (status = 200, description = "Article updated", body = Article),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "warehouse"
)]
async fn update_article(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ArticleInput>, JsonRejection>,
) -> Result<Json<Article>, AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;

    let _gate = state.write_lock().await;
    let mut article = find_article(&state, id)?;
    let sku = check_article(&state, &input, Some(id))?;

    article.sku = sku;
    article.code = input.code.trim().to_uppercase();
    article.name = input.name.trim().to_string();
    article.description = optional(input.description);
    article.brand = optional(input.brand);
    article.category_id = input.category_id;
    article.warehouse_id = input.warehouse_id;
    article.minimum_stock = input.minimum_stock;
    article.maximum_stock = input.maximum_stock;
    article.reorder_point = input.reorder_point;
    if let Some(unit) = optional(input.unit) {
        article.unit = unit;
    }
    article.notes = optional(input.notes);
    if let Some(active) = input.active {
        article.audit.active = active;
    }
    article.audit.touch();

    let article = state.save(&state.articles, article).await?;
    Ok(Json(article))
}

/// DELETE /v1/warehouse/articles/:id: Soft-delete an article.
#[utoipa::path(
    delete,
    path = "/v1/warehouse/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Article deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "warehouse"
)]
async fn delete_article(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Administrator)?;

    let _gate = state.write_lock().await;
    let mut article = find_article(&state, id)?;
    article.audit.soft_delete();
    state.save(&state.articles, article).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/warehouse/articles/low-stock: Active articles at or below minimum.
#[utoipa::path(
    get,
    path = "/v1/warehouse/articles/low-stock",
    responses((status = 200, description = "Articles with low stock", body = Vec<Article>)),
    tag = "warehouse"
)]
async fn low_stock(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<Article>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let mut articles = state
        .articles
        .filter(|a| a.audit.is_usable() && a.is_low_stock());
    articles.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(Json(articles))
}

/// GET /v1/warehouse/articles/reorder: Active articles at or below their reorder point.
#[utoipa::path(
    get,
    path = "/v1/warehouse/articles/reorder",
    responses((status = 200, description = "Articles to reorder", body = Vec<Article>)),
    tag = "warehouse"
)]
async fn reorder(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<Article>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let mut articles = state
        .articles
        .filter(|a| a.audit.is_usable() && a.needs_reorder());
    articles.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(Json(articles))
}

/// GET /v1/warehouse/articles/:id/movements: Stock history of an article.
#[utoipa::path(
    get,
    path = "/v1/warehouse/articles/{id}/movements",
    params(("id" = Uuid, Path, description = "Article ID"), HistoryQuery),
    responses((status = 200, description = "Movements, newest first", body = Vec<Movement>)),
    tag = "warehouse"
)]
async fn article_movements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<Movement>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;
    find_article(&state, id)?;

    let mut movements = state.movements.filter(|m| m.article_id == id);
    movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    movements.truncate(query.limit.unwrap_or(DEFAULT_PAGE_LIMIT) as usize);
    Ok(Json(movements))
}

/// POST /v1/warehouse/movements: Register a stock entry or exit.
///
/// The movement and the article's new stock are persisted together.
#[utoipa::path(
    post,
    path = "/v1/warehouse/movements",
    request_body = MovementInput,
    responses(
        (status = 201, description = "Movement registered", body = Movement),
        (status = 404, description = "Article not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid movement or insufficient stock", body = crate::error::ErrorBody),
    ),
    tag = "warehouse"
)]
async fn create_movement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<MovementInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Movement>), AppError> {
    require_role(&caller, Role::Operator)?;
    let input = extract_validated_json(body)?;
    let operation: Operation = input
        .operation
        .parse()
        .map_err(|e: String| AppError::field("operation", e))?;

    let _gate = state.write_lock().await;
    let mut article = find_article(&state, input.article_id)?;
    if !article.audit.active {
        return Err(AppError::Validation(format!(
            "article {} is inactive",
            article.code
        )));
    }
    let mut errors = FieldErrors::new();
    check_ref(&mut errors, "movement_type_id", &state.movement_types, input.movement_type_id);
    errors.into_result()?;

    let stock_before = article.stock;
    let stock_after = article.levels().apply(operation, stock_before, input.quantity)?;

    let now = Utc::now();
    article.stock = stock_after;
    article.audit.updated_at = now;
    let movement = Movement {
        id: Uuid::new_v4(),
        article_id: article.id,
        movement_type_id: input.movement_type_id,
        operation,
        quantity: input.quantity,
        reason: input.reason.trim().to_string(),
        recorded_by: caller.user_id,
        stock_before,
        stock_after,
        created_at: now,
    };

    let mut changes = Changes::new();
    changes.put(&movement)?;
    changes.put(&article)?;
    state.commit(changes).await?;

    tracing::info!(
        article = %article.code,
        operation = %operation,
        quantity = %movement.quantity,
        stock = %stock_after,
        "stock movement registered"
    );
    state.articles.put(article);
    state.movements.put(movement.clone());
    Ok((StatusCode::CREATED, Json(movement)))
}

/// GET /v1/warehouse/movements: List movements, newest first.
#[utoipa::path(
    get,
    path = "/v1/warehouse/movements",
    params(MovementQuery),
    responses((status = 200, description = "Page of movements")),
    tag = "warehouse"
)]
async fn list_movements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<MovementQuery>, QueryRejection>,
) -> Result<Json<Page<Movement>>, AppError> {
    require_role(&caller, Role::Viewer)?;
    let query = extract_query(query)?;

    let mut movements = state.movements.filter(|m| {
        query.article_id.map_or(true, |a| m.article_id == a)
            && query.movement_type_id.map_or(true, |t| m.movement_type_id == t)
            && query.operation.map_or(true, |o| m.operation == o)
            && query.recorded_by.map_or(true, |u| m.recorded_by == Some(u))
    });
    movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(Page::from_items(movements, query.limit, query.offset)))
}

/// GET /v1/warehouse/movements/:id: Fetch a movement.
#[utoipa::path(
    get,
    path = "/v1/warehouse/movements/{id}",
    params(("id" = Uuid, Path, description = "Movement ID")),
    responses(
        (status = 200, description = "Movement", body = Movement),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "warehouse"
)]
async fn get_movement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Movement>, AppError> {
    require_role(&caller, Role::Viewer)?;
    state
        .movements
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("movement {id} not found")))
}
