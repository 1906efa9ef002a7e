//! # OpenAPI Document Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document served
//! at `/openapi.json`. The generic catalog CRUD routes share one handler set
//! and are described by the catalog record schemas instead of per-path
//! entries.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token `{role}:{user_id}:{secret}` or `{secret}`. Set via AUTH_TOKEN.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inventa API",
        version = "0.1.0",
        description = "School administration back office: reference catalogs, warehouse stock, assets, workshop equipment, purchasing, material requests, inventory write-offs, profile requests and personnel.\n\nAuthentication: `Authorization: Bearer <token>`. All `/v1/*` endpoints require it when AUTH_TOKEN is set. Health checks (`/health/*`) are unauthenticated.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Catalogs ────────────────────────────────────────────────────
        crate::routes::catalog::brand_models,
        // ── Equipment ───────────────────────────────────────────────────
        crate::routes::equipment::list_equipment,
        crate::routes::equipment::create_equipment,
        crate::routes::equipment::get_equipment,
        crate::routes::equipment::update_equipment,
        crate::routes::equipment::delete_equipment,
        crate::routes::equipment::record_maintenance,
        crate::routes::equipment::maintenance_history,
        crate::routes::equipment::maintenance_due,
        // ── Warehouse ───────────────────────────────────────────────────
        crate::routes::warehouse::list_articles,
        crate::routes::warehouse::create_article,
        crate::routes::warehouse::get_article,
        crate::routes::warehouse::update_article,
        crate::routes::warehouse::delete_article,
        crate::routes::warehouse::low_stock,
        crate::routes::warehouse::reorder,
        crate::routes::warehouse::article_movements,
        crate::routes::warehouse::create_movement,
        crate::routes::warehouse::list_movements,
        crate::routes::warehouse::get_movement,
        // ── Assets ──────────────────────────────────────────────────────
        crate::routes::assets::list_assets,
        crate::routes::assets::create_asset,
        crate::routes::assets::get_asset,
        crate::routes::assets::update_asset,
        crate::routes::assets::delete_asset,
        crate::routes::assets::create_movement,
        crate::routes::assets::asset_movements,
        crate::routes::assets::asset_location,
        crate::routes::assets::by_location,
        crate::routes::assets::by_responsible,
        // ── Purchasing ──────────────────────────────────────────────────
        crate::routes::purchasing::list_suppliers,
        crate::routes::purchasing::create_supplier,
        crate::routes::purchasing::get_supplier,
        crate::routes::purchasing::update_supplier,
        crate::routes::purchasing::delete_supplier,
        crate::routes::purchasing::list_orders,
        crate::routes::purchasing::create_order,
        crate::routes::purchasing::get_order,
        crate::routes::purchasing::update_order,
        crate::routes::purchasing::change_order_status,
        crate::routes::purchasing::add_article_line,
        crate::routes::purchasing::add_asset_line,
        crate::routes::purchasing::remove_line,
        crate::routes::receptions::add_article_line,
        crate::routes::receptions::add_asset_line,
        // ── Material requests ───────────────────────────────────────────
        crate::routes::requests::list_requests,
        crate::routes::requests::create_request,
        crate::routes::requests::get_request,
        crate::routes::requests::add_line,
        crate::routes::requests::remove_line,
        crate::routes::requests::approve,
        crate::routes::requests::reject,
        crate::routes::requests::dispatch,
        crate::routes::requests::cancel,
        // ── Write-offs ──────────────────────────────────────────────────
        crate::routes::write_offs::list_write_offs,
        crate::routes::write_offs::create_write_off,
        crate::routes::write_offs::get_write_off,
        crate::routes::write_offs::add_line,
        crate::routes::write_offs::remove_line,
        crate::routes::write_offs::authorize,
        crate::routes::write_offs::reject,
        crate::routes::write_offs::confirm,
        // ── Profile requests ────────────────────────────────────────────
        crate::routes::profiles::list_profiles,
        crate::routes::profiles::create_profile,
        crate::routes::profiles::get_profile,
        crate::routes::profiles::review_profile,
        // ── Personnel ───────────────────────────────────────────────────
        crate::routes::personnel::list_staff,
        crate::routes::personnel::staff_stats,
        crate::routes::personnel::create_staff,
        crate::routes::personnel::get_staff,
        crate::routes::personnel::update_staff,
        crate::routes::personnel::delete_staff,
        crate::routes::personnel::enroll_fingerprint,
        crate::routes::personnel::get_fingerprint,
        crate::routes::personnel::identify,
    ),
    components(
        schemas(
            // ── Shared ──────────────────────────────────────────────────
            inventa_core::Audit,
            inventa_core::Operation,
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Catalog fields ──────────────────────────────────────────
            crate::models::catalog::BrandFields,
            crate::models::catalog::ModelFields,
            crate::models::catalog::ArticleNameFields,
            crate::models::catalog::SectorFields,
            crate::models::catalog::WorkshopFields,
            crate::models::catalog::EquipmentTypeFields,
            crate::models::catalog::ProvenanceFields,
            crate::models::catalog::DepartmentFields,
            crate::models::catalog::WarehouseFields,
            crate::models::catalog::ArticleCategoryFields,
            crate::models::catalog::MovementTypeFields,
            crate::models::catalog::AssetCategoryFields,
            crate::models::catalog::UnitFields,
            crate::models::catalog::AssetStateFields,
            crate::models::catalog::LocationFields,
            crate::models::catalog::AssetMovementTypeFields,
            crate::models::catalog::OrderStatusFields,
            crate::models::catalog::ReceptionStatusFields,
            crate::models::catalog::RequestTypeFields,
            crate::models::catalog::RequestStatusFields,
            crate::models::catalog::WriteOffReasonFields,
            crate::models::catalog::WriteOffStatusFields,
            // ── Records ─────────────────────────────────────────────────
            crate::models::equipment::Equipment,
            crate::models::equipment::EquipmentStatus,
            crate::models::equipment::MaintenanceRecord,
            crate::models::equipment::MaintenanceKind,
            crate::models::warehouse::Article,
            crate::models::warehouse::Movement,
            crate::models::assets::Asset,
            crate::models::assets::AssetMovement,
            crate::models::assets::CurrentLocation,
            crate::models::purchasing::Supplier,
            crate::models::purchasing::PurchaseOrder,
            crate::models::purchasing::OrderLine,
            crate::models::purchasing::ArticleReceptionLine,
            crate::models::purchasing::AssetReceptionLine,
            crate::models::requests::MaterialRequest,
            crate::models::requests::RequestKind,
            crate::models::requests::RequestLine,
            crate::models::requests::StatusChange,
            crate::models::write_offs::WriteOff,
            crate::models::write_offs::WriteOffLine,
            crate::models::profiles::ProfileRequest,
            crate::models::profiles::ProfileStatus,
            crate::models::personnel::StaffMember,
            crate::models::personnel::StaffStatus,
            crate::models::personnel::FingerprintEnrollment,
            // ── Request DTOs ────────────────────────────────────────────
            crate::routes::equipment::EquipmentInput,
            crate::routes::equipment::MaintenanceInput,
            crate::routes::warehouse::ArticleInput,
            crate::routes::warehouse::MovementInput,
            crate::routes::assets::AssetInput,
            crate::routes::assets::AssetMovementInput,
            crate::routes::purchasing::SupplierInput,
            crate::routes::purchasing::OrderInput,
            crate::routes::purchasing::OrderUpdate,
            crate::routes::purchasing::StatusInput,
            crate::routes::purchasing::LineInput,
            crate::routes::receptions::ReceptionInput,
            crate::routes::receptions::ArticleLineInput,
            crate::routes::receptions::AssetLineInput,
            crate::routes::requests::RequestInput,
            crate::routes::requests::RequestLineInput,
            crate::routes::requests::LineQuantity,
            crate::routes::requests::DecisionInput,
            crate::routes::requests::ReasonInput,
            crate::routes::write_offs::WriteOffInput,
            crate::routes::write_offs::WriteOffLineInput,
            crate::routes::write_offs::NotesInput,
            crate::routes::profiles::ProfileInput,
            crate::routes::profiles::ReviewInput,
            crate::routes::profiles::Decision,
            crate::routes::personnel::StaffInput,
            crate::routes::personnel::IdentifyInput,
            crate::routes::personnel::StaffStats,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "catalog", description = "Reference catalogs and workshop equipment"),
        (name = "warehouse", description = "Articles and stock movements"),
        (name = "assets", description = "Asset items, movements and placement"),
        (name = "purchasing", description = "Suppliers, purchase orders and receptions"),
        (name = "requests", description = "Material requests and their approval workflow"),
        (name = "write-offs", description = "Inventory write-offs and their authorization"),
        (name = "profiles", description = "System-access profile requests"),
        (name = "personnel", description = "Staff members and fingerprint enrollment"),
    )
)]
pub struct ApiDoc;

/// Serves the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
