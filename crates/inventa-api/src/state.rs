//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! Every record type has its own [`Store`]. Reads are served from memory.
//! Writes go through [`AppState::write_lock`] so that validation and update
//! happen without interleaving, then through [`AppState::commit`], which
//! persists all touched documents in one database transaction before the
//! stores are changed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::auth::SecretToken;
use crate::db::documents::{self, Changes, Document};
use crate::error::AppError;
use crate::middleware::rate_limit::RateLimitConfig;
use crate::models::assets::{Asset, AssetMovement, CurrentLocation};
use crate::models::catalog::{
    ArticleCategory, ArticleName, AssetCategory, AssetMovementType, AssetState, Brand,
    Department, EquipmentType, Location, Model, MovementType, OrderStatus, Provenance,
    ReceptionStatus, RequestStatus, RequestType, Sector, Unit, Warehouse, Workshop,
    WriteOffReason, WriteOffStatus,
};
use crate::models::equipment::{Equipment, MaintenanceRecord};
use crate::models::personnel::StaffMember;
use crate::models::profiles::ProfileRequest;
use crate::models::purchasing::{ArticleReception, AssetReception, PurchaseOrder, Supplier};
use crate::models::requests::MaterialRequest;
use crate::models::warehouse::{Article, Movement};
use crate::models::write_offs::WriteOff;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// First record matching `pred`, in no particular order.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Number of records matching `pred`.
    pub fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.data.read().values().filter(|v| pred(v)).count()
    }

    /// Whether any record matches `pred`.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(pred)
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Document> Store<T> {
    /// Insert a persisted record under its own id.
    pub fn put(&self, record: T) {
        self.insert(record.id(), record);
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Application State --------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<SecretToken>,
    /// Per-caller request budget.
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, `RATE_LIMIT_MAX` and `RATE_LIMIT_WINDOW_SECS`.
    ///
    /// Unset or unparseable numeric variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let number = |name: &str| std::env::var(name).ok().and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            auth_token: std::env::var("AUTH_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(SecretToken::new),
            rate_limit: RateLimitConfig {
                max_requests: number("RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit.max_requests),
                window_secs: number("RATE_LIMIT_WINDOW_SECS")
                    .unwrap_or(defaults.rate_limit.window_secs),
            },
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    // -- Catalog area --
    pub brands: Store<Brand>,
    pub models: Store<Model>,
    pub article_names: Store<ArticleName>,
    pub sectors: Store<Sector>,
    pub workshops: Store<Workshop>,
    pub equipment_types: Store<EquipmentType>,
    pub provenances: Store<Provenance>,
    pub departments: Store<Department>,
    pub equipment: Store<Equipment>,
    pub maintenance: Store<MaintenanceRecord>,

    // -- Warehouse --
    pub warehouses: Store<Warehouse>,
    pub article_categories: Store<ArticleCategory>,
    pub movement_types: Store<MovementType>,
    pub articles: Store<Article>,
    pub movements: Store<Movement>,

    // -- Assets --
    pub asset_categories: Store<AssetCategory>,
    pub units: Store<Unit>,
    pub asset_states: Store<AssetState>,
    pub locations: Store<Location>,
    pub asset_movement_types: Store<AssetMovementType>,
    pub assets: Store<Asset>,
    pub asset_movements: Store<AssetMovement>,
    pub current_locations: Store<CurrentLocation>,

    // -- Purchasing --
    pub order_statuses: Store<OrderStatus>,
    pub reception_statuses: Store<ReceptionStatus>,
    pub suppliers: Store<Supplier>,
    pub purchase_orders: Store<PurchaseOrder>,
    pub article_receptions: Store<ArticleReception>,
    pub asset_receptions: Store<AssetReception>,

    // -- Material requests --
    pub request_types: Store<RequestType>,
    pub request_statuses: Store<RequestStatus>,
    pub requests: Store<MaterialRequest>,

    // -- Write-offs --
    pub write_off_reasons: Store<WriteOffReason>,
    pub write_off_statuses: Store<WriteOffStatus>,
    pub write_offs: Store<WriteOff>,

    // -- People --
    pub profile_requests: Store<ProfileRequest>,
    pub staff: Store<StaffMember>,

    /// Serializes mutating operations.
    write_gate: Arc<Mutex<()>>,

    /// PostgreSQL pool. When `None`, the API runs in-memory only.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            brands: Store::new(),
            models: Store::new(),
            article_names: Store::new(),
            sectors: Store::new(),
            workshops: Store::new(),
            equipment_types: Store::new(),
            provenances: Store::new(),
            departments: Store::new(),
            equipment: Store::new(),
            maintenance: Store::new(),
            warehouses: Store::new(),
            article_categories: Store::new(),
            movement_types: Store::new(),
            articles: Store::new(),
            movements: Store::new(),
            asset_categories: Store::new(),
            units: Store::new(),
            asset_states: Store::new(),
            locations: Store::new(),
            asset_movement_types: Store::new(),
            assets: Store::new(),
            asset_movements: Store::new(),
            current_locations: Store::new(),
            order_statuses: Store::new(),
            reception_statuses: Store::new(),
            suppliers: Store::new(),
            purchase_orders: Store::new(),
            article_receptions: Store::new(),
            asset_receptions: Store::new(),
            request_types: Store::new(),
            request_statuses: Store::new(),
            requests: Store::new(),
            write_off_reasons: Store::new(),
            write_off_statuses: Store::new(),
            write_offs: Store::new(),
            profile_requests: Store::new(),
            staff: Store::new(),
            write_gate: Arc::new(Mutex::new(())),
            db_pool,
            config,
        }
    }

    /// Acquire the write gate. Hold the guard from validation until the
    /// stores have been updated.
    pub async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }

    /// Persist staged documents in one transaction.
    ///
    /// A no-op without a database. On failure nothing has been written and
    /// the caller must leave the stores untouched.
    pub async fn commit(&self, changes: Changes) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        let staged = changes.len();
        changes.commit(pool).await.map_err(|e| {
            tracing::error!(documents = staged, error = %e, "failed to persist changes");
            AppError::Internal(format!("database write failed: {e}"))
        })
    }

    /// Persist one document and then store it.
    pub async fn save<D: Document>(&self, store: &Store<D>, record: D) -> Result<D, AppError> {
        let mut changes = Changes::new();
        changes.put(&record)?;
        self.commit(changes).await?;
        store.put(record.clone());
        Ok(record)
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let catalogs = hydrate(pool, &self.brands).await?
            + hydrate(pool, &self.models).await?
            + hydrate(pool, &self.article_names).await?
            + hydrate(pool, &self.sectors).await?
            + hydrate(pool, &self.workshops).await?
            + hydrate(pool, &self.equipment_types).await?
            + hydrate(pool, &self.provenances).await?
            + hydrate(pool, &self.departments).await?
            + hydrate(pool, &self.warehouses).await?
            + hydrate(pool, &self.article_categories).await?
            + hydrate(pool, &self.movement_types).await?
            + hydrate(pool, &self.asset_categories).await?
            + hydrate(pool, &self.units).await?
            + hydrate(pool, &self.asset_states).await?
            + hydrate(pool, &self.locations).await?
            + hydrate(pool, &self.asset_movement_types).await?
            + hydrate(pool, &self.order_statuses).await?
            + hydrate(pool, &self.reception_statuses).await?
            + hydrate(pool, &self.request_types).await?
            + hydrate(pool, &self.request_statuses).await?
            + hydrate(pool, &self.write_off_reasons).await?
            + hydrate(pool, &self.write_off_statuses).await?;

        let articles = hydrate(pool, &self.articles).await?;
        let movements = hydrate(pool, &self.movements).await?;
        let assets = hydrate(pool, &self.assets).await?;
        let asset_movements = hydrate(pool, &self.asset_movements).await?;
        hydrate(pool, &self.current_locations).await?;
        let equipment = hydrate(pool, &self.equipment).await?;
        hydrate(pool, &self.maintenance).await?;
        let suppliers = hydrate(pool, &self.suppliers).await?;
        let orders = hydrate(pool, &self.purchase_orders).await?;
        let receptions = hydrate(pool, &self.article_receptions).await?
            + hydrate(pool, &self.asset_receptions).await?;
        let requests = hydrate(pool, &self.requests).await?;
        let write_offs = hydrate(pool, &self.write_offs).await?;
        let profile_requests = hydrate(pool, &self.profile_requests).await?;
        let staff = hydrate(pool, &self.staff).await?;

        tracing::info!(
            catalogs,
            articles,
            movements,
            assets,
            asset_movements,
            equipment,
            suppliers,
            orders,
            receptions,
            requests,
            write_offs,
            profile_requests,
            staff,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

async fn hydrate<D: Document>(pool: &PgPool, store: &Store<D>) -> Result<usize, String> {
    let records = documents::load_all::<D>(pool)
        .await
        .map_err(|e| format!("failed to load {}: {e}", D::COLLECTION))?;
    let count = records.len();
    for record in records {
        store.put(record);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_filters_and_counts() {
        let store: Store<u32> = Store::new();
        for n in 1..=5 {
            store.insert(Uuid::new_v4(), n);
        }
        assert_eq!(store.len(), 5);
        assert_eq!(store.count(|n| n % 2 == 0), 2);
        assert!(store.any(|n| *n == 3));
        assert_eq!(store.find(|n| *n > 4), Some(5));
        let mut odd = store.filter(|n| n % 2 == 1);
        odd.sort();
        assert_eq!(odd, vec![1, 3, 5]);
    }

    #[test]
    fn store_clones_share_data() {
        let a: Store<&'static str> = Store::new();
        let b = a.clone();
        let id = Uuid::new_v4();
        a.insert(id, "shared");
        assert_eq!(b.get(&id), Some("shared"));
        assert!(b.remove(&id).is_some());
        assert!(a.is_empty());
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some(SecretToken::new("hunter2")),
            ..AppConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert_eq!(config.rate_limit.max_requests, 1000);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[tokio::test]
    async fn commit_without_database_is_a_no_op() {
        let state = AppState::new();
        assert!(state.db_pool.is_none());
        assert!(state.commit(Changes::new()).await.is_ok());
    }
}
