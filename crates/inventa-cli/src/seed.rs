//! # Seed Subcommand
//!
//! Loads the baseline reference records a fresh installation needs before
//! any document can be created: workflow statuses for orders, receptions,
//! requests and write-offs, common write-off reasons, an initial asset
//! state, a default unit, and the stock movement types.
//!
//! `--file` adds site records from a YAML list:
//!
//! ```yaml
//! - path: assets/locations
//!   record: { code: LAB-1, name: Laboratorio 1, building: A }
//! ```
//!
//! Seeding is idempotent. Records whose code already exists are skipped.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ApiClient;

/// Arguments for `inventa seed`.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Base URL of the running API.
    #[arg(long, default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Bearer token (`{role}:{user_id}:{secret}` or `{secret}`).
    #[arg(long)]
    pub token: Option<String>,

    /// YAML file with extra records, seeded after the baseline.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Skip the baseline and seed only `--file`.
    #[arg(long, requires = "file")]
    pub only_file: bool,
}

/// One catalog record to ensure.
#[derive(Debug, Clone)]
pub struct SeedRecord {
    /// Catalog path under `/v1`.
    pub path: String,
    /// Unique code within the catalog.
    pub code: String,
    /// Create payload.
    pub body: Value,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

fn status(path: &str, code: &str, name: &str, extra: Value) -> SeedRecord {
    let mut body = json!({"code": code, "name": name});
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    SeedRecord {
        path: path.to_string(),
        code: code.to_string(),
        body,
    }
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    path: String,
    record: Value,
}

/// Parse a YAML seed list. Every record needs a `code` and a `name`.
pub fn parse_file(text: &str) -> Result<Vec<SeedRecord>> {
    let entries: Vec<FileEntry> = serde_yaml::from_str(text).context("invalid seed file")?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let path = entry.path.trim().trim_matches('/').to_string();
            if path.is_empty() {
                bail!("entry {i}: path is empty");
            }
            let Some(code) = entry.record["code"].as_str().map(str::trim).filter(|c| !c.is_empty()) else {
                bail!("entry {i} ({path}): record.code is required");
            };
            if entry.record["name"].as_str().map_or(true, |n| n.trim().is_empty()) {
                bail!("entry {i} ({path}): record.name is required");
            }
            Ok(SeedRecord {
                code: code.to_string(),
                path,
                body: entry.record,
            })
        })
        .collect()
}

/// Read and parse a YAML seed file.
pub fn load_file(path: &Path) -> Result<Vec<SeedRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_file(&text).with_context(|| path.display().to_string())
}

/// The baseline reference set.
pub fn baseline() -> Vec<SeedRecord> {
    const ORDERS: &str = "purchasing/order-statuses";
    const RECEPTIONS: &str = "purchasing/reception-statuses";
    const REQUESTS: &str = "requests/statuses";
    const WRITE_OFFS: &str = "write-offs/statuses";
    const REASONS: &str = "write-offs/reasons";

    vec![
        status(ORDERS, "BORRADOR", "Borrador", json!({"is_initial": true, "color": "#6c757d"})),
        status(ORDERS, "ENVIADA", "Enviada al proveedor", json!({"color": "#0d6efd"})),
        status(
            ORDERS,
            "RECIBIDA",
            "Recibida",
            json!({"is_final": true, "allows_edit": false, "color": "#198754"}),
        ),
        status(
            ORDERS,
            "ANULADA",
            "Anulada",
            json!({"is_final": true, "allows_edit": false, "color": "#dc3545"}),
        ),
        status(RECEPTIONS, "PENDIENTE", "Pendiente", json!({"is_initial": true, "color": "#ffc107"})),
        status(RECEPTIONS, "COMPLETA", "Completa", json!({"is_final": true, "color": "#198754"})),
        status(
            REQUESTS,
            "PENDIENTE",
            "Pendiente",
            json!({"is_initial": true, "requires_action": true, "color": "#ffc107"}),
        ),
        status(REQUESTS, "APPROVED", "Aprobada", json!({"requires_action": true, "color": "#0d6efd"})),
        status(REQUESTS, "REJECTED", "Rechazada", json!({"is_final": true, "color": "#dc3545"})),
        status(REQUESTS, "DISPATCHED", "Despachada", json!({"is_final": true, "color": "#198754"})),
        status(REQUESTS, "CANCELLED", "Anulada", json!({"is_final": true, "color": "#6c757d"})),
        status(
            "assets/states",
            "DISPONIBLE",
            "Disponible",
            json!({"is_initial": true, "allows_movement": true, "color": "#198754"}),
        ),
        status("assets/units", "UN", "Unidad", json!({"symbol": "un"})),
        status(
            WRITE_OFFS,
            "PENDIENTE",
            "Pendiente",
            json!({"is_initial": true, "allows_edit": true, "color": "#ffc107"}),
        ),
        status(WRITE_OFFS, "AUTHORIZED", "Autorizada", json!({"allows_edit": false, "color": "#0d6efd"})),
        status(
            WRITE_OFFS,
            "REJECTED",
            "Rechazada",
            json!({"is_final": true, "allows_edit": false, "color": "#dc3545"}),
        ),
        status(
            WRITE_OFFS,
            "CONFIRMED",
            "Confirmada",
            json!({"is_final": true, "allows_edit": false, "color": "#198754"}),
        ),
        status(REASONS, "DETERIORO", "Deterioro", json!({"requires_authorization": true})),
        status(REASONS, "VENCIMIENTO", "Vencimiento", json!({"requires_authorization": false})),
        status(
            REASONS,
            "ROBO",
            "Robo o extravío",
            json!({"requires_authorization": true, "requires_document": true}),
        ),
        status("warehouse/movement-types", "AJUSTE", "Ajuste de inventario", json!({})),
        status("warehouse/movement-types", "BAJA", "Baja de inventario", json!({})),
    ]
}

/// Create every record of `records` whose code is not present yet.
pub async fn seed(api: &ApiClient, records: &[SeedRecord]) -> Result<SeedReport> {
    let mut by_path: BTreeMap<&str, Vec<&SeedRecord>> = BTreeMap::new();
    for record in records {
        by_path.entry(record.path.as_str()).or_default().push(record);
    }

    let mut report = SeedReport::default();
    for (path, records) in by_path {
        let existing = existing_codes(api, path).await?;
        for record in records {
            let label = format!("{path}/{}", record.code);
            if existing.contains(&record.code.to_uppercase()) {
                tracing::debug!(record = %label, "already present");
                report.skipped.push(label);
                continue;
            }
            api.post(path, &record.body).await?;
            tracing::info!(record = %label, "created");
            report.created.push(label);
        }
    }
    Ok(report)
}

async fn existing_codes(api: &ApiClient, path: &str) -> Result<HashSet<String>> {
    let page = api.get(&format!("{path}?limit=1000")).await?;
    Ok(page["items"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item["code"].as_str())
        .map(str::to_uppercase)
        .collect())
}

/// Entry point for `inventa seed`.
pub async fn run_seed(args: &SeedArgs) -> Result<u8> {
    let mut records = if args.only_file { Vec::new() } else { baseline() };
    if let Some(file) = &args.file {
        records.extend(load_file(file)?);
    }

    let api = ApiClient::new(&args.api_url, args.token.as_deref())?;
    let report = seed(&api, &records).await?;
    println!(
        "seeded {}: {} created, {} already present",
        api.base_url(),
        report.created.len(),
        report.skipped.len()
    );
    for label in &report.created {
        println!("  + {label}");
    }
    Ok(0)
}
