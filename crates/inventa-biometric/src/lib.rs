#![deny(missing_docs)]

//! # inventa-biometric: Fingerprint Reader Bridge
//!
//! The fingerprint reader is driven by a vendor service running on the
//! workstation, reachable at `ws://localhost:8090`. This crate speaks its
//! JSON command/event protocol.
//!
//! ## Flow
//!
//! ```text
//! client                         reader service
//!   ── captureFingerprint ──────────▶
//!   ◀────────────── deviceConnected ──
//!   ◀─────────────── fingerDetected ──
//!   ◀─────────────────── processing ──
//!   ◀────────────── captureComplete ──   (template, hash, image?, quality?)
//! ```
//!
//! Any step may instead produce `error`. A capture that exceeds its
//! deadline sends `cancelCapture` and fails with [`BridgeError::Timeout`].
//!
//! ## Degraded modes
//!
//! Connecting retries a bounded number of times. When every attempt fails
//! and [`BridgeConfig::simulate_on_unavailable`] is set, the client switches
//! to an in-process [`simulator`] that follows the same event sequence, so
//! enrollment screens remain usable on machines without a reader.

pub mod client;
pub mod config;
pub mod error;
mod link;
pub mod protocol;
pub mod simulator;

pub use client::FingerprintClient;
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use protocol::{template_hash, CaptureResult, CaptureStatus, Command, DeviceInfo, Event};
