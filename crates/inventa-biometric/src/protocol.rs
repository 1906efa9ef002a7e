//! # Wire Protocol
//!
//! JSON text frames discriminated by a `type` field with camelCase names.
//! Unknown event types decode to [`Event::Unknown`] and are skipped by the
//! client, so newer reader firmware does not break older clients.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Commands sent to the reader service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Ask the service to report attached readers.
    GetDevices,
    /// Start a capture on the default reader.
    CaptureFingerprint {
        /// Capture deadline in milliseconds, forwarded to the reader.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Abort an in-flight capture.
    CancelCapture,
}

/// Events received from the reader service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// A reader is attached and ready.
    DeviceConnected {
        /// Reader description.
        device: DeviceInfo,
    },
    /// A finger was placed on the sensor.
    FingerDetected,
    /// The reader is extracting the template.
    Processing,
    /// Capture finished successfully.
    CaptureComplete(CaptureResult),
    /// The service or reader reported a failure.
    Error {
        /// Human-readable reason.
        message: String,
        /// Vendor error code, when provided.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    /// Any event type this client does not know.
    #[serde(other)]
    Unknown,
}

/// A fingerprint reader attached to the workstation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Vendor device identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Hardware model, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Output of a successful capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    /// Encoded minutiae template.
    pub template: String,
    /// Lowercase hex SHA-256 of `template`.
    pub hash: String,
    /// Encoded preview image, if the reader sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Reader quality score (0-100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Reader that produced the capture.
    #[serde(default, alias = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl CaptureResult {
    /// Whether `hash` matches the SHA-256 of `template`.
    pub fn verify(&self) -> bool {
        template_hash(&self.template) == self.hash.to_ascii_lowercase()
    }
}

/// Progress notifications surfaced to the caller during a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    /// The reader announced itself.
    DeviceConnected(DeviceInfo),
    /// A finger is on the sensor.
    FingerDetected,
    /// Template extraction in progress.
    Processing,
}

/// Lowercase hex SHA-256 of a template string.
pub fn template_hash(template: &str) -> String {
    Sha256::digest(template.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
