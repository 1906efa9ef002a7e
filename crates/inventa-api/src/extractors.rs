//! # Body Extraction & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers that
//! turn JSON rejections into [`AppError::BadRequest`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use inventa_core::FieldErrors;

use crate::error::AppError;

/// Request types that check their own shape beyond what serde enforces.
///
/// All problems are collected so the client sees every failing field at once.
pub trait Validate {
    /// Record every field problem into `errors`.
    fn validate(&self, errors: &mut FieldErrors);
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    let mut errors = FieldErrors::new();
    value.validate(&mut errors);
    errors.into_result()?;
    Ok(value)
}

/// Extract query parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Record a required-field error under `field` when `value` is blank.
pub fn require_text(errors: &mut FieldErrors, field: &str, value: &str) {
    errors.require(value.trim().is_empty(), field, "this field is required");
}
