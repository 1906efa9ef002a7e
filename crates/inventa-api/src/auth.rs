//! # Bearer Authentication and Roles
//!
//! One shared secret (`AUTH_TOKEN`) guards the API. Clients present it in
//! the `Authorization` header, optionally prefixed with a role and the id
//! of the person operating the client:
//!
//! ```text
//! Bearer {role}:{user_id}:{secret}    e.g. operator:5f0c…:s3cret
//! Bearer {secret}                      administrator, no user
//! ```
//!
//! The user id is what movements, approvals and receptions record as
//! their author. It may be left empty (`viewer::s3cret`).
//!
//! With no secret configured the middleware lets everything through as
//! [`CallerIdentity::system`]. Handlers take [`CallerIdentity`] as an
//! extractor and gate themselves with [`require_role`].

use std::str::FromStr;

use axum::extract::Request;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::AppError;

/// Access level. Ordering follows privilege, so `role >= minimum` is the
/// whole authorization check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Lists and reads.
    Viewer,
    /// Creates and edits records, registers movements, receptions and dispatches.
    Operator,
    /// Deletes, approves, rejects and changes document statuses.
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Operator => "operator",
            Self::Administrator => "administrator",
        }
    }
}

impl FromStr for Role {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Viewer, Self::Operator, Self::Administrator]
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| TokenError::UnknownRole(s.to_string()))
    }
}

/// Who is calling, as established by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// Recorded as author of the changes this request makes.
    pub user_id: Option<Uuid>,
}

impl CallerIdentity {
    /// Administrator without a user, used when auth is disabled.
    pub fn system() -> Self {
        Self {
            role: Role::Administrator,
            user_id: None,
        }
    }

    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("request was not authenticated".into()))
    }
}

/// 403 unless `caller` holds `minimum` or a higher role.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "role '{}' required, caller has '{}'",
        minimum.as_str(),
        caller.role.as_str()
    )))
}

/// Shared secret for bearer tokens. Zeroed on drop; never printed.
#[derive(Clone)]
pub struct SecretToken(Zeroizing<String>);

impl SecretToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Compare in constant time with respect to the secret's content.
    fn matches(&self, provided: &str) -> bool {
        secrets_equal(provided.as_bytes(), self.0.as_bytes())
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Request extension read by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: Option<SecretToken>,
}

/// Why a bearer token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization header must use the Bearer scheme")]
    NotBearer,
    #[error("expected {{role}}:{{user_id}}:{{secret}} or {{secret}}")]
    Malformed,
    #[error("invalid bearer token")]
    WrongSecret,
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("invalid user_id: {0}")]
    InvalidUser(String),
}

fn secrets_equal(provided: &[u8], expected: &[u8]) -> bool {
    // Length differences still cost one full comparison of the expected secret.
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Resolve the credential part of a bearer header against `secret`.
///
/// The secret is checked before the role or user are looked at, so a
/// caller without it learns nothing about which roles exist.
pub fn parse_bearer_token(
    credential: &str,
    secret: &SecretToken,
) -> Result<CallerIdentity, TokenError> {
    let fields: Vec<&str> = credential.splitn(3, ':').collect();
    let (role, user, provided) = match fields.as_slice() {
        [provided] => (None, "", *provided),
        [role, user, provided] => (Some(*role), *user, *provided),
        _ => return Err(TokenError::Malformed),
    };
    if !secret.matches(provided) {
        return Err(TokenError::WrongSecret);
    }
    let Some(role) = role else {
        return Ok(CallerIdentity::system());
    };

    let user_id = match user {
        "" => None,
        user => Some(
            Uuid::parse_str(user).map_err(|e| TokenError::InvalidUser(e.to_string()))?,
        ),
    };
    Ok(CallerIdentity {
        role: role.parse()?,
        user_id,
    })
}

fn authenticate(request: &Request, secret: &SecretToken) -> Result<CallerIdentity, TokenError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::MissingHeader)?;
    let credential = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(TokenError::NotBearer)?;
    parse_bearer_token(credential, secret)
}

/// Attach a [`CallerIdentity`] to the request or answer 401.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let secret = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|config| config.token.clone());

    let identity = match secret {
        None => CallerIdentity::system(),
        Some(secret) => match authenticate(&request, &secret) {
            Ok(identity) => identity,
            Err(reason) => {
                tracing::warn!(%reason, path = %request.uri().path(), "request refused");
                return AppError::Unauthorized(reason.to_string()).into_response();
            }
        },
    };
    request.extensions_mut().insert(identity);
    next.run(request).await
}
