//! Wire types for the upstream services.
//!
//! # Submodules
//!
//! * [`gateway`] - Private RPC gateway envelope and page records
//! * [`api`] - Public REST API records
//! * [`auth`] - Token endpoint response
//! * [`media`] - Media URL resolution
//! * [`image`] - Image CDN URLs
//!
//! Responses are decoded once, at the boundary, into typed records. Failure
//! shapes are normalized into [`ProtocolError`] so callers never look at raw
//! JSON to tell success from failure.

pub mod api;
pub mod auth;
pub mod gateway;
pub mod image;
pub mod media;

use std::fmt::Debug;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Failure reported in a response body rather than by HTTP status.
#[derive(Clone, Debug, Eq, PartialEq, Hash, thiserror::Error)]
#[error("{origin} returned {code}: {message}")]
pub struct ProtocolError {
    /// Endpoint or method that failed.
    pub origin: String,
    /// Upstream error code or type, e.g. `VALID_TOKEN_REQUIRED`.
    pub code: String,
    pub message: String,
}

impl ProtocolError {
    pub fn new(origin: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Token rejections, from both the gateway and the public API.
const AUTH_CODES: [&str; 5] = [
    "VALID_TOKEN_REQUIRED",
    "NEED_API_AUTH_REQUIRED",
    "NEED_USER_AUTH_REQUIRED",
    "OAuthException",
    "GATEWAY_ERROR",
];

const NOT_FOUND_CODES: [&str; 3] = ["DATA_ERROR", "DataException", "NOT_FOUND"];

const QUOTA_CODES: [&str; 2] = ["QuotaException", "REQUEST_LIMIT_EXCEEDED"];

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        let code = err.code.as_str();
        if AUTH_CODES.contains(&code) {
            Self::unauthenticated(err)
        } else if NOT_FOUND_CODES.contains(&code) {
            Self::not_found(err)
        } else if QUOTA_CODES.contains(&code) {
            Self::resource_exhausted(err)
        } else {
            Self::failed_precondition(err)
        }
    }
}

/// Parses and logs a JSON response body.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON or does not match `T`.
/// On mismatch the raw JSON is logged at TRACE level; invalid JSON is
/// logged at ERROR level.
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Decodes an already parsed JSON value, logging like [`json`].
///
/// # Errors
///
/// Returns an error if `value` does not match `T`.
pub fn from_value<T>(value: serde_json::Value, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Debug,
{
    match serde_json::from_value::<T>(value) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            error!("{origin}: unexpected response shape ({e})");
            Err(Error::data_loss(format!("{origin}: {e}")))
        }
    }
}
