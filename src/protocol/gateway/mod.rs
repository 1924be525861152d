//! Private RPC gateway types.
//!
//! Every call is a `POST` with the method name in the query string and the
//! parameters as a JSON body. Responses share one envelope:
//!
//! ```json
//! {
//!     "error": [],
//!     "results": { ... }
//! }
//! ```
//!
//! `error` is empty on success. On failure it is usually an object mapping
//! an error code to a message, for example
//! `{"VALID_TOKEN_REQUIRED": "Invalid CSRF token"}`, but arrays, strings and
//! booleans have been observed too. Any non-empty value is a failure.
//!
//! # Number Handling
//!
//! Identifiers and counters arrive as strings or as numbers depending on
//! the method, so numeric fields accept both.

pub mod page;
pub mod search;
pub mod user_data;

pub use page::{AlbumPage, PageAlbum, PagePlaylist, PageTrack, PlaylistPage, TrackPage};
pub use search::{SearchKind, SearchMusic, SearchResults};
pub use user_data::{GetUserData, UserData};

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::Result,
    protocol::{self, ProtocolError},
};

/// A gateway method and the shape of its results.
///
/// Implemented by the parameter types; serializing `self` gives the request
/// body.
pub trait Method: Serialize + Debug {
    /// Dot-notation method name, e.g. `deezer.pageTrack`.
    const METHOD: &'static str;

    /// Type of the `results` member on success.
    type Response: DeserializeOwned + Debug;
}

/// Response envelope shared by every gateway method.
#[derive(Clone, PartialEq, Deserialize, Debug)]
pub struct Response {
    #[serde(default)]
    pub error: Value,

    #[serde(default)]
    pub results: Value,
}

impl Response {
    /// Extracts the results of `M`, or the failure the envelope reports.
    ///
    /// # Errors
    ///
    /// Returns the reported failure, or `DataLoss` when `results` does not
    /// match the expected shape.
    pub fn into_result<M: Method>(self) -> Result<M::Response> {
        if let Some(failure) = failure(&self.error, M::METHOD) {
            return Err(failure.into());
        }
        protocol::from_value(self.results, M::METHOD)
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interprets the `error` member: anything non-empty is a failure.
fn failure(error: &Value, method: &str) -> Option<ProtocolError> {
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(ProtocolError::new(method, "ERROR", "")),
        Value::Number(n) => {
            (n.as_f64() != Some(0.0)).then(|| ProtocolError::new(method, n.to_string(), ""))
        }
        Value::String(s) => (!s.is_empty()).then(|| ProtocolError::new(method, s.clone(), "")),
        Value::Array(items) => items
            .first()
            .map(|first| ProtocolError::new(method, text(first), error.to_string())),
        Value::Object(map) => map
            .iter()
            .next()
            .map(|(code, message)| ProtocolError::new(method, code.clone(), text(message))),
    }
}

/// Contributor lists by role. Only composers are used.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize, Debug, Hash)]
pub struct Contributors {
    #[serde(default)]
    pub composer: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn envelope(json: &str) -> Response {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_error_is_success() {
        for json in [
            r#"{"error": [], "results": {"DATA": {}}}"#,
            r#"{"error": {}, "results": {"DATA": {}}}"#,
            r#"{"results": {"DATA": {}}}"#,
        ] {
            let value = envelope(json);
            assert!(failure(&value.error, "m").is_none(), "{json}");
        }
    }

    #[test]
    fn error_object_is_failure() {
        let value = envelope(
            r#"{"error": {"VALID_TOKEN_REQUIRED": "Invalid CSRF token"}, "results": {}}"#,
        );
        let failure = failure(&value.error, "deezer.pageTrack").unwrap();
        assert_eq!(failure.code, "VALID_TOKEN_REQUIRED");
        assert_eq!(failure.message, "Invalid CSRF token");
        assert_eq!(failure.origin, "deezer.pageTrack");
    }

    #[test]
    fn other_truthy_errors_are_failures() {
        assert!(failure(&Value::Bool(true), "m").is_some());
        assert!(failure(&Value::String("oops".to_owned()), "m").is_some());
        assert!(failure(&serde_json::json!(["DATA_ERROR"]), "m").is_some());
        assert!(failure(&serde_json::json!(1), "m").is_some());
        assert!(failure(&serde_json::json!(0), "m").is_none());
    }

    #[test]
    fn into_result_decodes_results() {
        let value = envelope(
            r#"{"error": [], "results": {"USER": {"USER_ID": "5", "OPTIONS": {"license_token": "lic"}}, "checkForm": "form"}}"#,
        );
        let user_data = value.into_result::<GetUserData>().unwrap();
        assert_eq!(user_data.user.id, 5);
        assert_eq!(user_data.api_token, "form");
    }

    #[test]
    fn into_result_surfaces_failure() {
        let value = envelope(r#"{"error": {"NEED_API_AUTH_REQUIRED": "auth"}, "results": {}}"#);
        let err = value.into_result::<GetUserData>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
    }
}
