//! Token endpoint response.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "secret_token",
//!     "expire": 0
//! }
//! ```
//!
//! On failure the endpoint still answers `200 OK` but with an `error`
//! object instead:
//!
//! ```json
//! {
//!     "error": {
//!         "type": "OAuthException",
//!         "message": "Invalid credentials",
//!         "code": 300
//!     }
//! }
//! ```
//!
//! The expiry field is usually 0; session lifetime is tracked locally.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

use super::api::ApiError;

/// Access token issued for the account credentials.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct Token {
    /// Bearer token for the probe request.
    #[redact]
    pub access_token: String,

    /// How long the token remains valid, when the upstream says so.
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64, Flexible>>")]
    pub expire: Option<Duration>,
}

/// Either shape the token endpoint answers with.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Failure { error: ApiError },
    Success(Token),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token() {
        let response: Response =
            serde_json::from_str(r#"{"access_token": "frUTkmvT", "expire": 0}"#).unwrap();
        match response {
            Response::Success(token) => {
                assert_eq!(token.access_token, "frUTkmvT");
                assert_eq!(token.expire, Some(Duration::ZERO));
            }
            Response::Failure { .. } => panic!("expected a token"),
        }
    }

    #[test]
    fn parses_rejection() {
        let response: Response = serde_json::from_str(
            r#"{"error": {"type": "OAuthException", "message": "Invalid credentials", "code": 300}}"#,
        )
        .unwrap();
        match response {
            Response::Failure { error } => assert_eq!(error.typ, "OAuthException"),
            Response::Success(_) => panic!("expected a failure"),
        }
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let token = Token {
            access_token: "frUTkmvT".to_owned(),
            expire: None,
        };
        assert!(!format!("{token:?}").contains("frUTkmvT"));
    }

    #[test]
    fn token_is_redacted_inside_response() {
        let response: Response =
            serde_json::from_str(r#"{"access_token": "frUTkmvT", "expire": 3600}"#).unwrap();
        let debug = format!("{response:?}");
        assert!(debug.starts_with("Success"));
        assert!(!debug.contains("frUTkmvT"));
    }
}
