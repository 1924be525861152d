//! Public REST API records.
//!
//! Only the track record is consumed, for its tempo. Failures are reported
//! in the body with a `200 OK` status:
//!
//! ```json
//! {
//!     "error": {
//!         "type": "DataException",
//!         "message": "no data",
//!         "code": 800
//!     }
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::ProtocolError;

/// Error object of the public API and the token endpoint.
#[derive(Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Debug)]
pub struct ApiError {
    /// Exception class, e.g. `OAuthException` or `DataException`.
    #[serde(rename = "type", default)]
    pub typ: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub code: Option<i64>,
}

impl ApiError {
    #[must_use]
    pub fn into_protocol_error(self, origin: &str) -> ProtocolError {
        let message = match self.code {
            Some(code) => format!("{} ({code})", self.message),
            None => self.message,
        };
        ProtocolError::new(origin, self.typ, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.typ, self.message)
    }
}

/// Track as returned by `track/{id}`.
#[serde_as]
#[derive(Clone, Default, PartialEq, Deserialize, Serialize, Debug)]
pub struct Track {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub isrc: Option<String>,

    #[serde(default)]
    pub duration: u64,

    /// Beats per minute; `0` when unknown.
    #[serde(default)]
    pub bpm: f64,

    #[serde(default)]
    pub gain: Option<f64>,

    #[serde(default)]
    pub release_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track() {
        let track: Track = serde_json::from_str(
            r#"{
                "id": 3135556,
                "readable": true,
                "title": "Harder, Better, Faster, Stronger",
                "isrc": "GBDUW0000059",
                "duration": 224,
                "bpm": 123.4,
                "gain": -12.4,
                "release_date": "2001-03-07"
            }"#,
        )
        .unwrap();

        assert_eq!(track.id, 3_135_556);
        assert!((track.bpm - 123.4).abs() < f64::EPSILON);
        assert_eq!(track.isrc.as_deref(), Some("GBDUW0000059"));
    }

    #[test]
    fn missing_bpm_defaults_to_zero() {
        let track: Track = serde_json::from_str(r#"{"id": "42"}"#).unwrap();
        assert_eq!(track.id, 42);
        assert!(track.bpm.abs() < f64::EPSILON);
    }

    #[test]
    fn error_keeps_type_as_code() {
        let error: ApiError = serde_json::from_str(
            r#"{"type": "DataException", "message": "no data", "code": 800}"#,
        )
        .unwrap();
        let error = error.into_protocol_error("track/0");
        assert_eq!(error.code, "DataException");
        assert_eq!(error.message, "no data (800)");
    }
}
