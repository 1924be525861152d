//! User data from the gateway.
//!
//! Fetched once per login, with no form token. It yields the two
//! session credentials the other calls need.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "USER": {
//!         "USER_ID": "123456789",
//!         "BLOG_NAME": "Username",
//!         "OPTIONS": {
//!             "license_token": "secret"
//!         }
//!     },
//!     "checkForm": "api_token"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use veil::Redact;

use super::Method;

/// Parameters of `deezer.getUserData`: an empty object.
#[derive(Copy, Clone, Default, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct GetUserData {}

impl Method for GetUserData {
    const METHOD: &'static str = "deezer.getUserData";
    type Response = UserData;
}

/// User data and session credentials.
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct UserData {
    #[serde(rename = "USER")]
    pub user: User,

    /// Form token required by every later gateway call.
    #[serde(rename = "checkForm")]
    #[redact]
    pub api_token: String,
}

#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct User {
    /// `0` when the login did not take.
    #[serde(rename = "USER_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    #[serde(rename = "BLOG_NAME")]
    pub name: String,

    #[serde(rename = "OPTIONS")]
    pub options: Options,
}

/// License options.
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct Options {
    /// Needed to resolve media URLs.
    #[redact]
    pub license_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_DATA: &str = r#"{
        "USER": {
            "USER_ID": 123456789,
            "BLOG_NAME": "listener",
            "OPTIONS": {"license_token": "lic-abc", "too_many_devices": false}
        },
        "USER_TOKEN": "ignored",
        "checkForm": "form-xyz"
    }"#;

    #[test]
    fn parses_session_credentials() {
        let user_data: UserData = serde_json::from_str(USER_DATA).unwrap();
        assert_eq!(user_data.user.id, 123_456_789);
        assert_eq!(user_data.user.name, "listener");
        assert_eq!(user_data.api_token, "form-xyz");
        assert_eq!(user_data.user.options.license_token, "lic-abc");
    }

    #[test]
    fn tokens_are_redacted() {
        let user_data: UserData = serde_json::from_str(USER_DATA).unwrap();
        let debug = format!("{user_data:?}");
        assert!(!debug.contains("form-xyz"));
        assert!(!debug.contains("lic-abc"));
    }

    #[test]
    fn serializes_as_empty_object() {
        assert_eq!(serde_json::to_string(&GetUserData {}).unwrap(), "{}");
    }
}
