//! Media URL resolution.
//!
//! # Wire Format
//!
//! Request:
//! ```json
//! {
//!     "license_token": "secret",
//!     "media": [{
//!         "type": "FULL",
//!         "formats": [{
//!             "cipher": "BF_CBC_STRIPE",
//!             "format": "MP3_320"
//!         }]
//!     }],
//!     "track_tokens": ["token"]
//! }
//! ```
//!
//! Response, one entry per track token:
//! ```json
//! {
//!     "data": [{
//!         "media": [{
//!             "media_type": "FULL",
//!             "cipher": {"type": "BF_CBC_STRIPE"},
//!             "format": "MP3_320",
//!             "sources": [{
//!                 "url": "https://...",
//!                 "provider": "ak"
//!             }],
//!             "nbf": 1234567890,
//!             "exp": 1234599999
//!         }]
//!     }]
//! }
//! ```
//!
//! A track that cannot be served has `errors` instead of `media`:
//! ```json
//! {"data": [{"errors": [{"code": 2002, "message": "Track token has no sufficient rights on requested media"}]}]}
//! ```

use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_with::{formats::Flexible, serde_as, TimestampSeconds};
use url::Url;
use veil::Redact;

use crate::error::Error;

use super::ProtocolError;

/// Media access request.
#[derive(Clone, Eq, PartialEq, Serialize, Redact, Hash)]
pub struct Request {
    #[redact]
    pub license_token: String,

    pub media: Vec<Media>,

    #[redact]
    pub track_tokens: Vec<String>,
}

impl Request {
    /// Requests the full, striped-encrypted file of one track.
    #[must_use]
    pub fn full_track(license_token: &str, track_token: &str, format: Format) -> Self {
        Self {
            license_token: license_token.to_owned(),
            media: vec![Media {
                typ: Type::FULL,
                cipher_formats: vec![CipherFormat {
                    cipher: Cipher::BF_CBC_STRIPE,
                    format,
                }],
            }],
            track_tokens: vec![track_token.to_owned()],
        }
    }
}

/// Media type with the format and cipher combinations asked for.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct Media {
    #[serde(rename = "type")]
    pub typ: Type,

    #[serde(rename = "formats")]
    pub cipher_formats: Vec<CipherFormat>,
}

/// Full track or preview clip.
#[derive(
    Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash,
)]
pub enum Type {
    #[default]
    FULL,
    PREVIEW,
}

#[derive(Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct CipherFormat {
    pub cipher: Cipher,
    pub format: Format,
}

/// Content encryption method.
#[derive(
    Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash,
)]
#[expect(non_camel_case_types)]
pub enum Cipher {
    /// Blowfish CBC, every third 2048-byte block.
    #[default]
    BF_CBC_STRIPE,
    NONE,
}

/// Audio format and quality level.
#[derive(
    Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash,
)]
#[expect(non_camel_case_types)]
pub enum Format {
    FLAC,
    MP3_64,
    #[default]
    MP3_128,
    MP3_320,
    /// Other or unknown MP3 bitrate.
    MP3_MISC,
}

/// Container family of an audio [`Format`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Codec {
    Flac,
    Mp3,
}

impl Format {
    pub const ALL: [Self; 5] = [
        Self::FLAC,
        Self::MP3_64,
        Self::MP3_128,
        Self::MP3_320,
        Self::MP3_MISC,
    ];

    #[must_use]
    pub fn codec(self) -> Codec {
        match self {
            Self::FLAC => Codec::Flac,
            Self::MP3_64 | Self::MP3_128 | Self::MP3_320 | Self::MP3_MISC => Codec::Mp3,
        }
    }

    /// File extension for the container.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self.codec() {
            Codec::Flac => "flac",
            Codec::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Parses the upstream format name. Names are case-sensitive.
impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.to_string() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown audio format {s:?}")))
    }
}

/// Media access response.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct Response {
    pub data: Vec<Data>,
}

impl Response {
    /// First source URL of the first medium of the first track.
    ///
    /// # Errors
    ///
    /// Returns the upstream's own error when the track entry carries
    /// `errors`, or `NotFound` when no source is listed.
    pub fn first_source(self) -> Result<Url, Error> {
        const ORIGIN: &str = "get_url";

        let data = self
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("no media returned"))?;

        if !data.errors.is_empty() {
            let message = data
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let code = data.errors[0].code.to_string();
            return Err(ProtocolError::new(ORIGIN, code, message).into());
        }

        data.media
            .into_iter()
            .next()
            .and_then(|medium| medium.sources.into_iter().next())
            .map(|source| source.url)
            .ok_or_else(|| Error::not_found("no media source returned"))
    }
}

/// Track entry: media, or the reasons why there is none.
///
/// Errors win over media when an entry lists both.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct Data {
    #[serde(default)]
    pub media: Vec<Medium>,

    #[serde(default)]
    pub errors: Vec<MediaError>,
}

/// Media access error.
#[derive(Clone, Eq, Default, PartialEq, Deserialize, Debug, Hash)]
pub struct MediaError {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Media access details.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct Medium {
    #[serde(default)]
    pub media_type: Type,

    #[serde(default)]
    pub cipher: CipherType,

    #[serde(default)]
    pub format: Format,

    pub sources: Vec<Source>,

    #[serde(default, rename = "nbf")]
    #[serde_as(as = "Option<TimestampSeconds<i64, Flexible>>")]
    pub not_before: Option<SystemTime>,

    #[serde(default, rename = "exp")]
    #[serde_as(as = "Option<TimestampSeconds<i64, Flexible>>")]
    pub expiry: Option<SystemTime>,
}

#[derive(Copy, Clone, Default, Eq, PartialEq, Deserialize, Debug, Hash)]
pub struct CipherType {
    #[serde(rename = "type")]
    pub typ: Cipher,
}

/// Download location of a medium.
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct Source {
    /// Signed CDN URL.
    #[redact]
    pub url: Url,

    #[serde(default)]
    pub provider: String,
}
