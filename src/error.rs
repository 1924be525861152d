//! Error handling for deezl.
//!
//! Provides a unified error type based on gRPC status codes, with mapping
//! from the underlying transport, codec and protocol errors to categories.
//!
//! # Error Categories
//!
//! * Authentication failures (`Unauthenticated`, `PermissionDenied`)
//! * Missing resources (`NotFound`)
//! * Upstream rejections and unavailability (`FailedPrecondition`, `Unavailable`)
//! * Broken streams and corrupt data (`DataLoss`)
//! * Timeouts and cancellation (`DeadlineExceeded`, `Cancelled`)
//!
//! # Example
//!
//! ```rust
//! use deezl::error::{Error, ErrorKind, Result};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     if id.is_empty() {
//!         return Err(Error::invalid_argument("track id is empty"));
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

/// Standard result type for deezl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories based on gRPC status codes.
///
/// See [gRPC status codes](https://github.com/googleapis/googleapis/blob/master/google/rpc/code.proto)
/// for the original definitions.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    /// Interrupted locally, e.g. by Ctrl-C.
    #[error("operation was cancelled")]
    Cancelled = 1,

    /// Unclassified transport failures.
    #[error("unknown error")]
    Unknown = 2,

    /// Malformed input such as a bad secret, format name or image size.
    #[error("invalid argument specified")]
    InvalidArgument = 3,

    /// Request or connect timeout.
    #[error("operation timed out")]
    DeadlineExceeded = 4,

    /// Unknown track, album or playlist, or no media source. HTTP 404.
    #[error("not found")]
    NotFound = 5,

    /// HTTP 403.
    #[error("permission denied")]
    PermissionDenied = 7,

    /// Rejected credentials or form token. HTTP 401.
    #[error("no valid authentication credentials")]
    Unauthenticated = 16,

    /// Upstream quota exceeded. HTTP 429.
    #[error("resource has been exhausted")]
    ResourceExhausted = 8,

    /// Any other failure reported in a response body, e.g. missing rights
    /// for a format, and unexpected HTTP 4xx.
    #[error("invalid state")]
    FailedPrecondition = 9,

    /// Connection reset or aborted mid-transfer.
    #[error("operation aborted")]
    Aborted = 10,

    /// Oversized secrets file.
    #[error("out of range")]
    OutOfRange = 11,

    /// Unsupported search kind.
    #[error("not implemented")]
    Unimplemented = 12,

    /// Cipher setup and request builder failures.
    #[error("internal error")]
    Internal = 13,

    /// Upstream unreachable, or any HTTP 5xx.
    #[error("service unavailable")]
    Unavailable = 14,

    /// Undecodable responses, broken streams and inconsistent records.
    #[error("unrecoverable data loss or corruption")]
    DataLoss = 15,
}

/// Generates one constructor per error kind.
macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident,)*) => {
        impl Error {
            $(
                $(#[$doc])*
                pub fn $name<E>(error: E) -> Self
                where
                    E: Into<Box<dyn std::error::Error + Send + Sync>>,
                {
                    Self::new(ErrorKind::$kind, error)
                }
            )*
        }
    };
}

constructors! {
    /// Creates an error for operations that were interrupted mid-execution.
    aborted => Aborted,
    /// Creates an error for cancelled operations.
    cancelled => Cancelled,
    /// Creates an error for data corruption or loss, such as a broken stream
    /// or inconsistent upstream records.
    data_loss => DataLoss,
    /// Creates an error for operations that exceeded their deadline.
    deadline_exceeded => DeadlineExceeded,
    /// Creates an error for requests the upstream rejected in its current state.
    failed_precondition => FailedPrecondition,
    /// Creates an error for unexpected internal errors.
    internal => Internal,
    /// Creates an error for invalid arguments.
    invalid_argument => InvalidArgument,
    /// Creates an error for missing resources.
    not_found => NotFound,
    /// Creates an error for values outside their valid range.
    out_of_range => OutOfRange,
    /// Creates an error for permission denied conditions.
    permission_denied => PermissionDenied,
    /// Creates an error for exhausted quotas.
    resource_exhausted => ResourceExhausted,
    /// Creates an error for authentication failures, such as rejected
    /// credentials or a stale form token.
    unauthenticated => Unauthenticated,
    /// Creates an error for unavailable services.
    unavailable => Unavailable,
    /// Creates an error for unimplemented features.
    unimplemented => Unimplemented,
    /// Creates an error that doesn't fit any other category.
    unknown => Unknown,
}

impl Error {
    /// Creates a new error with specified kind and details.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::new(ErrorKind::NotFound, "album not found");
    /// assert_eq!(err.kind, ErrorKind::NotFound);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Creates a detached copy with the same kind and message.
    ///
    /// The underlying error is not `Clone`, so the copy carries its
    /// rendered message instead. Used to hand one failure to several
    /// waiting callers.
    #[must_use]
    pub fn replay(&self) -> Self {
        Self::new(self.kind, self.error.to_string())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats as "{kind}: {details}".
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

/// Converts IO errors into appropriate error kinds.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            PermissionDenied => Self::permission_denied(err),
            AddrNotAvailable | ConnectionRefused | NotConnected => Self::unavailable(err),
            BrokenPipe | ConnectionReset | ConnectionAborted => Self::aborted(err),
            Interrupted | WouldBlock => Self::cancelled(err),
            UnexpectedEof => Self::data_loss(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            WriteZero => Self::resource_exhausted(err),
            _ => Self::unknown(err),
        }
    }
}

/// Converts HTTP client errors into appropriate error kinds.
///
/// A `403` or `401` status maps onto the authentication kinds, `404` onto
/// `NotFound` and `429` onto `ResourceExhausted`. Other statuses are
/// `Unavailable` for server errors and `FailedPrecondition` otherwise.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return match status.as_u16() {
                401 => Self::unauthenticated(err),
                403 => Self::permission_denied(err),
                404 => Self::not_found(err),
                429 => Self::resource_exhausted(err),
                500..=599 => Self::unavailable(err),
                _ => Self::failed_precondition(err),
            };
        }

        if err.is_body() {
            return Self::data_loss(err);
        }

        if err.is_decode() {
            return Self::invalid_argument(err);
        }

        if err.is_builder() {
            return Self::internal(err);
        }

        if err.is_connect() {
            return Self::unavailable(err);
        }

        if err.is_redirect() {
            return Self::resource_exhausted(err);
        }

        if err.is_timeout() {
            return Self::deadline_exceeded(err);
        }

        Self::unknown(err)
    }
}

/// Converts JSON errors through IO error mapping.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

/// Converts invalid header errors to `InvalidArgument`.
impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts URL parsing errors to `Internal`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts integer parsing errors to `InvalidArgument`.
impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts hex decoding errors to `InvalidArgument`.
impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts date parsing errors to `DataLoss`: they only occur on upstream
/// records that do not follow their documented format.
impl From<time::error::Parse> for Error {
    fn from(e: time::error::Parse) -> Self {
        Self::data_loss(e.to_string())
    }
}

/// Converts tagging errors to `DataLoss`: the audio is not a readable
/// container, or a field cannot be represented in it.
impl From<lofty::error::LoftyError> for Error {
    fn from(e: lofty::error::LoftyError) -> Self {
        Self::data_loss(e.to_string())
    }
}

/// Converts TOML errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}
