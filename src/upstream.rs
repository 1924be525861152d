//! Request builders and response parsers for each upstream surface.
//!
//! [`Upstream`] holds no session or rate-limit state. Credentials are
//! passed in per call, and callers throttle before calling. Its only
//! job is request shaping and turning every failure shape into an
//! [`Error`]:
//!
//! * HTTP status failures, through [`http::Client::execute`]
//! * Gateway envelopes with a non-empty `error`
//! * Public API bodies with an `error` key
//! * Media entries with `errors`

use std::fmt::Debug;

use futures_util::Stream;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    config::{Credentials, Endpoints},
    error::{Error, Result},
    http,
    protocol::{
        self,
        api::ApiError,
        auth,
        gateway::{self, Method},
        media::{self, Format},
    },
};

/// Gateway protocol version.
const GATEWAY_API_VERSION: &str = "1.0";

/// Gateway input mode: JSON body.
const GATEWAY_INPUT: &str = "3";

/// Form token placeholder before login completes.
const NO_API_TOKEN: &str = "null";

#[derive(Clone, Debug)]
pub struct Upstream {
    http: http::Client,
    endpoints: Endpoints,
}

impl Upstream {
    #[must_use]
    pub fn new(http: http::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchanges account credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` when the credentials are rejected.
    pub async fn auth_token(&self, credentials: &Credentials) -> Result<auth::Token> {
        let password = credentials.password_hex();
        let hash = credentials.login_hash();
        let request = self.http.get(self.endpoints.auth_token.clone()).query(&[
            ("app_id", credentials.client_id.as_str()),
            ("login", credentials.email.as_str()),
            ("password", password.as_str()),
            ("hash", hash.as_str()),
        ]);

        let body = self.http.text(request).await?;
        match protocol::json::<auth::Response>(&body, "auth/token")? {
            auth::Response::Success(token) => Ok(token),
            auth::Response::Failure { error } => {
                Err(error.into_protocol_error("auth/token").into())
            }
        }
    }

    /// Presents the access token once so the cookie session is bound to it.
    ///
    /// # Errors
    ///
    /// Returns an error when the token is refused.
    pub async fn probe(&self, token: &auth::Token) -> Result<()> {
        let request = self
            .http
            .get(self.endpoints.auth_probe.clone())
            .bearer_auth(&token.access_token);
        self.http.execute(request).await.map(|_| ())
    }

    /// Calls a gateway method.
    ///
    /// `api_token` is the form token of the session; `None` before it is
    /// known.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure, when the envelope reports one, or
    /// when the results are not shaped like `M::Response`.
    pub async fn call_gateway<M: Method>(
        &self,
        params: &M,
        api_token: Option<&str>,
    ) -> Result<M::Response> {
        let request = self
            .http
            .post(self.endpoints.gateway.clone())
            .query(&[
                ("api_version", GATEWAY_API_VERSION),
                ("api_token", api_token.unwrap_or(NO_API_TOKEN)),
                ("input", GATEWAY_INPUT),
                ("method", M::METHOD),
            ])
            .json(params);

        let body = self.http.text(request).await?;

        // Results may carry session credentials: only the typed, redacted
        // record gets logged.
        let envelope = serde_json::from_str::<gateway::Response>(&body).map_err(|e| {
            error!("{}: failed parsing response ({e})", M::METHOD);
            Error::from(e)
        })?;

        envelope.into_result::<M>()
    }

    /// Gets a public API resource, `path` being relative to the API root.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure, when the body has an `error` key,
    /// or when the body is not shaped like `T`.
    pub async fn call_public_api<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned + Debug,
    {
        let url = self.endpoints.api.join(path)?;
        let body = self.http.text(self.http.get(url)).await?;

        let mut value = protocol::json::<serde_json::Value>(&body, path)?;
        if let Some(error) = value.get_mut("error") {
            let error: ApiError = serde_json::from_value(error.take()).unwrap_or_default();
            return Err(error.into_protocol_error(path).into());
        }

        protocol::from_value(value, path)
    }

    /// Resolves the download URL of a track in `format`.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure, when the track entry carries
    /// `errors`, or when no source is listed.
    pub async fn resolve_track_url(
        &self,
        track_token: &str,
        format: Format,
        license_token: &str,
    ) -> Result<Url> {
        let request = self
            .http
            .post(self.endpoints.media.clone())
            .json(&media::Request::full_track(license_token, track_token, format));

        let body = self.http.text(request).await?;
        protocol::json::<media::Response>(&body, "get_url")?.first_source()
    }

    /// Downloads an image from the CDN.
    ///
    /// # Errors
    ///
    /// Returns an error on network or HTTP status failure.
    pub async fn fetch_cdn_image(&self, url: Url) -> Result<Vec<u8>> {
        let response = self.http.execute(self.http.get(url)).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Opens a streaming download.
    ///
    /// # Errors
    ///
    /// Returns an error when the response status is not a success.
    /// Failures while streaming surface as stream items.
    pub async fn open_stream(
        &self,
        url: Url,
    ) -> Result<impl Stream<Item = reqwest::Result<impl AsRef<[u8]>>>> {
        let response = self.http.execute(self.http.get(url)).await?;
        if let Some(length) = response.content_length() {
            debug!("streaming {length} bytes");
        }
        Ok(response.bytes_stream())
    }
}
