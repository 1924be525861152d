//! HTTP client with cookie management for the upstream endpoints.
//!
//! Wraps `reqwest::Client` to provide:
//! * A shared cookie jar, which carries the login session between the
//!   token endpoint and the gateway
//! * The browser headers the private endpoints expect
//! * Configurable timeouts
//! * Status checking on every response
//!
//! Throttling is not done here: callers acquire a permit from
//! [`RateLimiters`](crate::ratelimit::RateLimiters) for the right class
//! first.

use std::{sync::Arc, time::Duration};

use reqwest::{
    cookie::Jar,
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL},
    Method, RequestBuilder, Response, Url,
};

use crate::{config::Config, error::Result};

/// HTTP client shared by every upstream call.
#[derive(Clone, Debug)]
pub struct Client {
    inner: reqwest::Client,

    /// Session cookies set during login.
    pub cookie_jar: Arc<Jar>,
}

impl Client {
    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Language preference sent with every request.
    const ACCEPT_LANGUAGE: &'static str = "en-US,en;q=0.5";

    /// Creates a new client with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the user agent is not a valid header value or the
    /// TLS backend cannot be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(Self::ACCEPT_LANGUAGE),
        );

        let cookie_jar = Arc::new(Jar::default());

        let mut http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .pool_idle_timeout(config.pool_idle_timeout)
            .default_headers(headers)
            .user_agent(HeaderValue::from_str(&config.user_agent)?)
            .cookie_provider(Arc::clone(&cookie_jar));

        if let Some(timeout) = config.timeout {
            http_client = http_client.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            http_client = http_client.connect_timeout(timeout);
        }

        Ok(Self {
            inner: http_client.build()?,
            cookie_jar,
        })
    }

    /// Starts building a request with specified method and URL.
    #[must_use]
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.request(method, url)
    }

    #[must_use]
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    #[must_use]
    pub fn post(&self, url: Url) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Sends a request and checks the response status.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or when the status is not a
    /// success. The error kind follows the status code; see
    /// [`Error`](crate::error::Error).
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        response.error_for_status().map_err(Into::into)
    }

    /// Sends a request and reads the body as text.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), plus body read failures.
    pub async fn text(&self, request: RequestBuilder) -> Result<String> {
        let response = self.execute(request).await?;
        response.text().await.map_err(Into::into)
    }
}
