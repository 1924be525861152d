//! Client configuration and secrets.
//!
//! Secrets are read from a small TOML file:
//!
//! ```toml
//! email = "user@example.com"
//! password_md5 = "5f4dcc3b5aa765d61d8327deb882cf99"
//! client_id = "123456"
//! client_secret = "..."
//! bf_secret = "..."
//! ```
//!
//! Every upstream URL lives in [`Endpoints`], which defaults to the
//! production hosts and can be pointed elsewhere.

use std::{fs, path::Path, time::Duration};

use md5::{Digest, Md5};
use serde::Deserialize;
use url::Url;
use veil::Redact;

use crate::{
    decrypt::Key,
    error::{Error, Result},
};

/// Browser `User-Agent` the private endpoints expect to see.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,

    /// Shared secret from which per-track decryption keys are derived.
    pub bf_secret: Key,

    pub user_agent: String,
    pub app_lang: String,

    /// Total time allowed for a single request, including the body.
    ///
    /// Leave unset for track downloads of large lossless files on slow
    /// connections.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,

    /// How long an unused connection stays pooled. `None` keeps it until
    /// the server closes it.
    pub pool_idle_timeout: Option<Duration>,

    pub endpoints: Endpoints,
}

impl Config {
    const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    #[must_use]
    pub fn new(credentials: Credentials, bf_secret: Key) -> Self {
        Self {
            credentials,
            bf_secret,
            user_agent: BROWSER_USER_AGENT.to_owned(),
            app_lang: "en".to_owned(),
            timeout: None,
            connect_timeout: Some(Self::DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Some(Self::DEFAULT_POOL_IDLE_TIMEOUT),
            endpoints: Endpoints::default(),
        }
    }

    /// Builds a configuration from the contents of a secrets file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the password hash is not 32 hex
    /// characters or the decryption secret is not 16 bytes.
    pub fn from_secrets(secrets: Secrets) -> Result<Self> {
        let password_md5 = parse_password_md5(&secrets.password_md5)?;
        let bf_secret = secrets.bf_secret.parse::<Key>()?;

        let credentials = Credentials {
            email: secrets.email,
            password_md5,
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
        };

        Ok(Self::new(credentials, bf_secret))
    }
}

fn parse_password_md5(hex_str: &str) -> Result<[u8; 16]> {
    let mut password_md5 = [0; 16];
    hex::decode_to_slice(hex_str.trim(), &mut password_md5).map_err(|e| {
        Error::invalid_argument(format!("password_md5 should be 32 hex characters: {e}"))
    })?;
    Ok(password_md5)
}

/// Account credentials for the login handshake.
#[derive(Clone, Eq, PartialEq, Redact)]
pub struct Credentials {
    pub email: String,

    /// MD5 digest of the account password. The plain password is never
    /// needed.
    #[redact]
    pub password_md5: [u8; 16],

    pub client_id: String,

    #[redact]
    pub client_secret: String,
}

impl Credentials {
    /// The password digest as lowercase hex, as sent to the token endpoint.
    #[must_use]
    pub fn password_hex(&self) -> String {
        hex::encode(self.password_md5)
    }

    /// Request signature: hex MD5 of `client_id + email + password_hex + client_secret`.
    #[must_use]
    pub fn login_hash(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.client_id.as_bytes());
        hasher.update(self.email.as_bytes());
        hasher.update(self.password_hex().as_bytes());
        hasher.update(self.client_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Contents of the secrets file.
#[derive(Clone, Deserialize, Redact)]
#[redact(all)]
pub struct Secrets {
    pub email: String,
    pub password_md5: String,
    pub client_id: String,
    pub client_secret: String,
    pub bf_secret: String,
}

impl Secrets {
    /// Secrets files hold five short strings.
    const MAX_FILE_SIZE: u64 = 4 * 1024;

    /// Loads secrets from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is suspiciously large or
    /// is not valid TOML with all keys present.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: secrets file should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        contents.parse()
    }
}

impl std::str::FromStr for Secrets {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(s).map_err(Into::into)
    }
}

/// Upstream base URLs.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Private RPC gateway.
    pub gateway: Url,

    /// Credential exchange.
    pub auth_token: Url,

    /// Any bearer-authenticated resource; requesting it activates the
    /// access token for the cookie session.
    pub auth_probe: Url,

    /// Public REST API root. Must end with a slash.
    pub api: Url,

    /// Media URL resolution.
    pub media: Url,

    /// Image CDN root. Must end with a slash.
    pub images: Url,
}

impl Endpoints {
    const GATEWAY: &'static str = "ajax/gw-light.php";
    const AUTH_TOKEN: &'static str = "auth/token";
    const AUTH_PROBE: &'static str = "platform/generic/track/3117931";
    const API: &'static str = "2.0/";
    const MEDIA: &'static str = "v1/get_url";
    const IMAGES: &'static str = "images/";

    /// Puts every endpoint under a single base URL, keeping the production
    /// paths.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` cannot be a base URL.
    pub fn with_base(base: &Url) -> Result<Self> {
        Ok(Self {
            gateway: base.join(Self::GATEWAY)?,
            auth_token: base.join(Self::AUTH_TOKEN)?,
            auth_probe: base.join(Self::AUTH_PROBE)?,
            api: base.join(Self::API)?,
            media: base.join(Self::MEDIA)?,
            images: base.join(Self::IMAGES)?,
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        let url = |base: &str, path: &str| {
            Url::parse(base)
                .and_then(|base| base.join(path))
                .expect("invalid endpoint url")
        };

        Self {
            gateway: url("https://www.deezer.com/", Self::GATEWAY),
            auth_token: url("https://api.deezer.com/", Self::AUTH_TOKEN),
            auth_probe: url("https://api.deezer.com/", Self::AUTH_PROBE),
            api: url("https://api.deezer.com/", Self::API),
            media: url("https://media.deezer.com/", Self::MEDIA),
            images: url("https://e-cdns-images.dzcdn.net/", Self::IMAGES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRETS: &str = r#"
        email = "listener@example.com"
        password_md5 = "5f4dcc3b5aa765d61d8327deb882cf99"
        client_id = "447462"
        client_secret = "a83bf7f38ad2f137e444727cfc3775cf"
        bf_secret = "secret16bytes!!!"
    "#;

    #[test]
    fn parses_secrets_file() {
        let secrets: Secrets = SECRETS.parse().unwrap();
        let config = Config::from_secrets(secrets).unwrap();

        assert_eq!(config.credentials.email, "listener@example.com");
        assert_eq!(
            config.credentials.password_hex(),
            "5f4dcc3b5aa765d61d8327deb882cf99"
        );
        assert_eq!(&*config.bf_secret, b"secret16bytes!!!");
        assert_eq!(config.user_agent, BROWSER_USER_AGENT);
    }

    #[test]
    fn rejects_malformed_password_hash() {
        let secrets: Secrets = SECRETS.replace("5f4dcc3b", "zz").parse().unwrap();
        assert!(Config::from_secrets(secrets).is_err());
    }

    #[test]
    fn rejects_short_bf_secret() {
        let secrets: Secrets = SECRETS
            .replace("secret16bytes!!!", "short")
            .parse()
            .unwrap();
        assert!(Config::from_secrets(secrets).is_err());
    }

    #[test]
    fn login_hash_covers_all_credentials() {
        let credentials = Credentials {
            email: "a".to_owned(),
            password_md5: [0; 16],
            client_id: "1".to_owned(),
            client_secret: "s".to_owned(),
        };

        let expected = format!(
            "{:x}",
            Md5::digest(format!("1a{}s", "0".repeat(32)).as_bytes())
        );
        assert_eq!(credentials.login_hash(), expected);
        assert_eq!(credentials.login_hash().len(), 32);
    }

    #[test]
    fn default_endpoints_match_production_hosts() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.gateway.as_str(),
            "https://www.deezer.com/ajax/gw-light.php"
        );
        assert_eq!(
            endpoints.auth_token.as_str(),
            "https://api.deezer.com/auth/token"
        );
        assert_eq!(endpoints.api.as_str(), "https://api.deezer.com/2.0/");
        assert_eq!(
            endpoints.media.as_str(),
            "https://media.deezer.com/v1/get_url"
        );
        assert_eq!(
            endpoints.images.as_str(),
            "https://e-cdns-images.dzcdn.net/images/"
        );
    }

    #[test]
    fn endpoints_share_a_base() {
        let base = Url::parse("http://127.0.0.1:8080/").unwrap();
        let endpoints = Endpoints::with_base(&base).unwrap();
        assert_eq!(
            endpoints.auth_probe.as_str(),
            "http://127.0.0.1:8080/platform/generic/track/3117931"
        );
    }
}
