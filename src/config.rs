//! Connection options for the filter stream.
//!
//! `StreamConfig` is built once, validated at construction, and never
//! mutated afterwards. Credential secrets are held as [`SecretString`] so
//! they stay out of debug output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Default watchdog timeout between inbound bytes.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(64_000);
/// Default filter endpoint path template; the encoded keywords are appended
/// after `=`.
pub const DEFAULT_TRACK_REQUEST: &str = "/1.1/statuses/filter.json?stall_warnings=true&track";
/// Default streaming API host.
pub const DEFAULT_HOST: &str = "stream.twitter.com";
/// Default streaming API port.
pub const DEFAULT_PORT: u16 = 443;

const DEFAULT_TOKEN_REQUEST_URL: &str = "https://twitter.com/oauth/request_token";
const DEFAULT_TOKEN_ACCESS_URL: &str = "https://twitter.com/oauth/access_token";
const DEFAULT_OAUTH_VERSION: &str = "1.0A";

/// Signature method used when signing requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SignatureMethod {
    /// HMAC-SHA1 over the signature base string.
    #[default]
    HmacSha1,
    /// Plaintext signing key, no digest.
    Plaintext,
}

impl SignatureMethod {
    /// Wire name used in the `oauth_signature_method` parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
            SignatureMethod::Plaintext => "PLAINTEXT",
        }
    }
}

/// OAuth application credentials and token-flow endpoints.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    /// Endpoint for the temporary-credentials step of the token flow.
    pub token_request_url: String,
    /// Endpoint for exchanging temporary credentials for an access token.
    pub token_access_url: String,
    /// Application consumer key.
    pub consumer_key: String,
    /// Application consumer secret.
    pub consumer_secret: SecretString,
    /// Protocol version advertised to the service.
    pub version: String,
    /// Callback registered for the authorize step, when any.
    pub authorize_callback: Option<String>,
    /// Request signature method.
    pub signature_method: SignatureMethod,
}

impl OAuthConfig {
    /// Creates a config with the standard Twitter token endpoints.
    pub fn new(consumer_key: impl Into<String>, consumer_secret: SecretString) -> Self {
        Self {
            token_request_url: DEFAULT_TOKEN_REQUEST_URL.to_string(),
            token_access_url: DEFAULT_TOKEN_ACCESS_URL.to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret,
            version: DEFAULT_OAUTH_VERSION.to_string(),
            authorize_callback: None,
            signature_method: SignatureMethod::default(),
        }
    }

    /// Overrides the token-flow endpoints.
    pub fn with_token_urls(
        mut self,
        request_url: impl Into<String>,
        access_url: impl Into<String>,
    ) -> Self {
        self.token_request_url = request_url.into();
        self.token_access_url = access_url.into();
        self
    }

    /// Sets the authorize callback.
    pub fn with_authorize_callback(mut self, callback: impl Into<String>) -> Self {
        self.authorize_callback = Some(callback.into());
        self
    }

    /// Sets the signature method.
    pub fn with_signature_method(mut self, method: SignatureMethod) -> Self {
        self.signature_method = method;
        self
    }
}

/// Forward HTTP proxy address used for the CONNECT tunnel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyConfig {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

/// Immutable stream connection options.
///
/// Construction fails with [`ConfigError`] when any required credential or
/// the keyword filter is missing, before any network activity.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// OAuth application credentials.
    pub oauth: OAuthConfig,
    /// Watchdog timeout between inbound bytes.
    pub keep_alive: Duration,
    /// Path template for the filter request.
    pub track_request: String,
    /// Comma-separated keyword filter.
    pub keywords: String,
    /// Streaming API host.
    pub host: String,
    /// Streaming API port.
    pub port: u16,
    /// User access token.
    pub access_token: String,
    /// User access token secret.
    pub access_token_secret: SecretString,
    /// Optional forward proxy.
    pub proxy: Option<ProxyConfig>,
    /// Whether to connect over TLS. On by default; disabled only when
    /// pointing the client at a plain-HTTP endpoint.
    pub tls: bool,
}

impl StreamConfig {
    /// Creates a config with the standard endpoint defaults.
    pub fn new(
        oauth: OAuthConfig,
        keywords: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: SecretString,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            oauth,
            keep_alive: DEFAULT_KEEP_ALIVE,
            track_request: DEFAULT_TRACK_REQUEST.to_string(),
            keywords: keywords.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            access_token: access_token.into(),
            access_token_secret,
            proxy: None,
            tls: true,
        };
        config.validate()?;
        Ok(config)
    }

    /// Overrides the endpoint host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Overrides the endpoint port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the watchdog timeout.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Overrides the filter request path template.
    pub fn with_track_request(mut self, track_request: impl Into<String>) -> Self {
        self.track_request = track_request.into();
        self
    }

    /// Routes the connection through a forward proxy.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Enables or disables TLS for the stream connection.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// URL scheme implied by the TLS setting.
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.consumer_key.is_empty() {
            return Err(ConfigError::MissingField("OAuth.consumerKey"));
        }
        if self.oauth.consumer_secret.expose_secret().is_empty() {
            return Err(ConfigError::MissingField("OAuth.consumerSecret"));
        }
        if self.keywords.is_empty() {
            return Err(ConfigError::MissingField("keywords"));
        }
        if self.access_token.is_empty() {
            return Err(ConfigError::MissingField("accessToken"));
        }
        if self.access_token_secret.expose_secret().is_empty() {
            return Err(ConfigError::MissingField("accessTokenSecret"));
        }
        Ok(())
    }
}

/// Configuration errors raised at construction.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required credential or filter field is empty.
    #[error("missing required stream config field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{
        ConfigError, OAuthConfig, ProxyConfig, StreamConfig, DEFAULT_HOST, DEFAULT_KEEP_ALIVE,
        DEFAULT_PORT, DEFAULT_TRACK_REQUEST,
    };

    fn oauth() -> OAuthConfig {
        OAuthConfig::new("ck", SecretString::new("cs".to_string()))
    }

    fn secret(value: &str) -> SecretString {
        SecretString::new(value.to_string())
    }

    #[test]
    fn applies_endpoint_defaults() {
        let config = StreamConfig::new(oauth(), "rust", "at", secret("ats")).expect("config");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.track_request, DEFAULT_TRACK_REQUEST);
        assert_eq!(config.keep_alive, DEFAULT_KEEP_ALIVE);
        assert!(config.proxy.is_none());
        assert_eq!(config.scheme(), "https");
    }

    #[test]
    fn rejects_empty_keywords() {
        let err = StreamConfig::new(oauth(), "", "at", secret("ats")).expect_err("must fail");
        assert_eq!(err, ConfigError::MissingField("keywords"));
    }

    #[test]
    fn rejects_empty_consumer_key() {
        let oauth = OAuthConfig::new("", secret("cs"));
        let err = StreamConfig::new(oauth, "rust", "at", secret("ats")).expect_err("must fail");
        assert_eq!(err, ConfigError::MissingField("OAuth.consumerKey"));
    }

    #[test]
    fn rejects_empty_access_token_secret() {
        let err = StreamConfig::new(oauth(), "rust", "at", secret("")).expect_err("must fail");
        assert_eq!(err, ConfigError::MissingField("accessTokenSecret"));
    }

    #[test]
    fn builder_overrides_apply() {
        let config = StreamConfig::new(oauth(), "rust", "at", secret("ats"))
            .expect("config")
            .with_host("127.0.0.1")
            .with_port(8080)
            .with_tls(false)
            .with_proxy(ProxyConfig {
                host: "proxy.local".to_string(),
                port: 3128,
            });
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.scheme(), "http");
        assert_eq!(
            config.proxy,
            Some(ProxyConfig {
                host: "proxy.local".to_string(),
                port: 3128,
            })
        );
    }
}
