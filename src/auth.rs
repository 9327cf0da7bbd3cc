//! Authenticators that attach credentials to outgoing requests.
//!
//! Every attempt the client makes (retries included) passes its headers
//! through the configured [`Authenticator`] right before sending. Static
//! schemes ([`NoAuthAuthenticator`], [`BasicAuthenticator`],
//! [`BearerTokenAuthenticator`]) just write a header. [`TokenAuthenticator`]
//! caches a short-lived token from a [`TokenSource`] and refreshes it when it
//! is about to expire.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::{Duration, Instant};

use base64::Engine;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{Error, Result};

/// A boxed, sendable future, used to keep [`Authenticator`] object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default IAM endpoint used by [`IamTokenSource`].
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The authentication scheme of an authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthType {
    /// No credentials.
    NoAuth,
    /// HTTP basic authentication.
    Basic,
    /// A static or externally issued bearer token.
    BearerToken,
    /// A bearer token exchanged for an IAM API key.
    Iam,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthType::NoAuth => "noAuth",
            AuthType::Basic => "basic",
            AuthType::BearerToken => "bearerToken",
            AuthType::Iam => "iam",
        })
    }
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "noauth" => Ok(AuthType::NoAuth),
            "basic" => Ok(AuthType::Basic),
            "bearertoken" => Ok(AuthType::BearerToken),
            "iam" => Ok(AuthType::Iam),
            other => Err(Error::ConfigurationError(format!(
                "unrecognized authentication type: {other}"
            ))),
        }
    }
}

/// Attaches credentials to a request.
///
/// # Examples
///
/// ```
/// use account_management::auth::{Authenticator, AuthType, BoxFuture};
/// use http::HeaderMap;
///
/// #[derive(Debug)]
/// struct ApiKeyHeader(String);
///
/// impl Authenticator for ApiKeyHeader {
///     fn auth_type(&self) -> AuthType {
///         AuthType::BearerToken
///     }
///
///     fn authenticate<'a>(&'a self, headers: &'a mut HeaderMap) -> BoxFuture<'a, account_management::Result<()>> {
///         Box::pin(async move {
///             headers.insert("x-api-key", self.0.parse().unwrap());
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// The scheme this authenticator implements.
    fn auth_type(&self) -> AuthType;

    /// Checks the configuration, called once when a client is created.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Adds credentials to `headers`.
    fn authenticate<'a>(&'a self, headers: &'a mut HeaderMap) -> BoxFuture<'a, Result<()>>;
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthAuthenticator;

impl Authenticator for NoAuthAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::NoAuth
    }

    fn authenticate<'a>(&'a self, _headers: &'a mut HeaderMap) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Sends `Authorization: Basic <base64(username:password)>`.
#[derive(Clone)]
pub struct BasicAuthenticator {
    username: String,
    password: String,
}

impl BasicAuthenticator {
    /// Creates a basic authenticator. Call [`Authenticator::validate`] (or
    /// hand it to a client) to check the credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Authenticator for BasicAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::Basic
    }

    fn validate(&self) -> Result<()> {
        check_property("username", &self.username)?;
        check_property("password", &self.password)
    }

    fn authenticate<'a>(&'a self, headers: &'a mut HeaderMap) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let credentials = format!("{}:{}", self.username, self.password);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            headers.insert(AUTHORIZATION, authorization_value("Basic", &encoded)?);
            Ok(())
        })
    }
}

/// Sends a fixed `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerTokenAuthenticator {
    token: String,
}

impl BearerTokenAuthenticator {
    /// Creates a bearer token authenticator.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerTokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenAuthenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::BearerToken
    }

    fn validate(&self) -> Result<()> {
        check_property("bearer token", &self.token)
    }

    fn authenticate<'a>(&'a self, headers: &'a mut HeaderMap) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            headers.insert(AUTHORIZATION, authorization_value("Bearer", &self.token)?);
            Ok(())
        })
    }
}

/// A short-lived access token.
#[derive(Clone)]
pub struct AccessToken {
    /// The bearer token value.
    pub value: String,
    /// When the token stops being valid; `None` means never.
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    /// Creates a token that expires `expires_in` from now.
    pub fn expiring_in(value: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(Instant::now() + expires_in),
        }
    }

    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + EXPIRY_MARGIN < at,
            None => true,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues access tokens for a [`TokenAuthenticator`].
pub trait TokenSource: Send + Sync + fmt::Debug {
    /// The scheme the issued tokens belong to.
    fn auth_type(&self) -> AuthType {
        AuthType::BearerToken
    }

    /// Checks the source's configuration.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Requests a new token.
    fn fetch_token(&self) -> BoxFuture<'_, Result<AccessToken>>;
}

/// Caches a token from a [`TokenSource`] and refreshes it near expiry.
///
/// The cache lock is held for the duration of a refresh, so concurrent
/// callers never trigger more than one refresh at a time; they wait and
/// reuse the new token.
#[derive(Debug)]
pub struct TokenAuthenticator<S> {
    source: S,
    cached: Mutex<Option<AccessToken>>,
}

impl<S: TokenSource> TokenAuthenticator<S> {
    /// Creates an authenticator with an empty token cache.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// The underlying token source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns a fresh token, refreshing it if needed.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        tracing::debug!(auth_type = %self.source.auth_type(), "Refreshing access token");
        let token = self.source.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

impl<S: TokenSource> Authenticator for TokenAuthenticator<S> {
    fn auth_type(&self) -> AuthType {
        self.source.auth_type()
    }

    fn validate(&self) -> Result<()> {
        self.source.validate()
    }

    fn authenticate<'a>(&'a self, headers: &'a mut HeaderMap) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let token = self.token().await?;
            headers.insert(AUTHORIZATION, authorization_value("Bearer", &token)?);
            Ok(())
        })
    }
}

/// Exchanges an IAM API key for access tokens.
#[derive(Clone)]
pub struct IamTokenSource {
    apikey: String,
    url: String,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct IamTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

impl IamTokenSource {
    /// Creates a source that calls `{url}/identity/token`.
    pub fn new(apikey: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            apikey: apikey.into(),
            url: url.into(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn request_token(&self) -> Result<AccessToken> {
        let url = format!("{}/identity/token", self.url.trim_end_matches('/'));
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "urn:ibm:params:oauth:grant-type:apikey")
            .append_pair("apikey", &self.apikey)
            .append_pair("response_type", "cloud_iam")
            .finish();

        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Authentication(format!(
                "IAM token request failed with status {status}: {body}"
            )));
        }

        let token: IamTokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Authentication(format!("invalid IAM token response: {e}")))?;
        Ok(match token.expires_in {
            Some(seconds) => AccessToken::expiring_in(token.access_token, Duration::from_secs(seconds)),
            None => AccessToken {
                value: token.access_token,
                expires_at: None,
            },
        })
    }
}

impl fmt::Debug for IamTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamTokenSource")
            .field("apikey", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

impl TokenSource for IamTokenSource {
    fn auth_type(&self) -> AuthType {
        AuthType::Iam
    }

    fn validate(&self) -> Result<()> {
        check_property("apikey", &self.apikey)?;
        url::Url::parse(&self.url)?;
        Ok(())
    }

    fn fetch_token(&self) -> BoxFuture<'_, Result<AccessToken>> {
        Box::pin(self.request_token())
    }
}

/// Rejects empty values and values wrapped in `{}` or quotes, which are
/// almost always unexpanded placeholders.
fn check_property(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::ConfigurationError(format!("the {name} must not be empty")));
    }
    let framed = |c: char| matches!(c, '{' | '}' | '"');
    if value.starts_with(framed) || value.ends_with(framed) {
        return Err(Error::ConfigurationError(format!(
            "the {name} must not start or end with '{{', '}}' or '\"'"
        )));
    }
    Ok(())
}

fn authorization_value(scheme: &str, credentials: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{scheme} {credentials}"))
        .map_err(|e| Error::Authentication(format!("invalid credential: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
