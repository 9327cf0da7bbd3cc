//! External configuration for service clients.
//!
//! Settings for a service live under a prefix derived from its name: the
//! service `account_management` reads `ACCOUNT_MANAGEMENT_URL`,
//! `ACCOUNT_MANAGEMENT_AUTH_TYPE` and so on. They are looked up in a
//! credentials file first and in the process environment second; the first
//! source that has any property for the service wins.
//!
//! Recognized properties (without the prefix): `URL`, `AUTH_TYPE`,
//! `USERNAME`, `PASSWORD`, `BEARER_TOKEN`, `APIKEY`, `AUTH_URL`,
//! `ENABLE_GZIP`, `ENABLE_RETRIES`, `MAX_RETRIES`, `RETRY_INTERVAL`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{
    AuthType, Authenticator, BasicAuthenticator, BearerTokenAuthenticator, IamTokenSource,
    NoAuthAuthenticator, TokenAuthenticator, DEFAULT_IAM_URL,
};
use crate::{Error, Result, RetryPolicy};

/// Environment variable naming an explicit credentials file.
pub const CREDENTIALS_FILE_ENV: &str = "IBM_CREDENTIALS_FILE";

/// File name searched for in the working and home directories.
pub const DEFAULT_CREDENTIALS_FILE_NAME: &str = "ibm-credentials.env";

/// The external properties of one service, keyed without their prefix.
///
/// # Examples
///
/// ```
/// use account_management::config::ServiceProperties;
/// use account_management::auth::AuthType;
///
/// let props = ServiceProperties::from_pairs(
///     "account_management",
///     [
///         ("ACCOUNT_MANAGEMENT_URL", "https://accounts.example.com"),
///         ("ACCOUNT_MANAGEMENT_AUTH_TYPE", "noauth"),
///         ("OTHER_SERVICE_URL", "https://ignored.example.com"),
///     ],
/// );
///
/// assert_eq!(props.service_url(), Some("https://accounts.example.com"));
/// assert_eq!(props.authenticator().unwrap().auth_type(), AuthType::NoAuth);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceProperties {
    service_name: String,
    values: HashMap<String, String>,
}

impl ServiceProperties {
    /// Keeps the pairs whose key carries the service's prefix.
    pub fn from_pairs<I, K, V>(service_name: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = env_prefix(service_name);
        let values = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                let name = key.as_ref().strip_prefix(&prefix)?;
                (!name.is_empty()).then(|| (name.to_string(), value.into()))
            })
            .collect();

        Self {
            service_name: service_name.to_string(),
            values,
        }
    }

    /// Reads the service's properties from the process environment.
    pub fn from_env(service_name: &str) -> Self {
        Self::from_pairs(service_name, std::env::vars())
    }

    /// Reads the service's properties from a `KEY=value` credentials file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file(service_name: &str, path: &Path) -> Result<Self> {
        let to_error = |e: dotenvy::Error| {
            Error::ConfigurationError(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        };

        let pairs = dotenvy::from_path_iter(path)
            .map_err(to_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(to_error)?;
        Ok(Self::from_pairs(service_name, pairs))
    }

    /// Loads properties from the first credentials file that has any for
    /// this service, falling back to the environment.
    pub fn load(service_name: &str) -> Result<Self> {
        for path in credential_file_candidates() {
            if !path.is_file() {
                continue;
            }
            let props = Self::from_file(service_name, &path)?;
            if !props.is_empty() {
                tracing::debug!(
                    service = service_name,
                    path = %path.display(),
                    "Loaded service properties from credentials file"
                );
                return Ok(props);
            }
        }

        let props = Self::from_env(service_name);
        tracing::debug!(
            service = service_name,
            properties = props.values.len(),
            "Loaded service properties from environment"
        );
        Ok(props)
    }

    /// The service these properties belong to.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns `true` if no property was found for the service.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks up a property by its unprefixed name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The `URL` property.
    pub fn service_url(&self) -> Option<&str> {
        self.get("URL")
    }

    /// The `AUTH_TYPE` property. Defaults to IAM when only an API key is
    /// configured.
    pub fn auth_type(&self) -> Result<Option<AuthType>> {
        match self.get("AUTH_TYPE") {
            Some(value) => value.parse().map(Some),
            None if self.get("APIKEY").is_some() => Ok(Some(AuthType::Iam)),
            None => Ok(None),
        }
    }

    /// Builds and validates the configured authenticator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no or an unknown auth type is
    /// configured, or if the scheme's credentials are missing or invalid.
    pub fn authenticator(&self) -> Result<Arc<dyn Authenticator>> {
        let auth_type = self.auth_type()?.ok_or_else(|| {
            Error::ConfigurationError(format!(
                "no authentication type configured for service '{}'",
                self.service_name
            ))
        })?;

        let authenticator: Arc<dyn Authenticator> = match auth_type {
            AuthType::NoAuth => Arc::new(NoAuthAuthenticator),
            AuthType::Basic => Arc::new(BasicAuthenticator::new(
                self.require("USERNAME")?,
                self.require("PASSWORD")?,
            )),
            AuthType::BearerToken => {
                Arc::new(BearerTokenAuthenticator::new(self.require("BEARER_TOKEN")?))
            }
            AuthType::Iam => Arc::new(TokenAuthenticator::new(IamTokenSource::new(
                self.require("APIKEY")?,
                self.get("AUTH_URL").unwrap_or(DEFAULT_IAM_URL),
            ))),
        };
        authenticator.validate()?;
        Ok(authenticator)
    }

    /// The `ENABLE_GZIP` property.
    pub fn enable_gzip(&self) -> Result<Option<bool>> {
        self.get("ENABLE_GZIP").map(parse_bool).transpose()
    }

    /// The retry policy described by `ENABLE_RETRIES`, `MAX_RETRIES` and
    /// `RETRY_INTERVAL` (seconds), or `None` unless retries are enabled.
    pub fn retry_policy(&self) -> Result<Option<RetryPolicy>> {
        if !self.get("ENABLE_RETRIES").map(parse_bool).transpose()?.unwrap_or(false) {
            return Ok(None);
        }

        let max_retries = self.parse_number("MAX_RETRIES")?.unwrap_or(0);
        let interval = self.parse_number("RETRY_INTERVAL")?.unwrap_or(0);
        Ok(Some(RetryPolicy::enabled(
            max_retries as usize,
            Duration::from_secs(interval),
        )))
    }

    fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| {
            Error::ConfigurationError(format!(
                "missing property {}{name}",
                env_prefix(&self.service_name)
            ))
        })
    }

    fn parse_number(&self, name: &str) -> Result<Option<u64>> {
        self.get(name)
            .map(|value| {
                value.trim().parse::<u64>().map_err(|e| {
                    Error::ConfigurationError(format!("invalid value '{value}' for {name}: {e}"))
                })
            })
            .transpose()
    }
}

/// `account_management` becomes `ACCOUNT_MANAGEMENT_`.
fn env_prefix(service_name: &str) -> String {
    let mut prefix = service_name.to_ascii_uppercase().replace('-', "_");
    prefix.push('_');
    prefix
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::ConfigurationError(format!(
            "invalid boolean value '{value}'"
        ))),
    }
}

fn credential_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);
    if let Ok(path) = std::env::var(CREDENTIALS_FILE_ENV) {
        candidates.push(PathBuf::from(path));
    }
    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir.join(DEFAULT_CREDENTIALS_FILE_NAME));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(Path::new(&home).join(DEFAULT_CREDENTIALS_FILE_NAME));
    }
    candidates
}
