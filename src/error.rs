//! Error types for Account Management API calls.
//!
//! Failures are modelled on two levels. [`Error`] is the underlying cause
//! (a bad option, a refused connection, a field that did not decode).
//! [`OperationError`] wraps exactly one cause on its way out of an operation
//! and tags it with the pipeline [`Stage`] that failed, the operation name and
//! the [`ComponentInfo`] of the service, so callers can tell which call against
//! which service version went wrong without parsing messages.

use std::fmt;

use http::{HeaderMap, StatusCode};

use crate::rate_limit::RateLimitInfo;
use crate::response::DetailedResponse;

/// The underlying cause of a failed call.
///
/// # Examples
///
/// ```
/// use account_management::{Error, Stage};
/// use http::{HeaderMap, StatusCode};
///
/// let err = Error::HttpError {
///     status: StatusCode::SERVICE_UNAVAILABLE,
///     raw_response: "try later".to_string(),
///     headers: HeaderMap::new(),
///     rate_limit_info: None,
/// };
/// assert!(err.is_retryable());
/// assert_eq!(err.stage(), Stage::Transport);
///
/// let err = Error::Field {
///     field: "traits.poc".to_string(),
///     message: "missing required field".to_string(),
/// };
/// assert_eq!(err.field(), Some("traits.poc"));
/// assert_eq!(err.stage(), Stage::Decode);
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The caller supplied invalid input: a missing required option, an
    /// empty path parameter, a malformed header or service URL.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A network-level error occurred (connection refused, reset, DNS...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A single attempt exceeded the configured per-request timeout.
    ///
    /// Unlike [`Error::DeadlineExceeded`] this is a transient failure and is
    /// retried when retries are enabled.
    #[error("Request timed out")]
    Timeout,

    /// The caller's context expired or was cancelled before the response
    /// was fully read. Never retried.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The server returned a non-2xx HTTP status code.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
        /// `Retry-After` style hints parsed from the headers
        rate_limit_info: Option<RateLimitInfo>,
    },

    /// All retry attempts were used up on transient failures.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made, initial attempt included
        attempts: usize,
        /// The error returned by the final attempt
        last_error: Box<Error>,
    },

    /// The success body could not be parsed as a JSON object.
    #[error("Failed to parse response body (status {status}): {message}")]
    Parse {
        /// The raw response body
        raw_response: String,
        /// The parser's error message
        message: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A required field was missing, null or of the wrong type.
    #[error("Failed to decode field `{field}`: {message}")]
    Field {
        /// Dotted path of the field, e.g. `traits.hippa`
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Invalid client configuration (unknown auth type, missing
    /// credentials, unparsable external property).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The authenticator could not produce a credential.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this error is a transient failure worth retrying.
    ///
    /// Network errors, per-attempt timeouts, 429 and 5xx responses are
    /// transient. Validation, decode, 4xx and deadline errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => !e.is_builder() && !e.is_decode(),
            Error::Timeout => true,
            Error::HttpError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Error::Validation(_)
            | Error::DeadlineExceeded
            | Error::MaxRetriesExceeded { .. }
            | Error::Parse { .. }
            | Error::Field { .. }
            | Error::ConfigurationError(_)
            | Error::Authentication(_)
            | Error::InvalidUrl(_) => false,
        }
    }

    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Error::Validation(_) | Error::ConfigurationError(_) | Error::InvalidUrl(_) => {
                Stage::Validation
            }
            Error::Network(_)
            | Error::Timeout
            | Error::DeadlineExceeded
            | Error::HttpError { .. }
            | Error::MaxRetriesExceeded { .. }
            | Error::Authentication(_) => Stage::Transport,
            Error::Parse { .. } | Error::Field { .. } => Stage::Decode,
        }
    }

    /// Returns `true` if the caller's deadline expired or its token was
    /// cancelled.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Error::DeadlineExceeded)
    }

    /// Returns the attributed field path for field-level decode errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::Parse { status, .. } => Some(*status),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::Parse { raw_response, .. } => Some(raw_response),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.raw_response(),
            _ => None,
        }
    }

    /// Returns rate limit information if available.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::HttpError {
                rate_limit_info, ..
            } => rate_limit_info.as_ref(),
            _ => None,
        }
    }

    /// Returns the server-requested delay, capped by `max_wait`.
    pub fn rate_limit_delay(&self, max_wait: std::time::Duration) -> Option<std::time::Duration> {
        self.rate_limit_info()?.delay(max_wait)
    }

    /// Prefixes the attributed field path with `parent`, used when a nested
    /// model fails to decode.
    pub(crate) fn nest_field(self, parent: &str) -> Self {
        match self {
            Error::Field { field, message } => Error::Field {
                field: format!("{parent}.{field}"),
                message,
            },
            other => other,
        }
    }
}

/// A specialized `Result` type for the request pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline stage an operation failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Options, path parameters, headers or base URL were invalid.
    Validation,
    /// Sending, authenticating or receiving failed.
    Transport,
    /// The success body did not match the response schema.
    Decode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validation => "validation",
            Stage::Transport => "transport",
            Stage::Decode => "decode",
        })
    }
}

/// Identifies the remote service an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentInfo {
    /// Service name, e.g. `account_management`.
    pub name: &'static str,
    /// API version, e.g. `4.0.0`.
    pub version: &'static str,
}

impl ComponentInfo {
    /// Creates a new `ComponentInfo`.
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self { name, version }
    }
}

impl fmt::Display for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// An error returned by a client operation.
///
/// When the transport succeeded but decoding failed, the raw response is
/// still available through [`OperationError::response`].
///
/// # Examples
///
/// ```no_run
/// use account_management::{AccountManagementV4, GetAccountOptions, Stage};
///
/// # async fn example(client: AccountManagementV4) {
/// let options = GetAccountOptions::new("abc123");
/// match client.get_account(&options).await {
///     Ok(response) => println!("status {}", response.status),
///     Err(err) if err.stage == Stage::Decode => {
///         eprintln!("bad body: {:?}", err.response().map(|r| &r.raw_body));
///     }
///     Err(err) => eprintln!("{err}"),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
#[error("{operation} failed at {stage} stage ({component}): {source}")]
pub struct OperationError {
    /// The operation that failed, e.g. `getAccount`.
    pub operation: &'static str,
    /// The stage the failure was raised in.
    pub stage: Stage,
    /// The service that was called.
    pub component: ComponentInfo,
    /// The underlying cause.
    #[source]
    pub source: Error,
    response: Option<Box<DetailedResponse<()>>>,
}

impl OperationError {
    /// Wraps `source`, deriving the stage from it.
    pub fn new(operation: &'static str, component: ComponentInfo, source: Error) -> Self {
        Self {
            operation,
            stage: source.stage(),
            component,
            source,
            response: None,
        }
    }

    /// Attaches the response envelope the failure was observed on.
    pub fn with_response(mut self, response: DetailedResponse<()>) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// The underlying cause.
    pub fn error(&self) -> &Error {
        &self.source
    }

    /// Consumes the wrapper and returns the underlying cause.
    pub fn into_error(self) -> Error {
        self.source
    }

    /// The response envelope, present only when a response was received.
    pub fn response(&self) -> Option<&DetailedResponse<()>> {
        self.response.as_deref()
    }

    /// Shortcut for `self.error().is_deadline_exceeded()`.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.source.is_deadline_exceeded()
    }
}
