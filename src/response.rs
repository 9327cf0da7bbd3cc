//! Response envelope that keeps the decoded result next to the raw HTTP
//! details.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The outcome of a call whose transport succeeded.
///
/// `result` is `None` when the server answered with an empty body; that is a
/// success, not an error.
///
/// # Examples
///
/// ```no_run
/// use account_management::{AccountManagementV4, GetAccountOptions};
///
/// # async fn example(client: AccountManagementV4) -> Result<(), account_management::OperationError> {
/// let response = client.get_account(&GetAccountOptions::new("abc123")).await?;
///
/// println!("Status: {}", response.status);
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// match &response.result {
///     Some(account) => println!("Account owner: {}", account.owner),
///     None => println!("No content"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DetailedResponse<T> {
    /// The decoded result, absent for an empty body.
    pub result: Option<T>,

    /// The raw response body.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt until the response was read.
    pub latency: Duration,

    /// Number of attempts made, initial attempt included.
    pub attempts: usize,
}

impl DetailedResponse<()> {
    /// Creates an envelope for a raw response that has not been decoded.
    pub fn raw(
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            result: None,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }
}

impl<T> DetailedResponse<T> {
    /// Replaces the result, preserving the envelope.
    ///
    /// # Examples
    ///
    /// ```
    /// # use account_management::DetailedResponse;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let raw = DetailedResponse::raw(
    ///     "42".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let typed = raw.with_result(Some(42));
    /// assert_eq!(typed.result, Some(42));
    /// assert_eq!(typed.raw_body, "42");
    /// ```
    pub fn with_result<U>(self, result: Option<U>) -> DetailedResponse<U> {
        DetailedResponse {
            result,
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use account_management::DetailedResponse;
    /// # use http::{HeaderMap, StatusCode, HeaderValue};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = DetailedResponse::raw(
    ///     String::new(),
    ///     StatusCode::OK,
    ///     headers,
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
