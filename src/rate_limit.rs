//! Server-requested retry delays.
//!
//! 429 and 503 responses often say how long to back off. Those hints are
//! parsed here and, when present, take precedence over the computed backoff
//! (still capped by the policy's maximum interval).

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retry hints extracted from response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// When the rate limit resets (from `X-RateLimit-Reset`).
    pub reset_at: Option<SystemTime>,

    /// How long to wait before retrying (from `Retry-After`).
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Extracts retry hints from response headers.
    ///
    /// Returns `None` when the headers carry no hint at all.
    ///
    /// # Examples
    ///
    /// ```
    /// use account_management::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "2".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers).unwrap();
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(2)));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let info = Self {
            reset_at: parse_rate_limit_reset(headers),
            retry_after: parse_retry_after(headers),
        };
        (info.reset_at.is_some() || info.retry_after.is_some()).then_some(info)
    }

    /// Returns the recommended delay before retrying, capped by `max_wait`.
    ///
    /// `Retry-After` wins over the reset timestamp.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }

        let until_reset = self.reset_at?.duration_since(SystemTime::now()).ok()?;
        Some(until_reset.min(max_wait))
    }
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;

    if let Ok(seconds) = header.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date_time = httpdate::parse_http_date(header).ok()?;
    Some(
        date_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

/// Parses `X-RateLimit-Reset` (Unix timestamp in seconds). Timestamps that
/// do not fit in a `SystemTime` are ignored.
fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<SystemTime> {
    let timestamp = headers
        .get("x-ratelimit-reset")?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()?;
    UNIX_EPOCH.checked_add(Duration::from_secs(timestamp))
}
