//! Transport and retry execution.
//!
//! [`BaseService`] owns the service configuration and the HTTP connection
//! pool. It sends [`RequestSpec`]s, retries transient failures according to
//! the [`RetryPolicy`] in effect at call time, and hands back the raw
//! response envelope for decoding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, Method};
use url::Url;

use crate::auth::Authenticator;
use crate::context::Context;
use crate::rate_limit::RateLimitInfo;
use crate::request::{RequestBuilder, RequestSpec};
use crate::{DetailedResponse, Error, Result, RetryPolicy};

/// Configuration shared by every request a service client makes.
///
/// Cloning shares the authenticator (and its token cache).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    service_url: String,
    service_name: String,
    authenticator: Arc<dyn Authenticator>,
    default_headers: HeaderMap,
    gzip: bool,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl ServiceConfig {
    /// The base URL requests are resolved against.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// The name used to look up external configuration.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The authenticator applied to every attempt.
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Headers sent with every request unless overridden.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Whether request bodies are gzip compressed.
    pub fn gzip(&self) -> bool {
        self.gzip
    }

    /// The retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// The per-attempt timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Sends requests for one remote service.
#[derive(Debug, Clone)]
pub struct BaseService {
    config: ServiceConfig,
    http_client: reqwest::Client,
}

impl BaseService {
    /// Creates a service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the authenticator's configuration is invalid,
    /// `service_url` is non-empty but malformed, or the HTTP client cannot
    /// be built.
    pub fn new(
        service_name: impl Into<String>,
        service_url: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        authenticator.validate()?;

        let service_url = service_url.into();
        check_service_url(&service_url)?;

        Ok(Self {
            config: ServiceConfig {
                service_url,
                service_name: service_name.into(),
                authenticator,
                default_headers: HeaderMap::new(),
                gzip: false,
                retry_policy: RetryPolicy::disabled(),
                timeout: None,
            },
            http_client: build_http_client(false)?,
        })
    }

    /// The current configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The base URL requests are resolved against.
    pub fn service_url(&self) -> &str {
        &self.config.service_url
    }

    /// Sets the base URL. An empty URL is accepted here and rejected when a
    /// request is built.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a non-empty URL is malformed.
    pub fn set_service_url(&mut self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        check_service_url(&url)?;
        self.config.service_url = url;
        Ok(())
    }

    /// Replaces the default headers.
    pub fn set_default_headers(&mut self, headers: HeaderMap) {
        self.config.default_headers = headers;
    }

    /// Enables or disables gzip for request bodies and responses.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be rebuilt.
    pub fn set_enable_gzip_compression(&mut self, enabled: bool) -> Result<()> {
        if enabled != self.config.gzip {
            self.http_client = build_http_client(enabled)?;
            self.config.gzip = enabled;
        }
        Ok(())
    }

    /// Replaces the retry policy.
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.config.retry_policy = policy;
    }

    /// Sets (or clears) the per-attempt timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config.timeout = timeout;
    }

    /// Starts a request carrying the default headers and gzip setting.
    pub fn request_builder(&self, method: Method, url_template: &str) -> RequestBuilder {
        RequestBuilder::new(method, url_template)
            .with_header_map(&self.config.default_headers)
            .with_gzip(self.config.gzip)
    }

    /// Executes `request` within `ctx`.
    ///
    /// Every attempt and every backoff sleep shares the context's deadline.
    /// When the context ends first the call fails with
    /// [`Error::DeadlineExceeded`], which is never retried.
    pub async fn execute(&self, request: &RequestSpec, ctx: &Context) -> Result<DetailedResponse<()>> {
        let policy = self.config.retry_policy;
        ctx.run(self.execute_with_retries(request, policy))
            .await
            .inspect_err(|e| {
                if e.is_deadline_exceeded() {
                    tracing::warn!(
                        method = %request.method(),
                        url = %request.url(),
                        "Request abandoned: context deadline exceeded"
                    );
                }
            })
    }

    async fn execute_with_retries(
        &self,
        request: &RequestSpec,
        policy: RetryPolicy,
    ) -> Result<DetailedResponse<()>> {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match self.send(request, attempt).await {
                Ok(response) => self.read_response(response, start_time.elapsed(), attempt).await,
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %request.method(),
                url = %request.url(),
                "Request failed"
            );

            if !policy.is_enabled() || !error.is_retryable() {
                return Err(error);
            }

            let Some(backoff) = policy.delay_for_attempt(attempt) else {
                return Err(Error::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            };

            // A server-requested delay wins, still capped by the policy
            let delay = error
                .rate_limit_delay(policy.max_interval())
                .unwrap_or(backoff);

            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Authenticates and sends a single attempt.
    async fn send(&self, request: &RequestSpec, attempt: usize) -> Result<reqwest::Response> {
        let mut headers = request.headers().clone();
        self.config.authenticator.authenticate(&mut headers).await?;

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            attempt = attempt,
            "Executing HTTP request"
        );

        let mut builder = self
            .http_client
            .request(request.method().clone(), request.url().clone())
            .headers(headers);

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        builder.send().await.map_err(transport_error)
    }

    /// Reads the response, turning non-2xx statuses into errors.
    async fn read_response(
        &self,
        response: reqwest::Response,
        latency: Duration,
        attempts: usize,
    ) -> Result<DetailedResponse<()>> {
        let status = response.status();
        let headers = response.headers().clone();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        if !status.is_success() {
            let raw_response = response.text().await.unwrap_or_else(|e| {
                tracing::debug!(
                    status = status.as_u16(),
                    error = %e,
                    "Failed to read error response body"
                );
                String::new()
            });
            let rate_limit_info = RateLimitInfo::from_headers(&headers);

            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %raw_response,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_response,
                    "Server error (5xx)"
                );
            }

            return Err(Error::HttpError {
                status,
                raw_response,
                headers,
                rate_limit_info,
            });
        }

        let raw_body = response.text().await.map_err(transport_error)?;
        Ok(DetailedResponse::raw(raw_body, status, headers, latency, attempts))
    }
}

fn check_service_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Ok(());
    }
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| Error::Validation(format!("invalid service URL '{url}': {e}")))
}

fn build_http_client(gzip: bool) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .gzip(gzip)
        .build()
        .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
}

fn transport_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}
