//! The Account Management v4 client.

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, Method};

use crate::auth::Authenticator;
use crate::common::sdk_headers;
use crate::config::ServiceProperties;
use crate::context::Context;
use crate::decode::decode_body;
use crate::models::{AccountResponse, GetAccountOptions};
use crate::request::RequestSpec;
use crate::service::BaseService;
use crate::{ComponentInfo, DetailedResponse, Error, OperationError, Result, RetryPolicy};

/// The URL requests go to unless configured otherwise.
pub const DEFAULT_SERVICE_URL: &str = "https://accounts.test.cloud.ibm.com";

/// The key used to find external configuration.
pub const DEFAULT_SERVICE_NAME: &str = "account_management";

/// The API version this client was generated for.
pub const API_VERSION: &str = "4.0.0";

const COMPONENT: ComponentInfo = ComponentInfo::new(DEFAULT_SERVICE_NAME, API_VERSION);

const GET_ACCOUNT_PATH: &str = "/v4/accounts/{account_id}";

/// Options for constructing an [`AccountManagementV4`].
#[derive(Debug, Clone, Default)]
pub struct AccountManagementV4Options {
    /// Key for external configuration; defaults to [`DEFAULT_SERVICE_NAME`].
    pub service_name: Option<String>,
    /// Base URL; defaults to [`DEFAULT_SERVICE_URL`].
    pub url: Option<String>,
    /// Credentials; required by [`AccountManagementV4::new`].
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

/// Client for the Account Management API.
///
/// Calls take `&self` and may run concurrently; configuration setters take
/// `&mut self`. Clone the client to hand one to each concurrent user that
/// needs its own settings. Clones share the authenticator.
///
/// # Examples
///
/// ```no_run
/// use account_management::auth::NoAuthAuthenticator;
/// use account_management::{AccountManagementV4, AccountManagementV4Options, Context, GetAccountOptions};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = AccountManagementV4::new(AccountManagementV4Options {
///     url: Some("https://accounts.example.com".to_string()),
///     authenticator: Some(Arc::new(NoAuthAuthenticator)),
///     ..Default::default()
/// })?;
/// client.enable_retries(3, Duration::from_secs(10));
///
/// let ctx = Context::with_timeout(Duration::from_secs(30));
/// let response = client
///     .get_account_with_context(&ctx, &GetAccountOptions::new("abc123"))
///     .await?;
/// if let Some(account) = response.result {
///     println!("{} is {}", account.name, account.status);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AccountManagementV4 {
    service: BaseService,
}

impl AccountManagementV4 {
    /// Creates a client from explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if no authenticator is given, the authenticator is
    /// invalid, or the URL is malformed.
    pub fn new(options: AccountManagementV4Options) -> Result<Self> {
        let authenticator = options.authenticator.ok_or_else(|| {
            Error::ConfigurationError("an authenticator is required".to_string())
        })?;
        let service_name = options
            .service_name
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let url = options
            .url
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());

        Ok(Self {
            service: BaseService::new(service_name, url, authenticator)?,
        })
    }

    /// Creates a client, filling in anything `options` leaves out from the
    /// credentials file or environment (see [`ServiceProperties::load`]).
    pub fn new_with_external_config(options: AccountManagementV4Options) -> Result<Self> {
        let service_name = options
            .service_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let properties = ServiceProperties::load(&service_name)?;
        Self::new_with_properties(options, &properties)
    }

    /// Like [`Self::new_with_external_config`], with already loaded
    /// properties.
    ///
    /// An explicit `options.url` takes precedence over the `URL` property.
    pub fn new_with_properties(
        mut options: AccountManagementV4Options,
        properties: &ServiceProperties,
    ) -> Result<Self> {
        if options.authenticator.is_none() {
            options.authenticator = Some(properties.authenticator()?);
        }
        if options.service_name.is_none() {
            options.service_name = Some(properties.service_name().to_string());
        }
        let explicit_url = options.url.take();

        let mut client = Self::new(options)?;
        if let Some(url) = properties.service_url() {
            client.set_service_url(url)?;
        }
        if let Some(gzip) = properties.enable_gzip()? {
            client.set_enable_gzip_compression(gzip)?;
        }
        if let Some(policy) = properties.retry_policy()? {
            client.service.set_retry_policy(policy);
        }
        if let Some(url) = explicit_url {
            client.set_service_url(url)?;
        }
        Ok(client)
    }

    /// Regional endpoints are not offered by this service.
    pub fn service_url_for_region(region: &str) -> Result<String> {
        Err(Error::ConfigurationError(format!(
            "service does not support regional URLs (requested '{region}')"
        )))
    }

    /// The base URL.
    pub fn service_url(&self) -> &str {
        self.service.service_url()
    }

    /// Sets the base URL.
    pub fn set_service_url(&mut self, url: impl Into<String>) -> Result<()> {
        self.service.set_service_url(url)
    }

    /// Sets headers sent with every request.
    pub fn set_default_headers(&mut self, headers: HeaderMap) {
        self.service.set_default_headers(headers);
    }

    /// Enables or disables gzip compression.
    pub fn set_enable_gzip_compression(&mut self, enabled: bool) -> Result<()> {
        self.service.set_enable_gzip_compression(enabled)
    }

    /// Whether gzip compression is enabled.
    pub fn enable_gzip_compression(&self) -> bool {
        self.service.config().gzip()
    }

    /// Enables retries. A zero for either argument selects the default
    /// (4 retries, 30 second cap).
    pub fn enable_retries(&mut self, max_retries: usize, max_interval: Duration) {
        self.service
            .set_retry_policy(RetryPolicy::enabled(max_retries, max_interval));
    }

    /// Disables retries.
    pub fn disable_retries(&mut self) {
        self.service.set_retry_policy(RetryPolicy::disabled());
    }

    /// The retry policy currently in effect.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.service.config().retry_policy()
    }

    /// Sets (or clears) the timeout applied to each individual attempt.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.service.set_timeout(timeout);
    }

    /// The underlying service client.
    pub fn service(&self) -> &BaseService {
        &self.service
    }

    /// Gets an account by ID.
    pub async fn get_account(
        &self,
        options: &GetAccountOptions,
    ) -> std::result::Result<DetailedResponse<AccountResponse>, OperationError> {
        self.get_account_with_context(&Context::background(), options)
            .await
    }

    /// Gets an account by ID, bounded by `ctx`.
    ///
    /// On success the response's `result` is `None` if the server sent an
    /// empty body. If the body does not decode, the returned error still
    /// carries the response envelope.
    pub async fn get_account_with_context(
        &self,
        ctx: &Context,
        options: &GetAccountOptions,
    ) -> std::result::Result<DetailedResponse<AccountResponse>, OperationError> {
        const OPERATION: &str = "getAccount";
        let fail = |e: Error| OperationError::new(OPERATION, COMPONENT, e);

        let request = self.build_get_account(options).map_err(fail)?;
        let response = self.service.execute(&request, ctx).await.map_err(fail)?;

        match decode_body::<AccountResponse>(&response.raw_body, response.status) {
            Ok(result) => Ok(response.with_result(result)),
            Err(e) => Err(fail(e).with_response(response)),
        }
    }

    fn build_get_account(&self, options: &GetAccountOptions) -> Result<RequestSpec> {
        options.validate()?;

        let mut builder = self
            .service
            .request_builder(Method::GET, GET_ACCOUNT_PATH)
            .with_path_param("account_id", options.account_id.as_str())
            .with_header_map(&sdk_headers(DEFAULT_SERVICE_NAME, "V4", "GetAccount")?);
        for (name, value) in &options.headers {
            builder = builder.with_header(name, value)?;
        }

        builder
            .with_header("Accept", "application/json")?
            .build(self.service.service_url())
    }
}
