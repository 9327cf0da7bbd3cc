//! SDK identification headers sent with every operation.

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{Error, Result};

/// Name reported in the `User-Agent` header.
pub const SDK_NAME: &str = "account-management-rust-sdk";

/// Header carrying per-operation analytics.
pub const ANALYTICS_HEADER: &str = "x-ibmcloud-sdk-analytics";

/// Returns the `User-Agent` value for this SDK.
pub fn user_agent() -> String {
    format!(
        "{}/{} (lang=rust; os={}; arch={})",
        SDK_NAME,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Builds the identification headers for one operation.
///
/// # Examples
///
/// ```
/// use account_management::common::sdk_headers;
///
/// let headers = sdk_headers("account_management", "V4", "GetAccount").unwrap();
/// assert_eq!(
///     headers["x-ibmcloud-sdk-analytics"],
///     "service_name=account_management;service_version=V4;operation_id=GetAccount"
/// );
/// assert!(headers.contains_key("user-agent"));
/// ```
pub fn sdk_headers(service_name: &str, service_version: &str, operation_id: &str) -> Result<HeaderMap> {
    let analytics = format!(
        "service_name={service_name};service_version={service_version};operation_id={operation_id}"
    );

    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(http::header::USER_AGENT, header_value(&user_agent())?);
    headers.insert(HeaderName::from_static(ANALYTICS_HEADER), header_value(&analytics)?);
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Validation(format!("Invalid header value: {}", e)))
}
