//! Request construction.
//!
//! A [`RequestBuilder`] collects the method, a URL template with `{name}`
//! placeholders, path parameters, headers and an optional body, and resolves
//! them against the service URL into an immutable [`RequestSpec`].

use std::collections::HashMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::{Error, Result};

/// Characters escaped in a path parameter so it stays a single segment.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

/// Error message used when a request is built without a service URL.
pub const SERVICE_URL_MISSING: &str = "service URL is empty";

/// A fully resolved, immutable description of one outgoing call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl RequestSpec {
    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request headers, before authentication.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The (possibly compressed) request body.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Builder for [`RequestSpec`].
///
/// Headers are applied in call order and a later header replaces an earlier
/// one with the same name, so callers layer defaults first and overrides last.
///
/// # Examples
///
/// ```
/// use account_management::request::RequestBuilder;
/// use http::Method;
///
/// # fn example() -> account_management::Result<()> {
/// let request = RequestBuilder::new(Method::GET, "/v4/accounts/{account_id}")
///     .with_path_param("account_id", "abc 123")
///     .with_header("Accept", "application/json")?
///     .build("https://accounts.example.com/")?;
///
/// assert_eq!(
///     request.url().as_str(),
///     "https://accounts.example.com/v4/accounts/abc%20123"
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url_template: String,
    path_params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    gzip: bool,
}

impl RequestBuilder {
    /// Creates a builder for `method` on the given path template.
    pub fn new(method: Method, url_template: impl Into<String>) -> Self {
        Self {
            method,
            url_template: url_template.into(),
            path_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
            gzip: false,
        }
    }

    /// Sets the value substituted for `{name}` in the template.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Adds a header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Validation(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Validation(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds every header of `headers`, replacing previous values.
    pub fn with_header_map(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Compresses the body with gzip when it is built.
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Resolves the template against `service_url` and freezes the request.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the service URL is empty or malformed,
    /// or a referenced path parameter is missing or empty.
    pub fn build(self, service_url: &str) -> Result<RequestSpec> {
        let url = resolve_url(service_url, &self.url_template, &self.path_params)?;
        let mut headers = self.headers;

        let body = match self.body {
            Some(body) if self.gzip => {
                headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                Some(compress(&body)?)
            }
            body => body,
        };
        if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(RequestSpec {
            method: self.method,
            url,
            headers,
            body,
        })
    }
}

/// Substitutes path parameters into `template` and joins it to
/// `service_url`.
///
/// # Examples
///
/// ```
/// use account_management::request::resolve_url;
/// use std::collections::HashMap;
///
/// let params = HashMap::from([("id".to_string(), "a/b".to_string())]);
/// let url = resolve_url("https://host/api", "/items/{id}", &params).unwrap();
/// assert_eq!(url.as_str(), "https://host/api/items/a%2Fb");
///
/// assert!(resolve_url("", "/items/{id}", &params).is_err());
/// ```
pub fn resolve_url(
    service_url: &str,
    template: &str,
    path_params: &HashMap<String, String>,
) -> Result<Url> {
    if service_url.is_empty() {
        return Err(Error::Validation(SERVICE_URL_MISSING.to_string()));
    }

    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let close = rest[open..].find('}').map(|i| open + i).ok_or_else(|| {
            Error::Validation(format!("unterminated placeholder in URL template '{template}'"))
        })?;
        let name = &rest[open + 1..close];
        let value = path_params
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Validation(format!("path parameter '{name}' is empty")))?;
        // URL parsing collapses dot segments, escaped or not
        if matches!(value.as_str(), "." | "..") {
            return Err(Error::Validation(format!(
                "path parameter '{name}' must not be '{value}'"
            )));
        }

        path.push_str(&rest[..open]);
        path.extend(utf8_percent_encode(value, PATH_SEGMENT_ENCODE_SET));
        rest = &rest[close + 1..];
    }
    path.push_str(rest);

    let full = format!("{}{}", service_url.trim_end_matches('/'), path);
    Url::parse(&full)
        .map_err(|e| Error::Validation(format!("invalid service URL '{service_url}': {e}")))
}

fn compress(body: &[u8]) -> Result<Vec<u8>> {
    let to_error = |e: std::io::Error| Error::Validation(format!("failed to compress request body: {e}"));
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).map_err(to_error)?;
    encoder.finish().map_err(to_error)
}
