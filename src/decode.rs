//! Strict, field-by-field response decoding.
//!
//! A success body is first parsed into a generic map of field name to raw
//! JSON value. Each model then pulls its required fields out of that map by
//! name through [`RawObject`], so a failure names the exact field (as a dotted
//! path for nested models) instead of a line and column. Unknown keys are
//! ignored.

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// A model that can be populated from a raw JSON object.
///
/// # Examples
///
/// ```
/// use account_management::decode::{decode_body, Decode, RawObject};
/// use http::StatusCode;
///
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl Decode for Point {
///     fn decode(object: &RawObject<'_>) -> account_management::Result<Self> {
///         Ok(Point {
///             x: object.required("x")?,
///             y: object.required("y")?,
///         })
///     }
/// }
///
/// let point: Option<Point> = decode_body(r#"{"x": 1, "y": 2, "z": 3}"#, StatusCode::OK).unwrap();
/// assert_eq!(point.map(|p| p.x + p.y), Some(3));
///
/// let err = decode_body::<Point>(r#"{"x": 1}"#, StatusCode::OK).err().unwrap();
/// assert_eq!(err.field(), Some("y"));
/// ```
pub trait Decode: Sized {
    /// Builds `Self` from `object`, failing on the first bad required field.
    fn decode(object: &RawObject<'_>) -> Result<Self>;
}

/// A borrowed view over one JSON object's fields.
#[derive(Debug, Clone, Copy)]
pub struct RawObject<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawObject<'a> {
    /// Wraps a parsed JSON object.
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Extracts a required primitive (or any `Deserialize` value) by key.
    ///
    /// Missing keys, `null` values and type mismatches are attributed to
    /// `key`.
    pub fn required<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.present(key)?;
        T::deserialize(value).map_err(|e| Error::Field {
            field: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Extracts a required nested model by key.
    ///
    /// Errors raised inside the nested model are reported as `key.<field>`.
    pub fn required_model<M>(&self, key: &str) -> Result<M>
    where
        M: Decode,
    {
        match self.present(key)? {
            Value::Object(fields) => M::decode(&RawObject::new(fields)).map_err(|e| e.nest_field(key)),
            other => Err(Error::Field {
                field: key.to_string(),
                message: format!("expected an object, found {}", kind_of(other)),
            }),
        }
    }

    fn present(&self, key: &str) -> Result<&'a Value> {
        match self.fields.get(key) {
            Some(Value::Null) | None => Err(Error::Field {
                field: key.to_string(),
                message: "missing required field".to_string(),
            }),
            Some(value) => Ok(value),
        }
    }
}

/// Decodes a success body into `T`.
///
/// An empty, whitespace-only or literal `null` body decodes to `Ok(None)`.
/// Anything else must be a JSON object, or [`Error::Parse`] is returned.
pub fn decode_body<T>(body: &str, status: StatusCode) -> Result<Option<T>>
where
    T: Decode,
{
    if body.trim().is_empty() {
        return Ok(None);
    }

    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            raw_response = %body,
            "Failed to parse response body"
        );
        Error::Parse {
            raw_response: body.to_string(),
            message: e.to_string(),
            status,
        }
    })?;

    let fields = match parsed {
        Value::Null => return Ok(None),
        Value::Object(fields) => fields,
        other => {
            return Err(Error::Parse {
                raw_response: body.to_string(),
                message: format!("expected a JSON object, found {}", kind_of(&other)),
                status,
            })
        }
    };

    T::decode(&RawObject::new(&fields)).map(Some).map_err(|e| {
        tracing::error!(error = %e, "Failed to decode response model");
        e
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
