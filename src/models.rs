//! Account Management v4 data models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decode::{Decode, RawObject};
use crate::{Error, Result};

/// Options for `GetAccount`.
///
/// # Examples
///
/// ```
/// use account_management::GetAccountOptions;
/// use std::collections::HashMap;
///
/// let options = GetAccountOptions::new("abc123")
///     .with_headers(HashMap::from([("x-request-id".to_string(), "42".to_string())]));
/// assert_eq!(options.account_id, "abc123");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetAccountOptions {
    /// The unique identifier of the account to retrieve.
    pub account_id: String,

    /// Extra headers for this call; they override default and SDK headers.
    pub headers: HashMap<String, String>,
}

impl GetAccountOptions {
    /// Creates options for the given account.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            headers: HashMap::new(),
        }
    }

    /// Replaces the account identifier.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Replaces the per-call headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(Error::Validation(
                "GetAccountOptions.account_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A value the service sends either as a JSON boolean or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoolOrString {
    /// A JSON boolean.
    Bool(bool),
    /// A JSON string.
    String(String),
}

impl BoolOrString {
    /// Interprets the value as a boolean: `true`/`false` strings are
    /// accepted case-insensitively, other strings yield `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoolOrString::Bool(b) => Some(*b),
            BoolOrString::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            BoolOrString::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            BoolOrString::String(_) => None,
        }
    }
}

/// An account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountResponse {
    /// Display name of the account.
    pub name: String,
    /// Unique account identifier.
    pub id: String,
    /// Owner's login name.
    pub owner: String,
    /// Owner's user ID.
    pub owner_userid: String,
    /// Owner's IAM ID.
    pub owner_iamid: String,
    /// Account type, sent as `type` on the wire.
    #[serde(rename = "type")]
    pub account_type: String,
    /// Account state, e.g. `ACTIVE`.
    pub status: String,
    /// Linked SoftLayer account number.
    pub linked_softlayer_account: String,
    /// Whether the team directory is enabled.
    pub team_directory_enabled: BoolOrString,
    /// Compliance traits.
    pub traits: AccountResponseTraits,
}

impl AccountResponse {
    /// Wire names of the required top-level fields, in decode order.
    pub const FIELDS: [&'static str; 10] = [
        "name",
        "id",
        "owner",
        "owner_userid",
        "owner_iamid",
        "type",
        "status",
        "linked_softlayer_account",
        "team_directory_enabled",
        "traits",
    ];
}

impl Decode for AccountResponse {
    fn decode(object: &RawObject<'_>) -> Result<Self> {
        Ok(Self {
            name: object.required("name")?,
            id: object.required("id")?,
            owner: object.required("owner")?,
            owner_userid: object.required("owner_userid")?,
            owner_iamid: object.required("owner_iamid")?,
            account_type: object.required("type")?,
            status: object.required("status")?,
            linked_softlayer_account: object.required("linked_softlayer_account")?,
            team_directory_enabled: object.required("team_directory_enabled")?,
            traits: object.required_model("traits")?,
        })
    }
}

/// Compliance traits of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountResponseTraits {
    /// Data is kept in the EU.
    pub eu_supported: bool,
    /// Proof-of-concept account.
    pub poc: bool,
    /// HIPAA compliance is enabled.
    pub hippa: bool,
}

impl AccountResponseTraits {
    /// Wire names of the required fields, in decode order.
    pub const FIELDS: [&'static str; 3] = ["eu_supported", "poc", "hippa"];
}

impl Decode for AccountResponseTraits {
    fn decode(object: &RawObject<'_>) -> Result<Self> {
        Ok(Self {
            eu_supported: object.required("eu_supported")?,
            poc: object.required("poc")?,
            hippa: object.required("hippa")?,
        })
    }
}
