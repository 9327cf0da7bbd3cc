//! # Account Management v4 client
//!
//! A typed client for the Account Management API, built on `reqwest`. A call
//! runs through four steps:
//!
//! 1. validate the options,
//! 2. build an immutable request (path parameters, layered headers),
//! 3. execute it under a caller [`Context`] with retries for transient
//!    failures,
//! 4. decode the body field by field into a typed model.
//!
//! ## Quick Start
//!
//! ```no_run
//! use account_management::{AccountManagementV4, AccountManagementV4Options, GetAccountOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads ACCOUNT_MANAGEMENT_URL, ACCOUNT_MANAGEMENT_AUTH_TYPE, ...
//!     let mut client =
//!         AccountManagementV4::new_with_external_config(AccountManagementV4Options::default())?;
//!     client.enable_retries(3, Duration::from_secs(5));
//!
//!     let response = client.get_account(&GetAccountOptions::new("abc123")).await?;
//!     match response.result {
//!         Some(account) => println!("{} ({})", account.name, account.status),
//!         None => println!("empty response, status {}", response.status),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`OperationError`] naming the operation, the
//! [`Stage`] that failed and the service version, wrapping an [`Error`]:
//!
//! ```no_run
//! use account_management::{AccountManagementV4, Context, Error, GetAccountOptions, Stage};
//! use std::time::Duration;
//!
//! # async fn example(client: AccountManagementV4) {
//! let ctx = Context::with_timeout(Duration::from_secs(2));
//! match client.get_account_with_context(&ctx, &GetAccountOptions::new("abc123")).await {
//!     Ok(response) => println!("Success: {:?}", response.result),
//!     Err(err) if err.is_deadline_exceeded() => eprintln!("gave up: {err}"),
//!     Err(err) => match (err.stage, err.error()) {
//!         (Stage::Decode, Error::Field { field, message }) => {
//!             eprintln!("field {field} is bad: {message}");
//!         }
//!         (Stage::Transport, Error::HttpError { status, raw_response, .. }) => {
//!             eprintln!("HTTP error {status}: {raw_response}");
//!         }
//!         _ => eprintln!("Other error: {err}"),
//!     },
//! }
//! # }
//! ```

mod account_management;
pub mod auth;
pub mod common;
pub mod config;
mod context;
pub mod decode;
mod error;
mod models;
pub mod rate_limit;
pub mod request;
mod response;
pub mod retry;
pub mod service;

pub use account_management::{
    AccountManagementV4, AccountManagementV4Options, API_VERSION, DEFAULT_SERVICE_NAME,
    DEFAULT_SERVICE_URL,
};
pub use context::Context;
pub use error::{ComponentInfo, Error, OperationError, Result, Stage};
pub use models::{AccountResponse, AccountResponseTraits, BoolOrString, GetAccountOptions};
pub use response::DetailedResponse;
pub use retry::RetryPolicy;
