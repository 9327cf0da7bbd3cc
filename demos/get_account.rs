//! Fetches one account and prints it.
//!
//! Configuration comes from `ibm-credentials.env` or the environment:
//!
//! ```text
//! ACCOUNT_MANAGEMENT_URL=https://accounts.test.cloud.ibm.com
//! ACCOUNT_MANAGEMENT_AUTH_TYPE=iam
//! ACCOUNT_MANAGEMENT_APIKEY=...
//! ```
//!
//! Run with: `cargo run --example get_account -- <account_id>`

use account_management::{
    AccountManagementV4, AccountManagementV4Options, Context, Error, GetAccountOptions, Stage,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("account_management=debug,get_account=info")
        .init();

    let account_id = std::env::args()
        .nth(1)
        .ok_or("usage: get_account <account_id>")?;

    let mut client =
        AccountManagementV4::new_with_external_config(AccountManagementV4Options::default())?;
    client.enable_retries(3, Duration::from_secs(5));

    println!("=== GetAccount against {} ===", client.service_url());

    let ctx = Context::with_timeout(Duration::from_secs(30));
    let options = GetAccountOptions::new(account_id);

    match client.get_account_with_context(&ctx, &options).await {
        Ok(response) => {
            println!("Status code: {}", response.status);
            println!("Attempts: {}", response.attempts);
            println!("Request latency: {:?}", response.latency);
            match response.result {
                Some(account) => println!("{}", serde_json::to_string_pretty(&account)?),
                None => println!("(empty body)"),
            }
        }
        Err(err) if err.is_deadline_exceeded() => {
            eprintln!("Gave up after 30s: {err}");
        }
        Err(err) => {
            match (err.stage, err.error()) {
                (Stage::Decode, Error::Field { field, message }) => {
                    eprintln!("Unexpected response, field '{field}': {message}");
                }
                (Stage::Transport, Error::HttpError { status, raw_response, .. }) => {
                    eprintln!("HTTP {status}: {raw_response}");
                }
                _ => eprintln!("Request failed: {err}"),
            }
            if let Some(response) = err.response() {
                eprintln!("Raw body: {}", response.raw_body);
            }
        }
    }

    Ok(())
}
