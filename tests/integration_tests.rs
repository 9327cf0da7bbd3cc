//! Integration tests using wiremock to simulate the Account Management API.

use account_management::auth::{
    Authenticator, BasicAuthenticator, IamTokenSource, NoAuthAuthenticator, TokenAuthenticator,
};
use account_management::request::SERVICE_URL_MISSING;
use account_management::{
    AccountManagementV4, AccountManagementV4Options, AccountResponse, BoolOrString, Context,
    Error, GetAccountOptions, Stage,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCOUNT_PATH: &str = "/v4/accounts/testString";

fn account_body() -> Value {
    json!({
        "name": "Name",
        "id": "ID",
        "owner": "Owner",
        "owner_userid": "OwnerUserid",
        "owner_iamid": "OwnerIamid",
        "type": "Type",
        "status": "Status",
        "linked_softlayer_account": "LinkedSoftlayerAccount",
        "team_directory_enabled": false,
        "traits": {"eu_supported": false, "poc": false, "hippa": false}
    })
}

fn client_with(url: &str, authenticator: Arc<dyn Authenticator>) -> AccountManagementV4 {
    AccountManagementV4::new(AccountManagementV4Options {
        url: Some(url.to_string()),
        authenticator: Some(authenticator),
        ..Default::default()
    })
    .unwrap()
}

fn client(server: &MockServer) -> AccountManagementV4 {
    client_with(&server.uri(), Arc::new(NoAuthAuthenticator))
}

fn options() -> GetAccountOptions {
    GetAccountOptions::new("testString").with_headers(HashMap::from([(
        "x-custom-header".to_string(),
        "x-custom-value".to_string(),
    )]))
}

#[tokio::test]
async fn test_get_account_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .and(header("accept", "application/json"))
        .and(header("x-custom-header", "x-custom-value"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client(&mock_server).get_account(&options()).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());

    let account: AccountResponse = response.result.unwrap();
    assert_eq!(account.name, "Name");
    assert_eq!(account.id, "ID");
    assert_eq!(account.owner, "Owner");
    assert_eq!(account.owner_userid, "OwnerUserid");
    assert_eq!(account.owner_iamid, "OwnerIamid");
    assert_eq!(account.account_type, "Type");
    assert_eq!(account.status, "Status");
    assert_eq!(account.linked_softlayer_account, "LinkedSoftlayerAccount");
    assert_eq!(account.team_directory_enabled, BoolOrString::Bool(false));
    assert!(!account.traits.eu_supported);
    assert!(!account.traits.poc);
    assert!(!account.traits.hippa);
}

#[tokio::test]
async fn test_sdk_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .and(header(
            "x-ibmcloud-sdk-analytics",
            "service_name=account_management;service_version=V4;operation_id=GetAccount",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client(&mock_server).get_account(&options()).await.unwrap();
    assert!(response.result.is_some());
}

#[tokio::test]
async fn test_resolved_path_for_several_identifiers() {
    let mock_server = MockServer::start().await;

    for id in ["abc", "A-1_b.c~d", "0123456789abcdef"] {
        Mock::given(method("GET"))
            .and(path(format!("/v4/accounts/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = client(&mock_server);
    for id in ["abc", "A-1_b.c~d", "0123456789abcdef"] {
        let response = client.get_account(&GetAccountOptions::new(id)).await.unwrap();
        assert_eq!(response.status.as_u16(), 200);
    }
}

#[tokio::test]
async fn test_invalid_json_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("} this is not valid json {"),
        )
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);

    for retries_enabled in [false, true] {
        if retries_enabled {
            client.enable_retries(0, Duration::ZERO);
        }

        let err = client.get_account(&options()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Decode);
        assert!(matches!(err.error(), Error::Parse { .. }));

        let response = err.response().expect("decode failures keep the response");
        assert_eq!(response.status.as_u16(), 200);
        assert_eq!(response.raw_body, "} this is not valid json {");
        assert!(response.result.is_none());
    }
}

#[tokio::test]
async fn test_missing_field_in_response() {
    let mock_server = MockServer::start().await;

    let mut body = account_body();
    body["traits"].as_object_mut().unwrap().remove("hippa");

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).get_account(&options()).await.unwrap_err();

    assert_eq!(err.stage, Stage::Decode);
    assert_eq!(err.error().field(), Some("traits.hippa"));
    assert!(err.response().is_some());
}

#[tokio::test]
async fn test_empty_body_is_absent_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let response = client(&mock_server).get_account(&options()).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert!(response.result.is_none());
}

#[tokio::test]
async fn test_validation_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);

    let err = client
        .get_account(&GetAccountOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Validation);
    assert!(err.response().is_none());

    client.set_service_url("").unwrap();
    let err = client.get_account(&options()).await.unwrap_err();
    assert_eq!(err.stage, Stage::Validation);
    assert!(err.to_string().contains(SERVICE_URL_MISSING));
    assert!(err.response().is_none());
}

#[tokio::test]
async fn test_deadline_exceeded_with_and_without_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(account_body())
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.enable_retries(0, Duration::ZERO);

    let ctx = Context::with_timeout(Duration::from_millis(80));
    let err = client
        .get_account_with_context(&ctx, &options())
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());
    assert!(err.to_string().contains("deadline exceeded"));

    client.disable_retries();
    let response = client.get_account(&options()).await.unwrap();
    assert!(response.result.is_some());

    let ctx = Context::with_timeout(Duration::from_millis(80));
    let err = client
        .get_account_with_context(&ctx, &options())
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());
    assert_eq!(err.stage, Stage::Transport);
}

#[tokio::test]
async fn test_cancellation_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(account_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let token = CancellationToken::new();
    let ctx = Context::background().cancelled_by(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let start = std::time::Instant::now();
    let err = client
        .get_account_with_context(&ctx, &options())
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_deadline_exceeded());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_retries_share_the_deadline() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Unavailable"))
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.enable_retries(50, Duration::from_millis(100));

    let start = std::time::Instant::now();
    let ctx = Context::with_timeout(Duration::from_millis(300));
    let err = client
        .get_account_with_context(&ctx, &options())
        .await
        .unwrap_err();

    assert!(err.is_deadline_exceeded());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_exactly_n_plus_one_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.enable_retries(2, Duration::from_millis(10));

    let err = client.get_account(&options()).await.unwrap_err();

    assert_eq!(err.stage, Stage::Transport);
    match err.error() {
        Error::MaxRetriesExceeded {
            attempts,
            last_error,
        } => {
            // max_retries: 2 means 3 total attempts (1 initial + 2 retries)
            assert_eq!(*attempts, 3);
            assert_eq!(last_error.status().map(|s| s.as_u16()), Some(500));
        }
        other => panic!("Expected MaxRetriesExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_then_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail, third succeeds
    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            match count {
                0 => ResponseTemplate::new(500).set_body_string("Server error"),
                1 => ResponseTemplate::new(429).set_body_string("Slow down"),
                _ => ResponseTemplate::new(200).set_body_json(account_body()),
            }
        })
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.enable_retries(3, Duration::from_millis(10));

    let response = client.get_account(&options()).await.unwrap();

    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert!(response.result.is_some());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.enable_retries(3, Duration::from_millis(10));

    let err = client.get_account(&options()).await.unwrap_err();

    match err.error() {
        Error::HttpError {
            status,
            raw_response,
            ..
        } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(raw_response, "Not found");
        }
        other => panic!("Expected HttpError, got {:?}", other),
    }
    assert!(err.response().is_none());
}

#[tokio::test]
async fn test_retries_disabled_makes_single_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Unavailable"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).get_account(&options()).await.unwrap_err();

    assert!(matches!(
        err.error(),
        Error::HttpError { status, .. } if status.as_u16() == 503
    ));
}

#[tokio::test]
async fn test_retry_after_is_capped_by_max_interval() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "600")
                    .set_body_string("Rate limited")
            } else {
                ResponseTemplate::new(200).set_body_json(account_body())
            }
        })
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.enable_retries(2, Duration::from_millis(50));

    let start = std::time::Instant::now();
    let response = client.get_account(&options()).await.unwrap();

    assert_eq!(response.attempts, 2);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_per_attempt_timeout_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(account_body())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.set_timeout(Some(Duration::from_millis(50)));
    client.enable_retries(1, Duration::from_millis(10));

    let err = client.get_account(&options()).await.unwrap_err();

    match err.error() {
        Error::MaxRetriesExceeded {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 2);
            assert!(matches!(**last_error, Error::Timeout));
        }
        other => panic!("Expected MaxRetriesExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop a server so the port is closed
    let uri = {
        let mock_server = MockServer::start().await;
        mock_server.uri()
    };

    let client = client_with(&uri, Arc::new(NoAuthAuthenticator));
    let err = client.get_account(&options()).await.unwrap_err();

    assert_eq!(err.stage, Stage::Transport);
    assert!(matches!(err.error(), Error::Network(_)));
    assert!(err.error().is_retryable());
}

#[tokio::test]
async fn test_basic_auth_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with(
        &mock_server.uri(),
        Arc::new(BasicAuthenticator::new("user", "pass")),
    );
    let response = client.get_account(&options()).await.unwrap();
    assert!(response.result.is_some());
}

#[tokio::test]
async fn test_iam_token_is_fetched_once_and_reused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(body_string_contains("apikey=my-api-key"))
        .and(body_string_contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "iam-access-token",
            "refresh_token": "unused",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .and(header("authorization", "Bearer iam-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let authenticator = TokenAuthenticator::new(IamTokenSource::new("my-api-key", mock_server.uri()));
    let client = client_with(&mock_server.uri(), Arc::new(authenticator));

    client.get_account(&options()).await.unwrap();
    client.get_account(&options()).await.unwrap();
}

#[tokio::test]
async fn test_iam_token_failure_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad apikey"))
        .mount(&mock_server)
        .await;

    let authenticator = TokenAuthenticator::new(IamTokenSource::new("my-api-key", mock_server.uri()));
    let client = client_with(&mock_server.uri(), Arc::new(authenticator));

    let err = client.get_account(&options()).await.unwrap_err();
    assert_eq!(err.stage, Stage::Transport);
    assert!(matches!(err.error(), Error::Authentication(msg) if msg.contains("bad apikey")));
}

#[tokio::test]
async fn test_gzip_negotiation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .and(header("accept-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = client(&mock_server);
    client.set_enable_gzip_compression(true).unwrap();
    assert!(client.enable_gzip_compression());

    let response = client.get_account(&options()).await.unwrap();
    assert!(response.result.is_some());
}

#[tokio::test]
async fn test_clone_is_independently_configurable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let original = client(&mock_server);
    let mut clone = original.clone();
    clone.set_service_url("").unwrap();

    assert!(original.get_account(&options()).await.is_ok());
    assert!(clone.get_account(&options()).await.is_err());
    assert_eq!(original.service_url(), mock_server.uri());
}

#[tokio::test]
async fn test_dot_segment_identifiers_are_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    for id in [".", ".."] {
        let err = client
            .get_account(&GetAccountOptions::new(id))
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Validation, "id {id:?}");
        assert!(err.response().is_none());
    }
}

#[tokio::test]
async fn test_out_of_range_rate_limit_reset_is_ignored() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ACCOUNT_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-ratelimit-reset", u64::MAX.to_string().as_str())
                .set_body_string("Rate limited"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).get_account(&options()).await.unwrap_err();

    match err.error() {
        Error::HttpError {
            status,
            rate_limit_info,
            ..
        } => {
            assert_eq!(status.as_u16(), 429);
            assert!(rate_limit_info.is_none());
        }
        other => panic!("Expected HttpError, got {:?}", other),
    }
}
