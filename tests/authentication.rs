//! Basic and Digest authentication against a mock device.

mod common;

use std::sync::Arc;

use common::*;
use isapi_client::{ CancellationToken, IsapiError };
use wiremock::matchers::{ header, method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

#[tokio::test]
async fn digest_challenge_is_answered_with_one_resend() -> anyhow::Result<()> {
    init_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(DigestDevice::new(DEVICE_INFO))
        .expect(2)
        .mount(&server)
        .await;

    let log = Arc::new(RecordingLog::default());
    let client = client_for(&server, true, fast_retry()).with_request_log(log.clone());

    let info = client.device_info(&CancellationToken::new()).await?;
    assert_eq!(info.root().child_text("model").as_deref(), Some("DS-2CD2143G2-I"));

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(verify_digest(&requests[1]));

    // the Digest resend is part of the first attempt
    let attempts = log.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt, 1);
    assert_eq!(attempts[0].status, Some(200));
    assert!(attempts[0].digest);
    assert!(log.backoffs().is_empty());
    Ok(())
}

#[tokio::test]
async fn digest_put_hashes_the_put_method() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/time"))
        .respond_with(DigestDevice::new(RESPONSE_OK))
        .mount(&server)
        .await;

    let client = client_for(&server, true, fast_retry());
    let body = isapi_client::XmlDocument::parse(isapi_client::isapi_paths::SET_TIME_TEMPLATE)?;
    let response = client.set_time(&body, &CancellationToken::new()).await?;
    assert_eq!(response.root().child_text("statusString").as_deref(), Some("OK"));

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    // both sends carry the same body
    assert_eq!(requests[0].body, requests[1].body);
    Ok(())
}

#[tokio::test]
async fn wrong_password_surfaces_401_without_looping() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(DigestDevice::new(DEVICE_INFO))
        .mount(&server)
        .await;

    let client = isapi_client::IsapiClient::new(
        endpoint_for(&server),
        isapi_client::Credentials::new(USERNAME, "wrong"),
        options(true, fast_retry())
    )
    .expect("client");

    let err = client
        .device_info(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 401);
    assert_eq!(received_paths(&server).await.len(), 2);
}

#[tokio::test]
async fn basic_credentials_are_sent_eagerly() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    // admin:12345
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .and(header("authorization", "Basic YWRtaW46MTIzNDU="))
        .respond_with(ResponseTemplate::new(200).set_body_string(DEVICE_INFO))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, false, fast_retry());
    let info = client.device_info(&CancellationToken::new()).await?;
    assert_eq!(info.root().child_text("deviceName").as_deref(), Some("Lobby"));
    Ok(())
}

#[tokio::test]
async fn basic_only_challenge_flows_through_as_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", r#"Basic realm="cam""#)
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, true, fast_retry());
    let err = client
        .device_info(&CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        IsapiError::Protocol(protocol) => {
            assert_eq!(protocol.http_status, 401);
            assert_eq!(protocol.message, "401: Unauthorized");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn challenge_without_nonce_is_not_answered() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("WWW-Authenticate", r#"Digest realm="cam", qop="auth""#)
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, true, fast_retry());
    let err = client
        .device_info(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 401);
}
