//! The three-shape network interface IP write.

mod common;

use common::*;
use isapi_client::{ CancellationToken, IpAddressConfig, IsapiError, XmlDocument };
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

const LOWER: &str = "/ISAPI/System/Network/interfaces/1/ipAddress";
const UPPER: &str = "/ISAPI/System/Network/interfaces/1/IPAddress";
const FULL: &str = "/ISAPI/System/Network/interfaces/1";

fn fragment() -> XmlDocument {
    IpAddressConfig::static_ipv4("10.0.0.5", "255.255.255.0", "10.0.0.1").to_fragment(None, &[])
}

async fn mount(server: &MockServer, verb: &str, route: &str, status: u16, body: &str) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn falls_back_to_full_interface_put() -> anyhow::Result<()> {
    init_logging();
    let server = MockServer::start().await;
    mount(&server, "PUT", LOWER, 404, "").await;
    mount(&server, "PUT", UPPER, 405, "").await;
    mount(&server, "GET", FULL, 200, NETWORK_INTERFACE).await;
    mount(&server, "PUT", FULL, 200, RESPONSE_OK).await;

    let client = client_for(&server, false, fast_retry());
    let response = client
        .set_network_interface_ip_address(1, &fragment(), &CancellationToken::new())
        .await?;
    assert_eq!(response.root().child_text("statusCode").as_deref(), Some("1"));

    assert_eq!(
        received_paths(&server).await,
        vec![
            ("PUT".to_string(), LOWER.to_string()),
            ("PUT".to_string(), UPPER.to_string()),
            ("GET".to_string(), FULL.to_string()),
            ("PUT".to_string(), FULL.to_string()),
        ]
    );

    let requests = server.received_requests().await.unwrap_or_default();
    let final_put = requests.last().expect("final put");
    let merged = XmlDocument::parse(std::str::from_utf8(&final_put.body)?)?;
    let root = merged.root();

    assert_eq!(root.name(), "NetworkInterface");
    assert_eq!(root.child_text("id").as_deref(), Some("1"));
    assert_eq!(root.children().filter(|c| c.name() == "IPAddress").count(), 1);
    // child() is namespace-scoped, so look the grafted element up by local name
    let ip = root
        .children()
        .find(|c| c.name() == "IPAddress")
        .expect("IPAddress");
    assert_eq!(ip.child_text("ipAddress").as_deref(), Some("10.0.0.5"));
    // the fragment keeps its own (empty) namespace inside the ver20 document
    assert_eq!(ip.namespace(), None);
    // untouched siblings survive the merge
    assert!(root.child("Link").is_some());
    Ok(())
}

#[tokio::test]
async fn uppercase_endpoint_accepts_after_lowercase_rejects() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount(&server, "PUT", LOWER, 415, "").await;
    mount(&server, "PUT", UPPER, 200, RESPONSE_OK).await;

    let client = client_for(&server, false, fast_retry());
    client
        .set_network_interface_ip_address(1, &fragment(), &CancellationToken::new())
        .await?;

    let paths: Vec<_> = received_paths(&server).await.into_iter().map(|(_, p)| p).collect();
    assert_eq!(paths, vec![LOWER.to_string(), UPPER.to_string()]);
    Ok(())
}

#[tokio::test]
async fn server_error_on_lowercase_stops_the_chain() {
    let server = MockServer::start().await;
    mount(&server, "PUT", LOWER, 500, "").await;

    let client = client_for(&server, false, fast_retry());
    let err = client
        .set_network_interface_ip_address(1, &fragment(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 500);
    assert!(matches!(err, IsapiError::Protocol(_)));
    // 500 is retried in place but never moves to another shape
    let paths = received_paths(&server).await;
    assert!(!paths.is_empty());
    assert!(paths.iter().all(|(verb, p)| verb == "PUT" && p == LOWER));
}

#[tokio::test]
async fn forbidden_on_uppercase_is_not_a_shape_rejection() {
    let server = MockServer::start().await;
    mount(&server, "PUT", LOWER, 404, "").await;
    mount(&server, "PUT", UPPER, 403, "").await;

    let client = client_for(&server, false, fast_retry());
    let err = client
        .set_network_interface_ip_address(1, &fragment(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 403);
    assert_eq!(received_paths(&server).await.len(), 2);
}

#[tokio::test]
async fn full_interface_failure_is_final() {
    let server = MockServer::start().await;
    mount(&server, "PUT", LOWER, 404, "").await;
    mount(&server, "PUT", UPPER, 404, "").await;
    mount(&server, "GET", FULL, 200, NETWORK_INTERFACE).await;
    mount(
        &server,
        "PUT",
        FULL,
        400,
        "<ResponseStatus><statusCode>6</statusCode><statusString>Invalid Content</statusString></ResponseStatus>"
    )
    .await;

    let client = client_for(&server, false, fast_retry());
    let err = client
        .set_network_interface_ip_address(1, &fragment(), &CancellationToken::new())
        .await
        .unwrap_err();

    let protocol = err.as_protocol().expect("protocol error");
    assert_eq!(protocol.http_status, 400);
    assert_eq!(protocol.message, "6: Invalid Content");
    assert_eq!(received_paths(&server).await.len(), 4);
}

#[tokio::test]
async fn apply_ip_address_config_uses_device_namespace() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount(&server, "GET", FULL, 200, NETWORK_INTERFACE).await;
    mount(&server, "PUT", LOWER, 200, RESPONSE_OK).await;

    let client = client_for(&server, false, fast_retry());
    let config = IpAddressConfig::static_ipv4("10.0.0.5", "255.255.255.0", "10.0.0.1");
    client
        .apply_ip_address_config(1, &config, &CancellationToken::new())
        .await?;

    let requests = server.received_requests().await.unwrap_or_default();
    let put = requests.last().expect("put");
    let body = XmlDocument::parse(std::str::from_utf8(&put.body)?)?;
    assert_eq!(body.root().name(), "IPAddress");
    assert!(body.is_versioned_schema());
    assert_eq!(body.root().attribute("version"), Some("2.0"));
    assert_eq!(body.root().child_text("ipAddress").as_deref(), Some("10.0.0.5"));
    Ok(())
}

#[tokio::test]
async fn invalid_config_sends_nothing() {
    let server = MockServer::start().await;

    let client = client_for(&server, false, fast_retry());
    let config = IpAddressConfig::static_ipv4("10.0.0.5", "255.0.255.0", "");
    let err = client
        .apply_ip_address_config(1, &config, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, IsapiError::InvalidNetworkConfig { .. }));
    assert_eq!(err.http_status(), 0);
    assert!(received_paths(&server).await.is_empty());
}
