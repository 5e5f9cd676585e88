//! Shared fixtures for the mock-device integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use isapi_client::digest_auth::parse_auth_params;
use isapi_client::{
    AttemptRecord,
    ClientOptions,
    Credentials,
    DeviceEndpoint,
    IsapiClient,
    RequestContext,
    RequestLog,
    RetryPolicy,
};
use tokio_util::sync::CancellationToken;
use wiremock::{ MockServer, Request, Respond, ResponseTemplate };

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "12345";
pub const REALM: &str = "IP Camera(C1234)";
pub const NONCE: &str = "4e6a4d304d6a51314d7a49364f475a6a4e6a6b344f54413d";
pub const OPAQUE: &str = "799d5";

pub const DEVICE_INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DeviceInfo version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<deviceName>Lobby</deviceName>
<model>DS-2CD2143G2-I</model>
<serialNumber>DS-2CD2143G2-I20240101AAWRJ00000001</serialNumber>
<firmwareVersion>V5.7.3</firmwareVersion>
</DeviceInfo>"#;

pub const NETWORK_INTERFACE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<NetworkInterface version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<id>1</id>
<IPAddress version="2.0">
<ipVersion>dual</ipVersion>
<addressingType>static</addressingType>
<ipAddress>192.168.1.64</ipAddress>
<subnetMask>255.255.255.0</subnetMask>
<DefaultGateway><ipAddress>192.168.1.1</ipAddress></DefaultGateway>
</IPAddress>
<Link><MACAddress>bc:ad:28:00:00:01</MACAddress></Link>
</NetworkInterface>"#;

pub const RESPONSE_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ResponseStatus version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<requestURL>/ISAPI</requestURL>
<statusCode>1</statusCode>
<statusString>OK</statusString>
</ResponseStatus>"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(
        3,
        Duration::from_millis(10),
        Duration::from_millis(40),
        Duration::from_millis(5)
    )
}

pub fn options(prefer_digest: bool, retry: RetryPolicy) -> ClientOptions {
    ClientOptions {
        prefer_digest,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry,
        ..ClientOptions::default()
    }
}

pub fn endpoint_for(server: &MockServer) -> DeviceEndpoint {
    let address = server.address();
    DeviceEndpoint::new(&address.ip().to_string(), Some(address.port()), false)
}

pub fn client_for(server: &MockServer, prefer_digest: bool, retry: RetryPolicy) -> IsapiClient {
    IsapiClient::new(
        endpoint_for(server),
        Credentials::new(USERNAME, PASSWORD),
        options(prefer_digest, retry)
    )
    .expect("client")
}

pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

pub fn digest_challenge_header() -> String {
    format!(
        r#"Digest qop="auth,auth-int", realm="{}", nonce="{}", opaque="{}", stale="FALSE""#,
        REALM, NONCE, OPAQUE
    )
}

/// Answers 401 with a Digest challenge until it sees a correct Digest
/// `Authorization` header, then serves `body`.
pub struct DigestDevice {
    pub body: String,
}

impl DigestDevice {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }

    fn challenge(&self) -> ResponseTemplate {
        ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge_header())
    }
}

pub fn verify_digest(request: &Request) -> bool {
    let Some(header) = request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(params) = header.strip_prefix("Digest ") else {
        return false;
    };
    let params = parse_auth_params(params);
    let get = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    };

    let uri = get("uri");
    if uri != request.url.path() || get("nonce") != NONCE || get("opaque") != OPAQUE {
        return false;
    }

    let ha1 = md5_hex(&format!("{}:{}:{}", get("username"), REALM, PASSWORD));
    let ha2 = md5_hex(&format!("{}:{}", request.method.as_str(), uri));
    let expected = md5_hex(&format!(
        "{}:{}:{}:{}:{}:{}",
        ha1,
        NONCE,
        get("nc"),
        get("cnonce"),
        get("qop"),
        ha2
    ));

    get("username") == USERNAME && get("qop") == "auth" && get("response") == expected
}

impl Respond for DigestDevice {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if verify_digest(request) {
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(self.body.clone())
        } else {
            self.challenge()
        }
    }
}

/// Captures what the client reports through its logging port
#[derive(Default)]
pub struct RecordingLog {
    pub attempts: Mutex<Vec<AttemptRecord>>,
    pub backoffs: Mutex<Vec<(u32, Duration)>>,
    pub cancel_on_backoff: Option<CancellationToken>,
}

impl RecordingLog {
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_backoff: Some(token),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn backoffs(&self) -> Vec<(u32, Duration)> {
        self.backoffs.lock().unwrap().clone()
    }
}

impl RequestLog for RecordingLog {
    fn attempt_finished(&self, _context: &RequestContext<'_>, record: &AttemptRecord) {
        self.attempts.lock().unwrap().push(record.clone());
    }

    fn backoff_scheduled(
        &self,
        _context: &RequestContext<'_>,
        attempt: u32,
        delay: Duration,
        _reason: &str
    ) {
        self.backoffs.lock().unwrap().push((attempt, delay));
        if let Some(token) = &self.cancel_on_backoff {
            token.cancel();
        }
    }
}

/// Paths of every request the mock server has seen, in order
pub async fn received_paths(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| (r.method.to_string(), r.url.path().to_string()))
        .collect()
}
