//! ISAPI camera protocol client
//! Client options and device profiles
//!
//! A [`DeviceProfile`] is the serialized form of one configured device, as it
//! would appear in a JSON inventory file. It expands into the endpoint,
//! credentials and [`ClientOptions`] a client is built from.

use crate::device_endpoint::{ Credentials, DeviceEndpoint };
use crate::isapi_client::IsapiClient;
use crate::isapi_error::IsapiError;
use crate::retry_policy::RetryPolicy;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

/// Default overall request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// Default TCP/TLS connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Idle pooled connections are dropped after this long
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport and authentication settings for one client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Wait for a Digest challenge instead of sending Basic credentials
    pub prefer_digest: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Accept self-signed device certificates
    pub allow_self_signed: bool,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            prefer_digest: true,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            allow_self_signed: true,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: 3,
            user_agent: concat!("isapi-client/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_use_tls() -> bool {
    true
}

/// One configured device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub prefer_digest: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub allow_self_signed: Option<bool>,
}

impl DeviceProfile {
    pub fn from_json_str(json: &str) -> Result<Self, IsapiError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a JSON array of profiles
    pub fn list_from_json_str(json: &str) -> Result<Vec<Self>, IsapiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint::new(&self.host, self.port, self.use_tls)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Options with this profile's overrides applied to the defaults
    pub fn options(&self) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            prefer_digest: self.prefer_digest.unwrap_or(defaults.prefer_digest),
            timeout: self.timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            allow_self_signed: self.allow_self_signed.unwrap_or(defaults.allow_self_signed),
            ..defaults
        }
    }

    /// Build a client for this device
    pub fn connect(&self) -> Result<IsapiClient, IsapiError> {
        IsapiClient::new(self.endpoint(), self.credentials(), self.options())
    }
}
