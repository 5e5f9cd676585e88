//! ISAPI camera protocol client
//! Device addressing and credentials

use base64::{ engine::general_purpose::STANDARD as BASE64, Engine };
use std::fmt;
use url::Url;

/// Default HTTP port for plain-text devices
pub const DEFAULT_HTTP_PORT: u16 = 80;
/// Default HTTPS port for TLS devices
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Protocol types for camera communication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => DEFAULT_HTTP_PORT,
            Protocol::Https => DEFAULT_HTTPS_PORT,
        }
    }
}

/// Where a device lives on the network. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    host: String,
    port: u16,
    protocol: Protocol,
}

impl DeviceEndpoint {
    /// Create an endpoint; a missing port falls back to the scheme default.
    pub fn new(host: &str, port: Option<u16>, use_tls: bool) -> Self {
        let protocol = if use_tls { Protocol::Https } else { Protocol::Http };
        Self {
            host: host.trim().to_string(),
            port: port.unwrap_or_else(|| protocol.default_port()),
            protocol,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn use_tls(&self) -> bool {
        self.protocol == Protocol::Https
    }

    /// Build the absolute URL for a resource path.
    ///
    /// The path does not need a leading `/`. Query strings are not part of
    /// this protocol family and are passed through untouched.
    pub fn build(&self, resource_path: &str) -> Result<Url, url::ParseError> {
        let path = if resource_path.starts_with('/') {
            resource_path.to_string()
        } else {
            format!("/{}", resource_path)
        };
        Url::parse(&format!("{}{}", self.base_url(), path))
    }

    fn url_host(&self) -> String {
        // IPv6 literals need brackets inside an authority
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.url_host(), self.port)
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Username/password pair for a device
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `Authorization` header value for eager Basic auth
    pub fn basic_authorization(&self) -> String {
        let token = BASE64.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
