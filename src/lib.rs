//! ISAPI camera protocol client
//!
//! Talks to IP cameras over the ISAPI HTTP/XML device-management protocol:
//! Basic or Digest authentication, retry of transient failures with
//! backoff, namespace-aware XML documents in either schema generation, and
//! the multi-shape fallback used to write a network interface's address.

pub mod client_config;
pub mod device_endpoint;
pub mod digest_auth;
pub mod ip_address_config;
pub mod isapi_client;
pub mod isapi_error;
pub mod isapi_paths;
pub mod ntp_servers;
pub mod request_executor;
pub mod request_log;
pub mod retry_policy;
pub mod time_config;
pub mod video_settings;
pub mod xml_envelope;

pub use client_config::{ ClientOptions, DeviceProfile };
pub use device_endpoint::{ Credentials, DeviceEndpoint, Protocol };
pub use digest_auth::DigestChallenge;
pub use ip_address_config::IpAddressConfig;
pub use isapi_client::{ IpWriteStep, IsapiClient };
pub use isapi_error::{ IsapiError, ProtocolError };
pub use ntp_servers::NtpServer;
pub use request_log::{ AttemptRecord, LogRequestLog, NoopRequestLog, RequestContext, RequestLog };
pub use retry_policy::RetryPolicy;
pub use time_config::TimeConfig;
pub use video_settings::VideoSettings;
pub use xml_envelope::{ XmlDocument, XmlElement, XmlError };
pub use tokio_util::sync::CancellationToken;
