//! ISAPI camera protocol client
//! Resource operations against one device
//!
//! Every operation is one logical request: a fresh correlation id, up to
//! [`RetryPolicy::max_attempts`] HTTP attempts, and a non-2xx answer turned
//! into a [`ProtocolError`]. The only operation that issues more than one
//! logical request is the IP address write, which walks [`IP_WRITE_CHAIN`].

use crate::client_config::ClientOptions;
use crate::device_endpoint::{ Credentials, DeviceEndpoint };
use crate::isapi_error::{ IsapiError, ProtocolError };
use crate::isapi_paths::{ self, JPEG_MEDIA_TYPE, REBOOT_TEMPLATE, XML_MEDIA_TYPE };
use crate::ip_address_config::IpAddressConfig;
use crate::ntp_servers::NtpServer;
use crate::request_executor::{ HttpExchange, RequestExecutor, RequestSpec };
use crate::request_log::{ new_correlation_id, LogRequestLog, RequestContext, RequestLog };
use crate::retry_policy::RetryPolicy;
use crate::time_config::TimeConfig;
use crate::video_settings::VideoSettings;
use crate::xml_envelope::XmlDocument;
use log::{ debug, info, warn };
use reqwest::Method;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One way of writing an interface's IP configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpWriteStep {
    /// PUT the fragment to `.../interfaces/{id}/ipAddress`
    LowercaseEndpoint,
    /// PUT the fragment to `.../interfaces/{id}/IPAddress`
    UppercaseEndpoint,
    /// GET the whole interface, graft the fragment in, PUT it back
    FullInterface,
}

/// Decides whether a failed step hands over to the next one
pub type FallbackPredicate = fn(&IsapiError) -> bool;

/// Ordered IP write strategies. A step's failure moves on to the next step
/// only if its predicate accepts the error.
pub const IP_WRITE_CHAIN: [(IpWriteStep, FallbackPredicate); 3] = [
    (IpWriteStep::LowercaseEndpoint, is_endpoint_shape_rejection),
    (IpWriteStep::UppercaseEndpoint, is_endpoint_shape_rejection),
    (IpWriteStep::FullInterface, is_never_recoverable),
];

/// Statuses meaning the firmware does not expose or accept this endpoint
/// name or payload shape
pub fn is_endpoint_shape_rejection(err: &IsapiError) -> bool {
    matches!(err.as_protocol().map(|p| p.http_status), Some(400 | 404 | 405 | 415 | 501))
}

fn is_never_recoverable(_err: &IsapiError) -> bool {
    false
}

/// Client for one ISAPI device
#[derive(Clone)]
pub struct IsapiClient {
    executor: RequestExecutor,
    retry: RetryPolicy,
    log: Arc<dyn RequestLog>,
}

impl fmt::Debug for IsapiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsapiClient")
            .field("endpoint", self.executor.endpoint())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl IsapiClient {
    pub fn new(
        endpoint: DeviceEndpoint,
        credentials: Credentials,
        options: ClientOptions
    ) -> Result<Self, IsapiError> {
        info!(
            "Creating ISAPI client for {} (digest preferred: {}, self-signed allowed: {})",
            endpoint,
            options.prefer_digest,
            options.allow_self_signed
        );
        let executor = RequestExecutor::new(endpoint, credentials, &options)?;

        Ok(Self {
            executor,
            retry: options.retry,
            log: Arc::new(LogRequestLog),
        })
    }

    /// Replace the sink that receives per-attempt records
    pub fn with_request_log(mut self, log: Arc<dyn RequestLog>) -> Self {
        self.log = log;
        self
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        self.executor.endpoint()
    }

    // ---- generic verbs ----

    pub async fn get_xml(&self, path: &str, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        let spec = RequestSpec {
            method: Method::GET,
            path,
            body: None,
            accept: Some(XML_MEDIA_TYPE),
        };
        let exchange = self.send(&spec, cancel).await?;
        parse_xml_body(&exchange)
    }

    /// PUT `document` and return the device's answer (usually a `ResponseStatus`)
    pub async fn put_xml(
        &self,
        path: &str,
        document: &XmlDocument,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        let body = document.to_xml_string();
        let spec = RequestSpec {
            method: Method::PUT,
            path,
            body: Some(&body),
            accept: Some(XML_MEDIA_TYPE),
        };
        let exchange = self.send(&spec, cancel).await?;
        parse_xml_body(&exchange)
    }

    pub async fn get_bytes(
        &self,
        path: &str,
        accept: &str,
        cancel: &CancellationToken
    ) -> Result<Vec<u8>, IsapiError> {
        let spec = RequestSpec {
            method: Method::GET,
            path,
            body: None,
            accept: Some(accept),
        };
        let exchange = self.send(&spec, cancel).await?;
        Ok(exchange.body)
    }

    async fn send(&self, spec: &RequestSpec<'_>, cancel: &CancellationToken) -> Result<HttpExchange, IsapiError> {
        let correlation_id = new_correlation_id();
        let context = RequestContext {
            host: self.executor.endpoint().host(),
            method: &spec.method,
            path: spec.path,
            correlation_id: &correlation_id,
        };
        let log = self.log.as_ref();
        let executor = &self.executor;
        let context_ref = &context;

        self.retry.run(context_ref, log, cancel, move |attempt| async move {
            let exchange = executor.execute(spec, context_ref, attempt, log, cancel).await?;
            if exchange.is_success() {
                Ok(exchange)
            } else {
                Err(
                    IsapiError::Protocol(
                        ProtocolError::from_response(exchange.status, &exchange.reason, &exchange.text())
                    )
                )
            }
        }).await
    }

    // ---- system ----

    pub async fn device_info(&self, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        self.get_xml(isapi_paths::SYSTEM_DEVICE_INFO, cancel).await
    }

    pub async fn time(&self, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        self.get_xml(isapi_paths::SYSTEM_TIME, cancel).await
    }

    pub async fn time_capabilities(&self, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        self.get_xml(isapi_paths::SYSTEM_TIME_CAPABILITIES, cancel).await
    }

    pub async fn set_time(
        &self,
        document: &XmlDocument,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        self.put_xml(isapi_paths::SYSTEM_TIME, document, cancel).await
    }

    pub async fn ntp_servers(&self, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        self.get_xml(isapi_paths::SYSTEM_TIME_NTP_SERVERS, cancel).await
    }

    pub async fn set_ntp_servers(
        &self,
        document: &XmlDocument,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        self.put_xml(isapi_paths::SYSTEM_TIME_NTP_SERVERS, document, cancel).await
    }

    pub async fn reboot(&self, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        let body = XmlDocument::parse(REBOOT_TEMPLATE)?;
        info!("Rebooting device {}", self.endpoint());
        self.put_xml(isapi_paths::SYSTEM_REBOOT, &body, cancel).await
    }

    // ---- network ----

    pub async fn network_interface(
        &self,
        interface_id: u32,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        self.get_xml(&isapi_paths::network_interface(interface_id), cancel).await
    }

    /// Write an `IPAddress` fragment to an interface, trying each shape in
    /// [`IP_WRITE_CHAIN`] until one is accepted.
    pub async fn set_network_interface_ip_address(
        &self,
        interface_id: u32,
        fragment: &XmlDocument,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        let mut last_error = None;

        for (step, recoverable) in IP_WRITE_CHAIN {
            match self.run_ip_write_step(step, interface_id, fragment, cancel).await {
                Ok(response) => {
                    debug!("[{}] IP address written using {:?}", self.endpoint().host(), step);
                    return Ok(response);
                }
                Err(err) if recoverable(&err) => {
                    warn!(
                        "[{}] IP address write via {:?} rejected ({}), trying next shape",
                        self.endpoint().host(),
                        step,
                        err
                    );
                    last_error = Some(err);
                }
                Err(err) => {
                    return Err(err);
                }
            }
        }

        Err(
            last_error.unwrap_or_else(|| {
                IsapiError::Protocol(ProtocolError::new(0, "no IP address write shape left", ""))
            })
        )
    }

    async fn run_ip_write_step(
        &self,
        step: IpWriteStep,
        interface_id: u32,
        fragment: &XmlDocument,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        match step {
            IpWriteStep::LowercaseEndpoint => {
                let path = isapi_paths::network_interface_ip_address_lower(interface_id);
                self.put_xml(&path, fragment, cancel).await
            }
            IpWriteStep::UppercaseEndpoint => {
                let path = isapi_paths::network_interface_ip_address_upper(interface_id);
                self.put_xml(&path, fragment, cancel).await
            }
            IpWriteStep::FullInterface => {
                let path = isapi_paths::network_interface(interface_id);
                let mut interface = self.get_xml(&path, cancel).await?;

                let root = interface.root_mut();
                root.set_or_add("id", &interface_id.to_string());
                root.remove_if_exists("IPAddress");
                root.push_child(fragment.root().clone());

                self.put_xml(&path, &interface, cancel).await
            }
        }
    }

    // ---- streaming ----

    pub async fn streaming_channels(&self, cancel: &CancellationToken) -> Result<XmlDocument, IsapiError> {
        self.get_xml(isapi_paths::STREAMING_CHANNELS, cancel).await
    }

    pub async fn streaming_channel(
        &self,
        channel_id: u32,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        self.get_xml(&isapi_paths::streaming_channel(channel_id), cancel).await
    }

    pub async fn set_streaming_channel(
        &self,
        channel_id: u32,
        document: &XmlDocument,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        self.put_xml(&isapi_paths::streaming_channel(channel_id), document, cancel).await
    }

    /// JPEG snapshot of a channel
    pub async fn snapshot(&self, channel_id: u32, cancel: &CancellationToken) -> Result<Vec<u8>, IsapiError> {
        self.get_bytes(&isapi_paths::streaming_channel_picture(channel_id), JPEG_MEDIA_TYPE, cancel).await
    }

    // ---- read-modify-write helpers ----

    pub async fn time_config(&self, cancel: &CancellationToken) -> Result<TimeConfig, IsapiError> {
        Ok(TimeConfig::from_xml(&self.time(cancel).await?))
    }

    pub async fn apply_time_config(
        &self,
        config: &TimeConfig,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        let mut document = self.time(cancel).await?;
        config.apply_to(&mut document);
        self.set_time(&document, cancel).await
    }

    pub async fn primary_ntp_server(&self, cancel: &CancellationToken) -> Result<NtpServer, IsapiError> {
        Ok(NtpServer::read_first(&self.ntp_servers(cancel).await?))
    }

    pub async fn set_primary_ntp_server(
        &self,
        server: &NtpServer,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        let mut document = self.ntp_servers(cancel).await?;
        server.write_first(&mut document);
        self.set_ntp_servers(&document, cancel).await
    }

    pub async fn ip_address_config(
        &self,
        interface_id: u32,
        cancel: &CancellationToken
    ) -> Result<IpAddressConfig, IsapiError> {
        Ok(IpAddressConfig::from_interface(&self.network_interface(interface_id, cancel).await?))
    }

    /// Validate `config`, then write it using the namespace and `IPAddress`
    /// attributes of the interface currently on the device
    pub async fn apply_ip_address_config(
        &self,
        interface_id: u32,
        config: &IpAddressConfig,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        config.validate()?;

        info!(
            "[{}] Setting interface {} to {}",
            self.endpoint().host(),
            interface_id,
            if config.use_dhcp { "DHCP".to_string() } else { config.ipv4_address.clone() }
        );

        let current = self.network_interface(interface_id, cancel).await?;
        let fragment = config.fragment_for_interface(&current);
        self.set_network_interface_ip_address(interface_id, &fragment, cancel).await
    }

    pub async fn video_settings(
        &self,
        channel_id: u32,
        cancel: &CancellationToken
    ) -> Result<VideoSettings, IsapiError> {
        Ok(VideoSettings::from_channel(&self.streaming_channel(channel_id, cancel).await?))
    }

    pub async fn apply_video_settings(
        &self,
        channel_id: u32,
        settings: &VideoSettings,
        cancel: &CancellationToken
    ) -> Result<XmlDocument, IsapiError> {
        let mut document = self.streaming_channel(channel_id, cancel).await?;
        settings.apply_to(&mut document);
        self.set_streaming_channel(channel_id, &document, cancel).await
    }
}

/// Empty 2xx bodies become `<Response/>`
fn parse_xml_body(exchange: &HttpExchange) -> Result<XmlDocument, IsapiError> {
    let text = exchange.text();
    if text.trim().is_empty() {
        return Ok(XmlDocument::empty_response());
    }
    Ok(XmlDocument::parse(&text)?)
}
