//! ISAPI camera protocol client
//! Error types

use crate::retry_policy::{ is_transient_status, is_transient_transport };
use crate::xml_envelope::{ XmlDocument, XmlError };
use thiserror::Error;

/// A failed exchange with the device.
///
/// `http_status` is 0 when no response was ever obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("HTTP {http_status}: {message}")]
pub struct ProtocolError {
    pub http_status: u16,
    pub message: String,
    pub raw_body: String,
}

impl ProtocolError {
    pub fn new(http_status: u16, message: impl Into<String>, raw_body: impl Into<String>) -> Self {
        Self {
            http_status,
            message: message.into(),
            raw_body: raw_body.into(),
        }
    }

    /// Build from a non-2xx response.
    ///
    /// Devices usually answer with a `ResponseStatus` document; its
    /// `statusCode` and `statusString`/`message` leaves make up the message.
    /// A body that is not XML is reported with the bare reason phrase.
    pub fn from_response(http_status: u16, reason: &str, body: &str) -> Self {
        let mut code = http_status.to_string();
        let mut message = reason.to_string();

        if !body.trim().is_empty() {
            let doc = match XmlDocument::parse(body) {
                Ok(doc) => doc,
                Err(_) => {
                    return Self::new(http_status, reason, body);
                }
            };
            let root = doc.root();
            if let Some(status_code) = root.find_descendant_ignore_case("statusCode") {
                code = status_code.text();
            }
            if
                let Some(status_string) = root
                    .find_descendant_ignore_case("statusString")
                    .or_else(|| root.find_descendant_ignore_case("message"))
            {
                message = status_string.text();
            }
        }

        Self::new(http_status, format!("{}: {}", code, message), body)
    }

    /// Terminal error once the attempt budget is spent without a response
    pub fn exhausted(cause: impl std::fmt::Display) -> Self {
        Self::new(0, format!("exhausted retries: {}", cause), String::new())
    }
}

/// Custom error types for ISAPI client operations
#[derive(Error, Debug)]
pub enum IsapiError {
    #[error(transparent)] Protocol(#[from] ProtocolError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Request error: {0}")] Request(#[from] reqwest::Error),

    #[error("XML error: {0}")] Xml(#[from] XmlError),

    #[error("URL parse error: {0}")] UrlParse(#[from] url::ParseError),

    #[error("Invalid network configuration: {message}")] InvalidNetworkConfig {
        message: String,
    },

    #[error("Configuration error: {0}")] Config(#[from] serde_json::Error),
}

impl IsapiError {
    /// HTTP status behind the error, 0 if no response was obtained
    pub fn http_status(&self) -> u16 {
        match self {
            IsapiError::Protocol(err) => err.http_status,
            _ => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IsapiError::Cancelled)
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            IsapiError::Protocol(err) => is_transient_status(err.http_status),
            IsapiError::Request(err) => is_transient_transport(err),
            _ => false,
        }
    }

    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            IsapiError::Protocol(err) => Some(err),
            _ => None,
        }
    }
}
