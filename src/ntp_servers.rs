//! ISAPI camera protocol client
//! NTP server list

use crate::xml_envelope::{ XmlDocument, XmlElement };
use serde::{ Deserialize, Serialize };

/// One NTP server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtpServer {
    pub id: String,
    pub host_name: String,
    pub port: u16,
    pub sync_interval_minutes: u32,
    pub enabled: bool,
}

impl Default for NtpServer {
    fn default() -> Self {
        Self {
            id: "1".to_string(),
            host_name: "pool.ntp.org".to_string(),
            port: 123,
            sync_interval_minutes: 60,
            enabled: true,
        }
    }
}

// Firmware places the first server directly under the root, or inside an
// NTPServers / NTPServerList wrapper.
fn first_server(root: &XmlElement) -> Option<&XmlElement> {
    root.child("NTPServer")
        .or_else(|| root.child("NTPServers").and_then(|list| list.child("NTPServer")))
        .or_else(|| root.child("NTPServerList").and_then(|list| list.child("NTPServer")))
}

fn first_server_mut(root: &mut XmlElement) -> &mut XmlElement {
    if root.child("NTPServer").is_some() {
        return root.ensure("NTPServer");
    }
    for wrapper in ["NTPServers", "NTPServerList"] {
        let has_server = root
            .child(wrapper)
            .map(|list| list.child("NTPServer").is_some())
            .unwrap_or(false);
        if has_server {
            return root.ensure(wrapper).ensure("NTPServer");
        }
    }
    if root.name() == "NTPServerList" {
        root.ensure("NTPServer")
    } else {
        root.ensure("NTPServerList").ensure("NTPServer")
    }
}

impl NtpServer {
    /// First server in the document, defaults where absent
    pub fn read_first(doc: &XmlDocument) -> Self {
        let mut server = Self::default();
        let Some(element) = first_server(doc.root()) else {
            return server;
        };

        server.id = element.child_text("id").unwrap_or_else(|| "1".to_string());
        if
            let Some(host) = element
                .child_text("hostName")
                .or_else(|| element.child_text("ipV4Address"))
                .or_else(|| element.child_text("ipAddress"))
        {
            server.host_name = host;
        }
        if let Some(port) = element.child_text("portNo").and_then(|v| v.trim().parse().ok()) {
            server.port = port;
        }
        if
            let Some(interval) = element
                .child_text("synchronizeInterval")
                .and_then(|v| v.trim().parse().ok())
        {
            server.sync_interval_minutes = interval;
        }
        server.enabled = element
            .child_text("enabled")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        server
    }

    /// Overwrite the first server entry, creating it if the list is empty
    pub fn write_first(&self, doc: &mut XmlDocument) {
        let element = first_server_mut(doc.root_mut());

        if element.child("id").is_none() {
            element.set_or_add("id", if self.id.is_empty() { "1" } else { &self.id });
        }
        element.set_or_add("addressingFormatType", "domain");
        element.set_or_add("hostName", &self.host_name);
        element.set_or_add("portNo", &self.port.to_string());
        element.set_or_add("synchronizeInterval", &self.sync_interval_minutes.to_string());
        element.set_or_add("enabled", if self.enabled { "true" } else { "false" });
    }
}
