//! ISAPI camera protocol client
//! IPv4 configuration of a network interface

use crate::isapi_error::IsapiError;
use crate::xml_envelope::{ XmlDocument, XmlElement };
use serde::{ Deserialize, Serialize };
use std::net::Ipv4Addr;

/// IP configuration for a network interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddressConfig {
    pub use_dhcp: bool,
    pub ipv4_address: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub primary_dns: String,
    pub secondary_dns: String,
}

impl IpAddressConfig {
    pub fn dhcp() -> Self {
        Self {
            use_dhcp: true,
            ..Self::default()
        }
    }

    pub fn static_ipv4(ip: &str, subnet: &str, gateway: &str) -> Self {
        Self {
            use_dhcp: false,
            ipv4_address: ip.to_string(),
            subnet_mask: subnet.to_string(),
            gateway: gateway.to_string(),
            ..Self::default()
        }
    }

    /// Read the `IPAddress` block of a full network interface document
    pub fn from_interface(doc: &XmlDocument) -> Self {
        let Some(ip) = doc.root().child("IPAddress") else {
            return Self::default();
        };
        let nested = |container: &str| {
            ip.child(container)
                .and_then(|c| c.child_text("ipAddress"))
                .unwrap_or_default()
        };

        Self {
            use_dhcp: ip
                .child_text("addressingType")
                .map(|t| t.eq_ignore_ascii_case("dhcp"))
                .unwrap_or(false),
            ipv4_address: ip.child_text("ipAddress").unwrap_or_default(),
            subnet_mask: ip.child_text("subnetMask").unwrap_or_default(),
            gateway: nested("DefaultGateway"),
            primary_dns: nested("PrimaryDNS"),
            secondary_dns: nested("SecondaryDNS"),
        }
    }

    /// Check a static configuration before it is sent to a device
    pub fn validate(&self) -> Result<(), IsapiError> {
        if self.use_dhcp {
            return Ok(());
        }

        if self.ipv4_address.is_empty() {
            return Err(IsapiError::InvalidNetworkConfig {
                message: "No IP address provided in configuration".to_string(),
            });
        }
        parse_ipv4(&self.ipv4_address, "IP address")?;
        subnet_mask_to_prefix_length(&self.subnet_mask)?;

        for (value, what) in [
            (&self.gateway, "gateway"),
            (&self.primary_dns, "primary DNS"),
            (&self.secondary_dns, "secondary DNS"),
        ] {
            if !value.is_empty() {
                parse_ipv4(value, what)?;
            }
        }

        Ok(())
    }

    /// Build an `IPAddress` fragment in `namespace`, carrying over `attributes`
    /// (for example `version="2.0"`) from the element it replaces.
    pub fn to_fragment(&self, namespace: Option<&str>, attributes: &[(String, String)]) -> XmlDocument {
        let mut ip = XmlElement::new("IPAddress", namespace);
        for (key, value) in attributes {
            ip.set_attribute(key, value);
        }

        ip.set_or_add("ipVersion", "v4");
        ip.set_or_add("addressingType", if self.use_dhcp { "dhcp" } else { "static" });

        if !self.use_dhcp {
            ip.set_or_add("ipAddress", &self.ipv4_address);
            ip.set_or_add("subnetMask", &self.subnet_mask);
            for (container, value) in [
                ("DefaultGateway", &self.gateway),
                ("PrimaryDNS", &self.primary_dns),
                ("SecondaryDNS", &self.secondary_dns),
            ] {
                if !value.is_empty() {
                    ip.ensure_path(container, "ipAddress", value);
                }
            }
        }

        XmlDocument::new(ip)
    }

    /// Fragment matching the namespace and `IPAddress` attributes of the
    /// interface document currently on the device
    pub fn fragment_for_interface(&self, current: &XmlDocument) -> XmlDocument {
        let attributes = current
            .root()
            .child("IPAddress")
            .map(|ip| ip.attributes().to_vec())
            .unwrap_or_default();
        self.to_fragment(current.namespace(), &attributes)
    }
}

fn parse_ipv4(value: &str, what: &str) -> Result<Ipv4Addr, IsapiError> {
    value.parse().map_err(|_| IsapiError::InvalidNetworkConfig {
        message: format!("Invalid {}: {}", what, value),
    })
}

/// Convert subnet mask to prefix length
pub fn subnet_mask_to_prefix_length(subnet_mask: &str) -> Result<u8, IsapiError> {
    let mask_addr = subnet_mask
        .parse::<Ipv4Addr>()
        .map_err(|_| IsapiError::InvalidNetworkConfig {
            message: format!("Invalid subnet mask format: {}", subnet_mask),
        })?;

    let mask_bits = u32::from(mask_addr);
    let prefix_len = mask_bits.leading_ones() as u8;

    let expected_mask = (0xffffffff_u32).checked_shl(32 - (prefix_len as u32)).unwrap_or(0);

    if mask_bits != expected_mask {
        return Err(IsapiError::InvalidNetworkConfig {
            message: format!("Invalid subnet mask: {}", subnet_mask),
        });
    }

    Ok(prefix_len)
}
