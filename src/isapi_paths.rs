//! ISAPI camera protocol client
//! Resource paths, media types and XML body templates

// System
pub const SYSTEM_DEVICE_INFO: &str = "/ISAPI/System/deviceInfo";
pub const SYSTEM_TIME: &str = "/ISAPI/System/time";
pub const SYSTEM_TIME_CAPABILITIES: &str = "/ISAPI/System/time/capabilities";
pub const SYSTEM_TIME_NTP_SERVERS: &str = "/ISAPI/System/time/ntpServers";
pub const SYSTEM_REBOOT: &str = "/ISAPI/System/reboot";

// Streaming
pub const STREAMING_CHANNELS: &str = "/ISAPI/Streaming/channels";

// Media types
pub const XML_MEDIA_TYPE: &str = "application/xml";
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

pub fn network_interface(id: u32) -> String {
    format!("/ISAPI/System/Network/interfaces/{}", id)
}

/// IP sub-resource, lowercase spelling
pub fn network_interface_ip_address_lower(id: u32) -> String {
    format!("/ISAPI/System/Network/interfaces/{}/ipAddress", id)
}

/// IP sub-resource, uppercase spelling
pub fn network_interface_ip_address_upper(id: u32) -> String {
    format!("/ISAPI/System/Network/interfaces/{}/IPAddress", id)
}

pub fn streaming_channel(channel_id: u32) -> String {
    format!("/ISAPI/Streaming/channels/{}", channel_id)
}

pub fn streaming_channel_picture(channel_id: u32) -> String {
    format!("/ISAPI/Streaming/channels/{}/picture", channel_id)
}

pub const SET_TIME_TEMPLATE: &str =
    r#"<Time>
    <timeMode>manual</timeMode>
    <localTime>2025-01-01T12:00:00Z</localTime>
    <timeZone>UTC+00:00</timeZone>
    <dstMode>off</dstMode>
</Time>"#;

pub const SET_TIME_NTP_TEMPLATE: &str =
    r#"<Time>
    <timeMode>NTP</timeMode>
    <timeZone>UTC+00:00</timeZone>
    <dstMode>off</dstMode>
</Time>"#;

pub const NTP_SERVERS_TEMPLATE: &str =
    r#"<NTPServerList>
    <NTPServer>
        <id>1</id>
        <addressingFormatType>domain</addressingFormatType>
        <hostName>pool.ntp.org</hostName>
        <portNo>123</portNo>
        <synchronizeInterval>60</synchronizeInterval>
        <enabled>true</enabled>
    </NTPServer>
</NTPServerList>"#;

pub const REBOOT_TEMPLATE: &str = r#"<reboot>
    <reason>Manual</reason>
</reboot>"#;

pub fn network_interface_template(id: u32) -> String {
    format!(
        r#"<NetworkInterface>
    <id>{}</id>
    <IPAddress>
        <ipVersion>v4</ipVersion>
        <addressingType>static</addressingType>
        <ipAddress>192.168.1.64</ipAddress>
        <subnetMask>255.255.255.0</subnetMask>
        <DefaultGateway>
            <ipAddress>192.168.1.1</ipAddress>
        </DefaultGateway>
        <PrimaryDNS>
            <ipAddress>8.8.8.8</ipAddress>
        </PrimaryDNS>
        <SecondaryDNS>
            <ipAddress>8.8.4.4</ipAddress>
        </SecondaryDNS>
    </IPAddress>
</NetworkInterface>"#,
        id
    )
}
