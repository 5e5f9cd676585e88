//! ISAPI camera protocol client
//! Device time and daylight saving settings
//!
//! Firmware exposes DST in one of two shapes. The legacy schema has a flat
//! `dstMode` of `on`/`off`; the versioned schema has a `daylightSaving`
//! block with `enabled`, `startTime`, `endTime` and `offset`. Reading
//! accepts either; writing keeps whichever shape the document already uses.

use crate::xml_envelope::{ is_versioned_schema, XmlDocument };
use chrono::Utc;
use serde::{ Deserialize, Serialize };

pub const TIME_MODE_MANUAL: &str = "manual";
pub const TIME_MODE_NTP: &str = "NTP";

const DEFAULT_TIME_ZONE: &str = "UTC+00:00";

fn utc_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Time settings of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// `manual` or `NTP`
    pub time_mode: String,
    pub local_time: String,
    pub time_zone: String,
    pub dst_enabled: bool,
    /// e.g. `M3.5.0/02:00:00`
    pub dst_start: Option<String>,
    pub dst_end: Option<String>,
    pub dst_offset_minutes: Option<i32>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_mode: TIME_MODE_MANUAL.to_string(),
            local_time: utc_now(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            dst_enabled: false,
            dst_start: None,
            dst_end: None,
            dst_offset_minutes: None,
        }
    }
}

impl TimeConfig {
    pub fn is_ntp(&self) -> bool {
        self.time_mode.eq_ignore_ascii_case(TIME_MODE_NTP)
    }

    pub fn from_xml(doc: &XmlDocument) -> Self {
        let root = doc.root();
        let mut config = Self {
            time_mode: root.child_text("timeMode").unwrap_or_else(|| TIME_MODE_MANUAL.to_string()),
            local_time: root.child_text("localTime").unwrap_or_else(utc_now),
            time_zone: root.child_text("timeZone").unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string()),
            ..Self::default()
        };

        match root.child("daylightSaving") {
            Some(dst) => {
                config.dst_enabled = dst
                    .child_text("enabled")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                config.dst_start = dst.child_text("startTime");
                config.dst_end = dst.child_text("endTime");
                config.dst_offset_minutes = dst.child_text("offset").and_then(|v| v.trim().parse().ok());
            }
            None => {
                config.dst_enabled = root
                    .child_text("dstMode")
                    .map(|v| v.eq_ignore_ascii_case("on"))
                    .unwrap_or(false);
            }
        }

        config
    }

    /// Write these settings into a time document fetched from the device
    pub fn apply_to(&self, doc: &mut XmlDocument) {
        let root = doc.root_mut();
        root.set_or_add("timeMode", &self.time_mode);
        root.set_or_add("timeZone", &self.time_zone);

        let versioned = is_versioned_schema(root) || root.child("daylightSaving").is_some();
        if versioned {
            let dst = root.ensure("daylightSaving");
            dst.set_or_add("enabled", if self.dst_enabled { "true" } else { "false" });
            if self.dst_enabled {
                if let Some(start) = self.dst_start.as_deref().filter(|s| !s.trim().is_empty()) {
                    dst.set_or_add("startTime", start);
                }
                if let Some(end) = self.dst_end.as_deref().filter(|s| !s.trim().is_empty()) {
                    dst.set_or_add("endTime", end);
                }
                if let Some(offset) = self.dst_offset_minutes {
                    dst.set_or_add("offset", &offset.to_string());
                }
            } else {
                dst.remove_if_exists("startTime");
                dst.remove_if_exists("endTime");
                dst.remove_if_exists("offset");
            }
            root.remove_if_exists("dstMode");
        } else {
            root.set_or_add("dstMode", if self.dst_enabled { "on" } else { "off" });
            root.remove_if_exists("daylightSaving");
        }

        if self.is_ntp() {
            root.remove_if_exists("localTime");
        } else {
            root.set_or_add("localTime", &self.local_time);
        }
    }
}
