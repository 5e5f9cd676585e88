//! ISAPI camera protocol client
//! Video encoding parameters of a streaming channel

use crate::xml_envelope::{ XmlDocument, XmlElement };
use serde::{ Deserialize, Serialize };

/// Encoder settings from a channel's `Video` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub codec: String,
    /// `CBR` or `VBR`
    pub bitrate_type: String,
    pub max_frame_rate: u32,
    pub constant_bit_rate: u32,
    pub vbr_upper_cap: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: "H.264".to_string(),
            bitrate_type: "VBR".to_string(),
            max_frame_rate: 25,
            constant_bit_rate: 2048,
            vbr_upper_cap: 4096,
        }
    }
}

impl VideoSettings {
    pub fn is_cbr(&self) -> bool {
        self.bitrate_type.eq_ignore_ascii_case("CBR")
    }

    /// Read from a streaming channel document; absent fields keep defaults
    pub fn from_channel(doc: &XmlDocument) -> Self {
        let mut settings = Self::default();
        let root = doc.root();
        let Some(video) = root.child("Video").or_else(|| root.find_descendant("Video")) else {
            return settings;
        };

        let number = |name: &str| video.child_text(name).and_then(|v| v.trim().parse::<u32>().ok());

        if let Some(codec) = video.child_text("videoCodecType") {
            settings.codec = codec;
        }
        if let Some(bitrate_type) = video.child_text("bitrateType") {
            settings.bitrate_type = bitrate_type;
        }
        if let Some(fps) = number("maxFrameRate") {
            settings.max_frame_rate = fps;
        }
        if let Some(cbr) = number("constantBitRate") {
            settings.constant_bit_rate = cbr;
        }
        if let Some(cap) = number("vbrUpperCap") {
            settings.vbr_upper_cap = cap;
        }

        settings
    }

    /// Patch the `Video` element of a channel document, creating it if needed
    pub fn apply_to(&self, doc: &mut XmlDocument) {
        let root = doc.root_mut();
        let video: &mut XmlElement = if root.child("Video").is_some() {
            root.ensure("Video")
        } else if root.find_descendant("Video").is_some() {
            match root.find_descendant_mut("Video") {
                Some(video) => video,
                None => {
                    return;
                }
            }
        } else {
            root.ensure("Video")
        };

        video.set_or_add("videoCodecType", &self.codec);
        video.set_or_add("bitrateType", &self.bitrate_type);
        video.set_or_add("maxFrameRate", &self.max_frame_rate.to_string());

        if self.is_cbr() {
            video.set_or_add("constantBitRate", &self.constant_bit_rate.to_string());
        } else {
            video.set_or_add("vbrUpperCap", &self.vbr_upper_cap.to_string());
        }
    }

    /// Minimal channel document for when nothing was fetched
    pub fn new_channel_document(&self, channel_id: u32) -> XmlDocument {
        let mut root = XmlElement::new("StreamingChannel", None);
        root.set_or_add("id", &channel_id.to_string());
        root.ensure("Video");
        let mut doc = XmlDocument::new(root);
        self.apply_to(&mut doc);
        doc
    }
}
