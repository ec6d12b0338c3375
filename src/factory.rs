//! Factory Descriptor
//!
//! Static description of this plug-in extension that a host queries before
//! creating any document controller. Built once per process.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::model::TransformationFlags;

/// Content types the plug-in can analyze on the host's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Notes,
    TempoEntries,
    BarSignatures,
    StaticTuning,
    DynamicTuningOffsets,
    KeySignatures,
    SheetChords,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Notes,
        ContentType::TempoEntries,
        ContentType::BarSignatures,
        ContentType::StaticTuning,
        ContentType::DynamicTuningOffsets,
        ContentType::KeySignatures,
        ContentType::SheetChords,
    ];

    /// Select content types from a bit mask, bit `i` enabling `ALL[i]`
    pub fn from_mask(mask: u32) -> Vec<ContentType> {
        Self::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, t)| *t)
            .collect()
    }
}

/// Identity and capabilities reported to the host
#[derive(Debug, Clone, Serialize)]
pub struct FactoryDescriptor {
    pub factory_id: String,
    pub plugin_name: String,
    pub manufacturer: String,
    pub website: String,
    pub version: String,
    pub document_archive_id: String,
    /// Archive ids of older versions this build can still restore
    pub compatible_archive_ids: Vec<String>,
    pub analyzeable_content_types: Vec<ContentType>,
    pub supported_playback_transformation_flags: TransformationFlags,
}

impl FactoryDescriptor {
    pub fn supports_transformation(&self, flags: TransformationFlags) -> bool {
        self.supported_playback_transformation_flags.contains(flags)
    }

    pub fn can_restore_archive(&self, archive_id: &str) -> bool {
        self.document_archive_id == archive_id || self.compatible_archive_ids.iter().any(|id| id == archive_id)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

static DESCRIPTOR: Lazy<FactoryDescriptor> = Lazy::new(|| {
    tracing::debug!("building factory descriptor");
    FactoryDescriptor {
        factory_id: "org.nueva.ara-bridge.factory".to_string(),
        plugin_name: "ARA Bridge".to_string(),
        manufacturer: "Nueva".to_string(),
        website: "https://github.com/nueva/ara-bridge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        document_archive_id: "org.nueva.ara-bridge.archive.2".to_string(),
        compatible_archive_ids: vec!["org.nueva.ara-bridge.archive.1".to_string()],
        analyzeable_content_types: Vec::new(),
        supported_playback_transformation_flags: TransformationFlags::TIMESTRETCH,
    }
});

/// The process-wide factory descriptor
pub fn descriptor() -> &'static FactoryDescriptor {
    &DESCRIPTOR
}
