//! Serializable batch configuration.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::codec::JpegCodec;
use crate::fs::{ArchiveCompression, DEFAULT_ARCHIVE_NAME, ZipArchiveWriter};
use crate::pipeline::ModeSettings;
use crate::pipeline::resize::ResizeFilter;
use crate::pipeline::TransformEngine;

/// Everything a caller chooses for one batch, in the shape the UI layer sends it.
///
/// ```json
/// { "settings": { "mode": "printCover", "printSize": "4x6" }, "filter": "lanczos3" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    pub settings: ModeSettings,
    pub filter: ResizeFilter,
    pub archive_name: String,
    pub compression: ArchiveCompression,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            settings: ModeSettings::default(),
            filter: ResizeFilter::default(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            compression: ArchiveCompression::default(),
        }
    }
}

impl BatchConfig {
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).context("parsing batch configuration")
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading batch configuration at {}", path.display()))?;
        Self::from_json_str(&data)
    }

    pub fn with_settings(mut self, settings: ModeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Transform engine using the default JPEG codec and the configured filter.
    pub fn engine(&self) -> TransformEngine<JpegCodec> {
        TransformEngine::new(JpegCodec).with_filter(self.filter)
    }

    /// Fresh archive sink with the configured compression.
    pub fn sink(&self) -> ZipArchiveWriter {
        ZipArchiveWriter::new(self.compression)
    }
}
