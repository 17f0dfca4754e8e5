//! Sequential batch orchestration over many source images.

pub mod controller;
pub mod progress;

pub use controller::{BatchController, BatchState};
pub use progress::{ProgressEvent, ProgressState};

use crate::error::BatchError;
use crate::pipeline::ModeSettings;
use crate::types::{ImageDimensions, SourceImage};

/// One unit of work: a source image under the batch-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingJob<'a> {
    pub index: usize,
    pub source: &'a SourceImage,
    pub settings: &'a ModeSettings,
}

impl<'a> ProcessingJob<'a> {
    pub fn new(index: usize, source: &'a SourceImage, settings: &'a ModeSettings) -> Self {
        Self { index, source, settings }
    }
}

/// A successfully transformed image.
#[derive(Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub index: usize,
    pub filename: String,
    pub dimensions: ImageDimensions,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for OutputArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputArtifact")
            .field("index", &self.index)
            .field("filename", &self.filename)
            .field("dimensions", &self.dimensions)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A job that did not produce an artifact.
#[derive(Debug)]
pub struct ItemFailure {
    pub index: usize,
    pub filename: String,
    pub error: BatchError,
}

/// Outcome of a completed batch. Artifacts and failures are both in input order.
pub struct BatchResult {
    pub artifacts: Vec<OutputArtifact>,
    pub failures: Vec<ItemFailure>,
    /// Finalized archive bytes produced by the sink.
    pub archive: Vec<u8>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.artifacts.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.artifacts.len() + self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable "N of M succeeded" line.
    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded(), self.total())
    }
}

impl std::fmt::Debug for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchResult")
            .field("artifacts", &self.artifacts)
            .field("failures", &self.failures)
            .field("archive_len", &self.archive.len())
            .finish()
    }
}
