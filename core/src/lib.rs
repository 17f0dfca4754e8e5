//! Core library for the batch photo resizer.

#![deny(missing_debug_implementations)]

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod fs;
pub mod log;
pub mod pipeline;
pub mod stats;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use batch::{BatchController, BatchResult, BatchState, ItemFailure, OutputArtifact, ProgressEvent};
pub use config::BatchConfig;
pub use error::BatchError;
pub use fs::{ArchiveSink, ZipArchiveWriter, output_file_name};
pub use pipeline::{GeometryPlan, ModeSettings, TransformEngine, TransformMode};
pub use types::{ImageDimensions, SourceImage};

/// Returns the version of the core crate for telemetry and debugging.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
