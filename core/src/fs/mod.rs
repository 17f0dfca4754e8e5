//! Output side of the pipeline: archive entry naming and archive sinks.

pub mod archive;
pub mod naming;

pub use archive::{
    ArchiveCompression, ArchiveSink, DEFAULT_ARCHIVE_NAME, ZipArchiveWriter, persist,
};
pub use naming::output_file_name;

/// Shared result type for fs operations.
pub type Result<T> = crate::Result<T>;
