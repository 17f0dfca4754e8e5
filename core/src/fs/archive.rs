//! Archive sinks that collect transformed images into a single downloadable blob.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Error, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

use super::Result;

/// File name used when a finalized archive is saved without an explicit name.
pub const DEFAULT_ARCHIVE_NAME: &str = "resized_photos.zip";

/// Destination for transformed images.
///
/// Entries are only ever appended; there is no way to rename or remove one once added.
pub trait ArchiveSink {
    fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<()>;

    /// Close the archive and hand back its bytes.
    fn finalize(self) -> Result<Vec<u8>>
    where
        Self: Sized;
}

/// Compression applied to archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveCompression {
    /// Store entries as-is. JPEG data does not compress further.
    #[default]
    Stored,
    Deflated,
}

impl From<ArchiveCompression> for CompressionMethod {
    fn from(value: ArchiveCompression) -> Self {
        match value {
            ArchiveCompression::Stored => CompressionMethod::Stored,
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// In-memory ZIP writer.
pub struct ZipArchiveWriter {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    entries: usize,
}

impl ZipArchiveWriter {
    pub fn new(compression: ArchiveCompression) -> Self {
        let options = FileOptions::default().compression_method(compression.into());
        Self { writer: ZipWriter::new(Cursor::new(Vec::new())), options, entries: 0 }
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

impl Default for ZipArchiveWriter {
    fn default() -> Self {
        Self::new(ArchiveCompression::default())
    }
}

impl std::fmt::Debug for ZipArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchiveWriter").field("entries", &self.entries).finish_non_exhaustive()
    }
}

impl ArchiveSink for ZipArchiveWriter {
    fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        self.writer
            .start_file(filename, self.options)
            .map_err(|err| anyhow!("starting archive entry {filename:?}: {err}"))?;
        self.writer
            .write_all(bytes)
            .with_context(|| format!("writing archive entry {filename:?}"))?;
        self.entries += 1;
        Ok(())
    }

    fn finalize(mut self) -> Result<Vec<u8>> {
        let cursor = self.writer.finish().map_err(|err| anyhow!("finishing archive: {err}"))?;
        Ok(cursor.into_inner())
    }
}

/// Atomically write finalized archive bytes to `path`, replacing any existing file.
pub fn persist(bytes: &[u8], path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("creating archive directory at {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("allocating temp file in {}", parent.display()))?;
    tmp.write_all(bytes).with_context(|| format!("writing {}", path.display()))?;
    tmp.flush().with_context(|| format!("flushing {}", path.display()))?;
    tmp.persist(path).map_err(|err| Error::from(err.error))?;

    Ok(path.to_path_buf())
}
