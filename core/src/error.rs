//! Error taxonomy surfaced by the batch control surface.

use thiserror::Error;

/// Errors raised while planning or running a batch.
///
/// `InvalidSettings`, `AlreadyProcessing` and `EmptyBatch` abort a batch before any item runs.
/// `CodecFailure` and `Cancelled` are recorded per item and never abort the batch.
/// `ArchiveFailure` is recorded per item when adding an entry fails, and aborts the batch when
/// finalizing the archive fails.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid mode settings: {0}")]
    InvalidSettings(String),
    #[error("a batch is already being processed")]
    AlreadyProcessing,
    #[error("batch contains no images")]
    EmptyBatch,
    #[error("codec failure: {0:#}")]
    CodecFailure(anyhow::Error),
    #[error("archive failure: {0:#}")]
    ArchiveFailure(anyhow::Error),
    #[error("batch cancelled before the item was processed")]
    Cancelled,
}

impl BatchError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSettings(message.into())
    }

    /// Whether the error is isolated to a single item rather than the whole batch.
    pub fn is_item_level(&self) -> bool {
        matches!(self, Self::CodecFailure(_) | Self::ArchiveFailure(_) | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_failure_renders_context_chain() {
        let err = anyhow::anyhow!("truncated stream").context("decoding photo.jpg");
        let rendered = BatchError::CodecFailure(err).to_string();
        assert!(rendered.contains("decoding photo.jpg"));
        assert!(rendered.contains("truncated stream"));
    }

    #[test]
    fn classifies_item_level_errors() {
        assert!(BatchError::Cancelled.is_item_level());
        assert!(BatchError::CodecFailure(anyhow::anyhow!("boom")).is_item_level());
        assert!(!BatchError::EmptyBatch.is_item_level());
        assert!(!BatchError::AlreadyProcessing.is_item_level());
        assert!(!BatchError::invalid("factor").is_item_level());
    }
}
