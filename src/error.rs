//! Error taxonomy for the transcription pipeline.
//!
//! Failures are caught at the smallest scope that can safely continue:
//! [`ChunkError`] covers a single chunk (logged and skipped), [`PipelineError`]
//! covers file-level and setup failures. Only setup failures terminate a run.

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// File-level and setup failures.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio stream error: {0}")]
    Audio(String),

    #[error("chunk length must be greater than zero")]
    InvalidChunkLength,

    #[error("model binding failed: {0}")]
    ModelBinding(String),

    #[error("required external tool not available: {0}")]
    ToolMissing(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// True for failures that must abort the run before any file is processed.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelBinding(_)
                | PipelineError::ToolMissing(_)
                | PipelineError::Configuration(_)
        )
    }
}

/// A failure confined to one chunk. Never fatal to the source file; the
/// affected index is simply absent from the transcript.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ChunkError {
    #[error("voice isolation failed: {0}")]
    Isolation(String),

    #[error("transcription failed: {0}")]
    Transcription(String),
}
