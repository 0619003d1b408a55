/// Audioscribe - batch speech transcription
///
/// Converts directories of raw speech recordings into corrected text
/// transcripts: WAV normalization, fixed-length chunking, per-chunk voice
/// isolation, per-chunk recognition and a spelling-correction post-pass.

pub mod audio;
pub mod chunker;
pub mod config;
pub mod convert;
pub mod correction;
pub mod error;
pub mod isolation;
pub mod pipeline;
pub mod transcript;
pub mod transcription;

// Re-export main types for easy access
pub use crate::audio::SourceRecording;
pub use crate::chunker::Chunk;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::correction::{SpellingCorrector, TextCorrector};
pub use crate::error::{ChunkError, PipelineError};
pub use crate::isolation::{FilteredChunk, VoiceIsolator};
pub use crate::pipeline::{ChunkOutcome, PipelineRunner, RunSummary, SourceResult};
pub use crate::transcript::TranscriptWriter;
pub use crate::transcription::{SpeechRecognizer, TranscriptFragment, WhisperRecognizer};
