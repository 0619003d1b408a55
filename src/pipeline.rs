//! Sequential pipeline orchestration.
//!
//! One worker drives each source file through chunking, voice isolation,
//! transcription and accumulation, in order. Per-chunk failures skip the
//! chunk; per-file failures skip the file; only setup failures abort the run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::{self, SourceRecording};
use crate::chunker::{self, Chunk};
use crate::config::Config;
use crate::error::{ChunkError, PipelineError};
use crate::isolation::VoiceIsolator;
use crate::transcript::TranscriptWriter;
use crate::transcription::{SpeechRecognizer, TranscriptFragment, WhisperRecognizer};

/// Outcome of one chunk's trip through the pipeline.
///
/// A skipped chunk is an absence in the transcript, never corrupted data;
/// the variant keeps "tool failed" distinguishable from "no speech heard"
/// (which is a transcribed chunk with zero characters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChunkOutcome {
    Transcribed { index: u32, characters: usize },
    Skipped { index: u32, reason: String },
}

impl ChunkOutcome {
    pub fn index(&self) -> u32 {
        match self {
            ChunkOutcome::Transcribed { index, .. } => *index,
            ChunkOutcome::Skipped { index, .. } => *index,
        }
    }

    pub fn is_transcribed(&self) -> bool {
        matches!(self, ChunkOutcome::Transcribed { .. })
    }
}

/// Result of processing one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    pub file: PathBuf,
    pub source_id: String,
    pub status: SourceStatus,
    pub chunks: Vec<ChunkOutcome>,
    pub transcript_path: Option<PathBuf>,
    pub processing_time: Duration,
    pub error: Option<String>,
}

impl SourceResult {
    fn failed(file: &Path, error: String, processing_time: Duration) -> Self {
        let source_id = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            file: file.to_path_buf(),
            source_id,
            status: SourceStatus::Failed,
            chunks: Vec::new(),
            transcript_path: None,
            processing_time,
            error: Some(error),
        }
    }

    pub fn chunks_transcribed(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_transcribed()).count()
    }

    pub fn chunks_skipped(&self) -> usize {
        self.chunks.len() - self.chunks_transcribed()
    }
}

/// All chunks attempted (successfully or not) vs. the file itself failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceStatus {
    Done,
    Failed,
}

/// Aggregate results of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub total_sources: usize,
    pub completed: usize,
    pub failed: usize,
    pub chunks_transcribed: usize,
    pub chunks_skipped: usize,
    pub total_time: Duration,
    pub results: Vec<SourceResult>,
}

/// Drives source files through the chunked transcription pipeline.
///
/// Construction binds the recognition model and probes the filter tool; both
/// are setup steps whose failure aborts the run before any file is touched.
/// The bound recognizer is owned here and injected into every chunk call.
pub struct PipelineRunner {
    config: Config,
    recognizer: Box<dyn SpeechRecognizer>,
    isolator: VoiceIsolator,
    writer: TranscriptWriter,
}

impl PipelineRunner {
    /// Bind a Whisper model per the configuration and set up the pipeline.
    pub async fn new(config: Config) -> std::result::Result<Self, PipelineError> {
        let recognizer = WhisperRecognizer::new(config.transcription.whisper_settings())?;
        Self::with_recognizer(config, Box::new(recognizer)).await
    }

    /// Set up the pipeline around a caller-supplied recognizer.
    pub async fn with_recognizer(
        config: Config,
        recognizer: Box<dyn SpeechRecognizer>,
    ) -> std::result::Result<Self, PipelineError> {
        let isolator = VoiceIsolator::new(
            &config.isolation.command,
            &config.isolation.output_suffix,
            &config.output.work_dir,
        )
        .await?;
        let writer = TranscriptWriter::new(&config.output.work_dir).await?;

        info!(
            "🔧 Pipeline ready: '{}' model, '{}' filter, {}ms chunks",
            recognizer.model_name(),
            config.isolation.command,
            config.chunking.chunk_length_ms
        );

        Ok(Self {
            config,
            recognizer,
            isolator,
            writer,
        })
    }

    /// Process every WAV file in a directory, in sorted order.
    ///
    /// One file's total failure never prevents the next file from being
    /// processed.
    pub async fn process_directory(&mut self, audio_dir: &Path) -> Result<RunSummary> {
        let started_at = Utc::now();
        let run_start = Instant::now();

        let sources = audio::discover_sources(audio_dir).await?;
        if sources.is_empty() {
            warn!("No WAV files found in {}", audio_dir.display());
        } else {
            info!(
                "🎧 Found {} WAV file(s) in {}",
                sources.len(),
                audio_dir.display()
            );
        }

        let mut results = Vec::new();
        for path in sources {
            let file_start = Instant::now();
            match self.process_source(&path).await {
                Ok(result) => {
                    info!(
                        "✅ {} done: {} chunk(s) transcribed, {} skipped in {:.1}s",
                        result.source_id,
                        result.chunks_transcribed(),
                        result.chunks_skipped(),
                        result.processing_time.as_secs_f64()
                    );
                    results.push(result);
                }
                Err(e) => {
                    error!("❌ Skipping {}: {}", path.display(), e);
                    results.push(SourceResult::failed(
                        &path,
                        e.to_string(),
                        file_start.elapsed(),
                    ));
                }
            }
        }

        let summary = RunSummary {
            started_at,
            total_sources: results.len(),
            completed: results
                .iter()
                .filter(|r| r.status == SourceStatus::Done)
                .count(),
            failed: results
                .iter()
                .filter(|r| r.status == SourceStatus::Failed)
                .count(),
            chunks_transcribed: results.iter().map(|r| r.chunks_transcribed()).sum(),
            chunks_skipped: results.iter().map(|r| r.chunks_skipped()).sum(),
            total_time: run_start.elapsed(),
            results,
        };

        if self.config.output.save_summary {
            self.save_summary(&summary).await?;
        }

        Ok(summary)
    }

    /// Drive one source file: chunk it, then isolate, transcribe and
    /// accumulate each chunk in sequence.
    async fn process_source(
        &mut self,
        path: &Path,
    ) -> std::result::Result<SourceResult, PipelineError> {
        let start = Instant::now();

        let recording = SourceRecording::open(path)?;
        let source_id = recording.id().to_string();
        let duration_ms = recording.duration_ms();

        info!(
            "✂️  Splitting {} ({}ms) into {}ms chunks",
            source_id, duration_ms, self.config.chunking.chunk_length_ms
        );

        let chunks = chunker::split(recording, self.config.chunking.chunk_length_ms)?;

        let mut outcomes = Vec::new();
        for chunk in chunks {
            let index = chunk.index;
            let outcome = self.process_chunk(chunk).await;
            match &outcome {
                ChunkOutcome::Transcribed { characters, .. } => {
                    debug!("Chunk {} of {}: {} characters", index, source_id, characters);
                }
                ChunkOutcome::Skipped { reason, .. } => {
                    warn!("⚠️  {} chunk {} skipped: {}", source_id, index, reason);
                }
            }
            outcomes.push(outcome);
        }

        let transcript_path = self
            .writer
            .has_transcript(&source_id)
            .then(|| self.writer.transcript_path(&source_id));

        Ok(SourceResult {
            file: path.to_path_buf(),
            source_id,
            status: SourceStatus::Done,
            chunks: outcomes,
            transcript_path,
            processing_time: start.elapsed(),
            error: None,
        })
    }

    /// Isolate, transcribe and accumulate one chunk. A failure at any step
    /// short-circuits only this chunk.
    async fn process_chunk(&mut self, chunk: Chunk) -> ChunkOutcome {
        let index = chunk.index;
        let source_id = chunk.source_id.clone();

        let filtered = match self.isolator.isolate(chunk).await {
            Ok(filtered) => filtered,
            Err(e) => {
                return ChunkOutcome::Skipped {
                    index,
                    reason: e.to_string(),
                }
            }
        };

        let text = match self.recognizer.transcribe(
            &filtered.samples,
            filtered.sample_rate,
            filtered.channels,
        ) {
            Ok(text) => text,
            Err(e) => {
                return ChunkOutcome::Skipped {
                    index,
                    reason: ChunkError::Transcription(e.to_string()).to_string(),
                }
            }
        };

        let fragment = TranscriptFragment {
            source_id,
            index,
            text,
        };
        match self.writer.append(&fragment).await {
            Ok(()) => ChunkOutcome::Transcribed {
                index,
                characters: fragment.text.len(),
            },
            Err(e) => ChunkOutcome::Skipped {
                index,
                reason: format!("failed to append fragment: {}", e),
            },
        }
    }

    async fn save_summary(&self, summary: &RunSummary) -> Result<()> {
        let path = self.config.output.work_dir.join("run_summary.json");
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&path, json).await?;
        info!("💾 Run summary saved to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_fixture() -> Vec<ChunkOutcome> {
        vec![
            ChunkOutcome::Transcribed {
                index: 1,
                characters: 12,
            },
            ChunkOutcome::Skipped {
                index: 2,
                reason: "voice isolation failed: exit 1".into(),
            },
            ChunkOutcome::Transcribed {
                index: 3,
                characters: 0,
            },
        ]
    }

    #[test]
    fn test_source_result_counts() {
        let result = SourceResult {
            file: PathBuf::from("talk.wav"),
            source_id: "talk".into(),
            status: SourceStatus::Done,
            chunks: outcome_fixture(),
            transcript_path: None,
            processing_time: Duration::from_secs(1),
            error: None,
        };
        assert_eq!(result.chunks_transcribed(), 2);
        assert_eq!(result.chunks_skipped(), 1);
    }

    #[test]
    fn test_empty_transcription_counts_as_transcribed() {
        // zero characters is "no speech heard", not a skipped chunk
        let outcomes = outcome_fixture();
        assert!(outcomes[2].is_transcribed());
    }

    #[test]
    fn test_failed_result_keeps_identity() {
        let result = SourceResult::failed(
            Path::new("broken.wav"),
            "audio stream error: truncated".into(),
            Duration::from_millis(3),
        );
        assert_eq!(result.source_id, "broken");
        assert_eq!(result.status, SourceStatus::Failed);
        assert!(result.chunks.is_empty());
        assert!(result.error.unwrap().contains("truncated"));
    }

    #[test]
    fn test_run_summary_serializes() {
        let summary = RunSummary {
            started_at: Utc::now(),
            total_sources: 1,
            completed: 1,
            failed: 0,
            chunks_transcribed: 2,
            chunks_skipped: 1,
            total_time: Duration::from_secs(5),
            results: vec![],
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"chunks_transcribed\":2"));
    }
}
