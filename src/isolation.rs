//! Voice isolation via an external filter process.
//!
//! The filter tool only speaks files, so each chunk is staged as a WAV in the
//! work directory, filtered, and read back into memory. Every staging
//! artifact derived from a chunk is reclaimed before `isolate` returns,
//! whether the call succeeds or fails.

use crate::audio::{read_wav, write_wav};
use crate::chunker::Chunk;
use crate::error::{ChunkError, PipelineError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// A chunk whose payload has been replaced by the filter output. Same
/// identity as the chunk it came from.
#[derive(Debug, Clone)]
pub struct FilteredChunk {
    pub source_id: String,
    pub index: u32,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Adapter around the external voice-isolation tool.
///
/// The tool is invoked as `<command> <input.wav> -o <dir>` and writes its
/// output next to the input under a name derived by a suffix convention
/// (`talk_chunk_1.wav` -> `talk_chunk_1<suffix>.wav`). The suffix varies
/// between tool versions, so it is configuration rather than a constant.
pub struct VoiceIsolator {
    command: String,
    output_suffix: String,
    work_dir: PathBuf,
}

impl VoiceIsolator {
    /// Probe the external tool once. A missing tool is a setup failure: the
    /// run aborts before any file is processed.
    pub async fn new(command: &str, output_suffix: &str, work_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(work_dir).await?;
        if !check_command_available(command).await {
            return Err(PipelineError::ToolMissing(command.to_string()));
        }
        Ok(Self {
            command: command.to_string(),
            output_suffix: output_suffix.to_string(),
            work_dir: work_dir.to_path_buf(),
        })
    }

    /// Run the filter over one chunk, consuming it.
    ///
    /// A non-zero exit or missing output is a chunk-level failure carrying
    /// the tool's diagnostic; the pipeline logs it and moves on.
    pub async fn isolate(&self, chunk: Chunk) -> std::result::Result<FilteredChunk, ChunkError> {
        let source_id = chunk.source_id.clone();
        let index = chunk.index;
        let stem = chunk.file_name().trim_end_matches(".wav").to_string();

        let result = self.run_filter(chunk, &stem).await;
        self.sweep_staging(&stem).await;

        result.map(|(samples, sample_rate, channels)| FilteredChunk {
            source_id,
            index,
            samples,
            sample_rate,
            channels,
        })
    }

    async fn run_filter(
        &self,
        chunk: Chunk,
        stem: &str,
    ) -> std::result::Result<(Vec<i16>, u32, u16), ChunkError> {
        let input_path = self.work_dir.join(chunk.file_name());
        let produced_path = self
            .work_dir
            .join(format!("{}{}.wav", stem, self.output_suffix));

        write_wav(&input_path, &chunk.samples, chunk.sample_rate, chunk.channels)
            .map_err(|e| ChunkError::Isolation(format!("failed to stage chunk: {}", e)))?;

        debug!(
            "Isolating voices in {} with {}",
            input_path.display(),
            self.command
        );

        let output = Command::new(&self.command)
            .arg(&input_path)
            .arg("-o")
            .arg(&self.work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ChunkError::Isolation(format!("failed to run {}: {}", self.command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChunkError::Isolation(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        if !produced_path.exists() {
            return Err(ChunkError::Isolation(format!(
                "expected filter output missing: {}",
                produced_path.display()
            )));
        }

        // Normalize the tool's suffixed output back to the chunk's canonical
        // location, then read the filtered payload back into memory.
        tokio::fs::rename(&produced_path, &input_path)
            .await
            .map_err(|e| ChunkError::Isolation(format!("failed to relocate output: {}", e)))?;

        read_wav(&input_path)
            .map_err(|e| ChunkError::Isolation(format!("unreadable filter output: {}", e)))
    }

    /// Remove every staging file derived from this chunk's stem, covering
    /// both our own artifacts and anything the tool left under another name.
    async fn sweep_staging(&self, stem: &str) {
        let mut entries = match tokio::fs::read_dir(&self.work_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to scan {}: {}", self.work_dir.display(), e);
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if entry.file_name().to_string_lossy().starts_with(stem) {
                        if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                            warn!(
                                "Failed to remove staging file {}: {}",
                                entry.path().display(),
                                e
                            );
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to scan {}: {}", self.work_dir.display(), e);
                    break;
                }
            }
        }
    }
}

/// Check whether a command is runnable.
async fn check_command_available(command: &str) -> bool {
    Command::new(command)
        .arg("--help")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
