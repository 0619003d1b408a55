//! Per-source transcript accumulation.
//!
//! One append-only text file per source recording, one line per successful
//! chunk: `Chunk {index}: {text}`. Lines are strictly ascending by chunk
//! index; a failed chunk's index is simply absent.

use crate::error::Result;
use crate::transcription::TranscriptFragment;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Accumulates transcript fragments into per-source artifacts.
///
/// The artifact for a source is created fresh on its first fragment of the
/// run; a pre-existing file from an earlier run is truncated rather than
/// appended to.
pub struct TranscriptWriter {
    dir: PathBuf,
    sources: HashMap<String, SourceTranscript>,
}

struct SourceTranscript {
    path: PathBuf,
    last_index: u32,
    lines: u32,
}

impl TranscriptWriter {
    pub async fn new(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            sources: HashMap::new(),
        })
    }

    /// Path of the transcript artifact for a source.
    pub fn transcript_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}_transcription.txt", source_id))
    }

    /// Append one fragment to its source's transcript.
    ///
    /// Idempotent per index: a fragment whose index is not strictly greater
    /// than the last written index for the source is dropped with a warning.
    /// The sequential pipeline never produces one; the check guards a future
    /// concurrent caller.
    pub async fn append(&mut self, fragment: &TranscriptFragment) -> Result<()> {
        let path = self.transcript_path(&fragment.source_id);
        let entry = match self.sources.entry(fragment.source_id.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                // First fragment of the run for this source: fresh artifact.
                tokio::fs::write(&path, b"").await?;
                vacant.insert(SourceTranscript {
                    path,
                    last_index: 0,
                    lines: 0,
                })
            }
        };

        if fragment.index <= entry.last_index {
            warn!(
                "Dropping out-of-order fragment {} for {} (last written index {})",
                fragment.index, fragment.source_id, entry.last_index
            );
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&entry.path)
            .await?;
        file.write_all(format!("Chunk {}: {}\n", fragment.index, fragment.text).as_bytes())
            .await?;
        file.flush().await?;

        entry.last_index = fragment.index;
        entry.lines += 1;
        debug!(
            "Appended chunk {} to {}",
            fragment.index,
            entry.path.display()
        );
        Ok(())
    }

    /// Number of lines written for a source this run.
    pub fn lines_written(&self, source_id: &str) -> u32 {
        self.sources.get(source_id).map_or(0, |s| s.lines)
    }

    /// Whether any fragment has been written for a source this run.
    pub fn has_transcript(&self, source_id: &str) -> bool {
        self.sources.contains_key(source_id)
    }
}
