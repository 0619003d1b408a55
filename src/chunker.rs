//! Fixed-length segmentation of source recordings.
//!
//! Chunks of one recording exactly tile `[0, duration)`: starts at
//! `0, L, 2L, …`, indices 1-based and contiguous, only the final chunk may be
//! shorter than the nominal length.

use crate::audio::SourceRecording;
use crate::error::{PipelineError, Result};

/// A bounded time-slice of a source recording, the unit of isolation and
/// transcription work.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub source_id: String,
    /// 1-based, strictly increasing, contiguous.
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Chunk {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Canonical staging file name for this chunk.
    pub fn file_name(&self) -> String {
        format!("{}_chunk_{}.wav", self.source_id, self.index)
    }
}

/// Split a recording into an ordered, lazy sequence of chunks.
///
/// A zero-duration recording yields an empty sequence; a recording shorter
/// than `chunk_length_ms` yields exactly one chunk. The only failure mode is
/// a non-positive chunk length.
pub fn split(recording: SourceRecording, chunk_length_ms: u64) -> Result<Chunks> {
    if chunk_length_ms == 0 {
        return Err(PipelineError::InvalidChunkLength);
    }
    Ok(Chunks {
        recording,
        chunk_length_ms,
        next_start_ms: 0,
        next_index: 1,
    })
}

/// Lazy, finite, non-restartable chunk iterator. Owns the recording; sample
/// data is copied out per chunk as it is produced.
pub struct Chunks {
    recording: SourceRecording,
    chunk_length_ms: u64,
    next_start_ms: u64,
    next_index: u32,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let duration = self.recording.duration_ms();
        if self.next_start_ms >= duration {
            return None;
        }

        let start_ms = self.next_start_ms;
        let end_ms = (start_ms + self.chunk_length_ms).min(duration);
        let chunk = Chunk {
            source_id: self.recording.id().to_string(),
            index: self.next_index,
            start_ms,
            end_ms,
            samples: self.recording.slice(start_ms, end_ms).to_vec(),
            sample_rate: self.recording.sample_rate(),
            channels: self.recording.channels(),
        };

        self.next_start_ms = end_ms;
        self.next_index += 1;
        Some(chunk)
    }
}
