//! Speech recognition: the model service seam and per-chunk fragment type.

pub mod whisper;

pub use whisper::{WhisperRecognizer, WhisperSettings};

/// Text recognized for one chunk. Appended exactly once to the transcript of
/// its source recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub source_id: String,
    pub index: u32,
    /// Recognized text. Empty when the model found no recognizable speech;
    /// that is a valid fragment, not a failure.
    pub text: String,
}

/// A speech-recognition model bound once per pipeline run.
///
/// The orchestrator owns the bound instance and reuses it across all chunks
/// and all source files; binding is the expensive part and must not recur
/// per chunk.
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in an interleaved 16-bit payload.
    ///
    /// Returns empty text, not an error, when the model legitimately hears
    /// no speech. Errors are per-chunk failures for the caller to absorb.
    fn transcribe(&self, samples: &[i16], sample_rate: u32, channels: u16)
        -> anyhow::Result<String>;

    /// Name of the bound model.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_equality_ignores_nothing() {
        let a = TranscriptFragment {
            source_id: "talk".into(),
            index: 1,
            text: "hello".into(),
        };
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_recognizer_is_object_safe() {
        fn _takes_boxed(_r: Box<dyn SpeechRecognizer>) {}
    }
}
