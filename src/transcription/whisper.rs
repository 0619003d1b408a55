//! Whisper-backed speech recognition via whisper-rs.
//!
//! The model is loaded exactly once, when the recognizer is constructed, and
//! the bound context is reused for every chunk of every source file. The
//! compute device (GPU vs CPU) is also fixed at bind time.

use crate::audio::{downmix_to_mono, resample, to_f32, WHISPER_SAMPLE_RATE};
use crate::error::{PipelineError, Result};
use crate::transcription::SpeechRecognizer;
use anyhow::anyhow;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing::{debug, info};
use whisper_rs::{
    install_logging_hooks, FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
};

static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Settings resolved once before the model is bound.
#[derive(Debug, Clone)]
pub struct WhisperSettings {
    /// Path to the ggml model file.
    pub model_path: PathBuf,
    /// Language code, or "auto" for detection.
    pub language: String,
    /// Inference threads (None = one per core, capped at 4).
    pub threads: Option<usize>,
    /// Force the compute device; None probes the environment.
    pub use_gpu: Option<bool>,
}

impl Default for WhisperSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: "auto".to_string(),
            threads: None,
            use_gpu: None,
        }
    }
}

/// Speech recognizer holding a whisper.cpp context bound at construction.
///
/// The context lives behind a Mutex so the recognizer stays Sync; under the
/// sequential pipeline the lock is never contended.
pub struct WhisperRecognizer {
    context: Mutex<WhisperContext>,
    settings: WhisperSettings,
    model_name: String,
}

impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("settings", &self.settings)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

impl WhisperRecognizer {
    /// Bind the model. Any failure here is a setup failure that aborts the
    /// run before a single chunk is generated.
    pub fn new(settings: WhisperSettings) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !settings.model_path.exists() {
            return Err(PipelineError::ModelBinding(format!(
                "model not found at {}",
                settings.model_path.display()
            )));
        }

        let model_name = settings
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let use_gpu = settings.use_gpu.unwrap_or_else(detect_gpu_support);

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu(use_gpu);

        let model_path = settings.model_path.to_str().ok_or_else(|| {
            PipelineError::ModelBinding("invalid UTF-8 in model path".to_string())
        })?;
        let context = WhisperContext::new_with_params(model_path, context_params)
            .map_err(|e| PipelineError::ModelBinding(format!("failed to load model: {}", e)))?;

        info!(
            "🎙️ Bound {} model on {}",
            model_name,
            if use_gpu { "gpu" } else { "cpu" }
        );

        Ok(Self {
            context: Mutex::new(context),
            settings,
            model_name,
        })
    }

    pub fn settings(&self) -> &WhisperSettings {
        &self.settings
    }

    fn thread_count(&self) -> i32 {
        self.settings
            .threads
            .unwrap_or_else(|| num_cpus::get().min(4)) as i32
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn transcribe(
        &self,
        samples: &[i16],
        sample_rate: u32,
        channels: u16,
    ) -> anyhow::Result<String> {
        // Whisper wants 16kHz mono f32.
        let mono = downmix_to_mono(samples, channels);
        let audio = to_f32(&resample(&mono, sample_rate, WHISPER_SAMPLE_RATE));

        let context = self
            .context
            .lock()
            .map_err(|e| anyhow!("failed to acquire model context: {}", e))?;

        let mut state = context
            .create_state()
            .map_err(|e| anyhow!("failed to create inference state: {}", e))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.settings.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.settings.language));
        }
        params.set_translate(false);
        params.set_n_threads(self.thread_count());
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio)
            .map_err(|e| anyhow!("inference failed: {}", e))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }
        let text = text.trim().to_string();

        debug!(
            "Recognized {} characters from {} input samples",
            text.len(),
            samples.len()
        );

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Probe the environment for GPU support, the same way the rest of the
/// tooling does.
fn detect_gpu_support() -> bool {
    std::env::var("CUDA_VISIBLE_DEVICES").is_ok()
        || std::env::var("AUDIOSCRIBE_USE_GPU").map_or(false, |v| v == "1" || v.to_lowercase() == "true")
}
