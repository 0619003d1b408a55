use crate::transcription::WhisperSettings;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the transcription pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source format normalization settings
    pub conversion: ConversionConfig,

    /// Chunking settings
    pub chunking: ChunkingConfig,

    /// Voice isolation tool settings
    pub isolation: IsolationConfig,

    /// Speech recognition settings
    pub transcription: TranscriptionConfig,

    /// Spelling correction settings
    pub correction: CorrectionConfig,

    /// Output and storage settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Target sample rate for converted WAV files
    pub sample_rate: u32,

    /// Target channel count
    pub channels: u32,

    /// Target bit rate passed to the transcoder
    pub bitrate: String,

    /// Run the loudness normalization pass over the source directory
    pub normalize_loudness: bool,

    /// Loudness filter expression
    pub loudnorm_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Nominal chunk length in milliseconds
    pub chunk_length_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    /// Voice isolation command
    pub command: String,

    /// Suffix the tool appends to its output file names. Tied to the tool
    /// version, hence configurable.
    pub output_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,

    /// Language code, or "auto" for detection
    pub language: String,

    /// Inference threads (unset = auto)
    pub threads: Option<usize>,

    /// Force GPU on/off; unset probes the environment at bind time
    pub use_gpu: Option<bool>,
}

impl TranscriptionConfig {
    /// Settings handed to the recognizer at bind time.
    pub fn whisper_settings(&self) -> WhisperSettings {
        WhisperSettings {
            model_path: self.model_path.clone(),
            language: self.language.clone(),
            threads: self.threads,
            use_gpu: self.use_gpu,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Enable the spelling-correction pass
    pub enable: bool,

    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,

    /// API key (for hosted endpoints)
    pub api_key: Option<String>,

    /// Model name to request
    pub model: String,

    /// Maximum tokens per corrected line
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Working directory for chunk staging and transcript artifacts
    pub work_dir: PathBuf,

    /// Directory for corrected transcript copies
    pub corrected_dir: PathBuf,

    /// Save a JSON run summary next to the transcripts
    pub save_summary: bool,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "audioscribe.toml",
            "config/audioscribe.toml",
            "~/.config/audioscribe/config.toml",
            "/etc/audioscribe/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment variables
        if let Ok(config) = Self::from_env() {
            return Ok(config);
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(chunk_length) = std::env::var("AUDIOSCRIBE_CHUNK_LENGTH_MS") {
            config.chunking.chunk_length_ms = chunk_length.parse().unwrap_or(120_000);
        }

        if let Ok(model_path) = std::env::var("AUDIOSCRIBE_MODEL_PATH") {
            config.transcription.model_path = PathBuf::from(model_path);
        }

        if let Ok(command) = std::env::var("AUDIOSCRIBE_FILTER_COMMAND") {
            config.isolation.command = command;
        }

        if let Ok(work_dir) = std::env::var("AUDIOSCRIBE_WORK_DIR") {
            config.output.work_dir = PathBuf::from(work_dir);
        }

        if let Ok(endpoint) = std::env::var("AUDIOSCRIBE_CORRECTION_ENDPOINT") {
            config.correction.endpoint = endpoint;
        }

        if let Ok(api_key) = std::env::var("AUDIOSCRIBE_API_KEY") {
            config.correction.api_key = Some(api_key);
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_length_ms == 0 {
            return Err(anyhow!("chunk_length_ms must be greater than 0"));
        }

        if self.conversion.sample_rate == 0 {
            return Err(anyhow!("conversion sample_rate must be greater than 0"));
        }

        if self.conversion.channels == 0 || self.conversion.channels > 2 {
            return Err(anyhow!("conversion channels must be 1 or 2"));
        }

        if self.isolation.command.trim().is_empty() {
            return Err(anyhow!("isolation command must not be empty"));
        }

        if self.correction.enable && self.correction.endpoint.trim().is_empty() {
            return Err(anyhow!("correction endpoint required when correction is enabled"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Audioscribe Configuration:\n\
            - Chunk Length: {}ms\n\
            - Isolation Tool: {} (output suffix '{}')\n\
            - Model: {}\n\
            - Language: {}\n\
            - Correction Enabled: {}\n\
            - Work Directory: {}\n\
            - Corrected Directory: {}",
            self.chunking.chunk_length_ms,
            self.isolation.command,
            self.isolation.output_suffix,
            self.transcription.model_path.display(),
            self.transcription.language,
            self.correction.enable,
            self.output.work_dir.display(),
            self.output.corrected_dir.display()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            conversion: ConversionConfig {
                sample_rate: 48_000,
                channels: 2,
                bitrate: "192k".to_string(),
                normalize_loudness: false,
                loudnorm_filter: "loudnorm=I=-16:LRA=11:TP=-1.5".to_string(),
            },
            chunking: ChunkingConfig {
                chunk_length_ms: 120_000, // 2 minutes
            },
            isolation: IsolationConfig {
                command: "deepfilter".to_string(),
                output_suffix: "_DeepFilterNet3".to_string(),
            },
            transcription: TranscriptionConfig {
                model_path: PathBuf::from("models/ggml-base.bin"),
                language: "auto".to_string(),
                threads: None,
                use_gpu: None,
            },
            correction: CorrectionConfig {
                enable: true,
                endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
                api_key: None,
                model: "local-model".to_string(),
                max_tokens: 256,
                temperature: 0.0,
                timeout_seconds: 60,
            },
            output: OutputConfig {
                work_dir: PathBuf::from("temp_chunks"),
                corrected_dir: PathBuf::from("corrected_transcriptions"),
                save_summary: true,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_chunk_length_ms(mut self, chunk_length_ms: u64) -> Self {
        self.config.chunking.chunk_length_ms = chunk_length_ms;
        self
    }

    pub fn with_model_path(mut self, model_path: PathBuf) -> Self {
        self.config.transcription.model_path = model_path;
        self
    }

    pub fn with_filter_command(mut self, command: String) -> Self {
        self.config.isolation.command = command;
        self
    }

    pub fn with_filter_suffix(mut self, suffix: String) -> Self {
        self.config.isolation.output_suffix = suffix;
        self
    }

    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.work_dir = dir;
        self
    }

    pub fn with_corrected_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.corrected_dir = dir;
        self
    }

    pub fn enable_correction(mut self, enable: bool) -> Self {
        self.config.correction.enable = enable;
        self
    }

    pub fn save_summary(mut self, save: bool) -> Self {
        self.config.output.save_summary = save;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_length_ms, 120_000);
        assert_eq!(config.isolation.command, "deepfilter");
        assert_eq!(config.isolation.output_suffix, "_DeepFilterNet3");
        assert_eq!(config.conversion.sample_rate, 48_000);
        assert!(config.correction.enable);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_chunk_length_ms(60_000)
            .with_filter_command("myfilter".to_string())
            .enable_correction(false)
            .build();

        assert_eq!(config.chunking.chunk_length_ms, 60_000);
        assert_eq!(config.isolation.command, "myfilter");
        assert!(!config.correction.enable);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_chunk_length() {
        let config = ConfigBuilder::new().with_chunk_length_ms(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_filter_command() {
        let config = ConfigBuilder::new().with_filter_command("  ".to_string()).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.chunking.chunk_length_ms, config.chunking.chunk_length_ms);
        assert_eq!(parsed.isolation.output_suffix, config.isolation.output_suffix);
    }

    #[test]
    fn test_whisper_settings_carry_over() {
        let config = Config::default();
        let settings = config.transcription.whisper_settings();
        assert_eq!(settings.model_path, config.transcription.model_path);
        assert_eq!(settings.language, "auto");
    }
}
