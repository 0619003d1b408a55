use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

use audioscribe::config::Config;
use audioscribe::correction::{self, SpellingCorrector};
use audioscribe::pipeline::PipelineRunner;
use audioscribe::convert;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("audioscribe=info,warn")
        .init();

    let matches = Command::new("Audioscribe")
        .version("0.1.0")
        .about("Batch voice-isolation and speech transcription")
        .arg(
            Arg::new("audio-dir")
                .short('d')
                .long("audio-dir")
                .value_name("DIR")
                .help("Directory containing recordings to transcribe")
                .required(true)
        )
        .arg(
            Arg::new("work-dir")
                .short('w')
                .long("work-dir")
                .value_name("DIR")
                .help("Working directory for chunks and transcripts")
        )
        .arg(
            Arg::new("corrected-dir")
                .short('o')
                .long("corrected-dir")
                .value_name("DIR")
                .help("Output directory for corrected transcripts")
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("PATH")
                .help("Path to the ggml speech recognition model")
        )
        .arg(
            Arg::new("chunk-length")
                .short('c')
                .long("chunk-length")
                .value_name("MS")
                .help("Chunk length in milliseconds")
        )
        .arg(
            Arg::new("normalize-loudness")
                .long("normalize-loudness")
                .help("Normalize loudness of source files before chunking")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("skip-correction")
                .long("skip-correction")
                .help("Skip the spelling-correction pass")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let audio_dir = PathBuf::from(matches.get_one::<String>("audio-dir").unwrap());

    // Load configuration, then apply command-line overrides
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    if let Some(work_dir) = matches.get_one::<String>("work-dir") {
        config.output.work_dir = PathBuf::from(work_dir);
    }
    if let Some(corrected_dir) = matches.get_one::<String>("corrected-dir") {
        config.output.corrected_dir = PathBuf::from(corrected_dir);
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.transcription.model_path = PathBuf::from(model);
    }
    if let Some(chunk_length) = matches.get_one::<String>("chunk-length") {
        config.chunking.chunk_length_ms = chunk_length.parse()?;
    }
    if matches.get_flag("normalize-loudness") {
        config.conversion.normalize_loudness = true;
    }

    config.validate()?;

    info!("🚀 Audioscribe starting...");
    info!("📁 Audio directory: {}", audio_dir.display());
    info!("📂 Work directory: {}", config.output.work_dir.display());

    if !audio_dir.exists() {
        error!("Audio directory does not exist: {}", audio_dir.display());
        return Err(anyhow::anyhow!("Audio directory not found"));
    }

    // Loop 1: convert source files to WAV format
    let converted = convert::ensure_wav_format(&audio_dir, &config.conversion).await?;
    if converted > 0 {
        info!("🔄 Converted {} file(s) to WAV", converted);
    }

    // Loop 2: normalize volume (optional)
    if config.conversion.normalize_loudness {
        convert::normalize_loudness(&audio_dir, &config.conversion).await?;
    }

    // Loop 3: chunk, isolate and transcribe. Model binding and the filter
    // probe happen here; a setup failure aborts before any file is touched.
    let mut runner = PipelineRunner::new(config.clone()).await?;

    let start_time = std::time::Instant::now();
    let summary = runner.process_directory(&audio_dir).await?;
    let duration = start_time.elapsed();

    info!("🎉 Transcription completed in {:.2}s", duration.as_secs_f64());
    info!("✅ Sources completed: {}", summary.completed);
    info!("❌ Sources failed: {}", summary.failed);
    info!(
        "📊 Chunks: {} transcribed, {} skipped",
        summary.chunks_transcribed, summary.chunks_skipped
    );

    // Loop 4: spelling correction over the finished transcripts
    if config.correction.enable && !matches.get_flag("skip-correction") {
        let corrector = SpellingCorrector::new(config.correction.clone())?;
        let corrected = correction::correct_transcripts(
            &corrector,
            &config.output.work_dir,
            &config.output.corrected_dir,
        )
        .await?;
        info!("📝 Corrected {} transcript(s)", corrected);
    }

    Ok(())
}
