//! Source-directory format normalization via ffmpeg.
//!
//! Runs before the pipeline proper: every file in the source directory is
//! converted to WAV in place, and optionally loudness-normalized. Per-file
//! conversion failures are logged and skipped; they never stop the batch.

use crate::config::ConversionConfig;
use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Convert every non-WAV file in the directory to WAV, replacing the
/// original. Returns the number of files converted.
pub async fn ensure_wav_format(audio_dir: &Path, config: &ConversionConfig) -> Result<usize> {
    let mut converted = 0;
    let mut entries = tokio::fs::read_dir(audio_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();

        // Dotfiles (e.g. .gitkeep) are placeholders, not audio.
        if file_name.starts_with('.') {
            debug!("Skipping ignored file: {}", file_name);
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("wav"));
        if is_wav {
            debug!("{} is already WAV, no conversion required", file_name);
            continue;
        }

        let new_path = path.with_extension("wav");
        info!("🔄 Converting {} to WAV...", file_name);

        let input = path.to_string_lossy().to_string();
        let output = new_path.to_string_lossy().to_string();
        let sample_rate = config.sample_rate.to_string();
        let channels = config.channels.to_string();
        let status = Command::new("ffmpeg")
            .args([
                "-i",
                input.as_str(),
                "-ar",
                sample_rate.as_str(),
                "-ac",
                channels.as_str(),
                "-b:a",
                config.bitrate.as_str(),
                "-y",
                output.as_str(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            warn!("ffmpeg failed for {}, leaving the file untouched", file_name);
            // Half-written output must not be picked up as a source later.
            let _ = tokio::fs::remove_file(&new_path).await;
            continue;
        }

        tokio::fs::remove_file(&path).await?;
        info!("✅ {} converted and replaced", file_name);
        converted += 1;
    }

    Ok(converted)
}

/// Normalize the loudness of every WAV in the directory to the configured
/// target, replacing files via a temp-then-rename dance. Returns the number
/// of files normalized.
pub async fn normalize_loudness(audio_dir: &Path, config: &ConversionConfig) -> Result<usize> {
    let mut normalized = 0;
    let mut entries = tokio::fs::read_dir(audio_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        // Leftover temp files from an interrupted earlier pass.
        if file_name.ends_with("_normalized.wav") {
            continue;
        }

        let temp_path = audio_dir.join(format!(
            "{}_normalized.wav",
            path.file_stem().unwrap_or_default().to_string_lossy()
        ));

        info!("🔊 Normalizing volume of {}...", file_name);

        let input = path.to_string_lossy().to_string();
        let output = temp_path.to_string_lossy().to_string();
        let sample_rate = config.sample_rate.to_string();
        let status = Command::new("ffmpeg")
            .args([
                "-i",
                input.as_str(),
                "-af",
                config.loudnorm_filter.as_str(),
                "-ar",
                sample_rate.as_str(),
                "-y",
                output.as_str(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            warn!("Loudness normalization failed for {}, keeping original", file_name);
            let _ = tokio::fs::remove_file(&temp_path).await;
            continue;
        }

        tokio::fs::remove_file(&path).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        info!("✅ Volume of {} normalized and replaced", file_name);
        normalized += 1;
    }

    Ok(normalized)
}
