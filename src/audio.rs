use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Sample rate expected by the recognition model.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// A decoded source recording held in memory.
///
/// Read-only after opening; consumed by the chunker. The identifier is the
/// file stem and names every downstream artifact for this recording.
#[derive(Debug, Clone)]
pub struct SourceRecording {
    id: String,
    path: PathBuf,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl SourceRecording {
    /// Decode a WAV file. An unreadable or malformed stream is a file-level
    /// failure; the caller skips the file and moves on.
    pub fn open(path: &Path) -> Result<Self> {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PipelineError::Audio(format!("invalid file name: {}", path.display())))?
            .to_string();

        let mut reader = hound::WavReader::open(path).map_err(|e| {
            PipelineError::Audio(format!("failed to open {}: {}", path.display(), e))
        })?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(PipelineError::Audio(format!(
                "no channels in {}",
                path.display()
            )));
        }

        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                PipelineError::Audio(format!("failed to read samples from {}: {}", path.display(), e))
            })?;

        debug!(
            "Decoded {}: {} frames, {}Hz, {} channel(s)",
            path.display(),
            samples.len() / spec.channels as usize,
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            id,
            path: path.to_path_buf(),
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }

    /// Build a recording from raw interleaved samples.
    pub fn from_samples(id: String, samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            id,
            path: PathBuf::new(),
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (interleaved samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }

    /// Interleaved samples covering `[start_ms, end_ms)`, clamped to the end
    /// of the stream.
    pub fn slice(&self, start_ms: u64, end_ms: u64) -> &[i16] {
        let start = self.sample_index(start_ms).min(self.samples.len());
        let end = self.sample_index(end_ms).min(self.samples.len());
        &self.samples[start..end]
    }

    fn sample_index(&self, ms: u64) -> usize {
        (ms as u128 * self.sample_rate as u128 / 1000) as usize * self.channels as usize
    }
}

/// Enumerate the WAV files in a source directory, sorted by file name so
/// reruns visit sources in a stable order.
pub async fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("wav"));
        if is_wav {
            sources.push(path);
        }
    }

    sources.sort();
    Ok(sources)
}

/// Write interleaved samples as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| {
        PipelineError::Audio(format!("failed to create {}: {}", path.display(), e))
    })?;
    for &sample in samples {
        writer.write_sample(sample).map_err(|e| {
            PipelineError::Audio(format!("failed to write {}: {}", path.display(), e))
        })?;
    }
    writer.finalize().map_err(|e| {
        PipelineError::Audio(format!("failed to finalize {}: {}", path.display(), e))
    })?;
    Ok(())
}

/// Read a 16-bit PCM WAV file back into interleaved samples.
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, u32, u16)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| {
        PipelineError::Audio(format!("failed to open {}: {}", path.display(), e))
    })?;
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            PipelineError::Audio(format!("failed to read {}: {}", path.display(), e))
        })?;
    Ok((samples, spec.sample_rate, spec.channels))
}

/// Average interleaved stereo down to mono; mono input passes through.
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx.min(samples.len() - 1)]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

/// Convert 16-bit PCM to normalized f32 in `[-1.0, 1.0]`.
pub fn to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talk.wav");
        let samples = vec![100i16, 200, 300, 400];
        write_wav(&path, &samples, 16000, 1).unwrap();

        let recording = SourceRecording::open(&path).unwrap();
        assert_eq!(recording.id(), "talk");
        assert_eq!(recording.sample_rate(), 16000);
        assert_eq!(recording.channels(), 1);
        assert_eq!(recording.frames(), 4);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav file at all").unwrap();

        let result = SourceRecording::open(&path);
        assert!(matches!(result, Err(PipelineError::Audio(_))));
    }

    #[test]
    fn test_duration_ms() {
        // 2500 frames at 1000Hz = 2500ms
        let recording =
            SourceRecording::from_samples("r".into(), vec![0i16; 2500], 1000, 1);
        assert_eq!(recording.duration_ms(), 2500);
    }

    #[test]
    fn test_slice_is_clamped() {
        let recording =
            SourceRecording::from_samples("r".into(), vec![1i16; 1000], 1000, 1);
        assert_eq!(recording.slice(0, 500).len(), 500);
        assert_eq!(recording.slice(500, 5000).len(), 500);
        assert_eq!(recording.slice(2000, 3000).len(), 0);
    }

    #[test]
    fn test_slice_respects_channel_interleaving() {
        // 1000Hz stereo: 1ms = 2 interleaved samples
        let recording =
            SourceRecording::from_samples("r".into(), vec![1i16; 200], 1000, 2);
        assert_eq!(recording.slice(0, 10).len(), 20);
    }

    #[test]
    fn test_downmix_averages_pairs() {
        let samples = vec![100i16, 200, 300, 400];
        assert_eq!(downmix_to_mono(&samples, 2), vec![150i16, 350]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn test_resample_halves_and_doubles() {
        let samples = vec![0i16; 1600];
        assert_eq!(resample(&samples, 16000, 8000).len(), 800);
        assert_eq!(resample(&samples, 8000, 16000).len(), 3200);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![5i16, 10, 15];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_to_f32_bounds() {
        let converted = to_f32(&[0, -32768, 32767]);
        assert_eq!(converted[0], 0.0);
        assert_eq!(converted[1], -1.0);
        assert!((converted[2] - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_discover_sources_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("a.WAV"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub.wav")).unwrap();

        let sources = discover_sources(dir.path()).await.unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.WAV", "b.wav"]);
    }
}
