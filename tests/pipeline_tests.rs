use audioscribe::audio::write_wav;
use audioscribe::config::{Config, ConfigBuilder};
use audioscribe::error::PipelineError;
use audioscribe::pipeline::PipelineRunner;
use audioscribe::transcription::SpeechRecognizer;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Deterministic recognizer: output depends only on the input length.
struct MockRecognizer;

impl SpeechRecognizer for MockRecognizer {
    fn transcribe(&self, samples: &[i16], _sample_rate: u32, _channels: u16) -> anyhow::Result<String> {
        Ok(format!("heard {} samples", samples.len()))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Recognizer that fails on the nth call and succeeds otherwise.
struct FailNthRecognizer {
    calls: Mutex<u32>,
    fail_on: u32,
}

impl FailNthRecognizer {
    fn new(fail_on: u32) -> Self {
        Self {
            calls: Mutex::new(0),
            fail_on,
        }
    }
}

impl SpeechRecognizer for FailNthRecognizer {
    fn transcribe(&self, samples: &[i16], _sample_rate: u32, _channels: u16) -> anyhow::Result<String> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls == self.fail_on {
            anyhow::bail!("inference blew up");
        }
        Ok(format!("heard {} samples", samples.len()))
    }

    fn model_name(&self) -> &str {
        "flaky-mock"
    }
}

/// Stand-in filter binary: copies input to the suffixed output name, failing
/// for the chunk index given (if any).
fn write_stub_filter(dir: &Path, fail_chunk: Option<u32>) -> String {
    let script = dir.join("fake_filter.sh");
    let fail_case = match fail_chunk {
        Some(index) => format!(
            "case \"$base\" in *_chunk_{}) echo 'filter blew up' >&2; exit 1;; esac\n",
            index
        ),
        None => String::new(),
    };
    let body = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--help\" ]; then exit 0; fi\n\
         input=\"$1\"\n\
         out_dir=\"$3\"\n\
         base=$(basename \"$input\" .wav)\n\
         {}cp \"$input\" \"$out_dir/${{base}}_DeepFilterNet3.wav\"\n",
        fail_case
    );
    std::fs::write(&script, body).unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();
    script.to_string_lossy().to_string()
}

/// 1000Hz mono keeps one sample per millisecond, so a 250_000ms recording is
/// only 250k samples.
fn write_recording(dir: &Path, name: &str, duration_ms: usize) {
    let samples = vec![25i16; duration_ms];
    write_wav(&dir.join(name), &samples, 1000, 1).unwrap();
}

fn test_config(root: &Path, filter_command: String) -> Config {
    ConfigBuilder::new()
        .with_chunk_length_ms(120_000)
        .with_filter_command(filter_command)
        .with_work_dir(root.join("work"))
        .with_corrected_dir(root.join("corrected"))
        .enable_correction(false)
        .build()
}

#[tokio::test]
async fn test_end_to_end_with_failed_isolation_chunk() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "talk.wav", 250_000);

    let command = write_stub_filter(dir.path(), Some(2));
    let config = test_config(dir.path(), command);

    let mut runner = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    let summary = runner.process_directory(&audio_dir).await.unwrap();

    assert_eq!(summary.total_sources, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.chunks_transcribed, 2);
    assert_eq!(summary.chunks_skipped, 1);

    // 250s at 120s chunks: chunk 1 and 3 transcribed, chunk 2 absent.
    let transcript =
        std::fs::read_to_string(config.output.work_dir.join("talk_transcription.txt")).unwrap();
    let lines: Vec<&str> = transcript.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Chunk 1: heard 120000 samples");
    assert_eq!(lines[1], "Chunk 3: heard 10000 samples");
}

#[tokio::test]
async fn test_transcription_failure_leaves_index_absent() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "talk.wav", 250_000);

    let command = write_stub_filter(dir.path(), None);
    let config = test_config(dir.path(), command);

    let mut runner =
        PipelineRunner::with_recognizer(config.clone(), Box::new(FailNthRecognizer::new(2)))
            .await
            .unwrap();
    let summary = runner.process_directory(&audio_dir).await.unwrap();

    assert_eq!(summary.chunks_transcribed, 2);
    assert_eq!(summary.chunks_skipped, 1);

    let transcript =
        std::fs::read_to_string(config.output.work_dir.join("talk_transcription.txt")).unwrap();
    let lines: Vec<&str> = transcript.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Chunk 1: "));
    assert!(lines[1].starts_with("Chunk 3: "));
}

#[tokio::test]
async fn test_zero_duration_recording_goes_straight_to_done() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "silence.wav", 0);

    let command = write_stub_filter(dir.path(), None);
    let config = test_config(dir.path(), command);

    let mut runner = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    let summary = runner.process_directory(&audio_dir).await.unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.chunks_transcribed, 0);
    assert_eq!(summary.chunks_skipped, 0);
    // No chunk ever succeeded, so no transcript artifact exists.
    assert!(!config.output.work_dir.join("silence_transcription.txt").exists());
}

#[tokio::test]
async fn test_no_staging_files_survive_a_run() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "talk.wav", 250_000);

    let command = write_stub_filter(dir.path(), Some(2));
    let config = test_config(dir.path(), command);

    let mut runner = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    runner.process_directory(&audio_dir).await.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(&config.output.work_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["run_summary.json", "talk_transcription.txt"]);
}

#[tokio::test]
async fn test_unreadable_source_does_not_stop_the_batch() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    std::fs::write(audio_dir.join("broken.wav"), b"this is not wav data").unwrap();
    write_recording(&audio_dir, "talk.wav", 5_000);

    let command = write_stub_filter(dir.path(), None);
    let config = test_config(dir.path(), command);

    let mut runner = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    let summary = runner.process_directory(&audio_dir).await.unwrap();

    assert_eq!(summary.total_sources, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    // The readable file still produced its transcript.
    assert!(config.output.work_dir.join("talk_transcription.txt").exists());
}

#[tokio::test]
async fn test_missing_filter_tool_is_fatal_before_processing() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "talk.wav", 5_000);

    let config = test_config(dir.path(), "definitely-not-a-real-filter".to_string());

    let result = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer)).await;
    assert!(matches!(result, Err(PipelineError::ToolMissing(_))));
    // Setup failed, so no source produced a transcript.
    assert!(!config.output.work_dir.join("talk_transcription.txt").exists());
}

#[tokio::test]
async fn test_unbindable_model_is_fatal_before_processing() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "talk.wav", 5_000);

    let command = write_stub_filter(dir.path(), None);
    let mut config = test_config(dir.path(), command);
    config.transcription.model_path = PathBuf::from("/nonexistent/ggml-model.bin");

    let result = PipelineRunner::new(config.clone()).await;
    assert!(matches!(result, Err(PipelineError::ModelBinding(_))));
    assert!(!config.output.work_dir.join("talk_transcription.txt").exists());
}

#[tokio::test]
async fn test_empty_directory_yields_empty_summary() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();

    let command = write_stub_filter(dir.path(), None);
    let config = test_config(dir.path(), command);

    let mut runner = PipelineRunner::with_recognizer(config, Box::new(MockRecognizer))
        .await
        .unwrap();
    let summary = runner.process_directory(&audio_dir).await.unwrap();

    assert_eq!(summary.total_sources, 0);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_rerun_reproduces_identical_transcripts() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "talk.wav", 250_000);

    let command = write_stub_filter(dir.path(), Some(2));
    let config = test_config(dir.path(), command);

    let mut first = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    first.process_directory(&audio_dir).await.unwrap();
    let first_transcript =
        std::fs::read(config.output.work_dir.join("talk_transcription.txt")).unwrap();

    // Clear the output directory and run again.
    std::fs::remove_dir_all(&config.output.work_dir).unwrap();
    let mut second = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    second.process_directory(&audio_dir).await.unwrap();
    let second_transcript =
        std::fs::read(config.output.work_dir.join("talk_transcription.txt")).unwrap();

    assert_eq!(first_transcript, second_transcript);
}

#[tokio::test]
async fn test_multiple_sources_processed_in_sorted_order() {
    let dir = TempDir::new().unwrap();
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).unwrap();
    write_recording(&audio_dir, "zebra.wav", 5_000);
    write_recording(&audio_dir, "alpha.wav", 5_000);

    let command = write_stub_filter(dir.path(), None);
    let config = test_config(dir.path(), command);

    let mut runner = PipelineRunner::with_recognizer(config.clone(), Box::new(MockRecognizer))
        .await
        .unwrap();
    let summary = runner.process_directory(&audio_dir).await.unwrap();

    let order: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.source_id.as_str())
        .collect();
    assert_eq!(order, vec!["alpha", "zebra"]);
    assert!(config.output.work_dir.join("alpha_transcription.txt").exists());
    assert!(config.output.work_dir.join("zebra_transcription.txt").exists());
}
