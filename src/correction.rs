//! Post-hoc spelling correction over finished transcripts.
//!
//! An independent pass over the emitted `*_transcription.txt` files: each
//! line is rewritten by a correction model and the result saved as a
//! `*_corrected.txt` copy. The pass never touches the originals and an
//! unreachable corrector skips the pass rather than failing the run.

use crate::config::CorrectionConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const CORRECTION_PROMPT: &str = "You correct spelling and transcription errors in a single line of \
transcribed speech. Return only the corrected line, with no commentary, keeping the original \
language and wording as close as possible.";

/// Line-by-line text correction service.
#[async_trait]
pub trait TextCorrector: Send + Sync {
    async fn correct_line(&self, line: &str) -> Result<String>;
    async fn is_available(&self) -> bool;
}

/// Spelling corrector backed by an OpenAI-compatible chat endpoint.
pub struct SpellingCorrector {
    config: CorrectionConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl SpellingCorrector {
    pub fn new(config: CorrectionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextCorrector for SpellingCorrector {
    async fn correct_line(&self, line: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: CORRECTION_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: line.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending correction request to {}", self.config.endpoint);

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("correction API error {}: {}", status, text));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .ok_or_else(|| anyhow!("no choices in correction response"))?
            .message
            .content
            .clone();

        // Models sometimes pad the answer; the corrected line is the first
        // non-empty one.
        let corrected = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string();

        Ok(corrected)
    }

    async fn is_available(&self) -> bool {
        let health_endpoint = self
            .config
            .endpoint
            .replace("/v1/chat/completions", "/health");

        match self.client.get(&health_endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Apply the corrector to every transcript in `transcript_dir`, writing
/// corrected copies into `corrected_dir`. Returns the number of files
/// corrected.
pub async fn correct_transcripts(
    corrector: &dyn TextCorrector,
    transcript_dir: &Path,
    corrected_dir: &Path,
) -> Result<usize> {
    if !corrector.is_available().await {
        warn!("Correction service unavailable, skipping the spelling-correction pass");
        return Ok(0);
    }

    tokio::fs::create_dir_all(corrected_dir).await?;

    let mut corrected_count = 0;
    let mut entries = tokio::fs::read_dir(transcript_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !file_name.ends_with("_transcription.txt") {
            continue;
        }

        let output_path = corrected_dir.join(file_name.replace("_transcription", "_corrected"));
        info!("📝 Correcting {}...", file_name);

        let content = tokio::fs::read_to_string(&path).await?;
        let mut corrected_lines = Vec::new();

        for line in content.lines() {
            let (prefix, text) = split_chunk_prefix(line);
            if text.trim().is_empty() {
                corrected_lines.push(line.to_string());
                continue;
            }
            match corrector.correct_line(text.trim()).await {
                Ok(corrected) => corrected_lines.push(format!("{}{}", prefix, corrected)),
                Err(e) => {
                    // Keep the original line; a bad correction call must not
                    // lose transcript content.
                    warn!("Correction failed for a line of {}: {}", file_name, e);
                    corrected_lines.push(line.to_string());
                }
            }
        }

        let mut output = corrected_lines.join("\n");
        output.push('\n');
        tokio::fs::write(&output_path, output).await?;
        info!("✅ Corrected file saved: {}", output_path.display());
        corrected_count += 1;
    }

    Ok(corrected_count)
}

/// Split the `Chunk N: ` prefix off a transcript line, so correction only
/// rewrites the recognized text.
fn split_chunk_prefix(line: &str) -> (&str, &str) {
    if let Some(rest) = line.strip_prefix("Chunk ") {
        if let Some(colon) = rest.find(": ") {
            if !rest[..colon].is_empty() && rest[..colon].chars().all(|c| c.is_ascii_digit()) {
                let split = "Chunk ".len() + colon + 2;
                return (&line[..split], &line[split..]);
            }
        }
    }
    ("", line)
}
