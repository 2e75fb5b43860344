//! Groq-hosted models: speech-to-text, summarization and chat.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel, Summarizer, Transcriber};
use crate::transcript::Segment;

const TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";
const SUMMARIZATION_MODEL: &str = "openai/gpt-oss-120b";
const CHAT_MODEL: &str = "moonshotai/kimi-k2-instruct";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a summarizer agent. First, based on the content type, decide what method of organizing the data would be most helpful for the user. For example, if it's informative, summarize as a tutorial. If it's a funny video, describe what happens. If it's a course, create sections and summarize those sections etc. Use markdown, BUT DO NOT INCLUDE ```markdown```. Then, summarize the video in that way. DO NOT USE EMOJIS. If you are given a current summary, simply extend it to include the new data as instructed. Part of your input is [H:MM:SS] timestamps. Include those when referencing anything from the transcription";

#[derive(Debug, thiserror::Error)]
pub enum GroqError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("model returned no content")]
    EmptyResponse,
}

/// Client for the Groq OpenAI-compatible API. One instance serves all three
/// model roles, so it is cloned into each consumer.
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        GroqClient {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn send_transcribe_request(
        &self,
        file: &Path,
        context: Option<&str>,
    ) -> Result<TranscribeResponse, GroqError> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chunk.mp3".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("language", "en")
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", part);

        if let Some(context) = context.filter(|c| !c.is_empty()) {
            form = form.text("prompt", context.to_string());
        }

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(GroqError::Api { status, message });
        }

        Ok(resp.json::<TranscribeResponse>().await?)
    }

    async fn send_completion_request(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, GroqError> {
        let body = CompletionRequest {
            messages,
            model: SUMMARIZATION_MODEL,
            stream: false,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(GroqError::Api { status, message });
        }

        let response = resp.json::<CompletionResponse>().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GroqError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    model: &'static str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl Transcriber for GroqClient {
    type Error = GroqError;

    async fn transcribe(
        &self,
        chunk: &Path,
        context: Option<&str>,
    ) -> Result<Vec<Segment>, Self::Error> {
        let response = self
            .send_transcribe_request(chunk, context)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to transcribe audio chunk"))?;
        Ok(response.segments)
    }
}

impl Summarizer for GroqClient {
    type Error = GroqError;

    async fn extend_summary(
        &self,
        section: &str,
        current_summary: &str,
    ) -> Result<String, Self::Error> {
        let messages = [
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(format!("Please summarize this: {section}")),
            ChatMessage::user(format!(
                "Here is the current summary. Combine it with the transcription below to form a more complete summary. If there is no current summary, just write an initial one: {current_summary}"
            )),
        ];

        self.send_completion_request(&messages)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to extend summary"))
    }
}

impl ChatModel for GroqClient {
    type Error = GroqError;

    async fn stream_reply<F>(&self, messages: &[ChatMessage], on_token: F) -> Result<(), Self::Error>
    where
        F: Fn(&str) + Send + Sync,
    {
        let body = CompletionRequest {
            messages,
            model: CHAT_MODEL,
            stream: true,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(GroqError::Api { status, message });
        }

        let mut stream = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        'stream: while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    break 'stream;
                }

                // Malformed chunks are skipped rather than aborting the reply.
                let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                    continue;
                };
                if let Some(content) = parsed
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.as_deref())
                {
                    if !content.is_empty() {
                        on_token(content);
                    }
                }
            }
        }

        Ok(())
    }
}
