use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tube_digest::adapters::{ChatMessage, ChatModel};

/// Streams a scripted token sequence. An optional gate holds the stream
/// until the test releases it, keeping the room busy.
#[derive(Clone)]
pub struct MockChatModel {
    pub tokens: Vec<String>,
    pub calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    pub gate: Option<Arc<Notify>>,
    pub fail_with: Option<String>,
}

impl MockChatModel {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            fail_with: None,
        }
    }

    pub fn gated(tokens: &[&str], gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(tokens)
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new(&[])
        }
    }
}

impl ChatModel for MockChatModel {
    type Error = anyhow::Error;

    async fn stream_reply<F>(&self, messages: &[ChatMessage], on_token: F) -> anyhow::Result<()>
    where
        F: Fn(&str) + Send + Sync,
    {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        if let Some(ref msg) = self.fail_with {
            anyhow::bail!("{msg}");
        }
        for token in &self.tokens {
            on_token(token);
        }
        Ok(())
    }
}
