use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tube_digest::adapters::Summarizer;

/// Records every `(section, current_summary)` pair and returns a fixed
/// summary. An optional gate holds the call until the test releases it.
#[derive(Clone)]
pub struct MockSummarizer {
    pub summary: String,
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
    pub gate: Option<Arc<Notify>>,
    pub fail_with: Option<String>,
}

impl MockSummarizer {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            fail_with: None,
        }
    }

    pub fn gated(summary: &str, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(summary)
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new("")
        }
    }
}

impl Summarizer for MockSummarizer {
    type Error = anyhow::Error;

    async fn extend_summary(&self, section: &str, current_summary: &str) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((section.to_string(), current_summary.to_string()));
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        if let Some(ref msg) = self.fail_with {
            anyhow::bail!("{msg}");
        }
        Ok(self.summary.clone())
    }
}
