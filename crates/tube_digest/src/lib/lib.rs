pub mod adapters;
pub mod app;
pub mod captions;
pub mod chat;
pub mod error;
pub mod job;
pub mod paths;
pub mod pipeline;
pub mod tracing;
pub mod transcript;

pub use adapters::{
    AudioSegmenter, ChatMessage, ChatModel, FetchOutcome, MediaSource, SourceEvent, Summarizer,
    Transcriber,
};
pub use app::AppState;
pub use chat::{ChatManager, ChatSettings, SendOutcome};
pub use error::Error;
pub use job::registry::JobRegistry;
pub use job::{JobSnapshot, JobStatus, SummaryJob};
pub use paths::ContentPaths;
pub use pipeline::{SummaryPipeline, SummaryPipelineBuilder};
pub use transcript::Segment;
