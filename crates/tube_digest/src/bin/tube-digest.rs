use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use video_datastore::{JsonVideoStore, MetaStore};

use tube_digest::adapters::groq::GroqClient;
use tube_digest::adapters::ytdlp::{FfmpegSegmenter, YtDlpSource};
use tube_digest::app::{self, AppState};
use tube_digest::chat::{ChatManager, ChatSettings};
use tube_digest::job::registry::JobRegistry;
use tube_digest::paths::ContentPaths;
use tube_digest::pipeline::SummaryPipelineBuilder;
use tube_digest::tracing::init_tracing_subscriber;

#[derive(Parser)]
#[command(name = "tube-digest", about = "YouTube summarization and chat server")]
struct Cli {
    /// Address to serve the HTTP API on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8010")]
    bind: String,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY")]
    groq_key: String,

    /// Path to the yt-dlp binary
    #[arg(long, env = "YTDLP_BIN")]
    ytdlp_bin: PathBuf,

    /// Path to the ffmpeg binary
    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    ffmpeg_bin: PathBuf,

    /// Directory for artifacts and the metadata store
    #[arg(long, env = "CONTENT_DIR", default_value = "./content")]
    content_dir: PathBuf,

    /// Maximum queued intake requests before POSTs are rejected as busy
    #[arg(long, default_value = "1024")]
    intake_capacity: usize,

    /// Persist "Error: ..." chat replies to the transcript like normal replies
    #[arg(
        long,
        env = "PERSIST_ERROR_REPLIES",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    persist_error_replies: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let paths = ContentPaths::new(&cli.content_dir);
    paths.ensure_dirs()?;

    tracing::info!(path = %paths.db_file().display(), "Opening metadata store");
    let store: Arc<dyn MetaStore + Send + Sync> = Arc::new(JsonVideoStore::open(paths.db_file())?);
    let registry = Arc::new(JobRegistry::new(Arc::clone(&store)));

    // One Groq client serves transcription, summarization and chat.
    let groq = GroqClient::new(&cli.groq_key);

    tracing::info!("Starting pipeline workers");
    let pipeline = SummaryPipelineBuilder::new(Arc::clone(&registry), paths.clone())
        .source(YtDlpSource::new(&cli.ytdlp_bin, paths.clone()))
        .segmenter(FfmpegSegmenter::new(&cli.ffmpeg_bin))
        .transcriber(groq.clone())
        .summarizer(groq.clone())
        .intake_capacity(cli.intake_capacity)
        .build();
    let intake = pipeline.start();

    let chat = ChatManager::new(
        groq,
        paths.clone(),
        ChatSettings {
            persist_error_replies: cli.persist_error_replies,
        },
    );

    let state = AppState {
        registry,
        chat,
        store,
        intake,
        paths,
    };

    app::serve(&cli.bind, state).await
}
