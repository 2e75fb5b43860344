use std::sync::{Arc, Mutex};

use tube_digest::adapters::{FetchOutcome, MediaSource, SourceEvent};
use tube_digest::paths::ContentPaths;
use tube_digest::transcript::{self, Segment};
use video_datastore::VideoMetaEntry;

/// Scripted acquisition: either "captions found" (writes the transcription
/// artifact directly) or "audio downloaded" (writes a dummy audio file and
/// reports progress).
#[derive(Clone)]
pub struct MockMediaSource {
    pub paths: ContentPaths,
    pub captions: bool,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_with: Option<String>,
}

impl MockMediaSource {
    pub fn with_captions(paths: ContentPaths) -> Self {
        Self {
            paths,
            captions: true,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn with_audio(paths: ContentPaths) -> Self {
        Self {
            captions: false,
            ..Self::with_captions(paths)
        }
    }

    pub fn failing(paths: ContentPaths, msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::with_captions(paths)
        }
    }

    pub fn meta(video_id: &str) -> VideoMetaEntry {
        VideoMetaEntry {
            video_id: video_id.to_string(),
            video_thumbnail_url: "https://i.ytimg.com/vi/mock/hq720.jpg".to_string(),
            video_name: "Mock video".to_string(),
            creator_name: "Mock creator".to_string(),
            length: 4800.0,
            upload_date: "2024-06-01".to_string(),
            ..Default::default()
        }
    }
}

pub fn caption_segments() -> Vec<Segment> {
    vec![
        Segment {
            start: 0.0,
            end: 4.0,
            text: "welcome to the video".to_string(),
        },
        Segment {
            start: 4.0,
            end: 9.0,
            text: "today we build things".to_string(),
        },
    ]
}

impl MediaSource for MockMediaSource {
    type Error = anyhow::Error;

    async fn fetch<F>(&self, video_id: &str, on_event: F) -> anyhow::Result<FetchOutcome>
    where
        F: Fn(SourceEvent) + Send + Sync,
    {
        self.calls.lock().unwrap().push(video_id.to_string());
        if let Some(ref msg) = self.fail_with {
            anyhow::bail!("{msg}");
        }

        on_event(SourceEvent::Metadata(Self::meta(video_id)));

        if self.captions {
            on_event(SourceEvent::CaptionsFound);
            transcript::write_segments(&self.paths.transcription(video_id), &caption_segments())?;
            Ok(FetchOutcome {
                captions_ready: true,
            })
        } else {
            on_event(SourceEvent::DownloadStarted);
            on_event(SourceEvent::DownloadProgress("37.4%".to_string()));
            on_event(SourceEvent::ExtractingAudio);
            std::fs::create_dir_all(self.paths.downloads_dir())?;
            std::fs::write(self.paths.audio(video_id), b"mock mp3")?;
            Ok(FetchOutcome {
                captions_ready: false,
            })
        }
    }
}
