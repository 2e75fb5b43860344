use std::sync::Arc;

use crate::adapters::{AudioSegmenter, MediaSource, Summarizer, Transcriber};
use crate::job::registry::JobRegistry;
use crate::paths::ContentPaths;

use super::SummaryPipeline;

/// Slot-by-slot builder for [`SummaryPipeline`]. Each adapter setter fills
/// one type parameter; `build` is only available once all four are set.
pub struct SummaryPipelineBuilder<M = (), G = (), T = (), S = ()> {
    registry: Arc<JobRegistry>,
    paths: ContentPaths,
    intake_capacity: usize,
    source: M,
    segmenter: G,
    transcriber: T,
    summarizer: S,
}

impl SummaryPipelineBuilder {
    pub fn new(registry: Arc<JobRegistry>, paths: ContentPaths) -> Self {
        Self {
            registry,
            paths,
            intake_capacity: 1024,
            source: (),
            segmenter: (),
            transcriber: (),
            summarizer: (),
        }
    }
}

impl<M, G, T, S> SummaryPipelineBuilder<M, G, T, S> {
    pub fn source<M2: MediaSource + Send + Sync + 'static>(
        self,
        source: M2,
    ) -> SummaryPipelineBuilder<M2, G, T, S> {
        SummaryPipelineBuilder {
            registry: self.registry,
            paths: self.paths,
            intake_capacity: self.intake_capacity,
            source,
            segmenter: self.segmenter,
            transcriber: self.transcriber,
            summarizer: self.summarizer,
        }
    }

    pub fn segmenter<G2: AudioSegmenter + Send + Sync + 'static>(
        self,
        segmenter: G2,
    ) -> SummaryPipelineBuilder<M, G2, T, S> {
        SummaryPipelineBuilder {
            registry: self.registry,
            paths: self.paths,
            intake_capacity: self.intake_capacity,
            source: self.source,
            segmenter,
            transcriber: self.transcriber,
            summarizer: self.summarizer,
        }
    }

    pub fn transcriber<T2: Transcriber + Send + Sync + 'static>(
        self,
        transcriber: T2,
    ) -> SummaryPipelineBuilder<M, G, T2, S> {
        SummaryPipelineBuilder {
            registry: self.registry,
            paths: self.paths,
            intake_capacity: self.intake_capacity,
            source: self.source,
            segmenter: self.segmenter,
            transcriber,
            summarizer: self.summarizer,
        }
    }

    pub fn summarizer<S2: Summarizer + Send + Sync + 'static>(
        self,
        summarizer: S2,
    ) -> SummaryPipelineBuilder<M, G, T, S2> {
        SummaryPipelineBuilder {
            registry: self.registry,
            paths: self.paths,
            intake_capacity: self.intake_capacity,
            source: self.source,
            segmenter: self.segmenter,
            transcriber: self.transcriber,
            summarizer,
        }
    }

    /// Maximum queued intake requests before POSTs are rejected as busy.
    pub fn intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity.max(1);
        self
    }
}

impl<M, G, T, S> SummaryPipelineBuilder<M, G, T, S>
where
    M: MediaSource + Send + Sync + 'static,
    G: AudioSegmenter + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    pub fn build(self) -> SummaryPipeline<M, G, T, S> {
        SummaryPipeline {
            registry: self.registry,
            paths: self.paths,
            source: self.source,
            segmenter: self.segmenter,
            transcriber: self.transcriber,
            summarizer: self.summarizer,
            intake_capacity: self.intake_capacity,
        }
    }
}
