//! Drives each story from submission to `completed` or `failed`.
//!
//! Per story, in the background and strictly sequentially:
//!
//! 1. render every scene in order, failing the story on the first
//!    exhausted render;
//! 2. optionally post-process the full set, falling back to the
//!    unprocessed images on any post-processing failure;
//! 3. save `scene_<n>.png` files, then record the paths in the journal and
//!    the in-memory record and mark the story `completed`.
//!
//! Any error in 1-3 marks the story `failed`. Recording that failure in the
//! journal is best-effort; the in-memory status is authoritative.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use storyreel_core::error::CoreError;
use storyreel_core::request::CreateStoryRequest;
use storyreel_core::story::{StoryRecord, StoryStatus, StorySummary};
use storyreel_core::types::StoryId;
use storyreel_render::rendered::RenderedImage;
use storyreel_render::retry::RetryingRenderClient;
use storyreel_structuring::StoryStructurer;
use uuid::Uuid;

use crate::best_effort::BestEffort;
use crate::error::{PersistenceError, PipelineError};
use crate::journal::StoryJournal;
use crate::postprocess::{run_postprocessor, Postprocessor};
use crate::prepare::prepare_story;
use crate::store::StoryStore;
use crate::tasks::TaskQueue;

/// Per-story rendering options taken from the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    pub quality: Option<u8>,
    pub remove_watermarks: bool,
}

impl From<&CreateStoryRequest> for GenerationOptions {
    fn from(request: &CreateStoryRequest) -> Self {
        Self {
            quality: request.quality,
            remove_watermarks: request.remove_watermarks,
        }
    }
}

#[derive(Clone)]
pub struct PipelineOrchestrator {
    store: Arc<StoryStore>,
    structurer: Arc<dyn StoryStructurer>,
    renderer: RetryingRenderClient,
    postprocessor: Option<Arc<dyn Postprocessor>>,
    tasks: TaskQueue,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<StoryStore>,
        structurer: Arc<dyn StoryStructurer>,
        renderer: RetryingRenderClient,
        postprocessor: Option<Arc<dyn Postprocessor>>,
    ) -> Self {
        Self {
            store,
            structurer,
            renderer,
            postprocessor,
            tasks: TaskQueue::new(),
        }
    }

    pub fn store(&self) -> &Arc<StoryStore> {
        &self.store
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Structure the request, register the story, write its journal, and
    /// schedule its background pipeline.
    ///
    /// The returned snapshot has status `processing` and no images. The
    /// record is readable through [`fetch`](Self::fetch) before the
    /// background work starts. Refused without side effects once
    /// [`shutdown`](Self::shutdown) has begun.
    pub async fn submit(&self, request: CreateStoryRequest) -> Result<StoryRecord, PipelineError> {
        if self.tasks.is_closed() {
            return Err(shutting_down().into());
        }
        let draft = prepare_story(self.structurer.as_ref(), &request).await?;
        let options = GenerationOptions::from(&request);

        let story_id = Uuid::new_v4();
        let output_dir = self.store.journals().story_dir(story_id);
        let mut record = StoryRecord::pending(
            story_id,
            draft,
            output_dir.display().to_string(),
            Utc::now(),
        );
        record.start_processing()?;

        self.store.create(record.clone()).await?;
        if let Err(e) = self
            .store
            .journals()
            .create(&StoryJournal::from_record(&record))
            .await
        {
            self.discard(story_id).await;
            return Err(e.into());
        }

        // Shutdown may have started while structuring was in flight.
        let this = self.clone();
        if let Err(e) = self.tasks.spawn(story_id, async move {
            this.run(story_id, options).await;
        }) {
            self.discard(story_id).await;
            return Err(e.into());
        }

        tracing::info!(
            story_id = %story_id,
            scenes = record.scenes.len(),
            quality = ?options.quality,
            remove_watermarks = options.remove_watermarks,
            "Story submitted",
        );
        Ok(record)
    }

    /// Undo a registration whose id was never returned to the caller.
    async fn discard(&self, story_id: StoryId) {
        self.store.remove(story_id).await;
        self.store
            .journals()
            .remove(story_id)
            .await
            .best_effort("remove unscheduled story");
    }

    // -----------------------------------------------------------------------
    // Background pipeline
    // -----------------------------------------------------------------------

    /// Background entry point for one story. Never returns an error; the
    /// outcome is recorded on the story.
    pub async fn run(&self, story_id: StoryId, options: GenerationOptions) {
        match self.execute(story_id, options).await {
            Ok(()) => tracing::info!(story_id = %story_id, "Story completed"),
            Err(e) => self.record_failure(story_id, &e).await,
        }
    }

    async fn execute(
        &self,
        story_id: StoryId,
        options: GenerationOptions,
    ) -> Result<(), PipelineError> {
        let record = self
            .store
            .resident(story_id)
            .await
            .ok_or_else(|| CoreError::not_found("Story", story_id))?;

        let mut images = Vec::with_capacity(record.scenes.len());
        for scene in &record.scenes {
            tracing::info!(
                story_id = %story_id,
                scene = scene.scene_number,
                total = record.scenes.len(),
                backend = self.renderer.backend_name(),
                "Rendering scene",
            );
            let image = self
                .renderer
                .render(&scene.prompt, &scene.negative_prompt, options.quality)
                .await?;
            images.push(image);
        }

        let images = self.postprocess(story_id, options, images).await;

        let journals = self.store.journals();
        let mut paths = Vec::with_capacity(images.len());
        for (scene, image) in record.scenes.iter().zip(&images) {
            let png = image
                .encode_png()
                .map_err(|e| PersistenceError::Encode(e.to_string()))?;
            let path = journals
                .write_image(story_id, scene.scene_number, &png)
                .await?;
            paths.push(path.display().to_string());
        }

        let completed_at = Utc::now();
        journals
            .update(story_id, |journal| {
                journal.status = StoryStatus::Completed;
                journal.image_paths = paths.clone();
                journal.completed_at = Some(completed_at);
            })
            .await?;
        self.store
            .update(story_id, |record| record.complete(paths, completed_at))
            .await?;

        Ok(())
    }

    /// Apply the post-processor if requested. Failures fall back to the
    /// unprocessed images.
    async fn postprocess(
        &self,
        story_id: StoryId,
        options: GenerationOptions,
        images: Vec<RenderedImage>,
    ) -> Vec<RenderedImage> {
        let Some(postprocessor) = self
            .postprocessor
            .as_deref()
            .filter(|_| options.remove_watermarks)
        else {
            return images;
        };

        match run_postprocessor(postprocessor, &images).await {
            Ok(processed) => {
                tracing::info!(
                    story_id = %story_id,
                    postprocessor = postprocessor.name(),
                    "Post-processing applied",
                );
                processed
            }
            Err(e) => {
                tracing::warn!(
                    story_id = %story_id,
                    postprocessor = postprocessor.name(),
                    error = %e,
                    "Post-processing failed, using unprocessed images",
                );
                images
            }
        }
    }

    /// Mark the story failed in memory, then best-effort in the journal.
    async fn record_failure(&self, story_id: StoryId, error: &PipelineError) {
        let message = error.to_string();
        let failed_at = Utc::now();
        tracing::error!(story_id = %story_id, error = %message, "Story failed");

        self.store
            .update(story_id, |record| record.fail(message.clone(), failed_at))
            .await
            .best_effort("mark story failed");

        self.store
            .journals()
            .update(story_id, |journal| {
                journal.status = StoryStatus::Failed;
                journal.error = Some(message.clone());
                journal.completed_at = Some(failed_at);
            })
            .await
            .best_effort("record failure in journal");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current projection of a story, resident or archived.
    pub async fn fetch(&self, story_id: StoryId) -> Result<StoryRecord, PipelineError> {
        self.store.get(story_id).await
    }

    /// Story summaries, newest first, paginated.
    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StorySummary>, PipelineError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// PNG bytes of one scene. Not found when the story, the scene, or the
    /// saved file does not exist yet.
    pub async fn scene_image(
        &self,
        story_id: StoryId,
        scene_number: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        let record = self.fetch(story_id).await?;
        let scene = record
            .scene(scene_number)
            .ok_or_else(|| CoreError::not_found("Scene", format!("{story_id}/{scene_number}")))?;
        let path = scene.image_path.as_deref().ok_or_else(|| {
            CoreError::not_found("Scene image", format!("{story_id}/{scene_number}"))
        })?;

        self.store
            .journals()
            .read_file(std::path::Path::new(path))
            .await?
            .ok_or_else(|| {
                CoreError::not_found("Scene image", format!("{story_id}/{scene_number}")).into()
            })
    }

    /// Stop accepting new stories and wait for running pipelines.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tasks.drain(timeout).await
    }
}

fn shutting_down() -> CoreError {
    CoreError::Conflict("Not accepting new stories while shutting down".to_string())
}
