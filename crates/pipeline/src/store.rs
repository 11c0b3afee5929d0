//! In-memory story registry backed by the on-disk journals.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use storyreel_core::error::CoreError;
use storyreel_core::story::{StoryRecord, StorySummary};
use storyreel_core::types::StoryId;
use tokio::sync::RwLock;

use crate::error::{PersistenceError, PipelineError};
use crate::journal::JournalStore;

/// Owns the map from story id to [`StoryRecord`].
///
/// Each story is written only by its own pipeline; the lock is held for
/// single-key operations only, never across an await on I/O.
pub struct StoryStore {
    stories: RwLock<HashMap<StoryId, StoryRecord>>,
    journals: Arc<JournalStore>,
}

impl StoryStore {
    pub fn new(journals: Arc<JournalStore>) -> Self {
        Self {
            stories: RwLock::new(HashMap::new()),
            journals,
        }
    }

    pub fn journals(&self) -> &Arc<JournalStore> {
        &self.journals
    }

    /// Insert a new record. Fails if the id is already resident.
    pub async fn create(&self, record: StoryRecord) -> Result<(), CoreError> {
        let mut stories = self.stories.write().await;
        if stories.contains_key(&record.story_id) {
            return Err(CoreError::Conflict(format!(
                "Story {} already exists",
                record.story_id
            )));
        }
        stories.insert(record.story_id, record);
        Ok(())
    }

    /// Snapshot of a resident record.
    pub async fn resident(&self, story_id: StoryId) -> Option<StoryRecord> {
        self.stories.read().await.get(&story_id).cloned()
    }

    /// Resident record, or an `archived` reconstruction from disk.
    pub async fn get(&self, story_id: StoryId) -> Result<StoryRecord, PipelineError> {
        if let Some(record) = self.resident(story_id).await {
            return Ok(record);
        }
        match self.journals.read(story_id).await? {
            Some(journal) => Ok(journal.into_archived_record(&self.journals.story_dir(story_id))),
            None => Err(CoreError::not_found("Story", story_id).into()),
        }
    }

    /// Mutate a resident record in place.
    pub async fn update<T, F>(&self, story_id: StoryId, mutate: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut StoryRecord) -> Result<T, CoreError>,
    {
        let mut stories = self.stories.write().await;
        let record = stories
            .get_mut(&story_id)
            .ok_or_else(|| CoreError::not_found("Story", story_id))?;
        mutate(record)
    }

    pub async fn remove(&self, story_id: StoryId) -> Option<StoryRecord> {
        self.stories.write().await.remove(&story_id)
    }

    /// Summaries of resident stories plus `archived` ones found on disk,
    /// newest first.
    pub async fn list(&self) -> Result<Vec<StorySummary>, PersistenceError> {
        let mut summaries: Vec<StorySummary> = self
            .stories
            .read()
            .await
            .values()
            .map(StoryRecord::summary)
            .collect();
        let resident: HashSet<StoryId> = summaries.iter().map(|s| s.story_id).collect();

        summaries.extend(
            self.journals
                .scan()
                .await?
                .iter()
                .filter(|journal| !resident.contains(&journal.story_id))
                .map(|journal| journal.archived_summary()),
        );

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// Number of resident stories.
    pub async fn len(&self) -> usize {
        self.stories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
