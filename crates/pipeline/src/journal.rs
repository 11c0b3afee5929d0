//! On-disk persistence: one directory per story holding a JSON journal
//! (`prompts.json`) and one PNG per scene (`scene_<n>.png`).
//!
//! Journal writes are whole-file read/modify/write cycles, written to a
//! temp file and renamed into place. Fields this crate does not know about
//! are carried through untouched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storyreel_core::story::{scene_image_url, SceneOutput, StoryRecord, StoryStatus, StorySummary};
use storyreel_core::types::{StoryId, Timestamp};

use crate::error::PersistenceError;

/// Journal file name inside each story directory.
pub const JOURNAL_FILE: &str = "prompts.json";

/// File name of a scene image.
pub fn scene_file_name(scene_number: u32) -> String {
    format!("scene_{scene_number}.png")
}

// ---------------------------------------------------------------------------
// Journal document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalScene {
    pub scene_number: u32,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
}

/// Durable counterpart of a [`StoryRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryJournal {
    pub story_id: StoryId,
    #[serde(default)]
    pub original_prompt: String,
    pub story_title: String,
    pub visual_style: String,
    #[serde(default)]
    pub character_concept: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
    pub scenes: Vec<JournalScene>,
    pub created_at: Timestamp,
    pub status: StoryStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unknown fields, preserved across rewrites.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoryJournal {
    pub fn from_record(record: &StoryRecord) -> Self {
        Self {
            story_id: record.story_id,
            original_prompt: record.original_prompt.clone(),
            story_title: record.story_title.clone(),
            visual_style: record.visual_style.clone(),
            character_concept: record.character_concept.clone(),
            character_name: record.character_name.clone(),
            scenes: record
                .scenes
                .iter()
                .map(|s| JournalScene {
                    scene_number: s.scene_number,
                    prompt: s.prompt.clone(),
                    negative_prompt: s.negative_prompt.clone(),
                })
                .collect(),
            created_at: record.created_at,
            status: record.status,
            image_paths: record.images.clone(),
            completed_at: record.completed_at,
            error: record.error.clone(),
            extra: serde_json::Map::new(),
        }
    }

    /// Reconstruct a record for a story that is not resident in memory.
    /// Its status is always `archived`.
    pub fn into_archived_record(self, output_dir: &Path) -> StoryRecord {
        let story_id = self.story_id;
        let scenes = self
            .scenes
            .into_iter()
            .enumerate()
            .map(|(index, scene)| {
                let image_path = self.image_paths.get(index).cloned();
                SceneOutput {
                    scene_number: scene.scene_number,
                    prompt: scene.prompt,
                    negative_prompt: scene.negative_prompt,
                    image_url: image_path
                        .as_ref()
                        .map(|_| scene_image_url(story_id, scene.scene_number)),
                    image_path,
                }
            })
            .collect();

        StoryRecord {
            story_id,
            status: StoryStatus::Archived,
            original_prompt: self.original_prompt,
            story_title: self.story_title,
            visual_style: self.visual_style,
            character_concept: self.character_concept,
            character_name: self.character_name,
            scenes,
            images: self.image_paths,
            output_dir: output_dir.display().to_string(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            error: self.error,
        }
    }

    /// Listing entry with status `archived`.
    pub fn archived_summary(&self) -> StorySummary {
        StorySummary {
            story_id: self.story_id,
            status: StoryStatus::Archived,
            story_title: self.story_title.clone(),
            visual_style: self.visual_style.clone(),
            scene_count: self.scenes.len(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Filesystem layout rooted at the outputs directory.
#[derive(Debug, Clone)]
pub struct JournalStore {
    root: PathBuf,
}

impl JournalStore {
    /// Open (and create if needed) the outputs root.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| PersistenceError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn story_dir(&self, story_id: StoryId) -> PathBuf {
        self.root.join(story_id.to_string())
    }

    pub fn journal_path(&self, story_id: StoryId) -> PathBuf {
        self.story_dir(story_id).join(JOURNAL_FILE)
    }

    pub fn image_path(&self, story_id: StoryId, scene_number: u32) -> PathBuf {
        self.story_dir(story_id).join(scene_file_name(scene_number))
    }

    /// Create the story directory and write its first journal.
    pub async fn create(&self, journal: &StoryJournal) -> Result<(), PersistenceError> {
        let dir = self.story_dir(journal.story_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PersistenceError::io(&dir, e))?;
        self.write(journal).await?;
        tracing::debug!(story_id = %journal.story_id, "Journal created");
        Ok(())
    }

    /// Read a story's journal; `None` if the story has none on disk.
    pub async fn read(&self, story_id: StoryId) -> Result<Option<StoryJournal>, PersistenceError> {
        let path = self.journal_path(story_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    /// Delete the story directory and everything in it. A missing
    /// directory is not an error.
    pub async fn remove(&self, story_id: StoryId) -> Result<(), PersistenceError> {
        let dir = self.story_dir(story_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::io(dir, e)),
        }
    }

    /// Read the whole journal, apply `mutate`, and write it back.
    pub async fn update<F>(
        &self,
        story_id: StoryId,
        mutate: F,
    ) -> Result<StoryJournal, PersistenceError>
    where
        F: FnOnce(&mut StoryJournal),
    {
        let mut journal = self
            .read(story_id)
            .await?
            .ok_or(PersistenceError::MissingJournal(story_id))?;
        mutate(&mut journal);
        self.write(&journal).await?;
        Ok(journal)
    }

    /// Write one scene's PNG bytes, returning the saved path.
    pub async fn write_image(
        &self,
        story_id: StoryId,
        scene_number: u32,
        png: &[u8],
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.image_path(story_id, scene_number);
        write_atomic(&path, png).await?;
        Ok(path)
    }

    /// Read a saved file; `None` if it does not exist.
    pub async fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    /// All readable journals under the root. Directories that are not
    /// story ids or whose journal is missing or unreadable are skipped.
    pub async fn scan(&self) -> Result<Vec<StoryJournal>, PersistenceError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| PersistenceError::io(&self.root, e))?;

        let mut journals = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistenceError::io(&self.root, e))?
        {
            let Some(story_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<StoryId>().ok())
            else {
                continue;
            };

            match self.read(story_id).await {
                Ok(Some(journal)) => journals.push(journal),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(story_id = %story_id, error = %e, "Skipping unreadable journal");
                }
            }
        }
        Ok(journals)
    }

    async fn write(&self, journal: &StoryJournal) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(journal)?;
        write_atomic(&self.journal_path(journal.story_id), &bytes).await
    }
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    tokio::fs::write(&temp_path, bytes)
        .await
        .map_err(|e| PersistenceError::io(&temp_path, e))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| PersistenceError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use storyreel_core::story::{ScenePrompt, StoryDraft};
    use uuid::Uuid;

    fn record(store: &JournalStore) -> StoryRecord {
        let id = Uuid::new_v4();
        StoryRecord::pending(
            id,
            StoryDraft {
                original_prompt: "a dog chasing a cat".into(),
                story_title: "The Chase".into(),
                visual_style: "cinematic".into(),
                character_concept: Some("a dog and a cat".into()),
                character_name: None,
                scenes: vec![
                    ScenePrompt {
                        prompt: "dog runs".into(),
                        negative_prompt: "blurry".into(),
                    },
                    ScenePrompt {
                        prompt: "cat hides".into(),
                        negative_prompt: "blurry".into(),
                    },
                ],
            },
            store.story_dir(id).display().to_string(),
            Utc::now(),
        )
    }

    // -- layout --------------------------------------------------------------

    #[tokio::test]
    async fn paths_follow_story_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        let id = Uuid::new_v4();

        assert_eq!(store.journal_path(id), dir.path().join(id.to_string()).join("prompts.json"));
        assert_eq!(store.image_path(id, 3), dir.path().join(id.to_string()).join("scene_3.png"));
    }

    // -- read / write --------------------------------------------------------

    #[tokio::test]
    async fn create_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        let rec = record(&store);

        store.create(&StoryJournal::from_record(&rec)).await.unwrap();
        let journal = store.read(rec.story_id).await.unwrap().unwrap();

        assert_eq!(journal.story_title, "The Chase");
        assert_eq!(journal.status, StoryStatus::Pending);
        assert_eq!(journal.scenes.len(), 2);
        assert!(journal.image_paths.is_empty());
        assert!(!store.journal_path(rec.story_id).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        assert!(store.read(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_journal_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        assert_matches!(
            store.update(Uuid::new_v4(), |_| {}).await,
            Err(PersistenceError::MissingJournal(_))
        );
    }

    #[tokio::test]
    async fn remove_deletes_story_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        let rec = record(&store);
        store.create(&StoryJournal::from_record(&rec)).await.unwrap();
        store.write_image(rec.story_id, 1, b"png").await.unwrap();

        store.remove(rec.story_id).await.unwrap();
        assert!(!store.story_dir(rec.story_id).exists());
        assert!(store.read(rec.story_id).await.unwrap().is_none());

        // Already gone.
        store.remove(rec.story_id).await.unwrap();
    }

    #[tokio::test]
    async fn update_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        let rec = record(&store);
        store.create(&StoryJournal::from_record(&rec)).await.unwrap();

        // Simulate a field written by another tool.
        let path = store.journal_path(rec.story_id);
        let mut raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        raw["curator_note"] = serde_json::json!("keep me");
        std::fs::write(&path, serde_json::to_vec(&raw).unwrap()).unwrap();

        store
            .update(rec.story_id, |j| {
                j.status = StoryStatus::Failed;
                j.error = Some("boom".into());
            })
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["curator_note"], "keep me");
        assert_eq!(raw["status"], "failed");
        assert_eq!(raw["error"], "boom");
    }

    #[tokio::test]
    async fn image_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        let id = Uuid::new_v4();
        tokio::fs::create_dir_all(store.story_dir(id)).await.unwrap();

        let path = store.write_image(id, 1, b"png-bytes").await.unwrap();
        assert_eq!(path, store.image_path(id, 1));
        assert_eq!(store.read_file(&path).await.unwrap().as_deref(), Some(&b"png-bytes"[..]));
        assert!(store.read_file(&store.image_path(id, 2)).await.unwrap().is_none());
    }

    // -- scan / archive ------------------------------------------------------

    #[tokio::test]
    async fn scan_skips_foreign_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).await.unwrap();
        let rec = record(&store);
        store.create(&StoryJournal::from_record(&rec)).await.unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-story")).unwrap();
        std::fs::create_dir_all(dir.path().join(Uuid::new_v4().to_string())).unwrap();

        let journals = store.scan().await.unwrap();
        assert_eq!(journals.len(), 1);
        assert_eq!(journals[0].story_id, rec.story_id);
    }

    #[test]
    fn archived_record_takes_image_paths_from_journal() {
        let id = Uuid::new_v4();
        let journal = StoryJournal {
            story_id: id,
            original_prompt: String::new(),
            story_title: "Old".into(),
            visual_style: "noir".into(),
            character_concept: None,
            character_name: None,
            scenes: vec![JournalScene {
                scene_number: 1,
                prompt: "p".into(),
                negative_prompt: String::new(),
            }],
            created_at: Utc::now(),
            status: StoryStatus::Completed,
            image_paths: vec!["out/scene_1.png".into()],
            completed_at: Some(Utc::now()),
            error: None,
            extra: serde_json::Map::new(),
        };

        let rec = journal.into_archived_record(Path::new("out"));
        assert_eq!(rec.status, StoryStatus::Archived);
        assert_eq!(rec.scenes[0].image_path.as_deref(), Some("out/scene_1.png"));
        assert_eq!(
            rec.scenes[0].image_url,
            Some(format!("/api/v1/stories/{id}/scenes/1/image"))
        );
    }
}
