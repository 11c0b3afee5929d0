use std::path::PathBuf;

use storyreel_core::error::CoreError;
use storyreel_core::types::StoryId;
use storyreel_render::retry::RenderError;
use storyreel_structuring::StructuringError;

/// Journal or image file failures.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Journal serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("No journal on disk for story {0}")]
    MissingJournal(StoryId),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Any failure surfaced by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Prompt structuring failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
