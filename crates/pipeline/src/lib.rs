//! The story generation pipeline.
//!
//! A request is structured and assembled synchronously by
//! [`prepare::prepare_story`], registered in the [`store::StoryStore`] with
//! its initial journal written by [`journal::JournalStore`], and then driven
//! to `completed` or `failed` by a background task scheduled on the
//! [`tasks::TaskQueue`]. [`orchestrator::PipelineOrchestrator`] ties these
//! together and is the only writer of a story while it is active.

pub mod best_effort;
pub mod error;
pub mod journal;
pub mod orchestrator;
pub mod postprocess;
pub mod prepare;
pub mod store;
pub mod tasks;

pub use error::{PersistenceError, PipelineError};
pub use orchestrator::{GenerationOptions, PipelineOrchestrator};
