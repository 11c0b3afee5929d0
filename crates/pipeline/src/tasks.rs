//! Background task queue: one task per story id.
//!
//! Tasks are fire-and-forget and never cancelled. Shutdown closes the
//! queue and waits (bounded) for in-flight tasks to finish.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use storyreel_core::error::CoreError;
use storyreel_core::types::StoryId;
use tokio_util::task::TaskTracker;

#[derive(Clone, Default)]
pub struct TaskQueue {
    tracker: TaskTracker,
    running: Arc<Mutex<HashSet<StoryId>>>,
}

/// Removes the story id from the running set when the task ends, even if
/// it panicked.
struct RunningGuard {
    story_id: StoryId,
    running: Arc<Mutex<HashSet<StoryId>>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.story_id);
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` for `story_id`. Fails if the queue is closed or a
    /// task for the same story is still running.
    pub fn spawn<F>(&self, story_id: StoryId, task: F) -> Result<(), CoreError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            return Err(CoreError::Conflict(
                "Task queue is shutting down".to_string(),
            ));
        }
        {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            if !running.insert(story_id) {
                return Err(CoreError::Conflict(format!(
                    "A pipeline is already running for story {story_id}"
                )));
            }
        }

        let guard = RunningGuard {
            story_id,
            running: Arc::clone(&self.running),
        };
        self.tracker.spawn(async move {
            let _guard = guard;
            task.await;
        });
        Ok(())
    }

    /// `true` once [`drain`](Self::drain) has been called.
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    pub fn is_running(&self, story_id: StoryId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&story_id)
    }

    pub fn active_count(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop accepting tasks and wait up to `timeout` for running ones.
    /// Returns `true` if every task finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let remaining = self.active_count();
        if remaining > 0 {
            tracing::info!(remaining, "Waiting for story pipelines to finish");
        }
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.active_count(),
                    "Shutdown timeout reached with pipelines still running",
                );
                false
            }
        }
    }
}
