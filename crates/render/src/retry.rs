//! Bounded retry with exponential backoff around a [`RenderBackend`].
//!
//! Every failure is treated as transient until the attempt bound is hit;
//! the caller then gets [`RenderError::Exhausted`] carrying the last cause.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, RenderBackend, RenderRequest};
use crate::rendered::RenderedImage;

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per render, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`RetryConfig::max_delay`].
pub fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Every attempt failed; `last` is the final attempt's cause.
    #[error("Rendering failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: BackendError,
    },
}

/// Render client that retries a backend with exponential backoff.
#[derive(Clone)]
pub struct RetryingRenderClient {
    backend: Arc<dyn RenderBackend>,
    config: RetryConfig,
}

impl RetryingRenderClient {
    pub fn new(backend: Arc<dyn RenderBackend>, config: RetryConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Render one image, retrying up to `max_attempts` times.
    pub async fn render(
        &self,
        prompt: &str,
        negative_prompt: &str,
        quality: Option<u8>,
    ) -> Result<RenderedImage, RenderError> {
        let request = RenderRequest {
            prompt: prompt.to_string(),
            negative_prompt: negative_prompt.to_string(),
            quality,
        };
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.backend.render(&request).await {
                Ok(image) => {
                    if attempt > 1 {
                        tracing::info!(
                            backend = self.backend.name(),
                            attempt,
                            "Render succeeded after retry",
                        );
                    }
                    return Ok(image);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(
                        backend = self.backend.name(),
                        attempts = attempt,
                        error = %e,
                        "Render attempts exhausted",
                    );
                    return Err(RenderError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Render attempt {attempt} failed, retrying",
                    );
                }
            }

            tokio::time::sleep(delay).await;
            delay = next_delay(delay, &self.config);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use assert_matches::assert_matches;

    /// Fails `failures` times, then succeeds. Records every attempt time.
    struct FlakyBackend {
        failures: u32,
        attempts: Mutex<Vec<Instant>>,
    }

    impl FlakyBackend {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempt_times(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RenderBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn render(&self, _request: &RenderRequest) -> Result<RenderedImage, BackendError> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now());
            if attempts.len() as u32 <= self.failures {
                Err(BackendError::Unavailable(format!("failure {}", attempts.len())))
            } else {
                Ok(RenderedImage::solid(2, 2, [1, 2, 3]))
            }
        }
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    // ------------------------------------------------------------------
    // next_delay
    // ------------------------------------------------------------------

    #[test]
    fn next_delay_doubles() {
        let config = RetryConfig::default();
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
    }

    #[test]
    fn default_sequence_is_one_two_four() {
        let config = RetryConfig::default();
        let mut delay = config.initial_delay;
        for expected_secs in [1, 2, 4, 8] {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    // ------------------------------------------------------------------
    // RetryingRenderClient
    // ------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_does_not_sleep() {
        let backend = FlakyBackend::new(0);
        let client = RetryingRenderClient::new(backend.clone(), RetryConfig::default());

        let started = Instant::now();
        client.render("a cat", "", None).await.unwrap();

        assert_eq!(backend.attempt_times().len(), 1);
        assert_eq!(Instant::now() - started, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        for k in 1..3 {
            let backend = FlakyBackend::new(k);
            let client = RetryingRenderClient::new(backend.clone(), RetryConfig::default());

            let image = client.render("a cat", "blurry", Some(2)).await.unwrap();
            assert_eq!(image.width(), 2);

            let times = backend.attempt_times();
            assert_eq!(times.len() as u32, k + 1);
            let gaps = gaps(&times);
            assert!(gaps.windows(2).all(|w| w[0] < w[1]), "gaps not increasing: {gaps:?}");
            assert_eq!(gaps[0], Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_backend_is_exhausted() {
        let backend = FlakyBackend::new(u32::MAX);
        let client = RetryingRenderClient::new(backend.clone(), RetryConfig::default());

        let err = client.render("a cat", "", None).await.unwrap_err();
        assert_matches!(
            &err,
            RenderError::Exhausted { attempts: 3, last: BackendError::Unavailable(msg) }
                if msg == "failure 3"
        );
        assert_eq!(
            gaps(&backend.attempt_times()),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_bound_is_configurable() {
        let backend = FlakyBackend::new(u32::MAX);
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            ..Default::default()
        };
        let client = RetryingRenderClient::new(backend.clone(), config);

        assert_matches!(
            client.render("a cat", "", None).await,
            Err(RenderError::Exhausted { attempts: 5, .. })
        );
        assert_eq!(backend.attempt_times().len(), 5);
    }
}
