//! Render backend selection.
//!
//! The backend is chosen once at startup from a closed set of
//! [`RenderProvider`] variants and injected into the pipeline as an
//! `Arc<dyn RenderBackend>`. Adding a backend means adding a variant here.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, RenderBackend};
use crate::huggingface::{HuggingFaceBackend, HuggingFaceConfig};
use crate::pollinations::{PollinationsBackend, PollinationsConfig};
use crate::retry::RetryConfig;

/// Supported rendering backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderProvider {
    HuggingFace,
    Pollinations,
}

impl FromStr for RenderProvider {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "huggingface" | "hf" => Ok(RenderProvider::HuggingFace),
            "pollinations" => Ok(RenderProvider::Pollinations),
            other => Err(BackendError::Configuration(format!(
                "Unknown image generation provider '{other}'. Must be one of: HUGGING_FACE, POLLINATIONS"
            ))),
        }
    }
}

/// Rendering configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub provider: RenderProvider,
    pub hugging_face: HuggingFaceConfig,
    pub pollinations: PollinationsConfig,
    pub retry: RetryConfig,
}

impl RenderConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                            | Default                            |
    /// |------------------------------------|------------------------------------|
    /// | `IMG_GEN_PROVIDER`                 | `POLLINATIONS`                     |
    /// | `HUGGING_FACE_KEY`                 | (required for `HUGGING_FACE`)      |
    /// | `HUGGING_FACE_MODEL`               | `black-forest-labs/FLUX.1-schnell` |
    /// | `HUGGING_FACE_PROVIDER`            | `hf-inference`                     |
    /// | `HUGGING_FACE_NUM_INFERENCE_STEPS` | `30`                               |
    /// | `HUGGING_FACE_GUIDANCE_SCALE`      | `7.5`                              |
    /// | `HUGGING_FACE_WIDTH` / `_HEIGHT`   | `768`                              |
    /// | `POLLINATIONS_TIMEOUT` (secs)      | `30`                               |
    /// | `RENDER_MAX_ATTEMPTS`              | `POLLINATIONS_RETRIES`, else `3`   |
    /// | `RENDER_BACKOFF_BASE_MS`           | `1000`                             |
    pub fn from_env() -> Result<Self, BackendError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BackendError> {
        let provider = lookup("IMG_GEN_PROVIDER")
            .unwrap_or_else(|| "POLLINATIONS".into())
            .parse()?;

        let hf_defaults = HuggingFaceConfig::default();
        let hugging_face = HuggingFaceConfig {
            api_key: lookup("HUGGING_FACE_KEY").unwrap_or_default(),
            model: lookup("HUGGING_FACE_MODEL").unwrap_or(hf_defaults.model),
            provider: lookup("HUGGING_FACE_PROVIDER").unwrap_or(hf_defaults.provider),
            base_url: lookup("HUGGING_FACE_BASE_URL").unwrap_or(hf_defaults.base_url),
            num_inference_steps: parse_or(
                &lookup,
                "HUGGING_FACE_NUM_INFERENCE_STEPS",
                hf_defaults.num_inference_steps,
            )?,
            guidance_scale: parse_or(
                &lookup,
                "HUGGING_FACE_GUIDANCE_SCALE",
                hf_defaults.guidance_scale,
            )?,
            width: parse_or(&lookup, "HUGGING_FACE_WIDTH", hf_defaults.width)?,
            height: parse_or(&lookup, "HUGGING_FACE_HEIGHT", hf_defaults.height)?,
        };

        let pollinations_defaults = PollinationsConfig::default();
        let pollinations = PollinationsConfig {
            base_url: lookup("POLLINATIONS_BASE_URL").unwrap_or(pollinations_defaults.base_url),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "POLLINATIONS_TIMEOUT",
                pollinations_defaults.timeout.as_secs(),
            )?),
            ..pollinations_defaults
        };

        let retry_defaults = RetryConfig::default();
        let max_attempts = match lookup("RENDER_MAX_ATTEMPTS") {
            Some(_) => parse_or(&lookup, "RENDER_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
            None => parse_or(&lookup, "POLLINATIONS_RETRIES", retry_defaults.max_attempts)?,
        };
        if max_attempts == 0 {
            return Err(BackendError::Configuration(
                "RENDER_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let retry = RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(parse_or(
                &lookup,
                "RENDER_BACKOFF_BASE_MS",
                retry_defaults.initial_delay.as_millis() as u64,
            )?),
            ..retry_defaults
        };

        Ok(Self {
            provider,
            hugging_face,
            pollinations,
            retry,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, BackendError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            BackendError::Configuration(format!("{key} has an invalid value '{raw}'"))
        }),
    }
}

/// Build the configured backend.
pub fn build_backend(config: &RenderConfig) -> Result<Arc<dyn RenderBackend>, BackendError> {
    let backend: Arc<dyn RenderBackend> = match config.provider {
        RenderProvider::HuggingFace => {
            Arc::new(HuggingFaceBackend::new(config.hugging_face.clone())?)
        }
        RenderProvider::Pollinations => {
            Arc::new(PollinationsBackend::new(config.pollinations.clone())?)
        }
    };
    tracing::info!(backend = backend.name(), "Render backend selected");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use assert_matches::assert_matches;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!("HUGGING_FACE".parse::<RenderProvider>().unwrap(), RenderProvider::HuggingFace);
        assert_eq!("huggingface".parse::<RenderProvider>().unwrap(), RenderProvider::HuggingFace);
        assert_eq!("PolliNations".parse::<RenderProvider>().unwrap(), RenderProvider::Pollinations);
        assert!("dalle".parse::<RenderProvider>().is_err());
    }

    #[test]
    fn defaults_select_pollinations() {
        let config = RenderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, RenderProvider::Pollinations);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.hugging_face.num_inference_steps, 30);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = RenderConfig::from_lookup(lookup(&[
            ("IMG_GEN_PROVIDER", "HUGGING_FACE"),
            ("HUGGING_FACE_KEY", "hf_abc"),
            ("HUGGING_FACE_GUIDANCE_SCALE", "5.0"),
            ("POLLINATIONS_TIMEOUT", "10"),
            ("POLLINATIONS_RETRIES", "5"),
            ("RENDER_BACKOFF_BASE_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.provider, RenderProvider::HuggingFace);
        assert_eq!(config.hugging_face.guidance_scale, 5.0);
        assert_eq!(config.pollinations.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn explicit_attempt_bound_wins() {
        let config = RenderConfig::from_lookup(lookup(&[
            ("POLLINATIONS_RETRIES", "5"),
            ("RENDER_MAX_ATTEMPTS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert_matches!(
            RenderConfig::from_lookup(lookup(&[("HUGGING_FACE_WIDTH", "wide")])),
            Err(BackendError::Configuration(_))
        );
        assert_matches!(
            RenderConfig::from_lookup(lookup(&[("RENDER_MAX_ATTEMPTS", "0")])),
            Err(BackendError::Configuration(_))
        );
    }

    #[test]
    fn hugging_face_without_key_fails_to_build() {
        let config =
            RenderConfig::from_lookup(lookup(&[("IMG_GEN_PROVIDER", "HUGGING_FACE")])).unwrap();
        assert_matches!(build_backend(&config).err(), Some(BackendError::Configuration(_)));
    }

    #[test]
    fn pollinations_builds_from_defaults() {
        let config = RenderConfig::from_lookup(lookup(&[])).unwrap();
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "pollinations");
    }
}
