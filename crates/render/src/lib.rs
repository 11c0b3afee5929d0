//! Image rendering backends and the retrying render client.
//!
//! The pipeline only depends on the [`backend::RenderBackend`] capability.
//! Concrete backends (Hugging Face inference, Pollinations) are chosen once
//! at startup by [`factory::build_backend`] and wrapped in a
//! [`retry::RetryingRenderClient`] that adds bounded exponential backoff.

pub mod backend;
pub mod factory;
pub mod huggingface;
pub mod pollinations;
pub mod quality;
pub mod rendered;
pub mod retry;
