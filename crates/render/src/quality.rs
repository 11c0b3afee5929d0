//! Quality hint resolution.
//!
//! Clients send a coarse quality level (1-3). Each backend decides what
//! that means for its own knobs; the Hugging Face mapping lives here
//! because it is the only one with step/guidance parameters.

/// Neutral midpoint used when no quality hint is given.
pub const DEFAULT_QUALITY: u8 = 2;

/// Default diffusion step count at quality 2.
pub const DEFAULT_BASE_STEPS: u32 = 30;

/// Default classifier-free guidance scale at quality 2.
pub const DEFAULT_BASE_GUIDANCE: f64 = 7.5;

/// Step count never drops below this.
pub const MIN_STEPS: u32 = 10;

/// Guidance scale never drops below this.
pub const MIN_GUIDANCE: f64 = 1.0;

/// Concrete sampler parameters for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityParams {
    pub steps: u32,
    pub guidance_scale: f64,
}

/// Map a quality hint onto step count and guidance.
///
/// | Quality        | Steps        | Guidance       |
/// |----------------|--------------|----------------|
/// | 1              | base x 0.6   | base - 1.0     |
/// | 2 / unset      | base         | base           |
/// | 3              | base x 1.4   | base + 1.0     |
///
/// Out-of-range hints fall back to the midpoint.
pub fn resolve_quality(quality: Option<u8>, base_steps: u32, base_guidance: f64) -> QualityParams {
    let (step_factor, guidance_delta) = match quality.unwrap_or(DEFAULT_QUALITY) {
        1 => (0.6, -1.0),
        3 => (1.4, 1.0),
        _ => (1.0, 0.0),
    };

    let steps = ((f64::from(base_steps) * step_factor) as u32).max(MIN_STEPS);
    let guidance_scale = (base_guidance + guidance_delta).max(MIN_GUIDANCE);

    QualityParams {
        steps,
        guidance_scale,
    }
}
