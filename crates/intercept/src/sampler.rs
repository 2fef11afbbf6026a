//! Sampling for watched-path observation events.

use rand::Rng;

/// Draws a value the interceptor compares against `report_rate` to decide
/// whether to emit an observation event for one access.
pub trait Sampler: Send + Sync {
    /// A value drawn uniformly from `[0, 10_000)`.
    fn roll(&self) -> u32;
}

/// The production sampler, backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandSampler;

impl Sampler for RandSampler {
    fn roll(&self) -> u32 {
        rand::thread_rng().gen_range(0..lazyfetch_config::REPORT_RATE_MAX)
    }
}
