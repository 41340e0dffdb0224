//! Dynamic playback-rate engine.
//!
//! Maps a playback position and a song's analysis onto a speed multiplier for
//! a looping visual clip, so the clip pulses on the beat, swells in loud
//! sections and speeds up ahead of a drop.
//!
//! ```
//! use engine::{compute_rate, AnalysisSnapshot, RateConfig};
//!
//! let snapshot = AnalysisSnapshot::default();
//! // without beats there is nothing to sync to
//! assert_eq!(compute_rate(1_500.0, &snapshot, &RateConfig::default()), engine::NEUTRAL_RATE);
//! ```

use tracing::{instrument, trace};

pub mod beat;
pub mod config;
pub mod model;
pub mod pulse;
pub mod section;
pub mod segment;
pub mod strategy;

pub use beat::{locate, BeatContext, BeatWindow};
pub use config::{Band, ConfigError, RateConfig, Strategy};
pub use model::{AnalysisSnapshot, Beat, Section, Segment, Track};
pub use pulse::PulseShape;
pub use strategy::{RateStrategy, RateTerms, Simple, TrapNation};

/// Rate returned when there is nothing to synchronize to.
pub const NEUTRAL_RATE: f64 = 1.0;

/// Playback-speed multiplier for the clip at `position_ms`.
///
/// Never fails: missing or malformed analysis degrades to neutral
/// contributions. Apart from the no-beats case, which returns exactly
/// [`NEUTRAL_RATE`], the result is finite and inside the output band of the
/// configured strategy.
#[instrument(level = "trace", skip(snapshot, config))]
pub fn compute_rate(position_ms: f64, snapshot: &AnalysisSnapshot, config: &RateConfig) -> f64 {
    let beats = snapshot.beats();
    if beats.is_empty() {
        trace!("no beats");
        return NEUTRAL_RATE;
    }

    let strategy = config.strategy.rate_strategy();
    let band = strategy.output_band(config);
    let position = position_ms / 1000.0;

    let rate = match locate(position, beats) {
        BeatContext::PreBeat => {
            trace!("before first beat");
            config.intro_rate
        }
        BeatContext::PostBeat { last } => {
            trace!("after last beat");
            0.5 + model::clamp_unit(last.confidence) * config.outro_gain
        }
        BeatContext::Degenerate => NEUTRAL_RATE,
        BeatContext::Within(window) => strategy.compose(position, &window, snapshot, config),
    };

    if rate.is_finite() {
        band.clamp(rate)
    } else {
        trace!(rate, "non-finite rate");
        band.clamp(NEUTRAL_RATE)
    }
}
