//! Transient "punch" from short analysis segments.

use crate::model::{clamp_unit, enclosing, Segment};

const LOUDNESS_FLOOR_DB: f64 = -60.0;
const LOUDNESS_WEIGHT: f64 = 0.6;
const BASS_WEIGHT: f64 = 0.4;
/// Timbre coefficient approximating spectral brightness.
const BRIGHTNESS_INDEX: usize = 1;

/// Peak loudness of `segment` mapped from `[-60, 0]` dB onto `[0, 1]`.
pub fn loudness_component(segment: &Segment) -> f64 {
    clamp_unit((segment.loudness_max - LOUDNESS_FLOOR_DB) / -LOUDNESS_FLOOR_DB)
}

/// Darker segments score higher. A missing brightness coefficient reads as 0.
pub fn bass_component(segment: &Segment) -> f64 {
    let brightness = segment.timbre.get(BRIGHTNESS_INDEX).copied().unwrap_or(0.0);
    clamp_unit((-brightness + 100.0) / 200.0)
}

/// Punch of the segment enclosing `position`, `None` when nothing encloses it.
pub fn estimate(position: f64, segments: &[Segment]) -> Option<f64> {
    let segment = &segments[enclosing(segments, position)?];
    Some(clamp_unit(
        LOUDNESS_WEIGHT * loudness_component(segment) + BASS_WEIGHT * bass_component(segment),
    ))
}
