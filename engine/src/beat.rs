use tracing::trace;

use crate::model::{clamp_unit, Beat};

/// Largest phase value below 1.0.
const MAX_PHASE: f64 = 1.0 - f64::EPSILON;

/// Where a position falls relative to the beat sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatContext<'a> {
    /// Before the first beat, or no beats at all.
    PreBeat,
    /// On or after the last beat.
    PostBeat { last: &'a Beat },
    /// Between two beats whose spacing cannot be used (zero or negative).
    Degenerate,
    Within(BeatWindow<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatWindow<'a> {
    pub current: &'a Beat,
    pub next: &'a Beat,
    /// Seconds between the current and next beat start.
    pub span: f64,
    /// `60 / span`.
    pub instant_bpm: f64,
    /// Position inside the beat in `[0, 1)`.
    pub phase: f64,
}

impl BeatWindow<'_> {
    pub fn confidence(&self) -> f64 {
        clamp_unit(self.current.confidence)
    }
}

/// Finds the beat interval enclosing `position` (seconds).
///
/// Picks the greatest index whose start is not after `position`. Malformed
/// sequences never panic; a non-positive spacing to the following beat falls
/// back to the beat's own duration and otherwise yields
/// [`BeatContext::Degenerate`].
pub fn locate(position: f64, beats: &[Beat]) -> BeatContext<'_> {
    let index = match beats.partition_point(|beat| beat.start <= position) {
        0 => return BeatContext::PreBeat,
        after => after - 1,
    };

    let current = &beats[index];
    let Some(next) = beats.get(index + 1) else {
        return BeatContext::PostBeat { last: current };
    };

    let span = match next.start - current.start {
        span if span > 0.0 && span.is_finite() => span,
        _ if current.duration > 0.0 && current.duration.is_finite() => current.duration,
        span => {
            trace!(index, span, "unusable beat span");
            return BeatContext::Degenerate;
        }
    };

    let phase = ((position - current.start) / span).clamp(0.0, MAX_PHASE);

    BeatContext::Within(BeatWindow {
        current,
        next,
        span,
        instant_bpm: 60.0 / span,
        phase,
    })
}
