//! Section-level energy and build-up (pre-drop) detection.

use crate::model::{clamp_unit, enclosing, Interval, Section};

/// Section loudness relative to the track, in dB, that maps to energy 0.
const ENERGY_FLOOR_DB: f64 = -5.0;
/// Relative loudness that maps to energy 1.
const ENERGY_CEIL_DB: f64 = 3.0;

/// How much louder the next section must be to count as a drop.
pub const BUILD_UP_THRESHOLD_DB: f64 = 1.5;
/// Seconds before the section boundary in which build-up ramps from 0 to 1.
pub const BUILD_UP_WINDOW_S: f64 = 8.0;

/// Energy used when no section encloses the position.
pub const NEUTRAL_ENERGY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionEnergy {
    /// Loudness of the enclosing section relative to the track, in `[0, 1]`.
    pub energy: f64,
    /// Progress towards a louder next section, in `[0, 1]`.
    pub build_up: Option<f64>,
}

impl Default for SectionEnergy {
    fn default() -> Self {
        Self {
            energy: NEUTRAL_ENERGY,
            build_up: None,
        }
    }
}

/// Energy of the section enclosing `position` and its build-up progress.
///
/// Without a track loudness the energy stays neutral, build-up only needs
/// the two sections and is still reported.
pub fn estimate(position: f64, sections: &[Section], track_loudness: Option<f64>) -> SectionEnergy {
    let Some(index) = enclosing(sections, position) else {
        return SectionEnergy::default();
    };
    let section = &sections[index];

    let energy = match track_loudness {
        Some(track_loudness) => clamp_unit(
            (section.loudness - track_loudness - ENERGY_FLOOR_DB) / (ENERGY_CEIL_DB - ENERGY_FLOOR_DB),
        ),
        None => NEUTRAL_ENERGY,
    };

    let build_up = sections
        .get(index + 1)
        .filter(|next| next.loudness - section.loudness > BUILD_UP_THRESHOLD_DB)
        .and_then(|_| {
            let until_boundary = section.end() - position;
            (until_boundary <= BUILD_UP_WINDOW_S)
                .then(|| clamp_unit(1.0 - until_boundary / BUILD_UP_WINDOW_S))
        });

    SectionEnergy { energy, build_up }
}
