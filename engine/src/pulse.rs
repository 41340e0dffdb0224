//! Within-beat pulse: fast attack, smooth decay, gentle breathing.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::model::clamp_unit;

const MIN_PHASE_WIDTH: f64 = 1e-6;

/// Phase boundaries of the pulse envelope.
///
/// Attack covers `[0, attack_end)`, decay `[attack_end, decay_end)` and the
/// rest of the beat breathes around 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseShape {
    pub attack_end: f64,
    pub decay_end: f64,
}

impl Default for PulseShape {
    fn default() -> Self {
        Self {
            attack_end: 0.15,
            decay_end: 0.5,
        }
    }
}

/// How hard a beat pulses given section energy and tempo intensity.
pub fn pulse_intensity(section_energy: f64, tempo_intensity: f64) -> f64 {
    (0.3 + 0.7 * clamp_unit(section_energy)) * (0.4 + 0.6 * clamp_unit(tempo_intensity))
}

impl PulseShape {
    /// Multiplier for `phase` inside the current beat. Always `>= 0`, equal
    /// to 1.0 at phase 0, at `decay_end` and as phase approaches 1.
    pub fn envelope(
        &self,
        phase: f64,
        confidence: f64,
        section_energy: f64,
        tempo_intensity: f64,
    ) -> f64 {
        let phase = clamp_unit(phase);
        let confidence = clamp_unit(confidence);
        let intensity = pulse_intensity(section_energy, tempo_intensity);
        let strength = (0.3 + 0.5 * confidence) * intensity;

        let attack_end = self.attack_end.max(MIN_PHASE_WIDTH);
        let decay_end = self.decay_end.max(attack_end + MIN_PHASE_WIDTH);

        if phase < attack_end {
            let t = phase / attack_end;
            1.0 + strength * ease_out_cubic(t)
        } else if phase < decay_end {
            let t = (phase - attack_end) / (decay_end - attack_end);
            1.0 + strength * (1.0 - ease_in_quad(t))
        } else {
            let rest = (1.0 - decay_end).max(MIN_PHASE_WIDTH);
            let t = clamp_unit((phase - decay_end) / rest);
            let amplitude = 0.1 * confidence * intensity;
            (1.0 + amplitude * (t * TAU).sin()).max(0.0)
        }
    }
}

fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

fn ease_in_quad(t: f64) -> f64 {
    t * t
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: PulseShape = PulseShape {
        attack_end: 0.15,
        decay_end: 0.5,
    };

    #[test]
    fn starts_and_settles_at_one() {
        assert!((SHAPE.envelope(0.0, 0.9, 0.8, 1.0) - 1.0).abs() < 1e-12);
        assert!((SHAPE.envelope(0.5, 0.9, 0.8, 1.0) - 1.0).abs() < 1e-12);
        assert!((SHAPE.envelope(0.999_999, 0.9, 0.8, 1.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn peaks_at_end_of_attack() {
        let confidence = 1.0;
        let peak = 1.0 + 0.8 * pulse_intensity(1.0, 1.0);
        let just_before = SHAPE.envelope(0.149_999_9, confidence, 1.0, 1.0);
        let at_boundary = SHAPE.envelope(0.15, confidence, 1.0, 1.0);
        assert!((just_before - peak).abs() < 1e-4);
        assert!((at_boundary - peak).abs() < 1e-12);
        assert!((peak - 1.8).abs() < 1e-12);
    }

    #[test]
    fn attack_rises_and_decay_falls() {
        let rising: Vec<_> = (0..15)
            .map(|i| SHAPE.envelope(i as f64 / 100.0, 0.7, 0.5, 0.5))
            .collect();
        assert!(rising.windows(2).all(|w| w[1] > w[0]));

        let falling: Vec<_> = (15..50)
            .map(|i| SHAPE.envelope(i as f64 / 100.0, 0.7, 0.5, 0.5))
            .collect();
        assert!(falling.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn rest_breathes_within_amplitude() {
        let amplitude = 0.1 * 0.6 * pulse_intensity(0.7, 0.9);
        for i in 50..100 {
            let value = SHAPE.envelope(i as f64 / 100.0, 0.6, 0.7, 0.9);
            assert!((value - 1.0).abs() <= amplitude + 1e-12);
        }
    }

    #[test]
    fn quiet_ballads_pulse_gently() {
        let loud_fast = SHAPE.envelope(0.15, 0.8, 1.0, 1.0);
        let quiet_slow = SHAPE.envelope(0.15, 0.8, 0.0, 0.0);
        assert!(loud_fast > quiet_slow);
        assert!((quiet_slow - (1.0 + 0.7 * 0.12)).abs() < 1e-12);
    }

    #[test]
    fn degenerate_boundaries_stay_finite() {
        let shape = PulseShape {
            attack_end: 0.0,
            decay_end: 0.0,
        };
        for i in 0..100 {
            let value = shape.envelope(i as f64 / 100.0, 1.0, 1.0, 1.0);
            assert!(value.is_finite() && value >= 0.0);
        }
    }
}
