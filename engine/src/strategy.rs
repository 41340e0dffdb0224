//! Interchangeable ways of turning a beat window into a rate.

use tracing::instrument;

use crate::{
    beat::BeatWindow,
    config::{Band, RateConfig, Strategy},
    model::{clamp_unit, enclosing, AnalysisSnapshot},
    section, segment,
};

/// Turns the beat window at `position` (seconds) into a raw rate. The caller
/// handles the sentinels and the final clamp.
pub trait RateStrategy {
    fn compose(
        &self,
        position: f64,
        window: &BeatWindow<'_>,
        snapshot: &AnalysisSnapshot,
        config: &RateConfig,
    ) -> f64;

    fn output_band(&self, config: &RateConfig) -> Band;
}

impl Strategy {
    pub fn rate_strategy(&self) -> &'static dyn RateStrategy {
        match self {
            Strategy::TrapNation => &TrapNation,
            Strategy::Simple => &Simple,
        }
    }
}

/// How energetic the whole song is, in `[0.3, 1]`.
pub fn tempo_intensity(track_tempo: f64) -> f64 {
    Band(0.3, 1.0).clamp((track_tempo - 70.0) / 60.0)
}

/// Beat pulse, section energy, build-up and segment punch, multiplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapNation;

/// Multiplicative contributions of one rate computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateTerms {
    pub tempo_ratio: f64,
    pub tempo_intensity: f64,
    pub section_energy: f64,
    pub section_multiplier: f64,
    pub build_up_multiplier: f64,
    pub beat_pulse: f64,
    pub segment_boost: f64,
}

impl RateTerms {
    pub fn product(&self) -> f64 {
        self.tempo_ratio
            * self.section_multiplier
            * self.build_up_multiplier
            * self.beat_pulse
            * self.segment_boost
    }
}

impl TrapNation {
    pub fn terms(
        &self,
        position: f64,
        window: &BeatWindow<'_>,
        snapshot: &AnalysisSnapshot,
        config: &RateConfig,
    ) -> RateTerms {
        let tempo_ratio = config
            .tempo_ratio_range
            .clamp(window.instant_bpm / config.target_bpm());

        // the beat spacing stands in for the song tempo when the track is missing
        let track_tempo = snapshot
            .track
            .as_ref()
            .map_or(window.instant_bpm, |track| track.tempo);
        let tempo_intensity = tempo_intensity(track_tempo);

        let section = section::estimate(position, snapshot.sections(), snapshot.track_loudness());
        let section_multiplier = 1.0 + (section.energy - 0.5) * (0.1 + 0.3 * tempo_intensity);
        let build_up_multiplier = section
            .build_up
            .map_or(1.0, |progress| 1.0 + progress * (0.15 + 0.25 * tempo_intensity));

        let beat_pulse = config.pulse.envelope(
            window.phase,
            window.confidence(),
            section.energy,
            tempo_intensity,
        );

        let segment_boost = segment::estimate(position, snapshot.segments()).map_or(1.0, |punch| {
            1.0 + punch * (0.05 + 0.25 * section.energy * tempo_intensity)
        });

        RateTerms {
            tempo_ratio,
            tempo_intensity,
            section_energy: section.energy,
            section_multiplier,
            build_up_multiplier,
            beat_pulse,
            segment_boost,
        }
    }
}

impl RateStrategy for TrapNation {
    #[instrument(level = "trace", skip_all, fields(phase = window.phase))]
    fn compose(
        &self,
        position: f64,
        window: &BeatWindow<'_>,
        snapshot: &AnalysisSnapshot,
        config: &RateConfig,
    ) -> f64 {
        self.terms(position, window, snapshot, config).product()
    }

    fn output_band(&self, config: &RateConfig) -> Band {
        config.output_range
    }
}

const SIMPLE_TEMPO_RATIO: Band = Band(0.5, 2.0);
const SIMPLE_SECTION_RANGE: Band = Band(0.8, 1.2);
const SIMPLE_SEGMENT_RANGE: Band = Band(0.85, 1.25);
/// No single loudness multiplier may drop below this.
const SIMPLE_SAFETY_FLOOR: f64 = 0.5;

/// Tempo ratio, beat confidence and loudness deltas, plus a coarse step for
/// the position inside the beat.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simple;

impl Simple {
    fn position_multiplier(phase: f64) -> f64 {
        match phase {
            p if p < 0.25 => 1.2,
            p if p < 0.5 => 1.0,
            _ => 0.9,
        }
    }
}

impl RateStrategy for Simple {
    #[instrument(level = "trace", skip_all, fields(phase = window.phase))]
    fn compose(
        &self,
        position: f64,
        window: &BeatWindow<'_>,
        snapshot: &AnalysisSnapshot,
        config: &RateConfig,
    ) -> f64 {
        let tempo_ratio = SIMPLE_TEMPO_RATIO.clamp(window.instant_bpm / config.target_bpm());
        let confidence_multiplier = 0.8 + 0.4 * clamp_unit(window.current.confidence);

        let (section_multiplier, segment_multiplier) = match snapshot.track_loudness() {
            Some(track_loudness) => {
                let sections = snapshot.sections();
                let section = enclosing(sections, position).map_or(1.0, |index| {
                    SIMPLE_SECTION_RANGE.clamp(1.0 + (sections[index].loudness - track_loudness) / 20.0)
                });
                let segments = snapshot.segments();
                let segment = enclosing(segments, position).map_or(1.0, |index| {
                    SIMPLE_SEGMENT_RANGE
                        .clamp(1.0 + (segments[index].loudness_max - track_loudness) / 30.0)
                });
                (section, segment)
            }
            None => (1.0, 1.0),
        };

        tempo_ratio
            * confidence_multiplier
            * section_multiplier.max(SIMPLE_SAFETY_FLOOR)
            * segment_multiplier.max(SIMPLE_SAFETY_FLOOR)
            * Self::position_multiplier(window.phase)
    }

    fn output_band(&self, config: &RateConfig) -> Band {
        config.simple_output_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        beat::{locate, BeatContext},
        model::{Beat, Section, Segment, Track},
    };

    fn snapshot() -> AnalysisSnapshot {
        AnalysisSnapshot {
            track: Some(Track {
                tempo: 128.0,
                loudness: -8.0,
                duration: 60.0,
                key: None,
                mode: None,
                time_signature: None,
            }),
            beats: Some(
                (0..100)
                    .map(|i| Beat {
                        start: i as f64 * 0.5,
                        duration: 0.5,
                        confidence: 0.9,
                    })
                    .collect(),
            ),
            sections: None,
            segments: None,
        }
    }

    fn window(snapshot: &AnalysisSnapshot, position: f64) -> BeatWindow<'_> {
        match locate(position, snapshot.beats()) {
            BeatContext::Within(window) => window,
            other => panic!("expected a beat window, got {other:?}"),
        }
    }

    #[test]
    fn tempo_intensity_is_bounded() {
        assert_eq!(tempo_intensity(60.0), 0.3);
        assert_eq!(tempo_intensity(200.0), 1.0);
        assert!((tempo_intensity(100.0) - 0.5).abs() < 1e-12);
        assert_eq!(tempo_intensity(f64::NAN), 0.3);
    }

    #[test]
    fn neutral_context_only_has_tempo_and_pulse() {
        let snapshot = snapshot();
        let config = RateConfig {
            target_base_bpm: 120.0,
            ..Default::default()
        };
        let terms = TrapNation.terms(10.0, &window(&snapshot, 10.0), &snapshot, &config);
        assert!((terms.tempo_ratio - 1.0).abs() < 1e-12);
        assert_eq!(terms.section_multiplier, 1.0);
        assert_eq!(terms.build_up_multiplier, 1.0);
        assert_eq!(terms.segment_boost, 1.0);
        assert!((terms.beat_pulse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tempo_ratio_is_clamped() {
        let snapshot = snapshot();
        let config = RateConfig {
            target_base_bpm: 40.0,
            ..Default::default()
        };
        let terms = TrapNation.terms(10.0, &window(&snapshot, 10.0), &snapshot, &config);
        assert_eq!(terms.tempo_ratio, 1.4);
    }

    #[test]
    fn loud_sections_and_punchy_segments_speed_up() {
        let mut loud = snapshot();
        loud.sections = Some(vec![Section {
            start: 0.0,
            duration: 50.0,
            loudness: -4.0,
            tempo: 128.0,
            key: None,
            mode: None,
            time_signature: None,
            confidence: None,
        }]);
        loud.segments = Some(vec![Segment {
            start: 10.0,
            duration: 0.25,
            loudness_max: -2.0,
            timbre: vec![50.0, -80.0],
        }]);
        let config = RateConfig::default();
        let plain = snapshot();

        let quiet_terms = TrapNation.terms(10.1, &window(&plain, 10.1), &plain, &config);
        let loud_terms = TrapNation.terms(10.1, &window(&loud, 10.1), &loud, &config);

        assert!(loud_terms.section_multiplier > 1.0);
        assert!(loud_terms.segment_boost > 1.0);
        assert!(loud_terms.beat_pulse > quiet_terms.beat_pulse);
        assert!(loud_terms.product() > quiet_terms.product());
    }

    #[test]
    fn fast_songs_get_wider_swings() {
        let at_tempo = |tempo: f64| {
            let mut snapshot = snapshot();
            if let Some(track) = snapshot.track.as_mut() {
                track.tempo = tempo;
            }
            snapshot.sections = Some(
                [(0.0, -6.0), (20.0, -2.0)]
                    .into_iter()
                    .map(|(start, loudness)| Section {
                        start,
                        duration: 20.0,
                        loudness,
                        tempo,
                        key: None,
                        mode: None,
                        time_signature: None,
                        confidence: None,
                    })
                    .collect(),
            );
            snapshot.segments = Some(vec![Segment {
                start: 16.0,
                duration: 0.25,
                loudness_max: -2.0,
                timbre: vec![50.0, -80.0],
            }]);
            let config = RateConfig {
                target_base_bpm: tempo,
                ..Default::default()
            };
            TrapNation.terms(16.1, &window(&snapshot, 16.1), &snapshot, &config)
        };

        let ballad = at_tempo(60.0);
        let banger = at_tempo(150.0);

        assert!(ballad.section_multiplier > 1.0);
        assert!(ballad.build_up_multiplier > 1.0);
        assert!(ballad.segment_boost > 1.0);
        assert!(banger.section_multiplier > ballad.section_multiplier);
        assert!(banger.build_up_multiplier > ballad.build_up_multiplier);
        assert!(banger.segment_boost > ballad.segment_boost);
    }

    #[test]
    fn simple_steps_through_the_beat() {
        let snapshot = snapshot();
        let config = RateConfig {
            target_base_bpm: 120.0,
            strategy: Strategy::Simple,
            ..Default::default()
        };
        let at = |position: f64| Simple.compose(position, &window(&snapshot, position), &snapshot, &config);

        let confidence = 0.8 + 0.4 * 0.9;
        assert!((at(10.05) - 1.2 * confidence).abs() < 1e-12);
        assert!((at(10.15) - confidence).abs() < 1e-12);
        assert!((at(10.4) - 0.9 * confidence).abs() < 1e-12);
    }

    #[test]
    fn simple_loudness_multipliers_are_clamped() {
        let mut snapshot = snapshot();
        snapshot.sections = Some(vec![Section {
            start: 0.0,
            duration: 50.0,
            loudness: 40.0,
            tempo: 128.0,
            key: None,
            mode: None,
            time_signature: None,
            confidence: None,
        }]);
        snapshot.segments = Some(vec![Segment {
            start: 0.0,
            duration: 50.0,
            loudness_max: -200.0,
            timbre: vec![],
        }]);
        let config = RateConfig {
            target_base_bpm: 120.0,
            ..Default::default()
        };
        let rate = Simple.compose(10.15, &window(&snapshot, 10.15), &snapshot, &config);
        let confidence = 0.8 + 0.4 * 0.9;
        assert!((rate - confidence * 1.2 * 0.85).abs() < 1e-12);
    }
}
