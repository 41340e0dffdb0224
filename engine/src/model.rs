use serde::{Deserialize, Serialize};

/// Whole-song descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Beats per minute.
    pub tempo: f64,
    /// Average loudness in dB, typically -60..0.
    pub loudness: f64,
    /// Seconds.
    pub duration: f64,
    #[serde(default)]
    pub key: Option<i32>,
    #[serde(default)]
    pub mode: Option<i32>,
    #[serde(default)]
    pub time_signature: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub start: f64,
    pub duration: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start: f64,
    pub duration: f64,
    pub loudness: f64,
    pub tempo: f64,
    // carried through, unused when computing rates
    #[serde(default)]
    pub key: Option<i32>,
    #[serde(default)]
    pub mode: Option<i32>,
    #[serde(default)]
    pub time_signature: Option<i32>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    /// Peak loudness of the window in dB.
    pub loudness_max: f64,
    /// 12 timbre coefficients, index 1 approximates brightness.
    #[serde(default)]
    pub timbre: Vec<f64>,
}

/// Analysis of one song as returned by the provider.
///
/// Every part is independently optional since providers return partial
/// results. The slice accessors treat a missing sequence exactly like an
/// empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSnapshot {
    pub track: Option<Track>,
    pub beats: Option<Vec<Beat>>,
    pub sections: Option<Vec<Section>>,
    pub segments: Option<Vec<Segment>>,
}

impl AnalysisSnapshot {
    pub fn beats(&self) -> &[Beat] {
        self.beats.as_deref().unwrap_or(&[])
    }

    pub fn sections(&self) -> &[Section] {
        self.sections.as_deref().unwrap_or(&[])
    }

    pub fn segments(&self) -> &[Segment] {
        self.segments.as_deref().unwrap_or(&[])
    }

    pub fn track_loudness(&self) -> Option<f64> {
        self.track.as_ref().map(|track| track.loudness)
    }
}

/// Half-open `[start, start + duration)` lookup shared by sections and
/// segments. Intervals with a non-positive or non-finite duration never match.
pub(crate) trait Interval {
    fn start(&self) -> f64;
    fn duration(&self) -> f64;

    fn end(&self) -> f64 {
        self.start() + self.duration()
    }

    fn contains(&self, position: f64) -> bool {
        let duration = self.duration();
        duration > 0.0 && duration.is_finite() && position >= self.start() && position < self.end()
    }
}

impl Interval for Section {
    fn start(&self) -> f64 {
        self.start
    }
    fn duration(&self) -> f64 {
        self.duration
    }
}

impl Interval for Segment {
    fn start(&self) -> f64 {
        self.start
    }
    fn duration(&self) -> f64 {
        self.duration
    }
}

/// Index of the interval enclosing `position`, if any.
pub(crate) fn enclosing<T: Interval>(intervals: &[T], position: f64) -> Option<usize> {
    intervals.iter().position(|interval| interval.contains(position))
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
