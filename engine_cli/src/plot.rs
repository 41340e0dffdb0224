use engine::{compute_rate, AnalysisSnapshot, Band, RateConfig};
use image::{Rgb, RgbImage};
use tracing::instrument;

const BACKGROUND: Rgb<u8> = Rgb([12, 12, 16]);
const BASELINE: Rgb<u8> = Rgb([70, 70, 80]);
const CURVE: Rgb<u8> = Rgb([255, 190, 40]);

/// `(position_ms, rate)` pairs from `from_ms` up to `to_ms`, `step_ms` apart.
pub fn sample_curve(
    snapshot: &AnalysisSnapshot,
    config: &RateConfig,
    from_ms: f64,
    to_ms: f64,
    step_ms: f64,
) -> Vec<(f64, f64)> {
    if !(step_ms > 0.0) || !(to_ms >= from_ms) {
        return Vec::new();
    }
    let steps = ((to_ms - from_ms) / step_ms).floor() as usize;
    (0..=steps)
        .map(|i| {
            let position_ms = from_ms + i as f64 * step_ms;
            (position_ms, compute_rate(position_ms, snapshot, config))
        })
        .collect()
}

/// Draws `rates` left to right, one column each, with `band` spanning the
/// image height and a line at the natural clip speed.
#[instrument(skip(rates), level = "trace")]
pub fn render(rates: &[f64], band: Band, height: u32) -> RgbImage {
    let width = rates.len().max(1) as u32;
    let height = height.max(2);
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

    let row_of = |rate: f64| -> u32 {
        let span = (band.max() - band.min()).max(f64::EPSILON);
        let unit = ((band.clamp(rate) - band.min()) / span).clamp(0.0, 1.0);
        ((1.0 - unit) * (height - 1) as f64).round() as u32
    };

    if band.contains(engine::NEUTRAL_RATE) {
        let baseline = row_of(engine::NEUTRAL_RATE);
        for x in 0..width {
            canvas.put_pixel(x, baseline, BASELINE);
        }
    }

    let mut previous: Option<u32> = None;
    for (x, rate) in rates.iter().enumerate() {
        let row = row_of(*rate);
        // fill the gap to the previous column so steep edges stay connected
        let (top, bottom) = match previous {
            Some(prev) => (row.min(prev), row.max(prev)),
            None => (row, row),
        };
        for y in top..=bottom {
            canvas.put_pixel(x as u32, y, CURVE);
        }
        previous = Some(row);
    }

    canvas
}
