//! Linear resampling onto the nominal grid.

use contracts::Sample;

/// Interpolates irregular samples onto a fixed-period grid.
///
/// The grid is anchored at the first sample after a reset. Grid points are
/// kept as `f64` and rounded to whole microseconds only when emitted, so the
/// rate does not drift for periods that are not an integer (e.g. 300 Hz).
#[derive(Debug)]
pub struct Resampler {
    period_us: f64,
    next_grid_us: Option<f64>,
    previous: Option<Sample>,
}

impl Resampler {
    pub fn new(period_us: f64) -> Self {
        Self {
            period_us,
            next_grid_us: None,
            previous: None,
        }
    }

    /// Forget the grid; the next sample re-anchors it.
    pub fn reset(&mut self) {
        self.next_grid_us = None;
        self.previous = None;
    }

    /// Feed one raw sample. Returns the grid samples it completes and how many
    /// of them were interpolated (did not coincide with a raw timestamp).
    pub fn push(&mut self, sample: Sample) -> (Vec<Sample>, u64) {
        let Some(previous) = self.previous.take() else {
            self.next_grid_us = Some(sample.timestamp_us as f64 + self.period_us);
            self.previous = Some(sample.clone());
            return (vec![sample], 0);
        };

        let mut out = Vec::new();
        let mut interpolated = 0;
        let mut grid = self
            .next_grid_us
            .unwrap_or(previous.timestamp_us as f64 + self.period_us);
        let span = sample.timestamp_us as f64 - previous.timestamp_us as f64;

        while grid <= sample.timestamp_us as f64 {
            let timestamp_us = grid.round() as i64;
            let frac = ((grid - previous.timestamp_us as f64) / span).clamp(0.0, 1.0);
            if timestamp_us != sample.timestamp_us && timestamp_us != previous.timestamp_us {
                interpolated += 1;
            }
            out.push(Sample {
                stream_id: sample.stream_id.clone(),
                timestamp_us,
                x: lerp(previous.x, sample.x, frac),
                y: lerp(previous.y, sample.y, frac),
                z: lerp(previous.z, sample.z, frac),
            });
            grid += self.period_us;
        }

        self.next_grid_us = Some(grid);
        self.previous = Some(sample);
        (out, interpolated)
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
