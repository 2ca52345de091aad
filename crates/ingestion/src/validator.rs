//! Sample validation
//!
//! Turns a [`RawSample`] into a [`Sample`] or a [`Rejection`]. Pure: the
//! caller owns the per-stream "last accepted timestamp" and the clock.

use contracts::{
    OutOfRangePolicy, RawSample, Rejection, RejectionReason, Sample, ValidatorConfig,
};

/// Stateless validator for raw acceleration samples.
#[derive(Debug, Clone)]
pub struct SampleValidator {
    config: ValidatorConfig,
}

impl SampleValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate one raw sample.
    ///
    /// Checks run in order: presence, finiteness, range, clock skew, then
    /// ordering against `last_accepted_us`. `now_us` is only consulted when a
    /// future-skew tolerance is configured.
    pub fn validate(
        &self,
        raw: &RawSample,
        last_accepted_us: Option<i64>,
        now_us: Option<i64>,
    ) -> Result<Sample, Rejection> {
        let (timestamp_us, x, y, z) = match (raw.timestamp_us, raw.x, raw.y, raw.z) {
            (Some(t), Some(x), Some(y), Some(z)) => (t, x, y, z),
            _ => {
                return Err(Rejection::new(
                    RejectionReason::MissingField,
                    missing_fields(raw),
                ))
            }
        };

        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(Rejection::new(
                RejectionReason::NonFinite,
                format!("axes must be finite, got ({x}, {y}, {z})"),
            ));
        }

        let x = self.bound_axis("x", x)?;
        let y = self.bound_axis("y", y)?;
        let z = self.bound_axis("z", z)?;

        if let (Some(skew_ms), Some(now)) = (self.config.max_future_skew_ms, now_us) {
            let limit = now.saturating_add(skew_ms as i64 * 1000);
            if timestamp_us > limit {
                return Err(Rejection::new(
                    RejectionReason::FutureTimestamp,
                    format!("timestamp {timestamp_us} is beyond now + {skew_ms}ms"),
                ));
            }
        }

        if let Some(last) = last_accepted_us {
            if timestamp_us == last {
                return Err(Rejection::new(
                    RejectionReason::DuplicateTimestamp,
                    format!("timestamp {timestamp_us} already accepted"),
                ));
            }
            if timestamp_us < last {
                return Err(Rejection::new(
                    RejectionReason::NonmonotonicTimestamp,
                    format!("timestamp {timestamp_us} precedes last accepted {last}"),
                ));
            }
        }

        Ok(Sample {
            stream_id: raw.stream_id.clone(),
            timestamp_us,
            x,
            y,
            z,
        })
    }

    fn bound_axis(&self, axis: &str, value: f64) -> Result<f64, Rejection> {
        let bound = self.config.accel_bound_ms2;
        if value.abs() <= bound {
            return Ok(value);
        }
        match self.config.out_of_range {
            OutOfRangePolicy::Clamp => Ok(value.clamp(-bound, bound)),
            OutOfRangePolicy::Reject => Err(Rejection::new(
                RejectionReason::OutOfRange,
                format!("{axis}={value} exceeds ±{bound}"),
            )),
        }
    }
}

fn missing_fields(raw: &RawSample) -> String {
    let missing: Vec<&str> = [
        ("timestamp_us", raw.timestamp_us.is_none()),
        ("x", raw.x.is_none()),
        ("y", raw.y.is_none()),
        ("z", raw.z.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();
    format!("missing {}", missing.join(", "))
}
