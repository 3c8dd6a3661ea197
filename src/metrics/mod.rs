//! Repeated-run metrics: sampling, reduction and formatting.
//!
//! A metrics command runs the interpreter `reps` times, turns each run's
//! captured output into a sample with [`alloc::memory_allocated`] or
//! [`timing::get_times`], and reduces the samples to a printable summary.
//! Repetitions run strictly one after another; the first failure aborts
//! the whole batch.

pub mod alloc;
pub mod patterns;
pub mod timing;

use std::fmt;
use std::io::Write;

use anyhow::Result;
use serde::Serialize;

pub use alloc::{memory_allocated, AllocationSample};
pub use timing::{get_times, TimingRecord};

use crate::error::JtError;

/// Run `sample` `reps` times and collect the results.
///
/// When `progress` is given a `.` is written to it before every repetition
/// and a newline once all of them have finished.
pub fn collect<T, F>(
    reps: usize,
    mut progress: Option<&mut dyn Write>,
    mut sample: F,
) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Result<T>,
{
    let mut samples = Vec::with_capacity(reps);
    for rep in 0..reps {
        if let Some(out) = progress.as_deref_mut() {
            write!(out, ".")?;
            out.flush()?;
        }
        tracing::debug!("metrics repetition {}/{}", rep + 1, reps);
        samples.push(sample(rep)?);
    }
    if let Some(out) = progress.as_deref_mut() {
        writeln!(out)?;
    }
    Ok(samples)
}

/// Mean and maximum bytes allocated across repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocSummary {
    pub mean: i64,
    pub max: i64,
}

impl AllocSummary {
    /// Floor mean and maximum of `samples`, which must not be empty.
    ///
    /// The sum is taken in `i128`, so the mean of any `i64` samples is exact.
    pub fn from_samples(samples: &[i64]) -> Result<Self> {
        let Some(&max) = samples.iter().max() else {
            return Err(
                JtError::InvalidArgument("no allocation samples were collected".into()).into(),
            );
        };
        let sum = samples
            .iter()
            .try_fold(0i128, |sum, &sample| sum.checked_add(i128::from(sample)))
            .ok_or_else(|| JtError::InvalidArgument("allocation samples overflow".into()))?;
        let mean = sum.div_euclid(samples.len() as i128);
        let mean = i64::try_from(mean).map_err(|_| JtError::InvalidNumber {
            value: mean.to_string(),
            line: "mean of allocation samples".into(),
        })?;
        Ok(AllocSummary { mean, max })
    }
}

impl fmt::Display for AllocSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, max {}", human_size(self.mean), human_size(self.max))
    }
}

/// Mean seconds per region across repetitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSummary {
    pub means: TimingRecord,
}

impl TimeSummary {
    /// Average every region of the first record over all records.
    ///
    /// The region set is taken from the first run; a later run that lacks
    /// one of those regions is an error.
    pub fn from_samples(samples: &[TimingRecord]) -> Result<Self> {
        let mut means = TimingRecord::new();
        let Some(first) = samples.first() else {
            return Ok(TimeSummary { means });
        };
        for region in first.regions() {
            let mut sum = 0.0;
            for (run, sample) in samples.iter().enumerate() {
                sum += sample.get(region).ok_or_else(|| JtError::RegionMismatch {
                    region: region.to_string(),
                    run: run + 1,
                })?;
            }
            means.insert(region, sum / samples.len() as f64);
        }
        Ok(TimeSummary { means })
    }
}

impl fmt::Display for TimeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (region, seconds) in self.means.iter() {
            writeln!(f, "{} {} s", region, format_decimal(round2(seconds)))?;
        }
        Ok(())
    }
}

/// Format a byte count with a B, KB or MB suffix (base 1024).
pub fn human_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{} KB", format_decimal(round2(bytes as f64 / KB as f64)))
    } else {
        format!("{} MB", format_decimal(round2(bytes as f64 / MB as f64)))
    }
}

/// Round half away from zero to two decimal places.
///
/// `value * 100` can land just below a tie (1.015 scales to 101.49999...),
/// so the result is bumped when the halfway point, scaled back, does not
/// exceed `value`. This gives 1.015 -> 1.02, the same as `Float#round(2)`.
pub fn round2(value: f64) -> f64 {
    const SCALE: f64 = 100.0;
    let mut scaled = (value * SCALE).round();
    if value > 0.0 && (scaled + 0.5) / SCALE <= value {
        scaled += 1.0;
    } else if value < 0.0 && (scaled - 0.5) / SCALE >= value {
        scaled -= 1.0;
    }
    scaled / SCALE
}

/// Shortest representation of `value` that keeps at least one decimal, e.g. `1.0`, `1.25`.
pub fn format_decimal(value: f64) -> String {
    format!("{value:?}")
}
