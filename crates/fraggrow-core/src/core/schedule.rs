use std::fmt;
use thiserror::Error;

/// Number of hundredths in one unit; overlap factors carry two decimal places.
const HUNDREDTHS: f64 = 100.0;

/// An overlap factor rounded to two decimal places.
///
/// The value is stored as an integer count of hundredths so that two factors
/// computed for the same step always compare equal and always render to the
/// same text, whichever process computed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlapFactor {
    hundredths: i64,
}

impl OverlapFactor {
    /// Rounds `value` to the nearest hundredth.
    pub fn from_f64(value: f64) -> Self {
        Self {
            hundredths: (value * HUNDREDTHS).round() as i64,
        }
    }

    pub fn hundredths(self) -> i64 {
        self.hundredths
    }

    pub fn value(self) -> f64 {
        self.hundredths as f64 / HUNDREDTHS
    }
}

impl fmt::Display for OverlapFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.hundredths < 0 { "-" } else { "" };
        let magnitude = self.hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ScheduleError {
    #[error("The number of growing iterations must be at least 1")]
    NoIterations,
    #[error("Overlap bounds must be finite (min: {min}, max: {max})")]
    NonFinite { min: f64, max: f64 },
    #[error("Overlap bounds must satisfy 0 <= min <= max (min: {min}, max: {max})")]
    InvalidBounds { min: f64, max: f64 },
}

/// Linear overlap-factor schedule across the `N + 1` growing iterations.
///
/// `overlap(i) = min + (max - min) * i / N`, rounded to two decimals. Every
/// value is recomputed from the closed form; nothing is accumulated between
/// steps.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationSchedule {
    iterations: usize,
    min_overlap: f64,
    max_overlap: f64,
}

impl InterpolationSchedule {
    pub fn new(
        iterations: usize,
        min_overlap: f64,
        max_overlap: f64,
    ) -> Result<Self, ScheduleError> {
        if iterations == 0 {
            return Err(ScheduleError::NoIterations);
        }
        if !min_overlap.is_finite() || !max_overlap.is_finite() {
            return Err(ScheduleError::NonFinite {
                min: min_overlap,
                max: max_overlap,
            });
        }
        if min_overlap < 0.0 || min_overlap > max_overlap {
            return Err(ScheduleError::InvalidBounds {
                min: min_overlap,
                max: max_overlap,
            });
        }
        Ok(Self {
            iterations,
            min_overlap,
            max_overlap,
        })
    }

    /// The final iteration index `N`; iterations run over `0..=N`.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn min_overlap(&self) -> f64 {
        self.min_overlap
    }

    pub fn max_overlap(&self) -> f64 {
        self.max_overlap
    }

    /// Overlap factor for `step`. Steps past `N` are clamped to `N`.
    pub fn overlap(&self, step: usize) -> OverlapFactor {
        overlap_at(
            step.min(self.iterations),
            self.iterations,
            self.min_overlap,
            self.max_overlap,
        )
    }

    /// Every `(step, overlap)` pair for `0..=N`.
    pub fn steps(&self) -> impl Iterator<Item = (usize, OverlapFactor)> + '_ {
        (0..=self.iterations).map(move |step| (step, self.overlap(step)))
    }
}

/// Closed-form linear interpolation between `min` and `max`, rounded to hundredths.
pub fn overlap_at(step: usize, total: usize, min: f64, max: f64) -> OverlapFactor {
    if total == 0 {
        return OverlapFactor::from_f64(max);
    }
    let raw = min + (max - min) * step as f64 / total as f64;
    OverlapFactor::from_f64(raw)
}
