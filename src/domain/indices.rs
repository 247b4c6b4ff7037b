use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// One bin of an NDVI distribution histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    /// Fraction of the pixel population falling in [lower, upper).
    pub fraction: f64,
}

/// NDVI distribution histogram over [-1, 1], supplied by the imagery
/// provider when per-pixel statistics are available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdviHistogram {
    pub bins: Vec<HistogramBin>,
}

impl NdviHistogram {
    /// Minimum bin count for a histogram to be trusted over summary stats.
    pub const MIN_BINS: usize = 10;

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.bins.len() < Self::MIN_BINS {
            return Err(AnalysisError::invalid_input(format!(
                "NDVI histogram needs at least {} bins, got {}",
                Self::MIN_BINS,
                self.bins.len()
            )));
        }
        let mut total = 0.0;
        for window in self.bins.windows(2) {
            if (window[0].upper - window[1].lower).abs() > 1e-9 {
                return Err(AnalysisError::invalid_input(
                    "NDVI histogram bins must be contiguous and ordered",
                ));
            }
        }
        for bin in &self.bins {
            if bin.lower >= bin.upper || bin.fraction < 0.0 || !bin.fraction.is_finite() {
                return Err(AnalysisError::invalid_input(
                    "NDVI histogram bin is malformed",
                ));
            }
            total += bin.fraction;
        }
        if !(0.99..=1.01).contains(&total) {
            return Err(AnalysisError::invalid_input(format!(
                "NDVI histogram fractions must sum to 1, got {total:.4}"
            )));
        }
        Ok(())
    }

    /// Fraction of the population below `threshold`, interpolating linearly
    /// inside the straddling bin.
    pub fn fraction_below(&self, threshold: f64) -> f64 {
        let mut acc = 0.0;
        for bin in &self.bins {
            if bin.upper <= threshold {
                acc += bin.fraction;
            } else if bin.lower < threshold {
                let span = bin.upper - bin.lower;
                acc += bin.fraction * ((threshold - bin.lower) / span);
            }
        }
        acc.clamp(0.0, 1.0)
    }
}

/// Scalar outputs of a single-date acquisition over a bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationIndices {
    pub ndvi_mean: f64,
    pub ndvi_min: f64,
    pub ndvi_max: f64,
    pub ndvi_median: f64,
    pub ndvi_std_dev: f64,
    pub ndre: f64,
    pub evi: f64,
    pub savi: f64,
    pub cloud_cover_pct: f64,
    pub captured_at: DateTime<Utc>,
    pub resolution_meters: f64,
    pub histogram: Option<NdviHistogram>,
}

impl VegetationIndices {
    pub fn validate(&self) -> AnalysisResult<()> {
        for (name, value) in [
            ("ndvi_mean", self.ndvi_mean),
            ("ndvi_min", self.ndvi_min),
            ("ndvi_max", self.ndvi_max),
            ("ndvi_median", self.ndvi_median),
            ("ndre", self.ndre),
            ("evi", self.evi),
            ("savi", self.savi),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(AnalysisError::invalid_input(format!(
                    "{name} must be within [-1, 1], got {value}"
                )));
            }
        }

        if self.ndvi_min > self.ndvi_median || self.ndvi_median > self.ndvi_max {
            return Err(AnalysisError::invalid_input(format!(
                "NDVI ordering violated: min {} median {} max {}",
                self.ndvi_min, self.ndvi_median, self.ndvi_max
            )));
        }

        if self.ndvi_mean < self.ndvi_min || self.ndvi_mean > self.ndvi_max {
            return Err(AnalysisError::invalid_input(format!(
                "NDVI mean {} outside [min, max] = [{}, {}]",
                self.ndvi_mean, self.ndvi_min, self.ndvi_max
            )));
        }

        if !(self.ndvi_std_dev.is_finite() && self.ndvi_std_dev >= 0.0) {
            return Err(AnalysisError::invalid_input(format!(
                "NDVI standard deviation must be non-negative, got {}",
                self.ndvi_std_dev
            )));
        }

        if !(0.0..=100.0).contains(&self.cloud_cover_pct) {
            return Err(AnalysisError::invalid_input(format!(
                "cloud cover must be within [0, 100], got {}",
                self.cloud_cover_pct
            )));
        }

        if let Some(histogram) = &self.histogram {
            histogram.validate()?;
        }

        Ok(())
    }
}
