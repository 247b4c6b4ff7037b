//! Management-zone partitioning from NDVI distribution statistics.
//!
//! The partitioner never sees per-pixel data. With a histogram of at least
//! ten bins it integrates directly; with summary statistics only, it
//! assumes a normal distribution truncated to [-1, 1].

use statrs::distribution::{ContinuousCDF, Normal};

use crate::domain::{
    NdviHistogram, VegetationIndices, ZoneBand, ZonePartition, HEALTHY_NDVI_MIN, STRESSED_NDVI_MAX,
};
use crate::error::{AnalysisError, AnalysisResult};

pub struct ZonePartitioner;

impl ZonePartitioner {
    /// Partition a field's pixel population into healthy / moderate /
    /// stressed bands and allocate area accordingly.
    pub fn partition(
        indices: &VegetationIndices,
        total_area_hectares: f64,
    ) -> AnalysisResult<ZonePartition> {
        if !(total_area_hectares.is_finite() && total_area_hectares > 0.0) {
            return Err(AnalysisError::invalid_input(format!(
                "total area must be positive, got {total_area_hectares}"
            )));
        }

        let (stressed_frac, moderate_frac, healthy_frac) = match &indices.histogram {
            Some(histogram) if histogram.bins.len() >= NdviHistogram::MIN_BINS => {
                Self::fractions_from_histogram(histogram)?
            }
            _ => Self::fractions_from_summary(indices)?,
        };

        let partition = ZonePartition {
            healthy: ZoneBand {
                percentage: healthy_frac * 100.0,
                area_hectares: healthy_frac * total_area_hectares,
            },
            moderate: ZoneBand {
                percentage: moderate_frac * 100.0,
                area_hectares: moderate_frac * total_area_hectares,
            },
            stressed: ZoneBand {
                percentage: stressed_frac * 100.0,
                area_hectares: stressed_frac * total_area_hectares,
            },
        };

        partition.validate(total_area_hectares)?;
        Ok(partition)
    }

    fn fractions_from_histogram(histogram: &NdviHistogram) -> AnalysisResult<(f64, f64, f64)> {
        histogram.validate()?;
        let stressed = histogram.fraction_below(STRESSED_NDVI_MAX);
        let below_healthy = histogram.fraction_below(HEALTHY_NDVI_MIN);
        let moderate = (below_healthy - stressed).max(0.0);
        let healthy = (1.0 - below_healthy).max(0.0);
        Ok(Self::normalized(stressed, moderate, healthy))
    }

    /// Truncated-normal fallback. The summary std-dev understates
    /// within-field patchiness, so the effective spread is the larger of
    /// the std-dev and half the observed range.
    fn fractions_from_summary(indices: &VegetationIndices) -> AnalysisResult<(f64, f64, f64)> {
        let mean = indices.ndvi_mean;
        let spread = indices
            .ndvi_std_dev
            .max((indices.ndvi_max - indices.ndvi_min) / 2.0);

        if spread < 1e-9 {
            // Degenerate distribution: all mass in the band containing the mean
            return Ok(if mean < STRESSED_NDVI_MAX {
                (1.0, 0.0, 0.0)
            } else if mean < HEALTHY_NDVI_MIN {
                (0.0, 1.0, 0.0)
            } else {
                (0.0, 0.0, 1.0)
            });
        }

        let normal = Normal::new(mean, spread).map_err(|e| {
            AnalysisError::internal(format!("cannot build NDVI distribution: {e}"))
        })?;

        let lower_mass = normal.cdf(-1.0);
        let truncated_mass = normal.cdf(1.0) - lower_mass;
        if truncated_mass <= 0.0 {
            return Err(AnalysisError::internal(
                "NDVI distribution has no mass inside [-1, 1]",
            ));
        }
        let fraction_below =
            |threshold: f64| ((normal.cdf(threshold) - lower_mass) / truncated_mass).clamp(0.0, 1.0);

        let stressed = fraction_below(STRESSED_NDVI_MAX);
        let below_healthy = fraction_below(HEALTHY_NDVI_MIN);
        let moderate = (below_healthy - stressed).max(0.0);
        let healthy = (1.0 - below_healthy).max(0.0);
        Ok(Self::normalized(stressed, moderate, healthy))
    }

    fn normalized(stressed: f64, moderate: f64, healthy: f64) -> (f64, f64, f64) {
        let total = stressed + moderate + healthy;
        if total <= 0.0 {
            return (0.0, 0.0, 1.0);
        }
        (stressed / total, moderate / total, healthy / total)
    }
}
