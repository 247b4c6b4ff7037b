//! Vegetation-index composition: stress sub-scores and the health score.
//! Every formula here is deterministic; identical inputs produce
//! byte-identical outputs.

use crate::domain::{StressIndicators, VegetationIndices};

/// Red-edge value expected for a given canopy NDVI; chlorophyll falling
/// short of this by more than the tolerance reads as disease pressure.
const NDRE_EXPECTED_RATIO: f64 = 0.6;
const NDRE_DEFICIT_TOLERANCE: f64 = 0.15;

/// NDVI exceeding SAVI by more than this indicates strong soil-background
/// reflectance, which masks nutrient status.
const SOIL_SIGNAL_TOLERANCE: f64 = 0.2;

/// Practical EVI ceiling for dense canopy; used to normalize EVI into [0, 1].
const EVI_CEILING: f64 = 0.8;

/// NDVI std-dev above this reads as patchy canopy damage.
const PEST_HETEROGENEITY_FLOOR: f64 = 0.15;

#[derive(Debug, Clone, Copy)]
pub struct IndexCalculator {
    max_cloud_pct: f64,
}

impl IndexCalculator {
    pub fn new(max_cloud_pct: f64) -> Self {
        Self { max_cloud_pct }
    }

    /// Derive the stress-indicator vector from aggregated indices.
    pub fn stress_indicators(&self, indices: &VegetationIndices) -> StressIndicators {
        let ndvi = indices.ndvi_mean;

        let drought = (1.0 - ndvi * 1.5).clamp(0.0, 1.0);

        let mut disease = (0.5 - ndvi * 0.6).clamp(0.0, 1.0);
        let ndre_deficit = NDRE_EXPECTED_RATIO * ndvi - indices.ndre;
        if ndre_deficit > NDRE_DEFICIT_TOLERANCE {
            disease = (disease + (ndre_deficit - NDRE_DEFICIT_TOLERANCE) * 0.5).clamp(0.0, 1.0);
        }

        let mut nutrient = (0.8 - ndvi * 0.8).clamp(0.0, 1.0);
        let soil_signal = ndvi - indices.savi;
        if soil_signal > SOIL_SIGNAL_TOLERANCE {
            nutrient = (nutrient + (soil_signal - SOIL_SIGNAL_TOLERANCE) * 0.5).clamp(0.0, 1.0);
        }

        let pest = if indices.ndvi_std_dev > PEST_HETEROGENEITY_FLOOR && disease > 0.3 {
            Some(((indices.ndvi_std_dev - PEST_HETEROGENEITY_FLOOR) * 2.0).clamp(0.0, 1.0))
        } else {
            None
        };

        let low_confidence = indices.cloud_cover_pct > self.max_cloud_pct;
        let mut confidence = (1.0 - indices.cloud_cover_pct / 100.0 * 0.5).clamp(0.0, 1.0);
        if low_confidence {
            confidence = confidence.min(0.5);
        }

        StressIndicators {
            drought,
            disease,
            nutrient,
            pest,
            // Temperature stress needs weather context; the alert engine
            // evaluates it on the weather pathway.
            temperature: None,
            confidence,
            low_confidence,
        }
    }

    /// Compose the 0-100 health score. Monotone in NDVI: raising the mean
    /// with everything else fixed never lowers the score.
    pub fn health_score(&self, indices: &VegetationIndices, stress: &StressIndicators) -> u8 {
        let evi_normalized = (indices.evi / EVI_CEILING).clamp(0.0, 1.0);
        let raw = 100.0
            * (0.6 * indices.ndvi_mean
                + 0.25 * (1.0 - stress.max_stress())
                + 0.15 * evi_normalized);
        raw.clamp(0.0, 100.0).round() as u8
    }
}
