use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::alert::AlertKind;
use super::field::FieldBoundary;
use super::indices::VegetationIndices;
use crate::error::{AnalysisError, AnalysisResult};

/// NDVI band edges for management-zone classification.
pub const HEALTHY_NDVI_MIN: f64 = 0.6;
pub const STRESSED_NDVI_MAX: f64 = 0.3;

/// One management-zone band of a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub percentage: f64,
    pub area_hectares: f64,
}

/// Partition of the field's pixel population by NDVI band.
///
/// Percentages sum to 100 ± 0.1; areas sum to the field's total area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZonePartition {
    pub healthy: ZoneBand,
    pub moderate: ZoneBand,
    pub stressed: ZoneBand,
}

impl ZonePartition {
    pub fn validate(&self, total_area_hectares: f64) -> AnalysisResult<()> {
        let pct_sum = self.healthy.percentage + self.moderate.percentage + self.stressed.percentage;
        if (pct_sum - 100.0).abs() > 0.1 {
            return Err(AnalysisError::internal(format!(
                "zone percentages sum to {pct_sum:.3}, expected 100"
            )));
        }
        let area_sum =
            self.healthy.area_hectares + self.moderate.area_hectares + self.stressed.area_hectares;
        let tolerance = total_area_hectares * 0.005;
        if (area_sum - total_area_hectares).abs() > tolerance {
            return Err(AnalysisError::internal(format!(
                "zone areas sum to {area_sum:.3} ha, expected {total_area_hectares:.3} ha"
            )));
        }
        Ok(())
    }
}

/// Derived stress sub-scores, each in [0, 1] where 1 is maximal stress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressIndicators {
    pub drought: f64,
    pub disease: f64,
    pub nutrient: f64,
    pub pest: Option<f64>,
    pub temperature: Option<f64>,
    /// Confidence in the scores, degraded by cloud cover.
    pub confidence: f64,
    /// Set when cloud cover exceeds the configured threshold.
    pub low_confidence: bool,
}

impl StressIndicators {
    /// Worst stress across all present sub-scores.
    pub fn max_stress(&self) -> f64 {
        let mut worst = self.drought.max(self.disease).max(self.nutrient);
        if let Some(pest) = self.pest {
            worst = worst.max(pest);
        }
        if let Some(temperature) = self.temperature {
            worst = worst.max(temperature);
        }
        worst
    }

    /// Name of the dominant stressor.
    pub fn primary_stressor(&self) -> &'static str {
        let mut best = ("drought", self.drought);
        for (name, score) in [
            ("disease", self.disease),
            ("nutrient", self.nutrient),
            ("pest", self.pest.unwrap_or(0.0)),
            ("temperature", self.temperature.unwrap_or(0.0)),
        ] {
            if score > best.1 {
                best = (name, score);
            }
        }
        best.0
    }
}

/// Direction of NDVI movement since the prior analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// How meaningful the NDVI movement is, relative to the prior value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    High,
    Moderate,
    Low,
}

/// Comparison of this analysis against the field's most recent prior result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonToPrevious {
    pub prior_date: NaiveDate,
    pub prior_ndvi_mean: f64,
    pub delta_mean_ndvi: f64,
    pub trend: Trend,
    pub significance: Significance,
}

/// A threshold breach observed during analysis. The alert engine is
/// authoritative; the analysis engine only seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSeed {
    pub kind: AlertKind,
    pub score: f64,
    pub affected_area_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Irrigation,
    Fertilization,
    PestControl,
    SoilManagement,
    HarvestTiming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Rule-based agronomic recommendation seeded by the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecommendation {
    pub id: Uuid,
    pub category: RecommendationCategory,
    pub priority: RecommendationPriority,
    pub title: String,
    pub detail: String,
}

/// Complete per-(field, date) analysis outcome. Unique on
/// (field.id, analysis_date); re-running the same analysis upserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAnalysis {
    pub field: FieldBoundary,
    pub analysis_date: NaiveDate,
    pub indices: VegetationIndices,
    pub zones: ZonePartition,
    pub stress: StressIndicators,
    pub health_score: u8,
    pub comparison: Option<ComparisonToPrevious>,
    pub alert_seeds: Vec<AlertSeed>,
    pub recommendations: Vec<FieldRecommendation>,
    pub created_at: DateTime<Utc>,
}

impl FieldAnalysis {
    /// Upsert key in the persistence store.
    pub fn key(&self) -> (String, NaiveDate) {
        (self.field.id.clone(), self.analysis_date)
    }
}

/// Estimated crop development stage, derived from NDVI level and season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Dormant,
    Emergence,
    Vegetative,
    Reproductive,
    Maturation,
}

/// One point of a field's NDVI/health time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub ndvi_mean: f64,
    pub health_score: u8,
}

/// Per-season NDVI average over the requested range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalAverage {
    pub label: String,
    pub mean_ndvi: f64,
    pub samples: usize,
}

/// Historical trend series for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub field_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub points: Vec<TrendPoint>,
    pub seasonal_averages: Vec<SeasonalAverage>,
    pub growth_stage: Option<GrowthStage>,
}
