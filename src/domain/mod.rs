//! Core data model: fields, vegetation indices, analysis outcomes, alerts,
//! and precision-agriculture plans.

pub mod alert;
pub mod analysis;
pub mod field;
pub mod indices;
pub mod plan;

pub use alert::{
    ActionItem, ActionPriority, ActiveWindow, Alert, AlertCore, AlertKind, AlertStatus,
    SatelliteContext, Severity, StressAlert, WeatherAlert, WeatherContext,
};
pub use analysis::{
    AlertSeed, ComparisonToPrevious, FieldAnalysis, FieldRecommendation, GrowthStage,
    RecommendationCategory, RecommendationPriority, SeasonalAverage, Significance,
    StressIndicators, Trend, TrendPoint, TrendSeries, ZoneBand, ZonePartition,
    HEALTHY_NDVI_MIN, STRESSED_NDVI_MAX,
};
pub use field::{BoundingBox, FieldBoundary, GeoPoint, HECTARES_TO_ACRES};
pub use indices::{HistogramBin, NdviHistogram, VegetationIndices};
pub use plan::{
    ApplicationKind, ApplicationTiming, ApplicationZone, CropType, EquipmentGuidance,
    ExpectedOutcome, PlanSummary, PrecisionPlan, ScheduledWeek, Season,
    VariableRateRecommendation,
};
