use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::field::GeoPoint;
use crate::error::{AnalysisError, AnalysisResult};

/// Input applied at a variable rate across management zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    Fertilizer,
    Seed,
    Pesticide,
    Irrigation,
    Lime,
}

impl ApplicationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fertilizer => "fertilizer",
            Self::Seed => "seed",
            Self::Pesticide => "pesticide",
            Self::Irrigation => "irrigation",
            Self::Lime => "lime",
        }
    }
}

/// Point in the cropping calendar a plan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    PrePlant,
    EarlySeason,
    MidSeason,
    LateSeason,
}

impl Season {
    /// Northern-hemisphere default when the caller does not supply one.
    pub fn from_month(month: u32) -> Self {
        match month {
            3 | 4 => Self::PrePlant,
            5 | 6 => Self::EarlySeason,
            7 | 8 => Self::MidSeason,
            _ => Self::LateSeason,
        }
    }

    pub fn is_pre_plant(&self) -> bool {
        matches!(self, Self::PrePlant)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PrePlant => "pre_plant",
            Self::EarlySeason => "early_season",
            Self::MidSeason => "mid_season",
            Self::LateSeason => "late_season",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    Corn,
    Soybean,
    Wheat,
    Cotton,
    Generic,
}

impl CropType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Corn => "corn",
            Self::Soybean => "soybean",
            Self::Wheat => "wheat",
            Self::Cotton => "cotton",
            Self::Generic => "generic",
        }
    }
}

/// One management zone of a variable-rate recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationZone {
    pub zone_id: String,
    /// NDVI band the zone covers, [low, high].
    pub ndvi_range: [f64; 2],
    pub area_acres: f64,
    /// Application rate in the recommendation's unit, per acre.
    pub rate: f64,
    pub rationale: String,
    pub polygon: Option<Vec<GeoPoint>>,
}

/// When to apply, and under what constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationTiming {
    pub optimal_window_start: NaiveDate,
    pub optimal_window_end: NaiveDate,
    pub weather_constraints: Vec<String>,
    pub seasonal_factors: Vec<String>,
}

/// Machinery guidance for executing a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentGuidance {
    pub recommended: Vec<String>,
    pub settings: BTreeMap<String, String>,
    pub calibration_steps: Vec<String>,
}

/// Projected agronomic and economic outcome of a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub yield_increase_pct: f64,
    pub cost_savings_usd: f64,
    pub environmental_note: String,
    pub roi_pct: f64,
}

/// Zone-differentiated application plan for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRateRecommendation {
    pub id: Uuid,
    pub kind: ApplicationKind,
    pub product: String,
    /// Baseline rate per acre; each zone applies base × band multiplier.
    pub base_rate: f64,
    pub rate_unit: String,
    /// Span between the lowest and highest zone multiplier.
    pub variability_factor: f64,
    pub total_quantity: f64,
    pub estimated_cost_usd: f64,
    pub zones: Vec<ApplicationZone>,
    pub timing: ApplicationTiming,
    pub equipment: EquipmentGuidance,
    pub expected_outcome: ExpectedOutcome,
}

impl VariableRateRecommendation {
    /// Zones must cover the plan area and quantities must reconcile:
    /// total_quantity = Σ zone.area × zone.rate.
    pub fn validate(&self) -> AnalysisResult<()> {
        let quantity: f64 = self.zones.iter().map(|z| z.area_acres * z.rate).sum();
        if (quantity - self.total_quantity).abs() > self.total_quantity.abs() * 1e-6 + 1e-6 {
            return Err(AnalysisError::internal(format!(
                "{} quantity {:.3} does not match zone sum {:.3}",
                self.kind.label(),
                self.total_quantity,
                quantity
            )));
        }
        Ok(())
    }
}

/// Farm-economics rollup of a precision plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_cost_usd: f64,
    pub expected_revenue_usd: f64,
    pub net_benefit_usd: f64,
    /// None when expected revenue is zero (the plan never pays back).
    pub payback_months: Option<f64>,
    pub sustainability_score: f64,
}

/// One week of the implementation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledWeek {
    pub week_start: NaiveDate,
    pub tasks: Vec<String>,
}

/// Complete precision-agriculture plan for one field and season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionPlan {
    pub farm_id: String,
    pub field_id: String,
    pub season: Season,
    pub crop_type: CropType,
    pub total_area_acres: f64,
    pub recommendations: Vec<VariableRateRecommendation>,
    pub summary: PlanSummary,
    pub schedule: Vec<ScheduledWeek>,
    /// Analysis date the plan was derived from.
    pub derived_from: NaiveDate,
}

impl PrecisionPlan {
    /// Upsert key in the persistence store.
    pub fn key(&self) -> (String, String, Season) {
        (self.farm_id.clone(), self.field_id.clone(), self.season)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        for rec in &self.recommendations {
            rec.validate()?;
        }
        let cost: f64 = self.recommendations.iter().map(|r| r.estimated_cost_usd).sum();
        if (cost - self.summary.total_cost_usd).abs() > 0.01 {
            return Err(AnalysisError::internal(format!(
                "plan total cost {:.2} does not match recommendation sum {:.2}",
                self.summary.total_cost_usd, cost
            )));
        }
        if !(0.0..=100.0).contains(&self.summary.sustainability_score) {
            return Err(AnalysisError::internal(format!(
                "sustainability score {} out of range",
                self.summary.sustainability_score
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_from_month() {
        assert_eq!(Season::from_month(3), Season::PrePlant);
        assert_eq!(Season::from_month(5), Season::EarlySeason);
        assert_eq!(Season::from_month(8), Season::MidSeason);
        assert_eq!(Season::from_month(10), Season::LateSeason);
        assert_eq!(Season::from_month(1), Season::LateSeason);
    }

    #[test]
    fn test_quantity_reconciliation() {
        let rec = VariableRateRecommendation {
            id: Uuid::new_v4(),
            kind: ApplicationKind::Fertilizer,
            product: "urea 46-0-0".to_string(),
            base_rate: 100.0,
            rate_unit: "lb/acre".to_string(),
            variability_factor: 0.5,
            total_quantity: 100.0 * 1.4 * 10.0 + 100.0 * 0.9 * 30.0,
            estimated_cost_usd: 2000.0,
            zones: vec![
                ApplicationZone {
                    zone_id: "stressed".to_string(),
                    ndvi_range: [-1.0, 0.3],
                    area_acres: 10.0,
                    rate: 140.0,
                    rationale: "low vigor".to_string(),
                    polygon: None,
                },
                ApplicationZone {
                    zone_id: "healthy".to_string(),
                    ndvi_range: [0.6, 1.0],
                    area_acres: 30.0,
                    rate: 90.0,
                    rationale: "maintain".to_string(),
                    polygon: None,
                },
            ],
            timing: ApplicationTiming {
                optimal_window_start: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                optimal_window_end: NaiveDate::from_ymd_opt(2024, 4, 14).unwrap(),
                weather_constraints: vec![],
                seasonal_factors: vec![],
            },
            equipment: EquipmentGuidance {
                recommended: vec!["spreader".to_string()],
                settings: BTreeMap::new(),
                calibration_steps: vec![],
            },
            expected_outcome: ExpectedOutcome {
                yield_increase_pct: 6.0,
                cost_savings_usd: 120.0,
                environmental_note: "reduced leaching".to_string(),
                roi_pct: 40.0,
            },
        };
        assert!(rec.validate().is_ok());

        let mut broken = rec;
        broken.total_quantity += 50.0;
        assert!(broken.validate().is_err());
    }
}
