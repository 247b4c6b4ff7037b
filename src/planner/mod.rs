//! Precision-agriculture planner: turns one field analysis into a
//! zone-differentiated application plan with costs, timing, equipment
//! guidance, and an implementation schedule.
//!
//! The planner is deterministic: identical (analysis, crop, season) input
//! produces an identical plan, down to the name-derived recommendation ids.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub mod rates;
pub mod schedule;

use crate::config::Config;
use crate::domain::{
    ApplicationKind, ApplicationTiming, CropType, EquipmentGuidance, ExpectedOutcome,
    FieldAnalysis, PlanSummary, PrecisionPlan, Season, VariableRateRecommendation,
};
use crate::error::AnalysisResult;
use crate::persistence::PersistenceStore;

use crate::alerts::loss::round_usd;

/// Revenue attributed per percentage point of yield increase, per acre.
const REVENUE_PER_YIELD_PCT_ACRE: f64 = 50.0;

const SUSTAINABILITY_BASE: f64 = 85.0;
const SUSTAINABILITY_CAP: f64 = 95.0;

pub struct PrecisionPlanner {
    config: Arc<Config>,
    store: Arc<dyn PersistenceStore>,
}

impl PrecisionPlanner {
    pub fn new(config: Arc<Config>, store: Arc<dyn PersistenceStore>) -> Self {
        Self { config, store }
    }

    /// Build, persist, and return the plan for one analyzed field.
    pub async fn plan(
        &self,
        farm_id: &str,
        analysis: &FieldAnalysis,
        crop: CropType,
        season: Season,
    ) -> AnalysisResult<PrecisionPlan> {
        let field = &analysis.field;
        let total_area_acres = field.area_acres();
        let plan_date = analysis.analysis_date;

        let mut recommendations = Vec::new();
        for kind in self.gated_kinds(analysis, season) {
            recommendations.push(self.build_recommendation(
                farm_id, analysis, crop, season, kind, plan_date,
            ));
        }

        let summary = build_summary(&recommendations, total_area_acres);
        let schedule = schedule::build_schedule(&recommendations, plan_date);

        let plan = PrecisionPlan {
            farm_id: farm_id.to_string(),
            field_id: field.id.clone(),
            season,
            crop_type: crop,
            total_area_acres,
            recommendations,
            summary,
            schedule,
            derived_from: plan_date,
        };
        plan.validate()?;

        self.store.upsert_plan(&plan).await?;
        info!(
            farm_id,
            field_id = %field.id,
            season = season.label(),
            crop = crop.label(),
            recommendations = plan.recommendations.len(),
            total_cost_usd = plan.summary.total_cost_usd,
            "precision plan generated"
        );
        Ok(plan)
    }

    /// Which application kinds this analysis warrants.
    fn gated_kinds(&self, analysis: &FieldAnalysis, season: Season) -> Vec<ApplicationKind> {
        let stress = &analysis.stress;
        let mut kinds = Vec::new();
        if stress.nutrient >= 0.3 {
            kinds.push(ApplicationKind::Fertilizer);
        }
        if stress.drought >= 0.4 {
            kinds.push(ApplicationKind::Irrigation);
        }
        if season.is_pre_plant() {
            kinds.push(ApplicationKind::Seed);
        }
        if stress.disease >= 0.5 {
            kinds.push(ApplicationKind::Pesticide);
        }
        // Lime is a pre-plant soil amendment; severe nutrient stress is the
        // proxy for pH correction being worth a soil test.
        if season.is_pre_plant() && stress.nutrient >= 0.5 {
            kinds.push(ApplicationKind::Lime);
        }
        kinds
    }

    fn build_recommendation(
        &self,
        farm_id: &str,
        analysis: &FieldAnalysis,
        crop: CropType,
        season: Season,
        kind: ApplicationKind,
        plan_date: NaiveDate,
    ) -> VariableRateRecommendation {
        let spec = rates::rate_spec(kind, crop);
        let multipliers = rates::multipliers_for(&self.config.planner, kind);
        let (zones, total_quantity) = rates::build_zones(&analysis.zones, spec.base_rate, multipliers);

        let total_area_acres = analysis.field.area_acres();
        let estimated_cost_usd = round_usd(total_quantity * spec.unit_cost_usd);

        let flat_quantity = spec.base_rate * total_area_acres;
        let cost_savings_usd =
            round_usd(((flat_quantity - total_quantity) * spec.unit_cost_usd).max(0.0));

        let yield_increase_pct = yield_increase(kind, analysis);
        let revenue = yield_increase_pct * REVENUE_PER_YIELD_PCT_ACRE * total_area_acres;
        let roi_pct = if estimated_cost_usd > 0.0 {
            round_usd((revenue - estimated_cost_usd) / estimated_cost_usd * 100.0)
        } else {
            0.0
        };

        // Name-derived id keeps re-planning idempotent per (farm, field,
        // season, kind).
        let id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!(
                "{farm_id}:{}:{}:{}",
                analysis.field.id,
                season.label(),
                kind.label()
            )
            .as_bytes(),
        );

        VariableRateRecommendation {
            id,
            kind,
            product: spec.product.to_string(),
            base_rate: spec.base_rate,
            rate_unit: spec.unit.to_string(),
            variability_factor: multipliers.stressed - multipliers.healthy,
            total_quantity,
            estimated_cost_usd,
            zones,
            timing: timing_for(kind, season, plan_date),
            equipment: equipment_for(kind),
            expected_outcome: ExpectedOutcome {
                yield_increase_pct,
                cost_savings_usd,
                environmental_note: environmental_note(kind).to_string(),
                roi_pct,
            },
        }
    }
}

fn yield_increase(kind: ApplicationKind, analysis: &FieldAnalysis) -> f64 {
    let stress = &analysis.stress;
    match kind {
        ApplicationKind::Fertilizer => (stress.nutrient * 20.0).min(12.0),
        ApplicationKind::Irrigation => (stress.drought * 25.0).min(15.0),
        ApplicationKind::Pesticide => (stress.disease * 18.0).min(10.0),
        ApplicationKind::Seed => 4.0,
        ApplicationKind::Lime => 3.0,
    }
}

fn timing_for(kind: ApplicationKind, season: Season, plan_date: NaiveDate) -> ApplicationTiming {
    let (start_days, end_days, constraints): (i64, i64, &[&str]) = match kind {
        ApplicationKind::Fertilizer => (
            7,
            21,
            &["no application within 24 h of forecast rain over 12 mm"],
        ),
        ApplicationKind::Irrigation => (0, 7, &["skip passes on days with wind over 8 m/s"]),
        ApplicationKind::Seed => (14, 35, &["soil temperature at seeding depth at least 10 C"]),
        ApplicationKind::Pesticide => (
            2,
            10,
            &["apply in wind under 5 m/s", "needs a 6 h rain-free window"],
        ),
        ApplicationKind::Lime => (21, 60, &["incorporate before primary tillage"]),
    };
    ApplicationTiming {
        optimal_window_start: plan_date + Duration::days(start_days),
        optimal_window_end: plan_date + Duration::days(end_days),
        weather_constraints: constraints.iter().map(|c| c.to_string()).collect(),
        seasonal_factors: vec![format!("{} application window", season.label())],
    }
}

fn equipment_for(kind: ApplicationKind) -> EquipmentGuidance {
    let mut settings = BTreeMap::new();
    let (recommended, calibration): (&[&str], &[&str]) = match kind {
        ApplicationKind::Fertilizer => {
            settings.insert("spinner_speed_rpm".to_string(), "650".to_string());
            settings.insert("gate_opening".to_string(), "per prescription map".to_string());
            (
                &["variable-rate spreader", "GPS guidance"],
                &[
                    "Catch-test the spreader at the base rate",
                    "Load the zone prescription map",
                    "Verify section control at zone boundaries",
                ],
            )
        }
        ApplicationKind::Irrigation => {
            settings.insert("pass_depth_in".to_string(), "0.75".to_string());
            (
                &["center pivot", "variable-rate nozzles"],
                &[
                    "Check nozzle pressure against the chart",
                    "Confirm zone speed table upload",
                ],
            )
        }
        ApplicationKind::Seed => {
            settings.insert("downforce".to_string(), "auto".to_string());
            settings.insert("row_spacing_in".to_string(), "30".to_string());
            (
                &["variable-rate planter"],
                &[
                    "Calibrate seed meters per hybrid",
                    "Load population prescription",
                ],
            )
        }
        ApplicationKind::Pesticide => {
            settings.insert("boom_height_in".to_string(), "20".to_string());
            settings.insert("pressure_psi".to_string(), "40".to_string());
            (
                &["boom sprayer"],
                &["Flush lines before loading", "Verify nozzle output at 40 psi"],
            )
        }
        ApplicationKind::Lime => (
            &["lime spreader"],
            &["Verify spread width overlap", "Cross-check applied tonnage per zone"],
        ),
    };
    EquipmentGuidance {
        recommended: recommended.iter().map(|e| e.to_string()).collect(),
        settings,
        calibration_steps: calibration.iter().map(|c| c.to_string()).collect(),
    }
}

fn environmental_note(kind: ApplicationKind) -> &'static str {
    match kind {
        ApplicationKind::Fertilizer => "variable rate cuts nitrogen leaching in stressed zones",
        ApplicationKind::Irrigation => "deficit-aware scheduling reduces total water draw",
        ApplicationKind::Pesticide => "zone targeting keeps spray off healthy canopy",
        ApplicationKind::Seed => "matched population reduces replant risk",
        ApplicationKind::Lime => "pH correction improves nutrient uptake efficiency",
    }
}

fn sustainability_bonus(kind: ApplicationKind) -> f64 {
    match kind {
        ApplicationKind::Irrigation => 3.0,
        ApplicationKind::Fertilizer => 2.5,
        ApplicationKind::Pesticide => 2.0,
        ApplicationKind::Lime => 1.5,
        ApplicationKind::Seed => 1.0,
    }
}

fn build_summary(
    recommendations: &[VariableRateRecommendation],
    total_area_acres: f64,
) -> PlanSummary {
    let total_cost_usd = round_usd(recommendations.iter().map(|r| r.estimated_cost_usd).sum::<f64>());
    let expected_revenue_usd = round_usd(
        recommendations
            .iter()
            .map(|r| {
                r.expected_outcome.yield_increase_pct * REVENUE_PER_YIELD_PCT_ACRE * total_area_acres
            })
            .sum::<f64>(),
    );
    let net_benefit_usd = round_usd(expected_revenue_usd - total_cost_usd);
    let payback_months = if expected_revenue_usd > 0.0 {
        Some(round_usd(total_cost_usd / (expected_revenue_usd / 12.0)))
    } else {
        None
    };
    let sustainability_score = recommendations
        .iter()
        .fold(SUSTAINABILITY_BASE, |score, rec| {
            score + sustainability_bonus(rec.kind)
        })
        .min(SUSTAINABILITY_CAP);

    PlanSummary {
        total_cost_usd,
        expected_revenue_usd,
        net_benefit_usd,
        payback_months,
        sustainability_score,
    }
}
