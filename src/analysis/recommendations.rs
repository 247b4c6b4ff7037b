//! Rule-based recommendation seeding. Each rule fires on stress thresholds
//! and current zone distribution; the precision planner later turns the
//! same signals into variable-rate plans.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::domain::{
    ComparisonToPrevious, FieldRecommendation, RecommendationCategory, RecommendationPriority,
    StressIndicators, Trend, ZonePartition,
};

pub fn seed_recommendations(
    stress: &StressIndicators,
    zones: &ZonePartition,
    health_score: u8,
    comparison: Option<&ComparisonToPrevious>,
    analysis_date: NaiveDate,
) -> Vec<FieldRecommendation> {
    let mut recommendations = Vec::new();
    let mut push = |category, priority, title: &str, detail: String| {
        recommendations.push(FieldRecommendation {
            id: Uuid::new_v4(),
            category,
            priority,
            title: title.to_string(),
            detail,
        });
    };

    // Irrigation
    if stress.drought >= 0.6 {
        push(
            RecommendationCategory::Irrigation,
            RecommendationPriority::Urgent,
            "Start emergency irrigation",
            format!(
                "Drought stress at {:.2}; prioritize the {:.0}% of area currently below the stressed NDVI band.",
                stress.drought, zones.stressed.percentage
            ),
        );
    } else if stress.drought >= 0.4 {
        push(
            RecommendationCategory::Irrigation,
            RecommendationPriority::High,
            "Schedule irrigation within 48 hours",
            format!("Drought stress at {:.2} and climbing toward critical.", stress.drought),
        );
    } else if stress.drought >= 0.25 {
        push(
            RecommendationCategory::Irrigation,
            RecommendationPriority::Medium,
            "Monitor soil moisture",
            "Early drought signal; verify probe readings before committing water.".to_string(),
        );
    }

    // Fertilization
    if stress.nutrient >= 0.7 {
        push(
            RecommendationCategory::Fertilization,
            RecommendationPriority::Urgent,
            "Corrective nutrient application",
            format!(
                "Nutrient stress at {:.2}; pull tissue samples and apply corrective nitrogen to stressed zones.",
                stress.nutrient
            ),
        );
    } else if stress.nutrient >= 0.3 {
        push(
            RecommendationCategory::Fertilization,
            RecommendationPriority::Medium,
            "Plan split nitrogen application",
            format!("Nutrient stress at {:.2}; a split application avoids over-feeding healthy zones.", stress.nutrient),
        );
    }

    // Pest and disease control
    if stress.disease >= 0.5 {
        push(
            RecommendationCategory::PestControl,
            RecommendationPriority::High,
            "Scout for disease",
            format!(
                "Disease score {:.2} with red-edge divergence; stage fungicide for the affected zones.",
                stress.disease
            ),
        );
    }
    if let Some(pest) = stress.pest {
        if pest >= 0.6 {
            push(
                RecommendationCategory::PestControl,
                RecommendationPriority::High,
                "Ground-truth patchy canopy damage",
                format!("Canopy heterogeneity consistent with pest pressure ({pest:.2})."),
            );
        }
    }

    // Soil management
    if zones.stressed.percentage > 25.0 {
        push(
            RecommendationCategory::SoilManagement,
            RecommendationPriority::Medium,
            "Investigate stressed-zone soils",
            format!(
                "{:.0}% of the field sits in the stressed band; check for compaction and drainage before the next pass.",
                zones.stressed.percentage
            ),
        );
    }

    // Harvest timing
    let month = analysis_date.month();
    let declining = comparison
        .map(|c| c.trend == Trend::Declining)
        .unwrap_or(false);
    if (8..=10).contains(&month) && health_score >= 60 && declining {
        push(
            RecommendationCategory::HarvestTiming,
            RecommendationPriority::Medium,
            "Begin harvest-readiness checks",
            "Canopy is senescing on schedule; start moisture sampling to pick the harvest window."
                .to_string(),
        );
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Significance, ZoneBand};

    fn stress(drought: f64, disease: f64, nutrient: f64) -> StressIndicators {
        StressIndicators {
            drought,
            disease,
            nutrient,
            pest: None,
            temperature: None,
            confidence: 0.95,
            low_confidence: false,
        }
    }

    fn zones(stressed_pct: f64) -> ZonePartition {
        let healthy = 100.0 - stressed_pct - 10.0;
        ZonePartition {
            healthy: ZoneBand {
                percentage: healthy,
                area_hectares: healthy,
            },
            moderate: ZoneBand {
                percentage: 10.0,
                area_hectares: 10.0,
            },
            stressed: ZoneBand {
                percentage: stressed_pct,
                area_hectares: stressed_pct,
            },
        }
    }

    fn date(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, 15).unwrap()
    }

    #[test]
    fn test_severe_drought_seeds_urgent_irrigation() {
        let recs = seed_recommendations(&stress(0.7, 0.1, 0.1), &zones(40.0), 30, None, date(7));
        let irrigation: Vec<_> = recs
            .iter()
            .filter(|r| r.category == RecommendationCategory::Irrigation)
            .collect();
        assert_eq!(irrigation.len(), 1);
        assert_eq!(irrigation[0].priority, RecommendationPriority::Urgent);
    }

    #[test]
    fn test_healthy_field_seeds_nothing() {
        let recs = seed_recommendations(&stress(0.0, 0.05, 0.15), &zones(0.0), 82, None, date(7));
        assert!(recs.is_empty());
    }

    #[test]
    fn test_stressed_zones_seed_soil_check() {
        let recs = seed_recommendations(&stress(0.1, 0.1, 0.1), &zones(30.0), 55, None, date(6));
        assert!(recs
            .iter()
            .any(|r| r.category == RecommendationCategory::SoilManagement));
    }

    #[test]
    fn test_harvest_timing_needs_decline_and_season() {
        let comparison = ComparisonToPrevious {
            prior_date: date(8),
            prior_ndvi_mean: 0.7,
            delta_mean_ndvi: -0.09,
            trend: Trend::Declining,
            significance: Significance::Moderate,
        };
        let recs = seed_recommendations(
            &stress(0.1, 0.1, 0.1),
            &zones(5.0),
            70,
            Some(&comparison),
            date(9),
        );
        assert!(recs
            .iter()
            .any(|r| r.category == RecommendationCategory::HarvestTiming));

        // Same decline in mid-summer does not fire
        let recs = seed_recommendations(
            &stress(0.1, 0.1, 0.1),
            &zones(5.0),
            70,
            Some(&comparison),
            date(6),
        );
        assert!(!recs
            .iter()
            .any(|r| r.category == RecommendationCategory::HarvestTiming));
    }
}
