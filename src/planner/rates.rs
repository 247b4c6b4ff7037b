//! Base-rate and zone-multiplier tables for variable-rate applications,
//! and the zone construction shared by every application kind.

use crate::config::{PlannerConfig, ZoneMultipliers};
use crate::domain::{
    ApplicationKind, ApplicationZone, CropType, ZonePartition, HEALTHY_NDVI_MIN, HECTARES_TO_ACRES,
    STRESSED_NDVI_MAX,
};

/// Product, baseline rate, and unit economics for one application kind.
#[derive(Debug, Clone, Copy)]
pub struct RateSpec {
    pub product: &'static str,
    pub base_rate: f64,
    pub unit: &'static str,
    pub unit_cost_usd: f64,
}

/// Crop-specific baseline rates. Rates are per acre.
pub fn rate_spec(kind: ApplicationKind, crop: CropType) -> RateSpec {
    match kind {
        ApplicationKind::Fertilizer => match crop {
            CropType::Corn => RateSpec {
                product: "urea 46-0-0",
                base_rate: 180.0,
                unit: "lb/acre",
                unit_cost_usd: 0.55,
            },
            CropType::Soybean => RateSpec {
                product: "MAP 11-52-0",
                base_rate: 120.0,
                unit: "lb/acre",
                unit_cost_usd: 0.62,
            },
            CropType::Wheat => RateSpec {
                product: "urea 46-0-0",
                base_rate: 140.0,
                unit: "lb/acre",
                unit_cost_usd: 0.55,
            },
            CropType::Cotton => RateSpec {
                product: "urea 46-0-0",
                base_rate: 160.0,
                unit: "lb/acre",
                unit_cost_usd: 0.55,
            },
            CropType::Generic => RateSpec {
                product: "blended N-P-K",
                base_rate: 150.0,
                unit: "lb/acre",
                unit_cost_usd: 0.55,
            },
        },
        ApplicationKind::Irrigation => match crop {
            CropType::Corn => RateSpec {
                product: "supplemental irrigation",
                base_rate: 2.0,
                unit: "acre-inch/acre",
                unit_cost_usd: 8.0,
            },
            _ => RateSpec {
                product: "supplemental irrigation",
                base_rate: 1.5,
                unit: "acre-inch/acre",
                unit_cost_usd: 8.0,
            },
        },
        ApplicationKind::Seed => match crop {
            CropType::Corn => RateSpec {
                product: "hybrid corn seed",
                base_rate: 32.0,
                unit: "kseeds/acre",
                unit_cost_usd: 3.2,
            },
            CropType::Soybean => RateSpec {
                product: "soybean seed",
                base_rate: 140.0,
                unit: "kseeds/acre",
                unit_cost_usd: 0.45,
            },
            CropType::Wheat => RateSpec {
                product: "winter wheat seed",
                base_rate: 1200.0,
                unit: "kseeds/acre",
                unit_cost_usd: 0.035,
            },
            CropType::Cotton => RateSpec {
                product: "cotton seed",
                base_rate: 45.0,
                unit: "kseeds/acre",
                unit_cost_usd: 2.8,
            },
            CropType::Generic => RateSpec {
                product: "certified seed",
                base_rate: 100.0,
                unit: "kseeds/acre",
                unit_cost_usd: 0.5,
            },
        },
        ApplicationKind::Pesticide => match crop {
            CropType::Corn => RateSpec {
                product: "broad-spectrum fungicide",
                base_rate: 1.2,
                unit: "pint/acre",
                unit_cost_usd: 14.0,
            },
            _ => RateSpec {
                product: "broad-spectrum fungicide",
                base_rate: 1.0,
                unit: "pint/acre",
                unit_cost_usd: 12.0,
            },
        },
        ApplicationKind::Lime => RateSpec {
            product: "ag lime",
            base_rate: 1.0,
            unit: "ton/acre",
            unit_cost_usd: 45.0,
        },
    }
}

pub fn multipliers_for(config: &PlannerConfig, kind: ApplicationKind) -> ZoneMultipliers {
    match kind {
        ApplicationKind::Fertilizer => config.fertilizer_multipliers,
        ApplicationKind::Irrigation => config.irrigation_multipliers,
        ApplicationKind::Seed => config.seed_multipliers,
        ApplicationKind::Pesticide => config.pesticide_multipliers,
        ApplicationKind::Lime => config.lime_multipliers,
    }
}

/// Zones aligned with the NDVI partition, each at base × band multiplier.
/// Returns (zones, total_quantity).
pub fn build_zones(
    partition: &ZonePartition,
    base_rate: f64,
    multipliers: ZoneMultipliers,
) -> (Vec<ApplicationZone>, f64) {
    let mut zones = Vec::new();

    let bands = [
        (
            "stressed",
            [-1.0, STRESSED_NDVI_MAX],
            partition.stressed.area_hectares,
            multipliers.stressed,
            "low vigor; heaviest corrective rate",
        ),
        (
            "moderate",
            [STRESSED_NDVI_MAX, HEALTHY_NDVI_MIN],
            partition.moderate.area_hectares,
            multipliers.moderate,
            "transitional vigor; modest boost",
        ),
        (
            "healthy",
            [HEALTHY_NDVI_MIN, 1.0],
            partition.healthy.area_hectares,
            multipliers.healthy,
            "full canopy; maintenance rate only",
        ),
    ];

    let mut total_quantity = 0.0;
    for (zone_id, ndvi_range, area_hectares, multiplier, rationale) in bands {
        let area_acres = area_hectares * HECTARES_TO_ACRES;
        if area_acres < 1e-6 {
            continue;
        }
        let rate = base_rate * multiplier;
        total_quantity += area_acres * rate;
        zones.push(ApplicationZone {
            zone_id: zone_id.to_string(),
            ndvi_range,
            area_acres,
            rate,
            rationale: rationale.to_string(),
            polygon: None,
        });
    }

    (zones, total_quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::ZoneBand;

    fn partition() -> ZonePartition {
        ZonePartition {
            healthy: ZoneBand {
                percentage: 50.0,
                area_hectares: 20.0,
            },
            moderate: ZoneBand {
                percentage: 30.0,
                area_hectares: 12.0,
            },
            stressed: ZoneBand {
                percentage: 20.0,
                area_hectares: 8.0,
            },
        }
    }

    #[test]
    fn test_zone_rates_follow_multipliers() {
        let config = Config::default().planner;
        let multipliers = multipliers_for(&config, ApplicationKind::Fertilizer);
        let (zones, total) = build_zones(&partition(), 100.0, multipliers);

        assert_eq!(zones.len(), 3);
        let stressed = zones.iter().find(|z| z.zone_id == "stressed").unwrap();
        assert!((stressed.rate - 140.0).abs() < 1e-9);
        let healthy = zones.iter().find(|z| z.zone_id == "healthy").unwrap();
        assert!((healthy.rate - 90.0).abs() < 1e-9);

        let expected: f64 = zones.iter().map(|z| z.area_acres * z.rate).sum();
        assert!((total - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_band_is_skipped() {
        let mut p = partition();
        p.stressed.area_hectares = 0.0;
        let config = Config::default().planner;
        let (zones, _) = build_zones(&p, 100.0, multipliers_for(&config, ApplicationKind::Seed));
        assert_eq!(zones.len(), 2);
        assert!(zones.iter().all(|z| z.zone_id != "stressed"));
    }

    #[test]
    fn test_rate_specs_are_positive() {
        for kind in [
            ApplicationKind::Fertilizer,
            ApplicationKind::Irrigation,
            ApplicationKind::Seed,
            ApplicationKind::Pesticide,
            ApplicationKind::Lime,
        ] {
            for crop in [
                CropType::Corn,
                CropType::Soybean,
                CropType::Wheat,
                CropType::Cotton,
                CropType::Generic,
            ] {
                let spec = rate_spec(kind, crop);
                assert!(spec.base_rate > 0.0);
                assert!(spec.unit_cost_usd > 0.0);
            }
        }
    }
}
