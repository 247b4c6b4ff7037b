//! Historical NDVI trend assembly: time-series points, per-season
//! averages, and an estimated growth stage.

use chrono::{Datelike, NaiveDate};

use crate::domain::{FieldAnalysis, GrowthStage, SeasonalAverage, TrendPoint, TrendSeries};

const SEASON_ORDER: [&str; 4] = ["spring", "summer", "fall", "winter"];

fn season_label(month: u32) -> &'static str {
    match month {
        3..=5 => "spring",
        6..=8 => "summer",
        9..=11 => "fall",
        _ => "winter",
    }
}

/// Assemble a trend series from analyses ordered by date.
pub fn build_trend_series(
    field_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    analyses: &[FieldAnalysis],
) -> TrendSeries {
    let points: Vec<TrendPoint> = analyses
        .iter()
        .map(|analysis| TrendPoint {
            date: analysis.analysis_date,
            ndvi_mean: analysis.indices.ndvi_mean,
            health_score: analysis.health_score,
        })
        .collect();

    let mut seasonal_averages = Vec::new();
    for label in SEASON_ORDER {
        let values: Vec<f64> = points
            .iter()
            .filter(|p| season_label(p.date.month()) == label)
            .map(|p| p.ndvi_mean)
            .collect();
        if !values.is_empty() {
            seasonal_averages.push(SeasonalAverage {
                label: label.to_string(),
                mean_ndvi: values.iter().sum::<f64>() / values.len() as f64,
                samples: values.len(),
            });
        }
    }

    let growth_stage = estimate_growth_stage(&points);

    TrendSeries {
        field_id: field_id.to_string(),
        start_date: start,
        end_date: end,
        points,
        seasonal_averages,
        growth_stage,
    }
}

fn estimate_growth_stage(points: &[TrendPoint]) -> Option<GrowthStage> {
    let last = points.last()?;
    let month = last.date.month();
    let ndvi = last.ndvi_mean;
    let declining = points.len() >= 2 && ndvi < points[points.len() - 2].ndvi_mean;

    let stage = if ndvi < 0.2 || matches!(month, 12 | 1 | 2) {
        GrowthStage::Dormant
    } else if (3..=5).contains(&month) && ndvi < 0.35 {
        GrowthStage::Emergence
    } else if ndvi >= 0.6 {
        if (9..=11).contains(&month) && declining {
            GrowthStage::Maturation
        } else {
            GrowthStage::Reproductive
        }
    } else if (9..=11).contains(&month) && declining {
        GrowthStage::Maturation
    } else {
        GrowthStage::Vegetative
    };
    Some(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use chrono::{TimeZone, Utc};

    fn analysis(date: NaiveDate, ndvi: f64) -> FieldAnalysis {
        FieldAnalysis {
            field: FieldBoundary {
                id: "field-1".to_string(),
                farm_id: "farm-1".to_string(),
                name: "Field".to_string(),
                area_hectares: 40.0,
                vertices: vec![
                    GeoPoint::new(41.0, -93.0),
                    GeoPoint::new(41.0, -92.99),
                    GeoPoint::new(41.01, -92.99),
                ],
            },
            analysis_date: date,
            indices: VegetationIndices {
                ndvi_mean: ndvi,
                ndvi_min: (ndvi - 0.1).max(-1.0),
                ndvi_max: (ndvi + 0.1).min(1.0),
                ndvi_median: ndvi,
                ndvi_std_dev: 0.05,
                ndre: ndvi * 0.6,
                evi: ndvi * 0.8,
                savi: ndvi * 0.9,
                cloud_cover_pct: 5.0,
                captured_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
                resolution_meters: 10.0,
                histogram: None,
            },
            zones: ZonePartition {
                healthy: ZoneBand {
                    percentage: 100.0,
                    area_hectares: 40.0,
                },
                moderate: ZoneBand {
                    percentage: 0.0,
                    area_hectares: 0.0,
                },
                stressed: ZoneBand {
                    percentage: 0.0,
                    area_hectares: 0.0,
                },
            },
            stress: StressIndicators {
                drought: 0.1,
                disease: 0.1,
                nutrient: 0.1,
                pest: None,
                temperature: None,
                confidence: 0.95,
                low_confidence: false,
            },
            health_score: 75,
            comparison: None,
            alert_seeds: vec![],
            recommendations: vec![],
            created_at: Utc::now(),
        }
    }

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_points_and_seasonal_averages() {
        let analyses = vec![
            analysis(d(2024, 4, 10), 0.3),
            analysis(d(2024, 6, 10), 0.6),
            analysis(d(2024, 7, 10), 0.8),
        ];
        let series = build_trend_series("field-1", d(2024, 1, 1), d(2024, 12, 31), &analyses);

        assert_eq!(series.points.len(), 3);
        assert_eq!(series.seasonal_averages.len(), 2);
        assert_eq!(series.seasonal_averages[0].label, "spring");
        assert_eq!(series.seasonal_averages[1].label, "summer");
        assert!((series.seasonal_averages[1].mean_ndvi - 0.7).abs() < 1e-9);
        assert_eq!(series.seasonal_averages[1].samples, 2);
    }

    #[test]
    fn test_growth_stage_reproductive_midseason() {
        let analyses = vec![analysis(d(2024, 7, 1), 0.6), analysis(d(2024, 7, 15), 0.75)];
        let series = build_trend_series("field-1", d(2024, 7, 1), d(2024, 7, 31), &analyses);
        assert_eq!(series.growth_stage, Some(GrowthStage::Reproductive));
    }

    #[test]
    fn test_growth_stage_maturation_on_fall_decline() {
        let analyses = vec![analysis(d(2024, 9, 1), 0.75), analysis(d(2024, 9, 20), 0.62)];
        let series = build_trend_series("field-1", d(2024, 9, 1), d(2024, 9, 30), &analyses);
        assert_eq!(series.growth_stage, Some(GrowthStage::Maturation));
    }

    #[test]
    fn test_growth_stage_dormant_winter() {
        let analyses = vec![analysis(d(2024, 1, 15), 0.25)];
        let series = build_trend_series("field-1", d(2024, 1, 1), d(2024, 1, 31), &analyses);
        assert_eq!(series.growth_stage, Some(GrowthStage::Dormant));
    }

    #[test]
    fn test_empty_series_has_no_stage() {
        let series = build_trend_series("field-1", d(2024, 1, 1), d(2024, 1, 31), &[]);
        assert!(series.growth_stage.is_none());
        assert!(series.points.is_empty());
        assert!(series.seasonal_averages.is_empty());
    }
}
