//! Weather alert evaluation: frost, heat, wind, flood, drought, storm, and
//! fire risk from current conditions, forecast, and aggregated history.

use chrono::Duration;

use super::WeatherSnapshot;
use crate::config::WeatherThresholds;
use crate::domain::{ActionItem, ActionPriority, ActiveWindow, AlertKind, Severity, WeatherContext};

/// One triggered weather condition, not yet materialized into an alert.
#[derive(Debug, Clone)]
pub struct WeatherFinding {
    pub kind: AlertKind,
    pub severity: Severity,
    pub confidence: f64,
    /// Set when the aggregated-history window was missing and the rule
    /// fired on current/forecast data alone.
    pub rule_based: bool,
    pub active_window: ActiveWindow,
    pub context: WeatherContext,
    pub actions: Vec<ActionItem>,
}

fn item(task: &str, priority: ActionPriority, equipment: &[&str]) -> ActionItem {
    ActionItem {
        task: task.to_string(),
        priority,
        estimated_cost_usd: None,
        equipment: equipment.iter().map(|e| e.to_string()).collect(),
    }
}

/// Evaluate every weather rule against a snapshot. Windows anchor on the
/// observation timestamp, never the wall clock.
pub fn evaluate(snapshot: &WeatherSnapshot, thresholds: &WeatherThresholds) -> Vec<WeatherFinding> {
    let mut findings = Vec::new();
    let current = &snapshot.current;
    let observed_at = current.observed_at;
    let dry_days = snapshot.aggregate.as_ref().map(|a| a.dry_day_count);

    // Frost has its own agreement-based confidence; every other rule uses
    // the 0.85 base, degraded when the historical aggregate is missing.
    let rule_based = snapshot.aggregate.is_none();
    let base_confidence = if rule_based { 0.6 } else { 0.85 };

    let context = WeatherContext {
        temperature_c: current.temperature_c,
        humidity_pct: current.humidity_pct,
        wind_speed_ms: current.wind_speed_ms,
        recent_precipitation_mm: Some(current.precipitation_mm),
        dry_day_count: dry_days,
    };

    let window = |hours: i64| ActiveWindow {
        start: observed_at,
        end: observed_at + Duration::hours(hours),
    };

    // Frost
    let frost_now = current.temperature_c <= thresholds.frost_temp_c
        && current.humidity_pct >= thresholds.frost_humidity_pct
        && current.wind_speed_ms <= thresholds.frost_wind_ms;
    let forecast_min = snapshot
        .forecast
        .iter()
        .take(2)
        .map(|d| d.temp_min_c)
        .fold(f64::INFINITY, f64::min);
    let frost_ahead = forecast_min <= thresholds.frost_temp_c;
    if frost_now || frost_ahead {
        let mut worst = f64::INFINITY;
        if frost_now {
            worst = worst.min(current.temperature_c);
        }
        if frost_ahead {
            worst = worst.min(forecast_min);
        }
        let gap = thresholds.frost_temp_c - worst;
        let severity = if gap >= 5.0 {
            Severity::Emergency
        } else if gap >= 3.0 {
            Severity::Critical
        } else if gap >= 1.5 {
            Severity::High
        } else {
            Severity::Moderate
        };
        findings.push(WeatherFinding {
            kind: AlertKind::Frost,
            severity,
            confidence: if frost_now && frost_ahead { 0.95 } else { 0.8 },
            rule_based: false,
            active_window: window(18),
            context: context.clone(),
            actions: vec![
                item("Cover sensitive plants", ActionPriority::Immediate, &["row covers"]),
                item(
                    "Run irrigation for protective ice layer",
                    ActionPriority::Immediate,
                    &["irrigation system"],
                ),
                item(
                    "Delay early-morning spraying until temperatures recover",
                    ActionPriority::Within24h,
                    &[],
                ),
            ],
        });
    }

    // Heat
    let forecast_max = snapshot
        .forecast
        .iter()
        .map(|d| d.temp_max_c)
        .fold(f64::NEG_INFINITY, f64::max);
    let heat_now = current.temperature_c >= thresholds.heat_temp_c;
    let heat_ahead = forecast_max >= thresholds.heat_temp_c;
    if heat_now || heat_ahead {
        let worst = current.temperature_c.max(forecast_max);
        let gap = worst - thresholds.heat_temp_c;
        let severity = if gap >= 8.0 {
            Severity::Emergency
        } else if gap >= 5.0 {
            Severity::Critical
        } else if gap >= 2.0 {
            Severity::High
        } else {
            Severity::Moderate
        };
        findings.push(WeatherFinding {
            kind: AlertKind::Heat,
            severity,
            confidence: base_confidence,
            rule_based,
            active_window: window(48),
            context: context.clone(),
            actions: vec![
                item(
                    "Irrigate in the evening to reduce canopy temperature",
                    ActionPriority::Immediate,
                    &["irrigation system"],
                ),
                item("Suspend midday field work", ActionPriority::Within24h, &[]),
            ],
        });
    }

    // Wind
    if current.wind_speed_ms >= thresholds.wind_speed_ms {
        let ratio = current.wind_speed_ms / thresholds.wind_speed_ms;
        let severity = if ratio >= 1.5 {
            Severity::Critical
        } else if ratio >= 1.2 {
            Severity::High
        } else {
            Severity::Moderate
        };
        findings.push(WeatherFinding {
            kind: AlertKind::Wind,
            severity,
            confidence: base_confidence,
            rule_based,
            active_window: window(12),
            context: context.clone(),
            actions: vec![
                item("Pause spraying operations", ActionPriority::Immediate, &["sprayer"]),
                item(
                    "Secure loose equipment and row covers",
                    ActionPriority::Immediate,
                    &[],
                ),
            ],
        });
    }

    // Flood
    let max_precip_prob = snapshot
        .forecast
        .iter()
        .map(|d| d.precipitation_probability_pct)
        .fold(0.0_f64, f64::max);
    if max_precip_prob > thresholds.precipitation_probability_pct {
        let severity = if max_precip_prob >= 90.0 {
            Severity::Critical
        } else {
            Severity::High
        };
        findings.push(WeatherFinding {
            kind: AlertKind::Flood,
            severity,
            confidence: base_confidence,
            rule_based,
            active_window: window(72),
            context: context.clone(),
            actions: vec![
                item("Clear drainage ditches and culverts", ActionPriority::Immediate, &[]),
                item("Delay planned irrigation", ActionPriority::Within24h, &[]),
            ],
        });
    }

    // Storm: heavy precipitation probability combined with damaging wind
    let storm_day = snapshot.forecast.iter().any(|d| {
        d.precipitation_probability_pct > thresholds.precipitation_probability_pct
            && d.wind_speed_ms >= thresholds.wind_speed_ms
    });
    if storm_day {
        findings.push(WeatherFinding {
            kind: AlertKind::Storm,
            severity: Severity::High,
            confidence: base_confidence,
            rule_based,
            active_window: window(48),
            context: context.clone(),
            actions: vec![
                item("Secure equipment and grain covers", ActionPriority::Immediate, &[]),
                item(
                    "Harvest ripe areas ahead of the front where feasible",
                    ActionPriority::Within24h,
                    &["combine"],
                ),
            ],
        });
    }

    // Weather drought
    if let Some(aggregate) = &snapshot.aggregate {
        if aggregate.dry_day_count >= thresholds.drought_dry_days && aggregate.irrigation_need {
            let ratio =
                aggregate.dry_day_count as f64 / thresholds.drought_reference_days.max(1) as f64;
            let severity = if ratio >= 1.0 {
                Severity::Critical
            } else if ratio >= 0.75 {
                Severity::High
            } else {
                Severity::Moderate
            };
            findings.push(WeatherFinding {
                kind: AlertKind::Drought,
                severity,
                confidence: base_confidence,
                rule_based,
                active_window: window(24 * 7),
                context: context.clone(),
                actions: vec![
                    item("Schedule deficit irrigation", ActionPriority::Within24h, &[
                        "irrigation system",
                    ]),
                    item(
                        "Prioritize water to the highest-value fields",
                        ActionPriority::WithinWeek,
                        &[],
                    ),
                ],
            });
        }
    }

    // Fire risk
    let fire_dry_days = dry_days.unwrap_or(0) as f64;
    let fire_index = (current.temperature_c - 15.0) * 2.0
        + (100.0 - current.humidity_pct)
        + current.wind_speed_ms * 3.0
        + fire_dry_days * 2.0;
    if fire_index >= thresholds.fire_index_threshold {
        let severity = if fire_index >= 140.0 {
            Severity::Emergency
        } else if fire_index >= 120.0 {
            Severity::Critical
        } else {
            Severity::High
        };
        findings.push(WeatherFinding {
            kind: AlertKind::FireRisk,
            severity,
            confidence: base_confidence,
            rule_based,
            active_window: window(24),
            context,
            actions: vec![
                item("Verify firebreaks around field margins", ActionPriority::Immediate, &[]),
                item("Stage a water tender near dry fields", ActionPriority::Immediate, &[
                    "water tender",
                ]),
                item("Halt hot work and harvest during peak wind", ActionPriority::Within24h, &[]),
            ],
        });
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::providers::{AggregatedWeather, CurrentWeather, DailyForecast};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn thresholds() -> WeatherThresholds {
        Config::default().weather.thresholds
    }

    fn current(temp: f64, humidity: f64, wind: f64) -> CurrentWeather {
        CurrentWeather {
            temperature_c: temp,
            humidity_pct: humidity,
            wind_speed_ms: wind,
            precipitation_mm: 0.0,
            condition: "clear".to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 10, 12, 5, 0, 0).unwrap(),
        }
    }

    fn forecast_day(min: f64, max: f64, precip_prob: f64, wind: f64) -> DailyForecast {
        DailyForecast {
            date: NaiveDate::from_ymd_opt(2024, 10, 13).unwrap(),
            temp_min_c: min,
            temp_max_c: max,
            humidity_pct: 70.0,
            wind_speed_ms: wind,
            precipitation_probability_pct: precip_prob,
            precipitation_mm: 0.0,
        }
    }

    fn snapshot(
        current: CurrentWeather,
        forecast: Vec<DailyForecast>,
        aggregate: Option<AggregatedWeather>,
    ) -> WeatherSnapshot {
        WeatherSnapshot {
            current,
            forecast,
            aggregate,
        }
    }

    fn aggregate(dry_days: u32, irrigation_need: bool) -> AggregatedWeather {
        AggregatedWeather {
            window_days: 14,
            avg_temp_c: 22.0,
            avg_humidity_pct: 55.0,
            total_precipitation_mm: 4.0,
            dry_day_count: dry_days,
            irrigation_need,
            growing_degree_days: 160.0,
        }
    }

    #[test]
    fn test_frost_alert_with_forecast_agreement() {
        // Current 1 °C / 88% / 2 m/s, forecast min -1 °C
        let snap = snapshot(
            current(1.0, 88.0, 2.0),
            vec![forecast_day(-1.0, 9.0, 10.0, 3.0)],
            None,
        );
        let findings = evaluate(&snap, &thresholds());
        let frost = findings
            .iter()
            .find(|f| f.kind == AlertKind::Frost)
            .expect("frost fires");

        // Gap to the 2 °C threshold is 3 °C
        assert_eq!(frost.severity, Severity::Critical);
        assert!(frost.confidence >= 0.9);
        // Frost confidence comes from current/forecast agreement, not the
        // aggregate window
        assert!(!frost.rule_based);
        assert!(frost
            .actions
            .iter()
            .any(|a| a.task == "Cover sensitive plants"));
        assert!(frost
            .actions
            .iter()
            .any(|a| a.task == "Run irrigation for protective ice layer"));
    }

    #[test]
    fn test_frost_single_trigger_lower_confidence() {
        let snap = snapshot(
            current(10.0, 40.0, 2.0),
            vec![forecast_day(1.0, 12.0, 10.0, 3.0)],
            None,
        );
        let findings = evaluate(&snap, &thresholds());
        let frost = findings.iter().find(|f| f.kind == AlertKind::Frost).unwrap();
        assert!((frost.confidence - 0.8).abs() < 1e-9);
        // Gap is 1 °C: moderate band
        assert_eq!(frost.severity, Severity::Moderate);
    }

    #[test]
    fn test_no_frost_on_mild_night() {
        let snap = snapshot(
            current(8.0, 85.0, 2.0),
            vec![forecast_day(5.0, 15.0, 10.0, 3.0)],
            None,
        );
        let findings = evaluate(&snap, &thresholds());
        assert!(!findings.iter().any(|f| f.kind == AlertKind::Frost));
    }

    #[test]
    fn test_heat_bands() {
        let snap = snapshot(current(41.0, 30.0, 4.0), vec![], None);
        let findings = evaluate(&snap, &thresholds());
        let heat = findings.iter().find(|f| f.kind == AlertKind::Heat).unwrap();
        assert_eq!(heat.severity, Severity::Critical); // 6 °C over
        // No aggregate window: degraded confidence, tagged rule-based
        assert!((heat.confidence - 0.6).abs() < 1e-9);
        assert!(heat.rule_based);

        let informed = snapshot(current(41.0, 30.0, 4.0), vec![], Some(aggregate(2, false)));
        let findings = evaluate(&informed, &thresholds());
        let heat = findings.iter().find(|f| f.kind == AlertKind::Heat).unwrap();
        assert!((heat.confidence - 0.85).abs() < 1e-9);
        assert!(!heat.rule_based);
    }

    #[test]
    fn test_wind_ratio_bands() {
        let snap = snapshot(current(20.0, 50.0, 23.0), vec![], None);
        let findings = evaluate(&snap, &thresholds());
        let wind = findings.iter().find(|f| f.kind == AlertKind::Wind).unwrap();
        assert_eq!(wind.severity, Severity::Critical); // ratio ≥ 1.5
        assert!((wind.confidence - 0.6).abs() < 1e-9);
        assert!(wind.rule_based);
    }

    #[test]
    fn test_confidence_degrades_without_aggregate() {
        let windy = current(20.0, 50.0, 16.0);
        let informed = snapshot(windy.clone(), vec![], Some(aggregate(2, false)));
        let findings = evaluate(&informed, &thresholds());
        let wind = findings.iter().find(|f| f.kind == AlertKind::Wind).unwrap();
        assert!((wind.confidence - 0.85).abs() < 1e-9);
        assert!(!wind.rule_based);

        let blind = snapshot(windy, vec![], None);
        let findings = evaluate(&blind, &thresholds());
        let wind = findings.iter().find(|f| f.kind == AlertKind::Wind).unwrap();
        assert!((wind.confidence - 0.6).abs() < 1e-9);
        assert!(wind.rule_based);
    }

    #[test]
    fn test_flood_from_forecast_probability() {
        let snap = snapshot(
            current(18.0, 70.0, 4.0),
            vec![forecast_day(10.0, 20.0, 92.0, 6.0)],
            None,
        );
        let findings = evaluate(&snap, &thresholds());
        let flood = findings.iter().find(|f| f.kind == AlertKind::Flood).unwrap();
        assert_eq!(flood.severity, Severity::Critical);
        assert!((flood.confidence - 0.6).abs() < 1e-9);
        assert!(flood.rule_based);
    }

    #[test]
    fn test_storm_needs_wind_and_rain() {
        let snap = snapshot(
            current(18.0, 70.0, 4.0),
            vec![forecast_day(10.0, 20.0, 92.0, 16.0)],
            None,
        );
        let findings = evaluate(&snap, &thresholds());
        assert!(findings.iter().any(|f| f.kind == AlertKind::Storm));

        let calm = snapshot(
            current(18.0, 70.0, 4.0),
            vec![forecast_day(10.0, 20.0, 92.0, 6.0)],
            None,
        );
        let findings = evaluate(&calm, &thresholds());
        assert!(!findings.iter().any(|f| f.kind == AlertKind::Storm));
    }

    #[test]
    fn test_weather_drought_requires_irrigation_need() {
        let needy = snapshot(current(28.0, 40.0, 3.0), vec![], Some(aggregate(14, true)));
        let findings = evaluate(&needy, &thresholds());
        let drought = findings.iter().find(|f| f.kind == AlertKind::Drought).unwrap();
        assert_eq!(drought.severity, Severity::Critical); // 14/14 dry days
        assert!((drought.confidence - 0.85).abs() < 1e-9);
        assert!(!drought.rule_based);

        let satisfied = snapshot(current(28.0, 40.0, 3.0), vec![], Some(aggregate(14, false)));
        let findings = evaluate(&satisfied, &thresholds());
        assert!(!findings.iter().any(|f| f.kind == AlertKind::Drought));
    }

    #[test]
    fn test_fire_risk_index() {
        // (38-15)*2 + (100-20) + 8*3 + 10*2 = 46 + 80 + 24 + 20 = 170
        let snap = snapshot(current(38.0, 20.0, 8.0), vec![], Some(aggregate(10, true)));
        let findings = evaluate(&snap, &thresholds());
        let fire = findings.iter().find(|f| f.kind == AlertKind::FireRisk).unwrap();
        assert_eq!(fire.severity, Severity::Emergency);
        assert!((fire.confidence - 0.85).abs() < 1e-9);
        assert!(!fire.rule_based);

        // Cool, humid, still day stays quiet
        let calm = snapshot(current(18.0, 80.0, 2.0), vec![], Some(aggregate(0, false)));
        let findings = evaluate(&calm, &thresholds());
        assert!(!findings.iter().any(|f| f.kind == AlertKind::FireRisk));
    }

    #[test]
    fn test_windows_anchor_on_observation_time() {
        let snap = snapshot(current(1.0, 88.0, 2.0), vec![], None);
        let findings = evaluate(&snap, &thresholds());
        let frost = findings.iter().find(|f| f.kind == AlertKind::Frost).unwrap();
        assert_eq!(frost.active_window.start, snap.current.observed_at);
        assert!(frost.active_window.end > frost.active_window.start);
    }
}
