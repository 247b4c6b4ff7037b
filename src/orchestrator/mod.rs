//! Farm-level orchestration: bounded fan-out over fields, single-flight
//! coalescing per (field, date), cooperative cancellation, alert and plan
//! aggregation, and the farm summary.

use chrono::{Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::alerts::{AlertEngine, WeatherSnapshot};
use crate::analysis::AnalysisEngine;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::domain::{
    Alert, CropType, FieldAnalysis, FieldBoundary, GeoPoint, PrecisionPlan, Season, Severity,
};
use crate::error::{AnalysisError, AnalysisResult, FailureKind, FieldFailure};
use crate::persistence::PersistenceStore;
use crate::planner::PrecisionPlanner;
use crate::providers::{CurrentWeather, DailyForecast, WeatherProvider};

const FORECAST_DAYS: u32 = 7;
const AGGREGATE_WINDOW_DAYS: u32 = 14;

/// Cooperative cancellation signal. In-flight I/O completes; the pipeline
/// aborts at its next step boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out if cancellation has been requested.
    pub fn check(&self, what: &str) -> AnalysisResult<()> {
        if self.is_cancelled() {
            Err(AnalysisError::cancelled(format!(
                "cancellation observed before {what}"
            )))
        } else {
            Ok(())
        }
    }
}

/// Options for a farm analysis run. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub analysis_date: Option<NaiveDate>,
    pub crop_type: Option<CropType>,
    pub season: Option<Season>,
    pub concurrency: Option<usize>,
    pub cancel: Option<CancelToken>,
}

/// One bucket of the farm health histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthBucket {
    pub range: String,
    pub count: usize,
}

/// Farm-level rollup of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmSummary {
    pub total_fields: usize,
    pub analyzed_fields: usize,
    pub critical_alert_count: usize,
    pub avg_health: f64,
    pub primary_stressor: Option<String>,
    pub health_distribution: Vec<HealthBucket>,
    pub projected_roi_pct: f64,
}

/// Everything a farm analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmAnalysisBundle {
    pub farm_id: String,
    pub analysis_date: NaiveDate,
    pub results: Vec<FieldAnalysis>,
    pub alerts: Vec<Alert>,
    pub plans: Vec<PrecisionPlan>,
    pub summary: FarmSummary,
    pub failures: Vec<FieldFailure>,
    pub cancelled: bool,
}

type FieldOutcome = Result<FieldAnalysis, FieldFailure>;
type FlightKey = (String, NaiveDate);

/// In-flight deduplication: concurrent analyses of the same (field, date)
/// attach to one shared execution.
#[derive(Clone, Default)]
struct SingleFlight {
    flights: Arc<DashMap<FlightKey, Arc<OnceCell<FieldOutcome>>>>,
}

impl SingleFlight {
    async fn run(
        &self,
        engine: &AnalysisEngine,
        per_field_timeout: Duration,
        field: &FieldBoundary,
        date: NaiveDate,
        cancel: &CancelToken,
    ) -> FieldOutcome {
        let key = (field.id.clone(), date);
        let cell = {
            let entry = self
                .flights
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()));
            entry.value().clone()
        };

        let outcome = cell
            .get_or_init(|| async {
                match tokio::time::timeout(per_field_timeout, engine.analyze_field(field, date, cancel))
                    .await
                {
                    Ok(Ok(analysis)) => Ok(analysis),
                    Ok(Err(e)) => Err(FieldFailure::from_error(&field.id, date, &e)),
                    Err(_) => Err(FieldFailure {
                        field_id: field.id.clone(),
                        analysis_date: date,
                        kind: FailureKind::Timeout,
                        detail: format!(
                            "field analysis exceeded {} ms deadline",
                            per_field_timeout.as_millis()
                        ),
                    }),
                }
            })
            .await
            .clone();

        self.flights.remove(&key);
        outcome
    }
}

/// Farm analysis orchestrator. The single-flight map and worker pool are
/// the only shared mutable state; everything else is injected capability.
pub struct Orchestrator {
    config: Arc<Config>,
    engine: AnalysisEngine,
    alert_engine: Arc<AlertEngine>,
    planner: Arc<PrecisionPlanner>,
    weather: Arc<dyn WeatherProvider>,
    store: Arc<dyn PersistenceStore>,
    flights: SingleFlight,
    current_weather_cache: TtlCache<(i64, i64), CurrentWeather>,
    forecast_cache: TtlCache<(i64, i64), Vec<DailyForecast>>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        engine: AnalysisEngine,
        alert_engine: Arc<AlertEngine>,
        planner: Arc<PrecisionPlanner>,
        weather: Arc<dyn WeatherProvider>,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        let current_weather_cache =
            TtlCache::new(Duration::from_secs(config.cache.weather_current_ttl_s));
        let forecast_cache =
            TtlCache::new(Duration::from_secs(config.cache.weather_forecast_ttl_s));
        Self {
            config,
            engine,
            alert_engine,
            planner,
            weather,
            store,
            flights: SingleFlight::default(),
            current_weather_cache,
            forecast_cache,
        }
    }

    /// Analyze a single field, coalescing with any concurrent request for
    /// the same (field, date).
    pub async fn analyze_field(
        &self,
        field: &FieldBoundary,
        analysis_date: Option<NaiveDate>,
    ) -> AnalysisResult<FieldAnalysis> {
        let date = analysis_date.unwrap_or_else(|| Utc::now().date_naive());
        let timeout = Duration::from_millis(self.config.analysis.per_field_timeout_ms);
        let outcome = self
            .flights
            .run(&self.engine, timeout, field, date, &CancelToken::new())
            .await;
        outcome.map_err(failure_to_error)
    }

    /// Run the full farm pipeline: fan out field analyses under the
    /// concurrency cap, evaluate alerts once, plan per result, summarize.
    /// Single-field failures land in `bundle.failures`; only invalid input
    /// (unknown farm) surfaces as an error.
    pub async fn run_farm_analysis(
        &self,
        farm_id: &str,
        options: RunOptions,
    ) -> AnalysisResult<FarmAnalysisBundle> {
        let analysis_date = options
            .analysis_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let cancel = options.cancel.clone().unwrap_or_default();
        let concurrency = options
            .concurrency
            .unwrap_or(self.config.analysis.concurrency)
            .max(1);

        let fields = self.store.get_fields_by_farm(farm_id).await?;
        let total_fields = fields.len();
        info!(
            farm_id,
            %analysis_date,
            total_fields,
            concurrency,
            "starting farm analysis"
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let per_field_timeout = Duration::from_millis(self.config.analysis.per_field_timeout_ms);
        let mut join_set = JoinSet::new();
        for field in fields {
            let engine = self.engine.clone();
            let flights = self.flights.clone();
            let semaphore = semaphore.clone();
            let token = cancel.clone();
            join_set.spawn(async move {
                // Closed semaphore cannot happen; treat it as cancellation
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(FieldFailure {
                            field_id: field.id.clone(),
                            analysis_date,
                            kind: FailureKind::Cancelled,
                            detail: "worker pool shut down".to_string(),
                        })
                    }
                };
                flights
                    .run(&engine, per_field_timeout, &field, analysis_date, &token)
                    .await
            });
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(analysis)) => results.push(analysis),
                Ok(Err(failure)) => failures.push(failure),
                Err(join_error) => {
                    return Err(AnalysisError::internal(format!(
                        "field analysis task panicked: {join_error}"
                    )))
                }
            }
        }

        // One weather snapshot per farm; unavailability degrades to
        // rule-based alerting instead of failing the run.
        let weather_snapshot = if results.is_empty() {
            None
        } else {
            self.farm_weather(&results).await
        };

        let alerts = self
            .alert_engine
            .evaluate(farm_id, &results, weather_snapshot.as_ref())
            .await?;

        let crop = options.crop_type.unwrap_or(CropType::Generic);
        let season = options
            .season
            .unwrap_or_else(|| Season::from_month(analysis_date.month()));
        let mut plans = Vec::new();
        for analysis in &results {
            match self.planner.plan(farm_id, analysis, crop, season).await {
                Ok(plan) => plans.push(plan),
                Err(e) => {
                    warn!(field_id = %analysis.field.id, error = %e, "planning failed for field");
                }
            }
        }

        let summary = build_summary(total_fields, &results, &alerts, &plans);
        let cancelled = cancel.is_cancelled()
            || failures.iter().any(|f| f.kind == FailureKind::Cancelled);

        info!(
            farm_id,
            analyzed = results.len(),
            failed = failures.len(),
            alerts = alerts.len(),
            plans = plans.len(),
            cancelled,
            "farm analysis complete"
        );

        Ok(FarmAnalysisBundle {
            farm_id: farm_id.to_string(),
            analysis_date,
            results,
            alerts,
            plans,
            summary,
            failures,
            cancelled,
        })
    }

    /// Weather snapshot at the farm position (mean of field centroids),
    /// served through the TTL caches.
    async fn farm_weather(&self, results: &[FieldAnalysis]) -> Option<WeatherSnapshot> {
        let position = farm_position(results)?;
        let cache_key = (
            (position.lat * 1000.0).round() as i64,
            (position.lng * 1000.0).round() as i64,
        );

        let current = match self.current_weather_cache.get(&cache_key) {
            Some(hit) => hit,
            None => match self.weather.current(position.lat, position.lng).await {
                Ok(current) => {
                    self.current_weather_cache.insert(cache_key, current.clone());
                    current
                }
                Err(e) => {
                    warn!(error = %e, "weather current-conditions lookup failed");
                    return None;
                }
            },
        };

        let forecast = match self.forecast_cache.get(&cache_key) {
            Some(hit) => hit,
            None => match self
                .weather
                .forecast(position.lat, position.lng, FORECAST_DAYS)
                .await
            {
                Ok(forecast) => {
                    self.forecast_cache.insert(cache_key, forecast.clone());
                    forecast
                }
                Err(e) => {
                    warn!(error = %e, "weather forecast lookup failed");
                    Vec::new()
                }
            },
        };

        let aggregate = match self
            .weather
            .aggregate(position.lat, position.lng, AGGREGATE_WINDOW_DAYS)
            .await
        {
            Ok(aggregate) => Some(aggregate),
            Err(e) => {
                warn!(error = %e, "weather aggregate lookup failed");
                None
            }
        };

        Some(WeatherSnapshot {
            current,
            forecast,
            aggregate,
        })
    }
}

fn farm_position(results: &[FieldAnalysis]) -> Option<GeoPoint> {
    let centroids: Vec<GeoPoint> = results
        .iter()
        .filter_map(|analysis| analysis.field.centroid().ok())
        .collect();
    if centroids.is_empty() {
        return None;
    }
    let n = centroids.len() as f64;
    Some(GeoPoint::new(
        centroids.iter().map(|c| c.lat).sum::<f64>() / n,
        centroids.iter().map(|c| c.lng).sum::<f64>() / n,
    ))
}

fn failure_to_error(failure: FieldFailure) -> AnalysisError {
    match failure.kind {
        FailureKind::ImageryUnavailable => AnalysisError::imagery_unavailable(failure.detail),
        FailureKind::WeatherUnavailable => AnalysisError::weather_unavailable(failure.detail),
        FailureKind::Timeout => AnalysisError::timeout(failure.detail),
        FailureKind::Cancelled => AnalysisError::cancelled(failure.detail),
        FailureKind::Persistence => AnalysisError::persistence(failure.detail),
        FailureKind::InvalidInput => AnalysisError::invalid_input(failure.detail),
        FailureKind::Internal => AnalysisError::internal(failure.detail),
    }
}

fn build_summary(
    total_fields: usize,
    results: &[FieldAnalysis],
    alerts: &[Alert],
    plans: &[PrecisionPlan],
) -> FarmSummary {
    let analyzed_fields = results.len();
    let critical_alert_count = alerts
        .iter()
        .filter(|a| a.severity() >= Severity::Critical)
        .count();

    let avg_health = if analyzed_fields > 0 {
        results.iter().map(|r| r.health_score as f64).sum::<f64>() / analyzed_fields as f64
    } else {
        0.0
    };

    let primary_stressor = if analyzed_fields > 0 {
        let n = analyzed_fields as f64;
        let averages = [
            (
                "drought",
                results.iter().map(|r| r.stress.drought).sum::<f64>() / n,
            ),
            (
                "disease",
                results.iter().map(|r| r.stress.disease).sum::<f64>() / n,
            ),
            (
                "nutrient",
                results.iter().map(|r| r.stress.nutrient).sum::<f64>() / n,
            ),
            (
                "pest",
                results
                    .iter()
                    .map(|r| r.stress.pest.unwrap_or(0.0))
                    .sum::<f64>()
                    / n,
            ),
        ];
        averages
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name.to_string())
    } else {
        None
    };

    let buckets = [(0u8, 19u8), (20, 39), (40, 59), (60, 79), (80, 100)];
    let health_distribution = buckets
        .iter()
        .map(|(lo, hi)| HealthBucket {
            range: format!("{lo}-{hi}"),
            count: results
                .iter()
                .filter(|r| r.health_score >= *lo && r.health_score <= *hi)
                .count(),
        })
        .collect();

    let total_cost: f64 = plans.iter().map(|p| p.summary.total_cost_usd).sum();
    let total_net: f64 = plans.iter().map(|p| p.summary.net_benefit_usd).sum();
    let projected_roi_pct = if total_cost > 0.0 {
        (total_net / total_cost * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    FarmSummary {
        total_fields,
        analyzed_fields,
        critical_alert_count,
        avg_health,
        primary_stressor,
        health_distribution,
        projected_roi_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check("step").is_ok());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.check("step"),
            Err(AnalysisError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_summary_empty_farm() {
        let summary = build_summary(0, &[], &[], &[]);
        assert_eq!(summary.total_fields, 0);
        assert_eq!(summary.avg_health, 0.0);
        assert!(summary.primary_stressor.is_none());
        assert_eq!(summary.projected_roi_pct, 0.0);
        assert_eq!(summary.health_distribution.len(), 5);
    }

    #[test]
    fn test_failure_round_trip_to_error() {
        let failure = FieldFailure {
            field_id: "f".to_string(),
            analysis_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            kind: FailureKind::Timeout,
            detail: "deadline".to_string(),
        };
        assert!(matches!(
            failure_to_error(failure),
            AnalysisError::Timeout { .. }
        ));
    }
}
