//! Per-field analysis pipeline: imagery acquisition, index composition,
//! zone partitioning, prior comparison, seeding, and persistence.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub mod calculator;
pub mod recommendations;
pub mod trends;
pub mod zones;

pub use calculator::IndexCalculator;
pub use zones::ZonePartitioner;

use crate::cache::HistoryCache;
use crate::config::Config;
use crate::domain::{
    AlertKind, AlertSeed, ComparisonToPrevious, FieldAnalysis, FieldBoundary, Significance,
    StressIndicators, Trend, TrendSeries, VegetationIndices, ZonePartition,
};
use crate::error::{AnalysisError, AnalysisResult, FieldFailure};
use crate::orchestrator::CancelToken;
use crate::persistence::PersistenceStore;
use crate::providers::{with_retry, ImageryProvider, ProviderError, RetryPolicy};

/// Movement below this is reported as a stable trend.
const TREND_STABLE_BAND: f64 = 0.05;
/// Relative-change cutoffs for comparison significance.
const SIGNIFICANCE_HIGH: f64 = 0.15;
const SIGNIFICANCE_MODERATE: f64 = 0.08;
/// Floor for the significance denominator near a zero prior NDVI.
const SIGNIFICANCE_DENOMINATOR_FLOOR: f64 = 0.05;

const HISTORY_CACHE_CAPACITY: usize = 1024;

/// Per-field analysis engine. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct AnalysisEngine {
    config: Arc<Config>,
    imagery: Arc<dyn ImageryProvider>,
    store: Arc<dyn PersistenceStore>,
    calculator: IndexCalculator,
    history_cache: Arc<HistoryCache<Option<FieldAnalysis>>>,
}

impl AnalysisEngine {
    pub fn new(
        config: Arc<Config>,
        imagery: Arc<dyn ImageryProvider>,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        let calculator = IndexCalculator::new(config.imagery.max_cloud_pct);
        let history_cache = Arc::new(HistoryCache::new(
            HISTORY_CACHE_CAPACITY,
            Duration::from_secs(config.cache.analysis_history_ttl_s),
        ));
        Self {
            config,
            imagery,
            store,
            calculator,
            history_cache,
        }
    }

    /// Run the full pipeline for one field. Steps run in strict sequence;
    /// cancellation is observed between steps, never mid-I/O.
    pub async fn analyze_field(
        &self,
        field: &FieldBoundary,
        analysis_date: NaiveDate,
        cancel: &CancelToken,
    ) -> AnalysisResult<FieldAnalysis> {
        field.validate()?;
        let bbox = field.bounding_box()?;

        cancel.check(&field.id)?;
        let indices = self.fetch_indices(&bbox, analysis_date, &field.id).await?;

        let stress = self.calculator.stress_indicators(&indices);
        let health_score = self.calculator.health_score(&indices, &stress);
        let zones = ZonePartitioner::partition(&indices, field.area_hectares)?;

        cancel.check(&field.id)?;
        let prior = self.lookup_prior(&field.id, analysis_date).await?;
        let comparison = prior
            .as_ref()
            .map(|p| compare_with_prior(&indices, p));

        let alert_seeds = self.seed_alerts(&stress, &zones, health_score, comparison.as_ref());
        let recommendations = recommendations::seed_recommendations(
            &stress,
            &zones,
            health_score,
            comparison.as_ref(),
            analysis_date,
        );

        let analysis = FieldAnalysis {
            field: field.clone(),
            analysis_date,
            indices,
            zones,
            stress,
            health_score,
            comparison,
            alert_seeds,
            recommendations,
            created_at: Utc::now(),
        };

        cancel.check(&field.id)?;
        self.persist(&analysis).await?;

        info!(
            field_id = %field.id,
            %analysis_date,
            health_score,
            seeds = analysis.alert_seeds.len(),
            "field analysis complete"
        );
        Ok(analysis)
    }

    /// Analyze every field of a farm. A single field failing never aborts
    /// the batch; failures come back as structured records. Fan-out here is
    /// uncapped; the orchestrator is the concurrency-controlled entrypoint.
    pub async fn analyze_farm(
        &self,
        farm_id: &str,
        analysis_date: NaiveDate,
        cancel: &CancelToken,
    ) -> AnalysisResult<(Vec<FieldAnalysis>, Vec<FieldFailure>)> {
        let fields = self.store.get_fields_by_farm(farm_id).await?;

        let mut join_set = JoinSet::new();
        for field in fields {
            let engine = self.clone();
            let token = cancel.clone();
            join_set.spawn(async move {
                let outcome = engine.analyze_field(&field, analysis_date, &token).await;
                (field.id, outcome)
            });
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(analysis))) => results.push(analysis),
                Ok((field_id, Err(e))) => {
                    warn!(field_id = %field_id, error = %e, "field analysis failed");
                    failures.push(FieldFailure::from_error(&field_id, analysis_date, &e));
                }
                Err(join_error) => {
                    return Err(AnalysisError::internal(format!(
                        "field analysis task panicked: {join_error}"
                    )));
                }
            }
        }
        Ok((results, failures))
    }

    /// Historical NDVI/health series for a field.
    pub async fn trends(
        &self,
        field_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AnalysisResult<TrendSeries> {
        if end_date < start_date {
            return Err(AnalysisError::invalid_input(format!(
                "trend range end {end_date} precedes start {start_date}"
            )));
        }
        let analyses = self
            .store
            .get_analyses_in_range(field_id, start_date, end_date)
            .await?;
        Ok(trends::build_trend_series(
            field_id, start_date, end_date, &analyses,
        ))
    }

    async fn fetch_indices(
        &self,
        bbox: &crate::domain::BoundingBox,
        date: NaiveDate,
        field_id: &str,
    ) -> AnalysisResult<VegetationIndices> {
        let policy = RetryPolicy::from(&self.config.imagery.retry);
        let timeout = Duration::from_millis(self.config.imagery.timeout_ms);
        let bbox = *bbox;

        let outcome = with_retry(&policy, "imagery.indices", || {
            let imagery = self.imagery.clone();
            async move {
                match tokio::time::timeout(timeout, imagery.indices(&bbox, date)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Transient(format!(
                        "imagery call exceeded {} ms",
                        timeout.as_millis()
                    ))),
                }
            }
        })
        .await;

        let indices = outcome.map_err(|e| match e {
            ProviderError::InvalidRequest(message) => AnalysisError::invalid_input(message),
            ProviderError::Unavailable(message) | ProviderError::Transient(message) => {
                debug!(field_id, %date, error = %message, "imagery exhausted");
                AnalysisError::imagery_unavailable(message)
            }
        })?;

        // Providers are not trusted to uphold the index invariants
        indices.validate().map_err(|e| {
            AnalysisError::imagery_unavailable(format!("provider returned inconsistent indices: {e}"))
        })?;
        Ok(indices)
    }

    /// Most recent analysis strictly before `analysis_date`, via the TTL'd
    /// history cache.
    async fn lookup_prior(
        &self,
        field_id: &str,
        analysis_date: NaiveDate,
    ) -> AnalysisResult<Option<FieldAnalysis>> {
        let cache_key = format!("{field_id}@{analysis_date}");
        if let Some(cached) = self.history_cache.get(&cache_key).await {
            return Ok(cached);
        }

        let timeout = Duration::from_millis(self.config.analysis.persistence_timeout_ms);
        let latest = tokio::time::timeout(timeout, self.store.get_latest_analysis(field_id))
            .await
            .map_err(|_| AnalysisError::timeout("prior-analysis lookup"))??;

        let prior = match latest {
            Some(analysis) if analysis.analysis_date < analysis_date => Some(analysis),
            Some(_) => {
                // Latest is the re-run's own date (or later); walk back.
                let upper = analysis_date.pred_opt().unwrap_or(NaiveDate::MIN);
                let mut earlier = tokio::time::timeout(
                    timeout,
                    self.store
                        .get_analyses_in_range(field_id, NaiveDate::MIN, upper),
                )
                .await
                .map_err(|_| AnalysisError::timeout("prior-analysis lookup"))??;
                earlier.pop()
            }
            None => None,
        };

        self.history_cache.insert(cache_key, prior.clone()).await;
        Ok(prior)
    }

    async fn persist(&self, analysis: &FieldAnalysis) -> AnalysisResult<()> {
        let timeout = Duration::from_millis(self.config.analysis.persistence_timeout_ms);
        let first = tokio::time::timeout(timeout, self.store.upsert_analysis(analysis))
            .await
            .map_err(|_| AnalysisError::timeout("analysis upsert"))?;

        // Upsert keys make conflicts rare; one retry covers the race
        match first {
            Err(AnalysisError::PersistenceConflict { message }) => {
                warn!(field_id = %analysis.field.id, %message, "upsert conflict, retrying once");
                tokio::time::timeout(timeout, self.store.upsert_analysis(analysis))
                    .await
                    .map_err(|_| AnalysisError::timeout("analysis upsert"))?
            }
            other => other,
        }
    }

    /// Threshold breaches worth the alert engine's attention. The engine
    /// only seeds; the alert engine is authoritative.
    fn seed_alerts(
        &self,
        stress: &StressIndicators,
        zones: &ZonePartition,
        health_score: u8,
        comparison: Option<&ComparisonToPrevious>,
    ) -> Vec<AlertSeed> {
        let thresholds = &self.config.alerts;
        let affected = zones.stressed.percentage + zones.moderate.percentage;
        let mut seeds = Vec::new();

        if stress.drought > thresholds.drought_trigger {
            seeds.push(AlertSeed {
                kind: AlertKind::DroughtCritical,
                score: stress.drought,
                affected_area_pct: affected,
            });
        }
        if stress.disease > thresholds.disease_trigger {
            seeds.push(AlertSeed {
                kind: AlertKind::DiseaseOutbreak,
                score: stress.disease,
                affected_area_pct: affected,
            });
        }
        if stress.nutrient > thresholds.nutrient_trigger {
            seeds.push(AlertSeed {
                kind: AlertKind::NutrientSevere,
                score: stress.nutrient,
                affected_area_pct: affected,
            });
        }
        if let Some(pest) = stress.pest {
            if pest > thresholds.pest_trigger {
                seeds.push(AlertSeed {
                    kind: AlertKind::PestInfestation,
                    score: pest,
                    affected_area_pct: affected,
                });
            }
        }

        let declining_hard = comparison
            .map(|c| c.trend == Trend::Declining && c.significance == Significance::High)
            .unwrap_or(false);
        if health_score < thresholds.decline_health_threshold || declining_hard {
            seeds.push(AlertSeed {
                kind: AlertKind::GeneralDecline,
                score: (100 - health_score) as f64 / 100.0,
                affected_area_pct: 100.0 - zones.healthy.percentage,
            });
        }

        seeds
    }
}

/// Compare current indices with the prior analysis.
fn compare_with_prior(current: &VegetationIndices, prior: &FieldAnalysis) -> ComparisonToPrevious {
    let prior_ndvi = prior.indices.ndvi_mean;
    let delta = current.ndvi_mean - prior_ndvi;

    let trend = if delta.abs() < TREND_STABLE_BAND {
        Trend::Stable
    } else if delta > 0.0 {
        Trend::Improving
    } else {
        Trend::Declining
    };

    let relative = (delta / prior_ndvi.abs().max(SIGNIFICANCE_DENOMINATOR_FLOOR)).abs();
    let significance = if relative > SIGNIFICANCE_HIGH {
        Significance::High
    } else if relative > SIGNIFICANCE_MODERATE {
        Significance::Moderate
    } else {
        Significance::Low
    };

    ComparisonToPrevious {
        prior_date: prior.analysis_date,
        prior_ndvi_mean: prior_ndvi,
        delta_mean_ndvi: delta,
        trend,
        significance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundingBox, GeoPoint};
    use crate::persistence::InMemoryStore;
    use crate::providers::{AcquisitionSummary, TimeSeriesPoint};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    pub struct ScriptedImagery {
        pub calls: AtomicU32,
        pub script: Mutex<Vec<Result<VegetationIndices, ProviderError>>>,
    }

    impl ScriptedImagery {
        pub fn returning(results: Vec<Result<VegetationIndices, ProviderError>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(results),
            }
        }
    }

    #[async_trait]
    impl ImageryProvider for ScriptedImagery {
        async fn search(
            &self,
            _bbox: &BoundingBox,
            _date_range: (NaiveDate, NaiveDate),
            _max_cloud_pct: f64,
        ) -> Result<Vec<AcquisitionSummary>, ProviderError> {
            Ok(vec![])
        }

        async fn indices(
            &self,
            _bbox: &BoundingBox,
            _date: NaiveDate,
        ) -> Result<VegetationIndices, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }

        async fn time_series(
            &self,
            _bbox: &BoundingBox,
            _start: NaiveDate,
            _end: NaiveDate,
            _step_days: u32,
        ) -> Result<Vec<TimeSeriesPoint>, ProviderError> {
            Ok(vec![])
        }
    }

    pub fn healthy_indices() -> VegetationIndices {
        VegetationIndices {
            ndvi_mean: 0.78,
            ndvi_min: 0.65,
            ndvi_max: 0.88,
            ndvi_median: 0.79,
            ndvi_std_dev: 0.05,
            ndre: 0.47,
            evi: 0.62,
            savi: 0.70,
            cloud_cover_pct: 5.0,
            captured_at: Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap(),
            resolution_meters: 10.0,
            histogram: None,
        }
    }

    pub fn drought_indices() -> VegetationIndices {
        VegetationIndices {
            ndvi_mean: 0.22,
            ndvi_min: 0.05,
            ndvi_max: 0.40,
            ndvi_median: 0.21,
            ndvi_std_dev: 0.08,
            ndre: 0.10,
            evi: 0.18,
            savi: 0.20,
            cloud_cover_pct: 10.0,
            captured_at: Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap(),
            resolution_meters: 10.0,
            histogram: None,
        }
    }

    pub fn boundary(id: &str) -> FieldBoundary {
        FieldBoundary {
            id: id.to_string(),
            farm_id: "farm-1".to_string(),
            name: format!("Field {id}"),
            area_hectares: 40.0,
            vertices: vec![
                GeoPoint::new(41.0, -93.0),
                GeoPoint::new(41.0, -92.99),
                GeoPoint::new(41.01, -92.99),
                GeoPoint::new(41.01, -93.0),
            ],
        }
    }

    fn engine_with(
        imagery: Arc<dyn ImageryProvider>,
        store: Arc<InMemoryStore>,
    ) -> AnalysisEngine {
        AnalysisEngine::new(Arc::new(Config::default()), imagery, store)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
    }

    #[tokio::test]
    async fn test_successful_pipeline_persists() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = engine_with(imagery, store.clone());

        let analysis = engine
            .analyze_field(&boundary("field-1"), date(), &CancelToken::new())
            .await
            .unwrap();

        assert!(analysis.health_score >= 78);
        assert!(analysis.alert_seeds.is_empty());
        assert_eq!(store.analysis_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_imagery_is_retried() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![
            Err(ProviderError::Transient("blip".to_string())),
            Err(ProviderError::Transient("blip".to_string())),
            Ok(healthy_indices()),
        ]));
        let engine = engine_with(imagery.clone(), store);

        let analysis = engine
            .analyze_field(&boundary("field-1"), date(), &CancelToken::new())
            .await
            .unwrap();
        assert!(analysis.health_score > 0);
        assert_eq!(imagery.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unavailable_imagery_surfaces_kind() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Err(
            ProviderError::Unavailable("no scene".to_string()),
        )]));
        let engine = engine_with(imagery, store.clone());

        let err = engine
            .analyze_field(&boundary("field-1"), date(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ImageryUnavailable { .. }));
        assert_eq!(store.analysis_count(), 0);
    }

    #[tokio::test]
    async fn test_drought_field_seeds_alerts() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(drought_indices())]));
        let engine = engine_with(imagery, store);

        let analysis = engine
            .analyze_field(&boundary("field-1"), date(), &CancelToken::new())
            .await
            .unwrap();

        let kinds: Vec<AlertKind> = analysis.alert_seeds.iter().map(|s| s.kind).collect();
        assert!(kinds.contains(&AlertKind::DroughtCritical));
        assert!(kinds.contains(&AlertKind::GeneralDecline));
        let drought_seed = analysis
            .alert_seeds
            .iter()
            .find(|s| s.kind == AlertKind::DroughtCritical)
            .unwrap();
        assert!(drought_seed.affected_area_pct >= 70.0);
    }

    #[tokio::test]
    async fn test_comparison_against_prior_run() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![
            Ok(healthy_indices()),
            Ok(drought_indices()),
        ]));
        let engine = engine_with(imagery, store);

        let earlier = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        engine
            .analyze_field(&boundary("field-1"), earlier, &CancelToken::new())
            .await
            .unwrap();

        let second = engine
            .analyze_field(&boundary("field-1"), date(), &CancelToken::new())
            .await
            .unwrap();

        let comparison = second.comparison.expect("prior exists");
        assert_eq!(comparison.prior_date, earlier);
        assert!((comparison.delta_mean_ndvi - (0.22 - 0.78)).abs() < 1e-9);
        assert_eq!(comparison.trend, Trend::Declining);
        assert_eq!(comparison.significance, Significance::High);
    }

    #[tokio::test]
    async fn test_idempotent_rerun_upserts() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = engine_with(imagery, store.clone());

        let field = boundary("field-1");
        let first = engine
            .analyze_field(&field, date(), &CancelToken::new())
            .await
            .unwrap();
        let second = engine
            .analyze_field(&field, date(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(store.analysis_count(), 1);
        assert_eq!(first.health_score, second.health_score);
        assert_eq!(first.zones, second.zones);
        // Re-running the same date never compares against itself
        assert!(second.comparison.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = engine_with(imagery, store.clone());

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = engine
            .analyze_field(&boundary("field-1"), date(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled { .. }));
        assert_eq!(store.analysis_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_boundary_rejected_up_front() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = engine_with(imagery.clone(), store);

        let mut field = boundary("field-1");
        field.vertices.truncate(2);
        let err = engine
            .analyze_field(&field, date(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
        assert_eq!(imagery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_farm_batch_continues_past_failures() {
        let store = Arc::new(InMemoryStore::new());
        store.put_farm(
            "farm-1",
            vec![boundary("f1"), boundary("f2"), boundary("f3")],
        );
        // Single scripted result shared across fields: all succeed
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = engine_with(imagery, store.clone());

        let (results, failures) = engine
            .analyze_farm("farm-1", date(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(failures.is_empty());
        assert_eq!(store.analysis_count(), 3);
    }

    struct ConflictOnce {
        inner: InMemoryStore,
        conflicts_served: AtomicU32,
    }

    #[async_trait]
    impl crate::persistence::PersistenceStore for ConflictOnce {
        async fn get_fields_by_farm(
            &self,
            farm_id: &str,
        ) -> AnalysisResult<Vec<FieldBoundary>> {
            self.inner.get_fields_by_farm(farm_id).await
        }

        async fn get_latest_analysis(
            &self,
            field_id: &str,
        ) -> AnalysisResult<Option<FieldAnalysis>> {
            self.inner.get_latest_analysis(field_id).await
        }

        async fn get_analyses_in_range(
            &self,
            field_id: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> AnalysisResult<Vec<FieldAnalysis>> {
            self.inner.get_analyses_in_range(field_id, start, end).await
        }

        async fn upsert_analysis(&self, analysis: &FieldAnalysis) -> AnalysisResult<()> {
            if self.conflicts_served.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AnalysisError::persistence_conflict("concurrent writer"));
            }
            self.inner.upsert_analysis(analysis).await
        }

        async fn upsert_alert(&self, alert: &crate::domain::Alert) -> AnalysisResult<()> {
            self.inner.upsert_alert(alert).await
        }

        async fn get_alert(
            &self,
            id: uuid::Uuid,
        ) -> AnalysisResult<Option<crate::domain::Alert>> {
            self.inner.get_alert(id).await
        }

        async fn active_alert(
            &self,
            field_id: &str,
            kind: AlertKind,
        ) -> AnalysisResult<Option<crate::domain::Alert>> {
            self.inner.active_alert(field_id, kind).await
        }

        async fn update_alert_state(
            &self,
            id: uuid::Uuid,
            status: crate::domain::AlertStatus,
            user: &str,
            note: Option<&str>,
            at: chrono::DateTime<Utc>,
        ) -> AnalysisResult<crate::domain::Alert> {
            self.inner.update_alert_state(id, status, user, note, at).await
        }

        async fn upsert_plan(
            &self,
            plan: &crate::domain::PrecisionPlan,
        ) -> AnalysisResult<()> {
            self.inner.upsert_plan(plan).await
        }
    }

    #[tokio::test]
    async fn test_upsert_conflict_retried_once() {
        let store = Arc::new(ConflictOnce {
            inner: InMemoryStore::new(),
            conflicts_served: AtomicU32::new(0),
        });
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = AnalysisEngine::new(Arc::new(Config::default()), imagery, store.clone());

        let analysis = engine
            .analyze_field(&boundary("field-1"), date(), &CancelToken::new())
            .await
            .unwrap();
        assert!(analysis.health_score > 0);
        assert_eq!(store.inner.analysis_count(), 1);
        assert_eq!(store.conflicts_served.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_trends_requires_ordered_range() {
        let store = Arc::new(InMemoryStore::new());
        let imagery = Arc::new(ScriptedImagery::returning(vec![Ok(healthy_indices())]));
        let engine = engine_with(imagery, store);

        let err = engine
            .trends("field-1", date(), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
    }
}
