//! # fieldsense
//!
//! Satellite-driven field health analysis and precision agriculture engine.
//! For each field in a farm the pipeline acquires vegetation indices from a
//! remote-sensing provider, composes them into stress indicators and a
//! health score, partitions the field into management zones, compares
//! against prior results, raises threshold-driven stress and weather
//! alerts, and produces variable-rate application plans with cost/benefit
//! projections.
//!
//! External collaborators (imagery, weather, persistence, notifications)
//! are capability traits injected at construction; in-memory fakes back
//! the test suites and `InMemoryStore` backs single-process deployments.

use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

pub mod alerts;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod planner;
pub mod providers;

pub use alerts::{AlertEngine, WeatherSnapshot};
pub use analysis::AnalysisEngine;
pub use config::Config;
pub use domain::{
    Alert, AlertKind, AlertStatus, CropType, FieldAnalysis, FieldBoundary, PrecisionPlan, Season,
    Severity, TrendSeries,
};
pub use error::{AnalysisError, AnalysisResult, FailureKind, FieldFailure};
pub use notify::{LogSink, NotificationDispatcher, NotificationSink};
pub use orchestrator::{CancelToken, FarmAnalysisBundle, FarmSummary, Orchestrator, RunOptions};
pub use persistence::{InMemoryStore, PersistenceStore};
pub use planner::PrecisionPlanner;
pub use providers::{
    ImageryProvider, MeteoApiClient, ProviderError, SpectralApiClient, WeatherProvider,
};

/// Fully wired analysis service: the crate's public entry points bound to
/// one set of injected capabilities. Multiple services can coexist in one
/// process without cross-talk; coordination happens through the
/// persistence upsert keys.
pub struct FieldAnalysisService {
    orchestrator: Arc<Orchestrator>,
    engine: AnalysisEngine,
    alert_engine: Arc<AlertEngine>,
    planner: Arc<PrecisionPlanner>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl FieldAnalysisService {
    /// Wire a service from explicit capabilities.
    pub fn new(
        config: Config,
        imagery: Arc<dyn ImageryProvider>,
        weather: Arc<dyn WeatherProvider>,
        store: Arc<dyn PersistenceStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let config = Arc::new(config);
        let dispatcher = Arc::new(NotificationDispatcher::new(sink));
        let engine = AnalysisEngine::new(config.clone(), imagery, store.clone());
        let alert_engine = Arc::new(AlertEngine::new(
            config.clone(),
            store.clone(),
            dispatcher.clone(),
        ));
        let planner = Arc::new(PrecisionPlanner::new(config.clone(), store.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            config,
            engine.clone(),
            alert_engine.clone(),
            planner.clone(),
            weather,
            store,
        ));
        Self {
            orchestrator,
            engine,
            alert_engine,
            planner,
            dispatcher,
        }
    }

    /// Wire a service from environment configuration, with HTTP-backed
    /// imagery and weather providers, the in-memory store, and log-only
    /// notifications.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let imagery = Arc::new(SpectralApiClient::new(&config.imagery)?);
        let weather = Arc::new(MeteoApiClient::new(&config.weather)?);
        Ok(Self::new(
            config,
            imagery,
            weather,
            Arc::new(InMemoryStore::new()),
            Arc::new(LogSink),
        ))
    }

    /// Analyze every field of a farm and aggregate alerts, plans, and the
    /// farm summary.
    pub async fn run_farm_analysis(
        &self,
        farm_id: &str,
        options: RunOptions,
    ) -> AnalysisResult<FarmAnalysisBundle> {
        self.orchestrator.run_farm_analysis(farm_id, options).await
    }

    /// Analyze one field; concurrent duplicate requests share a single
    /// execution.
    pub async fn analyze_field(
        &self,
        field: &FieldBoundary,
        analysis_date: Option<NaiveDate>,
    ) -> AnalysisResult<FieldAnalysis> {
        self.orchestrator.analyze_field(field, analysis_date).await
    }

    /// Historical NDVI/health trend series for a field.
    pub async fn get_analysis_trends(
        &self,
        field_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> AnalysisResult<TrendSeries> {
        self.engine.trends(field_id, start_date, end_date).await
    }

    /// Evaluate alerts for already-computed analyses.
    pub async fn evaluate_alerts(
        &self,
        farm_id: &str,
        analyses: &[FieldAnalysis],
        weather_context: Option<&WeatherSnapshot>,
    ) -> AnalysisResult<Vec<Alert>> {
        self.alert_engine
            .evaluate(farm_id, analyses, weather_context)
            .await
    }

    pub async fn acknowledge_alert(&self, id: Uuid, user: &str) -> AnalysisResult<Alert> {
        self.alert_engine.acknowledge(id, user).await
    }

    pub async fn resolve_alert(&self, id: Uuid, user: &str, note: &str) -> AnalysisResult<Alert> {
        self.alert_engine.resolve(id, user, note).await
    }

    pub async fn mark_alert_false_positive(&self, id: Uuid, user: &str) -> AnalysisResult<Alert> {
        self.alert_engine.mark_false_positive(id, user).await
    }

    /// Produce a precision plan for one analysis result.
    pub async fn plan_precision(
        &self,
        farm_id: &str,
        analysis: &FieldAnalysis,
        crop_type: CropType,
        season: Season,
    ) -> AnalysisResult<PrecisionPlan> {
        self.planner.plan(farm_id, analysis, crop_type, season).await
    }

    /// Re-enqueue notifications that exhausted their delivery retries.
    pub async fn retry_failed_notifications(&self) -> AnalysisResult<usize> {
        self.dispatcher.retry_failed().await
    }
}
