//! Persistence capability. The core coordinates concurrent writers through
//! upsert keys: (field_id, analysis_date) for analyses, alert id for
//! alerts, and (farm_id, field_id, season) for plans. Two engine instances
//! can safely share one backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::{Alert, AlertKind, AlertStatus, FieldAnalysis, FieldBoundary, PrecisionPlan, Season};
use crate::error::{AnalysisError, AnalysisResult};

/// Storage capability the core consumes.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// All field boundaries belonging to a farm. Unknown farm is an error;
    /// a known farm with no fields returns an empty list.
    async fn get_fields_by_farm(&self, farm_id: &str) -> AnalysisResult<Vec<FieldBoundary>>;

    /// Most recent analysis for a field, if any.
    async fn get_latest_analysis(&self, field_id: &str) -> AnalysisResult<Option<FieldAnalysis>>;

    /// Analyses for a field with dates in [start, end], ordered by date.
    async fn get_analyses_in_range(
        &self,
        field_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<FieldAnalysis>>;

    /// Insert or replace on (field_id, analysis_date).
    async fn upsert_analysis(&self, analysis: &FieldAnalysis) -> AnalysisResult<()>;

    /// Insert or replace on alert id.
    async fn upsert_alert(&self, alert: &Alert) -> AnalysisResult<()>;

    async fn get_alert(&self, id: Uuid) -> AnalysisResult<Option<Alert>>;

    /// The non-terminal alert for (field, kind), if one exists. Used by the
    /// alert engine's dedup window; resolved alerts never match.
    async fn active_alert(&self, field_id: &str, kind: AlertKind) -> AnalysisResult<Option<Alert>>;

    /// Atomically apply a lifecycle transition, recording user and
    /// timestamp. The domain state machine validates the transition.
    async fn update_alert_state(
        &self,
        id: Uuid,
        status: AlertStatus,
        user: &str,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AnalysisResult<Alert>;

    /// Insert or replace on (farm_id, field_id, season).
    async fn upsert_plan(&self, plan: &PrecisionPlan) -> AnalysisResult<()>;
}

/// In-memory store backing tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryStore {
    farms: DashMap<String, Vec<FieldBoundary>>,
    analyses: DashMap<(String, NaiveDate), FieldAnalysis>,
    alerts: DashMap<Uuid, Alert>,
    plans: DashMap<(String, String, Season), PrecisionPlan>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a farm and its fields (test/bootstrap helper).
    pub fn put_farm(&self, farm_id: &str, fields: Vec<FieldBoundary>) {
        self.farms.insert(farm_id.to_string(), fields);
    }

    /// Number of persisted analyses (test helper).
    pub fn analysis_count(&self) -> usize {
        self.analyses.len()
    }

    /// Number of persisted alerts (test helper).
    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    /// Number of persisted plans (test helper).
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Snapshot of every persisted alert (test helper).
    pub fn all_alerts(&self) -> Vec<Alert> {
        self.alerts.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn get_fields_by_farm(&self, farm_id: &str) -> AnalysisResult<Vec<FieldBoundary>> {
        self.farms
            .get(farm_id)
            .map(|fields| fields.clone())
            .ok_or_else(|| AnalysisError::invalid_input(format!("no such farm: {farm_id}")))
    }

    async fn get_latest_analysis(&self, field_id: &str) -> AnalysisResult<Option<FieldAnalysis>> {
        let mut latest: Option<FieldAnalysis> = None;
        for entry in self.analyses.iter() {
            let (id, date) = entry.key();
            if id != field_id {
                continue;
            }
            if latest
                .as_ref()
                .map(|current| *date > current.analysis_date)
                .unwrap_or(true)
            {
                latest = Some(entry.value().clone());
            }
        }
        Ok(latest)
    }

    async fn get_analyses_in_range(
        &self,
        field_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisResult<Vec<FieldAnalysis>> {
        let mut hits: Vec<FieldAnalysis> = self
            .analyses
            .iter()
            .filter(|entry| {
                let (id, date) = entry.key();
                id == field_id && *date >= start && *date <= end
            })
            .map(|entry| entry.value().clone())
            .collect();
        hits.sort_by_key(|analysis| analysis.analysis_date);
        Ok(hits)
    }

    async fn upsert_analysis(&self, analysis: &FieldAnalysis) -> AnalysisResult<()> {
        self.analyses.insert(analysis.key(), analysis.clone());
        Ok(())
    }

    async fn upsert_alert(&self, alert: &Alert) -> AnalysisResult<()> {
        self.alerts.insert(alert.id(), alert.clone());
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> AnalysisResult<Option<Alert>> {
        Ok(self.alerts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn active_alert(&self, field_id: &str, kind: AlertKind) -> AnalysisResult<Option<Alert>> {
        Ok(self
            .alerts
            .iter()
            .find(|entry| {
                let alert = entry.value();
                alert.field_id() == field_id
                    && alert.kind() == kind
                    && !alert.status().is_terminal()
            })
            .map(|entry| entry.value().clone()))
    }

    async fn update_alert_state(
        &self,
        id: Uuid,
        status: AlertStatus,
        user: &str,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AnalysisResult<Alert> {
        let mut entry = self
            .alerts
            .get_mut(&id)
            .ok_or_else(|| AnalysisError::invalid_input(format!("no such alert: {id}")))?;
        let alert = entry.value_mut();
        match status {
            AlertStatus::Acknowledged => alert.acknowledge(user, at)?,
            AlertStatus::Resolved => alert.resolve(user, note.unwrap_or_default(), at)?,
            AlertStatus::FalsePositive => alert.mark_false_positive(user, at)?,
            AlertStatus::Active => {
                return Err(AnalysisError::invalid_input(
                    "alerts cannot be transitioned back to active",
                ))
            }
        }
        Ok(alert.clone())
    }

    async fn upsert_plan(&self, plan: &PrecisionPlan) -> AnalysisResult<()> {
        self.plans.insert(plan.key(), plan.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeoPoint, Severity, StressAlert};
    use crate::domain::{AlertCore, SatelliteContext};

    fn boundary(id: &str) -> FieldBoundary {
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

    fn analysis_for(field_id: &str, date: NaiveDate) -> FieldAnalysis {
        use crate::domain::*;
        use chrono::TimeZone;
        FieldAnalysis {
            field: boundary(field_id),
            analysis_date: date,
            indices: VegetationIndices {
                ndvi_mean: 0.6,
                ndvi_min: 0.4,
                ndvi_max: 0.8,
                ndvi_median: 0.6,
                ndvi_std_dev: 0.05,
                ndre: 0.36,
                evi: 0.5,
                savi: 0.52,
                cloud_cover_pct: 5.0,
                captured_at: Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap(),
                resolution_meters: 10.0,
                histogram: None,
            },
            zones: ZonePartition {
                healthy: ZoneBand {
                    percentage: 60.0,
                    area_hectares: 24.0,
                },
                moderate: ZoneBand {
                    percentage: 30.0,
                    area_hectares: 12.0,
                },
                stressed: ZoneBand {
                    percentage: 10.0,
                    area_hectares: 4.0,
                },
            },
            stress: StressIndicators {
                drought: 0.1,
                disease: 0.1,
                nutrient: 0.3,
                pest: None,
                temperature: None,
                confidence: 0.95,
                low_confidence: false,
            },
            health_score: 68,
            comparison: None,
            alert_seeds: vec![],
            recommendations: vec![],
            created_at: Utc::now(),
        }
    }

    fn active_alert_for(field_id: &str) -> Alert {
        Alert::Stress(StressAlert {
            core: AlertCore {
                id: Uuid::new_v4(),
                farm_id: "farm-1".to_string(),
                field_id: field_id.to_string(),
                kind: AlertKind::DroughtCritical,
                severity: Severity::Critical,
                urgency: 4,
                affected_area_pct: 60.0,
                estimated_loss_usd: None,
                action_items: vec![],
                rule_based: false,
                status: AlertStatus::Active,
                detected_at: Utc::now(),
                acknowledged_by: None,
                acknowledged_at: None,
                resolved_by: None,
                resolved_at: None,
                resolution_note: None,
            },
            satellite_context: SatelliteContext {
                ndvi: 0.2,
                prior_ndvi: None,
                delta: None,
                trend: None,
            },
            weather_context: None,
        })
    }

    #[tokio::test]
    async fn test_unknown_farm_is_invalid_input() {
        let store = InMemoryStore::new();
        let err = store.get_fields_by_farm("nowhere").await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_analysis_upsert_is_idempotent() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let analysis = analysis_for("field-1", date);

        store.upsert_analysis(&analysis).await.unwrap();
        store.upsert_analysis(&analysis).await.unwrap();

        assert_eq!(store.analysis_count(), 1);
        let latest = store.get_latest_analysis("field-1").await.unwrap().unwrap();
        assert_eq!(latest.analysis_date, date);
    }

    #[tokio::test]
    async fn test_latest_analysis_picks_newest_date() {
        let store = InMemoryStore::new();
        let older = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let newer = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        store.upsert_analysis(&analysis_for("field-1", older)).await.unwrap();
        store.upsert_analysis(&analysis_for("field-1", newer)).await.unwrap();

        let latest = store.get_latest_analysis("field-1").await.unwrap().unwrap();
        assert_eq!(latest.analysis_date, newer);
    }

    #[tokio::test]
    async fn test_range_query_is_ordered() {
        let store = InMemoryStore::new();
        for day in [15, 1, 22] {
            let date = NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
            store.upsert_analysis(&analysis_for("field-1", date)).await.unwrap();
        }

        let hits = store
            .get_analyses_in_range(
                "field-1",
                NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 31).unwrap(),
            )
            .await
            .unwrap();
        let days: Vec<u32> = hits
            .iter()
            .map(|a| chrono::Datelike::day(&a.analysis_date))
            .collect();
        assert_eq!(days, vec![1, 15, 22]);
    }

    #[tokio::test]
    async fn test_active_alert_ignores_resolved() {
        let store = InMemoryStore::new();
        let alert = active_alert_for("field-1");
        let id = alert.id();
        store.upsert_alert(&alert).await.unwrap();

        assert!(store
            .active_alert("field-1", AlertKind::DroughtCritical)
            .await
            .unwrap()
            .is_some());

        store
            .update_alert_state(id, AlertStatus::Resolved, "agronomist", Some("rain came"), Utc::now())
            .await
            .unwrap();

        assert!(store
            .active_alert("field-1", AlertKind::DroughtCritical)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_invalid_transition_surfaces() {
        let store = InMemoryStore::new();
        let alert = active_alert_for("field-1");
        let id = alert.id();
        store.upsert_alert(&alert).await.unwrap();

        store
            .update_alert_state(id, AlertStatus::Resolved, "scout", None, Utc::now())
            .await
            .unwrap();
        let err = store
            .update_alert_state(id, AlertStatus::Acknowledged, "scout", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
    }
}
