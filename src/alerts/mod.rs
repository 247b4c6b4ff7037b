//! Alert engine: evaluates analysis outputs and weather context against
//! agronomic thresholds, deduplicates into existing active alerts, manages
//! the alert lifecycle, and dispatches notifications.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub mod loss;
pub mod stress_rules;
pub mod weather_rules;

use crate::config::Config;
use crate::domain::{
    Alert, AlertCore, AlertStatus, FieldAnalysis, SatelliteContext, Severity, StressAlert,
    WeatherAlert, WeatherContext,
};
use crate::error::AnalysisResult;
use crate::notify::NotificationDispatcher;
use crate::persistence::PersistenceStore;
use crate::providers::{AggregatedWeather, CurrentWeather, DailyForecast};

/// Farm-level weather context for one evaluation pass.
#[derive(Debug, Clone)]
pub struct WeatherSnapshot {
    pub current: CurrentWeather,
    pub forecast: Vec<DailyForecast>,
    pub aggregate: Option<AggregatedWeather>,
}

/// Threshold-driven alert evaluation and lifecycle management.
pub struct AlertEngine {
    config: Arc<Config>,
    store: Arc<dyn PersistenceStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl AlertEngine {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn PersistenceStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
        }
    }

    /// Evaluate a farm's analyses (plus optional weather) into alerts.
    ///
    /// Within the dedup window an existing active alert for the same
    /// (field, kind) is updated in place instead of creating a duplicate;
    /// severity only ever ratchets up.
    pub async fn evaluate(
        &self,
        farm_id: &str,
        analyses: &[FieldAnalysis],
        weather: Option<&WeatherSnapshot>,
    ) -> AnalysisResult<Vec<Alert>> {
        let rule_based = weather.is_none();
        if rule_based {
            warn!(farm_id, "weather unavailable; evaluating satellite rules only");
        }

        let weather_findings = weather
            .map(|snapshot| weather_rules::evaluate(snapshot, &self.config.weather.thresholds))
            .unwrap_or_default();
        let weather_context = weather.map(|snapshot| WeatherContext {
            temperature_c: snapshot.current.temperature_c,
            humidity_pct: snapshot.current.humidity_pct,
            wind_speed_ms: snapshot.current.wind_speed_ms,
            recent_precipitation_mm: Some(snapshot.current.precipitation_mm),
            dry_day_count: snapshot.aggregate.as_ref().map(|a| a.dry_day_count),
        });

        let mut alerts = Vec::new();

        for analysis in analyses {
            for seed in &analysis.alert_seeds {
                let severity = match stress_rules::classify_stress(
                    seed.kind,
                    seed.score,
                    analysis.health_score,
                    &self.config.alerts,
                ) {
                    Some(severity) => severity,
                    None => continue,
                };

                let candidate = self.build_stress_alert(
                    farm_id,
                    analysis,
                    seed.kind,
                    severity,
                    seed.affected_area_pct,
                    weather_context.clone(),
                    rule_based,
                );
                let stored = self.dedup_or_insert(candidate).await?;
                alerts.push(stored);
            }

            for finding in &weather_findings {
                let candidate = self.build_weather_alert(farm_id, analysis, finding);
                let stored = self.dedup_or_insert(candidate).await?;
                alerts.push(stored);
            }
        }

        info!(
            farm_id,
            alerts = alerts.len(),
            weather_rules = weather_findings.len(),
            "alert evaluation complete"
        );
        Ok(alerts)
    }

    /// Acknowledge an active alert.
    pub async fn acknowledge(&self, id: Uuid, user: &str) -> AnalysisResult<Alert> {
        self.store
            .update_alert_state(id, AlertStatus::Acknowledged, user, None, Utc::now())
            .await
    }

    /// Resolve an alert with a note.
    pub async fn resolve(&self, id: Uuid, user: &str, note: &str) -> AnalysisResult<Alert> {
        self.store
            .update_alert_state(id, AlertStatus::Resolved, user, Some(note), Utc::now())
            .await
    }

    /// Mark an alert as a false positive.
    pub async fn mark_false_positive(&self, id: Uuid, user: &str) -> AnalysisResult<Alert> {
        self.store
            .update_alert_state(id, AlertStatus::FalsePositive, user, None, Utc::now())
            .await
    }

    fn build_stress_alert(
        &self,
        farm_id: &str,
        analysis: &FieldAnalysis,
        kind: crate::domain::AlertKind,
        severity: Severity,
        affected_area_pct: f64,
        weather_context: Option<WeatherContext>,
        rule_based: bool,
    ) -> Alert {
        let field = &analysis.field;
        let estimated_loss_usd = loss::estimate_loss(
            kind,
            &field.id,
            field.area_acres(),
            affected_area_pct,
            analysis.health_score,
            analysis.analysis_date,
        );

        Alert::Stress(StressAlert {
            core: AlertCore {
                id: Uuid::new_v4(),
                farm_id: farm_id.to_string(),
                field_id: field.id.clone(),
                kind,
                severity,
                urgency: stress_rules::derive_urgency(severity, affected_area_pct),
                affected_area_pct,
                estimated_loss_usd,
                action_items: stress_rules::action_items(kind, field.area_acres()),
                rule_based,
                status: AlertStatus::Active,
                detected_at: Utc::now(),
                acknowledged_by: None,
                acknowledged_at: None,
                resolved_by: None,
                resolved_at: None,
                resolution_note: None,
            },
            satellite_context: SatelliteContext {
                ndvi: analysis.indices.ndvi_mean,
                prior_ndvi: analysis.comparison.as_ref().map(|c| c.prior_ndvi_mean),
                delta: analysis.comparison.as_ref().map(|c| c.delta_mean_ndvi),
                trend: analysis.comparison.as_ref().map(|c| c.trend),
            },
            weather_context,
        })
    }

    fn build_weather_alert(
        &self,
        farm_id: &str,
        analysis: &FieldAnalysis,
        finding: &weather_rules::WeatherFinding,
    ) -> Alert {
        // Weather conditions cover the whole field
        let affected_area_pct = 100.0;
        Alert::Weather(WeatherAlert {
            core: AlertCore {
                id: Uuid::new_v4(),
                farm_id: farm_id.to_string(),
                field_id: analysis.field.id.clone(),
                kind: finding.kind,
                severity: finding.severity,
                urgency: stress_rules::derive_urgency(finding.severity, affected_area_pct),
                affected_area_pct,
                estimated_loss_usd: None,
                action_items: finding.actions.clone(),
                rule_based: finding.rule_based,
                status: AlertStatus::Active,
                detected_at: Utc::now(),
                acknowledged_by: None,
                acknowledged_at: None,
                resolved_by: None,
                resolved_at: None,
                resolution_note: None,
            },
            confidence: finding.confidence,
            active_window: finding.active_window,
            weather_context: finding.context.clone(),
        })
    }

    /// Either update the live alert for (field, kind) or persist the
    /// candidate as a new one. Returns whatever ended up stored.
    async fn dedup_or_insert(&self, candidate: Alert) -> AnalysisResult<Alert> {
        let window = Duration::hours(self.config.alerts.dedup_window_hours);
        let existing = self
            .store
            .active_alert(candidate.field_id(), candidate.kind())
            .await?;

        let stored = match existing {
            Some(mut current) if Utc::now() - current.core().detected_at <= window => {
                let escalated = merge_candidate(&mut current, &candidate);
                self.store.upsert_alert(&current).await?;
                if escalated {
                    self.maybe_dispatch(&current);
                }
                current
            }
            _ => {
                self.store.upsert_alert(&candidate).await?;
                self.maybe_dispatch(&candidate);
                candidate
            }
        };
        Ok(stored)
    }

    fn maybe_dispatch(&self, alert: &Alert) {
        if self.config.alerts.dispatch_critical_and_above_only
            && alert.severity() < Severity::Critical
        {
            return;
        }
        if let Err(e) = self.dispatcher.enqueue(alert) {
            // Best-effort: a dead dispatcher never fails the alert itself
            warn!(alert_id = %alert.id(), error = %e, "notification enqueue failed");
        }
    }
}

/// Fold a fresh candidate into the stored alert. Severity never decreases;
/// the observation contexts and loss estimate refresh to the latest pass.
/// Returns true when severity escalated.
fn merge_candidate(current: &mut Alert, candidate: &Alert) -> bool {
    let escalated = candidate.severity() > current.severity();

    {
        let candidate_core = candidate.core();
        let core = current.core_mut();
        core.severity = core.severity.max(candidate_core.severity);
        core.urgency = core.urgency.max(candidate_core.urgency);
        core.affected_area_pct = candidate_core.affected_area_pct;
        core.estimated_loss_usd = candidate_core.estimated_loss_usd;
        core.rule_based = candidate_core.rule_based;
        if escalated {
            core.action_items = candidate_core.action_items.clone();
        }
    }

    match (current, candidate) {
        (Alert::Stress(current), Alert::Stress(candidate)) => {
            current.satellite_context = candidate.satellite_context.clone();
            current.weather_context = candidate.weather_context.clone();
        }
        (Alert::Weather(current), Alert::Weather(candidate)) => {
            current.confidence = current.confidence.max(candidate.confidence);
            current.active_window = candidate.active_window;
            current.weather_context = candidate.weather_context.clone();
        }
        // Same (field, kind) never mixes pathways
        _ => {}
    }

    escalated
}
