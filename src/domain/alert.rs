use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::Trend;
use crate::error::{AnalysisError, AnalysisResult};

/// Everything the engine can raise an alert about. Crop-stress and
/// weather-driven kinds share one namespace so deduplication can key on
/// (field, kind) across both pathways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    // Crop stress
    DroughtCritical,
    DiseaseOutbreak,
    NutrientSevere,
    PestInfestation,
    GeneralDecline,
    // Weather
    Frost,
    Heat,
    Wind,
    Hail,
    Flood,
    Drought,
    Storm,
    FireRisk,
}

impl AlertKind {
    pub fn is_weather(&self) -> bool {
        matches!(
            self,
            Self::Frost
                | Self::Heat
                | Self::Wind
                | Self::Hail
                | Self::Flood
                | Self::Drought
                | Self::Storm
                | Self::FireRisk
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::DroughtCritical => "drought_critical",
            Self::DiseaseOutbreak => "disease_outbreak",
            Self::NutrientSevere => "nutrient_severe",
            Self::PestInfestation => "pest_infestation",
            Self::GeneralDecline => "general_decline",
            Self::Frost => "frost",
            Self::Heat => "heat",
            Self::Wind => "wind",
            Self::Hail => "hail",
            Self::Flood => "flood",
            Self::Drought => "drought",
            Self::Storm => "storm",
            Self::FireRisk => "fire_risk",
        }
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    High,
    Critical,
    Emergency,
}

impl Severity {
    /// Urgency a severity maps to before any area-based bump.
    pub fn base_urgency(&self) -> u8 {
        match self {
            Self::Minor => 1,
            Self::Moderate => 2,
            Self::High => 3,
            Self::Critical => 4,
            Self::Emergency => 5,
        }
    }
}

/// Alert lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    /// Allowed state-machine transitions: active → acknowledged → resolved,
    /// with false_positive terminal from active or acknowledged.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Acknowledged)
                | (Self::Active, Self::Resolved)
                | (Self::Active, Self::FalsePositive)
                | (Self::Acknowledged, Self::Resolved)
                | (Self::Acknowledged, Self::FalsePositive)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::FalsePositive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Immediate,
    Within24h,
    WithinWeek,
}

/// One concrete task attached to an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    pub priority: ActionPriority,
    pub estimated_cost_usd: Option<f64>,
    pub equipment: Vec<String>,
}

/// Satellite observations backing a stress alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteContext {
    pub ndvi: f64,
    pub prior_ndvi: Option<f64>,
    pub delta: Option<f64>,
    pub trend: Option<Trend>,
}

/// Weather observations attached to an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub recent_precipitation_mm: Option<f64>,
    pub dry_day_count: Option<u32>,
}

/// Time span a weather alert applies to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Fields shared by every alert variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCore {
    pub id: Uuid,
    pub farm_id: String,
    pub field_id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub urgency: u8,
    pub affected_area_pct: f64,
    pub estimated_loss_usd: Option<f64>,
    pub action_items: Vec<ActionItem>,
    /// Set when weather data was unavailable and the evaluation fell back
    /// to satellite rules alone.
    pub rule_based: bool,
    pub status: AlertStatus,
    pub detected_at: DateTime<Utc>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl AlertCore {
    /// Urgency must stay consistent with severity: the base mapping, plus
    /// at most one area-driven bump, never exceeding 5.
    pub fn validate_urgency(&self) -> AnalysisResult<()> {
        let base = self.severity.base_urgency();
        let max = (base + 1).min(5);
        if self.urgency < base || self.urgency > max {
            return Err(AnalysisError::internal(format!(
                "urgency {} inconsistent with severity {:?}",
                self.urgency, self.severity
            )));
        }
        Ok(())
    }
}

/// Crop-stress alert raised from satellite analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressAlert {
    #[serde(flatten)]
    pub core: AlertCore,
    pub satellite_context: SatelliteContext,
    pub weather_context: Option<WeatherContext>,
}

/// Weather-driven alert raised from current or forecast conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    #[serde(flatten)]
    pub core: AlertCore,
    pub confidence: f64,
    pub active_window: ActiveWindow,
    pub weather_context: WeatherContext,
}

/// An alert of either pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert_type", rename_all = "snake_case")]
pub enum Alert {
    Stress(StressAlert),
    Weather(WeatherAlert),
}

impl Alert {
    pub fn core(&self) -> &AlertCore {
        match self {
            Self::Stress(a) => &a.core,
            Self::Weather(a) => &a.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut AlertCore {
        match self {
            Self::Stress(a) => &mut a.core,
            Self::Weather(a) => &mut a.core,
        }
    }

    pub fn id(&self) -> Uuid {
        self.core().id
    }

    pub fn kind(&self) -> AlertKind {
        self.core().kind
    }

    pub fn severity(&self) -> Severity {
        self.core().severity
    }

    pub fn status(&self) -> AlertStatus {
        self.core().status
    }

    pub fn field_id(&self) -> &str {
        &self.core().field_id
    }

    /// Transition to acknowledged, recording the user and timestamp.
    pub fn acknowledge(&mut self, user: &str, at: DateTime<Utc>) -> AnalysisResult<()> {
        self.transition(AlertStatus::Acknowledged)?;
        let core = self.core_mut();
        core.acknowledged_by = Some(user.to_string());
        core.acknowledged_at = Some(at);
        Ok(())
    }

    /// Transition to resolved. Resolved alerts are immutable afterwards,
    /// except for the free-text resolution note.
    pub fn resolve(&mut self, user: &str, note: &str, at: DateTime<Utc>) -> AnalysisResult<()> {
        self.transition(AlertStatus::Resolved)?;
        let core = self.core_mut();
        core.resolved_by = Some(user.to_string());
        core.resolved_at = Some(at);
        core.resolution_note = Some(note.to_string());
        Ok(())
    }

    /// Terminal transition for evaluations that turned out wrong.
    pub fn mark_false_positive(&mut self, user: &str, at: DateTime<Utc>) -> AnalysisResult<()> {
        self.transition(AlertStatus::FalsePositive)?;
        let core = self.core_mut();
        core.resolved_by = Some(user.to_string());
        core.resolved_at = Some(at);
        Ok(())
    }

    /// Update the resolution note on an already-resolved alert.
    pub fn amend_resolution_note(&mut self, note: &str) -> AnalysisResult<()> {
        if self.status() != AlertStatus::Resolved {
            return Err(AnalysisError::invalid_input(
                "resolution note can only be amended on a resolved alert",
            ));
        }
        self.core_mut().resolution_note = Some(note.to_string());
        Ok(())
    }

    fn transition(&mut self, next: AlertStatus) -> AnalysisResult<()> {
        let current = self.status();
        if !current.can_transition_to(next) {
            return Err(AnalysisError::invalid_input(format!(
                "invalid alert transition {current:?} -> {next:?}"
            )));
        }
        self.core_mut().status = next;
        Ok(())
    }
}
