//! Crop-stress classification: maps seeded threshold breaches to severity,
//! urgency, and action items.

use crate::config::AlertsConfig;
use crate::domain::{ActionItem, ActionPriority, AlertKind, Severity};

/// Severity for a stress alert kind, or `None` when the score does not
/// clear the configured trigger. Monotone: a higher score never maps to a
/// lower severity.
pub fn classify_stress(
    kind: AlertKind,
    score: f64,
    health_score: u8,
    config: &AlertsConfig,
) -> Option<Severity> {
    match kind {
        AlertKind::DroughtCritical => {
            if score > config.drought_emergency {
                Some(Severity::Emergency)
            } else if score > config.drought_trigger {
                Some(Severity::Critical)
            } else {
                None
            }
        }
        AlertKind::DiseaseOutbreak => {
            if score > config.disease_critical {
                Some(Severity::Critical)
            } else if score > config.disease_trigger {
                Some(Severity::High)
            } else {
                None
            }
        }
        AlertKind::NutrientSevere => {
            if score > config.nutrient_critical {
                Some(Severity::Critical)
            } else if score > config.nutrient_trigger {
                Some(Severity::High)
            } else {
                None
            }
        }
        AlertKind::PestInfestation => {
            if score > config.pest_critical {
                Some(Severity::Critical)
            } else if score > config.pest_trigger {
                Some(Severity::High)
            } else {
                None
            }
        }
        AlertKind::GeneralDecline => {
            if health_score < config.decline_critical_health {
                Some(Severity::Critical)
            } else {
                Some(Severity::High)
            }
        }
        _ => None,
    }
}

/// Urgency from severity plus the affected-area bump. The bump applies
/// below critical only: critical already sits one notch under the ceiling
/// and emergency is the ceiling.
pub fn derive_urgency(severity: Severity, affected_area_pct: f64) -> u8 {
    let base = severity.base_urgency();
    if affected_area_pct > 50.0 && severity < Severity::Critical {
        (base + 1).min(5)
    } else {
        base
    }
}

/// Ordered task list for a stress alert kind.
pub fn action_items(kind: AlertKind, area_acres: f64) -> Vec<ActionItem> {
    let item = |task: &str, priority, cost: Option<f64>, equipment: &[&str]| ActionItem {
        task: task.to_string(),
        priority,
        estimated_cost_usd: cost,
        equipment: equipment.iter().map(|e| e.to_string()).collect(),
    };

    match kind {
        AlertKind::DroughtCritical => vec![
            item(
                "Inspect irrigation system for pressure and coverage",
                ActionPriority::Immediate,
                None,
                &["irrigation system"],
            ),
            item(
                "Begin emergency irrigation in stressed zones",
                ActionPriority::Immediate,
                Some(super::loss::round_usd(8.0 * area_acres)),
                &["irrigation system", "center pivot"],
            ),
            item(
                "Verify soil-moisture probe readings against satellite zones",
                ActionPriority::Within24h,
                None,
                &["soil moisture probes"],
            ),
        ],
        AlertKind::DiseaseOutbreak => vec![
            item(
                "Scout affected zones and identify the pathogen",
                ActionPriority::Immediate,
                None,
                &[],
            ),
            item(
                "Apply fungicide to affected zones",
                ActionPriority::Within24h,
                Some(super::loss::round_usd(22.0 * area_acres)),
                &["sprayer"],
            ),
            item(
                "Wash down equipment before moving between fields",
                ActionPriority::WithinWeek,
                None,
                &["pressure washer"],
            ),
        ],
        AlertKind::NutrientSevere => vec![
            item(
                "Pull tissue and soil samples from stressed zones",
                ActionPriority::Within24h,
                Some(45.0),
                &["soil probe"],
            ),
            item(
                "Apply corrective nitrogen per zone prescription",
                ActionPriority::WithinWeek,
                Some(super::loss::round_usd(30.0 * area_acres)),
                &["spreader"],
            ),
        ],
        AlertKind::PestInfestation => vec![
            item(
                "Ground-truth the patchy canopy damage",
                ActionPriority::Immediate,
                None,
                &[],
            ),
            item(
                "Targeted insecticide application in confirmed patches",
                ActionPriority::Within24h,
                Some(super::loss::round_usd(15.0 * area_acres)),
                &["sprayer"],
            ),
        ],
        AlertKind::GeneralDecline => vec![
            item(
                "Walk the field and rule out equipment damage",
                ActionPriority::Within24h,
                None,
                &[],
            ),
            item(
                "Review recent inputs, weather, and pest history",
                ActionPriority::WithinWeek,
                None,
                &[],
            ),
        ],
        _ => vec![],
    }
}
