//! Deterministic loss estimation. The only randomness is a drought-yield
//! variability factor seeded from (field, kind, day), so a given day's
//! estimate is reproducible across runs and across engine instances.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::domain::AlertKind;

const DROUGHT_BASE_PER_ACRE: f64 = 300.0;
const DISEASE_BASE_PER_ACRE: f64 = 275.0;
const DISEASE_TREATMENT_PER_ACRE: f64 = 100.0;
const NUTRIENT_BASE_PER_ACRE: f64 = 175.0;
const NUTRIENT_FERTILIZER_PER_ACRE: f64 = 80.0;
const PEST_BASE_PER_ACRE: f64 = 185.0;
const PEST_TREATMENT_PER_ACRE: f64 = 65.0;
const DECLINE_MAX_PER_ACRE: f64 = 400.0;

/// Estimated USD loss for a stress alert. Weather alerts carry no estimate.
pub fn estimate_loss(
    kind: AlertKind,
    field_id: &str,
    area_acres: f64,
    affected_area_pct: f64,
    health_score: u8,
    detected_on: NaiveDate,
) -> Option<f64> {
    let affected_fraction = (affected_area_pct / 100.0).clamp(0.0, 1.0);
    let loss = match kind {
        AlertKind::DroughtCritical => {
            let variability = seeded_factor(field_id, kind, detected_on);
            DROUGHT_BASE_PER_ACRE * area_acres * affected_fraction * (1.0 + variability)
        }
        AlertKind::DiseaseOutbreak => {
            (DISEASE_BASE_PER_ACRE + DISEASE_TREATMENT_PER_ACRE) * area_acres * affected_fraction
        }
        AlertKind::NutrientSevere => {
            (NUTRIENT_BASE_PER_ACRE + NUTRIENT_FERTILIZER_PER_ACRE) * area_acres * affected_fraction
        }
        AlertKind::PestInfestation => {
            (PEST_BASE_PER_ACRE + PEST_TREATMENT_PER_ACRE) * area_acres * affected_fraction
        }
        AlertKind::GeneralDecline => {
            DECLINE_MAX_PER_ACRE * ((100 - health_score) as f64 / 100.0)
                * area_acres
                * affected_fraction
        }
        _ => return None,
    };
    Some(round_usd(loss))
}

/// Yield-variability factor in [0, 0.5], reproducible for a given
/// (field, kind, day). `DefaultHasher::new()` uses fixed keys, so the seed
/// chain is stable across processes.
fn seeded_factor(field_id: &str, kind: AlertKind, day: NaiveDate) -> f64 {
    let mut hasher = DefaultHasher::new();
    field_id.hash(&mut hasher);
    kind.label().hash(&mut hasher);
    day.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());
    rng.gen_range(0.0..=0.5)
}

pub fn round_usd(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
