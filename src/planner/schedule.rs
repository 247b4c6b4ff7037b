//! Weekly implementation schedule derived from recommendation timing
//! windows. Weeks anchor on the plan's derivation date, never the clock.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::domain::{ScheduledWeek, VariableRateRecommendation};

/// Bucket recommendations into ordered weekly task lists.
pub fn build_schedule(
    recommendations: &[VariableRateRecommendation],
    plan_date: NaiveDate,
) -> Vec<ScheduledWeek> {
    let mut weeks: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();

    for rec in recommendations {
        let offset_days = (rec.timing.optimal_window_start - plan_date).num_days().max(0);
        let week_start = plan_date + Duration::days((offset_days / 7) * 7);
        weeks.entry(week_start).or_default().push(format!(
            "Apply {} at {:.1} {} base rate ({})",
            rec.product,
            rec.base_rate,
            rec.rate_unit,
            rec.kind.label()
        ));
    }

    weeks
        .into_iter()
        .map(|(week_start, mut tasks)| {
            tasks.sort();
            ScheduledWeek { week_start, tasks }
        })
        .collect()
}
