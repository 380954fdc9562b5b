use fieldguard_api::UpdatePlan;

use crate::outcome::{Outcome, OutcomeAggregator};

/// Log what each plan would send and count it as applied. No store call.
pub fn simulate(table: &str, plans: &[UpdatePlan], stats: &OutcomeAggregator) {
    for plan in plans {
        let e = plan.expressions();
        tracing::info!(
            table,
            key = %plan.key(),
            version = plan.version(),
            update = %e.update,
            condition = %e.condition,
            names = ?e.names,
            values = ?e.values,
            "would write"
        );
        stats.record(Outcome::Applied);
    }
}
