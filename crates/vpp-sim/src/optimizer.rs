//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Static optimizer recommendation catalog."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use crate::frames::{ActionImpact, ActionKind, ActionPriority, ActionStatus, OptimizerAction};

struct CatalogEntry {
    id: &'static str,
    kind: ActionKind,
    title: &'static str,
    description: &'static str,
    time_window: &'static str,
    impact: ActionImpact,
    status: ActionStatus,
    priority: ActionPriority,
}

const CATALOG: [CatalogEntry; 3] = [
    CatalogEntry {
        id: "1",
        kind: ActionKind::Battery,
        title: "Charge Battery During Low Rates",
        description: "Charge battery from 1-3 PM when solar generation peaks",
        time_window: "13:00 - 15:00",
        impact: ActionImpact {
            grid_reduction: 45.0,
            cost_saving: 12.5,
            co2_reduction: 8.2,
        },
        status: ActionStatus::Pending,
        priority: ActionPriority::High,
    },
    CatalogEntry {
        id: "2",
        kind: ActionKind::Hvac,
        title: "Pre-cool Buildings",
        description: "Lower HVAC setpoint before peak hours to reduce afternoon load",
        time_window: "14:00 - 16:00",
        impact: ActionImpact {
            grid_reduction: 32.0,
            cost_saving: 8.7,
            co2_reduction: 5.4,
        },
        status: ActionStatus::Pending,
        priority: ActionPriority::Medium,
    },
    CatalogEntry {
        id: "3",
        kind: ActionKind::LoadShift,
        title: "Shift Non-Critical Loads",
        description: "Delay water heating and EV charging to off-peak hours",
        time_window: "22:00 - 06:00",
        impact: ActionImpact {
            grid_reduction: 28.0,
            cost_saving: 15.3,
            co2_reduction: 6.8,
        },
        status: ActionStatus::Active,
        priority: ActionPriority::Medium,
    },
];

/// The fixed recommendation catalog, freshly owned on every call.
///
/// Status changes (e.g. pending to active) belong to the caller's copy.
pub fn generate_optimizer_actions() -> Vec<OptimizerAction> {
    CATALOG
        .iter()
        .map(|entry| OptimizerAction {
            id: entry.id.to_owned(),
            kind: entry.kind,
            title: entry.title.to_owned(),
            description: entry.description.to_owned(),
            time_window: entry.time_window.to_owned(),
            impact: entry.impact,
            status: entry.status,
            priority: entry.priority,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_deterministic() {
        assert_eq!(generate_optimizer_actions(), generate_optimizer_actions());
    }

    #[test]
    fn catalog_contents() {
        let actions = generate_optimizer_actions();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].kind, ActionKind::Battery);
        assert_eq!(actions[0].priority, ActionPriority::High);
        assert_eq!(actions[1].time_window, "14:00 - 16:00");
        assert_eq!(actions[2].status, ActionStatus::Active);
        assert_eq!(actions[2].impact.cost_saving, 15.3);
        let ids: Vec<_> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn caller_copies_are_independent() {
        let mut first = generate_optimizer_actions();
        first[0].status = ActionStatus::Active;
        assert_eq!(generate_optimizer_actions()[0].status, ActionStatus::Pending);
    }
}
