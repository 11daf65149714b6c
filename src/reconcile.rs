//! Reconciliation engine (§4.D): a pure function from one site's observed
//! census, the authority's target bands and the registry's current slice to
//! an ordered mutation plan. No I/O, no locking; the connection handler is
//! responsible for executing the plan against the authority and the
//! registry.

use std::collections::HashMap;

use crate::codec::packets::target_populations::TargetBand;
use crate::policy::{Action, Species};
use crate::registry::{PolicyEntry, SiteSlice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Delete(u32),
    Create(Species, Action),
}

fn desired_action(count: u32, band: &TargetBand) -> Option<Action> {
    if count < band.min {
        Some(Action::Conserve)
    } else if count > band.max {
        Some(Action::Cull)
    } else {
        None
    }
}

/// Computes the mutation plan for one site (§4.D). `observed` need not
/// contain every species in `targets`; a species with no observation is
/// treated as a count of zero. Species present in `current` but absent from
/// `targets` are left untouched, per §4.D's "targets define the authoritative
/// schema of managed species for a site".
#[must_use]
pub fn reconcile(
    observed: &HashMap<Species, u32>,
    targets: &[TargetBand],
    current: &SiteSlice,
) -> Vec<Mutation> {
    let mut plan = Vec::new();

    for band in targets {
        let count = observed.get(&band.species).copied().unwrap_or(0);
        let desired = desired_action(count, band);

        match (current.get(&band.species), desired) {
            (Some(entry), Some(action)) if entry.action == action => {}
            (Some(entry), Some(action)) => {
                plan.push(Mutation::Delete(entry.policy_id));
                plan.push(Mutation::Create(band.species.clone(), action));
            }
            (Some(entry), None) => {
                plan.push(Mutation::Delete(entry.policy_id));
            }
            (None, Some(action)) => {
                plan.push(Mutation::Create(band.species.clone(), action));
            }
            (None, None) => {}
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(entries: &[(&str, u32, Action)]) -> SiteSlice {
        entries
            .iter()
            .map(|(species, id, action)| {
                ((*species).to_string(), PolicyEntry::new(*id, *action))
            })
            .collect()
    }

    fn observed(entries: &[(&str, u32)]) -> HashMap<Species, u32> {
        entries
            .iter()
            .map(|(species, count)| ((*species).to_string(), *count))
            .collect()
    }

    #[test]
    fn full_reconciliation_scenario_5() {
        let observed = observed(&[("rat", 10), ("owl", 2)]);
        let targets = vec![
            TargetBand::new("rat", 0, 5),
            TargetBand::new("owl", 0, 5),
            TargetBand::new("hawk", 1, 3),
        ];
        let current = SiteSlice::new();

        let plan = reconcile(&observed, &targets, &current);

        assert_eq!(
            plan,
            vec![
                Mutation::Create("rat".to_string(), Action::Cull),
                Mutation::Create("hawk".to_string(), Action::Conserve),
            ]
        );
    }

    #[test]
    fn transition_scenario_6() {
        let observed = observed(&[("rat", 3)]);
        let targets = vec![
            TargetBand::new("rat", 0, 5),
            TargetBand::new("owl", 0, 5),
            TargetBand::new("hawk", 1, 3),
        ];
        let current = slice(&[("rat", 7, Action::Cull)]);

        let plan = reconcile(&observed, &targets, &current);

        assert_eq!(
            plan,
            vec![
                Mutation::Delete(7),
                Mutation::Create("hawk".to_string(), Action::Conserve),
            ]
        );
    }

    #[test]
    fn idempotence() {
        let observed = observed(&[("rat", 10)]);
        let targets = vec![TargetBand::new("rat", 0, 5)];
        let current = SiteSlice::new();

        let first = reconcile(&observed, &targets, &current);
        assert_eq!(first, vec![Mutation::Create("rat".to_string(), Action::Cull)]);

        let mut current = current;
        current.insert("rat".to_string(), PolicyEntry::new(1, Action::Cull));
        let second = reconcile(&observed, &targets, &current);
        assert!(second.is_empty());
    }

    #[test]
    fn non_interference_for_species_outside_targets_and_current() {
        let observed = observed(&[("dog", 1)]);
        let targets = vec![TargetBand::new("rat", 0, 5)];
        let current = SiteSlice::new();

        assert!(reconcile(&observed, &targets, &current).is_empty());
    }

    #[test]
    fn species_in_current_but_not_in_targets_is_left_untouched() {
        let observed = observed(&[]);
        let targets = vec![];
        let current = slice(&[("rat", 1, Action::Cull)]);

        assert!(reconcile(&observed, &targets, &current).is_empty());
    }

    #[test]
    fn delete_before_create_when_action_flips() {
        let observed = observed(&[("rat", 10)]);
        let targets = vec![TargetBand::new("rat", 0, 5)];
        let current = slice(&[("rat", 3, Action::Conserve)]);

        let plan = reconcile(&observed, &targets, &current);

        assert_eq!(
            plan,
            vec![
                Mutation::Delete(3),
                Mutation::Create("rat".to_string(), Action::Cull),
            ]
        );
    }
}
