//! The four procurement workflows.

pub mod business_request;
mod common;
pub mod contract;
pub mod deliverable;
pub mod vendor_dd;

use crate::definition::WorkflowDefinition;

/// Every built-in workflow definition.
#[must_use]
pub fn standard() -> Vec<WorkflowDefinition> {
    vec![
        business_request::definition(),
        contract::definition(),
        vendor_dd::definition(),
        deliverable::definition(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::EntityType;

    #[test]
    fn one_definition_per_entity_type() {
        let types: Vec<EntityType> = standard().iter().map(|d| d.entity_type).collect();
        assert_eq!(types, EntityType::ALL.to_vec());
    }

    #[test]
    fn terminal_states_have_no_way_out() {
        for def in standard() {
            for transition in &def.transitions {
                for status in &def.terminal {
                    assert!(
                        !transition.leaves_from(*status),
                        "{}: {} leaves terminal {status}",
                        def.entity_type,
                        transition.name
                    );
                }
            }
        }
    }

    #[test]
    fn every_transition_names_sources_and_roles() {
        for def in standard() {
            for transition in &def.transitions {
                assert!(!transition.from.is_empty(), "{}", transition.name);
                assert!(!transition.allowed_roles.is_empty(), "{}", transition.name);
            }
        }
    }

    #[test]
    fn transition_names_are_unique() {
        for def in standard() {
            let mut names = def.transition_names();
            let count = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), count, "{}", def.entity_type);
        }
    }

    #[test]
    fn every_open_state_can_be_cancelled() {
        for def in standard() {
            let cancel = def.transition("cancel").expect("cancel");
            for status in def.open_states_except(&[]) {
                assert!(cancel.leaves_from(status), "{}: {status}", def.entity_type);
            }
        }
    }

    #[test]
    fn gate_votes_leave_from_their_pending_status() {
        for def in standard() {
            for transition in &def.transitions {
                if let crate::transition::GateKind::Parallel(gate) = transition.gate() {
                    let spec = def.gate(gate).expect("gate declared");
                    assert_eq!(transition.from, vec![spec.pending_status]);
                }
            }
        }
    }
}
