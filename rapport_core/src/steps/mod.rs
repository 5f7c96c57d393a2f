//! The schema steps of the practice-management datastore.
//!
//! # Adding New Steps
//!
//! 1. Create a new file `mXXX_description.rs` in this directory
//! 2. Implement the `MigrationStep` trait with an id that sorts after the last one
//! 3. Add the step to the `ALL` array in this file

mod m001_add_tenant_composite_indexes;
mod m002_unique_client_email_per_therapist;
mod m003_add_client_timeline_indexes;

pub use m001_add_tenant_composite_indexes::AddTenantCompositeIndexes;
pub use m002_unique_client_email_per_therapist::UniqueClientEmailPerTherapist;
pub use m003_add_client_timeline_indexes::AddClientTimelineIndexes;

use crate::step::MigrationStep;

/// All steps in application order. Add new steps to the end.
pub const ALL: &[&dyn MigrationStep] = &[
    &AddTenantCompositeIndexes,
    &UniqueClientEmailPerTherapist,
    &AddClientTimelineIndexes,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn steps_are_in_lexical_order() {
        let mut previous = "";
        for step in ALL {
            assert!(
                step.id() > previous,
                "Step {} should sort after {}",
                step.id(),
                previous
            );
            previous = step.id();
        }
    }

    #[test]
    fn all_steps_have_unique_ids() {
        let ids: HashSet<&str> = ALL.iter().map(|s| s.id()).collect();
        assert_eq!(ids.len(), ALL.len(), "Step ids must be unique");
    }

    #[test]
    fn ids_carry_a_sortable_timestamp_prefix() {
        for step in ALL {
            let (stamp, rest) = step.id().split_at(14);
            assert!(
                stamp.chars().all(|c| c.is_ascii_digit()),
                "{} should start with YYYYMMDDHHMMSS",
                step.id()
            );
            assert!(rest.starts_with('-'), "{} should separate with '-'", step.id());
        }
    }
}
