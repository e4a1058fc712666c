//! Edit-time ordering validation.
//!
//! The ordering invariant (expected timestamps non-decreasing in id order) is
//! enforced only against the immediately preceding slot. An edit that makes a
//! compartment later than its successor is accepted and leaves the collection
//! locally out of order; callers rely on this lenient behavior.

use thiserror::Error;

use crate::models::{Compartment, ScheduleUpdate};

/// Rejected edit: the candidate schedule runs earlier than its predecessor's.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("compartment {id} must be scheduled at or after compartment {previous_id}")]
pub struct ValidationError {
    pub id: u8,
    pub previous_id: u8,
}

/// Check a candidate edit for compartment `id` against slot `id - 1` only.
///
/// Vacuously valid for slot 1. When either side has no parsable expected
/// timestamp there is nothing to compare, so the edit is accepted; a present
/// but unparsable schedule is logged and later excluded from alert scheduling.
pub fn check_against_previous(
    snapshot: &[Compartment],
    id: u8,
    candidate: &ScheduleUpdate,
) -> Result<(), ValidationError> {
    if id <= 1 {
        return Ok(());
    }
    let previous = match snapshot.iter().find(|c| c.id == id - 1) {
        Some(previous) => previous,
        None => return Ok(()),
    };

    let previous_at = match previous.expected_at() {
        Some(at) => at,
        None => {
            if previous.has_expected_schedule() {
                tracing::warn!(
                    "compartment {} has an unparsable schedule ({:?} {:?}), skipping ordering check",
                    previous.id,
                    previous.expected_date,
                    previous.expected_time,
                );
            }
            return Ok(());
        }
    };
    let candidate_at = match candidate.expected_at() {
        Some(at) => at,
        None => {
            if candidate.has_schedule() {
                tracing::warn!(
                    "edit for compartment {} has an unparsable schedule ({:?} {:?}), skipping ordering check",
                    id,
                    candidate.expected_date,
                    candidate.expected_time,
                );
            }
            return Ok(());
        }
    };

    if candidate_at < previous_at {
        return Err(ValidationError {
            id,
            previous_id: previous.id,
        });
    }
    Ok(())
}
