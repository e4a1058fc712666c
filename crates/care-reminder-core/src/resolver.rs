//! Next-dose resolution.

use crate::models::{Compartment, NextDose};

/// Scan the id-sorted snapshot in ascending id order and return the first
/// pending compartment, or `None` when nothing is pending.
///
/// Pure and deterministic: ids are unique, so the scan order is both the
/// tie-break and the intended dispense order. Callers must re-run this on
/// every snapshot change; a cached result is stale by construction.
pub fn next_dose(snapshot: &[Compartment]) -> Option<NextDose> {
    snapshot
        .iter()
        .find(|compartment| compartment.is_pending())
        .map(NextDose::from_compartment)
}
