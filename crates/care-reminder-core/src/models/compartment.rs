//! Compartment records for the 14 physical dispenser slots.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Number of physical compartments in the dispenser. Ids are dense 1..=14.
pub const COMPARTMENT_COUNT: u8 = 14;

/// Date format used in persisted schedule fields (e.g. "10/05/2025").
pub const SCHEDULE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Time format used in persisted schedule fields, 24-hour (e.g. "08:00").
pub const SCHEDULE_TIME_FORMAT: &str = "%H:%M";

/// Parse a `DD/MM/YYYY` date plus `HH:MM` time pair into a naive local
/// date-time. Returns `None` when either part is empty or unparsable.
pub fn parse_schedule(date: &str, time: &str) -> Option<NaiveDateTime> {
    if date.is_empty() || time.is_empty() {
        return None;
    }
    let format = format!("{} {}", SCHEDULE_DATE_FORMAT, SCHEDULE_TIME_FORMAT);
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), &format).ok()
}

/// One of the 14 fixed medicine slots, each with its own schedule record.
///
/// Compartments are provisioned once and only ever updated; the empty string
/// stands for "unset" in every field, mirroring the persisted documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Compartment {
    /// Physical slot identifier, 1..=14. Doubles as the dispense order.
    pub id: u8,
    /// Medicine assigned to the slot; empty means unassigned.
    pub medicine_name: String,
    /// Scheduled dose date, `DD/MM/YYYY`. Set together with `expected_time`.
    pub expected_date: String,
    /// Scheduled dose time, `HH:MM`. Set together with `expected_date`.
    pub expected_time: String,
    /// Date the dose was physically withdrawn from the slot.
    pub retrieved_date: String,
    /// Time the dose was physically withdrawn from the slot.
    pub retrieved_time: String,
    /// Date the dose was consumed; set together with `taken_time`.
    pub taken_date: String,
    /// Time the dose was consumed; set together with `taken_date`.
    pub taken_time: String,
}

impl Compartment {
    /// Create an unassigned compartment for the given slot.
    pub fn blank(id: u8) -> Self {
        Self {
            id,
            medicine_name: String::new(),
            expected_date: String::new(),
            expected_time: String::new(),
            retrieved_date: String::new(),
            retrieved_time: String::new(),
            taken_date: String::new(),
            taken_time: String::new(),
        }
    }

    /// Whether both expected schedule fields are set.
    pub fn has_expected_schedule(&self) -> bool {
        !self.expected_date.is_empty() && !self.expected_time.is_empty()
    }

    /// Whether a consumption timestamp has been recorded.
    pub fn is_taken(&self) -> bool {
        !self.taken_date.is_empty() || !self.taken_time.is_empty()
    }

    /// A compartment is pending when it carries an expected schedule and no
    /// taken timestamp. Pending is a string-level predicate: an unparsable
    /// schedule still counts (it is only excluded from alert scheduling).
    pub fn is_pending(&self) -> bool {
        self.taken_date.is_empty() && self.taken_time.is_empty() && self.has_expected_schedule()
    }

    /// Parsed expected timestamp, `None` when unset or malformed.
    pub fn expected_at(&self) -> Option<NaiveDateTime> {
        parse_schedule(&self.expected_date, &self.expected_time)
    }
}
