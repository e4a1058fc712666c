//! Derived next-dose view and edit payloads.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::compartment::{parse_schedule, Compartment};

/// The lowest-id pending compartment at a given moment. Never persisted;
/// recomputed from the snapshot on every change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NextDose {
    /// Compartment the dose comes from.
    pub compartment_id: u8,
    /// Medicine assigned to that compartment.
    pub medicine_name: String,
    /// Scheduled date, `DD/MM/YYYY`.
    pub expected_date: String,
    /// Scheduled time, `HH:MM`.
    pub expected_time: String,
}

impl NextDose {
    /// Project the dose fields out of a pending compartment.
    pub fn from_compartment(compartment: &Compartment) -> Self {
        Self {
            compartment_id: compartment.id,
            medicine_name: compartment.medicine_name.clone(),
            expected_date: compartment.expected_date.clone(),
            expected_time: compartment.expected_time.clone(),
        }
    }

    /// Parsed expected timestamp, `None` when malformed.
    pub fn expected_at(&self) -> Option<NaiveDateTime> {
        parse_schedule(&self.expected_date, &self.expected_time)
    }
}

/// A user edit to a compartment's schedule fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleUpdate {
    pub medicine_name: String,
    pub expected_date: String,
    pub expected_time: String,
}

impl ScheduleUpdate {
    pub fn new(
        medicine_name: impl Into<String>,
        expected_date: impl Into<String>,
        expected_time: impl Into<String>,
    ) -> Self {
        Self {
            medicine_name: medicine_name.into(),
            expected_date: expected_date.into(),
            expected_time: expected_time.into(),
        }
    }

    /// Parsed candidate timestamp, `None` when unset or malformed.
    pub fn expected_at(&self) -> Option<NaiveDateTime> {
        parse_schedule(&self.expected_date, &self.expected_time)
    }

    /// Whether both schedule fields are set.
    pub fn has_schedule(&self) -> bool {
        !self.expected_date.is_empty() && !self.expected_time.is_empty()
    }
}
