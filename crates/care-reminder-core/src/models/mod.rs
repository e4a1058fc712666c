//! Domain models for the care-reminder system.

mod compartment;
mod dose;

pub use compartment::*;
pub use dose::*;
