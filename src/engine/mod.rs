//! Slot availability for one court and one day.
//!
//! Everything in here is pure. Inputs are borrowed snapshots and nothing
//! reads a clock.

mod applicability;
mod error;
mod precheck;
mod slots;
mod summary;

pub use applicability::{blocks_on, reserved_on, DayBlocks};
pub use error::EngineError;
pub use precheck::precheck;
pub use slots::{compute_slots, SLOT_MINUTES};
pub use summary::{bookings_on, free_windows, merge_overlapping, subtract_intervals, unavailable};
