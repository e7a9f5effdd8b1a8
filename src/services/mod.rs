//! Collaborator traits for the data the engine reads but does not own.

pub mod clock;
pub mod history;
pub mod supplement;

pub use clock::{Clock, SystemClock};
pub use history::{CurrentReadings, ReadingHistory};
pub use supplement::SupplementProvider;
