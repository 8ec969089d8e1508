//! Core traits and types shared by the simulation crates.
//!
//! Everything ticks at the master clock. All component timing derives from
//! this. No exceptions.

mod clock;
mod error;
mod observable;
mod tickable;
mod ticks;

pub use clock::MasterClock;
pub use error::CoreError;
pub use observable::{Observable, Value};
pub use tickable::Tickable;
pub use ticks::Ticks;
