//! Multi-core lock arbiters: the global `CmpSync` lock and the per-object
//! `Ihlu` (section 4.8, section 4.9).

pub mod cmpsync;
pub mod ihlu;

pub use cmpsync::CmpSync;
pub use ihlu::{Ihlu, IhluEvent, MAX_SLOTS};
