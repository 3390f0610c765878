//! Utility functions and helpers.

pub mod clock;
pub mod http;

pub use clock::{Clock, FixedClock, SystemClock};
