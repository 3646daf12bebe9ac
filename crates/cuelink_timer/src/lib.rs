//! # CueLink Timer
//!
//! The single authority for the show clock: a plain countdown and a
//! countdown-to-wall-clock-time, both command-driven and ticked on a fixed
//! 100ms interval. Clients never push time; they poll snapshots and
//! reconstruct a local display, so every viewer agrees with the operator.
//!
//! Only the timer mutates its own state; readers get snapshot copies.

mod error;
mod timer;

pub use error::{TimerError, TimerResult};
pub use timer::{spawn_ticker, ShowTimer, TimerCommand, TimerSnapshot, TICK_INTERVAL};
