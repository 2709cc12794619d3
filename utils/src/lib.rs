//! Shared utilities for the TIDE pool ledger.

pub mod logging;
pub mod stats;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use stats::StatsCounter;
pub use time::{format_duration, Clock, SystemClock};
