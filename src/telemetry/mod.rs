//! Telemetry module for logging.
//!
//! The NIB itself only emits `tracing` events; this module lets
//! embedding daemons and test harnesses install a subscriber for them.

mod logging;

pub use logging::{init_logging, DEFAULT_DIRECTIVE};
