//! Logging initialization.
//!
//! The NIB only emits `tracing` events along its allocation, eviction
//! and route decision paths; nothing here is needed for the tables to
//! work. [`init_logging`] installs a process-wide subscriber for
//! binaries and test harnesses that embed the NIB and want to see that
//! trail.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Filter used when neither `RUST_LOG` nor a directive is given: the
/// NIB's own debug trail, everything else at info.
pub const DEFAULT_DIRECTIVE: &str = "info,nib6=debug";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes priority over `directive`, which falls back to
/// [`DEFAULT_DIRECTIVE`]. Safe to call from every test case; only the
/// first call installs anything.
pub fn init_logging(directive: Option<&str>) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(directive.unwrap_or(DEFAULT_DIRECTIVE))
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
