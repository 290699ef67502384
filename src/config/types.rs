//! Configuration types

use serde::{Deserialize, Serialize};

/// ND timing parameters.
///
/// All values are milliseconds except the random factors, which are
/// thousandths (RFC 4861 uses 0.5 and 1.5).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NibConfig {
    /// Base reachable time (RFC 4861 REACHABLE_TIME).
    pub reach_time_base_ms: u32,
    /// Retransmission timer (RFC 4861 RETRANS_TIMER).
    pub retrans_timer_ms: u32,
    /// Interval between reachable-time recalculations.
    pub reach_time_reset_ms: u32,
    /// Lower bound of the reachable-time random factor.
    pub min_random_factor: u32,
    /// Upper bound of the reachable-time random factor.
    pub max_random_factor: u32,
}

impl Default for NibConfig {
    fn default() -> Self {
        Self {
            reach_time_base_ms: 30_000,
            retrans_timer_ms: 1_000,
            reach_time_reset_ms: 7_200_000,
            min_random_factor: 500,
            max_random_factor: 1500,
        }
    }
}
