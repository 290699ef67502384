//! Configuration validation

use super::NibConfig;

/// Outcome of auditing ND timing parameters.
#[derive(Debug, Clone, Default)]
pub struct TimingAudit {
    /// Parameter combinations the NIB cannot run with.
    pub violations: Vec<String>,
    /// Legal but suspicious settings.
    pub advisories: Vec<String>,
}

impl TimingAudit {
    fn violation(&mut self, msg: impl Into<String>) {
        self.violations.push(msg.into());
    }

    fn advise(&mut self, msg: impl Into<String>) {
        self.advisories.push(msg.into());
    }

    /// The configuration can be handed to [`crate::Nib::with_config`].
    pub fn is_usable(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Audit ND timing parameters before building a NIB from them
pub fn validate(config: &NibConfig) -> TimingAudit {
    let mut audit = TimingAudit::default();

    if config.reach_time_base_ms == 0 {
        audit.violation("reach_time_base_ms must be non-zero");
    }
    if config.retrans_timer_ms == 0 {
        audit.violation("retrans_timer_ms must be non-zero");
    }
    if config.min_random_factor > config.max_random_factor {
        audit.violation("min_random_factor must not exceed max_random_factor");
    }
    if config.min_random_factor == 0 {
        audit.violation("min_random_factor must be non-zero");
    }
    if config.reach_time_reset_ms < config.reach_time_base_ms {
        audit.advise(format!(
            "reach_time_reset_ms ({}) shorter than reach_time_base_ms ({}); \
             reachable time will be recalculated before it elapses once",
            config.reach_time_reset_ms, config.reach_time_base_ms
        ));
    }
    if config.max_random_factor > 3000 {
        audit.advise(format!(
            "max_random_factor {} stretches reachable time more than 3x",
            config.max_random_factor
        ));
    }

    audit
}
