//! Configuration management
//!
//! Runtime ND timing parameters come from a TOML file or defaults; pool
//! capacities are compile-time constants because every table is a
//! fixed-size pool.

mod types;
mod validation;

pub use types::NibConfig;
pub use validation::{validate, TimingAudit};

use crate::{Error, Result};
use std::path::Path;

/// Number of on-link node entries.
pub const NIB_NUMOF: usize = 16;
/// Number of off-link (route / prefix list) entries.
pub const OFFL_NUMOF: usize = 8;
/// Number of default router list entries.
pub const DEFAULT_ROUTER_NUMOF: usize = 4;
/// Number of authoritative border router entries.
pub const ABR_NUMOF: usize = 2;
/// Number of interface records.
pub const NETIF_NUMOF: usize = 4;
/// Number of 6LoWPAN compression contexts.
pub const CTX_NUMOF: usize = 16;
/// Highest valid interface identifier.
pub const IF_MAX: u32 = 31;

/// Load ND timing configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<NibConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let config: NibConfig =
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}
