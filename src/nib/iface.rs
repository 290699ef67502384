//! Per-interface ND parameters
//!
//! Each interface running ND gets a slot holding its reachable time
//! (randomized around a base value, RFC 4861 section 6.3.2), its
//! retransmission timer and the role flags the 6LoWPAN address
//! derivation needs.

use super::Nib;
use crate::config::IF_MAX;
#[cfg(feature = "arsm")]
use crate::evtimer::{EventCtx, EventKind};
use tracing::trace;

#[cfg(feature = "arsm")]
use rand::Rng;

/// ND state of one interface; the slot is free while `pid` is 0.
#[derive(Debug, Clone, Copy)]
pub struct NibIface {
    pid: u32,
    /// Base reachable time in milliseconds.
    pub reach_time_base: u32,
    /// Current randomized reachable time in milliseconds.
    pub reach_time: u32,
    /// Retransmission timer in milliseconds.
    pub retrans_time: u32,
    /// The interface runs 6LoWPAN.
    pub sixlowpan: bool,
    /// The interface acts as a router.
    pub router: bool,
}

impl Default for NibIface {
    fn default() -> Self {
        NibIface {
            pid: 0,
            reach_time_base: 0,
            reach_time: 0,
            retrans_time: 0,
            sixlowpan: false,
            router: false,
        }
    }
}

impl NibIface {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Nib {
    fn iface_idx(&mut self, iface: u32) -> Option<usize> {
        debug_assert!(iface <= IF_MAX);
        let mut free = None;
        for (i, ni) in self.ifaces.iter().enumerate() {
            if ni.pid == iface {
                return Some(i);
            }
            if free.is_none() && ni.pid == 0 {
                free = Some(i);
            }
        }
        let slot = free?;
        trace!(iface, "initializing interface record");
        self.ifaces[slot] = NibIface {
            pid: iface,
            reach_time_base: self.timings.reach_time_base_ms,
            reach_time: self.timings.reach_time_base_ms,
            retrans_time: self.timings.retrans_timer_ms,
            sixlowpan: false,
            router: false,
        };
        Some(slot)
    }

    /// The ND record for `iface`, initializing a free slot on first
    /// use. `None` only when the interface table is full.
    pub fn iface_get(&mut self, iface: u32) -> Option<&mut NibIface> {
        let idx = self.iface_idx(iface)?;
        Some(&mut self.ifaces[idx])
    }

    /// Read-only lookup without initializing a slot.
    #[cfg(all(feature = "arsm", feature = "sixln"))]
    pub(crate) fn iface_by_pid(&self, iface: u32) -> Option<&NibIface> {
        self.ifaces.iter().find(|ni| ni.pid == iface)
    }

    /// Redraw the randomized reachable time of `iface` and schedule the
    /// next recalculation.
    #[cfg(feature = "arsm")]
    pub fn iface_recalc_reach_time(&mut self, iface: u32) {
        let Some(idx) = self.iface_idx(iface) else {
            return;
        };
        // The factor is in thousandths
        let factor = rand::thread_rng()
            .gen_range(self.timings.min_random_factor..=self.timings.max_random_factor);
        let ni = &mut self.ifaces[idx];
        ni.reach_time = ((u64::from(ni.reach_time_base) * u64::from(factor)) / 1000) as u32;
        trace!(iface, reach_time = ni.reach_time, "recalculated reachable time");
        self.evtimer.add(
            EventCtx::Iface(iface),
            EventKind::RecalcReachTime,
            self.timings.reach_time_reset_ms,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NibConfig, NETIF_NUMOF};

    #[test]
    fn test_find_or_init() {
        let mut nib = Nib::new();
        let ni = nib.iface_get(1).unwrap();
        assert_eq!(ni.pid(), 1);
        assert_eq!(ni.reach_time_base, 30_000);
        assert_eq!(ni.reach_time, 30_000);
        assert_eq!(ni.retrans_time, 1_000);

        // The same slot is returned on the next call
        let ni = nib.iface_get(1).unwrap();
        ni.reach_time_base = 15_000;
        assert_eq!(nib.iface_get(1).unwrap().reach_time_base, 15_000);
        assert_eq!(nib.iface_get(2).unwrap().reach_time_base, 30_000);
    }

    #[test]
    fn test_table_full() {
        let mut nib = Nib::new();
        for i in 0..NETIF_NUMOF {
            assert!(nib.iface_get(i as u32 + 1).is_some());
        }
        assert!(nib.iface_get(NETIF_NUMOF as u32 + 1).is_none());
        // Known interfaces are still found
        assert!(nib.iface_get(1).is_some());
    }

    #[test]
    fn test_config_seeds_defaults() {
        let config = NibConfig {
            reach_time_base_ms: 10_000,
            retrans_timer_ms: 700,
            ..Default::default()
        };
        let mut nib = Nib::with_config(config);
        let ni = nib.iface_get(1).unwrap();
        assert_eq!(ni.reach_time_base, 10_000);
        assert_eq!(ni.retrans_time, 700);
    }

    #[cfg(feature = "arsm")]
    #[test]
    fn test_recalc_stays_within_bounds() {
        let mut nib = Nib::new();
        nib.iface_get(1).unwrap();
        for _ in 0..32 {
            nib.iface_recalc_reach_time(1);
            let reach_time = nib.iface_get(1).unwrap().reach_time;
            // Factor range 0.5..=1.5 of the 30s base
            assert!((15_000..=45_000).contains(&reach_time));
        }
    }

    #[cfg(feature = "arsm")]
    #[test]
    fn test_recalc_reschedules_itself() {
        let mut nib = Nib::new();
        nib.iface_recalc_reach_time(1);
        assert_eq!(
            nib.timer_lookup(Some(EventCtx::Iface(1)), EventKind::RecalcReachTime),
            Some(7_200_000)
        );

        let due = nib.advance(7_200_000);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].kind, EventKind::RecalcReachTime);
        assert_eq!(due[0].ctx, EventCtx::Iface(1));
    }
}
