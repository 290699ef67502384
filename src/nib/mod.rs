//! The Neighbor Information Base
//!
//! One owned value holding every ND table: the on-link node pool shared
//! by the neighbor cache, default router list and off-link entries, the
//! eviction FIFO, the prefix/route table, per-interface parameters and
//! (with multihop prefix/context dissemination) the authoritative border
//! router table.
//!
//! The NIB never blocks and never sleeps. All operations take `&mut
//! self`; callers that share it across tasks wrap it in their own mutex
//! and hold that mutex for the whole of any multi-step lookup. Time only
//! moves through [`Nib::advance`].

#[cfg(feature = "multihop-p6c")]
mod abr;
mod drl;
mod iface;
mod node;
mod offl;

pub use iface::NibIface;

use crate::config::{NibConfig, DEFAULT_ROUTER_NUMOF, NETIF_NUMOF, NIB_NUMOF, OFFL_NUMOF};
#[cfg(feature = "multihop-p6c")]
use crate::config::ABR_NUMOF;
use crate::error::{Error, Result};
use crate::evtimer::{EvTimer, EventCtx, EventKind, NibEvent};
#[cfg(feature = "queue-pkt")]
use crate::types::DropReason;
use crate::types::{FtEntry, Mode, NudState, PktRef};
use std::collections::VecDeque;
use std::net::Ipv6Addr;
use tracing::debug;

/// The Neighbor Information Base.
#[derive(Debug)]
pub struct Nib {
    /// On-link node pool, shared by all tables through mode bits.
    nodes: [node::OnlEntry; NIB_NUMOF],
    /// Eviction FIFO over node indices, oldest neighbor cache entry
    /// first.
    fifo: VecDeque<usize>,
    def_routers: [drl::DrEntry; DEFAULT_ROUTER_NUMOF],
    /// Currently selected default router slot.
    prime_dr: Option<usize>,
    dsts: [offl::OfflEntry; OFFL_NUMOF],
    ifaces: [NibIface; NETIF_NUMOF],
    #[cfg(feature = "multihop-p6c")]
    abrs: [abr::AbrEntry; ABR_NUMOF],
    evtimer: EvTimer,
    now_ms: u64,
    timings: NibConfig,
    #[cfg(feature = "queue-pkt")]
    dropped: Vec<(PktRef, DropReason)>,
}

impl Nib {
    pub fn new() -> Self {
        Self::with_config(NibConfig::default())
    }

    pub fn with_config(timings: NibConfig) -> Self {
        // TODO: load authoritative border router state from persistent
        // storage once a backend exists
        Nib {
            nodes: std::array::from_fn(|_| node::OnlEntry::default()),
            fifo: VecDeque::with_capacity(NIB_NUMOF),
            def_routers: std::array::from_fn(|_| drl::DrEntry::default()),
            prime_dr: None,
            dsts: std::array::from_fn(|_| offl::OfflEntry::default()),
            ifaces: std::array::from_fn(|_| NibIface::default()),
            #[cfg(feature = "multihop-p6c")]
            abrs: std::array::from_fn(|_| abr::AbrEntry::default()),
            evtimer: EvTimer::new(),
            now_ms: 0,
            timings,
            #[cfg(feature = "queue-pkt")]
            dropped: Vec::new(),
        }
    }

    /// The monotonic millisecond counter all deadlines are relative to.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub(crate) fn now_ms32(&self) -> u32 {
        (self.now_ms & u64::from(u32::MAX)) as u32
    }

    /// Let `ms` milliseconds pass and return the events that became due,
    /// in firing order. The caller (the ND protocol engine) delivers
    /// them by re-entering the mutation API.
    pub fn advance(&mut self, ms: u32) -> Vec<NibEvent> {
        self.now_ms += u64::from(ms);
        self.evtimer.advance(ms)
    }

    /// Absolute offset until the event for `(kind, ctx)` fires, if
    /// scheduled.
    pub fn timer_lookup(&self, ctx: Option<EventCtx>, kind: EventKind) -> Option<u32> {
        self.evtimer.lookup(ctx, kind)
    }

    /// Schedule a deferred event against a record, rescheduling any
    /// previous event for the same `(kind, ctx)`. Used by the protocol
    /// engine for deferred neighbor advertisements and registration
    /// timeouts; record removal cancels the events of that record.
    pub fn timer_add(&mut self, ctx: EventCtx, kind: EventKind, offset_ms: u32) {
        self.evtimer.add(ctx, kind, offset_ms);
    }

    /// Cancel a scheduled event. Returns whether one was scheduled.
    pub fn timer_del(&mut self, ctx: EventCtx, kind: EventKind) -> bool {
        self.evtimer.del(ctx, kind)
    }

    /// Pick a next hop for `dst`.
    ///
    /// The longest matching off-link entry wins unless it is only a
    /// prefix list entry, in which case a usable default router takes
    /// precedence. A prefix-list-only match without any default router
    /// still resolves: the destination itself is on-link. Fails with
    /// [`Error::NetUnreachable`] when nothing matches.
    pub fn get_route(&mut self, dst: &Ipv6Addr, pkt: Option<PktRef>) -> Result<FtEntry> {
        debug!(dst = %dst, "get route");
        let offl = self.offl_get_match(dst);
        match offl {
            Some(entry) if self.dsts[entry.0].mode != Mode::PL => Ok(self.ft_get(entry)),
            maybe_pl => {
                if let Some(router) = self.drl_get_dr() {
                    debug!("preferring default router over prefix list entry");
                    Ok(self.drl_ft_get(router))
                } else if let Some(entry) = maybe_pl {
                    Ok(self.ft_get(entry))
                } else {
                    let _ = pkt;
                    // TODO: ask a route resolution provider (e.g. RPL) to
                    // search for a route using the packet
                    Err(Error::NetUnreachable)
                }
            }
        }
    }

    /// Returns every packet that was dropped since the last call,
    /// together with the reason, so the packet buffer can release them.
    #[cfg(feature = "queue-pkt")]
    pub fn take_dropped(&mut self) -> Vec<(PktRef, DropReason)> {
        std::mem::take(&mut self.dropped)
    }

    /// Reset `node` to free storage and write the new address and
    /// interface. For an entry still referenced by other tables only the
    /// address and interface are overwritten.
    pub(crate) fn override_node(&mut self, addr: Option<&Ipv6Addr>, iface: u32, idx: usize) {
        self.onl_clear(idx);
        if let Some(addr) = addr {
            self.nodes[idx].ipv6 = *addr;
        }
        self.nodes[idx].iface = iface;
    }

    /// Whether NUD considers the node unusable as a next hop.
    pub(crate) fn node_unreachable(&self, idx: usize) -> bool {
        matches!(
            self.nodes[idx].nud_state(),
            NudState::Unreachable | NudState::Incomplete
        )
    }
}

impl Default for Nib {
    fn default() -> Self {
        Self::new()
    }
}
