//! On-link node pool and neighbor cache
//!
//! One pool of (IPv6 address, interface) records backs every table in
//! the NIB; mode bits track which tables reference a record. The
//! neighbor cache additionally keeps a FIFO over the pool to pick
//! eviction victims when an insertion finds the pool full.

use super::Nib;
use crate::error::{Error, Result};
use crate::evtimer::{EventCtx, EventKind};
use crate::types::*;
use std::net::Ipv6Addr;
use tracing::{debug, trace};

#[cfg(feature = "queue-pkt")]
use std::collections::VecDeque;

/// One on-link node record.
///
/// A record whose mode word is empty is free storage and compares equal
/// to `Default::default()`.
#[derive(Debug, Clone)]
pub(super) struct OnlEntry {
    pub(super) ipv6: Ipv6Addr,
    pub(super) iface: u32,
    pub(super) mode: Mode,
    /// Packed NUD state, router flag and address registration state.
    pub(super) info: u16,
    #[cfg(feature = "arsm")]
    pub(super) l2addr: [u8; L2ADDR_MAX_LEN],
    #[cfg(feature = "arsm")]
    pub(super) l2addr_len: u8,
    /// Packets awaiting address resolution for this neighbor.
    #[cfg(feature = "queue-pkt")]
    pub(super) pktqueue: VecDeque<PktRef>,
}

impl Default for OnlEntry {
    fn default() -> Self {
        OnlEntry {
            ipv6: Ipv6Addr::UNSPECIFIED,
            iface: 0,
            mode: Mode::empty(),
            info: 0,
            #[cfg(feature = "arsm")]
            l2addr: [0; L2ADDR_MAX_LEN],
            #[cfg(feature = "arsm")]
            l2addr_len: 0,
            #[cfg(feature = "queue-pkt")]
            pktqueue: VecDeque::new(),
        }
    }
}

impl OnlEntry {
    pub(super) fn nud_state(&self) -> NudState {
        NudState::from_info(self.info)
    }

    /// Address match as used by allocation: a missing caller address or
    /// a stored unspecified address match anything, so a placeholder
    /// entry can later be promoted to a known address without
    /// reallocation.
    pub(super) fn addr_matches(&self, addr: Option<&Ipv6Addr>) -> bool {
        match addr {
            None => true,
            Some(addr) => self.ipv6.is_unspecified() || self.ipv6 == *addr,
        }
    }
}

/// Eviction candidates: referenced by nothing but the neighbor cache
/// and not registered by the neighbor.
fn is_gc(node: &OnlEntry) -> bool {
    node.mode.difference(Mode::NC).is_empty()
        && (node.info & AR_STATE_MASK) == ArState::Gc as u16
}

impl Nib {
    /// Find the record for (`addr`, `iface`) or claim a free slot for
    /// it. A single scan: an exact match wins over the first empty slot
    /// found along the way.
    pub(crate) fn onl_alloc(&mut self, addr: Option<&Ipv6Addr>, iface: u32) -> Option<usize> {
        trace!(?addr, iface, "allocating on-link node entry");
        let mut free = None;
        let mut exact = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.iface == iface && node.addr_matches(addr) {
                exact = Some(i);
                break;
            }
            if free.is_none() && node.mode.is_empty() {
                free = Some(i);
            }
        }
        let Some(idx) = exact.or(free) else {
            trace!("on-link node pool full");
            return None;
        };
        self.override_node(addr, iface, idx);
        Some(idx)
    }

    /// Exact lookup; interface 0 on either side acts as a wildcard.
    pub fn onl_get(&self, addr: &Ipv6Addr, iface: u32) -> Option<NodeId> {
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.mode.is_empty()
                && (node.iface == 0 || iface == 0 || node.iface == iface)
                && node.ipv6 == *addr
            {
                return Some(NodeId(i));
            }
        }
        None
    }

    /// All occupied on-link nodes in pool order.
    pub fn onl_iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.mode.is_empty())
            .map(|(i, _)| NodeId(i))
    }

    /// Release the slot if nothing references it any more: cancel every
    /// timer that could still fire against it, unlink it from the
    /// eviction FIFO and zero the record. Returns whether the slot was
    /// freed.
    pub(crate) fn onl_clear(&mut self, idx: usize) -> bool {
        if !self.nodes[idx].mode.is_empty() {
            return false;
        }
        self.evtimer.del(EventCtx::Node(NodeId(idx)), EventKind::SendNa);
        #[cfg(feature = "arsm")]
        self.evtimer
            .del(EventCtx::Node(NodeId(idx)), EventKind::ReachTimeout);
        #[cfg(feature = "sixlr")]
        self.evtimer
            .del(EventCtx::Node(NodeId(idx)), EventKind::AddrRegTimeout);
        if let Some(pos) = self.fifo.iter().position(|&n| n == idx) {
            self.fifo.remove(pos);
        }
        self.nodes[idx] = OnlEntry::default();
        true
    }

    /// Insert (`addr`, `iface`) into the neighbor cache with the given
    /// initial NUD state.
    ///
    /// New entries may not start in DELAY, PROBE or REACHABLE; those
    /// states are only reached through transitions. When the pool is
    /// full the oldest garbage-collectible entry is evicted and its slot
    /// reused; fails with [`crate::Error::Exhausted`] when no entry is
    /// collectible.
    pub fn nc_add(&mut self, addr: &Ipv6Addr, iface: u32, state: NudState) -> Result<NodeId> {
        debug_assert!(!addr.is_unspecified());
        debug_assert!(!matches!(
            state,
            NudState::Delay | NudState::Probe | NudState::Reachable
        ));
        let Some(idx) = self.onl_alloc(Some(addr), iface) else {
            return self
                .cache_out_onl_entry(addr, iface, state)
                .ok_or(Error::Exhausted);
        };
        debug!(addr = %addr, iface, ?state, "adding to neighbor cache");
        let node = &mut self.nodes[idx];
        if !node.mode.contains(Mode::NC) {
            node.info = (node.info & !NUD_STATE_MASK) | state as u16;
            node.mode |= Mode::NC;
        }
        if !self.fifo.contains(&idx) {
            trace!(addr = %addr, iface, "queueing for potential removal");
            self.fifo.push_back(idx);
        }
        Ok(NodeId(idx))
    }

    /// Evict the oldest garbage-collectible neighbor cache entry and
    /// reuse its slot for (`addr`, `iface`).
    ///
    /// The FIFO is scanned in insertion order and only the victim is
    /// moved (to the tail, as the freshly inserted entry), so the
    /// relative order of all surviving entries is preserved.
    fn cache_out_onl_entry(
        &mut self,
        addr: &Ipv6Addr,
        iface: u32,
        state: NudState,
    ) -> Option<NodeId> {
        debug!(addr = %addr, iface, "searching for replaceable entries");
        let pos = self.fifo.iter().position(|&i| is_gc(&self.nodes[i]))?;
        let idx = self.fifo.remove(pos)?;
        debug!(
            evicted = %self.nodes[idx].ipv6,
            evicted_iface = self.nodes[idx].iface,
            addr = %addr,
            iface,
            "removing neighbor cache entry for new entry"
        );
        // nc_remove cancels the victim's timers and drops its queue
        self.nc_remove(NodeId(idx));
        self.override_node(Some(addr), iface, idx);
        let node = &mut self.nodes[idx];
        node.info |= state as u16;
        node.mode = Mode::NC;
        self.fifo.push_back(idx);
        Some(NodeId(idx))
    }

    /// Remove `node` from the neighbor cache: cancel its timers, hand
    /// every queued packet back as unreachable and release the slot if
    /// no other table references it.
    pub fn nc_remove(&mut self, node: NodeId) {
        let idx = node.0;
        debug!(
            addr = %self.nodes[idx].ipv6,
            iface = self.nodes[idx].iface,
            "removing from neighbor cache"
        );
        self.nodes[idx].mode.remove(Mode::NC);
        self.evtimer.del(EventCtx::Node(node), EventKind::SendNa);
        #[cfg(feature = "arsm")]
        self.evtimer.del(EventCtx::Node(node), EventKind::ReachTimeout);
        #[cfg(feature = "sixlr")]
        self.evtimer
            .del(EventCtx::Node(node), EventKind::AddrRegTimeout);
        #[cfg(feature = "queue-pkt")]
        {
            while let Some(pkt) = self.nodes[idx].pktqueue.pop_front() {
                self.dropped.push((pkt, DropReason::HostUnreachable));
            }
        }
        self.onl_clear(idx);
    }

    /// Confirm reachability: enter REACHABLE and schedule the fall-back
    /// to STALE after the interface's current reachable time.
    #[cfg(feature = "arsm")]
    pub fn nc_set_reachable(&mut self, node: NodeId) {
        let idx = node.0;
        let iface = self.nodes[idx].iface;
        let reach_time = self
            .iface_get(iface)
            .map(|ni| ni.reach_time)
            .unwrap_or_default();
        debug!(addr = %self.nodes[idx].ipv6, iface, reach_time, "set reachable");
        let entry = &mut self.nodes[idx];
        entry.info = (entry.info & !NUD_STATE_MASK) | NudState::Reachable as u16;
        self.evtimer
            .add(EventCtx::Node(node), EventKind::ReachTimeout, reach_time);
    }

    #[cfg(not(feature = "arsm"))]
    pub fn nc_set_reachable(&mut self, _node: NodeId) {}

    /// Read out a neighbor cache record.
    ///
    /// Without the address resolution state machine, and on 6LoWPAN
    /// host interfaces, the link-layer address is derived from the
    /// interface identifier instead of stored state; such entries must
    /// be link-local.
    pub fn nc_get(&self, node: NodeId) -> NcEntry {
        let entry = &self.nodes[node.0];
        let mut nce = NcEntry {
            ipv6: entry.ipv6,
            info: entry.info,
            l2addr: [0; L2ADDR_MAX_LEN],
            l2addr_len: 0,
        };
        #[cfg(feature = "arsm")]
        {
            #[cfg(feature = "sixln")]
            {
                if is_link_local(&entry.ipv6) {
                    if let Some(ni) = self.iface_by_pid(entry.iface) {
                        if ni.sixlowpan && !ni.router {
                            nce.l2addr[..8].copy_from_slice(&iid_l2addr(&entry.ipv6));
                            nce.l2addr_len = 8;
                            return nce;
                        }
                    }
                }
            }
            let len = entry.l2addr_len as usize;
            nce.l2addr[..len].copy_from_slice(&entry.l2addr[..len]);
            nce.l2addr_len = entry.l2addr_len;
        }
        #[cfg(not(feature = "arsm"))]
        {
            debug_assert!(is_link_local(&entry.ipv6));
            nce.l2addr[..8].copy_from_slice(&iid_l2addr(&entry.ipv6));
            nce.l2addr_len = 8;
        }
        nce
    }

    /// Record the neighbor's link-layer address.
    #[cfg(feature = "arsm")]
    pub fn nc_set_l2addr(&mut self, node: NodeId, l2addr: &[u8]) {
        debug_assert!(l2addr.len() <= L2ADDR_MAX_LEN);
        let len = l2addr.len().min(L2ADDR_MAX_LEN);
        let entry = &mut self.nodes[node.0];
        entry.l2addr[..len].copy_from_slice(&l2addr[..len]);
        entry.l2addr_len = len as u8;
    }

    pub fn nc_set_nud_state(&mut self, node: NodeId, state: NudState) {
        let entry = &mut self.nodes[node.0];
        entry.info = (entry.info & !NUD_STATE_MASK) | state as u16;
    }

    pub fn nc_set_ar_state(&mut self, node: NodeId, state: ArState) {
        let entry = &mut self.nodes[node.0];
        entry.info = (entry.info & !AR_STATE_MASK) | state as u16;
    }

    pub fn nc_set_router(&mut self, node: NodeId, is_router: bool) {
        let entry = &mut self.nodes[node.0];
        if is_router {
            entry.info |= IS_ROUTER;
        } else {
            entry.info &= !IS_ROUTER;
        }
    }

    /// Queue a packet until address resolution for this neighbor
    /// finishes.
    #[cfg(feature = "queue-pkt")]
    pub fn nc_queue_pkt(&mut self, node: NodeId, pkt: PktRef) {
        debug_assert!(self.nodes[node.0].mode.contains(Mode::NC));
        self.nodes[node.0].pktqueue.push_back(pkt);
    }
}
