//! Off-link entries
//!
//! One pool backs the forwarding table, the prefix list and RPL routes;
//! an entry's mode word records which of those reference it. Route
//! lookup is a linear longest-prefix match over the occupied entries.

use super::Nib;
use crate::error::{Error, Result};
use crate::evtimer::{EventCtx, EventKind};
use crate::types::*;
use std::net::Ipv6Addr;
use tracing::trace;

/// One off-link entry; the slot is free iff `next_hop` is unset.
///
/// `valid_until`/`pref_until` are absolute millisecond deadlines,
/// `u32::MAX` meaning infinite.
#[derive(Debug, Clone, Copy)]
pub(super) struct OfflEntry {
    pub(super) next_hop: Option<usize>,
    pub(super) mode: Mode,
    pub(super) pfx: Ipv6Addr,
    pub(super) pfx_len: u8,
    pub(super) valid_until: u32,
    pub(super) pref_until: u32,
}

impl Default for OfflEntry {
    fn default() -> Self {
        OfflEntry {
            next_hop: None,
            mode: Mode::empty(),
            pfx: Ipv6Addr::UNSPECIFIED,
            pfx_len: 0,
            valid_until: 0,
            pref_until: 0,
        }
    }
}

impl Nib {
    /// Find the entry for (`pfx`/`pfx_len` via `next_hop` on `iface`)
    /// or claim a free slot for it. An existing entry whose next hop
    /// address is still unknown matches and is promoted when `next_hop`
    /// is supplied.
    pub(crate) fn offl_alloc(
        &mut self,
        next_hop: Option<&Ipv6Addr>,
        iface: u32,
        pfx: &Ipv6Addr,
        pfx_len: u8,
    ) -> Option<usize> {
        debug_assert!(!pfx.is_unspecified());
        debug_assert!((1..=128).contains(&pfx_len));
        trace!(?next_hop, iface, pfx = %pfx, pfx_len, "allocating off-link entry");
        let mut free = None;
        let mut exact = None;
        for (i, dst) in self.dsts.iter().enumerate() {
            match dst.next_hop {
                Some(node) => {
                    if dst.pfx_len == pfx_len
                        && self.nodes[node].iface == iface
                        && self.nodes[node].addr_matches(next_hop)
                        && match_prefix_bits(&dst.pfx, pfx) >= pfx_len
                    {
                        exact = Some((i, node));
                        break;
                    }
                }
                None => {
                    if free.is_none() {
                        free = Some(i);
                    }
                }
            }
        }
        if let Some((i, node)) = exact {
            if let Some(addr) = next_hop {
                self.nodes[node].ipv6 = *addr;
            }
            self.nodes[node].mode |= Mode::DST;
            return Some(i);
        }
        let slot = free?;
        let Some(node) = self.onl_alloc(next_hop, iface) else {
            self.dsts[slot] = OfflEntry::default();
            return None;
        };
        self.override_node(next_hop, iface, node);
        self.nodes[node].mode |= Mode::DST;
        self.dsts[slot] = OfflEntry {
            next_hop: Some(node),
            mode: Mode::empty(),
            pfx: truncate_prefix(pfx, pfx_len),
            pfx_len,
            valid_until: 0,
            pref_until: 0,
        };
        Some(slot)
    }

    /// Install an off-link entry of the given kind (FT, PL or RPL).
    pub fn offl_add(
        &mut self,
        next_hop: Option<&Ipv6Addr>,
        iface: u32,
        pfx: &Ipv6Addr,
        pfx_len: u8,
        kind: Mode,
    ) -> Result<DestId> {
        let idx = self
            .offl_alloc(next_hop, iface, pfx, pfx_len)
            .ok_or(Error::Exhausted)?;
        self.dsts[idx].mode |= kind;
        Ok(DestId(idx))
    }

    /// Install a route in the forwarding table.
    pub fn ft_add(
        &mut self,
        next_hop: &Ipv6Addr,
        iface: u32,
        pfx: &Ipv6Addr,
        pfx_len: u8,
    ) -> Result<DestId> {
        self.offl_add(Some(next_hop), iface, pfx, pfx_len, Mode::FT)
    }

    pub fn ft_remove(&mut self, dst: DestId) {
        self.offl_remove(dst, Mode::FT);
    }

    /// Free the slot. The next-hop node is released only when no other
    /// off-link entry shares it.
    pub(crate) fn offl_clear(&mut self, idx: usize) {
        if let Some(node) = self.dsts[idx].next_hop {
            let shared = self
                .dsts
                .iter()
                .enumerate()
                .any(|(i, dst)| i != idx && dst.next_hop == Some(node));
            if !shared {
                self.nodes[node].mode.remove(Mode::DST);
                self.onl_clear(node);
            }
            self.dsts[idx] = OfflEntry::default();
        }
    }

    /// Drop `kind` from the entry; the slot is freed once no kind
    /// references it.
    pub fn offl_remove(&mut self, dst: DestId, kind: Mode) {
        self.dsts[dst.0].mode.remove(kind);
        if self.dsts[dst.0].mode.is_empty() {
            self.offl_clear(dst.0);
        }
    }

    /// All occupied off-link entries in pool order.
    pub fn offl_iter(&self) -> impl Iterator<Item = DestId> + '_ {
        self.dsts
            .iter()
            .enumerate()
            .filter(|(_, dst)| !dst.mode.is_empty())
            .map(|(i, _)| DestId(i))
    }

    /// Longest prefix match: the qualifying entry (matching bits cover
    /// its whole prefix) with the most matching bits; ties go to the
    /// first entry in pool order.
    pub(crate) fn offl_get_match(&self, dst: &Ipv6Addr) -> Option<DestId> {
        let mut best: Option<(usize, u8)> = None;
        for (i, entry) in self.dsts.iter().enumerate() {
            if entry.mode.is_empty() {
                continue;
            }
            let bits = match_prefix_bits(&entry.pfx, dst);
            trace!(pfx = %entry.pfx, pfx_len = entry.pfx_len, bits, "route candidate");
            if bits >= entry.pfx_len && best.map_or(true, |(_, b)| bits > b) {
                best = Some((i, bits));
            }
        }
        best.map(|(i, _)| DestId(i))
    }

    /// Forwarding entry for an off-link entry. Prefix-list-only entries
    /// have no next hop: the destination is on-link.
    pub fn ft_get(&self, dst: DestId) -> FtEntry {
        let entry = &self.dsts[dst.0];
        let Some(node) = entry.next_hop else {
            debug_assert!(false, "forwarding entry requested for a free off-link slot");
            return FtEntry::default();
        };
        FtEntry {
            dst: entry.pfx,
            dst_len: entry.pfx_len,
            next_hop: if entry.mode == Mode::PL {
                Ipv6Addr::UNSPECIFIED
            } else {
                self.nodes[node].ipv6
            },
            iface: self.nodes[node].iface,
            primary: false,
        }
    }

    /// Add a prefix list entry with the given lifetimes in milliseconds
    /// (`u32::MAX` = infinite).
    ///
    /// Finite lifetimes are stored as absolute deadlines against the
    /// current millisecond counter; a finite deadline that lands exactly
    /// on `u32::MAX` is bumped by one so it stays distinguishable from
    /// the infinite sentinel. A prefix timeout fires when the preferred
    /// lifetime runs out.
    pub fn pl_add(
        &mut self,
        iface: u32,
        pfx: &Ipv6Addr,
        pfx_len: u8,
        valid_ltime: u32,
        pref_ltime: u32,
    ) -> Result<DestId> {
        debug_assert!(valid_ltime >= pref_ltime);
        let dst = self.offl_add(None, iface, pfx, pfx_len, Mode::PL)?;
        let mut valid = valid_ltime;
        let mut pref = pref_ltime;
        if valid != u32::MAX || pref != u32::MAX {
            let now = self.now_ms32();
            if pref != u32::MAX {
                self.evtimer
                    .add(EventCtx::Dest(dst), EventKind::PfxTimeout, pref);
                if pref.wrapping_add(now) == u32::MAX {
                    pref += 1;
                }
                pref = pref.wrapping_add(now);
            }
            if valid != u32::MAX {
                if valid.wrapping_add(now) == u32::MAX {
                    valid += 1;
                }
                valid = valid.wrapping_add(now);
            }
        }
        let entry = &mut self.dsts[dst.0];
        entry.valid_until = valid;
        entry.pref_until = pref;
        Ok(dst)
    }

    /// Remove a prefix list entry: cancel its timeout, drop the PL kind
    /// and strip its index from every border router's prefix bitmap.
    pub fn pl_remove(&mut self, dst: DestId) {
        self.evtimer.del(EventCtx::Dest(dst), EventKind::PfxTimeout);
        self.offl_remove(dst, Mode::PL);
        #[cfg(feature = "multihop-p6c")]
        {
            let bit = 1u32 << dst.0;
            for abr in self.abrs.iter_mut() {
                if abr.pfxs & bit != 0 {
                    tracing::debug!(abr = %abr.addr, "removing prefix from border router");
                    abr.pfxs &= !bit;
                }
            }
        }
    }

    /// Read out a prefix list entry.
    pub fn pl_get(&self, dst: DestId) -> PlEntry {
        let entry = &self.dsts[dst.0];
        PlEntry {
            pfx: entry.pfx,
            pfx_len: entry.pfx_len,
            iface: entry
                .next_hop
                .map_or(0, |node| self.nodes[node].iface),
            valid_until: entry.valid_until,
            pref_until: entry.pref_until,
        }
    }
}
