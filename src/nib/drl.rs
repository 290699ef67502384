//! Default router list
//!
//! Keeps the routers learned from router advertisements and selects the
//! one used for off-link traffic (RFC 4861 section 6.3.6): a reachable
//! selection is sticky; once it turns unreachable the list is rotated
//! deterministically so NUD probes every router in turn.

use super::Nib;
use crate::config::DEFAULT_ROUTER_NUMOF;
use crate::error::{Error, Result};
use crate::types::{DrId, FtEntry, Mode};
use std::net::Ipv6Addr;
use tracing::debug;

/// One default router list slot; free iff `next_hop` is unset.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct DrEntry {
    pub(super) next_hop: Option<usize>,
}

impl Nib {
    /// Add `router_addr` on `iface` to the default router list, reusing
    /// the existing entry if the router is already listed.
    pub fn drl_add(&mut self, router_addr: &Ipv6Addr, iface: u32) -> Result<DrId> {
        debug!(router = %router_addr, iface, "allocating default router list entry");
        let mut free = None;
        for (i, dr) in self.def_routers.iter().enumerate() {
            match dr.next_hop {
                Some(node) => {
                    if self.nodes[node].iface == iface && self.nodes[node].ipv6 == *router_addr {
                        self.nodes[node].mode |= Mode::DRL;
                        return Ok(DrId(i));
                    }
                }
                None => {
                    if free.is_none() {
                        free = Some(i);
                    }
                }
            }
        }
        let slot = free.ok_or(Error::Exhausted)?;
        let node = self.onl_alloc(Some(router_addr), iface).ok_or(Error::Exhausted)?;
        self.override_node(Some(router_addr), iface, node);
        self.nodes[node].mode |= Mode::DRL;
        self.def_routers[slot].next_hop = Some(node);
        Ok(DrId(slot))
    }

    /// Remove a default router. Clears the selection if it pointed at
    /// the removed entry.
    pub fn drl_remove(&mut self, dr: DrId) {
        if let Some(node) = self.def_routers[dr.0].next_hop {
            self.nodes[node].mode.remove(Mode::DRL);
            self.onl_clear(node);
            self.def_routers[dr.0] = DrEntry::default();
        }
        if self.prime_dr == Some(dr.0) {
            self.prime_dr = None;
        }
    }

    fn drl_occupied(&self, slot: usize) -> bool {
        self.def_routers[slot]
            .next_hop
            .map_or(false, |node| !self.nodes[node].mode.is_empty())
    }

    /// Next occupied slot in list order after `after` (from the start
    /// for `None`).
    fn drl_next(&self, after: Option<usize>) -> Option<usize> {
        let start = after.map_or(0, |slot| slot + 1);
        (start..DEFAULT_ROUTER_NUMOF).find(|&slot| self.drl_occupied(slot))
    }

    /// All occupied default router slots in list order.
    pub fn drl_iter(&self) -> impl Iterator<Item = DrId> + '_ {
        (0..DEFAULT_ROUTER_NUMOF)
            .filter(|&slot| self.drl_occupied(slot))
            .map(DrId)
    }

    pub fn drl_get(&self, router_addr: &Ipv6Addr, iface: u32) -> Option<DrId> {
        for (i, dr) in self.def_routers.iter().enumerate() {
            if let Some(node) = dr.next_hop {
                if self.nodes[node].iface == iface && self.nodes[node].ipv6 == *router_addr {
                    debug_assert!(self.nodes[node].mode.contains(Mode::DRL));
                    return Some(DrId(i));
                }
            }
        }
        None
    }

    /// Select the default router.
    ///
    /// A reachable selection is kept. Otherwise the first reachable
    /// router becomes the selection. With no reachable router the
    /// selection advances to the slot after the current one (wrapping to
    /// the first), and that router is returned even though it is
    /// unreachable, so the caller triggers NUD against it. `None` only
    /// with an empty list.
    pub fn drl_get_dr(&mut self) -> Option<DrId> {
        if let Some(prime) = self.prime_dr {
            if let Some(node) = self.def_routers[prime].next_hop {
                if !self.node_unreachable(node) {
                    return Some(DrId(prime));
                }
            }
        }
        let mut ptr = None;
        loop {
            ptr = self.drl_next(ptr);
            let Some(slot) = ptr else {
                let next = self.drl_next(self.prime_dr);
                self.prime_dr = match (self.prime_dr, next) {
                    (Some(_), Some(next)) => Some(next),
                    // First call, or the selection was the last entry:
                    // wrap around.
                    _ => self.drl_next(None),
                };
                return self.prime_dr.map(DrId);
            };
            if let Some(node) = self.def_routers[slot].next_hop {
                if !self.node_unreachable(node) {
                    self.prime_dr = Some(slot);
                    return Some(DrId(slot));
                }
            }
        }
    }

    /// Forwarding entry for a default router: the default route via
    /// that router. `primary` marks the reachable current selection.
    pub fn drl_ft_get(&self, dr: DrId) -> FtEntry {
        let Some(node) = self.def_routers[dr.0].next_hop else {
            debug_assert!(false, "forwarding entry requested for a free default router slot");
            return FtEntry::default();
        };
        let prime_reachable = self.prime_dr.map_or(false, |prime| {
            self.def_routers[prime]
                .next_hop
                .map_or(false, |n| !self.node_unreachable(n))
        });
        FtEntry {
            dst: Ipv6Addr::UNSPECIFIED,
            dst_len: 0,
            next_hop: self.nodes[node].ipv6,
            iface: self.nodes[node].iface,
            primary: self.prime_dr == Some(dr.0) && prime_reachable,
        }
    }
}
