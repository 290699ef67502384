//! Authoritative border routers
//!
//! With 6LoWPAN multihop prefix and context dissemination (RFC 6775
//! section 8.1) every prefix and compression context is owned by the
//! border router that advertised it. Ownership is tracked in bitmaps
//! over the off-link entry pool and the context identifiers, so removing
//! a border router cascades into removing everything it advertised.

use super::Nib;
use crate::config::{ABR_NUMOF, CTX_NUMOF, OFFL_NUMOF};
use crate::error::{Error, Result};
use crate::types::{AbrId, DestId, Mode};
use std::net::Ipv6Addr;
use tracing::debug;

// Bitmaps below index these pools directly.
const _: () = assert!(OFFL_NUMOF <= 32);
const _: () = assert!(CTX_NUMOF <= 16);

/// One border router record; free iff the address is unspecified.
#[derive(Debug, Clone, Copy)]
pub(super) struct AbrEntry {
    pub(super) addr: Ipv6Addr,
    /// Off-link entries advertised by this router, by pool index.
    pub(super) pfxs: u32,
    /// 6LoWPAN compression contexts owned by this router, by context
    /// identifier.
    pub(super) ctxs: u16,
}

impl Default for AbrEntry {
    fn default() -> Self {
        AbrEntry {
            addr: Ipv6Addr::UNSPECIFIED,
            pfxs: 0,
            ctxs: 0,
        }
    }
}

impl Nib {
    /// Add a border router, reusing the existing record for a known
    /// address.
    pub fn abr_add(&mut self, addr: &Ipv6Addr) -> Result<AbrId> {
        debug_assert!(!addr.is_unspecified());
        debug!(addr = %addr, "allocating authoritative border router entry");
        let mut free = None;
        for (i, abr) in self.abrs.iter().enumerate() {
            if abr.addr == *addr {
                return Ok(AbrId(i));
            }
            if free.is_none() && abr.addr.is_unspecified() {
                free = Some(i);
            }
        }
        let slot = free.ok_or(Error::Exhausted)?;
        self.abrs[slot].addr = *addr;
        Ok(AbrId(slot))
    }

    /// Remove a border router and everything it advertised: its prefix
    /// list entries are removed, and the identifiers of the compression
    /// contexts it owned are returned for the caller to release from the
    /// external context store.
    pub fn abr_remove(&mut self, addr: &Ipv6Addr) -> Vec<u8> {
        debug!(addr = %addr, "removing border router");
        let mut released = Vec::new();
        for i in 0..ABR_NUMOF {
            if self.abrs[i].addr != *addr {
                continue;
            }
            for idx in 0..OFFL_NUMOF {
                if self.abrs[i].pfxs & (1u32 << idx) != 0 {
                    self.pl_remove(DestId(idx));
                }
            }
            for cid in 0..CTX_NUMOF {
                if self.abrs[i].ctxs & (1u16 << cid) != 0 {
                    released.push(cid as u8);
                }
            }
            self.abrs[i] = AbrEntry::default();
        }
        released
    }

    /// Record that `abr` advertised the prefix list entry `dst`.
    pub fn abr_add_pfx(&mut self, abr: AbrId, dst: DestId) {
        debug_assert!(self.dsts[dst.0].mode.contains(Mode::PL));
        debug!(
            pfx = %self.dsts[dst.0].pfx,
            pfx_len = self.dsts[dst.0].pfx_len,
            abr = %self.abrs[abr.0].addr,
            "prefix came from border router"
        );
        self.abrs[abr.0].pfxs |= 1u32 << dst.0;
    }

    /// Record that `abr` owns the compression context `cid`.
    pub fn abr_add_ctx(&mut self, abr: AbrId, cid: u8) {
        debug_assert!((cid as usize) < CTX_NUMOF);
        self.abrs[abr.0].ctxs |= 1u16 << cid;
    }

    /// All occupied border router records in pool order.
    pub fn abr_iter(&self) -> impl Iterator<Item = AbrId> + '_ {
        self.abrs
            .iter()
            .enumerate()
            .filter(|(_, abr)| !abr.addr.is_unspecified())
            .map(|(i, _)| AbrId(i))
    }

    /// The prefix list entries advertised by `abr`, in pool order.
    pub fn abr_pfx_iter(&self, abr: AbrId) -> impl Iterator<Item = DestId> + '_ {
        let pfxs = self.abrs[abr.0].pfxs;
        self.dsts
            .iter()
            .enumerate()
            .filter(move |(i, dst)| dst.mode.contains(Mode::PL) && pfxs & (1u32 << i) != 0)
            .map(|(i, _)| DestId(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abr_addr(n: u16) -> Ipv6Addr {
        let mut segments = [0x2001, 0xdb8, 0xffff, 0, 0, 0, 0, 0];
        segments[7] = n;
        Ipv6Addr::from(segments)
    }

    fn prefix(n: u16) -> Ipv6Addr {
        let mut segments = [0x2001, 0xdb8, 0, 0, 0, 0, 0, 0];
        segments[2] = n;
        Ipv6Addr::from(segments)
    }

    #[test]
    fn test_add_and_iter() {
        let mut nib = Nib::new();
        let a = nib.abr_add(&abr_addr(1)).unwrap();
        let again = nib.abr_add(&abr_addr(1)).unwrap();
        assert_eq!(a, again);

        let b = nib.abr_add(&abr_addr(2)).unwrap();
        assert_eq!(nib.abr_iter().collect::<Vec<_>>(), vec![a, b]);
        assert!(nib.abr_add(&abr_addr(3)).is_err());
    }

    #[test]
    fn test_pfx_ownership() {
        let mut nib = Nib::new();
        let abr = nib.abr_add(&abr_addr(1)).unwrap();
        let one = nib.pl_add(1, &prefix(1), 48, u32::MAX, u32::MAX).unwrap();
        let two = nib.pl_add(1, &prefix(2), 48, u32::MAX, u32::MAX).unwrap();
        let other = nib.pl_add(1, &prefix(3), 48, u32::MAX, u32::MAX).unwrap();

        nib.abr_add_pfx(abr, one);
        nib.abr_add_pfx(abr, two);

        assert_eq!(nib.abr_pfx_iter(abr).collect::<Vec<_>>(), vec![one, two]);
        let _ = other;
    }

    #[test]
    fn test_remove_cascades() {
        let mut nib = Nib::new();
        let abr = nib.abr_add(&abr_addr(1)).unwrap();
        let owned = nib.pl_add(1, &prefix(1), 48, u32::MAX, u32::MAX).unwrap();
        let foreign = nib.pl_add(1, &prefix(2), 48, u32::MAX, u32::MAX).unwrap();
        nib.abr_add_pfx(abr, owned);
        nib.abr_add_ctx(abr, 3);
        nib.abr_add_ctx(abr, 11);

        let released = nib.abr_remove(&abr_addr(1));
        assert_eq!(released, vec![3, 11]);
        // Owned prefix is gone, the foreign one survives
        assert_eq!(nib.offl_iter().collect::<Vec<_>>(), vec![foreign]);
        assert_eq!(nib.abr_iter().count(), 0);
    }

    #[test]
    fn test_pl_remove_strips_bitmap() {
        let mut nib = Nib::new();
        let abr = nib.abr_add(&abr_addr(1)).unwrap();
        let dst = nib.pl_add(1, &prefix(1), 48, u32::MAX, u32::MAX).unwrap();
        nib.abr_add_pfx(abr, dst);

        nib.pl_remove(dst);
        assert_eq!(nib.abr_pfx_iter(abr).count(), 0);
        assert_eq!(nib.abrs[0].pfxs, 0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut nib = Nib::new();
        nib.abr_add(&abr_addr(1)).unwrap();
        assert!(nib.abr_remove(&abr_addr(9)).is_empty());
        assert_eq!(nib.abr_iter().count(), 1);
    }
}
