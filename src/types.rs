//! Common NIB types
//!
//! Shared between all tables: the mode word that records which logical
//! tables reference an entry, the packed neighbor info word (RFC 4861
//! NUD state, router flag, RFC 6775 address registration state), and the
//! record types handed out to the forwarding path.

use bitflags::bitflags;
use std::net::Ipv6Addr;

bitflags! {
    /// Which logical tables reference a record.
    ///
    /// An entry with no bits set is free storage; clearing the last bit
    /// releases the slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mode: u8 {
        /// Neighbor cache entry.
        const NC = 0x01;
        /// Referenced by the default router list.
        const DRL = 0x02;
        /// Prefix list entry.
        const PL = 0x04;
        /// Forwarding table entry.
        const FT = 0x08;
        /// Next hop of at least one off-link entry.
        const DST = 0x10;
        /// Route installed by RPL.
        const RPL = 0x20;
    }
}

/// Handle to an on-link node in the node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub(crate) usize);

/// Handle to a default router list slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrId(pub(crate) usize);

/// Handle to an off-link entry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestId(pub(crate) usize);

/// Handle to an authoritative border router slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbrId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl DestId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Mask of the NUD state bits in the info word.
pub const NUD_STATE_MASK: u16 = 0x0007;
/// The neighbor advertised itself as a router.
pub const IS_ROUTER: u16 = 0x0008;
/// Mask of the address registration state bits in the info word.
pub const AR_STATE_MASK: u16 = 0x0030;

/// Neighbor unreachability detection state (RFC 4861 section 7.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NudState {
    /// Reachability is not managed for this entry.
    Unmanaged = 0x0000,
    /// Probing gave up, the neighbor is considered unreachable.
    Unreachable = 0x0001,
    /// Address resolution in progress, waiting for NA.
    Incomplete = 0x0002,
    /// Reachability is unknown, will probe on next use.
    Stale = 0x0003,
    /// Waiting before probing.
    Delay = 0x0004,
    /// Actively probing the neighbor.
    Probe = 0x0005,
    /// Recently confirmed reachability.
    Reachable = 0x0006,
}

impl NudState {
    pub fn from_info(info: u16) -> NudState {
        match info & NUD_STATE_MASK {
            0x0001 => NudState::Unreachable,
            0x0002 => NudState::Incomplete,
            0x0003 => NudState::Stale,
            0x0004 => NudState::Delay,
            0x0005 => NudState::Probe,
            0x0006 => NudState::Reachable,
            _ => NudState::Unmanaged,
        }
    }
}

/// Address registration state (RFC 6775).
///
/// `Gc` entries are the only ones the neighbor cache may evict under
/// memory pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ArState {
    /// Garbage-collectible, not registered by the neighbor.
    Gc = 0x0000,
    /// Registration is in progress.
    Tentative = 0x0010,
    /// Registered by the neighbor.
    Registered = 0x0020,
    /// Installed manually, never removed automatically.
    Manual = 0x0030,
}

impl ArState {
    pub fn from_info(info: u16) -> ArState {
        match info & AR_STATE_MASK {
            0x0010 => ArState::Tentative,
            0x0020 => ArState::Registered,
            0x0030 => ArState::Manual,
            _ => ArState::Gc,
        }
    }
}

/// Maximum link-layer address length carried in a neighbor cache record.
pub const L2ADDR_MAX_LEN: usize = 8;

/// Neighbor cache record as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NcEntry {
    pub ipv6: Ipv6Addr,
    pub info: u16,
    pub l2addr: [u8; L2ADDR_MAX_LEN],
    pub l2addr_len: u8,
}

impl NcEntry {
    pub fn nud_state(&self) -> NudState {
        NudState::from_info(self.info)
    }

    pub fn ar_state(&self) -> ArState {
        ArState::from_info(self.info)
    }

    pub fn is_router(&self) -> bool {
        self.info & IS_ROUTER != 0
    }

    /// The link-layer address, truncated to its actual length.
    pub fn link_layer(&self) -> &[u8] {
        &self.l2addr[..self.l2addr_len as usize]
    }
}

/// Forwarding table record produced by route lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtEntry {
    /// Destination prefix; unspecified with `dst_len == 0` for the
    /// default route.
    pub dst: Ipv6Addr,
    pub dst_len: u8,
    /// Next hop address; unspecified for on-link (prefix list only)
    /// destinations.
    pub next_hop: Ipv6Addr,
    pub iface: u32,
    /// True iff this is the currently selected, reachable default router.
    pub primary: bool,
}

impl Default for FtEntry {
    fn default() -> Self {
        FtEntry {
            dst: Ipv6Addr::UNSPECIFIED,
            dst_len: 0,
            next_hop: Ipv6Addr::UNSPECIFIED,
            iface: 0,
            primary: false,
        }
    }
}

/// Prefix list record as seen by callers.
///
/// Lifetimes are absolute millisecond deadlines; `u32::MAX` means
/// infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlEntry {
    pub pfx: Ipv6Addr,
    pub pfx_len: u8,
    pub iface: u32,
    pub valid_until: u32,
    pub pref_until: u32,
}

/// Opaque reference to a packet owned by the external packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PktRef(pub u32);

/// Why a queued packet was handed back to the packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The neighbor the packet was queued for became unreachable.
    HostUnreachable,
}

/// Number of leading bits in which `a` and `b` agree.
pub fn match_prefix_bits(a: &Ipv6Addr, b: &Ipv6Addr) -> u8 {
    let a = a.octets();
    let b = b.octets();
    let mut bits = 0u8;
    for i in 0..16 {
        let diff = a[i] ^ b[i];
        if diff == 0 {
            bits += 8;
        } else {
            bits += diff.leading_zeros() as u8;
            break;
        }
    }
    bits
}

/// Copy the first `pfx_len` bits of `pfx`, zeroing the host part.
pub fn truncate_prefix(pfx: &Ipv6Addr, pfx_len: u8) -> Ipv6Addr {
    debug_assert!(pfx_len <= 128);
    let mut octets = pfx.octets();
    let full = (pfx_len / 8) as usize;
    if full < 16 {
        let rem = pfx_len % 8;
        octets[full] &= if rem == 0 { 0 } else { !0u8 << (8 - rem) };
        for byte in octets[full + 1..].iter_mut() {
            *byte = 0;
        }
    }
    Ipv6Addr::from(octets)
}

pub fn is_link_local(addr: &Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}

/// Derive a link-layer address from a modified-EUI-64 interface
/// identifier: the low 64 bits of the address with the universal/local
/// bit flipped back.
pub fn iid_l2addr(addr: &Ipv6Addr) -> [u8; 8] {
    let octets = addr.octets();
    let mut l2addr = [0u8; 8];
    l2addr.copy_from_slice(&octets[8..]);
    l2addr[0] ^= 0x02;
    l2addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_prefix_bits() {
        let a: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let b: Ipv6Addr = "2001:db8::2".parse().unwrap();
        assert_eq!(match_prefix_bits(&a, &a), 128);
        assert_eq!(match_prefix_bits(&a, &b), 126);

        let c: Ipv6Addr = "2001:db9::1".parse().unwrap();
        assert_eq!(match_prefix_bits(&a, &c), 31);

        let d: Ipv6Addr = "fe80::1".parse().unwrap();
        assert_eq!(match_prefix_bits(&a, &d), 0);
    }

    #[test]
    fn test_truncate_prefix() {
        let pfx: Ipv6Addr = "2001:db8:abcd:ef01::1".parse().unwrap();
        assert_eq!(
            truncate_prefix(&pfx, 32),
            "2001:db8::".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(
            truncate_prefix(&pfx, 48),
            "2001:db8:abcd::".parse::<Ipv6Addr>().unwrap()
        );
        // Partial byte: keep the upper 4 bits of the 5th byte
        assert_eq!(
            truncate_prefix(&pfx, 36),
            "2001:db8:a000::".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(truncate_prefix(&pfx, 128), pfx);
        assert_eq!(truncate_prefix(&pfx, 0), Ipv6Addr::UNSPECIFIED);
    }

    #[test]
    fn test_is_link_local() {
        assert!(is_link_local(&"fe80::1".parse().unwrap()));
        assert!(is_link_local(&"fe80::abcd:1234".parse().unwrap()));
        assert!(!is_link_local(&"2001:db8::1".parse().unwrap()));
        assert!(!is_link_local(&Ipv6Addr::UNSPECIFIED));
    }

    #[test]
    fn test_iid_l2addr() {
        let addr: Ipv6Addr = "fe80::0211:22ff:fe33:4455".parse().unwrap();
        assert_eq!(
            iid_l2addr(&addr),
            [0x00, 0x11, 0x22, 0xff, 0xfe, 0x33, 0x44, 0x55]
        );
    }

    #[test]
    fn test_nud_state_roundtrip() {
        for state in [
            NudState::Unmanaged,
            NudState::Unreachable,
            NudState::Incomplete,
            NudState::Stale,
            NudState::Delay,
            NudState::Probe,
            NudState::Reachable,
        ] {
            assert_eq!(NudState::from_info(state as u16), state);
        }
    }

    #[test]
    fn test_ar_state_roundtrip() {
        for state in [
            ArState::Gc,
            ArState::Tentative,
            ArState::Registered,
            ArState::Manual,
        ] {
            assert_eq!(ArState::from_info(state as u16), state);
        }
    }

    #[test]
    fn test_info_packing() {
        let info = NudState::Stale as u16 | ArState::Registered as u16 | IS_ROUTER;
        let nce = NcEntry {
            ipv6: Ipv6Addr::UNSPECIFIED,
            info,
            l2addr: [0; L2ADDR_MAX_LEN],
            l2addr_len: 0,
        };
        assert_eq!(nce.nud_state(), NudState::Stale);
        assert_eq!(nce.ar_state(), ArState::Registered);
        assert!(nce.is_router());
    }
}
