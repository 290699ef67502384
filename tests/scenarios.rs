//! End-to-end route selection and eviction scenarios.

use nib6::config::NIB_NUMOF;
use nib6::evtimer::{EventCtx, EventKind};
use nib6::{Error, Nib, NudState};
use std::net::Ipv6Addr;

fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn neighbor(n: u16) -> Ipv6Addr {
    let mut segments = [0xfe80, 0, 0, 0, 0, 0, 0, 0];
    segments[7] = n;
    Ipv6Addr::from(segments)
}

#[test]
fn empty_nib_has_no_route() {
    let mut nib = Nib::new();
    let result = nib.get_route(&addr("2001:db8::1"), None);
    assert!(matches!(result, Err(Error::NetUnreachable)));
}

#[test]
fn default_router_fallback() {
    let mut nib = Nib::new();
    nib.drl_add(&addr("fe80::1"), 1).unwrap();

    let fte = nib.get_route(&addr("2001:db8::1"), None).unwrap();
    assert_eq!(fte.dst, Ipv6Addr::UNSPECIFIED);
    assert_eq!(fte.dst_len, 0);
    assert_eq!(fte.next_hop, addr("fe80::1"));
    assert_eq!(fte.iface, 1);
    assert!(fte.primary);
}

#[test]
fn longest_prefix_wins_over_default_router() {
    let mut nib = Nib::new();
    nib.drl_add(&addr("fe80::1"), 1).unwrap();
    nib.ft_add(&addr("fe80::2"), 1, &addr("2001:db8::"), 32)
        .unwrap();

    let fte = nib.get_route(&addr("2001:db8::5"), None).unwrap();
    assert_eq!(fte.dst, addr("2001:db8::"));
    assert_eq!(fte.dst_len, 32);
    assert_eq!(fte.next_hop, addr("fe80::2"));
    assert_eq!(fte.iface, 1);
    assert!(!fte.primary);
}

#[test]
fn prefix_list_only_match_yields_to_default_router() {
    let mut nib = Nib::new();
    nib.drl_add(&addr("fe80::1"), 1).unwrap();
    nib.pl_add(1, &addr("2001:db8::"), 32, u32::MAX, u32::MAX)
        .unwrap();

    let fte = nib.get_route(&addr("2001:db8::5"), None).unwrap();
    // The router wins over the prefix list entry
    assert_eq!(fte.dst_len, 0);
    assert_eq!(fte.next_hop, addr("fe80::1"));
    assert!(fte.primary);
}

#[test]
fn prefix_list_only_match_without_router_is_on_link() {
    let mut nib = Nib::new();
    nib.pl_add(1, &addr("2001:db8::"), 32, u32::MAX, u32::MAX)
        .unwrap();

    let fte = nib.get_route(&addr("2001:db8::5"), None).unwrap();
    assert_eq!(fte.dst, addr("2001:db8::"));
    assert_eq!(fte.dst_len, 32);
    // On-link: no next hop
    assert!(fte.next_hop.is_unspecified());
    assert_eq!(fte.iface, 1);
}

#[cfg(feature = "queue-pkt")]
#[test]
fn eviction_under_pressure_preserves_fifo_order() {
    use nib6::{DropReason, PktRef};

    nib6::telemetry::init_logging(None);
    let mut nib = Nib::new();
    let first = nib.nc_add(&neighbor(1), 1, NudState::Stale).unwrap();
    nib.nc_queue_pkt(first, PktRef(42));
    for i in 1..NIB_NUMOF {
        nib.nc_add(&neighbor(i as u16 + 1), 1, NudState::Stale)
            .unwrap();
    }

    // Pool is full; the next insert evicts the oldest collectible entry
    let node = nib
        .nc_add(&neighbor(NIB_NUMOF as u16 + 1), 1, NudState::Stale)
        .unwrap();
    assert_eq!(nib.onl_get(&neighbor(1), 1), None);
    assert_eq!(nib.nc_get(node).ipv6, neighbor(NIB_NUMOF as u16 + 1));
    assert_eq!(nib.nc_get(node).nud_state(), NudState::Stale);
    assert_eq!(
        nib.take_dropped(),
        vec![(PktRef(42), DropReason::HostUnreachable)]
    );

    // Survivors kept their order: further evictions walk the remaining
    // entries oldest first.
    for i in 0..3 {
        nib.nc_add(&neighbor(NIB_NUMOF as u16 + 2 + i), 1, NudState::Stale)
            .unwrap();
        assert_eq!(nib.onl_get(&neighbor(2 + i), 1), None);
        assert!(nib.onl_get(&neighbor(3 + i), 1).is_some());
    }
}

#[test]
fn router_rotation_without_reachable_router() {
    let mut nib = Nib::new();
    let node_a = nib.nc_add(&neighbor(1), 1, NudState::Unreachable).unwrap();
    let node_b = nib.nc_add(&neighbor(2), 1, NudState::Unreachable).unwrap();
    let _ = (node_a, node_b);
    let a = nib.drl_add(&neighbor(1), 1).unwrap();
    let b = nib.drl_add(&neighbor(2), 1).unwrap();

    assert_eq!(nib.drl_get_dr(), Some(a));
    assert_eq!(nib.drl_get_dr(), Some(b));
    assert_eq!(nib.drl_get_dr(), Some(a));
    assert_eq!(nib.drl_get_dr(), Some(b));

    // Routing still resolves through the rotated router, but never as
    // primary.
    let fte = nib.get_route(&addr("2001:db8::1"), None).unwrap();
    assert_eq!(fte.next_hop, neighbor(1));
    assert!(!fte.primary);
}

#[test]
fn neighbor_readd_after_remove_is_fresh() {
    let mut nib = Nib::new();
    let node = nib.nc_add(&neighbor(1), 1, NudState::Incomplete).unwrap();
    nib.nc_set_nud_state(node, NudState::Reachable);
    nib.nc_set_router(node, true);
    nib.nc_remove(node);

    let node = nib.nc_add(&neighbor(1), 1, NudState::Incomplete).unwrap();
    let nce = nib.nc_get(node);
    assert_eq!(nce.nud_state(), NudState::Incomplete);
    assert!(!nce.is_router());
}

#[test]
fn prefix_lifetime_deadlines() {
    let mut nib = Nib::new();
    nib.advance(10_000);
    let dst = nib
        .pl_add(1, &addr("2001:db8::"), 64, 120_000, 60_000)
        .unwrap();

    let ple = nib.pl_get(dst);
    assert!(ple.valid_until >= ple.pref_until);
    assert_eq!(ple.valid_until, 130_000);
    assert_eq!(ple.pref_until, 70_000);

    // Infinite lifetimes survive unchanged
    let forever = nib
        .pl_add(1, &addr("2001:db8:1::"), 64, u32::MAX, u32::MAX)
        .unwrap();
    let ple = nib.pl_get(forever);
    assert_eq!(ple.valid_until, u32::MAX);
    assert_eq!(ple.pref_until, u32::MAX);
}

#[test]
fn prefix_timeout_fires_through_advance() {
    let mut nib = Nib::new();
    let dst = nib
        .pl_add(1, &addr("2001:db8::"), 64, 120_000, 60_000)
        .unwrap();

    assert!(nib.advance(59_999).is_empty());
    let due = nib.advance(1);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].kind, EventKind::PfxTimeout);
    assert_eq!(due[0].ctx, EventCtx::Dest(dst));

    // The protocol engine reacts by removing the entry
    nib.pl_remove(dst);
    assert_eq!(nib.offl_iter().count(), 0);
}

#[test]
fn neighbor_removal_cancels_pending_events() {
    let mut nib = Nib::new();
    let node = nib.nc_add(&neighbor(1), 1, NudState::Stale).unwrap();
    nib.timer_add(EventCtx::Node(node), EventKind::SendNa, 500);
    assert_eq!(
        nib.timer_lookup(Some(EventCtx::Node(node)), EventKind::SendNa),
        Some(500)
    );

    nib.nc_remove(node);
    assert_eq!(
        nib.timer_lookup(Some(EventCtx::Node(node)), EventKind::SendNa),
        None
    );
    // Nothing fires against the freed slot
    assert!(nib.advance(1_000).is_empty());
}

#[cfg(feature = "multihop-p6c")]
#[test]
fn border_router_removal_cascades() {
    let mut nib = Nib::new();
    let abr = nib.abr_add(&addr("2001:db8:ffff::1")).unwrap();
    let dst = nib
        .pl_add(1, &addr("2001:db8::"), 64, u32::MAX, u32::MAX)
        .unwrap();
    nib.abr_add_pfx(abr, dst);
    nib.abr_add_ctx(abr, 5);

    let released = nib.abr_remove(&addr("2001:db8:ffff::1"));
    assert_eq!(released, vec![5]);
    assert_eq!(nib.offl_iter().count(), 0);
    assert_eq!(nib.abr_iter().count(), 0);
    // Route lookup now fails
    assert!(nib.get_route(&addr("2001:db8::1"), None).is_err());
}
