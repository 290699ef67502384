//! Event timer binding
//!
//! A delta-encoded list of deferred NIB events, keyed by `(kind, ctx)`.
//! Each entry stores its offset relative to the previous entry, so the
//! absolute offset of an event is the sum of all deltas up to and
//! including it. At most one event exists per `(kind, ctx)` pair; adding
//! again reschedules.
//!
//! The NIB never sleeps: time only moves when the embedding stack calls
//! [`crate::nib::Nib::advance`], which drains due events and returns them
//! to the caller for delivery to the protocol engine.

use crate::config::{NETIF_NUMOF, NIB_NUMOF, OFFL_NUMOF};
use crate::types::{DestId, NodeId};
use tracing::trace;

/// What a scheduled event means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Send a deferred neighbor advertisement.
    SendNa,
    /// The reachable time of a neighbor cache entry ran out.
    ReachTimeout,
    /// An address registration expired.
    AddrRegTimeout,
    /// The preferred lifetime of a prefix list entry ran out.
    PfxTimeout,
    /// Recalculate the randomized reachable time of an interface.
    RecalcReachTime,
}

/// The record a scheduled event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCtx {
    Node(NodeId),
    Dest(DestId),
    Iface(u32),
}

/// A due event handed back to the caller by `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NibEvent {
    pub kind: EventKind,
    pub ctx: EventCtx,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Milliseconds after the previous entry (or after "now" for the
    /// head).
    delta: u32,
    event: NibEvent,
}

/// Upper bound on simultaneously scheduled events: three handles per
/// node, one per off-link entry, one per interface.
const EVENT_CAPACITY: usize = 3 * NIB_NUMOF + OFFL_NUMOF + NETIF_NUMOF;

#[derive(Debug)]
pub struct EvTimer {
    events: Vec<Entry>,
}

impl EvTimer {
    pub fn new() -> Self {
        EvTimer {
            events: Vec::with_capacity(EVENT_CAPACITY),
        }
    }

    /// Schedule `kind` for `ctx` after `offset_ms`. A previously
    /// scheduled event for the same `(kind, ctx)` is cancelled first.
    pub fn add(&mut self, ctx: EventCtx, kind: EventKind, offset_ms: u32) {
        self.del(ctx, kind);
        trace!(?ctx, ?kind, offset_ms, "scheduling event");
        let mut remaining = offset_ms;
        let mut pos = 0;
        while pos < self.events.len() && self.events[pos].delta <= remaining {
            remaining -= self.events[pos].delta;
            pos += 1;
        }
        if pos < self.events.len() {
            self.events[pos].delta -= remaining;
        }
        self.events.insert(
            pos,
            Entry {
                delta: remaining,
                event: NibEvent { kind, ctx },
            },
        );
    }

    /// Cancel the event for `(kind, ctx)`. Returns whether one was
    /// scheduled.
    pub fn del(&mut self, ctx: EventCtx, kind: EventKind) -> bool {
        let Some(pos) = self
            .events
            .iter()
            .position(|e| e.event.kind == kind && e.event.ctx == ctx)
        else {
            return false;
        };
        let removed = self.events.remove(pos);
        if pos < self.events.len() {
            self.events[pos].delta += removed.delta;
        }
        true
    }

    /// Absolute offset in milliseconds until the event for `(kind, ctx)`
    /// fires. `ctx = None` matches the first event of the given kind.
    pub fn lookup(&self, ctx: Option<EventCtx>, kind: EventKind) -> Option<u32> {
        let mut offset = 0u32;
        for entry in &self.events {
            offset = offset.saturating_add(entry.delta);
            if entry.event.kind == kind && ctx.map_or(true, |c| entry.event.ctx == c) {
                return Some(offset);
            }
        }
        None
    }

    /// Let `ms` milliseconds pass; events whose offset elapsed are
    /// removed and returned in firing order.
    pub fn advance(&mut self, ms: u32) -> Vec<NibEvent> {
        let mut due = Vec::new();
        let mut remaining = ms;
        while !self.events.is_empty() {
            if self.events[0].delta <= remaining {
                remaining -= self.events[0].delta;
                due.push(self.events.remove(0).event);
            } else {
                self.events[0].delta -= remaining;
                break;
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EvTimer {
    fn default() -> Self {
        Self::new()
    }
}
