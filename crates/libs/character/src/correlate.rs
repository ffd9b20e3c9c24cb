//! Matching inbound events to the outcome of a pending action.

use crate::protocol::{EventKind, InboundEvent};

/// How an action ended. Completing with no effect is still `Confirmed`.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Confirmed,
    Rejected(String),
}

pub type Predicate<C> = fn(&mut C, &InboundEvent) -> Option<Verdict>;

/// One row of a correlator's table: a predicate bound to a single event kind.
pub struct Rule<C> {
    pub kind: EventKind,
    pub predicate: Predicate<C>,
}

impl<C> Rule<C> {
    pub const fn new(kind: EventKind, predicate: Predicate<C>) -> Self {
        Self { kind, predicate }
    }
}

/// Per-action context plus the table of rules evaluated against it.
pub struct Correlator<C> {
    context: C,
    rules: Vec<Rule<C>>,
}

impl<C> Correlator<C> {
    pub fn new(context: C, rules: Vec<Rule<C>>) -> Self {
        Self { context, rules }
    }

    /// The event kinds this correlator needs to be subscribed to.
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        for rule in &self.rules {
            if !kinds.contains(&rule.kind) {
                kinds.push(rule.kind);
            }
        }
        kinds
    }

    /// Runs the rules bound to the event's kind. The first verdict wins.
    pub fn observe(&mut self, event: &InboundEvent) -> Option<Verdict> {
        let kind = event.kind();
        for rule in self.rules.iter().filter(|rule| rule.kind == kind) {
            if let Some(verdict) = (rule.predicate)(&mut self.context, event) {
                return Some(verdict);
            }
        }
        None
    }

    pub fn context(&self) -> &C {
        &self.context
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyPhase {
    /// The flag was already set when we dispatched, by something earlier.
    AlreadyBusy,
    /// The flag is clear and we are waiting for our activity to set it.
    Idle,
    /// Our activity set the flag.
    Started,
}

/// Follows a busy flag across state deltas.
///
/// A true-to-false transition only counts once the flag was raised after
/// dispatch; a flag inherited from an earlier activity has to clear and be
/// raised again first. Note that "stopped" cannot be told apart from
/// "interrupted": both look like the flag clearing.
#[derive(Debug, Clone)]
pub struct BusyTracker {
    phase: BusyPhase,
}

impl BusyTracker {
    pub fn new(busy_at_dispatch: bool) -> Self {
        let phase = if busy_at_dispatch {
            BusyPhase::AlreadyBusy
        } else {
            BusyPhase::Idle
        };
        Self { phase }
    }

    pub fn phase(&self) -> BusyPhase {
        self.phase
    }

    /// Feeds the latest flag value. Returns `true` when our activity ended.
    pub fn observe(&mut self, busy: bool) -> bool {
        match (self.phase, busy) {
            (BusyPhase::AlreadyBusy, false) => {
                self.phase = BusyPhase::Idle;
                false
            }
            (BusyPhase::Idle, true) => {
                self.phase = BusyPhase::Started;
                false
            }
            (BusyPhase::Started, false) => true,
            _ => false,
        }
    }
}
