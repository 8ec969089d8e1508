//! Per-object lock unit (section 4.9).
//!
//! A content-addressable table of up to [`MAX_SLOTS`] locked object handles.
//! Each slot tracks its owning core, a bounded reentrant count, and a FIFO
//! of cores waiting for it. Requests are processed one at a time through a
//! four-phase pipeline (`Idle -> RamRead -> RamDelay -> Execute`), so at
//! most one request completes every four cycles. A core whose request finds
//! a different owner is enqueued and reported as stalled rather than
//! retried; GC-halt exempts whichever core currently owns a slot (callers
//! combine [`Ihlu::is_owner`] with their own halt computation).

use std::collections::VecDeque;

pub const MAX_SLOTS: usize = 64;
/// Reentrant lock counter never exceeds this before saturating (defensive
/// bound, not expected to be hit in practice).
pub const MAX_REENTRANT_COUNT: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RamRead,
    RamDelay,
    Execute,
}

struct Slot {
    key: u32,
    owner: usize,
    count: u32,
    queue: VecDeque<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IhluEvent {
    Acquired { core: usize, key: u32 },
    Queued { core: usize, key: u32 },
    TableFull { core: usize },
    Released { core: usize, key: u32 },
    OwnershipTransferred { key: u32, from: usize, to: usize },
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    core: usize,
    key: u32,
    is_lock: bool,
}

pub struct Ihlu {
    slots: Vec<Option<Slot>>,
    phase: Phase,
    pending: Option<PendingRequest>,
    stalled: Vec<bool>,
    table_full: Vec<bool>,
}

impl Ihlu {
    #[must_use]
    pub fn new(num_cores: usize) -> Self {
        Self {
            slots: (0..MAX_SLOTS).map(|_| None).collect(),
            phase: Phase::Idle,
            pending: None,
            stalled: vec![false; num_cores],
            table_full: vec![false; num_cores],
        }
    }

    #[must_use]
    pub fn is_stalled(&self, core: usize) -> bool {
        self.stalled[core]
    }

    #[must_use]
    pub fn table_full_status(&self, core: usize) -> bool {
        self.table_full[core]
    }

    #[must_use]
    pub fn is_owner(&self, core: usize, key: u32) -> bool {
        self.slots.iter().flatten().any(|s| s.key == key && s.owner == core)
    }

    fn find_slot(&self, key: u32) -> Option<usize> {
        self.slots.iter().position(|s| s.as_ref().is_some_and(|s| s.key == key))
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Accepted only while the pipeline is `Idle`; a busy `Ihlu` must be
    /// retried by the caller next cycle.
    pub fn submit(&mut self, core: usize, key: u32, is_lock: bool) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(PendingRequest { core, key, is_lock });
        self.phase = Phase::RamRead;
        true
    }

    /// Advance the pipeline by one cycle. Produces an event only in the
    /// cycle the request completes (`Execute`).
    pub fn tick(&mut self) -> Option<IhluEvent> {
        match self.phase {
            Phase::Idle => None,
            Phase::RamRead => {
                self.phase = Phase::RamDelay;
                None
            }
            Phase::RamDelay => {
                self.phase = Phase::Execute;
                None
            }
            Phase::Execute => {
                let req = self.pending.take()?;
                self.phase = Phase::Idle;
                Some(if req.is_lock { self.execute_lock(req) } else { self.execute_unlock(req) })
            }
        }
    }

    fn execute_lock(&mut self, req: PendingRequest) -> IhluEvent {
        if let Some(idx) = self.find_slot(req.key) {
            let slot = self.slots[idx].as_mut().expect("slot present");
            if slot.owner == req.core {
                slot.count = (slot.count + 1).min(MAX_REENTRANT_COUNT);
                IhluEvent::Acquired { core: req.core, key: req.key }
            } else {
                slot.queue.push_back(req.core);
                self.stalled[req.core] = true;
                IhluEvent::Queued { core: req.core, key: req.key }
            }
        } else if let Some(idx) = self.free_slot() {
            self.slots[idx] =
                Some(Slot { key: req.key, owner: req.core, count: 0, queue: VecDeque::new() });
            IhluEvent::Acquired { core: req.core, key: req.key }
        } else {
            self.table_full[req.core] = true;
            IhluEvent::TableFull { core: req.core }
        }
    }

    fn execute_unlock(&mut self, req: PendingRequest) -> IhluEvent {
        let Some(idx) = self.find_slot(req.key) else {
            return IhluEvent::Released { core: req.core, key: req.key };
        };
        let slot = self.slots[idx].as_mut().expect("slot present");
        if slot.count > 0 {
            slot.count -= 1;
            return IhluEvent::Released { core: req.core, key: req.key };
        }
        if let Some(next) = slot.queue.pop_front() {
            let prev_owner = slot.owner;
            slot.owner = next;
            self.stalled[next] = false;
            IhluEvent::OwnershipTransferred { key: req.key, from: prev_owner, to: next }
        } else {
            self.slots[idx] = None;
            IhluEvent::Released { core: req.core, key: req.key }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_completion(ihlu: &mut Ihlu) -> IhluEvent {
        loop {
            if let Some(ev) = ihlu.tick() {
                return ev;
            }
        }
    }

    #[test]
    fn reentrant_lock_then_unlock_never_self_halts() {
        let mut ihlu = Ihlu::new(2);
        ihlu.submit(0, 0x42, true);
        let ev = run_to_completion(&mut ihlu);
        assert!(matches!(ev, IhluEvent::Acquired { core: 0, key: 0x42 }));
        assert!(!ihlu.is_stalled(0));

        ihlu.submit(0, 0x42, true);
        let ev = run_to_completion(&mut ihlu);
        assert!(matches!(ev, IhluEvent::Acquired { core: 0, key: 0x42 }));
        assert!(!ihlu.is_stalled(0));

        ihlu.submit(0, 0x42, false);
        run_to_completion(&mut ihlu);
        ihlu.submit(0, 0x42, false);
        let ev = run_to_completion(&mut ihlu);
        assert!(matches!(ev, IhluEvent::Released { .. }));
    }

    #[test]
    fn different_core_queues_instead_of_stealing() {
        let mut ihlu = Ihlu::new(2);
        ihlu.submit(0, 0x7, true);
        run_to_completion(&mut ihlu);
        ihlu.submit(1, 0x7, true);
        let ev = run_to_completion(&mut ihlu);
        assert!(matches!(ev, IhluEvent::Queued { core: 1, .. }));
        assert!(ihlu.is_stalled(1));
    }

    #[test]
    fn unlock_transfers_ownership_to_queued_waiter() {
        let mut ihlu = Ihlu::new(2);
        ihlu.submit(0, 0x7, true);
        run_to_completion(&mut ihlu);
        ihlu.submit(1, 0x7, true);
        run_to_completion(&mut ihlu);
        ihlu.submit(0, 0x7, false);
        let ev = run_to_completion(&mut ihlu);
        assert!(matches!(ev, IhluEvent::OwnershipTransferred { from: 0, to: 1, .. }));
        assert!(!ihlu.is_stalled(1));
        assert!(ihlu.is_owner(1, 0x7));
    }
}
