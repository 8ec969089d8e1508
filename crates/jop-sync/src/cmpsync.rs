//! Global lock arbiter (section 4.8).
//!
//! One lock, shared by every core. While held, every core but the owner is
//! halted; the owner is never halted, and round-robin arbitration (scanning
//! cores in reverse priority order from the last winner) decides who
//! acquires the lock when more than one core requests it in the same cycle.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Idle,
    Locked,
}

pub struct CmpSync {
    num_cores: usize,
    state: SyncState,
    owner: Option<usize>,
    rr_index: usize,
}

impl CmpSync {
    #[must_use]
    pub fn new(num_cores: usize) -> Self {
        Self { num_cores, state: SyncState::Idle, owner: None, rr_index: 0 }
    }

    #[must_use]
    pub const fn owner(&self) -> Option<usize> {
        self.owner
    }

    fn arbitrate(&self, req: &[bool]) -> Option<usize> {
        // Cores with index > rr_index have priority over index <= rr_index;
        // within each half, scan in reverse so the highest index wins ties,
        // then the boundary rotates to the winner next time.
        (self.rr_index + 1..self.num_cores)
            .rev()
            .chain((0..=self.rr_index).rev())
            .find(|&i| req[i])
    }

    /// Advance by one cycle. `req[i]` held means core `i` wants (and is
    /// still holding) the lock; `gc_halt[i]` is an independent halt request
    /// (e.g. stop-the-world GC) that also exempts the lock owner.
    /// Returns `(halted, s_out)`: per-core halt state, and core 0's `s_in`
    /// broadcast to every core.
    pub fn tick(&mut self, req: &[bool], gc_halt: &[bool], s_in: &[bool]) -> (Vec<bool>, bool) {
        match self.state {
            SyncState::Idle => {
                if let Some(winner) = self.arbitrate(req) {
                    self.owner = Some(winner);
                    self.rr_index = winner;
                    self.state = SyncState::Locked;
                }
            }
            SyncState::Locked => {
                if let Some(owner) = self.owner {
                    if !req[owner] {
                        self.owner = None;
                        self.state = SyncState::Idle;
                    }
                }
            }
        }

        let halted = (0..self.num_cores)
            .map(|i| {
                if Some(i) == self.owner {
                    false
                } else {
                    matches!(self.state, SyncState::Locked) || gc_halt[i]
                }
            })
            .collect();

        (halted, s_in.first().copied().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_never_halted_others_halted_while_locked() {
        let mut sync = CmpSync::new(4);
        let req = [true, false, false, false];
        let gc = [false; 4];
        let sin = [false; 4];
        let (halted, _) = sync.tick(&req, &gc, &sin);
        assert_eq!(sync.owner(), Some(0));
        assert!(!halted[0]);
        assert!(halted[1..].iter().all(|&h| h));
    }

    #[test]
    fn s_out_broadcasts_core_zero() {
        let mut sync = CmpSync::new(2);
        let req = [false, false];
        let gc = [false, false];
        let sin = [true, false];
        let (_, s_out) = sync.tick(&req, &gc, &sin);
        assert!(s_out);
    }

    #[test]
    fn release_returns_to_idle() {
        let mut sync = CmpSync::new(2);
        let gc = [false, false];
        let sin = [false, false];
        sync.tick(&[true, false], &gc, &sin);
        assert_eq!(sync.owner(), Some(0));
        sync.tick(&[false, false], &gc, &sin);
        assert_eq!(sync.owner(), None);
    }
}
