//! Stack stage cache mode: three rotating banks over the stack RAM plus the
//! rotation controller that spills/fills them (section 4.5 cache mode).
//!
//! Each resident bank covers a disjoint, contiguous `BANK_SIZE`-word window
//! of the virtual stack address space (section 3); `active` names the bank
//! holding the current top of stack. A non-resident bank holds no meaningful
//! window at all and is free to be repurposed without spilling anything.
//!
//! When SP crosses out of the active bank's window, the rotation controller
//! first checks whether one of the other two banks is already resident and
//! covers the needed window: if so it switches `active` to that bank
//! instantly, with no `rotationBusy` and no DMA (section 4.5). Otherwise it
//! must rotate: the victim bank (the one two slots behind, i.e. the bank
//! least recently relevant to the current window) is repurposed for the new
//! window. Overflow repurposes it above (its new content is virgin stack
//! space, so it is zero-filled rather than read back); underflow repurposes
//! it below (its new content is real data that must be read back via DMA). A
//! dirty victim is spilled to memory first so its old content is not lost.

use crate::bus::MemBus;
use crate::stack_cache_dma::StackCacheDma;
use sys_core::CoreError;

pub const BANK_SIZE: u32 = 192;
pub const SCRATCH_SIZE: u32 = 64;
pub const NUM_BANKS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RotKind {
    Overflow,
    Underflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RotState {
    Idle,
    Spilling,
    ZeroFilling,
    Filling,
}

pub struct StackCache {
    pub scratch: Vec<i32>,
    pub banks: [Vec<i32>; NUM_BANKS],
    pub bank_base: [u32; NUM_BANKS],
    pub bank_dirty: [bool; NUM_BANKS],
    pub bank_resident: [bool; NUM_BANKS],
    pub active: usize,
    dma: StackCacheDma,
    rot_state: RotState,
    rot_kind: RotKind,
    victim: usize,
    new_base: u32,
}

impl StackCache {
    #[must_use]
    pub fn new() -> Self {
        let mut bank_resident = [false; NUM_BANKS];
        bank_resident[0] = true;
        Self {
            scratch: vec![0; SCRATCH_SIZE as usize],
            banks: [
                vec![0; BANK_SIZE as usize],
                vec![0; BANK_SIZE as usize],
                vec![0; BANK_SIZE as usize],
            ],
            bank_base: [0, BANK_SIZE, 2 * BANK_SIZE],
            bank_dirty: [false; NUM_BANKS],
            bank_resident,
            active: 0,
            dma: StackCacheDma::new(),
            rot_state: RotState::Idle,
            rot_kind: RotKind::Overflow,
            victim: 0,
            new_base: 0,
        }
    }

    #[must_use]
    pub const fn rotation_busy(&self) -> bool {
        !matches!(self.rot_state, RotState::Idle)
    }

    fn bank_for(&self, addr: u32) -> Option<usize> {
        // Read priority: scratch handled by caller; bank0 > bank1 > bank2.
        // Only resident banks cover a meaningful window (section 3).
        (0..NUM_BANKS).find(|&i| {
            self.bank_resident[i] && addr >= self.bank_base[i] && addr < self.bank_base[i] + BANK_SIZE
        })
    }

    /// A resident, non-active bank already covering `sp`, if one exists.
    fn instant_switch_target(&self, sp: u32) -> Option<usize> {
        (0..NUM_BANKS).find(|&i| {
            i != self.active
                && self.bank_resident[i]
                && sp >= self.bank_base[i]
                && sp < self.bank_base[i] + BANK_SIZE
        })
    }

    #[must_use]
    pub fn read(&self, addr: u32) -> i32 {
        if addr < SCRATCH_SIZE {
            return self.scratch[addr as usize];
        }
        match self.bank_for(addr) {
            Some(bank) => self.banks[bank][(addr - self.bank_base[bank]) as usize],
            None => 0,
        }
    }

    pub fn write(&mut self, addr: u32, value: i32) {
        if addr < SCRATCH_SIZE {
            self.scratch[addr as usize] = value;
            return;
        }
        if let Some(bank) = self.bank_for(addr) {
            self.banks[bank][(addr - self.bank_base[bank]) as usize] = value;
            self.bank_dirty[bank] = true;
        }
    }

    fn start_rotation(&mut self, overflow: bool) -> Result<(), CoreError> {
        if self.rotation_busy() {
            return Err(CoreError::Busy("stack cache rotation"));
        }
        let victim = (self.active + 2) % NUM_BANKS;
        let new_base = if overflow {
            self.bank_base[self.active] + BANK_SIZE
        } else {
            self.bank_base[self.active].wrapping_sub(BANK_SIZE)
        };

        self.victim = victim;
        self.new_base = new_base;
        self.rot_kind = if overflow { RotKind::Overflow } else { RotKind::Underflow };

        if self.bank_dirty[victim] {
            self.dma.start(true, self.bank_base[victim] * 4, BANK_SIZE, victim)?;
            self.rot_state = RotState::Spilling;
        } else if overflow {
            self.rot_state = RotState::ZeroFilling;
        } else {
            self.dma.start(false, new_base * 4, BANK_SIZE, victim)?;
            self.rot_state = RotState::Filling;
        }
        Ok(())
    }

    /// Checks whether `sp` has moved out of the active bank's window and, if
    /// so, either instant-switches to an already-resident covering bank or
    /// (if idle) kicks off the appropriate rotation.
    pub fn maybe_rotate(&mut self, sp: u32) -> Result<(), CoreError> {
        let base = self.bank_base[self.active];
        if sp >= base && sp < base + BANK_SIZE {
            return Ok(());
        }
        if self.rotation_busy() {
            return Ok(());
        }
        if let Some(target) = self.instant_switch_target(sp) {
            self.active = target;
            return Ok(());
        }
        if sp >= base + BANK_SIZE {
            self.start_rotation(true)
        } else {
            self.start_rotation(false)
        }
    }

    /// Advance the rotation controller (and its DMA, if spilling/filling) by
    /// one cycle.
    pub fn tick(&mut self, bus: &mut dyn MemBus) {
        match self.rot_state {
            RotState::Idle => {}
            RotState::Spilling => {
                if self.dma.tick(bus, &mut self.banks[self.victim]) {
                    self.bank_dirty[self.victim] = false;
                    match self.rot_kind {
                        RotKind::Overflow => self.rot_state = RotState::ZeroFilling,
                        RotKind::Underflow => {
                            self.dma
                                .start(false, self.new_base * 4, BANK_SIZE, self.victim)
                                .expect("dma idle after spill completion");
                            self.rot_state = RotState::Filling;
                        }
                    }
                }
            }
            RotState::ZeroFilling => {
                self.banks[self.victim].iter_mut().for_each(|w| *w = 0);
                self.bank_base[self.victim] = self.new_base;
                self.bank_resident[self.victim] = true;
                self.active = self.victim;
                self.rot_state = RotState::Idle;
            }
            RotState::Filling => {
                if self.dma.tick(bus, &mut self.banks[self.victim]) {
                    self.bank_base[self.victim] = self.new_base;
                    self.bank_resident[self.victim] = true;
                    self.active = self.victim;
                    self.rot_state = RotState::Idle;
                }
            }
        }
    }
}

impl Default for StackCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatMemBus;

    #[test]
    fn overflow_rotates_clean_victim_instantly_and_zero_fills() {
        let mut cache = StackCache::new();
        let mut bus = FlatMemBus::new(4096);
        // Active bank 0 covers [0, 192). SP rises to 260, inside bank 1's
        // window but outside bank 0's.
        cache.maybe_rotate(260).unwrap();
        assert!(cache.rotation_busy());
        cache.tick(&mut bus);
        assert!(!cache.rotation_busy());
        assert_eq!(cache.active, 2); // victim = (0+2)%3
        assert_eq!(cache.bank_base[2], BANK_SIZE); // moved to activeBase+192
        assert_eq!(cache.read(260), 0); // zero-filled
    }

    #[test]
    fn dirty_victim_spills_before_reuse() {
        let mut cache = StackCache::new();
        let mut bus = FlatMemBus::new(4096);
        cache.bank_dirty[2] = true;
        cache.banks[2][0] = 0x1234;
        cache.maybe_rotate(260).unwrap();
        assert!(matches!(cache.rot_state, RotState::Spilling));
        for _ in 0..64 {
            cache.tick(&mut bus);
        }
        assert!(!cache.rotation_busy());
        assert_eq!(cache.active, 2);
    }

    #[test]
    fn underflow_always_fills_from_memory() {
        let mut cache = StackCache::new();
        let mut bus = FlatMemBus::new(4096);
        // Neither other bank is resident yet, so there is nothing to
        // instant-switch to: the underflow must go through the DMA fill.
        cache.active = 1;
        cache.bank_base = [0, BANK_SIZE, 2 * BANK_SIZE];
        cache.bank_resident = [false, true, false];
        cache.maybe_rotate(50).unwrap(); // below bank 1's [192, 384) window
        assert!(matches!(cache.rot_state, RotState::Filling));
        for _ in 0..64 {
            cache.tick(&mut bus);
        }
        assert!(!cache.rotation_busy());
    }

    #[test]
    fn instant_switch_reuses_still_resident_bank_without_rotation() {
        let mut cache = StackCache::new();
        let mut bus = FlatMemBus::new(4096);
        // Overflow into bank 2's freshly zero-filled window...
        cache.maybe_rotate(260).unwrap();
        cache.tick(&mut bus);
        assert_eq!(cache.active, 2);
        assert!(cache.bank_resident[0]); // bank 0 never stopped being resident

        // ...then a pop brings SP back into bank 0's still-resident window.
        cache.maybe_rotate(10).unwrap();
        assert!(!cache.rotation_busy());
        assert_eq!(cache.active, 0);
        assert_eq!(cache.read(10), 0);
    }

    #[test]
    fn resident_bank_bases_never_overlap_after_repeated_overflow() {
        let mut cache = StackCache::new();
        let mut bus = FlatMemBus::new(4096);
        // Walk SP up through several overflow rotations; at every step the
        // resident banks must cover disjoint windows (section 3).
        for step in 1..=4u32 {
            let sp = step * BANK_SIZE + 10;
            cache.maybe_rotate(sp).unwrap();
            while cache.rotation_busy() {
                cache.tick(&mut bus);
            }
            let resident: Vec<usize> = (0..NUM_BANKS).filter(|&i| cache.bank_resident[i]).collect();
            for &i in &resident {
                for &j in &resident {
                    if i == j {
                        continue;
                    }
                    let (a_lo, a_hi) = (cache.bank_base[i], cache.bank_base[i] + BANK_SIZE);
                    let (b_lo, b_hi) = (cache.bank_base[j], cache.bank_base[j] + BANK_SIZE);
                    assert!(a_hi <= b_lo || b_hi <= a_lo, "banks {i} and {j} overlap at step {step}");
                }
            }
        }
    }
}
