//! Stack cache spill/fill DMA engine (section 4.6).
//!
//! Moves one whole stack-cache bank between the cache RAM and main memory.
//! Spill reads the bank out of cache RAM and writes it to memory one word
//! at a time; fill does the reverse. `words_done` never exceeds
//! `word_count`, and `done` pulses exactly once, in the `Done` state.

use crate::bus::{BusCommand, MemBus};
use sys_core::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaState {
    Idle,
    SpillRead,
    SpillCmd,
    SpillWait,
    FillCmd,
    FillWait,
    Done,
}

pub struct StackCacheDma {
    state: DmaState,
    spill: bool,
    byte_addr: u32,
    word_count: u32,
    words_done: u32,
    bank_index: usize,
    read_word: i32,
}

impl StackCacheDma {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DmaState::Idle,
            spill: false,
            byte_addr: 0,
            word_count: 0,
            words_done: 0,
            bank_index: 0,
            read_word: 0,
        }
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, DmaState::Idle)
    }

    #[must_use]
    pub const fn bank_index(&self) -> usize {
        self.bank_index
    }

    /// Begin a spill (cache -> memory) or fill (memory -> cache) of
    /// `word_count` words for `bank_index`, starting at `byte_addr`.
    pub fn start(
        &mut self,
        spill: bool,
        byte_addr: u32,
        word_count: u32,
        bank_index: usize,
    ) -> Result<(), CoreError> {
        if !self.is_idle() {
            return Err(CoreError::Busy("StackCacheDma"));
        }
        self.spill = spill;
        self.byte_addr = byte_addr;
        self.word_count = word_count;
        self.words_done = 0;
        self.bank_index = bank_index;
        self.state = if spill { DmaState::SpillRead } else { DmaState::FillCmd };
        Ok(())
    }

    fn current_addr(&self) -> u32 {
        self.byte_addr + self.words_done * 4
    }

    /// Advance by one cycle. `bank` is the bank's word RAM (length
    /// `word_count` once a transfer is in flight). Returns `true` exactly
    /// once, on the cycle the transfer completes (the `Done` state).
    pub fn tick(&mut self, bus: &mut dyn MemBus, bank: &mut [i32]) -> bool {
        match self.state {
            DmaState::Idle | DmaState::Done => {
                let was_done = self.state == DmaState::Done;
                self.state = DmaState::Idle;
                was_done
            }
            DmaState::SpillRead => {
                self.read_word = bank[self.words_done as usize];
                self.state = DmaState::SpillCmd;
                false
            }
            DmaState::SpillCmd => {
                let cmd = BusCommand::write(self.current_addr(), self.read_word as u32, 0xF);
                if bus.try_send(&cmd) {
                    self.state = DmaState::SpillWait;
                }
                false
            }
            DmaState::SpillWait => {
                if bus.try_recv().is_some() {
                    self.words_done += 1;
                    if self.words_done >= self.word_count {
                        self.state = DmaState::Done;
                    } else {
                        self.state = DmaState::SpillRead;
                    }
                }
                false
            }
            DmaState::FillCmd => {
                let cmd = BusCommand::read(self.current_addr());
                if bus.try_send(&cmd) {
                    self.state = DmaState::FillWait;
                }
                false
            }
            DmaState::FillWait => {
                if let Some(resp) = bus.try_recv() {
                    bank[self.words_done as usize] = resp.data as i32;
                    self.words_done += 1;
                    if self.words_done >= self.word_count {
                        self.state = DmaState::Done;
                    } else {
                        self.state = DmaState::FillCmd;
                    }
                }
                false
            }
        }
    }
}

impl Default for StackCacheDma {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatMemBus;

    #[test]
    fn spill_transfers_all_words_exactly_once() {
        let mut dma = StackCacheDma::new();
        let mut bus = FlatMemBus::new(4096);
        let mut bank = vec![1, 2, 3, 4];
        dma.start(true, 0x100, 4, 0).unwrap();
        let mut done_pulses = 0;
        for _ in 0..64 {
            if dma.tick(&mut bus, &mut bank) {
                done_pulses += 1;
            }
        }
        assert_eq!(done_pulses, 1);
        assert!(dma.is_idle());
    }

    #[test]
    fn fill_reads_words_in_order() {
        let mut dma = StackCacheDma::new();
        let mut bus = FlatMemBus::new(4096);
        bus.try_send(&BusCommand::write(0x200, 0xAA, 0xF));
        bus.try_recv();
        bus.try_send(&BusCommand::write(0x204, 0xBB, 0xF));
        bus.try_recv();
        let mut bank = vec![0; 2];
        dma.start(false, 0x200, 2, 1).unwrap();
        for _ in 0..32 {
            dma.tick(&mut bus, &mut bank);
        }
        assert_eq!(bank, vec![0xAA, 0xBB]);
    }

    #[test]
    fn busy_rejects_concurrent_start() {
        let mut dma = StackCacheDma::new();
        dma.start(true, 0, 4, 0).unwrap();
        assert!(dma.start(true, 0, 4, 0).is_err());
    }
}
