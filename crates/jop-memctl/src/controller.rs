//! Memory controller (section 4.7).
//!
//! Serializes field/array/bytecode/copy accesses onto the single memory
//! bus, performing the null-pointer and array-bounds pre-checks before
//! issuing a command. A failed check raises an exception (section 7: a
//! register + one-cycle pulse, not a host-language error) and returns the
//! controller straight to `Idle` without ever touching the bus.

use jop_core::bus::{BusCommand, MemBus};

pub const EXC_NULL_POINTER: u8 = 0x01;
pub const EXC_ARRAY_BOUNDS: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum McState {
    Idle,
    ReadWait,
    WriteWait,
    BcRdWait { beats_left: u8 },
    CopyWait { words_left: u32, src: u32, dst: u32 },
    NpExc,
    AbExc,
    CpStop,
}

/// What the controller was asked to do, captured when an operation starts
/// so the bounds/null checks and the eventual bus command agree.
#[derive(Debug, Clone, Copy)]
enum Op {
    GetField { handle: u32, offset: u32 },
    PutField { handle: u32, offset: u32, value: u32 },
    IaLoad { handle: u32, index: u32 },
    IaStore { handle: u32, index: u32, value: u32 },
    BcRead { addr: u32 },
    Copy { src: u32, dst: u32, words: u32 },
}

/// Result of a completed operation, surfaced the cycle the controller
/// returns to `Idle` after a successful access.
#[derive(Debug, Clone, Copy)]
pub enum McResult {
    Value(u32),
    BcWords([u32; 4]),
    Done,
    Exception(u8),
}

pub struct MemoryController {
    state: McState,
    op: Option<Op>,
    bc_words: [u32; 4],
    atomic: bool,
}

impl MemoryController {
    #[must_use]
    pub fn new() -> Self {
        Self { state: McState::Idle, op: None, bc_words: [0; 4], atomic: false }
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, McState::Idle)
    }

    #[must_use]
    pub const fn atomic_active(&self) -> bool {
        self.atomic
    }

    pub fn atomic_start(&mut self) {
        self.atomic = true;
    }

    pub fn atomic_end(&mut self) {
        self.atomic = false;
    }

    /// Abort an in-flight `copy`; section 4.7's `CP_STOP` path.
    pub fn abort_copy(&mut self) {
        if matches!(self.state, McState::CopyWait { .. }) {
            self.state = McState::CpStop;
        }
    }

    fn start(&mut self, op: Op) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.op = Some(op);
        true
    }

    pub fn start_getfield(&mut self, handle: u32, offset: u32) -> bool {
        self.start(Op::GetField { handle, offset })
    }

    pub fn start_putfield(&mut self, handle: u32, offset: u32, value: u32) -> bool {
        self.start(Op::PutField { handle, offset, value })
    }

    pub fn start_iaload(&mut self, handle: u32, index: u32) -> bool {
        self.start(Op::IaLoad { handle, index })
    }

    pub fn start_iastore(&mut self, handle: u32, index: u32, value: u32) -> bool {
        self.start(Op::IaStore { handle, index, value })
    }

    pub fn start_bc_read(&mut self, addr: u32) -> bool {
        self.start(Op::BcRead { addr })
    }

    pub fn start_copy(&mut self, src: u32, dst: u32, words: u32) -> bool {
        self.start(Op::Copy { src, dst, words })
    }

    /// Advance the controller by one cycle. `length_at` resolves an array
    /// handle's stored length word (handle + 1), used for the bounds check.
    pub fn tick(
        &mut self,
        bus: &mut dyn MemBus,
        length_at: impl Fn(u32) -> u32,
    ) -> Option<McResult> {
        match self.state {
            McState::Idle => self.dispatch(bus, length_at),
            McState::ReadWait => {
                if let Some(resp) = bus.try_recv() {
                    self.state = McState::Idle;
                    self.op = None;
                    // Bus ERROR is propagated into the data path as-is (section 7);
                    // the controller does not distinguish it from SUCCESS here.
                    return Some(McResult::Value(resp.data));
                }
                None
            }
            McState::WriteWait => {
                if bus.try_recv().is_some() {
                    self.state = McState::Idle;
                    self.op = None;
                    return Some(McResult::Done);
                }
                None
            }
            McState::BcRdWait { beats_left } => {
                if let Some(resp) = bus.try_recv() {
                    let idx = (4 - beats_left) as usize;
                    self.bc_words[idx] = resp.data;
                    if beats_left <= 1 {
                        self.state = McState::Idle;
                        self.op = None;
                        return Some(McResult::BcWords(self.bc_words));
                    }
                    self.state = McState::BcRdWait { beats_left: beats_left - 1 };
                }
                None
            }
            McState::CopyWait { words_left, src, dst } => {
                if words_left == 0 {
                    self.state = McState::Idle;
                    self.op = None;
                    return Some(McResult::Done);
                }
                let read = bus.try_send(&BusCommand::read(src));
                if read {
                    if let Some(resp) = bus.try_recv() {
                        bus.try_send(&BusCommand::write(dst, resp.data, 0xF));
                        bus.try_recv();
                        self.state =
                            McState::CopyWait { words_left: words_left - 1, src: src + 4, dst: dst + 4 };
                    }
                }
                None
            }
            McState::NpExc | McState::AbExc => {
                let code = if self.state == McState::NpExc { EXC_NULL_POINTER } else { EXC_ARRAY_BOUNDS };
                self.state = McState::Idle;
                self.op = None;
                Some(McResult::Exception(code))
            }
            McState::CpStop => {
                self.state = McState::Idle;
                self.op = None;
                Some(McResult::Done)
            }
        }
    }

    fn dispatch(
        &mut self,
        bus: &mut dyn MemBus,
        length_at: impl Fn(u32) -> u32,
    ) -> Option<McResult> {
        let op = self.op?;
        match op {
            Op::GetField { handle, offset } => {
                if handle == 0 {
                    self.state = McState::NpExc;
                    return None;
                }
                bus.try_send(&BusCommand::read(handle + offset));
                self.state = McState::ReadWait;
                None
            }
            Op::PutField { handle, offset, value } => {
                if handle == 0 {
                    self.state = McState::NpExc;
                    return None;
                }
                bus.try_send(&BusCommand::write(handle + offset, value, 0xF));
                self.state = McState::WriteWait;
                None
            }
            Op::IaLoad { handle, index } => {
                if handle == 0 {
                    self.state = McState::NpExc;
                    return None;
                }
                if index >= length_at(handle) {
                    self.state = McState::AbExc;
                    return None;
                }
                bus.try_send(&BusCommand::read(handle + 1 + index));
                self.state = McState::ReadWait;
                None
            }
            Op::IaStore { handle, index, value } => {
                if handle == 0 {
                    self.state = McState::NpExc;
                    return None;
                }
                if index >= length_at(handle) {
                    self.state = McState::AbExc;
                    return None;
                }
                bus.try_send(&BusCommand::write(handle + 1 + index, value, 0xF));
                self.state = McState::WriteWait;
                None
            }
            Op::BcRead { addr } => {
                bus.try_send(&BusCommand::burst_read(addr, 4));
                self.state = McState::BcRdWait { beats_left: 4 };
                None
            }
            Op::Copy { src, dst, words } => {
                self.state = McState::CopyWait { words_left: words, src, dst };
                None
            }
        }
    }
}

impl Default for MemoryController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jop_core::bus::FlatMemBus;

    #[test]
    fn getfield_null_handle_raises_exception_without_touching_bus() {
        let mut mc = MemoryController::new();
        let mut bus = FlatMemBus::new(4096);
        mc.start_getfield(0, 4);
        let result = mc.tick(&mut bus, |_| 0);
        assert!(matches!(result, Some(McResult::Exception(EXC_NULL_POINTER))));
        assert!(mc.is_idle());
    }

    #[test]
    fn iaload_out_of_bounds_raises_exception() {
        let mut mc = MemoryController::new();
        let mut bus = FlatMemBus::new(4096);
        mc.start_iaload(0x40, 10);
        let result = mc.tick(&mut bus, |_| 4); // length = 4, index 10 out of bounds
        assert!(matches!(result, Some(McResult::Exception(EXC_ARRAY_BOUNDS))));
    }

    #[test]
    fn getfield_hit_returns_value() {
        let mut mc = MemoryController::new();
        let mut bus = FlatMemBus::new(4096);
        mc.start_getfield(0x100, 0);
        let mut result = mc.tick(&mut bus, |_| 0);
        while result.is_none() {
            result = mc.tick(&mut bus, |_| 0);
        }
        assert!(matches!(result, Some(McResult::Value(_))));
    }
}
