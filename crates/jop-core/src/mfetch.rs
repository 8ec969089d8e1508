//! Microcode fetch stage (section 4.3).
//!
//! Reads one microcode word per cycle from the microcode ROM and decides the
//! next program counter by priority: a bytecode-dispatch jump beats a taken
//! branch, which beats an explicit jump, which beats a `WAIT`-driven stall,
//! which beats the default increment.

/// `WAIT` halts the microcode PC until the external busy signal drops.
pub const WAIT_OPCODE: u16 = 0x101;
/// `JBR` triggers a bytecode-relative jump.
pub const JBR_OPCODE: u16 = 0x102;

/// One microcode ROM word: `(jfetch, jopdfetch, instr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MicroInstr {
    pub jfetch: bool,
    pub jopdfetch: bool,
    pub instr: u16,
}

/// Inputs to the next-PC priority mux, beyond the ROM word itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchInputs {
    /// Address supplied by the bytecode fetch stage's jump-table dispatch,
    /// used when the current microinstruction's `jfetch` bit is set.
    pub jfetch_addr: u16,
    /// A taken branch, decoded this cycle.
    pub br: Option<u16>,
    /// An explicit jump target (e.g. `JBR`), decoded this cycle.
    pub jmp: Option<u16>,
    /// External busy/wait signal.
    pub bsy: bool,
}

/// Microcode fetch stage: PC, the one-cycle-delayed instruction register,
/// and the `WAIT` stall latch.
pub struct FetchStage {
    rom: Vec<MicroInstr>,
    pc: u16,
    ir: MicroInstr,
    pcwait: bool,
}

impl FetchStage {
    #[must_use]
    pub fn new(rom: Vec<MicroInstr>) -> Self {
        Self { rom, pc: 0, ir: MicroInstr::default(), pcwait: false }
    }

    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    #[must_use]
    pub const fn ir(&self) -> MicroInstr {
        self.ir
    }

    #[must_use]
    pub const fn pcwait(&self) -> bool {
        self.pcwait
    }

    /// Advance by one cycle, returning the instruction now visible to the
    /// decode stage (the previous cycle's fetch, or the held instruction if
    /// frozen).
    pub fn tick(&mut self, inputs: FetchInputs) -> MicroInstr {
        let fetched = self.rom[self.pc as usize];
        let stall_hold = self.pcwait && inputs.bsy;

        let next_pc = if fetched.jfetch {
            inputs.jfetch_addr
        } else if let Some(target) = inputs.br {
            target
        } else if let Some(target) = inputs.jmp {
            target
        } else if stall_hold {
            self.pc
        } else {
            self.pc.wrapping_add(1)
        };

        let frozen = stall_hold && !fetched.jfetch && inputs.br.is_none() && inputs.jmp.is_none();

        if frozen {
            self.pc = next_pc;
            return self.ir;
        }

        self.ir = fetched;
        self.pcwait = fetched.instr == WAIT_OPCODE;
        self.pc = next_pc;
        self.ir
    }
}
