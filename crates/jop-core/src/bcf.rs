//! Bytecode fetch stage (section 4.2).
//!
//! Owns the Java program counter (`jpc`), the bytecode cache (`jbc`, a
//! byte-addressed memory read as a 32-bit word), the operand accumulator,
//! and the branch/exception/interrupt dispatch logic that feeds the jump
//! table.

use crate::jump_table::JumpTable;

/// Branch test predicate, decoded from the 4-bit `tp` field carried in the
/// microcode. Several Java bytecodes reuse the same hardware comparator:
/// `if_acmpeq`/`if_acmpne` reuse the reference-equality row, `ifnull`/
/// `ifnonnull` reuse the compare-to-zero row, and `goto` is the
/// unconditional row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTest(pub u8);

impl BranchTest {
    pub const IF_ACMPNE: Self = Self(0);
    pub const IFEQ: Self = Self(1);
    pub const IFNE: Self = Self(2);
    pub const IFLT: Self = Self(3);
    pub const IFGE: Self = Self(4);
    pub const IFGT: Self = Self(5);
    pub const IFLE: Self = Self(6);
    pub const GOTO: Self = Self(7);
    pub const IF_ICMPEQ: Self = Self(8);
    pub const IFNULL: Self = Self(9);
    pub const IFNONNULL: Self = Self(10);
    pub const IF_ICMPNE: Self = Self(11);
    pub const IF_ICMPLT: Self = Self(12);
    pub const IF_ICMPGE: Self = Self(13);
    pub const IF_ICMPGT: Self = Self(14);
    pub const IF_ACMPEQ: Self = Self(15);

    /// Evaluate the branch condition from the stage's flags.
    ///
    /// `zf`/`nf` describe the single top-of-stack operand (used by the
    /// compare-to-zero family); `eq`/`lt` describe the two-operand compare
    /// (used by the `if_icmpXX`/`if_acmpXX` family).
    #[must_use]
    pub fn taken(self, zf: bool, nf: bool, eq: bool, lt: bool) -> bool {
        match self.0 {
            0 => !eq,               // if_acmpne
            1 => zf,                // ifeq
            2 => !zf,               // ifne
            3 => nf,                // iflt
            4 => !nf,               // ifge
            5 => !zf && !nf,        // ifgt
            6 => zf || nf,          // ifle
            7 => true,              // goto
            8 => eq,                // if_icmpeq
            9 => zf,                // ifnull
            10 => !zf,              // ifnonnull
            11 => !eq,              // if_icmpne
            12 => lt,               // if_icmplt
            13 => !lt,              // if_icmpge
            14 => !eq && !lt,       // if_icmpgt
            15 => eq,               // if_acmpeq
            _ => false,
        }
    }
}

/// Inputs sampled by the bytecode fetch stage each cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcfInputs {
    /// Microcode requests a fresh bytecode fetch this cycle.
    pub jfetch: bool,
    /// Microcode requests an 8-then-16-bit operand byte this cycle.
    pub jopdfetch: bool,
    /// Direct JPC write from the stack stage (e.g. `stjpc`).
    pub jpc_wr: Option<u32>,
    /// Unconditional or conditional jump target (from a taken branch, with
    /// the target pre-added to the current JPC by the decoder).
    pub jmp: Option<u32>,
    /// External exception request (`io.exc`).
    pub io_exc: bool,
    /// Interrupts globally enabled.
    pub ena: bool,
    /// Same-cycle write to the bytecode cache, for read/write bypass.
    pub jbc_write: Option<(u32, u8)>,
}

/// Result of one bytecode-fetch-stage cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BcfOutputs {
    pub jpc: u32,
    pub jinstr: u8,
    /// Accumulated 16-bit operand (valid once two `jopdfetch` cycles have
    /// elapsed since the last fetch).
    pub jopd: u16,
    pub jpc_addr: u16,
    pub ack_exc: bool,
    pub ack_irq: bool,
}

/// Bytecode fetch stage: JPC, JBC, and the fetch/branch/exception state
/// machine built around them.
pub struct BytecodeFetchStage {
    pub jbc: Vec<u8>,
    jpc: u32,
    jinstr: u8,
    jopd_hi: u8,
    jopd_lo: u8,
    jopd_phase: u8,
    int_pend: bool,
    exc_pend: bool,
}

impl BytecodeFetchStage {
    #[must_use]
    pub fn new(jbc_size: usize) -> Self {
        Self {
            jbc: vec![0; jbc_size],
            jpc: 0,
            jinstr: 0,
            jopd_hi: 0,
            jopd_lo: 0,
            jopd_phase: 0,
            int_pend: false,
            exc_pend: false,
        }
    }

    #[must_use]
    pub const fn jpc(&self) -> u32 {
        self.jpc
    }

    /// Raise the latched exception flag. Stays pending until the next
    /// acknowledged `jfetch`, per section 7 ("exceptions signalled, never
    /// raised as control flow").
    pub fn signal_exception(&mut self) {
        self.exc_pend = true;
    }

    /// Raise the latched interrupt flag. Stays pending (even while globally
    /// disabled) until acknowledged.
    pub fn signal_interrupt(&mut self) {
        self.int_pend = true;
    }

    fn jbc_read(&self, addr: u32, bypass: Option<(u32, u8)>) -> u8 {
        if let Some((waddr, wdata)) = bypass {
            if waddr == addr {
                return wdata;
            }
        }
        self.jbc.get(addr as usize).copied().unwrap_or(0)
    }

    /// Advance the stage by one cycle.
    pub fn tick(&mut self, jump_table: &JumpTable, inputs: BcfInputs) -> BcfOutputs {
        let exc_pend_now = self.exc_pend || inputs.io_exc;

        // JPC update priority: explicit write > jump > fetch-increment > hold.
        let next_jpc = if let Some(addr) = inputs.jpc_wr {
            addr
        } else if let Some(target) = inputs.jmp {
            target
        } else if inputs.jfetch || inputs.jopdfetch {
            self.jpc + 1
        } else {
            self.jpc
        };

        let jbc_data = self.jbc_read(self.jpc, inputs.jbc_write);

        // Operand accumulation: first jopdfetch loads the high byte, the
        // second shifts it up and ORs in the low byte to form a 16-bit
        // operand.
        if inputs.jopdfetch {
            match self.jopd_phase {
                0 => {
                    self.jopd_hi = jbc_data;
                    self.jopd_phase = 1;
                }
                _ => {
                    self.jopd_lo = jbc_data;
                    self.jopd_phase = 0;
                }
            }
        }

        if inputs.jfetch {
            self.jinstr = jbc_data;
        }

        // Exception beats interrupt beats normal dispatch; never both acked
        // in the same cycle.
        let do_ack_exc = exc_pend_now && inputs.jfetch;
        let do_ack_irq = self.int_pend && inputs.ena && !exc_pend_now && inputs.jfetch;

        let jpc_addr = jump_table.dispatch(jbc_data, self.int_pend && inputs.ena, exc_pend_now);

        if do_ack_exc {
            self.exc_pend = false;
        }
        if do_ack_irq {
            self.int_pend = false;
        }

        self.jpc = next_jpc;

        BcfOutputs {
            jpc: self.jpc,
            jinstr: self.jinstr,
            jopd: u16::from(self.jopd_hi) << 8 | u16::from(self.jopd_lo),
            jpc_addr,
            ack_exc: do_ack_exc,
            ack_irq: do_ack_irq,
        }
    }
}
