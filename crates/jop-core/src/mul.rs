//! Iterative shift-accumulate multiplier (section 8 invariant 7).
//!
//! Mirrors the real JOP multiply unit's hardware economy: rather than a
//! single-cycle combinational multiply, the result drains over several
//! cycles after `wr` latches new operands. `dout` only reflects the new
//! product once `busy()` goes false.

pub struct Multiplier {
    width: u32,
    a: i32,
    b: i32,
    dout: i32,
    cycles_left: u32,
}

impl Multiplier {
    #[must_use]
    pub fn new(width: u32) -> Self {
        Self { width, a: 0, b: 0, dout: 0, cycles_left: 0 }
    }

    /// Two bits of the multiplicand drain per cycle, plus one cycle to
    /// latch the operands: 8 bits settles in exactly 5 cycles.
    fn latency(width: u32) -> u32 {
        width / 2 + 1
    }

    pub fn wr(&mut self, a: i32, b: i32) {
        self.a = a;
        self.b = b;
        self.cycles_left = Self::latency(self.width);
    }

    pub fn tick(&mut self) {
        if self.cycles_left == 0 {
            return;
        }
        self.cycles_left -= 1;
        if self.cycles_left == 0 {
            let product = self.a.wrapping_mul(self.b) as u32;
            let mask = if self.width >= 32 { u32::MAX } else { (1u32 << self.width) - 1 };
            self.dout = (product & mask) as i32;
        }
    }

    #[must_use]
    pub const fn busy(&self) -> bool {
        self.cycles_left > 0
    }

    #[must_use]
    pub const fn dout(&self) -> i32 {
        self.dout
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::new(8)
    }
}
