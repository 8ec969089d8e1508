//! Smoke runner: builds a single-core system around a tiny hand-written
//! microcode image and steps it, printing an observable snapshot every
//! `--report-every` cycles. Intended as a manual sanity check, not a full
//! bytecode interpreter front-end.

use std::env;

use jop_core::mfetch::{MicroInstr, WAIT_OPCODE};
use jop_core::JumpTable;
use jop_system::{System, SystemConfig};
use sys_core::Observable;

fn default_rom() -> Vec<MicroInstr> {
    [0x000, 0x000, WAIT_OPCODE, 0x000]
        .iter()
        .map(|&instr| MicroInstr { jfetch: false, jopdfetch: false, instr })
        .collect()
}

fn main() {
    let mut args = env::args().skip(1);
    let cycles: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(16);
    let report_every: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(4);

    let config = SystemConfig {
        microcode_rom: default_rom(),
        jump_table: JumpTable::default(),
        jbc_size: 1024,
        ram_width: 10,
        mem_size: 1 << 16,
        num_cores: 1,
        cycles_per_usec: 100,
        object_cache_lines: 16,
        array_cache_lines: 16,
        method_cache_lines: 16,
        clock_hz: 100_000_000,
    };
    let mut system = System::new(config);
    let lock_req = [false];

    for cycle in 0..cycles {
        system.tick(&lock_req);
        if cycle % report_every == 0 {
            let pc = system.core_observable(0).query("pc");
            let sp = system.core_observable(0).query("sp");
            println!("cycle={} pc={:?} sp={:?}", system.cycle(), pc, sp);
        }
    }
}
