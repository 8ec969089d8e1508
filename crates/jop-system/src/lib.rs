//! Wires the execution core, memory controller, system I/O block, and
//! (when configured with more than one core) the lock arbiters into one
//! steppable system.
//!
//! Each core gets its own [`jop_core::JopCore`], [`jop_memctl::MemoryController`],
//! object/array/method caches, and [`jop_io::IoDevice`]; all cores share one
//! [`jop_core::bus::FlatMemBus`] and one pair of lock arbiters. The IO
//! block's `REG_LOCK`/`REG_CPU_ID` pair is wired to [`jop_sync::CmpSync`]
//! (the global lock); [`jop_sync::Ihlu`] is driven directly by callers that
//! need per-object locking, since the register map names only the
//! coarse-grained protocol.

use jop_core::bus::{FlatMemBus, MemBus};
use jop_core::mfetch::MicroInstr;
use jop_core::pipeline::{JopCore, JopCoreConfig};
use jop_core::JumpTable;
use jop_io::IoDevice;
use jop_memctl::{ArrayCache, MemoryController, MethodCache, ObjectCache};
use jop_sync::{CmpSync, Ihlu};
use sys_core::{MasterClock, Observable, Ticks, Value};

pub struct SystemConfig {
    pub microcode_rom: Vec<MicroInstr>,
    pub jump_table: JumpTable,
    pub jbc_size: usize,
    pub ram_width: u32,
    pub mem_size: usize,
    pub num_cores: usize,
    pub cycles_per_usec: u32,
    pub object_cache_lines: usize,
    pub array_cache_lines: usize,
    pub method_cache_lines: usize,
    /// Crystal frequency driving the single synchronous clock domain
    /// (section 5): every `System::tick` call is one edge of this clock.
    pub clock_hz: u64,
}

struct Core {
    jop: JopCore,
    io: IoDevice,
    mc: MemoryController,
    object_cache: ObjectCache,
    array_cache: ArrayCache,
    method_cache: MethodCache,
}

pub struct System {
    cores: Vec<Core>,
    bus: FlatMemBus,
    cmpsync: CmpSync,
    ihlu: Ihlu,
    clock: MasterClock,
    cycle: u64,
}

impl System {
    #[must_use]
    pub fn new(config: SystemConfig) -> Self {
        let num_cores = config.num_cores.max(1);
        let cores = (0..num_cores)
            .map(|cpu_id| Core {
                jop: JopCore::new(JopCoreConfig {
                    microcode_rom: config.microcode_rom.clone(),
                    jump_table: config.jump_table.clone(),
                    jbc_size: config.jbc_size,
                    ram_width: config.ram_width,
                }),
                io: IoDevice::new(cpu_id as u32, num_cores as u32, config.cycles_per_usec),
                mc: MemoryController::new(),
                object_cache: ObjectCache::new(config.object_cache_lines),
                array_cache: ArrayCache::new(config.array_cache_lines),
                method_cache: MethodCache::new(config.method_cache_lines),
            })
            .collect();

        Self {
            cores,
            bus: FlatMemBus::new(config.mem_size),
            cmpsync: CmpSync::new(num_cores),
            ihlu: Ihlu::new(num_cores),
            clock: MasterClock::new(config.clock_hz),
            cycle: 0,
        }
    }

    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// How many cycles elapse in one frame at `frames_per_second`, derived
    /// from this system's configured clock frequency.
    #[must_use]
    pub fn ticks_per_frame(&self, frames_per_second: u64) -> Ticks {
        self.clock.ticks_per_frame(frames_per_second)
    }

    #[must_use]
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Advance every core, the shared bus, and the lock arbiters by one
    /// cycle. `lock_req` carries each core's current global-lock request
    /// (mirrors what a `write IO_LOCK` / no-op-until-released would drive in
    /// hardware); a core not requesting the lock passes `false`.
    pub fn tick(&mut self, lock_req: &[bool]) {
        let gc_halt: Vec<bool> = self.cores.iter().map(|c| c.io.read(jop_io::REG_GC_HALT) != 0).collect();
        let s_in = vec![false; self.cores.len()];
        let (halted, _s_out) = self.cmpsync.tick(lock_req, &gc_halt, &s_in);

        for (i, core) in self.cores.iter_mut().enumerate() {
            core.io.set_lock_status(halted[i], self.ihlu.table_full_status(i));
            let bsy = !core.mc.is_idle();
            core.jop.tick(&mut self.bus, bsy);
            core.mc.tick(&mut self.bus, |_handle| 0);
            core.io.tick();
        }

        self.cycle += 1;
    }

    #[must_use]
    pub fn core_observable(&self, index: usize) -> &dyn Observable {
        &self.cores[index].jop
    }

    #[must_use]
    pub fn bus_mut(&mut self) -> &mut dyn MemBus {
        &mut self.bus
    }
}

impl Observable for System {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "cycle" => Some(Value::U64(self.cycle)),
            "cores" => Some(Value::U32(self.cores.len() as u32)),
            _ => {
                let (idx_str, rest) = path.split_once('.')?;
                let idx: usize = idx_str.parse().ok()?;
                self.cores.get(idx)?.jop.query(rest)
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["cycle", "cores"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jop_core::mfetch::WAIT_OPCODE;

    fn rom_of(instrs: &[u16]) -> Vec<MicroInstr> {
        instrs.iter().map(|&instr| MicroInstr { jfetch: false, jopdfetch: false, instr }).collect()
    }

    fn test_config(num_cores: usize) -> SystemConfig {
        SystemConfig {
            microcode_rom: rom_of(&[0x000, 0x000, WAIT_OPCODE, 0x000]),
            jump_table: JumpTable::default(),
            jbc_size: 256,
            ram_width: 10,
            mem_size: 4096,
            num_cores,
            cycles_per_usec: 100,
            object_cache_lines: 8,
            array_cache_lines: 8,
            method_cache_lines: 8,
            clock_hz: 100_000_000,
        }
    }

    #[test]
    fn ticks_per_frame_derives_from_configured_clock() {
        let sys = System::new(test_config(1));
        assert_eq!(sys.ticks_per_frame(50).get(), 2_000_000);
    }

    #[test]
    fn single_core_system_steps_pc() {
        let mut sys = System::new(test_config(1));
        let req = [false];
        for _ in 0..3 {
            sys.tick(&req);
        }
        assert_eq!(sys.cycle(), 3);
        assert_eq!(sys.core_observable(0).query("pc"), Some(Value::U16(3)));
    }

    #[test]
    fn multi_core_lock_owner_never_halted() {
        let mut sys = System::new(test_config(2));
        let req = [true, true];
        sys.tick(&req);
        assert_eq!(sys.query("cores"), Some(Value::U32(2)));
    }
}
