//! Cycle-accurate execution core for a stack-based Java processor.
//!
//! Composes the bytecode fetch stage, the microcode fetch stage, microcode
//! decode, and the stack stage into one `tick()`-driven pipeline. The stack
//! stage's 3-bank cache mode and its spill/fill DMA engine are available as
//! standalone components ([`stack_cache`], [`stack_cache_dma`]) for callers
//! that need the cached variant; [`pipeline::JopCore`] wires up the
//! single-RAM mode by default.

pub mod bcf;
pub mod bus;
pub mod crc;
pub mod decode;
pub mod jump_table;
pub mod mfetch;
pub mod mul;
pub mod pipeline;
pub mod stack;
pub mod stack_cache;
pub mod stack_cache_dma;

pub use bcf::BytecodeFetchStage;
pub use bus::{BusCommand, BusOpcode, BusResponse, MemBus, RespOpcode};
pub use crc::Crc8Maxim;
pub use decode::DecodeStage;
pub use jump_table::JumpTable;
pub use mfetch::{FetchStage, MicroInstr};
pub use mul::Multiplier;
pub use pipeline::JopCore;
pub use stack::StackStage;
pub use stack_cache::StackCache;
pub use stack_cache_dma::StackCacheDma;
