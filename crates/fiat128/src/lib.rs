//! An emulator library for the FIAT128, an imagined 128-bit multi-core
//! processor.
//!
//! `fiat128` models, at micro-step granularity, a small fleet of cores sharing
//! a bus that connects one or more banked memory modules. Every register and
//! memory cell holds a 128-bit [`Word`]; programs are 32-bit packed opcodes
//! seeded into memory or directly into a core's cache.
//!
//! # Architecture
//!
//! The emulator is built from a handful of pieces, owned top-down:
//!
//! - **[`Machine`]**: owns the cores and memory banks, wires up the bus, and
//!   exposes the seeding and stepping API.
//! - **[`Core`]**: one execution unit with a register file, flags, timer, and
//!   a private cache it fetches its instruction stream from. Core 0 bootstraps
//!   itself out of memory bank 0; the other cores start halted.
//! - **[`Bus`]**: routes word traffic to memory banks and, for core 0 only,
//!   into other cores' caches.
//! - **[`instruction`]**: the opcode table and the decoder that splits a
//!   packed 32-bit instruction into (opcode, dest, src1, src2).
//!
//! # Quick Start
//!
//! ```
//! use fiat128::{CACHE_SIZE, Machine, Opcode};
//!
//! let mut machine = Machine::new(1, 1, CACHE_SIZE);
//!
//! // Programs execute downward from the top of the cache, so the first
//! // instruction goes at the highest address.
//! machine.set_instruction_in_memory(0, CACHE_SIZE - 1, Opcode::Mov, 0, 0, 0);
//! machine.set_instruction_in_memory(0, CACHE_SIZE - 2, Opcode::Hlt, 0, 0, 0);
//!
//! // Bootstrap, then run: one call per micro-step.
//! for _ in 0..CACHE_SIZE + 8 {
//!     machine.step(true);
//! }
//! assert!(machine.core(0).is_halted());
//! ```
//!
//! # Observability
//!
//! Every core's registers, flags, timer, stack pointer, and cache are open for
//! inspection after any step; that surface is the primary way to test programs.
//! Diagnostics go through the [`log`] facade.

pub mod instruction;
pub mod machine;
pub mod processor;

/// Re-export core primitives so downstream users can depend on `fiat128`
/// only, while internal modules still import them explicitly from `fiat`.
pub use fiat::bus::{Bus, BusTarget};
pub use fiat::cache::{CACHE_SIZE, Cache, cache_index};
pub use fiat::memory::MemoryBank;
pub use fiat::word::{self as word, Word};

pub use instruction::{Instruction, Opcode, TIMER_OPERAND};
pub use machine::Machine;
pub use processor::{BOOT_CHANNEL, Core, Flags};
