//! Boot a single-core machine, run a two-instruction program, and dump the
//! core's state.
//!
//! Run with `RUST_LOG=trace cargo run --example bootstrap` to watch every
//! fetch.

use fiat128::{CACHE_SIZE, Machine, Opcode, Word};

fn main() {
    env_logger::init();

    let mut machine = Machine::new(1, 1, CACHE_SIZE.max(256));

    // Execution descends from the top of the cache: MOV first, then a branch
    // back to index R0 = 0, where the zero word halts the core.
    machine.set_word_in_memory(0, 1, Word(2047));
    machine.set_instruction_in_memory(0, CACHE_SIZE - 1, Opcode::Mov, 0, 0, 0);
    machine.set_instruction_in_memory(0, CACHE_SIZE - 2, Opcode::Bun, 0, 0, 0);

    for _ in 0..100 {
        machine.step(true);
    }

    let core = machine.core(0);
    println!("after 100 micro-steps: {core:#?}");
    println!(
        "halted: {}, zero flag: {}, instructions retired: {}",
        core.is_halted(),
        core.flags.contains(fiat128::Flags::Zero),
        core.instructions_retired
    );
}
