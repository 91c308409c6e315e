//! Multi-core dispatch: core 0 streams a program region to a worker with INT,
//! wakes it, and both halt on their own.

use fiat128::{CACHE_SIZE, Machine, Opcode, Word};

fn main() {
    env_logger::init();

    let mut machine = Machine::new(2, 1, CACHE_SIZE * 2).release_workers_on_int(true);

    // Core 0: dispatch the workers, then stop.
    machine.set_instruction_in_memory(0, CACHE_SIZE - 1, Opcode::Int, 0, 0, 0);
    machine.set_instruction_in_memory(0, CACHE_SIZE - 2, Opcode::Hlt, 0, 0, 0);

    // Worker 1's region: double R1 a few times, then stop.
    let top = CACHE_SIZE * 2 - 1;
    machine.set_instruction_in_memory(0, top, Opcode::Shl, 0, 1, 0);
    machine.set_instruction_in_memory(0, top - 1, Opcode::Shl, 0, 1, 0);
    machine.set_instruction_in_memory(0, top - 2, Opcode::Shl, 0, 1, 0);
    machine.set_instruction_in_memory(0, top - 3, Opcode::Hlt, 0, 0, 0);

    machine.core_mut(1).regs[1] = Word(3);

    let mut steps = 0u32;
    while machine.cores().iter().any(|core| !core.is_halted()) {
        machine.step(false);
        steps += 1;
        if steps > 10_000 {
            eprintln!("machine did not settle, giving up");
            break;
        }
    }

    println!("settled after {steps} machine steps");
    println!("worker R1 = {} (3 doubled three times)", machine.core(1).regs[1]);
}
