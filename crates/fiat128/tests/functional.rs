
use fiat128::{CACHE_SIZE, Flags, Opcode, Word};

#[test]
fn mov_and_branch_through_bootstrap() {
    let mut machine = fixture::machine_with(1);
    fixture::seed_boot_program(
        &machine,
        &[(Opcode::Mov, 0, 0, 0), (Opcode::Bun, 0, 0, 0)],
    );

    fixture::run_bootstrap(&mut machine);
    assert!(!machine.core(0).is_halted());
    assert_eq!(machine.core(0).sp, CACHE_SIZE - 1);

    // The boundary call falls out of bootstrap and fetches MOV.
    machine.step(true);
    assert_eq!(machine.core(0).current_instruction.opcode, Opcode::Mov);
    machine.step(true);
    assert!(machine.core(0).flags.contains(Flags::Zero));
    assert_eq!(machine.core(0).regs[0], Word::ZERO);

    // BUN lands the stack pointer on R0's low bits.
    fixture::run_steps(&mut machine, 2, true);
    assert_eq!(machine.core(0).sp, 0);

    // The rest of the cache is zero words, which decode invalid and halt.
    fixture::run_steps(&mut machine, 100, true);
    assert!(machine.core(0).is_halted());
    assert!(machine.core(0).flags.contains(Flags::Zero));
}

#[test]
fn add_reports_carry_and_zero() {
    let mut machine = fixture::machine_with(2);
    {
        let core = machine.core_mut(1);
        core.flags = Flags::empty();
        core.regs[1] = Word::MAX;
        core.regs[2] = Word::ONE;
    }
    fixture::seed_cache_program(&mut machine, 1, &[(Opcode::Add, 3, 1, 2)]);

    machine.step(false);

    let core = machine.core(1);
    assert_eq!(core.regs[3], Word::ZERO);
    assert!(core.flags.contains(Flags::Overflow));
    assert!(core.flags.contains(Flags::Zero));
    assert!(!core.flags.contains(Flags::Sign));
}

#[test]
fn str_then_ldr_round_trips_through_the_cache() {
    let mut machine = fixture::machine_with(2);
    {
        let core = machine.core_mut(1);
        core.flags = Flags::empty();
        core.regs[1] = Word(5);
        core.regs[2] = Word(42);
    }
    fixture::seed_cache_program(
        &mut machine,
        1,
        &[(Opcode::Str, 1, 2, 0), (Opcode::Ldr, 3, 1, 0)],
    );

    fixture::run_steps(&mut machine, 2, false);

    let core = machine.core(1);
    assert_eq!(core.cache().read(5), Word(42));
    assert_eq!(core.regs[3], Word(42));
}

#[test]
fn undefined_opcodes_halt_and_freeze_the_core() {
    let mut machine = fixture::machine_with(2);
    machine.core_mut(1).flags = Flags::empty();
    machine.set_word_in_cpu(1, CACHE_SIZE - 1, Word::from_instruction_bytes([0xFF, 0, 0, 0]));

    machine.step(false);

    assert!(machine.core(1).is_halted());
    let regs = machine.core(1).regs;
    let cycles = machine.core(1).cycles;

    // Halt is sticky: further steps change nothing.
    fixture::run_steps(&mut machine, 10, false);
    assert!(machine.core(1).is_halted());
    assert_eq!(machine.core(1).regs, regs);
    assert_eq!(machine.core(1).cycles, cycles);
}

#[test]
fn timer_interrupt_redirects_to_the_vector() {
    let mut machine = fixture::machine_with(2);
    {
        let core = machine.core_mut(1);
        core.flags = Flags::empty();
        core.timer = Word::ONE;
        core.interrupt_vector = 3;
    }
    // Benign filler so the core keeps running while the timer drains.
    let filler: Vec<_> = (0..CACHE_SIZE).map(|_| (Opcode::Mov, 0, 0, 0)).collect();
    fixture::seed_cache_program(&mut machine, 1, &filler);

    // Fetch runs the timer down to zero.
    machine.step(true);
    assert!(!machine.core(1).flags.contains(Flags::InterruptPending));

    // Execute observes zero and latches; the timer wraps to all-ones.
    machine.step(true);
    assert!(machine.core(1).flags.contains(Flags::InterruptPending));
    assert!(machine.core(1).timer.is_all_ones());

    // The next instruction boundary services the interrupt.
    machine.step(true);
    let core = machine.core(1);
    assert!(!core.flags.contains(Flags::InterruptPending));
    assert_eq!(core.sp, 2, "redirected to the vector, then fetched one slot");
}

#[test]
fn eql_sets_zero_and_biz_takes_the_branch() {
    let mut machine = fixture::machine_with(2);
    {
        let core = machine.core_mut(1);
        core.flags = Flags::empty();
        core.regs[1] = Word(7);
        core.regs[2] = Word(7);
        core.regs[3] = Word(3);
    }
    fixture::seed_cache_program(
        &mut machine,
        1,
        &[(Opcode::Eql, 0, 1, 2), (Opcode::Biz, 3, 0, 0)],
    );

    machine.step(false);
    assert!(machine.core(1).flags.contains(Flags::Zero));

    machine.step(false);
    assert_eq!(machine.core(1).sp, 3);
}

#[test]
fn eql_clears_zero_when_operands_differ() {
    let mut machine = fixture::machine_with(2);
    {
        let core = machine.core_mut(1);
        core.flags = Flags::Zero;
        core.regs[1] = Word(7);
        core.regs[2] = Word(8);
        core.regs[3] = Word(3);
    }
    fixture::seed_cache_program(
        &mut machine,
        1,
        &[(Opcode::Eql, 0, 1, 2), (Opcode::Biz, 3, 0, 0)],
    );

    machine.step(false);
    assert!(!machine.core(1).flags.contains(Flags::Zero));

    // The branch falls through; sp keeps descending past the program.
    machine.step(false);
    assert_eq!(machine.core(1).sp, CACHE_SIZE - 3);
}

#[test]
fn grt_compares_below_unsigned() {
    let mut machine = fixture::machine_with(2);
    {
        let core = machine.core_mut(1);
        core.flags = Flags::empty();
        core.regs[1] = Word(3);
        core.regs[2] = Word(9);
    }
    fixture::seed_cache_program(
        &mut machine,
        1,
        &[(Opcode::Grt, 0, 1, 2), (Opcode::Grt, 0, 2, 1)],
    );

    machine.step(false);
    assert!(machine.core(1).flags.contains(Flags::Sign));

    machine.step(false);
    assert!(!machine.core(1).flags.contains(Flags::Sign));
}

#[test]
fn workers_stay_frozen_until_released() {
    let mut machine = fixture::machine_with(2);
    let before = machine.core(1).regs;
    let timer_before = machine.core(1).timer;

    fixture::run_steps(&mut machine, 50, true);

    let core = machine.core(1);
    assert!(core.is_halted());
    assert_eq!(core.regs, before);
    assert_eq!(core.timer, timer_before);
    assert_eq!(core.cycles, 0);
}

#[test]
fn int_seeds_worker_caches_and_releases_when_configured() {
    let mut machine = fixture::machine_with(2).release_workers_on_int(true);

    // Core 0 dispatches, then halts; the worker runs MOV and halts itself.
    fixture::seed_boot_program(
        &machine,
        &[(Opcode::Int, 0, 0, 0), (Opcode::Hlt, 0, 0, 0)],
    );
    fixture::seed_dispatch_program(
        &machine,
        1,
        &[(Opcode::Mov, 4, 2, 0), (Opcode::Hlt, 0, 0, 0)],
    );

    fixture::run_bootstrap(&mut machine);
    fixture::run_steps(&mut machine, 8, false);

    // The dispatch region landed in the worker's cache.
    let expected = machine.read_memory(0, CACHE_SIZE * 2 - 1);
    assert_eq!(machine.core(1).cache().read(CACHE_SIZE - 1), expected);

    assert!(machine.core(0).is_halted());
    assert!(machine.core(1).is_halted(), "worker ran its program to HLT");
    assert!(machine.core(1).instructions_retired >= 2);
    assert!(machine.core(1).flags.contains(Flags::Zero), "MOV of a zero register");
}

#[test]
fn int_leaves_workers_halted_by_default() {
    let mut machine = fixture::machine_with(2);
    fixture::seed_boot_program(
        &machine,
        &[(Opcode::Int, 0, 0, 0), (Opcode::Hlt, 0, 0, 0)],
    );
    fixture::seed_dispatch_program(&machine, 1, &[(Opcode::Mov, 4, 2, 0)]);

    fixture::run_bootstrap(&mut machine);
    fixture::run_steps(&mut machine, 8, false);

    // The copy happened, but the worker never woke.
    let expected = machine.read_memory(0, CACHE_SIZE * 2 - 1);
    assert_eq!(machine.core(1).cache().read(CACHE_SIZE - 1), expected);
    assert!(machine.core(1).is_halted());
    assert_eq!(machine.core(1).cycles, 0);
}

#[test]
fn concurrent_stepping_matches_sequential_stepping() {
    let build = || {
        let mut machine = fixture::machine_with(2);
        {
            let core = machine.core_mut(1);
            core.flags = Flags::empty();
            core.regs[1] = Word(5);
            core.regs[2] = Word(7);
        }
        fixture::seed_cache_program(
            &mut machine,
            1,
            &[
                (Opcode::Add, 3, 1, 2),
                (Opcode::Shl, 0, 3, 0),
                (Opcode::Hlt, 0, 0, 0),
            ],
        );
        fixture::seed_boot_program(&machine, &[(Opcode::Hlt, 0, 0, 0)]);
        machine
    };

    let mut sequential = build();
    let mut concurrent = build();

    for _ in 0..CACHE_SIZE + 10 {
        sequential.step(true);
        concurrent.step_concurrent(true);
    }

    for id in 0..2 {
        let a = sequential.core(id);
        let b = concurrent.core(id);
        assert_eq!(a.regs, b.regs);
        assert_eq!(a.flags, b.flags);
        assert_eq!(a.sp, b.sp);
        assert_eq!(a.cycles, b.cycles);
    }
    assert_eq!(sequential.core(1).regs[3], Word(24), "5 + 7 shifted left once");
}
