//! A single FIAT128 core: register file, private cache, and the
//! fetch/decode/execute state machine.

use crate::instruction::{Instruction, Opcode, TIMER_OPERAND};
use crate::processor::flags::Flags;
use fiat::{Bus, BusTarget, CACHE_SIZE, Cache, Word, cache_index};
use std::fmt;
use std::sync::Arc;

/// Memory channel the bootstrap core streams its program from.
pub const BOOT_CHANNEL: usize = 0;

/// One execution unit of the machine.
///
/// A core owns eight 128-bit general registers, a timer, a flag register, and a
/// private cache of [`CACHE_SIZE`] words that doubles as its instruction store.
/// The stack pointer indexes the cache and decrements after each fetch, so
/// programs are laid out downward from the top of the cache.
///
/// Core 0 powers on in bootstrap mode and copies its program out of memory
/// bank 0 before executing; every other core powers on halted and waits for a
/// wake request or a host release.
pub struct Core {
    /// Unique id assigned by the machine; core 0 is the bootstrap core.
    pub id: usize,
    /// General-purpose registers R0..R7. Operand index 8 names the timer.
    pub regs: [Word; 8],
    pub flags: Flags,
    /// Decrements once per micro-step; reaching zero latches an interrupt.
    pub timer: Word,
    /// Program counter into the cache; decrements after each fetch.
    pub sp: usize,
    /// Cache index where execution resumes when an interrupt is serviced.
    pub interrupt_vector: usize,
    /// Reserved for a future call/return facility; no instruction touches it.
    pub return_stack: [usize; 16],
    /// High 32 bits of the most recently fetched word, i.e. the packed
    /// instruction.
    pub acc: u32,
    /// The full word fetched last.
    pub current_word: Word,
    pub current_instruction: Instruction,
    /// 0 = fetch, 1 = execute; any other value resynchronizes to a boundary.
    pub instruction_cycle: i8,
    /// Execution micro-steps taken since power-on; bootstrap copies are not
    /// counted.
    pub cycles: u64,
    /// Instructions completed since power-on.
    pub instructions_retired: u64,
    /// Cleared while an interrupt is being serviced.
    pub interrupt_enabled: bool,
    /// When set, INT wakes the workers it just seeded.
    pub release_on_int: bool,
    initialized: bool,
    new_instruction: bool,
    cache: Arc<Cache>,
    bus: Option<Arc<Bus>>,
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The cache is too noisy to dump here.
        f.debug_struct("Core")
            .field("id", &self.id)
            .field("regs", &self.regs)
            .field("flags", &self.flags)
            .field("timer", &self.timer)
            .field("sp", &self.sp)
            .field("interrupt_vector", &self.interrupt_vector)
            .field("acc", &self.acc)
            .field("current_instruction", &self.current_instruction)
            .field("instruction_cycle", &self.instruction_cycle)
            .field("cycles", &self.cycles)
            .field("instructions_retired", &self.instructions_retired)
            .field("interrupt_enabled", &self.interrupt_enabled)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Powers on a core in its construction state.
    ///
    /// The stack pointer and timer start all-ones, reached by decrementing
    /// through zero. Core 0 clears the resulting overflow and will bootstrap;
    /// every other core powers on halted.
    pub(crate) fn new(id: usize) -> Self {
        let mut core = Self {
            id,
            regs: [Word::ZERO; 8],
            flags: Flags::empty(),
            timer: Word::ZERO,
            sp: 0,
            interrupt_vector: 0,
            return_stack: [0; 16],
            acc: 0,
            current_word: Word::ZERO,
            current_instruction: Instruction::default(),
            instruction_cycle: 0,
            cycles: 0,
            instructions_retired: 0,
            interrupt_enabled: true,
            release_on_int: false,
            initialized: id != 0,
            new_instruction: true,
            cache: Arc::new(Cache::default()),
            bus: None,
        };

        core.retreat_sp();
        core.tick_timer();

        if core.id == 0 {
            core.flags.remove(Flags::Overflow);
        } else {
            core.flags.insert(Flags::Halted);
        }

        core
    }

    pub(crate) fn attach_bus(&mut self, bus: Arc<Bus>) {
        self.bus = Some(bus);
    }

    pub(crate) fn cache_handle(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// The core's private cache, for host seeding and inspection.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.flags.contains(Flags::Halted)
    }

    /// Clears the sticky halt flag. This is the host-side release; the bus-side
    /// release is a wake request posted to the cache.
    pub fn release(&mut self) {
        self.flags.remove(Flags::Halted);
    }

    /// Reads the register named by an instruction operand.
    ///
    /// Operands 0..=7 are R0..R7 and 8 is the timer; anything larger is a fatal
    /// programmer error.
    #[must_use]
    pub fn reg(&self, operand: u8) -> Word {
        match operand {
            0..=7 => self.regs[usize::from(operand)],
            TIMER_OPERAND => self.timer,
            _ => panic!("core {}: register operand out of range: {operand}", self.id),
        }
    }

    fn set_reg(&mut self, operand: u8, value: Word) {
        match operand {
            0..=7 => self.regs[usize::from(operand)] = value,
            TIMER_OPERAND => self.timer = value,
            _ => panic!("core {}: register operand out of range: {operand}", self.id),
        }
    }

    /// Advances the core by one micro-step (`step_mode`) or one full
    /// instruction.
    ///
    /// A halted core does nothing. The bootstrap core first streams its program
    /// from memory bank 0 into the cache, one word per call, until the stack
    /// pointer wraps back to all-ones. Pending interrupts are serviced only at
    /// instruction boundaries, by redirecting the stack pointer to the
    /// interrupt vector.
    pub fn step(&mut self, step_mode: bool) {
        if self.cache.take_wake() {
            self.flags.remove(Flags::Halted);
        }

        if self.is_halted() {
            return;
        }

        let Some(bus) = self.bus.clone() else {
            log::error!("core {}: stepped with no bus attached", self.id);
            return;
        };

        if !self.initialized {
            if self.flags.contains(Flags::Overflow) {
                // The pointer wrapped past the whole cache: the program is in.
                self.flags.remove(Flags::Overflow);
                self.initialized = true;
                log::debug!("core {}: bootstrap complete, fetching from {:#x}", self.id, self.sp);
            } else {
                let word = bus.read(BusTarget::Memory, self.id, BOOT_CHANNEL, self.sp);
                self.cache.write(self.sp, word);
                self.retreat_sp();
                self.tick_timer();
                return;
            }
        }

        if self.new_instruction
            && self.interrupt_enabled
            && self.flags.contains(Flags::InterruptPending)
        {
            self.flags.remove(Flags::InterruptPending);
            self.interrupt_enabled = false;
            // The vector register is only as wide as a cache index.
            self.sp = self.interrupt_vector & (CACHE_SIZE - 1);
            log::trace!("core {}: servicing interrupt at {:#x}", self.id, self.sp);
        }

        if step_mode {
            self.micro_step(&bus);
        } else {
            self.micro_step(&bus);
            for _ in 1..self.current_instruction.cycles.max(1) {
                self.step(true);
            }
        }
    }

    fn micro_step(&mut self, bus: &Arc<Bus>) {
        match self.instruction_cycle {
            0 => {
                if self.timer.is_zero() {
                    self.flags.insert(Flags::InterruptPending);
                }
                self.instruction_cycle = 1;
                self.new_instruction = false;
                self.current_word = self.cache.read(self.sp);
                self.acc = self.current_word.hi32();
                self.current_instruction = Instruction::decode(self.acc);
                log::trace!(
                    "core {}: fetched {} at {:#x}",
                    self.id,
                    self.current_instruction,
                    self.sp
                );
                self.retreat_sp();
                self.tick_timer();
                self.cycles += 1;
            }
            1 => {
                if self.timer.is_zero() {
                    self.flags.insert(Flags::InterruptPending);
                }
                self.instruction_cycle = 0;
                self.new_instruction = true;
                self.execute(bus);
                self.tick_timer();
                self.cycles += 1;
                self.instructions_retired += 1;
            }
            _ => {
                self.instruction_cycle = 0;
                self.new_instruction = true;
            }
        }
    }

    fn execute(&mut self, bus: &Arc<Bus>) {
        let Instruction {
            opcode,
            dest,
            src1,
            src2,
            ..
        } = self.current_instruction;

        match opcode {
            Opcode::Xxx => {
                log::debug!("core {}: invalid instruction, halting", self.id);
                self.flags.set_halted(true);
            }
            Opcode::Add => {
                let (sum, carry) = self.reg(src1).carrying_add(self.reg(src2));
                self.set_reg(dest, sum);
                self.flags.set_overflow(carry);
                self.flags.update_zero_sign(sum);
            }
            Opcode::And => {
                let result = self.reg(src1) & self.reg(src2);
                self.set_reg(dest, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Or => {
                let result = self.reg(src1) | self.reg(src2);
                self.set_reg(dest, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Xor => {
                let result = self.reg(src1) ^ self.reg(src2);
                self.set_reg(dest, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Mov => {
                let result = self.reg(src1);
                self.set_reg(dest, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Bun => {
                self.sp = cache_index(self.reg(dest));
            }
            Opcode::Biz => {
                if self.flags.contains(Flags::Zero) {
                    self.sp = cache_index(self.reg(dest));
                }
            }
            Opcode::Bin => {
                if self.flags.contains(Flags::Sign) {
                    self.sp = cache_index(self.reg(dest));
                }
            }
            Opcode::Lda => {
                let index = self.reg(src1).as_usize();
                let value = bus.read(BusTarget::Memory, self.id, usize::from(dest), index);
                self.set_reg(dest, value);
                self.flags.update_zero_sign(value);
            }
            Opcode::Sta => {
                bus.write(
                    BusTarget::Memory,
                    self.id,
                    usize::from(src2),
                    usize::from(dest),
                    self.reg(src1),
                );
            }
            Opcode::Ldr => {
                let value = self.cache.read(cache_index(self.reg(src1)));
                self.set_reg(dest, value);
                self.flags.update_zero_sign(value);
            }
            Opcode::Str => {
                self.cache.write(cache_index(self.reg(dest)), self.reg(src1));
            }
            Opcode::Eql => {
                let equal = self.reg(src1) == self.reg(src2);
                self.flags.set_zero(equal);
            }
            Opcode::Grt => {
                // Historical mnemonic: the comparison is src1 < src2, unsigned.
                let below = self.reg(src1) < self.reg(src2);
                self.flags.set_sign(below);
            }
            Opcode::Shl => {
                let result = self.reg(src1) << 1;
                self.set_reg(src1, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Shr => {
                let result = self.reg(src1) >> 1;
                self.set_reg(src1, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Rol => {
                let result = self.reg(src1).rotate_left(1);
                self.set_reg(src1, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Ror => {
                let result = self.reg(src1).rotate_right(1);
                self.set_reg(src1, result);
                self.flags.update_zero_sign(result);
            }
            Opcode::Int => self.dispatch_workers(bus),
            Opcode::Hlt => {
                self.flags.set_halted(true);
            }
        }
    }

    /// Streams a cache-sized program region out of memory bank 0 into every
    /// worker core's cache, then optionally wakes them.
    ///
    /// Worker `c` receives `memory[0][CACHE_SIZE * c .. CACHE_SIZE * (c + 1))`.
    fn dispatch_workers(&mut self, bus: &Arc<Bus>) {
        if self.id != 0 {
            log::warn!("core {}: INT is reserved for the bootstrap core, ignored", self.id);
            return;
        }

        for worker in 1..bus.cache_count() {
            let base = CACHE_SIZE * worker;
            for offset in 0..CACHE_SIZE {
                let word = bus.read(BusTarget::Memory, self.id, BOOT_CHANNEL, base + offset);
                bus.write(BusTarget::Cache, self.id, worker, offset, word);
            }
            if self.release_on_int {
                bus.wake(self.id, worker);
            }
        }
    }

    fn retreat_sp(&mut self) {
        if self.sp == 0 {
            self.sp = CACHE_SIZE - 1;
            self.flags.insert(Flags::Overflow);
        } else {
            self.sp -= 1;
        }
    }

    fn tick_timer(&mut self) {
        if self.timer.decrement() {
            self.flags.insert(Flags::Overflow);
        }
    }
}
