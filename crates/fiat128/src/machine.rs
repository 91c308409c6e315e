//! The top-level machine: cores, memory banks, and the bus that joins them.

use crate::instruction::{Instruction, Opcode};
use crate::processor::core::Core;
use fiat::{Bus, MemoryBank, Word};
use std::sync::Arc;

/// A complete FIAT128 system.
///
/// The machine owns every core and memory bank; the bus holds only weak
/// references to both, and each core carries a shared handle back to the bus.
/// Nothing inside a core or the bus ever frees another participant.
///
/// The host drives the machine through the seeding methods and [`step`],
/// then inspects core state directly.
///
/// # Examples
///
/// ```
/// use fiat128::{Machine, Opcode, Word};
///
/// let mut machine = Machine::new(1, 1, 256);
/// machine.set_word_in_memory(0, 3, Word(42));
/// assert_eq!(machine.read_memory(0, 3), Word(42));
///
/// // Seed an instruction straight into core 0's cache and look at it.
/// machine.set_instruction_in_cpu(0, 0, Opcode::Hlt, 0, 0, 0);
/// assert_eq!(machine.core(0).cache().read(0).hi32(), 0x1400_0000);
/// ```
#[derive(Debug)]
pub struct Machine {
    cores: Vec<Core>,
    banks: Vec<Arc<MemoryBank>>,
    bus: Arc<Bus>,
}

impl Machine {
    /// Builds a machine with `core_count` cores and `bank_count` memory banks
    /// of `bank_size` words each.
    ///
    /// Core ids are assigned positionally, so every machine gets its own id 0
    /// bootstrap core regardless of how many machines share the process.
    #[must_use]
    pub fn new(core_count: usize, bank_count: usize, bank_size: usize) -> Self {
        assert!(core_count > 0, "a machine needs at least one core");
        assert!(bank_count > 0, "a machine needs at least one memory bank");

        let banks: Vec<Arc<MemoryBank>> = (0..bank_count)
            .map(|_| Arc::new(MemoryBank::new(bank_size)))
            .collect();
        let mut cores: Vec<Core> = (0..core_count).map(Core::new).collect();
        let caches: Vec<_> = cores.iter().map(|core| Arc::clone(core.cache_handle())).collect();

        let bus = Arc::new(Bus::new(&banks, &caches));
        for core in &mut cores {
            core.attach_bus(Arc::clone(&bus));
        }

        log::debug!("machine: {core_count} cores, {bank_count} banks of {bank_size} words");

        Self { cores, banks, bus }
    }

    /// Makes INT wake the workers it seeds, instead of leaving them halted.
    #[must_use]
    pub fn release_workers_on_int(mut self, enabled: bool) -> Self {
        for core in &mut self.cores {
            core.release_on_int = enabled;
        }
        self
    }

    /// Stores a word in a memory bank.
    pub fn set_word_in_memory(&self, channel: usize, index: usize, word: Word) {
        self.bank(channel).write(index, word);
    }

    /// Packs and stores an instruction in a memory bank.
    pub fn set_instruction_in_memory(
        &self,
        channel: usize,
        index: usize,
        opcode: Opcode,
        dest: u8,
        src1: u8,
        src2: u8,
    ) {
        self.bank(channel)
            .write_instruction(index, Instruction::encode(opcode, dest, src1, src2));
    }

    /// Stores a word directly in a core's cache.
    pub fn set_word_in_cpu(&mut self, core_id: usize, index: usize, word: Word) {
        self.core(core_id).cache().write(index, word);
    }

    /// Packs and stores an instruction directly in a core's cache.
    pub fn set_instruction_in_cpu(
        &mut self,
        core_id: usize,
        index: usize,
        opcode: Opcode,
        dest: u8,
        src1: u8,
        src2: u8,
    ) {
        let word = Word::from_instruction_bytes(Instruction::encode(opcode, dest, src1, src2));
        self.core(core_id).cache().write(index, word);
    }

    /// Advances every core by one micro-step (`step_mode`) or one full
    /// instruction, in deterministic round-robin order.
    pub fn step(&mut self, step_mode: bool) {
        for core in &mut self.cores {
            core.step(step_mode);
        }
    }

    /// Advances every core concurrently, one host thread per core, joining
    /// before returning.
    ///
    /// Equivalent to [`step`](Self::step) for programs whose cores touch
    /// disjoint banks; cores racing on a shared bank serialize on that bank's
    /// lock in an unspecified order.
    pub fn step_concurrent(&mut self, step_mode: bool) {
        std::thread::scope(|scope| {
            for core in &mut self.cores {
                scope.spawn(move || core.step(step_mode));
            }
        });
    }

    /// Clears a core's sticky halt flag from the host side.
    pub fn release_core(&mut self, core_id: usize) {
        assert!(core_id < self.cores.len(), "no such core: {core_id}");
        self.cores[core_id].release();
    }

    /// Reads a word out of a memory bank.
    #[must_use]
    pub fn read_memory(&self, channel: usize, index: usize) -> Word {
        self.bank(channel).read(index)
    }

    /// Borrows a core for inspection.
    #[must_use]
    pub fn core(&self, core_id: usize) -> &Core {
        assert!(core_id < self.cores.len(), "no such core: {core_id}");
        &self.cores[core_id]
    }

    /// Borrows a core mutably, e.g. to seed registers before a run.
    #[must_use]
    pub fn core_mut(&mut self, core_id: usize) -> &mut Core {
        assert!(core_id < self.cores.len(), "no such core: {core_id}");
        &mut self.cores[core_id]
    }

    /// Every core, in id order.
    #[must_use]
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    /// The shared bus, e.g. for issuing raw endpoint traffic in tests.
    #[must_use]
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    fn bank(&self, channel: usize) -> &MemoryBank {
        assert!(channel < self.banks.len(), "no such memory channel: {channel}");
        &self.banks[channel]
    }
}
