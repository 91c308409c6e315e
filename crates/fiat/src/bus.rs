//! The arbiter carrying reads and writes between cores, caches, and memory.

use crate::cache::Cache;
use crate::memory::MemoryBank;
use crate::word::Word;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Which kind of endpoint a bus access names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusTarget {
    /// `channel` names a memory bank.
    Memory,
    /// `channel` names a core whose cache is being addressed.
    Cache,
}

/// Routes word traffic to memory banks and, for the bootstrap core only, into
/// other cores' caches.
///
/// The bus holds weak references to every endpoint; ownership stays with the
/// machine. Distinct banks may be accessed in parallel (each has its own lock),
/// while cross-core cache writes serialize on the bus-wide `cpu_mutex`.
///
/// Only core 0 may address caches through the bus. Cache reads by any other
/// requester return zero and cache writes by any other requester are dropped;
/// this is the whole permission model.
#[derive(Debug)]
pub struct Bus {
    banks: Vec<Weak<MemoryBank>>,
    caches: Vec<Weak<Cache>>,
    cpu_mutex: Mutex<()>,
    /// One bit per endpoint, reserved for future arbitration.
    pub in_state: Vec<AtomicBool>,
    /// One bit per endpoint, reserved for future arbitration.
    pub out_state: Vec<AtomicBool>,
}

impl Bus {
    /// Connects a bus to every bank and cache of a machine.
    #[must_use]
    pub fn new(banks: &[Arc<MemoryBank>], caches: &[Arc<Cache>]) -> Self {
        let endpoints = banks.len() + caches.len();
        Self {
            banks: banks.iter().map(Arc::downgrade).collect(),
            caches: caches.iter().map(Arc::downgrade).collect(),
            cpu_mutex: Mutex::new(()),
            in_state: (0..endpoints).map(|_| AtomicBool::new(false)).collect(),
            out_state: (0..endpoints).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Number of memory banks connected to the bus.
    #[inline]
    #[must_use]
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    /// Number of core caches connected to the bus.
    #[inline]
    #[must_use]
    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }

    /// Reads a word from the addressed endpoint.
    ///
    /// Cache reads are not serialized; the bootstrap core is responsible for
    /// quiescence of the target.
    #[must_use]
    pub fn read(&self, target: BusTarget, requester: usize, channel: usize, index: usize) -> Word {
        match target {
            BusTarget::Memory => match self.bank(channel) {
                Some(bank) => bank.read(index),
                None => Word::ZERO,
            },
            BusTarget::Cache => {
                if requester != 0 {
                    return Word::ZERO;
                }
                match self.cache(channel) {
                    Some(cache) => cache.read(index),
                    None => Word::ZERO,
                }
            }
        }
    }

    /// Writes a word to the addressed endpoint.
    ///
    /// Cross-core cache writes take the bus-wide `cpu_mutex`; writes from any
    /// requester other than core 0 are dropped.
    pub fn write(&self, target: BusTarget, requester: usize, channel: usize, index: usize, value: Word) {
        match target {
            BusTarget::Memory => {
                if let Some(bank) = self.bank(channel) {
                    bank.write(index, value);
                }
            }
            BusTarget::Cache => {
                if requester != 0 {
                    log::warn!("bus: core {requester} may not write core {channel}'s cache, dropped");
                    return;
                }
                if let Some(cache) = self.cache(channel) {
                    let _guard = self.cpu_mutex.lock().unwrap_or_else(PoisonError::into_inner);
                    cache.write(index, value);
                }
            }
        }
    }

    /// Packs a 4-byte instruction and writes it to the addressed endpoint.
    pub fn write_instruction(
        &self,
        target: BusTarget,
        requester: usize,
        channel: usize,
        index: usize,
        bytes: [u8; 4],
    ) {
        self.write(target, requester, channel, index, Word::from_instruction_bytes(bytes));
    }

    /// Posts a wake request to core `channel`'s cache.
    ///
    /// Like cache writes, waking is a core-0 privilege; other requesters are
    /// dropped.
    pub fn wake(&self, requester: usize, channel: usize) {
        if requester != 0 {
            log::warn!("bus: core {requester} may not wake core {channel}, dropped");
            return;
        }
        if let Some(cache) = self.cache(channel) {
            cache.post_wake();
        }
    }

    fn bank(&self, channel: usize) -> Option<Arc<MemoryBank>> {
        assert!(channel < self.banks.len(), "memory channel out of range: {channel}");
        let bank = self.banks[channel].upgrade();
        if bank.is_none() {
            log::error!("bus: memory channel {channel} is gone");
        }
        bank
    }

    fn cache(&self, channel: usize) -> Option<Arc<Cache>> {
        assert!(channel < self.caches.len(), "core channel out of range: {channel}");
        let cache = self.caches[channel].upgrade();
        if cache.is_none() {
            log::error!("bus: core channel {channel} is gone");
        }
        cache
    }
}
