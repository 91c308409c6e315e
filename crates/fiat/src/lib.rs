pub mod bus;
pub use bus::{Bus, BusTarget};
pub mod cache;
pub use cache::{CACHE_SIZE, Cache, cache_index};
pub mod memory;
pub use memory::MemoryBank;
pub mod word;
pub use word::Word;
