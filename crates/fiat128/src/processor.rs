//! Processor core and status flags.

pub mod core;
pub mod flags;

pub use self::core::{BOOT_CHANNEL, Core};
pub use self::flags::Flags;
