//! Per-core status flag register.
//!
//! Every core carries an 8-bit flag register with five named bits:
//! interrupt-pending, overflow, zero, sign, and halted.

use bitflags::bitflags;
use fiat::Word;

bitflags! {
    /// Per-core status register.
    ///
    /// # Bit Layout
    ///
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// - - - H S Z V I
    /// ```
    ///
    /// - I (Interrupt Pending): Latched when the timer reaches zero; serviced at
    ///   the next instruction boundary
    /// - V (Overflow): Set on ADD carry-out and on timer/pointer wrap
    /// - Z (Zero): Set when a result is zero
    /// - S (Sign): Set when a result has bit 127 set
    /// - H (Halted): Sticky; only an external reset clears it
    ///
    /// Bits 5..7 are reserved zero.
    #[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Flags: u8 {
        const InterruptPending = 0b0000_0001; // I
        const Overflow = 0b0000_0010;         // V
        const Zero = 0b0000_0100;             // Z
        const Sign = 0b0000_1000;             // S
        const Halted = 0b0001_0000;           // H
    }
}

impl Flags {
    #[inline]
    pub fn set_interrupt_pending(&mut self, pending: bool) {
        self.set(Flags::InterruptPending, pending);
    }

    #[inline]
    pub fn set_overflow(&mut self, overflow: bool) {
        self.set(Flags::Overflow, overflow);
    }

    #[inline]
    pub fn set_zero(&mut self, zero: bool) {
        self.set(Flags::Zero, zero);
    }

    #[inline]
    pub fn set_sign(&mut self, sign: bool) {
        self.set(Flags::Sign, sign);
    }

    #[inline]
    pub fn set_halted(&mut self, halted: bool) {
        self.set(Flags::Halted, halted);
    }

    /// Updates the zero and sign bits from a result word.
    #[inline]
    pub fn update_zero_sign(&mut self, result: Word) {
        self.set_zero(result.is_zero());
        self.set_sign(result.is_signed());
    }

    #[must_use]
    #[inline]
    pub fn bit(self, flag: Flags) -> u8 {
        u8::from(self.contains(flag))
    }
}

impl From<Flags> for u8 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::Flags;
    use fiat::Word;

    #[test]
    fn bit_layout_matches_the_wire_format() {
        assert_eq!(Flags::InterruptPending.bits(), 1);
        assert_eq!(Flags::Overflow.bits(), 1 << 1);
        assert_eq!(Flags::Zero.bits(), 1 << 2);
        assert_eq!(Flags::Sign.bits(), 1 << 3);
        assert_eq!(Flags::Halted.bits(), 1 << 4);
    }

    #[test]
    fn zero_and_sign_track_the_result() {
        let mut flags = Flags::empty();
        flags.update_zero_sign(Word::ZERO);
        assert!(flags.contains(Flags::Zero));
        assert!(!flags.contains(Flags::Sign));

        flags.update_zero_sign(Word::MAX);
        assert!(!flags.contains(Flags::Zero));
        assert!(flags.contains(Flags::Sign));
    }
}
