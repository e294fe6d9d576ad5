//! Register bit fields as plain `(mask, shift)` pairs.
//!
//! Register values travel through the driver as bare `u32` words. Each
//! named field is a `Field` constant that knows where it lives, so no code
//! depends on compiler bit-field layout or endianness.

/// A contiguous bit field inside a 32-bit register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Unshifted mask (`(1 << width) - 1`).
    pub mask: u32,
    /// Bit position of the least significant bit.
    pub shift: u32,
}

impl Field {
    /// Field of `width` bits starting at bit `shift`.
    #[must_use]
    pub const fn new(shift: u32, width: u32) -> Self {
        let mask = if width >= 32 { u32::MAX } else { (1 << width) - 1 };
        Self { mask, shift }
    }

    /// Single-bit field.
    #[must_use]
    pub const fn bit(shift: u32) -> Self {
        Self::new(shift, 1)
    }

    /// Mask already shifted into position.
    #[must_use]
    pub const fn in_place(self) -> u32 {
        self.mask << self.shift
    }

    /// Extract the field from `word`.
    #[must_use]
    pub const fn get(self, word: u32) -> u32 {
        (word >> self.shift) & self.mask
    }

    /// True if any bit of the field is set in `word`.
    #[must_use]
    pub const fn is_set(self, word: u32) -> bool {
        self.get(word) != 0
    }

    /// Replace the field in `word` with `value` (excess bits truncated).
    #[must_use]
    pub const fn insert(self, word: u32, value: u32) -> u32 {
        (word & !self.in_place()) | ((value & self.mask) << self.shift)
    }

    /// `value` positioned in an otherwise zero word.
    #[must_use]
    pub const fn encode(self, value: u32) -> u32 {
        self.insert(0, value)
    }

    /// True if `value` fits the field without truncation.
    #[must_use]
    pub const fn fits(self, value: u32) -> bool {
        value & !self.mask == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let f = Field::new(4, 4);
        let word = f.insert(0xFFFF_FFFF, 0x5);
        assert_eq!(word, 0xFFFF_FF5F);
        assert_eq!(f.get(word), 0x5);
    }

    #[test]
    fn insert_truncates() {
        let f = Field::new(0, 2);
        assert_eq!(f.encode(0x7), 0x3);
        assert!(!f.fits(0x7));
        assert!(f.fits(0x3));
    }

    #[test]
    fn full_width_field() {
        let f = Field::new(0, 32);
        assert_eq!(f.mask, u32::MAX);
        assert_eq!(f.get(0xDEAD_BEEF), 0xDEAD_BEEF);
    }
}
