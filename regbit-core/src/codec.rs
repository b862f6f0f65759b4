//! Bit-field codec
//!
//! Pure mask/shift math mapping between a right-aligned field value and its
//! positioned representation inside an 8-bit or 16-bit register word.
//!
//! A field is `length` contiguous bits whose lowest bit sits at `bit_start`:
//!
//! ```text
//!  bit:   7   6   5   4   3   2   1   0
//!       ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!       │ 1 │ 0 │ 1 │ 1 │ 0 │ 1 │ 0 │ 0 │   register = 0b1011_0100
//!       └───┴───┴───┼───┴───┴───┼───┴───┘
//!                   └─ start=2, length=3 ─┘  -> 0b101 = 5
//! ```
//!
//! None of these functions validate the field against the register width.
//! A field that runs past the top of the word yields a truncated value; the
//! register accessor checks [`FieldSpec::fits`] before it touches the bus.

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
}

/// Register data width (`u8` or `u16`)
pub trait RegisterWord: Copy + Default + PartialEq + core::fmt::Debug + sealed::Sealed {
    /// Width in bits
    const BITS: u8;
    /// Width in bytes on the wire
    const BYTES: usize;
    /// Maximum number of units in a single block write
    const MAX_BLOCK_WRITE: usize;

    /// Widen to `u32` for mask arithmetic
    fn to_u32(self) -> u32;

    /// Narrow from `u32`, discarding bits above the word width
    fn truncate_from(value: u32) -> Self;

    /// Encode most-significant byte first into `out[..Self::BYTES]`
    fn encode_be(self, out: &mut [u8]);

    /// Decode most-significant byte first from `bytes[..Self::BYTES]`
    fn decode_be(bytes: &[u8]) -> Self;
}

impl RegisterWord for u8 {
    const BITS: u8 = 8;
    const BYTES: usize = 1;
    const MAX_BLOCK_WRITE: usize = 127;

    fn to_u32(self) -> u32 {
        u32::from(self)
    }

    fn truncate_from(value: u32) -> Self {
        value as u8
    }

    fn encode_be(self, out: &mut [u8]) {
        out[0] = self;
    }

    fn decode_be(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl RegisterWord for u16 {
    const BITS: u8 = 16;
    const BYTES: usize = 2;
    const MAX_BLOCK_WRITE: usize = 63;

    fn to_u32(self) -> u32 {
        u32::from(self)
    }

    fn truncate_from(value: u32) -> Self {
        value as u16
    }

    fn encode_be(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_be_bytes());
    }

    fn decode_be(bytes: &[u8]) -> Self {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

/// Position and size of a bit field inside a register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSpec {
    bit_start: u8,
    length: u8,
}

impl FieldSpec {
    /// Widest register supported
    pub const MAX_BITS: u8 = 16;

    /// Create a field of `length` bits whose lowest bit is `bit_start`
    ///
    /// Returns `None` unless `1 <= length` and the field ends at or below
    /// bit 15. Whether it fits an 8-bit register is checked separately by
    /// [`FieldSpec::fits`].
    pub const fn new(bit_start: u8, length: u8) -> Option<Self> {
        if length == 0 || length > Self::MAX_BITS || bit_start >= Self::MAX_BITS {
            return None;
        }
        if bit_start + length > Self::MAX_BITS {
            return None;
        }
        Some(Self { bit_start, length })
    }

    /// Single-bit field
    pub const fn bit(bit: u8) -> Option<Self> {
        Self::new(bit, 1)
    }

    /// Create a field from its most significant bit
    ///
    /// Datasheets (and register maps written for Arduino-style I2Cdev
    /// libraries) often name a field by its top bit: `msb = 4, length = 2`
    /// covers bits 4..=3.
    pub const fn from_msb(msb: u8, length: u8) -> Option<Self> {
        if length == 0 || msb >= Self::MAX_BITS || length > msb + 1 {
            return None;
        }
        Self::new(msb + 1 - length, length)
    }

    /// Lowest bit of the field
    pub const fn bit_start(self) -> u8 {
        self.bit_start
    }

    /// Number of bits in the field
    pub const fn length(self) -> u8 {
        self.length
    }

    /// Highest bit of the field (inclusive)
    pub const fn msb(self) -> u8 {
        self.bit_start + self.length - 1
    }

    /// Check whether the field lies inside a register of width `W`
    pub fn fits<W: RegisterWord>(self) -> bool {
        self.bit_start + self.length <= W::BITS
    }
}

/// Right-aligned all-ones mask of `length` bits (`length <= 16`)
const fn low_mask(length: u8) -> u32 {
    (1u32 << length) - 1
}

/// Positioned mask covering `field`
pub fn field_mask<W: RegisterWord>(field: FieldSpec) -> W {
    W::truncate_from(low_mask(field.length) << field.bit_start)
}

/// Extract `field` from `register` as a right-aligned value
///
/// Reading `0b101` from any offset yields `5`.
pub fn extract_field<W: RegisterWord>(register: W, field: FieldSpec) -> W {
    W::truncate_from((register.to_u32() >> field.bit_start) & low_mask(field.length))
}

/// Place the right-aligned `value` into `field` of `register`
///
/// Bits of `value` above the field length are discarded and bits outside
/// the field keep their original value. Returns the new full register
/// value; the caller still has to write it back.
pub fn inject_field<W: RegisterWord>(register: W, field: FieldSpec, value: W) -> W {
    let mask = low_mask(field.length) << field.bit_start;
    let cleared = register.to_u32() & !mask;
    W::truncate_from(cleared | ((value.to_u32() << field.bit_start) & mask))
}

/// Read a single bit (`bit` past the word width reads as clear)
pub fn extract_bit<W: RegisterWord>(register: W, bit: u8) -> bool {
    register
        .to_u32()
        .checked_shr(u32::from(bit))
        .map_or(false, |v| v & 1 != 0)
}

/// Set or clear a single bit, leaving every other bit untouched
pub fn inject_bit<W: RegisterWord>(register: W, bit: u8, value: bool) -> W {
    let mask = 1u32.checked_shl(u32::from(bit)).unwrap_or(0);
    let raw = register.to_u32();
    W::truncate_from(if value { raw | mask } else { raw & !mask })
}
