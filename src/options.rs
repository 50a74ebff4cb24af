use std::fmt;

use crate::{
    Error, LITERAL_CODER_LIMIT_CEILING, LITERAL_CODER_MAX_INIT, LITERAL_CODER_MAX_ORDER,
    LITERAL_CODER_MAX_STEP, LITERAL_CODER_MIN_ORDER, LZP_MAX_CONTEXT_LENGTH, LZP_MAX_MASK_SIZE,
    LZP_MIN_MASK_SIZE,
};

/// Validated model configuration of a compressed stream.
///
/// An `Options` value can only be obtained through [`Options::new`], [`Options::from_packed`]
/// or [`Options::default`], so every instance satisfies all of the following:
///
/// - `literal_coder_order < lzp_low_context_length <= lzp_high_context_length <= 8`
/// - both mask sizes are between [`LZP_MIN_MASK_SIZE`] and [`LZP_MAX_MASK_SIZE`]
/// - `literal_coder_order` is 1 or 2
/// - `literal_coder_init` and `literal_coder_step` are between 1 and 127
/// - `literal_coder_init * 256 <= literal_coder_limit <= 32767 - literal_coder_step`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Options {
    lzp_low_context_length: u32,
    lzp_low_mask_size: u32,
    lzp_high_context_length: u32,
    lzp_high_mask_size: u32,
    literal_coder_order: u32,
    literal_coder_init: u32,
    literal_coder_step: u32,
    literal_coder_limit: u32,
}

impl Options {
    /// Creates new [`Options`], returns [`Error::InvalidOptions`] if any bound is violated.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lzp_low_context_length: u32,
        lzp_low_mask_size: u32,
        lzp_high_context_length: u32,
        lzp_high_mask_size: u32,
        literal_coder_order: u32,
        literal_coder_init: u32,
        literal_coder_step: u32,
        literal_coder_limit: u32,
    ) -> crate::Result<Self> {
        let mask_sizes = LZP_MIN_MASK_SIZE..=LZP_MAX_MASK_SIZE;
        let limit = literal_coder_limit as u64;

        let valid = lzp_low_context_length > literal_coder_order
            && lzp_low_context_length <= lzp_high_context_length
            && lzp_high_context_length <= LZP_MAX_CONTEXT_LENGTH
            && mask_sizes.contains(&lzp_low_mask_size)
            && mask_sizes.contains(&lzp_high_mask_size)
            && (LITERAL_CODER_MIN_ORDER..=LITERAL_CODER_MAX_ORDER).contains(&literal_coder_order)
            && (1..=LITERAL_CODER_MAX_INIT).contains(&literal_coder_init)
            && (1..=LITERAL_CODER_MAX_STEP).contains(&literal_coder_step)
            && limit >= literal_coder_init as u64 * 256
            && limit + literal_coder_step as u64 <= LITERAL_CODER_LIMIT_CEILING as u64;

        if !valid {
            return Err(Error::InvalidOptions);
        }

        Ok(Self {
            lzp_low_context_length,
            lzp_low_mask_size,
            lzp_high_context_length,
            lzp_high_mask_size,
            literal_coder_order,
            literal_coder_init,
            literal_coder_step,
            literal_coder_limit,
        })
    }

    /// Unpacks options stored in a stream header. The unpacked fields are validated again, so a
    /// damaged header is reported as [`Error::InvalidPackedOptions`].
    pub fn from_packed(packed: u64) -> crate::Result<Self> {
        Self::new(
            (packed >> 56 & 0xff) as u32,
            (packed >> 48 & 0xff) as u32,
            (packed >> 40 & 0xff) as u32,
            (packed >> 32 & 0xff) as u32,
            (packed >> 31 & 0x01) as u32 + 1,
            (packed >> 24 & 0x7f) as u32,
            (packed >> 16 & 0xff) as u32,
            (packed & 0xffff) as u32,
        )
        .map_err(|_| Error::InvalidPackedOptions { packed })
    }

    /// Packs the options into the 64 bit header layout.
    pub fn to_packed(&self) -> u64 {
        ((self.lzp_low_context_length as u64 & 0xff) << 56)
            | ((self.lzp_low_mask_size as u64 & 0xff) << 48)
            | ((self.lzp_high_context_length as u64 & 0xff) << 40)
            | ((self.lzp_high_mask_size as u64 & 0xff) << 32)
            | (((self.literal_coder_order as u64 - 1) & 0x01) << 31)
            | ((self.literal_coder_init as u64 & 0x7f) << 24)
            | ((self.literal_coder_step as u64 & 0xff) << 16)
            | (self.literal_coder_limit as u64 & 0xffff)
    }

    pub fn lzp_low_context_length(&self) -> u32 {
        self.lzp_low_context_length
    }

    pub fn lzp_low_mask_size(&self) -> u32 {
        self.lzp_low_mask_size
    }

    pub fn lzp_high_context_length(&self) -> u32 {
        self.lzp_high_context_length
    }

    pub fn lzp_high_mask_size(&self) -> u32 {
        self.lzp_high_mask_size
    }

    pub fn literal_coder_order(&self) -> u32 {
        self.literal_coder_order
    }

    pub fn literal_coder_init(&self) -> u32 {
        self.literal_coder_init
    }

    pub fn literal_coder_step(&self) -> u32 {
        self.literal_coder_step
    }

    pub fn literal_coder_limit(&self) -> u32 {
        self.literal_coder_limit
    }

    /// Returns `true` if both LZP models share context length and table size, in which case only
    /// the low model is kept.
    pub fn only_low_lzp(&self) -> bool {
        self.lzp_low_context_length == self.lzp_high_context_length
            && self.lzp_low_mask_size == self.lzp_high_mask_size
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            lzp_low_context_length: 4,
            lzp_low_mask_size: 24,
            lzp_high_context_length: 8,
            lzp_high_mask_size: 27,
            literal_coder_order: 2,
            literal_coder_init: 1,
            literal_coder_step: 60,
            literal_coder_limit: 30000,
        }
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Options[lzpLowContextLength={}, lzpLowMaskSize={}, lzpHighContextLength={}, \
             lzpHighMaskSize={}, literalCoderOrder={}, literalCoderInit={}, \
             literalCoderStep={}, literalCoderLimit={}]",
            self.lzp_low_context_length,
            self.lzp_low_mask_size,
            self.lzp_high_context_length,
            self.lzp_high_mask_size,
            self.literal_coder_order,
            self.literal_coder_init,
            self.literal_coder_step,
            self.literal_coder_limit,
        )
    }
}
