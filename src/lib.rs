//! TarsaLZP compression / decompression.
//!
//! The compressor predicts every byte with two LZP (Lempel-Ziv-Predictive) models of different
//! context lengths and codes a single match flag with a binary range coder. Only when both
//! predictions fail is the byte coded by an adaptive order-1/order-2 literal coder. The match
//! probabilities are refined by a secondary estimation stage keyed by a finite-state confidence
//! value and the recent match history.
//!
//! The following entry points are provided:
//!
//! - [`encode`] / [`decode`] drive a whole stream in batches and report progress.
//! - [`encode_raw`] / [`decode_raw`] do the same without the 16 byte stream header.
//! - [`LzpEncoder`] / [`LzpDecoder`] are streaming [`std::io::Write`] / [`std::io::Read`]
//!   adapters.
//!
//! ## Stream format
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 8 | [`HEADER_VALUE`], big-endian |
//! | 8 | 8 | packed [`Options`], big-endian |
//! | 16 | .. | range coded payload, terminated in-band, followed by five drain bytes |
//!
//! ## Acknowledgement
//!
//! The algorithm is TarsaLZP by Piotr Tarsa (2012).
mod coder;
mod decoder;
mod encoder;
mod internal;
mod options;

pub use coder::{
    decode, decode_raw, encode, encode_raw, read_options, read_options_headerless, Progress,
};
pub use decoder::LzpDecoder;
pub use encoder::LzpEncoder;
pub use options::Options;

/// Magic value at the start of every compressed stream.
pub const HEADER_VALUE: u64 = 2345174324078614718;

pub const LZP_MIN_MASK_SIZE: u32 = 15;

pub const LZP_MAX_MASK_SIZE: u32 = 30;

pub const LZP_MAX_CONTEXT_LENGTH: u32 = 8;

pub const LITERAL_CODER_MIN_ORDER: u32 = 1;

pub const LITERAL_CODER_MAX_ORDER: u32 = 2;

pub const LITERAL_CODER_MAX_INIT: u32 = 127;

pub const LITERAL_CODER_MAX_STEP: u32 = 127;

/// Upper bound for `literal_coder_limit + literal_coder_step`, frequencies are stored in 15 bits.
pub const LITERAL_CODER_LIMIT_CEILING: u32 = 32767;

/// Number of symbols processed between two progress reports by default.
pub const DEFAULT_BATCH_SIZE: u64 = 1 << 16;

pub type Result<T> = core::result::Result<T, Error>;

/// Crate error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The options violate one of the documented bounds.
    #[error("Invalid compression options")]
    InvalidOptions,
    /// A batch size of zero was requested.
    #[error("Batch size has to be positive")]
    InvalidBatchSize,
    /// The stream does not start with [`HEADER_VALUE`].
    #[error("Wrong file header {found:#018x}, probably not a compressed stream")]
    InvalidHeader { found: u64 },
    /// The packed options stored in the stream are out of range.
    #[error("Invalid packed compression options {packed:#018x}")]
    InvalidPackedOptions { packed: u64 },
    /// The input ended before the end marker was decoded.
    #[error("Unexpected end of compressed stream")]
    UnexpectedEof,
    /// The range decoder arrived at a value the encoder can never produce.
    #[error("Corrupt compressed payload")]
    CorruptPayload,
    /// A model table could not be allocated.
    #[error("Memory allocation of {bytes} bytes failed (out of memory?)")]
    MemoryAllocation { bytes: usize },
    /// An earlier call on the same streaming encoder or decoder failed, the coder state is lost.
    #[error("Stream is unusable after a previous error")]
    Poisoned,
    /// General IO error.
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::UnexpectedEof => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, Error::UnexpectedEof)
            }
            err @ Error::MemoryAllocation { .. } => {
                std::io::Error::new(std::io::ErrorKind::OutOfMemory, err)
            }
            err @ Error::Poisoned => std::io::Error::other(err),
            err @ (Error::InvalidOptions | Error::InvalidBatchSize) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
            }
            err => std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Error;

    #[test]
    fn error_kind_mapping() {
        let err: std::io::Error = Error::UnexpectedEof.into();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);

        let err: std::io::Error = Error::InvalidHeader { found: 0 }.into();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        let err: std::io::Error = Error::MemoryAllocation { bytes: 1 }.into();
        assert_eq!(err.kind(), std::io::ErrorKind::OutOfMemory);

        let err: std::io::Error = Error::InvalidOptions.into();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

        let err: std::io::Error = Error::Poisoned.into();
        assert_eq!(err.kind(), std::io::ErrorKind::Other);
    }

    #[test]
    fn io_error_passes_through() {
        let inner = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: std::io::Error = Error::Io(inner).into();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
