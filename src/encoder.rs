use std::io::Write;

use crate::{
    internal::{Lzp, RangeEncoder},
    Error, Options, HEADER_VALUE,
};

/// A streaming encoder producing TarsaLZP compressed data.
///
/// The stream is only complete after [`LzpEncoder::finish`] wrote the end marker. Dropping the
/// encoder without finishing leaves a truncated stream behind. After a failed write the model
/// and the range encoder may have consumed part of the buffer, so every later call fails.
pub struct LzpEncoder<W: Write> {
    lzp: Lzp<RangeEncoder<W>>,
    failed: bool,
}

impl<W: Write> LzpEncoder<W> {
    /// Creates a new [`LzpEncoder`] and writes the stream header.
    pub fn new(mut writer: W, options: Options) -> crate::Result<Self> {
        writer.write_all(&HEADER_VALUE.to_be_bytes())?;
        writer.write_all(&options.to_packed().to_be_bytes())?;
        Self::new_raw(writer, options)
    }

    /// Creates a new [`LzpEncoder`] that writes no header, the decoder has to be created with
    /// the same options.
    pub fn new_raw(writer: W, options: Options) -> crate::Result<Self> {
        let lzp = Lzp::new_encoder(writer, &options)?;
        Ok(Self { lzp, failed: false })
    }

    /// Writes the end marker, drains the range encoder and returns the inner writer.
    pub fn finish(mut self) -> crate::Result<W> {
        if self.failed {
            return Err(Error::Poisoned);
        }
        self.lzp.finish()?;
        Ok(self.lzp.into_inner())
    }
}

impl<W: Write> Write for LzpEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.failed {
            return Err(Error::Poisoned.into());
        }

        if buf.is_empty() {
            return Ok(0);
        }

        for &byte in buf {
            if let Err(err) = self.lzp.encode_symbol(byte) {
                self.failed = true;
                return Err(err);
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.lzp.flush_writer()
    }
}
