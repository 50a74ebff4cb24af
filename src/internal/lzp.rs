mod decoder;
mod encoder;
mod range_coding;

use std::io::{Read, Write};

pub(crate) use range_coding::{RangeDecoder, RangeEncoder};

use super::model::Model;
use crate::Options;

/// A coding session: the adaptive model driving one range coder.
pub(crate) struct Lzp<RC> {
    model: Model,
    rc: RC,
}

impl<R: Read> Lzp<RangeDecoder<R>> {
    pub(crate) fn new_decoder(reader: R, options: &Options) -> crate::Result<Self> {
        let model = Model::new(options)?;
        let rc = RangeDecoder::new(reader)?;
        Ok(Self { model, rc })
    }

    pub(crate) fn into_inner(self) -> R {
        let RangeDecoder { reader, .. } = self.rc;
        reader
    }
}

impl<W: Write> Lzp<RangeEncoder<W>> {
    pub(crate) fn new_encoder(writer: W, options: &Options) -> crate::Result<Self> {
        let model = Model::new(options)?;
        let rc = RangeEncoder::new(writer);
        Ok(Self { model, rc })
    }

    pub(crate) fn into_inner(self) -> W {
        let RangeEncoder { writer, .. } = self.rc;
        writer
    }

    /// Flushes the inner writer, bytes held back for carry propagation stay pending.
    pub(crate) fn flush_writer(&mut self) -> Result<(), std::io::Error> {
        self.rc.writer.flush()
    }
}
