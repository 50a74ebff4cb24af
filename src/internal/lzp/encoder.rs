use std::io::{ErrorKind, Read, Write};

use super::{Lzp, RangeEncoder};
use crate::internal::model::LiteralCoder;

/// Reads a single byte, `None` signals the end of the input.
fn next_byte<R: Read>(reader: &mut R) -> Result<Option<u8>, std::io::Error> {
    let mut buffer = [0];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buffer[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

impl<W: Write> Lzp<RangeEncoder<W>> {
    /// Encodes up to `limit` bytes from `reader` and returns how many were read. A count below
    /// `limit` means the input is exhausted.
    pub(crate) fn encode_batch<R: Read>(
        &mut self,
        reader: &mut R,
        limit: u64,
    ) -> Result<u64, std::io::Error> {
        for processed in 0..limit {
            let Some(symbol) = next_byte(reader)? else {
                return Ok(processed);
            };
            self.encode_symbol(symbol)?;
        }
        Ok(limit)
    }

    /// Encodes one byte of the stream, preceded by the "not finished" flag.
    pub(crate) fn encode_symbol(&mut self, symbol: u8) -> Result<(), std::io::Error> {
        self.rc.encode_skewed(true)?;
        self.encode_single(symbol)
    }

    /// Writes the end marker and drains the range encoder.
    pub(crate) fn finish(&mut self) -> Result<(), std::io::Error> {
        self.rc.encode_skewed(false)?;
        self.rc.flush()
    }

    fn encode_single(&mut self, symbol: u8) -> Result<(), std::io::Error> {
        self.model.compute_hashes();

        let Lzp { model, rc } = self;
        let context = model.context;
        let (coded, implied) = match &mut model.high {
            None => (&mut model.low, None),
            Some(high) => {
                let low_probability = model.low.see(model.low.state());
                let high_probability = high.see(high.state());
                if low_probability >= high_probability {
                    (&mut model.low, Some(high))
                } else {
                    (high, Some(&mut model.low))
                }
            }
        };

        if let Some(implied) = implied {
            let state = implied.state();
            let matched = implied.predicted_symbol() == symbol;
            implied.update_see_history(matched);
            implied.update_lzp(state, symbol, matched);
        }

        let state = coded.state();
        let predicted = coded.predicted_symbol();
        let matched = predicted == symbol;
        rc.encode_flag(coded.see(state), matched)?;
        coded.update_see(state, matched);
        coded.update_lzp(state, symbol, matched);
        if !matched {
            encode_literal(&mut model.literal, rc, context, symbol, predicted)?;
        }

        model.update_context(symbol);
        Ok(())
    }
}

/// Codes `symbol` with the literal coder, the mispredicted symbol is excluded from the alphabet.
fn encode_literal<W: Write>(
    literal: &mut LiteralCoder,
    rc: &mut RangeEncoder<W>,
    context: u64,
    symbol: u8,
    mispredicted: u8,
) -> Result<(), std::io::Error> {
    literal.compute_context(context);

    if literal.use_fixed_probabilities() {
        rc.encode(symbol as u32 - (symbol > mispredicted) as u32, 1, 255)?;
    } else {
        let excluded = literal.frequency(mispredicted);
        let mut start = literal.cumulative_frequency(symbol);
        if symbol > mispredicted {
            start -= excluded;
        }
        rc.encode(start, literal.frequency(symbol), literal.total() - excluded)?;
    }

    literal.update_recent_cost(literal.frequency(symbol), literal.total());
    literal.update(symbol);
    Ok(())
}
