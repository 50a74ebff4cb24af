use std::io::{Read, Write};

use super::{Lzp, RangeDecoder};
use crate::{internal::model::LiteralCoder, Error};

impl<R: Read> Lzp<RangeDecoder<R>> {
    /// Decodes up to `limit` bytes into `writer`. Returns the number of decoded bytes and whether
    /// the end marker was reached.
    pub(crate) fn decode_batch<W: Write>(
        &mut self,
        writer: &mut W,
        limit: u64,
    ) -> crate::Result<(u64, bool)> {
        for processed in 0..limit {
            let Some(symbol) = self.decode_symbol()? else {
                return Ok((processed, true));
            };
            writer.write_all(&[symbol])?;
        }
        Ok((limit, false))
    }

    /// Decodes the next byte, `None` once the end marker is found. The trailing drain byte is
    /// consumed together with the end marker.
    pub(crate) fn decode_symbol(&mut self) -> crate::Result<Option<u8>> {
        if !self.rc.decode_skewed()? {
            self.rc.finish()?;
            return Ok(None);
        }
        self.decode_single().map(Some)
    }

    fn decode_single(&mut self) -> crate::Result<u8> {
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

        let state = coded.state();
        let predicted = coded.predicted_symbol();
        let matched = rc.decode_flag(coded.see(state))?;
        let symbol = if matched {
            predicted
        } else {
            decode_literal(&mut model.literal, rc, context, predicted)?
        };
        coded.update_see(state, matched);
        coded.update_lzp(state, symbol, matched);

        if let Some(implied) = implied {
            let state = implied.state();
            let matched = implied.predicted_symbol() == symbol;
            implied.update_see_history(matched);
            implied.update_lzp(state, symbol, matched);
        }

        model.update_context(symbol);
        Ok(symbol)
    }
}

fn decode_literal<R: Read>(
    literal: &mut LiteralCoder,
    rc: &mut RangeDecoder<R>,
    context: u64,
    mispredicted: u8,
) -> crate::Result<u8> {
    literal.compute_context(context);

    let symbol = if literal.use_fixed_probabilities() {
        let target = rc.threshold(255)?;
        if target >= 255 {
            return Err(Error::CorruptPayload);
        }
        rc.decode(target, 1);
        (target + (target >= mispredicted as u32) as u32) as u8
    } else {
        let excluded = literal.frequency(mispredicted);
        let target = rc.threshold(literal.total() - excluded)?;
        let (symbol, start) = literal
            .find(target, mispredicted)
            .ok_or(Error::CorruptPayload)?;
        rc.decode(start, literal.frequency(symbol));
        symbol
    };

    literal.update_recent_cost(literal.frequency(symbol), literal.total());
    literal.update(symbol);
    Ok(symbol)
}
