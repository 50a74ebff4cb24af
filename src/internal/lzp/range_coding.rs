use std::io::{Read, Write};

use crate::Error;

/// The coder works on 31 bit registers, so a carry shows up in bit 31.
const REGISTER_MASK: u32 = 0x7FFF_FFFF;
const CARRY_BIT: u32 = 0x8000_0000;
const K_BOT_VALUE: u32 = 1 << 23;
const OUTPUT_SHIFT: u32 = 23;
const FLUSH_BYTES: usize = 5;

/// Bytes already shifted out of the low register but not yet final, because a later carry may
/// still increment them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CarryState {
    Idle,
    Holding(u8),
    /// A held byte followed by the given number of `0xFF` bytes.
    HoldingRun(u8, u64),
}

pub(crate) struct RangeEncoder<W: Write> {
    pub(crate) range: u32,
    pub(crate) low: u32,
    carry: CarryState,
    pub(crate) writer: W,
}

impl<W: Write> RangeEncoder<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            range: REGISTER_MASK,
            low: 0,
            carry: CarryState::Idle,
            writer,
        }
    }

    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<(), std::io::Error> {
        self.writer.write_all(&[byte])
    }

    fn write_run(&mut self, byte: u8, count: u64) -> Result<(), std::io::Error> {
        for _ in 0..count {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Hands a byte that left the low register to the carry machine.
    fn shift_out(&mut self, byte: u8) -> Result<(), std::io::Error> {
        self.carry = match self.carry {
            CarryState::Idle => CarryState::Holding(byte),
            CarryState::Holding(held) if byte == 0xFF => CarryState::HoldingRun(held, 1),
            CarryState::HoldingRun(held, run) if byte == 0xFF => {
                CarryState::HoldingRun(held, run + 1)
            }
            CarryState::Holding(_) | CarryState::HoldingRun(..) => {
                self.release()?;
                CarryState::Holding(byte)
            }
        };
        Ok(())
    }

    /// Propagates a carry into the pending bytes and writes them out.
    fn propagate_carry(&mut self) -> Result<(), std::io::Error> {
        match self.carry {
            // The low register is at most one range below the last output, so a carry always
            // has a held byte to land in.
            CarryState::Idle => debug_assert!(false, "carry without a pending byte"),
            CarryState::Holding(held) => self.write_byte(held.wrapping_add(1))?,
            CarryState::HoldingRun(held, run) => {
                self.write_byte(held.wrapping_add(1))?;
                self.write_run(0x00, run)?;
            }
        }
        self.carry = CarryState::Idle;
        Ok(())
    }

    /// Writes all pending bytes unchanged.
    fn release(&mut self) -> Result<(), std::io::Error> {
        match self.carry {
            CarryState::Idle => {}
            CarryState::Holding(held) => self.write_byte(held)?,
            CarryState::HoldingRun(held, run) => {
                self.write_byte(held)?;
                self.write_run(0xFF, run)?;
            }
        }
        self.carry = CarryState::Idle;
        Ok(())
    }

    #[inline(always)]
    fn add_with_carry(&mut self, value: u32) -> Result<(), std::io::Error> {
        self.low += value;
        if self.low & CARRY_BIT != 0 {
            self.low &= REGISTER_MASK;
            self.propagate_carry()?;
        }
        Ok(())
    }

    #[inline(always)]
    fn normalize(&mut self) -> Result<(), std::io::Error> {
        while self.range < K_BOT_VALUE {
            self.shift_out((self.low >> OUTPUT_SHIFT) as u8)?;
            self.low = (self.low << 8) & REGISTER_MASK;
            self.range <<= 8;
        }
        Ok(())
    }

    /// Codes a binary decision, `probability` is the chance of a match with 15 fractional bits.
    #[inline(always)]
    pub(crate) fn encode_flag(
        &mut self,
        probability: u16,
        matched: bool,
    ) -> Result<(), std::io::Error> {
        self.normalize()?;
        let helper = (self.range >> 15) * probability as u32;
        if matched {
            self.range = helper;
        } else {
            self.add_with_carry(helper)?;
            self.range -= helper;
        }
        Ok(())
    }

    /// Codes a flag that is nearly always `true`. `false` collapses the range and ends the
    /// stream.
    #[inline(always)]
    pub(crate) fn encode_skewed(&mut self, flag: bool) -> Result<(), std::io::Error> {
        self.normalize()?;
        if flag {
            self.range -= 1;
        } else {
            self.add_with_carry(self.range - 1)?;
            self.range = 1;
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn encode(&mut self, start: u32, size: u32, total: u32) -> Result<(), std::io::Error> {
        self.normalize()?;
        self.range /= total;
        self.add_with_carry(start * self.range)?;
        self.range *= size;
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<(), std::io::Error> {
        for _ in 0..FLUSH_BYTES {
            self.shift_out(((self.low >> OUTPUT_SHIFT) & 0xFF) as u8)?;
            self.low <<= 8;
        }
        self.release()?;
        self.writer.flush()
    }
}

pub(crate) struct RangeDecoder<R: Read> {
    pub(crate) range: u32,
    pub(crate) code: u32,
    /// Lowest bit of the previous input byte, the decoder runs one bit behind the byte grid.
    next_high_bit: u32,
    pub(crate) reader: R,
}

impl<R: Read> RangeDecoder<R> {
    pub(crate) fn new(reader: R) -> crate::Result<Self> {
        let mut decoder = Self {
            range: REGISTER_MASK,
            code: 0,
            next_high_bit: 0,
            reader,
        };

        for _ in 0..4 {
            decoder.code = decoder.code << 8 | decoder.input_byte()?;
        }

        Ok(decoder)
    }

    #[inline(always)]
    fn read_byte(&mut self) -> crate::Result<u32> {
        let mut buffer = [0];
        match self.reader.read_exact(&mut buffer) {
            Ok(()) => Ok(buffer[0] as u32),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::UnexpectedEof)
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    #[inline(always)]
    fn input_byte(&mut self) -> crate::Result<u32> {
        let byte = self.read_byte()?;
        let current = (byte >> 1) | (self.next_high_bit << 7);
        self.next_high_bit = byte & 1;
        Ok(current)
    }

    #[inline(always)]
    fn normalize(&mut self) -> crate::Result<()> {
        while self.range < K_BOT_VALUE {
            self.code = self.code << 8 | self.input_byte()?;
            self.range <<= 8;
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn decode_flag(&mut self, probability: u16) -> crate::Result<bool> {
        self.normalize()?;
        let helper = (self.range >> 15) * probability as u32;
        if helper > self.code {
            self.range = helper;
            Ok(true)
        } else {
            self.range -= helper;
            self.code -= helper;
            Ok(false)
        }
    }

    #[inline(always)]
    pub(crate) fn decode_skewed(&mut self) -> crate::Result<bool> {
        self.normalize()?;
        if self.code < self.range - 1 {
            self.range -= 1;
            Ok(true)
        } else {
            self.code = 0;
            self.range = 1;
            Ok(false)
        }
    }

    /// Scales the range to `total` and returns the cumulative frequency the code points at.
    #[inline(always)]
    pub(crate) fn threshold(&mut self, total: u32) -> crate::Result<u32> {
        self.normalize()?;
        self.range /= total;
        Ok(self.code / self.range)
    }

    #[inline(always)]
    pub(crate) fn decode(&mut self, start: u32, size: u32) {
        self.code -= start * self.range;
        self.range *= size;
    }

    /// Consumes the last drain byte the encoder wrote after the end marker.
    pub(crate) fn finish(&mut self) -> crate::Result<()> {
        self.read_byte()?;
        Ok(())
    }
}
