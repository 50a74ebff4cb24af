use std::io::Read;

use crate::{
    internal::{Lzp, RangeDecoder},
    read_options, Error, Options,
};

/// A streaming decoder for TarsaLZP compressed data.
///
/// Once a read failed, every further read returns an error.
pub struct LzpDecoder<R: Read> {
    lzp: Lzp<RangeDecoder<R>>,
    options: Options,
    finished: bool,
    failed: bool,
}

impl<R: Read> LzpDecoder<R> {
    /// Creates a new [`LzpDecoder`], the options are taken from the stream header.
    pub fn new(mut reader: R) -> crate::Result<Self> {
        let options = read_options(&mut reader)?;
        Self::new_raw(reader, options)
    }

    /// Creates a new [`LzpDecoder`] for a stream without header.
    pub fn new_raw(reader: R, options: Options) -> crate::Result<Self> {
        let lzp = Lzp::new_decoder(reader, &options)?;
        Ok(Self {
            lzp,
            options,
            finished: false,
            failed: false,
        })
    }

    /// Returns the options the stream was encoded with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.lzp.into_inner()
    }
}

impl<R: Read> Read for LzpDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.failed {
            return Err(Error::Poisoned.into());
        }

        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        let mut decoded = 0;
        for byte in buf.iter_mut() {
            let symbol = match self.lzp.decode_symbol() {
                Ok(symbol) => symbol,
                Err(err) => {
                    self.failed = true;
                    return Err(err.into());
                }
            };
            let Some(symbol) = symbol else {
                self.finished = true;
                break;
            };
            *byte = symbol;
            decoded += 1;
        }

        Ok(decoded)
    }
}

#[cfg(test)]
mod test {
    use std::io::{ErrorKind, Read};

    use super::LzpDecoder;
    use crate::{encode, encode_raw, Options};

    fn read_until_error(decoder: &mut LzpDecoder<&[u8]>) -> Option<std::io::Error> {
        let mut buffer = [0; 256];
        loop {
            match decoder.read(&mut buffer) {
                Ok(0) => return None,
                Ok(_) => continue,
                Err(err) => return Some(err),
            }
        }
    }

    fn options() -> Options {
        Options::new(2, 16, 2, 16, 1, 2, 30, 20000).unwrap()
    }

    #[test]
    fn lzpdecoder_reads_header_options() {
        let test_data = include_str!("../tests/fixtures/lorem.txt");
        let mut compressed = Vec::new();
        encode(test_data.as_bytes(), &mut compressed, None, 512, &options()).unwrap();

        let mut decoder = LzpDecoder::new(compressed.as_slice()).unwrap();
        assert_eq!(decoder.options(), &options());

        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, test_data);

        // the end marker and all drain bytes were consumed
        assert!(decoder.into_inner().is_empty());
    }

    #[test]
    fn raw_stream_needs_matching_options() {
        let test_data = b"abracadabra abracadabra abracadabra";
        let mut compressed = Vec::new();
        encode_raw(&test_data[..], &mut compressed, None, 8, &options()).unwrap();

        let mut decoder = LzpDecoder::new_raw(compressed.as_slice(), options()).unwrap();
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, test_data);
    }

    #[test]
    fn truncated_stream_fails() {
        let test_data = include_str!("../tests/fixtures/lorem.txt");
        let mut compressed = Vec::new();
        encode(test_data.as_bytes(), &mut compressed, None, 512, &options()).unwrap();
        compressed.truncate(compressed.len() / 2);

        let mut decoder = LzpDecoder::new(compressed.as_slice()).unwrap();
        let mut decoded = Vec::new();
        let err = decoder.read_to_end(&mut decoded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn error_is_sticky_after_truncation() {
        let test_data = include_str!("../tests/fixtures/lorem.txt");
        let mut compressed = Vec::new();
        encode(test_data.as_bytes(), &mut compressed, None, 512, &options()).unwrap();
        compressed.truncate(compressed.len() - 3);

        let mut decoder = LzpDecoder::new(compressed.as_slice()).unwrap();
        let err = read_until_error(&mut decoder).unwrap();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);

        for _ in 0..3 {
            let err = decoder.read(&mut [0; 16]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Other);
        }
    }

    #[test]
    fn error_is_sticky_after_damaged_payload() {
        let test_data = include_str!("../tests/fixtures/lorem.txt").repeat(4);
        let mut compressed = Vec::new();
        encode(test_data.as_bytes(), &mut compressed, None, 512, &options()).unwrap();

        let mut rng = fastrand::Rng::with_seed(0xbad);
        let mut failures = 0;
        for _ in 0..64 {
            let mut damaged = compressed.clone();
            for _ in 0..4 {
                let position = rng.usize(16..damaged.len());
                damaged[position] ^= rng.u8(1..);
            }

            let mut decoder = LzpDecoder::new(damaged.as_slice()).unwrap();
            if read_until_error(&mut decoder).is_none() {
                continue;
            }
            failures += 1;
            assert!(decoder.read(&mut [0; 16]).is_err());
            assert!(decoder.read(&mut [0; 16]).is_err());
        }
        assert!(failures > 0);
    }
}
