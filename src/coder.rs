use std::io::{ErrorKind, Read, Write};

use tracing::{debug, trace};

use crate::{
    internal::Lzp,
    Error, Options, HEADER_VALUE,
};

/// Receives the number of uncompressed bytes processed so far.
///
/// Reports arrive after every completed batch and once more when the stream ends, the values
/// never decrease. Implemented for every `FnMut(u64)`.
pub trait Progress {
    fn progress_changed(&mut self, processed: u64);
}

impl<F: FnMut(u64)> Progress for F {
    fn progress_changed(&mut self, processed: u64) {
        self(processed)
    }
}

fn read_u64<R: Read>(reader: &mut R) -> crate::Result<u64> {
    let mut bytes = [0; 8];
    reader.read_exact(&mut bytes).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => Error::UnexpectedEof,
        _ => Error::Io(err),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Reads the stream header and the packed options following it.
pub fn read_options<R: Read>(reader: &mut R) -> crate::Result<Options> {
    let found = read_u64(reader)?;
    if found != HEADER_VALUE {
        return Err(Error::InvalidHeader { found });
    }
    read_options_headerless(reader)
}

/// Reads packed options from a stream without the magic header value.
pub fn read_options_headerless<R: Read>(reader: &mut R) -> crate::Result<Options> {
    Options::from_packed(read_u64(reader)?)
}

/// Compresses everything `reader` yields into `writer`, including the 16 byte stream header.
///
/// Returns the number of uncompressed bytes. Nothing is written if `batch_size` is zero.
pub fn encode<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    progress: Option<&mut dyn Progress>,
    batch_size: u64,
    options: &Options,
) -> crate::Result<u64> {
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }
    writer.write_all(&HEADER_VALUE.to_be_bytes())?;
    writer.write_all(&options.to_packed().to_be_bytes())?;
    encode_raw(reader, writer, progress, batch_size, options)
}

/// Like [`encode`], but writes neither the magic value nor the options.
pub fn encode_raw<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    mut progress: Option<&mut dyn Progress>,
    batch_size: u64,
    options: &Options,
) -> crate::Result<u64> {
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }

    let mut lzp = Lzp::new_encoder(writer, options)?;
    debug!(%options, batch_size, "encoding started");

    let mut processed = 0;
    loop {
        let batch = lzp.encode_batch(&mut reader, batch_size)?;
        processed += batch;
        trace!(processed, "batch encoded");
        if let Some(progress) = progress.as_mut() {
            progress.progress_changed(processed);
        }
        if batch < batch_size {
            break;
        }
    }
    lzp.finish()?;

    debug!(processed, "encoding finished");
    Ok(processed)
}

/// Decompresses a stream written by [`encode`] into `writer`.
///
/// Returns the number of decompressed bytes.
pub fn decode<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    progress: Option<&mut dyn Progress>,
    batch_size: u64,
) -> crate::Result<u64> {
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }
    let options = read_options(&mut reader)?;
    decode_raw(reader, writer, progress, batch_size, &options)
}

/// Decompresses a stream written by [`encode_raw`] with the same `options`.
pub fn decode_raw<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    mut progress: Option<&mut dyn Progress>,
    batch_size: u64,
    options: &Options,
) -> crate::Result<u64> {
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }

    let mut lzp = Lzp::new_decoder(reader, options)?;
    debug!(%options, batch_size, "decoding started");

    let mut processed = 0;
    loop {
        let (batch, finished) = lzp.decode_batch(&mut writer, batch_size)?;
        processed += batch;
        trace!(processed, "batch decoded");
        if let Some(progress) = progress.as_mut() {
            progress.progress_changed(processed);
        }
        if finished {
            break;
        }
    }
    writer.flush()?;

    debug!(processed, "decoding finished");
    Ok(processed)
}

#[cfg(test)]
mod test {
    use super::{decode, encode, read_options, Progress};
    use crate::{Error, Options, HEADER_VALUE};

    fn small_options() -> Options {
        Options::new(3, 18, 6, 20, 2, 1, 60, 30000).unwrap()
    }

    #[test]
    fn encode_decode_with_progress() {
        let test_data = include_str!("../tests/fixtures/lorem.txt");
        let options = small_options();

        let mut reports = Vec::new();
        let mut compressed = Vec::new();
        let processed = encode(
            test_data.as_bytes(),
            &mut compressed,
            Some(&mut |processed: u64| reports.push(processed)),
            1000,
            &options,
        )
        .unwrap();
        assert_eq!(processed, test_data.len() as u64);
        assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(reports.last(), Some(&(test_data.len() as u64)));
        assert_eq!(reports.len(), test_data.len() / 1000 + 1);
        assert!(compressed.len() < test_data.len());

        let mut decompressed = Vec::new();
        let processed = decode(compressed.as_slice(), &mut decompressed, None, 777).unwrap();
        assert_eq!(processed, test_data.len() as u64);
        assert_eq!(decompressed, test_data.as_bytes());
    }

    #[test]
    fn header_carries_options() {
        let options = small_options();
        let mut compressed = Vec::new();
        encode(&[1u8, 2, 3][..], &mut compressed, None, 16, &options).unwrap();

        assert_eq!(compressed[..8], HEADER_VALUE.to_be_bytes());
        assert_eq!(read_options(&mut compressed.as_slice()).unwrap(), options);
    }

    #[test]
    fn zero_batch_size_is_rejected_before_writing() {
        let mut compressed = Vec::new();
        let result = encode(&b"abc"[..], &mut compressed, None, 0, &small_options());
        assert!(matches!(result, Err(Error::InvalidBatchSize)));
        assert!(compressed.is_empty());

        let result = decode(std::io::empty(), Vec::new(), None, 0);
        assert!(matches!(result, Err(Error::InvalidBatchSize)));
    }

    #[test]
    fn closure_is_progress() {
        let mut last = 0;
        {
            let mut callback = |processed: u64| last = processed;
            let progress: &mut dyn Progress = &mut callback;
            progress.progress_changed(42);
        }
        assert_eq!(last, 42);
    }
}
