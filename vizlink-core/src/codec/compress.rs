//! Gzip helpers for frame headers.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};

/// Compression level the remote application expects.
const LEVEL: u32 = 6;

/// Gzip-compress `data`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::new(LEVEL));
    encoder
        .write_all(data)
        .map_err(|e| Error::Codec(format!("gzip write: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::Codec(format!("gzip finish: {e}")))
}

/// Inflate a gzip stream produced by [`compress`] or by the remote end.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Codec(format!("gzip inflate: {e}")))?;
    Ok(out)
}
