//! Wire frame codec.
//!
//! Every response from the application, and the body of every request
//! page, is a gzip-compressed text header followed by raw bulk bytes.
//!
//! ## Wire format
//!
//! ```text
//! header_len: i32  (4, little-endian, compressed size only)
//! header:     [u8] (header_len, gzip)
//! payload:    [u8] (remaining bytes, not length-prefixed)
//! ```

pub mod compress;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

pub use compress::{compress, decompress};

/// Size of the leading compressed-header length field.
pub const LENGTH_PREFIX_SIZE: usize = 4;

// ── DecodedFrame ─────────────────────────────────────────────────

/// A frame split into its inflated header and trailing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Decompressed header text.
    pub header: Vec<u8>,
    /// Raw bytes following the compressed header.
    pub payload: Bytes,
}

// ── Encode / Decode ──────────────────────────────────────────────

/// Compress `header`, prefix its compressed length and append `payload`.
pub fn encode(header: &[u8], payload: &[u8]) -> Result<Bytes> {
    let compressed = compress(header)?;
    let len = header_length(&compressed)?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + compressed.len() + payload.len());
    buf.put_i32_le(len);
    buf.extend_from_slice(&compressed);
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}

/// Split a frame into its decompressed header and raw payload.
///
/// A length prefix that is missing, negative, or longer than the frame
/// is a [`Error::MalformedResponse`]. A header that does not inflate is
/// a fatal [`Error::Codec`].
pub fn decode(frame: Bytes) -> Result<DecodedFrame> {
    let n = read_length_prefix(&frame)?;
    let body = &frame[LENGTH_PREFIX_SIZE..];
    if n > body.len() {
        return Err(Error::MalformedResponse(format!(
            "header length {n} exceeds remaining frame length {}",
            body.len()
        )));
    }

    let header = decompress(&body[..n])?;
    let payload = frame.slice(LENGTH_PREFIX_SIZE + n..);
    Ok(DecodedFrame { header, payload })
}

/// Read and validate the signed little-endian length prefix.
pub(crate) fn read_length_prefix(frame: &[u8]) -> Result<usize> {
    let Some(prefix) = frame.get(..LENGTH_PREFIX_SIZE) else {
        return Err(Error::MalformedResponse(format!(
            "frame too short: {} < {LENGTH_PREFIX_SIZE}",
            frame.len()
        )));
    };
    let mut raw = [0u8; LENGTH_PREFIX_SIZE];
    raw.copy_from_slice(prefix);
    let n = i32::from_le_bytes(raw);
    usize::try_from(n)
        .map_err(|_| Error::MalformedResponse(format!("negative header length {n}")))
}

/// Compressed header length as it appears on the wire.
pub(crate) fn header_length(compressed: &[u8]) -> Result<i32> {
    i32::try_from(compressed.len()).map_err(|_| Error::HeaderTooLarge {
        header: compressed.len() as u64,
        budget: i32::MAX as u64,
    })
}

// ── Tests ────────────────────────────────────────────────────────
