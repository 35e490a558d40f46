//! Splitting one request into wire pages.
//!
//! A request whose bulk payload does not fit in one frame is sent as a
//! run of pages that all repeat the same compressed header. The remote
//! end reassembles the payload from the page index and detects the end
//! from the last-page index.
//!
//! ## Page layout
//!
//! ```text
//! header_len: i32  (4)   compressed header size
//! page_index: i32  (4)   0-based
//! last_page:  i32  (4)   total pages - 1
//! header:     [u8]       gzip JSON envelope
//! payload:    [u8]       this page's slice of the bulk payload
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec;
use crate::error::{Error, Result};

/// Bytes in front of the compressed header on every page.
pub const PAGE_INFO_SIZE: usize = 12;

/// Default frame budget. Large enough that real requests use one page.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 1_160_000_000_000;

// ── PageInfo ─────────────────────────────────────────────────────

/// The three integers that lead every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub header_len: i32,
    pub page_index: i32,
    pub last_page: i32,
}

impl PageInfo {
    pub fn encode(&self) -> [u8; PAGE_INFO_SIZE] {
        let mut buf = [0u8; PAGE_INFO_SIZE];
        buf[0..4].copy_from_slice(&self.header_len.to_le_bytes());
        buf[4..8].copy_from_slice(&self.page_index.to_le_bytes());
        buf[8..12].copy_from_slice(&self.last_page.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < PAGE_INFO_SIZE {
            return Err(Error::MalformedResponse(format!(
                "page info too short: {} < {PAGE_INFO_SIZE}",
                data.len()
            )));
        }
        let int = |at: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&data[at..at + 4]);
            i32::from_le_bytes(raw)
        };
        Ok(Self {
            header_len: int(0),
            page_index: int(4),
            last_page: int(8),
        })
    }

    pub fn is_last(&self) -> bool {
        self.page_index == self.last_page
    }
}

// ── Page ─────────────────────────────────────────────────────────

/// One parsed page, as the receiving end sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub info: PageInfo,
    /// Decompressed envelope text.
    pub header: Vec<u8>,
    pub payload: Bytes,
}

impl Page {
    /// Parse a page produced by [`Paginator::paginate`].
    pub fn parse(page: Bytes) -> Result<Self> {
        let info = PageInfo::decode(&page)?;
        let n = codec::read_length_prefix(&page)?;
        let rest = page.len() - PAGE_INFO_SIZE;
        if n > rest {
            return Err(Error::MalformedResponse(format!(
                "page header length {n} exceeds remaining length {rest}"
            )));
        }
        let header = codec::decompress(&page[PAGE_INFO_SIZE..PAGE_INFO_SIZE + n])?;
        Ok(Self {
            info,
            header,
            payload: page.slice(PAGE_INFO_SIZE + n..),
        })
    }
}

// ── Paginator ────────────────────────────────────────────────────

/// Splits a compressed header plus bulk payload into pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    max_request_bytes: u64,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_BYTES)
    }
}

impl Paginator {
    pub fn new(max_request_bytes: u64) -> Self {
        Self { max_request_bytes }
    }

    pub fn max_request_bytes(&self) -> u64 {
        self.max_request_bytes
    }

    /// Payload bytes that fit next to a header of `header_len` bytes.
    pub fn page_size(&self, header_len: usize) -> Result<u64> {
        let overhead = header_len as u64 + PAGE_INFO_SIZE as u64;
        match self.max_request_bytes.checked_sub(overhead) {
            Some(size) if size > 0 => Ok(size),
            _ => Err(Error::HeaderTooLarge {
                header: header_len as u64,
                budget: self.max_request_bytes,
            }),
        }
    }

    /// Build every page for one request, in send order.
    pub fn paginate(&self, compressed_header: &[u8], payload: &[u8]) -> Result<Vec<Bytes>> {
        let header_len = codec::header_length(compressed_header)?;
        let page_size = self.page_size(compressed_header.len())?;

        let total = payload.len() as u64;
        let pages = if total <= page_size {
            1
        } else {
            total.div_ceil(page_size)
        };
        let last_page = i32::try_from(pages - 1).map_err(|_| Error::PayloadTooLarge {
            size: total,
            max_pages: i32::MAX as u64,
        })?;

        // page_size may exceed usize on 32-bit targets; a slice can't.
        let chunk = usize::try_from(page_size).unwrap_or(usize::MAX);
        let slices: Vec<&[u8]> = if pages == 1 {
            vec![payload]
        } else {
            payload.chunks(chunk).collect()
        };

        let pages = slices
            .into_iter()
            .enumerate()
            .map(|(index, slice)| {
                let info = PageInfo {
                    header_len,
                    page_index: index as i32,
                    last_page,
                };
                let mut buf =
                    BytesMut::with_capacity(PAGE_INFO_SIZE + compressed_header.len() + slice.len());
                buf.put_slice(&info.encode());
                buf.put_slice(compressed_header);
                buf.put_slice(slice);
                buf.freeze()
            })
            .collect();
        Ok(pages)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compress;

    fn header() -> Vec<u8> {
        compress(br#"{"AuthToken":"t","RequestTasks":[]}"#).unwrap()
    }

    #[test]
    fn small_payload_is_one_page() {
        let header = header();
        let pages = Paginator::default().paginate(&header, b"bulk").unwrap();
        assert_eq!(pages.len(), 1);

        let page = Page::parse(pages[0].clone()).unwrap();
        assert_eq!(page.info.page_index, 0);
        assert_eq!(page.info.last_page, 0);
        assert_eq!(page.info.header_len as usize, header.len());
        assert!(page.info.is_last());
        assert_eq!(&page.payload[..], b"bulk");
        assert_eq!(page.header, br#"{"AuthToken":"t","RequestTasks":[]}"#);
    }

    #[test]
    fn single_page_regardless_of_header_size() {
        for extra in [0usize, 10, 500, 5_000] {
            let text = format!(r#"{{"pad":"{}"}}"#, "x".repeat(extra));
            let header = compress(text.as_bytes()).unwrap();
            let paginator = Paginator::new(header.len() as u64 + PAGE_INFO_SIZE as u64 + 64);
            let pages = paginator.paginate(&header, &[7u8; 63]).unwrap();
            assert_eq!(pages.len(), 1, "header padding {extra}");
        }
    }

    #[test]
    fn empty_payload_is_one_page() {
        let pages = Paginator::default().paginate(&header(), &[]).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn oversized_payload_is_split() {
        let header = header();
        let budget = header.len() as u64 + PAGE_INFO_SIZE as u64 + 100;
        let payload: Vec<u8> = (0..=255u8).cycle().take(350).collect();

        let pages = Paginator::new(budget).paginate(&header, &payload).unwrap();
        assert_eq!(pages.len(), 4);

        let mut reassembled = Vec::new();
        for (i, raw) in pages.into_iter().enumerate() {
            assert!(raw.len() as u64 <= budget);
            let page = Page::parse(raw).unwrap();
            assert_eq!(page.info.page_index, i as i32);
            assert_eq!(page.info.last_page, 3);
            assert_eq!(page.info.header_len as usize, header.len());
            reassembled.extend_from_slice(&page.payload);
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn exact_fit_stays_one_page() {
        let header = header();
        let budget = header.len() as u64 + PAGE_INFO_SIZE as u64 + 100;
        let pages = Paginator::new(budget).paginate(&header, &[1u8; 100]).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn header_larger_than_budget_is_rejected() {
        let header = header();
        let err = Paginator::new(header.len() as u64).paginate(&header, b"").unwrap_err();
        assert!(matches!(err, Error::HeaderTooLarge { .. }));
    }

    #[test]
    fn page_info_roundtrip() {
        let info = PageInfo {
            header_len: 321,
            page_index: 2,
            last_page: 5,
        };
        assert_eq!(PageInfo::decode(&info.encode()).unwrap(), info);
        assert!(!info.is_last());
        assert!(PageInfo::decode(&[0u8; 8]).is_err());
    }
}
