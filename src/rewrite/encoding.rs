//! Content-Encoding codecs for rewritten bodies.

use std::io::{self, Read, Write};

use axum::http::{header, HeaderMap};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LG_WINDOW: u32 = 22;

/// Body encodings the rewriter can round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Identity,
    Gzip,
    Brotli,
}

impl Encoding {
    /// Encoding named by the `Content-Encoding` header, or `None` when it is
    /// one the rewriter does not handle.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let Some(value) = headers.get(header::CONTENT_ENCODING) else {
            return Some(Encoding::Identity);
        };
        let value = value.to_str().ok()?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("identity") {
            Some(Encoding::Identity)
        } else if value.eq_ignore_ascii_case("gzip") || value.eq_ignore_ascii_case("x-gzip") {
            Some(Encoding::Gzip)
        } else if value.eq_ignore_ascii_case("br") {
            Some(Encoding::Brotli)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Gzip => "gzip",
            Encoding::Brotli => "br",
        }
    }

    pub fn decode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len());
        match self {
            Encoding::Identity => out.extend_from_slice(input),
            Encoding::Gzip => {
                MultiGzDecoder::new(input).read_to_end(&mut out)?;
            }
            Encoding::Brotli => {
                brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE).read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }

    pub fn encode(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Encoding::Identity => Ok(input.to_vec()),
            Encoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(input)?;
                encoder.finish()
            }
            Encoding::Brotli => {
                let mut writer = brotli::CompressorWriter::new(
                    Vec::new(),
                    BROTLI_BUFFER_SIZE,
                    BROTLI_QUALITY,
                    BROTLI_LG_WINDOW,
                );
                writer.write_all(input)?;
                writer.flush()?;
                Ok(writer.into_inner())
            }
        }
    }
}
