//! # Message Compression
//!
//! Compression codecs for B2F proposal payloads.
//!
//! ## Components
//! - **lzhuf**: the Winlink B2 LZHUF variant (LZSS + adaptive Huffman),
//!   the default codec every B2F peer understands
//! - **gzip**: RFC 1952 gzip at best compression, negotiated only when
//!   both peers advertise the `G` capability flag
//! - **crc16**: the CRC used by the B2 stream trailer
//!
//! ## Security
//! - Declared plaintext sizes are validated against
//!   [`crate::config::MAX_MESSAGE_SIZE`] before allocation
//! - Gzip output is read in bounded chunks so a hostile stream cannot
//!   balloon memory

pub mod crc16;
mod huffman;
pub mod lzhuf;

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, Result};

/// The codec used for a proposal payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Winlink B2 LZHUF (proposal code `C`).
    #[default]
    Lzhuf,
    /// Gzip (proposal code `D`), only when both peers advertise `G`.
    Gzip,
}

impl Codec {
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::Lzhuf => lzhuf::compress(data),
            Codec::Gzip => gzip_compress(data),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::Lzhuf => lzhuf::decompress(data),
            Codec::Gzip => gzip_decompress(data),
        }
    }
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| ProtocolError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ProtocolError::Compression(e.to_string()))
}

fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&chunk[..n]);
                if out.len() > MAX_MESSAGE_SIZE {
                    return Err(ProtocolError::Decompression(
                        "output exceeds message size limit".to_string(),
                    ));
                }
            }
            Err(e) => return Err(ProtocolError::Decompression(e.to_string())),
        }
    }
    Ok(out)
}
