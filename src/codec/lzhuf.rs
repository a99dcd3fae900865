//! The Winlink "B2" LZHUF codec.
//!
//! LZSS over a 2 KiB sliding window feeds literal/match symbols into the
//! adaptive Huffman coder in [`super::huffman`]. The compressed stream is
//! framed for B2 transfer:
//!
//! ```text
//! [size: u32 LE] [usemark: 0x00] [bitstream…] [crc16 of plaintext: u16 LE]
//! ```
//!
//! The match finder is the reference binary-search-tree scheme: one node
//! per window position, keyed on the 60-byte lookahead, so the longest
//! (and nearest, on ties) match is found without scanning the window.

use crate::codec::crc16;
use crate::codec::huffman::{self, BitReader, BitWriter, HuffTree};
use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, Result};

/// Sliding window size.
pub(super) const WINDOW: usize = 2048;
/// Lookahead buffer size; also the longest representable match.
pub(super) const LOOKAHEAD: usize = 60;
/// Matches at or below this length are sent as literals.
pub(super) const THRESHOLD: usize = 2;

const NIL: usize = WINDOW;
/// Byte the window is primed with before any data is seen.
const FILL: u8 = b' ';
/// Constant marker byte between the size header and the bitstream.
const USEMARK: u8 = 0x00;
/// Size header (4) + usemark (1).
const HEADER_LEN: usize = 5;
/// Trailing CRC-16, little-endian.
const TRAILER_LEN: usize = 2;

/// Compress `data` into a framed B2 stream.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::Compression(format!(
            "input too large: {} bytes",
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() / 2 + TRAILER_LEN);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.push(USEMARK);

    let mut encoder = Encoder::new(data);
    let mut out = encoder.run(BitWriter::new(out));

    out.extend_from_slice(&crc16::checksum(data).to_le_bytes());
    Ok(out)
}

/// Decompress a framed B2 stream, verifying the trailing CRC.
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < HEADER_LEN + TRAILER_LEN {
        return Err(ProtocolError::Decompression(
            "truncated stream".to_string(),
        ));
    }

    let size = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::Decompression(format!(
            "declared size too large: {size} bytes"
        )));
    }
    if frame[4] != USEMARK {
        return Err(ProtocolError::Decompression(format!(
            "bad usemark byte: {:#04x}",
            frame[4]
        )));
    }

    let body = &frame[HEADER_LEN..frame.len() - TRAILER_LEN];
    let crc_bytes = &frame[frame.len() - TRAILER_LEN..];
    let expected_crc = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);

    let plain = decode(body, size);

    if crc16::checksum(&plain) != expected_crc {
        return Err(ProtocolError::ChecksumMismatch);
    }
    Ok(plain)
}

/// LZSS encoder state: ring buffer plus the match-finder tree.
struct Encoder<'a> {
    input: &'a [u8],
    next: usize,
    text: [u8; WINDOW + LOOKAHEAD - 1],
    // Binary search tree over window positions. `right` carries 256 extra
    // roots, one per possible first byte.
    left: [usize; WINDOW + 1],
    right: [usize; WINDOW + 257],
    parent: [usize; WINDOW + 1],
    match_position: usize,
    match_length: usize,
}

impl<'a> Encoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            next: 0,
            text: [FILL; WINDOW + LOOKAHEAD - 1],
            left: [NIL; WINDOW + 1],
            right: [NIL; WINDOW + 257],
            parent: [NIL; WINDOW + 1],
            match_position: 0,
            match_length: 0,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.input.get(self.next).copied();
        if byte.is_some() {
            self.next += 1;
        }
        byte
    }

    /// Insert the string starting at window position `r` into the tree and
    /// record the best match against existing entries.
    fn insert_node(&mut self, r: usize) {
        let mut cmp = 1i32;
        let mut p = WINDOW + 1 + self.text[r] as usize;
        self.right[r] = NIL;
        self.left[r] = NIL;
        self.match_length = 0;

        loop {
            if cmp >= 0 {
                if self.right[p] != NIL {
                    p = self.right[p];
                } else {
                    self.right[p] = r;
                    self.parent[r] = p;
                    return;
                }
            } else if self.left[p] != NIL {
                p = self.left[p];
            } else {
                self.left[p] = r;
                self.parent[r] = p;
                return;
            }

            let mut len = 1;
            while len < LOOKAHEAD {
                cmp = self.text[r + len] as i32 - self.text[p + len] as i32;
                if cmp != 0 {
                    break;
                }
                len += 1;
            }

            if len > THRESHOLD {
                let distance = ((r.wrapping_sub(p)) & (WINDOW - 1)) - 1;
                if len > self.match_length {
                    self.match_position = distance;
                    self.match_length = len;
                    if len >= LOOKAHEAD {
                        break;
                    }
                }
                if len == self.match_length && distance < self.match_position {
                    self.match_position = distance;
                }
            }
        }

        // Full-length match: replace the old node with the new one.
        self.parent[r] = self.parent[p];
        self.left[r] = self.left[p];
        self.right[r] = self.right[p];
        self.parent[self.left[p]] = r;
        self.parent[self.right[p]] = r;
        if self.right[self.parent[p]] == p {
            self.right[self.parent[p]] = r;
        } else {
            self.left[self.parent[p]] = r;
        }
        self.parent[p] = NIL;
    }

    /// Remove window position `p` from the tree.
    fn delete_node(&mut self, p: usize) {
        if self.parent[p] == NIL {
            return;
        }

        let q;
        if self.right[p] == NIL {
            q = self.left[p];
        } else if self.left[p] == NIL {
            q = self.right[p];
        } else {
            let mut candidate = self.left[p];
            if self.right[candidate] != NIL {
                while self.right[candidate] != NIL {
                    candidate = self.right[candidate];
                }
                self.right[self.parent[candidate]] = self.left[candidate];
                self.parent[self.left[candidate]] = self.parent[candidate];
                self.left[candidate] = self.left[p];
                self.parent[self.left[p]] = candidate;
            }
            self.right[candidate] = self.right[p];
            self.parent[self.right[p]] = candidate;
            q = candidate;
        }

        self.parent[q] = self.parent[p];
        if self.right[self.parent[p]] == p {
            self.right[self.parent[p]] = q;
        } else {
            self.left[self.parent[p]] = q;
        }
        self.parent[p] = NIL;
    }

    fn run(&mut self, mut out: BitWriter) -> Vec<u8> {
        let mut tree = HuffTree::new();

        let r0 = WINDOW - LOOKAHEAD;

        let mut len = 0;
        while len < LOOKAHEAD {
            match self.read_byte() {
                Some(byte) => {
                    self.text[r0 + len] = byte;
                    len += 1;
                }
                None => break,
            }
        }
        if len == 0 {
            return out.finish();
        }

        for i in 1..=LOOKAHEAD {
            self.insert_node(r0 - i);
        }
        self.insert_node(r0);

        let mut s = 0usize;
        let mut r = r0;
        loop {
            if self.match_length > len {
                self.match_length = len;
            }

            if self.match_length <= THRESHOLD {
                self.match_length = 1;
                tree.encode_symbol(self.text[r] as usize, &mut out);
            } else {
                tree.encode_symbol(255 - THRESHOLD + self.match_length, &mut out);
                huffman::encode_position(self.match_position, &mut out);
            }

            let last_match_length = self.match_length;
            let mut advanced = 0;
            while advanced < last_match_length {
                let byte = match self.read_byte() {
                    Some(b) => b,
                    None => break,
                };
                self.delete_node(s);
                self.text[s] = byte;
                if s < LOOKAHEAD - 1 {
                    self.text[s + WINDOW] = byte;
                }
                s = (s + 1) & (WINDOW - 1);
                r = (r + 1) & (WINDOW - 1);
                self.insert_node(r);
                advanced += 1;
            }
            while advanced < last_match_length {
                self.delete_node(s);
                s = (s + 1) & (WINDOW - 1);
                r = (r + 1) & (WINDOW - 1);
                len -= 1;
                if len > 0 {
                    self.insert_node(r);
                }
                advanced += 1;
            }

            if len == 0 {
                break;
            }
        }

        out.finish()
    }
}

/// Decode `size` bytes of plaintext from a raw bitstream.
fn decode(body: &[u8], size: usize) -> Vec<u8> {
    let mut tree = HuffTree::new();
    let (d_code, d_len) = huffman::position_decode_tables();
    let mut input = BitReader::new(body);

    let mut text = [FILL; WINDOW];
    let mut r = WINDOW - LOOKAHEAD;
    let mut out = Vec::with_capacity(size);

    while out.len() < size {
        let symbol = tree.decode_symbol(&mut input);
        if symbol < 256 {
            let byte = symbol as u8;
            out.push(byte);
            text[r] = byte;
            r = (r + 1) & (WINDOW - 1);
        } else {
            let position = huffman::decode_position(&d_code, &d_len, &mut input);
            let start = r.wrapping_sub(position + 1) & (WINDOW - 1);
            let length = symbol - 255 + THRESHOLD;
            for k in 0..length {
                if out.len() >= size {
                    break;
                }
                let byte = text[(start + k) & (WINDOW - 1)];
                out.push(byte);
                text[r] = byte;
                r = (r + 1) & (WINDOW - 1);
            }
        }
    }
    out
}
