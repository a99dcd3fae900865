//! # Winlink Message Structure
//!
//! The RFC-822-like message container exchanged over B2F: ordered headers,
//! a binary body, and zero or more named file attachments.
//!
//! ## Wire Form
//! ```text
//! Mid: ABCDEF123456
//! Date: Thu, 04 Jan 2024 10:00:00 +0000
//! Type: Private
//! From: LA5NTA
//! To: LA1B
//! Subject: Test
//! Mbo: LA5NTA
//! Body: 7
//! File: 3 a.txt
//!
//! HELLO
//! abc
//! ```
//! Header lines end in CRLF (LF is tolerated on input), continuation lines
//! start with whitespace, and the header section ends at the first blank
//! line. `Body:` and `File:` declare exact byte counts; the payloads follow
//! the blank line back to back.

pub mod address;
pub mod header;

use std::io::Read;

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::{ProtocolError, Result};

pub use address::Address;
pub use header::Header;

/// File extension for messages stored at rest.
pub const FILE_EXTENSION: &str = ".b2f";

/// Longest permitted message identifier.
pub const MAX_MID_LENGTH: usize = 12;

/// Header names with a fixed position in the canonical serialization.
const CANONICAL_NAMES: [&str; 10] = [
    "Mid", "Date", "Type", "From", "To", "Cc", "Subject", "Mbo", "Body", "File",
];

/// A named file attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A Winlink 2000 message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    header: Header,
    body: Vec<u8>,
    attachments: Vec<Attachment>,
}

impl Message {
    /// An empty message. Callers are expected to fill in the required
    /// headers before validating or offering it.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new outbound private message with the required headers set and a
    /// fresh MID.
    pub fn new_outbound(from: &Address, mbo: &str, subject: &str) -> Self {
        let mut msg = Self::new();
        msg.header.set("Mid", &generate_mid(from.callsign()));
        msg.header.set("Date", &Utc::now().to_rfc2822());
        msg.header.set("Type", "Private");
        msg.header.set("From", from.as_str());
        msg.header.set("Subject", subject);
        msg.header.set("Mbo", &mbo.to_ascii_uppercase());
        msg.header.set("Body", "0");
        msg
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// The message identifier, or the empty string when unset.
    pub fn mid(&self) -> &str {
        self.header.get("Mid").unwrap_or_default()
    }

    pub fn subject(&self) -> &str {
        self.header.get("Subject").unwrap_or_default()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Set the body, keeping the declared `Body:` size in sync.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.header.set("Body", &body.len().to_string());
        self.body = body;
    }

    pub fn add_to(&mut self, addr: &Address) {
        self.header.add("To", addr.as_str());
    }

    pub fn add_cc(&mut self, addr: &Address) {
        self.header.add("Cc", addr.as_str());
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.header.add(
            "File",
            &format!("{} {}", attachment.data.len(), attachment.name),
        );
        self.attachments.push(attachment);
    }

    /// Assign a generated MID if none is present.
    pub fn ensure_mid(&mut self, mycall: &str) {
        if self.mid().is_empty() {
            let mid = generate_mid(mycall);
            self.header.set("Mid", &mid);
        }
    }

    /// Parse a message from a reader (see module docs for the wire form).
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Parse a message from its serialized form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut header = Header::new();
        let mut pos = 0usize;

        loop {
            let nl = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| {
                    ProtocolError::InvalidMessage("header section never ends".to_string())
                })?;
            let mut line = &data[pos..pos + nl];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            pos += nl + 1;

            if line.is_empty() {
                break;
            }

            let line = std::str::from_utf8(line).map_err(|_| {
                ProtocolError::InvalidMessage("header line is not valid UTF-8".to_string())
            })?;

            if line.starts_with(' ') || line.starts_with('\t') {
                header.append_to_last(line.trim());
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) => header.add(name.trim(), value.trim()),
                None => {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "malformed header line: {line}"
                    )))
                }
            }
        }

        let body_len = match header.get("Body") {
            Some(v) => v.parse::<usize>().map_err(|_| {
                ProtocolError::InvalidMessage(format!("bad Body size: {v}"))
            })?,
            None => 0,
        };
        if data.len() - pos < body_len {
            return Err(ProtocolError::InvalidMessage(
                "body shorter than declared size".to_string(),
            ));
        }
        let body = data[pos..pos + body_len].to_vec();
        pos += body_len;

        let mut attachments = Vec::new();
        for value in header.get_all("File") {
            let (size, name) = value.split_once(' ').ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("malformed File header: {value}"))
            })?;
            let size = size.parse::<usize>().map_err(|_| {
                ProtocolError::InvalidMessage(format!("bad File size: {value}"))
            })?;
            if data.len() - pos < size {
                return Err(ProtocolError::InvalidMessage(format!(
                    "attachment '{name}' shorter than declared size"
                )));
            }
            attachments.push(Attachment::new(name, data[pos..pos + size].to_vec()));
            pos += size;
        }

        Ok(Self {
            header,
            body,
            attachments,
        })
    }

    /// Canonical serialization.
    ///
    /// Known headers are emitted in a fixed order, then any remaining
    /// headers in insertion order, then the blank separator, body, and
    /// attachment payloads back to back.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());

        let mut put = |name: &str, value: &str| {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        };

        for name in ["Mid", "Date", "Type", "From"] {
            if let Some(v) = self.header.get(name) {
                put(name, v);
            }
        }
        for v in self.header.get_all("To") {
            put("To", v);
        }
        for v in self.header.get_all("Cc") {
            put("Cc", v);
        }
        for name in ["Subject", "Mbo"] {
            if let Some(v) = self.header.get(name) {
                put(name, v);
            }
        }
        put("Body", &self.body.len().to_string());
        for a in &self.attachments {
            put("File", &format!("{} {}", a.data.len(), a.name));
        }
        for (name, value) in self.header.iter() {
            if !CANONICAL_NAMES.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                put(name, value);
            }
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        for a in &self.attachments {
            out.extend_from_slice(&a.data);
        }
        out
    }

    /// Check the invariants required before a message may be offered or
    /// stored.
    pub fn validate(&self) -> Result<()> {
        let mid = self.mid();
        if mid.is_empty() {
            return Err(ProtocolError::InvalidMessage("empty Mid".to_string()));
        }
        if mid.len() > MAX_MID_LENGTH {
            return Err(ProtocolError::InvalidMessage(format!(
                "Mid too long: {} chars (max {MAX_MID_LENGTH})",
                mid.len()
            )));
        }
        if !mid.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(ProtocolError::InvalidMessage(format!(
                "Mid contains invalid characters: {mid}"
            )));
        }
        match self.header.get("From") {
            Some(from) if !from.is_empty() => {}
            _ => return Err(ProtocolError::InvalidMessage("empty From".to_string())),
        }
        match self.header.get("Date") {
            Some(date) => {
                DateTime::<FixedOffset>::parse_from_rfc2822(date).map_err(|_| {
                    ProtocolError::InvalidMessage(format!("unparseable Date: {date}"))
                })?;
            }
            None => return Err(ProtocolError::InvalidMessage("missing Date".to_string())),
        }
        if let Some(declared) = self.header.get("Body") {
            let declared: usize = declared.parse().map_err(|_| {
                ProtocolError::InvalidMessage(format!("bad Body size: {declared}"))
            })?;
            if declared != self.body.len() {
                return Err(ProtocolError::InvalidMessage(format!(
                    "Body size mismatch: declared {declared}, actual {}",
                    self.body.len()
                )));
            }
        } else if !self.body.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "body present but Body header missing".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate a fresh 12-character MID: a timestamp-derived prefix and a
/// station-derived suffix, always within `[A-Z0-9_]`.
pub fn generate_mid(mycall: &str) -> String {
    let now = Utc::now();
    let mut mid = encode_base36(now.timestamp().unsigned_abs(), 8);

    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in mycall
        .bytes()
        .chain(now.timestamp_subsec_nanos().to_le_bytes())
    {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    mid.push_str(&encode_base36(hash % 36u64.pow(4), 4));
    mid
}

fn encode_base36(mut value: u64, width: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut buf = vec![b'0'; width];
    for slot in buf.iter_mut().rev() {
        *slot = DIGITS[(value % 36) as usize];
        value /= 36;
    }
    buf.into_iter().map(char::from).collect()
}
