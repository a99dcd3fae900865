//! Proposals: the transfer-level unit wrapping one message.
//!
//! A proposal line advertises a message (`FC EM <MID> <size> <csize> 0`),
//! the peer answers with one character per proposal (`FS +-=`), and each
//! accepted proposal's payload follows as a checksummed data block.

use std::fmt;

use crate::codec::Codec;
use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// Default title for proposals built from messages without a subject.
const NO_TITLE: &str = "No title";

/// Start-of-block marker preceding a data block header.
pub const BLOCK_START: u8 = 0x01;
/// End-of-block marker preceding the checksum byte.
pub const BLOCK_END: u8 = 0x04;

/// Proposal codes as they appear on the wire (`F<code> …`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropCode {
    /// Basic ASCII proposal (B1F legacy, not implemented).
    Basic,
    /// Compressed ASCII proposal (B1F legacy, not implemented).
    Ascii,
    /// Compressed v2 proposal (LZHUF).
    #[default]
    Wl2k,
    /// Gzip-compressed v2 proposal.
    Gzip,
}

impl PropCode {
    pub fn as_char(self) -> char {
        match self {
            PropCode::Basic => 'B',
            PropCode::Ascii => 'A',
            PropCode::Wl2k => 'C',
            PropCode::Gzip => 'D',
        }
    }

    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'B' => Ok(PropCode::Basic),
            'A' => Ok(PropCode::Ascii),
            'C' => Ok(PropCode::Wl2k),
            'D' => Ok(PropCode::Gzip),
            other => Err(ProtocolError::UnsupportedProposalCode(other)),
        }
    }

    /// The payload codec for this proposal code.
    ///
    /// Basic and ASCII proposals have no B2F payload form; peers that
    /// negotiated the `F` capability never offer them.
    pub fn codec(self) -> Result<Codec> {
        match self {
            PropCode::Wl2k => Ok(Codec::Lzhuf),
            PropCode::Gzip => Ok(Codec::Gzip),
            PropCode::Basic | PropCode::Ascii => {
                Err(ProtocolError::UnsupportedProposalCode(self.as_char()))
            }
        }
    }
}

/// Answer to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAnswer {
    Accept,
    Reject,
    Defer,
}

impl ProposalAnswer {
    pub fn as_char(self) -> char {
        match self {
            ProposalAnswer::Accept => '+',
            ProposalAnswer::Reject => '-',
            ProposalAnswer::Defer => '=',
        }
    }
}

impl fmt::Display for ProposalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Message precedence, derived from service markers in the title.
/// Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Flash,
    Immediate,
    Priority,
    Routine,
}

/// An inbound or outbound proposal.
#[derive(Debug, Clone, Default)]
pub struct Proposal {
    code: PropCode,
    msg_type: String,
    mid: String,
    title: String,
    size: usize,
    compressed_size: usize,
    compressed_data: Vec<u8>,
    answer: Option<ProposalAnswer>,
    offset: usize,
    sent: bool,
}

impl Proposal {
    /// Build an outbound proposal by compressing `data` with the codec
    /// selected by `code`.
    pub fn new(mid: &str, title: &str, code: PropCode, data: &[u8]) -> Result<Self> {
        let compressed_data = code.codec()?.compress(data)?;
        let compressed_size = compressed_data.len();
        Ok(Self {
            code,
            msg_type: "EM".to_string(),
            mid: mid.to_string(),
            title: if title.is_empty() {
                NO_TITLE.to_string()
            } else {
                title.to_string()
            },
            size: data.len(),
            compressed_size,
            compressed_data,
            answer: None,
            offset: 0,
            sent: false,
        })
    }

    /// Parse a proposal line (`FC …`/`FD …`).
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut chars = line.chars();
        if chars.next() != Some('F') {
            return Err(ProtocolError::Protocol(format!(
                "not a proposal line: {line}"
            )));
        }
        let code = PropCode::from_char(chars.next().ok_or_else(|| {
            ProtocolError::Protocol("unexpected end of proposal line".to_string())
        })?)?;

        match code {
            PropCode::Wl2k | PropCode::Gzip => {}
            PropCode::Basic | PropCode::Ascii => {
                return Err(ProtocolError::UnsupportedProposalCode(code.as_char()))
            }
        }

        // FC EM TJKYEIMMHSRB 527 123 0
        let rest = line.get(3..).unwrap_or_default();
        let parts: Vec<&str> = rest.split(' ').collect();
        if parts.len() < 5 {
            return Err(ProtocolError::Protocol(format!(
                "malformed proposal: {line}"
            )));
        }
        if parts.len() > 5 {
            return Err(ProtocolError::Protocol(format!(
                "too many fields in proposal: {line}"
            )));
        }

        let msg_type = parts[0];
        if msg_type != "EM" && msg_type != "CM" {
            return Err(ProtocolError::Protocol(format!(
                "expected message type CM or EM, found {msg_type}"
            )));
        }

        let size = parts[2]
            .parse::<usize>()
            .map_err(|_| ProtocolError::Protocol(format!("bad size in proposal: {line}")))?;
        let compressed_size = parts[3]
            .parse::<usize>()
            .map_err(|_| ProtocolError::Protocol(format!("bad size in proposal: {line}")))?;

        Ok(Self {
            code,
            msg_type: msg_type.to_string(),
            mid: parts[1].to_string(),
            title: String::new(),
            size,
            compressed_size,
            compressed_data: Vec::new(),
            answer: None,
            offset: 0,
            sent: false,
        })
    }

    /// The proposal line as transmitted, without the trailing CR.
    pub fn wire_line(&self) -> String {
        format!(
            "F{} {} {} {} {} 0",
            self.code.as_char(),
            self.msg_type,
            self.mid,
            self.size,
            self.compressed_size
        )
    }

    pub fn code(&self) -> PropCode {
        self.code
    }

    pub fn mid(&self) -> &str {
        &self.mid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Install the title carried by an inbound data-block header.
    pub(crate) fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Uncompressed payload length.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn compressed_size(&self) -> usize {
        self.compressed_size
    }

    pub fn compressed_data(&self) -> &[u8] {
        &self.compressed_data
    }

    /// Install payload bytes received from the peer.
    pub fn set_compressed_data(&mut self, data: Vec<u8>) {
        self.compressed_data = data;
    }

    /// True once the payload matches the advertised compressed size.
    pub fn data_is_complete(&self) -> bool {
        self.compressed_data.len() == self.compressed_size
    }

    pub fn answer(&self) -> Option<ProposalAnswer> {
        self.answer
    }

    pub fn set_answer(&mut self, answer: ProposalAnswer) {
        self.answer = Some(answer);
    }

    /// Resume offset requested by the peer (0 = from the start).
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// Decompress the payload.
    pub fn data(&self) -> Result<Vec<u8>> {
        if !self.data_is_complete() {
            return Err(ProtocolError::Protocol(format!(
                "proposal {} payload incomplete: {} of {} bytes",
                self.mid,
                self.compressed_data.len(),
                self.compressed_size
            )));
        }
        self.code.codec()?.decompress(&self.compressed_data)
    }

    /// Decompress and parse the payload as a [`Message`].
    pub fn message(&self) -> Result<Message> {
        Message::from_bytes(&self.data()?)
    }

    /// Precedence class of this proposal, from markers in the title.
    pub fn precedence(&self) -> Precedence {
        if self.title.contains("//WL2K Z/") {
            Precedence::Flash
        } else if self.title.contains("//WL2K O/") {
            Precedence::Immediate
        } else if self.title.contains("//WL2K P/") {
            Precedence::Priority
        } else {
            Precedence::Routine
        }
    }
}

impl Message {
    /// Wrap this message in a proposal ready for outbound transfer.
    pub fn proposal(&self, code: PropCode) -> Result<Proposal> {
        Proposal::new(self.mid(), self.subject(), code, &self.to_bytes())
    }
}

/// Order proposals for offering: ascending compressed size with MID as
/// tiebreak, then a stable re-sort by precedence. Within each precedence
/// class the smallest message goes first.
pub fn sort_proposals(props: &mut [Proposal]) {
    props.sort_by(|a, b| {
        a.compressed_size
            .cmp(&b.compressed_size)
            .then_with(|| a.mid.cmp(&b.mid))
    });
    // Both passes rely on sort_by being stable.
    props.sort_by_key(|p| p.precedence());
}

/// Serialize the answer characters for an `FS` line, in offer order.
pub fn encode_answers(props: &[Proposal]) -> String {
    props
        .iter()
        .map(|p| p.answer().map(|a| a.as_char()).unwrap_or('-'))
        .collect()
}

/// Parse the answer field of an `FS` line into (answer, offset) pairs.
///
/// An `Accept` may carry a resume offset as `+!<n>`; `!0` means none.
pub fn parse_answers(field: &str) -> Result<Vec<(ProposalAnswer, usize)>> {
    let mut answers = Vec::new();
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '+' => {
                let mut offset = 0usize;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    let mut digits = String::new();
                    while chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                        digits.push(chars.next().unwrap_or('0'));
                    }
                    offset = digits.parse().map_err(|_| {
                        ProtocolError::Protocol(format!("bad resume offset in answers: {field}"))
                    })?;
                }
                answers.push((ProposalAnswer::Accept, offset));
            }
            '-' => answers.push((ProposalAnswer::Reject, 0)),
            '=' => answers.push((ProposalAnswer::Defer, 0)),
            other => {
                return Err(ProtocolError::Protocol(format!(
                    "unexpected answer character '{other}'"
                )))
            }
        }
    }
    Ok(answers)
}

/// Checksum byte for a data block: the two's complement of the byte sum,
/// so that `(sum + checksum) % 256 == 0`.
pub fn block_checksum(payload: &[u8]) -> u8 {
    super::negated_sum(payload)
}

/// Encode the data block for an accepted proposal: start marker, title and
/// offset header, payload from the resume offset, end marker, checksum.
pub fn encode_data_block(prop: &Proposal) -> Vec<u8> {
    let payload = &prop.compressed_data()[prop.offset().min(prop.compressed_size())..];
    let mut block = Vec::with_capacity(payload.len() + prop.title().len() + 8);
    block.push(BLOCK_START);
    block.extend_from_slice(prop.title().as_bytes());
    block.push(0x00);
    block.extend_from_slice(prop.offset().to_string().as_bytes());
    block.push(0x00);
    block.extend_from_slice(payload);
    block.push(BLOCK_END);
    block.push(block_checksum(payload));
    block
}
