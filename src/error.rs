//! # Error Types
//!
//! Error handling for the B2F protocol implementation.
//!
//! This module defines all error variants that can occur during a message
//! exchange, from low-level I/O failures to protocol violations detected on
//! the line.
//!
//! ## Error Categories
//! - **Transport errors**: connection lost, timeouts, underlying I/O failures
//! - **Protocol errors**: malformed lines, bad checksums, oversized batches
//! - **Auth errors**: secure-login challenge could not be answered
//! - **Mailbox errors**: the mailbox handler refused to prepare or store
//! - **Codec errors**: compression/decompression failures
//!
//! Protocol, auth, and mailbox errors are echoed to the remote peer as a
//! `*** <message>` line before the connection is closed. Transport errors
//! are not echoed; the line is already gone.

use std::io;
use thiserror::Error;

/// ProtocolError is the primary error type for all B2F operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The connection was closed before the exchange completed, or a
    /// read/write deadline expired.
    #[error("connection lost")]
    ConnectionLost,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("unsupported proposal code '{0}'")]
    UnsupportedProposalCode(char),

    #[error("too many proposals in batch: {0}")]
    TooManyProposals(usize),

    /// Remote peer reported an error on the line (a `*** …` line).
    #[error("remote error: {0}")]
    Remote(String),

    #[error("secure login failed: {0}")]
    Auth(String),

    #[error("mailbox error: {0}")]
    Mailbox(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// True if this error means the line is gone and nothing more can be
    /// written to the peer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProtocolError::ConnectionLost | ProtocolError::Io(_))
    }

    /// Collapse I/O errors that indicate a dead connection into
    /// [`ProtocolError::ConnectionLost`], leaving everything else as-is.
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => ProtocolError::ConnectionLost,
            _ => ProtocolError::Io(err),
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
