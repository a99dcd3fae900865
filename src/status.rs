//! Transfer status reporting and traffic statistics.

use std::time::SystemTime;

use crate::protocol::proposal::Proposal;

/// A point-in-time snapshot of an ongoing transfer.
///
/// Exactly one of `sending`/`receiving` is set while a data block moves;
/// the final update for a transfer has `done == true`.
#[derive(Debug, Clone, Copy)]
pub struct Status<'a> {
    pub sending: Option<&'a Proposal>,
    pub receiving: Option<&'a Proposal>,
    pub bytes_transferred: usize,
    pub bytes_total: usize,
    pub done: bool,
    pub when: SystemTime,
}

/// Receives status updates from a running session.
///
/// Updates are delivered synchronously from the session task: a blocking
/// implementation blocks the exchange, so implementations should hand the
/// snapshot off rather than perform I/O.
pub trait StatusUpdater: Send {
    fn update_status(&mut self, status: Status<'_>);
}

/// Accumulated message traffic for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// MIDs of messages received from the remote.
    pub received: Vec<String>,
    /// MIDs of messages delivered to the remote.
    pub sent: Vec<String>,
}

impl TrafficStats {
    pub fn is_empty(&self) -> bool {
        self.received.is_empty() && self.sent.is_empty()
    }
}
