//! The mailbox handler contract consumed by a session.
//!
//! The session owns no message storage; the handler is the sole authority
//! on which outbound messages exist and on what happens to inbound ones.
//! All methods are invoked from the session's single task, strictly
//! serialized, and must not call back into the session.

use crate::error::Result;
use crate::message::{Address, Message};
use crate::protocol::proposal::{Proposal, ProposalAnswer};

/// Handles inbound and outbound messages for a [`crate::Session`].
pub trait MBoxHandler: Send {
    /// Called before any other operation in a session.
    ///
    /// An error indicates the mailbox is not ready for a new session and
    /// is forwarded to the remote node.
    fn prepare(&mut self) -> Result<()>;

    /// All pending outbound messages addressed to (and only to) one of
    /// the `fw` addresses.
    ///
    /// An empty `fw` slice implies the remote node may be a Winlink CMS
    /// and any outbound message can be delivered through it, except those
    /// flagged `X-P2POnly`.
    fn get_outbound(&mut self, fw: &[Address]) -> Vec<Message>;

    /// Mark the message identified by `mid` as successfully sent.
    ///
    /// `rejected` means the remote answered the proposal with a reject,
    /// which implies it already has the message.
    fn set_sent(&mut self, mid: &str, rejected: bool);

    /// Mark the outbound message identified by `mid` as deferred; the
    /// remote wants it offered again later.
    fn set_deferred(&mut self, mid: &str);

    /// Answer an inbound proposal. An already-received message (same MID)
    /// should be rejected.
    fn get_inbound_answer(&mut self, proposal: &Proposal) -> ProposalAnswer;

    /// Persist all messages received this turn.
    ///
    /// An error is delivered to the remote (when possible) to signal that
    /// processing failed.
    fn process_inbound(&mut self, msgs: Vec<Message>) -> Result<()>;
}
