//! # b2f - Winlink 2000 B2 Forwarding Protocol
//!
//! Client-side implementation of the B2 Forwarding Protocol (B2F) used by
//! the Winlink 2000 radio-email network to exchange store-and-forward
//! messages with a gateway (RMS) or a peer station over an unreliable,
//! often low-bandwidth link.
//!
//! ## Protocol Overview
//!
//! B2F is a half-duplex, prompt-driven, line-oriented protocol. After a
//! banner handshake the two sides take turns offering batches of
//! compressed message proposals, answering them, and transferring the
//! accepted payloads as checksummed data blocks.
//!
//! ```text
//! Master                                  Slave
//!    |                                      |
//!    |-- ;FW: LA5NTA ---------------------->|
//!    |-- [b2f-0.1.0-B2FHM$] --------------->|
//!    |<------------------- ;FW: LA1B -------|
//!    |<------------- [b2f-0.1.0-B2FHM$] ----|
//!    |-- ; LA1B DE LA5NTA QTC 1 ----------->|
//!    |                                      |
//!    |-- FC EM TJKYEIMMHSRB 527 123 0 ----->|
//!    |-- F> 2A ---------------------------->|
//!    |<----------------------------- FS + --|
//!    |== data block =======================>|
//!    |<----------------------------- FF ----|
//!    |-- FF ------------------------------->|
//!    |<----------------------------- FQ ----|
//! ```
//!
//! ### State Machine
//!
//! ```text
//!  [Init] → [Banner] → [SecureLogin?] → [Forwarders] → [TurnLoop] → [Done]
//!                                                         │  ▲
//!                                                outbound ▼  │ inbound
//!                                                   (alternating turns)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use b2f::{DirHandler, Session, SessionConfig};
//!
//! let config = SessionConfig::new("LA5NTA", "LA1B");
//! let handler = DirHandler::new("/var/mail/LA5NTA", false);
//! let mut session = Session::new(config, Some(Box::new(handler)))?;
//! session.set_master(true);
//!
//! let conn = b2f::transport::connect("rms.example.org:8772", std::time::Duration::from_secs(30)).await?;
//! let stats = session.exchange(conn).await?;
//! println!("sent {} messages, received {}", stats.sent.len(), stats.received.len());
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: the session state machine, proposals, SID, secure login
//! - [`message`]: the Winlink message container (headers, body, attachments)
//! - [`codec`]: LZHUF (B2) and gzip payload compression
//! - [`handler`]: the mailbox contract a session consumes
//! - [`mailbox`]: a directory-backed mailbox handler
//! - [`transport`]: the connection capability trait and TCP helpers
//! - [`config`]: session configuration and feature flags
//! - [`status`]: transfer status observation and traffic statistics
//! - [`error`]: error types and result alias

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod mailbox;
pub mod message;
pub mod protocol;
pub mod status;
pub mod transport;
pub mod utils;

// Re-exports for convenience
pub use codec::Codec;
pub use config::{FeatureFlags, RobustMode, SessionConfig, UserAgent};
pub use error::{ProtocolError, Result};
pub use handler::MBoxHandler;
pub use mailbox::DirHandler;
pub use message::{Address, Attachment, Header, Message};
pub use protocol::proposal::{PropCode, Proposal, ProposalAnswer};
pub use protocol::sid::Sid;
pub use protocol::Session;
pub use status::{Status, StatusUpdater, TrafficStats};
pub use transport::Connection;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
