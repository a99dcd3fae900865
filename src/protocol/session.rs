//! The B2F session: handshake, turn loop, and teardown.
//!
//! A session is built once, drives a single [`exchange`](Session::exchange)
//! over a caller-provided connection, and is spent afterwards. The state
//! machine is strictly turn-based: after the banner handshake the master
//! takes the first outbound turn, and the sides alternate until one of
//! them quits.

use tracing::{debug, info, warn};

use crate::config::{RobustMode, SessionConfig, UserAgent};
use crate::error::{ProtocolError, Result};
use crate::handler::MBoxHandler;
use crate::message::Address;
use crate::protocol::secure_login::{self, CHALLENGE_PREFIX, RESPONSE_PREFIX};
use crate::protocol::sid::{flags, Sid};
use crate::protocol::wire::Wire;
use crate::status::{Status, StatusUpdater, TrafficStats};
use crate::transport::Connection;

/// Prefix of the remote forwarder-list line.
const FW_PREFIX: &str = ";FW:";
/// Prefix of an error line from the peer.
const ERROR_PREFIX: &str = "***";

/// Callback used to obtain the secure-login password for a remote address.
pub type SecureLoginFn = Box<dyn FnMut(&Address) -> Result<String> + Send>;

/// A B2F exchange session.
///
/// A session should only be used once; a second
/// [`exchange`](Session::exchange) call is a no-op returning empty stats.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) mycall: String,
    pub(crate) targetcall: String,

    pub(crate) handler: Option<Box<dyn MBoxHandler>>,
    pub(crate) status_updater: Option<Box<dyn StatusUpdater>>,
    secure_login_fn: Option<SecureLoginFn>,

    pub(crate) master: bool,

    pub(crate) remote_sid: Sid,
    /// Addresses the remote requests messages on behalf of.
    pub(crate) remote_fw: Vec<Address>,
    /// Addresses we request messages on behalf of.
    pub(crate) local_fw: Vec<Address>,

    pub(crate) stats: TrafficStats,

    pub(crate) quit_received: bool,
    pub(crate) quit_sent: bool,
    /// True if the remote's last turn carried no messages.
    pub(crate) remote_no_msgs: bool,
    /// True once we have signaled an empty turn ourselves.
    pub(crate) sent_no_msgs: bool,

    finished: bool,
}

impl Session {
    /// Build a session from a validated configuration.
    ///
    /// The handler may be `None`, in which case no messages are exchanged.
    pub fn new(config: SessionConfig, handler: Option<Box<dyn MBoxHandler>>) -> Result<Self> {
        config.validate_strict()?;
        let mycall = config.mycall.to_ascii_uppercase();
        let targetcall = config.targetcall.to_ascii_uppercase();
        let local_fw = vec![Address::new(&mycall)];
        Ok(Self {
            config,
            mycall,
            targetcall,
            handler,
            status_updater: None,
            secure_login_fn: None,
            master: false,
            remote_sid: Sid::default(),
            remote_fw: Vec::new(),
            local_fw,
            stats: TrafficStats::default(),
            quit_received: false,
            quit_sent: false,
            remote_no_msgs: false,
            sent_no_msgs: false,
            finished: false,
        })
    }

    /// This station's call sign.
    pub fn mycall(&self) -> &str {
        &self.mycall
    }

    /// The remote station's call sign.
    pub fn targetcall(&self) -> &str {
        &self.targetcall
    }

    /// Set whether this end initiates the handshake.
    pub fn set_master(&mut self, master: bool) {
        self.master = master;
    }

    /// The remote's SID, available once the handshake is done.
    pub fn remote_sid(&self) -> &Sid {
        &self.remote_sid
    }

    /// The addresses the remote requests traffic on behalf of. Typically
    /// the remote P2P station's call sign, and empty for a Winlink CMS.
    pub fn remote_forwarders(&self) -> &[Address] {
        &self.remote_fw
    }

    /// Request messages on behalf of additional addresses.
    ///
    /// The Winlink system only supports call signs here, not full email
    /// addresses.
    pub fn add_auxiliary_address(&mut self, aux: Address) {
        self.local_fw.push(aux);
    }

    /// Register a callback used to answer a secure-login challenge.
    pub fn set_secure_login_fn(&mut self, f: SecureLoginFn) {
        self.secure_login_fn = Some(f);
    }

    /// Set the observer for transfer status updates.
    pub fn set_status_updater(&mut self, updater: Box<dyn StatusUpdater>) {
        self.status_updater = Some(updater);
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.config.user_agent
    }

    /// True once either side has quit the session.
    pub fn done(&self) -> bool {
        self.quit_received || self.quit_sent
    }

    /// Traffic accumulated so far. After a failed exchange this still
    /// holds the messages that did complete.
    pub fn traffic_stats(&self) -> &TrafficStats {
        &self.stats
    }

    /// Exchange messages with the remote node over `conn`.
    ///
    /// Drives the handshake and the turn loop to completion, closing the
    /// connection on the way out. Returns the traffic statistics for the
    /// exchange; partial traffic is preserved when an error terminates the
    /// session early. A closed or timed-out connection surfaces as
    /// [`ProtocolError::ConnectionLost`]; other errors are echoed to the
    /// peer as a `*** <message>` line before disconnecting.
    pub async fn exchange<C: Connection>(&mut self, conn: C) -> Result<TrafficStats> {
        if self.finished || self.done() {
            return Ok(TrafficStats::default());
        }
        self.finished = true;

        let mut wire = Wire::new(conn);
        let result = self.run(&mut wire).await;

        if wire.conn_mut().supports_robust() {
            wire.conn_mut().set_robust(false);
        }

        match result {
            Ok(()) => {
                wire.shutdown().await;
                Ok(self.stats.clone())
            }
            Err(err) => {
                if !err.is_transport() {
                    // Best effort: echo the failure to the peer before
                    // hanging up, under its own short deadline.
                    let line = format!("{ERROR_PREFIX} {err}\r\n");
                    let _ = wire
                        .write_raw(line.as_bytes(), self.config.timeouts.error_line)
                        .await;
                }
                wire.shutdown().await;
                Err(err)
            }
        }
    }

    async fn run<C: Connection>(&mut self, wire: &mut Wire<C>) -> Result<()> {
        if self.config.features.fw_aux_only && self.local_fw.len() > 1 {
            self.local_fw.remove(0);
            info!(fw = ?self.local_fw, "requesting messages for auxiliary addresses only");
        }

        if let Some(handler) = self.handler.as_mut() {
            handler
                .prepare()
                .map_err(|e| ProtocolError::Mailbox(e.to_string()))?;
        }

        if wire.conn_mut().supports_robust() {
            wire.conn_mut()
                .set_robust(self.config.robust_mode != RobustMode::Disabled);
        }

        self.handshake(wire).await?;

        if self.gzip_negotiated() {
            info!("gzip compression enabled for this session");
        }

        let mut my_turn = self.master;
        while !self.done() {
            if my_turn {
                self.handle_outbound(wire).await?;
            } else {
                self.handle_inbound(wire).await?;
            }
            my_turn = !my_turn;
        }
        Ok(())
    }

    pub(crate) fn gzip_negotiated(&self) -> bool {
        self.config.features.gzip && self.remote_sid.has(flags::GZIP)
    }

    async fn handshake<C: Connection>(&mut self, wire: &mut Wire<C>) -> Result<()> {
        let deadline = self.config.timeouts.line;
        let my_sid = Sid::local(&self.config.user_agent, self.config.features.gzip);

        if self.master {
            for line in &self.config.motd {
                wire.write_line(&format!(";{line}"), deadline).await?;
            }
            self.write_fw_line(wire).await?;
            wire.write_line(my_sid.as_str(), deadline).await?;

            let challenge = self.read_until_banner(wire).await?;
            if let Some(challenge) = challenge {
                self.answer_challenge(wire, &challenge).await?;
            }

            let pending = self.count_pending_outbound();
            let de_line = if self.config.locator.is_empty() {
                format!("; {} DE {} QTC {}", self.targetcall, self.mycall, pending)
            } else {
                format!(
                    "; {} DE {} ({}) QTC {}",
                    self.targetcall, self.mycall, self.config.locator, pending
                )
            };
            wire.write_line(&de_line, deadline).await?;
        } else {
            let challenge = self.read_until_banner(wire).await?;
            self.write_fw_line(wire).await?;
            wire.write_line(my_sid.as_str(), deadline).await?;
            if let Some(challenge) = challenge {
                self.answer_challenge(wire, &challenge).await?;
            }
        }

        debug!(remote_sid = %self.remote_sid, "handshake complete");
        Ok(())
    }

    /// Read peer lines until its banner arrives, collecting any secure
    /// login challenge and forwarder list seen on the way.
    async fn read_until_banner<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
    ) -> Result<Option<String>> {
        let deadline = self.config.timeouts.line;
        let mut challenge = None;
        loop {
            let line = wire.read_line(deadline).await?;
            if line.is_empty() {
                continue;
            }
            if let Some(text) = line.strip_prefix(ERROR_PREFIX) {
                return Err(ProtocolError::Remote(text.trim().to_string()));
            }
            if line.starts_with('[') {
                let sid = Sid::parse(&line).ok_or_else(|| {
                    ProtocolError::Protocol(format!("malformed banner: {line}"))
                })?;
                if !sid.has(flags::B2F) {
                    return Err(ProtocolError::Protocol(
                        "remote does not support B2F".to_string(),
                    ));
                }
                self.remote_sid = sid;
                return Ok(challenge);
            }
            if let Some(token) = line.strip_prefix(CHALLENGE_PREFIX) {
                challenge = Some(token.trim().to_string());
                continue;
            }
            if self.try_parse_fw_line(&line) {
                continue;
            }
            debug!(%line, "handshake comment");
        }
    }

    pub(crate) async fn answer_challenge<C: Connection>(
        &mut self,
        wire: &mut Wire<C>,
        challenge: &str,
    ) -> Result<()> {
        let Some(get_password) = self.secure_login_fn.as_mut() else {
            return Err(ProtocolError::Auth(
                "secure login required but no password handler is set".to_string(),
            ));
        };
        let password = get_password(&Address::new(&self.targetcall))
            .map_err(|e| ProtocolError::Auth(e.to_string()))?;
        if password.is_empty() {
            return Err(ProtocolError::Auth("empty password".to_string()));
        }

        let response = secure_login::challenge_response(challenge, &password);
        wire.write_line(
            &format!("{RESPONSE_PREFIX} {response}"),
            self.config.timeouts.line,
        )
        .await
    }

    async fn write_fw_line<C: Connection>(&mut self, wire: &mut Wire<C>) -> Result<()> {
        if self.local_fw.is_empty() {
            return Ok(());
        }
        let calls: Vec<&str> = self.local_fw.iter().map(|a| a.as_str()).collect();
        wire.write_line(
            &format!("{FW_PREFIX} {}", calls.join(" ")),
            self.config.timeouts.line,
        )
        .await
    }

    /// Parse a `;FW: CALL [CALL …]` line, updating the remote forwarder
    /// set. Returns false if the line is something else.
    pub(crate) fn try_parse_fw_line(&mut self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix(FW_PREFIX) else {
            return false;
        };
        self.remote_fw = rest.split_whitespace().map(Address::new).collect();
        debug!(fw = ?self.remote_fw, "remote forwarders");
        true
    }

    /// How many messages we intend to offer, for the informational QTC
    /// count in the handshake.
    fn count_pending_outbound(&mut self) -> usize {
        let fw = self.remote_fw.clone();
        match self.handler.as_mut() {
            Some(handler) => handler
                .get_outbound(&fw)
                .iter()
                .filter(|m| m.validate().is_ok())
                .count(),
            None => 0,
        }
    }

    /// Log-and-skip wrapper for outbound messages that fail validation.
    pub(crate) fn warn_skipped(&self, mid: &str, reason: &dyn std::fmt::Display) {
        warn!(mid, %reason, "ignoring invalid outbound message");
    }

    /// Push a status snapshot to the registered updater, if any.
    pub(crate) fn push_status(&mut self, status: Status<'_>) {
        if let Some(updater) = self.status_updater.as_mut() {
            updater.update_status(status);
        }
    }
}
