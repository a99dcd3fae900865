//! Shared fixtures for the session integration tests: an in-memory
//! mailbox handler, a traffic tap, and a robust-capable mock connection.

#![allow(dead_code)]

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use b2f::{
    Address, Connection, MBoxHandler, Message, Proposal, ProposalAnswer, Result, Session,
    SessionConfig, TrafficStats,
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Everything a [`MemoryHandler`] observes during an exchange.
#[derive(Default)]
pub struct HandlerLog {
    pub sent: Vec<(String, bool)>,
    pub deferred: Vec<String>,
    pub inbound: Vec<Message>,
    /// Proposals seen by `get_inbound_answer`, in offer order.
    pub offered: Vec<(String, String)>,
}

/// An in-memory mailbox handler for tests.
pub struct MemoryHandler {
    outbound: Vec<Message>,
    reject: HashSet<String>,
    defer: HashSet<String>,
    fail_process_inbound: bool,
    pub log: Arc<Mutex<HandlerLog>>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self {
            outbound: Vec::new(),
            reject: HashSet::new(),
            defer: HashSet::new(),
            fail_process_inbound: false,
            log: Arc::new(Mutex::new(HandlerLog::default())),
        }
    }

    pub fn with_outbound(mut self, msg: Message) -> Self {
        self.outbound.push(msg);
        self
    }

    pub fn rejecting(mut self, mid: &str) -> Self {
        self.reject.insert(mid.to_string());
        self
    }

    pub fn deferring(mut self, mid: &str) -> Self {
        self.defer.insert(mid.to_string());
        self
    }

    pub fn failing_process_inbound(mut self) -> Self {
        self.fail_process_inbound = true;
        self
    }

    pub fn log_handle(&self) -> Arc<Mutex<HandlerLog>> {
        self.log.clone()
    }
}

impl MBoxHandler for MemoryHandler {
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_outbound(&mut self, fw: &[Address]) -> Vec<Message> {
        self.outbound
            .iter()
            .filter(|m| fw.is_empty() || fw.iter().any(|a| a.is_only_recipient(m)))
            .cloned()
            .collect()
    }

    fn set_sent(&mut self, mid: &str, rejected: bool) {
        self.log
            .lock()
            .unwrap()
            .sent
            .push((mid.to_string(), rejected));
        self.outbound.retain(|m| m.mid() != mid);
    }

    fn set_deferred(&mut self, mid: &str) {
        self.log.lock().unwrap().deferred.push(mid.to_string());
        self.outbound.retain(|m| m.mid() != mid);
    }

    fn get_inbound_answer(&mut self, proposal: &Proposal) -> ProposalAnswer {
        self.log
            .lock()
            .unwrap()
            .offered
            .push((proposal.mid().to_string(), proposal.title().to_string()));
        if self.reject.contains(proposal.mid()) {
            ProposalAnswer::Reject
        } else if self.defer.contains(proposal.mid()) {
            ProposalAnswer::Defer
        } else {
            ProposalAnswer::Accept
        }
    }

    fn process_inbound(&mut self, msgs: Vec<Message>) -> Result<()> {
        if self.fail_process_inbound {
            return Err(b2f::ProtocolError::Mailbox("disk full".to_string()));
        }
        self.log.lock().unwrap().inbound.extend(msgs);
        Ok(())
    }
}

/// Build a valid test message.
pub fn test_message(mid: &str, to: &str, subject: &str, body: &[u8]) -> Message {
    let mut msg = Message::new();
    msg.header_mut().set("Mid", mid);
    msg.header_mut()
        .set("Date", "Thu, 04 Jan 2024 10:00:00 +0000");
    msg.header_mut().set("Type", "Private");
    msg.header_mut().set("From", "LA5NTA");
    msg.add_to(&Address::new(to));
    msg.header_mut().set("Subject", subject);
    msg.header_mut().set("Mbo", "LA5NTA");
    msg.set_body(body.to_vec());
    msg
}

pub fn session(mycall: &str, targetcall: &str, handler: MemoryHandler) -> Session {
    let config = SessionConfig::new(mycall, targetcall);
    Session::new(config, Some(Box::new(handler))).expect("valid session config")
}

/// Run a master/slave pair over an in-memory pipe.
pub async fn run_pair(
    mut master: Session,
    mut slave: Session,
) -> (Result<TrafficStats>, Result<TrafficStats>) {
    master.set_master(true);
    let (a, b) = tokio::io::duplex(256 * 1024);
    let m = tokio::spawn(async move { master.exchange(a).await });
    let s = tokio::spawn(async move { slave.exchange(b).await });
    (m.await.expect("master task"), s.await.expect("slave task"))
}

/// A connection wrapper recording everything written through it.
pub struct Tap {
    inner: DuplexStream,
    written: Arc<Mutex<Vec<u8>>>,
}

impl Tap {
    pub fn new(inner: DuplexStream) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                written: written.clone(),
            },
            written,
        )
    }
}

impl AsyncRead for Tap {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tap {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            self.written.lock().unwrap().extend_from_slice(&buf[..*n]);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Connection for Tap {}

/// A connection advertising robust-mode support, recording every switch.
pub struct RobustProbe {
    inner: DuplexStream,
    switches: Arc<Mutex<Vec<bool>>>,
}

impl RobustProbe {
    pub fn new(inner: DuplexStream) -> (Self, Arc<Mutex<Vec<bool>>>) {
        let switches = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                switches: switches.clone(),
            },
            switches,
        )
    }
}

impl AsyncRead for RobustProbe {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RobustProbe {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Connection for RobustProbe {
    fn set_robust(&mut self, enabled: bool) {
        self.switches.lock().unwrap().push(enabled);
    }

    fn supports_robust(&self) -> bool {
        true
    }
}
