//! Station addresses: a call sign with an optional email-like domain part.

use std::fmt;

use super::Message;

/// A Winlink address.
///
/// Either a bare call sign (`LA5NTA`) or an email-like form
/// (`LA5NTA@winlink.org`). Upper-cased on construction; comparisons are
/// exact after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    addr: String,
}

impl Address {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.trim().to_ascii_uppercase(),
        }
    }

    /// The call sign / local part (everything before `@`).
    pub fn callsign(&self) -> &str {
        match self.addr.find('@') {
            Some(at) => &self.addr[..at],
            None => &self.addr,
        }
    }

    /// The domain part, if present.
    pub fn domain(&self) -> Option<&str> {
        self.addr.find('@').map(|at| &self.addr[at + 1..])
    }

    pub fn as_str(&self) -> &str {
        &self.addr
    }

    pub fn is_empty(&self) -> bool {
        self.addr.is_empty()
    }

    /// True if `msg` is addressed to this address and nothing else: every
    /// `To`/`Cc`/`Bcc` recipient equals `self`, and there is at least one.
    pub fn is_only_recipient(&self, msg: &Message) -> bool {
        let mut seen = false;
        for name in ["To", "Cc", "Bcc"] {
            for value in msg.header().get_all(name) {
                seen = true;
                if &Address::new(value) != self {
                    return false;
                }
            }
        }
        seen
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address::new(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}
