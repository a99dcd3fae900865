//! Session Identifier (SID) parsing and construction.
//!
//! The SID is the bracketed banner token each side sends during the
//! handshake, e.g. `[RMS Express-1.5.35.0-B2FHM$]`. The last dash-separated
//! segment carries single-character capability flags.

use crate::config::UserAgent;

/// Capability flags carried in a SID.
pub mod flags {
    /// Basic B1F support.
    pub const BASIC: u8 = 1 << 0;
    /// B2F support.
    pub const B2F: u8 = 1 << 1;
    /// Message-identifier format support.
    pub const MID: u8 = 1 << 2;
    /// ID check support.
    pub const ID_CHECK: u8 = 1 << 3;
    /// Hierarchical routing support.
    pub const HIERARCHICAL: u8 = 1 << 4;
    /// Gzip proposal extension.
    pub const GZIP: u8 = 1 << 5;
}

/// A parsed Session Identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sid {
    raw: String,
    caps: u8,
}

impl Sid {
    /// Parse a banner line of the form `[...-...-<flags>$]`.
    ///
    /// Returns `None` unless the line is bracketed. Unknown flag
    /// characters are ignored; known ones match case-insensitively.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let inner = line.strip_prefix('[')?.strip_suffix(']')?;

        let flag_part = inner.rsplit('-').next().unwrap_or(inner);
        let mut caps = 0u8;
        for ch in flag_part.chars() {
            caps |= match ch.to_ascii_uppercase() {
                'B' => flags::BASIC,
                'F' => flags::B2F,
                'M' => flags::MID,
                'I' => flags::ID_CHECK,
                'H' => flags::HIERARCHICAL,
                'G' => flags::GZIP,
                _ => 0,
            };
        }

        Some(Self {
            raw: line.to_string(),
            caps,
        })
    }

    /// Build the local SID from the user agent and feature set.
    pub fn local(agent: &UserAgent, gzip: bool) -> Self {
        let flag_part = if gzip { "B2FGHM$" } else { "B2FHM$" };
        let raw = format!("[{}-{}-{}]", agent.name, agent.version, flag_part);
        Self::parse(&raw).unwrap_or_default()
    }

    pub fn has(&self, flag: u8) -> bool {
        self.caps & flag != 0
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rms_express_banner() {
        let sid = Sid::parse("[RMS Express-1.5.35.0-B2FHM$]").unwrap();
        assert!(sid.has(flags::BASIC));
        assert!(sid.has(flags::B2F));
        assert!(sid.has(flags::MID));
        assert!(sid.has(flags::HIERARCHICAL));
        assert!(!sid.has(flags::GZIP));
        assert!(!sid.has(flags::ID_CHECK));
    }

    #[test]
    fn test_parse_case_insensitive() {
        let sid = Sid::parse("[client-1.0-b2fg$]").unwrap();
        assert!(sid.has(flags::B2F));
        assert!(sid.has(flags::GZIP));
    }

    #[test]
    fn test_unknown_flags_ignored() {
        let sid = Sid::parse("[x-1-B2FWIHJM$]").unwrap();
        assert!(sid.has(flags::B2F));
        assert!(sid.has(flags::ID_CHECK));
    }

    #[test]
    fn test_unbracketed_line_rejected() {
        assert!(Sid::parse("FF").is_none());
        assert!(Sid::parse("; comment").is_none());
    }

    #[test]
    fn test_local_sid() {
        let agent = UserAgent {
            name: "b2f".to_string(),
            version: "0.1.0".to_string(),
        };
        let sid = Sid::local(&agent, false);
        assert_eq!(sid.as_str(), "[b2f-0.1.0-B2FHM$]");
        assert!(sid.has(flags::B2F));
        assert!(!sid.has(flags::GZIP));

        let sid = Sid::local(&agent, true);
        assert_eq!(sid.as_str(), "[b2f-0.1.0-B2FGHM$]");
        assert!(sid.has(flags::GZIP));
    }

    #[test]
    fn test_round_trip_display() {
        let raw = "[b2f-0.1.0-B2FHM$]";
        assert_eq!(Sid::parse(raw).unwrap().to_string(), raw);
    }
}
