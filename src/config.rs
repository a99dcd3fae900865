//! # Session Configuration
//!
//! Centralized configuration for a B2F exchange session.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Feature flags read from the environment once, at construction
//!   (`FeatureFlags::from_env`), never mid-session
//!
//! ## Notes
//! - Station call signs are upper-cased when the session is built
//! - The user-agent name and version are sent inside the SID banner and
//!   therefore must not contain a dash

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Max allowed uncompressed message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Protocol batch cap: a proposal batch may carry at most this many entries.
pub const MAX_BATCH_SIZE: usize = 5;

/// Max accepted line length on the wire; longer lines are a protocol error.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Default user agent reported in the SID banner.
pub const DEFAULT_AGENT_NAME: &str = "b2f";
pub const DEFAULT_AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Robust-mode policy for the exchange connection.
///
/// The mode is ignored when the connection does not support robust-mode
/// switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobustMode {
    /// Robust during protocol phases, switched off for each outbound data
    /// block to maximize throughput.
    #[default]
    Auto,
    /// Always robust.
    Forced,
    /// Never robust.
    Disabled,
}

/// Identifies this client inside the SID banner, e.g. `[b2f-0.1.0-B2FHM$]`.
///
/// Neither field may contain a dash; the banner is dash-delimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    pub name: String,
    pub version: String,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            version: DEFAULT_AGENT_VERSION.to_string(),
        }
    }
}

/// Experimental features, each gated by an environment variable.
///
/// The environment is consulted exactly once, when the session is
/// constructed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// `GZIP_EXPERIMENT`: advertise the `G` SID flag and use `D`-type
    /// (gzip) proposals when the remote advertises it too.
    #[serde(default)]
    pub gzip: bool,

    /// `FW_AUX_ONLY_EXPERIMENT`: request messages only for auxiliary
    /// addresses, dropping mycall from the forwarder list when
    /// auxiliaries exist.
    #[serde(default)]
    pub fw_aux_only: bool,
}

impl FeatureFlags {
    pub fn from_env() -> Self {
        Self {
            gzip: env_truthy("GZIP_EXPERIMENT"),
            fw_aux_only: env_truthy("FW_AUX_ONLY_EXPERIMENT"),
        }
    }
}

fn env_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True"),
        Err(_) => false,
    }
}

/// I/O deadlines used while driving the exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timeouts {
    /// Ordinary line reads and writes.
    #[serde(with = "duration_serde")]
    pub line: Duration,

    /// Data-block transfers, which can be slow on HF links.
    #[serde(with = "duration_serde")]
    pub transfer: Duration,

    /// Best-effort emission of a `***` error line before disconnect.
    #[serde(with = "duration_serde")]
    pub error_line: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            line: Duration::from_secs(30),
            transfer: Duration::from_secs(5 * 60),
            error_line: Duration::from_secs(60),
        }
    }
}

/// Everything a [`crate::Session`] needs to know up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Our station call sign.
    pub mycall: String,

    /// The remote station call sign.
    pub targetcall: String,

    /// Maidenhead locator, included in the handshake when set.
    #[serde(default)]
    pub locator: String,

    /// Message-of-the-day lines, sent (each prefixed `;`) before the
    /// banner when we are session master.
    #[serde(default)]
    pub motd: Vec<String>,

    #[serde(default)]
    pub user_agent: UserAgent,

    #[serde(default)]
    pub robust_mode: RobustMode,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(default)]
    pub timeouts: Timeouts,
}

impl SessionConfig {
    /// Minimal configuration with default agent, timeouts, and the feature
    /// flags read from the environment.
    pub fn new(mycall: &str, targetcall: &str) -> Self {
        Self {
            mycall: mycall.to_string(),
            targetcall: targetcall.to_string(),
            locator: String::new(),
            motd: Vec::new(),
            user_agent: UserAgent::default(),
            robust_mode: RobustMode::default(),
            features: FeatureFlags::from_env(),
            timeouts: Timeouts::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Validate the configuration for common issues.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.mycall.trim().is_empty() {
            errors.push("mycall cannot be empty".to_string());
        }
        if self.targetcall.trim().is_empty() {
            errors.push("targetcall cannot be empty".to_string());
        }
        if self.user_agent.name.is_empty() {
            errors.push("user agent name cannot be empty".to_string());
        }
        if self.user_agent.name.contains('-') {
            errors.push(format!(
                "user agent name must not contain '-': '{}'",
                self.user_agent.name
            ));
        }
        if self.user_agent.version.contains('-') {
            errors.push(format!(
                "user agent version must not contain '-': '{}'",
                self.user_agent.version
            ));
        }
        for line in &self.motd {
            if line.contains('\r') || line.contains('\n') {
                errors.push("MOTD lines must not contain line breaks".to_string());
            }
        }
        if self.timeouts.line < Duration::from_millis(100) {
            errors.push("line timeout too short (minimum: 100ms)".to_string());
        }
        if self.timeouts.transfer < self.timeouts.line {
            errors.push("transfer timeout must not be shorter than line timeout".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Config(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::new("LA5NTA", "LA1B");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_empty_callsign_rejected() {
        let config = SessionConfig::new("", "LA1B");
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_dash_in_user_agent_rejected() {
        let mut config = SessionConfig::new("LA5NTA", "LA1B");
        config.user_agent.name = "my-client".to_string();
        assert!(config
            .validate()
            .iter()
            .any(|e| e.contains("must not contain '-'")));
    }

    #[test]
    fn test_motd_with_newline_rejected() {
        let mut config = SessionConfig::new("LA5NTA", "LA1B");
        config.motd = vec!["hello\r\nworld".to_string()];
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_from_toml() {
        let config = SessionConfig::from_toml(
            r#"
                mycall = "LA5NTA"
                targetcall = "LA1B"
                locator = "JP20"
                motd = ["Welcome"]

                [timeouts]
                line = 15000
                transfer = 120000
                error_line = 30000
            "#,
        )
        .unwrap();
        assert_eq!(config.mycall, "LA5NTA");
        assert_eq!(config.locator, "JP20");
        assert_eq!(config.timeouts.line, Duration::from_secs(15));
        assert!(config.validate_strict().is_ok());
    }

    #[test]
    fn test_invalid_toml_errors() {
        assert!(matches!(
            SessionConfig::from_toml("mycall = ["),
            Err(ProtocolError::Config(_))
        ));
    }
}
