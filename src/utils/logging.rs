//! Structured logging setup.
//!
//! The library itself only emits `tracing` events; binaries embedding it
//! call [`init`] (or install their own subscriber) to get them on screen.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatting subscriber honoring `RUST_LOG`, defaulting to
/// `info` for this crate.
///
/// Returns quietly if a global subscriber is already set, so tests and
/// embedding applications can call it freely.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("b2f=info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        super::init();
        super::init();
    }
}
