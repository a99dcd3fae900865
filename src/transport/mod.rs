//! # Transports
//!
//! A session drives any bidirectional byte stream; this module defines the
//! small capability trait it requires and provides implementations for the
//! stream types an exchange typically runs over.
//!
//! Physical TNC drivers (serial, AX.25, rig control) live outside this
//! crate; whatever they produce only needs to implement [`Connection`].

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tracing::instrument;

use crate::error::{ProtocolError, Result};

/// A byte stream a session can run over.
///
/// Robust mode is a transport capability that trades throughput for
/// reliability on noisy links. The default implementation reports the
/// capability as absent; transports that support it override both
/// methods.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {
    /// Switch robust mode on or off. No-op when unsupported.
    fn set_robust(&mut self, _enabled: bool) {}

    /// Whether this transport supports robust-mode switching.
    fn supports_robust(&self) -> bool {
        false
    }
}

impl Connection for TcpStream {}

#[cfg(unix)]
impl Connection for tokio::net::UnixStream {}

// In-memory pipe, used to wire two sessions together in tests.
impl Connection for DuplexStream {}

impl<T: Connection + ?Sized> Connection for &mut T {
    fn set_robust(&mut self, enabled: bool) {
        (**self).set_robust(enabled);
    }

    fn supports_robust(&self) -> bool {
        (**self).supports_robust()
    }
}

/// Open a TCP connection with a bounded connect time.
#[instrument]
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ProtocolError::from_io(e)),
        Err(_) => Err(ProtocolError::ConnectionLost),
    }
}
