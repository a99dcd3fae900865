//! Deadline-guarded line and byte I/O over the exchange connection.
//!
//! B2F lines are terminated by a bare CR; CRLF is tolerated by swallowing
//! an LF that immediately follows a CR, so byte-oriented reads after a
//! line never see a stray newline. Every operation runs under a deadline
//! supplied by the caller; an expired deadline means the link is dead.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::MAX_LINE_LENGTH;
use crate::error::{ProtocolError, Result};
use crate::transport::Connection;

pub(crate) struct Wire<C> {
    conn: C,
    swallow_lf: bool,
}

impl<C: Connection> Wire<C> {
    pub(crate) fn new(conn: C) -> Self {
        Self {
            conn,
            swallow_lf: false,
        }
    }

    pub(crate) fn conn_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub(crate) async fn shutdown(&mut self) {
        let _ = self.conn.shutdown().await;
    }

    async fn read_raw_byte(&mut self, deadline: Duration) -> Result<u8> {
        match tokio::time::timeout(deadline, self.conn.read_u8()).await {
            Ok(Ok(byte)) => Ok(byte),
            Ok(Err(e)) => Err(ProtocolError::from_io(e)),
            Err(_) => Err(ProtocolError::ConnectionLost),
        }
    }

    /// Read one byte, transparently dropping an LF left over from a CRLF
    /// line terminator.
    pub(crate) async fn read_byte(&mut self, deadline: Duration) -> Result<u8> {
        let mut byte = self.read_raw_byte(deadline).await?;
        if self.swallow_lf {
            self.swallow_lf = false;
            if byte == b'\n' {
                byte = self.read_raw_byte(deadline).await?;
            }
        }
        Ok(byte)
    }

    /// Read a line terminated by CR or LF, without the terminator.
    pub(crate) async fn read_line(&mut self, deadline: Duration) -> Result<String> {
        let mut buf = Vec::new();
        loop {
            let byte = self.read_byte(deadline).await?;
            match byte {
                b'\r' => {
                    self.swallow_lf = true;
                    break;
                }
                b'\n' => break,
                _ => {
                    buf.push(byte);
                    if buf.len() > MAX_LINE_LENGTH {
                        return Err(ProtocolError::Protocol(format!(
                            "line exceeds {MAX_LINE_LENGTH} bytes"
                        )));
                    }
                }
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read exactly `buf.len()` bytes.
    pub(crate) async fn read_exact(&mut self, buf: &mut [u8], deadline: Duration) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        // The swallow flag applies to the first byte only.
        let first = self.read_byte(deadline).await?;
        buf[0] = first;
        let rest = &mut buf[1..];
        if rest.is_empty() {
            return Ok(());
        }
        match tokio::time::timeout(deadline, self.conn.read_exact(rest)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ProtocolError::from_io(e)),
            Err(_) => Err(ProtocolError::ConnectionLost),
        }
    }

    /// Read bytes up to (not including) a NUL terminator.
    pub(crate) async fn read_until_nul(
        &mut self,
        deadline: Duration,
        max_len: usize,
    ) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        loop {
            let byte = self.read_byte(deadline).await?;
            if byte == 0x00 {
                return Ok(buf);
            }
            buf.push(byte);
            if buf.len() > max_len {
                return Err(ProtocolError::Protocol(
                    "unterminated block header field".to_string(),
                ));
            }
        }
    }

    /// Write a protocol line, appending the CR terminator.
    pub(crate) async fn write_line(&mut self, line: &str, deadline: Duration) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\r');
        self.write_raw(&bytes, deadline).await
    }

    /// Write raw bytes and flush.
    pub(crate) async fn write_raw(&mut self, bytes: &[u8], deadline: Duration) -> Result<()> {
        let io = async {
            self.conn.write_all(bytes).await?;
            self.conn.flush().await
        };
        match tokio::time::timeout(deadline, io).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProtocolError::from_io(e)),
            Err(_) => Err(ProtocolError::ConnectionLost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_read_line_cr_terminated() {
        let (mut a, b) = tokio::io::duplex(256);
        a.write_all(b"FF\rFQ\r").await.unwrap();
        let mut wire = Wire::new(b);
        assert_eq!(wire.read_line(D).await.unwrap(), "FF");
        assert_eq!(wire.read_line(D).await.unwrap(), "FQ");
    }

    #[tokio::test]
    async fn test_read_line_crlf_swallowed() {
        let (mut a, b) = tokio::io::duplex(256);
        a.write_all(b"FF\r\nFQ\r\n").await.unwrap();
        let mut wire = Wire::new(b);
        assert_eq!(wire.read_line(D).await.unwrap(), "FF");
        assert_eq!(wire.read_line(D).await.unwrap(), "FQ");
    }

    #[tokio::test]
    async fn test_crlf_then_binary_byte() {
        let (mut a, b) = tokio::io::duplex(256);
        a.write_all(b"FS +\r\n\x01data").await.unwrap();
        let mut wire = Wire::new(b);
        assert_eq!(wire.read_line(D).await.unwrap(), "FS +");
        assert_eq!(wire.read_byte(D).await.unwrap(), 0x01);
    }

    #[tokio::test]
    async fn test_read_exact() {
        let (mut a, b) = tokio::io::duplex(256);
        a.write_all(b"\rABCDE").await.unwrap();
        let mut wire = Wire::new(b);
        wire.read_line(D).await.unwrap();
        let mut buf = [0u8; 5];
        wire.read_exact(&mut buf, D).await.unwrap();
        assert_eq!(&buf, b"ABCDE");
    }

    #[tokio::test]
    async fn test_read_until_nul() {
        let (mut a, b) = tokio::io::duplex(256);
        a.write_all(b"Title\x00123\x00").await.unwrap();
        let mut wire = Wire::new(b);
        assert_eq!(wire.read_until_nul(D, 64).await.unwrap(), b"Title");
        assert_eq!(wire.read_until_nul(D, 64).await.unwrap(), b"123");
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let (mut a, b) = tokio::io::duplex(4096);
        let long = vec![b'x'; MAX_LINE_LENGTH + 10];
        a.write_all(&long).await.unwrap();
        let mut wire = Wire::new(b);
        assert!(matches!(
            wire.read_line(D).await,
            Err(ProtocolError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_close_is_connection_lost() {
        let (a, b) = tokio::io::duplex(16);
        drop(a);
        let mut wire = Wire::new(b);
        assert!(matches!(
            wire.read_line(D).await,
            Err(ProtocolError::ConnectionLost)
        ));
    }

    #[tokio::test]
    async fn test_deadline_maps_to_connection_lost() {
        let (_a, b) = tokio::io::duplex(16);
        let mut wire = Wire::new(b);
        let result = wire.read_line(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_write_line_appends_cr() {
        let (a, mut b) = tokio::io::duplex(256);
        let mut wire = Wire::new(a);
        wire.write_line("FF", D).await.unwrap();
        let mut buf = [0u8; 3];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"FF\r");
    }
}
