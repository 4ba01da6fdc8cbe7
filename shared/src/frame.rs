//! Framing layer over a TCP stream half.
//!
//! Everything on the wire is built from three primitives: a big-endian
//! `i32`, a single `0`/`1` byte for booleans, and a string framed as an
//! `i32` byte length followed by that many UTF-8 bytes. Partial reads and
//! writes are absorbed here; callers always see whole values or a fault.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Fault, GameResult, ProtocolViolation};

/// Hard cap on the byte length of a string frame. Anything larger is a
/// protocol violation, which keeps a hostile length prefix from turning
/// into an arbitrarily large allocation.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// EOF inside a frame means the peer went away, not that our read logic
/// is wrong; surface it as a connection fault rather than raw i/o.
fn read_fault(err: std::io::Error) -> Fault {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Fault::Closed
    } else {
        Fault::Io(err)
    }
}

/// Writing side of a frame channel. One task owns it for the lifetime of
/// the connection; the protocol never interleaves writers.
pub struct FrameSender<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Send one big-endian `i32`.
    pub async fn send_i32(&mut self, value: i32) -> GameResult<()> {
        self.inner.write_i32(value).await?;
        Ok(())
    }

    /// Send a boolean as a single byte.
    pub async fn send_bool(&mut self, value: bool) -> GameResult<()> {
        self.inner.write_u8(value as u8).await?;
        Ok(())
    }

    /// Send a raw byte block with no length prefix.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> GameResult<()> {
        self.inner.write_all(bytes).await?;
        Ok(())
    }

    /// Send a length-prefixed UTF-8 string. Refuses strings over
    /// [`MAX_STRING_LEN`] so both ends enforce the same cap.
    pub async fn send_string(&mut self, value: &str) -> GameResult<()> {
        if value.len() > MAX_STRING_LEN {
            return Err(ProtocolViolation::FrameTooLarge {
                len: value.len() as i32,
                limit: MAX_STRING_LEN,
            }
            .into());
        }
        self.inner.write_i32(value.len() as i32).await?;
        self.inner.write_all(value.as_bytes()).await?;
        Ok(())
    }

    /// Push buffered bytes to the socket. Called once per message burst,
    /// not per primitive.
    pub async fn flush(&mut self) -> GameResult<()> {
        self.inner.flush().await?;
        Ok(())
    }
}

/// Reading side of a frame channel.
pub struct FrameReceiver<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Receive one big-endian `i32`.
    pub async fn recv_i32(&mut self) -> GameResult<i32> {
        self.inner.read_i32().await.map_err(read_fault)
    }

    /// Receive a boolean byte; anything but `0` or `1` is a violation.
    pub async fn recv_bool(&mut self) -> GameResult<bool> {
        match self.inner.read_u8().await.map_err(read_fault)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolViolation::InvalidBool(other).into()),
        }
    }

    /// Receive exactly `len` raw bytes. The caller is responsible for
    /// having validated `len` against whatever bound applies.
    pub async fn recv_bytes(&mut self, len: usize) -> GameResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).await.map_err(read_fault)?;
        Ok(buf)
    }

    /// Receive a length-prefixed UTF-8 string, validating the prefix
    /// before allocating.
    pub async fn recv_string(&mut self) -> GameResult<String> {
        let len = self.recv_i32().await?;
        if len < 0 {
            return Err(ProtocolViolation::NegativeLength(len).into());
        }
        if len as usize > MAX_STRING_LEN {
            return Err(ProtocolViolation::FrameTooLarge {
                len,
                limit: MAX_STRING_LEN,
            }
            .into());
        }
        let buf = self.recv_bytes(len as usize).await?;
        String::from_utf8(buf).map_err(|_| ProtocolViolation::InvalidUtf8.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_int_and_bool_round_trip() {
        let (a, b) = tokio::io::duplex(256);
        let mut tx = FrameSender::new(a);
        let mut rx = FrameReceiver::new(b);

        for value in [0, 1, -1, 42, i32::MAX, i32::MIN] {
            tx.send_i32(value).await.unwrap();
            assert_eq!(rx.recv_i32().await.unwrap(), value);
        }
        tx.send_bool(true).await.unwrap();
        tx.send_bool(false).await.unwrap();
        assert!(rx.recv_bool().await.unwrap());
        assert!(!rx.recv_bool().await.unwrap());
    }

    #[tokio::test]
    async fn test_string_round_trip_boundaries() {
        let (a, b) = tokio::io::duplex(2 * MAX_STRING_LEN);
        let mut tx = FrameSender::new(a);
        let mut rx = FrameReceiver::new(b);

        let cases = [
            String::new(),
            "x".to_string(),
            "blank-for-blank".to_string(),
            "x".repeat(MAX_STRING_LEN),
        ];
        for case in &cases {
            tx.send_string(case).await.unwrap();
            assert_eq!(&rx.recv_string().await.unwrap(), case);
        }
    }

    #[tokio::test]
    async fn test_raw_bytes_round_trip() {
        let (a, b) = tokio::io::duplex(256);
        let mut tx = FrameSender::new(a);
        let mut rx = FrameReceiver::new(b);

        let block = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x7f];
        tx.send_bytes(&block).await.unwrap();
        assert_eq!(rx.recv_bytes(block.len()).await.unwrap(), block);
    }

    #[tokio::test]
    async fn test_string_cap_enforced_both_sides() {
        let (a, b) = tokio::io::duplex(256);
        let mut tx = FrameSender::new(a);
        let oversized = "y".repeat(MAX_STRING_LEN + 1);
        assert!(matches!(
            tx.send_string(&oversized).await,
            Err(Fault::Protocol(ProtocolViolation::FrameTooLarge { .. }))
        ));

        // A hostile peer could still write the prefix by hand.
        let (mut raw, b2) = tokio::io::duplex(256);
        drop(b);
        raw.write_i32((MAX_STRING_LEN + 1) as i32).await.unwrap();
        let mut rx = FrameReceiver::new(b2);
        assert!(matches!(
            rx.recv_string().await,
            Err(Fault::Protocol(ProtocolViolation::FrameTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_negative_length_rejected() {
        let (mut raw, b) = tokio::io::duplex(256);
        raw.write_i32(-5).await.unwrap();
        let mut rx = FrameReceiver::new(b);
        assert!(matches!(
            rx.recv_string().await,
            Err(Fault::Protocol(ProtocolViolation::NegativeLength(-5)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_bool_rejected() {
        let (mut raw, b) = tokio::io::duplex(256);
        raw.write_u8(7).await.unwrap();
        let mut rx = FrameReceiver::new(b);
        assert!(matches!(
            rx.recv_bool().await,
            Err(Fault::Protocol(ProtocolViolation::InvalidBool(7)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected() {
        let (mut raw, b) = tokio::io::duplex(256);
        raw.write_i32(4).await.unwrap();
        raw.write_all(&[0xff, 0xfe, 0x80, 0x80]).await.unwrap();
        let mut rx = FrameReceiver::new(b);
        assert!(matches!(
            rx.recv_string().await,
            Err(Fault::Protocol(ProtocolViolation::InvalidUtf8))
        ));
    }

    #[tokio::test]
    async fn test_close_mid_frame_is_connection_fault() {
        let (mut raw, b) = tokio::io::duplex(256);
        raw.write_i32(10).await.unwrap();
        raw.write_all(b"abc").await.unwrap();
        drop(raw);
        let mut rx = FrameReceiver::new(b);
        assert!(matches!(rx.recv_string().await, Err(Fault::Closed)));
    }
}
