//! Byte-oriented transport abstraction.
//!
//! The protocol core is transport-agnostic: it needs a connectable,
//! byte-oriented duplex channel and nothing more, so the same session
//! drives a TCP socket, a serial line or a dialled modem. This module
//! defines that contract and ships the TCP implementation plus an
//! in-memory mock for tests and examples.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Iec102Error, Result};

/// A connectable byte-stream transport.
///
/// Implementations must deliver received bytes in order; the core places
/// no framing requirements on them. `recv_byte` blocks until one byte is
/// available or the timeout elapses, surfacing the elapsed timeout as
/// [`Iec102Error::FrameTimeout`] so the link layer can treat it as a
/// retryable "no frame received" condition.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection.
    async fn connect(&mut self) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send a block of bytes.
    async fn send_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Receive the next byte, waiting at most `timeout`.
    async fn recv_byte(&mut self, timeout: Duration) -> Result<u8>;
}

/// TCP transport, typically to a meter behind a TCP/serial gateway.
#[derive(Debug)]
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    buf: BytesMut,
}

impl TcpTransport {
    /// Create a transport for `address` (host:port), not yet connected.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            stream: None,
            buf: BytesMut::with_capacity(512),
        }
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(Iec102Error::NotConnected)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| Iec102Error::ConnectionTimeout)?
            .map_err(Iec102Error::Io)?;

        // Request/response frames are tiny; don't let Nagle delay them.
        stream.set_nodelay(true).ok();

        self.stream = Some(stream);
        self.buf.clear();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.ok();
        }
        Ok(())
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.stream_mut()?.write_all(data).await?;
        Ok(())
    }

    async fn recv_byte(&mut self, recv_timeout: Duration) -> Result<u8> {
        if self.buf.is_empty() {
            let stream = self.stream.as_mut().ok_or(Iec102Error::NotConnected)?;
            let n = timeout(recv_timeout, stream.read_buf(&mut self.buf))
                .await
                .map_err(|_| Iec102Error::FrameTimeout)??;
            if n == 0 {
                return Err(Iec102Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
        }
        let byte = self.buf[0];
        self.buf.advance(1);
        Ok(byte)
    }
}

/// In-memory transport for tests and examples.
///
/// Bytes queued with [`MockTransport::queue_bytes`] are returned by
/// `recv_byte` in order; everything the session sends is captured in
/// [`MockTransport::sent`]. An empty queue reports a frame timeout, like
/// a silent line.
#[derive(Debug, Default)]
pub struct MockTransport {
    incoming: VecDeque<u8>,
    /// Every byte sent through the transport, in order.
    pub sent: Vec<u8>,
    connected: bool,
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the session to receive.
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    /// Bytes left unread.
    pub fn unread(&self) -> usize {
        self.incoming.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Iec102Error::NotConnected);
        }
        self.sent.extend_from_slice(data);
        Ok(())
    }

    async fn recv_byte(&mut self, _timeout: Duration) -> Result<u8> {
        if !self.connected {
            return Err(Iec102Error::NotConnected);
        }
        self.incoming.pop_front().ok_or(Iec102Error::FrameTimeout)
    }
}
