//! Link-layer controller.
//!
//! Owns the byte transport for the lifetime of a connection and performs
//! the two link-establishment primitives plus generic frame exchange.
//! Session state (station addresses, frame-count bit) lives in the
//! session; the controller only moves frames.

use std::time::Duration;

use bytes::BytesMut;
use tokio::time::Instant;
use tokio_util::codec::Encoder;
use tracing::{debug, trace, warn};

use crate::codec::{FrameCodec, FrameParser};
use crate::error::{Iec102Error, Result};
use crate::transport::Transport;
use crate::types::{FixedFrame, Frame, FunctionCode};

/// Link-layer controller over an abstract byte transport.
#[derive(Debug)]
pub struct LinkLayer<T: Transport> {
    transport: T,
    codec: FrameCodec,
    parser: FrameParser,
    frame_timeout: Duration,
    retries: u32,
}

impl<T: Transport> LinkLayer<T> {
    /// Create a controller over `transport`.
    ///
    /// `frame_timeout` bounds each frame reception; `retries` bounds the
    /// resends of the link-establishment primitives.
    pub fn new(transport: T, frame_timeout: Duration, retries: u32) -> Self {
        Self {
            transport,
            codec: FrameCodec::new(),
            parser: FrameParser::new(),
            frame_timeout,
            retries,
        }
    }

    /// Open the underlying transport.
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    /// Close the underlying transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// Send one frame.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut buf = BytesMut::new();
        self.codec.encode(frame, &mut buf)?;
        trace!(bytes = %hex::encode(&buf), "-> {}", frame);
        self.transport.send_bytes(&buf).await
    }

    /// Receive one frame, waiting at most the configured frame timeout.
    ///
    /// Framing defects surface as errors after consuming the offending
    /// bytes; the parser is then positioned for the next start byte.
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        let deadline = Instant::now() + self.frame_timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Iec102Error::FrameTimeout);
            }
            let byte = self.transport.recv_byte(deadline - now).await?;
            if let Some(frame) = self.parser.feed(byte)? {
                debug!("<- {}", frame);
                return Ok(frame);
            }
        }
    }

    /// Probe the link state (function code 9).
    ///
    /// Any frame received in reply means the link is up; silence or
    /// garbled replies are retried up to the configured bound.
    pub async fn link_state_request(&mut self, der: u16) -> Result<()> {
        self.fixed_exchange(FunctionCode::LinkStatusRequest, der, "link state request")
            .await
    }

    /// Reset the remote link position (function code 0).
    pub async fn remote_link_reposition(&mut self, der: u16) -> Result<()> {
        self.fixed_exchange(FunctionCode::ResetRemoteLink, der, "remote link reposition")
            .await
    }

    async fn fixed_exchange(
        &mut self,
        function: FunctionCode,
        der: u16,
        what: &str,
    ) -> Result<()> {
        let frame = Frame::Fixed(FixedFrame::new(function, false, false, der));
        let mut attempts_left = self.retries + 1;
        loop {
            self.send_frame(&frame).await?;
            match self.recv_frame().await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_framing_error() || matches!(err, Iec102Error::FrameTimeout) => {
                    attempts_left -= 1;
                    if attempts_left == 0 {
                        return Err(Iec102Error::protocol(format!(
                            "{what} got no response (station {der})"
                        )));
                    }
                    warn!("{what}: no frame received ({err}), retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const STATUS_REPLY: [u8; 6] = [0x10, 0x0b, 0x95, 0xd1, 0x71, 0x16];
    const RESET_REPLY: [u8; 6] = [0x10, 0x00, 0x95, 0xd1, 0x66, 0x16];

    fn link(transport: MockTransport) -> LinkLayer<MockTransport> {
        LinkLayer::new(transport, Duration::from_millis(50), 2)
    }

    #[tokio::test]
    async fn test_link_state_request() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();
        transport.queue_bytes(&STATUS_REPLY);

        let mut link = link(transport);
        link.link_state_request(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_link_reposition() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();
        transport.queue_bytes(&RESET_REPLY);

        let mut link = link(transport);
        link.remote_link_reposition(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_link_state_request_no_reply_fails_after_retries() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        let mut link = link(transport);
        let err = link.link_state_request(1).await.unwrap_err();
        assert!(matches!(err, Iec102Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_link_state_request_retries_after_garbled_reply() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();
        // First reply has a corrupted checksum, second is good.
        transport.queue_bytes(&[0x10, 0x0b, 0x95, 0xd1, 0x72, 0x16]);
        transport.queue_bytes(&STATUS_REPLY);

        let mut link = link(transport);
        link.link_state_request(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_frame_timeout() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        let mut link = link(transport);
        let err = link.recv_frame().await.unwrap_err();
        assert!(matches!(err, Iec102Error::FrameTimeout));
    }

    #[tokio::test]
    async fn test_recv_frame_after_noise() {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();
        transport.queue_bytes(&[0xFF, 0xFF]);
        transport.queue_bytes(&STATUS_REPLY);

        let mut link = link(transport);
        let frame = link.recv_frame().await.unwrap();
        assert!(frame.is_fixed());
    }
}
