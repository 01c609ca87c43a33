//! # iec102
//!
//! IEC 60870-5-102 master-station client for Rust.
//!
//! This crate implements the master (client) side of the IEC 60870-5-102
//! telemetry protocol used to poll electric meters over a byte-stream
//! transport: authentication, clock read/write, integrated totals,
//! tariff/billing registers, configuration and contracted powers, plus
//! the instant-values protocol extension.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iec102::{Session, SessionConfig, TcpTransport, ReadingsRegister};
//!
//! #[tokio::main]
//! async fn main() -> iec102::Result<()> {
//!     let transport = TcpTransport::new("10.0.0.5:20000");
//!     let mut session = Session::new(transport, SessionConfig::new(34572, 1));
//!
//!     // Establish the link and authenticate
//!     session.connect().await?;
//!     session.authenticate(7).await?;
//!
//!     // Stream incremental totals; the stream must be fully consumed
//!     let (start, end) = (yesterday(), today());
//!     let mut totals = session
//!         .read_incremental_values(start, end, ReadingsRegister::Profiles)
//!         .await?;
//!     while let Some(frame) = totals.next().await? {
//!         println!("{:?}", frame.payload);
//!     }
//!
//!     session.finish_session().await;
//!     session.disconnect().await
//! }
//! ```
//!
//! ## Protocol Overview
//!
//! The protocol is half-duplex over any ordered byte transport (TCP,
//! serial line, dialled modem). Two frame shapes exist on the wire:
//!
//! - **Fixed frame** (6 bytes): link control exchanges and "ready for
//!   more" polls
//! - **Variable frame**: one ASDU — type identifier, structure
//!   qualifier, transmission cause, addresses and typed data
//!
//! A request is sent as a variable frame and acknowledged at link level;
//! the session then polls class-2 data with fixed frames, and the
//! transmission cause of each response drives the state machine until a
//! terminal cause ends the exchange.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod error;
pub mod link;
pub mod messages;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types
pub use codec::{FrameCodec, FrameParser};
pub use error::{Iec102Error, Result};
pub use link::LinkLayer;
pub use messages::Message;
pub use session::{ContractRegister, ReadingsRegister, ResponseStream, Session, SessionConfig};
pub use transport::{MockTransport, TcpTransport, Transport};
pub use types::*;
