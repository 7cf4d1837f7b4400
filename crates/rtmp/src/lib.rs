//! An embeddable RTMP/RTMPS publishing client.
//!
//! This crate covers the two-layer protocol engine at the heart of it:
//! the connection-lifecycle state machine ([`connection`]) and the chunk
//! multiplexer ([`chunk`]), plus the six publisher entry points
//! ([`publisher`]) that turn caller media submissions into queued RTMP
//! messages. Container parsing (FLV/MP4), the AAC ASC parser's bitstream
//! internals live in [`rtmpub_aac`], and the AMF0 codec in [`rtmpub_amf0`] —
//! both re-exported here for convenience since every public signature in this
//! crate names one of their types.
//!
//! ```no_run
//! use rtmpub_rtmp::connection::Connection;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = Connection::default();
//! conn.connect("rtmp://localhost/live/stream-key").await?;
//!
//! let mux = conn.ready_mux()?;
//! rtmpub_rtmp::publisher::send_metadata(mux, 0.0, 1280, 720, 30.0, 44100, 16).await?;
//!
//! conn.disconnect(rtmpub_rtmp::disconnect::DisconnectReason::ClientRequest).await;
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod chunk;
pub mod command;
pub mod connection;
pub mod disconnect;
pub mod error;
pub mod handshake;
pub mod message_type;
pub mod publisher;
pub mod transport;
pub mod url;

pub use rtmpub_aac as aac;
pub use rtmpub_amf0 as amf0;

pub use connection::{AbortHandle, Connection, ConnectOptions, ConnectionState, SessionEvent};
pub use disconnect::DisconnectReason;
pub use error::{ConnectError, PublishError};
pub use transport::Transport;
pub use url::RtmpUrl;
