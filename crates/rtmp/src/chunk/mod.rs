//! C2/C3: per-csid chunk-stream state and the chunk multiplexer.

pub mod channel;
pub mod error;
pub mod header;
pub mod mux;

pub use error::ChunkError;
pub use mux::{ChunkMultiplexer, MuxEvent, Outgoing, PeerBandwidthLimitType, CSID_PROTOCOL_CONTROL, DEFAULT_CHUNK_SIZE};

/// Chunk stream the publisher sends audio messages on.
pub const CSID_AUDIO: u32 = 3;

/// Chunk stream the `connect`/`releaseStream`/`FCPublish`/`createStream`/
/// `deleteStream` command dialog rides on, before publishing starts
/// (librtmp's "invoke" channel convention). Shares a csid with
/// [`CSID_AUDIO`] — safe because no audio has been sent yet by the time
/// these commands are exchanged.
pub const CSID_COMMAND: u32 = CSID_AUDIO;

/// Chunk stream the publisher sends video, metadata, and `publish` on
pub const CSID_VIDEO: u32 = 4;

/// The chunk size the publisher renegotiates to right after the handshake
pub const PUBLISHER_CHUNK_SIZE: u32 = 256;
