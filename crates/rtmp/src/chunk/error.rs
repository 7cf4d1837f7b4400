//! Chunk-layer errors.

use rtmpub_amf0::Amf0Error;

/// Errors raised by the chunk format codec and multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The underlying transport returned an I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A per-channel send queue was full; the caller should retry later
    #[error("send queue for chunk stream {csid} is full")]
    QueueFull {
        /// The chunk-stream id whose queue is full.
        csid: u32,
    },
    /// A `SetPeerBandwidth` update did not fit the limit-type lattice
    #[error("bad peer-bandwidth update: current ({current_bw}, {current_type:?}), received ({received_bw}, {received_type:?})")]
    BadPeerBandwidthUpdate {
        /// The previously stored bandwidth.
        current_bw: u32,
        /// The previously stored limit type.
        current_type: super::mux::PeerBandwidthLimitType,
        /// The bandwidth in the rejected update.
        received_bw: u32,
        /// The limit type in the rejected update.
        received_type: super::mux::PeerBandwidthLimitType,
    },
    /// A protocol-control message (`SetChunkSize`, `Abort`,
    /// `WindowAcknowledgementSize`, `SetPeerBandwidth`) did not carry its
    /// fixed-width payload.
    #[error("undersized protocol control message: mtid {mtid:#04x}, {len} bytes")]
    ShortControlMessage {
        /// The message type id.
        mtid: u8,
        /// Bytes actually present.
        len: usize,
    },
    /// A `UserControl` message did not carry enough bytes for its subtype
    #[error("undersized user control message: subtype {subtype}, {len} bytes")]
    ShortUserControlMessage {
        /// The user-control event subtype.
        subtype: u16,
        /// Bytes actually present.
        len: usize,
    },
    /// An AMF0 command message failed to decode.
    #[error("amf0 error: {0}")]
    Amf0(#[from] Amf0Error),
    /// A Type 1/2/3 chunk arrived on a csid that has never seen a Type 0
    /// chunk, so there is no prior message header to inherit fields from.
    #[error("chunk stream {csid} received a continuation chunk before any Type 0 header")]
    NoPriorHeader {
        /// The chunk-stream id with no established message header.
        csid: u32,
    },
    /// The multiplexer has been destroyed and can no longer be used.
    #[error("chunk multiplexer has been destroyed")]
    Destroyed,
}
