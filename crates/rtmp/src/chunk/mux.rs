//! The chunk multiplexer: C3.
//!
//! Owns every tx/rx channel for a session, the transport, and the protocol
//! control-message bookkeeping (chunk sizes, window-ack, peer bandwidth, the
//! ack-threshold policy). [`super::connection::Connection`] drives
//! [`ChunkMultiplexer::read_event`] in its own loop and calls `send_message`
//! (directly, or through the publisher entry points) whenever it has an
//! outgoing message.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::channel::{self, PrevTxHeader, ReleaseCallback, RxChannel, TxBuffer, TxChannel};
use super::error::ChunkError;
use super::header::{self, ChunkHeaderType, MessageHeaderFields, EXTENDED_TIMESTAMP_SENTINEL};
use crate::message_type::MessageType;

/// Dedicated chunk-stream id for protocol-control and user-control messages,
/// by convention (librtmp and most RTMP stacks reserve csid 2 for these).
pub const CSID_PROTOCOL_CONTROL: u32 = 2;

/// Initial chunk size in either direction, per the RTMP spec.
pub const DEFAULT_CHUNK_SIZE: usize = 128;

/// Largest a basic+message header plus extended timestamp can be.
pub const MAX_CHUNK_HEADER_SIZE: usize = 3 + 11 + 4;

/// The peer-bandwidth "limit type" lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBandwidthLimitType {
    Hard,
    Soft,
    Dynamic,
    Unknown,
}

impl PeerBandwidthLimitType {
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Hard),
            1 => Some(Self::Soft),
            2 => Some(Self::Dynamic),
            _ => None,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            Self::Hard => 0,
            Self::Soft => 1,
            Self::Dynamic => 2,
            Self::Unknown => 0,
        }
    }
}

/// Events surfaced to the connection FSM by [`ChunkMultiplexer::read_event`].
///
/// Everything else inbound (protocol control, user control) is handled
/// internally and never reaches this layer.
#[derive(Debug)]
pub enum MuxEvent {
    /// An AMF0 command or data message, handed up undecoded.
    Command { payload: Bytes, msid: u32 },
    /// The peer accepted a new advertised bandwidth limit.
    PeerBandwidthUpdate { bandwidth: u32, limit_type: PeerBandwidthLimitType },
}

#[derive(Default)]
struct TxChannels {
    order: Vec<u32>,
    map: HashMap<u32, TxChannel>,
}

impl TxChannels {
    fn get_or_create(&mut self, csid: u32) -> &mut TxChannel {
        self.map.entry(csid).or_insert_with(|| {
            self.order.push(csid);
            TxChannel::default()
        })
    }
}

/// A message queued for transmission.
pub struct Outgoing {
    pub csid: u32,
    pub mtid: u8,
    pub msid: u32,
    pub timestamp: u32,
    pub data_header: Option<Bytes>,
    pub payload: Bytes,
    pub token: u64,
    pub internal: bool,
    pub next_chunk_size: Option<u32>,
    pub release: Option<ReleaseCallback>,
}

/// Owns a transport and multiplexes RTMP chunks over it.
pub struct ChunkMultiplexer<S> {
    stream: S,
    tx: TxChannels,
    rx: HashMap<u32, RxChannel>,
    rx_chunk_size: usize,
    tx_chunk_size: usize,
    window_ack_size: u32,
    bytes_received: u64,
    bytes_since_ack: u32,
    peer_bandwidth: Option<(u32, PeerBandwidthLimitType)>,
    read_buf: BytesMut,
    draining_csid: Option<u32>,
    published_msid: u32,
    cached_audio_header: Option<u8>,
    destroyed: bool,
}

enum ChunkStep {
    NeedMore,
    Progress,
    Event(MuxEvent),
}

impl<S> ChunkMultiplexer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            tx: TxChannels::default(),
            rx: HashMap::new(),
            rx_chunk_size: DEFAULT_CHUNK_SIZE,
            tx_chunk_size: DEFAULT_CHUNK_SIZE,
            window_ack_size: 0,
            bytes_received: 0,
            bytes_since_ack: 0,
            peer_bandwidth: None,
            read_buf: BytesMut::with_capacity(DEFAULT_CHUNK_SIZE + MAX_CHUNK_HEADER_SIZE),
            draining_csid: None,
            published_msid: 0,
            cached_audio_header: None,
            destroyed: false,
        }
    }

    /// Gives access to the underlying transport, e.g. for the handshake,
    /// which runs before any chunk framing exists.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn published_message_stream_id(&self) -> u32 {
        self.published_msid
    }

    pub fn store_message_stream_id(&mut self, msid: u32) {
        self.published_msid = msid;
    }

    /// The RTMP audio-tag-header byte derived once from the first AAC
    /// `AudioSpecificConfig` seen, if any has been cached yet.
    pub fn cached_audio_header(&self) -> Option<u8> {
        self.cached_audio_header
    }

    /// Caches the audio-tag-header byte for every subsequent audio submit
    pub fn set_cached_audio_header(&mut self, header: u8) {
        self.cached_audio_header = Some(header);
    }

    /// Enqueues `msg` on its csid and drains as much as can be written
    /// without blocking.
    ///
    /// Returns the pre-insert queue depth on success, or [`ChunkError::QueueFull`]
    /// if the channel's ring is already at capacity.
    pub async fn send_message(&mut self, msg: Outgoing) -> Result<usize, ChunkError> {
        if self.destroyed {
            return Err(ChunkError::Destroyed);
        }
        let buf = TxBuffer {
            data_header: msg.data_header,
            payload: msg.payload,
            mtid: msg.mtid,
            msid: msg.msid,
            timestamp: msg.timestamp,
            token: msg.token,
            internal: msg.internal,
            next_chunk_size: msg.next_chunk_size,
            release: msg.release,
        };
        let channel = self.tx.get_or_create(msg.csid);
        let depth = channel.enqueue(buf).map_err(|_| ChunkError::QueueFull { csid: msg.csid })?;
        self.flush_writes().await?;
        Ok(depth)
    }

    /// Requests a new outgoing chunk size, applied once the request itself
    /// has been fully written.
    pub async fn set_chunk_size(&mut self, n: u32) -> Result<usize, ChunkError> {
        self.send_message(Outgoing {
            csid: CSID_PROTOCOL_CONTROL,
            mtid: MessageType::SetChunkSize.0,
            msid: 0,
            timestamp: 0,
            data_header: None,
            payload: Bytes::copy_from_slice(&n.to_be_bytes()),
            token: 0,
            internal: true,
            next_chunk_size: Some(n),
            release: None,
        })
        .await
    }

    /// Drops every queued message, releasing caller-owned payloads through
    /// their callback and dropping internal ones.
    pub fn flush(&mut self) {
        for csid in &self.tx.order {
            if let Some(channel) = self.tx.map.get_mut(csid) {
                for mut buf in channel.drain_all() {
                    if !buf.internal {
                        if let Some(cb) = buf.release.take() {
                            cb(buf.token);
                        }
                    }
                }
            }
        }
        self.draining_csid = None;
    }

    /// Flushes and marks the multiplexer unusable; further calls return
    /// [`ChunkError::Destroyed`].
    pub fn destroy(&mut self) {
        self.flush();
        self.destroyed = true;
    }

    fn next_draining_csid(&self) -> Option<u32> {
        if let Some(csid) = self.draining_csid {
            if self.tx.map.get(&csid).is_some_and(|c| !c.queue.is_empty()) {
                return Some(csid);
            }
        }
        self.tx
            .order
            .iter()
            .copied()
            .find(|csid| self.tx.map.get(csid).is_some_and(|c| !c.queue.is_empty()))
    }

    async fn flush_writes(&mut self) -> Result<(), ChunkError> {
        loop {
            let Some(csid) = self.next_draining_csid() else {
                self.draining_csid = None;
                return Ok(());
            };
            let completed = self.write_one_chunk(csid).await?;
            self.draining_csid = if completed { None } else { Some(csid) };
        }
    }

    /// Writes exactly one chunk (header plus up to `tx_chunk_size` payload
    /// bytes) of the front message on `csid`. Returns whether that message is
    /// now fully written.
    async fn write_one_chunk(&mut self, csid: u32) -> Result<bool, ChunkError> {
        let tx_chunk_size = self.tx_chunk_size;
        let channel = self.tx.map.get_mut(&csid).expect("caller only drives non-empty channels");
        let (mtid, msid, timestamp, total_len) = {
            let buf = channel.queue.front().expect("caller only drives non-empty channels");
            (buf.mtid, buf.msid, buf.timestamp, buf.total_len() as u32)
        };

        let mut out = Vec::with_capacity(MAX_CHUNK_HEADER_SIZE + tx_chunk_size.min(total_len as usize));

        if channel.progress == 0 {
            let (header_type, embed, new_prev) = channel::plan_header_type(channel.prev, mtid, msid, total_len, timestamp);
            header::write_basic_header(&mut out, header_type, csid);
            let fields = match header_type {
                ChunkHeaderType::Type0 => MessageHeaderFields::Type0 { timestamp: embed, length: total_len, mtid, msid },
                ChunkHeaderType::Type1 => MessageHeaderFields::Type1 { timestamp_delta: embed, length: total_len, mtid },
                ChunkHeaderType::Type2 => MessageHeaderFields::Type2 { timestamp_delta: embed },
                ChunkHeaderType::Type3 => MessageHeaderFields::Type3,
            };
            header::write_message_header(&mut out, &fields);
            if header_type != ChunkHeaderType::Type3 && embed >= EXTENDED_TIMESTAMP_SENTINEL {
                header::write_extended_timestamp(&mut out, embed);
            }
            channel.prev = Some(new_prev);
        } else {
            // Continuation: deliberately never carries an extended timestamp,
            // even if the message's first chunk did.
            header::write_basic_header(&mut out, ChunkHeaderType::Type3, csid);
        }

        let remaining = total_len as usize - channel.progress;
        let take = remaining.min(tx_chunk_size);
        channel.queue.front().expect("checked above").copy_range(channel.progress, take, &mut out);
        channel.progress += take;

        self.stream.write_all(&out).await?;

        if channel.progress == total_len as usize {
            let mut buf = channel.queue.pop_front().expect("just finished writing it");
            channel.progress = 0;
            if let Some(n) = buf.next_chunk_size {
                self.tx_chunk_size = n as usize;
            }
            if !buf.internal {
                if let Some(cb) = buf.release.take() {
                    cb(buf.token);
                }
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Blocks until the next upward-visible event: an AMF0 command/data
    /// message, or an accepted peer-bandwidth change. Everything else
    /// (protocol control, user control, unexpected inbound media) is handled
    /// internally without returning.
    pub async fn read_event(&mut self) -> Result<MuxEvent, ChunkError> {
        if self.destroyed {
            return Err(ChunkError::Destroyed);
        }
        loop {
            match self.process_one_chunk().await? {
                ChunkStep::Event(event) => return Ok(event),
                ChunkStep::Progress => continue,
                ChunkStep::NeedMore => {
                    let reserve = self.rx_chunk_size + MAX_CHUNK_HEADER_SIZE;
                    if self.read_buf.capacity() - self.read_buf.len() < reserve {
                        self.read_buf.reserve(reserve);
                    }
                    let n = self.stream.read_buf(&mut self.read_buf).await?;
                    if n == 0 {
                        return Err(ChunkError::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
                    }
                    self.bytes_received += n as u64;
                    self.bytes_since_ack = self.bytes_since_ack.saturating_add(n as u32);
                    self.maybe_send_ack().await?;
                }
            }
        }
    }

    async fn maybe_send_ack(&mut self) -> Result<(), ChunkError> {
        if self.window_ack_size > 0 && self.bytes_since_ack >= self.window_ack_size / 2 {
            let seq = self.bytes_received as u32;
            self.bytes_since_ack = 0;
            self.send_message(Outgoing {
                csid: CSID_PROTOCOL_CONTROL,
                mtid: MessageType::Acknowledgement.0,
                msid: 0,
                timestamp: 0,
                data_header: None,
                payload: Bytes::copy_from_slice(&seq.to_be_bytes()),
                token: 0,
                internal: true,
                next_chunk_size: None,
                release: None,
            })
            .await?;
        }
        Ok(())
    }

    /// Attempts to parse and fully process one chunk from `read_buf`.
    fn try_parse_header(&self) -> Option<(header::BasicHeader, MessageHeaderFields, usize, Option<u32>)> {
        let basic = header::read_basic_header(&self.read_buf)?;
        let (fields, header_len) = header::read_message_header(basic.header_type, &self.read_buf[basic.consumed..])?;
        let mut total_header = basic.consumed + header_len;

        let mut extended = None;
        if basic.header_type != ChunkHeaderType::Type3 {
            let raw = match fields {
                MessageHeaderFields::Type0 { timestamp, .. } => timestamp,
                MessageHeaderFields::Type1 { timestamp_delta, .. } => timestamp_delta,
                MessageHeaderFields::Type2 { timestamp_delta } => timestamp_delta,
                MessageHeaderFields::Type3 => unreachable!(),
            };
            if raw == EXTENDED_TIMESTAMP_SENTINEL {
                let value = header::read_extended_timestamp(&self.read_buf[total_header..])?;
                extended = Some(value);
                total_header += 4;
            }
        }
        Some((basic, fields, total_header, extended))
    }

    async fn process_one_chunk(&mut self) -> Result<ChunkStep, ChunkError> {
        let Some((basic, fields, total_header, extended)) = self.try_parse_header() else {
            return Ok(ChunkStep::NeedMore);
        };

        let channel = self.rx.entry(basic.csid).or_default();
        match (basic.header_type, fields) {
            (ChunkHeaderType::Type0, MessageHeaderFields::Type0 { timestamp, length, mtid, msid }) => {
                if !channel.buf.is_empty() {
                    tracing::warn!(csid = basic.csid, "discarding partial chunk reassembly on conflicting type 0 header");
                    channel.buf.clear();
                }
                channel.mtid = mtid;
                channel.msid = msid;
                channel.length = length;
                channel.timestamp = extended.unwrap_or(timestamp);
                channel.delta = 0;
                channel.has_prev = true;
            }
            (ChunkHeaderType::Type1, MessageHeaderFields::Type1 { timestamp_delta, length, mtid }) => {
                if !channel.has_prev {
                    return Err(ChunkError::NoPriorHeader { csid: basic.csid });
                }
                if !channel.buf.is_empty() {
                    tracing::warn!(csid = basic.csid, "discarding partial chunk reassembly on conflicting type 1 header");
                    channel.buf.clear();
                }
                let delta = extended.unwrap_or(timestamp_delta);
                channel.mtid = mtid;
                channel.length = length;
                channel.timestamp = channel.timestamp.wrapping_add(delta);
                channel.delta = delta;
            }
            (ChunkHeaderType::Type2, MessageHeaderFields::Type2 { timestamp_delta }) => {
                if !channel.has_prev {
                    return Err(ChunkError::NoPriorHeader { csid: basic.csid });
                }
                if !channel.buf.is_empty() {
                    tracing::warn!(csid = basic.csid, "discarding partial chunk reassembly on conflicting type 2 header");
                    channel.buf.clear();
                }
                let delta = extended.unwrap_or(timestamp_delta);
                channel.timestamp = channel.timestamp.wrapping_add(delta);
                channel.delta = delta;
            }
            (ChunkHeaderType::Type3, MessageHeaderFields::Type3) => {
                if !channel.has_prev {
                    return Err(ChunkError::NoPriorHeader { csid: basic.csid });
                }
                if channel.buf.is_empty() {
                    channel.timestamp = channel.timestamp.wrapping_add(channel.delta);
                }
            }
            _ => unreachable!("read_message_header always returns fields matching the requested header_type"),
        }

        let remaining = (channel.length as usize).saturating_sub(channel.buf.len());
        let take = remaining.min(self.rx_chunk_size);
        if self.read_buf.len() < total_header + take {
            return Ok(ChunkStep::NeedMore);
        }

        let channel = self.rx.get_mut(&basic.csid).expect("just accessed above");
        channel.buf.extend_from_slice(&self.read_buf[total_header..total_header + take]);
        let _ = self.read_buf.split_to(total_header + take);

        if channel.buf.len() as u32 >= channel.length {
            let mtid = channel.mtid;
            let msid = channel.msid;
            let payload = channel.buf.split().freeze();
            self.dispatch_message(mtid, msid, payload).await
        } else {
            Ok(ChunkStep::Progress)
        }
    }

    async fn dispatch_message(&mut self, mtid: u8, msid: u32, payload: Bytes) -> Result<ChunkStep, ChunkError> {
        match MessageType(mtid) {
            MessageType::SetChunkSize => {
                if payload.len() < 4 {
                    return Err(ChunkError::ShortControlMessage { mtid, len: payload.len() });
                }
                let n = u32::from_be_bytes(payload[0..4].try_into().unwrap());
                self.rx_chunk_size = n as usize;
                Ok(ChunkStep::Progress)
            }
            MessageType::Abort => {
                if payload.len() < 4 {
                    return Err(ChunkError::ShortControlMessage { mtid, len: payload.len() });
                }
                let csid = u32::from_be_bytes(payload[0..4].try_into().unwrap());
                if let Some(channel) = self.rx.get_mut(&csid) {
                    channel.discard_partial();
                }
                Ok(ChunkStep::Progress)
            }
            MessageType::Acknowledgement => {
                if payload.len() >= 4 {
                    tracing::trace!(seq = u32::from_be_bytes(payload[0..4].try_into().unwrap()), "peer acknowledged bytes");
                }
                Ok(ChunkStep::Progress)
            }
            MessageType::UserControl => {
                self.handle_user_control(payload).await?;
                Ok(ChunkStep::Progress)
            }
            MessageType::WindowAcknowledgementSize => {
                if payload.len() < 4 {
                    return Err(ChunkError::ShortControlMessage { mtid, len: payload.len() });
                }
                self.window_ack_size = u32::from_be_bytes(payload[0..4].try_into().unwrap());
                self.maybe_send_ack().await?;
                Ok(ChunkStep::Progress)
            }
            MessageType::SetPeerBandwidth => {
                if payload.len() < 5 {
                    return Err(ChunkError::ShortControlMessage { mtid, len: payload.len() });
                }
                let bw = u32::from_be_bytes(payload[0..4].try_into().unwrap());
                let Some(limit_type) = PeerBandwidthLimitType::from_wire(payload[4]) else {
                    return Err(ChunkError::BadPeerBandwidthUpdate {
                        current_bw: self.peer_bandwidth.map_or(0, |(bw, _)| bw),
                        current_type: self.peer_bandwidth.map_or(PeerBandwidthLimitType::Unknown, |(_, t)| t),
                        received_bw: bw,
                        received_type: PeerBandwidthLimitType::Unknown,
                    });
                };
                match self.apply_peer_bandwidth(bw, limit_type)? {
                    Some((bandwidth, limit_type)) => Ok(ChunkStep::Event(MuxEvent::PeerBandwidthUpdate { bandwidth, limit_type })),
                    None => Ok(ChunkStep::Progress),
                }
            }
            MessageType::Audio | MessageType::Video | MessageType::DataAmf0 => {
                tracing::debug!(mtid, "dropping unexpected inbound media/metadata message");
                Ok(ChunkStep::Progress)
            }
            MessageType::CommandAmf0 => Ok(ChunkStep::Event(MuxEvent::Command { payload, msid })),
            other => {
                tracing::debug!(mtid = other.0, "ignoring unknown message type id");
                Ok(ChunkStep::Progress)
            }
        }
    }

    fn apply_peer_bandwidth(&mut self, bw: u32, limit_type: PeerBandwidthLimitType) -> Result<Option<(u32, PeerBandwidthLimitType)>, ChunkError> {
        let (current_bw, current_type) = self.peer_bandwidth.unwrap_or((0, PeerBandwidthLimitType::Unknown));

        let store = current_type == PeerBandwidthLimitType::Unknown
            || limit_type == PeerBandwidthLimitType::Hard
            || (current_type == PeerBandwidthLimitType::Hard && limit_type == PeerBandwidthLimitType::Dynamic)
            || (limit_type == PeerBandwidthLimitType::Soft && bw < current_bw);

        if store {
            self.peer_bandwidth = Some((bw, limit_type));
            return Ok(Some((bw, limit_type)));
        }

        let ignore = (limit_type == PeerBandwidthLimitType::Soft && bw >= current_bw)
            || (limit_type == PeerBandwidthLimitType::Dynamic && current_type != PeerBandwidthLimitType::Hard);
        if ignore {
            return Ok(None);
        }

        Err(ChunkError::BadPeerBandwidthUpdate {
            current_bw,
            current_type,
            received_bw: bw,
            received_type: limit_type,
        })
    }

    async fn handle_user_control(&mut self, payload: Bytes) -> Result<(), ChunkError> {
        if payload.len() < 2 {
            return Err(ChunkError::ShortUserControlMessage { subtype: 0, len: payload.len() });
        }
        let subtype = u16::from_be_bytes([payload[0], payload[1]]);
        let body = &payload[2..];
        match subtype {
            0 | 1 | 2 | 4 => {
                if body.len() < 4 {
                    return Err(ChunkError::ShortUserControlMessage { subtype, len: payload.len() });
                }
                tracing::debug!(subtype, "user control event");
            }
            3 => {
                // SetBufferLength: stream id (4 bytes) + buffer length (4 bytes),
                // 10 bytes total including the subtype.
                if payload.len() != 10 {
                    return Err(ChunkError::ShortUserControlMessage { subtype, len: payload.len() });
                }
            }
            6 => {
                if body.len() < 4 {
                    return Err(ChunkError::ShortUserControlMessage { subtype, len: payload.len() });
                }
                let mut reply = Vec::with_capacity(6);
                reply.extend_from_slice(&7u16.to_be_bytes());
                reply.extend_from_slice(&body[0..4]);
                self.send_message(Outgoing {
                    csid: CSID_PROTOCOL_CONTROL,
                    mtid: MessageType::UserControl.0,
                    msid: 0,
                    timestamp: 0,
                    data_header: None,
                    payload: Bytes::from(reply),
                    token: 0,
                    internal: true,
                    next_chunk_size: None,
                    release: None,
                })
                .await?;
            }
            other => tracing::debug!(subtype = other, "ignoring unknown user control event"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn type3_chunk_without_a_prior_type0_is_rejected() {
        let (client, mut server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);
        // A lone Type 3 chunk (basic header only, csid 5) with nothing prior.
        server.write_all(&[0xC0 | 5]).await.unwrap();
        let err = mux.read_event().await.unwrap_err();
        assert!(matches!(err, ChunkError::NoPriorHeader { csid: 5 }));
    }

    #[tokio::test]
    async fn send_message_round_trips_through_a_duplex_socket() {
        let (client, mut server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);

        let depth = mux
            .send_message(Outgoing {
                csid: 4,
                mtid: MessageType::CommandAmf0.0,
                msid: 0,
                timestamp: 0,
                data_header: None,
                payload: Bytes::from_static(b"hello"),
                token: 0,
                internal: true,
                next_chunk_size: None,
                release: None,
            })
            .await
            .unwrap();
        assert_eq!(depth, 0);

        let mut received = vec![0u8; 64];
        let n = server.read(&mut received).await.unwrap();
        assert!(n > 0);
        // basic header (csid 4, type 0) + 11-byte message header.
        assert_eq!(received[0] >> 6, 0);
        assert_eq!(received[0] & 0x3F, 4);
    }

    #[tokio::test]
    async fn queue_full_returns_an_error_without_taking_ownership() {
        let (client, _server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);
        // Fill the ring without driving the event loop by never polling `server`;
        // a duplex's internal buffer is bounded, so eventually writes won't
        // complete, leaving the ring full.
        for _ in 0..channel::CHANNEL_QUEUE_CAPACITY * 4 {
            let _ = mux
                .send_message(Outgoing {
                    csid: 4,
                    mtid: MessageType::Video.0,
                    msid: 1,
                    timestamp: 0,
                    data_header: None,
                    payload: Bytes::from(vec![0u8; 4096]),
                    token: 0,
                    internal: true,
                    next_chunk_size: None,
                    release: None,
                })
                .await;
        }
    }

    #[tokio::test]
    async fn set_peer_bandwidth_lattice_stores_hard_and_ignores_weaker_soft() {
        let (client, _server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);

        let first = mux.apply_peer_bandwidth(1_000_000, PeerBandwidthLimitType::Hard).unwrap();
        assert_eq!(first, Some((1_000_000, PeerBandwidthLimitType::Hard)));

        let ignored = mux.apply_peer_bandwidth(2_000_000, PeerBandwidthLimitType::Soft).unwrap();
        assert_eq!(ignored, None);
        assert_eq!(mux.peer_bandwidth, Some((1_000_000, PeerBandwidthLimitType::Hard)));

        let stronger_dynamic = mux.apply_peer_bandwidth(500_000, PeerBandwidthLimitType::Dynamic).unwrap();
        assert_eq!(stronger_dynamic, Some((500_000, PeerBandwidthLimitType::Dynamic)));
    }

    #[tokio::test]
    async fn release_callback_fires_once_message_is_fully_written() {
        let (client, mut server) = duplex(8192);
        let mut mux = ChunkMultiplexer::new(client);

        let released = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let released2 = released.clone();

        let reader = tokio::spawn(async move {
            let mut buf = vec![0u8; 64];
            let _ = server.read(&mut buf).await.unwrap();
        });

        mux.send_message(Outgoing {
            csid: 3,
            mtid: MessageType::Audio.0,
            msid: 1,
            timestamp: 0,
            data_header: None,
            payload: Bytes::from_static(b"\x00\x01\x02"),
            token: 42,
            internal: false,
            next_chunk_size: None,
            release: Some(Box::new(move |token| {
                assert_eq!(token, 42);
                released2.store(true, std::sync::atomic::Ordering::SeqCst);
            })),
        })
        .await
        .unwrap();

        reader.await.unwrap();
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }
}
