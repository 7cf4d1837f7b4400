//! Top-level error types.

use rtmpub_amf0::Amf0Error;

use crate::chunk::ChunkError;
use crate::disconnect::DisconnectReason;
use crate::handshake::HandshakeError;
use crate::url::UrlError;

/// Errors from [`crate::connection::Connection::connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("invalid rtmp(s) url: {0}")]
    Url(#[from] UrlError),
    #[error("dns resolution failed: {0}")]
    Dns(std::io::Error),
    #[error("tcp connect failed: {0}")]
    Tcp(std::io::Error),
    #[error("tls handshake failed: {0}")]
    Tls(std::io::Error),
    #[error("rtmp handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("chunk layer error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("amf0 error: {0}")]
    Amf0(#[from] Amf0Error),
    #[error("server did not accept the publish attempt: {0:?}")]
    Rejected(DisconnectReason),
    #[error("connect attempt timed out")]
    Timeout,
    #[error("rtmps:// was requested but this build was compiled without the `tls` feature")]
    TlsUnsupported,
    #[error("connect() may only be called once per Connection, from the Idle state")]
    AlreadyConnecting,
}

/// Errors from the publisher entry points.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The connection is not in the `Ready` state yet, or not anymore.
    #[error("connection is not in the Ready state")]
    NotReady,
    #[error("chunk layer error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("amf0 error: {0}")]
    Amf0(#[from] Amf0Error),
    #[error("invalid aac audio specific config: {0}")]
    Aac(#[from] rtmpub_aac::AacError),
}
