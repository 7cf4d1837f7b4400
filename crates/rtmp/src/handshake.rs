//! Client-side RTMP handshake: C0/C1/C2 out, S0/S1/S2 in.
//!
//! This is the "simple" (unencrypted digest-free) handshake variant, the only
//! one real-world RTMP ingest servers still require a publisher to speak.

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size in bytes of C1/S1/C2/S2.
pub const HANDSHAKE_CHUNK_SIZE: usize = 1536;

/// The RTMP version byte exchanged as C0/S0. `0x03` is the only version in
/// practice; anything else means we are talking to something that is not an
/// RTMP server.
const RTMP_VERSION: u8 = 0x03;

/// Errors during the handshake exchange.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("io error during handshake: {0}")]
    Io(#[from] std::io::Error),
    /// S0 advertised an RTMP version we don't speak.
    #[error("server advertised unsupported rtmp version {0}")]
    UnsupportedVersion(u8),
}

/// Builds C1: a 4-byte zero timestamp, a 4-byte zero field, and 1528 random
/// bytes.
fn build_c1() -> [u8; HANDSHAKE_CHUNK_SIZE] {
    let mut buf = [0u8; HANDSHAKE_CHUNK_SIZE];
    rand::rng().fill_bytes(&mut buf[8..]);
    buf
}

/// Sends C0 and C1.
pub async fn write_c0_c1<S: AsyncWrite + Unpin>(stream: &mut S) -> Result<[u8; HANDSHAKE_CHUNK_SIZE], HandshakeError> {
    stream.write_u8(RTMP_VERSION).await?;
    let c1 = build_c1();
    stream.write_all(&c1).await?;
    Ok(c1)
}

/// Reads S0, rejecting any version other than [`RTMP_VERSION`].
pub async fn read_s0<S: AsyncRead + Unpin>(stream: &mut S) -> Result<(), HandshakeError> {
    let version = stream.read_u8().await?;
    if version != RTMP_VERSION {
        return Err(HandshakeError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Reads S1, returning its raw bytes (echoed back verbatim as C2).
pub async fn read_s1<S: AsyncRead + Unpin>(stream: &mut S) -> Result<[u8; HANDSHAKE_CHUNK_SIZE], HandshakeError> {
    let mut buf = [0u8; HANDSHAKE_CHUNK_SIZE];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Sends C2: an exact echo of S1.
pub async fn write_c2<S: AsyncWrite + Unpin>(stream: &mut S, s1: &[u8; HANDSHAKE_CHUNK_SIZE]) -> Result<(), HandshakeError> {
    stream.write_all(s1).await?;
    Ok(())
}

/// Reads S2. Its contents (the server's echo of our C1) are not validated:
/// a server that garbles it will simply fail the subsequent `connect`.
pub async fn read_s2<S: AsyncRead + Unpin>(stream: &mut S) -> Result<(), HandshakeError> {
    let mut buf = [0u8; HANDSHAKE_CHUNK_SIZE];
    stream.read_exact(&mut buf).await?;
    Ok(())
}

/// Runs the full client handshake over an already-connected transport:
/// C0+C1 out, S0 then S1 in, C2 out, S2 in.
pub async fn perform<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S) -> Result<(), HandshakeError> {
    write_c0_c1(stream).await?;
    read_s0(stream).await?;
    let s1 = read_s1(stream).await?;
    write_c2(stream, &s1).await?;
    read_s2(stream).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    async fn serve_as_a_simple_server<S: AsyncRead + AsyncWrite + Unpin>(server: &mut S) {
        // S0
        server.write_u8(RTMP_VERSION).await.unwrap();
        // S1: any bytes will do.
        let s1 = [7u8; HANDSHAKE_CHUNK_SIZE];
        server.write_all(&s1).await.unwrap();
        // C0, C1
        let mut client_version = [0u8; 1];
        server.read_exact(&mut client_version).await.unwrap();
        assert_eq!(client_version[0], RTMP_VERSION);
        let mut c1 = [0u8; HANDSHAKE_CHUNK_SIZE];
        server.read_exact(&mut c1).await.unwrap();
        // C2: must echo S1.
        let mut c2 = [0u8; HANDSHAKE_CHUNK_SIZE];
        server.read_exact(&mut c2).await.unwrap();
        assert_eq!(c2, s1);
        // S2: echo C1 back.
        server.write_all(&c1).await.unwrap();
    }

    #[tokio::test]
    async fn full_handshake_round_trips_over_a_duplex_socket() {
        let (mut client, mut server) = duplex(HANDSHAKE_CHUNK_SIZE * 4);
        let server_task = tokio::spawn(async move {
            serve_as_a_simple_server(&mut server).await;
        });
        perform(&mut client).await.unwrap();
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn c1_timestamp_and_zero_field_are_both_zero() {
        let c1 = build_c1();
        assert_eq!(&c1[0..8], &[0u8; 8]);
    }

    #[tokio::test]
    async fn unsupported_s0_version_is_rejected() {
        let (mut client, mut server) = duplex(HANDSHAKE_CHUNK_SIZE * 4);
        let server_task = tokio::spawn(async move {
            server.write_u8(0x06).await.unwrap();
        });
        let err = perform(&mut client).await.unwrap_err();
        assert!(matches!(err, HandshakeError::UnsupportedVersion(0x06)));
        server_task.await.unwrap();
    }
}
