//! Publisher API: the six media-submission entry points.
//!
//! Each function enqueues one RTMP message on the multiplexer and returns the
//! pre-insert queue depth so the caller can observe backpressure. All submits
//! here are `internal: true` - the payloads are `Bytes` clones, refcounted,
//! and freed by the multiplexer once sent rather than walked back to the
//! caller through a release token.

use bytes::Bytes;
use rtmpub_aac::AudioSpecificConfig;
use rtmpub_amf0::{Amf0Encoder, Amf0Value};
use rtmpub_bytes_util::StringCow;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chunk::{CSID_AUDIO, CSID_VIDEO, ChunkMultiplexer, Outgoing};
use crate::error::PublishError;
use crate::message_type::MessageType;

const FRAME_TYPE_KEY: u8 = 0x17;
const FRAME_TYPE_INTER: u8 = 0x27;
const AVC_PACKET_TYPE_SEQUENCE_HEADER: u8 = 0x00;
const AVC_PACKET_TYPE_NALU: u8 = 0x01;
const AAC_PACKET_TYPE_SEQUENCE_HEADER: u8 = 0x00;
const AAC_PACKET_TYPE_RAW: u8 = 0x01;

/// Builds the `onMetaData` ECMA array and sends it wrapped in `@setDataFrame`.
/// `framerate == 0.0` is replaced by `29.97`, matching the
/// reference implementation's default.
pub async fn send_metadata<S>(
    mux: &mut ChunkMultiplexer<S>,
    duration: f64,
    width: u32,
    height: u32,
    framerate: f64,
    audio_sample_rate: u32,
    audio_sample_size: u32,
) -> Result<usize, PublishError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let fr = if framerate == 0.0 { 29.97 } else { framerate };

    let mut payload = Vec::new();
    Amf0Encoder::encode_string(&mut payload, "onMetaData")?;
    let props = vec![
        (StringCow::from_static("duration"), Amf0Value::Number(duration)),
        (StringCow::from_static("width"), Amf0Value::Number(width as f64)),
        (StringCow::from_static("height"), Amf0Value::Number(height as f64)),
        (StringCow::from_static("framerate"), Amf0Value::Number(fr)),
        (StringCow::from_static("videocodecid"), Amf0Value::Number(7.0)),
        (StringCow::from_static("audiosamplerate"), Amf0Value::Number(audio_sample_rate as f64)),
        (StringCow::from_static("audiosamplesize"), Amf0Value::Number(audio_sample_size as f64)),
        (StringCow::from_static("stereo"), Amf0Value::Boolean(true)),
        (StringCow::from_static("audiocodecid"), Amf0Value::Number(10.0)),
        (StringCow::from_static("AspectRatioX"), Amf0Value::Number(1.0)),
        (StringCow::from_static("AspectRatioY"), Amf0Value::Number(1.0)),
    ];
    Amf0Encoder::encode_ecma_array(&mut payload, &props)?;

    send_packed_metadata(mux, Bytes::from(payload), 0).await
}

/// Sends a caller-built AMF data payload prefixed with `@setDataFrame`
pub async fn send_packed_metadata<S>(
    mux: &mut ChunkMultiplexer<S>,
    buf: Bytes,
    timestamp: u32,
) -> Result<usize, PublishError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = Vec::new();
    Amf0Encoder::encode_string(&mut header, "@setDataFrame")?;

    let msid = mux.published_message_stream_id();
    let depth = mux
        .send_message(Outgoing {
            csid: CSID_VIDEO,
            mtid: MessageType::DataAmf0.0,
            msid,
            timestamp,
            data_header: Some(Bytes::from(header)),
            payload: buf,
            token: 0,
            internal: true,
            next_chunk_size: None,
            release: None,
        })
        .await?;
    Ok(depth)
}

/// Sends an avcC (AVC sequence header) as a video key frame at timestamp 0
pub async fn send_video_avcc<S>(mux: &mut ChunkMultiplexer<S>, buf: Bytes) -> Result<usize, PublishError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header = Bytes::from_static(&[FRAME_TYPE_KEY, AVC_PACKET_TYPE_SEQUENCE_HEADER, 0, 0, 0]);
    let msid = mux.published_message_stream_id();
    let depth = mux
        .send_message(Outgoing {
            csid: CSID_VIDEO,
            mtid: MessageType::Video.0,
            msid,
            timestamp: 0,
            data_header: Some(header),
            payload: buf,
            token: 0,
            internal: true,
            next_chunk_size: None,
            release: None,
        })
        .await?;
    Ok(depth)
}

/// Sends one video frame containing length-prefixed NALUs, detecting IDR
/// frames by scanning NALU headers for `nal_type == 5`.
pub async fn send_video_frame<S>(mux: &mut ChunkMultiplexer<S>, buf: Bytes, timestamp: u32) -> Result<usize, PublishError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame_type = if contains_idr_nalu(&buf) { FRAME_TYPE_KEY } else { FRAME_TYPE_INTER };
    let header = vec![frame_type, AVC_PACKET_TYPE_NALU, 0, 0, 0];

    let msid = mux.published_message_stream_id();
    let depth = mux
        .send_message(Outgoing {
            csid: CSID_VIDEO,
            mtid: MessageType::Video.0,
            msid,
            timestamp,
            data_header: Some(Bytes::from(header)),
            payload: buf,
            token: 0,
            internal: true,
            next_chunk_size: None,
            release: None,
        })
        .await?;
    Ok(depth)
}

/// Scans a buffer of 4-byte-length-prefixed NALUs for one whose `nal_type`
/// (low 5 bits of the first byte after the length prefix) is 5 (IDR).
fn contains_idr_nalu(buf: &[u8]) -> bool {
    let mut pos = 0;
    while pos + 4 <= buf.len() {
        let len = u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
        pos += 4;
        if pos >= buf.len() || len == 0 {
            break;
        }
        let nal_type = buf[pos] & 0x1f;
        if nal_type == 5 {
            return true;
        }
        pos += len;
    }
    false
}

/// Parses `buf` as an AAC `AudioSpecificConfig`, caches the derived RTMP
/// audio-tag-header byte on the multiplexer, and sends the sequence header
pub async fn send_audio_specific_config<S>(mux: &mut ChunkMultiplexer<S>, buf: Bytes) -> Result<usize, PublishError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let asc = AudioSpecificConfig::parse(&buf)?;
    let audio_header = asc.rtmp_audio_header()?;
    mux.set_cached_audio_header(audio_header);

    let header = vec![audio_header, AAC_PACKET_TYPE_SEQUENCE_HEADER];

    let msid = mux.published_message_stream_id();
    let depth = mux
        .send_message(Outgoing {
            csid: CSID_AUDIO,
            mtid: MessageType::Audio.0,
            msid,
            timestamp: 0,
            data_header: Some(Bytes::from(header)),
            payload: buf,
            token: 0,
            internal: true,
            next_chunk_size: None,
            release: None,
        })
        .await?;
    Ok(depth)
}

/// Sends one AAC raw frame using the cached audio-tag-header byte.
pub async fn send_audio_data<S>(mux: &mut ChunkMultiplexer<S>, buf: Bytes, timestamp: u32) -> Result<usize, PublishError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let audio_header = mux.cached_audio_header().ok_or(PublishError::NotReady)?;
    let header = Bytes::from(vec![audio_header, AAC_PACKET_TYPE_RAW]);

    let msid = mux.published_message_stream_id();
    let depth = mux
        .send_message(Outgoing {
            csid: CSID_AUDIO,
            mtid: MessageType::Audio.0,
            msid,
            timestamp,
            data_header: Some(header),
            payload: buf,
            token: 0,
            internal: true,
            next_chunk_size: None,
            release: None,
        })
        .await?;
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[test]
    fn idr_detection_matches_s5_vector() {
        let key_frame = [0x00, 0x00, 0x00, 0x05, 0x65, 0xaa, 0xbb, 0xcc, 0xdd];
        assert!(contains_idr_nalu(&key_frame));

        let inter_frame = [0x00, 0x00, 0x00, 0x05, 0x61, 0xaa, 0xbb, 0xcc, 0xdd];
        assert!(!contains_idr_nalu(&inter_frame));
    }

    #[tokio::test]
    async fn audio_header_is_cached_on_first_asc() {
        let (client, _server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);
        assert_eq!(mux.cached_audio_header(), None);

        // object type 2 (AAC-LC), 44.1 kHz, 2 channels -> 0xAF.
        let asc = Bytes::from_static(&[0x12, 0x10]);
        send_audio_specific_config(&mut mux, asc).await.unwrap();
        assert_eq!(mux.cached_audio_header(), Some(0xAF));
    }

    #[tokio::test]
    async fn audio_data_before_asc_is_rejected() {
        let (client, _server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);
        let err = send_audio_data(&mut mux, Bytes::from_static(&[0x01, 0x02]), 0).await;
        assert!(matches!(err, Err(PublishError::NotReady)));
    }

    #[tokio::test]
    async fn metadata_defaults_zero_framerate_to_29_97() {
        let (client, _server) = duplex(4096);
        let mut mux = ChunkMultiplexer::new(client);
        let depth = send_metadata(&mut mux, 0.0, 1280, 720, 0.0, 44100, 16).await.unwrap();
        assert_eq!(depth, 0);
    }
}
