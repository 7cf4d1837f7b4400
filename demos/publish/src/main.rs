//! Publishes a synthetic A/V stream to an `rtmp(s)://` URL.
//!
//! This stands in for a CLI harness that drives a real FLV/MP4 demuxer
//! (`rtmp_test_flv`/`rtmp_test_mp4` in the reference tooling), which is
//! explicitly out of scope for this crate family. This demo instead
//! synthesizes a minimal, well-formed avcC/ASC and a stream of placeholder
//! frames, so `rtmpub-rtmp` can be exercised end-to-end against a real
//! ingest server without pulling in a demuxer dependency.

use std::time::Duration;

use bytes::Bytes;
use rtmpub_rtmp::connection::Connection;
use rtmpub_rtmp::disconnect::DisconnectReason;
use rtmpub_rtmp::publisher;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// A minimal avcC (AVCDecoderConfigurationRecord) carrying no SPS/PPS —
/// enough to exercise `send_video_avcc`'s framing, not to decode.
const DEMO_AVCC: &[u8] = &[
    0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x00, 0x01, 0x00, 0x00,
];

/// AAC-LC, 44100 Hz, stereo (object_type=2, freq_index=4, channels=2).
const DEMO_ASC: &[u8] = &[0x12, 0x10];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();

    let url = std::env::args().nth(1).ok_or("usage: rtmpub-demo-publish <rtmp[s]://host/app/key>")?;

    let mut conn = Connection::default();
    conn.on_state_change(|state| tracing::info!(?state, "connection state changed"));

    tracing::info!(%url, "connecting");
    conn.connect(&url).await?;
    tracing::info!("publish started");

    let mut video_ticker = tokio::time::interval(Duration::from_millis(33));
    let mut audio_ticker = tokio::time::interval(Duration::from_millis(23));
    let mut frame_no: u32 = 0;
    let mut video_ts: u32 = 0;
    let mut audio_ts: u32 = 0;

    {
        let mux = conn.ready_mux()?;
        publisher::send_metadata(mux, 0.0, 1280, 720, 30.0, 44100, 16).await?;
        publisher::send_video_avcc(mux, Bytes::from_static(DEMO_AVCC)).await?;
        publisher::send_audio_specific_config(mux, Bytes::from_static(DEMO_ASC)).await?;
    }

    loop {
        tokio::select! {
            _ = video_ticker.tick() => {
                let mux = conn.ready_mux()?;
                let nal_type: u8 = if frame_no % 30 == 0 { 5 } else { 1 };
                let mut payload = Vec::new();
                payload.extend_from_slice(&5u32.to_be_bytes());
                payload.push(nal_type);
                payload.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
                match publisher::send_video_frame(mux, Bytes::from(payload), video_ts).await {
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "dropping video frame, channel full");
                    }
                }
                frame_no = frame_no.wrapping_add(1);
                video_ts = video_ts.wrapping_add(33);
            }
            _ = audio_ticker.tick() => {
                let mux = conn.ready_mux()?;
                let payload = Bytes::from_static(&[0u8; 64]);
                match publisher::send_audio_data(mux, payload, audio_ts).await {
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "dropping audio frame, channel full");
                    }
                }
                audio_ts = audio_ts.wrapping_add(23);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("ctrl-c received, disconnecting");
                conn.disconnect(DisconnectReason::ClientRequest).await;
                break;
            }
            event = conn.poll_inbound() => {
                match event {
                    Ok(Some(event)) => tracing::debug!(?event, "session event"),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(%err, "connection ended");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
