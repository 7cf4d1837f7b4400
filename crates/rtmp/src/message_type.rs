//! RTMP message type ids.
//!
//! Unlike [`rtmpub_amf0::Amf0Marker`], this is an open [`nutype_enum`] rather
//! than a closed enum: an unrecognized mtid on the wire is logged and the
//! chunk's payload dropped, never a decode error.

use nutype_enum::nutype_enum;

nutype_enum! {
    pub enum MessageType(u8) {
        /// Protocol control: renegotiate the sender's chunk size.
        SetChunkSize = 0x01,
        /// Protocol control: abandon a partially received message on a chunk stream.
        Abort = 0x02,
        /// Protocol control: acknowledge bytes received against the peer's window.
        Acknowledgement = 0x03,
        /// User control: stream lifecycle and ping events.
        UserControl = 0x04,
        /// Protocol control: advertise our acknowledgement window size.
        WindowAcknowledgementSize = 0x05,
        /// Protocol control: request the peer limit its outbound bandwidth.
        SetPeerBandwidth = 0x06,
        /// Audio payload.
        Audio = 0x08,
        /// Video payload.
        Video = 0x09,
        /// AMF0-encoded metadata (`@setDataFrame`, `onMetaData`).
        DataAmf0 = 0x12,
        /// AMF0-encoded command (`connect`, `publish`, `onStatus`, ...).
        CommandAmf0 = 0x14,
    }
}
