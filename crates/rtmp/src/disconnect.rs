//! Disconnection reasons and the server-status-to-reason mapping.
//!
//! The mapping is shared between the two places a server can refuse or end a
//! publish: an `_error` reply to `connect`/`createStream`, and an `onStatus`
//! command once we're publishing.

use rtmpub_amf0::{Amf0Decoder, Amf0Value};

/// Why a [`crate::connection::Connection`] is no longer connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No reason was ever determined (the default before any connection attempt).
    Unknown,
    /// The caller called `disconnect()`.
    ClientRequest,
    /// The server sent a `close` command or otherwise asked us to stop.
    ServerRequest,
    /// A transport-level error (reset connection, broken pipe, DNS failure, ...).
    NetworkError,
    /// The server rejected the `connect` or `createStream` call outright.
    Refused,
    /// The server reported the requested stream key is already being published.
    AlreadyInUse,
    /// No response arrived before the watchdog fired.
    Timeout,
    /// A bug or invariant violation inside this library.
    InternalError,
}

/// The `level`/`code`/`description` fields of an `onStatus`/`_error` info object.
#[derive(Debug, Default, Clone)]
pub struct StatusInfo {
    pub is_error_level: bool,
    pub code: Option<String>,
    pub description: Option<String>,
}

impl StatusInfo {
    /// Reads the command-object parameter (usually `Null`, skipped) and the
    /// following info object, collecting `level`/`code`/`description` and
    /// skipping everything else.
    pub fn decode(decoder: &mut Amf0Decoder) -> rtmpub_amf0::Result<Self> {
        decoder.skip_any()?; // command object parameter, conventionally Null.
        let mut info = StatusInfo::default();
        if !decoder.has_remaining() {
            return Ok(info);
        }
        decoder.get_object_start()?;
        while !decoder.get_object_end()? {
            let name = decoder.get_property()?;
            let value = decoder.decode_value()?;
            match name.as_str() {
                "level" => {
                    if let Amf0Value::String(s) = &value {
                        info.is_error_level = s.as_str() == "error";
                    }
                }
                "code" => {
                    if let Amf0Value::String(s) = &value {
                        info.code = Some(s.as_str().to_string());
                    }
                }
                "description" => {
                    if let Amf0Value::String(s) = &value {
                        info.description = Some(s.as_str().to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(info)
    }

    /// Maps this status to a [`DisconnectReason`], or `None` if it does not
    /// indicate the connection should end (e.g. a non-`error` informational
    /// status other than the one that starts publishing).
    ///
    /// `description` takes priority over `code` when both are present, since
    /// some servers send a generic `code` with a specific human-readable
    /// `description`.
    pub fn to_disconnect_reason(&self) -> Option<DisconnectReason> {
        if let Some(desc) = &self.description {
            if desc.to_ascii_lowercase().starts_with("stream name is already in use") {
                return Some(DisconnectReason::AlreadyInUse);
            }
        }
        if let Some(code) = &self.code {
            if code.eq_ignore_ascii_case("NetStream.Publish.BadName") || code.to_ascii_lowercase().contains("already in use") {
                return Some(DisconnectReason::AlreadyInUse);
            }
            if code.starts_with("NetConnection.Connect.Rejected") || code.starts_with("NetConnection.Connect.InvalidApp") {
                return Some(DisconnectReason::Refused);
            }
            if code.starts_with("NetStream.Publish.Start") {
                return None;
            }
        }
        if self.is_error_level {
            return Some(DisconnectReason::Refused);
        }
        None
    }
}

/// Maps an I/O error observed while connecting or reading to a disconnect reason.
pub fn reason_from_io_error(err: &std::io::Error) -> DisconnectReason {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => DisconnectReason::Refused,
        std::io::ErrorKind::TimedOut => DisconnectReason::Timeout,
        _ => DisconnectReason::NetworkError,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rtmpub_amf0::Amf0Encoder;

    use super::*;

    fn encode_info(pairs: &[(&str, &str)]) -> Bytes {
        let mut buf = Vec::new();
        Amf0Encoder::encode_null(&mut buf).unwrap();
        buf.push(rtmpub_amf0::Amf0Marker::Object as u8);
        for (k, v) in pairs {
            Amf0Encoder::encode_property_name(&mut buf, k).unwrap();
            Amf0Encoder::encode_string(&mut buf, v).unwrap();
        }
        buf.extend_from_slice(&[0, 0, rtmpub_amf0::Amf0Marker::ObjectEnd as u8]);
        Bytes::from(buf)
    }

    #[test]
    fn already_in_use_wins_on_description() {
        let bytes = encode_info(&[
            ("level", "error"),
            ("code", "NetConnection.Connect.Rejected"),
            ("description", "Stream name is already in use."),
        ]);
        let mut decoder = Amf0Decoder::new(bytes);
        let info = StatusInfo::decode(&mut decoder).unwrap();
        assert_eq!(info.to_disconnect_reason(), Some(DisconnectReason::AlreadyInUse));
    }

    #[test]
    fn publish_start_does_not_disconnect() {
        let bytes = encode_info(&[("level", "status"), ("code", "NetStream.Publish.Start"), ("description", "started")]);
        let mut decoder = Amf0Decoder::new(bytes);
        let info = StatusInfo::decode(&mut decoder).unwrap();
        assert_eq!(info.to_disconnect_reason(), None);
    }

    #[test]
    fn connect_rejected_maps_to_refused() {
        let bytes = encode_info(&[("level", "error"), ("code", "NetConnection.Connect.Rejected"), ("description", "bad app")]);
        let mut decoder = Amf0Decoder::new(bytes);
        let info = StatusInfo::decode(&mut decoder).unwrap();
        assert_eq!(info.to_disconnect_reason(), Some(DisconnectReason::Refused));
    }
}
