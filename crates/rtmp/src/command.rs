//! AMF0 command-message encoders for the publish dialog.
//!
//! Every command here follows the same shape as the original: `(name, txn_id,
//! command_object)` followed by whatever arguments that command takes. The
//! command object is always `Null` for `releaseStream`/`FCPublish`/
//! `createStream`/`publish`/`deleteStream` — grounded in the reference
//! implementation, which never builds an actual object for these.

use rtmpub_amf0::{Amf0Encoder, Amf0Error, Amf0Value};
use rtmpub_bytes_util::StringCow;

/// Encodes the `connect` command with the standard FMLE-compatible command object.
pub fn encode_connect(txn_id: f64, app: &str, tc_url: &str) -> Result<Vec<u8>, Amf0Error> {
    let mut buf = Vec::new();
    Amf0Encoder::encode_string(&mut buf, "connect")?;
    Amf0Encoder::encode_number(&mut buf, txn_id)?;
    let props = vec![
        (StringCow::from_static("app"), Amf0Value::string(app.to_string())),
        (StringCow::from_static("type"), Amf0Value::string("nonprivate")),
        (StringCow::from_static("flashVer"), Amf0Value::string("FMLE/3.0 (compatible; librtmp)")),
        (StringCow::from_static("tcUrl"), Amf0Value::string(tc_url.to_string())),
    ];
    Amf0Encoder::encode_object(&mut buf, &props)?;
    Ok(buf)
}

/// Encodes a `(name, txn_id, Null, key)`-shaped command: `releaseStream`,
/// `FCPublish`, and `createStream` (whose 4th argument is ignored by the
/// server but sent anyway, matching the reference implementation) all share
/// this shape.
fn encode_with_key(name: &str, txn_id: f64, key: &str) -> Result<Vec<u8>, Amf0Error> {
    let mut buf = Vec::new();
    Amf0Encoder::encode_string(&mut buf, name)?;
    Amf0Encoder::encode_number(&mut buf, txn_id)?;
    Amf0Encoder::encode_null(&mut buf)?;
    Amf0Encoder::encode_string(&mut buf, key)?;
    Ok(buf)
}

pub fn encode_release_stream(txn_id: f64, key: &str) -> Result<Vec<u8>, Amf0Error> {
    encode_with_key("releaseStream", txn_id, key)
}

pub fn encode_fc_publish(txn_id: f64, key: &str) -> Result<Vec<u8>, Amf0Error> {
    encode_with_key("FCPublish", txn_id, key)
}

/// Encodes `createStream`, which takes no stream-key argument (only the
/// command name, transaction id, and `Null` command object).
pub fn encode_create_stream(txn_id: f64) -> Result<Vec<u8>, Amf0Error> {
    let mut buf = Vec::new();
    Amf0Encoder::encode_string(&mut buf, "createStream")?;
    Amf0Encoder::encode_number(&mut buf, txn_id)?;
    Amf0Encoder::encode_null(&mut buf)?;
    Ok(buf)
}

/// Encodes `publish(txn_id, Null, key, "live")`.
pub fn encode_publish(txn_id: f64, key: &str) -> Result<Vec<u8>, Amf0Error> {
    let mut buf = encode_with_key("publish", txn_id, key)?;
    Amf0Encoder::encode_string(&mut buf, "live")?;
    Ok(buf)
}

/// Encodes `deleteStream(txn_id, Null, msid)`, sent best-effort on a clean disconnect.
pub fn encode_delete_stream(txn_id: f64, msid: u32) -> Result<Vec<u8>, Amf0Error> {
    let mut buf = Vec::new();
    Amf0Encoder::encode_string(&mut buf, "deleteStream")?;
    Amf0Encoder::encode_number(&mut buf, txn_id)?;
    Amf0Encoder::encode_null(&mut buf)?;
    Amf0Encoder::encode_number(&mut buf, msid as f64)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rtmpub_amf0::Amf0Decoder;

    use super::*;

    #[test]
    fn connect_carries_app_and_tc_url() {
        let bytes = encode_connect(1.0, "live", "rtmp://host:1935/live").unwrap();
        let mut decoder = Amf0Decoder::new(Bytes::from(bytes));
        let (name, txn) = decoder.get_msg_name().unwrap();
        assert_eq!(name.as_str(), "connect");
        assert_eq!(txn, 1.0);
        decoder.get_object_start().unwrap();
        let props = decoder.get_properties().unwrap();
        assert_eq!(props.iter().find(|(k, _)| k.as_str() == "app").unwrap().1.as_str(), Some("live"));
        assert_eq!(
            props.iter().find(|(k, _)| k.as_str() == "tcUrl").unwrap().1.as_str(),
            Some("rtmp://host:1935/live")
        );
    }

    #[test]
    fn publish_carries_key_and_live_type() {
        let bytes = encode_publish(4.0, "stream-key").unwrap();
        let mut decoder = Amf0Decoder::new(Bytes::from(bytes));
        let (name, txn) = decoder.get_msg_name().unwrap();
        assert_eq!(name.as_str(), "publish");
        assert_eq!(txn, 4.0);
        decoder.get_null().unwrap();
        assert_eq!(decoder.get_string().unwrap().as_str(), "stream-key");
        assert_eq!(decoder.get_string().unwrap().as_str(), "live");
    }

    #[test]
    fn create_stream_has_no_key_argument() {
        let bytes = encode_create_stream(3.0).unwrap();
        let mut decoder = Amf0Decoder::new(Bytes::from(bytes));
        let (name, txn) = decoder.get_msg_name().unwrap();
        assert_eq!(name.as_str(), "createStream");
        assert_eq!(txn, 3.0);
        decoder.get_null().unwrap();
        assert!(!decoder.has_remaining());
    }
}
