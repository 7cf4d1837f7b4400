//! AMF0 encoder.

use byteorder::{BigEndian, WriteBytesExt};

use crate::value::Amf0Properties;
use crate::{Amf0Error, Amf0Marker, Amf0Value, Result};

/// A stateless AMF0 encoder: every method appends to a caller-supplied
/// `Vec<u8>`.
///
/// There is no builder object to hold state because none is needed: callers
/// build an [`Amf0Value`] tree with ordinary Rust (a `vec!` of properties,
/// nested as needed) and hand the whole thing to
/// [`encode_value`](Self::encode_value) once. This is the typed-tree
/// alternative to the original's hand-rolled format-string mini-language.
pub struct Amf0Encoder;

impl Amf0Encoder {
    /// Encodes an AMF0 `Number`.
    pub fn encode_number(buf: &mut Vec<u8>, value: f64) -> Result<()> {
        buf.write_u8(Amf0Marker::Number as u8)?;
        buf.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    /// Encodes an AMF0 `Boolean`.
    pub fn encode_boolean(buf: &mut Vec<u8>, value: bool) -> Result<()> {
        buf.write_u8(Amf0Marker::Boolean as u8)?;
        buf.write_u8(value as u8)?;
        Ok(())
    }

    /// Encodes a tagged AMF0 `String`, switching to the `LongString` marker
    /// and a 4-byte length once the UTF-8 byte length exceeds `u16::MAX`
    pub fn encode_string(buf: &mut Vec<u8>, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            buf.write_u8(Amf0Marker::LongString as u8)?;
            Self::write_raw_string(buf, bytes)?;
        } else {
            buf.write_u8(Amf0Marker::String as u8)?;
            buf.write_u16::<BigEndian>(bytes.len() as u16)?;
            buf.extend_from_slice(bytes);
        }
        Ok(())
    }

    /// Encodes a bare, untagged property name — used for
    /// `Object`/`EcmaArray` keys, which are always the short form regardless
    /// of length (as the original and every RTMP server in practice assume).
    pub fn encode_property_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(Amf0Error::StringTooLong(bytes.len()));
        }
        buf.write_u16::<BigEndian>(bytes.len() as u16)?;
        buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_raw_string(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
        buf.write_u32::<BigEndian>(u32::try_from(bytes.len()).map_err(|_| Amf0Error::StringTooLong(bytes.len()))?)?;
        buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Encodes an AMF0 `Null`.
    pub fn encode_null(buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u8(Amf0Marker::Null as u8)?;
        Ok(())
    }

    /// Encodes an `Object`'s marker, property list, and `00 00 09` end
    /// sentinel.
    pub fn encode_object(buf: &mut Vec<u8>, properties: &Amf0Properties) -> Result<()> {
        buf.write_u8(Amf0Marker::Object as u8)?;
        Self::encode_properties(buf, properties)
    }

    /// Encodes an `EcmaArray`'s marker, element-count prefix, property list,
    /// and end sentinel.
    pub fn encode_ecma_array(buf: &mut Vec<u8>, properties: &Amf0Properties) -> Result<()> {
        buf.write_u8(Amf0Marker::EcmaArray as u8)?;
        buf.write_u32::<BigEndian>(properties.len() as u32)?;
        Self::encode_properties(buf, properties)
    }

    fn encode_properties(buf: &mut Vec<u8>, properties: &Amf0Properties) -> Result<()> {
        for (name, value) in properties {
            Self::encode_property_name(buf, name)?;
            Self::encode_value(buf, value)?;
        }
        buf.write_u16::<BigEndian>(0)?;
        buf.write_u8(Amf0Marker::ObjectEnd as u8)?;
        Ok(())
    }

    /// Encodes any [`Amf0Value`].
    pub fn encode_value(buf: &mut Vec<u8>, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => Self::encode_number(buf, *n),
            Amf0Value::Boolean(b) => Self::encode_boolean(buf, *b),
            Amf0Value::String(s) => Self::encode_string(buf, s.as_str()),
            Amf0Value::Object(props) => Self::encode_object(buf, props),
            Amf0Value::EcmaArray(props) => Self::encode_ecma_array(buf, props),
            Amf0Value::Null => Self::encode_null(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amf0Value;

    #[test]
    fn encode_connect_command_prologue_matches_known_bytes() {
        // leading and trailing bytes of an encoded `connect` command prologue.
        let value = Amf0Value::Object(vec![]);
        let mut buf = Vec::new();
        Amf0Encoder::encode_string(&mut buf, "connect").unwrap();
        Amf0Encoder::encode_number(&mut buf, 1.0).unwrap();
        Amf0Encoder::encode_value(&mut buf, &value).unwrap();

        let expected_leading = [
            0x02, 0x00, 0x07, b'c', b'o', b'n', b'n', b'e', b'c', b't', 0x00, 0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x03,
        ];
        assert_eq!(&buf[..expected_leading.len()], &expected_leading[..]);
        assert_eq!(&buf[buf.len() - 3..], &[0x00, 0x00, 0x09]);
    }

    #[test]
    fn long_string_switches_marker_at_65536() {
        let long = "a".repeat(65536);
        let mut buf = Vec::new();
        Amf0Encoder::encode_string(&mut buf, &long).unwrap();
        assert_eq!(buf[0], Amf0Marker::LongString as u8);

        let short = "a".repeat(65535);
        let mut buf = Vec::new();
        Amf0Encoder::encode_string(&mut buf, &short).unwrap();
        assert_eq!(buf[0], Amf0Marker::String as u8);
    }
}
