//! AMF0 decoder.

use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use num_traits::FromPrimitive;
use rtmpub_bytes_util::{BytesCursorExt, StringCow};

use crate::value::Amf0Properties;
use crate::{Amf0Error, Amf0Marker, Amf0Value, Result};

/// Tells a caller which property-list marker [`Amf0Decoder::get_object_start`]
/// consumed, since `Object` and `EcmaArray` share a decoding loop but are
/// distinct AMF0 wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// An `Object` (marker `0x03`).
    Object,
    /// An `EcmaArray` (marker `0x08`); the element count prefix is discarded.
    EcmaArray,
}

/// A streaming, cursor-based AMF0 decoder.
///
/// Every getter consumes exactly the bytes for one value (or one property
/// name, for [`get_property`](Self::get_property)) and returns
/// [`Amf0Error::Io`] wrapping [`io::ErrorKind::UnexpectedEof`] rather than
/// panicking when the underlying buffer is short — decoding a truncated
/// wire chunk is a routine, recoverable event, not a bug.
#[derive(Debug, Clone)]
pub struct Amf0Decoder {
    buf: io::Cursor<Bytes>,
}

impl Amf0Decoder {
    /// Creates a decoder over `data`, starting at offset 0.
    pub fn new(data: Bytes) -> Self {
        Self { buf: io::Cursor::new(data) }
    }

    /// Returns `true` if there are bytes left to decode.
    pub fn has_remaining(&self) -> bool {
        BytesCursorExt::remaining(&self.buf) > 0
    }

    fn peek(&self, n: usize) -> Option<&[u8]> {
        let pos = self.buf.position() as usize;
        self.buf.get_ref().get(pos..pos + n)
    }

    fn read_marker(&mut self) -> Result<Amf0Marker> {
        let byte = self.buf.read_u8()?;
        Amf0Marker::from_u8(byte).ok_or(Amf0Error::UnknownMarker(byte))
    }

    fn expect_marker(&mut self, expected: &'static [Amf0Marker]) -> Result<Amf0Marker> {
        let marker = self.read_marker()?;
        if expected.contains(&marker) {
            Ok(marker)
        } else {
            Err(Amf0Error::UnexpectedType { expected, got: marker })
        }
    }

    /// Decodes an AMF0 `Number`.
    pub fn get_number(&mut self) -> Result<f64> {
        self.expect_marker(&[Amf0Marker::Number])?;
        Ok(self.buf.read_f64::<BigEndian>()?)
    }

    /// Decodes an AMF0 `Boolean`.
    pub fn get_boolean(&mut self) -> Result<bool> {
        self.expect_marker(&[Amf0Marker::Boolean])?;
        Ok(self.buf.read_u8()? != 0)
    }

    /// Decodes a tagged AMF0 `String` or `LongString`.
    pub fn get_string(&mut self) -> Result<StringCow<'static>> {
        let marker = self.expect_marker(&[Amf0Marker::String, Amf0Marker::LongString])?;
        let len = match marker {
            Amf0Marker::String => self.buf.read_u16::<BigEndian>()? as usize,
            _ => self.buf.read_u32::<BigEndian>()? as usize,
        };
        self.read_raw_string(len)
    }

    /// Decodes a bare, untagged property name (a 2-byte length followed by
    /// UTF-8 bytes, with no marker byte) as used inside `Object`/`EcmaArray`
    /// property lists.
    pub fn get_property(&mut self) -> Result<StringCow<'static>> {
        let len = self.buf.read_u16::<BigEndian>()? as usize;
        self.read_raw_string(len)
    }

    fn read_raw_string(&mut self, len: usize) -> Result<StringCow<'static>> {
        let bytes = self.buf.extract_bytes(len)?;
        Ok(StringCow::from_bytes(bytes)?)
    }

    /// Decodes an AMF0 `Null`.
    pub fn get_null(&mut self) -> Result<()> {
        self.expect_marker(&[Amf0Marker::Null])?;
        Ok(())
    }

    /// Consumes an `Object`/`EcmaArray` marker (and, for `EcmaArray`, the
    /// unused 4-byte element count), leaving the cursor at the first
    /// property name. Pair with a loop of [`get_object_end`](Self::get_object_end) /
    /// [`get_property`](Self::get_property) / [`decode_value`](Self::decode_value).
    pub fn get_object_start(&mut self) -> Result<ObjectKind> {
        match self.expect_marker(&[Amf0Marker::Object, Amf0Marker::EcmaArray])? {
            Amf0Marker::Object => Ok(ObjectKind::Object),
            Amf0Marker::EcmaArray => {
                self.buf.read_u32::<BigEndian>()?; // element count, unused
                Ok(ObjectKind::EcmaArray)
            }
            _ => unreachable!(),
        }
    }

    /// Returns `true` and consumes the `00 00 09` end-of-object sentinel if
    /// the cursor is positioned at one; otherwise returns `false` without
    /// consuming any bytes, so the caller can fall through to
    /// [`get_property`](Self::get_property) instead.
    pub fn get_object_end(&mut self) -> Result<bool> {
        match self.peek(3) {
            Some([0, 0, end]) if *end == Amf0Marker::ObjectEnd as u8 => {
                self.buf.seek_relative(3)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }

    /// Decodes a full property list (used internally, and useful directly
    /// when the caller already knows it wants an owned `Vec`).
    pub fn get_properties(&mut self) -> Result<Amf0Properties> {
        let mut props = Vec::new();
        while !self.get_object_end()? {
            let name = self.get_property()?;
            let value = self.decode_value()?;
            props.push((name, value));
        }
        Ok(props)
    }

    /// Decodes one value of whatever type the next marker says it is.
    ///
    /// This is the dispatching counterpart to the typed getters above, used
    /// when walking a property list whose value types are not statically
    /// known to the reader (e.g. the arbitrary `info` object of an `onStatus`
    /// or `_error` command).
    pub fn decode_value(&mut self) -> Result<Amf0Value> {
        let marker = match self.peek(1) {
            Some([b]) => Amf0Marker::from_u8(*b).ok_or(Amf0Error::UnknownMarker(*b))?,
            _ => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        };

        match marker {
            Amf0Marker::Number => self.get_number().map(Amf0Value::Number),
            Amf0Marker::Boolean => self.get_boolean().map(Amf0Value::Boolean),
            Amf0Marker::String | Amf0Marker::LongString => self.get_string().map(Amf0Value::String),
            Amf0Marker::Null | Amf0Marker::Undefined => {
                self.buf.read_u8()?;
                Ok(Amf0Value::Null)
            }
            Amf0Marker::Object => {
                self.buf.read_u8()?;
                self.get_properties().map(Amf0Value::Object)
            }
            Amf0Marker::EcmaArray => {
                self.buf.read_u8()?;
                self.buf.read_u32::<BigEndian>()?;
                self.get_properties().map(Amf0Value::EcmaArray)
            }
            _ => Err(Amf0Error::UnsupportedMarker(marker)),
        }
    }

    /// Decodes and discards one value, without materializing it as an
    /// [`Amf0Value`] (used to skip command-message fields this client does
    /// not care about, e.g. the always-`Null` "command object" parameter on
    /// many server responses).
    pub fn skip_any(&mut self) -> Result<()> {
        self.decode_value().map(|_| ())
    }

    /// Decodes the leading `(command name, transaction id)` pair common to
    /// every RTMP AMF0 command message.
    pub fn get_msg_name(&mut self) -> Result<(StringCow<'static>, f64)> {
        let name = self.get_string()?;
        let txn_id = self.get_number()?;
        Ok((name, txn_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Amf0Encoder;

    #[test]
    fn round_trips_scalars() {
        let mut buf = Vec::new();
        Amf0Encoder::encode_number(&mut buf, 1.0).unwrap();
        Amf0Encoder::encode_boolean(&mut buf, true).unwrap();
        Amf0Encoder::encode_string(&mut buf, "hello").unwrap();
        Amf0Encoder::encode_null(&mut buf).unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        assert_eq!(decoder.get_number().unwrap(), 1.0);
        assert!(decoder.get_boolean().unwrap());
        assert_eq!(decoder.get_string().unwrap().as_str(), "hello");
        decoder.get_null().unwrap();
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn decodes_object_with_end_sentinel() {
        #[rustfmt::skip]
        let bytes = [
            Amf0Marker::Object as u8,
            0, 1, b'a',
            Amf0Marker::Boolean as u8, 1,
            0, 0, Amf0Marker::ObjectEnd as u8,
        ];
        let mut decoder = Amf0Decoder::new(Bytes::copy_from_slice(&bytes));
        assert_eq!(decoder.get_object_start().unwrap(), ObjectKind::Object);
        let props = decoder.get_properties().unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].0.as_str(), "a");
        assert_eq!(props[0].1, Amf0Value::Boolean(true));
    }

    #[test]
    fn short_buffer_is_an_error_not_a_panic() {
        let mut decoder = Amf0Decoder::new(Bytes::from_static(&[Amf0Marker::Number as u8, 0, 0]));
        assert!(decoder.get_number().is_err());
    }
}
