//! A pure-rust implementation of the AMF0 encoder and decoder.
//!
//! AMF0 is the typed value serialization RTMP uses for its command dialog
//! (`connect`, `createStream`, `publish`, `onStatus`, ...). This crate exposes
//! a tagged value tree ([`Amf0Value`]), a streaming cursor-based
//! [`Amf0Decoder`] with scalar getters, and a stateless [`Amf0Encoder`] that
//! serializes a value tree built once per message.
//!
//! # Limitations
//!
//! - No support for the AMF0 `Reference` marker.
//! - No support for the AVM+ (AMF3) type marker (AMF0 §3.1).
//!
//! # Examples
//!
//! ```rust
//! use rtmpub_amf0::{Amf0Decoder, Amf0Encoder, Amf0Value};
//!
//! let mut buf = Vec::new();
//! Amf0Encoder::encode_value(&mut buf, &Amf0Value::Number(1.0)).unwrap();
//!
//! let mut decoder = Amf0Decoder::new(bytes::Bytes::from(buf));
//! assert_eq!(decoder.get_number().unwrap(), 1.0);
//! ```
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod value;

pub use decoder::{Amf0Decoder, ObjectKind};
pub use encoder::Amf0Encoder;
pub use error::{Amf0Error, Result};
pub use value::{Amf0Properties, Amf0Value};

/// AMF0 marker bytes.
///
/// Defined by the AMF0 spec §2.1. Kept as a plain `#[repr(u8)]` enum decoded
/// through `num_traits::FromPrimitive` rather than a [`nutype_enum`](nutype_enum::nutype_enum)
/// open enum: an unrecognized marker byte is always a decode error here, never
/// a value worth round-tripping.
#[derive(Debug, PartialEq, Eq, Clone, Copy, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum Amf0Marker {
    /// number-marker
    Number = 0x00,
    /// boolean-marker
    Boolean = 0x01,
    /// string-marker
    String = 0x02,
    /// object-marker
    Object = 0x03,
    /// movieclip-marker
    ///
    /// reserved, not supported
    MovieClipMarker = 0x04,
    /// null-marker
    Null = 0x05,
    /// undefined-marker
    Undefined = 0x06,
    /// reference-marker
    Reference = 0x07,
    /// ecma-array-marker
    EcmaArray = 0x08,
    /// object-end-marker
    ObjectEnd = 0x09,
    /// strict-array-marker
    StrictArray = 0x0a,
    /// date-marker
    Date = 0x0b,
    /// long-string-marker
    LongString = 0x0c,
    /// unsupported-marker
    Unsupported = 0x0d,
    /// recordset-marker
    ///
    /// reserved, not supported
    Recordset = 0x0e,
    /// xml-document-marker
    XmlDocument = 0x0f,
    /// typed-object-marker
    TypedObject = 0x10,
    /// avmplus-object-marker
    ///
    /// AMF3 marker
    AVMPlusObject = 0x11,
}
