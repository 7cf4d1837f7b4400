//! AMF0 error type.

use std::io;
use std::string::FromUtf8Error;

use crate::Amf0Marker;

/// Result type.
pub type Result<T> = std::result::Result<T, Amf0Error>;

/// AMF0 error.
#[derive(thiserror::Error, Debug)]
pub enum Amf0Error {
    /// IO error (short buffer on decode, OOM-style allocation failure on encode).
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A string longer than `u32::MAX` bytes was given to the encoder.
    #[error("string is too long to encode: {0} bytes")]
    StringTooLong(usize),
    /// Decoded a marker byte this decoder does not understand.
    #[error("unknown marker: {0}")]
    UnknownMarker(u8),
    /// This marker is valid AMF0 but unsupported here (e.g. References, AVM+).
    #[error("this marker cannot be decoded: {0:?}")]
    UnsupportedMarker(Amf0Marker),
    /// String bytes were not valid UTF-8.
    #[error("string parse error: {0}")]
    StringParseError(#[from] FromUtf8Error),
    /// A getter expected one marker but found another.
    #[error("unexpected type: expected one of {expected:?}, got {got:?}")]
    UnexpectedType {
        /// The expected types.
        expected: &'static [Amf0Marker],
        /// The actual type.
        got: Amf0Marker,
    },
    /// An `Object`/`EcmaArray` property list ended without the `00 00 09` sentinel.
    #[error("object is missing its end sentinel")]
    MissingObjectEnd,
}
