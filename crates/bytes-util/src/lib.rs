//! Small, dependency-light helpers shared by the AMF0 and RTMP codecs.
//!
//! - [`StringCow`] is a `Cow<str>`-like type that can be built from either a
//!   borrowed `&'static str` or an owned, UTF-8-validated [`Bytes`] without an
//!   extra allocation on the borrowed path.
//! - [`BytesCow`] is the byte-slice analogue.
//! - [`BytesCursorExt`] adds checked, panic-free extraction helpers to
//!   `io::Cursor<Bytes>`, which the chunk and AMF0 decoders use so that a
//!   truncated wire buffer is a recoverable error rather than a `bytes` crate
//!   panic.
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

use std::io;
use std::string::FromUtf8Error;

use bytes::Bytes;

/// A `Cow<str>`-like type backed by either a static string or an owned [`Bytes`] allocation.
///
/// Keeping the owned variant as [`Bytes`] (rather than `String`) means a
/// `StringCow` produced from a decoded wire buffer is a cheap refcount bump
/// away from the original allocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StringCow<'a> {
    /// A borrowed, compile-time string.
    Borrowed(&'a str),
    /// An owned, UTF-8-validated byte buffer.
    Owned(Bytes),
}

impl<'a> StringCow<'a> {
    /// Wraps a `'static` string without allocating.
    pub const fn from_static(s: &'static str) -> StringCow<'static> {
        StringCow::Borrowed(s)
    }

    /// Validates `bytes` as UTF-8 and wraps it, without copying.
    pub fn from_bytes(bytes: Bytes) -> Result<StringCow<'static>, FromUtf8Error> {
        match std::str::from_utf8(&bytes) {
            Ok(_) => Ok(StringCow::Owned(bytes)),
            Err(_) => Err(String::from_utf8(bytes.to_vec()).unwrap_err()),
        }
    }

    /// Returns the string contents.
    pub fn as_str(&self) -> &str {
        match self {
            StringCow::Borrowed(s) => s,
            // Validated at construction time in `from_bytes`.
            StringCow::Owned(b) => std::str::from_utf8(b).unwrap_or(""),
        }
    }

    /// Converts this value into a `'static` owned variant.
    pub fn into_owned(self) -> StringCow<'static> {
        match self {
            StringCow::Borrowed(s) => StringCow::Owned(Bytes::copy_from_slice(s.as_bytes())),
            StringCow::Owned(b) => StringCow::Owned(b),
        }
    }
}

impl std::fmt::Display for StringCow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'a> From<&'a str> for StringCow<'a> {
    fn from(value: &'a str) -> Self {
        StringCow::Borrowed(value)
    }
}

impl From<String> for StringCow<'_> {
    fn from(value: String) -> Self {
        StringCow::Owned(Bytes::from(value.into_bytes()))
    }
}

impl std::ops::Deref for StringCow<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

/// A `Cow<[u8]>`-like type backed by either a borrowed slice or an owned [`Bytes`] allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BytesCow<'a> {
    /// A borrowed byte slice.
    Borrowed(&'a [u8]),
    /// An owned, shared byte buffer.
    Owned(Bytes),
}

impl<'a> BytesCow<'a> {
    /// Wraps an owned [`Bytes`] buffer.
    pub fn from_bytes(bytes: Bytes) -> BytesCow<'static> {
        BytesCow::Owned(bytes)
    }

    /// Copies a `Vec<u8>` into an owned variant.
    pub fn from_vec(vec: Vec<u8>) -> BytesCow<'static> {
        BytesCow::Owned(Bytes::from(vec))
    }

    /// Borrows a byte slice without copying.
    pub fn from_slice(slice: &'a [u8]) -> BytesCow<'a> {
        BytesCow::Borrowed(slice)
    }

    /// Returns the byte contents.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            BytesCow::Borrowed(s) => s,
            BytesCow::Owned(b) => b.as_ref(),
        }
    }
}

/// Checked extraction helpers for `io::Cursor<Bytes>`.
///
/// The stdlib `Buf` methods (`get_u8`, `copy_to_bytes`, ...) panic when the
/// cursor is short on data. Every wire-format decoder in this workspace reads
/// from a possibly-truncated network buffer, so all extraction goes through
/// here instead, turning a short read into an [`io::ErrorKind::UnexpectedEof`].
pub trait BytesCursorExt {
    /// Extracts `len` bytes from the cursor as a cheap [`Bytes`] slice, advancing the cursor.
    fn extract_bytes(&mut self, len: usize) -> io::Result<Bytes>;

    /// Moves the cursor position by `offset` bytes (may be negative), without reading.
    fn seek_relative(&mut self, offset: i64) -> io::Result<()>;

    /// Returns the number of bytes remaining after the cursor position.
    fn remaining(&self) -> usize;
}

impl BytesCursorExt for io::Cursor<Bytes> {
    fn extract_bytes(&mut self, len: usize) -> io::Result<Bytes> {
        let pos = self.position() as usize;
        let buf = self.get_ref();

        if pos.saturating_add(len) > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("requested {len} bytes, only {} remaining", buf.len().saturating_sub(pos)),
            ));
        }

        let slice = buf.slice(pos..pos + len);
        self.set_position((pos + len) as u64);
        Ok(slice)
    }

    fn seek_relative(&mut self, offset: i64) -> io::Result<()> {
        let pos = self.position() as i64 + offset;
        if pos < 0 || pos as usize > self.get_ref().len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "seek out of bounds"));
        }
        self.set_position(pos as u64);
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.get_ref().len().saturating_sub(self.position() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bytes_checks_bounds() {
        let mut cursor = io::Cursor::new(Bytes::from_static(b"hello"));
        assert_eq!(cursor.extract_bytes(3).unwrap(), Bytes::from_static(b"hel"));
        assert!(cursor.extract_bytes(10).is_err());
    }

    #[test]
    fn seek_relative_bounds_check() {
        let mut cursor = io::Cursor::new(Bytes::from_static(b"hello"));
        cursor.seek_relative(2).unwrap();
        assert_eq!(cursor.position(), 2);
        assert!(cursor.seek_relative(-10).is_err());
    }

    #[test]
    fn string_cow_borrowed_does_not_allocate_variant() {
        let s = StringCow::from_static("hello");
        assert!(matches!(s, StringCow::Borrowed(_)));
        assert_eq!(s.as_str(), "hello");
    }
}
