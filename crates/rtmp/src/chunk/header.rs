//! Chunk basic-header and message-header wire codec.
//!
//! These are pure, allocation-free functions over byte slices: the basic
//! header's variable-width chunk-stream-id encoding, and the four
//! message-header shapes (11 / 7 / 3 / 0 bytes). Header *selection* (which of
//! the four types a given outgoing message should use) and reassembly
//! bookkeeping live in [`super::channel`] and [`super::mux`]; this module only
//! knows how to read and write the bytes once the shape has been decided.

/// The four chunk message-header shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkHeaderType {
    /// 11-byte header: absolute timestamp, message length, type id, stream id.
    Type0 = 0,
    /// 7-byte header: timestamp delta, message length, type id (stream id inherited).
    Type1 = 1,
    /// 3-byte header: timestamp delta only (length, type id, stream id inherited).
    Type2 = 2,
    /// 0-byte header: everything inherited from the previous chunk on this csid.
    Type3 = 3,
}

impl ChunkHeaderType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Type0,
            1 => Self::Type1,
            2 => Self::Type2,
            _ => Self::Type3,
        }
    }
}

/// Sentinel value for the 24-bit in-header timestamp field that means "see
/// the 4-byte extended timestamp that follows".
pub const EXTENDED_TIMESTAMP_SENTINEL: u32 = 0x00FF_FFFF;

/// Writes a chunk basic header (1-3 bytes) for `csid`.
///
/// `csid` must be `>= 2` (0 and 1 are reserved as extension-length markers,
/// never themselves a valid chunk-stream id).
pub fn write_basic_header(buf: &mut Vec<u8>, header_type: ChunkHeaderType, csid: u32) {
    let fmt_bits = (header_type as u8) << 6;
    if csid < 64 {
        buf.push(fmt_bits | csid as u8);
    } else if csid < 64 + 256 {
        buf.push(fmt_bits);
        buf.push((csid - 64) as u8);
    } else {
        buf.push(fmt_bits | 1);
        let extended = csid - 64;
        buf.push((extended & 0xFF) as u8);
        buf.push((extended >> 8) as u8);
    }
}

/// A successfully decoded basic header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicHeader {
    /// Which message-header shape follows.
    pub header_type: ChunkHeaderType,
    /// The chunk-stream id.
    pub csid: u32,
    /// Bytes consumed from the front of the input.
    pub consumed: usize,
}

/// Decodes a basic header from the front of `data`.
///
/// Returns `None` if `data` does not yet contain enough bytes (the caller
/// should stop and wait for more to arrive, preserving the tail), never
/// panics on short input.
pub fn read_basic_header(data: &[u8]) -> Option<BasicHeader> {
    let first = *data.first()?;
    let header_type = ChunkHeaderType::from_bits(first >> 6);
    match first & 0x3F {
        0 => {
            let extra = *data.get(1)?;
            Some(BasicHeader {
                header_type,
                csid: extra as u32 + 64,
                consumed: 2,
            })
        }
        1 => {
            let low = *data.get(1)?;
            let high = *data.get(2)?;
            Some(BasicHeader {
                header_type,
                csid: low as u32 + (high as u32) * 256 + 64,
                consumed: 3,
            })
        }
        csid => Some(BasicHeader {
            header_type,
            csid: csid as u32,
            consumed: 1,
        }),
    }
}

/// The message-header fields present for a given [`ChunkHeaderType`], before
/// extended-timestamp resolution. Fields absent for a type are inherited from
/// the channel's previous chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageHeaderFields {
    /// Type 0: every field is present and the timestamp is absolute.
    Type0 { timestamp: u32, length: u32, mtid: u8, msid: u32 },
    /// Type 1: stream id is inherited; timestamp is a delta.
    Type1 { timestamp_delta: u32, length: u32, mtid: u8 },
    /// Type 2: only the timestamp delta is present.
    Type2 { timestamp_delta: u32 },
    /// Type 3: nothing is present.
    Type3,
}

/// Writes the message-header bytes (11/7/3/0) for `fields`, embedding
/// `EXTENDED_TIMESTAMP_SENTINEL` in place of any timestamp `>= 0xFFFFFF`. Does
/// NOT write the 4-byte extended timestamp itself — see [`write_extended_timestamp`].
pub fn write_message_header(buf: &mut Vec<u8>, fields: &MessageHeaderFields) {
    match *fields {
        MessageHeaderFields::Type0 {
            timestamp,
            length,
            mtid,
            msid,
        } => {
            write_u24(buf, timestamp.min(EXTENDED_TIMESTAMP_SENTINEL));
            write_u24(buf, length);
            buf.push(mtid);
            buf.extend_from_slice(&msid.to_le_bytes());
        }
        MessageHeaderFields::Type1 {
            timestamp_delta,
            length,
            mtid,
        } => {
            write_u24(buf, timestamp_delta.min(EXTENDED_TIMESTAMP_SENTINEL));
            write_u24(buf, length);
            buf.push(mtid);
        }
        MessageHeaderFields::Type2 { timestamp_delta } => {
            write_u24(buf, timestamp_delta.min(EXTENDED_TIMESTAMP_SENTINEL));
        }
        MessageHeaderFields::Type3 => {}
    }
}

/// Appends a 4-byte big-endian extended timestamp.
pub fn write_extended_timestamp(buf: &mut Vec<u8>, timestamp: u32) {
    buf.extend_from_slice(&timestamp.to_be_bytes());
}

fn write_u24(buf: &mut Vec<u8>, value: u32) {
    let bytes = value.to_be_bytes();
    buf.extend_from_slice(&bytes[1..4]);
}

/// Decodes the message-header fields for `header_type` from the front of
/// `data`. Returns `Ok(None)` on short input.
pub fn read_message_header(header_type: ChunkHeaderType, data: &[u8]) -> Option<(MessageHeaderFields, usize)> {
    match header_type {
        ChunkHeaderType::Type0 => {
            let timestamp = read_u24(data, 0)?;
            let length = read_u24(data, 3)?;
            let mtid = *data.get(6)?;
            let msid = u32::from_le_bytes(data.get(7..11)?.try_into().ok()?);
            Some((
                MessageHeaderFields::Type0 {
                    timestamp,
                    length,
                    mtid,
                    msid,
                },
                11,
            ))
        }
        ChunkHeaderType::Type1 => {
            let timestamp_delta = read_u24(data, 0)?;
            let length = read_u24(data, 3)?;
            let mtid = *data.get(6)?;
            Some((
                MessageHeaderFields::Type1 {
                    timestamp_delta,
                    length,
                    mtid,
                },
                7,
            ))
        }
        ChunkHeaderType::Type2 => {
            let timestamp_delta = read_u24(data, 0)?;
            Some((MessageHeaderFields::Type2 { timestamp_delta }, 3))
        }
        ChunkHeaderType::Type3 => Some((MessageHeaderFields::Type3, 0)),
    }
}

/// Reads a 4-byte big-endian extended timestamp from the front of `data`.
pub fn read_extended_timestamp(data: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(0..4)?.try_into().ok()?))
}

fn read_u24(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 3)?;
    Some(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_header_round_trips_across_csid_ranges() {
        for csid in [2, 63, 64, 65, 319, 320, 1000, 65599] {
            let mut buf = Vec::new();
            write_basic_header(&mut buf, ChunkHeaderType::Type0, csid);
            let decoded = read_basic_header(&buf).unwrap();
            assert_eq!(decoded.csid, csid, "csid {csid}");
            assert_eq!(decoded.consumed, buf.len());
        }
    }

    #[test]
    fn short_basic_header_is_none_not_panic() {
        assert!(read_basic_header(&[]).is_none());
        // fmt bits select the 2-extra-byte form but only 1 byte is present.
        assert!(read_basic_header(&[0x00]).is_none());
    }

    #[test]
    fn type0_message_header_round_trips() {
        let fields = MessageHeaderFields::Type0 {
            timestamp: 1234,
            length: 999,
            mtid: 0x09,
            msid: 7,
        };
        let mut buf = Vec::new();
        write_message_header(&mut buf, &fields);
        assert_eq!(buf.len(), 11);
        let (decoded, consumed) = read_message_header(ChunkHeaderType::Type0, &buf).unwrap();
        assert_eq!(consumed, 11);
        assert_eq!(decoded, fields);
    }

    #[test]
    fn extended_timestamp_sentinel_written_when_over_24_bits() {
        let fields = MessageHeaderFields::Type0 {
            timestamp: 0x0100_0000,
            length: 0,
            mtid: 0,
            msid: 0,
        };
        let mut buf = Vec::new();
        write_message_header(&mut buf, &fields);
        assert_eq!(&buf[0..3], &[0xFF, 0xFF, 0xFF]);
    }
}
