//! Generic tag-length-value envelope shared by every persisted record.
//!
//! Every record is stored as a 4-byte big-endian header (`tag`, `length`)
//! followed by a fixed-size payload. The payload size is determined by the
//! tag alone, so a header whose `length` disagrees with the tag is the mark of
//! a torn write and the whole record is rejected.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{NvmError, Result};

/// Size of the TLV header in bytes.
pub const TLV_HEADER_SIZE: usize = 4;

/// Known record tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordTag {
    /// Network identity plus GTK key set
    NetworkInfo = 1,
    /// Per-supplicant security keys
    Keys = 2,
    /// GTK frame counters and restart bookkeeping
    FrameCounter = 3,
    /// Bitfield of existing key-storage records
    KeyStorageIndex = 4,
    /// One supplicant's keys in a numbered key-storage file
    KeyStorage = 5,
}

impl RecordTag {
    /// Raw tag value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Tag for a raw value. `None` if unknown.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::NetworkInfo),
            2 => Some(Self::Keys),
            3 => Some(Self::FrameCounter),
            4 => Some(Self::KeyStorageIndex),
            5 => Some(Self::KeyStorage),
            _ => None,
        }
    }

    /// Fixed payload size for this tag.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::NetworkInfo => 151,
            Self::Keys => 107,
            Self::FrameCounter => 98,
            Self::KeyStorageIndex => 8,
            Self::KeyStorage => 115,
        }
    }
}

/// On-storage TLV header (big endian).
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct TlvHeader {
    tag: [u8; 2],
    length: [u8; 2],
}

/// A record with a fixed payload layout behind a TLV envelope.
///
/// Implementors only describe their payload; the envelope checks live in the
/// provided `encode`/`decode` methods.
pub trait NvmRecord: Sized {
    /// Tag identifying this record type.
    const TAG: RecordTag;

    /// Append exactly `TAG.payload_len()` bytes describing `self`.
    fn write_payload(&self, out: &mut Vec<u8>);

    /// Parse a payload of exactly `TAG.payload_len()` bytes.
    fn read_payload(payload: &[u8]) -> Result<Self>;

    /// Serialize into a complete TLV record.
    fn encode(&self) -> Vec<u8> {
        let len = Self::TAG.payload_len();
        let header = TlvHeader {
            tag: Self::TAG.to_u16().to_be_bytes(),
            length: (len as u16).to_be_bytes(),
        };

        let mut out = Vec::with_capacity(TLV_HEADER_SIZE + len);
        out.extend_from_slice(header.as_bytes());
        self.write_payload(&mut out);

        debug_assert_eq!(out.len(), TLV_HEADER_SIZE + len);
        out
    }

    /// Parse a complete TLV record.
    ///
    /// # Errors
    ///
    /// - `NvmError::Truncated` if the buffer cannot hold the header
    /// - `NvmError::UnexpectedTag` if the header carries a different tag
    /// - `NvmError::NvmCorrupt` if the stored length is not the fixed length
    ///   for the tag, or the payload is cut short
    /// - `NvmError::InvalidField` if a payload field is out of range
    fn decode(bytes: &[u8]) -> Result<Self> {
        let payload = open_envelope(bytes, Self::TAG)?;
        Self::read_payload(payload)
    }
}

/// Validate the envelope and return the payload slice.
///
/// Bytes after the payload are ignored; storage pages may be padded.
pub fn open_envelope(bytes: &[u8], expected: RecordTag) -> Result<&[u8]> {
    let header = TlvHeader::ref_from_prefix(bytes)
        .map_err(|_| NvmError::Truncated { expected: TLV_HEADER_SIZE, actual: bytes.len() })?
        .0;

    let tag = u16::from_be_bytes(header.tag);
    if tag != expected.to_u16() {
        return Err(NvmError::UnexpectedTag { expected: expected.to_u16(), actual: tag });
    }

    let length = usize::from(u16::from_be_bytes(header.length));
    let fixed = expected.payload_len();
    if length != fixed {
        return Err(NvmError::NvmCorrupt { tag, expected: fixed, actual: length });
    }

    bytes.get(TLV_HEADER_SIZE..TLV_HEADER_SIZE + length).ok_or(NvmError::NvmCorrupt {
        tag,
        expected: fixed,
        actual: bytes.len() - TLV_HEADER_SIZE,
    })
}

/// Peek at the tag of a stored record without validating the payload.
pub fn peek_tag(bytes: &[u8]) -> Option<RecordTag> {
    let header = TlvHeader::ref_from_prefix(bytes).ok()?.0;
    RecordTag::from_u16(u16::from_be_bytes(header.tag))
}

/// Decode a 0/1 presence flag.
pub(crate) fn read_flag(byte: u8, field: &'static str) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(NvmError::invalid(field, format!("flag byte {other:#04x} is not 0 or 1"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for tag in [
            RecordTag::NetworkInfo,
            RecordTag::Keys,
            RecordTag::FrameCounter,
            RecordTag::KeyStorageIndex,
            RecordTag::KeyStorage,
        ] {
            assert_eq!(RecordTag::from_u16(tag.to_u16()), Some(tag));
        }
        assert_eq!(RecordTag::from_u16(0), None);
        assert_eq!(RecordTag::from_u16(6), None);
    }

    #[test]
    fn header_is_four_bytes() {
        assert_eq!(std::mem::size_of::<TlvHeader>(), TLV_HEADER_SIZE);
    }

    #[test]
    fn envelope_rejects_short_buffer() {
        assert_eq!(
            open_envelope(&[0, 4, 0], RecordTag::KeyStorageIndex),
            Err(NvmError::Truncated { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn envelope_rejects_wrong_tag() {
        let bytes = [0, 3, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            open_envelope(&bytes, RecordTag::KeyStorageIndex),
            Err(NvmError::UnexpectedTag { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn envelope_rejects_length_mismatch() {
        let bytes = [0, 4, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            open_envelope(&bytes, RecordTag::KeyStorageIndex),
            Err(NvmError::NvmCorrupt { tag: 4, expected: 8, actual: 7 })
        );
    }

    #[test]
    fn envelope_rejects_cut_payload() {
        let bytes = [0, 4, 0, 8, 0, 0, 0];
        assert_eq!(
            open_envelope(&bytes, RecordTag::KeyStorageIndex),
            Err(NvmError::NvmCorrupt { tag: 4, expected: 8, actual: 3 })
        );
    }

    #[test]
    fn envelope_ignores_trailing_padding() {
        let bytes = [0, 4, 0, 8, 1, 2, 3, 4, 5, 6, 7, 8, 0xFF, 0xFF];
        assert_eq!(open_envelope(&bytes, RecordTag::KeyStorageIndex), Ok(&bytes[4..12]));
        assert_eq!(peek_tag(&bytes), Some(RecordTag::KeyStorageIndex));
    }

    #[test]
    fn flags_accept_only_zero_or_one() {
        assert_eq!(read_flag(0, "f"), Ok(false));
        assert_eq!(read_flag(1, "f"), Ok(true));
        assert!(read_flag(2, "f").is_err());
    }
}
