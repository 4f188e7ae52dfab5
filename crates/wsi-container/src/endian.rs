//! Container byte order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order declared by the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// `II` - Intel, little-endian
    Little,
    /// `MM` - Motorola, big-endian
    Big,
}

impl Endian {
    /// Decodes the two-byte order mark.
    pub fn from_mark(mark: [u8; 2]) -> Option<Self> {
        match &mark {
            b"II" => Some(Self::Little),
            b"MM" => Some(Self::Big),
            _ => None,
        }
    }

    /// Reads a `u16` from the start of `buf`.
    #[inline]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Self::Little => LittleEndian::read_u16(buf),
            Self::Big => BigEndian::read_u16(buf),
        }
    }

    /// Reads a `u32` from the start of `buf`.
    #[inline]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(buf),
            Self::Big => BigEndian::read_u32(buf),
        }
    }

    /// Encodes a `u16`.
    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        let mut buf = [0u8; 2];
        match self {
            Self::Little => LittleEndian::write_u16(&mut buf, value),
            Self::Big => BigEndian::write_u16(&mut buf, value),
        }
        buf
    }

    /// Encodes a `u32`.
    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        let mut buf = [0u8; 4];
        match self {
            Self::Little => LittleEndian::write_u32(&mut buf, value),
            Self::Big => BigEndian::write_u32(&mut buf, value),
        }
        buf
    }
}
