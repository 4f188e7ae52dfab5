//! Tag and field-type vocabulary.
//!
//! Only the tags needed to locate tiles, tile geometry, shared JPEG tables and
//! the embedded color profile are named here. Everything else is skipped.

/// Tag ids recognized by the parser.
pub mod tag {
    /// Subfile type bit field (bit 0 = reduced resolution)
    pub const NEW_SUBFILE_TYPE: u16 = 254;
    /// Image width in pixels
    pub const IMAGE_WIDTH: u16 = 256;
    /// Image height in pixels
    pub const IMAGE_LENGTH: u16 = 257;
    /// Compression scheme
    pub const COMPRESSION: u16 = 259;
    /// Photometric interpretation
    pub const PHOTOMETRIC: u16 = 262;
    /// Free-text description
    pub const IMAGE_DESCRIPTION: u16 = 270;
    /// Tile width in pixels
    pub const TILE_WIDTH: u16 = 322;
    /// Tile height in pixels
    pub const TILE_LENGTH: u16 = 323;
    /// Byte offset of each tile
    pub const TILE_OFFSETS: u16 = 324;
    /// Byte length of each tile
    pub const TILE_BYTE_COUNTS: u16 = 325;
    /// Shared JPEG quantization and Huffman tables
    pub const JPEG_TABLES: u16 = 347;
    /// Embedded ICC profile
    pub const ICC_PROFILE: u16 = 34675;
    /// Private id written over [`ICC_PROFILE`] once the profile is consumed.
    ///
    /// Sorts directly below the original id, so tag order stays ascending.
    pub const ICC_PROFILE_INVALIDATED: u16 = 34674;
}

/// Old-style JPEG compression.
pub const COMPRESSION_OJPEG: u16 = 6;
/// JPEG compression.
pub const COMPRESSION_JPEG: u16 = 7;

/// Returns true for the JPEG compression codes.
#[inline]
pub fn is_jpeg_compression(code: u16) -> bool {
    code == COMPRESSION_OJPEG || code == COMPRESSION_JPEG
}

/// Field types of classic tag records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two `Long`s: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Opaque byte
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two `SLong`s
    SRational = 10,
    /// IEEE single
    Float = 11,
    /// IEEE double
    Double = 12,
    /// Sub-directory offset
    Ifd = 13,
}

impl FieldType {
    /// Bytes in the value/offset field of a classic record.
    pub const INLINE_THRESHOLD: usize = 4;

    /// Size of one value in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float | Self::Ifd => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }

    /// Decodes a type code; `None` for unknown codes.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            13 => Self::Ifd,
            _ => return None,
        })
    }

    /// True if `count` values fit in the record's value field.
    #[inline]
    pub fn fits_inline(self, count: u64) -> bool {
        self.size_in_bytes() as u64 * count <= Self::INLINE_THRESHOLD as u64
    }

    /// True for the unsigned integer types used by offset and length arrays.
    #[inline]
    pub fn is_unsigned_int(self) -> bool {
        matches!(self, Self::Short | Self::Long)
    }
}
