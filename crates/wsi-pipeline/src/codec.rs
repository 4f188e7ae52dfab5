//! JPEG stream surgery and codec glue.
//!
//! Tiles are only ever touched at segment granularity: the header segments
//! before the first scan are walked by marker and length, and the entropy-coded
//! scan is carried through untouched.

use jpeg_encoder::{ColorType, Encoder, QuantizationTableType, SamplingFactor};
use thiserror::Error;
use wsi_core::Error;

/// Start of image.
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// End of image.
pub const EOI: [u8; 2] = [0xFF, 0xD9];
/// `APP0` (JFIF) marker byte.
pub const APP0: u8 = 0xE0;
/// `APP14` (Adobe) marker byte.
pub const APP14: u8 = 0xEE;
/// Define-quantization-table marker byte.
pub const DQT: u8 = 0xDB;
/// Define-Huffman-table marker byte.
pub const DHT: u8 = 0xC4;
const SOS: u8 = 0xDA;

/// Adobe `APP14` segment declaring color transform 0: the three components
/// are RGB and must not be converted from YCbCr.
pub const ADOBE_RGB_MARKER: [u8; 16] = [
    0xFF, APP14, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Natural (row-major) index of each zigzag position.
const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Result type for stream-level codec work.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Failures while walking, decoding or encoding a single stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Header segments do not parse.
    #[error("malformed stream: {0}")]
    Malformed(String),

    /// The decoder rejected the stream.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The encoder rejected the pixels.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Decoded samples are neither RGB nor grayscale.
    #[error("unsupported pixel format {0}")]
    PixelFormat(String),

    /// Tile side does not fit a baseline frame header.
    #[error("dimension {0} exceeds 65535")]
    Dimension(usize),
}

impl CodecError {
    #[inline]
    fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// A header segment: its marker byte and byte range (marker included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Marker byte following `0xFF`
    pub marker: u8,
    /// Offset of the `0xFF`
    pub start: usize,
    /// One past the segment's last byte
    pub end: usize,
}

/// Walks the header segments of a stream.
///
/// Returns the segments before the first scan and the offset of the `SOS`
/// marker. A stream with no scan (tables-only) ends at its `EOI`.
pub fn segments(jpeg: &[u8]) -> CodecResult<(Vec<Segment>, usize)> {
    if jpeg.len() < 4 || jpeg[..2] != SOI {
        return Err(CodecError::malformed("stream does not start with SOI"));
    }
    let mut out = Vec::new();
    let mut i = 2;
    loop {
        if i + 2 > jpeg.len() {
            return Err(CodecError::malformed(format!("stream ends inside header at byte {}", i)));
        }
        if jpeg[i] != 0xFF {
            return Err(CodecError::malformed(format!(
                "expected marker at byte {}, found {:#04x}",
                i, jpeg[i]
            )));
        }
        let marker = jpeg[i + 1];
        match marker {
            // Fill byte
            0xFF => i += 1,
            SOS | 0xD9 => return Ok((out, i)),
            _ => {
                if i + 4 > jpeg.len() {
                    return Err(CodecError::malformed(format!(
                        "truncated segment {:#04x} at byte {}",
                        marker, i
                    )));
                }
                let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
                let end = i + 2 + len;
                if len < 2 || end > jpeg.len() {
                    return Err(CodecError::malformed(format!(
                        "segment {:#04x} at byte {} overruns stream",
                        marker, i
                    )));
                }
                out.push(Segment { marker, start: i, end });
                i = end;
            }
        }
    }
}

/// Inserts [`ADOBE_RGB_MARKER`] directly after `SOI`.
pub fn inject_adobe_marker(jpeg: &[u8]) -> CodecResult<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[..2] != SOI {
        return Err(CodecError::malformed("stream does not start with SOI"));
    }
    let mut out = Vec::with_capacity(jpeg.len() + ADOBE_RGB_MARKER.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&ADOBE_RGB_MARKER);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Removes every header segment for which `remove` answers true.
pub fn remove_segments(
    jpeg: &[u8],
    mut remove: impl FnMut(&Segment) -> CodecResult<bool>,
) -> CodecResult<Vec<u8>> {
    let (segs, _) = segments(jpeg)?;
    let mut out = Vec::with_capacity(jpeg.len());
    let mut copied = 0;
    for seg in &segs {
        if remove(seg)? {
            out.extend_from_slice(&jpeg[copied..seg.start]);
            copied = seg.end;
        }
    }
    out.extend_from_slice(&jpeg[copied..]);
    Ok(out)
}

/// Removes every header segment whose marker is listed.
pub fn strip_segments(jpeg: &[u8], markers: &[u8]) -> CodecResult<Vec<u8>> {
    remove_segments(jpeg, |seg| Ok(markers.contains(&seg.marker)))
}

/// Body of a `JPEGTables` blob: everything between `SOI` and `EOI`.
pub fn table_body(tables: &[u8]) -> CodecResult<&[u8]> {
    let (_, end) = segments(tables)?;
    Ok(&tables[2..end])
}

/// Splices shared table segments into an abbreviated tile after its `SOI`.
pub fn merge_tables(body: &[u8], tile: &[u8]) -> CodecResult<Vec<u8>> {
    if tile.len() < 2 || tile[..2] != SOI {
        return Err(CodecError::malformed("tile does not start with SOI"));
    }
    let mut out = Vec::with_capacity(tile.len() + body.len());
    out.extend_from_slice(&tile[..2]);
    out.extend_from_slice(body);
    out.extend_from_slice(&tile[2..]);
    Ok(out)
}

/// One table definition out of a `DQT` or `DHT` segment: the marker it came
/// from plus its bytes, class/destination byte first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// [`DQT`] or [`DHT`]
    pub marker: u8,
    /// Destination byte followed by the table payload
    pub bytes: Vec<u8>,
}

impl TableSpec {
    /// Table destination (`Tq` or `Th`).
    #[inline]
    pub fn destination(&self) -> u8 {
        self.bytes.first().map_or(0, |b| b & 0x0F)
    }

    /// Quantization values in natural order. `None` for Huffman tables.
    pub fn quantization(&self) -> Option<[u16; 64]> {
        let wide = match (self.marker, self.bytes.len()) {
            (DQT, 65) => false,
            (DQT, 129) => true,
            _ => return None,
        };
        let mut natural = [0u16; 64];
        for (k, &pos) in ZIGZAG.iter().enumerate() {
            natural[pos] = if wide {
                u16::from_be_bytes([self.bytes[1 + 2 * k], self.bytes[2 + 2 * k]])
            } else {
                self.bytes[1 + k] as u16
            };
        }
        Some(natural)
    }
}

/// Splits one `DQT`/`DHT` segment (marker and length included) into its
/// table definitions.
pub fn table_specs(segment: &[u8]) -> CodecResult<Vec<TableSpec>> {
    if segment.len() < 4 || segment[0] != 0xFF || !matches!(segment[1], DQT | DHT) {
        return Err(CodecError::malformed("not a table segment"));
    }
    let marker = segment[1];
    let mut rest = &segment[4..];
    let mut out = Vec::new();
    while let Some(&head) = rest.first() {
        let len = if marker == DQT {
            match head >> 4 {
                0 => 65,
                1 => 129,
                p => return Err(CodecError::malformed(format!("quantization precision {}", p))),
            }
        } else {
            let counts = rest
                .get(1..17)
                .ok_or_else(|| CodecError::malformed("truncated Huffman counts"))?;
            17 + counts.iter().map(|&c| c as usize).sum::<usize>()
        };
        if len > rest.len() {
            return Err(CodecError::malformed(format!(
                "table {:#04x}/{:#04x} overruns its segment",
                marker, head
            )));
        }
        out.push(TableSpec { marker, bytes: rest[..len].to_vec() });
        rest = &rest[len..];
    }
    Ok(out)
}

/// The table definitions a directory shares through `JPEGTables`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSet {
    specs: Vec<TableSpec>,
}

impl TableSet {
    /// Collects every `DQT`/`DHT` definition of a stream's header.
    pub fn parse(jpeg: &[u8]) -> CodecResult<Self> {
        let (segs, _) = segments(jpeg)?;
        let mut specs: Vec<TableSpec> = Vec::new();
        for seg in segs.iter().filter(|s| matches!(s.marker, DQT | DHT)) {
            for spec in table_specs(&jpeg[seg.start..seg.end])? {
                // A later definition replaces an earlier one at the same slot
                specs.retain(|s| s.marker != spec.marker || s.bytes[0] != spec.bytes[0]);
                specs.push(spec);
            }
        }
        Ok(Self { specs })
    }

    /// Number of table definitions.
    #[inline]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no table was found.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// True when every definition in `segment` is one of ours byte for byte.
    pub fn covers(&self, segment: &[u8]) -> CodecResult<bool> {
        Ok(table_specs(segment)?.iter().all(|spec| self.specs.contains(spec)))
    }

    /// Quantization tables the encoder can reproduce exactly.
    ///
    /// Destination 0 drives luma and destination 1 chroma (falling back to 0).
    /// `None` when a table is missing, 16-bit, or holds a zero step.
    pub fn encoder_tables(&self) -> Option<QuantTables> {
        let quant = |dest: u8| {
            self.specs
                .iter()
                .find(|s| s.marker == DQT && s.destination() == dest)
                .and_then(TableSpec::quantization)
        };
        let luma = quant(0)?;
        let chroma = quant(1).unwrap_or(luma);
        let fits = |t: &[u16; 64]| t.iter().all(|&v| (1..=255).contains(&v));
        (fits(&luma) && fits(&chroma)).then_some(QuantTables { luma, chroma })
    }

    /// Drops the `DQT`/`DHT` segments of `jpeg` that this set already defines.
    ///
    /// Segments holding any table we do not share stay in the stream.
    pub fn abbreviate(&self, jpeg: &[u8]) -> CodecResult<Vec<u8>> {
        remove_segments(jpeg, |seg| match seg.marker {
            DQT | DHT => self.covers(&jpeg[seg.start..seg.end]),
            _ => Ok(false),
        })
    }
}

/// Luma and chroma quantization steps in natural order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTables {
    /// Table for the first component
    pub luma: [u16; 64],
    /// Table for the second and third components
    pub chroma: [u16; 64],
}

/// Decoded RGB8 tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
    /// Interleaved RGB8 pixels
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

/// Decodes a complete stream to RGB8.
///
/// Grayscale streams are expanded to RGB.
pub fn decode_rgb(jpeg: &[u8]) -> CodecResult<DecodedTile> {
    let mut decoder = jpeg_decoder::Decoder::new(jpeg);
    let pixels = decoder.decode().map_err(|e| CodecError::Decode(e.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| CodecError::Decode("decoder returned no image info".into()))?;
    let pixels = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => pixels,
        jpeg_decoder::PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        other => return Err(CodecError::PixelFormat(format!("{:?}", other))),
    };
    Ok(DecodedTile {
        pixels,
        width: info.width as usize,
        height: info.height as usize,
    })
}

/// Color layout of an encoded tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeLayout {
    /// Standard JFIF: RGB converted to YCbCr with chroma subsampling.
    Jfif,
    /// RGB samples stored as-is at full resolution, no color markers.
    RawRgb,
}

/// Encodes RGB8 pixels.
///
/// With `tables` the given quantization steps are used and `quality` is
/// ignored. Huffman tables are always the standard ones.
pub fn encode_rgb(
    tile: &DecodedTile,
    quality: u8,
    tables: Option<&QuantTables>,
    layout: EncodeLayout,
) -> CodecResult<Vec<u8>> {
    let (width, height) = (dims(tile.width)?, dims(tile.height)?);
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, quality);
    if let Some(tables) = tables {
        encoder.set_quantization_tables(
            QuantizationTableType::Custom(Box::new(tables.luma)),
            QuantizationTableType::Custom(Box::new(tables.chroma)),
        );
    }
    let color_type = match layout {
        EncodeLayout::Jfif => ColorType::Rgb,
        EncodeLayout::RawRgb => {
            encoder.set_sampling_factor(SamplingFactor::F_1_1);
            ColorType::Ycbcr
        }
    };
    encoder
        .encode(&tile.pixels, width, height, color_type)
        .map_err(|e: jpeg_encoder::EncodingError| CodecError::Encode(e.to_string()))?;

    match layout {
        EncodeLayout::Jfif => Ok(buffer),
        EncodeLayout::RawRgb => strip_segments(&buffer, &[APP0, APP14]),
    }
}

fn dims(v: usize) -> CodecResult<u16> {
    u16::try_from(v).map_err(|_| CodecError::Dimension(v))
}

/// Attaches directory and tile context to a codec failure.
pub(crate) fn tile_error(directory: usize, tile: usize) -> impl FnOnce(CodecError) -> Error {
    move |err| Error::codec(directory, tile, err.to_string())
}
