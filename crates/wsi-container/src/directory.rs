//! In-memory model of a container's directories and tile runs.

use std::fmt;

use crate::FieldType;

/// Half-open byte range `[start, end)` in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte
    pub start: u64,
    /// One past the last byte
    pub end: u64,
}

impl ByteRange {
    /// Creates a range from a start offset and a length.
    #[inline]
    pub fn new(start: u64, len: u64) -> Self {
        Self {
            start,
            end: start + len,
        }
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true for an empty range.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Role of a directory within the slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    /// Full-resolution base image
    Full,
    /// Pyramid level or thumbnail
    Reduced,
    /// Slide label photograph
    Label,
    /// Macro overview photograph
    Macro,
}

impl fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
            Self::Label => "label",
            Self::Macro => "macro",
        })
    }
}

/// Location of one value inside a tag's data.
///
/// Rewriting a tile's offset or length means overwriting exactly this slot,
/// at the slot's width and the container's byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    /// Absolute byte position of the value
    pub position: u64,
    /// `Short` or `Long`
    pub field_type: FieldType,
}

impl FieldSlot {
    /// Largest value the slot can hold.
    #[inline]
    pub fn max_value(&self) -> u64 {
        match self.field_type {
            FieldType::Short => u16::MAX as u64,
            _ => u32::MAX as u64,
        }
    }
}

/// One compressed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Row-major index within the directory
    pub index: usize,
    /// Byte offset in the container
    pub offset: u64,
    /// Byte length
    pub length: u64,
    /// Where the offset is recorded
    pub offset_slot: FieldSlot,
    /// Where the length is recorded
    pub length_slot: FieldSlot,
}

impl Tile {
    /// Byte range occupied by the tile.
    #[inline]
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.length)
    }

    /// First byte after the tile.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Maximal sequence of byte-contiguous tiles.
///
/// The run is a fixed hole in the container: replacements may shrink but
/// their total must not exceed [`length`](Self::length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRun {
    /// Index of the run within its directory
    pub index: usize,
    /// Offset of the first tile
    pub start: u64,
    /// Byte budget of the run
    pub length: u64,
    /// Tiles in ascending index order
    pub tiles: Vec<Tile>,
}

impl TileRun {
    /// Byte range of the run.
    #[inline]
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.start, self.length)
    }
}

/// Groups tiles into runs, splitting wherever a tile does not start at the
/// previous tile's end.
pub fn group_runs(tiles: Vec<Tile>) -> Vec<TileRun> {
    let mut runs: Vec<TileRun> = Vec::new();
    for tile in tiles {
        match runs.last_mut() {
            Some(run) if run.start + run.length == tile.offset => {
                run.length += tile.length;
                run.tiles.push(tile);
            }
            _ => runs.push(TileRun {
                index: runs.len(),
                start: tile.offset,
                length: tile.length,
                tiles: vec![tile],
            }),
        }
    }
    runs
}

/// Embedded color-profile reference in one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileRef {
    /// Profile bytes
    pub range: ByteRange,
    /// Position of the record's two-byte tag id
    pub tag_position: u64,
}

/// One image directory.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Position in the chain
    pub index: usize,
    /// Byte offset of the directory
    pub offset: u64,
    /// Number of tag records
    pub entry_count: u16,
    /// Inferred role
    pub kind: DirectoryKind,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Tile width (0 if untiled)
    pub tile_width: u32,
    /// Tile height (0 if untiled)
    pub tile_height: u32,
    /// Compression code
    pub compression: u16,
    /// Photometric interpretation, if present
    pub photometric: Option<u16>,
    /// `NewSubfileType` bits
    pub subfile_type: u32,
    /// Free-text description
    pub description: Option<String>,
    /// Shared JPEG tables, if present
    pub jpeg_tables: Option<ByteRange>,
    /// Color-profile reference, if present
    pub profile: Option<ProfileRef>,
    /// Offset of the next directory (0 ends the chain)
    pub next_offset: u64,
    /// Tile runs in file order
    pub runs: Vec<TileRun>,
}

impl Directory {
    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.runs.iter().map(|r| r.tiles.len()).sum()
    }

    /// Returns true if the directory holds tiles.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.runs.iter().any(|r| !r.tiles.is_empty())
    }

    /// All tiles in index order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.runs.iter().flat_map(|r| r.tiles.iter())
    }

    /// Tiles across and down.
    pub fn tile_grid(&self) -> (u32, u32) {
        if self.tile_width == 0 || self.tile_height == 0 {
            return (0, 0);
        }
        (
            self.width.div_ceil(self.tile_width),
            self.height.div_ceil(self.tile_height),
        )
    }
}
