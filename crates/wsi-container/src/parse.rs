//! Directory-chain walker.
//!
//! Reads the header, then follows each directory's next-offset field until the
//! zero sentinel, collecting tile geometry, tile runs, shared JPEG tables and
//! the embedded color profile.

use std::collections::HashSet;

use tracing::{debug, trace, warn};
use wsi_core::{ByteStore, Error, Result};

use crate::directory::{
    group_runs, ByteRange, Directory, DirectoryKind, FieldSlot, ProfileRef, Tile,
};
use crate::tags::tag;
use crate::{Endian, FieldType};

const HEADER_LEN: u64 = 8;
const ENTRY_LEN: u64 = 12;
const CLASSIC_VERSION: u16 = 42;
const BIG_VERSION: u16 = 43;
/// Zero padding tolerated between records of one directory.
const MAX_PADDING: u64 = 4096;

/// Parsed container.
#[derive(Debug, Clone)]
pub struct Container {
    /// Byte order
    pub endian: Endian,
    /// Offset of the first directory
    pub first_offset: u64,
    /// Directories in chain order
    pub directories: Vec<Directory>,
    /// The captured color profile (first one found in chain order)
    pub profile: Option<ByteRange>,
}

impl Container {
    /// Parses every directory in the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for a bad header, BigTIFF, a chain that loops
    /// or leaves the file, and tile or profile tags with an unusable type.
    pub fn parse(store: &ByteStore) -> Result<Self> {
        trace!(bytes = store.len(), "Container::parse");

        if store.len() < HEADER_LEN {
            return Err(Error::format(format!(
                "{} bytes is too short for a container header",
                store.len()
            )));
        }
        let header = store.read(0, HEADER_LEN)?;
        let endian = Endian::from_mark([header[0], header[1]]).ok_or_else(|| {
            Error::format(format!(
                "bad byte-order mark {:02x}{:02x}",
                header[0], header[1]
            ))
        })?;
        match endian.read_u16(&header[2..4]) {
            CLASSIC_VERSION => {}
            BIG_VERSION => return Err(Error::format("BigTIFF containers are not supported")),
            other => return Err(Error::format(format!("unknown container version {}", other))),
        }
        let first_offset = endian.read_u32(&header[4..8]) as u64;

        let mut reader = Reader { store, endian };
        let mut directories = Vec::new();
        let mut visited = HashSet::new();
        let mut offset = first_offset;
        while offset != 0 {
            if !visited.insert(offset) {
                return Err(Error::format(format!(
                    "directory chain loops back to offset {}",
                    offset
                )));
            }
            let dir = reader.directory(directories.len(), offset)?;
            offset = dir.next_offset;
            directories.push(dir);
        }

        let profile = directories
            .iter()
            .find_map(|d| d.profile.map(|p| p.range));

        debug!(
            endian = ?endian,
            directories = directories.len(),
            profile_bytes = profile.map(|p| p.len()).unwrap_or(0),
            "Parsed container"
        );
        Ok(Self {
            endian,
            first_offset,
            directories,
            profile,
        })
    }

    /// Total tiles across all directories.
    pub fn tile_count(&self) -> usize {
        self.directories.iter().map(|d| d.tile_count()).sum()
    }

    /// Copies the captured profile out of the store.
    pub fn profile_bytes(&self, store: &ByteStore) -> Result<Option<Vec<u8>>> {
        self.profile
            .map(|range| store.read(range.start, range.end))
            .transpose()
    }

    /// Marks the captured profile as consumed.
    ///
    /// Every directory that references the captured profile has its record's
    /// tag id overwritten in place; the profile bytes themselves are left
    /// untouched. Returns the number of records patched.
    pub fn invalidate_profile(&self, store: &mut ByteStore) -> Result<usize> {
        let Some(captured) = self.profile else {
            return Ok(0);
        };
        let id = self.endian.u16_bytes(tag::ICC_PROFILE_INVALIDATED);
        let mut patched = 0;
        for dir in &self.directories {
            if let Some(profile) = dir.profile.filter(|p| p.range == captured) {
                store.write(profile.tag_position, profile.tag_position + 2, &id)?;
                debug!(directory = dir.index, position = profile.tag_position, "Invalidated profile tag");
                patched += 1;
            }
        }
        Ok(patched)
    }
}

/// One decoded tag record.
struct Record {
    tag: u16,
    field_type: Option<FieldType>,
    raw_type: u16,
    count: u64,
    /// Position of the record itself
    position: u64,
    /// Position of the data (inline field or out-of-line offset)
    data: u64,
}

struct Reader<'a> {
    store: &'a ByteStore,
    endian: Endian,
}

impl Reader<'_> {
    fn check(&self, start: u64, len: u64, what: &str) -> Result<()> {
        match start.checked_add(len) {
            Some(end) if end <= self.store.len() => Ok(()),
            _ => Err(Error::format(format!(
                "{} at {}+{} lies outside the {}-byte container",
                what,
                start,
                len,
                self.store.len()
            ))),
        }
    }

    fn directory(&mut self, index: usize, offset: u64) -> Result<Directory> {
        trace!(directory = index, offset, "parse directory");
        self.check(offset, 2, "directory")?;
        let entry_count = self.endian.read_u16(&self.store.read(offset, offset + 2)?);

        let mut dir = Directory {
            index,
            offset,
            entry_count,
            kind: DirectoryKind::Full,
            width: 0,
            height: 0,
            tile_width: 0,
            tile_height: 0,
            compression: 1,
            photometric: None,
            subfile_type: 0,
            description: None,
            jpeg_tables: None,
            profile: None,
            next_offset: 0,
            runs: Vec::new(),
        };
        let mut offsets: Option<Vec<(u64, FieldSlot)>> = None;
        let mut lengths: Option<Vec<(u64, FieldSlot)>> = None;

        let mut cursor = offset + 2;
        let mut padding = 0;
        let mut seen = 0;
        while seen < entry_count {
            self.check(cursor, ENTRY_LEN, "tag record")?;
            let raw = self.store.read(cursor, cursor + ENTRY_LEN)?;
            let tag_id = self.endian.read_u16(&raw[0..2]);
            let raw_type = self.endian.read_u16(&raw[2..4]);

            // Tag 0 is never assigned; treat it as a two-byte pad word.
            if tag_id == 0 {
                padding += 2;
                if padding > MAX_PADDING {
                    return Err(Error::format(format!(
                        "directory {} has more than {} bytes of padding between records",
                        index, MAX_PADDING
                    )));
                }
                cursor += 2;
                continue;
            }

            let field_type = FieldType::from_u16(raw_type);
            let count = self.endian.read_u32(&raw[4..8]) as u64;
            let data = match field_type {
                Some(ft) if !ft.fits_inline(count) => self.endian.read_u32(&raw[8..12]) as u64,
                _ => cursor + 8,
            };
            let record = Record {
                tag: tag_id,
                field_type,
                raw_type,
                count,
                position: cursor,
                data,
            };
            self.apply(&mut dir, &record, &mut offsets, &mut lengths)?;

            cursor += ENTRY_LEN;
            seen += 1;
        }
        if padding > 0 {
            warn!(directory = index, bytes = padding, "Skipped zero padding between tag records");
        }

        self.check(cursor, 4, "next-directory offset")?;
        dir.next_offset = self.endian.read_u32(&self.store.read(cursor, cursor + 4)?) as u64;

        dir.runs = match (offsets, lengths) {
            (Some(offsets), Some(lengths)) => {
                if offsets.len() != lengths.len() {
                    return Err(Error::format(format!(
                        "directory {} has {} tile offsets but {} tile lengths",
                        index,
                        offsets.len(),
                        lengths.len()
                    )));
                }
                let tiles = offsets
                    .into_iter()
                    .zip(lengths)
                    .enumerate()
                    .map(|(i, ((offset, offset_slot), (length, length_slot)))| Tile {
                        index: i,
                        offset,
                        length,
                        offset_slot,
                        length_slot,
                    })
                    .collect::<Vec<_>>();
                if let Some(t) = tiles.iter().find(|t| t.length > 0 && t.end() > self.store.len()) {
                    return Err(Error::format(format!(
                        "tile {} of directory {} ends at {}, past the container end",
                        t.index,
                        index,
                        t.end()
                    )));
                }
                group_runs(tiles)
            }
            (None, None) => Vec::new(),
            _ => {
                return Err(Error::format(format!(
                    "directory {} has only one of tile offsets and tile lengths",
                    index
                )));
            }
        };

        dir.kind = infer_kind(&dir);
        debug!(
            directory = index,
            kind = %dir.kind,
            width = dir.width,
            height = dir.height,
            tiles = dir.tile_count(),
            runs = dir.runs.len(),
            "Parsed directory"
        );
        Ok(dir)
    }

    fn apply(
        &self,
        dir: &mut Directory,
        rec: &Record,
        offsets: &mut Option<Vec<(u64, FieldSlot)>>,
        lengths: &mut Option<Vec<(u64, FieldSlot)>>,
    ) -> Result<()> {
        match rec.tag {
            tag::TILE_OFFSETS => *offsets = Some(self.uint_array(dir.index, rec)?),
            tag::TILE_BYTE_COUNTS => *lengths = Some(self.uint_array(dir.index, rec)?),
            tag::IMAGE_WIDTH => dir.width = self.scalar(dir.index, rec)?,
            tag::IMAGE_LENGTH => dir.height = self.scalar(dir.index, rec)?,
            tag::TILE_WIDTH => dir.tile_width = self.scalar(dir.index, rec)?,
            tag::TILE_LENGTH => dir.tile_height = self.scalar(dir.index, rec)?,
            tag::COMPRESSION => dir.compression = self.scalar(dir.index, rec)? as u16,
            tag::PHOTOMETRIC => dir.photometric = Some(self.scalar(dir.index, rec)? as u16),
            tag::NEW_SUBFILE_TYPE => dir.subfile_type = self.scalar(dir.index, rec)?,
            tag::IMAGE_DESCRIPTION => {
                let range = self.blob(dir.index, rec)?;
                let bytes = self.store.read(range.start, range.end)?;
                let text = String::from_utf8_lossy(&bytes);
                dir.description = Some(text.trim_end_matches('\0').to_string());
            }
            tag::JPEG_TABLES => dir.jpeg_tables = Some(self.blob(dir.index, rec)?),
            tag::ICC_PROFILE => {
                dir.profile = Some(ProfileRef {
                    range: self.blob(dir.index, rec)?,
                    tag_position: rec.position,
                });
            }
            _ => {
                if rec.field_type.is_none() {
                    trace!(directory = dir.index, tag = rec.tag, field_type = rec.raw_type, "skip unknown field type");
                }
            }
        }
        Ok(())
    }

    fn type_error(&self, directory: usize, rec: &Record, expected: &str) -> Error {
        Error::format(format!(
            "tag {} in directory {} has field type {}, expected {}",
            rec.tag, directory, rec.raw_type, expected
        ))
    }

    /// Short/Long array with the slot of each value.
    fn uint_array(&self, directory: usize, rec: &Record) -> Result<Vec<(u64, FieldSlot)>> {
        let field_type = rec
            .field_type
            .filter(|ft| ft.is_unsigned_int())
            .ok_or_else(|| self.type_error(directory, rec, "SHORT or LONG"))?;
        let width = field_type.size_in_bytes() as u64;
        self.check(rec.data, rec.count * width, "tile array")?;
        let bytes = self.store.read(rec.data, rec.data + rec.count * width)?;
        Ok(bytes
            .chunks_exact(width as usize)
            .enumerate()
            .map(|(i, b)| {
                let value = match field_type {
                    FieldType::Short => self.endian.read_u16(b) as u64,
                    _ => self.endian.read_u32(b) as u64,
                };
                let slot = FieldSlot {
                    position: rec.data + i as u64 * width,
                    field_type,
                };
                (value, slot)
            })
            .collect())
    }

    /// First value of a Short/Long tag.
    fn scalar(&self, directory: usize, rec: &Record) -> Result<u32> {
        let field_type = rec
            .field_type
            .filter(|ft| ft.is_unsigned_int())
            .ok_or_else(|| self.type_error(directory, rec, "SHORT or LONG"))?;
        if rec.count == 0 {
            return Err(Error::format(format!(
                "tag {} in directory {} has no values",
                rec.tag, directory
            )));
        }
        let width = field_type.size_in_bytes() as u64;
        self.check(rec.data, width, "tag value")?;
        let bytes = self.store.read(rec.data, rec.data + width)?;
        Ok(match field_type {
            FieldType::Short => self.endian.read_u16(&bytes) as u32,
            _ => self.endian.read_u32(&bytes),
        })
    }

    /// Byte range of a Byte/Ascii/Undefined tag.
    fn blob(&self, directory: usize, rec: &Record) -> Result<ByteRange> {
        match rec.field_type {
            Some(FieldType::Byte | FieldType::Ascii | FieldType::Undefined) => {}
            _ => return Err(self.type_error(directory, rec, "BYTE, ASCII or UNDEFINED")),
        }
        self.check(rec.data, rec.count, "tag data")?;
        Ok(ByteRange::new(rec.data, rec.count))
    }
}

fn infer_kind(dir: &Directory) -> DirectoryKind {
    let description = dir
        .description
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    if description.contains("macro") {
        DirectoryKind::Macro
    } else if description.contains("label") {
        DirectoryKind::Label
    } else if dir.subfile_type & 1 == 1 || dir.index > 0 {
        DirectoryKind::Reduced
    } else {
        DirectoryKind::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian container with a single directory of the given records,
    /// each `(tag, type, count, value)`.
    fn single_directory(records: &[(u16, u16, u32, u32)], tail: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&(records.len() as u16).to_le_bytes());
        for &(tag, ty, count, value) in records {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(tail);
        out
    }

    fn store(bytes: Vec<u8>) -> ByteStore {
        ByteStore::from_bytes(bytes, 16)
    }

    #[test]
    fn test_inline_tile_arrays() {
        // 2 records: 8 + 2 + 24 + 4 = 38; tiles live after that.
        let bytes = single_directory(
            &[
                (tag::TILE_OFFSETS, 4, 1, 38),
                (tag::TILE_BYTE_COUNTS, 3, 1, 6),
            ],
            b"tiledata",
        );
        let container = Container::parse(&store(bytes)).unwrap();
        let dir = &container.directories[0];
        assert_eq!(dir.kind, DirectoryKind::Full);
        assert_eq!(dir.runs.len(), 1);
        let tile = dir.runs[0].tiles[0];
        assert_eq!((tile.offset, tile.length), (38, 6));
        assert_eq!(tile.offset_slot.position, 8 + 2 + 8);
        assert_eq!(tile.length_slot.field_type, FieldType::Short);
    }

    #[test]
    fn test_bigtiff_rejected() {
        let mut bytes = single_directory(&[], &[]);
        bytes[2] = 43;
        assert!(Container::parse(&store(bytes)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_bad_mark() {
        let mut bytes = single_directory(&[], &[]);
        bytes[0] = b'X';
        assert!(Container::parse(&store(bytes)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_cycle_detected() {
        let mut bytes = single_directory(&[], &[]);
        // next-directory offset points back at the first directory
        let n = bytes.len();
        bytes[n - 4..].copy_from_slice(&8u32.to_le_bytes());
        let err = Container::parse(&store(bytes)).unwrap_err();
        assert!(err.to_string().contains("loops"));
    }

    #[test]
    fn test_tile_offsets_wrong_type() {
        let bytes = single_directory(
            &[
                (tag::TILE_OFFSETS, 2, 1, 0),
                (tag::TILE_BYTE_COUNTS, 4, 1, 0),
            ],
            &[],
        );
        assert!(Container::parse(&store(bytes)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_unknown_type_skipped() {
        let bytes = single_directory(&[(300, 99, 1000, 0xFFFF_FFFF), (tag::IMAGE_WIDTH, 3, 1, 640)], &[]);
        let container = Container::parse(&store(bytes)).unwrap();
        assert_eq!(container.directories[0].width, 640);
        assert!(!container.directories[0].is_tiled());
    }

    #[test]
    fn test_mismatched_tile_arrays() {
        let bytes = single_directory(&[(tag::TILE_OFFSETS, 4, 1, 0)], &[]);
        assert!(Container::parse(&store(bytes)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_kind_inference() {
        let mut container = Container::parse(&store(single_directory(&[], &[]))).unwrap();
        let mut dir = container.directories.remove(0);
        assert_eq!(infer_kind(&dir), DirectoryKind::Full);
        dir.subfile_type = 1;
        assert_eq!(infer_kind(&dir), DirectoryKind::Reduced);
        dir.description = Some("Aperio Image Library\r\nlabel 387x463".into());
        assert_eq!(infer_kind(&dir), DirectoryKind::Label);
        dir.description = Some("Macro image".into());
        assert_eq!(infer_kind(&dir), DirectoryKind::Macro);
    }
}
