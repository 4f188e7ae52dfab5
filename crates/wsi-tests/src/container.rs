//! Classic TIFF container builder.

/// One directory to be written.
#[derive(Debug, Clone)]
pub struct DirectorySpec {
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Tile width
    pub tile_width: u32,
    /// Tile height
    pub tile_height: u32,
    /// Compressed tiles in index order
    pub tiles: Vec<Vec<u8>>,
    /// Compression code
    pub compression: u16,
    /// Photometric interpretation
    pub photometric: u16,
    /// `NewSubfileType`
    pub subfile_type: u32,
    /// `ImageDescription`
    pub description: Option<String>,
    /// `JPEGTables`
    pub jpeg_tables: Option<Vec<u8>>,
    /// Embedded ICC profile
    pub icc_profile: Option<Vec<u8>>,
    /// Tile indices preceded by filler bytes, each starting a new run
    pub gap_before: Vec<usize>,
    /// Write tile lengths as SHORT instead of LONG
    pub short_lengths: bool,
    /// Insert two zero bytes after the first tag record
    pub record_padding: bool,
}

impl DirectorySpec {
    /// Tiled JPEG directory with `tiles` laid out back to back.
    pub fn tiled(width: u32, height: u32, tile_width: u32, tile_height: u32, tiles: Vec<Vec<u8>>) -> Self {
        Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles,
            compression: 7,
            photometric: 6,
            subfile_type: 0,
            description: None,
            jpeg_tables: None,
            icc_profile: None,
            gap_before: Vec::new(),
            short_lengths: false,
            record_padding: false,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Sets shared JPEG tables and RGB photometric, as shared-table scanners do.
    pub fn with_jpeg_tables(mut self, tables: Vec<u8>) -> Self {
        self.jpeg_tables = Some(tables);
        self.photometric = 2;
        self
    }

    /// Embeds an ICC profile.
    pub fn with_profile(mut self, profile: Vec<u8>) -> Self {
        self.icc_profile = Some(profile);
        self
    }

    /// Starts a new run at tile `index`.
    pub fn with_gap_before(mut self, index: usize) -> Self {
        self.gap_before.push(index);
        self
    }

    /// Sets `NewSubfileType`.
    pub fn with_subfile_type(mut self, bits: u32) -> Self {
        self.subfile_type = bits;
        self
    }

    /// Sets the compression code.
    pub fn with_compression(mut self, code: u16) -> Self {
        self.compression = code;
        self
    }

    /// Writes tile lengths as SHORT.
    pub fn with_short_lengths(mut self) -> Self {
        self.short_lengths = true;
        self
    }

    /// Pads between the first two tag records.
    pub fn with_record_padding(mut self) -> Self {
        self.record_padding = true;
        self
    }
}

/// Builds a classic (32-bit offset) container in memory.
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    big_endian: bool,
    directories: Vec<DirectorySpec>,
}

const SHORT: u16 = 3;
const LONG: u16 = 4;
const ASCII: u16 = 2;
const UNDEFINED: u16 = 7;
const FILLER: u8 = 0xAA;

impl ContainerBuilder {
    /// Little-endian container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Big-endian container.
    pub fn big_endian() -> Self {
        Self {
            big_endian: true,
            directories: Vec::new(),
        }
    }

    /// Appends a directory to the chain.
    pub fn directory(mut self, dir: DirectorySpec) -> Self {
        self.directories.push(dir);
        self
    }

    fn u16b(&self, v: u16) -> [u8; 2] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn u32b(&self, v: u32) -> [u8; 4] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    /// Serializes the container.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        out.extend_from_slice(&self.u16b(42));
        // First-directory offset, patched below
        out.extend_from_slice(&[0; 4]);
        let mut next_pointer = 4usize;

        for dir in &self.directories {
            // Tile data
            let mut offsets = Vec::with_capacity(dir.tiles.len());
            for (i, tile) in dir.tiles.iter().enumerate() {
                if dir.gap_before.contains(&i) {
                    out.extend_from_slice(&[FILLER; 16]);
                }
                offsets.push(out.len() as u32);
                out.extend_from_slice(tile);
            }

            // Records: (tag, type, count, data)
            let mut records: Vec<(u16, u16, u32, Vec<u8>)> = Vec::new();
            records.push((254, LONG, 1, self.u32b(dir.subfile_type).to_vec()));
            records.push((256, LONG, 1, self.u32b(dir.width).to_vec()));
            records.push((257, LONG, 1, self.u32b(dir.height).to_vec()));
            records.push((259, SHORT, 1, self.u16b(dir.compression).to_vec()));
            records.push((262, SHORT, 1, self.u16b(dir.photometric).to_vec()));
            if let Some(text) = &dir.description {
                let mut data = text.as_bytes().to_vec();
                data.push(0);
                records.push((270, ASCII, data.len() as u32, data));
            }
            if !dir.tiles.is_empty() {
                records.push((322, LONG, 1, self.u32b(dir.tile_width).to_vec()));
                records.push((323, LONG, 1, self.u32b(dir.tile_height).to_vec()));
                let data = offsets.iter().flat_map(|&o| self.u32b(o)).collect();
                records.push((324, LONG, offsets.len() as u32, data));
                let (ty, data) = if dir.short_lengths {
                    let data = dir.tiles.iter().flat_map(|t| self.u16b(t.len() as u16)).collect();
                    (SHORT, data)
                } else {
                    let data = dir.tiles.iter().flat_map(|t| self.u32b(t.len() as u32)).collect();
                    (LONG, data)
                };
                records.push((325, ty, dir.tiles.len() as u32, data));
            }
            if let Some(tables) = &dir.jpeg_tables {
                records.push((347, UNDEFINED, tables.len() as u32, tables.clone()));
            }
            if let Some(profile) = &dir.icc_profile {
                records.push((34675, UNDEFINED, profile.len() as u32, profile.clone()));
            }

            // Out-of-line data
            let mut value_fields = Vec::with_capacity(records.len());
            for (_, _, _, data) in &records {
                if data.len() <= 4 {
                    let mut field = [0u8; 4];
                    field[..data.len()].copy_from_slice(data);
                    value_fields.push(field);
                } else {
                    if out.len() % 2 == 1 {
                        out.push(0);
                    }
                    value_fields.push(self.u32b(out.len() as u32));
                    out.extend_from_slice(data);
                }
            }

            // Directory
            if out.len() % 2 == 1 {
                out.push(0);
            }
            let ifd = out.len() as u32;
            let pointer = self.u32b(ifd);
            out[next_pointer..next_pointer + 4].copy_from_slice(&pointer);

            out.extend_from_slice(&self.u16b(records.len() as u16));
            for (i, ((tag, ty, count, _), field)) in records.iter().zip(&value_fields).enumerate() {
                out.extend_from_slice(&self.u16b(*tag));
                out.extend_from_slice(&self.u16b(*ty));
                out.extend_from_slice(&self.u32b(*count));
                out.extend_from_slice(field);
                if i == 0 && dir.record_padding {
                    out.extend_from_slice(&[0, 0]);
                }
            }
            next_pointer = out.len();
            out.extend_from_slice(&[0; 4]);
        }
        out
    }
}
