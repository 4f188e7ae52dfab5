//! Chunked random-access byte store for multi-gigabyte containers.
//!
//! A whole-slide container is loaded once into an ordered sequence of fixed-size
//! chunks. Any byte range `[a, b)` maps to chunk `a / chunk_size` at offset
//! `a % chunk_size` and may span chunk boundaries. Chunks are never resized;
//! writes only ever overwrite bytes that already exist.
//!
//! # Example
//!
//! ```rust
//! use wsi_core::ByteStore;
//!
//! let mut store = ByteStore::from_bytes(b"abcdefgh".to_vec(), 3);
//! assert_eq!(store.read(2, 6).unwrap(), b"cdef");
//!
//! store.write(2, 4, b"XY").unwrap();
//! assert_eq!(store.read(0, 8).unwrap(), b"abXYefgh");
//! ```

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::{Error, Result};

/// Default chunk size (64 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Fixed-size chunked byte array covering `[0, len)`.
///
/// Reads take `&self` and may run concurrently; writes take `&mut self`, so a
/// single writer is enforced by the borrow checker (or by the lock that wraps
/// the store in the pipeline).
#[derive(Debug, Clone)]
pub struct ByteStore {
    chunks: Vec<Box<[u8]>>,
    chunk_size: usize,
    len: u64,
}

impl ByteStore {
    /// Opens a container with the default chunk size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    /// Opens a container, reading it fully into `chunk_size` byte chunks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or ends before its
    /// reported length.
    pub fn open_with_chunk_size<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        trace!(path = %path.display(), chunk_size, "ByteStore::open");

        let chunk_size = chunk_size.max(1);
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        let chunk_count = len.div_ceil(chunk_size as u64) as usize;
        let mut chunks = Vec::with_capacity(chunk_count);
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(chunk_size as u64) as usize;
            let mut chunk = vec![0u8; chunk_size].into_boxed_slice();
            file.read_exact(&mut chunk[..take])?;
            chunks.push(chunk);
            remaining -= take as u64;
        }

        debug!(path = %path.display(), bytes = len, chunks = chunks.len(), "Loaded container");
        Ok(Self {
            chunks,
            chunk_size,
            len,
        })
    }

    /// Builds a store from an in-memory buffer.
    pub fn from_bytes(data: Vec<u8>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let len = data.len() as u64;
        let chunks = data
            .chunks(chunk_size)
            .map(|part| {
                let mut chunk = vec![0u8; chunk_size].into_boxed_slice();
                chunk[..part.len()].copy_from_slice(part);
                chunk
            })
            .collect();
        Self {
            chunks,
            chunk_size,
            len,
        }
    }

    /// Logical length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the store holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunk size in bytes.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks backing the store.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Maps an absolute position to `(chunk index, offset in chunk)`.
    #[inline]
    fn locate(&self, pos: u64) -> (usize, usize) {
        let size = self.chunk_size as u64;
        ((pos / size) as usize, (pos % size) as usize)
    }

    fn check_range(&self, start: u64, end: u64) -> Result<()> {
        if start > end || end > self.len {
            return Err(Error::range(start, end, self.len));
        }
        Ok(())
    }

    /// Returns a copy of the bytes in `[start, end)`.
    pub fn read(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        self.check_range(start, end)?;
        let mut out = Vec::with_capacity((end - start) as usize);
        let mut pos = start;
        while pos < end {
            let (chunk, offset) = self.locate(pos);
            let take = ((end - pos) as usize).min(self.chunk_size - offset);
            out.extend_from_slice(&self.chunks[chunk][offset..offset + take]);
            pos += take as u64;
        }
        Ok(out)
    }

    /// Reads a single byte.
    pub fn read_byte(&self, index: u64) -> Result<u8> {
        self.check_byte(index)?;
        let (chunk, offset) = self.locate(index);
        Ok(self.chunks[chunk][offset])
    }

    /// Overwrites `[start, end)` with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] if the range lies outside the store or
    /// `bytes.len() != end - start`.
    pub fn write(&mut self, start: u64, end: u64, bytes: &[u8]) -> Result<()> {
        self.check_range(start, end)?;
        if bytes.len() as u64 != end - start {
            return Err(Error::range(start, start.saturating_add(bytes.len() as u64), self.len));
        }
        let mut pos = start;
        let mut src = bytes;
        while !src.is_empty() {
            let (chunk, offset) = self.locate(pos);
            let take = src.len().min(self.chunk_size - offset);
            self.chunks[chunk][offset..offset + take].copy_from_slice(&src[..take]);
            src = &src[take..];
            pos += take as u64;
        }
        Ok(())
    }

    /// Overwrites a single byte; used for small tag-field patches.
    pub fn write_byte(&mut self, index: u64, value: u8) -> Result<()> {
        self.check_byte(index)?;
        let (chunk, offset) = self.locate(index);
        self.chunks[chunk][offset] = value;
        Ok(())
    }

    fn check_byte(&self, index: u64) -> Result<()> {
        let end = index
            .checked_add(1)
            .ok_or_else(|| Error::range(index, u64::MAX, self.len))?;
        self.check_range(index, end)
    }

    /// Writes the logical byte sequence `[0, len)` to a new file at `path`.
    pub fn flush<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        trace!(path = %path.display(), bytes = self.len, "ByteStore::flush");

        let mut writer = BufWriter::new(File::create(path)?);
        let mut remaining = self.len;
        for chunk in &self.chunks {
            let take = remaining.min(self.chunk_size as u64) as usize;
            writer.write_all(&chunk[..take])?;
            remaining -= take as u64;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        debug!(path = %path.display(), bytes = self.len, "Flushed container");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_read_spans_chunks() {
        let data = sample(100);
        let store = ByteStore::from_bytes(data.clone(), 16);
        assert_eq!(store.chunk_count(), 7);
        assert_eq!(store.read(10, 50).unwrap(), &data[10..50]);
        assert_eq!(store.read(0, 100).unwrap(), data);
        assert!(store.read(40, 40).unwrap().is_empty());
    }

    #[test]
    fn test_read_out_of_range() {
        let store = ByteStore::from_bytes(sample(32), 8);
        assert!(store.read(0, 33).unwrap_err().is_range_error());
        assert!(store.read(20, 10).unwrap_err().is_range_error());
        assert!(store.read_byte(32).unwrap_err().is_range_error());
    }

    #[test]
    fn test_write_spans_chunks() {
        let mut data = sample(64);
        let mut store = ByteStore::from_bytes(data.clone(), 10);
        let patch = vec![0xAA; 25];
        store.write(7, 32, &patch).unwrap();
        data[7..32].copy_from_slice(&patch);
        assert_eq!(store.read(0, 64).unwrap(), data);
    }

    #[test]
    fn test_write_length_mismatch() {
        let mut store = ByteStore::from_bytes(sample(32), 8);
        assert!(store.write(0, 4, &[1, 2, 3]).unwrap_err().is_range_error());
        assert!(store.write(30, 34, &[1, 2, 3, 4]).unwrap_err().is_range_error());
        // Nothing was touched.
        assert_eq!(store.read(0, 32).unwrap(), sample(32));
    }

    #[test]
    fn test_write_byte() {
        let mut store = ByteStore::from_bytes(sample(20), 6);
        store.write_byte(13, 0xFE).unwrap();
        assert_eq!(store.read_byte(13).unwrap(), 0xFE);
        assert_eq!(store.read_byte(12).unwrap(), sample(20)[12]);
    }

    #[test]
    fn test_byte_access_at_u64_max() {
        let mut store = ByteStore::from_bytes(vec![1, 2, 3], 2);
        assert!(matches!(store.read_byte(u64::MAX), Err(Error::Range { .. })));
        assert!(matches!(store.write_byte(u64::MAX, 9), Err(Error::Range { .. })));
        assert!(matches!(store.read_byte(3), Err(Error::Range { .. })));
        assert_eq!(store.read_byte(2).unwrap(), 3);
    }

    #[test]
    fn test_open_and_flush_roundtrip() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.bin");
        let data = sample(1000);
        std::fs::write(&input, &data).unwrap();

        let mut store = ByteStore::open_with_chunk_size(&input, 64).unwrap();
        assert_eq!(store.len(), 1000);
        // Last chunk is padded in memory but not on disk.
        assert_eq!(store.chunk_count(), 16);

        store.write(500, 503, b"xyz").unwrap();
        store.flush(&output).unwrap();

        let written = std::fs::read(&output).unwrap();
        assert_eq!(written.len(), 1000);
        assert_eq!(&written[500..503], b"xyz");
        assert_eq!(&written[..500], &data[..500]);
        assert_eq!(&written[503..], &data[503..]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = ByteStore::open(dir.path().join("missing.svs")).unwrap_err();
        assert!(err.is_io_error());
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.bin");
        std::fs::write(&input, b"").unwrap();
        let store = ByteStore::open_with_chunk_size(&input, 8).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.chunk_count(), 0);
        assert!(store.read(0, 0).unwrap().is_empty());
    }
}
