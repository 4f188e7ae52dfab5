//! CLI command implementations

pub mod info;
pub mod recolor;

use anyhow::{Context, Result};
use std::path::Path;
use wsi_container::Container;
use wsi_core::ByteStore;

/// Loads a container and parses its directory chain.
pub fn open_container(path: &Path, chunk_size: usize) -> Result<(ByteStore, Container)> {
    let store = ByteStore::open_with_chunk_size(path, chunk_size)
        .with_context(|| format!("Failed to load: {}", path.display()))?;
    let container = Container::parse(&store)
        .with_context(|| format!("Failed to parse: {}", path.display()))?;
    Ok((store, container))
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
