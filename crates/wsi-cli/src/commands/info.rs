//! Container info command.
//!
//! Prints the directory chain, tile geometry, tile runs and the embedded
//! profile location without modifying anything.

use anyhow::Result;

use crate::InfoArgs;
use wsi_core::DEFAULT_CHUNK_SIZE;

/// Runs the info command.
pub fn run(args: InfoArgs) -> Result<()> {
    for (i, path) in args.input.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let (store, container) = super::open_container(path, DEFAULT_CHUNK_SIZE)?;

        println!("{}", path.display());
        println!("  File size:   {}", super::format_size(store.len()));
        println!("  Byte order:  {:?}", container.endian);
        println!("  Directories: {}", container.directories.len());
        println!("  Tiles:       {}", container.tile_count());
        match &container.profile {
            Some(range) => println!(
                "  Profile:     {} at [{}, {})",
                super::format_size(range.len()),
                range.start,
                range.end
            ),
            None => println!("  Profile:     none"),
        }

        for dir in &container.directories {
            println!(
                "  [{}] {:<8} {}x{} @ {}",
                dir.index, dir.kind, dir.width, dir.height, dir.offset
            );
            if dir.is_tiled() {
                let (across, down) = dir.tile_grid();
                let bytes: u64 = dir.runs.iter().map(|r| r.length).sum();
                println!(
                    "      tiles {}x{} px, grid {}x{}, {} tiles in {} run(s), {}",
                    dir.tile_width,
                    dir.tile_height,
                    across,
                    down,
                    dir.tile_count(),
                    dir.runs.len(),
                    super::format_size(bytes)
                );
                println!(
                    "      compression {}{}",
                    dir.compression,
                    if dir.jpeg_tables.is_some() { ", shared JPEGTables" } else { "" }
                );
                if args.runs {
                    for run in &dir.runs {
                        println!(
                            "      run {:>3}: [{}, {}) {} tile(s)",
                            run.index,
                            run.start,
                            run.start + run.length,
                            run.tiles.len()
                        );
                    }
                }
            }
            if let Some(text) = &dir.description {
                let first = text.lines().next().unwrap_or_default();
                println!("      {}", first);
            }
        }
    }
    Ok(())
}
