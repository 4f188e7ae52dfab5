//! Run writer: packs staged tiles back into their run and patches the
//! offset/length fields.
//!
//! Every tile of a run is placed back to back from the run's start, so the
//! run never grows and no gaps appear between tiles. Bytes after the last
//! tile, up to the run's original end, are left as they were.

use tracing::{debug, trace};
use wsi_container::{Endian, FieldSlot, FieldType, TileRun};
use wsi_core::{ByteStore, Error, Result};

/// Final position of one rewritten tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Tile index within the directory
    pub tile: usize,
    /// New absolute offset
    pub offset: u64,
    /// New length
    pub length: u64,
}

/// Computes placements for a run.
///
/// # Errors
///
/// Returns [`Error::Capacity`] if the staged lengths sum to more than the
/// run's byte budget.
pub fn plan_run(directory: usize, run: &TileRun, lengths: &[u64]) -> Result<Vec<Placement>> {
    let required: u64 = lengths.iter().sum();
    if required > run.length {
        return Err(Error::capacity(directory, run.index, run.length, required));
    }
    let mut cursor = run.start;
    Ok(run
        .tiles
        .iter()
        .zip(lengths)
        .map(|(tile, &length)| {
            let placement = Placement {
                tile: tile.index,
                offset: cursor,
                length,
            };
            cursor += length;
            placement
        })
        .collect())
}

/// Writes a run's staged tiles and patches their offset/length fields.
///
/// `staged` holds one buffer per tile, in the run's tile order.
pub fn write_run(
    store: &mut ByteStore,
    endian: Endian,
    directory: usize,
    run: &TileRun,
    staged: &[Vec<u8>],
) -> Result<Vec<Placement>> {
    trace!(directory, run = run.index, tiles = staged.len(), "write_run");
    if staged.len() != run.tiles.len() {
        return Err(Error::format(format!(
            "run {} of directory {} has {} tiles but {} were staged",
            run.index,
            directory,
            run.tiles.len(),
            staged.len()
        )));
    }

    let lengths: Vec<u64> = staged.iter().map(|b| b.len() as u64).collect();
    let plan = plan_run(directory, run, &lengths)?;

    for ((tile, placement), bytes) in run.tiles.iter().zip(&plan).zip(staged) {
        patch_field(store, endian, tile.offset_slot, placement.offset)?;
        patch_field(store, endian, tile.length_slot, placement.length)?;
        store.write(placement.offset, placement.offset + placement.length, bytes)?;
    }

    let used: u64 = lengths.iter().sum();
    debug!(
        directory,
        run = run.index,
        tiles = plan.len(),
        bytes = used,
        slack = run.length - used,
        "Wrote tile run"
    );
    Ok(plan)
}

/// Overwrites one `Short` or `Long` field value in place.
pub fn patch_field(store: &mut ByteStore, endian: Endian, slot: FieldSlot, value: u64) -> Result<()> {
    if value > slot.max_value() {
        return Err(Error::format(format!(
            "value {} does not fit the {:?} field at byte {}",
            value, slot.field_type, slot.position
        )));
    }
    match slot.field_type {
        FieldType::Short => {
            store.write(slot.position, slot.position + 2, &endian.u16_bytes(value as u16))
        }
        _ => store.write(slot.position, slot.position + 4, &endian.u32_bytes(value as u32)),
    }
}
