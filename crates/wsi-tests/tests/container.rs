//! Directory-chain parsing against builder-generated containers.

use wsi_container::{tag, Container, DirectoryKind, Endian, FieldType};
use wsi_core::ByteStore;
use wsi_tests::{icc, ContainerBuilder, DirectorySpec};

fn fake_tiles(sizes: &[usize]) -> Vec<Vec<u8>> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, &n)| vec![i as u8 + 1; n])
        .collect()
}

fn parse(bytes: Vec<u8>) -> (ByteStore, Container) {
    let store = ByteStore::from_bytes(bytes, 128);
    let container = Container::parse(&store).unwrap();
    (store, container)
}

#[test]
fn little_and_big_endian_agree() {
    let spec = DirectorySpec::tiled(512, 256, 256, 256, fake_tiles(&[100, 200]))
        .with_description("Aperio Image Library");
    let (le_store, le) = parse(ContainerBuilder::new().directory(spec.clone()).build());
    let (be_store, be) = parse(ContainerBuilder::big_endian().directory(spec).build());

    assert_eq!(le.endian, Endian::Little);
    assert_eq!(be.endian, Endian::Big);
    for (store, c) in [(&le_store, &le), (&be_store, &be)] {
        let dir = &c.directories[0];
        assert_eq!((dir.width, dir.height), (512, 256));
        assert_eq!((dir.tile_width, dir.tile_height), (256, 256));
        assert_eq!(dir.compression, 7);
        assert_eq!(dir.description.as_deref(), Some("Aperio Image Library"));
        assert_eq!(dir.tile_grid(), (2, 1));
        let tiles: Vec<_> = dir.tiles().collect();
        assert_eq!(tiles.len(), 2);
        assert_eq!(store.read(tiles[1].offset, tiles[1].end()).unwrap(), vec![2; 200]);
    }
}

#[test]
fn gaps_split_runs() {
    let spec = DirectorySpec::tiled(1024, 256, 256, 256, fake_tiles(&[10, 20, 30, 40]))
        .with_gap_before(2);
    let (_, c) = parse(ContainerBuilder::new().directory(spec).build());
    let runs = &c.directories[0].runs;
    assert_eq!(runs.len(), 2);
    assert_eq!((runs[0].length, runs[0].tiles.len()), (30, 2));
    assert_eq!((runs[1].length, runs[1].tiles.len()), (70, 2));
    assert_eq!(runs[1].start, runs[0].start + 30 + 16);
    assert_eq!(runs[1].index, 1);
}

#[test]
fn short_length_fields() {
    let spec = DirectorySpec::tiled(512, 256, 256, 256, fake_tiles(&[300, 400])).with_short_lengths();
    let (store, c) = parse(ContainerBuilder::big_endian().directory(spec).build());
    for tile in c.directories[0].tiles() {
        assert_eq!(tile.length_slot.field_type, FieldType::Short);
        assert_eq!(tile.offset_slot.field_type, FieldType::Long);
        let raw = store
            .read(tile.length_slot.position, tile.length_slot.position + 2)
            .unwrap();
        assert_eq!(Endian::Big.read_u16(&raw) as u64, tile.length);
    }
}

#[test]
fn padded_records_are_skipped() {
    let spec = DirectorySpec::tiled(256, 256, 256, 256, fake_tiles(&[64]))
        .with_description("padded")
        .with_record_padding();
    let (_, c) = parse(ContainerBuilder::new().directory(spec).build());
    let dir = &c.directories[0];
    assert_eq!(dir.description.as_deref(), Some("padded"));
    assert_eq!(dir.tile_count(), 1);
    assert_eq!(dir.runs[0].length, 64);
}

#[test]
fn kinds_follow_descriptions_and_position() {
    let tile = || fake_tiles(&[16]);
    let bytes = ContainerBuilder::new()
        .directory(DirectorySpec::tiled(256, 256, 256, 256, tile()))
        .directory(DirectorySpec::tiled(128, 128, 256, 256, tile()))
        .directory(DirectorySpec::tiled(256, 256, 256, 256, tile()).with_description("label 512x512"))
        .directory(DirectorySpec::tiled(256, 256, 256, 256, tile()).with_description("macro 1280x431"))
        .build();
    let (_, c) = parse(bytes);
    let kinds: Vec<_> = c.directories.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DirectoryKind::Full,
            DirectoryKind::Reduced,
            DirectoryKind::Label,
            DirectoryKind::Macro
        ]
    );
    assert_eq!(c.tile_count(), 4);
}

#[test]
fn first_directory_with_subfile_bit_is_reduced() {
    let spec = DirectorySpec::tiled(256, 256, 256, 256, fake_tiles(&[8])).with_subfile_type(1);
    let (_, c) = parse(ContainerBuilder::new().directory(spec).build());
    assert_eq!(c.directories[0].kind, DirectoryKind::Reduced);
}

#[test]
fn jpeg_tables_range() {
    let tables = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x02, 0xFF, 0xD9];
    let spec = DirectorySpec::tiled(256, 256, 256, 256, fake_tiles(&[8])).with_jpeg_tables(tables.clone());
    let (store, c) = parse(ContainerBuilder::new().directory(spec).build());
    let dir = &c.directories[0];
    let range = dir.jpeg_tables.unwrap();
    assert_eq!(store.read(range.start, range.end).unwrap(), tables);
    assert_eq!(dir.photometric, Some(2));
}

#[test]
fn profile_capture_and_invalidation() {
    let profile = icc::reference_profile(3);
    let bytes = ContainerBuilder::big_endian()
        .directory(DirectorySpec::tiled(256, 256, 256, 256, fake_tiles(&[8])).with_profile(profile.clone()))
        .directory(DirectorySpec::tiled(128, 128, 256, 256, fake_tiles(&[8])))
        .build();
    let (mut store, c) = parse(bytes.clone());
    assert_eq!(c.profile_bytes(&store).unwrap(), Some(profile));

    let tag_position = c.directories[0].profile.unwrap().tag_position;
    assert_eq!(c.invalidate_profile(&mut store).unwrap(), 1);
    let id = store.read(tag_position, tag_position + 2).unwrap();
    assert_eq!(Endian::Big.read_u16(&id), tag::ICC_PROFILE_INVALIDATED);

    // The invalidated record is ignored on a second parse.
    let again = Container::parse(&store).unwrap();
    assert!(again.profile.is_none());
    assert_eq!(again.invalidate_profile(&mut store).unwrap(), 0);
    assert_eq!(again.directories.len(), 2);
}

#[test]
fn non_tiled_directory_has_no_runs() {
    let spec = DirectorySpec::tiled(64, 64, 0, 0, Vec::new()).with_description("macro");
    let (_, c) = parse(ContainerBuilder::new().directory(spec).build());
    let dir = &c.directories[0];
    assert!(!dir.is_tiled());
    assert!(dir.runs.is_empty());
}

#[test]
fn truncated_container_is_format_error() {
    let mut bytes = ContainerBuilder::new()
        .directory(DirectorySpec::tiled(256, 256, 256, 256, fake_tiles(&[8])))
        .build();
    bytes.truncate(bytes.len() - 10);
    let store = ByteStore::from_bytes(bytes, 64);
    assert!(Container::parse(&store).unwrap_err().is_format_error());
}
