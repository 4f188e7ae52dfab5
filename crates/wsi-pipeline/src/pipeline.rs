//! Tile recoloring coordinator.
//!
//! One directory is processed at a time. Within a directory:
//!
//! ```text
//! workers (N)            claim tiles through a shared counter
//!   │  SelfContained:    read -> decode -> LUT -> encode -> stage
//!   │  SharedTables:     read -> inject marker -> ordered send ─┐
//!   │                                                           ▼
//!   │                    consumer (1): merge tables -> decode -> LUT -> encode -> stage
//!   ▼
//! writer (1, caller's thread): per run, wait for all tiles -> check budget
//!                              -> patch offset/length fields -> write bytes
//! ```
//!
//! A claim covers one recolored tile followed by `skip` tiles copied
//! verbatim. Any failure aborts the directory: every blocked task wakes,
//! and the first real error is returned.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, trace};
use wsi_container::{is_jpeg_compression, Container, Directory, Tile};
use wsi_core::{ByteStore, Error, Result};
use wsi_lut::{DenseLut, LazyCorrection};

use crate::options::{RecolorOptions, StrategyKind};
use crate::progress::Progress;
use crate::staging::StagingArea;
use crate::strategy::{RecolorStrategy, SharedTables, Strategy};
use crate::writer::write_run;

type SharedStore<'s> = RwLock<&'s mut ByteStore>;

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecolorReport {
    /// Directories rewritten
    pub directories: usize,
    /// Tiles written back
    pub tiles: usize,
    /// Tiles decoded, corrected and re-encoded
    pub recolored: usize,
    /// Tiles copied verbatim
    pub copied: usize,
    /// Tile bytes before rewriting
    pub bytes_before: u64,
    /// Tile bytes after rewriting
    pub bytes_after: u64,
}

/// Rewrites every tiled directory of a parsed container.
///
/// # Example
///
/// ```rust,ignore
/// use wsi_pipeline::{Recolorer, RecolorOptions};
///
/// let container = Container::parse(&store)?;
/// let correction = LazyCorrection::from_profile(profile);
/// let report = Recolorer::new(&container, &correction, RecolorOptions::default())
///     .run(&mut store)?;
/// ```
#[derive(Debug)]
pub struct Recolorer<'a> {
    container: &'a Container,
    correction: &'a LazyCorrection,
    options: RecolorOptions,
    progress: Arc<Progress>,
}

impl<'a> Recolorer<'a> {
    /// Creates a coordinator. Options are normalized.
    pub fn new(
        container: &'a Container,
        correction: &'a LazyCorrection,
        options: RecolorOptions,
    ) -> Self {
        Self {
            container,
            correction,
            options: options.normalized(),
            progress: Arc::new(Progress::new()),
        }
    }

    /// Uses externally owned counters, e.g. shared with a reporter thread.
    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Counters updated while running.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Effective options.
    pub fn options(&self) -> &RecolorOptions {
        &self.options
    }

    /// Resolves the strategy of every tiled directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for non-JPEG tiles, or when shared tables
    /// are requested for a directory without `JPEGTables`.
    pub fn plan(&self) -> Result<Vec<(&'a Directory, Strategy)>> {
        let container: &'a Container = self.container;
        container
            .directories
            .iter()
            .filter(|dir| dir.is_tiled())
            .map(|dir| {
                if !is_jpeg_compression(dir.compression) {
                    return Err(Error::format(format!(
                        "directory {} uses compression {}; only JPEG tiles can be recolored",
                        dir.index, dir.compression
                    )));
                }
                let strategy = Strategy::for_directory(&self.options, dir);
                if strategy.kind() == StrategyKind::SharedTables && dir.jpeg_tables.is_none() {
                    return Err(Error::format(format!(
                        "directory {} has no JPEGTables; shared-tables strategy is not applicable",
                        dir.index
                    )));
                }
                Ok((dir, strategy))
            })
            .collect()
    }

    /// Rewrites all tiled directories in place.
    ///
    /// On error the store may be partially rewritten and must be discarded.
    pub fn run(&self, store: &mut ByteStore) -> Result<RecolorReport> {
        trace!(
            workers = self.options.workers,
            quality = self.options.quality,
            skip = self.options.skip,
            "Recolorer::run"
        );
        let started = Instant::now();
        let plan = self.plan()?;

        let total: usize = plan.iter().map(|(dir, _)| dir.tile_count()).sum();
        self.progress.set_total(total);
        if total == 0 {
            info!("No tiled directories to recolor");
            return Ok(RecolorReport::default());
        }

        // Barrier: the table is complete before any tile is touched.
        let lut = self.correction.get()?;
        let identity = lut.is_identity();
        if identity {
            info!("Correction table is the identity; tiles will be copied verbatim");
        }

        let mut report = RecolorReport::default();
        for (dir, strategy) in plan {
            let written = self.run_directory(store, dir, strategy, &lut, identity)?;
            report.directories += 1;
            report.tiles += dir.tile_count();
            report.bytes_before += dir.runs.iter().map(|r| r.length).sum::<u64>();
            report.bytes_after += written;
        }

        let snapshot = self.progress.snapshot();
        report.recolored = snapshot.recolored;
        report.copied = snapshot.copied;
        info!(
            directories = report.directories,
            tiles = report.tiles,
            recolored = report.recolored,
            copied = report.copied,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recolored container"
        );
        Ok(report)
    }

    fn run_directory(
        &self,
        store: &mut ByteStore,
        dir: &Directory,
        mut strategy: Strategy,
        lut: &DenseLut,
        identity: bool,
    ) -> Result<u64> {
        info!(
            directory = dir.index,
            kind = %dir.kind,
            tiles = dir.tile_count(),
            runs = dir.runs.len(),
            strategy = %strategy.kind(),
            "Recoloring directory"
        );
        strategy.per_directory_setup(store, dir)?;

        let job = DirectoryJob::new(dir, self.options.skip, identity);
        let store: SharedStore<'_> = RwLock::new(store);
        let mut written = 0;

        thread::scope(|s| {
            match &strategy {
                Strategy::SelfContained(_) => {
                    for _ in 0..self.options.workers {
                        let mut worker = strategy.clone();
                        let (job, store) = (&job, &store);
                        s.spawn(move || {
                            if let Err(err) = self.produce(job, store, &mut worker, lut) {
                                job.fail(err);
                            }
                        });
                    }
                }
                Strategy::SharedTables(_) => {
                    let (tx, rx) = sync_channel::<Item>(self.options.channel_capacity);
                    for _ in 0..self.options.workers {
                        let tx = tx.clone();
                        let (job, store) = (&job, &store);
                        s.spawn(move || {
                            if let Err(err) = self.feed(job, store, tx) {
                                job.fail(err);
                            }
                        });
                    }
                    drop(tx);
                    let mut consumer = strategy.clone();
                    let job = &job;
                    s.spawn(move || {
                        if let Err(err) = self.consume(job, &mut consumer, lut, rx) {
                            job.fail(err);
                        }
                    });
                }
            }

            match self.drain(&job, &store) {
                Ok(bytes) => written = bytes,
                Err(err) => job.fail(err),
            }
        });

        if let Some(err) = job.take_failure() {
            return Err(err);
        }
        debug!(directory = dir.index, bytes = written, "Directory done");
        Ok(written)
    }

    /// Worker loop of the self-contained strategy.
    fn produce(
        &self,
        job: &DirectoryJob<'_>,
        store: &SharedStore<'_>,
        strategy: &mut Strategy,
        lut: &DenseLut,
    ) -> Result<()> {
        let dir = job.directory.index;
        while let Some(claim) = job.claim() {
            for pos in claim.clone() {
                if job.is_aborted() {
                    return Ok(());
                }
                let tile = job.tiles[pos];
                let bytes = read_tile(store, tile)?;
                if job.recolors(pos, &claim) {
                    let out =
                        strategy.recolor_tile(dir, tile.index, &bytes, lut, self.options.annotate)?;
                    trace!(
                        directory = dir,
                        tile = tile.index,
                        before = bytes.len(),
                        after = out.len(),
                        "Recolored tile"
                    );
                    job.staging.stage(tile.index, out);
                    self.progress.add_recolored();
                } else {
                    job.staging.stage(tile.index, bytes);
                    self.progress.add_copied();
                }
            }
        }
        Ok(())
    }

    /// Producer loop of the shared-tables strategy: reads and marks tiles in
    /// parallel, then hands each claim to the consumer in index order.
    fn feed(
        &self,
        job: &DirectoryJob<'_>,
        store: &SharedStore<'_>,
        tx: SyncSender<Item>,
    ) -> Result<()> {
        let dir = job.directory.index;
        while let Some(claim) = job.claim() {
            let mut items = Vec::with_capacity(claim.len());
            for pos in claim.clone() {
                let tile = job.tiles[pos];
                let bytes = read_tile(store, tile)?;
                items.push(if job.recolors(pos, &claim) {
                    Item::Recolor(tile.index, SharedTables::prepare(dir, tile.index, &bytes)?)
                } else {
                    Item::Copy(tile.index, bytes)
                });
            }

            job.turnstile.wait_for(claim.start)?;
            for item in items {
                if tx.send(item).is_err() {
                    // Consumer is gone; its error is already recorded.
                    return Ok(());
                }
            }
            job.turnstile.advance(claim.end);
        }
        Ok(())
    }

    /// Single consumer of the shared-tables strategy.
    fn consume(
        &self,
        job: &DirectoryJob<'_>,
        strategy: &mut Strategy,
        lut: &DenseLut,
        rx: Receiver<Item>,
    ) -> Result<()> {
        let dir = job.directory.index;
        for item in rx {
            if job.is_aborted() {
                break;
            }
            match item {
                Item::Recolor(tile, bytes) => {
                    let out =
                        strategy.recolor_tile(dir, tile, &bytes, lut, self.options.annotate)?;
                    trace!(directory = dir, tile, after = out.len(), "Recolored tile");
                    job.staging.stage(tile, out);
                    self.progress.add_recolored();
                }
                Item::Copy(tile, bytes) => {
                    job.staging.stage(tile, bytes);
                    self.progress.add_copied();
                }
            }
        }
        Ok(())
    }

    /// Single writer: drains runs in order and patches the store.
    fn drain(&self, job: &DirectoryJob<'_>, store: &SharedStore<'_>) -> Result<u64> {
        let dir = job.directory;
        let mut written = 0;
        for run in &dir.runs {
            let indices: Vec<usize> = run.tiles.iter().map(|t| t.index).collect();
            let staged = job.staging.take_all(&indices)?;
            let mut guard = store.write().unwrap_or_else(PoisonError::into_inner);
            let plan = write_run(&mut **guard, self.container.endian, dir.index, run, &staged)?;
            written += plan.iter().map(|p| p.length).sum::<u64>();
            self.progress.add_completed(indices.len());
        }
        Ok(written)
    }
}

fn read_tile(store: &SharedStore<'_>, tile: &Tile) -> Result<Vec<u8>> {
    let guard = store.read().unwrap_or_else(PoisonError::into_inner);
    guard.read(tile.offset, tile.end())
}

/// Unit of work sent to the shared-tables consumer.
#[derive(Debug)]
enum Item {
    Recolor(usize, Vec<u8>),
    Copy(usize, Vec<u8>),
}

/// Coordinator state for one directory.
struct DirectoryJob<'d> {
    directory: &'d Directory,
    tiles: Vec<&'d Tile>,
    next: AtomicUsize,
    stride: usize,
    identity: bool,
    staging: StagingArea,
    turnstile: Turnstile,
    failure: Mutex<Option<Error>>,
}

impl<'d> DirectoryJob<'d> {
    fn new(directory: &'d Directory, skip: usize, identity: bool) -> Self {
        let mut tiles: Vec<&Tile> = directory.tiles().collect();
        tiles.sort_by_key(|t| t.index);
        // A claim never spans more than the directory, so the cursor cannot wrap
        let stride = skip.saturating_add(1).min(tiles.len().max(1));
        Self {
            directory,
            tiles,
            next: AtomicUsize::new(0),
            stride,
            identity,
            staging: StagingArea::new(),
            turnstile: Turnstile::default(),
            failure: Mutex::new(None),
        }
    }

    /// Claims the next group of tile positions, or `None` when exhausted.
    fn claim(&self) -> Option<Range<usize>> {
        if self.is_aborted() {
            return None;
        }
        let start = self.next.fetch_add(self.stride, Ordering::SeqCst);
        let end = start.saturating_add(self.stride).min(self.tiles.len());
        (start < self.tiles.len()).then_some(start..end)
    }

    /// Only the first tile of a claim is recolored, and never an empty one.
    fn recolors(&self, pos: usize, claim: &Range<usize>) -> bool {
        pos == claim.start && !self.identity && self.tiles[pos].length > 0
    }

    fn is_aborted(&self) -> bool {
        self.staging.is_aborted()
    }

    /// Records the first real error and wakes everything that blocks.
    fn fail(&self, err: Error) {
        {
            let mut slot = lock(&self.failure);
            let replace = match slot.as_ref() {
                None => true,
                Some(existing) => existing.is_aborted() && !err.is_aborted(),
            };
            if replace {
                debug!(directory = self.directory.index, error = %err, "Aborting directory");
                *slot = Some(err);
            }
        }
        self.staging.abort();
        self.turnstile.abort();
    }

    fn take_failure(&self) -> Option<Error> {
        lock(&self.failure).take()
    }
}

/// Lets claims pass one at a time in ascending order.
#[derive(Debug, Default)]
struct Turnstile {
    next: Mutex<usize>,
    turn: Condvar,
    aborted: AtomicBool,
}

impl Turnstile {
    /// Blocks until the claim starting at `start` is next.
    fn wait_for(&self, start: usize) -> Result<()> {
        let mut next = lock(&self.next);
        loop {
            if self.aborted.load(Ordering::SeqCst) {
                return Err(Error::Aborted);
            }
            if *next == start {
                return Ok(());
            }
            next = self.turn.wait(next).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Opens the turnstile for the claim starting at `end`.
    fn advance(&self, end: usize) {
        *lock(&self.next) = end;
        self.turn.notify_all();
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        drop(lock(&self.next));
        self.turn.notify_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use wsi_tests::{jpeg, pixels, ContainerBuilder, DirectorySpec};

    fn tiles(count: usize, size: usize, quality: u8) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| jpeg::encode_rgb(&pixels::gradient(size, size, i as u8 * 17), size, size, quality))
            .collect()
    }

    fn load(bytes: Vec<u8>) -> (ByteStore, Container) {
        let store = ByteStore::from_bytes(bytes, 4096);
        let container = Container::parse(&store).unwrap();
        (store, container)
    }

    #[test]
    fn test_claims_are_disjoint() {
        let (_, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(160, 32, 16, 16, tiles(20, 16, 80)))
                .build(),
        );
        let job = DirectoryJob::new(&container.directories[0], 2, false);
        let seen = Mutex::new(Vec::new());
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while let Some(claim) = job.claim() {
                        lock(&seen).extend(claim);
                    }
                });
            }
        });
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_huge_skip_claims_once() {
        let (_, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(64, 16, 16, 16, tiles(4, 16, 80)))
                .build(),
        );
        let job = DirectoryJob::new(&container.directories[0], usize::MAX, false);
        assert_eq!(job.stride, 4);
        assert_eq!(job.claim(), Some(0..4));
        for _ in 0..64 {
            assert_eq!(job.claim(), None);
        }
        assert!(job.recolors(0, &(0..4)));
        assert!(!job.recolors(1, &(0..4)));
    }

    #[test]
    fn test_recolor_positions() {
        let (_, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(144, 16, 16, 16, tiles(9, 16, 80)))
                .build(),
        );
        let job = DirectoryJob::new(&container.directories[0], 2, false);
        let mut recolored = HashSet::new();
        while let Some(claim) = job.claim() {
            for pos in claim.clone() {
                if job.recolors(pos, &claim) {
                    recolored.insert(pos);
                }
            }
        }
        assert_eq!(recolored, HashSet::from([0, 3, 6]));
    }

    #[test]
    fn test_turnstile_orders_claims() {
        let gate = Turnstile::default();
        let order = Mutex::new(Vec::new());
        thread::scope(|s| {
            for start in [6usize, 3, 0] {
                let (gate, order) = (&gate, &order);
                s.spawn(move || {
                    gate.wait_for(start).unwrap();
                    lock(order).push(start);
                    gate.advance(start + 3);
                });
                thread::sleep(Duration::from_millis(5));
            }
        });
        assert_eq!(order.into_inner().unwrap(), vec![0, 3, 6]);
    }

    #[test]
    fn test_turnstile_abort() {
        let gate = Turnstile::default();
        gate.abort();
        assert!(gate.wait_for(5).unwrap_err().is_aborted());
    }

    #[test]
    fn test_first_real_error_wins() {
        let (_, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(16, 16, 16, 16, tiles(1, 16, 80)))
                .build(),
        );
        let job = DirectoryJob::new(&container.directories[0], 0, false);
        job.fail(Error::Aborted);
        job.fail(Error::format("bad"));
        job.fail(Error::format("later"));
        assert!(job.is_aborted());
        assert!(job.claim().is_none());
        match job.take_failure() {
            Some(Error::Format(msg)) => assert_eq!(msg, "bad"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plan_rejects_non_jpeg() {
        let (_, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(16, 16, 16, 16, tiles(1, 16, 80)).with_compression(5))
                .build(),
        );
        let correction = LazyCorrection::ready(DenseLut::identity());
        let err = Recolorer::new(&container, &correction, RecolorOptions::default())
            .plan()
            .unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_plan_resolves_auto() {
        let px = vec![pixels::gradient(16, 16, 0)];
        let (tables, shared) = jpeg::shared_table_tiles(&px, 16, 16, 85);
        let (_, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(16, 16, 16, 16, tiles(1, 16, 80)))
                .directory(DirectorySpec::tiled(16, 16, 16, 16, shared).with_jpeg_tables(tables))
                .build(),
        );
        let correction = LazyCorrection::ready(DenseLut::identity());
        let recolorer = Recolorer::new(&container, &correction, RecolorOptions::default());
        let kinds: Vec<_> = recolorer.plan().unwrap().iter().map(|(_, s)| s.kind()).collect();
        assert_eq!(kinds, vec![StrategyKind::SelfContained, StrategyKind::SharedTables]);

        let forced = Recolorer::new(
            &container,
            &correction,
            RecolorOptions {
                strategy: StrategyKind::SharedTables,
                ..Default::default()
            },
        );
        assert!(forced.plan().unwrap_err().is_format_error());
    }

    #[test]
    fn test_codec_failure_aborts_run() {
        let mut bad = tiles(6, 16, 80);
        bad[4] = vec![0xFF, 0xD8, 0x00, 0x01, 0x02, 0x03];
        let (mut store, container) = load(
            ContainerBuilder::new()
                .directory(DirectorySpec::tiled(96, 16, 16, 16, bad))
                .build(),
        );
        let correction = LazyCorrection::ready(DenseLut::from_fn(|r, g, b| [g, b, r]));
        let options = RecolorOptions {
            workers: 3,
            ..Default::default()
        };
        let err = Recolorer::new(&container, &correction, options)
            .run(&mut store)
            .unwrap_err();
        assert!(matches!(err, Error::Codec { directory: 0, tile: 4, .. }));
    }
}
