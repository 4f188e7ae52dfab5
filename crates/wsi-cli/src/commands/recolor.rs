//! Recolor command.
//!
//! Loads the container, captures and invalidates the embedded profile,
//! rewrites every tile and flushes to `<output>.partial`, renaming it only
//! once everything succeeded.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use wsi_core::Error;
use wsi_lut::LazyCorrection;
use wsi_pipeline::{Progress, RecolorOptions, RecolorReport, Recolorer};

use crate::RecolorArgs;

/// Accepted container extensions.
pub const EXTENSIONS: [&str; 3] = ["svs", "tif", "tiff"];

const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Runs the recolor command.
pub fn run(args: RecolorArgs) -> Result<RecolorReport> {
    let started = Instant::now();
    check_extension(&args.input)?;
    let output = match &args.output {
        Some(path) => path.clone(),
        None => output_path(&args.input)?,
    };
    if output == args.input {
        bail!("Output would overwrite the input: {}", output.display());
    }

    let chunk_size = args.chunk_mb as usize * 1024 * 1024;
    let (mut store, container) = super::open_container(&args.input, chunk_size)?;
    info!(
        input = %args.input.display(),
        size = %super::format_size(store.len()),
        directories = container.directories.len(),
        tiles = container.tile_count(),
        "Loaded container"
    );

    let profile = container
        .profile_bytes(&store)?
        .ok_or_else(|| Error::format("container has no embedded color profile"))?;
    let invalidated = container.invalidate_profile(&mut store)?;
    debug!(bytes = profile.len(), invalidated, "Captured color profile");

    let options = RecolorOptions {
        workers: args.workers as usize,
        quality: args.quality,
        skip: args.skip,
        strategy: args.strategy.into(),
        requantize: args.requantize,
        annotate: args.annotate,
        ..Default::default()
    };
    let correction = LazyCorrection::from_profile(profile);
    let progress = Arc::new(Progress::new());
    let recolorer =
        Recolorer::new(&container, &correction, options).with_progress(Arc::clone(&progress));

    let report = with_reporter(&progress, REPORT_INTERVAL, || recolorer.run(&mut store))
        .with_context(|| format!("Failed to recolor: {}", args.input.display()))?;

    let partial = partial_path(&output);
    if let Err(err) = store.flush(&partial) {
        let _ = fs::remove_file(&partial);
        return Err(err).with_context(|| format!("Failed to write: {}", partial.display()));
    }
    fs::rename(&partial, &output)
        .with_context(|| format!("Failed to rename {} to {}", partial.display(), output.display()))?;

    info!(
        output = %output.display(),
        recolored = report.recolored,
        copied = report.copied,
        before = %super::format_size(report.bytes_before),
        after = %super::format_size(report.bytes_after),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(report)
}

/// Rejects inputs without a container extension.
pub fn check_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext {
        Some(ext) if EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => bail!(
            "Unsupported input {}: expected one of .{}",
            path.display(),
            EXTENSIONS.join(", .")
        ),
    }
}

/// `<dir>/<stem>_recolored.<ext>`
pub fn output_path(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .with_context(|| format!("Invalid input path: {}", input.display()))?;
    let mut name = OsString::from(stem);
    name.push("_recolored");
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    Ok(input.with_file_name(name))
}

/// `<output>.partial`
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Runs `work` while a reporter thread logs progress every `interval`.
fn with_reporter<T>(progress: &Progress, interval: Duration, work: impl FnOnce() -> T) -> T {
    let (stop, stopped) = mpsc::channel::<()>();
    thread::scope(|s| {
        s.spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                let snap = progress.snapshot();
                info!(
                    completed = snap.completed,
                    total = snap.total,
                    "Progress {:.1}%",
                    snap.fraction() * 100.0
                );
            }
        });
        let out = work();
        drop(stop);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrategyArg;
    use tempfile::tempdir;
    use wsi_tests::{icc, jpeg, pixels, ContainerBuilder, DirectorySpec};

    fn args(input: PathBuf) -> RecolorArgs {
        RecolorArgs {
            input,
            output: None,
            workers: 2,
            quality: 90,
            skip: 0,
            strategy: StrategyArg::Auto,
            requantize: false,
            annotate: false,
            chunk_mb: 1,
        }
    }

    fn slide(profile: Option<Vec<u8>>) -> Vec<u8> {
        let tiles = (0..4)
            .map(|i| jpeg::encode_rgb(&pixels::gradient(32, 32, i * 40), 32, 32, 95))
            .collect();
        let mut spec = DirectorySpec::tiled(64, 64, 32, 32, tiles);
        if let Some(profile) = profile {
            spec = spec.with_profile(profile);
        }
        ContainerBuilder::new().directory(spec).build()
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("/data/CMU-1.svs")).unwrap(),
            PathBuf::from("/data/CMU-1_recolored.svs")
        );
        assert_eq!(
            output_path(Path::new("slide.TIFF")).unwrap(),
            PathBuf::from("slide_recolored.TIFF")
        );
        assert_eq!(partial_path(Path::new("a/b.svs")), PathBuf::from("a/b.svs.partial"));
    }

    #[test]
    fn test_check_extension() {
        assert!(check_extension(Path::new("x.svs")).is_ok());
        assert!(check_extension(Path::new("x.TIF")).is_ok());
        assert!(check_extension(Path::new("x.ndpi")).is_err());
        assert!(check_extension(Path::new("noext")).is_err());
    }

    #[test]
    fn test_recolor_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("slide.svs");
        let original = slide(Some(icc::red_gain_profile(9, 0.8)));
        fs::write(&input, &original).unwrap();

        let report = run(args(input.clone())).unwrap();
        assert_eq!((report.tiles, report.recolored, report.copied), (4, 4, 0));

        let output = dir.path().join("slide_recolored.svs");
        let written = fs::read(&output).unwrap();
        assert_eq!(written.len(), original.len());
        assert_ne!(written, original);
        assert!(!partial_path(&output).exists());
        // Input is never modified.
        assert_eq!(fs::read(&input).unwrap(), original);
    }

    #[test]
    fn test_missing_profile_leaves_no_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("slide.tif");
        fs::write(&input, slide(None)).unwrap();

        let err = run(args(input)).unwrap_err();
        assert!(format!("{:#}", err).contains("no embedded color profile"));
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_capacity_failure_leaves_no_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("noisy.svs");
        // Low-quality noise re-encoded at 100 cannot fit.
        let tiles = (0..2)
            .map(|i| jpeg::encode_rgb(&pixels::noise(32, 32, i + 1), 32, 32, 10))
            .collect();
        let bytes = ContainerBuilder::new()
            .directory(
                DirectorySpec::tiled(64, 32, 32, 32, tiles)
                    .with_profile(icc::red_gain_profile(9, 0.8)),
            )
            .build();
        fs::write(&input, bytes).unwrap();

        let mut a = args(input);
        a.quality = 100;
        let err = run(a).unwrap_err();
        let core = err.downcast_ref::<Error>().unwrap();
        assert!(core.is_capacity_error());
        assert!(!dir.path().join("noisy_recolored.svs").exists());
    }
}
