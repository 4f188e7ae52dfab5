//! Correction tables built from synthetic scanner profiles.

use std::thread;

use wsi_lut::{build_correction, read_a2b0, LazyCorrection};
use wsi_tests::icc;

fn max_channel_error(a: [u8; 3], b: [u8; 3]) -> u8 {
    (0..3).map(|i| a[i].abs_diff(b[i])).max().unwrap_or(0)
}

#[test]
fn reference_profile_is_near_identity() {
    let lut = build_correction(&icc::reference_profile(17)).unwrap();
    let mut worst = 0;
    for r in (0..=255u8).step_by(15) {
        for g in (0..=255u8).step_by(17) {
            for b in (0..=255u8).step_by(51) {
                worst = worst.max(max_channel_error(lut.map_rgb(r, g, b), [r, g, b]));
            }
        }
    }
    assert!(worst <= 2, "worst channel error {}", worst);
}

#[test]
fn red_gain_is_corrected_away() {
    // A scanner reading red at 0.5x with white normalized back to 1.0.
    let lut = build_correction(&icc::red_gain_profile(17, 0.5)).unwrap();
    let [r, g, b] = lut.map_rgb(200, 100, 100);
    assert!(r < 200, "red should drop, got {}", r);
    assert!(g.abs_diff(b) <= 2);
    assert!(!lut.is_identity());
}

#[test]
fn grid_sizes_from_real_scanners_parse() {
    for grid in [33, 52] {
        let cube = read_a2b0(&icc::reference_profile(grid)).unwrap();
        assert_eq!(cube.size, grid);
        assert_eq!(cube.samples.len(), grid * grid * grid);
    }
}

#[test]
fn lazy_correction_builds_once_under_contention() {
    let correction = LazyCorrection::from_profile(icc::reference_profile(9));
    thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| correction.get().unwrap())).collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tables.windows(2).all(|w| std::sync::Arc::ptr_eq(&w[0], &w[1])));
    });
    assert_eq!(correction.builds(), 1);
}

#[test]
fn malformed_profile_surfaces_as_format_error() {
    let correction = LazyCorrection::from_profile(b"not a profile".to_vec());
    let err: wsi_core::Error = correction.get().unwrap_err().into();
    assert!(err.is_format_error());
}
