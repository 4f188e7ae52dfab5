//! Profile-to-table build and its once-per-container memoization.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{info, trace};

use crate::{read_a2b0, CoarseLut, DenseLut, LutResult, ReferenceDisplay};

/// Builds the dense correction table for an embedded ICC profile.
///
/// Reads the `A2B0` cube, composes it with the built-in reference display and
/// upsamples the result. The upsample fans out over the rayon pool and joins
/// before returning.
pub fn build_correction(profile: &[u8]) -> LutResult<DenseLut> {
    trace!(bytes = profile.len(), "build_correction");
    let started = Instant::now();

    let cube = read_a2b0(profile)?;
    let display = ReferenceDisplay::srgb()?;
    let coarse = CoarseLut::from_device(&cube, &display)?;
    let dense = DenseLut::from_coarse(&coarse);

    info!(
        grid = cube.size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Built correction table"
    );
    Ok(dense)
}

enum State {
    Pending(Vec<u8>),
    Done(LutResult<Arc<DenseLut>>),
}

/// Correction table built on first use and shared afterwards.
///
/// Concurrent callers of [`get`](Self::get) block until the single build
/// finishes. A failed build is remembered, so every caller sees the same error.
/// The profile bytes are released once the build has run.
pub struct LazyCorrection {
    state: Mutex<State>,
    builds: AtomicUsize,
}

impl LazyCorrection {
    /// Defers building until the table is first requested.
    pub fn from_profile(profile: Vec<u8>) -> Self {
        Self {
            state: Mutex::new(State::Pending(profile)),
            builds: AtomicUsize::new(0),
        }
    }

    /// Wraps an already-built table.
    pub fn ready(lut: DenseLut) -> Self {
        Self {
            state: Mutex::new(State::Done(Ok(Arc::new(lut)))),
            builds: AtomicUsize::new(0),
        }
    }

    /// Returns the table, building it on the first call.
    pub fn get(&self) -> LutResult<Arc<DenseLut>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let result = match &mut *state {
            State::Done(result) => return result.clone(),
            State::Pending(profile) => {
                let profile = std::mem::take(profile);
                self.builds.fetch_add(1, Ordering::Relaxed);
                build_correction(&profile).map(Arc::new)
            }
        };
        *state = State::Done(result.clone());
        result
    }

    /// Number of builds performed so far (0 or 1).
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for LazyCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyCorrection")
            .field("builds", &self.builds())
            .finish()
    }
}
