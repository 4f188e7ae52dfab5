//! Staged tile bytes awaiting the writer.
//!
//! Producers deposit finished tiles keyed by tile index; the single writer
//! blocks until every tile of the run it is draining is present, then takes
//! them out, which frees their memory. An abort flag wakes every waiter so a
//! failure anywhere tears the directory down promptly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use wsi_core::{Error, Result};

/// Concurrent tile-index to bytes map with blocking drain.
#[derive(Debug, Default)]
pub struct StagingArea {
    tiles: Mutex<HashMap<usize, Vec<u8>>>,
    ready: Condvar,
    aborted: AtomicBool,
}

impl StagingArea {
    /// Creates an empty staging area.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, Vec<u8>>> {
        self.tiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stages the bytes for one tile.
    pub fn stage(&self, tile: usize, bytes: Vec<u8>) {
        self.lock().insert(tile, bytes);
        self.ready.notify_all();
    }

    /// Number of tiles currently staged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until every listed tile is staged, then removes and returns
    /// them in the listed order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] once [`abort`](Self::abort) has been called.
    pub fn take_all(&self, tiles: &[usize]) -> Result<Vec<Vec<u8>>> {
        let mut map = self.lock();
        loop {
            if self.is_aborted() {
                return Err(Error::Aborted);
            }
            if tiles.iter().all(|t| map.contains_key(t)) {
                return Ok(tiles
                    .iter()
                    .map(|t| map.remove(t).unwrap_or_default())
                    .collect());
            }
            map = self.ready.wait(map).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes all waiters and makes further waits fail.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        // Taking the lock orders the flag before any waiter's re-check.
        drop(self.lock());
        self.ready.notify_all();
    }

    /// Returns true after [`abort`](Self::abort).
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_take_all_in_order() {
        let area = StagingArea::new();
        area.stage(2, vec![2]);
        area.stage(0, vec![0]);
        area.stage(1, vec![1, 1]);
        area.stage(5, vec![5]);
        let got = area.take_all(&[0, 1, 2]).unwrap();
        assert_eq!(got, vec![vec![0], vec![1, 1], vec![2]]);
        assert_eq!(area.len(), 1);
    }

    #[test]
    fn test_take_all_blocks_until_staged() {
        let area = StagingArea::new();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                area.stage(1, vec![1]);
                thread::sleep(Duration::from_millis(20));
                area.stage(0, vec![0]);
            });
            assert_eq!(area.take_all(&[0, 1]).unwrap(), vec![vec![0], vec![1]]);
        });
        assert!(area.is_empty());
    }

    #[test]
    fn test_abort_wakes_waiter() {
        let area = StagingArea::new();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                area.abort();
            });
            assert!(area.take_all(&[0]).unwrap_err().is_aborted());
        });
    }
}
