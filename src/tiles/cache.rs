use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::probe::{ProbeError, TileImage, TileProbe};
use super::{TileKey, TileRecord};
use crate::geo::GeoBounds;

/// Where probe work runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// On the rayon pool; completions arrive in any order
    Pool,
    /// On the calling thread. The completion is still queued and only
    /// applied by the next `apply_completed`.
    Inline,
}

/// A satellite image placed at a tile's geographic bounds
#[derive(Clone, Debug)]
pub struct TileOverlay {
    pub key: TileKey,
    pub bounds: GeoBounds,
    pub path: PathBuf,
    pub image: TileImage,
}

/// Completed probe, sent back to the event loop
struct ProbeOutcome {
    epoch: u64,
    key: TileKey,
    bounds: GeoBounds,
    path: PathBuf,
    result: Result<TileImage, ProbeError>,
}

/// Tracks which tile overlays are on the map and loads missing ones.
///
/// Overlays are added incrementally and only ever removed all at once by
/// [`TileLayerCache::clear`]. The loaded set is keyed by [`TileKey`], so a
/// tile can never be present twice.
pub struct TileLayerCache {
    tiles_dir: PathBuf,
    probe: Arc<dyn TileProbe>,
    dispatch: Dispatch,
    loaded: BTreeMap<TileKey, TileOverlay>,
    in_flight: HashSet<TileKey>,
    /// Tiles whose probe failed; never retried
    missing: HashSet<TileKey>,
    /// Bumped on every clear so completions from before it are dropped
    epoch: u64,
    probes_started: u64,
    tx: Sender<ProbeOutcome>,
    rx: Receiver<ProbeOutcome>,
}

impl TileLayerCache {
    pub fn new(tiles_dir: impl Into<PathBuf>, probe: Arc<dyn TileProbe>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tiles_dir: tiles_dir.into(),
            probe,
            dispatch: Dispatch::Pool,
            loaded: BTreeMap::new(),
            in_flight: HashSet::new(),
            missing: HashSet::new(),
            epoch: 0,
            probes_started: 0,
            tx,
            rx,
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn tiles_dir(&self) -> &Path {
        &self.tiles_dir
    }

    /// Conventional image location for a tile
    pub fn image_path(&self, key: TileKey) -> PathBuf {
        self.tiles_dir.join(key.image_file_name())
    }

    /// Start probes for every desired tile that is not already loaded, in
    /// flight, or known to be missing. Loaded tiles outside `desired` stay.
    ///
    /// Returns the number of probes started.
    pub fn reconcile<'a, F>(&mut self, desired: &HashSet<TileKey>, lookup: F) -> usize
    where
        F: Fn(TileKey) -> Option<&'a TileRecord>,
    {
        let mut wanted: Vec<TileKey> = desired
            .iter()
            .copied()
            .filter(|k| {
                !self.loaded.contains_key(k) && !self.in_flight.contains(k) && !self.missing.contains(k)
            })
            .collect();
        wanted.sort_unstable();

        let mut started = 0;
        for key in wanted {
            let Some(record) = lookup(key) else {
                warn!(tile = %key, "Desired tile is not in the tile index");
                continue;
            };
            self.start_probe(key, record.bounds);
            started += 1;
        }

        if started > 0 {
            debug!(started, loaded = self.loaded.len(), "Reconciled tile overlays");
        }
        started
    }

    fn start_probe(&mut self, key: TileKey, bounds: GeoBounds) {
        self.in_flight.insert(key);
        self.probes_started += 1;

        let path = self.image_path(key);
        let epoch = self.epoch;
        let probe = Arc::clone(&self.probe);
        let tx = self.tx.clone();
        let job = move || {
            let result = probe.load(&path);
            // The receiver lives as long as the cache; a send error only
            // means the cache is gone.
            let _ = tx.send(ProbeOutcome {
                epoch,
                key,
                bounds,
                path,
                result,
            });
        };

        match self.dispatch {
            Dispatch::Pool => rayon::spawn(job),
            Dispatch::Inline => job(),
        }
    }

    /// Apply every probe completion received so far. Returns how many
    /// overlays were added.
    pub fn apply_completed(&mut self) -> usize {
        let mut added = 0;
        while let Ok(outcome) = self.rx.try_recv() {
            if self.apply(outcome) {
                added += 1;
            }
        }
        added
    }

    /// Block until nothing is in flight or `timeout` passes, applying
    /// completions as they arrive. Returns how many overlays were added.
    pub fn wait_for_in_flight(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut added = self.apply_completed();
        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    if self.apply(outcome) {
                        added += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        added
    }

    fn apply(&mut self, outcome: ProbeOutcome) -> bool {
        if outcome.epoch != self.epoch {
            debug!(tile = %outcome.key, "Dropping tile probe from before the last clear");
            return false;
        }
        self.in_flight.remove(&outcome.key);

        match outcome.result {
            Ok(image) => {
                if self.loaded.contains_key(&outcome.key) {
                    return false;
                }
                debug!(tile = %outcome.key, path = %outcome.path.display(), "Tile overlay added");
                self.loaded.insert(
                    outcome.key,
                    TileOverlay {
                        key: outcome.key,
                        bounds: outcome.bounds,
                        path: outcome.path,
                        image,
                    },
                );
                true
            }
            Err(e) => {
                warn!(tile = %outcome.key, error = %e, "Tile image unavailable, skipping");
                self.missing.insert(outcome.key);
                false
            }
        }
    }

    /// Remove every overlay and forget in-flight probes
    pub fn clear(&mut self) {
        if !self.loaded.is_empty() || !self.in_flight.is_empty() {
            info!(
                removed = self.loaded.len(),
                abandoned = self.in_flight.len(),
                "Clearing satellite tile overlays"
            );
        }
        self.loaded.clear();
        self.in_flight.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn overlays(&self) -> impl Iterator<Item = &TileOverlay> + '_ {
        self.loaded.values()
    }

    pub fn is_loaded(&self, key: TileKey) -> bool {
        self.loaded.contains_key(&key)
    }

    pub fn loaded_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.loaded.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn missing(&self) -> usize {
        self.missing.len()
    }

    /// Total probes ever started
    pub fn probes_started(&self) -> u64 {
        self.probes_started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileIndex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Loads every path except those listed as missing
    struct StubProbe {
        missing: Vec<String>,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn new(missing: &[&str]) -> Self {
            Self {
                missing: missing.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TileProbe for StubProbe {
        fn load(&self, path: &Path) -> Result<TileImage, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if self.missing.iter().any(|m| m == name) {
                Err(ProbeError::Empty {
                    path: path.to_path_buf(),
                })
            } else {
                Ok(TileImage::flat(128))
            }
        }
    }

    fn index() -> TileIndex {
        TileIndex::from_records([
            TileRecord::new(9, 6, GeoBounds::new(31.50, 31.51, 34.47, 34.48)),
            TileRecord::new(9, 7, GeoBounds::new(31.50, 31.51, 34.48, 34.49)),
            TileRecord::new(10, 6, GeoBounds::new(31.49, 31.50, 34.47, 34.48)),
        ])
    }

    fn cache(probe: Arc<StubProbe>) -> TileLayerCache {
        TileLayerCache::new("images/tiles", probe).with_dispatch(Dispatch::Inline)
    }

    #[test]
    fn test_overlay_added_only_after_completion_is_applied() {
        let index = index();
        let mut cache = cache(Arc::new(StubProbe::new(&[])));
        let desired = HashSet::from([TileKey::new(9, 6)]);

        assert_eq!(cache.reconcile(&desired, |k| index.get(k)), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 1);

        assert_eq!(cache.apply_completed(), 1);
        let overlay = cache.overlays().next().unwrap();
        assert_eq!(overlay.key, TileKey::new(9, 6));
        assert_eq!(overlay.bounds, GeoBounds::new(31.50, 31.51, 34.47, 34.48));
        assert_eq!(overlay.path, Path::new("images/tiles/cropped_row_9_col_6.webp"));
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let index = index();
        let probe = Arc::new(StubProbe::new(&[]));
        let mut cache = cache(Arc::clone(&probe));
        let desired = HashSet::from([TileKey::new(9, 6), TileKey::new(9, 7)]);

        cache.reconcile(&desired, |k| index.get(k));
        // Second pass while probes are still queued
        assert_eq!(cache.reconcile(&desired, |k| index.get(k)), 0);
        cache.apply_completed();
        // And once they have landed
        assert_eq!(cache.reconcile(&desired, |k| index.get(k)), 0);
        cache.apply_completed();

        assert_eq!(cache.len(), 2);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.probes_started(), 2);
    }

    #[test]
    fn test_tiles_outside_desired_are_kept() {
        let index = index();
        let mut cache = cache(Arc::new(StubProbe::new(&[])));

        cache.reconcile(&HashSet::from([TileKey::new(9, 6)]), |k| index.get(k));
        cache.apply_completed();
        cache.reconcile(&HashSet::from([TileKey::new(10, 6)]), |k| index.get(k));
        cache.apply_completed();

        let keys: Vec<TileKey> = cache.loaded_keys().collect();
        assert_eq!(keys, vec![TileKey::new(9, 6), TileKey::new(10, 6)]);
    }

    #[test]
    fn test_failed_probe_is_skipped_and_never_retried() {
        let index = index();
        let probe = Arc::new(StubProbe::new(&["cropped_row_9_col_7.webp"]));
        let mut cache = cache(Arc::clone(&probe));
        let desired = HashSet::from([TileKey::new(9, 6), TileKey::new(9, 7)]);

        cache.reconcile(&desired, |k| index.get(k));
        assert_eq!(cache.apply_completed(), 1);
        assert!(cache.is_loaded(TileKey::new(9, 6)));
        assert!(!cache.is_loaded(TileKey::new(9, 7)));
        assert_eq!(cache.missing(), 1);

        assert_eq!(cache.reconcile(&desired, |k| index.get(k)), 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let index = index();
        let mut cache = cache(Arc::new(StubProbe::new(&[])));
        let desired = HashSet::from([TileKey::new(99, 99)]);
        assert_eq!(cache.reconcile(&desired, |k| index.get(k)), 0);
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn test_clear_drops_late_completions() {
        let index = index();
        let mut cache = cache(Arc::new(StubProbe::new(&[])));
        cache.reconcile(&HashSet::from([TileKey::new(9, 6)]), |k| index.get(k));

        // Completion is queued but the cache is cleared before it is applied
        cache.clear();
        assert_eq!(cache.apply_completed(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn test_clear_empties_loaded_set() {
        let index = index();
        let mut cache = cache(Arc::new(StubProbe::new(&[])));
        let all: HashSet<TileKey> = index.records().iter().map(|r| r.key()).collect();
        cache.reconcile(&all, |k| index.get(k));
        cache.apply_completed();
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert_eq!(cache.len(), 0);
        // Cleared tiles can be loaded again
        assert_eq!(cache.reconcile(&all, |k| index.get(k)), 3);
    }

    #[test]
    fn test_pool_dispatch_completes() {
        let index = index();
        let mut cache = TileLayerCache::new("images/tiles", Arc::new(StubProbe::new(&[])));
        let all: HashSet<TileKey> = index.records().iter().map(|r| r.key()).collect();

        cache.reconcile(&all, |k| index.get(k));
        cache.wait_for_in_flight(Duration::from_secs(5));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.in_flight(), 0);
    }
}
