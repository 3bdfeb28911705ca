//! Ownership of every path known to the engine.
//!
//! A path is *temporary* from the moment it is requested until a search
//! finalizes it, *live* afterwards, and *dead* once a terrain change touched
//! its bounding box and it waits to be searched again. Dead paths stay
//! readable so their owners can keep following the stale waypoints. Paths
//! only ever leave the cache through [`PathCache::delete_path`].

use log::debug;
use qtpfs_core::Range;
use rustc_hash::FxHashMap;

use crate::error::PathError;
use crate::path::{Path, PathId};

#[derive(Debug, Clone, Default)]
pub struct PathCache {
    temp: FxHashMap<PathId, Path>,
    live: FxHashMap<PathId, Path>,
    dead: FxHashMap<PathId, Path>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly requested placeholder.
    pub fn add_temp_path(&mut self, path: Path) {
        debug_assert!(!self.contains(path.id()), "path {} registered twice", path.id());
        self.temp.insert(path.id(), path);
    }

    /// Make `path` live, replacing any temporary or dead entry with the same
    /// id. Finalizing a path that is already live is an error.
    pub fn add_live_path(&mut self, path: Path) -> Result<(), PathError> {
        let id = path.id();
        if self.live.contains_key(&id) {
            return Err(PathError::AlreadyLive(id));
        }
        self.temp.remove(&id);
        self.dead.remove(&id);
        self.live.insert(id, path);
        Ok(())
    }

    /// Remove and return a path that is waiting for a search result
    /// (temporary or dead).
    pub fn take_pending_path(&mut self, id: PathId) -> Result<Path, PathError> {
        if let Some(path) = self.temp.remove(&id) {
            return Ok(path);
        }
        if let Some(path) = self.dead.remove(&id) {
            return Ok(path);
        }
        if self.live.contains_key(&id) {
            Err(PathError::NotTemporary(id))
        } else {
            Err(PathError::UnknownPath(id))
        }
    }

    /// Move every live path accepted by `filter` whose bounding box overlaps
    /// the cell range `rect` to the dead set, returning their ids in
    /// ascending order.
    pub fn mark_dead_paths(&mut self, rect: Range, mut filter: impl FnMut(&Path) -> bool) -> Vec<PathId> {
        let mut ids: Vec<PathId> = self
            .live
            .values()
            .filter(|p| p.intersects(rect) && filter(p))
            .map(Path::id)
            .collect();
        ids.sort_unstable();
        for id in &ids {
            if let Some(path) = self.live.remove(id) {
                self.dead.insert(*id, path);
            }
        }
        if !ids.is_empty() {
            debug!("terrain change at {rect} killed {} paths", ids.len());
        }
        ids
    }

    /// Destroy a path in whatever state it is. Deleting an unknown (or
    /// already deleted) id is an error.
    pub fn delete_path(&mut self, id: PathId) -> Result<Path, PathError> {
        self.live
            .remove(&id)
            .or_else(|| self.temp.remove(&id))
            .or_else(|| self.dead.remove(&id))
            .ok_or(PathError::UnknownPath(id))
    }

    /// The path with `id` in any state.
    pub fn get_path(&self, id: PathId) -> Option<&Path> {
        self.live
            .get(&id)
            .or_else(|| self.dead.get(&id))
            .or_else(|| self.temp.get(&id))
    }

    pub(crate) fn get_path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        if let Some(p) = self.live.get_mut(&id) {
            return Some(p);
        }
        if let Some(p) = self.dead.get_mut(&id) {
            return Some(p);
        }
        self.temp.get_mut(&id)
    }

    pub fn get_live_path(&self, id: PathId) -> Option<&Path> {
        self.live.get(&id)
    }

    /// A placeholder still waiting for its first search.
    pub fn get_temp_path(&self, id: PathId) -> Option<&Path> {
        self.temp.get(&id)
    }

    pub fn contains(&self, id: PathId) -> bool {
        self.live.contains_key(&id) || self.temp.contains_key(&id) || self.dead.contains_key(&id)
    }

    pub fn is_live(&self, id: PathId) -> bool {
        self.live.contains_key(&id)
    }

    /// Whether `id` is waiting for a search (never searched, or dead).
    pub fn is_pending(&self, id: PathId) -> bool {
        self.temp.contains_key(&id) || self.dead.contains_key(&id)
    }

    pub fn num_temp_paths(&self) -> usize {
        self.temp.len()
    }

    pub fn num_live_paths(&self) -> usize {
        self.live.len()
    }

    pub fn num_dead_paths(&self) -> usize {
        self.dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtpfs_core::Vec3;

    fn path(id: u64, from: (f32, f32), to: (f32, f32)) -> Path {
        Path::new(
            PathId(id),
            Vec3::new(from.0, 0.0, from.1),
            Vec3::new(to.0, 0.0, to.1),
            0.0,
        )
    }

    #[test]
    fn temp_to_live() {
        let mut cache = PathCache::new();
        cache.add_temp_path(path(1, (0.0, 0.0), (8.0, 8.0)));
        assert!(cache.is_pending(PathId(1)));
        assert!(cache.get_temp_path(PathId(1)).is_some());

        let p = cache.take_pending_path(PathId(1)).unwrap();
        cache.add_live_path(p).unwrap();
        assert!(cache.is_live(PathId(1)));
        assert!(!cache.is_pending(PathId(1)));
        assert_eq!(cache.num_temp_paths(), 0);
        assert_eq!(cache.num_live_paths(), 1);
    }

    #[test]
    fn double_finalize_is_rejected() {
        let mut cache = PathCache::new();
        cache.add_live_path(path(1, (0.0, 0.0), (8.0, 8.0))).unwrap();
        let err = cache.add_live_path(path(1, (0.0, 0.0), (8.0, 8.0))).unwrap_err();
        assert_eq!(err, PathError::AlreadyLive(PathId(1)));
    }

    #[test]
    fn double_delete_is_rejected() {
        let mut cache = PathCache::new();
        cache.add_temp_path(path(7, (0.0, 0.0), (8.0, 8.0)));
        assert_eq!(cache.delete_path(PathId(7)).unwrap().id(), PathId(7));
        assert_eq!(cache.delete_path(PathId(7)), Err(PathError::UnknownPath(PathId(7))));
        assert!(!cache.contains(PathId(7)));
    }

    #[test]
    fn live_paths_are_not_pending() {
        let mut cache = PathCache::new();
        cache.add_live_path(path(2, (0.0, 0.0), (8.0, 8.0))).unwrap();
        assert_eq!(cache.take_pending_path(PathId(2)), Err(PathError::NotTemporary(PathId(2))));
        assert_eq!(cache.take_pending_path(PathId(3)), Err(PathError::UnknownPath(PathId(3))));
    }

    #[test]
    fn terrain_change_kills_overlapping_paths_only() {
        let mut cache = PathCache::new();
        // Cells 0..2 along x.
        cache.add_live_path(path(1, (4.0, 4.0), (12.0, 4.0))).unwrap();
        // Cells 10..12 along x.
        cache.add_live_path(path(2, (84.0, 4.0), (92.0, 4.0))).unwrap();
        cache.add_live_path(path(3, (4.0, 12.0), (12.0, 12.0))).unwrap();

        let dead = cache.mark_dead_paths(Range::new(0, 0, 3, 3), |p| p.id() != PathId(3));
        assert_eq!(dead, vec![PathId(1)]);
        assert_eq!(cache.num_dead_paths(), 1);
        assert!(cache.is_pending(PathId(1)));
        // Dead paths stay readable.
        assert_eq!(cache.get_path(PathId(1)).map(Path::len), Some(2));

        let p = cache.take_pending_path(PathId(1)).unwrap();
        cache.add_live_path(p).unwrap();
        assert_eq!(cache.num_dead_paths(), 0);
        assert_eq!(cache.num_live_paths(), 3);
    }
}
