//! Request queue and bookkeeping around the search.
//!
//! The [`PathManager`] owns the node layers, the single [`SearchContext`]
//! every search runs on and the [`PathCache`]. Requests return an id
//! immediately and are searched in FIFO order by [`PathManager::update`];
//! until then the id refers to a two-point placeholder.

use std::collections::VecDeque;

use log::{debug, warn};
use qtpfs_core::{Range, Terrain, Vec3};
use rustc_hash::FxHashMap;

use crate::cache::PathCache;
use crate::config::{LayerConfig, ManagerConfig};
use crate::error::PathError;
use crate::layer::NodeLayer;
use crate::open::{NODE_STATE_OFFSET, SearchContext};
use crate::path::{Path, PathId};
use crate::search::PathSearch;

/// Index of a layer inside its [`PathManager`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerId(pub usize);

#[derive(Debug, Clone)]
struct PathRequest {
    layer: LayerId,
    source: Vec3,
    target: Vec3,
    search_rect: Range,
}

/// What one [`PathManager::update`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Paths finalized by their own search.
    pub searched: Vec<PathId>,
    /// Paths that copied the result of an earlier search in the same update.
    pub shared: Vec<PathId>,
    /// Paths whose search found nothing; they have been deleted.
    pub failed: Vec<PathId>,
    pub nodes_expanded: usize,
    /// Requests still waiting for a later update.
    pub queued: usize,
}

#[derive(Debug)]
pub struct PathManager {
    config: ManagerConfig,
    layers: Vec<NodeLayer>,
    cache: PathCache,
    context: SearchContext,
    requests: FxHashMap<PathId, PathRequest>,
    queue: VecDeque<PathId>,
    next_path_id: u64,
    search_state: u32,
}

impl Default for PathManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl PathManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            cache: PathCache::new(),
            context: SearchContext::new(),
            requests: FxHashMap::default(),
            queue: VecDeque::new(),
            next_path_id: 1,
            search_state: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Tesselate `terrain` into a new layer.
    pub fn add_layer(&mut self, terrain: &impl Terrain, config: LayerConfig) -> LayerId {
        self.layers.push(NodeLayer::new(terrain, config));
        LayerId(self.layers.len() - 1)
    }

    pub fn layer(&self, id: LayerId) -> Option<&NodeLayer> {
        self.layers.get(id.0)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Number of requests waiting for [`update`](Self::update).
    pub fn num_queued(&self) -> usize {
        self.queue.len()
    }

    /// Queue a search from `source` to `target` on `layer`. The returned id
    /// is valid right away and refers to a `[source, target]` placeholder
    /// until the search has run. Without a `search_rect` the whole layer
    /// may be searched.
    pub fn request_path(
        &mut self,
        layer: LayerId,
        source: Vec3,
        target: Vec3,
        radius: f32,
        search_rect: Option<Range>,
    ) -> Result<PathId, PathError> {
        let node_layer = self.layers.get(layer.0).ok_or(PathError::UnknownLayer(layer.0))?;
        let search_rect = search_rect.unwrap_or_else(|| Range::from_size(node_layer.size()));

        let id = PathId(self.next_path_id);
        self.next_path_id += 1;
        self.cache.add_temp_path(Path::new(id, source, target, radius));
        self.requests.insert(
            id,
            PathRequest {
                layer,
                source,
                target,
                search_rect,
            },
        );
        self.queue.push_back(id);
        debug!("queued path {id} on layer {}: {source} -> {target}", layer.0);
        Ok(id)
    }

    fn next_search_state(&mut self) -> u32 {
        if self.search_state > u32::MAX - 2 * NODE_STATE_OFFSET {
            debug!("search state exhausted, resetting node records");
            self.context.reset();
            self.search_state = 0;
        }
        self.search_state += NODE_STATE_OFFSET;
        self.search_state
    }

    /// Run up to [`ManagerConfig::max_searches_per_update`] queued requests.
    pub fn update(&mut self) -> UpdateReport {
        let mut report = UpdateReport::default();
        let mut finished: FxHashMap<u64, PathId> = FxHashMap::default();
        let mut processed = 0;

        while processed < self.config.max_searches_per_update {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            // Deleted while queued.
            let Some(req) = self.requests.get(&id).cloned() else {
                continue;
            };
            if !self.cache.is_pending(id) {
                continue;
            }
            processed += 1;

            let state = self.next_search_state();
            let layer = &self.layers[req.layer.0];
            let mut search = PathSearch::new(self.config.search_type, self.config.search.clone());
            search.initialize(layer, req.source, req.target, req.search_rect);
            let hash = search.get_hash(layer.node_capacity() as u64, req.layer.0 as u64);

            if self.config.share_paths {
                if let Some(&src_id) = finished.get(&hash) {
                    let trivial = self.cache.get_path(id).is_some_and(|p| p.len() == 2);
                    if trivial {
                        match search.shared_finalize(&mut self.cache, src_id, id) {
                            Ok(true) => {
                                if let Some(p) = self.cache.get_path_mut(id) {
                                    p.set_hash(hash);
                                }
                                report.shared.push(id);
                                continue;
                            }
                            Ok(false) => {}
                            Err(e) => warn!("sharing path {src_id} with {id} failed: {e}"),
                        }
                    }
                }
            }

            let found = search.execute(layer, &mut self.context, state, layer.magic());
            report.nodes_expanded += search.nodes_expanded();
            if !found {
                self.requests.remove(&id);
                self.cache.delete_path(id).ok();
                report.failed.push(id);
                continue;
            }

            let result = self
                .cache
                .take_pending_path(id)
                .and_then(|path| search.finalize(layer, &mut self.cache, path));
            match result {
                Ok(_) => {
                    if let Some(p) = self.cache.get_path_mut(id) {
                        p.set_hash(hash);
                    }
                    finished.insert(hash, id);
                    report.searched.push(id);
                }
                Err(e) => {
                    warn!("finalizing path {id} failed: {e}");
                    self.requests.remove(&id);
                    self.cache.delete_path(id).ok();
                    report.failed.push(id);
                }
            }
        }

        report.queued = self.queue.len();
        if processed > 0 {
            debug!(
                "update: {} searched, {} shared, {} failed, {} nodes expanded, {} queued",
                report.searched.len(),
                report.shared.len(),
                report.failed.len(),
                report.nodes_expanded,
                report.queued
            );
        }
        report
    }

    /// Apply a terrain change inside `rect` to `layer` and queue every live
    /// path on that layer crossing it for a new search under the same id.
    /// Returns the number of paths queued.
    pub fn terrain_change(&mut self, layer: LayerId, terrain: &impl Terrain, rect: Range) -> Result<usize, PathError> {
        let node_layer = self
            .layers
            .get_mut(layer.0)
            .ok_or(PathError::UnknownLayer(layer.0))?;
        node_layer.update(terrain, rect);

        let requests = &self.requests;
        let dead = self
            .cache
            .mark_dead_paths(rect, |p| requests.get(&p.id()).is_some_and(|r| r.layer == layer));
        self.queue.extend(dead.iter().copied());
        Ok(dead.len())
    }

    /// Forget a path in any state.
    pub fn delete_path(&mut self, id: PathId) -> Result<(), PathError> {
        self.requests.remove(&id);
        self.cache.delete_path(id).map(|_| ())
    }

    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.cache.get_path(id)
    }

    /// Whether `id` still waits for a (re)search.
    pub fn is_pending(&self, id: PathId) -> bool {
        self.cache.is_pending(id)
    }

    /// The waypoint an owner at `pos` should head for, skipping waypoints
    /// already within `radius`. The final point is never skipped.
    pub fn next_waypoint(&mut self, id: PathId, pos: Vec3, radius: f32) -> Result<Vec3, PathError> {
        let path = self.cache.get_path_mut(id).ok_or(PathError::UnknownPath(id))?;
        let last = path.len() - 1;
        let mut i = path.next_point_index();
        while i < last && path.point(i).distance_2d(pos) <= radius {
            i += 1;
        }
        path.set_next_point_index(i);
        Ok(path.point(i))
    }
}
