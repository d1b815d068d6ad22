use crate::object_pool::key_none_value;
use crate::octree::payload::SceneSet;
use crate::octree::source::{OctreeSource, SceneItem};
use crate::octree::types::{
    keep_closest, HitRecord, NearestRecord, OctreeBuildParameter, OctreeError, PickContext,
};
use crate::octree::Octree;
use crate::spatial::math::vector::V3c;
use crate::spatial::raytracing::Ray;
use crate::spatial::{BoundingBox, BoundingSphere};
use nalgebra::Matrix4;
use std::collections::{HashMap, VecDeque};

/// Root expansions attempted for one out-of-bounds insert before giving up
/// and scheduling a full rebuild
const EXPAND_RETRY_LIMIT: usize = 10;

/// Lifecycle of a managed tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctreeManagerState {
    /// No tree is built; queries fall back to linear tests over all items
    Empty,
    /// The tree is built and incrementally maintained
    Built,
    /// Incremental maintenance gave up; the next processing pass rebuilds
    PendingRebuild,
}

/// A deferred structural change, applied by [OctreeManager::process_pending]
#[derive(Debug, Clone, Copy)]
enum PendingChange {
    Insert(u32),
    BoundChanged(u32),
}

impl PendingChange {
    fn key(&self) -> u32 {
        match self {
            PendingChange::Insert(key) | PendingChange::BoundChanged(key) => *key,
        }
    }
}

/// Owns a [crate::octree::payload::GroupOctree] over a set of scene items and
/// keeps it consistent while items are inserted, removed and moved around.
/// Structural changes are queued and applied in batches instead of rebuilding
/// the tree on every change; only when incremental maintenance fails does the
/// manager fall back to a full rebuild.
pub struct OctreeManager<T: SceneItem> {
    octree: Octree<SceneSet<T>>,
    state: OctreeManagerState,
    /// Which tree node currently holds each indexed item
    item_nodes: HashMap<u32, u32>,
    /// Items without a bounding box, hit-tested linearly next to the tree
    unbounded_items: Vec<u32>,
    pending: VecDeque<PendingChange>,
}

impl<T: SceneItem> OctreeManager<T> {
    pub fn new(parameters: OctreeBuildParameter) -> Self {
        Self {
            octree: Octree::new(SceneSet::default(), parameters),
            state: OctreeManagerState::Empty,
            item_nodes: HashMap::new(),
            unbounded_items: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> OctreeManagerState {
        self.state
    }

    pub fn octree(&self) -> &Octree<SceneSet<T>> {
        &self.octree
    }

    pub fn item_count(&self) -> usize {
        self.octree.source().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn get_item(&self, key: u32) -> Option<&T> {
        self.octree.source().get(key)
    }

    pub fn get_item_mut(&mut self, key: u32) -> Option<&mut T> {
        self.octree.source_mut().get_mut(key)
    }

    /// Adds one item to the managed set and returns its key. Boundable items
    /// are queued for insertion into the tree; items without bounds go to the
    /// linear side list right away.
    pub fn add_item(&mut self, item: T) -> u32 {
        let boundable = item.bounds().is_some();
        let key = self.octree.source_mut().insert(item);
        if boundable {
            self.pending.push_back(PendingChange::Insert(key));
        } else {
            self.unbounded_items.push(key);
        }
        key
    }

    /// Removes one item immediately, dropping any queued changes for it
    pub fn remove_item(&mut self, key: u32) -> Option<T> {
        self.pending.retain(|change| change.key() != key);
        self.unbounded_items.retain(|&unbounded| unbounded != key);
        if let Some(node) = self.item_nodes.remove(&key) {
            if !self.octree.remove_item_from_node(node, key) {
                // stale map entry, fall back to the exhaustive scan
                self.octree.remove_safe(key);
            }
            self.octree.shrink();
        }
        self.octree.source_mut().remove(key)
    }

    /// Signals that the bounds of the given item changed; its tree position
    /// is reconsidered by the next processing pass
    pub fn item_bounds_changed(&mut self, key: u32) {
        self.pending.push_back(PendingChange::BoundChanged(key));
    }

    /// Drops every managed item and the tree with them
    pub fn clear(&mut self) {
        let parameters = *self.octree.parameters();
        self.octree = Octree::new(SceneSet::default(), parameters);
        self.item_nodes.clear();
        self.unbounded_items.clear();
        self.pending.clear();
        self.state = OctreeManagerState::Empty;
    }

    /// Schedules a full rebuild regardless of the incremental state
    pub fn request_rebuild(&mut self) {
        self.state = OctreeManagerState::PendingRebuild;
    }

    /// Rebuilds the tree from scratch and reindexes every item
    pub fn rebuild(&mut self) {
        self.pending.clear();
        self.octree.build_tree();

        self.item_nodes.clear();
        for (node_key, node) in self.octree.nodes.iter() {
            for &item in node.items.iter() {
                self.item_nodes.insert(item, node_key as u32);
            }
        }
        self.unbounded_items = self
            .octree
            .source()
            .keys()
            .into_iter()
            .filter(|&key| {
                self.octree
                    .source()
                    .get(key)
                    .map(|item| item.bounds().is_none())
                    .unwrap_or(false)
            })
            .collect();

        self.state = if self.octree.tree_built() {
            OctreeManagerState::Built
        } else {
            OctreeManagerState::Empty
        };
        log::debug!(
            "octree manager rebuilt: {} indexed, {} unbounded items",
            self.item_nodes.len(),
            self.unbounded_items.len()
        );
    }

    /// Applies the queued structural changes. A pending rebuild, or an
    /// incremental step failing midway, turns the pass into a full rebuild.
    pub fn process_pending(&mut self) {
        match self.state {
            OctreeManagerState::PendingRebuild => self.rebuild(),
            OctreeManagerState::Empty => {
                if !self.pending.is_empty() {
                    self.rebuild();
                }
            }
            OctreeManagerState::Built => {
                while let Some(change) = self.pending.pop_front() {
                    match change {
                        PendingChange::Insert(key) => self.insert_into_tree(key),
                        PendingChange::BoundChanged(key) => self.relocate_item(key),
                    }
                    if self.state == OctreeManagerState::PendingRebuild {
                        self.rebuild();
                        return;
                    }
                }
            }
        }
    }

    /// Provides the closest intersection of the pick ray with the managed
    /// items, merging the tree hit with linear tests over the unbounded items
    pub fn hit_test(
        &self,
        context: &PickContext,
        model_matrix: &Matrix4<f32>,
        ray: &Ray,
        hits: &mut Vec<HitRecord>,
    ) -> bool {
        let mut found = if self.state == OctreeManagerState::Built {
            self.octree.hit_test(context, model_matrix, ray, hits)
        } else {
            self.hit_test_linear(
                &self.octree.source().keys(),
                context,
                model_matrix,
                ray,
                hits,
            )
        };
        if self.state == OctreeManagerState::Built {
            found |= self.hit_test_linear(&self.unbounded_items, context, model_matrix, ray, hits);
        }
        found
    }

    /// Closest point of any managed item to the given position. Without a
    /// built tree every item is consulted linearly, mirroring [OctreeManager::hit_test].
    pub fn find_nearest_point_from_point(
        &self,
        point: &V3c<f32>,
        result: &mut Option<NearestRecord>,
    ) -> bool {
        let mut improved = false;
        let all_keys;
        let linear_keys: &[u32] = if self.state == OctreeManagerState::Built {
            improved = self.octree.find_nearest_point_from_point(point, result);
            &self.unbounded_items
        } else {
            all_keys = self.octree.source().keys();
            &all_keys
        };
        let sphere = BoundingSphere::new(
            *point,
            result.as_ref().map(|r| r.distance).unwrap_or(f32::MAX),
        );
        for &key in linear_keys.iter() {
            if let Some(item) = self.octree.source().get(key) {
                if let Some(mut nearest) = item.nearest_point(&sphere) {
                    if nearest.distance < result.as_ref().map(|r| r.distance).unwrap_or(f32::MAX) {
                        nearest.item_index = key;
                        *result = Some(nearest);
                        improved = true;
                    }
                }
            }
        }
        improved
    }

    /// Wireframe of the managed tree, empty while no tree is built
    pub fn create_line_model(&self) -> Vec<[V3c<f32>; 2]> {
        self.octree.create_line_model()
    }

    /// Bounds of the managed tree root, None while no tree is built
    pub fn root_bounds(&self) -> Option<BoundingBox> {
        self.octree.root_bounds()
    }

    fn hit_test_linear(
        &self,
        keys: &[u32],
        context: &PickContext,
        model_matrix: &Matrix4<f32>,
        ray: &Ray,
        hits: &mut Vec<HitRecord>,
    ) -> bool {
        let mut found = false;
        for &key in keys {
            let item = match self.octree.source().get(key) {
                Some(item) => item,
                None => continue,
            };
            let best_distance = hits.first().map(|hit| hit.distance).unwrap_or(f32::MAX);
            if let Some(mut hit) = item.hit_test(context, model_matrix, ray, best_distance) {
                hit.item_index = key;
                found |= keep_closest(hits, hit);
            }
        }
        found
    }

    /// Inserts one item into the built tree, expanding the root towards the
    /// item while it does not fit. Too many expansions mean the tree bounds
    /// drifted far away from the scene, which a full rebuild handles better.
    fn insert_into_tree(&mut self, key: u32) {
        if !self.octree.tree_built() {
            self.state = OctreeManagerState::PendingRebuild;
            return;
        }
        let mut retries = 0;
        loop {
            if let Some(node) = self.octree.add(key) {
                self.item_nodes.insert(key, node);
                return;
            }
            if retries >= EXPAND_RETRY_LIMIT {
                log::warn!(
                    "incremental insert failed, scheduling rebuild: {}",
                    OctreeError::ExpandFailed { retries }
                );
                self.state = OctreeManagerState::PendingRebuild;
                return;
            }
            retries += 1;
            let item_center = self.octree.source().bounds_of(key).center();
            let root_center = match self.octree.root_bounds() {
                Some(bounds) => bounds.center(),
                None => {
                    self.state = OctreeManagerState::PendingRebuild;
                    return;
                }
            };
            if self.octree.expand(&(item_center - root_center)).is_err() {
                self.state = OctreeManagerState::PendingRebuild;
                return;
            }
        }
    }

    /// Re-homes one item after its bounds changed: items still fitting their
    /// node sink as deep as possible, anything else is removed and re-inserted
    fn relocate_item(&mut self, key: u32) {
        let has_bounds = self
            .octree
            .source()
            .get(key)
            .map(|item| item.bounds().is_some())
            .unwrap_or(false);

        let node = self.item_nodes.get(&key).copied();
        if !has_bounds {
            // the item opted out of spatial indexing
            if let Some(node) = node {
                self.octree.remove_item_from_node(node, key);
                self.octree.shrink();
                self.item_nodes.remove(&key);
            }
            if !self.unbounded_items.contains(&key) {
                self.unbounded_items.push(key);
            }
            return;
        }
        self.unbounded_items.retain(|&unbounded| unbounded != key);

        match node {
            Some(node) if node != key_none_value() && self.octree.node_fits_item(node, key) => {
                if let Some(deeper) = self.octree.push_item_deeper(node, key) {
                    self.item_nodes.insert(key, deeper);
                }
                // sinking an item may leave an expanded root without content
                self.octree.shrink();
            }
            Some(node) => {
                if !self.octree.remove_item_from_node(node, key) {
                    self.octree.remove_safe(key);
                }
                self.item_nodes.remove(&key);
                self.octree.shrink();
                self.insert_into_tree(key);
            }
            None => self.insert_into_tree(key),
        }
    }
}
