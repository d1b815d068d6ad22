pub mod manager;
pub mod payload;
pub mod source;
pub mod static_tree;
pub mod types;

mod update;

pub use crate::octree::source::{OctreeSource, SceneItem};
pub use crate::octree::types::{
    HitRecord, NearestRecord, OctreeBuildParameter, OctreeError, PickContext,
};
pub use crate::spatial::math::vector::V3c;
pub use crate::spatial::raytracing::Ray;
pub use crate::spatial::{BoundingBox, BoundingSphere};

use crate::object_pool::{key_none_value, ObjectPool};
use nalgebra::Matrix4;

/// One node of a dynamic tree. Nodes are owned by the tree's arena and
/// reference each other through their keys; the parent key is a non-owning
/// back-reference kept consistent with the parent's child slots.
#[derive(Clone, Debug)]
pub(crate) struct OctreeNode {
    pub(crate) bounds: BoundingBox,
    /// Items pinned at this level: their box fits the node but no single child octant
    pub(crate) items: Vec<u32>,
    pub(crate) children: [u32; 8],
    /// Bitmask of the populated child slots; a node has children iff it is nonzero
    pub(crate) active: u8,
    pub(crate) parent: u32,
}

impl Default for OctreeNode {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::default(),
            items: Vec::new(),
            children: [key_none_value(); 8],
            active: 0,
            parent: key_none_value(),
        }
    }
}

/// A mutable octree over the items of an [OctreeSource]: supports incremental
/// insertion and removal, root expansion and shrinking next to the shared
/// ray hit-test and nearest point query families.
pub struct Octree<S: OctreeSource> {
    pub(crate) source: S,
    pub(crate) parameters: OctreeBuildParameter,
    pub(crate) nodes: ObjectPool<OctreeNode>,
    pub(crate) root: u32,
    pub(crate) tree_built: bool,
}

impl<S: OctreeSource> Octree<S> {
    /// Creates the tree in its unbuilt state; call [Octree::build_tree] to populate it
    pub fn new(source: S, parameters: OctreeBuildParameter) -> Self {
        Self {
            source,
            parameters,
            nodes: ObjectPool::default(),
            root: key_none_value(),
            tree_built: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the payload; structural changes to the payload
    /// invalidate the tree and warrant a rebuild or incremental updates
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn parameters(&self) -> &OctreeBuildParameter {
        &self.parameters
    }

    pub fn tree_built(&self) -> bool {
        self.tree_built
    }

    /// Bounds of the root, None while the tree is unbuilt
    pub fn root_bounds(&self) -> Option<BoundingBox> {
        if self.tree_built && self.root != key_none_value() {
            Some(self.nodes.get(self.root as usize).bounds)
        } else {
            None
        }
    }

    pub(crate) fn node(&self, key: u32) -> &OctreeNode {
        self.nodes.get(key as usize)
    }

    /// Discards any previous content and builds the tree from the items the
    /// source currently provides. A degenerate or below-minimum-size root
    /// bound leaves the tree in its unbuildable terminal state instead of
    /// producing an error.
    pub fn build_tree(&mut self) {
        let items = self.source.item_keys();
        self.nodes = ObjectPool::with_capacity(items.len().max(1));
        self.root = key_none_value();
        self.tree_built = false;

        let mut bounds = BoundingBox::default();
        for (index, item) in items.iter().enumerate() {
            let item_bounds = self.source.bounds_of(*item);
            if index == 0 {
                bounds = item_bounds;
            } else {
                bounds.merge_with(&item_bounds);
            }
        }
        if bounds.is_degenerate() || bounds.largest_dimension() < self.parameters.minimum_octant_size
        {
            log::debug!(
                "octree not built: root bound degenerate or below minimum octant size for {} items",
                items.len()
            );
            return;
        }
        if self.parameters.cubify {
            bounds = bounds.cubified();
        }

        #[cfg(feature = "parallel")]
        if self.parameters.enable_parallel_build {
            self.build_tree_parallel(bounds, items);
            self.tree_built = true;
            return;
        }

        let mut stack = Vec::new();
        self.root = build_subtree(
            &mut self.nodes,
            &self.source,
            &self.parameters,
            bounds,
            items,
            &mut stack,
        );
        self.tree_built = true;
        log::trace!("octree built with {} nodes", self.nodes.len());
    }

    /// Builds the subtrees of the root octants on separate workers, each with
    /// its own arena and traversal stack, and grafts them below the root.
    /// Safe because sibling subtrees share no mutable state during construction.
    #[cfg(feature = "parallel")]
    fn build_tree_parallel(&mut self, bounds: BoundingBox, mut items: Vec<u32>) {
        use rayon::prelude::*;

        let octant_items = if should_split(&self.parameters, &bounds, items.len()) {
            partition_items(&self.source, &bounds, &mut items)
        } else {
            Default::default()
        };
        let root = self.nodes.push(OctreeNode {
            bounds,
            items,
            ..Default::default()
        }) as u32;
        self.root = root;

        let subtrees: Vec<(usize, ObjectPool<OctreeNode>, u32)> = octant_items
            .into_iter()
            .enumerate()
            .filter(|(_octant, bucket)| !bucket.is_empty())
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(octant, bucket)| {
                let mut pool = ObjectPool::with_capacity(bucket.len());
                let mut stack = Vec::new();
                let sub_root = build_subtree(
                    &mut pool,
                    &self.source,
                    &self.parameters,
                    bounds.child_bounds_for(octant as u8),
                    bucket,
                    &mut stack,
                );
                (octant, pool, sub_root)
            })
            .collect();

        for (octant, pool, sub_root) in subtrees {
            graft_subtree(&mut self.nodes, root, octant as u8, pool, sub_root);
        }
        log::trace!("octree built in parallel with {} nodes", self.nodes.len());
    }

    /// Provides the closest intersection of the given world space ray with the
    /// contained items. Index 0 of `hits` is replaced in case a hit closer than
    /// the already present one is found; the list never grows beyond one entry.
    pub fn hit_test(
        &self,
        context: &PickContext,
        model_matrix: &Matrix4<f32>,
        ray: &Ray,
        hits: &mut Vec<HitRecord>,
    ) -> bool {
        let mut stack = Vec::new();
        self.hit_test_with_stack(context, model_matrix, ray, hits, &mut stack, None)
    }

    /// Same as [Octree::hit_test] with a caller supplied traversal stack to
    /// avoid per-query allocation, and an optional output for the bounding box
    /// path from the hit node up to the root. The path is only recorded when
    /// the tree was configured with `record_hit_path_bounding_boxes`.
    /// Re-using one stack across concurrent queries is a correctness bug.
    pub fn hit_test_with_stack(
        &self,
        context: &PickContext,
        model_matrix: &Matrix4<f32>,
        ray: &Ray,
        hits: &mut Vec<HitRecord>,
        stack: &mut Vec<u32>,
        hit_path: Option<&mut Vec<BoundingBox>>,
    ) -> bool {
        if !self.tree_built || self.root == key_none_value() {
            return false;
        }
        let inverse_model = match model_matrix.try_inverse() {
            Some(inverse) => inverse,
            // a non-invertible model transform is a benign no-hit, not a fault
            None => return false,
        };
        let model_ray = ray.transformed(&inverse_model);

        let mut best = hits.first().copied();
        let mut best_node = key_none_value();
        stack.clear();
        stack.push(self.root);
        while let Some(key) = stack.pop() {
            let node = self.nodes.get(key as usize);
            if node.bounds.intersect_ray(&model_ray).is_none() {
                // neither this node nor its children can contain a hit
                continue;
            }
            if !node.items.is_empty()
                && self.source.hit_test_items(
                    &node.items,
                    context,
                    &model_ray,
                    model_matrix,
                    ray,
                    &mut best,
                )
            {
                best_node = key;
            }
            if node.active != 0 {
                for &child in node.children.iter() {
                    if child != key_none_value() {
                        stack.push(child);
                    }
                }
            }
        }

        if best_node == key_none_value() {
            return false;
        }
        if self.parameters.record_hit_path_bounding_boxes {
            if let Some(path) = hit_path {
                path.clear();
                let mut key = best_node;
                while key != key_none_value() {
                    path.push(self.nodes.get(key as usize).bounds);
                    key = self.nodes.get(key as usize).parent;
                }
            }
        }
        if let Some(best) = best {
            if hits.is_empty() {
                hits.push(best);
            } else {
                hits[0] = best;
            }
        }
        true
    }

    /// Closest contained point to the center of the given model space sphere,
    /// ignoring anything beyond its radius
    pub fn find_nearest_point_by_sphere(
        &self,
        sphere: &BoundingSphere,
        result: &mut Option<NearestRecord>,
    ) -> bool {
        let mut stack = Vec::new();
        self.find_nearest_with_stack(*sphere, false, result, &mut stack)
    }

    /// Same as [Octree::find_nearest_point_by_sphere] with a caller supplied
    /// traversal stack to avoid per-query allocation
    pub fn find_nearest_point_by_sphere_with_stack(
        &self,
        sphere: &BoundingSphere,
        result: &mut Option<NearestRecord>,
        stack: &mut Vec<u32>,
    ) -> bool {
        self.find_nearest_with_stack(*sphere, false, result, stack)
    }

    /// Closest contained point to the given model space position, searching
    /// the whole tree with a branch-and-bound shrinking radius
    pub fn find_nearest_point_from_point(
        &self,
        point: &V3c<f32>,
        result: &mut Option<NearestRecord>,
    ) -> bool {
        let mut stack = Vec::new();
        self.find_nearest_with_stack(
            BoundingSphere::new(*point, f32::MAX),
            true,
            result,
            &mut stack,
        )
    }

    pub fn find_nearest_point_by_point_and_search_radius(
        &self,
        point: &V3c<f32>,
        radius: f32,
        result: &mut Option<NearestRecord>,
    ) -> bool {
        let mut stack = Vec::new();
        self.find_nearest_with_stack(BoundingSphere::new(*point, radius), true, result, &mut stack)
    }

    pub(crate) fn find_nearest_with_stack(
        &self,
        mut sphere: BoundingSphere,
        shrink_radius: bool,
        result: &mut Option<NearestRecord>,
        stack: &mut Vec<u32>,
    ) -> bool {
        if !self.tree_built || self.root == key_none_value() {
            return false;
        }
        let mut improved = false;
        stack.clear();
        stack.push(self.root);
        while let Some(key) = stack.pop() {
            let node = self.nodes.get(key as usize);
            if !node.bounds.intersects_sphere(&sphere) {
                continue;
            }
            if !node.items.is_empty()
                && self
                    .source
                    .nearest_from_items(&node.items, &sphere, result)
            {
                improved = true;
                if shrink_radius {
                    if let Some(best) = result {
                        // tighten the search after every improvement
                        sphere.radius = best.distance;
                    }
                }
            }
            if node.active != 0 {
                for &child in node.children.iter() {
                    if child != key_none_value() {
                        stack.push(child);
                    }
                }
            }
        }
        improved
    }

    /// Wireframe segments outlining every node box, for visual debugging
    pub fn create_line_model(&self) -> Vec<[V3c<f32>; 2]> {
        let mut segments = Vec::new();
        if !self.tree_built || self.root == key_none_value() {
            return segments;
        }
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let node = self.nodes.get(key as usize);
            segments.extend_from_slice(&node.bounds.edges());
            for &child in node.children.iter() {
                if child != key_none_value() {
                    stack.push(child);
                }
            }
        }
        segments
    }

    /// Number of items currently held by the tree's nodes
    pub fn contained_item_count(&self) -> usize {
        self.nodes.iter().map(|(_key, node)| node.items.len()).sum()
    }

    /// Every item currently held by the tree, in no particular order
    pub fn contained_items(&self) -> Vec<u32> {
        let mut items = Vec::new();
        for (_key, node) in self.nodes.iter() {
            items.extend_from_slice(&node.items);
        }
        items
    }
}

pub(crate) fn should_split(
    parameters: &OctreeBuildParameter,
    bounds: &BoundingBox,
    item_count: usize,
) -> bool {
    if item_count <= 1 || item_count < parameters.min_object_size_to_split {
        return false;
    }
    let extents = bounds.extents();
    extents.x >= parameters.minimum_octant_size
        || extents.y >= parameters.minimum_octant_size
        || extents.z >= parameters.minimum_octant_size
}

/// Drains every item fitting a single child octant out of `items` into the
/// per-octant buckets via in-place swap compaction; the relative order of the
/// remaining items is not preserved.
pub(crate) fn partition_items<S: OctreeSource>(
    source: &S,
    bounds: &BoundingBox,
    items: &mut Vec<u32>,
) -> [Vec<u32>; 8] {
    let child_bounds: [BoundingBox; 8] = core::array::from_fn(|i| bounds.child_bounds_for(i as u8));
    let mut octant_items: [Vec<u32>; 8] = Default::default();
    let mut index = 0;
    while index < items.len() {
        let item = items[index];
        let mut target = None;
        for (octant, bounds) in child_bounds.iter().enumerate() {
            if source.fits_in(item, bounds) {
                target = Some(octant);
                break;
            }
        }
        if let Some(octant) = target {
            octant_items[octant].push(items.swap_remove(index));
        } else {
            index += 1;
        }
    }
    octant_items
}

/// Builds a complete subtree for the given bounds and items into the arena,
/// using the supplied stack for the iterative descent. Returns the subtree root key.
fn build_subtree<S: OctreeSource>(
    nodes: &mut ObjectPool<OctreeNode>,
    source: &S,
    parameters: &OctreeBuildParameter,
    bounds: BoundingBox,
    items: Vec<u32>,
    stack: &mut Vec<u32>,
) -> u32 {
    let root = nodes.push(OctreeNode {
        bounds,
        items,
        ..Default::default()
    }) as u32;
    stack.clear();
    stack.push(root);
    while let Some(key) = stack.pop() {
        let (bounds, item_count) = {
            let node = nodes.get(key as usize);
            (node.bounds, node.items.len())
        };
        if !should_split(parameters, &bounds, item_count) {
            continue;
        }
        let mut items = std::mem::take(&mut nodes.get_mut(key as usize).items);
        let octant_items = partition_items(source, &bounds, &mut items);
        nodes.get_mut(key as usize).items = items;
        for (octant, items) in octant_items.into_iter().enumerate() {
            if items.is_empty() {
                continue;
            }
            let child_key = nodes.push(OctreeNode {
                bounds: bounds.child_bounds_for(octant as u8),
                items,
                parent: key,
                ..Default::default()
            }) as u32;
            let node = nodes.get_mut(key as usize);
            node.children[octant] = child_key;
            node.active |= 1 << octant;
            stack.push(child_key);
        }
    }
    root
}

/// Appends an independently built subtree arena below `parent_key`, remapping
/// every key by the arena offset. Only valid while the target arena is
/// append-only, which holds during the initial build.
#[cfg(feature = "parallel")]
fn graft_subtree(
    nodes: &mut ObjectPool<OctreeNode>,
    parent_key: u32,
    octant: u8,
    mut subtree: ObjectPool<OctreeNode>,
    subtree_root: u32,
) {
    let offset = nodes.len() as u32;
    let count = subtree.len();
    for key in 0..count {
        let mut node = match subtree.pop(key) {
            Some(node) => node,
            None => continue,
        };
        for child in node.children.iter_mut() {
            if *child != key_none_value() {
                *child += offset;
            }
        }
        if node.parent != key_none_value() {
            node.parent += offset;
        }
        let new_key = nodes.push(node) as u32;
        debug_assert_eq!(new_key, offset + key as u32);
    }
    let new_root = subtree_root + offset;
    nodes.get_mut(new_root as usize).parent = parent_key;
    let parent = nodes.get_mut(parent_key as usize);
    parent.children[octant as usize] = new_root;
    parent.active |= 1 << octant;
}
