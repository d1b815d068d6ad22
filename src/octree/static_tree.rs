use crate::object_pool::key_none_value;
use crate::octree::source::OctreeSource;
use crate::octree::types::{HitRecord, NearestRecord, OctreeBuildParameter, PickContext};
use crate::octree::should_split;
use crate::spatial::math::vector::V3c;
use crate::spatial::raytracing::Ray;
use crate::spatial::{BoundingBox, BoundingSphere};
use nalgebra::Matrix4;

/// One octant of a static tree. It does not own its items: it references a
/// contiguous `[start, end)` slice of the tree's shared item array, which
/// holds the items pinned at this octant after the build.
#[derive(Clone, Copy, Debug)]
struct StaticOctant {
    bounds: BoundingBox,
    start: u32,
    end: u32,
    children: [u32; 8],
    active: u8,
    parent: u32,
}

impl StaticOctant {
    fn new(bounds: BoundingBox, start: u32, end: u32, parent: u32) -> Self {
        Self {
            bounds,
            start,
            end,
            children: [key_none_value(); 8],
            active: 0,
            parent,
        }
    }
}

/// An immutable octree over the items of an [OctreeSource], built once into
/// two flat arrays: the octants and a single shared item array the octants
/// slice into. No per-node item lists, no incremental updates; any change to
/// the payload warrants a full rebuild.
pub struct StaticOctree<S: OctreeSource> {
    source: S,
    parameters: OctreeBuildParameter,
    octants: Vec<StaticOctant>,
    /// All indexed items, reordered during the build so that each octant's
    /// items are contiguous
    sorted_items: Vec<u32>,
    tree_built: bool,
}

impl<S: OctreeSource> StaticOctree<S> {
    pub fn new(source: S, parameters: OctreeBuildParameter) -> Self {
        Self {
            source,
            parameters,
            octants: Vec::new(),
            sorted_items: Vec::new(),
            tree_built: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn parameters(&self) -> &OctreeBuildParameter {
        &self.parameters
    }

    pub fn tree_built(&self) -> bool {
        self.tree_built
    }

    pub fn root_bounds(&self) -> Option<BoundingBox> {
        if self.tree_built && !self.octants.is_empty() {
            Some(self.octants[0].bounds)
        } else {
            None
        }
    }

    pub fn octant_count(&self) -> usize {
        self.octants.len()
    }

    pub fn contained_item_count(&self) -> usize {
        self.sorted_items.len()
    }

    /// Discards any previous content and builds the tree from the items the
    /// source currently provides. Each split moves the items fitting a child
    /// octant to the back of the current range via swaps, so a child's slice
    /// is carved off the tail without any temporary item lists.
    pub fn build_tree(&mut self) {
        self.octants.clear();
        self.sorted_items = self.source.item_keys();
        self.tree_built = false;

        let mut bounds = BoundingBox::default();
        for (index, item) in self.sorted_items.iter().enumerate() {
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
                "static octree not built: root bound degenerate or below minimum octant size for {} items",
                self.sorted_items.len()
            );
            return;
        }
        if self.parameters.cubify {
            bounds = bounds.cubified();
        }

        self.octants.push(StaticOctant::new(
            bounds,
            0,
            self.sorted_items.len() as u32,
            key_none_value(),
        ));
        let mut stack = vec![0u32];
        while let Some(key) = stack.pop() {
            let (bounds, start, end) = {
                let octant = &self.octants[key as usize];
                (octant.bounds, octant.start, octant.end)
            };
            if !should_split(&self.parameters, &bounds, (end - start) as usize) {
                continue;
            }
            let mut range_end = end;
            for octant in 0..8u8 {
                let child_bounds = bounds.child_bounds_for(octant);
                let mut child_start = range_end;
                let mut index = range_end;
                // backward scan: fitting items bubble to the tail of the range,
                // unscanned items stay below `index`
                while index > start {
                    index -= 1;
                    if self
                        .source
                        .fits_in(self.sorted_items[index as usize], &child_bounds)
                    {
                        child_start -= 1;
                        self.sorted_items
                            .swap(index as usize, child_start as usize);
                    }
                }
                if child_start < range_end {
                    let child_key = self.octants.len() as u32;
                    self.octants
                        .push(StaticOctant::new(child_bounds, child_start, range_end, key));
                    let node = &mut self.octants[key as usize];
                    node.children[octant as usize] = child_key;
                    node.active |= 1 << octant;
                    stack.push(child_key);
                    range_end = child_start;
                }
            }
            // what the children left behind stays pinned at this octant
            self.octants[key as usize].end = range_end;
        }
        self.tree_built = true;
        log::trace!(
            "static octree built with {} octants over {} items",
            self.octants.len(),
            self.sorted_items.len()
        );
    }

    /// Provides the closest intersection of the given world space ray with the
    /// contained items, with the same single-kept-hit contract as the dynamic
    /// trees: index 0 of `hits` is replaced by any closer hit.
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

    /// Same as [StaticOctree::hit_test] with a caller supplied traversal stack
    /// and an optional output for the bounding box path from the hit octant up
    /// to the root, recorded when `record_hit_path_bounding_boxes` is set.
    pub fn hit_test_with_stack(
        &self,
        context: &PickContext,
        model_matrix: &Matrix4<f32>,
        ray: &Ray,
        hits: &mut Vec<HitRecord>,
        stack: &mut Vec<u32>,
        hit_path: Option<&mut Vec<BoundingBox>>,
    ) -> bool {
        if !self.tree_built || self.octants.is_empty() {
            return false;
        }
        let inverse_model = match model_matrix.try_inverse() {
            Some(inverse) => inverse,
            None => return false,
        };
        let model_ray = ray.transformed(&inverse_model);

        let mut best = hits.first().copied();
        let mut best_octant = key_none_value();
        stack.clear();
        stack.push(0);
        while let Some(key) = stack.pop() {
            let octant = &self.octants[key as usize];
            if octant.bounds.intersect_ray(&model_ray).is_none() {
                continue;
            }
            let items = &self.sorted_items[octant.start as usize..octant.end as usize];
            if !items.is_empty()
                && self.source.hit_test_items(
                    items,
                    context,
                    &model_ray,
                    model_matrix,
                    ray,
                    &mut best,
                )
            {
                best_octant = key;
            }
            if octant.active != 0 {
                for &child in octant.children.iter() {
                    if child != key_none_value() {
                        stack.push(child);
                    }
                }
            }
        }

        if best_octant == key_none_value() {
            return false;
        }
        if self.parameters.record_hit_path_bounding_boxes {
            if let Some(path) = hit_path {
                path.clear();
                let mut key = best_octant;
                while key != key_none_value() {
                    path.push(self.octants[key as usize].bounds);
                    key = self.octants[key as usize].parent;
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

    /// Same as [StaticOctree::find_nearest_point_by_sphere] with a caller
    /// supplied traversal stack to avoid per-query allocation
    pub fn find_nearest_point_by_sphere_with_stack(
        &self,
        sphere: &BoundingSphere,
        result: &mut Option<NearestRecord>,
        stack: &mut Vec<u32>,
    ) -> bool {
        self.find_nearest_with_stack(*sphere, false, result, stack)
    }

    /// Closest contained point to the given model space position
    pub fn find_nearest_point_from_point(
        &self,
        point: &V3c<f32>,
        result: &mut Option<NearestRecord>,
    ) -> bool {
        let mut stack = Vec::new();
        self.find_nearest_with_stack(BoundingSphere::new(*point, f32::MAX), true, result, &mut stack)
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

    fn find_nearest_with_stack(
        &self,
        mut sphere: BoundingSphere,
        shrink_radius: bool,
        result: &mut Option<NearestRecord>,
        stack: &mut Vec<u32>,
    ) -> bool {
        if !self.tree_built || self.octants.is_empty() {
            return false;
        }
        let mut improved = false;
        stack.clear();
        stack.push(0);
        while let Some(key) = stack.pop() {
            let octant = &self.octants[key as usize];
            if !octant.bounds.intersects_sphere(&sphere) {
                continue;
            }
            let items = &self.sorted_items[octant.start as usize..octant.end as usize];
            if !items.is_empty() && self.source.nearest_from_items(items, &sphere, result) {
                improved = true;
                if shrink_radius {
                    if let Some(best) = result {
                        sphere.radius = best.distance;
                    }
                }
            }
            if octant.active != 0 {
                for &child in octant.children.iter() {
                    if child != key_none_value() {
                        stack.push(child);
                    }
                }
            }
        }
        improved
    }

    /// Wireframe segments outlining every octant box, for visual debugging
    pub fn create_line_model(&self) -> Vec<[V3c<f32>; 2]> {
        let mut segments = Vec::new();
        if self.tree_built {
            for octant in self.octants.iter() {
                segments.extend_from_slice(&octant.bounds.edges());
            }
        }
        segments
    }
}
