use crate::object_pool::ObjectPool;
use crate::octree::source::{OctreeSource, SceneItem};
use crate::octree::static_tree::StaticOctree;
use crate::octree::types::{HitRecord, NearestRecord, PickContext};
use crate::octree::Octree;
use crate::spatial::math::vector::V3c;
use crate::spatial::math::{
    closest_point_on_segment, closest_point_on_triangle, closest_points_ray_segment,
    point_segment_distance_2d, project_to_screen, ray_triangle_intersection,
};
use crate::spatial::raytracing::Ray;
use crate::spatial::{BoundingBox, BoundingSphere, FLOAT_ERROR_TOLERANCE};
use nalgebra::Matrix4;

/// A tree over the triangles of one indexed mesh
pub type MeshGeometryOctree = Octree<TriangleSet>;
pub type StaticMeshGeometryOctree = StaticOctree<TriangleSet>;

/// A tree over the segments of one indexed line list
pub type LineGeometryOctree = Octree<LineSet>;

/// A tree over a point cloud
pub type PointGeometryOctree = Octree<PointSet>;

/// A tree over the instances of one repeated geometry
pub type InstancingOctree = Octree<InstanceSet>;

/// A tree over a group of arbitrary boundable scene items
pub type GroupOctree<T> = Octree<SceneSet<T>>;

fn transform_position(matrix: &Matrix4<f32>, position: &V3c<f32>) -> V3c<f32> {
    V3c::from(matrix.transform_point(&nalgebra::Point3::new(
        position.x, position.y, position.z,
    )))
}

///####################################################################################
/// TriangleSet
///####################################################################################

/// An indexed triangle mesh: each item of the tree is one triangle,
/// identified by its index within the index buffer divided by three
#[derive(Default, Clone)]
pub struct TriangleSet {
    positions: Vec<V3c<f32>>,
    indices: Vec<u32>,
}

impl TriangleSet {
    pub fn new(positions: Vec<V3c<f32>>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.len() % 3 == 0);
        Self { positions, indices }
    }

    pub fn positions(&self) -> &[V3c<f32>] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn corner_indices(&self, item: u32) -> [u32; 3] {
        let base = item as usize * 3;
        [
            self.indices[base],
            self.indices[base + 1],
            self.indices[base + 2],
        ]
    }

    fn corners(&self, item: u32) -> (V3c<f32>, V3c<f32>, V3c<f32>) {
        let [i0, i1, i2] = self.corner_indices(item);
        (
            self.positions[i0 as usize],
            self.positions[i1 as usize],
            self.positions[i2 as usize],
        )
    }
}

impl OctreeSource for TriangleSet {
    fn item_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn bounds_of(&self, item: u32) -> BoundingBox {
        let (a, b, c) = self.corners(item);
        let bounds = BoundingBox::from_points([a, b, c].iter());
        // inflated so that axis-aligned triangles keep a nonzero thickness
        BoundingBox::new(
            bounds.min_position - V3c::unit(FLOAT_ERROR_TOLERANCE),
            bounds.max_position + V3c::unit(FLOAT_ERROR_TOLERANCE),
        )
    }

    fn hit_test_items(
        &self,
        items: &[u32],
        _context: &PickContext,
        model_ray: &Ray,
        model_matrix: &Matrix4<f32>,
        world_ray: &Ray,
        best: &mut Option<HitRecord>,
    ) -> bool {
        // normals transform by the inverse transpose of the model matrix,
        // the matrix itself would skew them under nonuniform scale
        let normal_matrix = model_matrix
            .try_inverse()
            .map(|inverse| inverse.transpose())
            .unwrap_or(*model_matrix);
        let mut improved = false;
        for &item in items {
            let (a, b, c) = self.corners(item);
            let model_distance = match ray_triangle_intersection(model_ray, &a, &b, &c) {
                Some(distance) => distance,
                None => continue,
            };
            let model_point = model_ray.point_at(model_distance);
            let world_point = transform_position(model_matrix, &model_point);
            let distance = (world_point - world_ray.origin).length();
            if best.is_none() || distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX) {
                let model_normal = (b - a).cross(c - a);
                let world_normal =
                    V3c::from(normal_matrix.transform_vector(&model_normal.into())).normalized();
                *best = Some(HitRecord {
                    item_index: item,
                    point: world_point,
                    normal: world_normal,
                    distance,
                    ray_t: distance,
                    line_t: 0.,
                    triangle_indices: Some(self.corner_indices(item)),
                });
                improved = true;
            }
        }
        improved
    }

    fn nearest_from_items(
        &self,
        items: &[u32],
        sphere: &BoundingSphere,
        best: &mut Option<NearestRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let (a, b, c) = self.corners(item);
            let point = closest_point_on_triangle(&sphere.center, &a, &b, &c);
            let distance = (point - sphere.center).length();
            if distance <= sphere.radius
                && distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX)
            {
                *best = Some(NearestRecord {
                    item_index: item,
                    point,
                    distance,
                });
                improved = true;
            }
        }
        improved
    }
}

///####################################################################################
/// LineSet
///####################################################################################

/// An indexed line list: each item is one segment, identified by its index
/// within the index buffer divided by two. Hits are gated in screen space by
/// the pixel thickness of the pick, the reported distance is world space.
#[derive(Default, Clone)]
pub struct LineSet {
    positions: Vec<V3c<f32>>,
    indices: Vec<u32>,
}

impl LineSet {
    pub fn new(positions: Vec<V3c<f32>>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.len() % 2 == 0);
        Self { positions, indices }
    }

    pub fn positions(&self) -> &[V3c<f32>] {
        &self.positions
    }

    fn endpoints(&self, item: u32) -> (V3c<f32>, V3c<f32>) {
        let base = item as usize * 2;
        (
            self.positions[self.indices[base] as usize],
            self.positions[self.indices[base + 1] as usize],
        )
    }
}

impl OctreeSource for LineSet {
    fn item_count(&self) -> usize {
        self.indices.len() / 2
    }

    fn bounds_of(&self, item: u32) -> BoundingBox {
        let (start, end) = self.endpoints(item);
        let bounds = BoundingBox::from_points([start, end].iter());
        // a segment has no volume of its own, inflate to a sliver
        BoundingBox::new(
            bounds.min_position - V3c::unit(FLOAT_ERROR_TOLERANCE),
            bounds.max_position + V3c::unit(FLOAT_ERROR_TOLERANCE),
        )
    }

    fn hit_test_items(
        &self,
        items: &[u32],
        context: &PickContext,
        _model_ray: &Ray,
        model_matrix: &Matrix4<f32>,
        world_ray: &Ray,
        best: &mut Option<HitRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let (model_start, model_end) = self.endpoints(item);
            let world_start = transform_position(model_matrix, &model_start);
            let world_end = transform_position(model_matrix, &model_end);

            let screen_start = project_to_screen(
                &world_start,
                &context.view_projection,
                context.screen_width,
                context.screen_height,
            );
            let screen_end = project_to_screen(
                &world_end,
                &context.view_projection,
                context.screen_width,
                context.screen_height,
            );
            let (screen_start, screen_end) = match (screen_start, screen_end) {
                (Some(start), Some(end)) => (start, end),
                _ => continue,
            };
            let (screen_distance, _screen_t) = point_segment_distance_2d(
                context.screen_point,
                (screen_start.x, screen_start.y),
                (screen_end.x, screen_end.y),
            );
            if screen_distance > context.hit_thickness {
                continue;
            }

            let (ray_t, line_t) = closest_points_ray_segment(world_ray, &world_start, &world_end);
            let point = world_ray.point_at(ray_t);
            let distance = (point - world_ray.origin).length();
            if best.is_none() || distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX) {
                *best = Some(HitRecord {
                    item_index: item,
                    point,
                    normal: world_ray.direction * -1.,
                    distance,
                    ray_t,
                    line_t,
                    triangle_indices: None,
                });
                improved = true;
            }
        }
        improved
    }

    fn nearest_from_items(
        &self,
        items: &[u32],
        sphere: &BoundingSphere,
        best: &mut Option<NearestRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let (start, end) = self.endpoints(item);
            let (point, _t) = closest_point_on_segment(&sphere.center, &start, &end);
            let distance = (point - sphere.center).length();
            if distance <= sphere.radius
                && distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX)
            {
                *best = Some(NearestRecord {
                    item_index: item,
                    point,
                    distance,
                });
                improved = true;
            }
        }
        improved
    }
}

///####################################################################################
/// PointSet
///####################################################################################

/// A point cloud: each item is one position. The per-item boxes are inflated
/// by a tolerance as a point has no volume of its own, so octant sorting uses
/// overlap instead of containment.
#[derive(Default, Clone)]
pub struct PointSet {
    positions: Vec<V3c<f32>>,
}

impl PointSet {
    pub fn new(positions: Vec<V3c<f32>>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[V3c<f32>] {
        &self.positions
    }
}

impl OctreeSource for PointSet {
    fn item_count(&self) -> usize {
        self.positions.len()
    }

    fn bounds_of(&self, item: u32) -> BoundingBox {
        let position = self.positions[item as usize];
        BoundingBox::new(
            position - V3c::unit(FLOAT_ERROR_TOLERANCE),
            position + V3c::unit(FLOAT_ERROR_TOLERANCE),
        )
    }

    fn fits_in(&self, item: u32, bounds: &BoundingBox) -> bool {
        bounds.contains_point(&self.positions[item as usize])
    }

    fn hit_test_items(
        &self,
        items: &[u32],
        context: &PickContext,
        _model_ray: &Ray,
        model_matrix: &Matrix4<f32>,
        world_ray: &Ray,
        best: &mut Option<HitRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let world_position = transform_position(model_matrix, &self.positions[item as usize]);
            let screen_position = match project_to_screen(
                &world_position,
                &context.view_projection,
                context.screen_width,
                context.screen_height,
            ) {
                Some(position) => position,
                None => continue,
            };
            let screen_distance = ((screen_position.x - context.screen_point.0).powi(2)
                + (screen_position.y - context.screen_point.1).powi(2))
            .sqrt();
            if screen_distance > context.hit_thickness {
                continue;
            }

            let distance = (world_position - world_ray.origin).length();
            if best.is_none() || distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX) {
                *best = Some(HitRecord {
                    item_index: item,
                    point: world_position,
                    normal: world_ray.direction * -1.,
                    distance,
                    ray_t: distance,
                    line_t: 0.,
                    triangle_indices: None,
                });
                improved = true;
            }
        }
        improved
    }

    fn nearest_from_items(
        &self,
        items: &[u32],
        sphere: &BoundingSphere,
        best: &mut Option<NearestRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let point = self.positions[item as usize];
            let distance = (point - sphere.center).length();
            if distance <= sphere.radius
                && distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX)
            {
                *best = Some(NearestRecord {
                    item_index: item,
                    point,
                    distance,
                });
                improved = true;
            }
        }
        improved
    }
}

///####################################################################################
/// InstanceSet
///####################################################################################

/// Instances of one repeated geometry, each defined by its own transform of a
/// shared base bound. Hits are coarse: the instance's transformed box stands
/// in for its actual geometry.
#[derive(Default, Clone)]
pub struct InstanceSet {
    base_bounds: BoundingBox,
    transforms: Vec<Matrix4<f32>>,
}

impl InstanceSet {
    pub fn new(base_bounds: BoundingBox, transforms: Vec<Matrix4<f32>>) -> Self {
        Self {
            base_bounds,
            transforms,
        }
    }

    pub fn base_bounds(&self) -> &BoundingBox {
        &self.base_bounds
    }

    pub fn transforms(&self) -> &[Matrix4<f32>] {
        &self.transforms
    }
}

impl OctreeSource for InstanceSet {
    fn item_count(&self) -> usize {
        self.transforms.len()
    }

    fn bounds_of(&self, item: u32) -> BoundingBox {
        self.base_bounds
            .transformed(&self.transforms[item as usize])
    }

    fn hit_test_items(
        &self,
        items: &[u32],
        _context: &PickContext,
        model_ray: &Ray,
        model_matrix: &Matrix4<f32>,
        world_ray: &Ray,
        best: &mut Option<HitRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let bounds = self.bounds_of(item);
            let intersection = match bounds.intersect_ray(model_ray) {
                Some(intersection) => intersection,
                None => continue,
            };
            // the ray origin inside the box counts as an immediate hit
            let model_point = model_ray.point_at(intersection.impact_distance.unwrap_or(0.));
            let world_point = transform_position(model_matrix, &model_point);
            let distance = (world_point - world_ray.origin).length();
            if best.is_none() || distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX) {
                *best = Some(HitRecord {
                    item_index: item,
                    point: world_point,
                    normal: world_ray.direction * -1.,
                    distance,
                    ray_t: distance,
                    line_t: 0.,
                    triangle_indices: None,
                });
                improved = true;
            }
        }
        improved
    }

    fn nearest_from_items(
        &self,
        items: &[u32],
        sphere: &BoundingSphere,
        best: &mut Option<NearestRecord>,
    ) -> bool {
        let mut improved = false;
        for &item in items {
            let point = self.bounds_of(item).closest_point(&sphere.center);
            let distance = (point - sphere.center).length();
            if distance <= sphere.radius
                && distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX)
            {
                *best = Some(NearestRecord {
                    item_index: item,
                    point,
                    distance,
                });
                improved = true;
            }
        }
        improved
    }
}

///####################################################################################
/// SceneSet
///####################################################################################

/// A group of arbitrary boundable scene items, stored in an arena so item keys
/// stay valid across insertions and removals. Items without a bounding box are
/// accepted but excluded from the tree; managers hit-test those linearly.
pub struct SceneSet<T: SceneItem> {
    items: ObjectPool<Option<T>>,
}

impl<T: SceneItem> Default for SceneSet<T> {
    fn default() -> Self {
        Self {
            items: ObjectPool::default(),
        }
    }
}

impl<T: SceneItem> SceneSet<T> {
    pub fn insert(&mut self, item: T) -> u32 {
        self.items.push(Some(item)) as u32
    }

    pub fn remove(&mut self, key: u32) -> Option<T> {
        self.items.pop(key as usize).flatten()
    }

    pub fn get(&self, key: u32) -> Option<&T> {
        if self.items.key_is_valid(key as usize) {
            self.items.get(key as usize).as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, key: u32) -> Option<&mut T> {
        if self.items.key_is_valid(key as usize) {
            self.items.get_mut(key as usize).as_mut()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|(_key, item)| item.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every live item key, including the keys of items without bounds
    pub fn keys(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter(|(_key, item)| item.is_some())
            .map(|(key, _item)| key as u32)
            .collect()
    }
}

impl<T: SceneItem> OctreeSource for SceneSet<T> {
    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn item_keys(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter(|(_key, item)| {
                item.as_ref()
                    .map(|item| item.bounds().is_some())
                    .unwrap_or(false)
            })
            .map(|(key, _item)| key as u32)
            .collect()
    }

    fn bounds_of(&self, item: u32) -> BoundingBox {
        self.get(item)
            .and_then(|item| item.bounds())
            .unwrap_or_default()
    }

    fn hit_test_items(
        &self,
        items: &[u32],
        context: &PickContext,
        model_ray: &Ray,
        model_matrix: &Matrix4<f32>,
        world_ray: &Ray,
        best: &mut Option<HitRecord>,
    ) -> bool {
        let mut improved = false;
        for &key in items {
            let item = match self.get(key) {
                Some(item) => item,
                None => continue,
            };
            // box prefilter before delegating to the item's own test
            if let Some(bounds) = item.bounds() {
                if !bounds.intersects_ray(model_ray) {
                    continue;
                }
            }
            let best_distance = best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX);
            if let Some(mut hit) = item.hit_test(context, model_matrix, world_ray, best_distance) {
                if hit.distance < best_distance {
                    hit.item_index = key;
                    *best = Some(hit);
                    improved = true;
                }
            }
        }
        improved
    }

    fn nearest_from_items(
        &self,
        items: &[u32],
        sphere: &BoundingSphere,
        best: &mut Option<NearestRecord>,
    ) -> bool {
        let mut improved = false;
        for &key in items {
            let item = match self.get(key) {
                Some(item) => item,
                None => continue,
            };
            if let Some(mut nearest) = item.nearest_point(sphere) {
                if nearest.distance <= sphere.radius
                    && nearest.distance < best.as_ref().map(|b| b.distance).unwrap_or(f32::MAX)
                {
                    nearest.item_index = key;
                    *best = Some(nearest);
                    improved = true;
                }
            }
        }
        improved
    }
}
