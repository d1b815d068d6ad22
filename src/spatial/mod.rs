pub mod math;
pub mod raytracing;
pub mod tests;

use crate::spatial::math::{hash_region, offset_region, vector::V3c};
use nalgebra::Matrix4;

pub(crate) const FLOAT_ERROR_TOLERANCE: f32 = 0.00001;

/// Axis aligned box given by its minimum and maximum corners.
/// A box where the two corners coincide is a degenerate "no content yet" sentinel,
/// it is not a valid region to build a tree from.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BoundingBox {
    pub min_position: V3c<f32>,
    pub max_position: V3c<f32>,
}

impl BoundingBox {
    pub fn new(min_position: V3c<f32>, max_position: V3c<f32>) -> Self {
        Self {
            min_position,
            max_position,
        }
    }

    /// Smallest box containing every given point; the degenerate sentinel for an empty input
    pub fn from_points<'a, I: IntoIterator<Item = &'a V3c<f32>>>(points: I) -> Self {
        let mut points = points.into_iter();
        let first = match points.next() {
            Some(point) => *point,
            None => return Self::default(),
        };
        let mut result = Self::new(first, first);
        for point in points {
            result.min_position = result.min_position.min_by_component(*point);
            result.max_position = result.max_position.max_by_component(*point);
        }
        result
    }

    pub fn center(&self) -> V3c<f32> {
        (self.min_position + self.max_position) * 0.5
    }

    /// Full size of the box in each dimension
    pub fn extents(&self) -> V3c<f32> {
        self.max_position - self.min_position
    }

    pub fn half_extents(&self) -> V3c<f32> {
        self.extents() * 0.5
    }

    pub fn largest_dimension(&self) -> f32 {
        let extents = self.extents();
        extents.x.max(extents.y).max(extents.z)
    }

    pub fn is_degenerate(&self) -> bool {
        self.extents().length_squared() <= FLOAT_ERROR_TOLERANCE
    }

    /// Grows the box to contain the other box as well
    pub fn merge_with(&mut self, other: &BoundingBox) {
        self.min_position = self.min_position.min_by_component(other.min_position);
        self.max_position = self.max_position.max_by_component(other.max_position);
    }

    /// True if the given point is inside the box. Edges included
    pub fn contains_point(&self, point: &V3c<f32>) -> bool {
        (point.x >= self.min_position.x - FLOAT_ERROR_TOLERANCE)
            && (point.x <= self.max_position.x + FLOAT_ERROR_TOLERANCE)
            && (point.y >= self.min_position.y - FLOAT_ERROR_TOLERANCE)
            && (point.y <= self.max_position.y + FLOAT_ERROR_TOLERANCE)
            && (point.z >= self.min_position.z - FLOAT_ERROR_TOLERANCE)
            && (point.z <= self.max_position.z + FLOAT_ERROR_TOLERANCE)
    }

    /// True if the other box lies fully inside the box. Edges included
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.contains_point(&other.min_position) && self.contains_point(&other.max_position)
    }

    /// True if the two boxes share any point of space
    pub fn intersects_box(&self, other: &BoundingBox) -> bool {
        (self.min_position.x <= other.max_position.x + FLOAT_ERROR_TOLERANCE)
            && (self.max_position.x >= other.min_position.x - FLOAT_ERROR_TOLERANCE)
            && (self.min_position.y <= other.max_position.y + FLOAT_ERROR_TOLERANCE)
            && (self.max_position.y >= other.min_position.y - FLOAT_ERROR_TOLERANCE)
            && (self.min_position.z <= other.max_position.z + FLOAT_ERROR_TOLERANCE)
            && (self.max_position.z >= other.min_position.z - FLOAT_ERROR_TOLERANCE)
    }

    /// The point of the box closest to the given point
    pub fn closest_point(&self, point: &V3c<f32>) -> V3c<f32> {
        point
            .max_by_component(self.min_position)
            .min_by_component(self.max_position)
    }

    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        let closest = self.closest_point(&sphere.center);
        (closest - sphere.center).length_squared() <= sphere.radius * sphere.radius
    }

    /// The smallest enclosing cube sharing the center of the box
    pub fn cubified(&self) -> BoundingBox {
        let half_side = self.largest_dimension() * 0.5;
        let center = self.center();
        BoundingBox::new(
            center - V3c::unit(half_side),
            center + V3c::unit(half_side),
        )
    }

    /// Creates a bounding box for the given octant within the area described by the box
    pub fn child_bounds_for(&self, octant: u8) -> BoundingBox {
        let half_extents = self.half_extents();
        let child_min = self.min_position + (offset_region(octant) * half_extents);
        BoundingBox::new(child_min, child_min + half_extents)
    }

    /// Octant value of the child region the given point falls into
    pub(crate) fn octant_for_point(&self, point: &V3c<f32>) -> u8 {
        hash_region(&(*point - self.min_position), &self.half_extents())
    }

    pub fn corners(&self) -> [V3c<f32>; 8] {
        let min = self.min_position;
        let max = self.max_position;
        [
            V3c::new(min.x, min.y, min.z),
            V3c::new(max.x, min.y, min.z),
            V3c::new(min.x, max.y, min.z),
            V3c::new(max.x, max.y, min.z),
            V3c::new(min.x, min.y, max.z),
            V3c::new(max.x, min.y, max.z),
            V3c::new(min.x, max.y, max.z),
            V3c::new(max.x, max.y, max.z),
        ]
    }

    /// The 12 edges of the box as segment endpoint pairs, for wireframe display
    pub fn edges(&self) -> [[V3c<f32>; 2]; 12] {
        let c = self.corners();
        [
            [c[0], c[1]],
            [c[2], c[3]],
            [c[4], c[5]],
            [c[6], c[7]],
            [c[0], c[2]],
            [c[1], c[3]],
            [c[4], c[6]],
            [c[5], c[7]],
            [c[0], c[4]],
            [c[1], c[5]],
            [c[2], c[6]],
            [c[3], c[7]],
        ]
    }

    /// Axis aligned bounds of the box transformed by the given matrix
    pub fn transformed(&self, transform: &Matrix4<f32>) -> BoundingBox {
        let corners = self.corners();
        let mut transformed_corners = [V3c::default(); 8];
        for (i, corner) in corners.iter().enumerate() {
            transformed_corners[i] =
                V3c::from(transform.transform_point(&nalgebra::Point3::from(*corner)));
        }
        BoundingBox::from_points(transformed_corners.iter())
    }
}

#[derive(Default, Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BoundingSphere {
    pub center: V3c<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: V3c<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains_point(&self, point: &V3c<f32>) -> bool {
        (*point - self.center).length_squared() <= self.radius * self.radius
    }

    /// True if the ray passes within the radius of the center
    pub fn intersects_ray(&self, ray: &raytracing::Ray) -> bool {
        let to_center = self.center - ray.origin;
        let projection = to_center.dot(&ray.direction) / ray.direction.length_squared();
        let closest = ray.point_at(projection.max(0.));
        self.contains_point(&closest)
    }
}
