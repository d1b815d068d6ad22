use crate::spatial::{math::vector::V3c, BoundingBox};
use nalgebra::Matrix4;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: V3c<f32>,
    pub direction: V3c<f32>,
}

impl Ray {
    pub fn new(origin: V3c<f32>, direction: V3c<f32>) -> Self {
        Self { origin, direction }
    }

    pub fn is_valid(&self) -> bool {
        (1. - self.direction.length()).abs() < 0.000001
    }

    pub fn point_at(&self, d: f32) -> V3c<f32> {
        self.origin + self.direction * d
    }

    /// The ray transformed by the given matrix; the direction is deliberately
    /// not re-normalized so that parameter values keep lining up with the
    /// transformed origin
    pub fn transformed(&self, transform: &Matrix4<f32>) -> Ray {
        Ray {
            origin: V3c::from(transform.transform_point(&nalgebra::Point3::from(self.origin))),
            direction: V3c::from(
                transform.transform_vector(&nalgebra::Vector3::from(self.direction)),
            ),
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct BoxRayIntersection {
    /// Distance from the ray origin to the point of entry;
    /// None in case the origin is already inside the box
    pub(crate) impact_distance: Option<f32>,
}

impl BoundingBox {
    /// Tells the intersection with the box of the given ray.
    /// Returns the distance from the origin along the direction of the ray until the hit point
    /// https://gamedev.stackexchange.com/questions/18436/most-efficient-aabb-vs-ray-collision-algorithms
    pub fn intersect_ray(&self, ray: &Ray) -> Option<BoxRayIntersection> {
        let origin = [ray.origin.x, ray.origin.y, ray.origin.z];
        let direction = [ray.direction.x, ray.direction.y, ray.direction.z];
        let min_position = [self.min_position.x, self.min_position.y, self.min_position.z];
        let max_position = [self.max_position.x, self.max_position.y, self.max_position.z];

        let mut tmin = f32::MIN;
        let mut tmax = f32::MAX;
        for axis in 0..3 {
            if direction[axis] == 0. {
                // the ray runs parallel to this slab; a division would turn an
                // origin exactly on the slab boundary into NaN, so the slab is
                // tested by membership instead
                if origin[axis] < min_position[axis] || max_position[axis] < origin[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (min_position[axis] - origin[axis]) / direction[axis];
            let t2 = (max_position[axis] - origin[axis]) / direction[axis];
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }

        if tmax < 0. || tmin > tmax {
            // ray is intersecting the box, but it is behind it
            // OR ray doesn't intersect the box
            return None;
        }

        if tmin < 0.0 {
            return Some(BoxRayIntersection {
                impact_distance: None,
            });
        }

        Some(BoxRayIntersection {
            impact_distance: Some(tmin),
        })
    }

    pub fn intersects_ray(&self, ray: &Ray) -> bool {
        self.intersect_ray(ray).is_some()
    }
}
