pub mod vector;

use crate::spatial::math::vector::V3c;
use crate::spatial::raytracing::Ray;
use nalgebra::Matrix4;

///####################################################################################
/// Octant
///####################################################################################

/// Relative position of the given octant inside its parent, each component in {0, 1}
pub(crate) fn offset_region(octant: u8) -> V3c<f32> {
    match octant {
        0 => V3c::new(0., 0., 0.),
        1 => V3c::new(1., 0., 0.),
        2 => V3c::new(0., 0., 1.),
        3 => V3c::new(1., 0., 1.),
        4 => V3c::new(0., 1., 0.),
        5 => V3c::new(1., 1., 0.),
        6 => V3c::new(0., 1., 1.),
        7 => V3c::new(1., 1., 1.),
        _ => panic!("Invalid region hash provided for spatial reference!"),
    }
}

/// Each box is separated to 8 octants based on the relative position inside the occupied space.
/// The hash function assigns an index for each octant, so every child can be indexed in a well defined manner
/// * `offset` - position relative to the minimum corner of the covered space
/// * `half_extents` - half the size of the covered space in each dimension
pub(crate) fn hash_region(offset: &V3c<f32>, half_extents: &V3c<f32>) -> u8 {
    (offset.x >= half_extents.x) as u8
        + (offset.z >= half_extents.z) as u8 * 2
        + (offset.y >= half_extents.y) as u8 * 4
}

///####################################################################################
/// Primitive math
///####################################################################################

/// Closest point to `point` on the segment spanning from `start` to `end`,
/// along with the parametric position of the result on the segment
pub(crate) fn closest_point_on_segment(
    point: &V3c<f32>,
    start: &V3c<f32>,
    end: &V3c<f32>,
) -> (V3c<f32>, f32) {
    let segment = *end - *start;
    let segment_length_squared = segment.length_squared();
    if segment_length_squared <= f32::EPSILON {
        return (*start, 0.);
    }
    let t = ((*point - *start).dot(&segment) / segment_length_squared).clamp(0., 1.);
    (*start + segment * t, t)
}

/// Closest point to `point` on the triangle spanned by the three corners
/// Based on the voronoi region subdivision of the triangle plane
pub(crate) fn closest_point_on_triangle(
    point: &V3c<f32>,
    a: &V3c<f32>,
    b: &V3c<f32>,
    c: &V3c<f32>,
) -> V3c<f32> {
    let ab = *b - *a;
    let ac = *c - *a;
    let ap = *point - *a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0. && d2 <= 0. {
        return *a;
    }

    let bp = *point - *b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0. && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0. && d1 >= 0. && d3 <= 0. {
        let t = d1 / (d1 - d3);
        return *a + ab * t;
    }

    let cp = *point - *c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0. && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0. && d2 >= 0. && d6 <= 0. {
        let t = d2 / (d2 - d6);
        return *a + ac * t;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0. && (d4 - d3) >= 0. && (d5 - d6) >= 0. {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return *b + (*c - *b) * t;
    }

    let denom = 1. / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    *a + ab * v + ac * w
}

/// Intersects the given ray with the triangle spanned by the three corners.
/// Returns the distance from the ray origin along the ray direction, if any.
/// https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm
pub(crate) fn ray_triangle_intersection(
    ray: &Ray,
    a: &V3c<f32>,
    b: &V3c<f32>,
    c: &V3c<f32>,
) -> Option<f32> {
    let edge_1 = *b - *a;
    let edge_2 = *c - *a;
    let h = ray.direction.cross(edge_2);
    let determinant = edge_1.dot(&h);
    if determinant.abs() <= f32::EPSILON {
        // the ray is paralell to the triangle plane
        return None;
    }

    let inverse_determinant = 1. / determinant;
    let s = ray.origin - *a;
    let u = s.dot(&h) * inverse_determinant;
    if !(0. ..=1.).contains(&u) {
        return None;
    }

    let q = s.cross(edge_1);
    let v = ray.direction.dot(&q) * inverse_determinant;
    if v < 0. || (u + v) > 1. {
        return None;
    }

    let d = edge_2.dot(&q) * inverse_determinant;
    if d < 0. {
        // the triangle is behind the ray origin
        return None;
    }
    Some(d)
}

/// Parametric positions of the closest point pair between the ray and the
/// segment spanning from `start` to `end`: distance along the ray and the
/// clamped [0,1] position on the segment
pub(crate) fn closest_points_ray_segment(
    ray: &Ray,
    start: &V3c<f32>,
    end: &V3c<f32>,
) -> (f32, f32) {
    let segment = *end - *start;
    let w = ray.origin - *start;
    let a = ray.direction.dot(&ray.direction);
    let b = ray.direction.dot(&segment);
    let c = segment.dot(&segment);
    let d = ray.direction.dot(&w);
    let e = segment.dot(&w);
    let denominator = a * c - b * b;

    let mut segment_t = if denominator.abs() <= f32::EPSILON {
        // the ray and the segment are paralell
        0.
    } else {
        ((a * e - b * d) / denominator).clamp(0., 1.)
    };
    let mut ray_t = (b * segment_t - d) / a;
    if ray_t < 0. {
        // The closest approach lies behind the ray origin
        ray_t = 0.;
        segment_t = if c.abs() <= f32::EPSILON {
            0.
        } else {
            (e / c).clamp(0., 1.)
        };
    }
    (ray_t, segment_t)
}

/// Projects the given model space position to screen pixel coordinates,
/// the z component carrying the normalized device depth.
/// Returns None in case the position is on or behind the projection plane.
pub(crate) fn project_to_screen(
    position: &V3c<f32>,
    view_projection: &Matrix4<f32>,
    screen_width: f32,
    screen_height: f32,
) -> Option<V3c<f32>> {
    let clip = view_projection * nalgebra::Vector4::new(position.x, position.y, position.z, 1.);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = V3c::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
    Some(V3c::new(
        (ndc.x + 1.) * 0.5 * screen_width,
        (1. - ndc.y) * 0.5 * screen_height,
        ndc.z,
    ))
}

/// Distance of `point` to the segment spanning from `start` to `end` in 2 dimensions,
/// along with the parametric position of the closest point on the segment
pub(crate) fn point_segment_distance_2d(
    point: (f32, f32),
    start: (f32, f32),
    end: (f32, f32),
) -> (f32, f32) {
    let segment = (end.0 - start.0, end.1 - start.1);
    let length_squared = segment.0 * segment.0 + segment.1 * segment.1;
    let t = if length_squared <= f32::EPSILON {
        0.
    } else {
        (((point.0 - start.0) * segment.0 + (point.1 - start.1) * segment.1) / length_squared)
            .clamp(0., 1.)
    };
    let closest = (start.0 + segment.0 * t, start.1 + segment.1 * t);
    let diff = (point.0 - closest.0, point.1 - closest.1);
    ((diff.0 * diff.0 + diff.1 * diff.1).sqrt(), t)
}
