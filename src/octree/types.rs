use crate::spatial::math::vector::V3c;
use nalgebra::Matrix4;
use std::error::Error;
use std::fmt;

/// Configuration of a tree, read during build and during incremental updates.
/// A tree keeps the parameters it was constructed with; changing the
/// configuration means constructing a new tree with the new values.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OctreeBuildParameter {
    /// No octant is subdivided below this size; subdivision bottoms out once
    /// every dimension of a box is smaller
    pub minimum_octant_size: f32,

    /// A node holding not more objects than this keeps them instead of splitting
    pub min_object_size_to_split: usize,

    /// Nodes emptied by removals detach themselves from their parent
    pub auto_delete_if_empty: bool,

    /// Replace the root bounds with the smallest enclosing cube before building
    pub cubify: bool,

    /// Hit-test additionally reports the bounding box path from the hit node
    /// up to the root, for visual debugging
    pub record_hit_path_bounding_boxes: bool,

    /// Build the subtrees of the root on separate workers
    pub enable_parallel_build: bool,
}

impl Default for OctreeBuildParameter {
    fn default() -> Self {
        Self {
            minimum_octant_size: 1.,
            min_object_size_to_split: 2,
            auto_delete_if_empty: true,
            cubify: false,
            record_hit_path_bounding_boxes: false,
            enable_parallel_build: false,
        }
    }
}

/// error types during usage of the trees
#[derive(Debug)]
pub enum OctreeError {
    /// Expand was called for a node which is not the root of its tree
    NotRoot,
    /// Root expansion did not reach the target bounds within the retry limit
    ExpandFailed { retries: usize },
}

impl fmt::Display for OctreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OctreeError::NotRoot => write!(f, "expand is only valid for the root of a tree"),
            OctreeError::ExpandFailed { retries } => {
                write!(f, "root expansion failed after {} retries", retries)
            }
        }
    }
}

impl Error for OctreeError {}

/// Everything the screen space hit tests need from the renderer:
/// the current view-projection matrix, the viewport size and the position
/// the pick ray was fired from, in pixels.
#[derive(Debug, Clone, Copy)]
pub struct PickContext {
    pub view_projection: Matrix4<f32>,
    pub screen_width: f32,
    pub screen_height: f32,
    /// The pick position on screen the ray was generated from
    pub screen_point: (f32, f32),
    /// Pixel tolerance for primitives without volume (lines, points)
    pub hit_thickness: f32,
}

impl Default for PickContext {
    fn default() -> Self {
        Self {
            view_projection: Matrix4::identity(),
            screen_width: 1.,
            screen_height: 1.,
            screen_point: (0., 0.),
            hit_thickness: 4.,
        }
    }
}

/// A single hit candidate. Queries keep only the closest one:
/// index 0 of the result list is replaced whenever a closer hit is found.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitRecord {
    /// Index of the hit item within its payload set
    pub item_index: u32,
    /// Impact point in world space
    pub point: V3c<f32>,
    /// Surface normal at the impact point in world space
    pub normal: V3c<f32>,
    /// World space distance from the ray origin to the impact point
    pub distance: f32,
    /// Parametric position of the impact along the ray
    pub ray_t: f32,
    /// Parametric position of the impact along a line segment, zero for other payloads
    pub line_t: f32,
    /// The three vertex indices of the hit triangle, for mesh payloads
    pub triangle_indices: Option<[u32; 3]>,
}

/// The result of a nearest point query, one per query (closest-point contract)
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestRecord {
    pub item_index: u32,
    pub point: V3c<f32>,
    pub distance: f32,
}

/// Replaces the single kept result in case the new candidate is closer.
/// Returns whether a replacement happened.
pub(crate) fn keep_closest(hits: &mut Vec<HitRecord>, candidate: HitRecord) -> bool {
    match hits.first() {
        Some(best) if best.distance <= candidate.distance => false,
        Some(_) => {
            hits[0] = candidate;
            true
        }
        None => {
            hits.push(candidate);
            true
        }
    }
}
