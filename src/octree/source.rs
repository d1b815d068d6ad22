use crate::octree::types::{HitRecord, NearestRecord, PickContext};
use crate::spatial::raytracing::Ray;
use crate::spatial::{BoundingBox, BoundingSphere};
use nalgebra::Matrix4;

/// Capability contract between the generic trees and their payload.
/// A source owns the actual geometry; the trees only ever store item indices
/// and delegate the item level tests back through this trait.
///
/// The trees gate tree descent on node-box/ray (or node-box/sphere)
/// intersection themselves; the hooks here only need to test the items
/// pinned at the visited node.
pub trait OctreeSource: Send + Sync {
    /// Number of item slots in the source; item indices are below this value
    fn item_count(&self) -> usize;

    /// The items a freshly built tree should contain
    fn item_keys(&self) -> Vec<u32> {
        (0..self.item_count() as u32).collect()
    }

    /// Bounding box of the given item in model space
    fn bounds_of(&self, item: u32) -> BoundingBox;

    /// Containment test used to sort items into octants.
    /// Point-like payloads override this with a non-disjoint test, as their
    /// epsilon-inflated boxes are never cleanly containable.
    fn fits_in(&self, item: u32, bounds: &BoundingBox) -> bool {
        bounds.contains_box(&self.bounds_of(item))
    }

    /// Hit test of the items pinned at one node, excluding any children.
    /// `model_ray` is the pick ray transformed into model space, `world_ray`
    /// the original; candidates closer than the current best replace it.
    /// Returns whether the best candidate was replaced.
    fn hit_test_items(
        &self,
        items: &[u32],
        context: &PickContext,
        model_ray: &Ray,
        model_matrix: &Matrix4<f32>,
        world_ray: &Ray,
        best: &mut Option<HitRecord>,
    ) -> bool;

    /// Nearest point search among the items pinned at one node, limited to
    /// the given model space search sphere.
    /// Returns whether the best candidate was replaced.
    fn nearest_from_items(
        &self,
        items: &[u32],
        sphere: &BoundingSphere,
        best: &mut Option<NearestRecord>,
    ) -> bool;
}

/// An arbitrary renderable managed by an octree manager: it can provide a
/// bounding box (or opt out of spatial indexing entirely) and can perform
/// its own ray intersection test.
pub trait SceneItem: Send + Sync {
    /// Bounding box in model space; None opts the item out of the octree,
    /// such items are hit-tested linearly by the manager
    fn bounds(&self) -> Option<BoundingBox>;

    /// The item's own hit test against the pick ray.
    /// Only candidates closer than `best_distance` are worth reporting.
    fn hit_test(
        &self,
        context: &PickContext,
        model_matrix: &Matrix4<f32>,
        ray: &Ray,
        best_distance: f32,
    ) -> Option<HitRecord>;

    /// Closest point of the item to the center of the search sphere, if
    /// it is within the sphere
    fn nearest_point(&self, sphere: &BoundingSphere) -> Option<NearestRecord> {
        let _ = sphere;
        None
    }
}
