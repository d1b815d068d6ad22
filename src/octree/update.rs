use crate::object_pool::key_none_value;
use crate::octree::types::OctreeError;
use crate::octree::{Octree, OctreeNode, OctreeSource};
use crate::spatial::math::vector::V3c;

///####################################################################################
/// Incremental updates
///####################################################################################
impl<S: OctreeSource> Octree<S> {
    /// Inserts one item into the smallest existing node containing it,
    /// splitting the target node further when it exceeds the split threshold.
    /// Returns the key of the node the item ended up in, or None if the item
    /// does not fit the root bounds.
    pub fn add(&mut self, item: u32) -> Option<u32> {
        if !self.tree_built || self.root == key_none_value() {
            return None;
        }
        if !self
            .source
            .fits_in(item, &self.nodes.get(self.root as usize).bounds)
        {
            return None;
        }

        let mut key = self.root;
        loop {
            let (bounds, children) = {
                let node = self.nodes.get(key as usize);
                (node.bounds, node.children)
            };
            let mut next = None;
            for octant in 0..8u8 {
                if self.source.fits_in(item, &bounds.child_bounds_for(octant)) {
                    // missing children are not created here; the item stays
                    // at this level until a split is warranted
                    let child = children[octant as usize];
                    if child != key_none_value() {
                        next = Some(child);
                    }
                    break;
                }
            }
            match next {
                Some(child) => key = child,
                None => break,
            }
        }

        self.nodes.get_mut(key as usize).items.push(item);
        let count = self.nodes.get(key as usize).items.len();
        if count > self.parameters.min_object_size_to_split {
            if let Some(deeper) = self.push_to_child(key, count - 1) {
                return Some(deeper);
            }
        }
        Some(key)
    }

    /// Moves the item at the given position of a node into the deepest child
    /// octant it fits, creating child nodes along the way.
    /// Returns the new home of the item, or None if no child octant fits it.
    pub(crate) fn push_to_child(&mut self, node_key: u32, item_position: usize) -> Option<u32> {
        let mut current = node_key;
        let mut position = item_position;
        let mut moved = None;
        'descend: loop {
            let (bounds, item) = {
                let node = self.nodes.get(current as usize);
                (node.bounds, node.items[position])
            };
            for octant in 0..8u8 {
                let child_bounds = bounds.child_bounds_for(octant);
                if !self.source.fits_in(item, &child_bounds) {
                    continue;
                }
                self.nodes.get_mut(current as usize).items.swap_remove(position);
                let existing = self.nodes.get(current as usize).children[octant as usize];
                let child_key = if existing != key_none_value() {
                    existing
                } else {
                    let child_key = self.nodes.push(OctreeNode {
                        bounds: child_bounds,
                        parent: current,
                        ..Default::default()
                    }) as u32;
                    let node = self.nodes.get_mut(current as usize);
                    node.children[octant as usize] = child_key;
                    node.active |= 1 << octant;
                    child_key
                };
                self.nodes.get_mut(child_key as usize).items.push(item);
                moved = Some(child_key);

                let count = self.nodes.get(child_key as usize).items.len();
                let extents = child_bounds.extents();
                let splittable = extents.x >= self.parameters.minimum_octant_size
                    || extents.y >= self.parameters.minimum_octant_size
                    || extents.z >= self.parameters.minimum_octant_size;
                if count > self.parameters.min_object_size_to_split && splittable {
                    current = child_key;
                    position = count - 1;
                    continue 'descend;
                }
                break 'descend;
            }
            break;
        }
        moved
    }

    /// Attempts to sink the given item from its node into a deeper child,
    /// used after an item shrank within its node. Returns the new home in
    /// case the item moved.
    pub(crate) fn push_item_deeper(&mut self, node_key: u32, item: u32) -> Option<u32> {
        if !self.nodes.key_is_valid(node_key as usize) {
            return None;
        }
        let position = self
            .nodes
            .get(node_key as usize)
            .items
            .iter()
            .position(|&i| i == item)?;
        self.push_to_child(node_key, position)
    }

    /// Doubles the root bounds away from the given direction signs: a negative
    /// component grows the minimum of that axis, otherwise the maximum grows.
    /// The old root becomes the child octant containing its own center, all
    /// existing node keys stay valid. Returns the key of the new root.
    pub fn expand(&mut self, direction: &V3c<f32>) -> Result<u32, OctreeError> {
        if !self.tree_built || self.root == key_none_value() {
            return Err(OctreeError::NotRoot);
        }
        let old_root = self.root;
        if self.nodes.get(old_root as usize).parent != key_none_value() {
            return Err(OctreeError::NotRoot);
        }

        let old_bounds = self.nodes.get(old_root as usize).bounds;
        let extents = old_bounds.extents();
        let mut min_position = old_bounds.min_position;
        let mut max_position = old_bounds.max_position;
        if direction.x < 0. {
            min_position.x -= extents.x;
        } else {
            max_position.x += extents.x;
        }
        if direction.y < 0. {
            min_position.y -= extents.y;
        } else {
            max_position.y += extents.y;
        }
        if direction.z < 0. {
            min_position.z -= extents.z;
        } else {
            max_position.z += extents.z;
        }

        let new_bounds = crate::spatial::BoundingBox::new(min_position, max_position);
        let octant = new_bounds.octant_for_point(&old_bounds.center());
        debug_assert!(new_bounds
            .child_bounds_for(octant)
            .contains_point(&old_bounds.center()));

        let new_root = self.nodes.push(OctreeNode {
            bounds: new_bounds,
            ..Default::default()
        }) as u32;
        {
            let node = self.nodes.get_mut(new_root as usize);
            node.children[octant as usize] = old_root;
            node.active = 1 << octant;
        }
        self.nodes.get_mut(old_root as usize).parent = new_root;
        self.root = new_root;
        log::trace!(
            "octree root expanded to [{:?}, {:?}]",
            min_position,
            max_position
        );
        Ok(new_root)
    }

    /// Collapses the root while it holds no items of its own and has exactly
    /// one populated child, undoing unnecessary expansions.
    /// Returns the key of the remaining root.
    pub fn shrink(&mut self) -> u32 {
        while self.root != key_none_value() {
            let (item_count, active, children) = {
                let node = self.nodes.get(self.root as usize);
                (node.items.len(), node.active, node.children)
            };
            if item_count != 0 || active.count_ones() != 1 {
                break;
            }
            let child = children[active.trailing_zeros() as usize];
            self.nodes.get_mut(child as usize).parent = key_none_value();
            self.nodes.free(self.root as usize);
            self.root = child;
        }
        self.root
    }

    /// Removes one item, locating it by descending along its current bounds.
    /// Misses the item in case its bounds changed since insertion;
    /// use [Octree::remove_safe] for that.
    pub fn remove_by_bound(&mut self, item: u32) -> bool {
        if !self.tree_built || self.root == key_none_value() {
            return false;
        }
        let mut key = self.root;
        loop {
            if let Some(position) = self
                .nodes
                .get(key as usize)
                .items
                .iter()
                .position(|&i| i == item)
            {
                return self.remove_at(key, position);
            }
            let (bounds, children) = {
                let node = self.nodes.get(key as usize);
                (node.bounds, node.children)
            };
            let mut next = key_none_value();
            for octant in 0..8u8 {
                if self.source.fits_in(item, &bounds.child_bounds_for(octant)) {
                    next = children[octant as usize];
                    break;
                }
            }
            if next == key_none_value() {
                return false;
            }
            key = next;
        }
    }

    /// Removes one item by scanning every node, immune to stale item bounds
    pub fn remove_safe(&mut self, item: u32) -> bool {
        let node_keys: Vec<usize> = self.nodes.keys().collect();
        for key in node_keys {
            if let Some(position) = self
                .nodes
                .get(key)
                .items
                .iter()
                .position(|&i| i == item)
            {
                return self.remove_at(key as u32, position);
            }
        }
        false
    }

    /// Removes the item at the given position of a node. With
    /// `auto_delete_if_empty` set, nodes emptied by the removal detach
    /// themselves from their parent chain.
    pub fn remove_at(&mut self, node_key: u32, item_position: usize) -> bool {
        if !self.nodes.key_is_valid(node_key as usize)
            || item_position >= self.nodes.get(node_key as usize).items.len()
        {
            return false;
        }
        self.nodes
            .get_mut(node_key as usize)
            .items
            .swap_remove(item_position);
        if self.parameters.auto_delete_if_empty {
            self.auto_delete_upwards(node_key);
        }
        true
    }

    /// Removes one item from the given node, wherever it sits in the item list
    pub(crate) fn remove_item_from_node(&mut self, node_key: u32, item: u32) -> bool {
        if !self.nodes.key_is_valid(node_key as usize) {
            return false;
        }
        match self
            .nodes
            .get(node_key as usize)
            .items
            .iter()
            .position(|&i| i == item)
        {
            Some(position) => self.remove_at(node_key, position),
            None => false,
        }
    }

    /// Whether the given item still fits the bounds of the given node
    pub(crate) fn node_fits_item(&self, node_key: u32, item: u32) -> bool {
        self.nodes.key_is_valid(node_key as usize)
            && self
                .source
                .fits_in(item, &self.nodes.get(node_key as usize).bounds)
    }

    fn auto_delete_upwards(&mut self, node_key: u32) {
        let mut key = node_key;
        while key != self.root {
            let (item_count, active, parent) = {
                let node = self.nodes.get(key as usize);
                (node.items.len(), node.active, node.parent)
            };
            if item_count != 0 || active != 0 {
                break;
            }
            debug_assert!(parent != key_none_value());
            let parent_node = self.nodes.get_mut(parent as usize);
            for octant in 0..8 {
                if parent_node.children[octant] == key {
                    parent_node.children[octant] = key_none_value();
                    parent_node.active &= !(1u8 << octant);
                    break;
                }
            }
            self.nodes.free(key as usize);
            key = parent;
        }
    }
}
