use std::vec::Vec;

/// One item in a datapool with a used flag
#[derive(Default, Clone)]
struct ReusableItem<T> {
    reserved: bool,
    item: T,
}

/// The key value signifying "no item" wherever keys are stored
pub(crate) fn key_none_value() -> u32 {
    u32::MAX
}

///####################################################################################
/// ObjectPool
///####################################################################################

/// Stores re-usable objects to eliminate allocation overhead when inserting and removing Nodes
#[derive(Default, Clone)]
pub(crate) struct ObjectPool<T> {
    buffer: Vec<ReusableItem<T>>, // Pool of objects to be reused
    first_available: usize,       // the index of the first available item
}

#[allow(dead_code)] // Object implemented for universal usage
impl<T> ObjectPool<T>
where
    T: Default,
{
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        ObjectPool {
            buffer: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    fn is_next_available(&mut self) -> bool {
        self.first_available + 1 < self.buffer.len()
            && !self.buffer[self.first_available + 1].reserved
    }

    fn check_first_available(&mut self) -> bool {
        if self.first_available < self.buffer.len() && !self.buffer[self.first_available].reserved {
            true
        } else if self.is_next_available() {
            self.first_available += 1;
            true
        } else {
            self.first_available = self.buffer.len();
            false
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn push(&mut self, item: T) -> usize {
        let key = self.allocate();
        *self.get_mut(key) = item;
        key
    }

    pub(crate) fn allocate(&mut self) -> usize {
        let key = if self.check_first_available() {
            self.buffer[self.first_available].reserved = true;
            self.first_available
        } else {
            // mark the slot as reserved and return with the key
            self.buffer.push(ReusableItem {
                reserved: true,
                item: T::default(),
            });
            self.buffer.len() - 1
        };
        if self.is_next_available() {
            self.first_available += 1;
        }
        key
    }

    pub(crate) fn pop(&mut self, key: usize) -> Option<T> {
        if self.key_is_valid(key) {
            self.buffer[key].reserved = false;
            self.first_available = self.first_available.min(key);
            Some(std::mem::take(&mut self.buffer[key].item))
        } else {
            None
        }
    }

    pub(crate) fn free(&mut self, key: usize) -> bool {
        if self.key_is_valid(key) {
            self.buffer[key].reserved = false;
            self.first_available = self.first_available.min(key);
            true
        } else {
            false
        }
    }

    pub(crate) fn get(&self, key: usize) -> &T {
        debug_assert!(self.key_is_valid(key));
        &self.buffer[key].item
    }

    pub(crate) fn get_mut(&mut self, key: usize) -> &mut T {
        debug_assert!(self.key_is_valid(key));
        &mut self.buffer[key].item
    }

    pub(crate) fn key_is_valid(&self, key: usize) -> bool {
        key < self.buffer.len() && self.buffer[key].reserved
    }

    /// Iterates the reserved slots together with their key values
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.buffer
            .iter()
            .enumerate()
            .filter(|(_key, slot)| slot.reserved)
            .map(|(key, slot)| (key, &slot.item))
    }

    /// Iterates the reserved keys without borrowing the items
    pub(crate) fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.buffer
            .iter()
            .enumerate()
            .filter(|(_key, slot)| slot.reserved)
            .map(|(key, _slot)| key)
    }
}
