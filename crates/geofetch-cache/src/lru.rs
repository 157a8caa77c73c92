use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

struct Slot<V> {
    value: V,
    stamp: u64,
}

/// Bounded least-recently-used map.
///
/// Every `get`, `touch` or `insert` marks the entry as most recently used.
/// Inserting past capacity evicts the least recently used entry. Capacity is
/// clamped to at least one entry.
pub struct LruCache<K, V> {
    capacity: usize,
    clock: u64,
    slots: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
}

impl<K: Clone + Eq + Hash, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: 0,
            slots: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Return a copy of the value and mark it as recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.promote(key)?;
        self.slots.get(key).map(|slot| slot.value.clone())
    }

    /// Mark an entry as recently used. Returns `false` if it is not present.
    pub fn touch(&mut self, key: &K) -> bool {
        self.promote(key).is_some()
    }

    /// Mutable access to a value, marking it as recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.promote(key)?;
        self.slots.get_mut(key).map(|slot| &mut slot.value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        let stamp = self.tick();
        if let Some(previous) = self.slots.insert(key.clone(), Slot { value, stamp }) {
            self.order.remove(&previous.stamp);
        }
        self.order.insert(stamp, key);

        while self.slots.len() > self.capacity {
            self.evict_oldest();
        }
    }

    pub fn erase(&mut self, key: &K) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.stamp);
                true
            }
            None => false,
        }
    }

    /// Return the cached value, or run `produce` to create one.
    ///
    /// `produce` receives an empty slot; leaving it `None` inserts nothing
    /// and the call returns `None`.
    pub fn get_or_insert<F>(&mut self, key: K, produce: F) -> Option<V>
    where
        F: FnOnce(&mut Option<V>),
    {
        if let Some(value) = self.get(&key) {
            return Some(value);
        }

        let mut produced = None;
        produce(&mut produced);
        let value = produced?;
        self.insert(key, value.clone());
        Some(value)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
    }

    fn promote(&mut self, key: &K) -> Option<()> {
        let stamp = self.tick();
        let slot = self.slots.get_mut(key)?;
        self.order.remove(&slot.stamp);
        slot.stamp = stamp;
        self.order.insert(stamp, key.clone());
        Some(())
    }

    fn evict_oldest(&mut self) {
        if let Some((_, oldest)) = self.order.pop_first() {
            self.slots.remove(&oldest);
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}
