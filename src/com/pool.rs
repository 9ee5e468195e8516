use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed index of an object living in a [`Pool`].
pub struct Idx<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Idx<T> {
    fn new(index: u32) -> Self {
        Idx {
            index,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Idx<T> {}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Idx<T> {}

impl<T> Hash for Idx<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Free-list allocator for one node type.
///
/// Released slots are recycled in LIFO order, so the speculative nodes created
/// and dropped by every rate-distortion trial reuse the same few slots instead of
/// going through the global allocator.
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Pool::new()
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Pool {
            slots: vec![],
            free: vec![],
            live: 0,
        }
    }

    pub fn alloc(&mut self, obj: T) -> Idx<T> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(obj);
            return Idx::new(index);
        }

        let index = self.slots.len();
        if index >= u32::max_value() as usize {
            panic!("node pool exhausted after {} objects", index);
        }
        self.slots.push(Some(obj));
        Idx::new(index as u32)
    }

    pub fn release(&mut self, idx: Idx<T>) -> T {
        match self.slots.get_mut(idx.index()).and_then(|s| s.take()) {
            Some(obj) => {
                self.free.push(idx.index);
                self.live -= 1;
                obj
            }
            None => panic!("release of unallocated pool slot {:?}", idx),
        }
    }

    #[inline]
    pub fn get(&self, idx: Idx<T>) -> &T {
        match self.slots.get(idx.index()) {
            Some(Some(obj)) => obj,
            _ => panic!("stale pool handle {:?}", idx),
        }
    }

    #[inline]
    pub fn get_mut(&mut self, idx: Idx<T>) -> &mut T {
        match self.slots.get_mut(idx.index()) {
            Some(Some(obj)) => obj,
            _ => panic!("stale pool handle {:?}", idx),
        }
    }

    pub fn contains(&self, idx: Idx<T>) -> bool {
        match self.slots.get(idx.index()) {
            Some(slot) => slot.is_some(),
            None => false,
        }
    }

    /// Number of objects currently allocated.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Number of slots ever created.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
