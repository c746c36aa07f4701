use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Opaque reference to a renderable object in the scene.
///
/// The generation makes handles to despawned actors detectably stale even
/// after their slot has been recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorHandle {
    id: u32,
    generation: u32,
}

impl ActorHandle {
    pub fn new(id: u32, generation: u32) -> Self {
        ActorHandle { id, generation }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// Hands out actor handles, recycling slots of released actors
#[derive(Debug)]
pub struct HandleAllocator {
    next_id: u32,
    generations: Vec<u32>,
    recycled_ids: VecDeque<u32>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        HandleAllocator {
            next_id: 0,
            generations: Vec::new(),
            recycled_ids: VecDeque::new(),
        }
    }

    /// Allocate a handle, reusing a released slot when one is available
    pub fn allocate(&mut self) -> ActorHandle {
        if let Some(recycled_id) = self.recycled_ids.pop_front() {
            let generation = self.generations[recycled_id as usize];
            ActorHandle::new(recycled_id, generation)
        } else {
            let id = self.next_id;
            self.next_id += 1;
            if id as usize >= self.generations.len() {
                self.generations.resize(id as usize + 1, 0);
            }
            ActorHandle::new(id, 0)
        }
    }

    /// Release a handle. Returns false if it was already stale.
    pub fn release(&mut self, handle: ActorHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        let id = handle.id() as usize;
        // Bumping the generation invalidates every outstanding copy of the handle
        self.generations[id] = self.generations[id].wrapping_add(1);
        self.recycled_ids.push_back(handle.id());
        true
    }

    /// A handle is live while its generation matches its slot's generation
    pub fn is_live(&self, handle: ActorHandle) -> bool {
        match self.generations.get(handle.id() as usize) {
            Some(generation) => {
                *generation == handle.generation() && !self.recycled_ids.contains(&handle.id())
            }
            None => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.next_id as usize - self.recycled_ids.len()
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handle_goes_stale_and_slot_is_reused() {
        let mut allocator = HandleAllocator::new();
        let first = allocator.allocate();
        let second = allocator.allocate();
        assert!(allocator.is_live(first));
        assert_eq!(allocator.live_count(), 2);

        assert!(allocator.release(first));
        assert!(!allocator.is_live(first));
        assert!(!allocator.release(first), "double release must be rejected");

        let reused = allocator.allocate();
        assert_eq!(reused.id(), first.id());
        assert_ne!(reused.generation(), first.generation());
        assert!(allocator.is_live(reused));
        assert!(!allocator.is_live(first));
        assert!(allocator.is_live(second));
    }

    #[test]
    fn unknown_handle_is_not_live() {
        let allocator = HandleAllocator::new();
        assert!(!allocator.is_live(ActorHandle::new(7, 0)));
    }
}
